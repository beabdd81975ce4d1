//! Typed buffer pipelines for audio feature extraction.
//!
//! # Primary API
//!
//! - [`BufferFormat`] / [`Format`]: element layout and sampling rate of buffers
//! - [`Buffers`]: format-tagged buffer collections
//! - [`Kernel`], [`ElementKernel`], [`BatchKernel`]: the transform contract
//! - [`TransformRegistry`]: name → transform constructor
//! - [`PipelineBuilder`] / [`Pipeline`]: assembly and execution
//! - [`BuffersAllocator`]: buffer layout over a [`LifetimeTree`]
//!
//! # Example
//!
//! ```ignore
//! use soundfeat_core::*;
//!
//! let mut builder = PipelineBuilder::new(&registry, ArrayFormat::<i16>::with_rate(4096, 16000)?, 1);
//! builder.add_feature("energy", &[
//!     ("Int16ToFloat", params! {}),
//!     ("RDFT", params! {}),
//!     ("Energy", params! {}),
//! ])?;
//! let pipeline = builder.build(&PipelineConfig::default())?;
//! let features = pipeline.run(&signal)?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod format;
pub use format::{
    BufferFormat, Format, FormatId, Sample, SamplingRate, ALIGNMENT, MAX_SAMPLING_RATE,
    MIN_SAMPLING_RATE,
};

pub mod formats;
pub use formats::{ArrayFormat, IdentityFormat, SingleFormat};

pub mod buffers;
pub use buffers::{AnyBuffers, Buffers};

pub mod parameter;
pub use parameter::{ParameterError, ParameterSpec, TransformParams};

pub mod transform;
pub use transform::{
    propagate_uniform, BatchKernel, ElementKernel, Execute, Kernel, PerBatch, PerElement, Stage,
    Transform,
};

pub mod registry;
pub use registry::{TransformConstructor, TransformInfo, TransformRegistry};

pub mod scratch;
pub use scratch::ScratchPool;

pub mod allocator;
pub use allocator::{
    BuffersAllocator, FirstFit, LifetimeTree, MemoryLayout, NodeId, PlacementStrategy, Sequential,
};

pub mod pipeline;
pub use pipeline::{Features, Pipeline, PipelineBuilder, StageId, StageInfo};

pub mod config;
pub use config::PipelineConfig;
