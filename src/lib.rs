//! # soundfeat - Audio Feature Extraction
//!
//! Extracts feature vectors (energies, spectral bands, tempo,
//! autocorrelation, ...) from batches of audio signals through chains of
//! typed transforms.
//!
//! ## Architecture
//!
//! soundfeat is an umbrella crate that coordinates:
//! - **soundfeat-core** - Buffer formats, transform contract, registry,
//!   buffer memory allocator, pipeline assembly and execution
//! - **soundfeat-transforms** - Built-in transforms (framing, RDFT, filter
//!   banks, statistics, beat detection)
//!
//! ## Quick Start
//!
//! ```ignore
//! use soundfeat::prelude::*;
//!
//! let extractor = FeatureExtractor::builder()
//!     .sampling_rate(16000)
//!     .buffer_size(4096)
//!     .feature("mel", [
//!         ("Int16ToFloat", params! {}),
//!         ("Window", params! { "length" => 512, "type" => "hamming" }),
//!         ("RDFT", params! {}),
//!         ("Energy", params! {}),
//!         ("FilterBank", params! { "number" => 24 }),
//!     ])
//!     .feature("intensity", [
//!         ("Int16ToFloat", params! {}),
//!         ("Intensity", params! {}),
//!     ])
//!     .build()?;
//!
//! let features = extractor.extract(&[signal])?;
//! let mel = features.get::<ArrayFormat<f32>>("mel").unwrap();
//! ```

/// Re-export of soundfeat-core for direct access
pub use soundfeat_core as core;

/// Re-export of the built-in transforms
pub use soundfeat_transforms as transforms;

pub use soundfeat_core::{
    params, AnyBuffers, ArrayFormat, BufferFormat, Buffers, BuffersAllocator, Features, Format,
    IdentityFormat, LifetimeTree, MemoryLayout, Pipeline, PipelineBuilder, PipelineConfig,
    SingleFormat, StageInfo, TransformParams, TransformRegistry,
};

mod builder;
pub mod error;
mod extractor;

pub use builder::FeatureExtractorBuilder;
pub use error::{Error, Result};
pub use extractor::FeatureExtractor;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{FeatureExtractor, FeatureExtractorBuilder};

    // Formats and results
    pub use crate::core::{ArrayFormat, BufferFormat, Buffers, Features, SingleFormat};

    // Configuration and discovery
    pub use crate::core::{params, PipelineConfig, TransformParams, TransformRegistry};
}
