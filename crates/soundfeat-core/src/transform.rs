//! Transform contract.
//!
//! A transform consumes buffers of one format and produces buffers of another.
//! Implementations write a [`Kernel`] (formats, parameters, shape propagation)
//! plus either [`ElementKernel`] or [`BatchKernel`] for the numeric work, and
//! wrap it in a [`Stage`] which provides the format-erased [`Transform`]
//! interface used by the registry and the pipeline.
//!
//! ```text
//! Kernel ──┬── ElementKernel ── Stage<K, PerElement> ──┐
//!          └── BatchKernel ──── Stage<K, PerBatch> ────┴── dyn Transform
//! ```

use crate::buffers::{AnyBuffers, Buffers};
use crate::format::{downcast_buffers, BufferFormat, Format};
use crate::parameter::{ParameterError, ParameterSpec};
use crate::{Error, Result};
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;

/// Formats, parameters and shape propagation of a transform.
pub trait Kernel: Send + Sync + 'static {
    type Input: Format + Default;
    type Output: Format + Default;

    /// Registry name.
    const NAME: &'static str;

    const DESCRIPTION: &'static str;

    /// Elements may be processed concurrently on the pipeline's workers.
    const PARALLEL: bool = false;

    fn parameters() -> &'static [ParameterSpec] {
        &[]
    }

    fn set_parameter(&mut self, _name: &str, _value: &str) -> std::result::Result<(), ParameterError> {
        Err(ParameterError::Unknown)
    }

    /// Recompute `output` from `input` and return the output buffer count.
    ///
    /// `output` already carries the source details (sampling rate) of `input`.
    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize>;

    /// One-time precomputation once formats are fixed. `workers` is the
    /// number of threads that may call into the kernel at once.
    fn initialize(
        &mut self,
        _input: &Self::Input,
        _output: &Self::Output,
        _workers: usize,
    ) -> Result<()> {
        Ok(())
    }
}

/// Kernel mapping each input element to the output element at the same index.
pub trait ElementKernel: Kernel {
    fn process_element(
        &self,
        input: &<Self::Input as Format>::Element,
        output: &mut <Self::Output as Format>::Element,
    );
}

/// Kernel that sees the whole batch, for transforms that change the count.
pub trait BatchKernel: Kernel {
    fn process_batch(&self, inputs: &Buffers<Self::Input>, outputs: &mut Buffers<Self::Output>);
}

/// Execution mode of a [`Stage`].
pub trait Execute<K: Kernel>: Send + Sync + 'static {
    fn run(kernel: &K, inputs: &Buffers<K::Input>, outputs: &mut Buffers<K::Output>) -> Result<()>;
}

/// Element-wise execution, data-parallel when the kernel allows it.
#[derive(Debug, Clone, Copy)]
pub struct PerElement;

/// Whole-batch execution.
#[derive(Debug, Clone, Copy)]
pub struct PerBatch;

impl<K: ElementKernel> Execute<K> for PerElement {
    fn run(kernel: &K, inputs: &Buffers<K::Input>, outputs: &mut Buffers<K::Output>) -> Result<()> {
        if inputs.count() != outputs.count() {
            return Err(Error::BufferCountMismatch {
                expected: inputs.count(),
                found: outputs.count(),
            });
        }

        if K::PARALLEL {
            outputs
                .as_mut_slice()
                .par_iter_mut()
                .zip(inputs.as_slice().par_iter())
                .for_each(|(output, input)| kernel.process_element(input, output));
        } else {
            for (output, input) in outputs.iter_mut().zip(inputs.iter()) {
                kernel.process_element(input, output);
            }
        }
        Ok(())
    }
}

impl<K: BatchKernel> Execute<K> for PerBatch {
    fn run(kernel: &K, inputs: &Buffers<K::Input>, outputs: &mut Buffers<K::Output>) -> Result<()> {
        kernel.process_batch(inputs, outputs);
        Ok(())
    }
}

/// Format-erased transform interface.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parameters(&self) -> &'static [ParameterSpec];

    /// Parse and apply one parameter.
    fn set_parameter(&mut self, name: &str, value: &str) -> Result<()>;

    fn is_parallel(&self) -> bool;

    fn input_format(&self) -> &dyn BufferFormat;

    fn output_format(&self) -> &dyn BufferFormat;

    /// Accept the producer's format and recompute the output shape.
    ///
    /// Returns the number of output buffers.
    fn set_input_format(&mut self, format: &dyn BufferFormat, buffers_count: usize)
        -> Result<usize>;

    fn initialize(&mut self, workers: usize) -> Result<()>;

    fn output_count(&self) -> usize;

    /// Fresh, initialized output buffers sharing this stage's output format.
    fn create_output_buffers(&self) -> Result<Box<dyn AnyBuffers>>;

    fn execute(&self, inputs: &dyn AnyBuffers, outputs: &mut dyn AnyBuffers) -> Result<()>;
}

impl std::fmt::Debug for dyn Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name())
            .field("input", &self.input_format().describe())
            .field("output", &self.output_format().describe())
            .finish()
    }
}

/// Make `output` a copy of `input`, for transforms whose input and output
/// share one format type.
pub fn propagate_uniform<F: Format>(input: &F, output: &mut F) {
    *output = input.clone();
}

/// A kernel paired with its formats and execution mode.
pub struct Stage<K: Kernel, E> {
    kernel: K,
    input: K::Input,
    output: Arc<K::Output>,
    output_count: usize,
    /// Cleared by every input format change.
    initialized: bool,
    _executor: PhantomData<fn() -> E>,
}

impl<K: Kernel, E: Execute<K>> Stage<K, E> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            input: K::Input::default(),
            output: Arc::new(K::Output::default()),
            output_count: 0,
            initialized: false,
            _executor: PhantomData,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn typed_output_format(&self) -> &Arc<K::Output> {
        &self.output
    }

    fn accept_input(&mut self, format: &dyn BufferFormat) -> Result<()> {
        if self.input.id() != format.id() {
            return Err(Error::mismatch(self.input.id(), format.id()));
        }
        match format.as_any().downcast_ref::<K::Input>() {
            Some(concrete) => self.input = concrete.clone(),
            // Matched through the wildcard: only the source details carry over.
            None => self.input.copy_source_details_from(format)?,
        }
        Ok(())
    }
}

impl<K: Kernel, E: Execute<K>> Transform for Stage<K, E> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn description(&self) -> &'static str {
        K::DESCRIPTION
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        K::parameters()
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.kernel
            .set_parameter(name, value)
            .map_err(|e| match e {
                ParameterError::Unknown => Error::UnknownParameter {
                    transform: K::NAME.to_string(),
                    parameter: name.to_string(),
                },
                ParameterError::Invalid(reason) => Error::InvalidParameter {
                    transform: K::NAME.to_string(),
                    parameter: name.to_string(),
                    value: value.to_string(),
                    reason,
                },
            })
    }

    fn is_parallel(&self) -> bool {
        K::PARALLEL
    }

    fn input_format(&self) -> &dyn BufferFormat {
        &self.input
    }

    fn output_format(&self) -> &dyn BufferFormat {
        self.output.as_ref()
    }

    fn set_input_format(
        &mut self,
        format: &dyn BufferFormat,
        buffers_count: usize,
    ) -> Result<usize> {
        self.accept_input(format)?;
        self.initialized = false;

        let output = Arc::make_mut(&mut self.output);
        output.copy_source_details_from(&self.input)?;
        let count = self
            .kernel
            .on_input_format_changed(&self.input, output, buffers_count)?;
        self.output_count = count;

        tracing::debug!(
            transform = K::NAME,
            input = %self.input.describe(),
            output = %self.output.describe(),
            count,
            "Input format changed"
        );
        Ok(count)
    }

    fn initialize(&mut self, workers: usize) -> Result<()> {
        self.kernel
            .initialize(&self.input, &self.output, workers.max(1))?;
        self.initialized = true;
        Ok(())
    }

    fn output_count(&self) -> usize {
        self.output_count
    }

    fn create_output_buffers(&self) -> Result<Box<dyn AnyBuffers>> {
        let mut buffers = Buffers::new(Arc::clone(&self.output));
        buffers.initialize(self.output_count)?;
        Ok(Box::new(buffers))
    }

    fn execute(&self, inputs: &dyn AnyBuffers, outputs: &mut dyn AnyBuffers) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized(K::NAME));
        }
        // A wildcard input only sees how many buffers arrived.
        let placeholder;
        let inputs = if self.input.id().is_identity() {
            let mut buffers = Buffers::new(Arc::new(self.input.clone()));
            buffers.initialize(inputs.count())?;
            placeholder = buffers;
            &placeholder
        } else {
            downcast_buffers(&self.input, inputs)?
        };
        let found = outputs.format().id();
        let outputs = outputs
            .downcast_mut::<K::Output>()
            .ok_or_else(|| Error::mismatch(self.output.id(), found))?;
        E::run(&self.kernel, inputs, outputs)
    }
}
