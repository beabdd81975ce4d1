//! Power and magnitude of interleaved complex spectra.

use soundfeat_core::{propagate_uniform, ArrayFormat, BufferFormat, ElementKernel, Kernel, Result};

fn halve(name: &str, input: &ArrayFormat<f32>, output: &mut ArrayFormat<f32>) {
    if input.size() % 2 != 0 {
        tracing::warn!(
            transform = name,
            format = %input.describe(),
            "Odd input size, the last value is ignored"
        );
    }
    propagate_uniform(input, output);
    output.set_size(input.size() / 2);
}

/// `re² + im²` of every complex value.
#[derive(Debug, Default)]
pub struct Energy;

impl Kernel for Energy {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Energy";
    const DESCRIPTION: &'static str = "Calculates the squared magnitude of each complex number.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        halve(Self::NAME, input, output);
        Ok(buffers_count)
    }
}

impl ElementKernel for Energy {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        for (o, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
            *o = pair[0] * pair[0] + pair[1] * pair[1];
        }
    }
}

/// `sqrt(re² + im²)` of every complex value.
#[derive(Debug, Default)]
pub struct Magnitude;

impl Kernel for Magnitude {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Magnitude";
    const DESCRIPTION: &'static str = "Calculates the magnitude of each complex number.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        halve(Self::NAME, input, output);
        Ok(buffers_count)
    }
}

impl ElementKernel for Magnitude {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        for (o, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
            *o = pair[0].hypot(pair[1]);
        }
    }
}
