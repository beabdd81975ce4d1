//! Zero padding to FFT-friendly sizes.

use soundfeat_core::{propagate_uniform, ArrayFormat, ElementKernel, Kernel, Result};

/// Extends every array with zeros up to the next power of two.
#[derive(Debug, Default)]
pub struct ZeroPadding;

impl Kernel for ZeroPadding {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "ZeroPadding";
    const DESCRIPTION: &'static str =
        "Pads the signal with zeros so that its length becomes a power of two.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        propagate_uniform(input, output);
        output.set_size(input.size().next_power_of_two());
        Ok(buffers_count)
    }
}

impl ElementKernel for ZeroPadding {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        let (head, tail) = output.split_at_mut(input.len());
        head.copy_from_slice(input);
        tail.fill(0.0);
    }
}
