//! Sample type conversion.

use soundfeat_core::{ArrayFormat, ElementKernel, Kernel, Result};

/// Converts 16-bit PCM to floats without rescaling.
#[derive(Debug, Default)]
pub struct Int16ToFloat;

impl Kernel for Int16ToFloat {
    type Input = ArrayFormat<i16>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Int16ToFloat";
    const DESCRIPTION: &'static str = "Converts 16-bit integer samples to floats.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        output.set_size(input.size());
        Ok(buffers_count)
    }
}

impl ElementKernel for Int16ToFloat {
    fn process_element(&self, input: &Vec<i16>, output: &mut Vec<f32>) {
        for (o, &i) in output.iter_mut().zip(input) {
            *o = f32::from(i);
        }
    }
}
