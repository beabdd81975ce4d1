//! Autocorrelation through the power spectrum.

use crate::fft::Plan;
use rustfft::num_complex::Complex;
use soundfeat_core::{
    propagate_uniform, ArrayFormat, BufferFormat, ElementKernel, Error, Kernel, Result,
};

/// Full linear autocorrelation: `N` samples → `2N - 1` lags from
/// `-(N - 1)` to `N - 1`.
///
/// Computed in double precision as the transform of the zero-padded power
/// spectrum, which keeps the small outer lags accurate next to the large
/// central one.
#[derive(Debug, Default)]
pub struct Autocorrelation {
    plan: Option<Plan<f64>>,
}

impl Kernel for Autocorrelation {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Autocorrelation";
    const DESCRIPTION: &'static str = "Find the cross-correlation of a signal with itself.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        if input.size() == 0 {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: "empty signal".to_string(),
            });
        }
        propagate_uniform(input, output);
        output.set_size(input.size() * 2 - 1);
        Ok(buffers_count)
    }

    fn initialize(&mut self, _input: &Self::Input, output: &Self::Output, workers: usize) -> Result<()> {
        self.plan = Some(Plan::forward(output.size().next_power_of_two(), workers));
        Ok(())
    }
}

impl ElementKernel for Autocorrelation {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        let Some(plan) = &self.plan else {
            tracing::error!(transform = Self::NAME, "Executed before initialize");
            return;
        };
        let size = input.len();
        plan.with(|workspace| {
            let buffer = &mut workspace.buffer;
            let length = buffer.len();
            for (c, &x) in buffer.iter_mut().zip(input.iter().chain(std::iter::repeat(&0.0))) {
                *c = Complex::new(f64::from(x), 0.0);
            }
            plan.process(workspace);

            // |X|² is real and even, so the forward transform doubles as the
            // inverse one.
            for c in workspace.buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            plan.process(workspace);

            let scale = 1.0 / length as f64;
            for (index, o) in output.iter_mut().enumerate() {
                let lag = index.abs_diff(size - 1);
                *o = (workspace.buffer[lag].re * scale) as f32;
            }
        });
    }
}
