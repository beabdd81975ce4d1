//! Real discrete Fourier transform and its inverse.
//!
//! Spectra are stored interleaved: `[re0, im0, re1, im1, ...]`. A real signal
//! of `N` samples (`N` even) has `N / 2 + 1` distinct bins, so the spectrum
//! array holds `N + 2` floats.

use crate::fft::Plan;
use rustfft::num_complex::Complex;
use soundfeat_core::{
    propagate_uniform, ArrayFormat, BufferFormat, ElementKernel, Error, Kernel, Result,
};

fn require_even(input: &ArrayFormat<f32>, minimum: usize) -> Result<()> {
    if input.size() % 2 != 0 || input.size() < minimum {
        return Err(Error::InvalidFormat {
            format: input.describe(),
            reason: format!("size must be even and at least {minimum}"),
        });
    }
    Ok(())
}

/// Forward real DFT, `N` samples → `N + 2` interleaved complex values.
#[derive(Debug, Default)]
pub struct Rdft {
    plan: Option<Plan<f32>>,
}

impl Kernel for Rdft {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "RDFT";
    const DESCRIPTION: &'static str =
        "Performs the Discrete Fourier Transform on the real input signal.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        require_even(input, 2)?;
        propagate_uniform(input, output);
        output.set_size(input.size() + 2);
        Ok(buffers_count)
    }

    fn initialize(&mut self, input: &Self::Input, _output: &Self::Output, workers: usize) -> Result<()> {
        self.plan = Some(Plan::forward(input.size(), workers));
        Ok(())
    }
}

impl ElementKernel for Rdft {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        let Some(plan) = &self.plan else {
            tracing::error!(transform = Self::NAME, "Executed before initialize");
            return;
        };
        plan.run(
            |buffer| {
                for (c, &x) in buffer.iter_mut().zip(input) {
                    *c = Complex::new(x, 0.0);
                }
            },
            |spectrum| {
                for (bin, pair) in spectrum.iter().zip(output.chunks_exact_mut(2)) {
                    pair[0] = bin.re;
                    pair[1] = bin.im;
                }
            },
        );
    }
}

/// Inverse real DFT, `N + 2` interleaved complex values → `N` samples.
///
/// The result is scaled by `1 / N`, so it inverts [`Rdft`] exactly.
#[derive(Debug, Default)]
pub struct RdftInverse {
    plan: Option<Plan<f32>>,
}

impl Kernel for RdftInverse {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "RDFTInverse";
    const DESCRIPTION: &'static str =
        "Performs the Inverse Discrete Fourier Transform on the complex spectrum.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        require_even(input, 4)?;
        propagate_uniform(input, output);
        output.set_size(input.size() - 2);
        Ok(buffers_count)
    }

    fn initialize(&mut self, _input: &Self::Input, output: &Self::Output, workers: usize) -> Result<()> {
        self.plan = Some(Plan::inverse(output.size(), workers));
        Ok(())
    }
}

impl ElementKernel for RdftInverse {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        let Some(plan) = &self.plan else {
            tracing::error!(transform = Self::NAME, "Executed before initialize");
            return;
        };
        let length = output.len();
        let half = length / 2;
        plan.run(
            |buffer| {
                for (bin, pair) in input.chunks_exact(2).enumerate().take(half + 1) {
                    buffer[bin] = Complex::new(pair[0], pair[1]);
                }
                // Hermitian symmetry of a real signal's spectrum
                for bin in 1..half {
                    buffer[length - bin] = buffer[bin].conj();
                }
            },
            |signal| {
                let scale = 1.0 / length as f32;
                for (o, c) in output.iter_mut().zip(signal) {
                    *o = c.re * scale;
                }
            },
        );
    }
}
