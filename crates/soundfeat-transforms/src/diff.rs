//! Differentiation of signals.

use soundfeat_core::parameter::{parse_bool, parse_in_range};
use soundfeat_core::{
    propagate_uniform, ArrayFormat, ElementKernel, Kernel, ParameterError, ParameterSpec, Result,
    ScratchPool,
};
use std::f32::consts::FRAC_1_SQRT_2;

/// Deepest wavelet level; the hole size doubles with every level
const MAX_SWT_LEVEL: usize = 24;

/// Approximation/detail pair reused across SWT levels.
#[derive(Debug, Default)]
struct SwtBuffers {
    approximation: Vec<f32>,
    next: Vec<f32>,
}

/// Circular first difference, `out[i] = in[i + 1] - in[i]` with the last
/// value wrapping around to `in[0] - in[N - 1]`.
///
/// With `swt` set, the derivative is estimated instead by the detail
/// coefficients of a stationary Haar wavelet transform at that level, which
/// is far less sensitive to noise. `rectify` clamps negative results to zero.
#[derive(Debug, Default)]
pub struct Diff {
    rectify: bool,
    /// 0 disables the wavelet estimate.
    swt: usize,
    buffers: ScratchPool<SwtBuffers>,
}

impl Kernel for Diff {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Diff";
    const DESCRIPTION: &'static str = "Differentiate the signal.";
    const PARALLEL: bool = true;

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[
            ParameterSpec::new("rectify", "Set all negative values to zero.", "false"),
            ParameterSpec::new(
                "swt",
                "Use the stationary wavelet transform detail at this level (0 disables).",
                "0",
            ),
        ];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        match name {
            "rectify" => self.rectify = parse_bool(value)?,
            "swt" => self.swt = parse_in_range(value, 0..=MAX_SWT_LEVEL)?,
            _ => return Err(ParameterError::Unknown),
        }
        Ok(())
    }

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        propagate_uniform(input, output);
        Ok(buffers_count)
    }

    fn initialize(&mut self, input: &Self::Input, _output: &Self::Output, workers: usize) -> Result<()> {
        if self.swt > 0 {
            let size = input.size();
            self.buffers = ScratchPool::new(workers, || SwtBuffers {
                approximation: vec![0.0; size],
                next: vec![0.0; size],
            });
        }
        Ok(())
    }
}

impl Diff {
    fn difference(input: &[f32], output: &mut [f32]) {
        let Some((&first, _)) = input.split_first() else {
            return;
        };
        for (o, pair) in output.iter_mut().zip(input.windows(2)) {
            *o = pair[1] - pair[0];
        }
        if let (Some(o), Some(&last)) = (output.last_mut(), input.last()) {
            *o = first - last;
        }
    }

    /// One à trous Haar step with hole size `stride`.
    fn haar_step(input: &[f32], stride: usize, detail: &mut [f32], approximation: &mut [f32]) {
        let n = input.len();
        for i in 0..n {
            let ahead = input[(i + stride) % n];
            detail[i] = (ahead - input[i]) * FRAC_1_SQRT_2;
            approximation[i] = (ahead + input[i]) * FRAC_1_SQRT_2;
        }
    }

    fn swt_detail(&self, input: &[f32], output: &mut [f32]) {
        self.buffers.with(|buffers| {
            let SwtBuffers { approximation, next } = buffers;
            Self::haar_step(input, 1, output, approximation);
            for level in 2..=self.swt {
                let stride = 1usize << (level - 1);
                Self::haar_step(approximation, stride, output, next);
                std::mem::swap(approximation, next);
            }
        });
    }
}

impl ElementKernel for Diff {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        if self.swt > 0 {
            self.swt_detail(input, output);
        } else {
            Self::difference(input, output);
        }
        if self.rectify {
            for v in output.iter_mut() {
                *v = v.max(0.0);
            }
        }
    }
}
