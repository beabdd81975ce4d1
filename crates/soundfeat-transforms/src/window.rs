//! Framing of long signals into overlapping windows.

use soundfeat_core::parameter::{parse_choice, parse_in_range};
use soundfeat_core::{
    ArrayFormat, BatchKernel, BufferFormat, Buffers, Error, Kernel, ParameterError, ParameterSpec,
    Result,
};
use std::f32::consts::PI;

/// Default window length in samples
const DEFAULT_LENGTH: usize = 512;

/// Default distance between window starts in samples
const DEFAULT_STEP: usize = 256;

/// Window function applied to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    Rectangular,
    #[default]
    Hamming,
    Hann,
}

impl WindowType {
    const CHOICES: [(&'static str, WindowType); 3] = [
        ("rectangular", WindowType::Rectangular),
        ("hamming", WindowType::Hamming),
        ("hann", WindowType::Hann),
    ];

    /// Coefficient `index` of a window of `length` samples.
    pub fn coefficient(self, index: usize, length: usize) -> f32 {
        if length < 2 {
            return 1.0;
        }
        let phase = 2.0 * PI * index as f32 / (length - 1) as f32;
        match self {
            WindowType::Rectangular => 1.0,
            WindowType::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowType::Hann => 0.5 * (1.0 - phase.cos()),
        }
    }
}

/// Splits every input signal into frames of `length` samples taken every
/// `step` samples and multiplies them by the window function.
///
/// A signal of `S` samples yields `(S - length) / step + 1` frames; trailing
/// samples that do not fill a frame are dropped.
#[derive(Debug)]
pub struct Window {
    length: usize,
    step: usize,
    window_type: WindowType,
    frames: usize,
    coefficients: Vec<f32>,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            step: DEFAULT_STEP,
            window_type: WindowType::default(),
            frames: 0,
            coefficients: Vec::new(),
        }
    }
}

impl Window {
    /// Frames produced from each input signal.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Kernel for Window {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "Window";
    const DESCRIPTION: &'static str =
        "Splits signals into overlapping frames and applies a window function.";

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[
            ParameterSpec::new("length", "Frame length in samples.", "512"),
            ParameterSpec::new("step", "Distance between frame starts in samples.", "256"),
            ParameterSpec::new("type", "Window function: rectangular, hamming or hann.", "hamming"),
        ];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        match name {
            "length" => self.length = parse_in_range(value, 1..=usize::MAX)?,
            "step" => self.step = parse_in_range(value, 1..=usize::MAX)?,
            "type" => self.window_type = parse_choice(value, &WindowType::CHOICES)?,
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
        if self.length > input.size() {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: format!("window length {} exceeds the signal", self.length),
            });
        }
        self.frames = (input.size() - self.length) / self.step + 1;
        output.set_size(self.length);
        Ok(buffers_count * self.frames)
    }

    fn initialize(&mut self, _input: &Self::Input, _output: &Self::Output, _workers: usize) -> Result<()> {
        self.coefficients = (0..self.length)
            .map(|i| self.window_type.coefficient(i, self.length))
            .collect();
        Ok(())
    }
}

impl BatchKernel for Window {
    fn process_batch(&self, inputs: &Buffers<Self::Input>, outputs: &mut Buffers<Self::Output>) {
        let frames = outputs.as_mut_slice().chunks_mut(self.frames.max(1));
        for (signal, frames) in inputs.iter().zip(frames) {
            for (index, frame) in frames.iter_mut().enumerate() {
                let start = index * self.step;
                let samples = &signal[start..start + self.length];
                for ((o, &s), &w) in frame.iter_mut().zip(samples).zip(&self.coefficients) {
                    *o = s * w;
                }
            }
        }
    }
}
