//! Triangular filter banks on psychoacoustic frequency scales.

use soundfeat_core::parameter::{parse_bool, parse_choice, parse_in_range, parse_positive};
use soundfeat_core::{
    propagate_uniform, ArrayFormat, BufferFormat, ElementKernel, Error, Kernel, ParameterError,
    ParameterSpec, Result,
};

/// Largest supported number of filters
const MAX_FILTERS: usize = 2048;

/// Frequency scale the filters are spaced evenly on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyScale {
    Linear,
    #[default]
    Mel,
    Bark,
}

impl FrequencyScale {
    const CHOICES: [(&'static str, FrequencyScale); 3] = [
        ("linear", FrequencyScale::Linear),
        ("mel", FrequencyScale::Mel),
        ("bark", FrequencyScale::Bark),
    ];

    /// Hz → scale units.
    pub fn from_hz(self, frequency: f32) -> f32 {
        match self {
            FrequencyScale::Linear => frequency,
            FrequencyScale::Mel => 1127.0 * (1.0 + frequency / 700.0).ln(),
            FrequencyScale::Bark => {
                8.96 * (0.978 + 5.0 * (0.994 + ((frequency + 75.4) / 2173.0).powf(1.347)).ln())
                    .ln()
            }
        }
    }

    /// Scale units → Hz.
    pub fn to_hz(self, value: f32) -> f32 {
        match self {
            FrequencyScale::Linear => value,
            FrequencyScale::Mel => 700.0 * ((value / 1127.0).exp() - 1.0),
            FrequencyScale::Bark => {
                let inner = (((value / 8.96).exp() - 0.978) / 5.0).exp() - 0.994;
                2173.0 * inner.powf(1.0 / 1.347) - 75.4
            }
        }
    }
}

/// One triangular filter, nonzero over `begin..=end` of the spectrum.
#[derive(Debug, Clone, PartialEq)]
struct Filter {
    begin: usize,
    end: usize,
    weights: Vec<f32>,
}

/// Applies `number` triangular filters to a real spectrum and outputs the
/// energy passed by each: `Σ (x[j] · w[j])²` over the filter's span.
///
/// The triangles are evenly spaced and half-overlapping on the chosen scale
/// between `frequency_min` and `frequency_max`, so they widen with frequency
/// on the mel and bark scales.
#[derive(Debug)]
pub struct FilterBank {
    scale: FrequencyScale,
    number: usize,
    frequency_min: f32,
    frequency_max: f32,
    squared: bool,
    filters: Vec<Filter>,
}

impl Default for FilterBank {
    fn default() -> Self {
        Self {
            scale: FrequencyScale::default(),
            number: 32,
            frequency_min: 130.0,
            frequency_max: 6854.0,
            squared: false,
            filters: Vec::new(),
        }
    }
}

impl FilterBank {
    /// Build the triangle centered at `center` with half width `half_width`
    /// (scale units) over a spectrum of `size` points spaced `df` Hz apart.
    fn triangular_filter(&self, center: f32, half_width: f32, size: usize, df: f32) -> Filter {
        let last = size.saturating_sub(1) as f32;
        let left_hz = self.scale.to_hz(center - half_width);
        let right_hz = self.scale.to_hz(center + half_width);
        let mut center_index = self.scale.to_hz(center) / df;

        let mut left = (left_hz / df).ceil().clamp(0.0, last) as usize;
        let mut right = (right_hz / df).floor().clamp(0.0, last) as usize;
        if right < left {
            let collapsed = center_index.round().clamp(0.0, last);
            left = collapsed as usize;
            right = left;
            center_index = collapsed;
        }

        let mut weights: Vec<f32> = (left..=right)
            .map(|i| {
                let distance = (center - self.scale.from_hz(i as f32 * df)) / half_width;
                if i as f32 <= center_index {
                    1.0 - distance
                } else {
                    1.0 + distance
                }
            })
            .collect();
        let peak = (center_index.round().max(0.0) as usize).clamp(left, right);
        weights[peak - left] = 1.0;
        if self.squared {
            for w in &mut weights {
                *w *= *w;
            }
        }

        Filter {
            begin: left,
            end: right,
            weights,
        }
    }
}

impl Kernel for FilterBank {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "FilterBank";
    const DESCRIPTION: &'static str =
        "Converts the signal to the selected psychoacoustic scale (default is mel).";
    const PARALLEL: bool = true;

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[
            ParameterSpec::new("type", "The type of the scale: linear, mel or bark.", "mel"),
            ParameterSpec::new("number", "The number of triangular filters.", "32"),
            ParameterSpec::new("frequency_min", "Minimal frequency of the filter bank.", "130"),
            ParameterSpec::new("frequency_max", "Maximal frequency of the filter bank.", "6854"),
            ParameterSpec::new("squared", "Apply squared filter weights.", "false"),
        ];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        match name {
            "type" => self.scale = parse_choice(value, &FrequencyScale::CHOICES)?,
            "number" => self.number = parse_in_range(value, 1..=MAX_FILTERS)?,
            "frequency_min" => self.frequency_min = parse_positive(value)?,
            "frequency_max" => self.frequency_max = parse_positive(value)?,
            "squared" => self.squared = parse_bool(value)?,
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
        let nyquist = input.sampling_rate()? as f32 / 2.0;
        if self.frequency_min >= self.frequency_max || self.frequency_max > nyquist {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: format!(
                    "frequency range [{}, {}] Hz does not fit below the Nyquist frequency {} Hz",
                    self.frequency_min, self.frequency_max, nyquist
                ),
            });
        }
        if input.size() == 0 {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: "empty spectrum".to_string(),
            });
        }
        propagate_uniform(input, output);
        output.set_size(self.number);
        Ok(buffers_count)
    }

    fn initialize(&mut self, input: &Self::Input, _output: &Self::Output, _workers: usize) -> Result<()> {
        let size = input.size();
        let df = input.sampling_rate()? as f32 / (2 * size) as f32;
        let scale_min = self.scale.from_hz(self.frequency_min);
        let scale_max = self.scale.from_hz(self.frequency_max);
        let step = (scale_max - scale_min) / (self.number + 1) as f32;

        self.filters = (0..self.number)
            .map(|i| self.triangular_filter(scale_min + step * (i + 1) as f32, step, size, df))
            .collect();
        tracing::debug!(
            scale = ?self.scale,
            filters = self.filters.len(),
            df,
            "Built filter bank"
        );
        Ok(())
    }
}

impl ElementKernel for FilterBank {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        for (o, filter) in output.iter_mut().zip(&self.filters) {
            *o = input[filter.begin..=filter.end]
                .iter()
                .zip(&filter.weights)
                .map(|(x, w)| {
                    let v = x * w;
                    v * v
                })
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run;
    use approx::assert_relative_eq;
    use soundfeat_core::{PerElement, Stage, Transform};

    #[test]
    fn test_scales_round_trip() {
        for scale in [FrequencyScale::Linear, FrequencyScale::Mel, FrequencyScale::Bark] {
            for hz in [130.0f32, 1000.0, 6854.0] {
                assert_relative_eq!(scale.to_hz(scale.from_hz(hz)), hz, max_relative = 1e-3);
            }
        }
        assert_relative_eq!(FrequencyScale::Mel.from_hz(700.0), 1127.0 * 2.0f32.ln());
    }

    #[test]
    fn test_filters_cover_range_in_order() {
        let mut bank = FilterBank::default();
        let input = ArrayFormat::<f32>::with_rate(512, 16000).unwrap();
        let mut output = ArrayFormat::<f32>::default();
        bank.on_input_format_changed(&input, &mut output, 1).unwrap();
        bank.initialize(&input, &output, 1).unwrap();

        assert_eq!(output.size(), 32);
        assert_eq!(bank.filters.len(), 32);
        // df = 15.625 Hz, so 130 Hz sits just above bin 8
        assert!(bank.filters[0].begin >= 8);
        assert!(bank.filters[31].end <= (6854.0 / 15.625) as usize);
        for pair in bank.filters.windows(2) {
            assert!(pair[0].begin <= pair[1].begin);
            assert!(pair[0].end <= pair[1].end);
        }
        for filter in &bank.filters {
            assert_eq!(filter.weights.len(), filter.end - filter.begin + 1);
            assert!(filter.weights.iter().all(|w| (-1e-5..=1.0 + 1e-5).contains(w)));
            assert!(filter.weights.contains(&1.0));
        }
    }

    #[test]
    fn test_linear_filter_shape() {
        let mut bank = FilterBank::default();
        bank.set_parameter("type", "linear").unwrap();
        bank.set_parameter("number", "1").unwrap();
        bank.set_parameter("frequency_min", "1000").unwrap();
        bank.set_parameter("frequency_max", "3000").unwrap();
        // 8 kHz over 8 points: 1 kHz per point, single triangle 1..3 kHz
        let input = ArrayFormat::<f32>::with_rate(8, 16000).unwrap();
        let (format, output) = run::<_, PerElement>(bank, input, vec![vec![1.0; 8]]);

        assert_eq!(format.size(), 1);
        // weights [0, 1, 0]
        assert_relative_eq!(output[0][0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_squared_weights() {
        let mut bank = FilterBank::default();
        bank.set_parameter("type", "linear").unwrap();
        bank.set_parameter("number", "1").unwrap();
        bank.set_parameter("frequency_min", "1000").unwrap();
        bank.set_parameter("frequency_max", "5000").unwrap();
        bank.set_parameter("squared", "true").unwrap();
        let input = ArrayFormat::<f32>::with_rate(8, 16000).unwrap();
        let (_, output) = run::<_, PerElement>(bank, input, vec![vec![2.0; 8]]);

        // weights 0, 0.25, 1, 0.25, 0 on 1..5 kHz: (2 * w)² summed
        assert_relative_eq!(output[0][0], 4.0 * (0.0625 + 1.0 + 0.0625), epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_frequency_range() {
        let mut bank = FilterBank::default();
        bank.set_parameter("frequency_max", "9000").unwrap();
        let mut stage = Stage::<FilterBank, PerElement>::new(bank);
        let input = ArrayFormat::<f32>::with_rate(512, 16000).unwrap();
        assert!(matches!(
            stage.set_input_format(&input, 1),
            Err(Error::InvalidFormat { .. })
        ));

        let mut bank = FilterBank::default();
        bank.set_parameter("frequency_min", "7000").unwrap();
        let mut stage = Stage::<FilterBank, PerElement>::new(bank);
        assert!(stage.set_input_format(&input, 1).is_err());
    }

    #[test]
    fn test_parameter_ranges() {
        let mut bank = FilterBank::default();
        assert!(bank.set_parameter("number", "2049").is_err());
        assert!(bank.set_parameter("number", "0").is_err());
        assert!(bank.set_parameter("type", "erb").is_err());
        assert!(bank.set_parameter("frequency_min", "-5").is_err());
    }
}
