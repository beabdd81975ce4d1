//! Whole-array statistics.

use soundfeat_core::parameter::{parse_choice, parse_list};
use soundfeat_core::{
    ArrayFormat, ElementKernel, Kernel, ParameterError, ParameterSpec, Result, SingleFormat,
};

/// Unnormalized intensity: the mean square of the signal.
#[derive(Debug, Default)]
pub struct Intensity;

impl Kernel for Intensity {
    type Input = ArrayFormat<f32>;
    type Output = SingleFormat<f32>;
    const NAME: &'static str = "Intensity";
    const DESCRIPTION: &'static str = "Unnormalized sound intensity calculation.";
    const PARALLEL: bool = true;

    fn on_input_format_changed(
        &mut self,
        _input: &Self::Input,
        _output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        Ok(buffers_count)
    }
}

impl ElementKernel for Intensity {
    fn process_element(&self, input: &Vec<f32>, output: &mut f32) {
        *output = if input.is_empty() {
            0.0
        } else {
            input.iter().map(|v| v * v).sum::<f32>() / input.len() as f32
        };
    }
}

/// Kind of mean computed by [`Mean`]; the discriminant is the output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeanType {
    Arithmetic = 0,
    Geometric = 1,
}

impl MeanType {
    const CHOICES: [(&'static str, MeanType); 2] = [
        ("arithmetic", MeanType::Arithmetic),
        ("geometric", MeanType::Geometric),
    ];

    fn compute(self, values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            MeanType::Arithmetic => values.iter().sum::<f32>() / values.len() as f32,
            MeanType::Geometric => geometric_mean(values),
        }
    }
}

/// Geometric mean without overflowing the running product: whenever the next
/// factor would overflow, the partial product is rooted and folded in.
fn geometric_mean(values: &[f32]) -> f32 {
    let power = 1.0 / values.len() as f32;
    let mut result = 1.0f32;
    let mut product = 1.0f32;
    for &value in values {
        let next = product * value;
        if next.is_infinite() {
            result *= product.powf(power);
            product = value;
        } else {
            product = next;
        }
    }
    result * product.powf(power)
}

/// Arithmetic and/or geometric mean of each array.
///
/// Output slot 0 holds the arithmetic mean and slot 1 the geometric mean;
/// a slot whose type is not selected stays 0.
#[derive(Debug)]
pub struct Mean {
    types: Vec<MeanType>,
}

impl Default for Mean {
    fn default() -> Self {
        Self {
            types: vec![MeanType::Arithmetic],
        }
    }
}

impl Kernel for Mean {
    type Input = ArrayFormat<f32>;
    type Output = SingleFormat<[f32; 2]>;
    const NAME: &'static str = "Mean";
    const DESCRIPTION: &'static str = "Calculates the mean of the signal.";
    const PARALLEL: bool = true;

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[ParameterSpec::new(
            "types",
            "Means to calculate, separated by spaces: arithmetic, geometric.",
            "arithmetic",
        )];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        if name != "types" {
            return Err(ParameterError::Unknown);
        }
        let mut types = Vec::new();
        for word in parse_list::<String>(value)? {
            let mean_type = parse_choice(&word, &MeanType::CHOICES)?;
            if !types.contains(&mean_type) {
                types.push(mean_type);
            }
        }
        if types.is_empty() {
            return Err(ParameterError::Invalid("at least one type is required".to_string()));
        }
        self.types = types;
        Ok(())
    }

    fn on_input_format_changed(
        &mut self,
        _input: &Self::Input,
        _output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        Ok(buffers_count)
    }
}

impl ElementKernel for Mean {
    fn process_element(&self, input: &Vec<f32>, output: &mut [f32; 2]) {
        *output = [0.0; 2];
        for &mean_type in &self.types {
            output[mean_type as usize] = mean_type.compute(input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run;
    use approx::assert_relative_eq;
    use soundfeat_core::PerElement;

    fn format(size: usize) -> ArrayFormat<f32> {
        ArrayFormat::<f32>::with_rate(size, 16000).unwrap()
    }

    #[test]
    fn test_intensity_is_mean_square() {
        let (_, output) =
            run::<_, PerElement>(Intensity, format(4), vec![vec![1.0, -1.0, 2.0, 0.0]]);
        assert_relative_eq!(output[0], 1.5);
    }

    #[test]
    fn test_default_mean_is_arithmetic_only() {
        let (_, output) =
            run::<_, PerElement>(Mean::default(), format(4), vec![vec![1.0, 2.0, 4.0, 8.0]]);
        assert_relative_eq!(output[0][0], 3.75);
        assert_eq!(output[0][1], 0.0);
    }

    #[test]
    fn test_both_means() {
        let mut mean = Mean::default();
        mean.set_parameter("types", "geometric arithmetic").unwrap();
        let (_, output) = run::<_, PerElement>(mean, format(4), vec![vec![1.0, 2.0, 4.0, 8.0]]);
        assert_relative_eq!(output[0][0], 3.75);
        assert_relative_eq!(output[0][1], 64.0f32.powf(0.25), max_relative = 1e-5);
    }

    #[test]
    fn test_geometric_mean_survives_overflow() {
        let values = vec![1e30f32; 8];
        assert_relative_eq!(geometric_mean(&values), 1e30, max_relative = 1e-4);
    }

    #[test]
    fn test_types_parameter() {
        let mut mean = Mean::default();
        mean.set_parameter("types", "geometric").unwrap();
        assert_eq!(mean.types, vec![MeanType::Geometric]);
        assert!(mean.set_parameter("types", "harmonic").is_err());
        assert!(mean.set_parameter("types", "  ").is_err());
        assert_eq!(mean.set_parameter("kind", "geometric"), Err(ParameterError::Unknown));
    }
}
