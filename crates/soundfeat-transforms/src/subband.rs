//! Energies of wavelet packet subbands.

use soundfeat_core::parameter::parse_list;
use soundfeat_core::{
    propagate_uniform, ArrayFormat, BufferFormat, ElementKernel, Error, Kernel, ParameterError,
    ParameterSpec, Result,
};
use std::ops::Range;

/// Deepest supported subband level
const MAX_DEPTH: u32 = 24;

/// Sums the squares of consecutive subbands of a wavelet packet
/// decomposition.
///
/// `tree` lists the depth of every leaf of the decomposition from the lowest
/// band up; a leaf at depth `d` covers `size / 2^d` values. The leaves must
/// tile the whole array.
#[derive(Debug)]
pub struct SubbandEnergy {
    tree: Vec<u32>,
    bands: Vec<Range<usize>>,
}

impl Default for SubbandEnergy {
    fn default() -> Self {
        Self {
            tree: vec![3, 3, 2, 2, 3, 3],
            bands: Vec::new(),
        }
    }
}

impl Kernel for SubbandEnergy {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;
    const NAME: &'static str = "SubbandEnergy";
    const DESCRIPTION: &'static str =
        "Calculates the energy of every subband described by a wavelet packet tree.";
    const PARALLEL: bool = true;

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[ParameterSpec::new(
            "tree",
            "Depths of the subband tree leaves, lowest band first.",
            "3 3 2 2 3 3",
        )];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        if name != "tree" {
            return Err(ParameterError::Unknown);
        }
        let tree: Vec<u32> = parse_list(value)?;
        if tree.is_empty() {
            return Err(ParameterError::Invalid("the tree has no leaves".to_string()));
        }
        if let Some(depth) = tree.iter().find(|&&d| d > MAX_DEPTH) {
            return Err(ParameterError::Invalid(format!(
                "depth {depth} exceeds {MAX_DEPTH}"
            )));
        }
        self.tree = tree;
        Ok(())
    }

    fn on_input_format_changed(
        &mut self,
        input: &Self::Input,
        output: &mut Self::Output,
        buffers_count: usize,
    ) -> Result<usize> {
        let size = input.size();
        let invalid = |reason: String| Error::InvalidFormat {
            format: input.describe(),
            reason,
        };

        let mut bands = Vec::with_capacity(self.tree.len());
        let mut offset = 0;
        for &depth in &self.tree {
            let width = size >> depth;
            if width == 0 || width << depth != size {
                return Err(invalid(format!("size is not divisible by 2^{depth}")));
            }
            bands.push(offset..offset + width);
            offset += width;
        }
        if offset != size {
            return Err(invalid(format!(
                "subband tree covers {offset} values instead of {size}"
            )));
        }

        self.bands = bands;
        propagate_uniform(input, output);
        output.set_size(self.tree.len());
        Ok(buffers_count)
    }
}

impl ElementKernel for SubbandEnergy {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        for (o, band) in output.iter_mut().zip(&self.bands) {
            *o = input[band.clone()].iter().map(|v| v * v).sum();
        }
    }
}
