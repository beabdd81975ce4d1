//! Tempo estimation with comb filters.
//!
//! Each candidate tempo is scored by convolving the input with a comb of
//! `pulses` unit impulses one beat apart and measuring the energy of the
//! result: impulses that line up with the rhythm add coherently. The search
//! runs twice, a coarse pass over the whole tempo range and a fine pass
//! around every coarse peak.

use rayon::prelude::*;
use soundfeat_core::parameter::parse_in_range;
use soundfeat_core::{
    ArrayFormat, BatchKernel, BufferFormat, Buffers, Error, Kernel, ParameterError,
    ParameterSpec, Result,
};

/// Seconds in one minute
const SECONDS_PER_MINUTE: f32 = 60.0;

/// Largest number of reported tempo peaks
const MAX_PEAKS: usize = 10;

/// Largest number of comb impulses
const MAX_PULSES: usize = 64;

/// Finest tempo step of either search pass, in bpm
const MIN_RESOLUTION: f32 = 0.01;

/// Tempo bounds, in bpm
const MAX_BPM: u32 = 600;

/// Longest comb convolution, in samples
const MAX_COMB_LENGTH: usize = 1 << 24;

/// Tempo search over groups of `bands` buffers.
///
/// Every group (for example the subbands of one signal) produces one output
/// array of `max_peaks` `[bpm, energy]` pairs ordered by tempo. Missing peaks
/// are reported as `[0, 0]`.
#[derive(Debug)]
pub struct Beat {
    bands: usize,
    pulses: usize,
    min_bpm: u32,
    max_bpm: u32,
    resolution1: f32,
    resolution2: f32,
    max_peaks: usize,
    rate: f32,
}

impl Default for Beat {
    fn default() -> Self {
        Self {
            bands: 1,
            pulses: 3,
            min_bpm: 60,
            max_bpm: 240,
            resolution1: 1.0,
            resolution2: 0.1,
            max_peaks: 3,
            rate: 0.0,
        }
    }
}

/// Strongest tempo of one search pass.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    bpm: f32,
    energy: f32,
}

impl Beat {
    /// Energy of `signal` convolved with a comb of `pulses` impulses spaced
    /// `period` samples apart. `buffer` holds the convolution.
    fn comb_energy(&self, signal: &[f32], period: usize, buffer: &mut Vec<f32>) -> f32 {
        buffer.clear();
        buffer.resize(signal.len() + (self.pulses - 1) * period, 0.0);
        for pulse in 0..self.pulses {
            let offset = pulse * period;
            for (y, &x) in buffer[offset..].iter_mut().zip(signal) {
                *y += x;
            }
        }
        buffer.iter().map(|y| y * y).sum()
    }

    /// Score every tempo in `min_bpm..max_bpm` with stride `step`.
    fn energies(
        &self,
        group: &[Vec<f32>],
        min_bpm: f32,
        max_bpm: f32,
        step: f32,
        buffer: &mut Vec<f32>,
    ) -> (Vec<f32>, Peak) {
        let search_size = ((max_bpm - min_bpm) / step).floor().max(0.0) as usize;
        let mut best = Peak {
            bpm: min_bpm,
            energy: 0.0,
        };
        let energies = (0..search_size)
            .map(|i| {
                let bpm = min_bpm + step * i as f32;
                let period = ((SECONDS_PER_MINUTE * self.rate / bpm).floor() as usize).max(1);
                let energy: f32 = group
                    .iter()
                    .map(|signal| self.comb_energy(signal, period, buffer))
                    .sum();
                if energy > best.energy {
                    best = Peak { bpm, energy };
                }
                energy
            })
            .collect();
        (energies, best)
    }

    fn analyze(&self, group: &[Vec<f32>], output: &mut [[f32; 2]]) {
        let mut buffer = Vec::new();
        let min_bpm = self.min_bpm as f32;

        // Step 1: coarse pass over the whole range
        let (energies, _) =
            self.energies(group, min_bpm, self.max_bpm as f32, self.resolution1, &mut buffer);

        // Step 2: strongest local maxima, back in tempo order
        let mut peaks = local_maxima(&energies);
        peaks.sort_by(|&a, &b| energies[b].total_cmp(&energies[a]));
        peaks.truncate(self.max_peaks);
        peaks.sort_unstable();

        // Step 3: fine pass around every peak
        output.fill([0.0; 2]);
        for (slot, &position) in output.iter_mut().zip(&peaks) {
            let low = min_bpm + (position - 1) as f32 * self.resolution1;
            let high = min_bpm + (position + 1) as f32 * self.resolution1;
            let (_, peak) = self.energies(group, low, high, self.resolution2, &mut buffer);
            *slot = [peak.bpm, peak.energy];
        }
    }
}

/// Interior positions strictly above the left neighbour and not below the
/// right one.
fn local_maxima(values: &[f32]) -> Vec<usize> {
    (1..values.len().saturating_sub(1))
        .filter(|&i| values[i] > values[i - 1] && values[i] >= values[i + 1])
        .collect()
}

impl Kernel for Beat {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<[f32; 2]>;
    const NAME: &'static str = "Beat";
    const DESCRIPTION: &'static str =
        "Finds the tempo of the signal using comb filter convolution.";

    fn parameters() -> &'static [ParameterSpec] {
        const PARAMETERS: &[ParameterSpec] = &[
            ParameterSpec::new("bands", "Number of consecutive buffers analyzed together.", "1"),
            ParameterSpec::new("pulses", "Number of impulses in the comb filter.", "3"),
            ParameterSpec::new("min_bpm", "Minimal tempo to search for.", "60"),
            ParameterSpec::new("max_bpm", "Maximal tempo to search for.", "240"),
            ParameterSpec::new("resolution1", "Tempo step of the coarse pass.", "1"),
            ParameterSpec::new("resolution2", "Tempo step of the fine pass.", "0.1"),
            ParameterSpec::new("max_peaks", "Number of tempo peaks to report.", "3"),
        ];
        PARAMETERS
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> std::result::Result<(), ParameterError> {
        match name {
            "bands" => self.bands = parse_in_range(value, 1..=usize::MAX)?,
            "pulses" => self.pulses = parse_in_range(value, 1..=MAX_PULSES)?,
            "min_bpm" => self.min_bpm = parse_in_range(value, 1..=MAX_BPM)?,
            "max_bpm" => self.max_bpm = parse_in_range(value, 1..=MAX_BPM)?,
            "resolution1" => {
                self.resolution1 = parse_in_range(value, MIN_RESOLUTION..=MAX_BPM as f32)?
            }
            "resolution2" => {
                self.resolution2 = parse_in_range(value, MIN_RESOLUTION..=MAX_BPM as f32)?
            }
            "max_peaks" => self.max_peaks = parse_in_range(value, 1..=MAX_PEAKS)?,
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
        if self.min_bpm >= self.max_bpm {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: format!(
                    "tempo range [{}, {}] is empty",
                    self.min_bpm, self.max_bpm
                ),
            });
        }
        if buffers_count % self.bands != 0 {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: format!(
                    "{buffers_count} buffers do not split into groups of {} bands",
                    self.bands
                ),
            });
        }
        self.rate = input.sampling_rate()? as f32;

        // The slowest tempo has the widest comb.
        let longest_period =
            (SECONDS_PER_MINUTE * self.rate / self.min_bpm as f32).floor() as usize;
        let comb_length = (self.pulses - 1)
            .checked_mul(longest_period)
            .and_then(|spread| spread.checked_add(input.size()))
            .filter(|&length| length <= MAX_COMB_LENGTH);
        if comb_length.is_none() {
            return Err(Error::InvalidFormat {
                format: input.describe(),
                reason: format!(
                    "a comb of {} pulses at {} bpm exceeds {} samples",
                    self.pulses, self.min_bpm, MAX_COMB_LENGTH
                ),
            });
        }
        output.set_size(self.max_peaks);
        Ok(buffers_count / self.bands)
    }
}

impl BatchKernel for Beat {
    fn process_batch(&self, inputs: &Buffers<Self::Input>, outputs: &mut Buffers<Self::Output>) {
        let groups = inputs.as_slice().par_chunks(self.bands);
        outputs
            .as_mut_slice()
            .par_iter_mut()
            .zip(groups)
            .for_each(|(output, group)| self.analyze(group, output));
    }
}
