//! Test helpers and fixtures for soundfeat integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (casts, copies)
//! - `DSP_EPSILON` (1e-3): Relative error of FFT based results
//! - `ROUND_TRIP_EPSILON` (0.05): Absolute error of forward + inverse FFT on 16-bit scale values

#![allow(dead_code)]

pub mod tolerances;

/// Default test sampling rate
pub const TEST_SAMPLING_RATE: u32 = 16000;

/// Standard signal length for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 1024;

/// Generate a 16-bit sine wave at `frequency` Hz.
pub fn generate_sine(frequency: f64, sampling_rate: u32, amplitude: f64, num_samples: usize) -> Vec<i16> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sampling_rate as f64;
            (amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()).round() as i16
        })
        .collect()
}

/// Unit clicks every `period` samples.
pub fn generate_clicks(period: usize, num_samples: usize) -> Vec<i16> {
    (0..num_samples)
        .map(|i| if i % period == 0 { 1 } else { 0 })
        .collect()
}

/// Deterministic pseudo-random 16-bit noise.
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<i16> {
    // Simple LCG for reproducible "random" noise
    let mut state = seed;
    (0..num_samples)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (((state >> 33) % 20000) as i32 - 10000) as i16
        })
        .collect()
}

/// Index of the largest value.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Install a test subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
