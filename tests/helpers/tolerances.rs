//! Tolerance constants for feature tests.

/// Floating point rounding errors.
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Relative tolerance for FFT based features on 16-bit input.
pub const DSP_EPSILON: f32 = 1e-3;

/// Absolute tolerance for forward + inverse transforms of 16-bit scale
/// signals.
pub const ROUND_TRIP_EPSILON: f32 = 0.05;
