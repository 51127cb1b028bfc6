//! Tolerance constants for synthesis tests.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors.
/// Use for operations that should be mathematically exact, such as the
/// magnitude substitution inside Griffin-Lim.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// STFT/ISTFT round trips accumulate FFT rounding over many bins.
pub const DSP_EPSILON: f32 = 1e-4;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// 16-bit quantization step size.
/// Use when comparing samples read back from a 16-bit WAV.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
