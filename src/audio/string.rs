//! Plucked-string synthesis
//!
//! Renders a complete note in one go: a low-passed noise burst, shaped by
//! where the string is picked, circulates through a damped delay line one
//! period long, then gets a level-dependent low-pass and is normalized to
//! 16-bit PCM.
//!
//! Based on the extended Karplus-Strong model (Jaffe & Smith).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Filter coefficients of the string model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringParams {
    /// Pick-direction low-pass pole `p` (0 = bright, towards 1 = dull)
    pub pick_lowpass: f64,
    /// Pick position as a fraction of the string length (`beta`)
    pub pick_position: f64,
    /// Two-tap mix of the string-damping filter (`s`)
    pub damping_mix: f64,
    /// Allpass coefficient of the delay-line feedback (`c`)
    pub allpass: f64,
    /// Dynamic level `L`, in (0, 1/3)
    pub level: f64,
    /// Per-period loss of the delay line
    pub decay: f64,
}

impl Default for StringParams {
    fn default() -> Self {
        Self {
            pick_lowpass: 0.9,
            pick_position: 0.1,
            damping_mix: 0.1,
            allpass: 0.1,
            level: 0.1,
            decay: 0.996,
        }
    }
}

/// Delay-line length in samples for one period of `frequency`
pub fn period_samples(sample_rate: u32, frequency: f64) -> Result<usize> {
    if sample_rate == 0 {
        return Err(Error::InvalidInput("sample rate must be positive".into()));
    }
    if !(frequency > 0.0 && frequency.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "frequency must be positive and finite, got {frequency}"
        )));
    }
    let n = (sample_rate as f64 / frequency).round() as usize;
    if n == 0 {
        return Err(Error::InvalidInput(format!(
            "frequency {frequency} Hz is above the {sample_rate} Hz sample rate"
        )));
    }
    Ok(n)
}

/// Number of samples a note of `duration_s` seconds occupies. Zero for a
/// non-positive duration.
pub fn sample_count(sample_rate: u32, duration_s: f64) -> Result<usize> {
    if duration_s.is_nan() || duration_s == f64::INFINITY {
        return Err(Error::InvalidInput(format!(
            "duration must be finite, got {duration_s}"
        )));
    }
    if duration_s <= 0.0 {
        return Ok(0);
    }
    let len = (sample_rate as f64 * duration_s).round();
    // The delay line holds one f64 per sample
    let max_len = isize::MAX as usize / std::mem::size_of::<f64>();
    if len >= max_len as f64 {
        return Err(Error::InvalidInput(format!(
            "{duration_s} s at {sample_rate} Hz does not fit in memory"
        )));
    }
    Ok(len as usize)
}

/// Render a plucked note with default coefficients and the thread RNG
pub fn synthesize(sample_rate: u32, frequency: f64, duration_s: f64) -> Result<Vec<i16>> {
    synthesize_with(
        &StringParams::default(),
        sample_rate,
        frequency,
        duration_s,
        &mut rand::rng(),
    )
}

/// Render a plucked note. The excitation noise comes from `rng`, so a seeded
/// generator reproduces the same waveform.
pub fn synthesize_with<R: Rng>(
    params: &StringParams,
    sample_rate: u32,
    frequency: f64,
    duration_s: f64,
    rng: &mut R,
) -> Result<Vec<i16>> {
    let n = period_samples(sample_rate, frequency)?;
    let len = sample_count(sample_rate, duration_s)?;
    if len == 0 {
        return Ok(Vec::new());
    }

    let burst = excitation(n, params.pick_lowpass, rng);
    let noise = pick_comb(&burst, params.pick_position);
    let mut samples = resonate(&noise, len, params);
    shape_level(&mut samples, sample_rate, frequency, params.level);
    Ok(normalize(&samples))
}

/// Uniform noise in [-1, 1] through the one-pole pick-direction low-pass
pub fn excitation<R: Rng>(n: usize, pole: f64, rng: &mut R) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut last = 0.0;
    for _ in 0..n {
        let white: f64 = rng.random_range(-1.0..=1.0);
        last = (1.0 - pole) * white + pole * last;
        out.push(last);
    }
    out
}

/// Feed-forward comb that notches the harmonics the pick position suppresses
pub fn pick_comb(burst: &[f64], pick_position: f64) -> Vec<f64> {
    let pick = ((pick_position * burst.len() as f64).round() as usize).max(1);
    burst
        .iter()
        .enumerate()
        .map(|(i, x)| if i < pick { *x } else { x - burst[i - pick] })
        .collect()
}

/// Run the delay line for `len` samples, seeded with `noise`
pub fn resonate(noise: &[f64], len: usize, params: &StringParams) -> Vec<f64> {
    let n = noise.len();
    let s = params.damping_mix;
    let c = params.allpass;
    let decay = params.decay;

    let mut samples = vec![0.0; len];
    let seeded = n.min(len);
    samples[..seeded].copy_from_slice(&noise[..seeded]);

    for i in n..len {
        let d0 = samples[i - n];
        let d1 = if i > n { samples[i - 1 - n] } else { 0.0 };
        let d2 = if i > n + 1 { samples[i - 2 - n] } else { 0.0 };
        // String-damping filter at this and the previous tap
        let damped = decay * ((1.0 - s) * d0 + s * d1);
        let damped_prev = decay * ((1.0 - s) * d1 + s * d2);
        samples[i] = c * (damped - samples[i - 1]) + damped_prev;
    }
    samples
}

/// Dynamic-level low-pass: quieter plucks lose more high end
pub fn shape_level(samples: &mut [f64], sample_rate: u32, frequency: f64, level: f64) {
    if samples.is_empty() {
        return;
    }
    let w = std::f64::consts::PI * frequency / sample_rate as f64;
    let gain = w / (1.0 + w);
    let feedback = (1.0 - w) / (1.0 + w);
    let dry = level.powf(4.0 / 3.0);
    let wet = 1.0 - level;

    let mut lowpassed = gain * samples[0];
    let mut previous = samples[0];
    samples[0] = dry * samples[0] + wet * lowpassed;
    for sample in samples.iter_mut().skip(1) {
        let x = *sample;
        lowpassed = gain * (x + previous) + feedback * lowpassed;
        previous = x;
        *sample = dry * x + wet * lowpassed;
    }
}

/// Scale to the full 16-bit range. Silence stays silence.
pub fn normalize(samples: &[f64]) -> Vec<i16> {
    let peak = samples.iter().fold(0.0_f64, |max, x| max.max(x.abs()));
    if peak == 0.0 {
        return vec![0; samples.len()];
    }
    let scale = i16::MAX as f64 / peak;
    samples.iter().map(|x| (x * scale).round() as i16).collect()
}
