//! Bit-crusher: sample-and-hold decimation plus amplitude quantization

const MIN_BITS: f64 = 1.0;
const MAX_BITS: f64 = 24.0;

/// Sample-and-hold decimator and quantizer
///
/// The input is latched every `hold_period` samples and the held value is
/// truncated toward zero onto a grid of `2^bits` levels spanning
/// `[-1, 1 - step]`.
#[derive(Debug, Clone)]
pub struct BitCrusher {
    sample_rate: f64,
    bits: f64,
    factor: f64,
    step: f64,
    hold_period: u32,
    held: f32,
    countdown: u32,
}

impl BitCrusher {
    pub const PARAMS: &'static [&'static str] = &["bits", "sampleRate"];

    pub fn new(sample_rate: f64) -> Self {
        let mut crusher = Self {
            sample_rate,
            bits: 8.0,
            factor: 0.5,
            step: 0.0,
            hold_period: 1,
            held: 0.0,
            countdown: 0,
        };
        crusher.set_bits(8.0);
        crusher.set_factor(0.5);
        crusher
    }

    pub fn bits(&self) -> f64 {
        self.bits
    }

    /// Sample-rate reduction factor (1.0 = every sample)
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn hold_period(&self) -> u32 {
        self.hold_period
    }

    /// Set the bit depth, clamped to `[1, 24]`; non-finite values are ignored
    pub fn set_bits(&mut self, bits: f64) {
        if !bits.is_finite() {
            return;
        }
        self.bits = bits.clamp(MIN_BITS, MAX_BITS);
        self.step = 2.0 / self.bits.exp2();
    }

    /// Set the reduction factor; the hold period is `round(1 / factor)`,
    /// kept between one sample and one second. Non-finite values are ignored.
    pub fn set_factor(&mut self, factor: f64) {
        if !factor.is_finite() {
            return;
        }
        self.factor = factor;
        let max_period = self.sample_rate.max(1.0);
        let period = if factor > 0.0 {
            (1.0 / factor).round().clamp(1.0, max_period)
        } else {
            max_period
        };
        self.hold_period = period as u32;
        self.countdown = self.countdown.min(self.hold_period);
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> bool {
        match key {
            "bits" => self.set_bits(value),
            "sampleRate" => self.set_factor(value),
            _ => return false,
        }
        true
    }

    pub(crate) fn get(&self, key: &str) -> Option<f64> {
        match key {
            "bits" => Some(self.bits),
            "sampleRate" => Some(self.factor),
            _ => None,
        }
    }

    /// Quantize toward zero onto the `2^bits` grid
    #[inline]
    pub fn quantize(&self, sample: f64) -> f64 {
        let step = self.step;
        let q = if sample > 0.0 {
            (sample / step).floor() * step
        } else {
            (sample / step).ceil() * step
        };
        q.clamp(-1.0, 1.0 - step)
    }

    /// Advance one sample, returning the wet signal
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        if self.countdown == 0 {
            self.held = input;
            self.countdown = self.hold_period;
        }
        self.countdown -= 1;

        self.quantize(self.held as f64) as f32
    }

    pub fn reset(&mut self) {
        self.held = 0.0;
        self.countdown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SR: f64 = 44100.0;

    #[test]
    fn test_defaults() {
        let crusher = BitCrusher::new(SR);
        assert_eq!(crusher.bits(), 8.0);
        assert_eq!(crusher.factor(), 0.5);
        assert_eq!(crusher.hold_period(), 2);
    }

    #[test]
    fn test_hold_period_rounding() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_factor(0.3);
        assert_eq!(crusher.hold_period(), 3);
        crusher.set_factor(0.4);
        assert_eq!(crusher.hold_period(), 3);
        crusher.set_factor(4.0);
        assert_eq!(crusher.hold_period(), 1);
        crusher.set_factor(0.0);
        assert_eq!(crusher.hold_period(), 44100);
    }

    #[test]
    fn test_sample_and_hold() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_bits(24.0);
        crusher.set_factor(0.25);

        let input = [0.5, 0.1, 0.2, 0.3, -0.5, 0.0, 0.0, 0.0];
        let out: Vec<f32> = input.iter().map(|&x| crusher.tick(x)).collect();

        for &s in &out[0..4] {
            assert!((s - 0.5).abs() < 1e-6);
        }
        for &s in &out[4..8] {
            assert!((s + 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_bits(2.0);
        // step = 0.5
        assert_eq!(crusher.quantize(0.7), 0.5);
        assert_eq!(crusher.quantize(-0.7), -0.5);
        assert_eq!(crusher.quantize(0.2), 0.0);
        assert_eq!(crusher.quantize(-0.2), 0.0);
        assert_eq!(crusher.quantize(1.0), 0.5);
        assert_eq!(crusher.quantize(-1.0), -1.0);
    }

    #[test]
    fn test_eight_bits_at_most_256_levels() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_factor(1.0);

        let mut levels = HashSet::new();
        let n = 100_000;
        for i in 0..n {
            // Full-scale sine with a rising frequency
            let t = i as f64 / SR;
            let x = (std::f64::consts::TAU * (50.0 + 2000.0 * t) * t).sin() as f32;
            // Index on the 1/128 grid; folds -0.0 and 0.0 together
            levels.insert((crusher.tick(x) * 128.0) as i32);
        }

        assert!(levels.len() <= 256, "{} distinct levels", levels.len());
        assert!(levels.len() > 200);
    }

    #[test]
    fn test_bits_clamped() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_bits(0.0);
        assert_eq!(crusher.bits(), 1.0);
        crusher.set_bits(64.0);
        assert_eq!(crusher.bits(), 24.0);
    }

    #[test]
    fn test_non_finite_settings_ignored() {
        let mut crusher = BitCrusher::new(SR);
        crusher.set_bits(4.0);
        crusher.set_factor(0.25);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            crusher.set_bits(bad);
            crusher.set_factor(bad);
        }
        assert_eq!(crusher.bits(), 4.0);
        assert_eq!(crusher.factor(), 0.25);
        assert_eq!(crusher.hold_period(), 4);
    }
}
