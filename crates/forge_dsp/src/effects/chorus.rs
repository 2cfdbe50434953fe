//! Chorus - LFO-modulated short delay
//!
//! A sine LFO sweeps the read position of a 100 ms delay line around a base
//! delay; the fractional position is read with linear interpolation.
//!
//! If the modulated delay does not fit in the line (integer part plus the
//! interpolation neighbour reaching the line length) the input sample is
//! passed through unmodified. The input is still written and the head still
//! advances, so history stays continuous when the delay comes back in range.
//!
//! Setters ignore non-finite values and keep the current setting.

use std::f64::consts::TAU;

/// Line length in seconds
pub const CHORUS_BUFFER_SECONDS: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Chorus {
    line: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    lfo_phase: f64,
    lfo_increment: f64,
    rate: f64,
    depth: f64,
    delay: f64,
}

impl Chorus {
    pub const PARAMS: &'static [&'static str] = &["rate", "depth", "delay"];

    pub fn new(sample_rate: f64) -> Self {
        let len = ((sample_rate * CHORUS_BUFFER_SECONDS) as usize).max(2);
        Self {
            line: vec![0.0; len],
            write_pos: 0,
            sample_rate,
            lfo_phase: 0.0,
            lfo_increment: TAU * 0.5 / sample_rate,
            rate: 0.5,
            depth: 0.3,
            delay: 0.02,
        }
    }

    /// LFO rate in Hz
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Modulation depth as a fraction of the base delay
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Base delay in seconds
    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn lfo_phase(&self) -> f64 {
        self.lfo_phase
    }

    pub fn set_rate(&mut self, rate: f64) {
        if !rate.is_finite() {
            return;
        }
        let rate = rate.max(0.0);
        let increment = TAU * rate / self.sample_rate;
        if !increment.is_finite() {
            return;
        }
        self.rate = rate;
        self.lfo_increment = increment;
    }

    /// Depth is clamped to `[0, 1]` so the modulated delay never goes negative
    pub fn set_depth(&mut self, depth: f64) {
        if depth.is_finite() {
            self.depth = depth.clamp(0.0, 1.0);
        }
    }

    pub fn set_delay(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.delay = seconds.max(0.0);
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> bool {
        match key {
            "rate" => self.set_rate(value),
            "depth" => self.set_depth(value),
            "delay" => self.set_delay(value),
            _ => return false,
        }
        true
    }

    pub(crate) fn get(&self, key: &str) -> Option<f64> {
        match key {
            "rate" => Some(self.rate),
            "depth" => Some(self.depth),
            "delay" => Some(self.delay),
            _ => None,
        }
    }

    /// Advance one sample, returning the wet signal
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        let lfo = self.lfo_phase.sin() * self.depth;
        self.lfo_phase += self.lfo_increment;
        if self.lfo_phase >= TAU {
            self.lfo_phase = self.lfo_phase.rem_euclid(TAU);
        }

        let delay_samples = (self.delay * (1.0 + lfo) * self.sample_rate).max(0.0);
        let len = self.line.len();
        self.line[self.write_pos] = input;

        // Range check in f64: casting an oversized delay would saturate
        let in_range = delay_samples.is_finite() && delay_samples < (len - 1) as f64;
        let wet = if in_range {
            let whole = delay_samples.floor();
            let frac = (delay_samples - whole) as f32;
            let whole = whole as usize;
            let pos1 = (self.write_pos + len - whole) % len;
            let pos2 = (self.write_pos + len - whole - 1) % len;
            self.line[pos1] * (1.0 - frac) + self.line[pos2] * frac
        } else {
            input
        };

        self.write_pos = (self.write_pos + 1) % len;
        wet
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.write_pos = 0;
        self.lfo_phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    #[test]
    fn test_defaults() {
        let chorus = Chorus::new(SR);
        assert_eq!(chorus.rate(), 0.5);
        assert_eq!(chorus.depth(), 0.3);
        assert_eq!(chorus.delay(), 0.02);
        assert_eq!(chorus.line.len(), 4410);
    }

    #[test]
    fn test_fixed_delay_without_modulation() {
        let mut chorus = Chorus::new(1000.0);
        chorus.set_depth(0.0);
        chorus.set_delay(0.01);

        let mut out = Vec::new();
        for n in 0..40 {
            out.push(chorus.tick(if n == 0 { 1.0 } else { 0.0 }));
        }

        // 0.01 s at 1 kHz is ten samples, with no fractional part
        assert!((out[10] - 1.0).abs() < 1e-6);
        for (n, &s) in out.iter().enumerate() {
            if n != 10 {
                assert!(s.abs() < 1e-6, "unexpected output {} at {}", s, n);
            }
        }
    }

    #[test]
    fn test_zero_delay_reads_current_input() {
        let mut chorus = Chorus::new(1000.0);
        chorus.set_depth(0.0);
        chorus.set_delay(0.0);
        assert_eq!(chorus.tick(0.6), 0.6);
    }

    #[test]
    fn test_out_of_range_delay_passes_through() {
        let mut chorus = Chorus::new(SR);
        chorus.set_depth(0.0);
        // 0.2 s is twice the line length
        chorus.set_delay(0.2);

        for n in 0..1000 {
            let x = (n as f32 * 0.01).sin();
            assert_eq!(chorus.tick(x), x);
        }

        // The head kept moving and the input kept being written
        assert_eq!(chorus.write_pos, 1000);
        assert_eq!(chorus.line[999], (999.0_f32 * 0.01).sin());
    }

    #[test]
    fn test_huge_delay_passes_through() {
        let mut chorus = Chorus::new(SR);
        chorus.set_depth(0.0);
        chorus.set_delay(1e16);
        assert_eq!(chorus.delay(), 1e16);
        assert_eq!(chorus.tick(0.5), 0.5);
        assert_eq!(chorus.tick(-0.25), -0.25);

        // A delay that overflows to infinity on the way to samples
        chorus.delay = f64::INFINITY;
        assert_eq!(chorus.tick(0.5), 0.5);
        chorus.delay = f64::MAX;
        chorus.set_depth(1.0);
        for _ in 0..100 {
            assert_eq!(chorus.tick(0.125), 0.125);
        }
    }

    #[test]
    fn test_non_finite_settings_ignored() {
        let mut chorus = Chorus::new(SR);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            chorus.set_rate(bad);
            chorus.set_depth(bad);
            chorus.set_delay(bad);
        }
        chorus.set_rate(f64::MAX);
        assert_eq!(chorus.rate(), 0.5);
        assert_eq!(chorus.depth(), 0.3);
        assert_eq!(chorus.delay(), 0.02);

        for n in 0..2000 {
            let y = chorus.tick((n as f32 * 0.03).sin());
            assert!(y.is_finite());
            assert!(chorus.lfo_phase() >= 0.0 && chorus.lfo_phase() < TAU);
        }
    }

    #[test]
    fn test_lfo_phase_wraps() {
        let mut chorus = Chorus::new(100.0);
        chorus.set_rate(10.0);
        for _ in 0..1000 {
            chorus.tick(0.0);
            assert!(chorus.lfo_phase() >= 0.0 && chorus.lfo_phase() < TAU);
        }
    }

    #[test]
    fn test_output_bounded_for_bounded_input() {
        let mut chorus = Chorus::new(SR);
        for n in 0..SR as usize {
            let x = (n as f32 * 0.05).sin();
            assert!(chorus.tick(x).abs() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_reset() {
        let mut chorus = Chorus::new(1000.0);
        for _ in 0..100 {
            chorus.tick(1.0);
        }
        chorus.reset();
        assert_eq!(chorus.lfo_phase(), 0.0);
        assert_eq!(chorus.write_pos, 0);
        assert!(chorus.line.iter().all(|&s| s == 0.0));
    }
}
