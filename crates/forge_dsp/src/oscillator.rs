//! Phase-accumulator oscillators
//!
//! Naive (non band-limited) waveforms computed from a phase in `[0, 2π)`.
//! Frequency updates from the parameter store are picked up once per
//! `generate` call, so pitch changes step at buffer boundaries while the
//! phase itself stays continuous.

use std::f64::consts::{PI, TAU};

use crate::params::ParameterStore;

/// Seed used when none is given; keeps noise reproducible across runs
pub const DEFAULT_NOISE_SEED: u64 = 12345;

const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

/// Waveform produced by an [`Oscillator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

impl Waveform {
    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Saw => "Saw",
            Waveform::Square => "Square",
            Waveform::Triangle => "Triangle",
            Waveform::Noise => "Noise",
        }
    }
}

/// 64-bit linear congruential generator
///
/// Owned per oscillator so instances never share random state.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    seed: u64,
    state: u64,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed, state: seed }
    }

    /// Next value, uniform in `[0, 1)`
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        (self.state >> 32) as f64 / (1u64 << 32) as f64
    }

    /// Next value, uniform in `[-1, 1)`
    #[inline]
    pub fn next_bipolar(&mut self) -> f64 {
        self.next_unit() * 2.0 - 1.0
    }

    /// Rewind to the original seed
    pub fn reset(&mut self) {
        self.state = self.seed;
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_SEED)
    }
}

/// A single oscillator voice
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    amplitude: f64,
    phase: f64,
    phase_increment: f64,
    sample_rate: f64,
    noise: NoiseGenerator,
    frequency_param: Option<String>,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, amplitude: f64, sample_rate: f64) -> Self {
        let mut osc = Self {
            waveform,
            frequency: 0.0,
            amplitude: 0.0,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
            noise: NoiseGenerator::default(),
            frequency_param: None,
        };
        osc.set_frequency(frequency);
        osc.set_amplitude(amplitude);
        osc
    }

    /// Follow the store's lock-free slot `key` for frequency
    ///
    /// The slot is read once per `generate` call. Unregistered keys are
    /// ignored and the oscillator keeps its current frequency.
    pub fn with_frequency_param(mut self, key: impl Into<String>) -> Self {
        self.frequency_param = Some(key.into());
        self
    }

    /// Replace the noise generator seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.noise = NoiseGenerator::new(seed);
        self
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn phase_increment(&self) -> f64 {
        self.phase_increment
    }

    pub fn frequency_param(&self) -> Option<&str> {
        self.frequency_param.as_deref()
    }

    /// Non-finite frequencies (or ones whose increment overflows) are ignored
    pub fn set_frequency(&mut self, frequency: f64) {
        let increment = TAU * frequency / self.sample_rate;
        if !increment.is_finite() {
            return;
        }
        self.frequency = frequency;
        self.phase_increment = increment;
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        if amplitude.is_finite() {
            self.amplitude = amplitude;
        }
    }

    /// Restart at phase zero with the noise sequence rewound
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.noise.reset();
    }

    /// Fill `buffer` with the next block of samples
    ///
    /// # Real-time Safety
    /// No allocations; the parameter read is a wait-free slot lookup.
    pub fn generate(&mut self, buffer: &mut [f32], params: &ParameterStore) {
        if let Some(key) = self.frequency_param.as_deref() {
            if let Some(frequency) = params.get_atomic(key) {
                if frequency != self.frequency {
                    self.set_frequency(frequency);
                }
            }
        }

        for sample in buffer.iter_mut() {
            *sample = (self.next_value() * self.amplitude) as f32;
            self.advance();
        }
    }

    /// Waveform value at the current phase, before amplitude scaling
    #[inline]
    fn next_value(&mut self) -> f64 {
        let phase = self.phase;
        match self.waveform {
            Waveform::Sine => phase.sin(),
            Waveform::Saw => 2.0 * (phase / TAU) - 1.0,
            Waveform::Square => {
                if phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < PI {
                    -1.0 + 2.0 * phase / PI
                } else {
                    3.0 - 2.0 * phase / PI
                }
            }
            Waveform::Noise => self.noise.next_bipolar(),
        }
    }

    #[inline]
    fn advance(&mut self) {
        self.phase += self.phase_increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        // Increments of a full turn or more (or negative ones) need a real wrap
        if !(0.0..TAU).contains(&self.phase) {
            self.phase = self.phase.rem_euclid(TAU);
            if self.phase >= TAU {
                self.phase = 0.0;
            }
        }
    }
}
