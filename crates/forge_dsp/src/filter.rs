//! Resonant BiQuad Filter
//!
//! Second-order IIR filter in Direct Form I, using the RBJ (Robert
//! Bristow-Johnson) Audio EQ Cookbook designs. Coefficients are normalized
//! by `a0`, so the stored set is `(a1, a2, b0, b1, b2)` with an implicit
//! `a0 = 1`.

use std::f64::consts::{FRAC_1_SQRT_2, TAU};
use std::fmt;

use biquad::Coefficients;

use crate::params::ParameterStore;
use crate::processor::AudioProcessor;

pub const MIN_RESONANCE: f64 = 0.1;
pub const MAX_RESONANCE: f64 = 10.0;

/// Cutoff used when a filter is built with a non-finite frequency
const DEFAULT_FREQUENCY: f64 = 1000.0;

/// Lowest cutoff accepted by the coefficient design
const MIN_CUTOFF_HZ: f64 = 1.0;

/// Highest cutoff as a fraction of the sample rate (just under Nyquist)
const MAX_CUTOFF_RATIO: f64 = 0.49;

/// Response shape of a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterType {
    pub fn name(self) -> &'static str {
        match self {
            FilterType::LowPass => "LowPass",
            FilterType::HighPass => "HighPass",
            FilterType::BandPass => "BandPass",
            FilterType::Notch => "Notch",
        }
    }
}

/// Store keys a filter follows, read once per buffer
#[derive(Debug, Clone, Default)]
struct FilterBindings {
    frequency: Option<String>,
    resonance: Option<String>,
}

/// A single biquad section with its own history
#[derive(Clone)]
pub struct Filter {
    filter_type: FilterType,
    frequency: f64,
    resonance: f64,
    sample_rate: f64,
    coefficients: Coefficients<f64>,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    bindings: FilterBindings,
}

impl Filter {
    /// Create a filter; `resonance` is clamped to `[0.1, 10]`
    ///
    /// A non-finite `frequency` falls back to 1 kHz and a non-finite
    /// `resonance` to the Butterworth Q.
    pub fn new(filter_type: FilterType, frequency: f64, resonance: f64, sample_rate: f64) -> Self {
        let frequency = if frequency.is_finite() {
            frequency
        } else {
            DEFAULT_FREQUENCY
        };
        let resonance = clamp_resonance(resonance).unwrap_or(FRAC_1_SQRT_2);
        Self {
            filter_type,
            frequency,
            resonance,
            sample_rate,
            coefficients: design(filter_type, frequency, resonance, sample_rate),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            bindings: FilterBindings::default(),
        }
    }

    pub fn low_pass(frequency: f64, resonance: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::LowPass, frequency, resonance, sample_rate)
    }

    pub fn high_pass(frequency: f64, resonance: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::HighPass, frequency, resonance, sample_rate)
    }

    pub fn band_pass(frequency: f64, resonance: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::BandPass, frequency, resonance, sample_rate)
    }

    pub fn notch(frequency: f64, resonance: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::Notch, frequency, resonance, sample_rate)
    }

    /// Follow a lock-free store slot for the cutoff frequency
    pub fn with_frequency_param(mut self, key: impl Into<String>) -> Self {
        self.bindings.frequency = Some(key.into());
        self
    }

    /// Follow a lock-free store slot for the resonance (Q)
    pub fn with_resonance_param(mut self, key: impl Into<String>) -> Self {
        self.bindings.resonance = Some(key.into());
        self
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn resonance(&self) -> f64 {
        self.resonance
    }

    /// Normalized coefficients (`a0` is implicitly 1)
    pub fn coefficients(&self) -> Coefficients<f64> {
        self.coefficients
    }

    /// Non-finite values are ignored
    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency.is_finite() {
            self.frequency = frequency;
            self.update_coefficients();
        }
    }

    /// Clamped to `[0.1, 10]`; non-finite values are ignored
    pub fn set_resonance(&mut self, resonance: f64) {
        if let Some(resonance) = clamp_resonance(resonance) {
            self.resonance = resonance;
            self.update_coefficients();
        }
    }

    fn update_coefficients(&mut self) {
        self.coefficients = design(
            self.filter_type,
            self.frequency,
            self.resonance,
            self.sample_rate,
        );
    }

    /// Pick up bound parameters; recomputes coefficients only on change
    fn refresh_params(&mut self, params: &ParameterStore) {
        let mut changed = false;

        if let Some(key) = self.bindings.frequency.as_deref() {
            if let Some(frequency) = params.get_atomic(key).filter(|f| f.is_finite()) {
                if frequency != self.frequency {
                    self.frequency = frequency;
                    changed = true;
                }
            }
        }

        if let Some(key) = self.bindings.resonance.as_deref() {
            if let Some(resonance) = params.get_atomic(key).and_then(clamp_resonance) {
                if resonance != self.resonance {
                    self.resonance = resonance;
                    changed = true;
                }
            }
        }

        if changed {
            self.update_coefficients();
        }
    }

    /// Run one sample through the difference equation
    ///
    /// The output is clamped to `[-1, 1]` before it enters the feedback
    /// history, which bounds any runaway at extreme Q.
    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let c = &self.coefficients;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        // NaN must not enter the history, it would never leave
        let y = if y.is_nan() { 0.0 } else { y.clamp(-1.0, 1.0) };

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Zero the history (avoids clicks when restarting a source)
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.coefficients;
        f.debug_struct("Filter")
            .field("filter_type", &self.filter_type)
            .field("frequency", &self.frequency)
            .field("resonance", &self.resonance)
            .field("b", &(c.b0, c.b1, c.b2))
            .field("a", &(1.0, c.a1, c.a2))
            .finish_non_exhaustive()
    }
}

impl AudioProcessor for Filter {
    fn process(&mut self, buffer: &mut [f32], params: &ParameterStore) {
        self.refresh_params(params);
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample as f64) as f32;
        }
    }

    fn reset(&mut self) {
        Filter::reset(self);
    }

    fn name(&self) -> &'static str {
        self.filter_type.name()
    }
}

/// Clamp Q into range, rejecting NaN and infinities
fn clamp_resonance(resonance: f64) -> Option<f64> {
    resonance
        .is_finite()
        .then(|| resonance.clamp(MIN_RESONANCE, MAX_RESONANCE))
}

/// Derive normalized RBJ coefficients for one section
fn design(filter_type: FilterType, frequency: f64, resonance: f64, sample_rate: f64) -> Coefficients<f64> {
    let max_cutoff = (sample_rate * MAX_CUTOFF_RATIO).max(MIN_CUTOFF_HZ);
    let frequency = if frequency.is_finite() {
        frequency.clamp(MIN_CUTOFF_HZ, max_cutoff)
    } else {
        MIN_CUTOFF_HZ
    };
    let q = resonance.clamp(MIN_RESONANCE, MAX_RESONANCE);

    let omega = TAU * frequency / sample_rate;
    let (sin, cos) = omega.sin_cos();
    let alpha = sin / (2.0 * q);

    let (b0, b1, b2) = match filter_type {
        FilterType::LowPass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
        FilterType::HighPass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
        FilterType::BandPass => (alpha, 0.0, -alpha),
        FilterType::Notch => (1.0, -2.0 * cos, 1.0),
    };
    let (a0, a1, a2) = (1.0 + alpha, -2.0 * cos, 1.0 - alpha);

    Coefficients {
        a1: a1 / a0,
        a2: a2 / a0,
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
    }
}
