//! Effect Chain Stages
//!
//! Every effect produces a wet signal per sample which is blended with the
//! dry input as `dry * (1 - mix) + wet * mix`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Effect                                       │
//! │  mix, bindings (effect key -> store slot)    │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ Delay | Distortion | Chorus | BitCrusher│  │
//! │  │        tick(x) -> wet                  │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Parameters are addressed by name (`time`, `feedback`, `drive`, `level`,
//! `rate`, `depth`, `delay`, `bits`, `sampleRate`, `mix`). A name can be bound
//! to a lock-free slot in the [`ParameterStore`]; bound slots are read once at
//! the top of each buffer.

mod bitcrusher;
mod chorus;
mod delay;
mod distortion;

pub use bitcrusher::BitCrusher;
pub use chorus::{Chorus, CHORUS_BUFFER_SECONDS};
pub use delay::{Delay, MAX_DELAY_SECONDS};
pub use distortion::Distortion;

use crate::error::{check_sample_rate, DspError, DspResult};
use crate::params::ParameterStore;
use crate::processor::AudioProcessor;

/// Blend key shared by every effect
pub const MIX_PARAM: &str = "mix";

const DEFAULT_MIX: f64 = 0.5;

/// Effect variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectType {
    Delay,
    Distortion,
    Chorus,
    BitCrusher,
}

impl EffectType {
    pub fn name(self) -> &'static str {
        match self {
            EffectType::Delay => "Delay",
            EffectType::Distortion => "Distortion",
            EffectType::Chorus => "Chorus",
            EffectType::BitCrusher => "BitCrusher",
        }
    }

    /// Variant-specific parameter names (`mix` is common to all)
    pub fn params(self) -> &'static [&'static str] {
        match self {
            EffectType::Delay => Delay::PARAMS,
            EffectType::Distortion => Distortion::PARAMS,
            EffectType::Chorus => Chorus::PARAMS,
            EffectType::BitCrusher => BitCrusher::PARAMS,
        }
    }
}

#[derive(Debug, Clone)]
enum Stage {
    Delay(Delay),
    Distortion(Distortion),
    Chorus(Chorus),
    BitCrusher(BitCrusher),
}

#[derive(Debug, Clone)]
struct Binding {
    param: &'static str,
    store_key: String,
}

/// One stage of the effect chain
#[derive(Debug, Clone)]
pub struct Effect {
    stage: Stage,
    mix: f64,
    bindings: Vec<Binding>,
}

impl Effect {
    /// Create an effect with its default parameters and a 0.5 mix
    ///
    /// Delay lines are sized from `sample_rate` here, so processing never
    /// allocates.
    pub fn new(effect_type: EffectType, sample_rate: f64) -> DspResult<Self> {
        let sample_rate = check_sample_rate(sample_rate)?;
        let stage = match effect_type {
            EffectType::Delay => Stage::Delay(Delay::new(sample_rate)),
            EffectType::Distortion => Stage::Distortion(Distortion::new()),
            EffectType::Chorus => Stage::Chorus(Chorus::new(sample_rate)),
            EffectType::BitCrusher => Stage::BitCrusher(BitCrusher::new(sample_rate)),
        };
        Ok(Self {
            stage,
            mix: DEFAULT_MIX,
            bindings: Vec::new(),
        })
    }

    pub fn effect_type(&self) -> EffectType {
        match self.stage {
            Stage::Delay(_) => EffectType::Delay,
            Stage::Distortion(_) => EffectType::Distortion,
            Stage::Chorus(_) => EffectType::Chorus,
            Stage::BitCrusher(_) => EffectType::BitCrusher,
        }
    }

    pub fn mix(&self) -> f64 {
        self.mix
    }

    /// Set the dry/wet blend, clamped to `[0, 1]`; non-finite values are
    /// ignored
    pub fn set_mix(&mut self, mix: f64) {
        if mix.is_finite() {
            self.mix = mix.clamp(0.0, 1.0);
        }
    }

    /// Builder form of [`Effect::set_param`]
    pub fn with_param(mut self, key: &str, value: f64) -> DspResult<Self> {
        self.set_param(key, value)?;
        Ok(self)
    }

    /// Set a parameter by name
    pub fn set_param(&mut self, key: &str, value: f64) -> DspResult<()> {
        if key == MIX_PARAM {
            self.set_mix(value);
            return Ok(());
        }

        let known = match &mut self.stage {
            Stage::Delay(d) => d.set(key, value),
            Stage::Distortion(d) => d.set(key, value),
            Stage::Chorus(c) => c.set(key, value),
            Stage::BitCrusher(b) => b.set(key, value),
        };

        if known {
            Ok(())
        } else {
            Err(self.unknown(key))
        }
    }

    /// Read a parameter by name
    pub fn param(&self, key: &str) -> DspResult<f64> {
        if key == MIX_PARAM {
            return Ok(self.mix);
        }

        let value = match &self.stage {
            Stage::Delay(d) => d.get(key),
            Stage::Distortion(d) => d.get(key),
            Stage::Chorus(c) => c.get(key),
            Stage::BitCrusher(b) => b.get(key),
        };

        value.ok_or_else(|| self.unknown(key))
    }

    /// Follow the store slot `store_key` for parameter `key`
    ///
    /// The slot is read once per buffer; a missing slot leaves the current
    /// value in place. Rebinding a parameter replaces its previous binding.
    pub fn bind_param(&mut self, key: &str, store_key: impl Into<String>) -> DspResult<()> {
        let param = self.canonical_param(key).ok_or_else(|| self.unknown(key))?;
        let store_key = store_key.into();

        match self.bindings.iter_mut().find(|b| b.param == param) {
            Some(binding) => binding.store_key = store_key,
            None => self.bindings.push(Binding { param, store_key }),
        }
        Ok(())
    }

    /// Builder form of [`Effect::bind_param`]
    pub fn with_binding(mut self, key: &str, store_key: impl Into<String>) -> DspResult<Self> {
        self.bind_param(key, store_key)?;
        Ok(self)
    }

    /// Store key bound to `key`, if any
    pub fn binding(&self, key: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.param == key)
            .map(|b| b.store_key.as_str())
    }

    fn canonical_param(&self, key: &str) -> Option<&'static str> {
        if key == MIX_PARAM {
            return Some(MIX_PARAM);
        }
        self.effect_type().params().iter().copied().find(|p| *p == key)
    }

    fn unknown(&self, key: &str) -> DspError {
        DspError::UnknownParameter {
            component: self.effect_type().name(),
            key: key.to_string(),
        }
    }

    fn refresh_params(&mut self, params: &ParameterStore) {
        for i in 0..self.bindings.len() {
            let Some(value) = params.get_atomic(&self.bindings[i].store_key) else {
                continue;
            };
            let param = self.bindings[i].param;
            // Bindings only ever hold canonical names
            let _ = self.set_param(param, value);
        }
    }
}

impl AudioProcessor for Effect {
    fn process(&mut self, buffer: &mut [f32], params: &ParameterStore) {
        self.refresh_params(params);

        let mix = self.mix as f32;
        match &mut self.stage {
            Stage::Delay(d) => blend(buffer, mix, |x| d.tick(x)),
            Stage::Distortion(d) => blend(buffer, mix, |x| d.tick(x)),
            Stage::Chorus(c) => blend(buffer, mix, |x| c.tick(x)),
            Stage::BitCrusher(b) => blend(buffer, mix, |x| b.tick(x)),
        }
    }

    fn reset(&mut self) {
        match &mut self.stage {
            Stage::Delay(d) => d.reset(),
            Stage::Distortion(_) => {}
            Stage::Chorus(c) => c.reset(),
            Stage::BitCrusher(b) => b.reset(),
        }
    }

    fn name(&self) -> &'static str {
        self.effect_type().name()
    }
}

/// Replace each sample with `dry * (1 - mix) + wet * mix`
#[inline]
fn blend(buffer: &mut [f32], mix: f32, mut wet: impl FnMut(f32) -> f32) {
    let dry_gain = 1.0 - mix;
    for sample in buffer.iter_mut() {
        let dry = *sample;
        *sample = dry * dry_gain + wet(dry) * mix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    const ALL: [EffectType; 4] = [
        EffectType::Delay,
        EffectType::Distortion,
        EffectType::Chorus,
        EffectType::BitCrusher,
    ];

    #[test]
    fn test_default_parameters() {
        let delay = Effect::new(EffectType::Delay, SR).unwrap();
        assert_eq!(delay.param("time").unwrap(), 0.25);
        assert_eq!(delay.param("feedback").unwrap(), 0.3);

        let dist = Effect::new(EffectType::Distortion, SR).unwrap();
        assert_eq!(dist.param("drive").unwrap(), 5.0);
        assert_eq!(dist.param("level").unwrap(), 0.7);

        let chorus = Effect::new(EffectType::Chorus, SR).unwrap();
        assert_eq!(chorus.param("rate").unwrap(), 0.5);
        assert_eq!(chorus.param("depth").unwrap(), 0.3);
        assert_eq!(chorus.param("delay").unwrap(), 0.02);

        let crusher = Effect::new(EffectType::BitCrusher, SR).unwrap();
        assert_eq!(crusher.param("bits").unwrap(), 8.0);
        assert_eq!(crusher.param("sampleRate").unwrap(), 0.5);

        for kind in ALL {
            let effect = Effect::new(kind, SR).unwrap();
            assert_eq!(effect.mix(), 0.5);
            assert_eq!(effect.effect_type(), kind);
            assert_eq!(effect.name(), kind.name());
        }
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(matches!(
            Effect::new(EffectType::Delay, 0.0),
            Err(DspError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_unknown_parameter() {
        let mut dist = Effect::new(EffectType::Distortion, SR).unwrap();
        let err = dist.set_param("feedback", 0.5).unwrap_err();
        assert!(matches!(
            err,
            DspError::UnknownParameter { component: "Distortion", ref key } if key == "feedback"
        ));
        assert!(dist.param("time").is_err());
        assert!(dist.bind_param("bits", "x").is_err());
    }

    #[test]
    fn test_mix_clamped() {
        let mut effect = Effect::new(EffectType::Distortion, SR).unwrap();
        effect.set_param("mix", 1.7).unwrap();
        assert_eq!(effect.mix(), 1.0);
        effect.set_param("mix", -3.0).unwrap();
        assert_eq!(effect.mix(), 0.0);
        effect.set_param("mix", f64::NAN).unwrap();
        assert_eq!(effect.mix(), 0.0);
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let params = ParameterStore::new();
        for kind in ALL {
            let mut effect = Effect::new(kind, SR).unwrap().with_param("mix", 0.0).unwrap();
            let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin() * 0.8).collect();
            let mut buffer = input.clone();
            effect.process(&mut buffer, &params);
            assert_eq!(buffer, input, "{} altered the dry signal", kind.name());
        }
    }

    #[test]
    fn test_delay_impulse_echoes() {
        let params = ParameterStore::new();
        let fb = 0.3_f32;
        let mut delay = Effect::new(EffectType::Delay, SR)
            .unwrap()
            .with_param("mix", 1.0)
            .unwrap()
            .with_param("time", 0.01)
            .unwrap();

        let d = match &delay.stage {
            Stage::Delay(inner) => inner.delay_samples(),
            _ => unreachable!(),
        };
        assert_eq!(d, 441);

        let mut buffer = vec![0.0_f32; d * 5 + 1];
        buffer[0] = 1.0;
        // Process in uneven blocks to cross buffer boundaries
        let (a, b) = buffer.split_at_mut(300);
        delay.process(a, &params);
        delay.process(b, &params);

        for k in 0..4 {
            let expected = fb.powi(k as i32);
            let got = buffer[d * (k + 1)];
            assert!(
                (got - expected).abs() < 1e-5,
                "echo {} = {}, expected {}",
                k,
                got,
                expected
            );
        }
        assert_eq!(buffer[0], 0.0);
    }

    #[test]
    fn test_distortion_blend() {
        let params = ParameterStore::new();
        let mut dist = Effect::new(EffectType::Distortion, SR).unwrap();
        let mut buffer = [0.2_f32];
        dist.process(&mut buffer, &params);

        let wet = (0.2_f64 * 5.0).tanh() * 0.7;
        let expected = (0.2 * 0.5 + wet * 0.5) as f32;
        assert!((buffer[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_chorus_pass_through_when_delay_exceeds_line() {
        let params = ParameterStore::new();
        let mut chorus = Effect::new(EffectType::Chorus, SR)
            .unwrap()
            .with_param("delay", 0.2)
            .unwrap()
            .with_param("depth", 0.0)
            .unwrap();

        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.03).sin()).collect();
        let mut buffer = input.clone();
        chorus.process(&mut buffer, &params);

        for (out, dry) in buffer.iter().zip(&input) {
            assert!((out - dry).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bound_parameter_follows_store() {
        let params = ParameterStore::new();
        params.register_atomic("drive_amount", 1.0);
        params.register_atomic("wet", 1.0);

        let mut dist = Effect::new(EffectType::Distortion, SR)
            .unwrap()
            .with_binding("drive", "drive_amount")
            .unwrap()
            .with_binding("mix", "wet")
            .unwrap();
        assert_eq!(dist.binding("drive"), Some("drive_amount"));

        let mut buffer = [0.5_f32];
        dist.process(&mut buffer, &params);
        assert_eq!(dist.param("drive").unwrap(), 1.0);
        assert_eq!(dist.mix(), 1.0);
        let expected = (0.5_f64.tanh() * 0.7) as f32;
        assert!((buffer[0] - expected).abs() < 1e-6);

        params.set("drive_amount", 3.0);
        let mut buffer = [0.5_f32];
        dist.process(&mut buffer, &params);
        assert_eq!(dist.param("drive").unwrap(), 3.0);
    }

    #[test]
    fn test_unregistered_binding_keeps_value() {
        let params = ParameterStore::new();
        let mut delay = Effect::new(EffectType::Delay, SR)
            .unwrap()
            .with_binding("time", "missing")
            .unwrap();

        let mut buffer = [0.0_f32; 16];
        delay.process(&mut buffer, &params);
        assert_eq!(delay.param("time").unwrap(), 0.25);
    }

    #[test]
    fn test_rebinding_replaces() {
        let mut delay = Effect::new(EffectType::Delay, SR).unwrap();
        delay.bind_param("time", "a").unwrap();
        delay.bind_param("time", "b").unwrap();
        assert_eq!(delay.binding("time"), Some("b"));
        assert_eq!(delay.bindings.len(), 1);
    }

    #[test]
    fn test_reset_clears_tail() {
        let params = ParameterStore::new();
        for kind in ALL {
            let mut effect = Effect::new(kind, SR).unwrap().with_param("mix", 1.0).unwrap();
            let mut buffer = vec![0.9_f32; 2048];
            effect.process(&mut buffer, &params);
            effect.reset();

            let mut silence = vec![0.0_f32; 2048];
            effect.process(&mut silence, &params);
            assert!(
                silence.iter().all(|&s| s == 0.0),
                "{} produced a tail after reset",
                kind.name()
            );
        }
    }

    #[test]
    fn test_non_finite_bound_values_ignored() {
        let params = ParameterStore::new();
        params.register_atomic("echo_feedback", 0.5);
        params.register_atomic("wet", 0.5);

        let mut delay = Effect::new(EffectType::Delay, SR)
            .unwrap()
            .with_binding("feedback", "echo_feedback")
            .unwrap()
            .with_binding("mix", "wet")
            .unwrap()
            .with_param("time", 0.01)
            .unwrap();

        let mut buffer = vec![0.0_f32; 1024];
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            params.set("echo_feedback", bad);
            params.set("wet", bad);
            buffer.iter_mut().enumerate().for_each(|(i, s)| *s = (i as f32 * 0.2).sin());
            delay.process(&mut buffer, &params);
            assert!(buffer.iter().all(|s| s.is_finite()));
        }
        assert_eq!(delay.param("feedback").unwrap(), 0.5);
        assert_eq!(delay.mix(), 0.5);

        // A finite value is picked up again on the next buffer
        params.set("echo_feedback", 0.25);
        delay.process(&mut buffer, &params);
        assert_eq!(delay.param("feedback").unwrap(), 0.25);
    }
}
