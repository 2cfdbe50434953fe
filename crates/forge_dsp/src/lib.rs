//! Forge DSP - Signal Generation and Processing
//!
//! This crate provides the building blocks of the Forge synthesis chain:
//! - Lock-free parameter store shared by the control and audio threads
//! - Phase-accumulator oscillators (sine, square, sawtooth, triangle, noise)
//! - Resonant RBJ biquad filters
//! - Delay, distortion, chorus and bit-crusher effects with dry/wet mix
//!
//! # Architecture
//!
//! ```text
//! control thread                      audio thread
//! ──────────────                      ────────────
//! ParameterStore::set ──► atomic slot ──► Oscillator::generate
//!                                      ──► Filter::process  (AudioProcessor)
//!                                      ──► Effect::process  (AudioProcessor)
//! ```
//!
//! Everything on the audio side follows a strict "no allocation in audio
//! callback" rule: delay lines and filter state are sized at construction,
//! and bound parameters are read from atomic slots once per buffer.

mod atomic;
mod effects;
mod error;
mod filter;
mod oscillator;
mod params;
mod processor;

pub use atomic::{AtomicCell, AtomicValue};
pub use effects::{
    BitCrusher, Chorus, Delay, Distortion, Effect, EffectType, CHORUS_BUFFER_SECONDS,
    MAX_DELAY_SECONDS, MIX_PARAM,
};
pub use error::{DspError, DspResult};
pub use filter::{Filter, FilterType, MAX_RESONANCE, MIN_RESONANCE};
pub use oscillator::{NoiseGenerator, Oscillator, Waveform, DEFAULT_NOISE_SEED};
pub use params::{ParameterStore, Smoother, SMOOTHING_THRESHOLD};
pub use processor::{process_chain, reset_chain, AudioProcessor};
