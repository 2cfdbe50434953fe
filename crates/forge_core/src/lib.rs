//! Forge Core - Synthesis Engine
//!
//! This crate turns the `forge_dsp` building blocks into a running engine:
//! - Signal chain orchestration (oscillators -> filters -> effects)
//! - Stream lifecycle against a pluggable audio driver (CPAL by default)
//! - Lock-free communication between control and audio threads
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │  params().set ──▶ ParameterStore ◀── add_* ──▶ ChainWriter  │
//! └─────────────────────────────────────────────────────────────┘
//!            │ atomic slots                 │ rtrb
//!            ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   driver ──▶ SignalChain ──▶ mono mix ──▶ every channel     │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//!            │ crossbeam-channel
//!            ▼
//!         Event (Started / Stopped / Error / StreamError)
//! ```

mod chain;
mod config;
mod device;
mod driver;
mod engine;
mod error;
mod message;
mod stream;

pub use chain::{ChainCommand, ChainWriter, SignalChain};
pub use config::{EngineConfig, StreamConfig};
pub use device::OutputDevice;
pub use driver::{AudioDriver, ErrorCallback, OutputStream, RenderCallback};
pub use engine::{AudioEngine, FILTER_FREQUENCY, FILTER_RESONANCE, OSC1_FREQUENCY};
pub use error::{EngineError, EngineResult};
pub use message::Event;
pub use stream::{CpalDriver, CpalOutputStream};

// Re-export DSP types for convenience
pub use forge_dsp::{
    AudioProcessor, DspError, Effect, EffectType, Filter, FilterType, Oscillator, ParameterStore,
    Waveform,
};
