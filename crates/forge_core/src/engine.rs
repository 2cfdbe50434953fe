//! Audio Engine - Main Entry Point
//!
//! The AudioEngine owns the parameter store and the signal chain, manages
//! the output stream lifecycle and renders audio for the driver.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── control thread ────────────────────────┐
//! │ params().set(..)      add_oscillator / add_filter / add_effect │
//! │        │                         │ ChainWriter (rtrb)          │
//! │        │ atomic slots            │            start / stop     │
//! └────────┼─────────────────────────┼────────────────┼────────────┘
//!          ▼                         ▼                ▼
//! ┌──────────────────────── audio thread ──────────────────────────┐
//! │ driver callback ─▶ RenderState::render_interleaved             │
//! │   running? ── no ──▶ silence                                   │
//! │      │ yes                                                     │
//! │   apply_pending ─▶ oscillators ─▶ filters ─▶ effects ─▶ limit  │
//! │              (Zero allocation in this path)                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! State machine: `Stopped -> Running` on a successful `start`,
//! `Running -> Stopped` on `stop`. A failed `start` leaves the engine
//! stopped with nothing open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use forge_dsp::{Effect, Filter, Oscillator, ParameterStore, Waveform};

use crate::chain::{signal_chain, ChainCommand, ChainWriter, SignalChain};
use crate::config::EngineConfig;
use crate::driver::{AudioDriver, ErrorCallback, OutputStream, RenderCallback};
use crate::error::{EngineError, EngineResult};
use crate::message::Event;

/// Store key the default oscillator follows
pub const OSC1_FREQUENCY: &str = "osc1_frequency";
/// Store key for the default filter cutoff
pub const FILTER_FREQUENCY: &str = "filter_frequency";
/// Store key for the default filter resonance
pub const FILTER_RESONANCE: &str = "filter_resonance";

/// State shared between the engine and the render callback
struct RenderState {
    running: AtomicBool,
    chain: Mutex<SignalChain>,
    params: Arc<ParameterStore>,
}

impl RenderState {
    /// Render planar output, one slice per channel
    ///
    /// # Real-time Safety
    /// The chain lock is only ever tried; if another render holds it the
    /// period is silent rather than blocked.
    fn render_planar(&self, outputs: &mut [&mut [f32]]) {
        if !self.running.load(Ordering::Acquire) {
            silence_planar(outputs);
            return;
        }
        let Some(mut chain) = self.chain.try_lock() else {
            silence_planar(outputs);
            return;
        };
        chain.apply_pending();

        let frames = outputs.iter().map(|ch| ch.len()).max().unwrap_or(0);
        let block = chain.max_frames();
        let mut start = 0;
        while start < frames {
            let end = (start + block).min(frames);
            let mix = chain.render(end - start, &self.params);
            for channel in outputs.iter_mut() {
                if channel.len() <= start {
                    continue;
                }
                let stop = end.min(channel.len());
                for (out, &sample) in channel[start..stop].iter_mut().zip(mix) {
                    *out = output_sample(sample);
                }
            }
            start = end;
        }
    }

    /// Render an interleaved buffer with `channels` samples per frame
    fn render_interleaved(&self, data: &mut [f32], channels: usize) {
        if channels == 0 || !self.running.load(Ordering::Acquire) {
            data.fill(0.0);
            return;
        }
        let Some(mut chain) = self.chain.try_lock() else {
            data.fill(0.0);
            return;
        };
        chain.apply_pending();

        let frames = data.len() / channels;
        let block = chain.max_frames();
        let mut start = 0;
        while start < frames {
            let end = (start + block).min(frames);
            let mix = chain.render(end - start, &self.params);
            let out = &mut data[start * channels..end * channels];
            for (frame, &sample) in out.chunks_exact_mut(channels).zip(mix) {
                frame.fill(output_sample(sample));
            }
            start = end;
        }
        // Samples of a trailing partial frame
        data[frames * channels..].fill(0.0);
    }
}

/// Final safety net before the device: NaN becomes silence, the rest is
/// limited to full scale
#[inline]
fn output_sample(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}

fn silence_planar(outputs: &mut [&mut [f32]]) {
    for channel in outputs.iter_mut() {
        channel.fill(0.0);
    }
}

/// The synthesis engine
///
/// All methods take `&self`; the engine can be shared between threads.
pub struct AudioEngine {
    /// Current configuration
    config: EngineConfig,

    /// Shared with the driver's render callback
    render: Arc<RenderState>,

    /// Control-side end of the chain command queue
    writer: Mutex<ChainWriter>,

    /// Open output stream while running
    stream: Mutex<Option<Box<dyn OutputStream>>>,

    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,
}

impl AudioEngine {
    /// Create an engine with the default configuration and default patch
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the default patch
    ///
    /// The patch is a 440 Hz sine (amplitude 0.3) following
    /// `osc1_frequency`, into a 1 kHz low-pass (Q 0.7) following
    /// `filter_frequency` and `filter_resonance`.
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        let engine = Self::empty(config)?;
        let sample_rate = engine.config.sample_rate();

        let params = engine.params();
        params.register_atomic(OSC1_FREQUENCY, 440.0);
        params.register_atomic(FILTER_FREQUENCY, 1000.0);
        params.register_atomic(FILTER_RESONANCE, 0.7);

        engine.add_oscillator(
            Oscillator::new(Waveform::Sine, 440.0, 0.3, sample_rate)
                .with_frequency_param(OSC1_FREQUENCY),
        )?;
        engine.add_filter(
            Filter::low_pass(1000.0, 0.7, sample_rate)
                .with_frequency_param(FILTER_FREQUENCY)
                .with_resonance_param(FILTER_RESONANCE),
        )?;

        // Nothing renders yet, so apply the patch right away
        engine.render.chain.lock().apply_pending();
        Ok(engine)
    }

    /// Create an engine with an empty chain
    pub fn empty(config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let (writer, chain) = signal_chain(&config);
        let (event_sender, event_receiver) = unbounded::<Event>();

        debug!(
            "Engine created: {} Hz, {} channels, {} frame buffers",
            config.stream.sample_rate, config.stream.channels, config.stream.buffer_size
        );

        Ok(Self {
            render: Arc::new(RenderState {
                running: AtomicBool::new(false),
                chain: Mutex::new(chain),
                params: Arc::new(ParameterStore::new()),
            }),
            writer: Mutex::new(writer),
            stream: Mutex::new(None),
            event_sender,
            event_receiver,
            config,
        })
    }

    /// Append an oscillator to the chain
    pub fn add_oscillator(&self, oscillator: Oscillator) -> EngineResult<()> {
        let name = oscillator.waveform().name();
        let frequency = oscillator.frequency();
        self.writer
            .lock()
            .push(ChainCommand::AddOscillator(oscillator))?;
        info!("Added {} oscillator at {:.1} Hz", name, frequency);
        Ok(())
    }

    /// Append a filter to the chain
    pub fn add_filter(&self, filter: Filter) -> EngineResult<()> {
        let name = filter.filter_type().name();
        let frequency = filter.frequency();
        let resonance = filter.resonance();
        self.writer.lock().push(ChainCommand::AddFilter(filter))?;
        info!(
            "Added {} filter at {:.1} Hz (Q {:.2})",
            name, frequency, resonance
        );
        Ok(())
    }

    /// Append an effect to the chain
    pub fn add_effect(&self, effect: Effect) -> EngineResult<()> {
        let name = effect.effect_type().name();
        let mix = effect.mix();
        self.writer.lock().push(ChainCommand::AddEffect(effect))?;
        info!("Added {} effect (mix {:.2})", name, mix);
        Ok(())
    }

    /// Queue a reset of every component's running state
    pub fn reset_chain(&self) -> EngineResult<()> {
        self.writer.lock().push(ChainCommand::Reset)
    }

    /// Open a stream on `driver` and start rendering
    ///
    /// Fails with `AlreadyRunning` while running. If opening or starting
    /// the stream fails, whatever was opened is closed again and the engine
    /// stays stopped.
    pub fn start(&self, driver: &dyn AudioDriver) -> EngineResult<()> {
        let mut slot = self.stream.lock();
        if slot.is_some() {
            warn!("Engine already running");
            return Err(EngineError::AlreadyRunning);
        }

        info!(
            "Starting audio engine on {} ({} Hz, {} frames, ~{:.1} ms)",
            driver.name(),
            self.config.stream.sample_rate,
            self.config.stream.buffer_size,
            self.config.stream.latency_ms()
        );

        let render_state = Arc::clone(&self.render);
        let render: RenderCallback = Box::new(move |data: &mut [f32], channels: usize| {
            render_state.render_interleaved(data, channels);
        });

        let err_sender = self.event_sender.clone();
        let on_error: ErrorCallback = Box::new(move |message: String| {
            let _ = err_sender.try_send(Event::StreamError { message });
        });

        let mut stream = match driver.open_output_stream(&self.config.stream, render, on_error) {
            Ok(stream) => stream,
            Err(e) => return Err(self.startup_failed(e)),
        };

        self.render.running.store(true, Ordering::Release);
        if let Err(e) = stream.play() {
            self.render.running.store(false, Ordering::Release);
            drop(stream);
            return Err(self.startup_failed(e));
        }

        *slot = Some(stream);
        let _ = self.event_sender.send(Event::Started);
        info!("Audio engine started");
        Ok(())
    }

    fn startup_failed(&self, err: EngineError) -> EngineError {
        warn!("Failed to start audio engine: {}", err);
        let _ = self.event_sender.send(Event::error(&err));
        err
    }

    /// Stop rendering and close the stream; does nothing when stopped
    pub fn stop(&self) {
        let Some(mut stream) = self.stream.lock().take() else {
            debug!("Engine not running");
            return;
        };

        info!("Stopping audio stream");
        self.render.running.store(false, Ordering::Release);
        if let Err(e) = stream.pause() {
            warn!("Failed to pause stream: {}", e);
        }
        drop(stream);

        let _ = self.event_sender.send(Event::Stopped);
    }

    /// Check if engine is currently running
    pub fn is_running(&self) -> bool {
        self.render.running.load(Ordering::Acquire)
    }

    /// Render planar output buffers, one slice per channel
    ///
    /// Writes silence when stopped; otherwise the same mono mix goes to
    /// every channel. Each output sample is hard-limited to `[-1, 1]` (a NaN
    /// is written as `0.0`), so an overdriven patch clips instead of
    /// exceeding full scale.
    ///
    /// Channels shorter than the longest one receive its leading frames.
    pub fn process_audio(&self, outputs: &mut [&mut [f32]]) {
        self.render.render_planar(outputs);
    }

    /// Render an interleaved buffer with `channels` samples per frame
    ///
    /// Same limiting as [`process_audio`](Self::process_audio); samples of
    /// a trailing partial frame are zeroed.
    pub fn process_interleaved(&self, data: &mut [f32], channels: usize) {
        self.render.render_interleaved(data, channels);
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Shared parameter store
    pub fn params(&self) -> Arc<ParameterStore> {
        Arc::clone(&self.render.params)
    }

    /// Get current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Oscillators accepted into the chain (applied or still queued)
    pub fn oscillator_count(&self) -> usize {
        self.writer.lock().oscillator_count()
    }

    pub fn filter_count(&self) -> usize {
        self.writer.lock().filter_count()
    }

    pub fn effect_count(&self) -> usize {
        self.writer.lock().effect_count()
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
