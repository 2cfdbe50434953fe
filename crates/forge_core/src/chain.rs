//! Signal Chain
//!
//! The chain is owned by the audio side. Control threads never touch it;
//! they queue [`ChainCommand`]s through a [`ChainWriter`] and the render
//! path applies them at the top of the next period.
//!
//! # Architecture
//!
//! ```text
//! control thread                              audio thread
//! ──────────────                              ────────────
//! ChainWriter::push ──rtrb (bounded SPSC)──▶ SignalChain::apply_pending
//!   (capacity checks)                          │
//!                                              ▼
//!                      oscillators ──sum──▶ mix ──▶ filters ──▶ effects
//! ```
//!
//! All vectors and scratch buffers are allocated up front at the configured
//! capacities, so applying a command or rendering a block never allocates.

use rtrb::{Consumer, Producer, RingBuffer};

use forge_dsp::{process_chain, reset_chain, Effect, Filter, Oscillator, ParameterStore};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Chain membership changes, sent from control to audio thread
#[derive(Debug)]
pub enum ChainCommand {
    AddOscillator(Oscillator),
    AddFilter(Filter),
    AddEffect(Effect),
    /// Clear every component's running state (phase, history, delay lines)
    Reset,
}

/// Create the writer/chain pair for `config`
pub(crate) fn signal_chain(config: &EngineConfig) -> (ChainWriter, SignalChain) {
    let (producer, consumer) = RingBuffer::new(config.command_capacity);
    let writer = ChainWriter {
        producer,
        oscillators: 0,
        filters: 0,
        effects: 0,
        max_oscillators: config.max_oscillators,
        max_filters: config.max_filters,
        max_effects: config.max_effects,
    };
    let chain = SignalChain {
        commands: consumer,
        oscillators: Vec::with_capacity(config.max_oscillators),
        filters: Vec::with_capacity(config.max_filters),
        effects: Vec::with_capacity(config.max_effects),
        mix: vec![0.0; config.max_frames],
        scratch: vec![0.0; config.max_frames],
    };
    (writer, chain)
}

/// Control-side handle; tracks accepted components against the capacities
pub struct ChainWriter {
    producer: Producer<ChainCommand>,
    oscillators: usize,
    filters: usize,
    effects: usize,
    max_oscillators: usize,
    max_filters: usize,
    max_effects: usize,
}

impl ChainWriter {
    /// Queue a command for the audio thread
    ///
    /// Fails with `ChainFull` when the component would exceed its capacity
    /// and with `QueueFull` when the audio side has not drained the queue.
    pub fn push(&mut self, command: ChainCommand) -> EngineResult<()> {
        match &command {
            ChainCommand::AddOscillator(_) => {
                check_capacity("oscillator", self.oscillators, self.max_oscillators)?
            }
            ChainCommand::AddFilter(_) => check_capacity("filter", self.filters, self.max_filters)?,
            ChainCommand::AddEffect(_) => check_capacity("effect", self.effects, self.max_effects)?,
            ChainCommand::Reset => {}
        }

        let counter = match &command {
            ChainCommand::AddOscillator(_) => Some(&mut self.oscillators),
            ChainCommand::AddFilter(_) => Some(&mut self.filters),
            ChainCommand::AddEffect(_) => Some(&mut self.effects),
            ChainCommand::Reset => None,
        };

        self.producer
            .push(command)
            .map_err(|_| EngineError::QueueFull)?;

        if let Some(count) = counter {
            *count += 1;
        }
        Ok(())
    }

    pub fn oscillator_count(&self) -> usize {
        self.oscillators
    }

    pub fn filter_count(&self) -> usize {
        self.filters
    }

    pub fn effect_count(&self) -> usize {
        self.effects
    }
}

fn check_capacity(kind: &'static str, count: usize, capacity: usize) -> EngineResult<()> {
    if count >= capacity {
        Err(EngineError::ChainFull { kind, capacity })
    } else {
        Ok(())
    }
}

/// Audio-side chain: components in processing order plus scratch buffers
pub struct SignalChain {
    commands: Consumer<ChainCommand>,
    oscillators: Vec<Oscillator>,
    filters: Vec<Filter>,
    effects: Vec<Effect>,
    mix: Vec<f32>,
    scratch: Vec<f32>,
}

impl SignalChain {
    /// Apply every queued command
    ///
    /// # Real-time Safety
    /// Vectors were allocated at full capacity and the writer never accepts
    /// more components than that, so pushes never reallocate.
    pub fn apply_pending(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                ChainCommand::AddOscillator(osc) => {
                    debug_assert!(self.oscillators.len() < self.oscillators.capacity());
                    self.oscillators.push(osc);
                }
                ChainCommand::AddFilter(filter) => {
                    debug_assert!(self.filters.len() < self.filters.capacity());
                    self.filters.push(filter);
                }
                ChainCommand::AddEffect(effect) => {
                    debug_assert!(self.effects.len() < self.effects.capacity());
                    self.effects.push(effect);
                }
                ChainCommand::Reset => self.reset(),
            }
        }
    }

    /// Longest block [`render`](Self::render) accepts
    pub fn max_frames(&self) -> usize {
        self.mix.len()
    }

    /// Render `frames` mono samples; `frames` is capped at `max_frames`
    ///
    /// Oscillators are summed into the mix buffer, then the mix runs
    /// through every filter and then every effect, in chain order.
    pub fn render(&mut self, frames: usize, params: &ParameterStore) -> &[f32] {
        let frames = frames.min(self.mix.len());
        let mix = &mut self.mix[..frames];
        let scratch = &mut self.scratch[..frames];

        mix.fill(0.0);
        for osc in self.oscillators.iter_mut() {
            osc.generate(scratch, params);
            for (out, sample) in mix.iter_mut().zip(scratch.iter()) {
                *out += *sample;
            }
        }

        process_chain(&mut self.filters, mix, params);
        process_chain(&mut self.effects, mix, params);

        &self.mix[..frames]
    }

    pub fn reset(&mut self) {
        for osc in self.oscillators.iter_mut() {
            osc.reset();
        }
        reset_chain(&mut self.filters);
        reset_chain(&mut self.effects);
    }

    pub fn oscillators(&self) -> &[Oscillator] {
        &self.oscillators
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}
