//! Engine and Stream Configuration

use serde::{Deserialize, Serialize};

/// Audio stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of output channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Buffer size in frames (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for this configuration
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Number of interleaved samples in one buffer
    pub fn samples_per_buffer(&self) -> usize {
        self.buffer_size as usize * self.channels as usize
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.buffer_size < 32 || self.buffer_size > 8192 {
            return Err(format!("Invalid buffer size: {}", self.buffer_size));
        }
        Ok(())
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream configuration
    pub stream: StreamConfig,

    /// Scratch buffer length in frames; longer callbacks are rendered in chunks
    pub max_frames: usize,

    /// Chain capacities, preallocated so adding a component never allocates
    /// on the audio thread
    pub max_oscillators: usize,
    pub max_filters: usize,
    pub max_effects: usize,

    /// Slots in the control -> audio chain command queue
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            max_frames: 2048,
            max_oscillators: 8,
            max_filters: 4,
            max_effects: 8,
            command_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128, // ~2.7ms latency
            },
            max_frames: 512,
            ..Self::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 44100,
                channels: 2,
                buffer_size: 1024, // ~23ms latency
            },
            max_frames: 4096,
            ..Self::default()
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.stream.sample_rate as f64
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.stream.validate()?;
        if self.max_frames == 0 {
            return Err("max_frames must be at least 1".to_string());
        }
        if self.max_oscillators == 0 || self.max_filters == 0 || self.max_effects == 0 {
            return Err(format!(
                "Invalid chain capacities: {} oscillators, {} filters, {} effects",
                self.max_oscillators, self.max_filters, self.max_effects
            ));
        }
        if self.command_capacity == 0 {
            return Err("command_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
