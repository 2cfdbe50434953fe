//! Audio Driver Interface
//!
//! The engine does not talk to hardware itself. A driver opens an output
//! stream and calls the render callback once per period; the engine only
//! fills the buffers it is handed.
//!
//! ```text
//! AudioEngine::start(driver)
//!   └─ driver.open_output_stream(config, render, on_error) ─▶ OutputStream
//!        ├─ play()   starts periodic render(data, channels) calls
//!        ├─ pause()  stops them
//!        └─ drop     closes the stream and releases the device
//! ```

use crate::config::StreamConfig;
use crate::error::EngineResult;

/// Per-period render callback: interleaved `f32` buffer plus channel count
///
/// # Real-time Safety
/// Called on the driver's audio thread. Must fill every sample, must not
/// block and must not allocate.
pub type RenderCallback = Box<dyn FnMut(&mut [f32], usize) + Send + 'static>;

/// Runtime error callback (device lost, underrun reported by the host, ...)
pub type ErrorCallback = Box<dyn FnMut(String) + Send + 'static>;

/// An open output stream; closed when dropped
pub trait OutputStream: Send {
    /// Start (or resume) periodic render callbacks
    fn play(&mut self) -> EngineResult<()>;

    /// Stop render callbacks without closing the stream
    fn pause(&mut self) -> EngineResult<()>;
}

/// Something that can open output streams
pub trait AudioDriver {
    /// Human-readable driver name for logging
    fn name(&self) -> &str;

    /// Open (but do not start) an output stream
    ///
    /// On error nothing may be left open.
    fn open_output_stream(
        &self,
        config: &StreamConfig,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> EngineResult<Box<dyn OutputStream>>;
}
