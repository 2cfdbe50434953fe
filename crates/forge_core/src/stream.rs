//! CPAL Output Driver
//!
//! Opens an `f32` output stream on a CPAL device and forwards each period
//! to the engine's render callback.
//!
//! # Threading
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream is built,
//! driven and dropped on a dedicated `forge-audio` thread. The handle the
//! engine holds only talks to that thread over channels.
//!
//! ```text
//! engine ──StreamControl──▶ forge-audio thread ──owns──▶ cpal::Stream
//!        ◀──EngineResult───                               │ callback
//!                                                         ▼
//!                                              render(data, channels)
//! ```

use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig as CpalStreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::driver::{AudioDriver, ErrorCallback, OutputStream, RenderCallback};
use crate::error::{EngineError, EngineResult};

/// Requests from the stream handle to the audio thread
enum StreamControl {
    Play(Sender<EngineResult<()>>),
    Pause(Sender<EngineResult<()>>),
    Close,
}

/// Driver for the host's output devices via CPAL
#[derive(Debug, Clone, Default)]
pub struct CpalDriver {
    /// Output device name; `None` picks the host default
    device_name: Option<String>,
}

impl CpalDriver {
    /// Use the default output device of the default host
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device named `name`
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }
}

impl AudioDriver for CpalDriver {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_output_stream(
        &self,
        config: &StreamConfig,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> EngineResult<Box<dyn OutputStream>> {
        config.validate().map_err(EngineError::ConfigError)?;
        let stream = CpalOutputStream::spawn(
            self.device_name.clone(),
            config.clone(),
            render,
            on_error,
        )?;
        Ok(Box::new(stream))
    }
}

/// Handle to a stream living on the `forge-audio` thread
pub struct CpalOutputStream {
    control: Sender<StreamControl>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutputStream {
    fn spawn(
        device_name: Option<String>,
        config: StreamConfig,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> EngineResult<Self> {
        let (control, control_rx) = bounded::<StreamControl>(4);
        let (ready_tx, ready_rx) = bounded::<EngineResult<()>>(1);

        let thread = thread::Builder::new()
            .name("forge-audio".into())
            .spawn(move || {
                Self::audio_thread_main(device_name, config, render, on_error, control_rx, ready_tx);
            })
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(EngineError::StreamBuildError(
                "audio thread exited before the stream was built".into(),
            ))
        });

        match ready {
            Ok(()) => Ok(Self {
                control,
                thread: Some(thread),
            }),
            Err(e) => {
                // The thread returns on its own after reporting a build failure
                let _ = thread.join();
                Err(e)
            }
        }
    }

    /// Build the stream, report readiness, then serve control requests
    fn audio_thread_main(
        device_name: Option<String>,
        config: StreamConfig,
        render: RenderCallback,
        on_error: ErrorCallback,
        control: Receiver<StreamControl>,
        ready: Sender<EngineResult<()>>,
    ) {
        let stream = match Self::build_stream(device_name.as_deref(), &config, render, on_error) {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        debug!("Audio thread started");

        // Runs until Close, or until the handle is dropped
        while let Ok(request) = control.recv() {
            match request {
                StreamControl::Play(reply) => {
                    let result = stream
                        .play()
                        .map_err(|e| EngineError::StreamPlayError(e.to_string()));
                    let _ = reply.send(result);
                }
                StreamControl::Pause(reply) => {
                    let result = stream
                        .pause()
                        .map_err(|e| EngineError::StreamPauseError(e.to_string()));
                    let _ = reply.send(result);
                }
                StreamControl::Close => break,
            }
        }

        drop(stream);
        debug!("Audio thread shutting down");
    }

    fn build_stream(
        device_name: Option<&str>,
        config: &StreamConfig,
        mut render: RenderCallback,
        mut on_error: ErrorCallback,
    ) -> EngineResult<cpal::Stream> {
        let device = find_output_device(device_name)?;
        if let Ok(name) = device.name() {
            info!("Opening output stream on '{}'", name);
        }

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };
        let channels = config.channels as usize;

        device
            .build_output_stream(
                &cpal_config,
                // Real-time audio callback - NO allocations allowed here
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(data, channels);
                },
                move |err| {
                    on_error(err.to_string());
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))
    }

    /// Send a request and wait for the audio thread's answer
    fn request(
        &self,
        make: fn(Sender<EngineResult<()>>) -> StreamControl,
        lost: fn(String) -> EngineError,
    ) -> EngineResult<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.control
            .send(make(reply_tx))
            .map_err(|_| lost("audio thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| lost("audio thread is gone".into()))?
    }
}

impl OutputStream for CpalOutputStream {
    fn play(&mut self) -> EngineResult<()> {
        self.request(StreamControl::Play, EngineError::StreamPlayError)
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.request(StreamControl::Pause, EngineError::StreamPauseError)
    }
}

impl Drop for CpalOutputStream {
    fn drop(&mut self) {
        let _ = self.control.send(StreamControl::Close);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}

/// Resolve a device by name, or the host default when `name` is `None`
fn find_output_device(name: Option<&str>) -> EngineResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or(EngineError::NoDevicesFound),
        Some(name) => host
            .output_devices()
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| EngineError::DeviceNotFound(name.to_string())),
    }
}
