//! Engine Events
//!
//! Events flow from the engine (and the driver's error callback) to whoever
//! embeds it, over a crossbeam channel drained with `AudioEngine::poll_event`.

use serde::{Deserialize, Serialize};

/// Events sent from the audio engine to the control side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Engine started successfully
    Started,

    /// Engine stopped
    Stopped,

    /// Control-side failure (for example a rejected start)
    Error { message: String },

    /// Runtime error reported by the driver while the stream was open
    StreamError { message: String },
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }

    /// Create a stream error event from any error type
    pub fn stream_error<E: std::fmt::Display>(err: E) -> Self {
        Event::StreamError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::stream_error("device unplugged");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StreamError"));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&Event::Started).unwrap();
        assert_eq!(json, r#"{"type":"Started"}"#);
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("Test error message");
        if let Event::Error { message } = event {
            assert_eq!(message, "Test error message");
        } else {
            panic!("Should be Error variant");
        }
    }
}
