//! Drive-into-tanh saturation
//!
//! The input is scaled by `drive` and passed through `tanh`, which is linear
//! near zero and approaches +/-1 smoothly, then scaled by `level`.

/// Stateless waveshaper
#[derive(Debug, Clone)]
pub struct Distortion {
    drive: f64,
    level: f64,
}

impl Distortion {
    pub const PARAMS: &'static [&'static str] = &["drive", "level"];

    pub fn new() -> Self {
        Self {
            drive: 5.0,
            level: 0.7,
        }
    }

    pub fn drive(&self) -> f64 {
        self.drive
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn set_drive(&mut self, drive: f64) {
        if drive.is_finite() {
            self.drive = drive.max(0.0);
        }
    }

    pub fn set_level(&mut self, level: f64) {
        if level.is_finite() {
            self.level = level.max(0.0);
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> bool {
        match key {
            "drive" => self.set_drive(value),
            "level" => self.set_level(value),
            _ => return false,
        }
        true
    }

    pub(crate) fn get(&self, key: &str) -> Option<f64> {
        match key {
            "drive" => Some(self.drive),
            "level" => Some(self.level),
            _ => None,
        }
    }

    /// Shape one sample, returning the wet signal
    #[inline]
    pub fn tick(&self, input: f32) -> f32 {
        ((input as f64 * self.drive).tanh() * self.level) as f32
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}
