//! Feedback delay line

/// Longest delay the line can hold, in seconds
pub const MAX_DELAY_SECONDS: f64 = 1.0;

const MAX_FEEDBACK: f64 = 0.99;

/// Mono feedback delay
///
/// The wet signal is the sample read `delay_samples` behind the write head;
/// the line is fed `input + delayed * feedback`, so each echo is the previous
/// one scaled by `feedback`.
#[derive(Debug, Clone)]
pub struct Delay {
    line: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    time: f64,
    feedback: f64,
    delay_samples: usize,
}

impl Delay {
    pub const PARAMS: &'static [&'static str] = &["time", "feedback"];

    pub fn new(sample_rate: f64) -> Self {
        let len = ((sample_rate * MAX_DELAY_SECONDS) as usize).max(1);
        let mut delay = Self {
            line: vec![0.0; len],
            write_pos: 0,
            sample_rate,
            time: 0.25,
            feedback: 0.3,
            delay_samples: 0,
        };
        delay.update_delay_samples();
        delay
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn feedback(&self) -> f64 {
        self.feedback
    }

    /// Current delay in whole samples, after clamping to the line length
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Set the delay time in seconds; non-finite values are ignored
    pub fn set_time(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.time = seconds.max(0.0);
            self.update_delay_samples();
        }
    }

    /// Set the regeneration amount, clamped to `[0, 0.99]`; non-finite
    /// values are ignored
    pub fn set_feedback(&mut self, feedback: f64) {
        if feedback.is_finite() {
            self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
        }
    }

    fn update_delay_samples(&mut self) {
        // `as` saturates, so an overflowing product lands on the line end
        let samples = (self.time * self.sample_rate).floor() as usize;
        self.delay_samples = samples.min(self.line.len() - 1);
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> bool {
        match key {
            "time" => self.set_time(value),
            "feedback" => self.set_feedback(value),
            _ => return false,
        }
        true
    }

    pub(crate) fn get(&self, key: &str) -> Option<f64> {
        match key {
            "time" => Some(self.time),
            "feedback" => Some(self.feedback),
            _ => None,
        }
    }

    /// Advance one sample, returning the wet (delayed) signal
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        let len = self.line.len();
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        let delayed = self.line[read_pos];

        self.line[self.write_pos] = input + delayed * self.feedback as f32;
        self.write_pos = (self.write_pos + 1) % len;

        delayed
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.write_pos = 0;
    }
}
