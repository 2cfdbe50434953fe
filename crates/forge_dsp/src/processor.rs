//! Audio Processor Trait
//!
//! Defines the interface shared by everything that transforms the mix
//! buffer in place (filters and effects), so a chain of them can be driven
//! uniformly: oscillator mix -> filter chain -> effect chain.

use crate::params::ParameterStore;

/// Trait for in-place processors in the signal chain
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no blocking locks)
/// - Parameter reads go through lock-free store slots only
/// - O(n) time where n = buffer length
///
/// Violating these rules causes audio dropouts ("glitches").
pub trait AudioProcessor: Send {
    /// Process a mono buffer in-place
    ///
    /// Bound parameters are read from `params` once, at the top of the call.
    fn process(&mut self, buffer: &mut [f32], params: &ParameterStore);

    /// Clear internal state (delay lines, filter history, LFO phase)
    fn reset(&mut self);

    /// Human-readable name for logging/UI
    fn name(&self) -> &'static str;
}

/// Run `buffer` through each processor in order
#[inline]
pub fn process_chain<P: AudioProcessor>(
    processors: &mut [P],
    buffer: &mut [f32],
    params: &ParameterStore,
) {
    for processor in processors.iter_mut() {
        processor.process(buffer, params);
    }
}

/// Reset every processor in a chain
pub fn reset_chain<P: AudioProcessor>(processors: &mut [P]) {
    for processor in processors.iter_mut() {
        processor.reset();
    }
}
