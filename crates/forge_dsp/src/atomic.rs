//! Lock-free value cells
//!
//! `std` has no atomic floats, so values are bit-cast into an `AtomicU64`.
//! The cell is generic over the stored type so a slot holding an `f64`
//! can never be read back as anything else.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// A `Copy` value that round-trips losslessly through 64 bits
pub trait AtomicValue: Copy + Send + Sync + 'static {
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

impl AtomicValue for f64 {
    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl AtomicValue for f32 {
    #[inline]
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl AtomicValue for bool {
    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits != 0
    }
}

impl AtomicValue for u32 {
    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as u32
    }
}

impl AtomicValue for u64 {
    #[inline]
    fn to_bits(self) -> u64 {
        self
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits
    }
}

impl AtomicValue for i64 {
    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as i64
    }
}

/// Wait-free cell holding a single `T`
///
/// Loads and stores are single atomic instructions, so the audio thread can
/// read a cell without ever waiting on the control thread.
pub struct AtomicCell<T: AtomicValue> {
    bits: AtomicU64,
    _marker: PhantomData<T>,
}

impl<T: AtomicValue> AtomicCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
            _marker: PhantomData,
        }
    }

    /// Read with acquire ordering
    #[inline]
    pub fn load(&self) -> T {
        T::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Read without ordering guarantees (single-value meters, etc.)
    #[inline]
    pub fn load_relaxed(&self) -> T {
        T::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Write with release ordering
    #[inline]
    pub fn store(&self, value: T) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Write with sequentially consistent ordering
    #[inline]
    pub(crate) fn store_seq_cst(&self, value: T) {
        self.bits.store(value.to_bits(), Ordering::SeqCst);
    }

    /// Read with sequentially consistent ordering
    #[inline]
    pub(crate) fn load_seq_cst(&self) -> T {
        T::from_bits(self.bits.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn swap(&self, value: T) -> T {
        T::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel))
    }
}

impl<T: AtomicValue + Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: AtomicValue + fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.load_relaxed()).finish()
    }
}
