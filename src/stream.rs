//! Core stream trait and the shared shell the mixer holds streams through.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::error::StreamError;

/// One wide sample. Streams write these and the mixer accumulates them.
///
/// Values are expected in the 16-bit range; the extra headroom lets a stream
/// overshoot without wrapping before the final clip.
pub type WideSample = i32;

/// The core trait for audio producers.
///
/// A stream moves through a small lifecycle driven by the mixer:
/// - [`configure`](Self::configure) prepares it for the mixer's sample rate
///   (and is called again whenever that rate changes)
/// - [`produce`](Self::produce) is called once per mixing pass
/// - [`stop`](Self::stop) releases transient state when the stream leaves
///   the mixer; the owner may configure and add it again afterwards
///
/// # Example
///
/// ```
/// use mischer::{AudioStream, StreamError, WideSample};
///
/// struct Dc {
///     level: WideSample,
/// }
///
/// impl AudioStream for Dc {
///     fn configure(&mut self, _sample_rate: u32) -> Result<(), StreamError> {
///         Ok(())
///     }
///
///     fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize {
///         buffer[..frames * channels].iter_mut().for_each(|s| *s = self.level);
///         frames
///     }
///
///     fn stop(&mut self) {}
/// }
/// ```
pub trait AudioStream: Send + 'static {
    /// Prepare to produce audio at `sample_rate`.
    ///
    /// May be called repeatedly with different rates.
    fn configure(&mut self, sample_rate: u32) -> Result<(), StreamError>;

    /// Write up to `frames` interleaved frames of `channels` samples into
    /// `buffer` and return the number of frames written.
    ///
    /// Returning 0 means the stream is exhausted: the mixer stops it and
    /// drops it from the registry. Must not block.
    fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize;

    /// Release transient state. Must not touch the finished flag.
    fn stop(&mut self);
}

/// Shared shell around an [`AudioStream`].
///
/// Holds the end-of-life flag next to the locked producer so any thread can
/// raise it without contending with the audio thread.
pub struct Stream<S: ?Sized> {
    finished: AtomicBool,
    inner: Mutex<S>,
}

/// A stream as the registry stores it.
pub type SharedStream = Arc<Stream<dyn AudioStream>>;

impl<S: AudioStream> Stream<S> {
    /// Wrap a producer so it can be shared with the mixer.
    ///
    /// The returned `Arc` coerces to [`SharedStream`].
    pub fn new(source: S) -> Arc<Self> {
        Arc::new(Self {
            finished: AtomicBool::new(false),
            inner: Mutex::new(source),
        })
    }
}

impl<S: ?Sized> Stream<S> {
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Mark the stream as finished.
    ///
    /// The flag is monotonic: this always sets it, whatever `_flag` says.
    pub fn mark_finished(&self, _flag: bool) {
        self.finished.store(true, Ordering::Release);
    }

    /// Lock the producer for exclusive access.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the producer without waiting. `None` if someone else holds it.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, S>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
