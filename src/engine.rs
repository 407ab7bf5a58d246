//! The mixing pass run by the output callback.
//!
//! Each pass pulls every registered stream into a scratch buffer, sums the
//! results into a wide accumulator, applies the master volume and clips to
//! 16 bits. Streams that finished or ran dry during the pass are removed and
//! stopped once all of them have been visited.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::registry::StreamRegistry;
use crate::stream::WideSample;
use crate::volume::{clip16, scale, Volume};

/// Frames returned by [`Renderer::render`] to ask the device to stop playback.
pub const HALT: usize = 0;

/// Everything the registry lock protects.
pub(crate) struct MixState {
    pub(crate) registry: StreamRegistry,
    /// Per-block sums, one per frame x channel
    accum: Vec<i64>,
    /// Where a single stream writes before it is summed
    scratch: Vec<WideSample>,
}

impl MixState {
    /// Preallocate for `block_frames` frames of `channels` channels, so a pass
    /// at or below that width never allocates.
    pub fn new(block_frames: usize, channels: usize) -> Self {
        let samples = block_frames.max(1) * channels.max(1);
        Self {
            registry: StreamRegistry::with_capacity(16),
            accum: vec![0; samples],
            scratch: vec![0; samples],
        }
    }

    /// Mix into `out` (interleaved, `channels` wide). Returns frames written.
    pub fn mix(&mut self, out: &mut [i16], channels: usize, converted_volume: i32) -> usize {
        let frames = out.len() / channels;
        if frames == 0 {
            out.iter_mut().for_each(|s| *s = 0);
            return 0;
        }

        if self.scratch.len() < channels {
            // wider than anything configured; only happens if the device lies about channels
            self.scratch.resize(channels, 0);
            self.accum.resize(channels, 0);
        }
        let block = (self.scratch.len() / channels) * channels;

        let (mixed, rest) = out.split_at_mut(frames * channels);
        for chunk in mixed.chunks_mut(block) {
            self.mix_block(chunk, channels, converted_volume);
        }
        rest.iter_mut().for_each(|s| *s = 0);

        self.registry.retire_marked();
        frames
    }

    fn mix_block(&mut self, out: &mut [i16], channels: usize, converted_volume: i32) {
        let MixState { registry, accum, scratch } = self;
        let samples = out.len();
        let frames = samples / channels;

        let accum = &mut accum[..samples];
        accum.iter_mut().for_each(|s| *s = 0);

        for (stream, retired) in registry.active_mut() {
            if stream.is_finished() {
                *retired = true;
                continue;
            }

            // Owner is holding the stream; it sits this block out.
            let Some(mut source) = stream.try_lock() else {
                continue;
            };

            let scratch = &mut scratch[..samples];
            let produced = source.produce(scratch, frames, channels).min(frames);
            if produced == 0 {
                *retired = true;
                continue;
            }

            for (acc, &sample) in accum.iter_mut().zip(&scratch[..produced * channels]) {
                *acc = acc.saturating_add(sample as i64);
            }
        }

        for (out, &acc) in out.iter_mut().zip(accum.iter()) {
            *out = clip16(scale(acc, converted_volume));
        }
    }
}

/// State shared between the manager and the audio thread.
pub(crate) struct Shared {
    pub(crate) enabled: AtomicBool,
    /// 0 until a rate is established
    pub(crate) sample_rate: AtomicU32,
    pub(crate) volume: Volume,
    pub(crate) state: Mutex<MixState>,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, MixState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn sample_rate(&self) -> Option<u32> {
        match self.sample_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// The mixing callback, handed to a [`DeviceBinding`](crate::DeviceBinding).
///
/// Cheap to clone; every clone drives the same manager.
#[derive(Clone)]
pub struct Renderer {
    pub(crate) shared: Arc<Shared>,
}

impl Renderer {
    /// Fill `out` with one mixing pass.
    ///
    /// `out` is interleaved with `channels` samples per frame. Returns the
    /// number of frames written, or [`HALT`] when the manager is disabled or
    /// has no sample rate; in that case `out` is silenced and the device
    /// should stop playback.
    pub fn render(&self, out: &mut [i16], channels: usize) -> usize {
        if channels == 0 || !self.shared.is_enabled() || self.shared.sample_rate().is_none() {
            out.iter_mut().for_each(|s| *s = 0);
            return HALT;
        }

        let converted = self.shared.volume.converted();
        self.shared.lock().mix(out, channels, converted)
    }
}
