//! A binding driven by hand, for tests and offline rendering.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::DeviceBinding;
use crate::engine::{Renderer, HALT};
use crate::error::DeviceError;

#[derive(Default)]
struct ManualState {
    renderer: Option<Renderer>,
    sample_rate: u32,
    channels: usize,
    paused: bool,
    opens: usize,
    refuse_rates: Vec<u32>,
}

/// A [`DeviceBinding`] whose callback runs only when [`pull`](Self::pull)
/// is called.
///
/// Clones share state, so keep one clone to drive the mixer after handing
/// the other to [`AudioManager::with_device`](crate::AudioManager::with_device).
///
/// ```
/// use mischer::{AudioManager, ManualBinding, MixerConfig};
///
/// let binding = ManualBinding::new();
/// let mixer = AudioManager::with_device(
///     MixerConfig::default().with_sample_rate(48_000),
///     Box::new(binding.clone()),
/// ).unwrap();
///
/// let (frames, buffer) = binding.pull(256).unwrap();
/// assert_eq!(frames, 256);
/// assert!(buffer.iter().all(|&s| s == 0));
/// # drop(mixer);
/// ```
#[derive(Clone, Default)]
pub struct ManualBinding {
    state: Arc<Mutex<ManualState>>,
}

impl ManualBinding {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one callback for `frames` frames.
    ///
    /// Returns the callback's result and the interleaved output, or `None`
    /// if the binding is closed or paused. A [`HALT`] answer to a non-empty
    /// request pauses the binding, like a device stopping playback.
    pub fn pull(&self, frames: usize) -> Option<(usize, Vec<i16>)> {
        let (renderer, channels) = {
            let state = self.state();
            if state.paused {
                return None;
            }
            (state.renderer.clone()?, state.channels)
        };

        let mut buffer = vec![0; frames * channels];
        let written = renderer.render(&mut buffer, channels);
        if written == HALT && frames > 0 {
            let mut state = self.state();
            // a close or reopen in the meantime wins
            if state.renderer.is_some() {
                state.paused = true;
            }
        }
        Some((written, buffer))
    }

    /// Make every later `open` at `sample_rate` fail.
    pub fn refuse_rate(&self, sample_rate: u32) {
        self.state().refuse_rates.push(sample_rate);
    }

    /// Rate of the last successful `open`.
    pub fn sample_rate(&self) -> Option<u32> {
        let state = self.state();
        state.renderer.as_ref().map(|_| state.sample_rate)
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// How many times `open` succeeded.
    pub fn open_count(&self) -> usize {
        self.state().opens
    }
}

impl DeviceBinding for ManualBinding {
    fn open(&mut self, sample_rate: u32, channels: usize, renderer: Renderer) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.refuse_rates.contains(&sample_rate) {
            return Err(DeviceError::UnsupportedConfig { sample_rate, channels });
        }
        state.renderer = Some(renderer);
        state.sample_rate = sample_rate;
        state.channels = channels;
        state.paused = false;
        state.opens += 1;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.renderer.is_none() {
            return Err(DeviceError::Closed);
        }
        state.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.renderer.is_none() {
            return Err(DeviceError::Closed);
        }
        state.paused = false;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.renderer = None;
        state.paused = false;
    }

    fn is_open(&self) -> bool {
        self.state().renderer.is_some()
    }
}
