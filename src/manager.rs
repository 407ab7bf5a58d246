//! The caller-owned mixer: stream registration and global settings.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::MixerConfig;
use crate::device::DeviceBinding;
use crate::engine::{MixState, Renderer, Shared};
use crate::error::{MixerError, Result, StreamError};
use crate::registry::StreamRegistry;
use crate::stream::SharedStream;
use crate::volume::Volume;

type Device = Option<Box<dyn DeviceBinding>>;

/// Mixes any number of [`AudioStream`](crate::AudioStream)s into one output.
///
/// The manager owns the stream registry and the master settings. Audio is
/// produced by calling its [`Renderer`] (directly, or from a
/// [`DeviceBinding`] attached with [`with_device`](Self::with_device)).
///
/// # Example
///
/// ```
/// use mischer::{AudioManager, MixerConfig, Stream};
/// use mischer::streams::Sine;
///
/// let mixer = AudioManager::new(MixerConfig::default().with_sample_rate(48_000));
/// let tone = Stream::new(Sine::new(440.0));
/// mixer.add_stream(tone.clone()).unwrap();
///
/// let mut out = vec![0i16; 512 * 2];
/// assert_eq!(mixer.render(&mut out, 2), 512);
///
/// // the next pass drops it and calls `stop`
/// tone.mark_finished(true);
/// mixer.render(&mut out, 2);
/// assert_eq!(mixer.stream_count(), 0);
/// ```
pub struct AudioManager {
    shared: Arc<Shared>,
    channels: usize,
    /// Held for every control operation that touches the device
    device: Mutex<Device>,
}

impl AudioManager {
    /// Create a manager without an output device.
    ///
    /// Audio is produced only when [`render`](Self::render) (or a
    /// [`Renderer`]) is called.
    pub fn new(config: MixerConfig) -> Self {
        let channels = config.channels.max(1);
        let shared = Shared {
            enabled: AtomicBool::new(config.enabled),
            sample_rate: AtomicU32::new(config.sample_rate.unwrap_or(0)),
            volume: Volume::new(config.volume),
            state: Mutex::new(MixState::new(config.block_frames, channels)),
        };
        debug!(?config, "audio manager created");

        Self {
            shared: Arc::new(shared),
            channels,
            device: Mutex::new(None),
        }
    }

    /// Create a manager that plays through `device`.
    ///
    /// The device is opened right away if the config is enabled and has a
    /// sample rate.
    pub fn with_device(config: MixerConfig, device: Box<dyn DeviceBinding>) -> Result<Self> {
        let manager = Self::new(config);
        {
            let mut slot = manager.device();
            *slot = Some(device);
            manager.start_device(&mut slot)?;
        }
        Ok(manager)
    }

    fn device(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open (or resume) the device if the manager is ready to play.
    fn start_device(&self, device: &mut Device) -> Result<()> {
        let Some(device) = device.as_mut() else {
            return Ok(());
        };
        let Some(sample_rate) = self.shared.sample_rate() else {
            return Ok(());
        };
        if !self.shared.is_enabled() {
            return Ok(());
        }

        if device.is_open() {
            device.resume()?;
        } else {
            device.open(sample_rate, self.channels, self.renderer())?;
            info!(sample_rate, channels = self.channels, "output device opened");
        }
        Ok(())
    }

    /// A handle to the mixing callback.
    pub fn renderer(&self) -> Renderer {
        Renderer { shared: self.shared.clone() }
    }

    /// Run one mixing pass into `out`. See [`Renderer::render`].
    pub fn render(&self, out: &mut [i16], channels: usize) -> usize {
        self.renderer().render(out, channels)
    }

    /// Register a stream.
    ///
    /// The stream is configured at the current sample rate before it is
    /// added. Fails with [`MixerError::NotReady`] when the manager is disabled
    /// or has no sample rate, and with [`MixerError::Configure`] when the
    /// stream rejects the rate; in both cases nothing is registered.
    pub fn add_stream(&self, stream: SharedStream) -> Result<()> {
        loop {
            let sample_rate = match self.shared.sample_rate() {
                Some(rate) if self.shared.is_enabled() => rate,
                _ => return Err(MixerError::NotReady),
            };

            if self.shared.lock().registry.contains(&stream) {
                return Err(MixerError::DuplicateStream);
            }

            // Configure outside the registry lock so a slow setup never
            // stalls the audio thread.
            if let Err(e) = stream.lock().configure(sample_rate) {
                warn!(sample_rate, "stream rejected sample rate: {}", e);
                return Err(e.into());
            }

            let mut state = self.shared.lock();
            if !self.shared.is_enabled() {
                drop(state);
                stream.lock().stop();
                return Err(MixerError::NotReady);
            }
            if self.shared.sample_rate() != Some(sample_rate) {
                // rate changed while configuring; go again at the new one
                continue;
            }
            if !state.registry.insert(stream) {
                return Err(MixerError::DuplicateStream);
            }
            debug!(sample_rate, streams = state.registry.len(), "stream added");
            return Ok(());
        }
    }

    pub fn stream_count(&self) -> usize {
        self.shared.lock().registry.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    /// Gate stream registration and playback.
    ///
    /// Disabling pauses the device and makes the callback return
    /// [`HALT`](crate::HALT); enabling opens or resumes it.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut device = self.device();
        let was = self.shared.enabled.swap(enabled, Ordering::AcqRel);
        if was == enabled {
            return Ok(());
        }
        info!(enabled, "audio {}", if enabled { "enabled" } else { "disabled" });

        if enabled {
            self.start_device(&mut device)
        } else {
            match device.as_mut() {
                Some(device) if device.is_open() => device.pause().map_err(Into::into),
                _ => Ok(()),
            }
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.shared.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Change the output sample rate.
    ///
    /// Playback is paused while every registered stream is reconfigured and
    /// the device is reopened at the new rate. If a stream or the device
    /// rejects the rate, everything is rolled back to the previous rate and
    /// the error is returned.
    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(MixerError::InvalidSampleRate);
        }

        let mut device = self.device();
        let previous = self.shared.sample_rate();
        if previous == Some(sample_rate) {
            return Ok(());
        }

        let was_open = device.as_ref().map_or(false, |d| d.is_open());
        if was_open {
            if let Some(device) = device.as_mut() {
                if let Err(e) = device.pause() {
                    warn!("could not pause output before rate change: {}", e);
                }
            }
        }

        {
            let state = self.shared.lock();
            if let Err(e) = reconfigure(&state.registry, sample_rate, previous) {
                drop(state);
                self.restart_after_failure(&mut device, was_open);
                return Err(e.into());
            }
            self.shared.sample_rate.store(sample_rate, Ordering::Release);
        }

        if let Some(binding) = device.as_mut() {
            if binding.is_open() {
                binding.close();
            }
            if self.shared.is_enabled() {
                if let Err(e) = binding.open(sample_rate, self.channels, self.renderer()) {
                    warn!(sample_rate, "output device rejected sample rate: {}", e);
                    self.roll_back(&mut device, previous, sample_rate);
                    return Err(e.into());
                }
            }
        }

        info!(?previous, sample_rate, "sample rate changed");
        Ok(())
    }

    /// Undo a rate change whose device reopen failed.
    fn roll_back(&self, device: &mut Device, previous: Option<u32>, failed: u32) {
        {
            let state = self.shared.lock();
            if let Some(previous) = previous {
                if let Err(e) = reconfigure(&state.registry, previous, Some(failed)) {
                    warn!(previous, "streams could not return to previous rate: {}", e);
                }
            }
            self.shared.sample_rate.store(previous.unwrap_or(0), Ordering::Release);
        }
        if let Err(e) = self.start_device(device) {
            warn!("could not reopen output at previous rate: {}", e);
        }
    }

    fn restart_after_failure(&self, device: &mut Device, was_open: bool) {
        if !was_open || !self.shared.is_enabled() {
            return;
        }
        if let Some(device) = device.as_mut() {
            if let Err(e) = device.resume() {
                warn!("could not resume output: {}", e);
            }
        }
    }

    /// Set the master volume. Out-of-range values are clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        let applied = self.shared.volume.set(volume);
        debug!(requested = volume, applied, "volume set");
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    /// Tear everything down.
    ///
    /// Disables the manager, closes the device and stops and drops every
    /// registered stream. Safe to call more than once.
    pub fn clean_up(&self) {
        let mut device = self.device();
        self.shared.enabled.store(false, Ordering::Release);

        if let Some(device) = device.as_mut() {
            device.close();
        }

        let streams = self.shared.lock().registry.clear();
        let count = streams.len();
        for stream in streams {
            stream.lock().stop();
        }
        if count > 0 {
            info!(streams = count, "audio manager cleaned up");
        }
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        self.clean_up();
    }
}

/// Configure every registered stream at `sample_rate`.
///
/// On failure the streams already switched are sent back to `previous`.
fn reconfigure(
    registry: &StreamRegistry,
    sample_rate: u32,
    previous: Option<u32>,
) -> core::result::Result<(), StreamError> {
    let streams: Vec<&SharedStream> = registry.streams().collect();
    for (i, stream) in streams.iter().enumerate() {
        if let Err(e) = stream.lock().configure(sample_rate) {
            warn!(sample_rate, "stream failed to reconfigure: {}", e);
            if let Some(previous) = previous {
                for done in &streams[..i] {
                    if let Err(e) = done.lock().configure(previous) {
                        warn!(previous, "stream could not return to previous rate: {}", e);
                    }
                }
            }
            return Err(e);
        }
    }
    Ok(())
}
