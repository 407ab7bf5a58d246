//! Construction-time settings for an [`AudioManager`](crate::AudioManager).

/// Settings an [`AudioManager`](crate::AudioManager) starts with.
///
/// ```
/// use mischer::MixerConfig;
///
/// let config = MixerConfig::default()
///     .with_sample_rate(44_100)
///     .with_channels(2)
///     .with_volume(0.8);
/// assert_eq!(config.sample_rate, Some(44_100));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct MixerConfig {
    /// Output rate in Hz. `None` leaves the manager unable to accept streams
    /// until [`set_sample_rate`](crate::AudioManager::set_sample_rate).
    pub sample_rate: Option<u32>,
    /// Interleaved output channels the device is opened with
    pub channels: usize,
    /// Master volume in `[0, 1]`
    pub volume: f32,
    /// Frames mixed per block; sizes the scratch buffers up front
    pub block_frames: usize,
    pub enabled: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: 2,
            volume: 1.0,
            block_frames: 1024,
            enabled: true,
        }
    }
}

impl MixerConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate).filter(|&r| r > 0);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = crate::volume::clamp_volume(volume);
        self
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
