//! Pre-decoded sample player.

use crate::error::StreamError;
use crate::stream::{AudioStream, WideSample};
use crate::streams::LinearResampler;

/// Most source channels a player accepts.
const MAX_CHANNELS: usize = 8;

/// Plays interleaved 16-bit PCM that is already in memory.
///
/// The samples keep their native rate; when the mixer runs at a different
/// rate the player resamples on the fly. Source channels wrap onto output
/// channels, so mono plays on every output.
///
/// # Example
///
/// ```
/// use mischer::{AudioManager, MixerConfig, Stream};
/// use mischer::streams::SamplePlayer;
///
/// let pcm: Vec<i16> = (0..22_050).map(|i| ((i % 100) * 100) as i16).collect();
/// let player = Stream::new(SamplePlayer::new(pcm, 1, 22_050));
///
/// let mixer = AudioManager::new(MixerConfig::default().with_sample_rate(44_100));
/// mixer.add_stream(player).unwrap();
/// ```
pub struct SamplePlayer {
    samples: Vec<i16>,
    channels: usize,
    sample_rate: u32,
    /// Next source frame
    position: usize,
    looping: bool,
    resampler: Option<LinearResampler>,
}

impl SamplePlayer {
    /// Create a player from interleaved samples at `sample_rate`.
    pub fn new(samples: Vec<i16>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            position: 0,
            looping: false,
            resampler: None,
        }
    }

    /// Restart from the beginning instead of finishing.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    #[inline]
    pub fn position_secs(&self) -> f64 {
        self.position as f64 / self.sample_rate.max(1) as f64
    }
}

/// Copy the source frame at `*position` into `frame`, advancing or wrapping.
fn read_frame(
    samples: &[i16],
    channels: usize,
    looping: bool,
    position: &mut usize,
    frame: &mut [WideSample],
) -> bool {
    let total = samples.len() / channels;
    if *position >= total {
        if !looping || total == 0 {
            return false;
        }
        *position = 0;
    }

    let start = *position * channels;
    for (dst, &src) in frame.iter_mut().zip(&samples[start..start + channels]) {
        *dst = src as WideSample;
    }
    *position += 1;
    true
}

impl AudioStream for SamplePlayer {
    fn configure(&mut self, sample_rate: u32) -> Result<(), StreamError> {
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(StreamError::InvalidFormat("unsupported channel count"));
        }
        if self.sample_rate == 0 || sample_rate == 0 {
            return Err(StreamError::UnsupportedRate(sample_rate));
        }

        self.resampler = if self.sample_rate == sample_rate {
            None
        } else {
            Some(LinearResampler::new(self.channels, self.sample_rate, sample_rate))
        };
        Ok(())
    }

    fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize {
        let SamplePlayer { samples, channels: src_channels, looping, position, resampler, .. } = self;
        let src_channels = *src_channels;
        let looping = *looping;

        let mut frame = [0 as WideSample; MAX_CHANNELS];
        let frame = &mut frame[..src_channels];
        let mut written = 0;

        for out in buffer.chunks_exact_mut(channels).take(frames) {
            let ok = match resampler.as_mut() {
                Some(resampler) => resampler.next_frame(frame, |f| {
                    read_frame(samples, src_channels, looping, position, f)
                }),
                None => read_frame(samples, src_channels, looping, position, frame),
            };
            if !ok {
                break;
            }

            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = frame[ch % src_channels];
            }
            written += 1;
        }

        written
    }

    fn stop(&mut self) {
        self.resampler = None;
        self.position = 0;
    }
}
