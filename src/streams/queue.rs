//! A stream fed from another thread through a lock-free ring buffer.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::StreamError;
use crate::stream::{AudioStream, WideSample};

/// Create a connected feeder/stream pair holding up to `capacity_frames`
/// frames of `channels` samples.
///
/// The feeder is pushed from any one thread; the stream half goes to the
/// mixer. Dropping the feeder ends the stream once the queue is drained.
///
/// ```
/// use mischer::{AudioManager, MixerConfig, Stream};
/// use mischer::streams::queue;
///
/// let mixer = AudioManager::new(MixerConfig::default().with_sample_rate(48_000));
/// let (mut feeder, stream) = queue(2, 4096);
/// mixer.add_stream(Stream::new(stream)).unwrap();
///
/// assert_eq!(feeder.sample_rate(), Some(48_000));
/// assert_eq!(feeder.push(&[1000, -1000, 2000, -2000]), 2);
/// ```
pub fn queue(channels: usize, capacity_frames: usize) -> (QueueFeeder, QueueStream) {
    let channels = channels.max(1);
    let (producer, consumer) = RingBuffer::new(capacity_frames.max(1) * channels);
    let sample_rate = Arc::new(AtomicU32::new(0));

    (
        QueueFeeder {
            producer,
            channels,
            sample_rate: sample_rate.clone(),
        },
        QueueStream {
            consumer,
            channels,
            sample_rate,
            underruns: 0,
        },
    )
}

/// Producer half of a [`queue`].
pub struct QueueFeeder {
    producer: Producer<WideSample>,
    channels: usize,
    sample_rate: Arc<AtomicU32>,
}

impl QueueFeeder {
    /// Push as many whole interleaved frames from `samples` as fit.
    ///
    /// Returns the number of frames queued.
    pub fn push(&mut self, samples: &[WideSample]) -> usize {
        let frames = (samples.len() / self.channels).min(self.free_frames());
        for &sample in &samples[..frames * self.channels] {
            // cannot fail: free space was counted above and this is the only producer
            let _ = self.producer.push(sample);
        }
        frames
    }

    /// Frames that can be pushed right now.
    #[inline]
    pub fn free_frames(&self) -> usize {
        self.producer.slots() / self.channels
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Rate the mixer configured the stream at, once it has.
    pub fn sample_rate(&self) -> Option<u32> {
        match self.sample_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    /// `true` once the stream half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Consumer half of a [`queue`]; register it with the mixer.
///
/// Plays silence when the feeder falls behind and reports exhaustion once
/// the feeder is gone and every queued frame has been played.
pub struct QueueStream {
    consumer: Consumer<WideSample>,
    channels: usize,
    sample_rate: Arc<AtomicU32>,
    underruns: u64,
}

impl QueueStream {
    /// Passes that ran out of queued audio while the feeder was alive.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }
}

impl AudioStream for QueueStream {
    fn configure(&mut self, sample_rate: u32) -> Result<(), StreamError> {
        if sample_rate == 0 {
            return Err(StreamError::UnsupportedRate(sample_rate));
        }
        self.sample_rate.store(sample_rate, Ordering::Release);
        Ok(())
    }

    fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize {
        let available = self.consumer.slots() / self.channels;
        let mut frame = [0 as WideSample; 8];
        let src_channels = self.channels.min(frame.len());

        let mut written = 0;
        for out in buffer.chunks_exact_mut(channels).take(frames.min(available)) {
            for ch in 0..self.channels {
                let sample = self.consumer.pop().unwrap_or(0);
                if ch < src_channels {
                    frame[ch] = sample;
                }
            }
            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = frame[ch % src_channels];
            }
            written += 1;
        }

        if written == frames {
            return written;
        }
        if self.consumer.is_abandoned() && self.consumer.is_empty() {
            return written;
        }

        // feeder is alive but behind: pad with silence
        self.underruns += 1;
        buffer[written * channels..frames * channels]
            .iter_mut()
            .for_each(|s| *s = 0);
        frames
    }

    fn stop(&mut self) {
        let pending = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(pending) {
            chunk.commit_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_queued_frames() {
        let (mut feeder, mut stream) = queue(2, 16);
        stream.configure(48_000).unwrap();
        assert_eq!(feeder.push(&[1, 2, 3, 4]), 2);

        let mut buffer = vec![0; 4];
        assert_eq!(stream.produce(&mut buffer, 2, 2), 2);
        assert_eq!(buffer, vec![1, 2, 3, 4]);
    }

    #[test]
    fn underrun_pads_silence() {
        let (mut feeder, mut stream) = queue(1, 16);
        stream.configure(48_000).unwrap();
        feeder.push(&[5]);

        let mut buffer = vec![9; 3];
        assert_eq!(stream.produce(&mut buffer, 3, 1), 3);
        assert_eq!(buffer, vec![5, 0, 0]);
        assert_eq!(stream.underruns(), 1);
    }

    #[test]
    fn drained_and_abandoned_is_exhausted() {
        let (mut feeder, mut stream) = queue(1, 16);
        stream.configure(48_000).unwrap();
        feeder.push(&[5, 6]);
        drop(feeder);

        let mut buffer = vec![0; 4];
        assert_eq!(stream.produce(&mut buffer, 4, 1), 2);
        assert_eq!(stream.produce(&mut buffer, 4, 1), 0);
    }

    #[test]
    fn push_is_bounded_by_capacity() {
        let (mut feeder, _stream) = queue(2, 2);
        assert_eq!(feeder.push(&[1, 1, 2, 2, 3, 3]), 2);
        assert_eq!(feeder.free_frames(), 0);
    }

    #[test]
    fn stop_discards_pending() {
        let (mut feeder, mut stream) = queue(1, 8);
        stream.configure(48_000).unwrap();
        feeder.push(&[1, 2, 3]);
        stream.stop();

        let mut buffer = vec![7; 1];
        assert_eq!(stream.produce(&mut buffer, 1, 1), 1);
        assert_eq!(buffer, vec![0]);
    }
}
