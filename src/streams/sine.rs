//! Sine wave synthesizer stream

use crate::error::StreamError;
use crate::stream::{AudioStream, WideSample};

/// A sine oscillator, written identically to every output channel.
pub struct Sine {
    frequency: f32,
    /// Peak as a fraction of 16-bit full scale
    amplitude: f32,
    phase: f32,
    phase_inc: f32,
    sample_rate: u32,
    /// Length in seconds; `None` plays forever
    duration: Option<f64>,
    frames_played: u64,
}

impl Sine {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency: frequency.max(0.0),
            amplitude: 0.25, // -12dB, safe default
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate: 0,
            duration: None,
            frames_played: 0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Stop producing after `secs` seconds of output.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs.max(0.0));
        self
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency.max(0.0);
        if self.sample_rate > 0 {
            self.phase_inc = self.frequency / self.sample_rate as f32;
        }
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    fn frames_left(&self) -> u64 {
        match self.duration {
            Some(secs) => {
                let total = (secs * self.sample_rate as f64).round() as u64;
                total.saturating_sub(self.frames_played)
            }
            None => u64::MAX,
        }
    }
}

impl AudioStream for Sine {
    fn configure(&mut self, sample_rate: u32) -> Result<(), StreamError> {
        if sample_rate == 0 {
            return Err(StreamError::UnsupportedRate(sample_rate));
        }
        if self.sample_rate > 0 && self.sample_rate != sample_rate {
            // keep the elapsed time, not the elapsed frame count
            self.frames_played = self.frames_played * sample_rate as u64 / self.sample_rate as u64;
        }
        self.sample_rate = sample_rate;
        self.phase_inc = self.frequency / sample_rate as f32;
        Ok(())
    }

    fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize {
        let frames = (frames as u64).min(self.frames_left()) as usize;
        let peak = self.amplitude * i16::MAX as f32;

        for frame in buffer.chunks_exact_mut(channels).take(frames) {
            let sample = ((self.phase * core::f32::consts::TAU).sin() * peak) as WideSample;
            frame.iter_mut().for_each(|s| *s = sample);

            self.phase += self.phase_inc;
            // Branchless phase wrap (phase is always positive)
            self.phase -= (self.phase >= 1.0) as u32 as f32;
        }

        self.frames_played += frames as u64;
        frames
    }

    fn stop(&mut self) {
        self.phase = 0.0;
        self.frames_played = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_channel() {
        let mut sine = Sine::new(1_000.0).with_amplitude(1.0);
        sine.configure(8_000).unwrap();

        let mut buffer = vec![0; 8 * 2];
        assert_eq!(sine.produce(&mut buffer, 8, 2), 8);
        for frame in buffer.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert_eq!(buffer[0], 0);
        // quarter period at 1kHz / 8kHz is frame 2
        assert!(buffer[4] > 32_000);
    }

    #[test]
    fn duration_exhausts() {
        let mut sine = Sine::new(440.0).with_duration(0.001);
        sine.configure(8_000).unwrap();

        let mut buffer = vec![0; 16];
        assert_eq!(sine.produce(&mut buffer, 16, 1), 8);
        assert_eq!(sine.produce(&mut buffer, 16, 1), 0);

        sine.stop();
        assert_eq!(sine.produce(&mut buffer, 4, 1), 4);
    }

    #[test]
    fn rejects_zero_rate() {
        let mut sine = Sine::new(440.0);
        assert_eq!(sine.configure(0), Err(StreamError::UnsupportedRate(0)));
    }
}
