//! Per-stream sample rate conversion.

use crate::stream::WideSample;

/// Linear-interpolating rate converter over interleaved frames.
///
/// Frames are pulled from the source on demand, so one converter can sit in
/// front of anything that hands out frames one at a time. Good enough for
/// game audio and previews; swap in a sinc converter for anything critical.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    /// Input frames advanced per output frame
    step: f64,
    /// Fractional position between `prev` and `curr`
    position: f64,
    prev: Vec<WideSample>,
    curr: Vec<WideSample>,
    primed: bool,
}

impl LinearResampler {
    pub fn new(channels: usize, input_rate: u32, output_rate: u32) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            step: input_rate as f64 / output_rate.max(1) as f64,
            position: 0.0,
            prev: vec![0; channels],
            curr: vec![0; channels],
            primed: false,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Input frames consumed per output frame.
    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Produce one output frame into `out`.
    ///
    /// `pull` fills a source frame and returns `false` once the source is
    /// dry. Returns `false` when no frame could be produced.
    pub fn next_frame(
        &mut self,
        out: &mut [WideSample],
        mut pull: impl FnMut(&mut [WideSample]) -> bool,
    ) -> bool {
        if !self.primed {
            if !pull(&mut self.curr) {
                return false;
            }
            self.prev.copy_from_slice(&self.curr);
            if !pull(&mut self.curr) {
                return false;
            }
            self.primed = true;
        }

        while self.position >= 1.0 {
            self.position -= 1.0;
            self.prev.copy_from_slice(&self.curr);
            if !pull(&mut self.curr) {
                return false;
            }
        }

        let t = self.position;
        for ((out, &prev), &curr) in out.iter_mut().zip(&self.prev).zip(&self.curr) {
            *out = prev + (t * (curr - prev) as f64).round() as WideSample;
        }

        self.position += self.step;
        true
    }

    /// Forget all history, as if freshly created.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.primed = false;
        self.prev.iter_mut().for_each(|s| *s = 0);
        self.curr.iter_mut().for_each(|s| *s = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(resampler: &mut LinearResampler, input: &[WideSample], frames: usize) -> Vec<WideSample> {
        let mut source = input.iter().copied();
        let mut out = Vec::new();
        let mut frame = [0];
        for _ in 0..frames {
            let ok = resampler.next_frame(&mut frame, |f| match source.next() {
                Some(s) => {
                    f[0] = s;
                    true
                }
                None => false,
            });
            if !ok {
                break;
            }
            out.push(frame[0]);
        }
        out
    }

    #[test]
    fn equal_rates_pass_through() {
        let mut r = LinearResampler::new(1, 48_000, 48_000);
        let out = ramp(&mut r, &[0, 100, 200, 300, 400], 10);
        assert_eq!(out, vec![0, 100, 200, 300]);
    }

    #[test]
    fn upsampling_interpolates() {
        let mut r = LinearResampler::new(1, 24_000, 48_000);
        let out = ramp(&mut r, &[0, 100, 200], 4);
        assert_eq!(out, vec![0, 50, 100, 150]);
    }

    #[test]
    fn downsampling_skips() {
        let mut r = LinearResampler::new(1, 96_000, 48_000);
        let out = ramp(&mut r, &[0, 10, 20, 30, 40, 50], 10);
        assert_eq!(out, vec![0, 20, 40]);
    }

    #[test]
    fn reset_reprimes() {
        let mut r = LinearResampler::new(1, 48_000, 48_000);
        ramp(&mut r, &[5, 6, 7], 2);
        r.reset();
        let out = ramp(&mut r, &[1, 2, 3], 2);
        assert_eq!(out, vec![1, 2]);
    }
}
