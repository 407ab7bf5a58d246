#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mischer::{AudioStream, StreamError, WideSample};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counters shared between a test and the stream under test.
#[derive(Clone, Default)]
pub struct Probe {
    pub produces: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub rates: Arc<Mutex<Vec<u32>>>,
}

impl Probe {
    pub fn produces(&self) -> usize {
        self.produces.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn rates(&self) -> Vec<u32> {
        self.rates.lock().unwrap().clone()
    }
}

/// Writes the same value to every sample, for `frames_left` frames (or forever).
pub struct Constant {
    pub value: WideSample,
    pub frames_left: Option<usize>,
    pub refuse_rate: Option<u32>,
    /// Every `configure` after this many successful ones fails
    pub configures_left: Option<usize>,
    pub probe: Probe,
}

impl Constant {
    pub fn new(value: WideSample) -> Self {
        Self {
            value,
            frames_left: None,
            refuse_rate: None,
            configures_left: None,
            probe: Probe::default(),
        }
    }

    pub fn lasting(mut self, frames: usize) -> Self {
        self.frames_left = Some(frames);
        self
    }

    pub fn refusing(mut self, rate: u32) -> Self {
        self.refuse_rate = Some(rate);
        self
    }

    pub fn configurable_times(mut self, times: usize) -> Self {
        self.configures_left = Some(times);
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl AudioStream for Constant {
    fn configure(&mut self, sample_rate: u32) -> Result<(), StreamError> {
        if self.refuse_rate == Some(sample_rate) {
            return Err(StreamError::UnsupportedRate(sample_rate));
        }
        if let Some(left) = self.configures_left.as_mut() {
            if *left == 0 {
                return Err(StreamError::Other("no longer configurable".into()));
            }
            *left -= 1;
        }
        self.probe.rates.lock().unwrap().push(sample_rate);
        Ok(())
    }

    fn produce(&mut self, buffer: &mut [WideSample], frames: usize, channels: usize) -> usize {
        self.probe.produces.fetch_add(1, Ordering::SeqCst);
        let frames = match self.frames_left.as_mut() {
            Some(left) => {
                let n = frames.min(*left);
                *left -= n;
                n
            }
            None => frames,
        };
        buffer[..frames * channels].iter_mut().for_each(|s| *s = self.value);
        frames
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}
