//! CPAL device discovery and the cpal-backed binding.
//!
//! # Example
//!
//! ```no_run
//! use mischer::{AudioManager, CpalDevice, MixerConfig};
//!
//! for device in CpalDevice::list_outputs() {
//!     println!("{} ({} Hz, {} ch)", device.name(), device.sample_rate(), device.channels());
//! }
//!
//! let device = CpalDevice::default_output().expect("no output device");
//! let config = MixerConfig::default()
//!     .with_sample_rate(device.sample_rate())
//!     .with_channels(device.channels() as usize);
//! let mixer = AudioManager::with_device(config, Box::new(device.binding())).unwrap();
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, Thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, warn};

use crate::device::DeviceBinding;
use crate::engine::{Renderer, HALT};
use crate::error::DeviceError;

/// A discovered audio output device.
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    /// The system default output, or `None` if there is none.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        Self::describe(host.default_output_device()?)
    }

    /// Every output device that reports a default config.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::describe).collect())
            .unwrap_or_default()
    }

    fn describe(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// A closed binding for this device.
    pub fn binding(&self) -> CpalBinding {
        CpalBinding::new(self.device.clone())
    }
}

/// Frames converted per render call for non-i16 outputs.
const CONVERT_FRAMES: usize = 1024;

#[derive(Clone, Copy, Debug)]
enum Command {
    Play,
    Pause,
    Close,
}

impl Command {
    fn queue_full(self) -> DeviceError {
        let reason = "device command queue is full".to_string();
        match self {
            Command::Play => DeviceError::Play(reason),
            Command::Pause => DeviceError::Pause(reason),
            Command::Close => DeviceError::Closed,
        }
    }
}

/// Raised from the cpal callback when the mixer answers with [`HALT`].
struct HaltSignal {
    raised: AtomicBool,
    worker: Thread,
}

impl HaltSignal {
    fn raise(&self) {
        if !self.raised.swap(true, Ordering::AcqRel) {
            self.worker.unpark();
        }
    }

    fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

struct Worker {
    commands: Producer<Command>,
    thread: JoinHandle<()>,
}

/// Plays the mixer through a cpal output stream.
///
/// cpal streams are not `Send` on every host, so the stream lives on its own
/// thread and is steered through a small command ring.
pub struct CpalBinding {
    device: cpal::Device,
    worker: Option<Worker>,
}

impl CpalBinding {
    pub fn new(device: cpal::Device) -> Self {
        Self { device, worker: None }
    }

    fn send(&mut self, command: Command) -> Result<(), DeviceError> {
        let worker = self.worker.as_mut().ok_or(DeviceError::Closed)?;
        worker
            .commands
            .push(command)
            .map_err(|_| command.queue_full())?;
        worker.thread.thread().unpark();
        Ok(())
    }

    fn sample_format(&self, sample_rate: u32, channels: usize) -> Result<SampleFormat, DeviceError> {
        let unsupported = DeviceError::UnsupportedConfig { sample_rate, channels };
        let configs = self
            .device
            .supported_output_configs()
            .map_err(|_| unsupported.clone())?;

        let mut formats: Vec<SampleFormat> = configs
            .filter(|c| {
                c.channels() as usize == channels
                    && c.min_sample_rate().0 <= sample_rate
                    && sample_rate <= c.max_sample_rate().0
            })
            .map(|c| c.sample_format())
            .collect();

        // prefer formats we can hand over without conversion
        formats.sort_by_key(|f| match f {
            SampleFormat::I16 => 0,
            SampleFormat::F32 => 1,
            SampleFormat::U16 => 2,
            _ => 3,
        });
        match formats.first() {
            Some(f @ (SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16)) => Ok(*f),
            _ => Err(unsupported),
        }
    }
}

impl DeviceBinding for CpalBinding {
    fn open(&mut self, sample_rate: u32, channels: usize, renderer: Renderer) -> Result<(), DeviceError> {
        self.close();

        let sample_format = self.sample_format(sample_rate, channels)?;
        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = RingBuffer::<Command>::new(16);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let device = self.device.clone();
        let thread = thread::spawn(move || {
            run_stream(device, config, sample_format, renderer, consumer, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(sample_rate, channels, ?sample_format, "cpal output opened");
                self.worker = Some(Worker { commands: producer, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DeviceError::Build("output thread exited early".into()))
            }
        }
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        self.send(Command::Pause)
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        self.send(Command::Play)
    }

    fn close(&mut self) {
        let Some(Worker { mut commands, thread }) = self.worker.take() else {
            return;
        };
        if commands.push(Command::Close).is_err() {
            debug!("command queue full; closing by abandoning it");
        }
        // an abandoned queue also ends the worker
        drop(commands);
        thread.thread().unpark();
        if thread.join().is_err() {
            warn!("cpal output thread panicked");
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for CpalBinding {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of the output thread: build, play, then obey commands until closed.
fn run_stream(
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    renderer: Renderer,
    mut commands: Consumer<Command>,
    ready: mpsc::SyncSender<Result<(), DeviceError>>,
) {
    let halt = Arc::new(HaltSignal {
        raised: AtomicBool::new(false),
        worker: thread::current(),
    });
    let stream = match build_stream(&device, &config, sample_format, renderer, halt.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(DeviceError::Build(e.to_string())));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(DeviceError::Play(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    loop {
        thread::park();
        // before commands, so a resume queued after the halt wins
        if halt.take() {
            debug!("mixer halted; pausing cpal output");
            if let Err(e) = stream.pause() {
                warn!("could not pause halted cpal stream: {}", e);
            }
        }
        while let Ok(command) = commands.pop() {
            let result = match command {
                Command::Play => stream.play().map_err(|e| e.to_string()),
                Command::Pause => stream.pause().map_err(|e| e.to_string()),
                Command::Close => return,
            };
            if let Err(e) = result {
                warn!(?command, "cpal stream command failed: {}", e);
            }
        }
        if commands.is_abandoned() {
            return;
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    renderer: Renderer,
    halt: Arc<HaltSignal>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = config.channels as usize;
    let on_error = |err: cpal::StreamError| error!("cpal stream error: {:?}", err);

    match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _| {
                let written = renderer.render(data, channels);
                if written == HALT && data.len() >= channels {
                    halt.raise();
                }
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => {
            let mut mixed = vec![0i16; CONVERT_FRAMES * channels];
            device.build_output_stream(
                config,
                move |data: &mut [f32], _| {
                    render_converted(&renderer, &halt, &mut mixed, data, channels, |s| s as f32 / 32768.0);
                },
                on_error,
                None,
            )
        }
        SampleFormat::U16 => {
            let mut mixed = vec![0i16; CONVERT_FRAMES * channels];
            device.build_output_stream(
                config,
                move |data: &mut [u16], _| {
                    render_converted(&renderer, &halt, &mut mixed, data, channels, |s| (s as i32 + 32768) as u16);
                },
                on_error,
                None,
            )
        }
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}

/// Render through the preallocated i16 buffer `mixed`, one slice of `data`
/// at a time, converting each sample with `convert`.
fn render_converted<T>(
    renderer: &Renderer,
    halt: &HaltSignal,
    mixed: &mut [i16],
    data: &mut [T],
    channels: usize,
    convert: impl Fn(i16) -> T,
) {
    for chunk in data.chunks_mut(mixed.len()) {
        let mixed = &mut mixed[..chunk.len()];
        if renderer.render(mixed, channels) == HALT && chunk.len() >= channels {
            halt.raise();
        }
        for (out, &s) in chunk.iter_mut().zip(mixed.iter()) {
            *out = convert(s);
        }
    }
}
