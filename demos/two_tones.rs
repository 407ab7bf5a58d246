//! Play two tones through the default output, then fade the mix out.
//!
//! Run with: cargo run --example two_tones --features cpal_sink

use std::thread::sleep;
use std::time::Duration;

use mischer::streams::Sine;
use mischer::{AudioManager, CpalDevice, MixerConfig, Stream};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let device = CpalDevice::default_output().ok_or("no output device found")?;
    info!(name = device.name(), rate = device.sample_rate(), "using output");

    let config = MixerConfig::default()
        .with_sample_rate(device.sample_rate())
        .with_channels(device.channels() as usize);
    let mixer = AudioManager::with_device(config, Box::new(device.binding()))?;

    let low = Stream::new(Sine::new(220.0).with_amplitude(0.3));
    mixer.add_stream(low.clone())?;
    sleep(Duration::from_secs(1));

    mixer.add_stream(Stream::new(Sine::new(330.0).with_amplitude(0.3).with_duration(2.0)))?;
    sleep(Duration::from_secs(2));

    for step in (0..=20).rev() {
        mixer.set_volume(step as f32 / 20.0);
        sleep(Duration::from_millis(50));
    }

    low.mark_finished(true);
    mixer.clean_up();
    Ok(())
}
