//! Mischer - a real-time stream mixer
//!
//! Any number of independently driven [`AudioStream`]s are registered with an
//! [`AudioManager`]. On every output callback the manager pulls a block from
//! each stream, sums them in wide integers, applies the master volume and
//! clips the result to 16 bits.
//!
//! - Streams are shared with the mixer through [`Stream`] and removed by the
//!   mixer itself once they finish or run dry
//! - The audio thread only takes the registry lock; volume is a single
//!   atomic word
//! - Output devices are pluggable [`DeviceBinding`]s (cpal behind the
//!   `cpal_sink` feature)

mod config;
mod device;
mod engine;
mod error;
mod manager;
mod registry;
mod stream;
mod volume;
pub mod streams;

pub use config::MixerConfig;
pub use device::{DeviceBinding, ManualBinding};
#[cfg(feature = "cpal_sink")]
pub use device::{CpalBinding, CpalDevice};
pub use engine::{Renderer, HALT};
pub use error::{DeviceError, MixerError, Result, StreamError};
pub use manager::AudioManager;
pub use stream::{AudioStream, SharedStream, Stream, WideSample};
pub use volume::{clip16, VOLUME_SHIFT, VOLUME_UNITY};
