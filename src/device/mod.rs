//! Output device bindings.
//!
//! A [`DeviceBinding`] owns whatever actually plays audio and calls the
//! mixer's [`Renderer`] from its own thread. The manager only opens, pauses,
//! resumes and closes it.

#[cfg(feature = "cpal_sink")]
mod cpal_binding;
mod manual;

#[cfg(feature = "cpal_sink")]
pub use cpal_binding::{CpalBinding, CpalDevice};
pub use manual::ManualBinding;

use crate::engine::Renderer;
use crate::error::DeviceError;

/// Something that periodically invokes the mixing callback.
///
/// When the renderer answers a non-empty request with [`HALT`](crate::HALT),
/// the binding stops playback until it is resumed or reopened.
pub trait DeviceBinding: Send {
    /// Start calling `renderer` at `sample_rate` with `channels` interleaved
    /// channels. Reopening an open binding replaces the previous output.
    fn open(&mut self, sample_rate: u32, channels: usize, renderer: Renderer) -> Result<(), DeviceError>;

    /// Stop invoking the callback until [`resume`](Self::resume).
    fn pause(&mut self) -> Result<(), DeviceError>;

    fn resume(&mut self) -> Result<(), DeviceError>;

    /// Release the output. Closing a closed binding does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
