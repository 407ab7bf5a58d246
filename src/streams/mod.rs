//! Built-in stream variants.
//!
//! - [`Sine`] - synthesized tone, optionally time-limited
//! - [`SamplePlayer`] - pre-decoded PCM at its own rate, resampled as needed
//! - [`QueueStream`] - audio pushed from another thread through a [`QueueFeeder`]
//!
//! [`LinearResampler`] is the rate converter [`SamplePlayer`] uses; it is
//! public so custom streams can reuse it.

mod player;
mod queue;
mod resampler;
mod sine;

pub use player::SamplePlayer;
pub use queue::{queue, QueueFeeder, QueueStream};
pub use resampler::LinearResampler;
pub use sine::Sine;
