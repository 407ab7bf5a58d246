//! Master volume and the fixed-point arithmetic applied to every mixed sample.

use core::sync::atomic::{AtomicU32, Ordering};

/// Number of fractional bits in a converted volume.
pub const VOLUME_SHIFT: u32 = 16;

/// Converted volume for a semantic volume of 1.0.
pub const VOLUME_UNITY: i32 = 1 << VOLUME_SHIFT;

/// Clamp a semantic volume to `[0, 1]`. NaN is treated as silence.
#[inline]
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Convert a semantic volume to its fixed-point multiplier.
#[inline]
pub fn to_fixed(volume: f32) -> i32 {
    (clamp_volume(volume) * VOLUME_UNITY as f32).round() as i32
}

/// Multiply an accumulated sample by a converted volume and descale it.
#[inline]
pub fn scale(sample: i64, converted: i32) -> i64 {
    sample.saturating_mul(converted as i64) >> VOLUME_SHIFT
}

/// Saturate a wide sample to the signed 16-bit range.
#[inline]
pub fn clip16(sample: i64) -> i16 {
    sample.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Master volume shared between control threads and the audio thread.
///
/// Only the clamped semantic volume is stored, in one atomic word. The
/// converted multiplier is derived from it on every read, so the two can
/// never disagree.
#[derive(Debug)]
pub struct Volume {
    /// `f32` bits of the clamped semantic volume
    bits: AtomicU32,
}

impl Volume {
    pub fn new(volume: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_volume(volume).to_bits()),
        }
    }

    /// Store a new volume, returning the clamped value actually applied.
    pub fn set(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.bits.store(volume.to_bits(), Ordering::Release);
        volume
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn converted(&self) -> i32 {
        to_fixed(self.get())
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_is_lossless() {
        assert_eq!(to_fixed(1.0), VOLUME_UNITY);
        assert_eq!(scale(20_000, VOLUME_UNITY), 20_000);
        assert_eq!(scale(-20_000, VOLUME_UNITY), -20_000);
    }

    #[test]
    fn half_volume_halves() {
        let half = to_fixed(0.5);
        assert_eq!(scale(20_000, half), 10_000);
        assert_eq!(scale(-20_001, half), -10_001); // arithmetic shift rounds down
    }

    #[test]
    fn clip_saturates_both_ends() {
        assert_eq!(clip16(60_000), i16::MAX);
        assert_eq!(clip16(-60_000), i16::MIN);
        assert_eq!(clip16(32_767), 32_767);
        assert_eq!(clip16(-32_768), -32_768);
        assert_eq!(clip16(123), 123);
    }

    #[test]
    fn set_clamps_out_of_range() {
        let volume = Volume::default();
        assert_eq!(volume.set(-1.0), 0.0);
        assert_eq!(volume.get(), 0.0);
        assert_eq!(volume.converted(), 0);

        assert_eq!(volume.set(5.0), 1.0);
        assert_eq!(volume.get(), 1.0);
        assert_eq!(volume.converted(), VOLUME_UNITY);

        assert_eq!(volume.set(f32::NAN), 0.0);
    }

    #[test]
    fn concurrent_sets_stay_consistent() {
        let volume = std::sync::Arc::new(Volume::default());
        let setters: Vec<_> = [0.2f32, 0.9]
            .into_iter()
            .map(|v| {
                let volume = volume.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        volume.set(v);
                    }
                })
            })
            .collect();
        for setter in setters {
            setter.join().unwrap();
        }
        assert_eq!(volume.converted(), to_fixed(volume.get()));
    }
}
