//! Brightness-based quantizer boost: dark chunks get a lower (higher
//! quality) quantizer, proportional to how far below the brightness
//! threshold they are. Probes brightness via an external `ffmpeg
//! -vf signalstats` subprocess (`probe::average_luma`), never by decoding
//! pixels in-process.

use crate::probe::average_luma;
use crate::Chunk;

const BOOST_THRESHOLD: f32 = 50.0;

/// Returns the quantizer-lowering delta to apply to `chunk`'s base
/// quantizer, or `None` if the chunk is bright enough not to need it.
///
/// `limit` caps how much the quantizer may be lowered; `range` is the luma
/// deficit (threshold minus measured average) at which the full `limit` is
/// reached. The scaling is linear between 0 and `range`.
pub fn boost_low_luma(chunk: &Chunk, limit: i32, range: i32) -> Option<i32> {
  let luma = average_luma(&chunk.split_path).ok()?;
  if luma >= BOOST_THRESHOLD {
    return None;
  }
  Some(boosted_delta(BOOST_THRESHOLD - luma, limit, range))
}

fn boosted_delta(deficit: f32, limit: i32, range: i32) -> i32 {
  if range <= 0 || limit <= 0 {
    return 0;
  }
  let fraction = (deficit / range as f32).clamp(0.0, 1.0);
  (fraction * limit as f32).round() as i32
}

/// Applies a boost delta to a base quantizer, clamping to the encoder's
/// valid range `[min_q, max_q]`.
pub fn apply_boost(base_q: u32, delta: i32, min_q: u32, max_q: u32) -> u32 {
  let boosted = (base_q as i64 - delta as i64).clamp(min_q as i64, max_q as i64);
  boosted as u32
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_boost_at_or_above_threshold() {
    assert_eq!(boosted_delta(0.0, 10, 15), 0);
  }

  #[test]
  fn full_boost_at_or_beyond_range() {
    assert_eq!(boosted_delta(15.0, 10, 15), 10);
    assert_eq!(boosted_delta(30.0, 10, 15), 10);
  }

  #[test]
  fn scales_linearly_within_range() {
    // scenario 5: threshold 50, luma 40 -> deficit 10, range 15, limit 10
    assert_eq!(boosted_delta(10.0, 10, 15), 7);
  }

  #[test]
  fn apply_boost_clamps_to_valid_range() {
    assert_eq!(apply_boost(25, 10, 15, 50), 15);
    assert_eq!(apply_boost(25, 50, 15, 50), 15);
  }
}
