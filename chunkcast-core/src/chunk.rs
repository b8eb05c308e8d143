use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a chunk sits in its lifecycle. The chunk store is the only owner
/// of these transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkState {
  Pending,
  Probing,
  Encoding,
  Verified,
  Failed,
}

/// An independent encodable segment of one source job.
#[derive(Debug, Clone)]
pub struct Chunk {
  /// Stable identifier derived from the cut ordinal, e.g. `"00001"`.
  pub name: String,
  pub index: usize,
  /// Raw segment produced by the splitter.
  pub split_path: PathBuf,
  /// Target of encoding.
  pub encoded_path: PathBuf,
  /// Frame count of the split segment; authoritative.
  pub source_frames: usize,
  /// Filled in once encoding completes.
  pub encoded_frames: Option<usize>,
  pub state: ChunkState,
}

impl Chunk {
  pub fn new(index: usize, split_path: PathBuf, encoded_path: PathBuf, source_frames: usize) -> Self {
    Self {
      name: format!("{index:05}"),
      index,
      split_path,
      encoded_path,
      source_frames,
      encoded_frames: None,
      state: ChunkState::Pending,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_is_zero_padded() {
    let c = Chunk::new(7, "split/00007.mkv".into(), "encode/00007.mkv".into(), 100);
    assert_eq!(c.name, "00007");
  }

  #[test]
  fn new_chunk_starts_pending_with_no_encoded_frames() {
    let c = Chunk::new(0, "split/00000.mkv".into(), "encode/00000.mkv".into(), 50);
    assert_eq!(c.state, ChunkState::Pending);
    assert!(c.encoded_frames.is_none());
  }
}
