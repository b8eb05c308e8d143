#[macro_use]
pub mod util;

pub mod boost;
pub mod chunk;
pub mod chunk_store;
pub mod concat;
pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod parse;
pub mod pipeline;
pub mod probe;
pub mod progress_bar;
pub mod split;
pub mod target_quality;
pub mod vmaf;
pub mod worker;

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub use chunk::{Chunk, ChunkState};
pub use chunk_store::ChunkStore;
pub use concat::ConcatMethod;
pub use config::JobConfig;
pub use encoder::Encoder;
pub use error::{EncoderCrash, PipelineError};
pub use pipeline::Pipeline;
pub use target_quality::TargetQuality;
pub use worker::WorkerPool;

/// How much the pipeline is allowed to print to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
  Quiet,
  Normal,
  Verbose,
}

/// Where the splitter should look for chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitMethod {
  /// External scene-cut detector (default tool name: `pyscene`).
  SceneDetect,
  /// Cut only on keyframes already present in the source.
  KeyframeAligned,
  /// Single chunk, no splitting.
  Skip,
}

impl std::str::FromStr for SplitMethod {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pyscene" | "scene-detect" => Ok(Self::SceneDetect),
      "keyframe" | "keyframe-aligned" => Ok(Self::KeyframeAligned),
      "skip" | "none" => Ok(Self::Skip),
      other => anyhow::bail!("unknown split method: {other}"),
    }
  }
}

impl std::fmt::Display for SplitMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::SceneDetect => "pyscene",
      Self::KeyframeAligned => "keyframe",
      Self::Skip => "skip",
    })
  }
}

/// Hashes a path to a short, stable identifier used to disambiguate the
/// default temp directory (`.temp-<hash>`) across a multi-input job.
pub fn hash_path(path: &Path) -> String {
  let mut hasher = std::collections::hash_map::DefaultHasher::new();
  path.hash(&mut hasher);
  format!("{:x}", hasher.finish())
}

/// Expands directory inputs to their video-extension children, in sorted
/// order. File inputs pass through unchanged.
pub fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
  const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "mov", "avi", "flv", "m2ts", "webm", "ts"];

  let mut out = Vec::new();
  for input in inputs {
    if input.is_dir() {
      let mut children: Vec<_> = std::fs::read_dir(input)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
          path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
        })
        .collect();
      children.sort();
      out.extend(children);
    } else {
      out.push(input.clone());
    }
  }
  Ok(out)
}
