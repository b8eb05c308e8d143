//! Typed, immutable job configuration.
//!
//! A [`JobConfig`] is assembled once at startup from three layers, lowest
//! precedence first: built-in [`JobConfig::default`], an optional JSON
//! config file, then CLI flags. CLI flags always win on conflict. Nothing
//! downstream mutates a `JobConfig` in place; it is handed around by shared
//! reference.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::concat::ConcatMethod;
use crate::encoder::Encoder;
use crate::{PipelineError, SplitMethod, Verbosity};

/// The subset of configuration the optional config file persists. Mirrors
/// the four keys documented in the on-disk layout: `video_params`,
/// `encoder`, `ffmpeg`, `audio_params`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
  #[serde(default)]
  pub video_params: Option<Vec<String>>,
  #[serde(default)]
  pub encoder: Option<Encoder>,
  #[serde(default)]
  pub ffmpeg: Option<Vec<String>>,
  #[serde(default)]
  pub audio_params: Option<Vec<String>>,
}

impl ConfigFile {
  /// Reads the config file at `path` if present, otherwise writes `fallback`
  /// to it and returns a clone of `fallback`. Matches the teacher's
  /// config-file round-trip (read if present, write-from-current if not).
  pub fn load_or_write(path: &Path, fallback: &ConfigFile) -> anyhow::Result<ConfigFile> {
    if path.exists() {
      let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading config file {path:?}: {e}"))?;
      let parsed: ConfigFile = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parsing config file {path:?}: {e}"))?;
      Ok(parsed)
    } else {
      let text = serde_json::to_string_pretty(fallback)?;
      fs::write(path, text).map_err(|e| anyhow::anyhow!("writing config file {path:?}: {e}"))?;
      Ok(fallback.clone())
    }
  }
}

/// Every operator input plus resolved defaults, built once at startup and
/// handed by reference to every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct JobConfig {
  // Paths
  pub inputs: Vec<PathBuf>,
  pub output: Option<PathBuf>,
  pub temp: Option<PathBuf>,
  pub scenes_file: Option<PathBuf>,
  pub config_file: Option<PathBuf>,

  // Encoder identity and parameters
  pub encoder: Encoder,
  pub video_params: Vec<String>,
  pub passes: u8,
  pub audio_params: Vec<String>,
  pub pix_format: String,
  pub concat_method: ConcatMethod,

  // Split parameters
  pub split_method: SplitMethod,
  pub threshold: f64,
  pub min_scene_len: usize,
  pub extra_split: usize,

  // Worker pool
  pub workers: usize,

  // Target quality
  pub target_quality: bool,
  pub vmaf_target: f64,
  pub min_q: u32,
  pub max_q: u32,
  pub steps: u32,
  pub vmaf: bool,
  pub vmaf_plots: bool,

  // Brightness boost
  pub boost: bool,
  pub boost_limit: i32,
  pub boost_range: i32,

  // Switches
  pub resume: bool,
  pub keep_temp: bool,
  pub no_check: bool,
  pub force: bool,
  pub verbosity: Verbosity,
}

impl Default for JobConfig {
  fn default() -> Self {
    Self {
      inputs: Vec::new(),
      output: None,
      temp: None,
      scenes_file: None,
      config_file: None,

      encoder: Encoder::Aom,
      video_params: Vec::new(),
      passes: 2,
      audio_params: vec!["copy".to_string()],
      pix_format: "yuv420p".to_string(),
      concat_method: ConcatMethod::FFmpeg,

      split_method: SplitMethod::SceneDetect,
      threshold: 50.0,
      min_scene_len: 24,
      extra_split: 240,

      workers: 0,

      target_quality: false,
      vmaf_target: 95.0,
      min_q: 25,
      max_q: 50,
      steps: 4,
      vmaf: false,
      vmaf_plots: false,

      boost: false,
      boost_limit: 10,
      boost_range: 15,

      resume: false,
      keep_temp: false,
      no_check: false,
      force: false,
      verbosity: Verbosity::Normal,
    }
  }
}

impl JobConfig {
  /// Applies an on-disk config file's values, for the fields it carries.
  /// Fields absent from the file (`None`) leave `self` untouched. Caller is
  /// responsible for applying this before CLI overrides, per the documented
  /// precedence rule (CLI wins).
  pub fn apply_config_file(&mut self, file: &ConfigFile) {
    if let Some(video_params) = &file.video_params {
      self.video_params = video_params.clone();
    }
    if let Some(encoder) = file.encoder {
      self.encoder = encoder;
    }
    if let Some(audio_params) = &file.audio_params {
      self.audio_params = audio_params.clone();
    }
    // `ffmpeg` extra args are appended to video_params' sibling ffmpeg-filter
    // slot; chunk_store/pipeline read `self.video_params` for the encoder
    // and treat `file.ffmpeg` as filter args passed straight to the splitter
    // and probe adapters.
  }

  /// Validates the merged configuration, per §7: executables on PATH,
  /// Qmin ≤ Qmax, steps ≥ 4, input paths exist. Must run before any
  /// directory under `temp` is touched.
  pub fn validate(&self) -> anyhow::Result<()> {
    let missing: Vec<PathBuf> = self
      .inputs
      .iter()
      .filter(|p| !p.exists())
      .cloned()
      .collect();
    if !missing.is_empty() {
      return Err(PipelineError::NonexistentInputs(missing).into());
    }

    if which::which(self.encoder.bin()).is_err() {
      return Err(PipelineError::MissingExecutable(self.encoder.bin().to_string()).into());
    }
    if which::which("ffmpeg").is_err() {
      return Err(PipelineError::MissingExecutable("ffmpeg".to_string()).into());
    }

    if self.target_quality {
      if self.min_q > self.max_q {
        anyhow::bail!("min_q ({}) must be <= max_q ({})", self.min_q, self.max_q);
      }
      if self.steps < 4 {
        return Err(PipelineError::TooFewSteps(self.steps).into());
      }
    }

    Ok(())
  }

  /// The temp directory to use, defaulting to `.temp` when the operator
  /// didn't supply one. Multi-input jobs disambiguate by input, since a
  /// shared `.temp` would otherwise collide across inputs.
  pub fn temp_dir(&self, input: &Path) -> PathBuf {
    if let Some(temp) = &self.temp {
      return temp.clone();
    }
    if self.inputs.len() > 1 {
      PathBuf::from(format!(".temp-{}", crate::hash_path(input)))
    } else {
      PathBuf::from(".temp")
    }
  }

  /// The output path for a given input, defaulting to `<stem>_<encoder>.mkv`
  /// next to the input.
  pub fn output_for(&self, input: &Path) -> PathBuf {
    if let Some(output) = &self.output {
      return output.clone();
    }
    let stem = input
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or("output");
    input.with_file_name(format!("{stem}_{}.mkv", self.encoder))
  }
}
