//! Top-level state machine that wires probe → split → queue → encode →
//! verify → concatenate for one or more inputs, including fresh vs.
//! resumed entry.
//!
//! ```text
//! New → Setup → Split → Audio → Queue → Encode → Concat → Done
//!                                  └── Resume re-entry
//! ```
//!
//! A resumed run skips straight to `Queue` (the chunk store's journal
//! already reflects any chunks verified by a prior run); everything before
//! it is only required to rebuild a chunk store that doesn't exist yet.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::chunk::Chunk;
use crate::chunk_store::ChunkStore;
use crate::config::JobConfig;
use crate::error::PipelineError;
use crate::target_quality::TargetQuality;
use crate::worker::WorkerPool;

/// Where a single input job currently sits in the driver's state machine.
/// Exposed so a caller (the CLI) can report progress between inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  New,
  Setup,
  Split,
  Audio,
  Queue,
  Encode,
  Concat,
  Done,
}

/// Drives one job (all configured inputs, processed sequentially) through
/// the stage sequence above.
pub struct Pipeline<'a> {
  config: &'a JobConfig,
}

impl<'a> Pipeline<'a> {
  pub fn new(config: &'a JobConfig) -> Self {
    Self { config }
  }

  /// Runs every configured input to completion, one after another. Each
  /// input gets its own temp directory and output path (`temp_dir`/
  /// `output_for`, re-derived per input); directory inputs are expanded to
  /// their video-extension children first.
  pub fn run(&self) -> anyhow::Result<()> {
    self.config.validate().context("validating job configuration")?;

    let inputs = crate::expand_inputs(&self.config.inputs).context("expanding input paths")?;
    anyhow::ensure!(!inputs.is_empty(), "no input files to encode");

    let first_temp = self.config.temp_dir(&inputs[0]);
    std::fs::create_dir_all(&first_temp)
      .with_context(|| format!("creating temp directory {first_temp:?}"))?;
    init_logging_once(self.config, first_temp.join("log.log"));

    for input in &inputs {
      self.run_one(input).with_context(|| format!("processing input {input:?}"))?;
    }

    Ok(())
  }

  /// Runs a single input through the full stage sequence, or, on
  /// `--resume`, re-enters directly at `Queue` against the existing chunk
  /// store.
  fn run_one(&self, input: &PathBuf) -> anyhow::Result<()> {
    let temp = self.config.temp_dir(input);
    let output = self.config.output_for(input);

    info!("[{}] stage: Setup", input.display());
    let total_frames =
      crate::probe::num_frames(input).with_context(|| format!("probing frame count of {input:?}"))?;

    // Opening the store first lets it remove any stale temp root from a
    // prior, non-resumed run before anything writes into it again.
    let store = ChunkStore::open(&temp, self.config.resume, total_frames)
      .with_context(|| format!("opening chunk store at {temp:?}"))?;

    let already_split = std::fs::read_dir(temp.join("split")).map(|mut d| d.next().is_some()).unwrap_or(false);

    if self.config.resume && already_split {
      info!("[{}] resuming: chunk store already populated, skipping Split/Audio", input.display());
    } else {
      info!("[{}] stage: Split", input.display());
      self.split(input, &temp, total_frames)?;

      info!("[{}] stage: Audio", input.display());
      let extracted = crate::probe::encode_audio(input, &temp, &self.config.audio_params)
        .context("extracting audio track")?;
      if extracted {
        info!("[{}] extracted audio track to {:?}", input.display(), temp.join("audio.mkv"));
      }
    }

    info!("[{}] stage: Queue", input.display());
    let mut chunks = store.enumerate_chunks().context("enumerating chunks")?;
    anyhow::ensure!(!chunks.is_empty(), "chunk store produced no chunks for {input:?}");
    self.fill_source_frames(&mut chunks, input)?;

    info!("[{}] stage: Encode", input.display());
    let target_quality = self.build_target_quality(&temp);
    let pool = WorkerPool::new(&store, self.config, target_quality.as_ref());
    self.wire_cancellation(pool.aborting_flag());
    pool.run(chunks).map_err(anyhow::Error::from)?;

    info!("[{}] stage: Concat", input.display());
    let (_, verified) = store.load_progress();
    anyhow::ensure!(verified > 0, "no chunks verified, refusing to concatenate");
    match self.config.concat_method {
      crate::ConcatMethod::MKVMerge => {
        let num_chunks = std::fs::read_dir(temp.join("encode"))?.count();
        crate::concat::mkvmerge(&temp, &output, num_chunks)
      }
      crate::ConcatMethod::FFmpeg => crate::concat::ffmpeg(&temp, &output),
    }
    .map_err(|_| PipelineError::ConcatFailed { output: output.clone() })?;

    if !self.config.keep_temp {
      let _ = std::fs::remove_dir_all(&temp);
    }

    info!("[{}] stage: Done -> {:?}", input.display(), output);
    Ok(())
  }

  fn split(&self, input: &PathBuf, temp: &std::path::Path, total_frames: usize) -> anyhow::Result<()> {
    let cuts = if let Some(scenes_file) = &self.config.scenes_file {
      if scenes_file.exists() {
        crate::split::read_scenes_from_file(scenes_file)?
      } else {
        let cuts = crate::split::plan_cuts(
          input,
          self.config.split_method,
          self.config.threshold,
          self.config.min_scene_len,
          total_frames,
        )?;
        crate::split::write_scenes_to_file(&cuts, scenes_file)?;
        cuts
      }
    } else {
      crate::split::plan_cuts(
        input,
        self.config.split_method,
        self.config.threshold,
        self.config.min_scene_len,
        total_frames,
      )?
    };

    if cuts.is_empty() && self.config.split_method != crate::SplitMethod::Skip {
      return Err(PipelineError::EmptySplit { input: input.clone() }.into());
    }

    let cuts = crate::split::densify(&cuts, total_frames, self.config.extra_split);
    let cuts = crate::split::apply_platform_cap(cuts, total_frames);
    crate::split::segment(input, temp, &cuts).context("segmenting source into chunks")?;
    Ok(())
  }

  /// Fills in each chunk's `source_frames` from its split file; the chunk
  /// store itself only knows file size (for dispatch ordering), not frame
  /// count, until asked. Verified chunks keep the journal's authoritative
  /// count untouched.
  fn fill_source_frames(&self, chunks: &mut [Chunk], input: &PathBuf) -> anyhow::Result<()> {
    for chunk in chunks.iter_mut() {
      if chunk.state != crate::ChunkState::Verified {
        chunk.source_frames = crate::probe::num_frames(&chunk.split_path)
          .with_context(|| format!("probing split frame count for {:?} ({input:?})", chunk.split_path))?;
      }
    }
    Ok(())
  }

  fn build_target_quality(&self, temp: &std::path::Path) -> Option<TargetQuality> {
    if !self.config.target_quality {
      return None;
    }
    Some(TargetQuality {
      vmaf_res: "1920x1080".to_string(),
      vmaf_scaler: "bicubic".to_string(),
      vmaf_filter: None,
      vmaf_threads: crate::target_quality::vmaf_auto_threads(self.config.workers.max(1)),
      model: None,
      probing_rate: 1,
      probing_speed: None,
      target: self.config.vmaf_target,
      min_q: self.config.min_q,
      max_q: self.config.max_q,
      steps: self.config.steps,
      encoder: self.config.encoder,
      pix_format: self
        .config
        .pix_format
        .parse()
        .unwrap_or(ffmpeg::format::Pixel::YUV420P),
      temp: temp.to_string_lossy().into_owned(),
      workers: self.config.workers,
      video_params: self.config.video_params.clone(),
      probe_slow: false,
      percentile: 0.25,
    })
  }

  fn wire_cancellation(&self, aborting: Arc<AtomicBool>) {
    let _ = ctrlc_handler(aborting);
  }
}

/// Installed once per process; subsequent calls are no-ops (the underlying
/// `ctrlc` crate rejects a second handler registration).
fn ctrlc_handler(aborting: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    tracing::warn!("received interrupt, finishing in-flight chunks and stopping");
    aborting.store(true, std::sync::atomic::Ordering::SeqCst);
  })
}

/// `tracing::subscriber::set_global_default` may only succeed once per
/// process; a multi-input job must not try to re-init on every input.
fn init_logging_once(config: &JobConfig, log_path: PathBuf) {
  static INIT: std::sync::Once = std::sync::Once::new();
  INIT.call_once(|| {
    let console_level = match config.verbosity {
      crate::Verbosity::Quiet => tracing_subscriber::filter::LevelFilter::WARN,
      crate::Verbosity::Normal => crate::logging::DEFAULT_CONSOLE_LEVEL,
      crate::Verbosity::Verbose => tracing_subscriber::filter::LevelFilter::DEBUG,
    };
    crate::logging::init_logging(console_level, log_path, crate::logging::DEFAULT_LOG_LEVEL);
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stage_sequence_is_ordered_as_documented() {
    let sequence =
      [Stage::New, Stage::Setup, Stage::Split, Stage::Audio, Stage::Queue, Stage::Encode, Stage::Concat, Stage::Done];
    assert_eq!(sequence.len(), 8);
    assert_eq!(sequence[0], Stage::New);
    assert_eq!(sequence[7], Stage::Done);
  }
}
