//! Bounded-parallel worker pool: dispatches chunks largest-first across
//! `min(requested_workers, chunk_count)` OS threads, each running an
//! optional target-quality search, an optional brightness boost, the
//! encoder's command stages in order, and a frame-count verification
//! before marking the chunk done in the chunk store.

use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::boost::{apply_boost, boost_low_luma};
use crate::chunk::{Chunk, ChunkState};
use crate::chunk_store::ChunkStore;
use crate::config::JobConfig;
use crate::error::{EncoderCrash, PipelineError, StringOrBytes};
use crate::progress_bar::{update_bar, update_mp_bar, update_mp_msg};
use crate::target_quality::TargetQuality;
use crate::Verbosity;

/// Shared, mutex-guarded frame-progress counter. `current` only ever moves
/// forward; workers finish in no particular order.
pub struct Counter {
  total: usize,
  current: AtomicUsize,
}

impl Counter {
  fn new(total: usize, initial: usize) -> Self {
    Self { total, current: AtomicUsize::new(initial) }
  }

  fn add(&self, delta: usize) {
    self.current.fetch_add(delta, Ordering::SeqCst);
  }

  pub fn progress(&self) -> (usize, usize) {
    (self.current.load(Ordering::SeqCst), self.total)
  }
}

/// Bounded-parallel pool that drains a chunk queue against a chunk store.
pub struct WorkerPool<'a> {
  store: &'a ChunkStore,
  config: &'a JobConfig,
  target_quality: Option<&'a TargetQuality>,
  aborting: Arc<AtomicBool>,
}

impl<'a> WorkerPool<'a> {
  pub fn new(
    store: &'a ChunkStore,
    config: &'a JobConfig,
    target_quality: Option<&'a TargetQuality>,
  ) -> Self {
    Self { store, config, target_quality, aborting: Arc::new(AtomicBool::new(false)) }
  }

  /// A clone of the shared cancellation flag; setting it stops new
  /// dispatch and kills in-flight child processes at their next poll.
  pub fn aborting_flag(&self) -> Arc<AtomicBool> {
    self.aborting.clone()
  }

  fn worker_count(&self, chunk_count: usize) -> usize {
    let requested = if self.config.workers == 0 { num_cpus() } else { self.config.workers };
    let capped = match self.config.encoder {
      crate::Encoder::Aom => (num_cpus() / 4).max(1),
      _ => requested,
    };
    requested.min(capped).min(chunk_count).max(1)
  }

  /// Runs every `Pending` chunk in `chunks` to completion (or until the
  /// first fatal failure / cancellation), returning once the queue is
  /// drained. Chunks are dispatched largest-first, as supplied by the
  /// caller (the chunk store already enumerates largest-first).
  pub fn run(&self, chunks: Vec<Chunk>) -> Result<(), PipelineError> {
    let pending: Vec<Chunk> =
      chunks.into_iter().filter(|c| c.state != ChunkState::Verified).collect();
    if pending.is_empty() {
      return Ok(());
    }

    let (_, initial) = self.store.load_progress();
    let total_frames: usize = pending.iter().map(|c| c.source_frames).sum::<usize>() + initial;
    let counter = Counter::new(total_frames, initial);

    let workers = self.worker_count(pending.len());
    let (sender, receiver) = crossbeam_channel::bounded::<Chunk>(pending.len());
    for chunk in pending {
      sender.send(chunk).expect("queue not yet closed");
    }
    drop(sender);

    let failure: Mutex<Option<PipelineError>> = Mutex::new(None);

    crossbeam_utils::thread::scope(|scope| {
      for worker_id in 0..workers {
        let receiver = receiver.clone();
        let failure = &failure;
        let counter = &counter;
        scope.spawn(move |_| {
          while let Ok(mut chunk) = receiver.recv() {
            if self.aborting.load(Ordering::SeqCst) {
              break;
            }
            if let Err(e) = self.run_chunk(&mut chunk, worker_id, counter) {
              if matches!(e, PipelineError::Cancelled) {
                debug!("[chunk {}] stopped: {e}", chunk.index);
              } else {
                error!("[chunk {}] {e}", chunk.index);
              }
              failure.lock().unwrap().get_or_insert(e);
              self.aborting.store(true, Ordering::SeqCst);
              break;
            }
          }
        });
      }
    })
    .expect("worker thread panicked");

    if self.config.verbosity == Verbosity::Normal {
      let _ = crate::progress_bar::finish_progress_bar();
    } else if self.config.verbosity == Verbosity::Verbose {
      let _ = crate::progress_bar::finish_multi_progress_bar();
    }

    match failure.into_inner().unwrap() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  fn run_chunk(&self, chunk: &mut Chunk, worker_id: usize, counter: &Counter) -> Result<(), PipelineError> {
    chunk.state = ChunkState::Probing;

    let mut base_q = self.config.min_q.midpoint(self.config.max_q);
    if let Some(tq) = self.target_quality {
      base_q = tq.per_shot_target_quality(chunk, Some(worker_id)).map_err(|source| {
        PipelineError::ChunkFailed { index: chunk.index, source: *source }
      })?;
    }

    let q = if self.config.boost {
      match boost_low_luma(chunk, self.config.boost_limit, self.config.boost_range) {
        Some(delta) => apply_boost(base_q, delta, self.config.min_q, self.config.max_q),
        None => base_q,
      }
    } else {
      base_q
    };

    chunk.state = ChunkState::Encoding;
    let before = counter.progress().0;
    self.encode_chunk(chunk, q as usize, worker_id, counter)?;

    let actual_frames = crate::probe::num_frames(&chunk.encoded_path).unwrap_or(0);
    chunk.encoded_frames = Some(actual_frames);

    if self.config.no_check || actual_frames == chunk.source_frames {
      chunk.state = ChunkState::Verified;
      self.store.mark_verified(&chunk.name, actual_frames).map_err(|e| {
        PipelineError::ChunkFailed {
          index: chunk.index,
          source: EncoderCrash {
            exit_status: std::process::ExitStatus::default(),
            stdout: StringOrBytes::from(String::new()),
            stderr: StringOrBytes::from(format!("writing resume journal: {e}")),
            source_pipe_stderr: StringOrBytes::from(String::new()),
          },
        }
      })?;
      info!(
        "chunk {}: done, {}/{} frames",
        chunk.name, actual_frames, chunk.source_frames
      );
    } else {
      warn!(
        "chunk {}: frame mismatch {}/{} (actual/expected), not marking verified",
        chunk.name, actual_frames, chunk.source_frames
      );
      // counter already counted this chunk's frames optimistically via stderr
      // parsing; correct it back down so a resumed retry doesn't double count.
      counter.add(before.saturating_sub(counter.progress().0));
    }

    Ok(())
  }

  /// Runs the encoder's passes in order, piping the split segment through
  /// ffmpeg and into the encoder, parsing stderr for frame-progress deltas.
  fn encode_chunk(
    &self,
    chunk: &Chunk,
    q: usize,
    worker_id: usize,
    counter: &Counter,
  ) -> Result<(), PipelineError> {
    let encoder = self.config.encoder;
    let output = chunk.encoded_path.to_string_lossy().into_owned();
    let fpf = chunk.encoded_path.with_extension("").to_string_lossy().into_owned();

    let params: Vec<String> = encoder.man_command(self.config.video_params.clone(), q);

    let stages: Vec<Vec<String>> = if self.config.passes == 1 {
      vec![encoder.compose_1_1_pass(params, output)]
    } else {
      vec![
        encoder.compose_1_2_pass(params.clone(), &fpf),
        encoder.compose_2_2_pass(params, &fpf, output),
      ]
    };

    for (pass_index, stage) in stages.iter().enumerate() {
      self.run_encode_stage(chunk, stage, pass_index + 1, worker_id, counter)?;
    }
    Ok(())
  }

  fn run_encode_stage(
    &self,
    chunk: &Chunk,
    stage: &[String],
    pass: usize,
    worker_id: usize,
    counter: &Counter,
  ) -> Result<(), PipelineError> {
    if self.aborting.load(Ordering::SeqCst) {
      return Err(PipelineError::Cancelled);
    }

    let pix_fmt = self
      .config
      .pix_format
      .parse::<ffmpeg::format::Pixel>()
      .unwrap_or(ffmpeg::format::Pixel::YUV420P);
    let pipe_cmd = crate::probe::compose_ffmpeg_pipe(Vec::<String>::new(), pix_fmt);

    let mut source_pipe = Command::new(&pipe_cmd[0]);
    source_pipe.args(&pipe_cmd[1..]);
    source_pipe.arg(&chunk.split_path);
    source_pipe.stdout(Stdio::piped());
    source_pipe.stderr(Stdio::null());
    let mut source_pipe =
      source_pipe.spawn().map_err(|e| self.spawn_failure(chunk.index, "source pipe", &e))?;

    let [bin, args @ ..] = stage else {
      return Err(PipelineError::ChunkFailed {
        index: chunk.index,
        source: EncoderCrash {
          exit_status: std::process::ExitStatus::default(),
          stdout: StringOrBytes::from(String::new()),
          stderr: StringOrBytes::from("empty encode command".to_string()),
          source_pipe_stderr: StringOrBytes::from(String::new()),
        },
      });
    };

    let mut enc = Command::new(bin);
    enc.args(args);
    enc.stdin(source_pipe.stdout.take().expect("piped stdout"));
    enc.stdout(Stdio::piped());
    enc.stderr(Stdio::piped());
    let mut enc_child = enc.spawn().map_err(|e| self.spawn_failure(chunk.index, "encoder", &e))?;

    let stderr = enc_child.stderr.take().expect("piped stderr");
    let mut seen = 0u64;
    for line in std::io::BufRead::lines(std::io::BufReader::new(stderr)) {
      if self.aborting.load(Ordering::SeqCst) {
        warn!("chunk {} pass {pass}: killing in-flight encoder on cancellation", chunk.name);
        let _ = enc_child.kill();
        let _ = source_pipe.kill();
        let _ = enc_child.wait();
        let _ = source_pipe.wait();
        return Err(PipelineError::Cancelled);
      }

      let Ok(line) = line else { continue };
      if let Some(frames) = self.config.encoder.parse_encoded_frames(&line) {
        let delta = frames.saturating_sub(seen);
        seen = frames;
        counter.add(delta as usize);
        let _ = update_bar(delta);
        let _ = update_mp_bar(delta);
        let _ = update_mp_msg(worker_id, format!("chunk {} pass {pass}: {frames} frames", chunk.name));
      }
    }

    if self.aborting.load(Ordering::SeqCst) {
      let _ = enc_child.kill();
      let _ = source_pipe.kill();
      let _ = enc_child.wait();
      let _ = source_pipe.wait();
      return Err(PipelineError::Cancelled);
    }

    let enc_output =
      enc_child.wait_with_output().map_err(|e| self.spawn_failure(chunk.index, "encoder", &e))?;
    let _ = source_pipe.wait();

    if !enc_output.status.success() {
      return Err(PipelineError::ChunkFailed {
        index: chunk.index,
        source: EncoderCrash {
          exit_status: enc_output.status,
          stdout: StringOrBytes::from(enc_output.stdout),
          stderr: StringOrBytes::from(enc_output.stderr),
          source_pipe_stderr: StringOrBytes::from(String::new()),
        },
      });
    }

    debug!("chunk {} pass {pass}: encoder exited successfully", chunk.name);
    Ok(())
  }

  fn spawn_failure(&self, index: usize, what: &str, e: &std::io::Error) -> PipelineError {
    PipelineError::ChunkFailed {
      index,
      source: EncoderCrash {
        exit_status: std::process::ExitStatus::default(),
        stdout: StringOrBytes::from(String::new()),
        stderr: StringOrBytes::from(format!("failed to spawn {what}: {e}")),
        source_pipe_stderr: StringOrBytes::from(String::new()),
      },
    }
  }
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map_or(1, |n| n.get())
}

trait Midpoint {
  fn midpoint(self, other: Self) -> Self;
}

impl Midpoint for u32 {
  fn midpoint(self, other: Self) -> Self {
    (self + other) / 2
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counter_starts_at_initial_and_is_monotonic() {
    let counter = Counter::new(1000, 250);
    assert_eq!(counter.progress(), (250, 1000));
    counter.add(50);
    assert_eq!(counter.progress(), (300, 1000));
    counter.add(10);
    assert_eq!(counter.progress(), (310, 1000));
  }

  #[test]
  fn midpoint_of_equal_bounds_is_itself() {
    assert_eq!(30u32.midpoint(30), 30);
  }

  use quickcheck::TestResult;
  use quickcheck_macros::quickcheck;

  /// However many (non-negative) deltas a counter absorbs, in whatever
  /// order, it never reports a value lower than one it already reported.
  #[quickcheck]
  fn counter_is_monotone_under_any_delta_sequence(deltas: Vec<u16>) -> TestResult {
    let counter = Counter::new(usize::MAX, 0);
    let mut last = 0;
    for delta in deltas {
      counter.add(delta as usize);
      let (current, _) = counter.progress();
      if current < last {
        return TestResult::failed();
      }
      last = current;
    }
    TestResult::passed()
  }
}
