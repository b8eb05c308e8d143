use std::cmp;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::thread::available_parallelism;

use ffmpeg::format::Pixel;
use serde::{Deserialize, Serialize};
use splines::{Interpolation, Key, Spline};
use tracing::debug;

use crate::error::EncoderCrash;
use crate::progress_bar::update_mp_msg;
use crate::vmaf::read_weighted_vmaf;
use crate::{Chunk, Encoder};

/// Per-chunk perceptual target-quality search parameters and probe-pipe
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetQuality {
  pub vmaf_res: String,
  pub vmaf_scaler: String,
  pub vmaf_filter: Option<String>,
  pub vmaf_threads: usize,
  pub model: Option<PathBuf>,
  pub probing_rate: usize,
  pub probing_speed: Option<u8>,
  pub target: f64,
  pub min_q: u32,
  pub max_q: u32,
  pub steps: u32,
  pub encoder: Encoder,
  pub pix_format: Pixel,
  pub temp: String,
  pub workers: usize,
  pub video_params: Vec<String>,
  pub probe_slow: bool,
  pub percentile: f64,
}

/// One `(quantizer, measured_score)` probe observation.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
  pub q: u32,
  pub score: f64,
}

impl TargetQuality {
  /// Builds the canonical candidate fork: `Qmin, Qmax`, then `steps - 2`
  /// interior values evenly spaced between them.
  fn candidate_qs(&self) -> Vec<u32> {
    if self.min_q == self.max_q {
      return vec![self.min_q];
    }

    let mut qs = vec![self.min_q, self.max_q];
    let interiors = self.steps.saturating_sub(2);
    let span = (self.max_q - self.min_q) as f64;
    for i in 1..=interiors {
      let fraction = i as f64 / (interiors + 1) as f64;
      let q = self.min_q as f64 + span * fraction;
      qs.push(q.round() as u32);
    }
    qs
  }

  /// Runs the target-quality search for `chunk`, returning the chosen
  /// quantizer. Probes in canonical order (Qmax, Qmin, interiors), taking
  /// the early exits in step 4 of the algorithm when they apply.
  pub fn per_shot_target_quality(
    &self,
    chunk: &Chunk,
    worker_id: Option<usize>,
  ) -> Result<u32, Box<EncoderCrash>> {
    if self.min_q == self.max_q {
      return Ok(self.min_q);
    }

    let update_progress_bar = |q: u32| {
      if let Some(worker_id) = worker_id {
        update_mp_msg(worker_id, format!("Targeting Quality {} - Testing {q}", self.target));
      }
    };

    let candidates = self.candidate_qs();
    // Probe order: Qmax first, Qmin second, interiors afterward.
    let mut order = vec![self.max_q, self.min_q];
    order.extend(candidates.into_iter().filter(|q| *q != self.min_q && *q != self.max_q));

    let mut probes: Vec<Probe> = Vec::with_capacity(order.len());

    for (i, q) in order.iter().copied().enumerate() {
      update_progress_bar(q);
      let probe_path = self.vmaf_probe(chunk, q as usize)?;
      let score = read_weighted_vmaf(&probe_path, self.percentile)
        .map_err(|e| Box::new(EncoderCrash {
          exit_status: std::process::ExitStatus::default(),
          stdout: String::new().into(),
          stderr: format!("failed to read vmaf score: {e}").into(),
          source_pipe_stderr: String::new().into(),
        }))?;
      probes.push(Probe { q, score });

      if i == 0 && score.round() as i64 > self.target.round() as i64 {
        self.log_result(chunk, &probes, self.max_q, score);
        return Ok(self.max_q);
      }
      if i == 1 && (score.round() as i64) < self.target.round() as i64 {
        self.log_result(chunk, &probes, self.min_q, score);
        return Ok(self.min_q);
      }
    }

    let chosen = interpolate_target_q(&probes, self.target, self.min_q, self.max_q);
    let chosen_score = probes
      .iter()
      .min_by(|a, b| {
        (a.q as i64 - chosen as i64)
          .abs()
          .cmp(&(b.q as i64 - chosen as i64).abs())
      })
      .map_or(self.target, |p| p.score);
    self.log_result(chunk, &probes, chosen, chosen_score);
    Ok(chosen)
  }

  fn log_result(&self, chunk: &Chunk, probes: &[Probe], chosen_q: u32, chosen_score: f64) {
    let mut scored: Vec<(f64, u32)> = probes.iter().map(|p| (p.score, p.q)).collect();
    log_probes(
      &mut scored,
      chunk.source_frames as u32,
      self.probing_rate as u32,
      &chunk.name,
      chosen_q,
      chosen_score,
    );
  }

  /// Runs the three-stage probe pipe (source → ffmpeg filter → encoder) on
  /// a current-thread tokio runtime, returning the path to the probe's
  /// VMAF JSON log.
  fn vmaf_probe(&self, chunk: &Chunk, q: usize) -> Result<PathBuf, Box<EncoderCrash>> {
    let vmaf_threads =
      if self.vmaf_threads == 0 { vmaf_auto_threads(self.workers) } else { self.vmaf_threads };

    let cmd = self.encoder.probe_cmd(
      self.temp.clone(),
      chunk.index,
      q,
      self.pix_format,
      self.probing_rate,
      self.probing_speed,
      vmaf_threads,
      self.video_params.clone(),
      self.probe_slow,
    );

    let split_path = chunk.split_path.clone();
    let fl_path =
      std::path::Path::new(&self.temp).join("split").join(format!("{}_{q}.json", chunk.index));

    let future = async {
      let mut source_pipe = tokio::process::Command::new(&cmd.0[0])
        .args(&cmd.0[1..])
        .arg(&split_path)
        .stdout(std::process::Stdio::piped())
        .stderr(if cfg!(windows) { std::process::Stdio::null() } else { std::process::Stdio::piped() })
        .spawn()
        .map_err(|e| anyhow::anyhow!("spawning probe pipe: {e}"))?;

      let source_pipe_stdout: std::process::Stdio =
        source_pipe.stdout.take().expect("piped stdout").try_into().expect("convert stdio");

      let enc_pipe = if let [cmd, args @ ..] = &*cmd.1 {
        tokio::process::Command::new(cmd.as_ref())
          .args(args.iter().map(AsRef::as_ref))
          .stdin(source_pipe_stdout)
          .stdout(std::process::Stdio::piped())
          .stderr(if cfg!(windows) { std::process::Stdio::null() } else { std::process::Stdio::piped() })
          .spawn()
          .map_err(|e| anyhow::anyhow!("spawning probe encoder: {e}"))?
      } else {
        anyhow::bail!("empty probe encoder command");
      };

      let source_pipe_output =
        source_pipe.wait_with_output().await.map_err(|e| anyhow::anyhow!("{e}"))?;
      let enc_output = enc_pipe.wait_with_output().await.map_err(|e| anyhow::anyhow!("{e}"))?;

      if !enc_output.status.success() {
        return Err(anyhow::Error::new(EncoderCrash {
          exit_status: enc_output.status,
          stdout: enc_output.stdout.into(),
          stderr: enc_output.stderr.into(),
          source_pipe_stderr: source_pipe_output.stderr.into(),
        }));
      }

      Ok(())
    };

    let rt = tokio::runtime::Builder::new_current_thread()
      .enable_io()
      .build()
      .expect("failed to build probe runtime");
    rt.block_on(future).map_err(|e| {
      Box::new(match e.downcast::<EncoderCrash>() {
        Ok(crash) => crash,
        Err(other) => EncoderCrash {
          exit_status: std::process::ExitStatus::default(),
          stdout: String::new().into(),
          stderr: other.to_string().into(),
          source_pipe_stderr: String::new().into(),
        },
      })
    })?;

    let reference_pipe_cmd: Vec<String> = vec![
      "ffmpeg".to_string(),
      "-i".to_string(),
      split_path.to_string_lossy().into_owned(),
      "-strict".to_string(),
      "-1".to_string(),
      "-f".to_string(),
      "yuv4mpegpipe".to_string(),
      "-".to_string(),
    ];

    crate::vmaf::run_vmaf(
      &chunk.encoded_path,
      &reference_pipe_cmd,
      &fl_path,
      self.model.as_ref(),
      &self.vmaf_res,
      self.probing_rate,
      self.vmaf_filter.as_deref(),
      self.vmaf_threads,
    )
    .map_err(Box::new)?;

    Ok(fl_path)
  }
}

/// Fits a monotone interpolation through the probed `(Q, score)` pairs and
/// returns the Q whose interpolated score is closest to `target`, clamped
/// to `[min_q, max_q]`. Ties (within floating-point noise) break toward the
/// largest Q.
fn interpolate_target_q(probes: &[Probe], target: f64, min_q: u32, max_q: u32) -> u32 {
  let mut by_score: Vec<(f64, u32)> = probes.iter().map(|p| (p.score, p.q)).collect();
  by_score.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
  by_score.dedup_by_key(|(score, _)| *score);

  if by_score.len() >= 3 {
    let keys: Vec<Key<f64, f64>> = by_score
      .iter()
      .map(|(score, q)| Key::new(*score, *q as f64, Interpolation::CatmullRom))
      .collect();
    let spline = Spline::from_vec(keys);
    if let Some(predicted) = spline.sample(target) {
      return tie_break(predicted, by_score.iter().map(|(_, q)| *q), min_q, max_q);
    }
  }

  if by_score.len() == 2 {
    let (score1, q1) = by_score[0];
    let (score2, q2) = by_score[1];
    if (score1 - score2).abs() < f64::EPSILON {
      return ((q1 + q2) / 2).clamp(min_q, max_q);
    }
    let slope = (q2 as f64 - q1 as f64) / (score2 - score1);
    let predicted = q1 as f64 + slope * (target - score1);
    return tie_break(predicted, [q1, q2].into_iter(), min_q, max_q);
  }

  (min_q + max_q) / 2
}

fn tie_break(predicted: f64, candidates: impl Iterator<Item = u32>, min_q: u32, max_q: u32) -> u32 {
  let rounded = (predicted.round() as i64).clamp(min_q as i64, max_q as i64) as u32;
  candidates
    .filter(|&q| (q as f64 - predicted).abs() <= 1.0)
    .max()
    .map_or(rounded, |q| q.clamp(min_q, max_q))
}

pub fn within_tolerance(score: f64, target: f64) -> bool {
  (score - target).abs() / target < 0.01
}

pub fn vmaf_auto_threads(workers: usize) -> usize {
  const OVER_PROVISION_FACTOR: f64 = 1.25;

  let threads = available_parallelism().map_or(1, |n| n.get());
  let workers = workers.max(1);
  cmp::max(((threads / workers) as f64 * OVER_PROVISION_FACTOR) as usize, 1)
}

pub fn log_probes(
  vmaf_cq_scores: &mut [(f64, u32)],
  frames: u32,
  probing_rate: u32,
  chunk_name: &str,
  target_q: u32,
  target_vmaf: f64,
) {
  vmaf_cq_scores.sort_by_key(|(_score, q)| *q);
  debug!("chunk {chunk_name}: P-Rate={probing_rate}, {frames} frames");
  debug!("chunk {chunk_name}: TQ-Probes: {vmaf_cq_scores:.2?}");
  debug!("chunk {chunk_name}: Target Q={target_q}, VMAF={target_vmaf:.2}");
}

#[inline]
pub const fn adapt_probing_rate(rate: usize) -> usize {
  match rate {
    1..=4 => rate,
    _ => 1,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tq(min_q: u32, max_q: u32, steps: u32) -> TargetQuality {
    TargetQuality {
      vmaf_res: "1920x1080".to_string(),
      vmaf_scaler: "bicubic".to_string(),
      vmaf_filter: None,
      vmaf_threads: 1,
      model: None,
      probing_rate: 1,
      probing_speed: None,
      target: 95.0,
      min_q,
      max_q,
      steps,
      encoder: Encoder::Aom,
      pix_format: Pixel::YUV420P,
      temp: String::new(),
      workers: 1,
      video_params: Vec::new(),
      probe_slow: false,
      percentile: 25.0,
    }
  }

  #[test]
  fn candidate_qs_has_qmin_qmax_and_interiors() {
    let q = tq(20, 60, 4);
    let candidates = q.candidate_qs();
    assert!(candidates.contains(&20));
    assert!(candidates.contains(&60));
    assert_eq!(candidates.len(), 4);
  }

  #[test]
  fn candidate_qs_skips_search_when_degenerate() {
    let q = tq(30, 30, 4);
    assert_eq!(q.candidate_qs(), vec![30]);
  }

  #[test]
  fn interpolate_clamps_to_range() {
    let probes = [Probe { q: 20, score: 99.0 }, Probe { q: 60, score: 40.0 }];
    let chosen = interpolate_target_q(&probes, 95.0, 20, 60);
    assert!((20..=60).contains(&chosen));
  }

  #[test]
  fn interpolate_two_point_linear() {
    let probes = [Probe { q: 20, score: 100.0 }, Probe { q: 40, score: 80.0 }];
    // linear fit: score = 100 - (q-20), target 90 -> q = 30
    let chosen = interpolate_target_q(&probes, 90.0, 20, 60);
    assert_eq!(chosen, 30);
  }

  #[test]
  fn interpolate_ties_break_to_largest_q() {
    let probes = [
      Probe { q: 20, score: 98.0 },
      Probe { q: 40, score: 95.0 },
      Probe { q: 41, score: 95.0 },
      Probe { q: 60, score: 80.0 },
    ];
    let chosen = interpolate_target_q(&probes, 95.0, 20, 60);
    assert!(chosen >= 40);
  }

  #[test]
  fn within_tolerance_accepts_close_scores() {
    assert!(within_tolerance(95.2, 95.0));
    assert!(!within_tolerance(90.0, 95.0));
  }

  #[test]
  fn adapt_probing_rate_clamps_out_of_range_to_one() {
    assert_eq!(adapt_probing_rate(2), 2);
    assert_eq!(adapt_probing_rate(10), 1);
  }

  #[test]
  fn vmaf_auto_threads_is_at_least_one() {
    assert!(vmaf_auto_threads(64) >= 1);
  }

  use quickcheck::TestResult;
  use quickcheck_macros::quickcheck;

  #[quickcheck]
  fn interpolate_target_q_always_within_bounds(q_a: u8, q_b: u8, score_a: u8, score_b: u8, target: u8) -> TestResult {
    let (min_q, max_q) = (10u32, 60u32);
    let q_a = min_q + (q_a as u32 % (max_q - min_q + 1));
    let q_b = min_q + (q_b as u32 % (max_q - min_q + 1));
    if q_a == q_b {
      return TestResult::discard();
    }
    let probes = [
      Probe { q: q_a, score: score_a as f64 },
      Probe { q: q_b, score: score_b as f64 },
    ];
    let chosen = interpolate_target_q(&probes, target as f64, min_q, max_q);
    TestResult::from_bool((min_q..=max_q).contains(&chosen))
  }
}
