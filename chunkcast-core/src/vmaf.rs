//! VMAF scoring: runs libvmaf through an `ffmpeg -filter_complex` pipe
//! between the encoded chunk and its original split source, reads back the
//! per-frame JSON log, and (optionally) renders a percentile plot.

use std::cmp::Ordering;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::anyhow;
use plotters::prelude::*;
use serde::Deserialize;

use crate::error::EncoderCrash;
use crate::probe::escape_path_in_filter;
use crate::util::{printable_base10_digits, read_bytes};

#[derive(Deserialize, Debug)]
struct VmafScore {
  vmaf: f64,
}

#[derive(Deserialize, Debug)]
struct Metrics {
  metrics: VmafScore,
}

#[derive(Deserialize, Debug)]
struct VmafResult {
  frames: Vec<Metrics>,
}

pub fn plot_vmaf_score_file(scores_file: &Path, plot_path: &Path) -> anyhow::Result<()> {
  let scores = read_vmaf_file(scores_file)?;

  let plot_width = 1600 + (printable_base10_digits(scores.len()) * 200);
  let plot_height = 600;

  let length = scores.len() as u32;
  let perc_1 = read_weighted_vmaf(scores_file, 0.01)?;
  let perc_25 = read_weighted_vmaf(scores_file, 0.25)?;
  let perc_75 = read_weighted_vmaf(scores_file, 0.75)?;
  let perc_mean = read_weighted_vmaf(scores_file, 0.50)?;

  let root = SVGBackend::new(plot_path.as_os_str(), (plot_width, plot_height)).into_drawing_area();
  root.fill(&WHITE)?;

  let mut chart = ChartBuilder::on(&root)
    .set_label_area_size(LabelAreaPosition::Bottom, (5).percent())
    .set_label_area_size(LabelAreaPosition::Left, (5).percent())
    .set_label_area_size(LabelAreaPosition::Right, (7).percent())
    .set_label_area_size(LabelAreaPosition::Top, (5).percent())
    .margin((1).percent())
    .build_cartesian_2d(0_u32..length, perc_1.floor()..100.0)?;

  chart.configure_mesh().draw()?;

  chart
    .draw_series(LineSeries::new((0..=length).map(|x| (x, perc_1)), &RED))?
    .label(format!("1%: {perc_1}"))
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

  chart
    .draw_series(LineSeries::new((0..=length).map(|x| (x, perc_25)), &YELLOW))?
    .label(format!("25%: {perc_25}"))
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &YELLOW));

  chart
    .draw_series(LineSeries::new((0..=length).map(|x| (x, perc_75)), &GREEN))?
    .label(format!("75%: {perc_75}"))
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));

  chart
    .draw_series(LineSeries::new((0..=length).map(|x| (x, perc_mean)), &BLACK))?
    .label(format!("Mean: {perc_mean}"))
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

  chart.draw_series(LineSeries::new((0..).zip(scores.iter()).map(|(x, y)| (x, *y)), &BLUE))?;

  chart
    .configure_series_labels()
    .background_style(&WHITE.mix(0.8))
    .border_style(&BLACK)
    .draw()?;

  root.present()?;
  Ok(())
}

pub fn validate_libvmaf() -> anyhow::Result<()> {
  let mut cmd = Command::new("ffmpeg");
  cmd.arg("-h");
  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());

  let out = cmd.output()?;
  let stdr = String::from_utf8_lossy(&out.stderr);
  if !stdr.contains("--enable-libvmaf") {
    return Err(anyhow!("ffmpeg is not compiled with --enable-libvmaf, but target quality or VMAF plotting was enabled"));
  }
  Ok(())
}

/// Runs libvmaf comparing `encoded` against `reference` and writes an SVG
/// percentile plot alongside the JSON score log.
pub fn plot(
  encoded: &Path,
  reference: &Path,
  model: Option<impl AsRef<Path>>,
  res: &str,
  sample_rate: usize,
  filter: Option<&str>,
  threads: usize,
) -> anyhow::Result<()> {
  let json_file = encoded.with_extension("json");
  let plot_file = encoded.with_extension("svg");

  let pipe_cmd: Vec<String> = vec![
    "ffmpeg".to_string(),
    "-i".to_string(),
    reference.to_string_lossy().into_owned(),
    "-strict".to_string(),
    "-1".to_string(),
    "-f".to_string(),
    "yuv4mpegpipe".to_string(),
    "-".to_string(),
  ];

  run_vmaf(encoded, &pipe_cmd, &json_file, model, res, sample_rate, filter, threads)?;
  plot_vmaf_score_file(&json_file, &plot_file).map_err(|e| anyhow!("plotting vmaf scores: {e}"))?;
  Ok(())
}

/// Pipes `reference_pipe_cmd`'s stdout into an `ffmpeg -filter_complex`
/// libvmaf comparison against `encoded`, writing per-frame scores to
/// `stat_file`.
pub fn run_vmaf(
  encoded: &Path,
  reference_pipe_cmd: &[impl AsRef<std::ffi::OsStr>],
  stat_file: impl AsRef<Path>,
  model: Option<impl AsRef<Path>>,
  res: &str,
  sample_rate: usize,
  vmaf_filter: Option<&str>,
  threads: usize,
) -> Result<(), EncoderCrash> {
  let mut filter = if sample_rate > 1 {
    format!(
      "select=not(mod(n\\,{sample_rate})),setpts={:.4}*PTS,",
      1.0 / sample_rate as f64,
    )
  } else {
    String::new()
  };

  if let Some(vmaf_filter) = vmaf_filter {
    filter.reserve(1 + vmaf_filter.len());
    filter.push_str(vmaf_filter);
    filter.push(',');
  }

  let vmaf = if let Some(model) = model {
    format!(
      "[distorted][ref]libvmaf=log_fmt='json':eof_action=endall:log_path={}:model_path={}:n_threads={threads}",
      escape_path_in_filter(stat_file.as_ref()).unwrap_or_default(),
      escape_path_in_filter(model.as_ref()).unwrap_or_default(),
    )
  } else {
    format!(
      "[distorted][ref]libvmaf=log_fmt='json':eof_action=endall:log_path={}:n_threads={threads}",
      escape_path_in_filter(stat_file.as_ref()).unwrap_or_default(),
    )
  };

  let mut source_pipe = if let [cmd, args @ ..] = reference_pipe_cmd {
    let mut source_pipe = Command::new(cmd);
    source_pipe.args(args);
    source_pipe.stdout(Stdio::piped());
    source_pipe.stderr(Stdio::null());
    source_pipe.spawn().map_err(|e| EncoderCrash {
      exit_status: std::process::ExitStatus::default(),
      stdout: String::new().into(),
      stderr: format!("failed to spawn vmaf reference pipe: {e}").into(),
      source_pipe_stderr: String::new().into(),
    })?
  } else {
    return Err(EncoderCrash {
      exit_status: std::process::ExitStatus::default(),
      stdout: String::new().into(),
      stderr: "empty vmaf reference pipe command".to_string().into(),
      source_pipe_stderr: String::new().into(),
    });
  };

  let mut cmd = Command::new("ffmpeg");
  cmd.args([
    "-loglevel",
    "error",
    "-hide_banner",
    "-y",
    "-thread_queue_size",
    "1024",
    "-r",
    "60",
    "-i",
  ]);
  cmd.arg(encoded);
  cmd.args(["-r", "60", "-i", "-", "-filter_complex"]);

  let distorted = format!(
    "[0:v]scale={res}:flags=bicubic:force_original_aspect_ratio=decrease,setpts=PTS-STARTPTS[distorted];"
  );
  let reference = format!(
    "[1:v]{filter}scale={res}:flags=bicubic:force_original_aspect_ratio=decrease,setpts=PTS-STARTPTS[ref];"
  );

  cmd.arg(format!("{distorted}{reference}{vmaf}"));
  cmd.args(["-f", "null", "-"]);
  cmd.stdin(source_pipe.stdout.take().expect("piped stdout"));
  cmd.stderr(Stdio::piped());
  cmd.stdout(Stdio::null());

  let output = cmd
    .spawn()
    .and_then(std::process::Child::wait_with_output)
    .map_err(|e| EncoderCrash {
      exit_status: std::process::ExitStatus::default(),
      stdout: String::new().into(),
      stderr: format!("failed to run vmaf ffmpeg pass: {e}").into(),
      source_pipe_stderr: String::new().into(),
    })?;

  if !output.status.success() {
    return Err(EncoderCrash {
      exit_status: output.status,
      stdout: String::new().into(),
      stderr: output.stderr.into(),
      source_pipe_stderr: String::new().into(),
    });
  }

  Ok(())
}

pub fn read_vmaf_file(file: impl AsRef<Path>) -> anyhow::Result<Vec<f64>> {
  let buffer = read_bytes(file)?;
  let parsed = serde_json::from_slice::<VmafResult>(&buffer)?;
  Ok(parsed.frames.into_iter().map(|x| x.metrics.vmaf).collect())
}

pub fn read_weighted_vmaf(file: impl AsRef<Path>, percentile: f64) -> anyhow::Result<f64> {
  let mut scores = read_vmaf_file(file)?;
  Ok(get_percentile(&mut scores, percentile))
}

/// Returns the value at `percentile` (0.0-1.0) of `scores`.
pub fn get_percentile(scores: &mut [f64], percentile: f64) -> f64 {
  assert!(!scores.is_empty());

  let k = ((scores.len() - 1) as f64 * percentile) as usize;
  let (_, kth_element, _) =
    scores.select_nth_unstable_by(k, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Less));
  *kth_element
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percentile_of_single_score_is_itself() {
    let mut scores = [72.5];
    assert_eq!(get_percentile(&mut scores, 0.5), 72.5);
  }

  #[test]
  fn percentile_picks_expected_rank() {
    let mut scores = [10.0, 20.0, 30.0, 40.0, 50.0];
    assert_eq!(get_percentile(&mut scores, 0.0), 10.0);
    assert_eq!(get_percentile(&mut scores, 1.0), 50.0);
  }
}
