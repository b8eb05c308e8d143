//! Pure queries against the external media tool (`ffmpeg`/`ffmpeg-next`):
//! frame counts, keyframe positions, audio presence, and average brightness.
//! No in-process pixel decoding happens here or anywhere else in the crate.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

use ffmpeg::format::input;
use ffmpeg::format::Pixel;
use ffmpeg::media::Type as MediaType;
use ffmpeg::Error::StreamNotFound;
use path_abs::{PathAbs, PathInfo};
use tracing::warn;

use crate::into_vec;

/// Builds `ffmpeg -y -hide_banner -loglevel error -i - <extra> -f yuv4mpegpipe
/// -strict -1 -pix_fmt <pix_fmt> -`, the standard "read from stdin, apply a
/// filter, re-pipe" shape used by both the splitter's audio extraction and
/// the target-quality probe chain.
pub fn compose_ffmpeg_pipe<I, S>(extra: I, pix_fmt: Pixel) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  let mut p: Vec<String> = into_vec!["ffmpeg", "-y", "-hide_banner", "-loglevel", "error", "-i", "-"];
  p.extend(extra.into_iter().map(Into::into));
  p.extend(into_vec![
    "-pix_fmt",
    format!("{pix_fmt:?}").to_lowercase(),
    "-f",
    "yuv4mpegpipe",
    "-strict",
    "-1",
    "-"
  ]);
  p
}

/// Returns the frame count of the best video stream by iterating packets.
pub fn num_frames(source: &Path) -> anyhow::Result<usize> {
  let mut ictx = input(&source)?;
  let input = ictx.streams().best(MediaType::Video).ok_or(StreamNotFound)?;
  let video_stream_index = input.index();

  Ok(ictx.packets().filter(|(stream, _)| stream.index() == video_stream_index).count())
}

/// Returns the fast frame count from container metadata, when the demuxer
/// reports one, without walking every packet.
pub fn fast_frame_count(source: &Path) -> anyhow::Result<Option<usize>> {
  let ictx = input(&source)?;
  let input = ictx.streams().best(MediaType::Video).ok_or(StreamNotFound)?;
  let frames = input.frames();
  if frames > 0 {
    Ok(Some(frames as usize))
  } else {
    Ok(None)
  }
}

/// Returns the zero-based frame indices of every keyframe in the best video
/// stream, or `[0]` if none were found.
pub fn get_keyframes<P: AsRef<Path>>(source: P) -> anyhow::Result<Vec<usize>> {
  let mut ictx = input(&source)?;
  let input = ictx.streams().best(MediaType::Video).ok_or(StreamNotFound)?;
  let video_stream_index = input.index();

  let kfs = ictx
    .packets()
    .filter(|(stream, _)| stream.index() == video_stream_index)
    .map(|(_, packet)| packet)
    .enumerate()
    .filter(|(_, packet)| packet.is_key())
    .map(|(i, _)| i)
    .collect::<Vec<_>>();

  Ok(if kfs.is_empty() { vec![0] } else { kfs })
}

/// Returns true if `file` has an audio stream.
pub fn has_audio(file: &Path) -> anyhow::Result<bool> {
  let ictx = input(&file)?;
  Ok(ictx.streams().best(MediaType::Audio).is_some())
}

/// Extracts `file`'s audio track to `<temp>/audio.mkv` using `audio_params`,
/// blocking the calling thread. Returns `false` (and does not write the
/// file) if `file` has no audio track; reused on resume if already present.
#[must_use]
pub fn encode_audio<S: AsRef<OsStr>>(
  input: impl AsRef<Path>,
  temp: impl AsRef<Path>,
  audio_params: &[S],
) -> anyhow::Result<bool> {
  let input = input.as_ref();
  let temp = temp.as_ref();

  if !has_audio(input)? {
    return Ok(false);
  }

  let audio_file = temp.join("audio.mkv");
  let mut cmd = Command::new("ffmpeg");
  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());
  cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"]);
  cmd.arg(input);
  cmd.args(["-map_metadata", "0", "-dn", "-vn", "-sn"]);
  cmd.args(audio_params);
  cmd.arg(&audio_file);

  let output = cmd.output()?;
  if !output.status.success() {
    warn!("ffmpeg failed to extract audio: {:#?}", output);
    return Ok(false);
  }

  Ok(true)
}

/// Escapes an absolute path for use inside an ffmpeg filtergraph string.
pub fn escape_path_in_filter(path: impl AsRef<Path>) -> anyhow::Result<String> {
  let abs = PathAbs::new(path.as_ref())?;
  let s = abs.to_str().ok_or_else(|| anyhow::anyhow!("non-UTF8 path: {:?}", path.as_ref()))?;
  Ok(if cfg!(target_os = "windows") {
    s.replace('\\', "/").replace(':', r"\\:")
  } else {
    s.to_string()
  })
}

/// Average luma (`YAVG`) of `source`, queried via `ffmpeg -vf signalstats -f
/// null -`. Used by the brightness boost (`boost.rs`); never decodes pixels
/// in-process, only parses the filter's stderr summary line.
pub fn average_luma(source: &Path) -> anyhow::Result<f32> {
  let output = Command::new("ffmpeg")
    .args(["-hide_banner", "-i"])
    .arg(source)
    .args(["-vf", "signalstats", "-f", "null", "-"])
    .output()?;

  let stderr = String::from_utf8_lossy(&output.stderr);
  parse_signalstats_yavg(&stderr)
    .ok_or_else(|| anyhow::anyhow!("could not find YAVG in ffmpeg signalstats output"))
}

fn parse_signalstats_yavg(stderr: &str) -> Option<f32> {
  stderr
    .lines()
    .rev()
    .find_map(|line| line.split("YAVG:").nth(1))
    .and_then(|rest| rest.split_ascii_whitespace().next())
    .and_then(|tok| tok.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_yavg_from_signalstats_line() {
    let line = "frame:  119 pts:   3968 pts_time:3.96800   YAVG:40.59 YDIF:2.23 YMIN:0.00";
    assert_eq!(parse_signalstats_yavg(line), Some(40.59));
  }

  #[test]
  fn returns_none_without_yavg() {
    assert_eq!(parse_signalstats_yavg("no stats here"), None);
  }

  #[test]
  fn takes_the_last_yavg_line() {
    let stderr = "YAVG:10.0\nYAVG:55.25\n";
    assert_eq!(parse_signalstats_yavg(stderr), Some(55.25));
  }
}
