//! Concatenates encoded chunks (in cut order) with the extracted audio
//! track into the final output file, via an external muxer (`ffmpeg` or
//! `mkvmerge`).

use std::fmt::Display;
use std::fs::{self, DirEntry, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context};
use path_abs::PathAbs;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(
  PartialEq, Eq, Copy, Clone, Serialize, Deserialize, Debug, strum::EnumString, strum::IntoStaticStr,
)]
pub enum ConcatMethod {
  #[strum(serialize = "mkvmerge")]
  MKVMerge,
  #[strum(serialize = "ffmpeg")]
  FFmpeg,
}

impl Display for ConcatMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(<&'static str>::from(self))
  }
}

fn read_encoded_chunks(encode_dir: &Path) -> anyhow::Result<Vec<DirEntry>> {
  Ok(
    fs::read_dir(encode_dir)
      .with_context(|| format!("failed to read encoded chunks from {encode_dir:?}"))?
      .collect::<Result<Vec<_>, _>>()?,
  )
}

/// Muxes `<temp>/encode/*.mkv` (sorted by chunk name) plus `<temp>/audio.mkv`
/// (if present and non-trivial) into `output`, via `mkvmerge`.
pub fn mkvmerge(temp: &Path, output: &Path, num_chunks: usize) -> anyhow::Result<()> {
  anyhow::ensure!(num_chunks != 0, "cannot concatenate zero chunks");

  let encode_dir = temp.join("encode");
  let mut files = read_encoded_chunks(&encode_dir)?;
  files.sort_by_key(DirEntry::path);

  let audio_file = temp.join("audio.mkv");
  let has_audio = audio_file.exists() && audio_file.metadata().map(|m| m.len() > 1000).unwrap_or(false);

  let mut cmd = Command::new("mkvmerge");
  cmd.arg("-o").arg(PathAbs::new(output)?.as_path());
  if has_audio {
    cmd.arg(PathAbs::new(&audio_file)?.as_path());
    cmd.arg("+");
  }
  for (i, file) in files.iter().enumerate() {
    if i > 0 {
      cmd.arg("+");
    }
    cmd.arg(file.path());
  }

  debug!("mkvmerge concat command: {cmd:?}");

  let out = cmd.output().with_context(|| "failed to execute mkvmerge for concatenation")?;
  if !out.status.success() {
    error!("mkvmerge concatenation failed with output: {out:#?}");
    return Err(anyhow!("mkvmerge concatenation failed"));
  }

  Ok(())
}

/// Muxes `<temp>/encode/*.mkv` (sorted by chunk name) plus `<temp>/audio.mkv`
/// (if present and non-trivial) into `output`, via `ffmpeg -f concat`.
pub fn ffmpeg(temp: &Path, output: &Path) -> anyhow::Result<()> {
  fn write_concat_file(temp: &Path) -> anyhow::Result<()> {
    let concat_file = temp.join("concat");
    let encode_folder = temp.join("encode");

    let mut files = read_encoded_chunks(&encode_folder)?;
    files.sort_by_key(DirEntry::path);

    let mut contents = String::with_capacity(24 * files.len());
    for entry in files {
      contents.push_str(&format!(
        "file {}\n",
        entry.path().display().to_string().replace('\\', r"\\").replace(' ', r"\ ").replace('\'', r"\'")
      ));
    }

    let mut file = File::create(concat_file)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
  }

  let temp = PathAbs::new(temp)?;
  let temp = temp.as_path();

  write_concat_file(temp)?;
  let concat = temp.join("concat");
  let concat_file = concat.to_str().ok_or_else(|| anyhow!("non-UTF8 temp path: {temp:?}"))?;

  let audio_file = {
    let file = temp.join("audio.mkv");
    if file.exists() && file.metadata().map(|m| m.len() > 1000).unwrap_or(false) {
      Some(file)
    } else {
      None
    }
  };

  let mut cmd = Command::new("ffmpeg");
  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());

  if let Some(file) = audio_file {
    cmd
      .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i", concat_file, "-i"])
      .arg(file)
      .args(["-map", "0", "-map", "1", "-c", "copy"])
      .arg(output);
  } else {
    cmd
      .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i", concat_file])
      .args(["-map", "0", "-c", "copy"])
      .arg(output);
  }

  debug!("ffmpeg concat command: {cmd:?}");

  let out = cmd.output().with_context(|| "failed to execute ffmpeg for concatenation")?;
  if !out.status.success() {
    error!("ffmpeg concatenation failed with output: {out:#?}");
    return Err(anyhow!("ffmpeg concatenation failed"));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn concat_method_display_round_trips_through_strum() {
    assert_eq!(ConcatMethod::FFmpeg.to_string(), "ffmpeg");
    assert_eq!(ConcatMethod::MKVMerge.to_string(), "mkvmerge");
  }
}
