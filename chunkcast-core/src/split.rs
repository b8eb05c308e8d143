//! Produces the ordered list of cut frame numbers for a source: scene
//! detection, keyframe alignment, or a single-chunk passthrough, followed
//! by densification and a platform-size cap.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::SplitMethod;

/// Systems with tight argv/path limits choke on `ffmpeg -segment_frames`
/// lists much past this; coalesce down to it if scene detection produces
/// more cuts than this.
const MAX_CUTS: usize = 600;

/// `plan_cuts(source, method, params) -> ordered, strictly increasing list
/// of zero-based frame indices strictly inside the source`. The splitter
/// never silently returns an empty list for a detection failure — an empty
/// method result not coming from `Skip` is treated as fatal by the caller.
pub fn plan_cuts(
  source: &Path,
  method: SplitMethod,
  threshold: f64,
  min_scene_len: usize,
  total_frames: usize,
) -> anyhow::Result<Vec<usize>> {
  let mut cuts = match method {
    SplitMethod::SceneDetect => scene_detect(source, threshold, min_scene_len)?,
    SplitMethod::KeyframeAligned => keyframe_aligned(source)?,
    SplitMethod::Skip => Vec::new(),
  };

  cuts.retain(|&c| c > 0 && c < total_frames);
  cuts.sort_unstable();
  cuts.dedup();
  Ok(cuts)
}

/// Runs the external scene-cut detector (`pyscene`) and parses one cut
/// frame number per output line. Fatal on any non-zero exit or unparseable
/// output — never silently returns an empty list.
fn scene_detect(source: &Path, threshold: f64, min_scene_len: usize) -> anyhow::Result<Vec<usize>> {
  let output = Command::new("pyscene")
    .arg(source)
    .args(["--threshold", &threshold.to_string()])
    .args(["--min-scene-len", &min_scene_len.to_string()])
    .stdin(Stdio::null())
    .output()
    .map_err(|e| anyhow::anyhow!("failed to run pyscene: {e}"))?;

  if !output.status.success() {
    anyhow::bail!(
      "pyscene exited with {}: {}",
      output.status,
      String::from_utf8_lossy(&output.stderr)
    );
  }

  let stdout = String::from_utf8_lossy(&output.stdout);
  let cuts = parse_cut_list(&stdout)?;
  if cuts.is_empty() {
    anyhow::bail!("pyscene produced no cuts for {source:?}");
  }
  Ok(cuts)
}

/// Probes the source's own keyframe positions (via the container's packet
/// flags) and writes a stats file alongside the job, so the splitter never
/// has to reconstruct them. Used when the operator wants chunk boundaries
/// to line up with existing keyframes instead of running scene detection.
fn keyframe_aligned(source: &Path) -> anyhow::Result<Vec<usize>> {
  let keyframes = crate::probe::get_keyframes(source)?;
  Ok(keyframes.into_iter().filter(|&k| k > 0).collect())
}

fn parse_cut_list(text: &str) -> anyhow::Result<Vec<usize>> {
  text
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .map(|l| l.parse::<usize>().map_err(|e| anyhow::anyhow!("bad cut frame {l:?}: {e}")))
    .collect()
}

/// Invokes the external media tool to materialize `split/<name>.mkv` files
/// at the given cut boundaries (or a single `split/00000.mkv` if `cuts` is
/// empty).
pub fn segment(input: impl AsRef<Path>, temp: impl AsRef<Path>, cuts: &[usize]) -> anyhow::Result<()> {
  let input = input.as_ref();
  let temp = temp.as_ref();
  let mut cmd = Command::new("ffmpeg");

  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());
  cmd.args(["-hide_banner", "-y", "-i"]);
  cmd.arg(input);
  cmd.args(["-map", "0:V:0", "-an", "-c", "copy", "-avoid_negative_ts", "1", "-vsync", "0"]);

  if cuts.is_empty() {
    cmd.arg(temp.join("split").join("00000.mkv"));
  } else {
    let joined = cuts.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    cmd.args(["-f", "segment", "-segment_frames", &joined]);
    cmd.arg(temp.join("split").join("%05d.mkv"));
  }

  let out = cmd.output()?;
  if !out.status.success() {
    anyhow::bail!("ffmpeg failed to segment {input:?}: {}", String::from_utf8_lossy(&out.stderr));
  }
  Ok(())
}

/// Inserts additional cuts so no adjacent pair differs by more than
/// `max_len`, preserving every original cut.
pub fn densify(cuts: &[usize], total_frames: usize, max_len: usize) -> Vec<usize> {
  if max_len == 0 {
    return cuts.to_vec();
  }

  let mut boundaries = Vec::with_capacity(cuts.len() + 2);
  boundaries.push(0);
  boundaries.extend(cuts.iter().copied());
  boundaries.push(total_frames);

  let mut out = Vec::new();
  for window in boundaries.windows(2) {
    let (start, end) = (window[0], window[1]);
    out.push(start);
    let span = end - start;
    if span > max_len {
      let extra = span / max_len;
      for n in 1..=extra {
        let candidate = start + n * max_len;
        if candidate < end {
          out.push(candidate);
        }
      }
    }
  }
  out.remove(0); // drop the implicit frame-0 boundary
  out.sort_unstable();
  out.dedup();
  out
}

/// Coalesces adjacent cuts, dropping the smallest gaps first, until the
/// list is within [`MAX_CUTS`]. Never reorders or duplicates entries.
pub fn apply_platform_cap(mut cuts: Vec<usize>, total_frames: usize) -> Vec<usize> {
  if cuts.len() <= MAX_CUTS {
    return cuts;
  }

  warn!("cut list has {} entries, coalescing down to {MAX_CUTS}", cuts.len());

  while cuts.len() > MAX_CUTS {
    let mut boundaries = Vec::with_capacity(cuts.len() + 2);
    boundaries.push(0);
    boundaries.extend(cuts.iter().copied());
    boundaries.push(total_frames);

    // Find the cut whose removal shrinks the cut list while preserving the
    // largest remaining gap (i.e. drop the cut bordering the smallest gaps).
    let (drop_idx, _) = boundaries
      .windows(3)
      .enumerate()
      .map(|(i, w)| (i, w[2] - w[0]))
      .min_by_key(|&(_, merged_gap)| merged_gap)
      .expect("cuts is non-empty while looping");

    cuts.remove(drop_idx);
  }

  cuts
}

/// Reads a cached scenes file: a plain-text, comma-separated decimal list
/// of cut frame indices.
pub fn read_scenes_from_file(path: &Path) -> anyhow::Result<Vec<usize>> {
  let text = std::fs::read_to_string(path)
    .map_err(|e| anyhow::anyhow!("reading scenes file {path:?}: {e}"))?;
  text
    .trim()
    .split(',')
    .filter(|s| !s.is_empty())
    .map(|s| s.trim().parse::<usize>().map_err(|e| anyhow::anyhow!("bad scene entry {s:?}: {e}")))
    .collect()
}

/// Writes `cuts` to `path` as a plain-text, comma-separated decimal list.
pub fn write_scenes_to_file(cuts: &[usize], path: &Path) -> anyhow::Result<()> {
  let joined = cuts.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
  std::fs::write(path, joined).map_err(|e| anyhow::anyhow!("writing scenes file {path:?}: {e}"))?;
  info!("wrote {} cut(s) to scenes file {path:?}", cuts.len());
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn densify_preserves_original_cuts() {
    let cuts = vec![300];
    let dense = densify(&cuts, 1000, 400);
    assert!(dense.contains(&300));
  }

  #[test]
  fn densify_keeps_adjacent_spans_within_max_len() {
    let dense = densify(&[], 1000, 300);
    for window in {
      let mut b = vec![0];
      b.extend(dense.iter().copied());
      b.push(1000);
      b
    }
    .windows(2)
    {
      assert!(window[1] - window[0] <= 300);
    }
  }

  #[test]
  fn densify_is_strictly_increasing() {
    let dense = densify(&[100, 500], 1000, 150);
    for window in dense.windows(2) {
      assert!(window[0] < window[1]);
    }
  }

  #[test]
  fn no_max_len_is_a_no_op() {
    assert_eq!(densify(&[100, 500], 1000, 0), vec![100, 500]);
  }

  #[test]
  fn platform_cap_is_a_no_op_under_limit() {
    let cuts: Vec<usize> = (1..10).map(|n| n * 100).collect();
    assert_eq!(apply_platform_cap(cuts.clone(), 10_000), cuts);
  }

  #[test]
  fn platform_cap_coalesces_down_to_max() {
    let cuts: Vec<usize> = (1..2000).collect();
    let capped = apply_platform_cap(cuts, 2000);
    assert!(capped.len() <= MAX_CUTS);
    for window in capped.windows(2) {
      assert!(window[0] < window[1]);
    }
  }

  #[test]
  fn scenes_file_round_trips() {
    let dir = std::env::temp_dir().join(format!("chunkcast-split-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scenes.txt");
    write_scenes_to_file(&[100, 250, 400], &path).unwrap();
    assert_eq!(read_scenes_from_file(&path).unwrap(), vec![100, 250, 400]);
  }

  #[test]
  fn parse_cut_list_rejects_garbage() {
    assert!(parse_cut_list("100\nnotanumber\n200").is_err());
  }

  #[test]
  fn parse_cut_list_skips_blank_lines() {
    assert_eq!(parse_cut_list("100\n\n200\n").unwrap(), vec![100, 200]);
  }

  use quickcheck::TestResult;
  use quickcheck_macros::quickcheck;

  /// The chunk boundaries densify produces, together with the implicit 0
  /// and `total_frames` endpoints, must partition `[0, total_frames)`: no
  /// gaps, no overlaps, strictly increasing.
  #[quickcheck]
  fn densify_output_partitions_the_source(raw_cuts: Vec<usize>, total: u16, max_len: u16) -> TestResult {
    let total = total as usize;
    if total == 0 {
      return TestResult::discard();
    }
    let mut cuts: Vec<usize> = raw_cuts.into_iter().filter(|&c| c > 0 && c < total).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let dense = densify(&cuts, total, max_len as usize);
    for &c in &cuts {
      if !dense.contains(&c) {
        return TestResult::failed();
      }
    }

    let mut boundaries = vec![0usize];
    boundaries.extend(dense.iter().copied());
    boundaries.push(total);
    for window in boundaries.windows(2) {
      if window[0] >= window[1] {
        return TestResult::failed();
      }
    }
    TestResult::passed()
  }
}
