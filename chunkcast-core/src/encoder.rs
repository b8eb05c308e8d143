#[cfg(test)]
mod tests;

use std::{borrow::Cow, cmp, fmt::Display, path::PathBuf, process::Command};

use arrayvec::ArrayVec;
use cfg_if::cfg_if;
use ffmpeg::format::Pixel;
use itertools::chain;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::list_index;
use crate::{into_array, into_vec};

const NULL: &str = if cfg!(windows) { "nul" } else { "/dev/null" };

const MAXIMUM_SPEED_AOM: u8 = 6;
const MAXIMUM_SPEED_RAV1E: u8 = 10;
const MAXIMUM_SPEED_VPX: u8 = 9;
const MAXIMUM_SPEED_OLD_SVT_AV1: u8 = 8;
const MAXIMUM_SPEED_SVT_AV1: u8 = 12;

/// The closed set of encoders the command builder knows how to drive. Each
/// variant carries (via its methods below) an executable name, a default
/// parameter set, the number of passes it supports, and a stderr-line
/// parser for "frames completed so far".
#[derive(
  Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, strum::EnumString, strum::IntoStaticStr,
)]
pub enum Encoder {
  #[strum(serialize = "aom")]
  Aom,
  #[strum(serialize = "rav1e")]
  Rav1e,
  #[strum(serialize = "vpx")]
  Vpx,
  #[strum(serialize = "svt-av1")]
  SvtAv1,
}

#[tracing::instrument(level = "debug")]
pub(crate) fn parse_svt_av1_version(version: &[u8]) -> Option<(u32, u32, u32)> {
  let v_idx = memchr::memchr(b'v', version)?;
  let s = version.get(v_idx + 1..)?;
  let s = simdutf8::basic::from_utf8(s).ok()?;
  let version = s
    .split_ascii_whitespace()
    .next()?
    .split('.')
    .filter_map(|s| s.split('-').next())
    .filter_map(|s| s.parse::<u32>().ok())
    .collect::<ArrayVec<u32, 3>>();

  if let [major, minor, patch] = version[..] {
    Some((major, minor, patch))
  } else {
    None
  }
}

pub static USE_OLD_SVT_AV1: Lazy<bool> = Lazy::new(|| {
  let version = match Command::new("SvtAv1EncApp").arg("--version").output() {
    Ok(v) => v,
    Err(_) => return true,
  };

  if let Some((major, minor, _)) = parse_svt_av1_version(&version.stdout) {
    match major {
      0 => minor < 9,
      1.. => false,
    }
  } else {
    true
  }
});

impl Display for Encoder {
  #[inline]
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(<&'static str>::from(self))
  }
}

impl Encoder {
  /// Composes the command for single-pass encoding.
  #[inline]
  pub fn compose_1_1_pass(self, params: Vec<String>, output: String) -> Vec<String> {
    match self {
      Self::Aom => {
        chain!(into_array!["aomenc", "--passes=1"], params, into_array!["-o", output, "-"]).collect()
      },
      Self::Rav1e => {
        chain!(into_array!["rav1e", "-", "-y"], params, into_array!["--output", output]).collect()
      },
      Self::Vpx => {
        chain!(into_array!["vpxenc", "--passes=1"], params, into_array!["-o", output, "-"]).collect()
      },
      Self::SvtAv1 => chain!(
        into_array!["SvtAv1EncApp", "-i", "stdin", "--progress", "2"],
        params,
        into_array!["-b", output],
      )
      .collect(),
    }
  }

  /// Composes the first-pass command for two-pass encoding.
  #[inline]
  pub fn compose_1_2_pass(self, params: Vec<String>, fpf: &str) -> Vec<String> {
    match self {
      Self::Aom => chain!(
        into_array!["aomenc", "--passes=2", "--pass=1"],
        params,
        into_array![format!("--fpf={fpf}.log"), "-o", NULL, "-"],
      )
      .collect(),
      Self::Rav1e => chain!(
        into_array!["rav1e", "-", "-y", "--quiet"],
        params,
        into_array!["--first-pass", format!("{fpf}.stat"), "--output", NULL]
      )
      .collect(),
      Self::Vpx => chain!(
        into_array!["vpxenc", "--passes=2", "--pass=1"],
        params,
        into_array![format!("--fpf={fpf}.log"), "-o", NULL, "-"],
      )
      .collect(),
      Self::SvtAv1 => chain!(
        into_array!["SvtAv1EncApp", "-i", "stdin", "--progress", "2", "--irefresh-type", "2"],
        params,
        into_array!["--pass", "1", "--stats", format!("{fpf}.stat"), "-b", NULL],
      )
      .collect(),
    }
  }

  /// Composes the second-pass command for two-pass encoding.
  #[inline]
  pub fn compose_2_2_pass(self, params: Vec<String>, fpf: &str, output: String) -> Vec<String> {
    match self {
      Self::Aom => chain!(
        into_array!["aomenc", "--passes=2", "--pass=2"],
        params,
        into_array![format!("--fpf={fpf}.log"), "-o", output, "-"],
      )
      .collect(),
      Self::Rav1e => chain!(
        into_array!["rav1e", "-", "-y", "--quiet"],
        params,
        into_array!["--second-pass", format!("{fpf}.stat"), "--output", output]
      )
      .collect(),
      Self::Vpx => chain!(
        into_array!["vpxenc", "--passes=2", "--pass=2"],
        params,
        into_array![format!("--fpf={fpf}.log"), "-o", output, "-"],
      )
      .collect(),
      Self::SvtAv1 => chain!(
        into_array!["SvtAv1EncApp", "-i", "stdin", "--progress", "2", "--irefresh-type", "2"],
        params,
        into_array!["--pass", "2", "--stats", format!("{fpf}.stat"), "-b", output],
      )
      .collect(),
    }
  }

  /// Returns the encoder's default parameters, given the tile grid shape.
  #[inline]
  pub fn get_default_arguments(self, (cols, rows): (u32, u32)) -> Vec<String> {
    match self {
      // aomenc infers bit depth from input; specifying it explicitly can
      // force the wrong depth, so it's left out here.
      Self::Aom => {
        let defaults: Vec<String> = into_vec![
          "--threads=8",
          "--cpu-used=6",
          "--end-usage=q",
          "--cq-level=30",
          "--disable-kf",
          "--kf-max-dist=9999"
        ];
        if cols > 1 || rows > 1 {
          let columns = cols.ilog2();
          let rows = rows.ilog2();
          let tiles: Vec<String> =
            into_vec![format!("--tile-columns={columns}"), format!("--tile-rows={rows}")];
          chain!(defaults, tiles).collect()
        } else {
          defaults
        }
      },
      Self::Rav1e => {
        let defaults: Vec<String> =
          into_vec!["--speed", "6", "--quantizer", "100", "--keyint", "0", "--no-scene-detection"];
        if cols > 1 || rows > 1 {
          let tiles: Vec<String> = into_vec!["--tiles", format!("{}", cols * rows)];
          chain!(defaults, tiles).collect()
        } else {
          defaults
        }
      },
      // vpxenc does not infer pixel format from the input, so `-b 10` is
      // still required to match the default 10-bit pixel format.
      Self::Vpx => {
        let defaults = into_vec![
          "--codec=vp9",
          "-b",
          "10",
          "--profile=2",
          "--threads=4",
          "--cpu-used=2",
          "--end-usage=q",
          "--cq-level=30",
          "--row-mt=1",
          "--auto-alt-ref=6",
          "--disable-kf",
          "--kf-max-dist=9999"
        ];
        if cols > 1 || rows > 1 {
          let columns = cols.ilog2();
          let rows = rows.ilog2();
          let tiles: Vec<String> =
            into_vec![format!("--tile-columns={columns}"), format!("--tile-rows={rows}")];
          chain!(defaults, tiles).collect()
        } else {
          defaults
        }
      },
      Self::SvtAv1 => {
        let defaults =
          into_vec!["--preset", "4", "--keyint", "0", "--scd", "0", "--rc", "0", "--crf", "25"];
        if cols > 1 || rows > 1 {
          let columns = cols.ilog2();
          let rows = rows.ilog2();
          let tiles: Vec<String> =
            into_vec!["--tile-columns", columns.to_string(), "--tile-rows", rows.to_string()];
          chain!(defaults, tiles).collect()
        } else {
          defaults
        }
      },
    }
  }

  /// Number of passes this encoder supports by default.
  #[inline]
  pub const fn get_default_pass(self) -> u8 {
    match self {
      Self::Aom | Self::Vpx => 2,
      Self::Rav1e | Self::SvtAv1 => 1,
    }
  }

  /// Default quantizer range for target-quality mode.
  #[inline]
  pub const fn get_default_cq_range(self) -> (usize, usize) {
    match self {
      Self::Aom | Self::Vpx => (15, 55),
      Self::Rav1e => (50, 140),
      Self::SvtAv1 => (15, 50),
    }
  }

  #[inline]
  pub const fn help_command(self) -> [&'static str; 2] {
    match self {
      Self::Aom => ["aomenc", "--help"],
      Self::Rav1e => ["rav1e", "--help"],
      Self::Vpx => ["vpxenc", "--help"],
      Self::SvtAv1 => ["SvtAv1EncApp", "--help"],
    }
  }

  /// Returns version text for the encoder, or `None` if it is not on PATH.
  #[inline]
  pub fn version_text(self) -> Option<String> {
    match self {
      Self::Aom => {
        let result = Command::new("aomenc").arg("--help").output().ok()?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        let version_line = stdout.lines().find(|line| line.starts_with("    av1"))?;
        Some(version_line.split_once('-').unwrap().1.replace("(default)", "").trim().to_string())
      },
      Self::Rav1e => {
        let result = Command::new("rav1e").arg("--version").output().ok()?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        stdout.lines().find(|line| line.starts_with("rav1e")).map(str::to_string)
      },
      Self::Vpx => {
        let result = Command::new("vpxenc").arg("--help").output().ok()?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        let version_line = stdout.lines().find(|line| line.starts_with("    vp9"))?;
        Some(version_line.split_once('-').unwrap().1.replace("(default)", "").trim().to_string())
      },
      Self::SvtAv1 => {
        let result = Command::new("SvtAv1EncApp").arg("--version").output().ok()?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        stdout.lines().find(|line| line.starts_with("SVT-AV1")).map(str::to_string)
      },
    }
  }

  #[inline]
  pub const fn bin(self) -> &'static str {
    match self {
      Self::Aom => "aomenc",
      Self::Rav1e => "rav1e",
      Self::Vpx => "vpxenc",
      Self::SvtAv1 => "SvtAv1EncApp",
    }
  }

  #[inline]
  pub const fn format(self) -> &'static str {
    match self {
      Self::Aom | Self::Rav1e | Self::SvtAv1 => "av1",
      Self::Vpx => "vpx",
    }
  }

  #[inline]
  pub const fn output_extension(&self) -> &'static str {
    match self {
      Self::Aom | Self::Rav1e | Self::Vpx | Self::SvtAv1 => "ivf",
    }
  }

  /// Matches the quantizer/CRF token in a parameter list for this encoder.
  fn q_match_fn(self) -> fn(&str) -> bool {
    match self {
      Self::Aom | Self::Vpx => |p| p.starts_with("--cq-level="),
      Self::Rav1e => |p| p == "--quantizer",
      Self::SvtAv1 => |p| matches!(p, "--qp" | "-q" | "--crf"),
    }
  }

  fn replace_q(self, index: usize, q: usize) -> (usize, String) {
    match self {
      Self::Aom | Self::Vpx => (index, format!("--cq-level={q}")),
      Self::Rav1e | Self::SvtAv1 => (index + 1, q.to_string()),
    }
  }

  fn insert_q(self, q: usize) -> ArrayVec<String, 2> {
    let mut output = ArrayVec::new();
    match self {
      Self::Aom | Self::Vpx => {
        output.push(format!("--cq-level={q}"));
      },
      Self::Rav1e => {
        output.push("--quantizer".into());
        output.push(q.to_string());
      },
      Self::SvtAv1 => {
        output.push("--crf".into());
        output.push(q.to_string());
      },
    }
    output
  }

  /// Rewrites (or appends) the quantizer token in `params` to `q`. Shared
  /// by the target-quality search and the brightness-boost override.
  #[inline]
  pub fn man_command(self, mut params: Vec<String>, q: usize) -> Vec<String> {
    let index = list_index(&params, self.q_match_fn());
    if let Some(index) = index {
      let (replace_index, replace_q) = self.replace_q(index, q);
      params[replace_index] = replace_q;
    } else {
      let args = self.insert_q(q);
      params.extend_from_slice(&args);
    }
    params
  }

  /// Parses the number of frames completed so far from one line of stderr.
  pub(crate) fn parse_encoded_frames(self, line: &str) -> Option<u64> {
    use crate::parse::*;

    match self {
      Self::Aom | Self::Vpx => {
        cfg_if! {
          if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            if is_x86_feature_detected!("sse4.1") && is_x86_feature_detected!("ssse3") {
              return unsafe { parse_aom_vpx_frames_sse41(line.as_bytes()) };
            }
          }
        }
        parse_aom_vpx_frames(line)
      },
      Self::Rav1e => parse_rav1e_frames(line),
      Self::SvtAv1 => parse_svt_av1_frames(line),
    }
  }

  /// Builds the probe-encode command for target-quality probing.
  #[inline]
  pub fn construct_target_quality_command(
    self,
    threads: usize,
    q: usize,
    speed: Option<u8>,
  ) -> Vec<Cow<'static, str>> {
    match self {
      Self::Aom => into_array![
        "aomenc",
        "--passes=1",
        format!("--threads={threads}"),
        "--tile-columns=2",
        "--tile-rows=1",
        "--end-usage=q",
        "-b",
        "8",
        format!("--cpu-used={}", (speed.unwrap_or(4) * MAXIMUM_SPEED_AOM / 4)),
        format!("--cq-level={q}"),
        "--enable-filter-intra=0",
        "--enable-smooth-intra=0",
        "--enable-paeth-intra=0",
        "--enable-cfl-intra=0",
        "--enable-angle-delta=0",
        "--reduced-tx-type-set=1",
        "--enable-intra-edge-filter=0",
        "--enable-order-hint=0",
        "--enable-flip-idtx=0",
        "--enable-global-motion=0",
        "--enable-cdef=0",
        "--max-reference-frames=3",
        "--cdf-update-mode=2",
        "--enable-tpl-model=0",
        "--sb-size=64",
        "--min-partition-size=32",
        "--disable-kf",
        "--kf-max-dist=9999"
      ]
      .into_iter()
      .collect(),
      Self::Rav1e => into_array![
        "rav1e",
        "-y",
        "-s",
        (speed.unwrap_or(4) * MAXIMUM_SPEED_RAV1E / 4).to_string(),
        "--threads",
        threads.to_string(),
        "--tiles",
        "16",
        "--quantizer",
        q.to_string(),
        "--low-latency",
        "--rdo-lookahead-frames",
        "5",
        "--no-scene-detection"
      ]
      .into_iter()
      .collect(),
      Self::Vpx => into_array![
        "vpxenc",
        "-b",
        "10",
        "--profile=2",
        "--passes=1",
        "--pass=1",
        "--codec=vp9",
        format!("--threads={threads}"),
        format!("--cpu-used={}", (speed.unwrap_or(4) * MAXIMUM_SPEED_VPX / 4)),
        "--end-usage=q",
        format!("--cq-level={q}"),
        "--row-mt=1",
        "--disable-kf",
        "--kf-max-dist=9999"
      ]
      .into_iter()
      .collect(),
      Self::SvtAv1 => {
        let preset = if *USE_OLD_SVT_AV1 {
          (speed.unwrap_or(4) * MAXIMUM_SPEED_OLD_SVT_AV1 / 4).to_string()
        } else {
          (speed.unwrap_or(4) * MAXIMUM_SPEED_SVT_AV1 / 4).to_string()
        };
        let mut cmd: Vec<Cow<'static, str>> = into_array![
          "SvtAv1EncApp",
          "-i",
          "stdin",
          "--lp",
          threads.to_string(),
          "--preset",
          preset,
          "--keyint",
          "240",
          "--crf",
          q.to_string(),
          "--tile-rows",
          "1",
          "--tile-columns",
          "2"
        ]
        .into_iter()
        .collect();
        if *USE_OLD_SVT_AV1 {
          cmd.extend(
            into_array![
              "--pred-struct",
              "0",
              "--sg-filter-mode",
              "0",
              "--enable-restoration-filtering",
              "0",
              "--cdef-level",
              "0",
              "--disable-dlf",
              "0",
              "--mrp-level",
              "0",
              "--enable-mfmv",
              "0",
              "--enable-local-warp",
              "0",
              "--enable-global-motion",
              "0",
              "--enable-interintra-comp",
              "0",
              "--obmc-level",
              "0",
              "--rdoq-level",
              "0",
              "--filter-intra-level",
              "0",
              "--enable-intra-edge-filter",
              "0",
              "--enable-pic-based-rate-est",
              "0",
              "--pred-me",
              "0",
              "--bipred-3x3",
              "0",
              "--compound",
              "0",
              "--ext-block",
              "0",
              "--hbd-md",
              "0",
              "--palette-level",
              "0",
              "--umv",
              "0",
              "--tf-level",
              "3"
            ]
            .into_iter()
            .map(Cow::<'static, str>::from),
          );
        }
        cmd
      },
    }
  }

  /// Builds the probe-encode command for the correctness-focused "slow
  /// probe" variant, which reuses the job's real video params minus the
  /// quantizer/speed tokens.
  #[inline]
  pub fn construct_target_quality_command_probe_slow(
    self,
    q: usize,
    speed: Option<u8>,
  ) -> Vec<Cow<'static, str>> {
    match self {
      Self::Aom => {
        let mut cmd: Vec<Cow<'static, str>> =
          into_array!["aomenc", "--passes=1", format!("--cq-level={q}")].into_iter().collect();
        if let Some(speed) = speed {
          cmd.push(format!("--cpu-used={}", (speed * MAXIMUM_SPEED_AOM / 4)).into());
        }
        cmd
      },
      Self::Rav1e => {
        let mut cmd: Vec<Cow<'static, str>> =
          into_array!["rav1e", "-y", "--quantizer", q.to_string()].into_iter().collect();
        if let Some(speed) = speed {
          cmd.push(format!("--speed={}", (speed * MAXIMUM_SPEED_RAV1E / 4)).into());
        }
        cmd
      },
      Self::Vpx => {
        let mut cmd: Vec<Cow<'static, str>> = into_array![
          "vpxenc",
          "--passes=1",
          "--pass=1",
          "--codec=vp9",
          "--end-usage=q",
          format!("--cq-level={q}")
        ]
        .into_iter()
        .collect();
        if let Some(speed) = speed {
          cmd.push(format!("--cpu-used={}", (speed * MAXIMUM_SPEED_VPX / 4)).into());
        }
        cmd
      },
      Self::SvtAv1 => {
        let mut cmd: Vec<Cow<'static, str>> =
          into_array!["SvtAv1EncApp", "-i", "stdin", "--crf", q.to_string()].into_iter().collect();
        if let Some(speed) = speed {
          let max = if *USE_OLD_SVT_AV1 { MAXIMUM_SPEED_OLD_SVT_AV1 } else { MAXIMUM_SPEED_SVT_AV1 };
          cmd.push("--preset".into());
          cmd.push((speed * max / 4).to_string().into());
        }
        cmd
      },
    }
  }

  /// Removes all instances of `patterns` (and, for bare flags, their
  /// following value token) from `args`.
  #[inline]
  pub fn remove_patterns(args: &mut Vec<String>, patterns: &[&str]) {
    for pattern in patterns {
      if let Some(index) = args.iter().position(|value| value.contains(pattern)) {
        args.remove(index);
        if !pattern.contains('=') {
          args.remove(index);
        }
      }
    }
  }

  #[allow(clippy::too_many_arguments)]
  #[inline]
  /// Builds the `(ffmpeg_side, encoder_side)` command tuple for a
  /// target-quality probe.
  pub fn probe_cmd(
    self,
    temp: String,
    chunk_index: usize,
    q: usize,
    pix_fmt: Pixel,
    probing_rate: usize,
    probing_speed: Option<u8>,
    vmaf_threads: usize,
    mut video_params: Vec<String>,
    probe_slow: bool,
  ) -> (Vec<String>, Vec<Cow<'static, str>>) {
    let pipe = crate::probe::compose_ffmpeg_pipe(
      ["-vf", format!("select=not(mod(n\\,{probing_rate}))").as_str(), "-vsync", "0"],
      pix_fmt,
    );

    let probe_name = format!("v_{chunk_index:05}_{q}.ivf");
    let mut probe = PathBuf::from(temp);
    probe.push("split");
    probe.push(&probe_name);
    let probe_path = probe.to_str().unwrap().to_owned();

    let params: Vec<Cow<str>> = if probe_slow {
      let quantizer_patterns = ["--cq-level=", "--passes=", "--pass=", "--crf", "--quantizer"];
      Self::remove_patterns(&mut video_params, &quantizer_patterns);

      if probing_speed.is_some() {
        let speed_patterns = ["--cpu-used=", "--preset", "-s", "--speed"];
        Self::remove_patterns(&mut video_params, &speed_patterns);
      }

      let mut ps = self.construct_target_quality_command_probe_slow(q, probing_speed);
      ps.reserve(video_params.len());
      for arg in video_params {
        ps.push(Cow::Owned(arg));
      }
      ps
    } else {
      self.construct_target_quality_command(vmaf_threads, q, probing_speed)
    };

    let output: Vec<Cow<str>> = match self {
      Self::SvtAv1 => chain!(params, into_array!["-b", probe_path]).collect(),
      Self::Aom | Self::Rav1e | Self::Vpx => {
        chain!(params, into_array!["-o", probe_path, "-"]).collect()
      },
    };

    (pipe, output)
  }

  #[inline]
  pub fn get_format_bit_depth(self, format: Pixel) -> Result<usize, UnsupportedPixelFormatError> {
    match self {
      Self::Aom => get_aom_format_bit_depth(format),
      Self::Vpx => get_vpx_format_bit_depth(format),
      Self::Rav1e => get_rav1e_format_bit_depth(format),
      Self::SvtAv1 => get_svt_av1_format_bit_depth(format),
    }
  }
}

#[derive(Error, Debug)]
pub enum UnsupportedPixelFormatError {
  #[error("{0} does not support {1:?}")]
  UnsupportedFormat(Encoder, Pixel),
}

macro_rules! create_get_format_bit_depth_function {
  ($fn_name:ident, $encoder:ident, 8: $_8bit_fmts:expr, 10: $_10bit_fmts:expr, 12: $_12bit_fmts:expr) => {
    fn $fn_name(format: Pixel) -> Result<usize, UnsupportedPixelFormatError> {
      use Pixel::*;
      if $_8bit_fmts.contains(&format) {
        Ok(8)
      } else if $_10bit_fmts.contains(&format) {
        Ok(10)
      } else if $_12bit_fmts.contains(&format) {
        Ok(12)
      } else {
        Err(UnsupportedPixelFormatError::UnsupportedFormat(Encoder::$encoder, format))
      }
    }
  };
}

// Supported bit depths taken from ffmpeg, e.g. `ffmpeg -h encoder=libvpx-vp9`.
create_get_format_bit_depth_function!(
  get_vpx_format_bit_depth,
  Vpx,
   8: [YUV420P, YUVA420P, YUV422P, YUV440P, YUV444P, GBRP],
  10: [YUV420P10LE, YUV422P10LE, YUV440P10LE, YUV444P10LE, GBRP10LE],
  12: [YUV420P12LE, YUV422P12LE, YUV440P12LE, YUV444P12LE, GBRP12LE]
);
create_get_format_bit_depth_function!(
  get_aom_format_bit_depth,
  Aom,
   8: [YUV420P, YUV422P, YUV444P, GBRP, GRAY8],
  10: [YUV420P10LE, YUV422P10LE, YUV444P10LE, GBRP10LE, GRAY10LE],
  12: [YUV420P12LE, YUV422P12LE, YUV444P12LE, GBRP12LE, GRAY12LE]
);
create_get_format_bit_depth_function!(
  get_rav1e_format_bit_depth,
  Rav1e,
   8: [YUV420P, YUVJ420P, YUV422P, YUVJ422P, YUV444P, YUVJ444P],
  10: [YUV420P10LE, YUV422P10LE, YUV444P10LE],
  12: [YUV420P12LE, YUV422P12LE, YUV444P12LE]
);
create_get_format_bit_depth_function!(
  get_svt_av1_format_bit_depth,
  SvtAv1,
   8: [YUV420P],
  10: [YUV420P10LE],
  12: []
);
