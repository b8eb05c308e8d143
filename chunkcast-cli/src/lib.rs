use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::{anyhow, Context};
use clap::Parser;
use once_cell::sync::OnceCell;

use chunkcast_core::concat::ConcatMethod;
use chunkcast_core::config::ConfigFile;
use chunkcast_core::encoder::Encoder;
use chunkcast_core::{JobConfig, Pipeline, SplitMethod, Verbosity};

// needs to be static, runtime allocated string to avoid evil hacks to
// concatenate non-trivial strings at compile-time
fn version() -> &'static str {
  static INSTANCE: OnceCell<String> = OnceCell::new();
  INSTANCE.get_or_init(|| {
    match (
      option_env!("VERGEN_GIT_SHA_SHORT"),
      option_env!("VERGEN_CARGO_PROFILE"),
      option_env!("VERGEN_RUSTC_SEMVER"),
      option_env!("VERGEN_RUSTC_LLVM_VERSION"),
      option_env!("VERGEN_CARGO_TARGET_TRIPLE"),
      option_env!("VERGEN_BUILD_DATE"),
      option_env!("VERGEN_GIT_COMMIT_DATE"),
    ) {
      (
        Some(git_hash),
        Some(cargo_profile),
        Some(rustc_ver),
        Some(llvm_ver),
        Some(target_triple),
        Some(build_date),
        Some(commit_date),
      ) => format!(
        "{}-unstable (rev {}) ({})

* Compiler
  rustc {} (LLVM {})

* Target Triple
  {}

* Date Info
   Build Date:  {}
  Commit Date:  {}",
        env!("CARGO_PKG_VERSION"),
        git_hash,
        cargo_profile,
        rustc_ver,
        llvm_ver,
        target_triple,
        build_date,
        commit_date
      ),
      // only include the semver on a release (when git information isn't available)
      _ => env!("CARGO_PKG_VERSION").into(),
    }
  })
}

/// Cross-platform chunked AV1 / VP9 encoding pipeline with per-chunk target quality search
#[derive(Parser, Debug)]
#[clap(name = "chunkcast", version = version())]
pub struct CliOpts {
  /// Input video file(s) or director(y/ies) of video files to encode
  #[clap(required = true, num_args = 1..)]
  pub input: Vec<PathBuf>,

  /// Output file path (ignored when multiple inputs are given; each input
  /// gets its own default output path next to it)
  #[clap(short, long)]
  pub output_file: Option<PathBuf>,

  /// Path to the temporary directory used for splitting and encoding
  ///
  /// If not specified, the temporary directory name is generated from a
  /// hash of the input file name.
  #[clap(long)]
  pub temp: Option<PathBuf>,

  /// Disable printing progress to the terminal
  #[clap(short, long, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Print extra debugging information
  #[clap(long, conflicts_with = "quiet")]
  pub verbose: bool,

  /// Resume a previously incomplete encode, reusing any already-verified
  /// chunks found in the temporary directory
  #[clap(short, long)]
  pub resume: bool,

  /// Do not delete the temporary directory after a successful encode
  #[clap(short, long)]
  pub keep: bool,

  /// Overwrite the output file without prompting for confirmation
  #[clap(long)]
  pub overwrite: bool,

  /// Skip encoder/ffmpeg parameter validation and PATH lookups
  #[clap(long)]
  pub force: bool,

  /// Do not verify each chunk's encoded frame count against its source
  /// frame count before marking it done
  #[clap(long)]
  pub no_check: bool,

  /// Number of encoder instances to run in parallel
  ///
  /// Defaults to a number of workers that fully saturates the available
  /// CPU cores, based on the number of threads the chosen encoder uses.
  #[clap(short, long, default_value_t = 0)]
  pub workers: usize,

  /// File location for scene cuts, defaults alongside the temp directory
  ///
  /// If the file exists, scene cuts are read from it instead of running
  /// scene detection again.
  #[clap(short, long, help_heading = "SCENE DETECTION")]
  pub scenes: Option<PathBuf>,

  /// Method used to determine chunk boundaries
  #[clap(long, default_value_t = SplitMethod::SceneDetect, help_heading = "SCENE DETECTION")]
  pub split_method: SplitMethod,

  /// Scene detection threshold, in average PSNR
  #[clap(long, default_value_t = 50.0, help_heading = "SCENE DETECTION")]
  pub threshold: f64,

  /// Minimum number of frames a chunk can have
  #[clap(long, default_value_t = 24, help_heading = "SCENE DETECTION")]
  pub min_scene_len: usize,

  /// Maximum number of frames a chunk can have, inserting additional cuts
  /// if scene detection alone would produce a longer one. 0 disables this.
  #[clap(short = 'x', long, default_value_t = 240, help_heading = "SCENE DETECTION")]
  pub extra_split: usize,

  /// Video encoder to use
  #[clap(short, long, default_value = "aom", help_heading = "ENCODING")]
  pub encoder: String,

  /// Parameters for the video encoder
  ///
  /// These parameters are for the encoder binary directly, so the ffmpeg
  /// syntax cannot be used. To specify parameters for encoders, the same
  /// syntax as the command line interface for the encoder is used.
  #[clap(short, long, allow_hyphen_values = true, help_heading = "ENCODING")]
  pub video_params: Option<String>,

  /// Number of encoder passes
  #[clap(short, long, help_heading = "ENCODING")]
  pub passes: Option<u8>,

  /// Audio encoding parameters (ffmpeg syntax)
  #[clap(short, long, allow_hyphen_values = true, help_heading = "ENCODING")]
  pub audio_params: Option<String>,

  /// Pixel format to use for encoding
  #[clap(long, default_value = "yuv420p", help_heading = "ENCODING")]
  pub pix_format: String,

  /// Method used to concatenate encoded chunks into the final output
  #[clap(short, long, default_value = "ffmpeg", help_heading = "ENCODING")]
  pub concat: String,

  /// Enable VMAF-targeted quantizer search per chunk
  #[clap(long, help_heading = "TARGET QUALITY")]
  pub target_quality: bool,

  /// Target VMAF score for the per-chunk quantizer search
  #[clap(long, default_value_t = 95.0, help_heading = "TARGET QUALITY")]
  pub vmaf_target: f64,

  /// Lower bound of the quantizer search range
  #[clap(long, default_value_t = 25, help_heading = "TARGET QUALITY")]
  pub min_q: u32,

  /// Upper bound of the quantizer search range
  #[clap(long, default_value_t = 50, help_heading = "TARGET QUALITY")]
  pub max_q: u32,

  /// Maximum number of probe encodes per chunk during the quantizer search
  #[clap(long, default_value_t = 4, help_heading = "TARGET QUALITY")]
  pub steps: u32,

  /// Calculate VMAF score for the final encode of each chunk
  #[clap(long, help_heading = "TARGET QUALITY")]
  pub vmaf: bool,

  /// Plot VMAF score per frame for the final encode of each chunk
  #[clap(long, requires = "vmaf", help_heading = "TARGET QUALITY")]
  pub vmaf_plots: bool,

  /// Boost the quantizer of dark chunks, proportional to how dark they are
  #[clap(long, help_heading = "BOOST")]
  pub boost: bool,

  /// Maximum amount the quantizer may be lowered by the boost
  #[clap(long, default_value_t = 10, help_heading = "BOOST")]
  pub boost_limit: i32,

  /// Luma deficit, below the boost threshold, at which the full boost limit
  /// is reached
  #[clap(long, default_value_t = 15, help_heading = "BOOST")]
  pub boost_range: i32,

  /// Path to a JSON config file persisting encoder/ffmpeg/audio parameters
  #[clap(long)]
  pub config: Option<PathBuf>,
}

fn confirm(prompt: &str) -> io::Result<bool> {
  let mut buf = String::with_capacity(4);
  let mut stdout = io::stdout();
  let stdin = io::stdin();
  loop {
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;
    stdin.read_line(&mut buf)?;

    match buf.as_str().trim() {
      // allows enter to continue
      "y" | "Y" | "" => break Ok(true),
      "n" | "N" => break Ok(false),
      other => {
        println!("Sorry, response {:?} is not understood.", other);
        buf.clear();
        continue;
      }
    }
  }
}

pub fn parse_cli(args: CliOpts) -> anyhow::Result<JobConfig> {
  let mut config = JobConfig {
    inputs: args.input,
    output: args.output_file.clone(),
    temp: args.temp,
    scenes_file: args.scenes,
    config_file: args.config.clone(),

    encoder: args
      .encoder
      .parse::<Encoder>()
      .map_err(|_| anyhow!("unknown encoder: {}", args.encoder))?,
    video_params: args
      .video_params
      .as_deref()
      .map(|v| shlex::split(v).ok_or_else(|| anyhow!("failed to split video encoder arguments")))
      .transpose()?
      .unwrap_or_default(),
    passes: args.passes.unwrap_or(2),
    audio_params: args
      .audio_params
      .as_deref()
      .map(|v| shlex::split(v).ok_or_else(|| anyhow!("failed to split audio encoder arguments")))
      .transpose()?
      .unwrap_or_else(|| vec!["copy".to_string()]),
    pix_format: args.pix_format,
    concat_method: args
      .concat
      .parse::<ConcatMethod>()
      .map_err(|_| anyhow!("unknown concat method: {}", args.concat))?,

    split_method: args.split_method,
    threshold: args.threshold,
    min_scene_len: args.min_scene_len,
    extra_split: args.extra_split,

    workers: args.workers,

    target_quality: args.target_quality,
    vmaf_target: args.vmaf_target,
    min_q: args.min_q,
    max_q: args.max_q,
    steps: args.steps,
    vmaf: args.vmaf || args.target_quality,
    vmaf_plots: args.vmaf_plots,

    boost: args.boost,
    boost_limit: args.boost_limit,
    boost_range: args.boost_range,

    resume: args.resume,
    keep_temp: args.keep,
    no_check: args.no_check,
    force: args.force,
    verbosity: if args.quiet {
      Verbosity::Quiet
    } else if args.verbose {
      Verbosity::Verbose
    } else {
      Verbosity::Normal
    },
  };

  if let Some(config_path) = &args.config {
    let fallback = ConfigFile {
      video_params: Some(config.video_params.clone()),
      encoder: Some(config.encoder),
      ffmpeg: None,
      audio_params: Some(config.audio_params.clone()),
    };
    let from_file = ConfigFile::load_or_write(config_path, &fallback)
      .with_context(|| format!("loading config file {config_path:?}"))?;
    // CLI flags win: only fall back to the config file's values for fields
    // the operator didn't pass explicitly on the command line.
    if args.video_params.is_none() {
      config.video_params = from_file.video_params.unwrap_or_default();
    }
    if args.audio_params.is_none() {
      config.audio_params = from_file.audio_params.unwrap_or_else(|| vec!["copy".to_string()]);
    }
  }

  if !args.overwrite {
    if let Some(path) = &args.output_file {
      if path.exists()
        && !confirm(&format!(
          "Output file {:?} exists. Do you want to overwrite it? [Y/n]: ",
          path
        ))?
      {
        println!("Not overwriting, aborting.");
        exit(0);
      }
    } else {
      for input in chunkcast_core::expand_inputs(&config.inputs)? {
        let path = config.output_for(&input);
        if path.exists()
          && !confirm(&format!(
            "Default output file {:?} exists. Do you want to overwrite it? [Y/n]: ",
            path
          ))?
        {
          println!("Not overwriting, aborting.");
          exit(0);
        }
      }
    }
  }

  Ok(config)
}

pub fn run() -> anyhow::Result<()> {
  let cli_args = CliOpts::parse();
  let config = parse_cli(cli_args)?;
  Pipeline::new(&config).run()
}
