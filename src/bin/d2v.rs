use std::path::{Path, PathBuf};

#[cfg(feature = "ffmpeg")]
use std::{fs::File, io::BufWriter, io::Write};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use d2vsource::{D2vIndex, FieldKind, RffSchedule, VideoInfo, plan_seek};
use serde_json::json;

#[cfg(feature = "ffmpeg")]
use d2vsource::{D2vSource, FfmpegLogLevel, SessionOptions};
#[cfg(feature = "ffmpeg")]
use indicatif::{ProgressBar, ProgressStyle};

const CLI_AFTER_HELP: &str = "Examples:\n  d2v info movie.d2v --json\n  d2v validate movie.d2v\n  d2v plan movie.d2v 1000-1010\n  d2v rff movie.d2v --start 0 --count 20\n  d2v decode movie.d2v --out clip.yuv --frames 0-99 --progress\n  d2v completions zsh > _d2v";

#[derive(Debug, Parser)]
#[command(
    name = "d2v",
    version,
    about = "Inspect D2V indexes and decode frames through them",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional diagnostic output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Decoder thread count (0 = automatic).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a summary of an index.
    #[command(about = "Print index summary", visible_alias = "probe")]
    Info {
        /// Path to the .d2v file.
        index: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check an index for problems.
    #[command(about = "Validate an index")]
    Validate {
        /// Path to the .d2v file.
        index: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how frames would be reached.
    #[command(
        about = "Show seek plans",
        after_help = "Examples:\n  d2v plan movie.d2v 250\n  d2v plan movie.d2v 250-260 --json"
    )]
    Plan {
        /// Path to the .d2v file.
        index: PathBuf,

        /// Frame number or inclusive range (`N` or `A-B`).
        frames: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the field pairs produced by repeat-field expansion.
    #[command(about = "Show the pulldown field schedule")]
    Rff {
        /// Path to the .d2v file.
        index: PathBuf,

        /// First output frame to show.
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Number of output frames to show.
        #[arg(long, default_value_t = 24)]
        count: usize,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode frames to a raw planar YUV file.
    #[cfg(feature = "ffmpeg")]
    #[command(
        about = "Decode frames to raw YUV",
        after_help = "Examples:\n  d2v decode movie.d2v --out clip.yuv --frames 0-99\n  d2v decode movie.d2v --out coded.yuv --no-rff --no-crop"
    )]
    Decode {
        /// Path to the .d2v file.
        index: PathBuf,

        /// Output file.
        #[arg(long)]
        out: PathBuf,

        /// Frame number or inclusive range (`N` or `A-B`). Defaults to all.
        #[arg(long)]
        frames: Option<String>,

        /// Return coded frames instead of applying repeat-field flags.
        #[arg(long)]
        no_rff: bool,

        /// Keep the aligned decode size.
        #[arg(long)]
        no_crop: bool,

        /// Forward gap decoded through instead of seeking.
        #[arg(long, default_value_t = 0)]
        linear_threshold: usize,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse `N` or `A-B` into an inclusive range.
fn parse_frame_range(value: &str) -> Option<(usize, usize)> {
    let value = value.trim();
    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let frame = value.parse().ok()?;
            (frame, frame)
        }
    };
    (start <= end).then_some((start, end))
}

#[cfg(feature = "ffmpeg")]
fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn field_kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Top => "top",
        FieldKind::Bottom => "bottom",
        FieldKind::Progressive => "progressive",
    }
}

fn open_index(path: &Path, verbose: bool) -> Result<D2vIndex, Box<dyn std::error::Error>> {
    let index = D2vIndex::open(path)?;
    if verbose {
        eprintln!(
            "{} {} ({} GOPs, {} frames)",
            "parsed".cyan().bold(),
            path.display(),
            index.gops().len(),
            index.frame_count()
        );
    }
    Ok(index)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        #[cfg(feature = "ffmpeg")]
        {
            let level = parse_log_level(level)
                .ok_or_else(|| format!("unsupported log level: {level}"))?;
            d2vsource::set_ffmpeg_log_level(level);
        }
        #[cfg(not(feature = "ffmpeg"))]
        {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("--log-level {level} requires building with the `ffmpeg` feature")
                    .yellow()
            );
        }
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Info { index, json } => {
            let index = open_index(&index, cli.global.verbose)?;
            let info = VideoInfo::from_index(&index);
            if json {
                let payload = json!({
                    "width": info.width,
                    "height": info.height,
                    "aligned_width": info.aligned_width,
                    "aligned_height": info.aligned_height,
                    "fps_num": info.frame_rate.numerator,
                    "fps_den": info.frame_rate.denominator,
                    "frame_count": info.frame_count,
                    "rff_frame_count": info.rff_frame_count,
                    "gop_count": info.gop_count,
                    "codec": info.codec.to_string(),
                    "stream_type": info.stream_type.to_string(),
                    "transport_pid": index.transport_pid(),
                    "duration_seconds": info.duration().as_secs_f64(),
                    "files": index
                        .files()
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Video: {}x{} ({}x{} aligned) @ {} fps [{}]",
                    info.width,
                    info.height,
                    info.aligned_width,
                    info.aligned_height,
                    info.frame_rate,
                    info.codec
                );
                println!("Stream: {}", info.stream_type);
                if let Some(pid) = index.transport_pid() {
                    println!("PID: {pid:#x}");
                }
                println!(
                    "Frames: {} coded, {} after pulldown, {} GOPs",
                    info.frame_count, info.rff_frame_count, info.gop_count
                );
                println!("Duration: {:?}", info.duration());
                for (number, path) in index.files().iter().enumerate() {
                    println!("File {number}: {}", path.display());
                }
            }
        }
        Commands::Validate { index, json } => {
            let index = open_index(&index, cli.global.verbose)?;
            let report = index.validate();
            if json {
                let payload = json!({
                    "valid": report.is_valid(),
                    "info": report.info,
                    "warnings": report.warnings,
                    "errors": report.errors,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!("{report}");
                if report.is_valid() {
                    println!("{}", "valid".green().bold());
                } else {
                    println!("{}", "invalid".red().bold());
                }
            }
            if !report.is_valid() {
                std::process::exit(2);
            }
        }
        Commands::Plan {
            index,
            frames,
            json,
        } => {
            let index = open_index(&index, cli.global.verbose)?;
            let (start, end) = parse_frame_range(&frames)
                .ok_or_else(|| format!("invalid frame range: {frames}"))?;

            let mut plans = Vec::new();
            for frame in start..=end {
                plans.push(plan_seek(&index, frame)?);
            }

            if json {
                let payload: Vec<_> = plans
                    .iter()
                    .map(|plan| {
                        json!({
                            "frame": plan.frame_number,
                            "gop": plan.gop,
                            "anchor_gop": plan.anchor_gop,
                            "file": plan.target.file,
                            "position": plan.target.position,
                            "skip": plan.skip,
                            "allow_linear": plan.allow_linear,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for plan in &plans {
                    let linear = if plan.allow_linear {
                        "linear".green()
                    } else {
                        "no-linear".yellow()
                    };
                    println!(
                        "frame {:>7}  gop {:>5}  anchor {:>5}  file {} @ {:>12}  skip {:>3}  {linear}",
                        plan.frame_number,
                        plan.gop,
                        plan.anchor_gop,
                        plan.target.file,
                        plan.target.position,
                        plan.skip,
                    );
                }
            }
        }
        Commands::Rff {
            index,
            start,
            count,
            json,
        } => {
            let index = open_index(&index, cli.global.verbose)?;
            let schedule = RffSchedule::build(&index, index.frame_count());
            let end = start.saturating_add(count).min(schedule.output_count());

            let pairs: Vec<_> = (start..end)
                .filter_map(|n| schedule.pair(n).map(|pair| (n, pair)))
                .collect();

            if json {
                let payload = json!({
                    "coded_frames": index.frame_count(),
                    "output_frames": schedule.output_count(),
                    "pairs": pairs
                        .iter()
                        .map(|(n, pair)| json!({
                            "output": n,
                            "first": { "frame": pair.first.frame, "field": field_kind_name(pair.first.kind) },
                            "second": { "frame": pair.second.frame, "field": field_kind_name(pair.second.kind) },
                            "woven": !pair.is_same_source(),
                        }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} coded -> {} output frames",
                    index.frame_count(),
                    schedule.output_count()
                );
                for (n, pair) in &pairs {
                    let kind = if pair.is_same_source() {
                        "copy".normal()
                    } else {
                        "weave".cyan()
                    };
                    println!(
                        "{n:>7}: {:>7} {:<11} + {:>7} {:<11} {kind}",
                        pair.first.frame,
                        field_kind_name(pair.first.kind),
                        pair.second.frame,
                        field_kind_name(pair.second.kind),
                    );
                }
            }
        }
        #[cfg(feature = "ffmpeg")]
        Commands::Decode {
            index,
            out,
            frames,
            no_rff,
            no_crop,
            linear_threshold,
        } => {
            if out.exists() && !cli.global.overwrite {
                return Err(format!(
                    "output file already exists: {} (use --overwrite)",
                    out.display()
                )
                .into());
            }

            let options = SessionOptions::new()
                .with_threads(cli.global.threads.unwrap_or(0))
                .with_apply_rff(!no_rff)
                .with_no_crop(no_crop)
                .with_linear_threshold(linear_threshold);
            if cli.global.verbose {
                eprintln!("{} {options:?}", "options".cyan().bold());
            }

            let mut source = D2vSource::open_ffmpeg(&index, options)?;
            let total = source.frame_count();
            if total == 0 {
                return Err("index has no output frames".into());
            }
            let (start, end) = match &frames {
                Some(frames) => parse_frame_range(frames)
                    .ok_or_else(|| format!("invalid frame range: {frames}"))?,
                None => (0, total - 1),
            };
            if end >= total {
                return Err(format!("frame {end} is past the last frame ({})", total - 1).into());
            }

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new((end - start + 1) as u64);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let mut writer = BufWriter::new(File::create(&out)?);
            for n in start..=end {
                let frame = source.frame(n)?;
                for plane in &frame.picture.planes {
                    for row in 0..plane.height {
                        writer.write_all(plane.row(row))?;
                    }
                }

                if let Some(pb) = &progress_bar {
                    pb.inc(1);
                }
                if cli.global.verbose {
                    eprintln!(
                        "frame {n}: {} {:?}",
                        frame
                            .properties
                            .picture_type
                            .map_or("?", |kind| kind.as_str()),
                        frame.properties.field_order
                    );
                }
            }
            writer.flush()?;

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Decoded {} frame(s) to {}", end - start + 1, out.display()).green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "d2v", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, parse_frame_range};
    use clap::CommandFactory;

    #[test]
    fn parse_frame_range_forms() {
        assert_eq!(parse_frame_range("42"), Some((42, 42)));
        assert_eq!(parse_frame_range("10-20"), Some((10, 20)));
        assert_eq!(parse_frame_range(" 3 - 4 "), Some((3, 4)));
        assert_eq!(parse_frame_range("20-10"), None);
        assert_eq!(parse_frame_range("abc"), None);
        assert_eq!(parse_frame_range("-5"), None);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
