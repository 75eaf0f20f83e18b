use clap::{Parser, Subcommand};
use pixbox::ai::{self, DataUri, GeminiClient};
use pixbox::batch::{Batch, BatchOptions, DownloadOutcome, ProcessingSettings};
use pixbox::delivery::{DeliverySink, DirectorySink};
use pixbox::imaging::{
    self, Axis, BackendError, ImageBackend, OutputFormat, Quality, ResizeTarget, RustBackend,
};
use pixbox::intake::{self, SourceFile};
use pixbox::{config, output};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixbox")]
#[command(about = "Compress, convert, and package images")]
#[command(long_about = "\
Compress, convert, and package images

One file in, one file out. Several files in, one .zip out, with every file
that could not be processed left out and reported.

Tools:

  compress        Re-encode images at a chosen quality
  convert         Change one image's format and pixel size
  convert-folder  Package a directory tree, optionally re-encoding images
  remove-bg       AI background removal (needs GEMINI_API_KEY)
  passport        AI face centering plus optional background colour

Run 'pixbox gen-config' to generate a documented pixbox.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./pixbox.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory downloads are written to
    #[arg(long, default_value = ".", global = true)]
    out: PathBuf,

    /// Replace files in --out instead of saving as "name (1).ext"
    #[arg(long, global = true)]
    overwrite: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress one or more images
    Compress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Encoder quality, 0-100
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        quality: Option<u32>,
        #[arg(long)]
        format: Option<OutputFormat>,
        /// Output name (without extension) when compressing a single file
        #[arg(long)]
        name: Option<String>,
        /// Archive name (without .zip) when compressing several files
        #[arg(long)]
        archive_name: Option<String>,
    },
    /// Convert one file to another format and size
    Convert {
        file: PathBuf,
        #[arg(long)]
        format: Option<OutputFormat>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        quality: Option<u32>,
        /// Target width; height follows the aspect ratio unless also given
        #[arg(long, allow_negative_numbers = true)]
        width: Option<i64>,
        /// Target height; width follows the aspect ratio unless also given
        #[arg(long, allow_negative_numbers = true)]
        height: Option<i64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Package files and directories into one archive
    ConvertFolder {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Re-encode images to this format; files are packaged as-is without it
        #[arg(long)]
        format: Option<OutputFormat>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        quality: Option<u32>,
        #[arg(long)]
        archive_name: Option<String>,
    },
    /// Remove a photo's background with the AI model
    RemoveBg {
        file: PathBuf,
        /// Replace the background with this colour (#RGB or #RRGGBB)
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Center a face for a passport photo, optionally recolouring the background
    Passport {
        file: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        center_x: f64,
        #[arg(long, allow_negative_numbers = true)]
        center_y: f64,
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print a stock pixbox.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir()?;
    let load_config = || config::load_config(cli.config.as_deref(), &cwd);
    let backend = RustBackend::new();
    let mut sink = if cli.overwrite {
        DirectorySink::overwriting(&cli.out)
    } else {
        DirectorySink::new(&cli.out)
    };

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Compress {
            files,
            quality,
            format,
            name,
            archive_name,
        } => {
            let config = load_config()?;
            let sources = intake::collect_sources(&files, false)?;
            if name.is_some() && sources.len() > 1 {
                warn!("--name only applies to single-file downloads; using per-file names");
            }
            let settings = ProcessingSettings {
                quality: Quality::new(quality.unwrap_or(config.compress.quality)),
                format: Some(format.unwrap_or(config.compress.format)),
                output_name: name,
                resize: None,
                archive_name: archive_name.unwrap_or(config.compress.archive_name),
            };
            let mut batch = Batch::new(BatchOptions::compress(), settings);
            batch.open();
            batch.add_files(sources)?;
            output::print_estimates(&batch.results());
            println!();
            run_download(&mut batch, &backend, &mut sink)?;
        }
        Command::Convert {
            file,
            format,
            quality,
            width,
            height,
            name,
        } => {
            let config = load_config()?;
            let sources = intake::collect_sources(&[file], false)?;
            let resize = match sources.first() {
                Some(source) if source.is_image() => {
                    resize_target(&backend, source, width, height)?
                }
                _ => None,
            };
            let settings = ProcessingSettings {
                quality: Quality::new(quality.unwrap_or(config.convert.quality)),
                format: Some(format.unwrap_or(config.convert.format)),
                output_name: name,
                resize,
                archive_name: config.compress.archive_name.clone(),
            };
            let mut batch = Batch::new(BatchOptions::convert(), settings);
            batch.open();
            batch.add_files(sources)?;
            run_download(&mut batch, &backend, &mut sink)?;
        }
        Command::ConvertFolder {
            paths,
            format,
            quality,
            archive_name,
        } => {
            let config = load_config()?;
            let settings = ProcessingSettings {
                quality: Quality::new(quality.unwrap_or(config.convert.quality)),
                format: format.or(config.folder.format),
                output_name: None,
                resize: None,
                archive_name: archive_name.unwrap_or(config.folder.archive_name),
            };
            let mut batch = Batch::new(
                BatchOptions::folder(config.folder.max_total_bytes),
                settings,
            );
            batch.open();
            let sources = intake::collect_sources_within(
                &paths,
                true,
                batch.total_size(),
                config.folder.max_total_bytes,
            )?;
            batch.add_files(sources)?;
            info!(
                files = batch.len(),
                bytes = batch.total_size(),
                "folder queued"
            );
            run_download(&mut batch, &backend, &mut sink)?;
        }
        Command::RemoveBg {
            file,
            background,
            name,
        } => {
            let config = load_config()?;
            let photo = read_photo(&file)?;
            let model = GeminiClient::from_config(&config.ai)?;
            let result = ai::remove_background(
                &model,
                &ai::RemoveBackgroundInput {
                    photo,
                    background_color: background,
                },
            )?;
            save_ai_result(
                "remove-bg",
                &file,
                result.processed_photo,
                name,
                "no-bg",
                &mut sink,
            )?;
        }
        Command::Passport {
            file,
            center_x,
            center_y,
            background,
            name,
        } => {
            let config = load_config()?;
            let photo = read_photo(&file)?;
            let model = GeminiClient::from_config(&config.ai)?;
            let result = ai::passport_photo(&model, photo, (center_x, center_y), background)?;
            save_ai_result("passport", &file, result, name, "passport", &mut sink)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the flag-derived level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pixbox={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run_download(
    batch: &mut Batch,
    backend: &impl ImageBackend,
    sink: &mut impl DeliverySink,
) -> Result<(), Box<dyn std::error::Error>> {
    match batch.download(backend, sink)? {
        DownloadOutcome::Delivered(report) => output::print_download_report(&report),
        DownloadOutcome::Empty => println!("No files selected"),
        DownloadOutcome::Ignored => {}
    }
    Ok(())
}

/// Resolve `--width`/`--height` against the image's natural size.
///
/// One axis given: the other follows the aspect ratio. Both given: used as-is.
fn resize_target(
    backend: &impl ImageBackend,
    source: &SourceFile,
    width: Option<i64>,
    height: Option<i64>,
) -> Result<Option<ResizeTarget>, BackendError> {
    let edit = match (width, height) {
        (None, None) => return Ok(None),
        (Some(w), Some(h)) => return Ok(Some(ResizeTarget::new(w, h))),
        (Some(w), None) => (Axis::Width, w),
        (None, Some(h)) => (Axis::Height, h),
    };
    let original = imaging::get_dimensions(backend, &source.bytes)?;
    let current = ResizeTarget::from_dimensions(original);
    Ok(Some(imaging::apply_dimension_edit(
        original, current, edit.0, edit.1,
    )))
}

fn read_photo(path: &Path) -> Result<DataUri, Box<dyn std::error::Error>> {
    let source = intake::collect_sources(&[path.to_path_buf()], false)?
        .into_iter()
        .next()
        .ok_or_else(|| format!("could not read {}", path.display()))?;
    if !source.is_image() {
        return Err(format!("{} is not an image ({})", source.name, source.mime_type).into());
    }
    Ok(DataUri::from_bytes(source.mime_type, source.bytes))
}

fn save_ai_result(
    tool: &str,
    source: &Path,
    image: DataUri,
    name: Option<String>,
    suffix: &str,
    sink: &mut impl DeliverySink,
) -> Result<(), Box<dyn std::error::Error>> {
    let stem = match name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => {
            let original = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo".to_string());
            format!("{original}-{suffix}")
        }
    };
    let file_name = format!("{stem}.{}", image.extension());
    let bytes = image.into_bytes();
    let saved = sink.deliver(&file_name, &bytes)?;
    output::print_ai_result(tool, source, &saved, bytes.len());
    Ok(())
}
