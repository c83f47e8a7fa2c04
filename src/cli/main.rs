use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use geotag_exif::exif::{CanonicalValue, GeoCoordinate, UpdateRequest};
use geotag_exif::{config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "geotag",
    version,
    about = "Read and write GPS coordinates, keywords and descriptions in JPEG EXIF metadata"
)]
struct Cli {
    /// JPEG files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Run the update without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Latitude in decimal degrees (negative = south)
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    lat: Option<f64>,

    /// Longitude in decimal degrees (negative = west)
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lng: Option<f64>,

    /// Altitude in meters (negative = below sea level)
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    alt: Option<f64>,

    /// Keywords to embed (XPKeywords)
    #[arg(long, requires = "lat")]
    keywords: Option<String>,

    /// Description to embed (ImageDescription, XPComment, UserComment)
    #[arg(long, requires = "lat")]
    description: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // Override dry_run from CLI flag
    if cli.dry_run {
        config.output.dry_run = true;
    }

    let images = pipeline::collect_images(&cli.paths, &config.output.updated_prefix);
    if images.is_empty() {
        anyhow::bail!("No JPEG files found in the specified paths.");
    }

    match (cli.lat, cli.lng) {
        (Some(latitude), Some(longitude)) => {
            let request = UpdateRequest {
                latitude,
                longitude,
                altitude: cli.alt,
                keywords: cli.keywords.clone(),
                description: cli.description.clone(),
            };
            update_all(&images, &request, &config, cli.json)
        }
        _ => show_all(&images, &config, cli.json),
    }
}

fn show_all(images: &[PathBuf], config: &config::Config, json: bool) -> Result<()> {
    let mut reports = Vec::new();
    for image_path in images {
        match pipeline::read_image(image_path, config) {
            Ok(report) => {
                if json {
                    reports.push(serde_json::json!({
                        "path": image_path.display().to_string(),
                        "report": report,
                    }));
                } else {
                    print_report(image_path, &report);
                }
            }
            Err(e) => log::error!("Failed to read {}: {e:#}", image_path.display()),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn update_all(
    images: &[PathBuf],
    request: &UpdateRequest,
    config: &config::Config,
    json: bool,
) -> Result<()> {
    log::info!("Found {} image(s) to update", images.len());
    if config.output.dry_run {
        log::info!("DRY RUN: no files will be written");
    }

    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, image_path.display());

        let result = pipeline::update_image(image_path, request, config);

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else {
            log::info!("  {}", result.message);
            if let Some(ref out) = result.output_path {
                log::info!("  Output: {}", out.display());
            }
            if result.verification_mismatch {
                log::warn!("  Re-read coordinates differ from the request");
            }
            if !json {
                if let Some(ref gps) = result.coordinate {
                    print_gps(gps);
                }
            }
        }

        results.push(result);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the canonical fields and GPS data of one file, organized by section.
fn print_report(path: &Path, report: &geotag_exif::exif::ReadReport) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let present: Vec<(&str, &CanonicalValue)> = report
        .fields
        .entries()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

    if !present.is_empty() {
        println!("  {BOLD}Metadata{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (key, value) in &present {
            print_row(key, &value.to_string());
        }
        println!();
    }

    if let Some(ref gps) = report.gps {
        print_gps(gps);
    }

    if present.is_empty() && !report.has_gps {
        println!("  {DIM}(no EXIF metadata found){RESET}");
        println!();
    }
}

fn print_gps(gps: &GeoCoordinate) {
    println!("  {BOLD}GPS{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    print_row("latitude", &format!("{:.6}", gps.latitude));
    print_row("longitude", &format!("{:.6}", gps.longitude));
    if let Some(alt) = gps.altitude {
        print_row("altitude", &format!("{alt:.2} m"));
    }
    if let Some(bearing) = gps.bearing {
        let reference = gps.bearing_ref.as_deref().unwrap_or("");
        print_row("bearing", &format!("{bearing:.2} {reference}"));
    }
    if let Some(speed) = gps.speed {
        let reference = gps.speed_ref.as_deref().unwrap_or("");
        print_row("speed", &format!("{speed:.2} {reference}"));
    }
    if let (Some(date), Some(time)) = (&gps.datestamp, &gps.timestamp) {
        print_row("timestamp", &format!("{date} {time} UTC"));
    }
    println!();
}

/// Print a single row in the metadata display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
