//! File-level operations on top of the in-memory engine.
//!
//! # Concurrent deletion
//!
//! The engine holds no locks on the files it reads or writes. When an external
//! sweeper removes old uploads from the same directory, a read may find its
//! input gone and an update may write an output that is deleted right after.
//! Last writer or deleter wins; the resulting I/O error is reported in the
//! result and never retried.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::error::GeoError;
use crate::exif::{self, GeoCoordinate, ReadReport, UpdateRequest};

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

pub const MESSAGE_GPS_UPDATED: &str = "GPS data updated successfully";

/// `"GPS data and keywords & description successfully embedded!"`, naming only what was added.
pub fn success_message(metadata_added: &[String]) -> String {
    if metadata_added.is_empty() {
        MESSAGE_GPS_UPDATED.to_string()
    } else {
        format!("GPS data and {} successfully embedded!", metadata_added.join(" & "))
    }
}

/// The result of updating a single image.
///
/// # Example
///
/// ```rust,no_run
/// # use geotag_exif::pipeline::update_image;
/// # use geotag_exif::config::Config;
/// # use geotag_exif::exif::UpdateRequest;
/// let request = UpdateRequest::new(48.8584, 2.2945);
/// let result = update_image("photo.jpg".as_ref(), &request, &Config::default());
///
/// if result.error.is_none() {
///     println!("{}", result.message);
///     if let Some(ref out) = result.output_path {
///         println!("Written: {}", out.display());
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub path: PathBuf,
    /// Where the updated copy was (or, in a dry run, would be) written.
    pub output_path: Option<PathBuf>,
    /// Coordinate recovered from the written bytes.
    pub coordinate: Option<GeoCoordinate>,
    pub verification_mismatch: bool,
    pub metadata_added: Vec<String>,
    pub message: String,
    pub dry_run: bool,
    pub error: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessResult {
    fn new(path: &Path, dry_run: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            output_path: None,
            coordinate: None,
            verification_mismatch: false,
            metadata_added: Vec::new(),
            message: String::new(),
            dry_run,
            error: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Collect JPEG files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks); files found there whose name starts with
/// `skip_prefix` are earlier outputs and are skipped. Files named explicitly
/// are always kept.
///
/// # Example
///
/// ```rust,no_run
/// use geotag_exif::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(
///     &[
///         PathBuf::from("photo.jpg"),       // single file
///         PathBuf::from("./photos/"),        // entire directory
///     ],
///     "updated-",
/// );
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf], skip_prefix: &str) -> Vec<PathBuf> {
    let mut images = Vec::new();
    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if !p.is_file() || !is_supported_image(p) {
                    continue;
                }
                if has_prefix(p, skip_prefix) {
                    log::debug!("Skipping earlier output: {}", p.display());
                    continue;
                }
                images.push(p.to_path_buf());
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }
    images
}

fn has_prefix(path: &Path, prefix: &str) -> bool {
    !prefix.is_empty()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix))
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `dir/<prefix><name>` next to the original.
pub fn updated_file_name(path: &Path, prefix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{prefix}{name}"))
}

fn read_limited(path: &Path, config: &Config) -> Result<Vec<u8>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if size > config.output.max_file_size {
        return Err(GeoError::FileTooLarge {
            size,
            limit: config.output.max_file_size,
        }
        .into());
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read and decode the metadata of one JPEG file.
pub fn read_image(path: &Path, config: &Config) -> Result<ReadReport> {
    let bytes = read_limited(path, config)?;
    let report = exif::read_metadata(&bytes)
        .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
    log::debug!(
        "{}: {} fields, GPS: {}",
        path.display(),
        report.fields.present(),
        report.has_gps
    );
    Ok(report)
}

/// Write GPS (and optional text) into a copy of `path` named by [`updated_file_name`].
///
/// The original file is never modified. In a dry run everything except the
/// final write happens.
pub fn update_image(path: &Path, request: &UpdateRequest, config: &Config) -> ProcessResult {
    update_image_at(path, request, config, Utc::now())
}

/// [`update_image`] with an explicit GPS time stamp.
pub fn update_image_at(
    path: &Path,
    request: &UpdateRequest,
    config: &Config,
    now: DateTime<Utc>,
) -> ProcessResult {
    let mut result = ProcessResult::new(path, config.output.dry_run);

    if let Err(e) = run_update(path, request, config, now, &mut result) {
        log::warn!("Failed to update {}: {e:#}", path.display());
        result.error = Some(format!("{e:#}"));
    }
    result
}

fn run_update(
    path: &Path,
    request: &UpdateRequest,
    config: &Config,
    now: DateTime<Utc>,
    result: &mut ProcessResult,
) -> Result<()> {
    request.validate()?;
    let bytes = read_limited(path, config)?;

    let outcome = exif::write_metadata(&bytes, request, now, &config.fields, &config.verify)
        .with_context(|| format!("Failed to write metadata for {}", path.display()))?;

    let output = updated_file_name(path, &config.output.updated_prefix);
    if config.output.dry_run {
        log::info!("  [dry run] would write {}", output.display());
    } else {
        std::fs::write(&output, &outcome.bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        log::debug!("Written {} ({} bytes)", output.display(), outcome.bytes.len());
    }

    result.message = success_message(&outcome.metadata_added);
    result.output_path = Some(output);
    result.coordinate = outcome.verified;
    result.verification_mismatch = outcome.mismatch;
    result.metadata_added = outcome.metadata_added;
    result.diagnostics = outcome.diagnostics.into_vec();
    Ok(())
}
