//! # geotag-exif
//!
//! Read and write GPS coordinates, keywords and descriptions in the EXIF
//! metadata of JPEG files, without touching the compressed image data.
//!
//! ## Quick Start
//!
//! The pipeline module works on files:
//!
//! ```rust,no_run
//! use geotag_exif::config::Config;
//! use geotag_exif::exif::UpdateRequest;
//! use geotag_exif::pipeline::{collect_images, read_image, update_image};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let images = collect_images(&[PathBuf::from("./photos")], &config.output.updated_prefix);
//!
//!     for path in &images {
//!         let report = read_image(path, &config)?;
//!         println!("{}: has GPS = {}", path.display(), report.has_gps);
//!
//!         let mut request = UpdateRequest::new(-33.8688, 151.2093);
//!         request.keywords = Some("sydney; harbour".into());
//!         let result = update_image(path, &request, &config);
//!         if let Some(ref err) = result.error {
//!             eprintln!("Error processing {}: {err}", path.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The engine itself works on byte buffers:
//!
//! ```rust,no_run
//! use geotag_exif::config::{ExifFields, VerifyConfig};
//! use geotag_exif::exif::{read_metadata, write_metadata, UpdateRequest};
//!
//! fn main() -> anyhow::Result<()> {
//!     let bytes = std::fs::read("photo.jpg")?;
//!
//!     let report = read_metadata(&bytes)?;
//!     println!("Camera: {:?}", report.fields.get("model"));
//!
//!     let request = UpdateRequest::new(48.8584, 2.2945);
//!     let outcome = write_metadata(
//!         &bytes,
//!         &request,
//!         chrono::Utc::now(),
//!         &ExifFields::default(),
//!         &VerifyConfig::default(),
//!     )?;
//!     println!("Re-read: {:?}", outcome.verified);
//!     std::fs::write("updated-photo.jpg", outcome.bytes)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`exif`]: JPEG segment handling, TIFF/IFD parsing and serialization, coordinate and text codecs
//! - [`config`]: Configuration types and loading/saving
//! - [`pipeline`]: File-level read/update, input collection, output naming
//! - [`diagnostics`]: Structured soft-failure events
//! - [`error`]: Hard-failure error type

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exif;
pub mod pipeline;
