use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::exif::DMS_TOLERANCE_DEGREES;

/// Default upper bound on input file size (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Top-level configuration for the geotag library and CLI.
///
/// Controls which text tags accompany a GPS update, where updated files go,
/// and how strictly the write is re-verified. Every key is optional in the
/// JSON file; missing keys take their defaults.
///
/// # Loading
///
/// ```rust,no_run
/// use geotag_exif::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.output.dry_run = true;
/// config.fields.write_xp_tags = false;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which metadata tags are written alongside the coordinates.
    pub fields: ExifFields,
    /// Output behavior (dry run, naming, size limit).
    pub output: OutputConfig,
    /// Post-write verification.
    pub verify: VerifyConfig,
}

/// Controls which tags an update writes.
///
/// GPS coordinates are always written; these flags only govern the optional
/// parts of an update request.
///
/// # Example
///
/// ```rust
/// use geotag_exif::config::ExifFields;
///
/// let fields = ExifFields {
///     write_keywords: true,
///     write_description: true,
///     write_altitude: true,
///     write_xp_tags: true,        // Windows XPKeywords / XPComment
///     write_user_comment: false,  // skip the Exif UserComment copy
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExifFields {
    /// Write keywords (XPKeywords).
    pub write_keywords: bool,
    /// Write description (ImageDescription, XPComment, UserComment).
    pub write_description: bool,
    /// Write GPSAltitude/GPSAltitudeRef when an altitude is supplied.
    pub write_altitude: bool,
    /// Write the UTF-16LE XP* tags.
    pub write_xp_tags: bool,
    /// Write the description into UserComment as well.
    pub write_user_comment: bool,
}

impl Default for ExifFields {
    fn default() -> Self {
        Self {
            write_keywords: true,
            write_description: true,
            write_altitude: true,
            write_xp_tags: true,
            write_user_comment: true,
        }
    }
}

/// Output and behavior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, run the whole update without writing the output file.
    pub dry_run: bool,
    /// File-name prefix of the updated copy.
    pub updated_prefix: String,
    /// Inputs larger than this many bytes are rejected.
    pub max_file_size: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            updated_prefix: "updated-".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Round-trip verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub enabled: bool,
    /// Allowed difference in degrees between written and re-read coordinates.
    pub tolerance_degrees: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_degrees: DMS_TOLERANCE_DEGREES,
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
