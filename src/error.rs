//! Hard-failure error types.
//!
//! Anything that can go wrong while *reading* metadata degrades to a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead. The variants here
//! are the failures a caller must see: input that is not a JPEG at all, and
//! update requests rejected before any byte is written.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Error, Debug)]
pub enum GeoError {
    /// Input does not start with the JPEG SOI marker.
    #[error("not a JPEG file (missing SOI marker)")]
    NotJpeg,

    #[error("latitude {0} is outside the range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside the range [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Altitude is NaN, infinite, or too large for a 1/100 m rational.
    #[error("altitude must be a finite number of meters, got {0}")]
    InvalidAltitude(f64),

    /// The rebuilt APP1 payload does not fit a JPEG segment.
    #[error("EXIF segment too large: {size} bytes (maximum {max})")]
    SegmentTooLarge { size: usize, max: usize },

    /// A single tag value cannot be described by a 32-bit count or offset.
    #[error("value of tag 0x{tag:04X} is too large to encode")]
    ValueTooLarge { tag: u16 },

    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
}
