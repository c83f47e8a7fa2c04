//! Round-trip verifier: re-read freshly written bytes and compare coordinates.

use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};

use super::gps::GeoCoordinate;
use super::jpeg::ImageContainer;
use super::normalize;
use super::reader;

/// What the re-read recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub recovered: Option<GeoCoordinate>,
    pub mismatch: bool,
}

/// Re-parse `bytes` and check the coordinate against what was written.
///
/// Findings from the re-parse itself are not copied into `diag`; only the
/// verdict is recorded. A mismatch is a warning, never an error.
pub fn verify_roundtrip(
    bytes: &[u8],
    latitude: f64,
    longitude: f64,
    tolerance: f64,
    diag: &mut Diagnostics,
) -> Verification {
    let mut inner = Diagnostics::new();
    let recovered = ImageContainer::from_bytes(bytes.to_vec(), &mut inner)
        .ok()
        .and_then(|container| reader::read_segment(&container, &mut inner))
        .and_then(|collection| normalize::normalize(Some(&collection), &mut inner).1);

    let mismatch = match &recovered {
        Some(c) if c.matches(latitude, longitude, tolerance) => {
            diag.note(
                Stage::Verifier,
                format!("re-read ({}, {}) matches", c.latitude, c.longitude),
            );
            false
        }
        Some(c) => {
            diag.warn(
                Stage::Verifier,
                DiagnosticKind::VerificationMismatch,
                format!(
                    "wrote ({latitude}, {longitude}) but re-read ({}, {})",
                    c.latitude, c.longitude
                ),
            );
            true
        }
        None => {
            diag.warn(
                Stage::Verifier,
                DiagnosticKind::VerificationMismatch,
                "written coordinates could not be re-read",
            );
            true
        }
    };

    Verification { recovered, mismatch }
}
