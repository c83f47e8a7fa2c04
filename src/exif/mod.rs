//! EXIF/GPS metadata engine for JPEG byte buffers.
//!
//! Two entry points work entirely in memory:
//!
//! - [`read_metadata`]: locate and decode the EXIF segment, merge the decode
//!   passes into a [`CanonicalFieldSet`] and recover the GPS position
//! - [`write_metadata`]: rebuild the directories with new GPS and text tags,
//!   splice the segment back in and re-verify the result
//!
//! Reading never fails on damaged metadata; it degrades to empty fields and
//! records [`Diagnostic`](crate::diagnostics::Diagnostic)s instead. The only
//! read error is input that is not a JPEG at all.

mod gps;
mod jpeg;
mod normalize;
mod reader;
pub mod tags;
mod text;
mod verify;
mod writer;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;

pub use gps::{
    Axis, DMS_TOLERANCE_DEGREES, GeoCoordinate, decimal_to_dms, decode_altitude, dms_to_decimal,
    encode_altitude,
};
pub use jpeg::{ImageContainer, MAX_SEGMENT_PAYLOAD, build_app1_segment};
pub use normalize::{
    CanonicalFieldSet, CanonicalValue, DecodePass, FieldValue, PassKind, merge, normalize,
};
pub use reader::{parse_tiff, read_segment};
pub use tags::{ByteOrder, Ifd, IfdCollection, IfdKind, Rational, TagValue, tag_name};
pub use text::{decode_user_comment, decode_utf16le, encode_user_comment, encode_utf16le};
pub use verify::{Verification, verify_roundtrip};
pub use writer::{UpdateRequest, WriteOutcome, apply_update, serialize, write_metadata};

/// Everything a read produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReport {
    pub fields: CanonicalFieldSet,
    pub gps: Option<GeoCoordinate>,
    #[serde(rename = "hasGPS")]
    pub has_gps: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Decode the metadata of a JPEG held in memory.
///
/// A JPEG without an EXIF segment yields an all-null field set and
/// `has_gps == false`.
pub fn read_metadata(bytes: &[u8]) -> Result<ReadReport> {
    let mut diag = Diagnostics::new();
    let container = ImageContainer::from_bytes(bytes.to_vec(), &mut diag)?;
    let collection = read_segment(&container, &mut diag);
    let (fields, gps) = normalize(collection.as_ref(), &mut diag);

    Ok(ReadReport {
        fields,
        has_gps: gps.is_some(),
        gps,
        diagnostics: diag.into_vec(),
    })
}
