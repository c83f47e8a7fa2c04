//! JPEG container handling: find the EXIF APP1 segment and splice a new one in.
//!
//! Only the marker headers in front of the first scan are walked. Scan data,
//! trailing bytes after EOI, and every non-EXIF segment are never decoded or
//! re-encoded, so a splice reproduces them byte for byte.

use std::ops::Range;

use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};
use crate::error::{GeoError, Result};

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const APP1: u8 = 0xE1;
pub const TEM: u8 = 0x01;

/// Identifier that starts the payload of an EXIF APP1 segment.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest APP1 payload (identifier + TIFF data): the 16-bit length field counts itself.
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// Marker (2) + length (2) + `Exif\0\0` (6).
const SEGMENT_OVERHEAD: usize = 2 + 2 + EXIF_HEADER.len();

/// The full byte buffer of one JPEG file plus the location of its EXIF segment.
#[derive(Debug, Clone)]
pub struct ImageContainer {
    bytes: Vec<u8>,
    /// Whole segment, from the 0xFF of the marker to the last payload byte.
    segment: Option<Range<usize>>,
}

impl ImageContainer {
    /// Scan marker headers up to the first SOS.
    ///
    /// Fails only when the buffer is not a JPEG. Malformed headers stop the
    /// scan with a structural diagnostic; whatever was found before stands.
    pub fn from_bytes(bytes: Vec<u8>, diag: &mut Diagnostics) -> Result<Self> {
        if bytes.len() < 2 || bytes[0] != 0xFF || bytes[1] != SOI {
            return Err(GeoError::NotJpeg);
        }

        let segment = locate_exif_segment(&bytes, diag);
        match &segment {
            Some(range) => diag.note(
                Stage::Container,
                format!("EXIF segment at offset {} ({} bytes)", range.start, range.len()),
            ),
            None => diag.note(Stage::Container, "no EXIF segment found"),
        }

        Ok(Self { bytes, segment })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn segment_range(&self) -> Option<Range<usize>> {
        self.segment.clone()
    }

    pub fn has_exif(&self) -> bool {
        self.segment.is_some()
    }

    /// The TIFF structure inside the EXIF segment (after `Exif\0\0`).
    pub fn tiff_data(&self) -> Option<&[u8]> {
        let range = self.segment.as_ref()?;
        self.bytes.get(range.start + SEGMENT_OVERHEAD..range.end)
    }

    /// Produce a new file with `tiff` as the EXIF payload.
    ///
    /// Replaces the located segment in place, or inserts a new one directly
    /// after SOI. Returns the new bytes and the range the new segment occupies.
    pub fn splice(&self, tiff: &[u8]) -> Result<(Vec<u8>, Range<usize>)> {
        let segment = build_app1_segment(tiff)?;
        let (start, end) = match &self.segment {
            Some(range) => (range.start, range.end),
            None => (2, 2),
        };

        let mut out = Vec::with_capacity(self.bytes.len() - (end - start) + segment.len());
        out.extend_from_slice(&self.bytes[..start]);
        out.extend_from_slice(&segment);
        out.extend_from_slice(&self.bytes[end..]);

        Ok((out, start..start + segment.len()))
    }
}

/// Wrap TIFF data as a complete APP1 segment (marker, length, identifier, data).
pub fn build_app1_segment(tiff: &[u8]) -> Result<Vec<u8>> {
    let payload = EXIF_HEADER.len() + tiff.len();
    if payload > MAX_SEGMENT_PAYLOAD {
        return Err(GeoError::SegmentTooLarge {
            size: payload,
            max: MAX_SEGMENT_PAYLOAD,
        });
    }

    let mut segment = Vec::with_capacity(SEGMENT_OVERHEAD + tiff.len());
    segment.extend_from_slice(&[0xFF, APP1]);
    segment.extend_from_slice(&((payload + 2) as u16).to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);
    Ok(segment)
}

fn locate_exif_segment(data: &[u8], diag: &mut Diagnostics) -> Option<Range<usize>> {
    let mut pos = 2;

    loop {
        if pos + 1 >= data.len() {
            diag.warn(
                Stage::Container,
                DiagnosticKind::Structural,
                "marker headers end before any scan",
            );
            return None;
        }
        if data[pos] != 0xFF {
            diag.warn(
                Stage::Container,
                DiagnosticKind::Structural,
                format!("expected marker at offset {pos}, found 0x{:02X}", data[pos]),
            );
            return None;
        }

        // Fill bytes
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() {
            return None;
        }

        let marker = data[pos + 1];
        if marker == TEM || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        if marker == EOI || marker == SOS {
            return None;
        }

        let Some(len_bytes) = data.get(pos + 2..pos + 4) else {
            diag.warn(
                Stage::Container,
                DiagnosticKind::Structural,
                format!("segment 0xFF{marker:02X} at offset {pos} is truncated"),
            );
            return None;
        };
        let length = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > data.len() {
            diag.warn(
                Stage::Container,
                DiagnosticKind::Structural,
                format!("segment 0xFF{marker:02X} at offset {pos} has invalid length {length}"),
            );
            return None;
        }

        if marker == APP1 && data[pos + 4..end].starts_with(EXIF_HEADER) {
            return Some(pos..end);
        }

        pos = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_with(segments: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        for s in segments {
            out.extend_from_slice(s);
        }
        // SOS header + a few scan bytes + EOI
        out.extend_from_slice(&[0xFF, SOS, 0x00, 0x03, 0x01, 0xAB, 0xCD, 0xFF, 0x00, 0x12]);
        out.extend_from_slice(&[0xFF, EOI]);
        out
    }

    fn app0() -> Vec<u8> {
        let mut s = vec![0xFF, 0xE0, 0x00, 0x10];
        s.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        s
    }

    #[test]
    fn rejects_non_jpeg() {
        let mut diag = Diagnostics::new();
        let err = ImageContainer::from_bytes(b"\x89PNG\r\n".to_vec(), &mut diag).unwrap_err();
        assert!(matches!(err, GeoError::NotJpeg));
    }

    #[test]
    fn no_exif_segment() {
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(jpeg_with(&[&app0()]), &mut diag).unwrap();
        assert!(!c.has_exif());
        assert!(c.tiff_data().is_none());
    }

    #[test]
    fn locates_exif_after_app0() {
        let exif = build_app1_segment(b"II*\0\x08\0\0\0").unwrap();
        let a0 = app0();
        let bytes = jpeg_with(&[&a0, &exif]);
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(bytes, &mut diag).unwrap();

        let range = c.segment_range().unwrap();
        assert_eq!(range.start, 2 + a0.len());
        assert_eq!(range.len(), exif.len());
        assert_eq!(c.tiff_data().unwrap(), b"II*\0\x08\0\0\0");
    }

    #[test]
    fn skips_xmp_app1() {
        let mut xmp = vec![0xFF, APP1, 0x00, 0x0A];
        xmp.extend_from_slice(b"http://");
        xmp.push(0);
        let exif = build_app1_segment(b"MM\0*\0\0\0\x08").unwrap();
        let bytes = jpeg_with(&[&xmp, &exif]);
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(bytes, &mut diag).unwrap();
        assert_eq!(c.segment_range().unwrap().start, 2 + xmp.len());
    }

    #[test]
    fn splice_inserts_after_soi() {
        let original = jpeg_with(&[&app0()]);
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(original.clone(), &mut diag).unwrap();

        let (out, range) = c.splice(b"II*\0\x08\0\0\0").unwrap();
        assert_eq!(range.start, 2);
        assert_eq!(&out[..2], &original[..2]);
        assert_eq!(&out[range.end..], &original[2..]);
    }

    #[test]
    fn splice_replaces_in_place() {
        let old = build_app1_segment(&[0u8; 40]).unwrap();
        let a0 = app0();
        let original = jpeg_with(&[&a0, &old]);
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(original.clone(), &mut diag).unwrap();
        let old_range = c.segment_range().unwrap();

        let (out, range) = c.splice(b"II*\0\x08\0\0\0").unwrap();
        assert_eq!(range.start, old_range.start);
        assert_eq!(&out[..range.start], &original[..old_range.start]);
        assert_eq!(&out[range.end..], &original[old_range.end..]);
    }

    #[test]
    fn oversized_segment_rejected() {
        let tiff = vec![0u8; MAX_SEGMENT_PAYLOAD];
        let err = build_app1_segment(&tiff).unwrap_err();
        assert!(matches!(err, GeoError::SegmentTooLarge { .. }));
    }

    #[test]
    fn truncated_header_is_structural_warning() {
        let bytes = vec![0xFF, SOI, 0xFF, 0xE0, 0x00, 0x40, 0x00];
        let mut diag = Diagnostics::new();
        let c = ImageContainer::from_bytes(bytes, &mut diag).unwrap();
        assert!(!c.has_exif());
        assert!(diag.has_kind(DiagnosticKind::Structural));
    }
}
