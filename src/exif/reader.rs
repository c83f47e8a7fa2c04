//! Segment parser: decode the TIFF structure of an EXIF segment into an [`IfdCollection`].
//!
//! The parser never fails. A broken header means "no metadata"; a broken
//! directory keeps the entries decoded before the damage; a broken entry is
//! skipped while its siblings are kept. Every skip is recorded as a diagnostic.

use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};

use super::jpeg::ImageContainer;
use super::tags::*;

/// Parse the EXIF segment of a container, if it has one.
pub fn read_segment(container: &ImageContainer, diag: &mut Diagnostics) -> Option<IfdCollection> {
    let tiff = container.tiff_data()?;
    parse_tiff(tiff, diag)
}

/// Parse raw TIFF data (the APP1 payload after `Exif\0\0`).
pub fn parse_tiff(data: &[u8], diag: &mut Diagnostics) -> Option<IfdCollection> {
    if data.len() < 8 {
        diag.warn(
            Stage::Parser,
            DiagnosticKind::Structural,
            format!("TIFF header too short ({} bytes)", data.len()),
        );
        return None;
    }

    let order = match &data[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        other => {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("invalid TIFF byte order {other:02X?}"),
            );
            return None;
        }
    };
    if order.read_u16(data, 2) != Some(42) {
        diag.warn(Stage::Parser, DiagnosticKind::Structural, "invalid TIFF magic number");
        return None;
    }
    let ifd0_offset = order.read_u32(data, 4).unwrap_or(0) as usize;

    let mut reader = TiffReader {
        data,
        order,
        visited: Vec::new(),
    };
    let mut collection = IfdCollection {
        byte_order: order,
        ..IfdCollection::default()
    };

    let Some(mut ifd0) = reader.read_ifd(ifd0_offset, IfdKind::Image, diag) else {
        return Some(collection);
    };
    collection.image = std::mem::take(&mut ifd0.ifd);

    if let Some(offset) = ifd0.pointer(TAG_EXIF_IFD_POINTER) {
        if let Some(mut exif) = reader.read_ifd(offset, IfdKind::Exif, diag) {
            collection.exif = std::mem::take(&mut exif.ifd);
            if let Some(interop_offset) = exif.pointer(TAG_INTEROP_IFD_POINTER) {
                if let Some(interop) = reader.read_ifd(interop_offset, IfdKind::Interop, diag) {
                    collection.interop = interop.ifd;
                }
            }
        }
    }

    if let Some(offset) = ifd0.pointer(TAG_GPS_IFD_POINTER) {
        if let Some(gps) = reader.read_ifd(offset, IfdKind::Gps, diag) {
            collection.gps = gps.ifd;
        }
    }

    if ifd0.next != 0 {
        if let Some(first) = reader.read_ifd(ifd0.next, IfdKind::First, diag) {
            collection.thumbnail = reader.read_thumbnail(&first, diag);
            collection.first = first.ifd;
        }
    }

    log::debug!(
        "Parsed EXIF: {} IFD0, {} Exif, {} GPS, {} IFD1 tags",
        collection.image.len(),
        collection.exif.len(),
        collection.gps.len(),
        collection.first.len()
    );

    Some(collection)
}

/// A directory plus the pointer entries that were pulled out of it.
struct ParsedIfd {
    ifd: Ifd,
    pointers: Vec<(u16, usize)>,
    next: usize,
}

impl ParsedIfd {
    fn pointer(&self, tag: u16) -> Option<usize> {
        self.pointers.iter().find(|(t, _)| *t == tag).map(|(_, o)| *o)
    }
}

struct TiffReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
    visited: Vec<usize>,
}

impl TiffReader<'_> {
    fn read_ifd(&mut self, offset: usize, kind: IfdKind, diag: &mut Diagnostics) -> Option<ParsedIfd> {
        if offset < 8 || offset >= self.data.len() {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("{} offset {offset} is outside the segment", kind.label()),
            );
            return None;
        }
        if self.visited.contains(&offset) {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("{} at offset {offset} was already visited (pointer loop)", kind.label()),
            );
            return None;
        }
        self.visited.push(offset);

        let Some(count) = self.order.read_u16(self.data, offset) else {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("{} entry count is truncated", kind.label()),
            );
            return None;
        };
        let count = count as usize;

        let mut parsed = ParsedIfd {
            ifd: Ifd::new(),
            pointers: Vec::new(),
            next: 0,
        };

        for i in 0..count {
            let entry = offset + 2 + i * 12;
            if entry + 12 > self.data.len() {
                diag.warn(
                    Stage::Parser,
                    DiagnosticKind::Structural,
                    format!("{} truncated after {i} of {count} entries", kind.label()),
                );
                return Some(parsed);
            }

            let tag = self.order.read_u16(self.data, entry).unwrap_or(0);
            if is_structural_tag(kind, tag) {
                match self.pointer_value(entry) {
                    Some(value) => parsed.pointers.push((tag, value)),
                    None => diag.warn(
                        Stage::Parser,
                        DiagnosticKind::Structural,
                        format!("{} pointer 0x{tag:04X} is not a SHORT or LONG", kind.label()),
                    ),
                }
                continue;
            }
            if parsed.ifd.contains(tag) {
                diag.warn(
                    Stage::Parser,
                    DiagnosticKind::Structural,
                    format!("{} repeats tag 0x{tag:04X}; keeping the first", kind.label()),
                );
                continue;
            }
            if let Some(value) = self.decode_entry(entry, tag, kind, diag) {
                parsed.ifd.insert(tag, value);
            }
        }

        parsed.next = self
            .order
            .read_u32(self.data, offset + 2 + count * 12)
            .unwrap_or(0) as usize;
        Some(parsed)
    }

    fn decode_entry(
        &self,
        entry: usize,
        tag: u16,
        kind: IfdKind,
        diag: &mut Diagnostics,
    ) -> Option<TagValue> {
        let type_code = self.order.read_u16(self.data, entry + 2)?;
        let count = self.order.read_u32(self.data, entry + 4)?;

        let Some(size) = type_size(type_code) else {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("{} tag 0x{tag:04X} has unknown type {type_code}", kind.label()),
            );
            return None;
        };

        let Some(bytes) = self.value_bytes(entry, size, count) else {
            diag.warn(
                Stage::Parser,
                DiagnosticKind::Structural,
                format!("{} tag 0x{tag:04X} points outside the segment", kind.label()),
            );
            return None;
        };

        let dms = kind == IfdKind::Gps && is_dms_tag(tag);
        let value = match type_code {
            TYPE_ASCII => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                match std::str::from_utf8(&bytes[..end]) {
                    Ok(s) => TagValue::Ascii(s.to_string()),
                    Err(_) => raw(type_code, count, bytes),
                }
            }
            TYPE_SHORT => TagValue::Short(
                bytes
                    .chunks_exact(2)
                    .filter_map(|c| self.order.read_u16(c, 0))
                    .collect(),
            ),
            TYPE_LONG => TagValue::Long(
                bytes
                    .chunks_exact(4)
                    .filter_map(|c| self.order.read_u32(c, 0))
                    .collect(),
            ),
            TYPE_RATIONAL => {
                let rationals: Vec<Rational> = bytes
                    .chunks_exact(8)
                    .filter_map(|c| {
                        Some(Rational::new(
                            self.order.read_u32(c, 0)?,
                            self.order.read_u32(c, 4)?,
                        ))
                    })
                    .collect();

                if rationals.iter().any(|r| r.den == 0) {
                    diag.warn(
                        Stage::Parser,
                        DiagnosticKind::ValueDecode,
                        format!("{} tag 0x{tag:04X} has a zero denominator", kind.label()),
                    );
                    raw(type_code, count, bytes)
                } else if dms && rationals.len() != 3 {
                    diag.warn(
                        Stage::Parser,
                        DiagnosticKind::ValueDecode,
                        format!(
                            "GPS tag 0x{tag:04X} has {} components, expected 3",
                            rationals.len()
                        ),
                    );
                    raw(type_code, count, bytes)
                } else if rationals.len() == 1 && !dms {
                    TagValue::Rational(rationals[0])
                } else {
                    TagValue::Rationals(rationals)
                }
            }
            TYPE_BYTE => TagValue::Byte(bytes.to_vec()),
            TYPE_UNDEFINED => TagValue::Undefined(bytes.to_vec()),
            _ => raw(type_code, count, bytes),
        };

        Some(value)
    }

    /// Offsets and lengths are LONG in practice, but SHORT (and the IFD type) are legal too.
    fn pointer_value(&self, entry: usize) -> Option<usize> {
        match self.order.read_u16(self.data, entry + 2)? {
            TYPE_SHORT => self.order.read_u16(self.data, entry + 8).map(usize::from),
            TYPE_LONG | TYPE_IFD => self.order.read_u32(self.data, entry + 8).map(|v| v as usize),
            _ => None,
        }
    }

    /// Inline for up to 4 bytes, otherwise at the offset stored in the entry.
    fn value_bytes(&self, entry: usize, size: usize, count: u32) -> Option<&[u8]> {
        let total = size.checked_mul(count as usize)?;
        let start = if total <= 4 {
            entry + 8
        } else {
            self.order.read_u32(self.data, entry + 8)? as usize
        };
        self.data.get(start..start.checked_add(total)?)
    }

    fn read_thumbnail(&self, first: &ParsedIfd, diag: &mut Diagnostics) -> Option<Vec<u8>> {
        let offset = first.pointer(TAG_JPEG_IF_OFFSET)?;
        let length = first.pointer(TAG_JPEG_IF_LENGTH)?;
        match offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
        {
            Some(bytes) => Some(bytes.to_vec()),
            None => {
                diag.warn(
                    Stage::Parser,
                    DiagnosticKind::Structural,
                    "thumbnail points outside the segment",
                );
                None
            }
        }
    }
}

fn raw(type_code: u16, count: u32, bytes: &[u8]) -> TagValue {
    TagValue::Raw {
        type_code,
        count,
        data: bytes.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian TIFF with IFD0 = [Make "Canon"] and nothing else.
    fn minimal_tiff() -> Vec<u8> {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        // Make, ASCII, count 6, offset 26
        t.extend_from_slice(&TAG_MAKE.to_le_bytes());
        t.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        t.extend_from_slice(&6u32.to_le_bytes());
        t.extend_from_slice(&26u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        t.extend_from_slice(b"Canon\0");
        t
    }

    // ── header ───────────────────────────────────────────────────────

    #[test]
    fn rejects_short_header() {
        let mut diag = Diagnostics::new();
        assert!(parse_tiff(b"II*\0", &mut diag).is_none());
        assert!(diag.has_kind(DiagnosticKind::Structural));
    }

    #[test]
    fn rejects_bad_byte_order() {
        let mut diag = Diagnostics::new();
        assert!(parse_tiff(b"XX*\0\x08\0\0\0", &mut diag).is_none());
    }

    #[test]
    fn parses_ascii_entry() {
        let mut diag = Diagnostics::new();
        let c = parse_tiff(&minimal_tiff(), &mut diag).unwrap();
        assert_eq!(c.byte_order, ByteOrder::LittleEndian);
        assert_eq!(c.image.get(TAG_MAKE).and_then(TagValue::as_str), Some("Canon"));
        assert!(diag.warnings().next().is_none());
    }

    #[test]
    fn parses_big_endian_inline_short() {
        let mut t = b"MM\0*\0\0\0\x08".to_vec();
        t.extend_from_slice(&1u16.to_be_bytes());
        t.extend_from_slice(&TAG_ORIENTATION.to_be_bytes());
        t.extend_from_slice(&TYPE_SHORT.to_be_bytes());
        t.extend_from_slice(&1u32.to_be_bytes());
        t.extend_from_slice(&[0x00, 0x06, 0x00, 0x00]);
        t.extend_from_slice(&0u32.to_be_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert_eq!(c.byte_order, ByteOrder::BigEndian);
        assert_eq!(c.image.get(TAG_ORIENTATION), Some(&TagValue::Short(vec![6])));
    }

    // ── sub-IFDs ─────────────────────────────────────────────────────

    fn le_entry(t: &mut Vec<u8>, tag: u16, type_code: u16, count: u32, value: [u8; 4]) {
        t.extend_from_slice(&tag.to_le_bytes());
        t.extend_from_slice(&type_code.to_le_bytes());
        t.extend_from_slice(&count.to_le_bytes());
        t.extend_from_slice(&value);
    }

    #[test]
    fn follows_every_directory_pointer() {
        // IFD0 @8: Make, ExifPointer, GpsPointer; next -> IFD1
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&3u16.to_le_bytes());
        le_entry(&mut t, TAG_MAKE, TYPE_ASCII, 3, *b"LG\0\0");
        le_entry(&mut t, TAG_EXIF_IFD_POINTER, TYPE_LONG, 1, 50u32.to_le_bytes());
        le_entry(&mut t, TAG_GPS_IFD_POINTER, TYPE_LONG, 1, 86u32.to_le_bytes());
        t.extend_from_slice(&104u32.to_le_bytes());
        assert_eq!(t.len(), 50);

        // Exif @50: ISO, InteropPointer
        t.extend_from_slice(&2u16.to_le_bytes());
        le_entry(&mut t, TAG_ISO_SPEED_RATINGS, TYPE_SHORT, 1, [100, 0, 0, 0]);
        le_entry(&mut t, TAG_INTEROP_IFD_POINTER, TYPE_LONG, 1, 80u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(t.len(), 80);

        // Interop @80: empty directory
        t.extend_from_slice(&0u16.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(t.len(), 86);

        // GPS @86: LatitudeRef
        t.extend_from_slice(&1u16.to_le_bytes());
        le_entry(&mut t, TAG_GPS_LATITUDE_REF, TYPE_ASCII, 2, *b"N\0\0\0");
        t.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(t.len(), 104);

        // IFD1 @104: Compression
        t.extend_from_slice(&1u16.to_le_bytes());
        le_entry(&mut t, TAG_COMPRESSION, TYPE_SHORT, 1, [6, 0, 0, 0]);
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(diag.warnings().next().is_none(), "{diag:?}");
        assert_eq!(c.image.get(TAG_MAKE).and_then(TagValue::as_str), Some("LG"));
        assert!(!c.image.contains(TAG_EXIF_IFD_POINTER));
        assert_eq!(c.exif.get(TAG_ISO_SPEED_RATINGS), Some(&TagValue::Short(vec![100])));
        assert_eq!(c.gps.get(TAG_GPS_LATITUDE_REF).and_then(TagValue::as_str), Some("N"));
        assert_eq!(c.first.get(TAG_COMPRESSION), Some(&TagValue::Short(vec![6])));
    }

    #[test]
    fn short_pointer_in_big_endian_file() {
        let mut t = b"MM\0*\0\0\0\x08".to_vec();
        t.extend_from_slice(&1u16.to_be_bytes());
        t.extend_from_slice(&TAG_GPS_IFD_POINTER.to_be_bytes());
        t.extend_from_slice(&TYPE_SHORT.to_be_bytes());
        t.extend_from_slice(&1u32.to_be_bytes());
        t.extend_from_slice(&[0x00, 26, 0x00, 0x00]);
        t.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(t.len(), 26);

        t.extend_from_slice(&1u16.to_be_bytes());
        t.extend_from_slice(&TAG_GPS_LATITUDE_REF.to_be_bytes());
        t.extend_from_slice(&TYPE_ASCII.to_be_bytes());
        t.extend_from_slice(&2u32.to_be_bytes());
        t.extend_from_slice(b"S\0\0\0");
        t.extend_from_slice(&0u32.to_be_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert_eq!(c.gps.get(TAG_GPS_LATITUDE_REF).and_then(TagValue::as_str), Some("S"));
    }

    #[test]
    fn pointer_of_wrong_type_is_dropped() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        le_entry(&mut t, TAG_GPS_IFD_POINTER, TYPE_ASCII, 4, *b"abc\0");
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(c.gps.is_empty());
        assert!(diag.has_kind(DiagnosticKind::Structural));
    }

    // ── damage isolation ─────────────────────────────────────────────

    #[test]
    fn truncated_ifd_keeps_decoded_entries() {
        let mut t = minimal_tiff();
        // Claim three entries; only one exists before the data runs out.
        t[8..10].copy_from_slice(&3u16.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert_eq!(c.image.len(), 1);
        assert!(diag.has_kind(DiagnosticKind::Structural));
    }

    #[test]
    fn bad_value_offset_skips_only_that_entry() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&2u16.to_le_bytes());
        // Model with an offset far past the end
        t.extend_from_slice(&TAG_MODEL.to_le_bytes());
        t.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        t.extend_from_slice(&10u32.to_le_bytes());
        t.extend_from_slice(&5000u32.to_le_bytes());
        // Orientation inline
        t.extend_from_slice(&TAG_ORIENTATION.to_le_bytes());
        t.extend_from_slice(&TYPE_SHORT.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&[1, 0, 0, 0]);
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(c.image.get(TAG_MODEL).is_none());
        assert_eq!(c.image.get(TAG_ORIENTATION), Some(&TagValue::Short(vec![1])));
    }

    #[test]
    fn bad_gps_pointer_keeps_ifd0() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        t.extend_from_slice(&TAG_GPS_IFD_POINTER.to_le_bytes());
        t.extend_from_slice(&TYPE_LONG.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&9999u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(c.gps.is_empty());
        assert!(c.image.is_empty());
        assert!(diag.has_kind(DiagnosticKind::Structural));
    }

    #[test]
    fn pointer_loop_is_detected() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        // Exif IFD pointer back to IFD0 itself
        t.extend_from_slice(&TAG_EXIF_IFD_POINTER.to_le_bytes());
        t.extend_from_slice(&TYPE_LONG.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&8u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(c.exif.is_empty());
        assert!(diag.warnings().any(|d| d.message.contains("loop")));
    }

    #[test]
    fn zero_denominator_kept_raw() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        t.extend_from_slice(&TAG_X_RESOLUTION.to_le_bytes());
        t.extend_from_slice(&TYPE_RATIONAL.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&26u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        t.extend_from_slice(&72u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert!(matches!(
            c.image.get(TAG_X_RESOLUTION),
            Some(TagValue::Raw { type_code: TYPE_RATIONAL, count: 1, .. })
        ));
        assert!(diag.has_kind(DiagnosticKind::ValueDecode));
    }

    #[test]
    fn unknown_tag_is_retained() {
        let mut t = b"II*\0\x08\0\0\0".to_vec();
        t.extend_from_slice(&1u16.to_le_bytes());
        t.extend_from_slice(&0xC4A5u16.to_le_bytes());
        t.extend_from_slice(&TYPE_UNDEFINED.to_le_bytes());
        t.extend_from_slice(&3u32.to_le_bytes());
        t.extend_from_slice(&[7, 8, 9, 0]);
        t.extend_from_slice(&0u32.to_le_bytes());

        let mut diag = Diagnostics::new();
        let c = parse_tiff(&t, &mut diag).unwrap();
        assert_eq!(c.image.get(0xC4A5), Some(&TagValue::Undefined(vec![7, 8, 9])));
    }
}
