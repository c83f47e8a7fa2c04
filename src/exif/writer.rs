use chrono::{DateTime, Utc};
use std::ops::Range;

use crate::config::{ExifFields, VerifyConfig};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};
use crate::error::{GeoError, Result};

use super::gps::{self, Axis, GeoCoordinate};
use super::jpeg::ImageContainer;
use super::reader;
use super::tags::*;
use super::text;
use super::verify;

/// GPSVersionID written with every coordinate update.
const GPS_VERSION: [u8; 4] = [2, 2, 0, 0];

/// Size of the TIFF header (byte order, magic, IFD0 offset).
const TIFF_HEADER_LEN: usize = 8;

/// A coordinate update plus the optional text that goes with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Signed meters; negative below sea level.
    pub altitude: Option<f64>,
    pub keywords: Option<String>,
    pub description: Option<String>,
}

impl UpdateRequest {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// Reject out-of-range coordinates and unencodable altitudes before anything is built.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || self.latitude.abs() > Axis::Latitude.limit() {
            return Err(GeoError::LatitudeOutOfRange(self.latitude));
        }
        if !self.longitude.is_finite() || self.longitude.abs() > Axis::Longitude.limit() {
            return Err(GeoError::LongitudeOutOfRange(self.longitude));
        }
        if let Some(alt) = self.altitude {
            if gps::encode_altitude(alt).is_none() {
                return Err(GeoError::InvalidAltitude(alt));
            }
        }
        Ok(())
    }

    pub fn keywords_text(&self) -> Option<&str> {
        non_blank(self.keywords.as_deref())
    }

    pub fn description_text(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }

    /// Which optional metadata kinds this request will add under `fields`.
    pub fn metadata_added(&self, fields: &ExifFields) -> Vec<String> {
        let mut added = Vec::new();
        if fields.write_keywords && fields.write_xp_tags && self.keywords_text().is_some() {
            added.push("keywords".to_string());
        }
        if fields.write_description && self.description_text().is_some() {
            added.push("description".to_string());
        }
        added
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Result of [`write_metadata`].
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The rewritten JPEG.
    pub bytes: Vec<u8>,
    /// Where the new EXIF segment sits in `bytes`.
    pub segment: Range<usize>,
    /// Coordinate recovered by re-parsing `bytes`, when verification ran.
    pub verified: Option<GeoCoordinate>,
    pub mismatch: bool,
    pub metadata_added: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Build the directory set for an update.
///
/// Starts from a copy of `existing` (or an empty little-endian set), replaces
/// the GPS directory wholesale and upserts the text tags. Everything else,
/// including unknown tags and the thumbnail, is carried over untouched.
pub fn apply_update(
    existing: Option<&IfdCollection>,
    request: &UpdateRequest,
    now: DateTime<Utc>,
    fields: &ExifFields,
    diag: &mut Diagnostics,
) -> Result<IfdCollection> {
    request.validate()?;

    let mut collection = existing.cloned().unwrap_or_default();
    let order = collection.byte_order;

    collection.gps = build_gps_ifd(request, now, fields.write_altitude)?;
    diag.note(
        Stage::Builder,
        format!("GPS IFD rebuilt with {} tags", collection.gps.len()),
    );

    if fields.write_keywords {
        if let Some(keywords) = request.keywords_text() {
            if fields.write_xp_tags {
                collection
                    .image
                    .insert(TAG_XP_KEYWORDS, TagValue::Byte(text::encode_utf16le(keywords)));
            } else {
                diag.note(Stage::Builder, "keywords skipped: XP tags are disabled");
            }
        }
    }

    if fields.write_description {
        if let Some(description) = request.description_text() {
            collection
                .image
                .insert(TAG_IMAGE_DESCRIPTION, TagValue::Ascii(description.to_string()));
            if fields.write_xp_tags {
                collection
                    .image
                    .insert(TAG_XP_COMMENT, TagValue::Byte(text::encode_utf16le(description)));
            }
            if fields.write_user_comment {
                collection.exif.insert(
                    TAG_USER_COMMENT,
                    TagValue::Undefined(text::encode_user_comment(description, order)),
                );
            }
        }
    }

    Ok(collection)
}

fn build_gps_ifd(request: &UpdateRequest, now: DateTime<Utc>, with_altitude: bool) -> Result<Ifd> {
    let [lat_d, lat_m, lat_s] = gps::decimal_to_dms(request.latitude);
    let [lng_d, lng_m, lng_s] = gps::decimal_to_dms(request.longitude);

    let mut ifd = Ifd::new();
    ifd.insert(TAG_GPS_VERSION_ID, TagValue::Byte(GPS_VERSION.to_vec()));
    ifd.insert(
        TAG_GPS_LATITUDE_REF,
        TagValue::Ascii(Axis::Latitude.reference(request.latitude).to_string()),
    );
    ifd.insert(TAG_GPS_LATITUDE, TagValue::dms(lat_d, lat_m, lat_s));
    ifd.insert(
        TAG_GPS_LONGITUDE_REF,
        TagValue::Ascii(Axis::Longitude.reference(request.longitude).to_string()),
    );
    ifd.insert(TAG_GPS_LONGITUDE, TagValue::dms(lng_d, lng_m, lng_s));

    if let Some(alt) = request.altitude.filter(|_| with_altitude) {
        let (magnitude, reference) =
            gps::encode_altitude(alt).ok_or(GeoError::InvalidAltitude(alt))?;
        ifd.insert(TAG_GPS_ALTITUDE_REF, TagValue::Byte(vec![reference]));
        ifd.insert(TAG_GPS_ALTITUDE, TagValue::Rational(magnitude));
    }

    ifd.insert(
        TAG_GPS_TIME_STAMP,
        TagValue::Rationals(gps::timestamp_rationals(now).to_vec()),
    );
    ifd.insert(TAG_GPS_DATE_STAMP, TagValue::Ascii(gps::datestamp(now)));
    Ok(ifd)
}

// ── serialization ────────────────────────────────────────────────────

/// One encoded directory entry; `data` is already in the target byte order.
struct RawIfdEntry {
    tag: u16,
    type_code: u16,
    count: u32,
    data: Vec<u8>,
}

impl RawIfdEntry {
    fn encode(tag: u16, value: &TagValue, order: ByteOrder) -> Result<Self> {
        let (count, data) = match value {
            TagValue::Ascii(s) => {
                let mut data = s.as_bytes().to_vec();
                data.push(0);
                (data.len(), data)
            }
            TagValue::Rational(r) => (1, rational_bytes(std::slice::from_ref(r), order)),
            TagValue::Rationals(v) => (v.len(), rational_bytes(v, order)),
            TagValue::Short(v) => (v.len(), v.iter().flat_map(|&x| order.u16_bytes(x)).collect()),
            TagValue::Long(v) => (v.len(), v.iter().flat_map(|&x| order.u32_bytes(x)).collect()),
            TagValue::Byte(v) | TagValue::Undefined(v) => (v.len(), v.clone()),
            TagValue::Raw { count, data, .. } => (*count as usize, data.clone()),
        };
        Ok(Self {
            tag,
            type_code: value.type_code(),
            count: u32::try_from(count).map_err(|_| GeoError::ValueTooLarge { tag })?,
            data,
        })
    }

    /// A LONG offset entry; the value is patched once the layout is known.
    fn pointer(tag: u16) -> Self {
        Self {
            tag,
            type_code: TYPE_LONG,
            count: 1,
            data: vec![0; 4],
        }
    }

    /// Bytes this entry adds to the value pool (word aligned).
    fn pool_len(&self) -> usize {
        if self.data.len() <= 4 {
            0
        } else {
            self.data.len() + self.data.len() % 2
        }
    }
}

fn rational_bytes(values: &[Rational], order: ByteOrder) -> Vec<u8> {
    values
        .iter()
        .flat_map(|r| {
            let mut b = [0u8; 8];
            b[..4].copy_from_slice(&order.u32_bytes(r.num));
            b[4..].copy_from_slice(&order.u32_bytes(r.den));
            b
        })
        .collect()
}

/// A directory ready to be laid out: entries sorted by tag.
struct Block {
    entries: Vec<RawIfdEntry>,
}

impl Block {
    fn from_ifd(ifd: &Ifd, kind: IfdKind, order: ByteOrder) -> Result<Self> {
        let entries = ifd
            .iter()
            .filter(|(tag, _)| !is_structural_tag(kind, *tag))
            .map(|(tag, value)| RawIfdEntry::encode(tag, value, order))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    fn add_pointer(&mut self, tag: u16) {
        self.entries.push(RawIfdEntry::pointer(tag));
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.tag);
    }

    fn len(&self) -> usize {
        2 + self.entries.len() * 12 + 4 + self.entries.iter().map(RawIfdEntry::pool_len).sum::<usize>()
    }

    fn set_pointer(&mut self, tag: u16, value: usize, order: ByteOrder) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| GeoError::ValueTooLarge { tag })?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.data = order.u32_bytes(value).to_vec();
        }
        Ok(())
    }

    /// Append the directory at the current end of `out`, followed by its value pool.
    fn write(&self, out: &mut Vec<u8>, next: usize, order: ByteOrder) -> Result<()> {
        let start = out.len();
        let count = u16::try_from(self.entries.len())
            .map_err(|_| GeoError::ValueTooLarge { tag: 0 })?;
        let mut pool_at = start + 2 + self.entries.len() * 12 + 4;

        out.extend_from_slice(&order.u16_bytes(count));
        for entry in &self.entries {
            out.extend_from_slice(&order.u16_bytes(entry.tag));
            out.extend_from_slice(&order.u16_bytes(entry.type_code));
            out.extend_from_slice(&order.u32_bytes(entry.count));
            if entry.data.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..entry.data.len()].copy_from_slice(&entry.data);
                out.extend_from_slice(&inline);
            } else {
                let offset = u32::try_from(pool_at)
                    .map_err(|_| GeoError::ValueTooLarge { tag: entry.tag })?;
                out.extend_from_slice(&order.u32_bytes(offset));
                pool_at += entry.pool_len();
            }
        }
        let next = u32::try_from(next).map_err(|_| GeoError::ValueTooLarge { tag: 0 })?;
        out.extend_from_slice(&order.u32_bytes(next));

        for entry in self.entries.iter().filter(|e| e.data.len() > 4) {
            out.extend_from_slice(&entry.data);
            if entry.data.len() % 2 == 1 {
                out.push(0);
            }
        }
        Ok(())
    }
}

/// Serialize a directory set into TIFF data (the APP1 payload after `Exif\0\0`).
///
/// Layout: header, IFD0, Exif IFD, GPS IFD, Interop IFD, IFD1, thumbnail.
/// Empty directories are omitted together with their pointer. Offsets are
/// relative to the start of the TIFF header.
pub fn serialize(collection: &IfdCollection) -> Result<Vec<u8>> {
    let order = collection.byte_order;

    let has_interop = !collection.interop.is_empty();
    let has_exif = !collection.exif.is_empty() || has_interop;
    let has_gps = !collection.gps.is_empty();
    let has_first = !collection.first.is_empty() || collection.thumbnail.is_some();

    let mut image = Block::from_ifd(&collection.image, IfdKind::Image, order)?;
    let mut exif = Block::from_ifd(&collection.exif, IfdKind::Exif, order)?;
    let mut gps = Block::from_ifd(&collection.gps, IfdKind::Gps, order)?;
    let mut interop = Block::from_ifd(&collection.interop, IfdKind::Interop, order)?;
    let mut first = Block::from_ifd(&collection.first, IfdKind::First, order)?;

    if has_exif {
        image.add_pointer(TAG_EXIF_IFD_POINTER);
    }
    if has_gps {
        image.add_pointer(TAG_GPS_IFD_POINTER);
    }
    if has_interop {
        exif.add_pointer(TAG_INTEROP_IFD_POINTER);
    }
    if collection.thumbnail.is_some() {
        first.add_pointer(TAG_JPEG_IF_OFFSET);
        first.add_pointer(TAG_JPEG_IF_LENGTH);
    }
    for block in [&mut image, &mut exif, &mut gps, &mut interop, &mut first] {
        block.sort();
    }

    let image_at = TIFF_HEADER_LEN;
    let exif_at = image_at + image.len();
    let gps_at = exif_at + if has_exif { exif.len() } else { 0 };
    let interop_at = gps_at + if has_gps { gps.len() } else { 0 };
    let first_at = interop_at + if has_interop { interop.len() } else { 0 };
    let thumbnail_at = first_at + if has_first { first.len() } else { 0 };

    image.set_pointer(TAG_EXIF_IFD_POINTER, exif_at, order)?;
    image.set_pointer(TAG_GPS_IFD_POINTER, gps_at, order)?;
    exif.set_pointer(TAG_INTEROP_IFD_POINTER, interop_at, order)?;
    if let Some(thumbnail) = &collection.thumbnail {
        first.set_pointer(TAG_JPEG_IF_OFFSET, thumbnail_at, order)?;
        first.set_pointer(TAG_JPEG_IF_LENGTH, thumbnail.len(), order)?;
    }

    let mut out = Vec::with_capacity(thumbnail_at + collection.thumbnail.as_ref().map_or(0, Vec::len));
    out.extend_from_slice(order.marker());
    out.extend_from_slice(&order.u16_bytes(42));
    out.extend_from_slice(&order.u32_bytes(image_at as u32));

    image.write(&mut out, if has_first { first_at } else { 0 }, order)?;
    if has_exif {
        exif.write(&mut out, 0, order)?;
    }
    if has_gps {
        gps.write(&mut out, 0, order)?;
    }
    if has_interop {
        interop.write(&mut out, 0, order)?;
    }
    if has_first {
        first.write(&mut out, 0, order)?;
    }
    if let Some(thumbnail) = &collection.thumbnail {
        out.extend_from_slice(thumbnail);
    }

    log::debug!("Serialized EXIF: {} bytes, {:?}", out.len(), order);
    Ok(out)
}

/// Write a coordinate update (and optional text) into a JPEG held in memory.
///
/// All-or-nothing: validation, building and serialization happen before any
/// output exists, so an `Err` means no bytes were produced. The result is
/// then re-parsed and compared against the request when `verify_cfg.enabled`.
/// A mismatch is a warning in `diagnostics`, not an error.
pub fn write_metadata(
    input: &[u8],
    request: &UpdateRequest,
    now: DateTime<Utc>,
    fields: &ExifFields,
    verify_cfg: &VerifyConfig,
) -> Result<WriteOutcome> {
    request.validate()?;

    let mut diag = Diagnostics::new();
    let container = ImageContainer::from_bytes(input.to_vec(), &mut diag)?;
    let existing = reader::read_segment(&container, &mut diag);
    if container.has_exif() && existing.is_none() {
        diag.warn(
            Stage::Builder,
            DiagnosticKind::Structural,
            "existing EXIF segment is unreadable and will be replaced",
        );
    }

    let collection = apply_update(existing.as_ref(), request, now, fields, &mut diag)?;
    let tiff = serialize(&collection)?;
    let (bytes, segment) = container.splice(&tiff)?;
    diag.note(
        Stage::Builder,
        format!("EXIF segment written at {}..{}", segment.start, segment.end),
    );

    let (verified, mismatch) = if verify_cfg.enabled {
        let check = verify::verify_roundtrip(
            &bytes,
            request.latitude,
            request.longitude,
            verify_cfg.tolerance_degrees,
            &mut diag,
        );
        (check.recovered, check.mismatch)
    } else {
        (None, false)
    };

    Ok(WriteOutcome {
        bytes,
        segment,
        verified,
        mismatch,
        metadata_added: request.metadata_added(fields),
        diagnostics: diag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 3, 9).unwrap()
    }

    fn sydney() -> UpdateRequest {
        UpdateRequest::new(-33.8688, 151.2093)
    }

    fn reparse(tiff: &[u8]) -> IfdCollection {
        let mut diag = Diagnostics::new();
        let c = reader::parse_tiff(tiff, &mut diag).unwrap();
        assert!(diag.warnings().next().is_none(), "{:?}", diag);
        c
    }

    // ── validation ───────────────────────────────────────────────────

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            UpdateRequest::new(90.5, 0.0).validate(),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            UpdateRequest::new(0.0, -180.01).validate(),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            UpdateRequest::new(f64::NAN, 0.0).validate(),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
        let mut req = sydney();
        req.altitude = Some(f64::INFINITY);
        assert!(matches!(req.validate(), Err(GeoError::InvalidAltitude(_))));
        assert!(UpdateRequest::new(90.0, -180.0).validate().is_ok());
    }

    #[test]
    fn blank_text_is_ignored() {
        let mut req = sydney();
        req.keywords = Some("   ".into());
        req.description = Some(" Bondi ".into());
        assert_eq!(req.keywords_text(), None);
        assert_eq!(req.description_text(), Some("Bondi"));
        assert_eq!(req.metadata_added(&ExifFields::default()), vec!["description"]);
    }

    // ── building ─────────────────────────────────────────────────────

    #[test]
    fn gps_ifd_is_replaced() {
        let mut existing = IfdCollection::new();
        existing.image.insert(TAG_MAKE, TagValue::Ascii("Canon".into()));
        existing.gps.insert(TAG_GPS_SPEED, TagValue::Rational(Rational::new(5, 1)));
        existing.gps.insert(TAG_GPS_LATITUDE_REF, TagValue::Ascii("N".into()));

        let mut diag = Diagnostics::new();
        let c = apply_update(Some(&existing), &sydney(), now(), &ExifFields::default(), &mut diag)
            .unwrap();

        assert!(!c.gps.contains(TAG_GPS_SPEED));
        assert_eq!(c.gps.get(TAG_GPS_LATITUDE_REF).and_then(TagValue::as_str), Some("S"));
        assert_eq!(c.gps.get(TAG_GPS_LONGITUDE_REF).and_then(TagValue::as_str), Some("E"));
        assert_eq!(c.gps.get(TAG_GPS_VERSION_ID), Some(&TagValue::Byte(vec![2, 2, 0, 0])));
        assert_eq!(c.gps.get(TAG_GPS_DATE_STAMP).and_then(TagValue::as_str), Some("2024:05:01"));
        assert_eq!(c.image.get(TAG_MAKE).and_then(TagValue::as_str), Some("Canon"));
    }

    #[test]
    fn altitude_written_with_reference() {
        let mut req = sydney();
        req.altitude = Some(-4.5);
        let mut diag = Diagnostics::new();
        let c = apply_update(None, &req, now(), &ExifFields::default(), &mut diag).unwrap();
        assert_eq!(c.gps.get(TAG_GPS_ALTITUDE_REF), Some(&TagValue::Byte(vec![1])));
        assert_eq!(
            c.gps.get(TAG_GPS_ALTITUDE),
            Some(&TagValue::Rational(Rational::new(450, 100)))
        );

        let fields = ExifFields {
            write_altitude: false,
            ..ExifFields::default()
        };
        let c = apply_update(None, &req, now(), &fields, &mut diag).unwrap();
        assert!(!c.gps.contains(TAG_GPS_ALTITUDE));
    }

    #[test]
    fn text_tags_upserted() {
        let mut existing = IfdCollection::new();
        existing.image.insert(TAG_IMAGE_DESCRIPTION, TagValue::Ascii("old".into()));
        existing.image.insert(TAG_MODEL, TagValue::Ascii("X100V".into()));

        let mut req = sydney();
        req.keywords = Some("harbour; bridge".into());
        req.description = Some("Opera House".into());
        let mut diag = Diagnostics::new();
        let c = apply_update(Some(&existing), &req, now(), &ExifFields::default(), &mut diag)
            .unwrap();

        assert_eq!(c.image.tags()[..2], [TAG_IMAGE_DESCRIPTION, TAG_MODEL]);
        assert_eq!(
            c.image.get(TAG_IMAGE_DESCRIPTION).and_then(TagValue::as_str),
            Some("Opera House")
        );
        assert_eq!(
            c.image.get(TAG_XP_KEYWORDS),
            Some(&TagValue::Byte(text::encode_utf16le("harbour; bridge")))
        );
        assert!(c.image.contains(TAG_XP_COMMENT));
        assert!(c.exif.contains(TAG_USER_COMMENT));
    }

    #[test]
    fn field_switches_respected() {
        let mut req = sydney();
        req.keywords = Some("k".into());
        req.description = Some("d".into());
        let fields = ExifFields {
            write_xp_tags: false,
            write_user_comment: false,
            ..ExifFields::default()
        };
        let mut diag = Diagnostics::new();
        let c = apply_update(None, &req, now(), &fields, &mut diag).unwrap();
        assert!(!c.image.contains(TAG_XP_KEYWORDS));
        assert!(!c.image.contains(TAG_XP_COMMENT));
        assert!(c.image.contains(TAG_IMAGE_DESCRIPTION));
        assert!(c.exif.is_empty());
        assert_eq!(req.metadata_added(&fields), vec!["description"]);
    }

    // ── serialization ────────────────────────────────────────────────

    #[test]
    fn serialize_round_trips_through_parser() {
        let mut c = IfdCollection::new();
        c.image.insert(TAG_MODEL, TagValue::Ascii("EOS R5".into()));
        c.image.insert(TAG_MAKE, TagValue::Ascii("Canon".into()));
        c.image.insert(TAG_ORIENTATION, TagValue::Short(vec![1]));
        c.exif.insert(TAG_F_NUMBER, TagValue::Rational(Rational::new(28, 10)));
        c.interop.insert(TAG_INTEROP_INDEX, TagValue::Ascii("R98".into()));
        c.gps = build_gps_ifd(&sydney(), now(), true).unwrap();

        let tiff = serialize(&c).unwrap();
        let back = reparse(&tiff);
        assert_eq!(back.image.tags(), vec![TAG_MAKE, TAG_MODEL, TAG_ORIENTATION]);
        assert_eq!(back.exif, c.exif);
        assert_eq!(back.gps, c.gps);
        assert_eq!(back.interop, c.interop);
    }

    #[test]
    fn serialize_is_deterministic() {
        let c = apply_update(None, &sydney(), now(), &ExifFields::default(), &mut Diagnostics::new())
            .unwrap();
        assert_eq!(serialize(&c).unwrap(), serialize(&c).unwrap());
    }

    #[test]
    fn big_endian_is_kept() {
        let mut c = IfdCollection {
            byte_order: ByteOrder::BigEndian,
            ..IfdCollection::default()
        };
        c.image.insert(TAG_MAKE, TagValue::Ascii("Nikon".into()));
        let tiff = serialize(&c).unwrap();
        assert_eq!(&tiff[..4], b"MM\0*");
        assert_eq!(reparse(&tiff).image, c.image);
    }

    #[test]
    fn thumbnail_carried_through() {
        let mut c = IfdCollection::new();
        c.image.insert(TAG_MAKE, TagValue::Ascii("Sony".into()));
        c.first.insert(TAG_COMPRESSION, TagValue::Short(vec![6]));
        c.thumbnail = Some(vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);

        let back = reparse(&serialize(&c).unwrap());
        assert_eq!(back.thumbnail, c.thumbnail);
        assert_eq!(back.first, c.first);
    }

    #[test]
    fn raw_values_survive() {
        let mut c = IfdCollection::new();
        c.image.insert(
            0xC4A5,
            TagValue::Raw {
                type_code: 9,
                count: 2,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            },
        );
        let tiff = serialize(&c).unwrap();
        let mut diag = Diagnostics::new();
        let back = reader::parse_tiff(&tiff, &mut diag).unwrap();
        assert_eq!(back.image, c.image);
    }

    #[test]
    fn odd_values_are_padded() {
        let mut c = IfdCollection::new();
        c.image.insert(TAG_MAKE, TagValue::Ascii("Fuji".into()));
        c.image.insert(TAG_MODEL, TagValue::Ascii("Q2".into()));
        let tiff = serialize(&c).unwrap();
        // header 8 + count 2 + 2 entries 24 + next 4 + "Fuji\0" 5 + pad 1
        assert_eq!(tiff.len(), 44);
        assert_eq!(tiff.len() % 2, 0);
    }

    // ── write_metadata ───────────────────────────────────────────────

    fn bare_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22, 0xFF, 0xD9]
    }

    #[test]
    fn write_inserts_and_verifies() {
        let out = write_metadata(
            &bare_jpeg(),
            &sydney(),
            now(),
            &ExifFields::default(),
            &VerifyConfig::default(),
        )
        .unwrap();

        assert_eq!(out.segment.start, 2);
        assert_eq!(&out.bytes[out.segment.end..], &bare_jpeg()[2..]);
        assert!(!out.mismatch);
        assert!(out.verified.unwrap().matches(-33.8688, 151.2093, 1.5e-6));
    }

    #[test]
    fn invalid_request_produces_nothing() {
        let err = write_metadata(
            &bare_jpeg(),
            &UpdateRequest::new(123.0, 0.0),
            now(),
            &ExifFields::default(),
            &VerifyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GeoError::LatitudeOutOfRange(_)));
    }

    #[test]
    fn oversized_text_fails_before_output() {
        let mut req = sydney();
        req.description = Some("x".repeat(40_000));
        let err = write_metadata(
            &bare_jpeg(),
            &req,
            now(),
            &ExifFields::default(),
            &VerifyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GeoError::SegmentTooLarge { .. }));
    }
}
