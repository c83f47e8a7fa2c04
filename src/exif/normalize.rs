//! Value normalizer: merge decode passes into one [`CanonicalFieldSet`].
//!
//! A decoded [`IfdCollection`] is viewed through two passes. The `Raw` pass
//! names fields by their EXIF tag name and keeps exact values; the `Friendly`
//! pass uses camelCase names, translated enumerations and decimal GPS.
//! Merging scans an ordered list of passes; for every logical field the
//! first non-null match wins, with names compared case-insensitively.

use serde::Serialize;
use serde::ser::SerializeMap;
use std::fmt;

use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};

use super::gps::{self, Axis, GeoCoordinate};
use super::tags::*;
use super::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Raw,
    Friendly,
}

/// A value as seen by one decode pass.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Rationals(Vec<Rational>),
    Bytes(Vec<u8>),
}

/// One independently decoded field set.
#[derive(Debug, Clone)]
pub struct DecodePass {
    pub kind: PassKind,
    byte_order: ByteOrder,
    fields: Vec<(String, FieldValue)>,
}

impl DecodePass {
    pub fn new(kind: PassKind, byte_order: ByteOrder) -> Self {
        Self {
            kind,
            byte_order,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Case-insensitive lookup; the first field with that name wins.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Exact values under EXIF tag names. Thumbnail (IFD1) and interop tags are left out.
    pub fn raw(collection: &IfdCollection) -> Self {
        let mut pass = Self::new(PassKind::Raw, collection.byte_order);
        for kind in [IfdKind::Image, IfdKind::Exif, IfdKind::Gps] {
            for (tag, value) in collection.ifd(kind).iter() {
                let Some(name) = tag_name(kind, tag) else {
                    continue;
                };
                if let Some(field) = raw_field(value) {
                    pass.push(name, field);
                }
            }
        }
        pass
    }

    /// Translated values under camelCase names, plus decimal GPS fields.
    pub fn friendly(collection: &IfdCollection, diag: &mut Diagnostics) -> Self {
        let order = collection.byte_order;
        let mut pass = Self::new(PassKind::Friendly, order);

        for kind in [IfdKind::Image, IfdKind::Exif] {
            for (tag, value) in collection.ifd(kind).iter() {
                let Some(name) = tag_name(kind, tag) else {
                    continue;
                };
                if let Some(field) = friendly_field(tag, value, order) {
                    pass.push(camel_case(name), field);
                } else if matches!(value, TagValue::Byte(_) | TagValue::Undefined(_)) {
                    diag.note(Stage::Normalizer, format!("{name} has no text form"));
                }
            }
        }

        let gps = &collection.gps;
        let lat = gps_decimal(gps, TAG_GPS_LATITUDE, TAG_GPS_LATITUDE_REF, Axis::Latitude);
        let lng = gps_decimal(gps, TAG_GPS_LONGITUDE, TAG_GPS_LONGITUDE_REF, Axis::Longitude);
        if let (Some(lat), Some(lng)) = (lat, lng) {
            pass.push("latitude", FieldValue::Number(lat));
            pass.push("longitude", FieldValue::Number(lng));
        }
        if let Some(TagValue::Rational(r)) = gps.get(TAG_GPS_ALTITUDE) {
            let reference = gps.get(TAG_GPS_ALTITUDE_REF).and_then(TagValue::as_uint);
            if let Some(alt) = gps::decode_altitude(*r, reference) {
                pass.push("altitude", FieldValue::Number(alt));
            }
        }
        for (tag, name) in [(TAG_GPS_SPEED, "speed"), (TAG_GPS_IMG_DIRECTION, "imgDirection")] {
            if let Some(v) = gps.get(tag).and_then(single_rational).and_then(Rational::to_f64) {
                pass.push(name, FieldValue::Number(v));
            }
        }
        if let Some(ts) = gps
            .get(TAG_GPS_TIME_STAMP)
            .and_then(TagValue::as_rationals)
            .and_then(gps::format_timestamp)
        {
            pass.push("timestamp", FieldValue::Text(ts));
        }
        if let Some(ds) = gps.get(TAG_GPS_DATE_STAMP).and_then(TagValue::as_str) {
            pass.push("datestamp", FieldValue::Text(ds.trim().to_string()));
        }

        pass
    }
}

/// A human-facing value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

struct FieldSpec {
    key: &'static str,
    aliases: &'static [&'static str],
}

const fn field(key: &'static str, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { key, aliases }
}

/// Logical fields in output order. Aliases are tried in order within each pass.
const FIELDS: &[FieldSpec] = &[
    field("make", &["Make"]),
    field("model", &["Model"]),
    field("dateTime", &["DateTime"]),
    field("dateTimeOriginal", &["DateTimeOriginal"]),
    field("orientation", &["Orientation"]),
    field("xResolution", &["XResolution"]),
    field("yResolution", &["YResolution"]),
    field("resolutionUnit", &["ResolutionUnit"]),
    field("software", &["Software"]),
    field("artist", &["Artist"]),
    field("copyright", &["Copyright"]),
    field("colorSpace", &["ColorSpace"]),
    field("whiteBalance", &["WhiteBalance"]),
    field("flash", &["Flash"]),
    field("focalLength", &["FocalLength"]),
    field("exposureTime", &["ExposureTime"]),
    field("fNumber", &["FNumber"]),
    field("iso", &["ISO", "ISOSpeedRatings"]),
    field("exposureProgram", &["ExposureProgram"]),
    field("meteringMode", &["MeteringMode"]),
    field("lensMake", &["LensMake"]),
    field("lensModel", &["LensModel"]),
    field("digitalZoomRatio", &["DigitalZoomRatio"]),
    field("sceneCaptureType", &["SceneCaptureType"]),
    field("gainControl", &["GainControl"]),
    field("contrast", &["Contrast"]),
    field("saturation", &["Saturation"]),
    field("sharpness", &["Sharpness"]),
    field("imageWidth", &["ImageWidth", "ExifImageWidth"]),
    field("imageHeight", &["ImageHeight", "ExifImageHeight"]),
    field("photometricInterpretation", &["PhotometricInterpretation"]),
    field("compression", &["Compression"]),
    field("bitsPerSample", &["BitsPerSample"]),
    field("samplesPerPixel", &["SamplesPerPixel"]),
    field("keywords", &["XPKeywords", "Keywords"]),
    field("description", &["XPComment", "ImageDescription", "UserComment"]),
];

/// The merged, human-facing field set. Every logical field is present; absent ones are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFieldSet {
    values: Vec<(&'static str, Option<CanonicalValue>)>,
}

impl Default for CanonicalFieldSet {
    fn default() -> Self {
        Self {
            values: FIELDS.iter().map(|f| (f.key, None)).collect(),
        }
    }
}

impl CanonicalFieldSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    /// Flat `(key, value)` pairs in a fixed order, nulls included.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, Option<&CanonicalValue>)> {
        self.values.iter().map(|(k, v)| (*k, v.as_ref()))
    }

    /// Number of fields that have a value.
    pub fn present(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present() == 0
    }
}

impl Serialize for CanonicalFieldSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Build the default pass list (Raw, then Friendly) and merge it.
pub fn normalize(
    collection: Option<&IfdCollection>,
    diag: &mut Diagnostics,
) -> (CanonicalFieldSet, Option<GeoCoordinate>) {
    let Some(collection) = collection else {
        return (CanonicalFieldSet::empty(), None);
    };
    let passes = [
        DecodePass::raw(collection),
        DecodePass::friendly(collection, diag),
    ];
    merge(&passes, diag)
}

/// Merge passes in the given order.
pub fn merge(
    passes: &[DecodePass],
    diag: &mut Diagnostics,
) -> (CanonicalFieldSet, Option<GeoCoordinate>) {
    let mut set = CanonicalFieldSet::empty();
    for (entry, slot) in FIELDS.iter().zip(set.values.iter_mut()) {
        slot.1 = resolve_field(entry, passes, diag);
    }
    let coordinate = resolve_coordinate(passes, diag);
    (set, coordinate)
}

fn resolve_field(
    entry: &FieldSpec,
    passes: &[DecodePass],
    diag: &mut Diagnostics,
) -> Option<CanonicalValue> {
    for pass in passes {
        for alias in entry.aliases {
            let Some(value) = pass.get(alias) else {
                continue;
            };
            if let Some(v) = canonical_value(alias, value, pass.byte_order, diag) {
                return Some(v);
            }
        }
    }
    None
}

fn canonical_value(
    name: &str,
    value: &FieldValue,
    order: ByteOrder,
    diag: &mut Diagnostics,
) -> Option<CanonicalValue> {
    match value {
        FieldValue::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| CanonicalValue::Text(s.to_string()))
        }
        FieldValue::Integer(i) => Some(CanonicalValue::Integer(*i)),
        FieldValue::Number(n) => n.is_finite().then_some(CanonicalValue::Number(*n)),
        FieldValue::Rationals(v) => match v.as_slice() {
            [r] => r.to_f64().map(CanonicalValue::Number),
            _ => None,
        },
        FieldValue::Bytes(bytes) => {
            let decoded = if name.starts_with("XP") {
                text::decode_utf16le(bytes)
            } else if name.eq_ignore_ascii_case("UserComment") {
                text::decode_user_comment(bytes, order)
            } else {
                return None;
            };
            match decoded {
                Some(s) if !s.trim().is_empty() => Some(CanonicalValue::Text(s.trim().to_string())),
                Some(_) => None,
                None => {
                    diag.warn(
                        Stage::Text,
                        DiagnosticKind::ValueDecode,
                        format!("{name} is not valid text; field left empty"),
                    );
                    None
                }
            }
        }
    }
}

fn resolve_coordinate(passes: &[DecodePass], diag: &mut Diagnostics) -> Option<GeoCoordinate> {
    let (latitude, longitude) = decimal_pair(passes, diag).or_else(|| dms_pair(passes, diag))?;

    let mut coordinate = GeoCoordinate::new(latitude, longitude);
    coordinate.altitude = first_number(passes, "altitude").or_else(|| raw_altitude(passes));
    coordinate.altitude_is_below_sea_level = coordinate.altitude.is_some_and(|a| a < 0.0);
    coordinate.bearing = first_number(passes, "imgDirection")
        .or_else(|| first_number(passes, "GPSImgDirection"));
    coordinate.bearing_ref = first_text(passes, "GPSImgDirectionRef");
    coordinate.speed = first_number(passes, "speed").or_else(|| first_number(passes, "GPSSpeed"));
    coordinate.speed_ref = first_text(passes, "GPSSpeedRef");
    coordinate.timestamp = first_text(passes, "timestamp").or_else(|| {
        passes.iter().find_map(|p| match p.get("GPSTimeStamp") {
            Some(FieldValue::Rationals(v)) => gps::format_timestamp(v),
            _ => None,
        })
    });
    coordinate.datestamp = first_text(passes, "datestamp").or_else(|| first_text(passes, "GPSDateStamp"));

    Some(coordinate)
}

/// Decimal latitude/longitude supplied directly by a pass (sign already resolved).
fn decimal_pair(passes: &[DecodePass], diag: &mut Diagnostics) -> Option<(f64, f64)> {
    for pass in passes {
        let (Some(lat), Some(lng)) = (
            pass.get("latitude").and_then(as_f64),
            pass.get("longitude").and_then(as_f64),
        ) else {
            continue;
        };
        if in_range(lat, Axis::Latitude) && in_range(lng, Axis::Longitude) {
            return Some((lat, lng));
        }
        diag.warn(
            Stage::Coordinates,
            DiagnosticKind::ValueDecode,
            format!("decimal coordinate ({lat}, {lng}) is out of range"),
        );
    }
    None
}

/// GPSLatitude/GPSLongitude DMS triples combined with their reference tags.
fn dms_pair(passes: &[DecodePass], diag: &mut Diagnostics) -> Option<(f64, f64)> {
    let mut seen = false;
    for pass in passes {
        let (Some(lat_dms), Some(lng_dms)) = (pass.get("GPSLatitude"), pass.get("GPSLongitude")) else {
            continue;
        };
        seen = true;
        let lat = dms_field(lat_dms, pass.get("GPSLatitudeRef"), Axis::Latitude);
        let lng = dms_field(lng_dms, pass.get("GPSLongitudeRef"), Axis::Longitude);
        if let (Some(lat), Some(lng)) = (lat, lng) {
            return Some((lat, lng));
        }
    }
    if seen {
        diag.warn(
            Stage::Coordinates,
            DiagnosticKind::ValueDecode,
            "GPS latitude/longitude could not be decoded",
        );
    }
    None
}

fn dms_field(value: &FieldValue, reference: Option<&FieldValue>, axis: Axis) -> Option<f64> {
    let FieldValue::Rationals(dms) = value else {
        return None;
    };
    let reference = match reference {
        Some(FieldValue::Text(s)) => Some(s.as_str()),
        _ => None,
    };
    gps::dms_to_decimal(dms, reference).filter(|v| in_range(*v, axis))
}

fn raw_altitude(passes: &[DecodePass]) -> Option<f64> {
    passes.iter().find_map(|p| {
        let Some(FieldValue::Rationals(v)) = p.get("GPSAltitude") else {
            return None;
        };
        let [magnitude] = v.as_slice() else {
            return None;
        };
        let reference = match p.get("GPSAltitudeRef") {
            Some(FieldValue::Integer(i)) => u32::try_from(*i).ok(),
            Some(FieldValue::Bytes(b)) => b.first().map(|&x| x as u32),
            _ => None,
        };
        gps::decode_altitude(*magnitude, reference)
    })
}

fn first_number(passes: &[DecodePass], name: &str) -> Option<f64> {
    passes.iter().find_map(|p| p.get(name).and_then(as_f64))
}

fn first_text(passes: &[DecodePass], name: &str) -> Option<String> {
    passes.iter().find_map(|p| match p.get(name) {
        Some(FieldValue::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn as_f64(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) if n.is_finite() => Some(*n),
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Rationals(v) => match v.as_slice() {
            [r] => r.to_f64(),
            _ => None,
        },
        _ => None,
    }
}

fn in_range(value: f64, axis: Axis) -> bool {
    value.is_finite() && value.abs() <= axis.limit()
}

fn gps_decimal(gps: &Ifd, tag: u16, ref_tag: u16, axis: Axis) -> Option<f64> {
    let dms = gps.get(tag)?.as_rationals()?;
    let reference = gps.get(ref_tag).and_then(TagValue::as_str);
    gps::dms_to_decimal(dms, reference).filter(|v| in_range(*v, axis))
}

fn single_rational(value: &TagValue) -> Option<Rational> {
    match value {
        TagValue::Rational(r) => Some(*r),
        _ => None,
    }
}

fn raw_field(value: &TagValue) -> Option<FieldValue> {
    Some(match value {
        TagValue::Ascii(s) => FieldValue::Text(s.clone()),
        TagValue::Rational(r) => FieldValue::Rationals(vec![*r]),
        TagValue::Rationals(v) => FieldValue::Rationals(v.clone()),
        TagValue::Short(v) => integers(v.iter().map(|&x| x as i64))?,
        TagValue::Long(v) => integers(v.iter().map(|&x| x as i64))?,
        TagValue::Byte(v) | TagValue::Undefined(v) => FieldValue::Bytes(v.clone()),
        TagValue::Raw { .. } => return None,
    })
}

/// One integer stays numeric; several are joined as text ("8, 8, 8").
fn integers(values: impl Iterator<Item = i64>) -> Option<FieldValue> {
    let values: Vec<i64> = values.collect();
    match values.as_slice() {
        [] => None,
        [one] => Some(FieldValue::Integer(*one)),
        many => Some(FieldValue::Text(
            many.iter().map(i64::to_string).collect::<Vec<_>>().join(", "),
        )),
    }
}

fn friendly_field(tag: u16, value: &TagValue, order: ByteOrder) -> Option<FieldValue> {
    match value {
        TagValue::Short(_) | TagValue::Long(_) => {
            let code = value.as_uint()?;
            match describe(tag, code) {
                Some(label) => Some(FieldValue::Text(label.to_string())),
                None => raw_field(value),
            }
        }
        TagValue::Rational(r) if tag == TAG_EXPOSURE_TIME => Some(exposure_time(*r)?),
        TagValue::Rational(r) => r.to_f64().map(FieldValue::Number),
        TagValue::Byte(bytes) if (TAG_XP_TITLE..=TAG_XP_SUBJECT).contains(&tag) => {
            text::decode_utf16le(bytes).map(FieldValue::Text)
        }
        TagValue::Undefined(bytes) if tag == TAG_USER_COMMENT => {
            text::decode_user_comment(bytes, order).map(FieldValue::Text)
        }
        TagValue::Undefined(bytes) if tag == TAG_EXIF_VERSION => std::str::from_utf8(bytes)
            .ok()
            .map(|s| FieldValue::Text(s.to_string())),
        TagValue::Ascii(s) => Some(FieldValue::Text(s.trim().to_string())),
        _ => None,
    }
}

/// `1/250` style for sub-second exposures, seconds otherwise.
fn exposure_time(r: Rational) -> Option<FieldValue> {
    let seconds = r.to_f64()?;
    if r.num == 0 || seconds >= 1.0 {
        return Some(FieldValue::Number(seconds));
    }
    if r.den % r.num == 0 {
        Some(FieldValue::Text(format!("1/{}", r.den / r.num)))
    } else {
        Some(FieldValue::Text(r.to_string()))
    }
}

/// Lower-camel form of an EXIF tag name: `FNumber` → `fNumber`, `XPComment` → `xpComment`.
fn camel_case(name: &str) -> String {
    let upper = name.chars().take_while(char::is_ascii_uppercase).count();
    let lower = match upper {
        0 => 0,
        1 => 1,
        n if n == name.len() => n,
        n => n - 1,
    };
    let mut out = name[..lower].to_ascii_lowercase();
    out.push_str(&name[lower..]);
    out
}

/// Human label for enumerated SHORT values.
fn describe(tag: u16, code: u32) -> Option<&'static str> {
    let label = match (tag, code) {
        (TAG_ORIENTATION, 1) => "Horizontal (normal)",
        (TAG_ORIENTATION, 2) => "Mirror horizontal",
        (TAG_ORIENTATION, 3) => "Rotate 180",
        (TAG_ORIENTATION, 4) => "Mirror vertical",
        (TAG_ORIENTATION, 5) => "Mirror horizontal and rotate 270 CW",
        (TAG_ORIENTATION, 6) => "Rotate 90 CW",
        (TAG_ORIENTATION, 7) => "Mirror horizontal and rotate 90 CW",
        (TAG_ORIENTATION, 8) => "Rotate 270 CW",
        (TAG_RESOLUTION_UNIT, 1) => "None",
        (TAG_RESOLUTION_UNIT, 2) => "inches",
        (TAG_RESOLUTION_UNIT, 3) => "cm",
        (TAG_COMPRESSION, 1) => "Uncompressed",
        (TAG_COMPRESSION, 6) => "JPEG",
        (TAG_PHOTOMETRIC_INTERPRETATION, 2) => "RGB",
        (TAG_PHOTOMETRIC_INTERPRETATION, 6) => "YCbCr",
        (TAG_COLOR_SPACE, 1) => "sRGB",
        (TAG_COLOR_SPACE, 0xFFFF) => "Uncalibrated",
        (TAG_WHITE_BALANCE, 0) => "Auto",
        (TAG_WHITE_BALANCE, 1) => "Manual",
        (TAG_EXPOSURE_PROGRAM, 0) => "Not defined",
        (TAG_EXPOSURE_PROGRAM, 1) => "Manual",
        (TAG_EXPOSURE_PROGRAM, 2) => "Normal program",
        (TAG_EXPOSURE_PROGRAM, 3) => "Aperture priority",
        (TAG_EXPOSURE_PROGRAM, 4) => "Shutter priority",
        (TAG_EXPOSURE_PROGRAM, 5) => "Creative program",
        (TAG_EXPOSURE_PROGRAM, 6) => "Action program",
        (TAG_EXPOSURE_PROGRAM, 7) => "Portrait mode",
        (TAG_EXPOSURE_PROGRAM, 8) => "Landscape mode",
        (TAG_METERING_MODE, 0) => "Unknown",
        (TAG_METERING_MODE, 1) => "Average",
        (TAG_METERING_MODE, 2) => "CenterWeightedAverage",
        (TAG_METERING_MODE, 3) => "Spot",
        (TAG_METERING_MODE, 4) => "MultiSpot",
        (TAG_METERING_MODE, 5) => "Pattern",
        (TAG_METERING_MODE, 6) => "Partial",
        (TAG_METERING_MODE, 255) => "Other",
        (TAG_FLASH, c) if c & 1 == 1 => "Flash fired",
        (TAG_FLASH, _) => "Flash did not fire",
        (TAG_SCENE_CAPTURE_TYPE, 0) => "Standard",
        (TAG_SCENE_CAPTURE_TYPE, 1) => "Landscape",
        (TAG_SCENE_CAPTURE_TYPE, 2) => "Portrait",
        (TAG_SCENE_CAPTURE_TYPE, 3) => "Night",
        (TAG_GAIN_CONTROL, 0) => "None",
        (TAG_GAIN_CONTROL, 1) => "Low gain up",
        (TAG_GAIN_CONTROL, 2) => "High gain up",
        (TAG_GAIN_CONTROL, 3) => "Low gain down",
        (TAG_GAIN_CONTROL, 4) => "High gain down",
        (TAG_CONTRAST | TAG_SHARPNESS, 0) => "Normal",
        (TAG_CONTRAST | TAG_SHARPNESS, 1) => "Soft",
        (TAG_CONTRAST | TAG_SHARPNESS, 2) => "Hard",
        (TAG_SATURATION, 0) => "Normal",
        (TAG_SATURATION, 1) => "Low",
        (TAG_SATURATION, 2) => "High",
        _ => return None,
    };
    Some(label)
}
