//! Coordinate codec: decimal degrees ⇄ EXIF degrees/minutes/seconds rationals.
//!
//! Seconds keep centisecond precision (denominator 100), which bounds the
//! round-trip error at 0.005″ ≈ 1.4×10⁻⁶ degrees. Hemisphere and altitude
//! sign live only in the reference tags; magnitudes are always non-negative.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use super::tags::Rational;

/// Largest round-trip error of [`decimal_to_dms`] → [`dms_to_decimal`], in degrees.
pub const DMS_TOLERANCE_DEGREES: f64 = 1.5e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn limit(self) -> f64 {
        match self {
            Self::Latitude => 90.0,
            Self::Longitude => 180.0,
        }
    }

    /// Reference letter for a signed value: N/S for latitude, E/W for longitude.
    pub fn reference(self, value: f64) -> &'static str {
        match (self, value < 0.0) {
            (Self::Latitude, false) => "N",
            (Self::Latitude, true) => "S",
            (Self::Longitude, false) => "E",
            (Self::Longitude, true) => "W",
        }
    }
}

/// A decoded GPS position with the optional attributes carried alongside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Signed meters; negative below sea level.
    pub altitude: Option<f64>,
    pub altitude_is_below_sea_level: bool,
    pub bearing: Option<f64>,
    pub bearing_ref: Option<String>,
    pub speed: Option<f64>,
    pub speed_ref: Option<String>,
    /// UTC time of day, `HH:MM:SS`.
    pub timestamp: Option<String>,
    /// `YYYY:MM:DD`.
    pub datestamp: Option<String>,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// True when both axes are within `tolerance` degrees of the given point.
    pub fn matches(&self, latitude: f64, longitude: f64, tolerance: f64) -> bool {
        (self.latitude - latitude).abs() <= tolerance && (self.longitude - longitude).abs() <= tolerance
    }
}

/// Encode the magnitude of a decimal angle as a DMS rational triple.
pub fn decimal_to_dms(value: f64) -> [Rational; 3] {
    let abs = value.abs();
    let mut degrees = abs.floor();
    let minutes_f = (abs - degrees) * 60.0;
    let mut minutes = minutes_f.floor();
    let mut centis = ((minutes_f - minutes) * 60.0 * 100.0).round();

    // 59.995″ rounds up to a full minute
    if centis >= 6000.0 {
        centis -= 6000.0;
        minutes += 1.0;
    }
    if minutes >= 60.0 {
        minutes -= 60.0;
        degrees += 1.0;
    }

    let centis = centis as u32;
    let seconds = if centis % 100 == 0 {
        Rational::new(centis / 100, 1)
    } else {
        Rational::new(centis, 100)
    };

    [
        Rational::new(degrees as u32, 1),
        Rational::new(minutes as u32, 1),
        seconds,
    ]
}

/// Decode a DMS triple plus reference letter into signed decimal degrees.
///
/// Returns `None` unless there are exactly three components with non-zero
/// denominators.
pub fn dms_to_decimal(dms: &[Rational], reference: Option<&str>) -> Option<f64> {
    let [d, m, s] = dms else {
        return None;
    };
    let decimal = d.to_f64()? + m.to_f64()? / 60.0 + s.to_f64()? / 3600.0;

    let negative = reference
        .and_then(|r| r.trim().chars().next())
        .is_some_and(|c| matches!(c.to_ascii_uppercase(), 'S' | 'W'));

    Some(if negative { -decimal } else { decimal })
}

/// Encode altitude in meters as (magnitude in 1/100 m, reference byte).
///
/// Reference is 0 above sea level and 1 below. Returns `None` for values
/// that are not finite or do not fit a 32-bit numerator.
pub fn encode_altitude(meters: f64) -> Option<(Rational, u8)> {
    if !meters.is_finite() {
        return None;
    }
    let centimeters = (meters.abs() * 100.0).round();
    if centimeters > u32::MAX as f64 {
        return None;
    }
    let reference = if meters < 0.0 { 1 } else { 0 };
    Some((Rational::new(centimeters as u32, 100), reference))
}

/// Decode altitude; the reference byte alone decides the sign.
pub fn decode_altitude(magnitude: Rational, reference: Option<u32>) -> Option<f64> {
    let meters = magnitude.to_f64()?;
    Some(if reference == Some(1) { -meters } else { meters })
}

/// GPSTimeStamp rationals (UTC hour, minute, second) for an instant.
pub fn timestamp_rationals(now: DateTime<Utc>) -> [Rational; 3] {
    [
        Rational::new(now.hour(), 1),
        Rational::new(now.minute(), 1),
        Rational::new(now.second(), 1),
    ]
}

/// GPSDateStamp text (`YYYY:MM:DD`) for an instant.
pub fn datestamp(now: DateTime<Utc>) -> String {
    now.format("%Y:%m:%d").to_string()
}

/// Render GPSTimeStamp rationals as `HH:MM:SS` (fractional seconds kept).
pub fn format_timestamp(parts: &[Rational]) -> Option<String> {
    let [h, m, s] = parts else {
        return None;
    };
    let (h, m, s) = (h.to_f64()?, m.to_f64()?, s.to_f64()?);
    if s.fract() == 0.0 {
        Some(format!("{:02}:{:02}:{:02}", h as u32, m as u32, s as u32))
    } else {
        Some(format!("{:02}:{:02}:{:05.2}", h as u32, m as u32, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip(value: f64, axis: Axis) -> f64 {
        let dms = decimal_to_dms(value);
        dms_to_decimal(&dms, Some(axis.reference(value))).unwrap()
    }

    // ── decimal → DMS ────────────────────────────────────────────────

    #[test]
    fn sydney_latitude_is_south() {
        let lat = -33.8688;
        assert_eq!(Axis::Latitude.reference(lat), "S");
        let dms = decimal_to_dms(lat);
        assert_eq!(dms[0], Rational::new(33, 1));
        assert_eq!(dms[1], Rational::new(52, 1));
        // 0.0128 min * 60 = 7.68″
        assert_eq!(dms[2], Rational::new(768, 100));
        let magnitude = dms_to_decimal(&dms, None).unwrap();
        assert!((magnitude - 33.8688).abs() < DMS_TOLERANCE_DEGREES);
    }

    #[test]
    fn sydney_longitude_is_east() {
        assert_eq!(Axis::Longitude.reference(151.2093), "E");
        assert_eq!(Axis::Longitude.reference(-0.1276), "W");
        assert_eq!(Axis::Latitude.reference(0.0), "N");
    }

    #[test]
    fn whole_seconds_use_unit_denominator() {
        // 10.5° = 10° 30' 0″
        let dms = decimal_to_dms(10.5);
        assert_eq!(dms, [Rational::new(10, 1), Rational::new(30, 1), Rational::new(0, 1)]);
    }

    #[test]
    fn seconds_carry_into_minutes_and_degrees() {
        let dms = decimal_to_dms(10.999_999_9);
        assert_eq!(dms, [Rational::new(11, 1), Rational::new(0, 1), Rational::new(0, 1)]);
    }

    #[test]
    fn round_trip_within_tolerance() {
        let mut lat = -90.0;
        while lat <= 90.0 {
            let back = round_trip(lat, Axis::Latitude);
            assert!((back - lat).abs() <= DMS_TOLERANCE_DEGREES, "lat {lat} -> {back}");
            lat += 0.123_456_7;
        }
        let mut lng = -180.0;
        while lng <= 180.0 {
            let back = round_trip(lng, Axis::Longitude);
            assert!((back - lng).abs() <= DMS_TOLERANCE_DEGREES, "lng {lng} -> {back}");
            lng += 0.234_567_1;
        }
    }

    #[test]
    fn extreme_values_round_trip() {
        for v in [90.0, -90.0, 180.0, -180.0, 0.0, 1e-9] {
            let back = round_trip(v, Axis::Longitude);
            assert!((back - v).abs() <= DMS_TOLERANCE_DEGREES);
        }
    }

    // ── DMS → decimal ────────────────────────────────────────────────

    #[test]
    fn malformed_dms_fails() {
        let two = [Rational::new(1, 1), Rational::new(2, 1)];
        assert!(dms_to_decimal(&two, Some("N")).is_none());

        let zero_den = [Rational::new(1, 1), Rational::new(2, 0), Rational::new(3, 1)];
        assert!(dms_to_decimal(&zero_den, Some("N")).is_none());
    }

    #[test]
    fn west_reference_negates() {
        let dms = [Rational::new(0, 1), Rational::new(7, 1), Rational::new(3936, 100)];
        let v = dms_to_decimal(&dms, Some("W")).unwrap();
        assert!((v - (-0.1276)).abs() < DMS_TOLERANCE_DEGREES);
        let v = dms_to_decimal(&dms, Some("w\0")).unwrap();
        assert!(v < 0.0);
    }

    // ── altitude ─────────────────────────────────────────────────────

    #[test]
    fn altitude_below_sea_level() {
        let (magnitude, reference) = encode_altitude(-12.34).unwrap();
        assert_eq!(magnitude, Rational::new(1234, 100));
        assert_eq!(reference, 1);
        assert_eq!(decode_altitude(magnitude, Some(1)), Some(-12.34));
    }

    #[test]
    fn altitude_reference_drives_sign() {
        assert_eq!(decode_altitude(Rational::new(500, 100), Some(0)), Some(5.0));
        assert_eq!(decode_altitude(Rational::new(500, 100), None), Some(5.0));
        assert_eq!(decode_altitude(Rational::new(500, 0), Some(0)), None);
    }

    #[test]
    fn altitude_rejects_non_finite() {
        assert!(encode_altitude(f64::NAN).is_none());
        assert!(encode_altitude(f64::INFINITY).is_none());
        assert!(encode_altitude(1e12).is_none());
    }

    // ── time stamps ──────────────────────────────────────────────────

    #[test]
    fn timestamp_and_datestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 42).unwrap();
        let ts = timestamp_rationals(now);
        assert_eq!(ts, [Rational::new(9, 1), Rational::new(5, 1), Rational::new(42, 1)]);
        assert_eq!(datestamp(now), "2024:03:07");
        assert_eq!(format_timestamp(&ts).as_deref(), Some("09:05:42"));
    }

    #[test]
    fn fractional_timestamp() {
        let ts = [Rational::new(23, 1), Rational::new(59, 1), Rational::new(5925, 100)];
        assert_eq!(format_timestamp(&ts).as_deref(), Some("23:59:59.25"));
    }
}
