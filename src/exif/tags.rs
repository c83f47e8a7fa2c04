//! Typed tag values and the directory model shared by the reader and writer.

use std::fmt;

// IFD0 / IFD1
pub const TAG_IMAGE_WIDTH: u16 = 0x0100;
pub const TAG_IMAGE_HEIGHT: u16 = 0x0101;
pub const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
pub const TAG_COMPRESSION: u16 = 0x0103;
pub const TAG_PHOTOMETRIC_INTERPRETATION: u16 = 0x0106;
pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_MAKE: u16 = 0x010F;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 0x0115;
pub const TAG_X_RESOLUTION: u16 = 0x011A;
pub const TAG_Y_RESOLUTION: u16 = 0x011B;
pub const TAG_RESOLUTION_UNIT: u16 = 0x0128;
pub const TAG_SOFTWARE: u16 = 0x0131;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_ARTIST: u16 = 0x013B;
pub const TAG_JPEG_IF_OFFSET: u16 = 0x0201;
pub const TAG_JPEG_IF_LENGTH: u16 = 0x0202;
pub const TAG_YCBCR_POSITIONING: u16 = 0x0213;
pub const TAG_COPYRIGHT: u16 = 0x8298;
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
pub const TAG_GPS_IFD_POINTER: u16 = 0x8825;
pub const TAG_XP_TITLE: u16 = 0x9C9B;
pub const TAG_XP_COMMENT: u16 = 0x9C9C;
pub const TAG_XP_AUTHOR: u16 = 0x9C9D;
pub const TAG_XP_KEYWORDS: u16 = 0x9C9E;
pub const TAG_XP_SUBJECT: u16 = 0x9C9F;

// Exif IFD
pub const TAG_EXPOSURE_TIME: u16 = 0x829A;
pub const TAG_F_NUMBER: u16 = 0x829D;
pub const TAG_EXPOSURE_PROGRAM: u16 = 0x8822;
pub const TAG_ISO_SPEED_RATINGS: u16 = 0x8827;
pub const TAG_EXIF_VERSION: u16 = 0x9000;
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const TAG_DATE_TIME_DIGITIZED: u16 = 0x9004;
pub const TAG_METERING_MODE: u16 = 0x9207;
pub const TAG_FLASH: u16 = 0x9209;
pub const TAG_FOCAL_LENGTH: u16 = 0x920A;
pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_COLOR_SPACE: u16 = 0xA001;
pub const TAG_EXIF_IMAGE_WIDTH: u16 = 0xA002;
pub const TAG_EXIF_IMAGE_HEIGHT: u16 = 0xA003;
pub const TAG_INTEROP_IFD_POINTER: u16 = 0xA005;
pub const TAG_EXPOSURE_MODE: u16 = 0xA402;
pub const TAG_WHITE_BALANCE: u16 = 0xA403;
pub const TAG_DIGITAL_ZOOM_RATIO: u16 = 0xA404;
pub const TAG_SCENE_CAPTURE_TYPE: u16 = 0xA406;
pub const TAG_GAIN_CONTROL: u16 = 0xA407;
pub const TAG_CONTRAST: u16 = 0xA408;
pub const TAG_SATURATION: u16 = 0xA409;
pub const TAG_SHARPNESS: u16 = 0xA40A;
pub const TAG_LENS_MAKE: u16 = 0xA433;
pub const TAG_LENS_MODEL: u16 = 0xA434;

// GPS IFD
pub const TAG_GPS_VERSION_ID: u16 = 0x0000;
pub const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
pub const TAG_GPS_LATITUDE: u16 = 0x0002;
pub const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
pub const TAG_GPS_LONGITUDE: u16 = 0x0004;
pub const TAG_GPS_ALTITUDE_REF: u16 = 0x0005;
pub const TAG_GPS_ALTITUDE: u16 = 0x0006;
pub const TAG_GPS_TIME_STAMP: u16 = 0x0007;
pub const TAG_GPS_SPEED_REF: u16 = 0x000C;
pub const TAG_GPS_SPEED: u16 = 0x000D;
pub const TAG_GPS_IMG_DIRECTION_REF: u16 = 0x0010;
pub const TAG_GPS_IMG_DIRECTION: u16 = 0x0011;
pub const TAG_GPS_DEST_LATITUDE: u16 = 0x0014;
pub const TAG_GPS_DEST_LONGITUDE: u16 = 0x0016;
pub const TAG_GPS_DATE_STAMP: u16 = 0x001D;

// Interop IFD
pub const TAG_INTEROP_INDEX: u16 = 0x0001;

/// TIFF field type codes.
pub const TYPE_BYTE: u16 = 1;
pub const TYPE_ASCII: u16 = 2;
pub const TYPE_SHORT: u16 = 3;
pub const TYPE_LONG: u16 = 4;
pub const TYPE_RATIONAL: u16 = 5;
pub const TYPE_UNDEFINED: u16 = 7;
pub const TYPE_IFD: u16 = 13;

/// Size in bytes of one component of the given TIFF type, or `None` for unknown types.
pub fn type_size(type_code: u16) -> Option<usize> {
    match type_code {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// TIFF byte order, taken from the `II`/`MM` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn marker(self) -> &'static [u8; 2] {
        match self {
            Self::LittleEndian => b"II",
            Self::BigEndian => b"MM",
        }
    }

    pub fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let b = data.get(offset..offset.checked_add(2)?)?;
        Some(match self {
            Self::LittleEndian => u16::from_le_bytes([b[0], b[1]]),
            Self::BigEndian => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    pub fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let b = data.get(offset..offset.checked_add(4)?)?;
        Some(match self {
            Self::LittleEndian => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Self::BigEndian => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    pub fn u16_bytes(self, val: u16) -> [u8; 2] {
        match self {
            Self::LittleEndian => val.to_le_bytes(),
            Self::BigEndian => val.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, val: u32) -> [u8; 4] {
        match self {
            Self::LittleEndian => val.to_le_bytes(),
            Self::BigEndian => val.to_be_bytes(),
        }
    }
}

/// An unsigned EXIF rational. Kept exact; conversion to float is left to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> Option<f64> {
        if self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A decoded tag value.
///
/// Typed variants cover the primitive types this crate interprets. Everything
/// else (signed and floating types, rationals with a zero denominator, DMS
/// arrays of the wrong length) is kept as [`TagValue::Raw`] so it survives a
/// rewrite byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Ascii(String),
    Rational(Rational),
    Rationals(Vec<Rational>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Byte(Vec<u8>),
    Undefined(Vec<u8>),
    /// Opaque value in the collection's byte order.
    Raw {
        type_code: u16,
        count: u32,
        data: Vec<u8>,
    },
}

impl TagValue {
    pub fn dms(degrees: Rational, minutes: Rational, seconds: Rational) -> Self {
        Self::Rationals(vec![degrees, minutes, seconds])
    }

    pub fn type_code(&self) -> u16 {
        match self {
            Self::Ascii(_) => TYPE_ASCII,
            Self::Rational(_) | Self::Rationals(_) => TYPE_RATIONAL,
            Self::Short(_) => TYPE_SHORT,
            Self::Long(_) => TYPE_LONG,
            Self::Byte(_) => TYPE_BYTE,
            Self::Undefined(_) => TYPE_UNDEFINED,
            Self::Raw { type_code, .. } => *type_code,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_rationals(&self) -> Option<&[Rational]> {
        match self {
            Self::Rationals(v) => Some(v.as_slice()),
            Self::Rational(r) => Some(std::slice::from_ref(r)),
            _ => None,
        }
    }

    /// First element of a SHORT, LONG or BYTE value.
    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Self::Short(v) => v.first().map(|&x| x as u32),
            Self::Long(v) => v.first().copied(),
            Self::Byte(v) => v.first().map(|&x| x as u32),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Byte(v) | Self::Undefined(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// One image file directory: tag → value, unique per tag, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ifd {
    entries: Vec<(u16, TagValue)>,
}

impl Ifd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.get(tag).is_some()
    }

    /// Replace the value in place if the tag exists, otherwise append it.
    pub fn insert(&mut self, tag: u16, value: TagValue) {
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    pub fn remove(&mut self, tag: u16) -> Option<TagValue> {
        let idx = self.entries.iter().position(|(t, _)| *t == tag)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    pub fn tags(&self) -> Vec<u16> {
        self.entries.iter().map(|(t, _)| *t).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which directory a tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfdKind {
    Image,
    Exif,
    Gps,
    Interop,
    First,
}

impl IfdKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "IFD0",
            Self::Exif => "Exif IFD",
            Self::Gps => "GPS IFD",
            Self::Interop => "Interop IFD",
            Self::First => "IFD1",
        }
    }
}

/// All directories of one EXIF segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IfdCollection {
    pub byte_order: ByteOrder,
    pub image: Ifd,
    pub exif: Ifd,
    pub gps: Ifd,
    pub interop: Ifd,
    pub first: Ifd,
    pub thumbnail: Option<Vec<u8>>,
}

impl IfdCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ifd(&self, kind: IfdKind) -> &Ifd {
        match kind {
            IfdKind::Image => &self.image,
            IfdKind::Exif => &self.exif,
            IfdKind::Gps => &self.gps,
            IfdKind::Interop => &self.interop,
            IfdKind::First => &self.first,
        }
    }

    pub fn ifd_mut(&mut self, kind: IfdKind) -> &mut Ifd {
        match kind {
            IfdKind::Image => &mut self.image,
            IfdKind::Exif => &mut self.exif,
            IfdKind::Gps => &mut self.gps,
            IfdKind::Interop => &mut self.interop,
            IfdKind::First => &mut self.first,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
            && self.exif.is_empty()
            && self.gps.is_empty()
            && self.interop.is_empty()
            && self.first.is_empty()
            && self.thumbnail.is_none()
    }
}

/// Pointer tags that the serializer regenerates. They never appear in an [`Ifd`].
pub fn is_structural_tag(kind: IfdKind, tag: u16) -> bool {
    match kind {
        IfdKind::Image => matches!(tag, TAG_EXIF_IFD_POINTER | TAG_GPS_IFD_POINTER),
        IfdKind::Exif => tag == TAG_INTEROP_IFD_POINTER,
        IfdKind::First => matches!(tag, TAG_JPEG_IF_OFFSET | TAG_JPEG_IF_LENGTH),
        IfdKind::Gps | IfdKind::Interop => false,
    }
}

/// EXIF name of a recognized tag.
pub fn tag_name(kind: IfdKind, tag: u16) -> Option<&'static str> {
    let name = match kind {
        IfdKind::Image | IfdKind::First => match tag {
            TAG_IMAGE_WIDTH => "ImageWidth",
            TAG_IMAGE_HEIGHT => "ImageHeight",
            TAG_BITS_PER_SAMPLE => "BitsPerSample",
            TAG_COMPRESSION => "Compression",
            TAG_PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
            TAG_IMAGE_DESCRIPTION => "ImageDescription",
            TAG_MAKE => "Make",
            TAG_MODEL => "Model",
            TAG_ORIENTATION => "Orientation",
            TAG_SAMPLES_PER_PIXEL => "SamplesPerPixel",
            TAG_X_RESOLUTION => "XResolution",
            TAG_Y_RESOLUTION => "YResolution",
            TAG_RESOLUTION_UNIT => "ResolutionUnit",
            TAG_SOFTWARE => "Software",
            TAG_DATE_TIME => "DateTime",
            TAG_ARTIST => "Artist",
            TAG_YCBCR_POSITIONING => "YCbCrPositioning",
            TAG_COPYRIGHT => "Copyright",
            TAG_XP_TITLE => "XPTitle",
            TAG_XP_COMMENT => "XPComment",
            TAG_XP_AUTHOR => "XPAuthor",
            TAG_XP_KEYWORDS => "XPKeywords",
            TAG_XP_SUBJECT => "XPSubject",
            _ => return None,
        },
        IfdKind::Exif => match tag {
            TAG_EXPOSURE_TIME => "ExposureTime",
            TAG_F_NUMBER => "FNumber",
            TAG_EXPOSURE_PROGRAM => "ExposureProgram",
            TAG_ISO_SPEED_RATINGS => "ISOSpeedRatings",
            TAG_EXIF_VERSION => "ExifVersion",
            TAG_DATE_TIME_ORIGINAL => "DateTimeOriginal",
            TAG_DATE_TIME_DIGITIZED => "DateTimeDigitized",
            TAG_METERING_MODE => "MeteringMode",
            TAG_FLASH => "Flash",
            TAG_FOCAL_LENGTH => "FocalLength",
            TAG_USER_COMMENT => "UserComment",
            TAG_COLOR_SPACE => "ColorSpace",
            TAG_EXIF_IMAGE_WIDTH => "ExifImageWidth",
            TAG_EXIF_IMAGE_HEIGHT => "ExifImageHeight",
            TAG_EXPOSURE_MODE => "ExposureMode",
            TAG_WHITE_BALANCE => "WhiteBalance",
            TAG_DIGITAL_ZOOM_RATIO => "DigitalZoomRatio",
            TAG_SCENE_CAPTURE_TYPE => "SceneCaptureType",
            TAG_GAIN_CONTROL => "GainControl",
            TAG_CONTRAST => "Contrast",
            TAG_SATURATION => "Saturation",
            TAG_SHARPNESS => "Sharpness",
            TAG_LENS_MAKE => "LensMake",
            TAG_LENS_MODEL => "LensModel",
            _ => return None,
        },
        IfdKind::Gps => match tag {
            TAG_GPS_VERSION_ID => "GPSVersionID",
            TAG_GPS_LATITUDE_REF => "GPSLatitudeRef",
            TAG_GPS_LATITUDE => "GPSLatitude",
            TAG_GPS_LONGITUDE_REF => "GPSLongitudeRef",
            TAG_GPS_LONGITUDE => "GPSLongitude",
            TAG_GPS_ALTITUDE_REF => "GPSAltitudeRef",
            TAG_GPS_ALTITUDE => "GPSAltitude",
            TAG_GPS_TIME_STAMP => "GPSTimeStamp",
            TAG_GPS_SPEED_REF => "GPSSpeedRef",
            TAG_GPS_SPEED => "GPSSpeed",
            TAG_GPS_IMG_DIRECTION_REF => "GPSImgDirectionRef",
            TAG_GPS_IMG_DIRECTION => "GPSImgDirection",
            TAG_GPS_DEST_LATITUDE => "GPSDestLatitude",
            TAG_GPS_DEST_LONGITUDE => "GPSDestLongitude",
            TAG_GPS_DATE_STAMP => "GPSDateStamp",
            _ => return None,
        },
        IfdKind::Interop => match tag {
            TAG_INTEROP_INDEX => "InteropIndex",
            _ => return None,
        },
    };
    Some(name)
}

/// GPS tags whose value must be a degrees/minutes/seconds triple.
pub fn is_dms_tag(tag: u16) -> bool {
    matches!(
        tag,
        TAG_GPS_LATITUDE | TAG_GPS_LONGITUDE | TAG_GPS_DEST_LATITUDE | TAG_GPS_DEST_LONGITUDE
    )
}
