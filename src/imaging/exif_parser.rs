//! Minimal EXIF reader for JPEG and TIFF data.
//!
//! Extracts two tags:
//! - DateTimeOriginal (`0x9003`, Exif sub-IFD): capture time
//! - Orientation (`0x0112`, IFD0): 1–8, how the stored pixels must be
//!   rotated/flipped for display
//!
//! For JPEG: reads the APP1 segment that starts with `Exif\0\0`, which holds
//! a complete TIFF structure. For TIFF: reads the file's own IFDs.
//!
//! Input is usually a truncated prefix of the object, so every read is
//! bounds-checked and anything out of range is simply "no tag".

use chrono::NaiveDateTime;

/// EXIF fields the gallery uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExifData {
    pub capture_time: Option<NaiveDateTime>,
    pub orientation: Option<u16>,
}

const TAG_ORIENTATION: u16 = 0x0112;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Read EXIF tags from JPEG or TIFF bytes, detected by magic number.
/// Returns default (empty) data on any parse failure.
pub fn read_exif(data: &[u8]) -> ExifData {
    if data.starts_with(&[0xFF, 0xD8]) {
        find_jpeg_app1_exif(data)
            .map(parse_tiff)
            .unwrap_or_default()
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        parse_tiff(data)
    } else {
        ExifData::default()
    }
}

/// Parse an EXIF datetime (`YYYY:MM:DD HH:MM:SS`).
///
/// Trailing NULs and padding are ignored. Cameras without a clock write
/// all-zero or blank stamps, which do not parse.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let text = std::str::from_utf8(raw).ok()?;
    let text = text.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S").ok()
}

// ---------------------------------------------------------------------------
// JPEG: locate the APP1 Exif segment
// ---------------------------------------------------------------------------

/// Find the TIFF bytes inside a JPEG's `APP1` Exif segment.
fn find_jpeg_app1_exif(data: &[u8]) -> Option<&[u8]> {
    // Skip SOI
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS (0xDA) means image data starts; EOI ends the stream
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        // Markers without length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            return None;
        }
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        if marker == 0xE1 {
            let segment = data.get(seg_start..seg_end)?;
            if let Some(tiff) = segment.strip_prefix(EXIF_HEADER) {
                return Some(tiff);
            }
        }
        pos += 2 + seg_len;
    }
    None
}

// ---------------------------------------------------------------------------
// TIFF: walk IFD0 and the Exif sub-IFD
// ---------------------------------------------------------------------------

/// Bounds-checked reader over TIFF bytes in either byte order.
struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let reader = Self { data, big_endian };
        // Verify TIFF magic (42)
        (reader.u16_at(2)? == 42).then_some(reader)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset.checked_add(2)?)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset.checked_add(4)?)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Entries of the IFD at `offset` as `(tag, type, count, entry_offset)`.
    fn entries(&self, offset: usize) -> Vec<(u16, u16, u32, usize)> {
        let Some(count) = self.u16_at(offset) else {
            return Vec::new();
        };
        (0..count as usize)
            .map_while(|i| {
                let entry = offset + 2 + i * 12;
                Some((
                    self.u16_at(entry)?,
                    self.u16_at(entry + 2)?,
                    self.u32_at(entry + 4)?,
                    entry,
                ))
            })
            .collect()
    }

    /// Bytes of an entry's value: inline when it fits in four bytes,
    /// otherwise at the offset the entry points to.
    fn value_bytes(&self, typ: u16, count: u32, entry: usize) -> Option<&'a [u8]> {
        let len = (count as usize).checked_mul(type_size(typ))?;
        let start = if len <= 4 {
            entry + 8
        } else {
            self.u32_at(entry + 8)? as usize
        };
        self.data.get(start..start.checked_add(len)?)
    }
}

/// TIFF type sizes: count is number of values, not bytes.
fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

fn parse_tiff(data: &[u8]) -> ExifData {
    let Some(reader) = TiffReader::new(data) else {
        return ExifData::default();
    };
    let Some(ifd0) = reader.u32_at(4) else {
        return ExifData::default();
    };

    let mut result = ExifData::default();
    let mut exif_ifd = None;
    for (tag, typ, _count, entry) in reader.entries(ifd0 as usize) {
        match tag {
            TAG_ORIENTATION if typ == 3 => {
                result.orientation = reader.u16_at(entry + 8).filter(|o| (1..=8).contains(o));
            }
            TAG_EXIF_IFD => exif_ifd = reader.u32_at(entry + 8),
            _ => {}
        }
    }

    if let Some(exif_ifd) = exif_ifd {
        result.capture_time = reader
            .entries(exif_ifd as usize)
            .into_iter()
            .find(|(tag, ..)| *tag == TAG_DATE_TIME_ORIGINAL)
            .and_then(|(_, typ, count, entry)| reader.value_bytes(typ, count, entry))
            .and_then(parse_exif_datetime);
    }
    result
}
