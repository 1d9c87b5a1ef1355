//! Encoding detection and per-field transcoding using chardetng and `encoding_rs`.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use simdutf8::basic::from_utf8;

/// Returns true if `data` is valid UTF-8 (SIMD validation).
pub fn is_utf8(data: &[u8]) -> bool {
    from_utf8(data).is_ok()
}

/// Returns true if the data starts with the UTF-8 BOM `EF BB BF`.
pub fn has_utf8_bom(data: &[u8]) -> bool {
    data.starts_with(&[0xEF, 0xBB, 0xBF])
}

/// Returns true if the data starts with a UTF-16 BOM (either byte order).
pub fn has_utf16_bom(data: &[u8]) -> bool {
    data.len() >= 2 && matches!((data[0], data[1]), (0xFF, 0xFE) | (0xFE, 0xFF))
}

/// Information about the detected encoding of an input prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingInfo {
    /// Encoding fields are decoded with.
    pub encoding: &'static Encoding,
    /// Whether a UTF-8 BOM was present.
    pub has_bom: bool,
}

impl EncodingInfo {
    /// Returns true if fields can be taken as UTF-8 without transcoding.
    pub fn is_utf8(&self) -> bool {
        self.encoding == encoding_rs::UTF_8
    }
}

/// Detect the encoding from a prefix of the input.
///
/// `complete` tells the detector whether `prefix` is the whole input.
/// A prefix may end in the middle of a multi-byte sequence, so an invalid
/// tail of up to three bytes does not rule out UTF-8.
pub fn detect_encoding(prefix: &[u8], complete: bool) -> EncodingInfo {
    let has_bom = has_utf8_bom(prefix);
    let data = if has_bom { &prefix[3..] } else { prefix };

    if has_bom || looks_like_utf8(data, complete) {
        return EncodingInfo {
            encoding: encoding_rs::UTF_8,
            has_bom,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(data, complete);
    EncodingInfo {
        encoding: detector.guess(None, true),
        has_bom,
    }
}

fn looks_like_utf8(data: &[u8], complete: bool) -> bool {
    if is_utf8(data) {
        return true;
    }
    if complete {
        return false;
    }
    // Only a sequence cut off by the end of the prefix is tolerated.
    match simdutf8::compat::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && data.len() - e.valid_up_to() < 4,
    }
}

/// Decode one field to UTF-8 using the detected encoding.
pub fn decode_field<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    if encoding == encoding_rs::UTF_8
        && let Ok(s) = from_utf8(bytes)
    {
        return Cow::Borrowed(s);
    }
    let (decoded, _) = encoding.decode_without_bom_handling(bytes);
    decoded
}
