//! HTTP Range request parsing module
//!
//! Single-range `bytes=` parsing and validation against a known file size,
//! compliant with RFC 7233 for the subset this server accepts.

use thiserror::Error;

/// Validated, inclusive byte span within a layer.
///
/// Invariant: `start <= end < file_size` and `end - start + 1 <= max_range_bytes`
/// for the limits it was parsed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position
    pub start: u64,
    /// Last byte position (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range
    #[inline]
    pub const fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a 206 response
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// Reason a Range header was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeRejection {
    /// Header absent, not `bytes=`, multi-range, or non-numeric positions
    #[error("malformed range: {0}")]
    Malformed(&'static str),
    /// Start beyond the end of the file, or start after end
    #[error("range not satisfiable for {size} byte file (start {start})")]
    Unsatisfiable { start: u64, size: u64 },
    /// Well-formed but longer than the configured maximum
    #[error("requested range of {length} bytes exceeds maximum of {max} bytes")]
    TooLarge { length: u64, max: u64 },
}

/// Parse and validate a Range header (single range only, bytes unit)
///
/// Supported formats:
/// - `bytes=start-end` - Specific range, `end` clamped to the last byte
/// - `bytes=start-` - From start to end of file
/// - `bytes=-suffix` - Last suffix bytes
///
/// Checks run in a fixed order: syntax, satisfiability, clamping, size limit.
///
/// # Examples
/// ```
/// use fgbserve::http::range::{parse_range_header, ByteRange, RangeRejection};
///
/// let range = parse_range_header(Some("bytes=0-99"), 1000, 4096).unwrap();
/// assert_eq!(range, ByteRange { start: 0, end: 99 });
///
/// assert!(matches!(
///     parse_range_header(None, 1000, 4096),
///     Err(RangeRejection::Malformed(_))
/// ));
/// ```
pub fn parse_range_header(
    range_header: Option<&str>,
    file_size: u64,
    max_range_bytes: u64,
) -> Result<ByteRange, RangeRejection> {
    let Some(header) = range_header else {
        return Err(RangeRejection::Malformed("missing Range header"));
    };

    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return Err(RangeRejection::Malformed("only 'bytes' ranges are supported"));
    };

    // Only support single range (not multi-range)
    if spec.contains(',') {
        return Err(RangeRejection::Malformed("multiple ranges are not supported"));
    }

    let Some((start_str, end_str)) = spec.trim().split_once('-') else {
        return Err(RangeRejection::Malformed("missing '-' separator"));
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // `None` end means "through the last byte"
    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        (true, true) => return Err(RangeRejection::Malformed("empty range spec")),
        // Suffix range: "-500" means last 500 bytes
        (true, false) => {
            let suffix = parse_position(end_str).ok_or(RangeRejection::Malformed(
                "suffix length is not a non-negative integer",
            ))?;
            (file_size.saturating_sub(suffix), None)
        }
        // Standard range: "start-" or "start-end"
        (false, _) => {
            let start = parse_position(start_str).ok_or(RangeRejection::Malformed(
                "range start is not a non-negative integer",
            ))?;
            let end = if end_str.is_empty() {
                None
            } else {
                Some(parse_position(end_str).ok_or(RangeRejection::Malformed(
                    "range end is not a non-negative integer",
                ))?)
            };
            (start, end)
        }
    };

    // A zero-length suffix lands here too (start == file_size)
    if start >= file_size || end.is_some_and(|e| start > e) {
        return Err(RangeRejection::Unsatisfiable {
            start,
            size: file_size,
        });
    }

    // start < file_size, so file_size >= 1
    let last = file_size - 1;
    let range = ByteRange {
        start,
        end: end.map_or(last, |e| e.min(last)),
    };

    if range.length() > max_range_bytes {
        return Err(RangeRejection::TooLarge {
            length: range.length(),
            max: max_range_bytes,
        });
    }

    Ok(range)
}

/// Parse a byte position, accepting ASCII digits only (no sign, no whitespace)
fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
