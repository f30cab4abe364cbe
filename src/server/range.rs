//! Single-range `Range: bytes=...` parsing.

/// Inclusive byte span inside a file of known size. `start <= end < total` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` header of a 206 response.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// Not a single `bytes` range. Callers ignore the header and send the whole file.
    #[error("malformed or unsupported range header")]
    Malformed,
    /// Well formed but entirely outside the file.
    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// `Content-Range` value for a 416 response.
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// Parse `header` against a file of `total` bytes.
///
/// Accepts `bytes=start-end`, `bytes=start-` and the suffix form `bytes=-n`. An `end` past the
/// file is clamped to `total - 1`; `start > end` and multi-range lists are malformed.
pub fn parse_range(header: &str, total: u64) -> Result<ByteRange, RangeError> {
    let (unit, spec) = header.trim().split_once('=').ok_or(RangeError::Malformed)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Malformed);
    }
    let spec = spec.trim();
    if spec.contains(',') {
        return Err(RangeError::Malformed);
    }
    let (first, last) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let suffix = parse_u64(last)?;
        if suffix == 0 || total == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: total.saturating_sub(suffix),
            end: total - 1,
        });
    }

    let start = parse_u64(first)?;
    let end = if last.is_empty() {
        None
    } else {
        Some(parse_u64(last)?)
    };
    if let Some(end) = end
        && end < start
    {
        return Err(RangeError::Malformed);
    }
    if start >= total {
        return Err(RangeError::Unsatisfiable);
    }

    let max = total - 1;
    Ok(ByteRange {
        start,
        end: end.map_or(max, |e| e.min(max)),
    })
}

fn parse_u64(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    s.parse().map_err(|_| RangeError::Malformed)
}

#[cfg(test)]
#[path = "../../tests/unit/server/range.rs"]
mod tests;
