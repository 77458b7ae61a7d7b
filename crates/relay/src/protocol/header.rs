//! Response header translation used when splicing one resource into another.
//!
//! Headers are kept as an ordered list of `(name, value)` pairs instead of a
//! [`http::HeaderMap`], so that duplicates and the original spelling of every
//! name survive the copy untouched. Only the length header is interpreted:
//! it becomes the sink's expected send length instead of a literal header.

use http::header::CONTENT_LENGTH;

use crate::protocol::RelayError;

/// Ordered header list as exposed by a resource.
pub type HeaderList = Vec<(String, String)>;

/// Returns true if `name` names the length header.
///
/// The comparison ignores ASCII case and accepts `_` in place of `-`, so
/// `Content-Length`, `content-length` and `CONTENT_LENGTH` all match.
pub fn is_length_header(name: &str) -> bool {
    let expected = CONTENT_LENGTH.as_str().as_bytes();
    let name = name.trim().as_bytes();

    name.len() == expected.len()
        && name.iter().zip(expected).all(|(&actual, &expected)| {
            let actual = actual.to_ascii_lowercase();
            actual == expected || (actual == b'_' && expected == b'-')
        })
}

/// The sink-side view of a source's response headers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SpliceHeaders<'a> {
    /// Value of the length header, if the source announced one
    pub send_length: Option<u64>,
    /// Every other header, in source order, duplicates included
    pub headers: Vec<(&'a str, &'a str)>,
}

/// Separates the length header from the headers to be copied verbatim.
///
/// Repeated length headers are accepted only when they agree.
///
/// # Errors
///
/// Returns [`RelayError::InvalidHeader`] when a length value is not a
/// non-negative integer or when two length headers disagree.
pub fn split_length_header(headers: &[(String, String)]) -> Result<SpliceHeaders<'_>, RelayError> {
    let mut splice_headers = SpliceHeaders::default();

    for (name, value) in headers {
        if !is_length_header(name) {
            splice_headers.headers.push((name.as_str(), value.as_str()));
            continue;
        }

        let length = value
            .trim()
            .parse::<u64>()
            .map_err(|e| RelayError::invalid_header(format!("{name}: {value}, cause {e}")))?;

        match splice_headers.send_length {
            Some(previous) if previous != length => {
                return Err(RelayError::invalid_header(format!("conflicting {name} values {previous} and {length}")));
            }
            _ => splice_headers.send_length = Some(length),
        }
    }

    Ok(splice_headers)
}
