/// Media file responses for renderers

use super::routes::AppState;
use crate::error::HttpError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

const CONTENT_FEATURES: &str = "DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS=01700000000000000000000000000000";

/// Inclusive byte range of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a `Range` header against a file of `total` bytes.
///
/// Only a single `bytes=` range is honoured. A multi-range request yields
/// `Ok(None)` and is answered with the whole file.
pub fn parse_range(value: &str, total: u64) -> Result<Option<ByteRange>, HttpError> {
    let malformed = || HttpError::bad_request(format!("Malformed range: {}", value));
    let unsatisfiable = || {
        HttpError::range_not_satisfiable(format!("Range {} outside of {} bytes", value, total))
            .with_header(header::CONTENT_RANGE, format!("bytes */{}", total))
    };

    let ranges = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    if ranges.contains(',') {
        return Ok(None);
    }

    let (first, last) = ranges.split_once('-').ok_or_else(malformed)?;
    let (first, last) = (first.trim(), last.trim());
    let number = |s: &str| s.parse::<u64>().map_err(|_| malformed());

    let range = match (first.is_empty(), last.is_empty()) {
        (true, true) => return Err(malformed()),
        // Suffix form: the last N bytes
        (true, false) => {
            let suffix = number(last)?;
            if suffix == 0 || total == 0 {
                return Err(unsatisfiable());
            }
            ByteRange {
                start: total.saturating_sub(suffix),
                end: total - 1,
            }
        }
        (false, true) => {
            let start = number(first)?;
            if start >= total {
                return Err(unsatisfiable());
            }
            ByteRange { start, end: total - 1 }
        }
        (false, false) => {
            let start = number(first)?;
            let end = number(last)?;
            if start > end {
                return Err(malformed());
            }
            if start >= total {
                return Err(unsatisfiable());
            }
            ByteRange {
                start,
                end: end.min(total - 1),
            }
        }
    };

    Ok(Some(range))
}

/// GET|HEAD /media/:file - Stream a library object
pub(crate) async fn serve_media(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    debug!("GET /media/{}", file);

    let object = state
        .library
        .resolve(&file)
        .ok_or_else(|| HttpError::not_found(format!("Error 404, file not found: {}", file)))?;

    let mut handle = File::open(&object.path).await?;
    let total = handle.metadata().await?.len();

    let range = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| HttpError::bad_request("Range header is not valid text"))?;
            parse_range(value, total)?
        }
        None => None,
    };

    let (status, start, len) = match range {
        Some(range) => (StatusCode::PARTIAL_CONTENT, range.start, range.byte_count()),
        None => (StatusCode::OK, 0, total),
    };
    if start > 0 {
        handle.seek(SeekFrom::Start(start)).await?;
    }

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, object.mime.as_str())
        .header(header::CONTENT_LENGTH, len)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::SERVER, state.server_name.as_str())
        .header("transfermode.dlna.org", "Streaming")
        .header("contentfeatures.dlna.org", CONTENT_FEATURES)
        .header("realtimeinfo.dlna.org", "DLNA.ORG_TLAG=*");
    if let Some(range) = range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, total),
        );
    }

    let body = Body::from_stream(ReaderStream::new(handle.take(len)));
    builder
        .body(body)
        .map_err(|e| HttpError::internal("Failed to build media response", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpStatus;

    fn status_of(value: &str, total: u64) -> HttpStatus {
        parse_range(value, total).unwrap_err().status()
    }

    #[test]
    fn test_parse_closed_range() {
        assert_eq!(
            parse_range("bytes=0-99", 1000).unwrap(),
            Some(ByteRange { start: 0, end: 99 })
        );
        // End past the file is clamped
        assert_eq!(
            parse_range("bytes=900-5000", 1000).unwrap(),
            Some(ByteRange { start: 900, end: 999 })
        );
    }

    #[test]
    fn test_parse_open_and_suffix_ranges() {
        assert_eq!(
            parse_range("bytes=500-", 1000).unwrap(),
            Some(ByteRange { start: 500, end: 999 })
        );
        assert_eq!(
            parse_range("bytes=-100", 1000).unwrap(),
            Some(ByteRange { start: 900, end: 999 })
        );
        assert_eq!(
            parse_range("bytes=-5000", 1000).unwrap(),
            Some(ByteRange { start: 0, end: 999 })
        );
        assert_eq!(ByteRange { start: 900, end: 999 }.byte_count(), 100);
    }

    #[test]
    fn test_multi_range_is_ignored() {
        assert_eq!(parse_range("bytes=0-1,5-6", 1000).unwrap(), None);
    }

    #[test]
    fn test_malformed_ranges() {
        assert_eq!(status_of("items=0-1", 1000), HttpStatus::BadRequest);
        assert_eq!(status_of("bytes=abc-", 1000), HttpStatus::BadRequest);
        assert_eq!(status_of("bytes=-", 1000), HttpStatus::BadRequest);
        assert_eq!(status_of("bytes=10", 1000), HttpStatus::BadRequest);
        assert_eq!(status_of("bytes=50-10", 1000), HttpStatus::BadRequest);
    }

    #[test]
    fn test_unsatisfiable_range_reports_length() {
        let err = parse_range("bytes=1000-", 1000).unwrap_err();
        let (name, value) = &err.headers()[0];
        assert_eq!(*name, header::CONTENT_RANGE);
        assert_eq!(value, "bytes */1000");
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(status_of("bytes=1000-", 1000), HttpStatus::RangeNotSatisfiable);
        assert_eq!(status_of("bytes=2000-3000", 1000), HttpStatus::RangeNotSatisfiable);
        assert_eq!(status_of("bytes=-0", 1000), HttpStatus::RangeNotSatisfiable);
        assert_eq!(status_of("bytes=-10", 0), HttpStatus::RangeNotSatisfiable);
    }
}
