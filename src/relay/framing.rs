//! Multipart framing for the MJPEG response
//!
//! The response is one endless `multipart/x-mixed-replace` body. Each frame
//! is written as
//!
//! ```text
//! --mjpeg-frame\n
//! Content-type: image/jpeg\n
//! \n
//! <raw JPEG bytes>
//! ```
//!
//! No closing boundary is ever written; the stream ends when the connection
//! does.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use bytes::{BufMut, Bytes, BytesMut};

/// Boundary token separating parts
pub const BOUNDARY: &str = "mjpeg-frame";

/// Response content type, carrying [`BOUNDARY`]
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=mjpeg-frame";

/// Header line written before every JPEG payload
const PART_HEADER: &[u8] = b"Content-type: image/jpeg\n\n";

/// Headers that open the stream.
///
/// Keep-alive so the viewer does not close after the first part, caching and
/// content encoding disabled so every part reaches the viewer as written.
pub fn response_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, private"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
    // nginx and friends must not buffer the stream
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers
}

/// Encode one JPEG as a complete multipart part
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + BOUNDARY.len() + 1 + PART_HEADER.len() + jpeg.len());
    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(PART_HEADER);
    buf.put_slice(jpeg);
    buf.freeze()
}
