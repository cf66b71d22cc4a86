use http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::io::{self, Write};

/// A complete, buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// `200` with the given bytes and optional content type.
    #[must_use]
    pub fn bytes(body: Vec<u8>, content_type: Option<&str>) -> Self {
        let mut res = Self::new(StatusCode::OK).with_body(body);
        if let Some(ct) = content_type {
            res = res.with_content_type(ct);
        }
        res
    }

    /// `status` with `value` serialized as the body.
    #[must_use]
    pub fn json(status: StatusCode, value: &Value) -> Self {
        Self::new(status)
            .with_content_type("application/json")
            .with_body(value.to_string().into_bytes())
    }

    /// Minimal HTML error page: `<html>Error: N</html>`.
    #[must_use]
    pub fn error_page(status: StatusCode) -> Self {
        Self::new(status)
            .with_content_type("text/html")
            .with_body(format!("<html>Error: {}</html>", status.as_u16()).into_bytes())
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set `Content-Type`; values that are not valid header text are dropped.
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        match HeaderValue::from_str(content_type) {
            Ok(v) => {
                self.headers.insert(CONTENT_TYPE, v);
            }
            Err(_) => {
                tracing::warn!(content_type = %content_type, "Dropping invalid content type");
            }
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialize status line, headers and body into one buffer.
    ///
    /// `Content-Length` and `Connection` are always emitted by the writer, overriding anything
    /// set on the response.
    #[must_use]
    pub fn to_bytes(&self, keep_alive: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        write_status_line(&mut out, self.status);
        for (name, value) in &self.headers {
            if name == CONTENT_LENGTH || name == CONNECTION {
                continue;
            }
            write_header(&mut out, name.as_str(), value.as_bytes());
        }
        write_header(
            &mut out,
            CONTENT_LENGTH.as_str(),
            self.body.len().to_string().as_bytes(),
        );
        let connection: &[u8] = if keep_alive { b"keep-alive" } else { b"close" };
        write_header(&mut out, CONNECTION.as_str(), connection);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Write the response in a single `write_all` and flush.
    pub fn write_to<W: Write>(&self, out: &mut W, keep_alive: bool) -> io::Result<()> {
        out.write_all(&self.to_bytes(keep_alive))?;
        out.flush()
    }
}

/// Head of an open-ended `text/event-stream` response; the body follows frame by frame.
pub fn write_event_stream_head<W: Write>(out: &mut W) -> io::Result<()> {
    let mut head = Vec::with_capacity(128);
    write_status_line(&mut head, StatusCode::OK);
    write_header(&mut head, CONTENT_TYPE.as_str(), b"text/event-stream");
    write_header(&mut head, "cache-control", b"no-cache");
    write_header(&mut head, CONNECTION.as_str(), b"close");
    head.extend_from_slice(b"\r\n");
    out.write_all(&head)?;
    out.flush()
}

fn write_status_line(out: &mut Vec<u8>, status: StatusCode) {
    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(res: &Response, keep_alive: bool) -> String {
        String::from_utf8(res.to_bytes(keep_alive)).unwrap()
    }

    #[test]
    fn test_error_page_body() {
        let res = Response::error_page(StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"<html>Error: 404</html>");
        let wire = text(&res, true);
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.contains("content-type: text/html\r\n"));
        assert!(wire.contains("content-length: 23\r\n"));
        assert!(wire.contains("connection: keep-alive\r\n"));
        assert!(wire.ends_with("\r\n\r\n<html>Error: 404</html>"));
    }

    #[test]
    fn test_bytes_without_content_type_has_no_header() {
        let res = Response::bytes(b"<html>Hello, Flub</html>".to_vec(), None);
        let wire = text(&res, false);
        assert!(!wire.contains("content-type"));
        assert!(wire.contains("connection: close\r\n"));
    }

    #[test]
    fn test_json_response() {
        let res = Response::json(StatusCode::OK, &json!({"a": [1, 2]}));
        assert_eq!(res.body(), br#"{"a":[1,2]}"#);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_writer_owns_framing_headers() {
        let res = Response::new(StatusCode::CREATED)
            .with_header(CONTENT_LENGTH, HeaderValue::from_static("999"))
            .with_header(http::header::LOCATION, HeaderValue::from_static("/x/1"));
        let wire = text(&res, true);
        assert!(wire.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(wire.contains("content-length: 0\r\n"));
        assert!(!wire.contains("999"));
        assert!(wire.contains("location: /x/1\r\n"));
    }

    #[test]
    fn test_event_stream_head() {
        let mut out = Vec::new();
        write_event_stream_head(&mut out).unwrap();
        let head = String::from_utf8(out).unwrap();
        assert!(head.contains("content-type: text/event-stream\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
        assert!(!head.contains("content-length"));
    }
}
