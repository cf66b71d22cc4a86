//! HTTP/1.x request framing.
//!
//! Reads are bounded at every step: the request line and each header line go through a `take`
//! of the configured limit plus one byte, so an oversized line is detected without buffering
//! more than the limit. Only the head is parsed here; the body is read separately once the
//! pipeline knows it wants it.

use crate::config::ServerConfig;
use crate::error::WebError;
use http::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING,
};
use http::{HeaderMap, Method, Version};
use std::io::{self, BufRead, Read};

/// Read limits applied to one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_request_line: usize,
    pub max_header_line: usize,
    pub max_headers: usize,
    pub max_body_bytes: usize,
}

impl From<&ServerConfig> for RequestLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_request_line: config.max_request_line,
            max_header_line: config.max_header_line,
            max_headers: config.max_headers,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Request line and headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Raw request target, still percent-encoded and carrying any query string.
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close; `Connection` overrides either.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        let token = |t: &str| {
            self.headers
                .get_all(CONNECTION)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .any(|part| part.trim().eq_ignore_ascii_case(t))
        };
        match self.version {
            Version::HTTP_10 => token("keep-alive"),
            _ => !token("close"),
        }
    }

    /// Raw `Authorization` value, if present and valid text.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()
    }

    /// Declared body length.
    ///
    /// # Errors
    ///
    /// [`WebError::MalformedRequest`] for a non-numeric or conflicting `Content-Length`, or any
    /// `Transfer-Encoding` (only length-delimited bodies are supported).
    pub fn content_length(&self) -> Result<Option<usize>, WebError> {
        if self.headers.contains_key(TRANSFER_ENCODING) {
            return Err(WebError::MalformedRequest(
                "transfer-encoding is not supported".into(),
            ));
        }
        let mut length = None;
        for value in self.headers.get_all(CONTENT_LENGTH) {
            let parsed = value
                .to_str()
                .ok()
                .map(str::trim)
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| WebError::MalformedRequest("invalid content-length".into()))?;
            match length {
                Some(prev) if prev != parsed => {
                    return Err(WebError::MalformedRequest(
                        "conflicting content-length headers".into(),
                    ))
                }
                _ => length = Some(parsed),
            }
        }
        Ok(length)
    }
}

enum Line {
    Eof,
    TooLong,
    Complete(Vec<u8>),
}

/// Read up to and including `\n`, giving up once more than `limit` bytes have been seen.
fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<Line> {
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let n = reader.by_ref().take(cap).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.len() > limit {
        return Ok(Line::TooLong);
    }
    Ok(Line::Complete(buf))
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse `METHOD SP target SP HTTP/x.y`.
///
/// # Errors
///
/// [`WebError::MalformedRequest`] or [`WebError::VersionNotSupported`].
pub fn parse_request_line(line: &[u8]) -> Result<(Method, String, Version), WebError> {
    let line = std::str::from_utf8(trim_eol(line))
        .map_err(|_| WebError::MalformedRequest("request line is not UTF-8".into()))?;
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(WebError::MalformedRequest(format!("bad request line {line:?}")));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| WebError::MalformedRequest(format!("bad method {method:?}")))?;
    if !target.starts_with('/') {
        return Err(WebError::MalformedRequest(format!("bad target {target:?}")));
    }
    Ok((method, target.to_string(), parse_version(version)?))
}

fn parse_version(version: &str) -> Result<Version, WebError> {
    let numbers = version
        .strip_prefix("HTTP/")
        .and_then(|v| v.split_once('.'))
        .filter(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        });
    match numbers {
        Some(("1", "0")) => Ok(Version::HTTP_10),
        Some(("1", _)) => Ok(Version::HTTP_11),
        Some(_) => Err(WebError::VersionNotSupported(version.to_string())),
        None => Err(WebError::MalformedRequest(format!("bad version {version:?}"))),
    }
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), WebError> {
    if line.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
        return Err(WebError::MalformedRequest("obsolete header line folding".into()));
    }
    let colon = line
        .iter()
        .position(|b| *b == b':')
        .ok_or_else(|| WebError::MalformedRequest("header line without colon".into()))?;
    let name = HeaderName::from_bytes(&line[..colon])
        .map_err(|_| WebError::MalformedRequest("invalid header name".into()))?;
    let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii())
        .map_err(|_| WebError::MalformedRequest(format!("invalid value for header {name}")))?;
    Ok((name, value))
}

/// Read the request line and headers.
///
/// Returns `Ok(None)` when the peer closed the connection before sending anything. Blank lines
/// ahead of the request line are skipped.
///
/// # Errors
///
/// - [`WebError::RequestLineTooLong`] past `max_request_line` bytes, line ending included
/// - [`WebError::HeadersTooLarge`] for an oversized header line or too many headers
/// - [`WebError::MalformedRequest`] / [`WebError::VersionNotSupported`] for unparsable input
/// - [`WebError::Io`] for socket failures, timeouts included
pub fn read_head<R: BufRead>(
    reader: &mut R,
    limits: &RequestLimits,
) -> Result<Option<RequestHead>, WebError> {
    let line = loop {
        match read_line(reader, limits.max_request_line)? {
            Line::Eof => return Ok(None),
            Line::TooLong => {
                return Err(WebError::RequestLineTooLong {
                    limit: limits.max_request_line,
                })
            }
            Line::Complete(line) if trim_eol(&line).is_empty() => continue,
            Line::Complete(line) => break line,
        }
    };
    if !line.ends_with(b"\n") {
        return Err(WebError::MalformedRequest("truncated request line".into()));
    }
    let (method, target, version) = parse_request_line(&line)?;

    let mut headers = HeaderMap::new();
    let mut count = 0;
    loop {
        let line = match read_line(reader, limits.max_header_line)? {
            Line::Eof => return Err(WebError::MalformedRequest("truncated header section".into())),
            Line::TooLong => return Err(WebError::HeadersTooLarge),
            Line::Complete(line) => line,
        };
        let line = trim_eol(&line);
        if line.is_empty() {
            break;
        }
        count += 1;
        if count > limits.max_headers {
            return Err(WebError::HeadersTooLarge);
        }
        let (name, value) = parse_header_line(line)?;
        headers.append(name, value);
    }

    Ok(Some(RequestHead {
        method,
        target,
        version,
        headers,
    }))
}

/// Read exactly `length` body bytes.
///
/// # Errors
///
/// [`WebError::BodyTooLarge`] past `max_body_bytes`; [`WebError::Io`] if the peer sends less.
pub fn read_body<R: Read>(
    reader: &mut R,
    length: usize,
    limits: &RequestLimits,
) -> Result<Vec<u8>, WebError> {
    if length > limits.max_body_bytes {
        return Err(WebError::BodyTooLarge {
            length,
            limit: limits.max_body_bytes,
        });
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    Ok(body)
}
