use core::fmt;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::headers::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    RequestLine,
    ParsingHeaders,
    Done,
}

/// Unknown methods are preserved rather than rejected so the files route can
/// still answer 405 for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Other(m) => write!(f, "{}", m),
        }
    }
}

/// A fully parsed request line and header block. Built once per connection,
/// consumed once by the router, never mutated.
///
/// The body is deliberately left on the stream: the file-POST handler reads
/// exactly `Content-Length` bytes from the same reader after this returns.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    segments: Vec<String>,
    pub headers: Headers,
}

impl ParsedRequest {
    pub async fn parse_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut state = ParserState::RequestLine;
        let mut method = None;
        let mut segments = Vec::new();
        let mut headers = Headers::new();

        loop {
            match state {
                ParserState::RequestLine => {
                    let line = read_line(reader).await?;
                    let mut parts = line.split(' ');
                    let method_raw = parts
                        .next()
                        .filter(|t| !t.is_empty())
                        .ok_or_else(|| anyhow::anyhow!("invalid request line: missing method"))?;
                    let target = parts
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("invalid request line: missing target"))?;
                    if !target.starts_with('/') {
                        bail!("target must start with '/': {}", target);
                    }
                    method = Some(Method::from(method_raw));
                    segments = target.split('/').map(str::to_string).collect();
                    state = ParserState::ParsingHeaders;
                }
                ParserState::ParsingHeaders => {
                    let line = read_line(reader).await?;
                    if line.is_empty() {
                        state = ParserState::Done;
                    } else if let Some((key, value)) = Headers::parse_line(&line) {
                        headers.insert(&key, &value);
                    }
                    // lines without a colon are silently skipped
                }
                ParserState::Done => break,
            }
        }

        let method = method.ok_or_else(|| anyhow::anyhow!("request line was never parsed"))?;
        Ok(Self {
            method,
            segments,
            headers,
        })
    }

    /// The route discriminator: the first path component after the leading
    /// slash. Empty string for the root path `/`.
    pub fn route(&self) -> &str {
        self.segments.get(1).map_or("", String::as_str)
    }

    /// The route-specific argument (echo text, file name).
    pub fn route_arg(&self) -> Option<&str> {
        self.segments.get(2).map(String::as_str)
    }
}

/// Reads one line up to and including the `\n` terminator, returning it with
/// the terminator stripped. EOF before a terminator is a transport failure.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf).await?;
    if !buf.ends_with(b"\n") {
        bail!("connection closed mid-line");
    }
    let mut line = String::from_utf8_lossy(&buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn request_line_basics() {
        let mut reader = Cursor::new(b"GET / HTTP/1.1\r\n\r\n".to_vec());
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.route(), "");
        assert_eq!(req.route_arg(), None);

        let mut reader = Cursor::new(b"POST /files/notes.txt HTTP/1.1\r\n\r\n".to_vec());
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.route(), "files");
        assert_eq!(req.route_arg(), Some("notes.txt"));

        // unknown methods come through intact
        let mut reader = Cursor::new(b"DELETE /files/x HTTP/1.1\r\n\r\n".to_vec());
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.method, Method::Other("DELETE".to_string()));
    }

    #[tokio::test]
    async fn echo_argument_is_verbatim() {
        let mut reader = Cursor::new(b"GET /echo/AbC%20dEf HTTP/1.1\r\n\r\n".to_vec());
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.route(), "echo");
        // no URL decoding, no case folding
        assert_eq!(req.route_arg(), Some("AbC%20dEf"));
    }

    #[tokio::test]
    async fn malformed_request_lines_fail() {
        for raw in [
            &b"/coffee HTTP/1.1\r\n\r\n"[..],        // missing method
            &b"GET\r\n\r\n"[..],                     // missing target
            &b"GET coffee HTTP/1.1\r\n\r\n"[..],     // target without leading slash
            &b"GET /truncated"[..],                  // EOF mid-line
        ] {
            let mut reader = Cursor::new(raw.to_vec());
            assert!(ParsedRequest::parse_from(&mut reader).await.is_err());
        }
    }

    #[tokio::test]
    async fn headers_parse_until_blank_line() {
        let raw = b"GET /user-agent HTTP/1.1\r\n\
                    Host: localhost:4221\r\n\
                    User-Agent:   curl/7.81.0  \r\n\
                    this line has no colon\r\n\
                    \r\n"
            .to_vec();
        let mut reader = Cursor::new(raw);
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.headers.get("Host"), Some("localhost:4221"));
        // values are trimmed of surrounding whitespace
        assert_eq!(req.headers.get("User-Agent"), Some("curl/7.81.0"));
        // the colon-less line was skipped, not stored and not fatal
        assert_eq!(req.headers.len(), 2);
    }

    #[tokio::test]
    async fn body_is_left_on_the_stream() {
        let raw = b"POST /files/a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello".to_vec();
        let mut reader = Cursor::new(raw);
        let req = ParsedRequest::parse_from(&mut reader).await.unwrap();
        assert_eq!(req.headers.get("Content-Length"), Some("5"));

        use tokio::io::AsyncReadExt;
        let mut body = [0u8; 5];
        reader.read_exact(&mut body).await.unwrap();
        assert_eq!(&body, b"hello");
    }

    #[tokio::test]
    async fn eof_inside_header_block_fails() {
        let mut reader = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec());
        assert!(ParsedRequest::parse_from(&mut reader).await.is_err());
    }
}
