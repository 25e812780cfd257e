use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const GZIP: &str = "gzip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok,
    Created,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::Created => 201,
            HttpStatus::BadRequest => 400,
            HttpStatus::NotFound => 404,
            HttpStatus::MethodNotAllowed => 405,
            HttpStatus::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::Created => "Created",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/1.1 {} {}", self.code(), self.reason())
    }
}

/// The intermediate value a route handler produces and the writer consumes.
/// An absent body is distinct from an empty one: absent suppresses the
/// Content-Type/Content-Length headers entirely, empty yields
/// `Content-Length: 0`.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    status: HttpStatus,
    body: Option<Vec<u8>>,
    content_type: Option<&'static str>,
    encoding: Option<&'static str>,
}

impl ResponseDescriptor {
    pub fn new(status: HttpStatus) -> Self {
        Self {
            status,
            body: None,
            content_type: None,
            encoding: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Marks the body for gzip compression on the wire. Only valid once a
    /// body has been set.
    pub fn with_gzip(mut self) -> Self {
        debug_assert!(self.body.is_some(), "encoding requires a body");
        self.encoding = Some(GZIP);
        self
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn encoding(&self) -> Option<&'static str> {
        self.encoding
    }

    /// Serializes the full response into a single buffer. Compression runs
    /// here, before any byte reaches the socket, so Content-Length always
    /// reflects the compressed length and a failure never leaves a partially
    /// flushed response behind.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("{}\r\n", self.status).as_bytes());

        match &self.body {
            Some(body) => {
                if let Some(content_type) = self.content_type {
                    out.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
                }
                let payload = match self.encoding {
                    Some(encoding) => {
                        out.extend_from_slice(
                            format!("Content-Encoding: {}\r\n", encoding).as_bytes(),
                        );
                        gzip_compress(body)?
                    }
                    None => body.clone(),
                };
                out.extend_from_slice(format!("Content-Length: {}\r\n", payload.len()).as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(&payload);
            }
            // nil body: nothing but the blank line terminating the headers
            None => out.extend_from_slice(b"\r\n"),
        }

        Ok(out)
    }
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).context("gzip write failed")?;
    encoder.finish().context("gzip finish failed")
}

#[derive(Debug)]
pub struct ResponseWriter<W: AsyncWrite + Unpin> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn from(writer: W) -> Self {
        Self { writer }
    }

    /// Buffer first, write once.
    pub async fn write_response(&mut self, response: &ResponseDescriptor) -> Result<()> {
        let bytes = response.to_wire_bytes()?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
