use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::request::{Method, ParsedRequest};
use crate::response::{HttpStatus, ResponseDescriptor};

/// Routes a parsed request to exactly one response descriptor. The reader is
/// the same stream the request was parsed from; only the file-POST path
/// touches it, to consume the body. Errors bubble up only for
/// transport/protocol-shape failures, in which case no response is sent.
pub async fn dispatch<R: AsyncBufRead + Unpin>(
    req: &ParsedRequest,
    reader: &mut R,
    directory: &Path,
) -> Result<ResponseDescriptor> {
    match req.route() {
        "" => Ok(ResponseDescriptor::new(HttpStatus::Ok)),
        "echo" => Ok(echo(req)),
        "user-agent" => Ok(user_agent(req)),
        "files" => files(req, reader, directory).await,
        _ => Ok(ResponseDescriptor::new(HttpStatus::NotFound)),
    }
}

fn echo(req: &ParsedRequest) -> ResponseDescriptor {
    let body = req.route_arg().unwrap_or("");
    let response = ResponseDescriptor::new(HttpStatus::Ok)
        .with_body(body)
        .with_content_type("text/plain");
    if accepts_gzip(req) {
        response.with_gzip()
    } else {
        response
    }
}

/// Only the literal token `gzip` counts, case-sensitive, after trimming each
/// comma-separated token. Everything else is ignored and the response goes
/// out uncompressed.
fn accepts_gzip(req: &ParsedRequest) -> bool {
    req.headers
        .get("Accept-Encoding")
        .is_some_and(|value| value.split(',').any(|token| token.trim() == "gzip"))
}

fn user_agent(req: &ParsedRequest) -> ResponseDescriptor {
    let body = req.headers.get("User-Agent").unwrap_or("");
    ResponseDescriptor::new(HttpStatus::Ok)
        .with_body(body)
        .with_content_type("text/plain")
}

async fn files<R: AsyncBufRead + Unpin>(
    req: &ParsedRequest,
    reader: &mut R,
    directory: &Path,
) -> Result<ResponseDescriptor> {
    let Some(file_name) = req.route_arg() else {
        return Ok(ResponseDescriptor::new(HttpStatus::NotFound));
    };
    // file name is joined verbatim; traversal guarding is out of scope
    let path = directory.join(file_name);

    match req.method {
        Method::Get => Ok(file_get(&path).await),
        Method::Post => file_post(req, reader, &path).await,
        Method::Other(_) => Ok(ResponseDescriptor::new(HttpStatus::MethodNotAllowed)),
    }
}

async fn file_get(path: &Path) -> ResponseDescriptor {
    match tokio::fs::read(path).await {
        Ok(bytes) => ResponseDescriptor::new(HttpStatus::Ok)
            .with_body(bytes)
            .with_content_type("application/octet-stream"),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "file read failed");
            ResponseDescriptor::new(HttpStatus::NotFound)
        }
    }
}

/// Reads exactly Content-Length bytes off the request stream, then
/// create/truncates the target. A missing or non-numeric Content-Length is a
/// protocol-shape failure: the request is aborted without a response.
async fn file_post<R: AsyncBufRead + Unpin>(
    req: &ParsedRequest,
    reader: &mut R,
    path: &Path,
) -> Result<ResponseDescriptor> {
    let content_length: usize = req
        .headers
        .get("Content-Length")
        .context("file POST without Content-Length")?
        .parse()
        .context("non-numeric Content-Length")?;

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    let mut file = match File::create(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "file create failed");
            return Ok(ResponseDescriptor::new(HttpStatus::NotFound));
        }
    };
    // no partial-write recovery: a failed write leaves whatever made it out
    if let Err(e) = file.write_all(&body).await {
        debug!(path = %path.display(), error = %e, "file write failed");
        return Ok(ResponseDescriptor::new(HttpStatus::InternalServerError));
    }

    Ok(ResponseDescriptor::new(HttpStatus::Created))
}
