use std::{
    fs::File,
    io::{BufWriter, Read as _, Write as _},
    path::PathBuf,
};

use tracing::{debug, trace};
use ureq::{
    http::{
        header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED},
        Response, StatusCode,
    },
    Body,
};
use url::Url;

use crate::{error::DownloadError, http_client::SHARED_AGENT};

/// A conditional GET of one file into `destination`.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub destination: PathBuf,
    /// Previous `Last-Modified` value, sent as `If-Modified-Since`.
    pub last_modified: String,
    /// Previous `ETag` value, sent as `If-None-Match`.
    pub entity_tag: String,
    /// `Authorization` header value; empty for anonymous access.
    pub authentication: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server answered `304`; nothing was written.
    NotModified,
    /// Any status other than `200` and `304`.
    Http(u16),
    /// The body was written to the destination. The caching tokens are empty
    /// when the server did not send them.
    Success {
        last_modified: String,
        entity_tag: String,
    },
}

/// Fetches index archives for the sync engine.
pub trait Downloader: Send + Sync {
    /// Performs `request`, reporting `(bytes_written, content_length)` through
    /// `on_bytes` as the body arrives. Transport failures are errors; HTTP
    /// statuses are outcomes.
    fn fetch(
        &self,
        request: &FetchRequest,
        on_bytes: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchOutcome, DownloadError>;
}

/// [`Downloader`] backed by the shared ureq agent.
#[derive(Clone, Default)]
pub struct HttpDownloader;

impl HttpDownloader {
    pub fn new() -> Self {
        Self
    }

    fn header(resp: &Response<Body>, name: ureq::http::HeaderName) -> String {
        resp.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn content_length(resp: &Response<Body>) -> Option<u64> {
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }

    fn write_body(
        resp: Response<Body>,
        request: &FetchRequest,
        on_bytes: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<(), DownloadError> {
        let total = Self::content_length(&resp);
        let io_err = |source: std::io::Error| DownloadError::Io {
            path: request.destination.display().to_string(),
            source,
        };

        let file = File::create(&request.destination).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let mut reader = resp.into_body().into_reader();
        let mut buffer = [0u8; 8192];
        let mut written = 0u64;

        on_bytes(0, total);
        loop {
            let n = reader.read(&mut buffer).map_err(io_err)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).map_err(io_err)?;
            written += n as u64;
            on_bytes(written, total);
        }
        writer.flush().map_err(io_err)?;

        trace!("wrote {} bytes to {}", written, request.destination.display());
        Ok(())
    }
}

impl Downloader for HttpDownloader {
    fn fetch(
        &self,
        request: &FetchRequest,
        on_bytes: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<FetchOutcome, DownloadError> {
        Url::parse(&request.url).map_err(|source| DownloadError::InvalidUrl {
            url: request.url.clone(),
            source,
        })?;

        let mut req = SHARED_AGENT.get(request.url.as_str());
        if !request.last_modified.is_empty() {
            req = req.header("If-Modified-Since", &request.last_modified);
        }
        if !request.entity_tag.is_empty() {
            req = req.header("If-None-Match", &request.entity_tag);
        }
        if !request.authentication.is_empty() {
            req = req.header("Authorization", &request.authentication);
        }

        let resp = match req.call() {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(code)) => return Ok(FetchOutcome::Http(code)),
            Err(err) => return Err(err.into()),
        };

        let status = resp.status();
        debug!("GET {} -> {}", request.url, status.as_u16());

        match status {
            StatusCode::NOT_MODIFIED => Ok(FetchOutcome::NotModified),
            StatusCode::OK => {
                let last_modified = Self::header(&resp, LAST_MODIFIED);
                let entity_tag = Self::header(&resp, ETAG);
                Self::write_body(resp, request, on_bytes)?;
                Ok(FetchOutcome::Success {
                    last_modified,
                    entity_tag,
                })
            }
            other => Ok(FetchOutcome::Http(other.as_u16())),
        }
    }
}
