//! Fetching of repository index archives over HTTP.
//!
//! [`Downloader`] is the seam the sync engine talks to; [`HttpDownloader`]
//! implements it on top of the process-wide [`http_client::SHARED_AGENT`].

pub mod downloader;
pub mod error;
pub mod http_client;

pub use downloader::{Downloader, FetchOutcome, FetchRequest, HttpDownloader};
pub use error::DownloadError;
