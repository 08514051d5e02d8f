//! Index decoders.
//!
//! Both formats drive the same [`IndexCallback`], so the updater does not
//! care which one a repository serves.

pub mod current;
mod de;
pub mod legacy;

use std::io::Read;

pub use current::CurrentParser;
pub use legacy::LegacyParser;

use crate::{
    error::Result,
    format::IndexFormat,
    model::{Product, Release},
};

/// Repository metadata declared at the top of an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryMeta {
    pub mirrors: Vec<String>,
    pub name: String,
    pub description: String,
    pub version: i32,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    /// Hex encoded signing certificate, only declared by legacy indexes.
    pub certificate: Option<String>,
}

/// Receives decoded records in document order.
///
/// An error returned from a callback stops parsing and is returned from
/// [`IndexParser::parse`] unchanged.
pub trait IndexCallback {
    fn on_repository(&mut self, meta: RepositoryMeta) -> Result<()>;

    fn on_product(&mut self, product: Product) -> Result<()>;

    /// Releases of `package_name`. Formats that nest releases inside their
    /// product never call this.
    fn on_releases(&mut self, package_name: String, releases: Vec<Release>) -> Result<()>;
}

pub trait IndexParser {
    fn parse(&self, reader: &mut dyn Read, callback: &mut dyn IndexCallback) -> Result<()>;
}

/// Parser for `format`, stamping products with `repository_id`.
pub fn parser_for(format: IndexFormat, repository_id: i64) -> Box<dyn IndexParser> {
    match format {
        IndexFormat::Current => Box::new(CurrentParser::new(repository_id)),
        IndexFormat::Legacy => Box::new(LegacyParser::new(repository_id)),
    }
}
