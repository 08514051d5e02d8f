//! Catalog entities shared by the parsers, the merger and storage.

mod product;
mod release;
mod repository;

pub use product::{Author, Donate, Product, Screenshot, ScreenshotKind};
pub use release::{Incompatibility, ObbFile, Release};
pub use repository::Repository;
