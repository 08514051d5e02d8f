//! External merge of products and releases that arrive separately.
//!
//! The JSON index lists apps and their packages in unrelated places, so
//! both are spilled to a throwaway SQLite database and joined back
//! together afterwards, keeping memory bounded on large repositories.

use std::path::Path;

use diesel::{prelude::*, sql_query, Connection, RunQueryDsl, SqliteConnection};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::trace;

use crate::{
    error::{ErrorContext, ParseError},
    model::{Product, Release},
};

mod schema {
    diesel::table! {
        merged_product (package_name) {
            package_name -> Text,
            data -> Jsonb,
        }
    }

    diesel::table! {
        merged_release (id) {
            id -> BigInt,
            package_name -> Text,
            identifier -> Text,
            data -> Jsonb,
        }
    }
}

use schema::{merged_product, merged_release};

const CREATE_TABLES: [&str; 2] = [
    "CREATE TABLE merged_product (
        package_name TEXT PRIMARY KEY NOT NULL,
        data BLOB NOT NULL
    )",
    "CREATE TABLE merged_release (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        package_name TEXT NOT NULL,
        identifier TEXT NOT NULL,
        data BLOB NOT NULL,
        UNIQUE (package_name, identifier)
    )",
];

#[derive(Insertable)]
#[diesel(table_name = merged_product)]
struct NewMergedProduct<'a> {
    package_name: &'a str,
    data: Value,
}

#[derive(Insertable)]
#[diesel(table_name = merged_release)]
struct NewMergedRelease<'a> {
    package_name: &'a str,
    identifier: String,
    data: Value,
}

/// One replayed page of merged products.
#[derive(Debug)]
pub struct MergedBatch {
    pub products: Vec<Product>,
    /// Number of products the merger holds in total.
    pub total: usize,
}

pub struct IndexMerger {
    // Declared before `file` so the connection closes before the file is
    // deleted.
    conn: SqliteConnection,
    file: NamedTempFile,
}

impl IndexMerger {
    /// Creates the scratch database inside `dir`.
    pub fn open(dir: &Path) -> Result<Self, ParseError> {
        let file = tempfile::Builder::new()
            .prefix("merger-")
            .suffix(".db")
            .tempfile_in(dir)
            .with_context(|| format!("creating merge database in {}", dir.display()))?;
        let mut conn = SqliteConnection::establish(&file.path().to_string_lossy())?;

        sql_query("PRAGMA journal_mode = OFF").execute(&mut conn)?;
        sql_query("PRAGMA synchronous = OFF").execute(&mut conn)?;
        for statement in CREATE_TABLES {
            sql_query(statement).execute(&mut conn)?;
        }

        trace!("merge database at {}", file.path().display());
        Ok(Self { conn, file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Stores products without their releases. A package seen again
    /// replaces the earlier record.
    pub fn add_products(&mut self, products: &[Product]) -> Result<(), ParseError> {
        let rows = products
            .iter()
            .map(|product| {
                let stripped = Product {
                    releases: Vec::new(),
                    ..product.clone()
                };
                Ok(NewMergedProduct {
                    package_name: &product.package_name,
                    data: serde_json::to_value(stripped)?,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        self.conn.transaction(|conn| {
            for row in &rows {
                diesel::replace_into(merged_product::table)
                    .values(row)
                    .execute(conn)?;
            }
            Ok::<_, diesel::result::Error>(())
        })?;
        Ok(())
    }

    /// Appends releases per package. A release whose identifier was already
    /// stored for the package is dropped.
    pub fn add_releases(&mut self, releases: &[(String, Vec<Release>)]) -> Result<(), ParseError> {
        let mut rows = Vec::new();
        for (package_name, list) in releases {
            for release in list {
                rows.push(NewMergedRelease {
                    package_name,
                    identifier: release.identifier(),
                    data: serde_json::to_value(release)?,
                });
            }
        }

        self.conn.transaction(|conn| {
            for row in &rows {
                diesel::insert_or_ignore_into(merged_release::table)
                    .values(row)
                    .execute(conn)?;
            }
            Ok::<_, diesel::result::Error>(())
        })?;
        Ok(())
    }

    /// Pages through every stored product in package name order with its
    /// releases attached in first-seen order. Releases of packages without a
    /// product record are never emitted.
    pub fn replay(&mut self, batch_size: usize) -> Result<Replay<'_>, ParseError> {
        let total: i64 = merged_product::table.count().get_result(&mut self.conn)?;
        Ok(Replay {
            conn: &mut self.conn,
            batch_size: batch_size.max(1) as i64,
            total: total as usize,
            last: None,
            done: false,
        })
    }
}

pub struct Replay<'a> {
    conn: &'a mut SqliteConnection,
    batch_size: i64,
    total: usize,
    last: Option<String>,
    done: bool,
}

impl Replay<'_> {
    pub fn total(&self) -> usize {
        self.total
    }

    fn next_batch(&mut self) -> Result<Option<MergedBatch>, ParseError> {
        let mut query = merged_product::table
            .select((merged_product::package_name, merged_product::data))
            .order(merged_product::package_name.asc())
            .limit(self.batch_size)
            .into_boxed::<diesel::sqlite::Sqlite>();
        if let Some(last) = &self.last {
            query = query.filter(merged_product::package_name.gt(last.clone()));
        }
        let rows: Vec<(String, Value)> = query.load(self.conn)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let names: Vec<&String> = rows.iter().map(|(name, _)| name).collect();
        let release_rows: Vec<(String, Value)> = merged_release::table
            .filter(merged_release::package_name.eq_any(names))
            .order(merged_release::id.asc())
            .select((merged_release::package_name, merged_release::data))
            .load(self.conn)?;

        let mut products = rows
            .into_iter()
            .map(|(_, data)| serde_json::from_value::<Product>(data))
            .collect::<Result<Vec<_>, _>>()?;
        for (package_name, data) in release_rows {
            let release: Release = serde_json::from_value(data)?;
            if let Some(product) = products
                .iter_mut()
                .find(|product| product.package_name == package_name)
            {
                product.releases.push(release);
            }
        }

        self.last = products.last().map(|product| product.package_name.clone());
        trace!("replayed {} merged products", products.len());
        Ok(Some(MergedBatch {
            products,
            total: self.total,
        }))
    }
}

impl Iterator for Replay<'_> {
    type Item = Result<MergedBatch, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
