use diesel::prelude::*;
use fdsync_index::{Product, Repository};
use serde_json::Value;

use crate::{
    error::Result,
    schema::{product, product_staging, repository},
};

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = repository)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RepositoryRecord {
    pub id: i64,
    pub address: String,
    pub enabled: bool,
    pub deleted: bool,
    pub data: Value,
}

impl RepositoryRecord {
    /// Decodes the stored repository. The row's id, address and enabled
    /// columns win over the serialized copy.
    pub fn into_repository(self) -> Result<Repository> {
        let stored: Repository = serde_json::from_value(self.data)?;
        Ok(Repository {
            id: self.id,
            address: self.address,
            enabled: self.enabled,
            ..stored
        })
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = repository)]
pub struct NewRepository<'a> {
    pub address: &'a str,
    pub enabled: bool,
    pub data: Value,
}

impl<'a> NewRepository<'a> {
    pub fn from_repository(repository: &'a Repository) -> Result<Self> {
        Ok(Self {
            address: &repository.address,
            enabled: repository.enabled,
            data: serde_json::to_value(repository)?,
        })
    }
}

/// The columns listings need, without decoding the product.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = product)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductSummary {
    pub repository_id: i64,
    pub package_name: String,
    pub name: String,
    pub summary: String,
    pub version: String,
    pub compatible: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_staging)]
pub struct NewProduct<'a> {
    pub repository_id: i64,
    pub package_name: &'a str,
    pub name: &'a str,
    pub summary: &'a str,
    pub version: &'a str,
    pub compatible: bool,
    pub data: Value,
}

impl<'a> NewProduct<'a> {
    pub fn from_product(repository_id: i64, product: &'a Product) -> Result<Self> {
        Ok(Self {
            repository_id,
            package_name: &product.package_name,
            name: &product.name,
            summary: &product.summary,
            version: product.version(),
            compatible: product.compatible(),
            data: serde_json::to_value(product)?,
        })
    }
}
