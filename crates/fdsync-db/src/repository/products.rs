//! Catalog rows, staged and committed.

use diesel::{prelude::*, sql_query, sql_types::BigInt};
use fdsync_index::{Product, Repository};
use tracing::trace;

use crate::{
    error::{DbError, Result},
    models::{NewProduct, NewRepository, ProductSummary},
    schema::{product, product_staging, repository},
};

pub struct ProductStore;

impl ProductStore {
    pub fn clear_staging(conn: &mut SqliteConnection, repository_id: i64) -> QueryResult<usize> {
        diesel::delete(product_staging::table.filter(product_staging::repository_id.eq(repository_id)))
            .execute(conn)
    }

    /// Stages `products`; a package staged twice keeps the later row.
    pub fn stage(
        conn: &mut SqliteConnection,
        repository_id: i64,
        products: &[Product],
    ) -> Result<()> {
        let rows = products
            .iter()
            .map(|product| NewProduct::from_product(repository_id, product))
            .collect::<Result<Vec<_>>>()?;

        conn.transaction(|conn| {
            for row in &rows {
                diesel::replace_into(product_staging::table)
                    .values(row)
                    .execute(conn)?;
            }
            trace!("staged {} products for repository {repository_id}", rows.len());
            Ok(())
        })
    }

    /// Replaces the committed catalog with the staged one and stores
    /// `repo`, all in one transaction.
    pub fn swap(conn: &mut SqliteConnection, repo: &Repository) -> Result<()> {
        let changes = NewRepository::from_repository(repo)?;
        conn.transaction(|conn| {
            Self::remove_catalog(conn, repo.id)?;
            sql_query(
                "INSERT INTO product SELECT * FROM product_staging WHERE repository_id = ?1",
            )
            .bind::<BigInt, _>(repo.id)
            .execute(conn)?;
            Self::clear_staging(conn, repo.id)?;

            let updated = diesel::update(repository::table.filter(repository::id.eq(repo.id)))
                .set(&changes)
                .execute(conn)?;
            if updated == 0 {
                return Err(DbError::NotFound(repo.id.to_string()));
            }
            Ok(())
        })
    }

    pub fn remove_catalog(conn: &mut SqliteConnection, repository_id: i64) -> QueryResult<usize> {
        diesel::delete(product::table.filter(product::repository_id.eq(repository_id)))
            .execute(conn)
    }

    /// Products of enabled repositories ordered by name, optionally limited
    /// to one repository and to names or package names containing `query`.
    pub fn list(
        conn: &mut SqliteConnection,
        repository_id: Option<i64>,
        query: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<Vec<ProductSummary>> {
        let enabled = repository::table
            .filter(repository::enabled.eq(true))
            .filter(repository::deleted.eq(false))
            .select(repository::id);

        let mut select = product::table
            .filter(product::repository_id.eq_any(enabled))
            .into_boxed();
        if let Some(id) = repository_id {
            select = select.filter(product::repository_id.eq(id));
        }
        if let Some(query) = query {
            let pattern = format!("%{query}%");
            select = select.filter(
                product::name
                    .like(pattern.clone())
                    .or(product::package_name.like(pattern)),
            );
        }
        if let Some(limit) = limit {
            select = select.limit(limit);
        }

        select
            .order((product::name.asc(), product::package_name.asc()))
            .select(ProductSummary::as_select())
            .load(conn)
    }

    pub fn get(
        conn: &mut SqliteConnection,
        repository_id: i64,
        package_name: &str,
    ) -> Result<Option<Product>> {
        let data: Option<serde_json::Value> = product::table
            .filter(product::repository_id.eq(repository_id))
            .filter(product::package_name.eq(package_name))
            .select(product::data)
            .first(conn)
            .optional()?;
        Ok(data.map(serde_json::from_value).transpose()?)
    }

    pub fn count(conn: &mut SqliteConnection, repository_id: i64) -> QueryResult<i64> {
        product::table
            .filter(product::repository_id.eq(repository_id))
            .count()
            .get_result(conn)
    }

    pub fn count_staged(conn: &mut SqliteConnection, repository_id: i64) -> QueryResult<i64> {
        product_staging::table
            .filter(product_staging::repository_id.eq(repository_id))
            .count()
            .get_result(conn)
    }
}

#[cfg(test)]
mod tests {
    use fdsync_index::Release;

    use super::*;
    use crate::{connection::DbConnection, repository::RepositoryStore};

    fn product(name: &str, label: &str) -> Product {
        Product {
            name: label.into(),
            summary: format!("{label} summary"),
            releases: vec![Release {
                version: "1.0".into(),
                version_code: 1,
                selected: true,
                ..Default::default()
            }],
            ..Product::new(0, name)
        }
    }

    fn setup() -> (DbConnection, Repository) {
        let mut db = DbConnection::open_in_memory().unwrap();
        let repo = RepositoryStore::insert(
            db.conn(),
            &Repository::new("https://example.org/repo", "", ""),
        )
        .unwrap();
        (db, repo)
    }

    #[test]
    fn test_staged_rows_invisible_until_swap() {
        let (mut db, repo) = setup();
        ProductStore::stage(db.conn(), repo.id, &[product("a.app", "Alpha")]).unwrap();
        assert_eq!(ProductStore::count(db.conn(), repo.id).unwrap(), 0);
        assert_eq!(ProductStore::count_staged(db.conn(), repo.id).unwrap(), 1);

        let synced = Repository {
            name: "Synced".into(),
            timestamp: 42,
            ..repo.clone()
        };
        ProductStore::swap(db.conn(), &synced).unwrap();
        assert_eq!(ProductStore::count(db.conn(), repo.id).unwrap(), 1);
        assert_eq!(ProductStore::count_staged(db.conn(), repo.id).unwrap(), 0);

        let stored = RepositoryStore::find(db.conn(), repo.id).unwrap().unwrap();
        assert_eq!(stored.name, "Synced");
        assert_eq!(stored.timestamp, 42);
    }

    #[test]
    fn test_swap_replaces_previous_catalog() {
        let (mut db, repo) = setup();
        ProductStore::stage(
            db.conn(),
            repo.id,
            &[product("a.app", "Alpha"), product("b.app", "Beta")],
        )
        .unwrap();
        ProductStore::swap(db.conn(), &repo).unwrap();

        ProductStore::stage(db.conn(), repo.id, &[product("c.app", "Gamma")]).unwrap();
        ProductStore::swap(db.conn(), &repo).unwrap();

        let listed = ProductStore::list(db.conn(), None, None, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].package_name, "c.app");
        assert_eq!(listed[0].version, "1.0");
        assert!(listed[0].compatible);

        let stored = ProductStore::get(db.conn(), repo.id, "c.app").unwrap().unwrap();
        assert_eq!(stored.summary, "Gamma summary");
        assert!(ProductStore::get(db.conn(), repo.id, "a.app").unwrap().is_none());
    }

    #[test]
    fn test_list_filters() {
        let (mut db, repo) = setup();
        ProductStore::stage(
            db.conn(),
            repo.id,
            &[product("org.example.beta", "Beta"), product("org.example.alpha", "Alpha")],
        )
        .unwrap();
        ProductStore::swap(db.conn(), &repo).unwrap();

        let names: Vec<String> = ProductStore::list(db.conn(), Some(repo.id), None, None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        let found = ProductStore::list(db.conn(), None, Some("bet"), None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(ProductStore::list(db.conn(), None, None, Some(1)).unwrap().len(), 1);

        RepositoryStore::update(db.conn(), &repo.enable(false)).unwrap();
        assert!(ProductStore::list(db.conn(), None, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_swap_unknown_repository_keeps_catalog() {
        let (mut db, repo) = setup();
        ProductStore::stage(db.conn(), repo.id, &[product("a.app", "Alpha")]).unwrap();
        ProductStore::swap(db.conn(), &repo).unwrap();

        let unknown = Repository {
            id: repo.id + 100,
            ..repo.clone()
        };
        assert!(ProductStore::swap(db.conn(), &unknown).is_err());
        assert_eq!(ProductStore::count(db.conn(), repo.id).unwrap(), 1);
    }
}
