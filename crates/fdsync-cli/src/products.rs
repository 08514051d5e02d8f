use std::collections::HashMap;

use fdsync_db::{DbError, ProductStore, RepositoryStore};
use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed, Yellow};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};

use crate::{error::CliResult, state::AppState, utils::Colored};

pub fn list_products(
    state: &AppState,
    query: Option<&str>,
    repo: Option<&str>,
    limit: Option<i64>,
) -> CliResult<()> {
    let repository_id = repo
        .map(|key| state.find_repository(key))
        .transpose()?
        .map(|repo| repo.id);
    debug!(?query, ?repository_id, ?limit, "listing products");

    let mut db = state.db().lock();
    let names: HashMap<i64, String> = RepositoryStore::list(db.conn())?
        .into_iter()
        .map(|repo| (repo.id, repo.name))
        .collect();
    let products = ProductStore::list(db.conn(), repository_id, query, limit)
        .map_err(DbError::from)?;
    drop(db);

    if products.is_empty() {
        info!("No products found");
        return Ok(());
    }

    let mut incompatible = 0;
    for product in &products {
        let marker = if product.compatible {
            Colored(Green, "+")
        } else {
            incompatible += 1;
            Colored(Yellow, "!")
        };
        info!(
            package_name = product.package_name,
            version = product.version,
            compatible = product.compatible,
            "[{}] {} {}:{} | {} - {}",
            marker,
            Colored(Blue, &product.name),
            Colored(Cyan, &product.package_name),
            Colored(
                Green,
                names
                    .get(&product.repository_id)
                    .map(String::as_str)
                    .unwrap_or_default()
            ),
            Colored(LightRed, &product.version),
            product.summary
        );
    }

    let mut builder = Builder::new();
    builder.push_record([
        "Shown".to_string(),
        Colored(Cyan, products.len()).to_string(),
    ]);
    builder.push_record([
        "Incompatible".to_string(),
        Colored(Yellow, incompatible).to_string(),
    ]);
    let table = builder
        .build()
        .with(Panel::header("Products"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();
    info!("\n{table}");

    Ok(())
}
