use fdsync_config::repository::basic_authentication;
use fdsync_db::{DbError, ProductStore, RepositoryStore};
use fdsync_index::Repository;
use fdsync_utils::{hash::normalize_fingerprint, time::now_millis};
use nu_ansi_term::Color::{Blue, Cyan, Green, Red, Yellow};
use tabled::{builder::Builder, settings::Style};
use tracing::info;
use url::Url;

use crate::{
    error::{CliError, CliResult},
    state::AppState,
    utils::{format_age, Colored},
};

fn short_fingerprint(fingerprint: &str) -> String {
    if fingerprint.is_empty() {
        return "(trust on first use)".to_string();
    }
    let head: String = fingerprint.chars().take(16).collect();
    format!("{head}…")
}

pub fn list_repositories(state: &AppState) -> CliResult<()> {
    let mut db = state.db().lock();
    let repositories = RepositoryStore::list(db.conn())?;
    if repositories.is_empty() {
        info!("No repositories configured");
        return Ok(());
    }

    let now = now_millis();
    let mut builder = Builder::new();
    builder.push_record(["Id", "Name", "Address", "Fingerprint", "Products", "Synced"]);
    for repo in &repositories {
        let count = ProductStore::count(db.conn(), repo.id).map_err(DbError::from)?;
        let name = if repo.enabled {
            Colored(Green, &repo.name).to_string()
        } else {
            Colored(Red, format!("{} (disabled)", repo.name)).to_string()
        };
        builder.push_record([
            repo.id.to_string(),
            name,
            Colored(Blue, &repo.address).to_string(),
            short_fingerprint(&repo.fingerprint),
            Colored(Cyan, count).to_string(),
            format_age(repo.updated, now),
        ]);
    }

    let table = builder.build().with(Style::rounded()).to_string();
    info!("\n{table}");
    Ok(())
}

fn credentials(username: Option<&str>, password: Option<&str>) -> Option<String> {
    username.map(|username| basic_authentication(username, password.unwrap_or_default()))
}

fn validate_address(address: &str) -> CliResult<String> {
    let address = address.trim().trim_end_matches('/');
    let valid = Url::parse(address)
        .ok()
        .is_some_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
    if !valid {
        return Err(CliError::Custom(format!(
            "Invalid repository address '{address}': expected an absolute http(s) URL"
        )));
    }
    Ok(address.to_string())
}

fn validate_fingerprint(fingerprint: Option<&str>) -> CliResult<Option<String>> {
    match fingerprint {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(Some(String::new())),
        Some(raw) => {
            let normalized = normalize_fingerprint(raw);
            if normalized.len() != 64 {
                return Err(CliError::Custom(format!(
                    "Invalid fingerprint '{raw}': expected 64 hex characters"
                )));
            }
            Ok(Some(normalized))
        }
    }
}

pub fn add_repository(
    state: &AppState,
    address: &str,
    fingerprint: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> CliResult<()> {
    let address = validate_address(address)?;
    let fingerprint = validate_fingerprint(fingerprint)?.unwrap_or_default();
    let authentication = credentials(username, password).unwrap_or_default();

    let repository = Repository::new(&address, &fingerprint, &authentication);
    let stored = RepositoryStore::insert(state.db().lock().conn(), &repository)?;
    info!(
        "Added repository {} ({})",
        Colored(Cyan, &stored.name),
        Colored(Yellow, stored.id)
    );
    Ok(())
}

pub fn edit_repository(
    state: &AppState,
    key: &str,
    address: Option<&str>,
    fingerprint: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> CliResult<()> {
    let repository = state.find_repository(key)?;
    let address = address
        .map(validate_address)
        .transpose()?
        .unwrap_or_else(|| repository.address.clone());
    let fingerprint =
        validate_fingerprint(fingerprint)?.unwrap_or_else(|| repository.fingerprint.clone());
    let authentication =
        credentials(username, password).unwrap_or_else(|| repository.authentication.clone());

    let edited = repository.edit(&address, &fingerprint, &authentication);
    if edited == repository {
        info!("Nothing to change for {}", Colored(Cyan, &repository.name));
        return Ok(());
    }
    RepositoryStore::update(state.db().lock().conn(), &edited)?;
    info!("Updated repository {}", Colored(Cyan, &edited.name));
    Ok(())
}

/// Flips the enabled flag. Disabling keeps the repository row but drops its
/// catalog.
pub fn set_enabled(state: &AppState, key: &str, enabled: bool) -> CliResult<()> {
    let repository = state.find_repository(key)?;
    if repository.enabled == enabled {
        info!(
            "{} is already {}",
            Colored(Cyan, &repository.name),
            if enabled { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    RepositoryStore::update(state.db().lock().conn(), &repository.enable(enabled))?;
    if !enabled {
        state.updater().await_idle();
        let stale = RepositoryStore::disabled_or_deleted(state.db().lock().conn())
            .map_err(DbError::from)?;
        state.updater().cleanup(&stale)?;
    }
    info!(
        "{} {}",
        if enabled { "Enabled" } else { "Disabled" },
        Colored(Cyan, &repository.name)
    );
    Ok(())
}

pub fn remove_repository(state: &AppState, key: &str) -> CliResult<()> {
    let repository = state.find_repository(key)?;
    RepositoryStore::mark_deleted(state.db().lock().conn(), repository.id)?;

    state.updater().await_idle();
    let stale = RepositoryStore::disabled_or_deleted(state.db().lock().conn())
        .map_err(DbError::from)?;
    state.updater().cleanup(&stale)?;
    info!("Removed repository {}", Colored(Cyan, &repository.name));
    Ok(())
}
