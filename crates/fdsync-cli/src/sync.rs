use fdsync_db::{DbError, RepositoryStore};
use fdsync_events::{EventSinkHandle, SyncReporter};
use fdsync_index::{CommitOutcome, ErrorKind, Interrupt, Repository};
use fdsync_utils::time::now_millis;
use nu_ansi_term::Color::{Cyan, Green, Red};
use tracing::{debug, error, info, warn};

use crate::{
    error::{CliError, CliResult},
    state::AppState,
    utils::{progress_enabled, sync_due, Colored},
};

/// Picks the repositories a sync run covers: the named ones, or every
/// enabled repository that is due.
fn select_repositories(
    state: &AppState,
    names: Option<&[String]>,
    force: bool,
) -> CliResult<Vec<Repository>> {
    let candidates = match names {
        Some(names) => {
            names
                .iter()
                .map(|name| state.find_repository(name))
                .collect::<CliResult<Vec<_>>>()?
        }
        None => RepositoryStore::list(state.db().lock().conn())?,
    };

    let interval = state.config().sync_interval();
    let now = now_millis();
    Ok(candidates
        .into_iter()
        .filter(|repo| {
            if !repo.enabled {
                if names.is_some() {
                    warn!("Skipping {}: repository is disabled", repo.name);
                }
                return false;
            }
            if !force && !sync_due(repo.updated, now, interval) {
                debug!("skipping {}: synced recently", repo.name);
                return false;
            }
            true
        })
        .collect())
}

/// Drops the catalogs of repositories disabled or removed since the last
/// run, then syncs the selected repositories concurrently.
pub async fn sync_repositories(
    state: &AppState,
    events: EventSinkHandle,
    names: Option<Vec<String>>,
    force: bool,
    unstable: bool,
) -> CliResult<()> {
    let stale = RepositoryStore::disabled_or_deleted(state.db().lock().conn())
        .map_err(DbError::from)?;
    state.updater().cleanup(&stale)?;

    let repositories = select_repositories(state, names.as_deref(), force)?;
    if repositories.is_empty() {
        info!("Nothing to sync");
        return Ok(());
    }

    let allow_unstable = unstable || state.config().allow_unstable();
    let interrupt = Interrupt::new();
    let watcher = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                interrupt.interrupt();
            }
        })
    };

    let mut tasks = Vec::with_capacity(repositories.len());
    for repository in repositories {
        let updater = state.updater().clone();
        let interrupt = interrupt.clone();
        let reporter = SyncReporter::new(events.clone(), repository.id, repository.name.clone());
        let task = tokio::task::spawn_blocking(move || {
            reporter.started();
            let result = updater.update(
                &repository,
                allow_unstable,
                &interrupt,
                &|stage, current, total| reporter.progress(stage, current, total),
            );
            match &result {
                Ok(outcome) => reporter.finished(matches!(outcome, CommitOutcome::Updated(_))),
                Err(err) => reporter.failed(err),
            }
            (repository, result)
        });
        tasks.push(task);
    }

    let total = tasks.len();
    let mut failed = 0;
    for task in tasks {
        let (repository, result) = task
            .await
            .map_err(|err| CliError::Custom(format!("Join handle error: {err}")))?;
        match result {
            Ok(CommitOutcome::Updated(updated)) => {
                if !progress_enabled() {
                    info!(
                        "{} {}: {}",
                        Colored(Green, "✓"),
                        Colored(Cyan, &updated.name),
                        "synced"
                    );
                }
            }
            Ok(CommitOutcome::NotModified) => {
                if !progress_enabled() {
                    info!(
                        "{} {}: {}",
                        Colored(Green, "✓"),
                        Colored(Cyan, &repository.name),
                        "up to date"
                    );
                }
            }
            Err(err) => {
                failed += 1;
                if err.kind() == ErrorKind::Cancelled {
                    debug!("sync of {} was cancelled", repository.name);
                } else if !progress_enabled() {
                    error!(
                        "{} {}: {}",
                        Colored(Red, "✗"),
                        Colored(Cyan, &repository.name),
                        err
                    );
                }
            }
        }
    }
    watcher.abort();

    if failed > 0 {
        return Err(CliError::SyncFailed {
            count: failed,
            total,
        });
    }
    Ok(())
}
