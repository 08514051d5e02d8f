use std::{
    env,
    sync::{Arc, PoisonError},
};

use clap::Parser;
use cli::{Args, Commands};
use error::{CliError, CliResult, ErrorContext};
use fdsync_config::config::{self, generate_default_config, get_config, CONFIG_PATH};
use fdsync_dl::http_client::configure_http_client;
use fdsync_events::{ChannelSink, EventSinkHandle, NullSink};
use fdsync_utils::path::resolve_path;
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use state::AppState;
use tracing::{info, warn};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::progress_enabled;

mod cli;
mod error;
mod logging;
mod products;
mod progress;
mod repos;
mod state;
mod sync;
mod utils;

/// Event sink for a sync run, plus the progress thread draining it when
/// progress bars are on.
fn create_event_sink() -> (EventSinkHandle, Option<ProgressGuard>) {
    if progress_enabled() {
        let (sink, receiver) = ChannelSink::new();
        (Arc::new(sink), Some(spawn_event_handler(receiver)))
    } else {
        (Arc::new(NullSink), None)
    }
}

fn parse_header(header: &str) -> CliResult<(HeaderName, HeaderValue)> {
    let invalid = || CliError::Custom(format!("Invalid header '{header}', expected 'Name: value'"));
    let (key, value) = header.split_once(':').ok_or_else(invalid)?;
    let key = key.trim().parse::<HeaderName>().map_err(|_| invalid())?;
    let value = value.trim().parse::<HeaderValue>().map_err(|_| invalid())?;
    Ok((key, value))
}

fn configure_client(args: &Args) -> CliResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| {
            Proxy::new(proxy)
                .map_err(|err| CliError::Custom(format!("Invalid proxy '{proxy}': {err}")))
        })
        .transpose()?;
    let headers = args
        .header
        .as_deref()
        .map(|headers| {
            headers
                .iter()
                .map(|h| parse_header(h))
                .collect::<CliResult<HeaderMap>>()
        })
        .transpose()?;
    let user_agent = args.user_agent.clone();

    configure_http_client(|config| {
        if let Some(proxy) = proxy {
            config.proxy = Some(proxy);
        }
        if let Some(user_agent) = user_agent {
            config.user_agent = Some(user_agent);
        }
        if let Some(headers) = headers {
            config.headers = Some(headers);
        }
    });
    Ok(())
}

async fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::set_color(false);
    }
    if args.no_progress || args.json || args.quiet {
        utils::set_progress(false);
    }

    if let Some(ref c) = args.config {
        let path = resolve_path(c)?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        *CONFIG_PATH
            .write()
            .unwrap_or_else(PoisonError::into_inner) = path;
    }

    configure_client(&args)?;

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
        }
        Commands::Env => {
            config::init()?;
            let config = get_config();
            let config_path = CONFIG_PATH
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            info!("FDSYNC_CONFIG={}", config_path.display());
            info!("FDSYNC_DB={}", config.get_db_path()?.display());
            info!("FDSYNC_CACHE={}", config.get_cache_path()?.display());
        }
        command => {
            config::init()?;
            let state = AppState::new()?;

            match command {
                Commands::Sync {
                    repo,
                    force,
                    unstable,
                } => {
                    let (events, progress_guard) = create_event_sink();
                    let result =
                        sync::sync_repositories(&state, events, repo, force, unstable).await;
                    // every sender is gone once the run returns
                    if let Some(guard) = progress_guard {
                        guard.finish();
                    }
                    progress::stop();
                    result?;
                }
                Commands::Repos => repos::list_repositories(&state)?,
                Commands::Products {
                    query,
                    repo,
                    limit,
                } => {
                    products::list_products(&state, query.as_deref(), repo.as_deref(), limit)?;
                }
                Commands::Add {
                    address,
                    fingerprint,
                    username,
                    password,
                } => {
                    if fingerprint.is_none() {
                        warn!("No fingerprint given, the first signer seen will be trusted");
                    }
                    repos::add_repository(
                        &state,
                        &address,
                        fingerprint.as_deref(),
                        username.as_deref(),
                        password.as_deref(),
                    )?;
                }
                Commands::Edit {
                    repo,
                    address,
                    fingerprint,
                    username,
                    password,
                } => {
                    repos::edit_repository(
                        &state,
                        &repo,
                        address.as_deref(),
                        fingerprint.as_deref(),
                        username.as_deref(),
                        password.as_deref(),
                    )?;
                }
                Commands::Enable {
                    repo,
                } => repos::set_enabled(&state, &repo, true)?,
                Commands::Disable {
                    repo,
                } => repos::set_enabled(&state, &repo, false)?,
                Commands::Remove {
                    repo,
                } => repos::remove_repository(&state, &repo)?,
                Commands::DefConfig | Commands::Env => unreachable!(),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    handle_cli().await.map_err(miette::Report::new)
}
