//! `evlist` binary: replays a sequence of snapshots through a managed list.
//!
//! Usage: `evlist <snapshots.json> [config.toml]`
//!
//! The input is a JSON array of snapshots, each an array of strings. The
//! first snapshot is the initial load and emits nothing; every later one
//! is applied with `update_all`, and each resulting change event is printed
//! to stdout as one JSON line.

use std::io::Write;

use evlist_core::{listener_fn, ListEvent};
use evlist_host::{config, factory_from_config, CategoryRegistry, CollectionType, HostError};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(2)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("EVLIST_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn print_event(event: &ListEvent<String>) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, sequence = event.sequence(), "failed to encode list event");
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}") {
        tracing::warn!(error = %e, "failed to write list event");
    }
}

fn run(snapshots_path: &str, config: &config::Config) -> Result<(), HostError> {
    let contents = std::fs::read_to_string(snapshots_path)?;
    let snapshots: Vec<Vec<String>> = serde_json::from_str(&contents)?;

    let registry = CategoryRegistry::new();
    let factory = factory_from_config::<String>(&config.lists, &registry)?;
    let collection = CollectionType::new(factory);

    let list = collection.instantiate_managed();
    list.add_listener(listener_fn(print_event));

    let mut remaining = snapshots.into_iter();
    list.begin_initialization();
    if let Some(initial) = remaining.next() {
        let loaded = list.inject_loaded_state(initial)?;
        tracing::info!(loaded, "initial snapshot loaded");
    }
    list.end_initialization();

    for (step, snapshot) in remaining.enumerate() {
        let changed = list.update_all(&snapshot)?;
        tracing::info!(step = step + 1, changed, len = snapshot.len(), "snapshot applied");
    }

    tracing::info!(
        final_len = list.read().len(),
        events = list.publisher().last_sequence(),
        "replay finished"
    );
    Ok(())
}

fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("evlist.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; evlist cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let Some(snapshots_path) = std::env::args().nth(1) else {
        tracing::error!("usage: evlist <snapshots.json> [config.toml]");
        std::process::exit(2);
    };

    if let Err(e) = run(&snapshots_path, &config) {
        tracing::error!(error = %e, path = %snapshots_path, "replay failed");
        std::process::exit(1);
    }
}
