//! fleetvault CLI: snapshot, restore and retention for the HR/fleet database.
//!
//! `fleetvault [--config PATH] [--db PATH] [--json] COMMAND`
//!
//! Exit codes: 0 on success, 1 on an error that stopped the command, 2 when
//! a restore finished with failed rows or stopped early, or a snapshot did
//! not verify.

mod commands;
mod format;

use std::path::{Path, PathBuf};
use std::process;

use clap::ArgMatches;
use fleetvault_core::EntityKind;
use fleetvault_durability::{apply_retention, read_snapshot, RetentionPolicy, SnapshotWriter};
use fleetvault_engine::{
    table_stats, verify_snapshot, ConflictPolicy, FleetvaultConfig, RestoreEngine, RestoreOptions,
    SnapshotSerializer, CONFIG_FILE_NAME,
};
use fleetvault_storage::SqliteStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{
    format_error, format_restore_summary, format_retention_report, format_snapshot_info,
    format_table_stats, format_verify_report, OutputMode,
};

/// Exit code of a command that ran to the end but found problems
const EXIT_INCOMPLETE: i32 = 2;

fn main() {
    let matches = build_cli().get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(None);
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(1);
        }
    };
    init_tracing(config.log_filter.as_deref());

    let result = match matches.subcommand() {
        Some(("snapshot", sub)) => run_snapshot(sub, &config, output_mode),
        Some(("restore", sub)) => run_restore(sub, &config, output_mode),
        Some(("verify", sub)) => run_verify(sub, output_mode),
        Some(("stats", _)) => run_stats(&config, output_mode),
        Some(("retention", sub)) => run_retention(sub, &config, output_mode),
        Some(("init", sub)) => run_init(sub, &config, output_mode),
        _ => Err("no command given".to_string()),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(1);
        }
    }
}

/// Install the tracing subscriber: `RUST_LOG`, else the config filter,
/// else `info`. Logs go to stderr so `--json` output stays parseable.
fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Load the config file and apply the global `--db` override.
///
/// An explicit `--config` must exist; the default path is optional.
fn load_config(matches: &ArgMatches) -> Result<FleetvaultConfig, String> {
    let path = config_path(matches);
    let mut config = if matches.get_one::<String>("config").is_some() {
        FleetvaultConfig::from_file(&path)
    } else {
        FleetvaultConfig::load_or_default(&path)
    }
    .map_err(|e| e.to_string())?;

    if let Some(db) = matches.get_one::<String>("db") {
        config.database = PathBuf::from(db);
    }
    Ok(config)
}

fn open_store(config: &FleetvaultConfig) -> Result<SqliteStore, String> {
    debug!(target: "fleetvault::storage", path = %config.database.display(), "Opening database");
    SqliteStore::open(&config.database).map_err(|e| {
        format!(
            "Failed to open database '{}': {}",
            config.database.display(),
            e
        )
    })
}

fn snapshot_dir(sub: &ArgMatches, config: &FleetvaultConfig) -> PathBuf {
    sub.get_one::<String>("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.snapshot_dir.clone())
}

fn parse_entities(sub: &ArgMatches) -> Result<Vec<EntityKind>, String> {
    sub.get_many::<String>("entities")
        .into_iter()
        .flatten()
        .map(|name| name.trim().parse::<EntityKind>().map_err(|e| e.to_string()))
        .collect()
}

fn run_snapshot(
    sub: &ArgMatches,
    config: &FleetvaultConfig,
    mode: OutputMode,
) -> Result<i32, String> {
    let entities = parse_entities(sub)?;
    let store = open_store(config)?;
    let writer = SnapshotWriter::new(snapshot_dir(sub, config)).map_err(|e| e.to_string())?;
    writer.cleanup_temp_files().map_err(|e| e.to_string())?;

    let mut serializer = SnapshotSerializer::new(&store);
    if let Some(source) = sub.get_one::<String>("source").or(config.source.as_ref()) {
        serializer = serializer.with_source(source.clone());
    }
    let info = serializer
        .write_snapshot(&entities, &writer)
        .map_err(|e| e.to_string())?;
    println!("{}", format_snapshot_info(&info, mode));
    Ok(0)
}

fn run_restore(
    sub: &ArgMatches,
    config: &FleetvaultConfig,
    mode: OutputMode,
) -> Result<i32, String> {
    let policy = match sub.get_one::<String>("policy") {
        Some(s) => s.parse::<ConflictPolicy>(),
        None => config.conflict_policy(),
    }
    .map_err(|e| e.to_string())?;
    let options = RestoreOptions::with_policy(policy)
        .dry_run(sub.get_flag("dry-run") || config.restore.dry_run);

    let path = sub
        .get_one::<String>("path")
        .map(PathBuf::from)
        .ok_or_else(|| "missing snapshot path".to_string())?;
    let store = open_store(config)?;
    let summary = RestoreEngine::new(&store, options)
        .restore_file(&path)
        .map_err(|e| e.to_string())?;

    println!("{}", format_restore_summary(&summary, mode));
    Ok(if summary.is_complete() { 0 } else { EXIT_INCOMPLETE })
}

fn run_verify(sub: &ArgMatches, mode: OutputMode) -> Result<i32, String> {
    let path = sub
        .get_one::<String>("path")
        .map(PathBuf::from)
        .ok_or_else(|| "missing snapshot path".to_string())?;
    let document = read_snapshot(&path).map_err(|e| e.to_string())?;
    let report = verify_snapshot(&document).map_err(|e| e.to_string())?;
    println!("{}", format_verify_report(&report, mode));
    Ok(if report.is_ok() { 0 } else { EXIT_INCOMPLETE })
}

fn run_stats(config: &FleetvaultConfig, mode: OutputMode) -> Result<i32, String> {
    let store = open_store(config)?;
    let stats = table_stats(&store).map_err(|e| e.to_string())?;
    println!("{}", format_table_stats(&stats, mode));
    Ok(0)
}

fn run_retention(
    sub: &ArgMatches,
    config: &FleetvaultConfig,
    mode: OutputMode,
) -> Result<i32, String> {
    let max_count = sub
        .get_one::<usize>("max-count")
        .copied()
        .or(config.retention.max_count);
    let max_age_days = sub
        .get_one::<u32>("max-age-days")
        .copied()
        .or(config.retention.max_age_days);
    let policy =
        RetentionPolicy::from_limits(max_count, max_age_days).map_err(|e| e.to_string())?;

    let dir = snapshot_dir(sub, config);
    let report = apply_retention(&dir, &policy).map_err(|e| e.to_string())?;
    println!("{}", format_retention_report(&report, mode));
    Ok(0)
}

fn run_init(sub: &ArgMatches, config: &FleetvaultConfig, mode: OutputMode) -> Result<i32, String> {
    let path = config_path(sub);
    let created = FleetvaultConfig::write_default_if_missing(&path).map_err(|e| e.to_string())?;
    open_store(config)?;
    std::fs::create_dir_all(&config.snapshot_dir).map_err(|e| {
        format!(
            "Failed to create snapshot directory '{}': {}",
            config.snapshot_dir.display(),
            e
        )
    })?;
    print_init(&path, created, config, mode);
    Ok(0)
}

fn print_init(path: &Path, created: bool, config: &FleetvaultConfig, mode: OutputMode) {
    match mode {
        OutputMode::Json => println!(
            "{}",
            serde_json::json!({
                "config": path.display().to_string(),
                "config_created": created,
                "database": config.database.display().to_string(),
                "snapshot_dir": config.snapshot_dir.display().to_string(),
            })
        ),
        OutputMode::Human => {
            if created {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists, left unchanged", path.display());
            }
            println!("Database ready at {}", config.database.display());
        }
    }
}
