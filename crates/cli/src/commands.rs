//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("fleetvault")
        .about("Snapshot, restore and retention for the HR and fleet database")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file (default: ./fleetvault.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .help("SQLite database path (overrides config)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_snapshot())
        .subcommand(build_restore())
        .subcommand(build_verify())
        .subcommand(build_stats())
        .subcommand(build_retention())
        .subcommand(build_init())
}

fn snapshot_dir_arg() -> Arg {
    Arg::new("dir")
        .long("dir")
        .help("Snapshot directory (overrides config)")
}

fn build_snapshot() -> Command {
    Command::new("snapshot")
        .about("Write a snapshot of the database")
        .arg(
            Arg::new("entities")
                .long("entities")
                .help("Comma-separated entity types (default: all)")
                .value_delimiter(','),
        )
        .arg(snapshot_dir_arg())
        .arg(
            Arg::new("source")
                .long("source")
                .help("Source identifier recorded in the snapshot"),
        )
}

fn build_restore() -> Command {
    Command::new("restore")
        .about("Restore a snapshot into the database")
        .arg(
            Arg::new("path")
                .help("Snapshot file")
                .required(true),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .help("skip, overwrite or abort-on-error (overrides config)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Report what would happen without writing")
                .action(ArgAction::SetTrue),
        )
}

fn build_verify() -> Command {
    Command::new("verify")
        .about("Check a snapshot file without touching the database")
        .arg(
            Arg::new("path")
                .help("Snapshot file")
                .required(true),
        )
}

fn build_stats() -> Command {
    Command::new("stats").about("Show row counts per entity type")
}

fn build_retention() -> Command {
    Command::new("retention")
        .about("Delete old snapshots")
        .arg(snapshot_dir_arg())
        .arg(
            Arg::new("max-count")
                .long("max-count")
                .help("Keep at most this many snapshots")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-age-days")
                .long("max-age-days")
                .help("Delete snapshots older than this many days")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn build_init() -> Command {
    Command::new("init").about("Write a default fleetvault.toml and create the schema")
}
