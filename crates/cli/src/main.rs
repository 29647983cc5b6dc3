//! qpledger - command-line access to a ledger database
//!
//! Every command opens the database directory, runs one call and prints the
//! result as JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qpledger_core::{CancelToken, CompositeKey, FactorVector, LedgerEntry};
use qpledger_engine::{Database, QueryMode};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// qpledger - embedded ledger store
#[derive(Parser, Debug)]
#[command(name = "qpledger")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database directory
    #[arg(long, default_value = "qpledger-data")]
    db: PathBuf,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Entries ===
    /// Write an entry
    Write {
        /// Key as namespace:identifier
        key: CompositeKey,
        /// Entry text
        text: String,
        /// Factor as prime=delta; repeatable
        #[arg(short, long = "factor", value_parser = parse_factor)]
        factors: Vec<(u32, f64)>,
    },

    /// Read an entry
    Read {
        /// Key as namespace:identifier
        key: CompositeKey,
    },

    /// List entries whose key starts with a prefix
    #[command(alias = "ls")]
    List {
        /// Key prefix; empty lists everything
        #[arg(default_value = "")]
        prefix: String,
        /// Maximum entries
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Ledger writes after a sequence number
    Changes {
        /// Exclusive lower bound
        #[arg(default_value = "0")]
        since: u64,
        /// Maximum changes
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Entries carrying every given slot prime
    Factors {
        /// Slot primes to match
        #[arg(required = true)]
        primes: Vec<u32>,
        /// Maximum entries
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    // === Transform ===
    /// Rotate an entry's factor vector
    Rotate {
        /// Key as namespace:identifier
        key: CompositeKey,
        /// Rotation angle in radians
        #[arg(allow_negative_numbers = true)]
        angle: f64,
        /// Rotation axis as x,y,z
        #[arg(long, value_parser = parse_axis, default_value = "0,0,1")]
        axis: [f64; 3],
    },

    // === Index ===
    /// Rebuild the token index
    Rebuild,

    /// Query the token index
    Query {
        /// Tokens to match
        #[arg(required = true)]
        tokens: Vec<String>,
        /// any or all
        #[arg(short, long, default_value = "any")]
        mode: QueryMode,
        /// Maximum keys
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    // === Counters ===
    /// Add to a raw counter
    Merge {
        /// Counter name
        counter: String,
        /// Non-negative increment
        delta: u64,
    },

    /// Credit an entity
    Credit {
        /// Entity name
        entity: String,
        /// Amount
        amount: u64,
    },

    /// Debit an entity
    Debit {
        /// Entity name
        entity: String,
        /// Amount
        amount: u64,
    },

    /// Show an entity's credits, debits and balance
    Tally {
        /// Entity name
        entity: String,
    },

    /// List counters by name prefix
    Counters {
        /// Name prefix
        #[arg(default_value = "")]
        prefix: String,
        /// Maximum counters
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
}

fn parse_factor(s: &str) -> std::result::Result<(u32, f64), String> {
    let (prime, delta) = s
        .split_once('=')
        .ok_or_else(|| format!("expected prime=delta, got '{s}'"))?;
    let prime = prime
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad prime '{prime}': {e}"))?;
    let delta = delta
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad delta '{delta}': {e}"))?;
    Ok((prime, delta))
}

fn parse_axis(s: &str) -> std::result::Result<[f64; 3], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("bad axis component '{p}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    <[f64; 3]>::try_from(parts).map_err(|v| format!("axis needs 3 components, got {}", v.len()))
}

fn entry_json(entry: &LedgerEntry) -> Value {
    let factors: serde_json::Map<String, Value> = entry
        .factors()
        .iter()
        .map(|(prime, delta)| (prime.to_string(), json!(delta)))
        .collect();
    json!({
        "key": entry.key().to_string(),
        "text": entry.text(),
        "factors": factors,
        "created_at": entry.created_at().as_secs_f64(),
        "checksum": entry.checksum().to_hex(),
    })
}

fn open(path: &Path) -> Result<Database> {
    let db = Database::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    debug!(path = %path.display(), durable = db.is_durable(), "Database opened");
    Ok(db)
}

fn run(db: &Database, command: Commands) -> Result<Value> {
    let out = match command {
        Commands::Write { key, text, factors } => {
            let factors = FactorVector::from_pairs(factors)?;
            let receipt = db.ledger().write_with_receipt(&LedgerEntry::new(key.clone(), text, factors))?;
            json!({
                "key": key.to_string(),
                "checksum": receipt.checksum.to_hex(),
                "seq": receipt.seq,
            })
        }
        Commands::Read { key } => entry_json(&db.read(&key)?),
        Commands::List { prefix, limit } => {
            let entries = db.list_by_prefix(&prefix, limit)?;
            Value::Array(entries.iter().map(entry_json).collect())
        }
        Commands::Factors { primes, limit } => {
            let hits = db.query_factors(&primes, limit)?;
            Value::Array(
                hits.iter()
                    .map(|m| json!({ "key": m.key.to_string(), "weight": m.weight }))
                    .collect(),
            )
        }
        Commands::Changes { since, limit } => {
            let changes = db.ledger().changes_since(since, limit)?;
            Value::Array(
                changes
                    .into_iter()
                    .map(|(seq, key)| json!({ "seq": seq, "key": key.to_string() }))
                    .collect(),
            )
        }
        Commands::Rotate { key, angle, axis } => {
            let r = db.rotate(&key, axis, angle)?;
            json!({
                "key": key.to_string(),
                "original_checksum": r.original_checksum.to_hex(),
                "rotated_checksum": r.rotated_checksum.to_hex(),
                "energy_cycles": r.energy_cycles,
                "seq": r.seq,
            })
        }
        Commands::Rebuild => {
            let s = db.rebuild(&CancelToken::new())?;
            json!({
                "entries_indexed": s.entries_indexed,
                "tokens_indexed": s.tokens_indexed,
                "postings_written": s.postings_written,
                "snapshot_seq": s.snapshot_seq,
                "digest": format!("{:016x}", db.index().snapshot().digest()),
            })
        }
        Commands::Query { tokens, mode, limit } => {
            let r = db.query(&tokens, mode, limit)?;
            json!({
                "mode": mode.to_string(),
                "keys": r.keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "building": r.building,
                "stale": r.stale,
                "snapshot_seq": r.snapshot_seq,
            })
        }
        Commands::Merge { counter, delta } => {
            json!({ "counter": counter, "value": db.merge(&counter, delta)? })
        }
        Commands::Credit { entity, amount } => {
            json!({ "entity": entity, "credits": db.ethics().credit(&entity, amount)? })
        }
        Commands::Debit { entity, amount } => {
            json!({ "entity": entity, "debits": db.ethics().debit(&entity, amount)? })
        }
        Commands::Tally { entity } => {
            let t = db.ethics().tally(&entity)?;
            json!({
                "entity": entity,
                "credits": t.credits,
                "debits": t.debits,
                // i128 is outside JSON's integer range in general
                "balance": t.balance.to_string(),
            })
        }
        Commands::Counters { prefix, limit } => {
            let counters = db.ethics().counters(&prefix, limit)?;
            Value::Object(
                counters
                    .into_iter()
                    .map(|(name, value)| (name, json!(value)))
                    .collect(),
            )
        }
    };
    Ok(out)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let db = open(&cli.db)?;
    let out = run(&db, cli.command)?;
    db.flush().context("flush failed")?;
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
