//! Cortex command-line host.
//!
//! Provides the `cortex` binary for working with a brain stored in a graph
//! file: create one, run or solve code in it, inspect it, and move it between
//! the SQLite and JSON formats.
//!
//! Reads configuration from:
//! - `--config <file.json>`: an [`EngineConfig`] (defaults for missing fields)
//! - `CORTEX_DB_PATH`: graph file used when `--db` is absent (default
//!   "cortex.db"; a `.json` extension selects the JSON backend)
//! - `CORTEX_LOG`: tracing filter (default "info")

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cortex_core::{Brain, CancelToken, NeuronId};
use cortex_exec::{EngineConfig, ExecError, ProcessorPool};
use cortex_storage::{GraphStore, JsonFileStore, SqliteStore, StorageError};

/// Cortex brain engine.
#[derive(Parser)]
#[command(name = "cortex", about = "Cortex brain engine and tools")]
struct Cli {
    /// Graph file to operate on.
    #[arg(long, global = true, env = "CORTEX_DB_PATH", default_value = "cortex.db")]
    db: String,

    /// Engine configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create a graph file holding a fresh brain.
    Init {
        /// Replace an existing brain.
        #[arg(long)]
        force: bool,
    },

    /// Run code clusters (or single expressions) by neuron id.
    Run {
        /// Root neurons to run, concurrently.
        #[arg(required = true)]
        roots: Vec<u64>,

        /// Write the resulting changes back to the graph file.
        #[arg(long)]
        save: bool,
    },

    /// Solve neurons through the rules attached to their link meanings.
    Solve {
        #[arg(required = true)]
        neurons: Vec<u64>,

        /// Write the resulting changes back to the graph file.
        #[arg(long)]
        save: bool,
    },

    /// Print counts and pool statistics as JSON.
    Stats,

    /// Copy the brain into a JSON graph file.
    Export { output: PathBuf },

    /// Replace the brain with the contents of a JSON graph file.
    Import { input: PathBuf },
}

/// Exit codes: 0 = success, 1 = execution error, 2 = configuration error,
/// 3 = storage error.
const EXIT_EXEC: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_STORAGE: i32 = 3;

fn main() {
    let filter = EnvFilter::try_from_env("CORTEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(code) => process::exit(code),
    };

    let exit_code = match cli.command {
        Commands::Init { force } => run_init(&cli.db, force, &config),
        Commands::Run { roots, save } => run_roots(&cli.db, &roots, save, &config),
        Commands::Solve { neurons, save } => run_solve(&cli.db, &neurons, save, &config),
        Commands::Stats => run_stats(&cli.db, &config),
        Commands::Export { output } => run_export(&cli.db, &output, &config),
        Commands::Import { input } => run_import(&cli.db, &input, &config),
    };
    process::exit(exit_code);
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, i32> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    EngineConfig::load(path).map_err(|e| {
        eprintln!("Error: {}: {}", path.display(), e);
        EXIT_CONFIG
    })
}

/// Opens the backend matching the file extension.
fn open_store(path: &str) -> Result<Box<dyn GraphStore>, StorageError> {
    if Path::new(path).extension().is_some_and(|ext| ext == "json") {
        Ok(Box::new(JsonFileStore::new(path)))
    } else {
        Ok(Box::new(SqliteStore::new(path)?))
    }
}

/// Opens the store and loads its brain, or reports why not.
fn load(path: &str, config: &EngineConfig) -> Result<(Box<dyn GraphStore>, Arc<Brain>), i32> {
    let store = open_store(path).map_err(|e| storage_failure(path, e))?;
    let brain = store
        .load_brain(config.brain.clone(), &CancelToken::new())
        .map_err(|e| storage_failure(path, e))?;
    // Loading is the baseline for incremental saves.
    brain.take_changes().map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_EXEC
    })?;
    Ok((store, Arc::new(brain)))
}

fn storage_failure(path: &str, e: StorageError) -> i32 {
    eprintln!("Error: graph file '{}': {}", path, e);
    EXIT_STORAGE
}

fn save_changes(store: &mut dyn GraphStore, brain: &Brain, path: &str) -> i32 {
    let changes = match brain.take_changes() {
        Ok(changes) => changes,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_EXEC;
        }
    };
    match store.save_changes(&changes) {
        Ok(()) => 0,
        Err(e) => storage_failure(path, e),
    }
}

/// Execute the init subcommand.
fn run_init(path: &str, force: bool, config: &EngineConfig) -> i32 {
    let mut store = match open_store(path) {
        Ok(store) => store,
        Err(e) => return storage_failure(path, e),
    };
    if !force {
        match store.neuron_count() {
            Ok(0) => {}
            Ok(n) => {
                eprintln!("Error: '{}' already holds a brain of {} neurons (use --force)", path, n);
                return EXIT_STORAGE;
            }
            Err(e) => return storage_failure(path, e),
        }
    }
    let brain = Brain::with_config(config.brain.clone());
    if let Err(e) = store.save_brain(&brain, &CancelToken::new()) {
        return storage_failure(path, e);
    }
    println!("{}", serde_json::json!({ "path": path, "neurons": brain.neuron_count() }));
    0
}

/// Execute the run subcommand.
fn run_roots(path: &str, roots: &[u64], save: bool, config: &EngineConfig) -> i32 {
    let (mut store, brain) = match load(path, config) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let pool = ProcessorPool::from_engine_config(Arc::clone(&brain), config);
    let roots: Vec<NeuronId> = roots.iter().map(|&id| NeuronId(id)).collect();
    let results = pool.run_many(&roots, &CancelToken::new());

    let mut failed = false;
    let report: Vec<serde_json::Value> = roots
        .iter()
        .zip(&results)
        .map(|(root, result)| match result {
            Ok(values) => serde_json::json!({
                "root": root.0,
                "result": values.iter().map(|id| id.0).collect::<Vec<_>>(),
            }),
            Err(e) => {
                failed = true;
                serde_json::json!({ "root": root.0, "error": e.to_string() })
            }
        })
        .collect();
    print_json(&serde_json::Value::Array(report));

    if save {
        let code = save_changes(store.as_mut(), &brain, path);
        if code != 0 {
            return code;
        }
    }
    if failed {
        EXIT_EXEC
    } else {
        0
    }
}

/// Execute the solve subcommand.
fn run_solve(path: &str, neurons: &[u64], save: bool, config: &EngineConfig) -> i32 {
    let (mut store, brain) = match load(path, config) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let pool = ProcessorPool::from_engine_config(Arc::clone(&brain), config);
    let outcome: Result<Vec<String>, ExecError> = pool.acquire().and_then(|mut processor| {
        for &id in neurons {
            processor.solve(NeuronId(id))?;
        }
        Ok(processor.log().to_vec())
    });
    let log = match outcome {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error: solve failed: {}", e);
            return EXIT_EXEC;
        }
    };
    print_json(&serde_json::json!({ "solved": neurons, "log": log }));

    if save {
        return save_changes(store.as_mut(), &brain, path);
    }
    0
}

/// Execute the stats subcommand.
fn run_stats(path: &str, config: &EngineConfig) -> i32 {
    let (_store, brain) = match load(path, config) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let ids = brain.factories().ids.stats();
    let locks = brain.lock_manager().stats();
    print_json(&serde_json::json!({
        "neurons": brain.neuron_count(),
        "links": brain.link_count(),
        "active_timers": brain.active_timers().len(),
        "id_buffers": {
            "checkouts": ids.checkouts,
            "recycled": ids.recycled,
            "allocated": ids.allocated,
            "idle": ids.idle,
        },
        "locks": {
            "acquired": locks.acquired,
            "timeouts": locks.timeouts,
            "rejected": locks.rejected,
        },
    }));
    0
}

/// Execute the export subcommand.
fn run_export(path: &str, output: &Path, config: &EngineConfig) -> i32 {
    let (_store, brain) = match load(path, config) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let mut target = JsonFileStore::new(output);
    match target.save_brain(&brain, &CancelToken::new()) {
        Ok(()) => 0,
        Err(e) => storage_failure(&output.display().to_string(), e),
    }
}

/// Execute the import subcommand.
fn run_import(path: &str, input: &Path, config: &EngineConfig) -> i32 {
    let source = JsonFileStore::new(input);
    let brain = match source.load_brain(config.brain.clone(), &CancelToken::new()) {
        Ok(brain) => brain,
        Err(e) => return storage_failure(&input.display().to_string(), e),
    };
    let mut store = match open_store(path) {
        Ok(store) => store,
        Err(e) => return storage_failure(path, e),
    };
    match store.save_brain(&brain, &CancelToken::new()) {
        Ok(()) => 0,
        Err(e) => storage_failure(path, e),
    }
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}
