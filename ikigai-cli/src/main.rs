//! Process entry point for `ikigai`: loads config and credentials, opens the
//! rotating conversation log and (if configured) the session store, opens
//! the terminal, builds the REPL, and runs it to completion (spec §6 "CLI").
//!
//! No positional arguments or flags are parsed here (spec §1 "command-line
//! argument parsing" is an external collaborator out of scope for this
//! crate; spec §6 "recognized flags are loaded from config").

mod log_format;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use ikigai_config::Config;
use ikigai_core::logger::Logger;
use ikigai_core::repl::{NoopToolExecutor, Repl, ToolExecutor};
use ikigai_core::session::Store;
use ikigai_core::terminal::Terminal;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ikigai: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let _trace_guard = logging::init(&cwd)?;

    let config_dir = ikigai_config::ikigai_config_dir()?;
    let config = ikigai_config::load_config(&config_dir)?;
    let credentials = ikigai_config::load_credentials(&config_dir);
    let logger = Logger::init(&cwd)?;
    let store = open_store(&config)?;

    let terminal = Terminal::open()?;
    let tool_executor: Arc<dyn ToolExecutor> = Arc::new(NoopToolExecutor);

    let mut repl = Repl::new(terminal, config, credentials, logger, tool_executor, store)?;
    repl.run().await?;
    Ok(())
}

/// Opens the relational store at `config.db_path`, expanding a leading `~`
/// and creating parent directories as needed (spec §4.16 "if a DB connection
/// string is configured"). `None` runs with no session persistence or
/// `/fork` history — a DB connection failure here is fatal (spec §7 "On DB
/// errors during startup").
fn open_store(config: &Config) -> Result<Option<Store>, Box<dyn std::error::Error>> {
    let Some(raw) = &config.db_path else {
        return Ok(None);
    };
    let path: PathBuf = ikigai_config::expand_tilde(raw)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Some(Store::open(&path)?))
}
