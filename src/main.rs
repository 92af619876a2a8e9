//!
//! castify admin shell
//! --------------------
//! Command-line entry point for the Castify admin client. Boots the session from
//! persisted storage, then either runs a single command (`-c`) or starts an
//! interactive shell. Configuration comes from environment variables (see
//! `castify::config`) and the flags below.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use castify::api::ApiClient;
use castify::cli::{execute, Command, Flow, HELP};
use castify::config::{timeout_from_secs, ClientConfig};
use castify::session_store::SessionStore;
use castify::shell::{AppShell, TracingNavigator, View};
use castify::storage::{FileStorage, MemoryStorage, SharedStorage};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--session-file <path> | --memory] [--timeout <secs>] [--start <path>]\n  {program} -c \"<command>\" [flags]\n\nFlags:\n  --api <url>             API base URL (env CASTIFY_API_URL, default http://localhost:5174/api)\n  --session-file <path>   where the session is persisted (env CASTIFY_SESSION_FILE)\n  --memory                keep the session in memory only\n  --timeout <secs>        per-request timeout, 0 disables (env CASTIFY_HTTP_TIMEOUT_SECS)\n  --start <path>          location to boot at (default /)\n  -c, --command <cmd>     run one command and exit\n  -h, --help              show this help\n\n{HELP}"
    );
}

struct Args {
    config: ClientConfig,
    start: String,
    command: Option<String>,
}

fn parse_args(args: &[String], mut config: ClientConfig) -> Result<Option<Args>> {
    let mut start = "/".to_string();
    let mut command = None;
    let mut i = 1;
    while i < args.len() {
        let a = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i).cloned().with_context(|| format!("{} requires a value", a))
        };
        match a {
            "--api" => config.api_url = value()?,
            "--session-file" => config.session_file = Some(PathBuf::from(value()?)),
            "--memory" => config.session_file = None,
            "--timeout" => {
                let secs = value()?.parse::<u64>().context("--timeout expects whole seconds")?;
                config.timeout = timeout_from_secs(secs);
            }
            "--start" => start = value()?,
            "-c" | "--command" => command = Some(value()?),
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unknown flag '{}'", other),
        }
        i += 1;
    }
    Ok(Some(Args { config, start, command }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let argv: Vec<String> = env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("castify").to_string();
    let Some(args) = parse_args(&argv, ClientConfig::from_env())? else {
        print_usage(&program);
        return Ok(());
    };

    let storage: SharedStorage = match &args.config.session_file {
        Some(path) => {
            let file = FileStorage::new(path);
            info!(target: "castify", "session file: {}", file.path().display());
            Arc::new(file)
        }
        None => {
            info!(target: "castify", "session kept in memory only");
            Arc::new(MemoryStorage::new())
        }
    };
    info!(
        target: "castify",
        "starting: api='{}', timeout={:?}",
        args.config.api_url, args.config.timeout
    );

    let api = Arc::new(ApiClient::from_config(&args.config, storage)?);
    let store = Arc::new(SessionStore::new(api));
    let shell = AppShell::new(store, Arc::new(TracingNavigator), &args.start);
    let view = shell.boot();

    if let Some(line) = args.command {
        let Some(cmd) = Command::parse(&line)? else { return Ok(()); };
        execute(&shell, cmd).await?;
        return Ok(());
    }

    println!("castify admin shell. Type 'help' for commands.");
    match view {
        View::Render(r) => println!("[{}] {}", r.title(), r.path()),
        View::Loading => println!("[loading]"),
    }
    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = format!("castify {}> ", shell.location());
        let line = match rl.readline(&prompt) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let cmd = match Command::parse(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => { eprintln!("error: {}", e); continue; }
        };
        // in-memory history only; password-bearing lines are never recalled
        if !cmd.is_sensitive() {
            let _ = rl.add_history_entry(line.as_str());
        }
        match execute(&shell, cmd).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}
