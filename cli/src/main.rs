mod commands;
mod logging;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use commands::Command;
use config::{BASE_URL_ENV, PathManager, Settings, load_env_file};
use livesync_core::{
    EventHub, ListProfile, LiveListView, PageFetcher, RestPageFetcher, SyncState, ViewSnapshot,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse a live-synchronized list from the terminal", long_about = None)]
struct Args {
    /// List profile to open (contacts, tickets, integrations, connections, or one from settings.toml)
    #[arg(long, short, default_value = "contacts")]
    profile: String,

    /// Backend base URL (overrides settings.toml)
    #[arg(long, env = "LIVESYNC_BASE_URL")]
    base_url: Option<String>,

    /// Directory for settings and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log file (defaults to the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, short)]
    verbose: bool,

    /// Print records as JSON lines
    #[arg(long)]
    json: bool,

    /// List the available profiles and exit
    #[arg(long)]
    list_profiles: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let args = Args::parse();

    if let Some(dir) = &args.data_dir {
        PathManager::set_data_dir(dir.clone());
    }
    let _log_guard = logging::init_logging(args.verbose, args.log_file.clone());

    let settings = Settings::load();
    if args.list_profiles {
        for name in settings.profile_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let profile = ListProfile::from_settings(&args.profile, &settings)?;
    let base_url = args
        .base_url
        .clone()
        .or_else(|| settings.resolved_base_url())
        .ok_or_else(|| {
            anyhow!(
                "No backend URL configured. Pass --base-url, set {}, or add base_url to settings.toml",
                BASE_URL_ENV
            )
        })?;

    let timeout = settings.request_timeout_secs.map(Duration::from_secs);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        RestPageFetcher::new(&base_url, &profile, timeout).context("Failed to build HTTP client")?,
    );
    tracing::info!(profile = %profile.name, %base_url, "Opening list");

    let hub = EventHub::new();
    let decoder = profile.event_decoder();
    let entity_type = profile.entity_type.clone();
    let view = LiveListView::spawn(profile, fetcher, &hub);
    let status_printer = tokio::spawn(print_state_changes(view.subscribe()));

    println!();
    println!("Type help for commands, Ctrl+D or quit to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match Command::parse(&line) {
            Ok(cmd) => cmd,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };

        match cmd {
            Command::Search(text) => view.search(text),
            Command::Filter { key, value } => view.set_filter(key, value),
            Command::Clear(key) => view.clear_filter(key),
            Command::Tags(tags) => view.set_tags(tags),
            Command::More => view.load_more(),
            Command::Scroll(metrics) => view.scrolled(metrics),
            Command::Retry => view.retry(),
            Command::Refresh => view.refresh(),
            Command::Event(raw) => {
                let decoded = serde_json::from_str::<serde_json::Value>(&raw)
                    .map_err(|e| e.to_string())
                    .and_then(|wire| decoder.decode(&wire).map_err(|e| e.to_string()));
                match decoded {
                    Ok(event) => {
                        let delivered = hub.publish(&entity_type, event);
                        tracing::debug!(delivered, "Injected push event");
                    }
                    Err(e) => println!("Invalid event: {}", e),
                }
            }
            Command::Show => print_records(&view.snapshot(), args.json)?,
            Command::Status => println!("{}", status_line(&view.snapshot())),
            Command::Help => commands::print_help(),
            Command::Quit => break,
        }
    }

    status_printer.abort();
    view.close().await;
    Ok(())
}

fn status_line(snapshot: &ViewSnapshot) -> String {
    let mut line = format!(
        "[{}] {} shown / {} loaded",
        snapshot.state,
        snapshot.records.len(),
        snapshot.total_loaded
    );
    if !snapshot.search_text.is_empty() {
        line.push_str(&format!(", search \"{}\"", snapshot.search_text));
    }
    if !snapshot.filter_tags.is_empty() {
        let tags: Vec<&str> = snapshot.filter_tags.iter().map(|t| t.as_str()).collect();
        line.push_str(&format!(", tags {}", tags.join(",")));
    }
    if !snapshot.has_more {
        line.push_str(", end of results");
    }
    if let Some(err) = &snapshot.last_error {
        line.push_str(&format!(" ({}; type retry)", err));
    }
    line
}

fn print_records(snapshot: &ViewSnapshot, json: bool) -> Result<()> {
    for record in &snapshot.records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{:>8}  {}", record.id, record.payload);
        }
    }
    println!("{}", status_line(snapshot));
    Ok(())
}

/// Report fetch state transitions as they happen
async fn print_state_changes(mut rx: watch::Receiver<ViewSnapshot>) {
    let mut last: Option<SyncState> = None;
    while rx.changed().await.is_ok() {
        let line = {
            let snapshot = rx.borrow_and_update();
            if last == Some(snapshot.state) {
                continue;
            }
            last = Some(snapshot.state);
            status_line(&snapshot)
        };
        println!("\n{}", line);
    }
}
