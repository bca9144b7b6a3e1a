use anyhow::{Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use parley::repl::{self, Command, HELP};
use parley_core::clock::{system_clock, SkewedClock, WallClock};
use parley_core::transport::UdpTransport;
use parley_core::{Node, NodeEvent, ParleyConfig, ParleyConfigBuilder, ParleyError};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Peer-to-peer group chat with an elected coordinator", long_about = None)]
struct Cli {
    /// UDP port for direct messages
    #[arg(long)]
    port: Option<u16>,

    /// Display name (defaults to node:<port>)
    #[arg(long)]
    name: Option<String>,

    /// Local address to bind and send multicast from
    #[arg(long)]
    host: Option<Ipv4Addr>,

    /// TOML configuration file; PARLEY_* variables are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shift this node's wall clock by the given seconds, to watch clock sync work
    #[arg(long, allow_negative_numbers = true)]
    clock_skew: Option<f64>,
}

impl Cli {
    fn load_config(&self) -> Result<ParleyConfig> {
        let base = match &self.config {
            Some(path) => ParleyConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ParleyConfig::from_env().context("invalid PARLEY_* environment")?,
        };

        let mut builder = ParleyConfigBuilder::from_config(base);
        if let Some(port) = self.port {
            builder = builder.bind_port(port);
        }
        if let Some(host) = self.host {
            builder = builder.bind_host(host);
        }
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        Ok(builder.build()?)
    }

    fn clock(&self) -> Arc<dyn WallClock> {
        match self.clock_skew {
            Some(skew) if skew != 0.0 => Arc::new(SkewedClock::new(skew)),
            _ => system_clock(),
        }
    }
}

const DEFAULT_LOG_FILTER: &str = "parley=info,parley_core=info";

/// `RUST_LOG` wins outright when it parses; otherwise info for our crates
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they do not interleave with the chat
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let transport = UdpTransport::bind(&config.node, &config.network)
        .with_context(|| format!("failed to bind {}", config.node.bind_addr()))?;
    let node = Node::with_clock(config, Arc::new(transport), cli.clock());

    let events = node.subscribe();
    let printer = tokio::spawn(print_events(events));

    let id = node.join().await.context("failed to join the group")?;
    println!("{} connected with id {}. Type 'help' for commands.", node.name(), id);

    let result = run_console(&node).await;
    if node.is_running() {
        node.leave().await.ok();
    }
    printer.abort();
    result
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<NodeEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = repl::render_event(&event) {
                    println!("{}", line);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Console fell behind, {} events skipped", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Rejections go to the prompt; anything else is a fault worth logging
fn report(err: ParleyError) {
    if err.is_user_facing() {
        println!("error: {}", err);
    } else {
        tracing::warn!("Command failed: {}", err);
        println!("error: command failed, see log");
    }
}

async fn run_console(node: &Node) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while node.is_running() {
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty | Command::Help => println!("{}", HELP),
            Command::Usage(usage) => println!("usage: {}", usage),
            Command::History => println!("{}", repl::render_history(&node.history())),
            Command::Peers => {
                let coordinator = node.coordinator().map(|c| c.id);
                println!("{}", repl::render_peers(&node.peers(), node.id(), coordinator));
            }
            Command::Time => println!("{}", repl::render_time(&node.time_status())),
            Command::Status => {
                println!("{}", repl::render_status(&node.status()));
                if let Some(vote) = node.vote_status() {
                    println!("{}", repl::render_vote(&vote));
                }
            }
            Command::Kick(name) => {
                if let Err(e) = node.start_kick_vote(&name).await {
                    report(e);
                }
            }
            Command::Vote(vote) => {
                if let Err(e) = node.cast_vote(vote).await {
                    report(e);
                }
            }
            Command::Resync => match node.resync().await {
                Ok(()) => println!("resync requested"),
                Err(e) => report(e),
            },
            Command::Leave => break,
            Command::Chat(text) => {
                if let Err(e) = node.send_chat(text).await {
                    report(e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_levels() {
        let filter = log_filter(Some("parley_core=debug")).to_string();
        assert!(filter.contains("parley_core=debug"));
        assert!(!filter.contains("parley_core=info"));
    }

    #[test]
    fn test_default_levels_without_rust_log() {
        for unset in [None, Some(""), Some("  ")] {
            let filter = log_filter(unset).to_string();
            assert!(filter.contains("parley=info"));
            assert!(filter.contains("parley_core=info"));
        }
    }
}
