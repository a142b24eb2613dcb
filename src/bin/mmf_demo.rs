//! SimpleMMF demo - console server and client for one channel
//!
//! The server echoes every message back wrapped in `【】`; the client sends
//! each stdin line and prints the replies.
//!
//! # Usage
//!
//! ```text
//! cargo run --bin mmf_demo -- server --name Server001
//! cargo run --bin mmf_demo -- client --name Server001
//! ```
//!
//! Logging via `RUST_LOG`; `warn` when it is unset or empty.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use simplemmf::{ChannelConfig, Endpoint, ResetPolicy, Role, DEFAULT_CAPACITY};

#[derive(Parser)]
#[command(name = "mmf_demo", about = "Shared-memory channel demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Echo every client message back
    Server {
        #[command(flatten)]
        channel: ChannelArgs,

        /// Exit after this many messages (0 = run forever)
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
    /// Send stdin lines, print replies
    Client {
        #[command(flatten)]
        channel: ChannelArgs,

        /// How long to wait for each reply
        #[arg(long, default_value_t = 2000)]
        reply_timeout_ms: u64,
    },
}

#[derive(Args)]
struct ChannelArgs {
    /// Channel name, identical on both sides
    #[arg(long, default_value = "Server001")]
    name: String,

    /// Reset policy: wait-for or return
    #[arg(long, default_value_t = ResetPolicy::WaitFor)]
    policy: ResetPolicy,

    /// Shared region size in bytes
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Remove the named objects on exit
    #[arg(long)]
    unlink: bool,
}

impl ChannelArgs {
    fn config(&self, role: Role) -> ChannelConfig {
        ChannelConfig::new(self.name.clone(), role)
            .with_reset_policy(self.policy)
            .with_capacity(self.capacity)
            .with_unlink_on_drop(self.unlink)
    }
}

/// `RUST_LOG` directives as given, `warn` without them
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new("warn"),
    }
}

fn main() -> simplemmf::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Server { channel, count } => run_server(&channel, count),
        Command::Client {
            channel,
            reply_timeout_ms,
        } => run_client(&channel, Duration::from_millis(reply_timeout_ms)),
    }
}

fn run_server(args: &ChannelArgs, count: usize) -> simplemmf::Result<()> {
    let server = Endpoint::open(args.config(Role::Server))?;
    let inbox = server.subscribe();

    println!("ready {}", server.name());
    io::stdout().flush()?;

    let mut handled = 0usize;
    while let Ok(message) = inbox.recv() {
        println!("recv|{}", message);
        server.write(&format!("【{}】", message))?;
        println!("sent|【{}】", message);
        io::stdout().flush()?;

        handled += 1;
        if count != 0 && handled >= count {
            break;
        }
    }

    Ok(())
}

fn run_client(args: &ChannelArgs, reply_timeout: Duration) -> simplemmf::Result<()> {
    let client = Endpoint::open(args.config(Role::Client))?;
    let inbox = client.subscribe();

    for line in io::stdin().lock().lines() {
        let line = line?;
        client.write(&line)?;

        match inbox.recv_timeout(reply_timeout) {
            Ok(reply) => println!("{}", reply),
            Err(_) => println!("(no reply)"),
        }
        io::stdout().flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(Some("simplemmf=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            log_filter(Some("error")).max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }
}
