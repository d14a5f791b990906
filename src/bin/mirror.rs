//! Line-oriented mirrorback driver.
//!
//! Reads one reflection per stdin line for a single user and prints one
//! JSON result per line.
//!
//! # Usage
//!
//! ```bash
//! mirror <user_id> [--config path/to/mirror.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: tracing filter (default: "info,mirrorback=debug")
//! - `MIRROR_LOOP_THRESHOLD`, `MIRROR_LOOP_WINDOW`, `MIRROR_PROVIDER_TIMEOUT_SECS`
//! - provider API keys, as named by each provider's `api_key_env`

use std::io::Write;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};

use mirrorback::{MirrorConfig, Orchestrator};

struct Args {
    user_id: String,
    config: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut user_id = None;
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(args.next().context("--config needs a path")?);
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other if user_id.is_none() => user_id = Some(other.to_string()),
            other => bail!("unexpected argument {}", other),
        }
    }
    Ok(Args {
        user_id: user_id.context("usage: mirror <user_id> [--config path]")?,
        config,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mirrorback=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => MirrorConfig::from_yaml_file(path)?,
        None => MirrorConfig::default(),
    };
    config.apply_env();

    let orchestrator = Orchestrator::new(config).context("invalid configuration")?;
    tracing::info!(
        "mirrorback {} ready for user {} ({} remote backend(s))",
        mirrorback::VERSION,
        args.user_id,
        orchestrator.chain().entries().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let stdout = std::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match orchestrator.submit_reflection(&args.user_id, &line).await {
            Ok(result) => {
                let mut out = stdout.lock();
                serde_json::to_writer(&mut out, &result)?;
                writeln!(out)?;
            }
            Err(e) => tracing::error!("reflection rejected: {}", e),
        }
    }
    Ok(())
}
