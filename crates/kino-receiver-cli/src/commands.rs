//! CLI command implementations

use crate::output::format_outcome;
use anyhow::Context;
use kino_receiver::{ErrorResult, LoadCommand, LoadOutcome, Receiver, ReceiverConfig};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Config file (or defaults) with environment overrides applied
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ReceiverConfig> {
    let mut config = match path {
        Some(path) => ReceiverConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ReceiverConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// Assemble a load command from CLI arguments
pub fn build_command(
    content_ref: Option<String>,
    mime_type: Option<String>,
    json: Option<String>,
) -> anyhow::Result<LoadCommand> {
    if let Some(json) = json {
        return serde_json::from_str(&json).context("parsing --command");
    }
    Ok(LoadCommand {
        content_ref,
        mime_type,
        ..Default::default()
    })
}

/// Build the receiver and fire the environment-ready event
async fn start(config: ReceiverConfig) -> anyhow::Result<Receiver> {
    let receiver = Receiver::builder(config).build()?;

    // Loads are still answered (as LoadFailed) when the engine cannot start
    if let Err(e) = receiver.on_environment_ready().await {
        error!(error = %e, "Engine initialization failed");
    }
    Ok(receiver)
}

/// Answer one load command
pub async fn load(config: ReceiverConfig, command: LoadCommand, format: &str) -> anyhow::Result<()> {
    let receiver = start(config).await?;
    let outcome = receiver.handle_load(command).await;
    println!("{}", format_outcome(&outcome, format));

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Answer load commands from stdin until EOF
pub async fn serve(config: ReceiverConfig, format: &str) -> anyhow::Result<()> {
    let receiver = start(config).await?;
    info!("Waiting for load commands on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answered = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome: LoadOutcome = match serde_json::from_str::<LoadCommand>(line) {
            Ok(command) => receiver.handle_load(command).await,
            Err(e) => {
                warn!(error = %e, "Unparseable load command");
                Err(ErrorResult::invalid_request())
            }
        };
        println!("{}", format_outcome(&outcome, format));
        answered += 1;
    }

    info!(answered, "Input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_from_args() {
        let command = build_command(
            Some("https://x/video.mpd".into()),
            Some("application/dash+xml".into()),
            None,
        )
        .unwrap();
        assert_eq!(command, LoadCommand::direct("https://x/video.mpd", "application/dash+xml"));
    }

    #[test]
    fn test_build_command_from_json() {
        let command = build_command(None, None, Some(r#"{"contentRef":"bbb"}"#.into())).unwrap();
        assert_eq!(command, LoadCommand::catalog("bbb"));
    }

    #[test]
    fn test_build_command_rejects_bad_json() {
        assert!(build_command(None, None, Some("{".into())).is_err());
    }
}
