//! Output formatting for CLI

use kino_receiver::LoadOutcome;
use serde::Serialize;

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => OutputFormat::Text,
            _ => OutputFormat::Json,
        }
    }
}

/// Line written for each answered command
#[derive(Serialize)]
#[serde(tag = "status")]
enum OutcomeLine<'a> {
    #[serde(rename = "ok")]
    Loaded { command: &'a kino_receiver::LoadCommand },
    #[serde(rename = "error")]
    Failed { error: &'a kino_receiver::ErrorResult },
}

/// Format a load outcome based on selected format
pub fn format_outcome(outcome: &LoadOutcome, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let line = match outcome {
                Ok(command) => OutcomeLine::Loaded { command },
                Err(error) => OutcomeLine::Failed { error },
            };
            serde_json::to_string(&line).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => match outcome {
            Ok(command) => format!(
                "OK {} ({})",
                command.content_id.as_deref().unwrap_or("-"),
                command.mime_type.as_deref().unwrap_or("-"),
            ),
            Err(error) => format!("ERROR {}", error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_receiver::{ErrorResult, LoadCommand};

    #[test]
    fn test_json_error_line() {
        let outcome: LoadOutcome = Err(ErrorResult::invalid_request());
        assert_eq!(
            format_outcome(&outcome, "json"),
            r#"{"status":"error","error":{"kind":"INVALID_REQUEST"}}"#
        );
    }

    #[test]
    fn test_text_ok_line() {
        let outcome: LoadOutcome = Ok(LoadCommand {
            content_id: Some("https://x/video.mpd".into()),
            mime_type: Some("application/dash+xml".into()),
            ..Default::default()
        });
        assert_eq!(
            format_outcome(&outcome, "text"),
            "OK https://x/video.mpd (application/dash+xml)"
        );
    }
}
