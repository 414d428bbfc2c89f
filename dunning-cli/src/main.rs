//! dunning-cli — command-line client for the Dunning server
//!
//! # Subcommands
//! - `token`                         — fetch an ephemeral realtime session token
//! - `summarize <events.json>`       — summarize a saved call event log
//! - `transcript <events.json>`      — print the normalized transcript locally
//! - `status`                        — show server health
//!
//! Event log files hold either a bare JSON array of realtime events or an
//! object of the form `{ "events": [...] }`.

use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use dunning_core::{normalize, NormalizerPolicy, RawSessionEvent, Role, Transcript};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "dunning-cli", version, about = "Dunning calling-agent CLI")]
struct Cli {
    /// Dunning HTTP server URL (overrides DUNNING_HTTP_URL env var)
    #[arg(long, env = "DUNNING_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch an ephemeral realtime session token
    Token,

    /// Summarize a saved call event log via the server
    Summarize {
        /// Path to the event log JSON file
        file: String,
    },

    /// Print the normalized transcript of an event log (no server needed)
    Transcript {
        /// Path to the event log JSON file
        file: String,

        /// Role given to the model's audio transcripts
        #[arg(long, value_enum, default_value_t = RoleArg::System)]
        transcript_role: RoleArg,

        /// Output the transcript as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show Dunning server status
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    System,
    Assistant,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::System => Role::System,
            RoleArg::Assistant => Role::Assistant,
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// Response from POST /summarize-conversation
#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: String,
}

// ============================================================================
// Event log files
// ============================================================================

/// Pull the event array out of an event log document.
pub fn extract_events(doc: serde_json::Value) -> anyhow::Result<Vec<serde_json::Value>> {
    match doc {
        serde_json::Value::Array(events) => Ok(events),
        serde_json::Value::Object(mut obj) => match obj.remove("events") {
            Some(serde_json::Value::Array(events)) => Ok(events),
            _ => anyhow::bail!("expected an \"events\" array"),
        },
        _ => anyhow::bail!("expected a JSON array or an object with an \"events\" array"),
    }
}

fn load_events(file: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    let text = std::fs::read_to_string(Path::new(file))
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file, e))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {}", file, e))?;
    extract_events(doc)
}

/// One `role: content` line per message.
pub fn format_transcript(transcript: &Transcript) -> String {
    transcript
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            format!("{}: {}", role, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Commands
// ============================================================================

fn do_token(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder().build()?;

    let url = format!("{}/token", server);
    let resp = match client.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("dunning-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("dunning-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    // Pretty-print when the body is JSON, otherwise relay it as-is
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        Err(_) => println!("{}", body),
    }

    Ok(())
}

fn do_summarize(server: &str, file: &str) -> anyhow::Result<()> {
    let events = load_events(file)?;

    let client = reqwest::blocking::Client::builder().build()?;
    let url = format!("{}/summarize-conversation", server);
    let body = serde_json::json!({ "events": events });

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("dunning-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("dunning-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    let summary: SummaryResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("dunning-cli: failed to parse summary response: {}", e);
            std::process::exit(1);
        }
    };

    if !summary.success {
        eprintln!("dunning-cli: server reported an unsuccessful summary");
        std::process::exit(1);
    }
    println!("{}", summary.summary);

    Ok(())
}

fn do_transcript(file: &str, transcript_role: RoleArg, json: bool) -> anyhow::Result<()> {
    let events: Vec<RawSessionEvent> = load_events(file)?
        .iter()
        .map(RawSessionEvent::from_value)
        .collect();

    let policy = NormalizerPolicy {
        transcript_role: transcript_role.into(),
        ..NormalizerPolicy::default()
    };
    let transcript = normalize(&events, &policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
    } else if transcript.is_empty() {
        eprintln!("No conversation messages in {}", file);
    } else {
        println!("{}", format_transcript(&transcript));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Dunning server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("Debtor source:  {}", body["debtor_source"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("dunning-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("dunning-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Token => do_token(&server),
        Commands::Summarize { file } => do_summarize(&server, &file),
        Commands::Transcript {
            file,
            transcript_role,
            json,
        } => do_transcript(&file, transcript_role, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("dunning-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dunning_core::NormalizedMessage;
    use serde_json::json;

    #[test]
    fn test_extract_events_from_bare_array() {
        let events = extract_events(json!([{ "type": "a" }, { "type": "b" }])).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_extract_events_from_request_shaped_object() {
        let events = extract_events(json!({ "events": [{ "type": "a" }] })).unwrap();
        assert_eq!(events, vec![json!({ "type": "a" })]);
    }

    #[test]
    fn test_extract_events_rejects_other_shapes() {
        assert!(extract_events(json!({ "events": "nope" })).is_err());
        assert!(extract_events(json!({ "items": [] })).is_err());
        assert!(extract_events(json!("events")).is_err());
    }

    #[test]
    fn test_format_transcript_lines() {
        let transcript = Transcript::from(vec![
            NormalizedMessage::new(Role::System, "Is this Peter?"),
            NormalizedMessage::new(Role::User, "Yes."),
        ]);
        assert_eq!(format_transcript(&transcript), "system: Is this Peter?\nuser: Yes.");
    }

    #[test]
    fn test_format_empty_transcript() {
        assert_eq!(format_transcript(&Transcript::default()), "");
    }

    #[test]
    fn test_role_arg_maps_to_role() {
        assert_eq!(Role::from(RoleArg::Assistant), Role::Assistant);
        assert_eq!(Role::from(RoleArg::System), Role::System);
    }
}
