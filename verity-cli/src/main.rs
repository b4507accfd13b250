//! verity-cli — command-line frontend for the Verity claim verification server
//!
//! # Subcommands
//! - `ask <text> [--json]`                — verify one claim against the judge panel
//! - `verify <graph.json> [--json]`       — verify every node of an argument graph file
//! - `analyze <file_path> [--language]`   — run the full transcript analysis pipeline
//! - `status`                             — show server health

use clap::{Parser, Subcommand};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8967";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "verity-cli",
    version,
    about = "Verity claim verification — CLI frontend"
)]
struct Cli {
    /// Verity HTTP server URL (overrides VERITY_HTTP_URL env var)
    #[arg(long, env = "VERITY_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Verify a single claim text
    Ask {
        /// The claim to verify
        text: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Verify every node of an argument graph stored as JSON
    Verify {
        /// Path to a JSON file containing the argument graph
        graph: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Transcribe an audio file and build its argument graph
    Analyze {
        /// Path to the audio file, as seen by the server
        file_path: String,

        /// Transcript language code
        #[arg(long)]
        language: Option<String>,
    },

    /// Show Verity server status
    Status,
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(seconds: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(seconds))
        .build()?)
}

fn post(server: &str, route: &str, body: serde_json::Value, seconds: u64) -> serde_json::Value {
    let client = match client(seconds) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("verity-cli: failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let url = format!("{}{}", server, route);
    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("verity-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let value: serde_json::Value = match resp.json() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("verity-cli: failed to parse response: {}", e);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        eprintln!(
            "verity-cli: server returned {}: {}",
            status,
            value["error"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    value
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("verity-cli: failed to serialize response: {}", e);
            std::process::exit(1);
        }
    }
}

fn do_ask(server: &str, text: &str, json_output: bool) -> anyhow::Result<()> {
    let body = serde_json::json!({ "text": text });
    let resp = post(server, "/ask", body, 300);

    if json_output {
        print_json(&resp);
        return Ok(());
    }

    println!("Claim:      {}", resp["query"].as_str().unwrap_or(text));
    println!("Verdict:    {}", resp["verdict"].as_str().unwrap_or("?"));
    println!(
        "Score:      {:.0}%",
        resp["score"].as_f64().unwrap_or(0.0) * 100.0
    );
    println!("Rationale:  {}", resp["explanation"].as_str().unwrap_or("?"));

    if let Some(panel) = resp["panel"].as_array() {
        println!("\nPanel:");
        for entry in panel {
            let provider = entry["provider"].as_str().unwrap_or("?");
            match entry["verdict"].as_str() {
                Some(verdict) => println!(
                    "  {} — {} ({:.0}%)",
                    provider,
                    verdict,
                    entry["confidence"].as_f64().unwrap_or(0.0) * 100.0
                ),
                None => println!(
                    "  {} — failed: {}",
                    provider,
                    entry["error"].as_str().unwrap_or("?")
                ),
            }
        }
    }

    Ok(())
}

fn do_verify(server: &str, graph_path: &str, json_output: bool) -> anyhow::Result<()> {
    let raw = match std::fs::read_to_string(graph_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("verity-cli: cannot read {}: {}", graph_path, e);
            std::process::exit(1);
        }
    };

    // A valid JSON file is sent structured; anything else goes through the
    // server's embedded-payload recovery.
    let body = match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(graph) => serde_json::json!({ "argument_graph": graph }),
        Err(_) => serde_json::json!({ "text": raw }),
    };

    let resp = post(server, "/verify", body, 600);

    if json_output {
        print_json(&resp);
        return Ok(());
    }

    let sent = &resp["sent_to_socket"];
    if sent["sent"].as_bool().unwrap_or(false) {
        println!(
            "Delivered via {} channel",
            sent["via"].as_str().unwrap_or("?")
        );
    } else {
        println!(
            "Delivery failed: {}",
            sent["error"].as_str().unwrap_or("unknown")
        );
    }

    if let Some(result) = resp["result"].as_object() {
        println!();
        for (key, node) in result {
            println!(
                "{:<10} {:>4}%  {}",
                key,
                node["trustScore"].as_u64().unwrap_or(0),
                node["reasoning"].as_str().unwrap_or("?")
            );
        }
    }

    Ok(())
}

fn do_analyze(server: &str, file_path: &str, language: Option<String>) -> anyhow::Result<()> {
    let mut body = serde_json::json!({ "file_path": file_path });
    if let Some(language) = language {
        body["language"] = serde_json::Value::String(language);
    }

    // Transcription plus pairwise analysis can take a while.
    let resp = post(server, "/analyze", body, 1800);

    let summary = &resp["summary"];
    println!(
        "Segments:      {}",
        summary["total_segments"].as_u64().unwrap_or(0)
    );
    println!("Claims:        {}", summary["claims"].as_u64().unwrap_or(0));
    println!("Facts:         {}", summary["facts"].as_u64().unwrap_or(0));
    println!(
        "Relationships: {}",
        summary["relationships"].as_u64().unwrap_or(0)
    );
    println!(
        "Avg conf:      {:.2}",
        summary["avg_confidence"].as_f64().unwrap_or(0.0)
    );

    print_json(&resp["argument_graph"]);
    Ok(())
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!(
                "Verity server: {}",
                body["status"].as_str().unwrap_or("unknown")
            );
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            match body["providers"].as_array() {
                Some(providers) if !providers.is_empty() => {
                    println!("Judges:");
                    for p in providers {
                        println!("  - {}", p.as_str().unwrap_or("?"));
                    }
                }
                _ => println!("Judges:        none configured"),
            }
        }
        Ok(r) => {
            eprintln!("verity-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("verity-cli: cannot reach {} — {}", url, e);
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
        Commands::Ask { text, json } => do_ask(&server, &text, json),
        Commands::Verify { graph, json } => do_verify(&server, &graph, json),
        Commands::Analyze {
            file_path,
            language,
        } => do_analyze(&server, &file_path, language),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("verity-cli: {}", e);
        std::process::exit(1);
    }
}
