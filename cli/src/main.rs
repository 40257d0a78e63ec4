//! fabricrest CLI — poke a fabric controller from the terminal.
//!
//! Usage:
//! ```bash
//! # Check an endpoint (version, latency)
//! fabricrest test --url https://controller.example.com --token $TOKEN
//!
//! # Run a raw graph query against a blueprint
//! fabricrest query --url https://controller.example.com --token $TOKEN \
//!     --blueprint abc-123 --query "node(type='system',name='n_system')"
//! ```

use std::env;
use std::process;

use tokio_util::sync::CancellationToken;

use fabricrest_core::executor::{ApiExecutor, ApiRequest, HttpMethod};
use fabricrest_core::ObjectId;
use fabricrest_http::{HttpApiExecutor, HttpClientConfig};
use fabricrest_query::{GraphQuery, QueryValue};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "test" => cmd_test(&args[2..]).await,
        "query" => cmd_query(&args[2..]).await,
        "systems" => cmd_systems(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("fabricrest {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("fabricrest {}", env!("CARGO_PKG_VERSION"));
    println!("Poke a graph-based fabric controller\n");
    println!("USAGE:");
    println!("    fabricrest <COMMAND>\n");
    println!("COMMANDS:");
    println!("    test       Check an API endpoint (version, latency)");
    println!("    query      Run a raw graph query against a blueprint");
    println!("    systems    List system nodes in a blueprint");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>           Controller base URL      [required]");
    println!("    --token <TOKEN>       Session auth token");
    println!("    --blueprint <ID>      Blueprint id             [query only]");
    println!("    --query <QUERY>       Path-query string        [query only]");
}

fn executor(args: &[String]) -> Result<HttpApiExecutor, String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    let config = HttpClientConfig {
        auth_token: parse_flag(args, "--token"),
        ..HttpClientConfig::default()
    };
    Ok(HttpApiExecutor::new(url, config))
}

async fn cmd_test(args: &[String]) -> Result<(), String> {
    let exec = executor(args)?;
    println!("Testing {}...", exec.base_url());

    let start = std::time::Instant::now();
    let version = exec
        .call(
            ApiRequest::new(HttpMethod::Get, "/api/version", None),
            &CancellationToken::new(),
        )
        .await
        .map_err(|e| e.to_string())?;
    let latency = start.elapsed();

    println!("  Status:   OK");
    println!(
        "  Version:  {}",
        version["version"].as_str().unwrap_or("unknown")
    );
    println!("  Latency:  {}ms", latency.as_millis());
    Ok(())
}

async fn cmd_query(args: &[String]) -> Result<(), String> {
    let exec = executor(args)?;
    let blueprint = parse_flag(args, "--blueprint").ok_or("--blueprint is required")?;
    let query = parse_flag(args, "--query").ok_or("--query is required")?;

    let result = exec
        .call(
            ApiRequest::new(
                HttpMethod::Post,
                format!("/api/blueprints/{blueprint}/qe?type=staging"),
                Some(serde_json::json!({ "query": query })),
            ),
            &CancellationToken::new(),
        )
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    Ok(())
}

async fn cmd_systems(args: &[String]) -> Result<(), String> {
    let exec = executor(args)?;
    let blueprint = parse_flag(args, "--blueprint").ok_or("--blueprint is required")?;

    let query = GraphQuery::new(ObjectId::from(blueprint))
        .node([
            ("type", QueryValue::str("system")),
            ("name", QueryValue::str("n_system")),
        ]);
    let items: Vec<serde_json::Value> = query
        .run(&exec, &CancellationToken::new())
        .await
        .map_err(|e| e.to_string())?;

    println!("{} system node(s)", items.len());
    for item in items {
        println!("{}", serde_json::to_string_pretty(&item).unwrap_or_default());
    }
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
