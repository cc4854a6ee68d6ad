use std::sync::Arc;

use scholar_agent::agent::Service;
use scholar_agent::config::Settings;
use scholar_agent::mcp::{RemoteToolClient, SseConnector, TransportConfig};
use scholar_agent::probe::{self, ProbeStatus};

const PREVIEW_CHARS: usize = 500;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    scholar_agent::init_tracing();
    if let Err(error) = run().await {
        eprintln!("scholar-probe failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let connector = Arc::new(
        SseConnector::new(TransportConfig::with_timeout(settings.mcp_timeout))
            .map_err(|e| e.to_string())?,
    );

    match std::env::args().nth(1) {
        Some(arg) if arg == "--help" || arg == "-h" => {
            print_usage();
            Ok(())
        }
        Some(arg) => match arg.parse::<u16>() {
            Ok(port) => probe_single(connector, &settings.mcp_host, port).await,
            Err(_) => {
                println!("Error: the port must be a number");
                print_usage();
                Ok(())
            }
        },
        None => probe_all(connector, &settings.mcp_host).await,
    }
}

async fn probe_all(connector: Arc<SseConnector>, host: &str) -> Result<(), String> {
    println!("\n{}", "=".repeat(80));
    println!("MCP service connectivity check (no API key needed)");
    println!("{}", "=".repeat(80));

    let total = Service::ALL.len();
    let outcomes = probe::run_all(connector, host, |index, case, outcome| {
        println!(
            "\n[{}/{}] {} (port {})",
            index + 1,
            total,
            case.service.display_name(),
            case.service.port()
        );
        println!("    purpose: {}", case.description);
        println!("    tool:    {}", case.capability);
        match &outcome.status {
            ProbeStatus::Passed => println!("    passed, data received"),
            ProbeStatus::NoData => println!("    warning: connected but no data returned"),
            ProbeStatus::Failed(cause) => println!("    failed: {cause}"),
        }
        println!("{}", "-".repeat(80));
    })
    .await
    .map_err(|e| e.to_string())?;

    println!("\n{}", "=".repeat(80));
    println!("Summary");
    println!("{}", "=".repeat(80));
    print!("{}", probe::render_summary(&outcomes));
    println!("{}", "=".repeat(80));
    Ok(())
}

async fn probe_single(connector: Arc<SseConnector>, host: &str, port: u16) -> Result<(), String> {
    let Some(case) = probe::case_for_port(port) else {
        println!("Error: no probe configured for port {port}");
        return Ok(());
    };

    let endpoint = case.service.endpoint(host).map_err(|e| e.to_string())?;
    println!("\nProbing {} (port {})", case.service.display_name(), port);
    println!("tool:      {}", case.capability);
    println!("arguments: {}\n", case.arguments);

    let client = RemoteToolClient::new(endpoint, connector);
    let outcome = probe::probe(&client, &case).await;
    match (&outcome.status, &outcome.result) {
        (ProbeStatus::Passed, Some(result)) => {
            println!("\nData received:");
            println!("{}", probe::preview(result, PREVIEW_CHARS));
        }
        (ProbeStatus::Failed(cause), _) => println!("\nFailed: {cause}"),
        _ => println!("\nNo data returned"),
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: scholar-probe [port]");
    println!("Example: scholar-probe 6002");
}
