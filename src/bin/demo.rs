use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Map, Value};

use scholar_agent::agent::Service;
use scholar_agent::config::Settings;
use scholar_agent::mcp::{Connector, RemoteToolClient, SseConnector, TransportConfig};
use scholar_agent::papers::{self, PaperRecord};
use scholar_agent::report::{timestamped_path, write_report};

struct DemoStep {
    service: Service,
    capability: &'static str,
    arguments: Value,
    label: &'static str,
    extract: fn(&Value) -> Vec<PaperRecord>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    scholar_agent::init_tracing();
    if let Err(error) = run().await {
        eprintln!("scholar-demo failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let connector: Arc<dyn Connector> = Arc::new(
        SseConnector::new(TransportConfig::with_timeout(settings.mcp_timeout))
            .map_err(|e| e.to_string())?,
    );

    println!("\n{}", "=".repeat(80));
    println!("Academic MCP tools demo (no API key needed)");
    println!("{}", "=".repeat(80));

    let steps = [
        DemoStep {
            service: Service::DeepResearch,
            capability: "DeepResearch",
            arguments: json!({ "searchQuery": "Large Language Models", "count": 5 }),
            label: "DeepResearch search for 'Large Language Models'",
            extract: papers::from_deep_research,
        },
        DemoStep {
            service: Service::ArxivAbstract,
            capability: "searchArxivByAbstract",
            arguments: json!({ "key": "GPT", "pageSize": 5 }),
            label: "arXiv search for 'GPT'",
            extract: papers::from_arxiv,
        },
        DemoStep {
            service: Service::Crossref,
            capability: "search_works",
            arguments: json!({ "query": "Transformer neural network", "rows": 5 }),
            label: "Crossref search for 'Transformer neural network'",
            extract: papers::from_crossref,
        },
    ];

    let mut all_papers = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        println!("\n[{}/{}] {}...", index + 1, steps.len(), step.label);

        let endpoint = step.service.endpoint(&settings.mcp_host).map_err(|e| e.to_string())?;
        let client = RemoteToolClient::new(endpoint, connector.clone());
        let arguments: Map<String, Value> = step.arguments.as_object().cloned().unwrap_or_default();

        match client.invoke(step.capability, arguments).await {
            Ok(result) => {
                let found: Vec<PaperRecord> = result
                    .items()
                    .into_iter()
                    .filter_map(|item| item.as_structured())
                    .flat_map(|value| (step.extract)(value))
                    .collect();
                println!("   found {} paper(s)", found.len());
                all_papers.extend(found);
            }
            Err(error) => println!("   failed: {error}"),
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Total: {} paper(s)", all_papers.len());
    println!("{}", "=".repeat(80));

    let now = Local::now();
    let markdown = papers::render_markdown(
        "Large Language Models",
        &["DeepResearch", "arXiv", "Crossref"],
        &all_papers,
        now,
    );
    let path = timestamped_path(Path::new("."), "scholar_demo_report", now);
    write_report(&path, &markdown).map_err(|e| e.to_string())?;

    println!("Report written to {}", path.display());
    println!("\nscholar-agent lets the model choose the tools, inspect results and");
    println!("refine its searches; set ANTHROPIC_API_KEY to try it.");
    Ok(())
}
