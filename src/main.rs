use std::path::PathBuf;
use std::sync::Arc;

use scholar_agent::agent::{AbortReason, AgentError, Orchestrator, RunOutcome};
use scholar_agent::config::{self, ConfigError, Settings};
use scholar_agent::mcp::{SseConnector, TransportConfig};
use scholar_agent::model::AnthropicClient;
use scholar_agent::report::write_report;

const DEFAULT_INSTRUCTION: &str = "\
Using all of the academic search tools on ports 6000-6007, write a rigorous survey report on Large Language Models.

Requirements:
1. Search several sources (arXiv, Crossref, DeepResearch, ...) for broad coverage
2. Focus on important papers since 2020 (GPT, BERT, Transformer, ...)
3. Collect at least 10 high-quality papers
4. For each paper give: title, authors, year, core contribution, link
5. Organize the content chronologically or by topic
6. Produce the final report in Markdown

Decide yourself which tools to call, in which order, and how to combine the data.";

const PREVIEW_CHARS: usize = 500;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    scholar_agent::init_tracing();
    if let Err(error) = run().await {
        eprintln!("scholar-agent failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut settings = Settings::from_env().map_err(|e| e.to_string())?;
    let mut instruction_words: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }

        if let Some(value) = arg.strip_prefix("--max-iterations=") {
            settings.max_iterations = parse_positive_usize(value, "--max-iterations")?;
            continue;
        }
        if arg == "--max-iterations" {
            let value = args
                .next()
                .ok_or_else(|| "--max-iterations requires a value".to_string())?;
            settings.max_iterations = parse_positive_usize(&value, "--max-iterations")?;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--output=") {
            settings.report_path = PathBuf::from(value);
            continue;
        }
        if arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "--output requires a value".to_string())?;
            settings.report_path = PathBuf::from(value);
            continue;
        }

        if let Some(value) = arg.strip_prefix("--model=") {
            settings.model = value.to_string();
            continue;
        }
        if arg == "--model" {
            settings.model = args
                .next()
                .ok_or_else(|| "--model requires a value".to_string())?;
            continue;
        }

        if arg.starts_with("--") {
            return Err(format!("unknown flag '{arg}'. Use --help for usage"));
        }
        instruction_words.push(arg);
    }

    let instruction = if instruction_words.is_empty() {
        DEFAULT_INSTRUCTION.to_string()
    } else {
        instruction_words.join(" ")
    };

    // Credential problems stop the run before any network activity.
    let credential = match config::load_credential() {
        Ok(credential) => credential,
        Err(error) => {
            print_credential_help(&error);
            return Err(error.to_string());
        }
    };

    let connector = SseConnector::new(TransportConfig::with_timeout(settings.mcp_timeout))
        .map_err(|e| e.to_string())?;
    let engine = AnthropicClient::new(
        credential.expose().to_string(),
        Some(settings.model.clone()),
        Some(settings.base_url.clone()),
    );
    let orchestrator = Orchestrator::new(engine, Arc::new(connector), &settings.mcp_host)
        .map_err(|e| e.to_string())?
        .with_max_iterations(settings.max_iterations);

    println!("{}", "=".repeat(80));
    println!("Model: {}  |  budget: {} iterations", settings.model, settings.max_iterations);
    println!("{}", "=".repeat(80));

    let outcome = match orchestrator.run(&instruction).await {
        Ok(outcome) => outcome,
        Err(AgentError::CredentialRejected(message)) => {
            println!("\nAuthentication failed: {message}");
            println!("  1. Copy a valid key from https://console.anthropic.com");
            println!("  2. Make sure .env or the environment holds only the key, without spaces or quotes");
            println!("  3. Regenerate the key if it expired or was revoked");
            println!("  4. Check that the account has remaining credit");
            return Err("credential rejected".to_string());
        }
    };

    match &outcome {
        RunOutcome::Completed { iterations, .. } => {
            println!("\nTask completed after {iterations} iteration(s)");
        }
        RunOutcome::Aborted { reason, iterations } => {
            let why = match reason {
                AbortReason::BudgetExhausted => "iteration budget exhausted".to_string(),
                AbortReason::UnexpectedStop(stop) => format!("unexpected stop '{stop}'"),
                AbortReason::EngineFailure(message) => format!("engine error: {message}"),
            };
            println!("\nTask not completed after {iterations} iteration(s): {why}");
        }
    }

    let text = outcome.report_text();
    write_report(&settings.report_path, &text).map_err(|e| e.to_string())?;
    println!("Report saved to {}", settings.report_path.display());

    println!("\n{}\nPreview:\n{}", "=".repeat(80), "=".repeat(80));
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        println!("{preview}...");
    } else {
        println!("{preview}");
    }
    Ok(())
}

fn print_credential_help(error: &ConfigError) {
    println!("\n{}", "=".repeat(80));
    println!("Error: {error}");
    println!("{}", "=".repeat(80));
    for line in error.remediation() {
        println!("  {line}");
    }
    println!("{}", "=".repeat(80));
}

fn parse_positive_usize(value: &str, flag: &str) -> Result<usize, String> {
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("{flag} must be a positive integer, got '{value}'"))?;
    if parsed == 0 {
        return Err(format!("{flag} must be greater than zero"));
    }
    Ok(parsed)
}

fn print_help() {
    println!(
        "\
scholar-agent: let Claude drive the academic MCP services to answer a research request

USAGE:
    scholar-agent [OPTIONS] [INSTRUCTION...]

OPTIONS:
    --max-iterations <N>   Engine call budget (default 15, env SCHOLAR_MAX_ITERATIONS)
    --output <PATH>        Report file (default research_report.md, env SCHOLAR_REPORT_PATH)
    --model <NAME>         Model id (env ANTHROPIC_MODEL)
    -h, --help             Print this help

ENVIRONMENT:
    ANTHROPIC_API_KEY      API key (a .env file next to the binary or in the cwd takes precedence)
    ANTHROPIC_BASE_URL     Messages API base URL
    SCHOLAR_MCP_HOST       Host of the MCP services (default http://giiisp.com)
    SCHOLAR_MCP_TIMEOUT_SECS  Per-request timeout for MCP calls (default 60)"
    );
}
