//! Connectivity check for the remote services. Needs no API credential.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::info;

use crate::agent::Service;
use crate::mcp::{Connector, EndpointError, InvocationResult, RemoteToolClient};

/// Longest failure cause shown in the summary table.
const CAUSE_PREVIEW_CHARS: usize = 60;

/// A small, known-good call against one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCase {
    pub service: Service,
    pub capability: &'static str,
    pub arguments: Value,
    pub description: &'static str,
}

impl ProbeCase {
    pub fn arguments_map(&self) -> Map<String, Value> {
        self.arguments.as_object().cloned().unwrap_or_default()
    }
}

/// One probe per service, in port order.
pub fn cases() -> Vec<ProbeCase> {
    Service::ALL.into_iter().map(case_for).collect()
}

pub fn case_for_port(port: u16) -> Option<ProbeCase> {
    Service::from_port(port).map(case_for)
}

fn case_for(service: Service) -> ProbeCase {
    let (capability, arguments, description) = match service {
        Service::Crossref => (
            "search_works",
            json!({ "query": "Machine Learning", "rows": 1 }),
            "Scholarly metadata search",
        ),
        Service::BioC => (
            "get_article_info",
            json!({ "id": "PMC7095368" }),
            "PubMed Central article lookup",
        ),
        Service::DeepResearch => (
            "DeepResearch",
            json!({ "searchQuery": "LLM", "count": 1 }),
            "Giiisp deep research engine",
        ),
        Service::ArxivAbstract => (
            "searchArxivByAbstract",
            json!({ "key": "GPT", "pageSize": 1 }),
            "arXiv search by abstract",
        ),
        Service::OpenLibrary => (
            "searchBooks",
            json!({ "query": "Deep Learning", "limit": 1 }),
            "Book search",
        ),
        Service::Entrez => (
            "ESearch",
            json!({ "db": "pubmed", "term": "covid", "retmax": 1 }),
            "NCBI database search",
        ),
        Service::ArxivId => (
            "SearchByArxivNo",
            json!({ "key": "1706.03762" }),
            "arXiv lookup by ID",
        ),
        Service::ArxivTitle => (
            "searchArxivByTitle",
            json!({ "key": "Attention Is All You Need" }),
            "arXiv search by title",
        ),
    };

    ProbeCase {
        service,
        capability,
        arguments,
        description,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Passed,
    /// Connected and called, but nothing came back.
    NoData,
    Failed(String),
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Passed => write!(f, "passed"),
            ProbeStatus::NoData => write!(f, "no data"),
            ProbeStatus::Failed(cause) => {
                let preview: String = cause.chars().take(CAUSE_PREVIEW_CHARS).collect();
                write!(f, "failed: {}", preview)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub service: Service,
    pub status: ProbeStatus,
    pub result: Option<InvocationResult>,
}

/// Run one probe through `client`.
pub async fn probe(client: &RemoteToolClient, case: &ProbeCase) -> ProbeOutcome {
    let (status, result) = match client.invoke(case.capability, case.arguments_map()).await {
        Ok(InvocationResult::Empty) => (ProbeStatus::NoData, None),
        Ok(result) => (ProbeStatus::Passed, Some(result)),
        Err(e) => (ProbeStatus::Failed(e.to_string()), None),
    };
    ProbeOutcome {
        service: case.service,
        status,
        result,
    }
}

/// Probe every service sequentially. `on_result` sees each outcome as soon
/// as it is known.
pub async fn run_all(
    connector: Arc<dyn Connector>,
    host: &str,
    mut on_result: impl FnMut(usize, &ProbeCase, &ProbeOutcome),
) -> Result<Vec<ProbeOutcome>, EndpointError> {
    let cases = cases();
    let mut outcomes = Vec::with_capacity(cases.len());

    for (index, case) in cases.iter().enumerate() {
        let client = RemoteToolClient::new(case.service.endpoint(host)?, connector.clone());
        let outcome = probe(&client, case).await;
        info!("{} probe: {}", case.service.display_name(), outcome.status);
        on_result(index, case, &outcome);
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Render the summary table and next steps.
pub fn render_summary(outcomes: &[ProbeOutcome]) -> String {
    let passed = outcomes
        .iter()
        .filter(|o| o.status == ProbeStatus::Passed)
        .count();
    let total = outcomes.len();

    let mut out = format!("Total: {passed}/{total} services passed\n\n");
    for outcome in outcomes {
        out.push_str(&format!(
            "  port {:4} | {:20} | {}\n",
            outcome.service.port(),
            outcome.service.display_name(),
            outcome.status
        ));
    }
    out.push('\n');

    if passed == total {
        out.push_str("All MCP services are up.\n");
        out.push_str("Next: set ANTHROPIC_API_KEY and run scholar-agent\n");
    } else if passed > 0 {
        out.push_str("Some services failed, check the entries above.\n");
    } else {
        out.push_str("No service could be reached. Check that:\n");
        out.push_str("  1. the MCP services are running\n");
        out.push_str("  2. ports 6000-6007 are reachable\n");
        out.push_str("  3. no firewall blocks the connection\n");
    }
    out
}

/// Pretty JSON of a result, cut to `limit` characters.
pub fn preview(result: &InvocationResult, limit: usize) -> String {
    let pretty = serde_json::to_string_pretty(&result.to_json()).unwrap_or_default();
    pretty.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ResultItem;

    #[test]
    fn test_one_case_per_service() {
        let cases = cases();
        assert_eq!(cases.len(), 8);
        assert_eq!(cases[5].capability, "ESearch");
        assert_eq!(case_for_port(6006).unwrap().arguments, json!({ "key": "1706.03762" }));
        assert!(case_for_port(8080).is_none());
    }

    #[test]
    fn test_summary_hints() {
        let outcome = |service, status| ProbeOutcome {
            service,
            status,
            result: None,
        };

        let all_passed = render_summary(&[outcome(Service::Crossref, ProbeStatus::Passed)]);
        assert!(all_passed.contains("1/1 services passed"));
        assert!(all_passed.contains("All MCP services are up"));

        let mixed = render_summary(&[
            outcome(Service::Crossref, ProbeStatus::Passed),
            outcome(Service::BioC, ProbeStatus::NoData),
        ]);
        assert!(mixed.contains("port 6001 | BioC"));
        assert!(mixed.contains("no data"));
        assert!(mixed.contains("Some services failed"));

        let none = render_summary(&[outcome(
            Service::Entrez,
            ProbeStatus::Failed("x".repeat(200)),
        )]);
        assert!(none.contains("No service could be reached"));
        assert!(!none.contains(&"x".repeat(61)));
    }

    #[test]
    fn test_preview_truncates() {
        let result = InvocationResult::Single(ResultItem::Raw("a".repeat(1000)));
        assert_eq!(preview(&result, 500).chars().count(), 500);
    }
}
