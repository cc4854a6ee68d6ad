//! Fixed catalogue of remote services and the logical operations offered to
//! the reasoning engine.
//!
//! Logical operation names are stable; each maps to exactly one service, one
//! remote capability name and one argument shape. The mapping is a static
//! table, so adding an operation means adding a variant and a table row.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::mcp::{EndpointError, ServiceEndpoint};
use crate::model::ToolDescriptor;

/// Host serving the academic MCP services.
pub const DEFAULT_HOST: &str = "http://giiisp.com";

/// Event-stream path on every service.
pub const SSE_PATH: &str = "/sse";

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Crossref,
    BioC,
    DeepResearch,
    ArxivAbstract,
    OpenLibrary,
    Entrez,
    ArxivId,
    ArxivTitle,
}

impl Service {
    pub const ALL: [Service; 8] = [
        Service::Crossref,
        Service::BioC,
        Service::DeepResearch,
        Service::ArxivAbstract,
        Service::OpenLibrary,
        Service::Entrez,
        Service::ArxivId,
        Service::ArxivTitle,
    ];

    pub fn port(self) -> u16 {
        match self {
            Service::Crossref => 6000,
            Service::BioC => 6001,
            Service::DeepResearch => 6002,
            Service::ArxivAbstract => 6003,
            Service::OpenLibrary => 6004,
            Service::Entrez => 6005,
            Service::ArxivId => 6006,
            Service::ArxivTitle => 6007,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Service::Crossref => "Crossref",
            Service::BioC => "BioC",
            Service::DeepResearch => "DeepResearch",
            Service::ArxivAbstract => "Arxiv Abstract",
            Service::OpenLibrary => "OpenLibrary",
            Service::Entrez => "Entrez",
            Service::ArxivId => "Arxiv ID",
            Service::ArxivTitle => "Arxiv Title",
        }
    }

    pub fn from_port(port: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|service| service.port() == port)
    }

    /// `{host}:{port}/sse` for this service.
    pub fn url(self, host: &str) -> String {
        format!("{}:{}{}", host.trim_end_matches('/'), self.port(), SSE_PATH)
    }

    pub fn endpoint(self, host: &str) -> Result<ServiceEndpoint, EndpointError> {
        ServiceEndpoint::new(self.display_name(), self.url(host))
    }
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    String,
    Integer,
}

struct Param {
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
    /// `None` marks a required parameter.
    default: Option<i64>,
    allowed: &'static [&'static str],
}

const fn required(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::String,
        description,
        default: None,
        allowed: &[],
    }
}

const fn count(name: &'static str, description: &'static str, default: i64) -> Param {
    Param {
        name,
        kind: ParamKind::Integer,
        description,
        default: Some(default),
        allowed: &[],
    }
}

const CROSSREF_PARAMS: &[Param] = &[
    required("query", "Search keywords, e.g. 'Machine Learning' or 'Neural Networks'"),
    count("rows", "Number of results to return, default 5", 5),
];
const BIOC_PARAMS: &[Param] = &[required("id", "PubMed Central ID, e.g. 'PMC7095368'")];
const DEEP_RESEARCH_PARAMS: &[Param] = &[
    required("searchQuery", "Search query, e.g. 'Large Language Models' or 'Transformer Architecture'"),
    count("count", "Number of results to return, default 10", 10),
];
const ARXIV_ABSTRACT_PARAMS: &[Param] = &[
    required("key", "Keywords found in the abstract, e.g. 'GPT' or 'attention mechanism'"),
    count("pageSize", "Number of results to return, default 10", 10),
];
const OPENLIBRARY_PARAMS: &[Param] = &[
    required("query", "Search keywords or an author name, e.g. 'Deep Learning' or 'Ian Goodfellow'"),
    count("limit", "Number of results to return, default 5", 5),
];
const ENTREZ_PARAMS: &[Param] = &[
    Param {
        name: "db",
        kind: ParamKind::String,
        description: "Database name, e.g. 'pubmed', 'pmc', 'nucleotide'",
        default: None,
        allowed: &["pubmed", "pmc", "nucleotide", "protein", "gene"],
    },
    required("term", "Search term, e.g. 'CRISPR' or 'COVID-19'"),
    count("retmax", "Number of results to return, default 10", 10),
];
const ARXIV_ID_PARAMS: &[Param] = &[required(
    "key",
    "arXiv ID, e.g. '1706.03762' (Attention Is All You Need)",
)];
const ARXIV_TITLE_PARAMS: &[Param] = &[required(
    "key",
    "Paper title or title keywords, e.g. 'Attention Is All You Need'",
)];

/// Logical operation the engine can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CrossrefSearch,
    BiocGetArticle,
    DeepResearch,
    ArxivSearchByAbstract,
    OpenlibrarySearch,
    EntrezSearch,
    ArxivSearchById,
    ArxivSearchByTitle,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::CrossrefSearch,
        Operation::BiocGetArticle,
        Operation::DeepResearch,
        Operation::ArxivSearchByAbstract,
        Operation::OpenlibrarySearch,
        Operation::EntrezSearch,
        Operation::ArxivSearchById,
        Operation::ArxivSearchByTitle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::CrossrefSearch => "crossref_search",
            Operation::BiocGetArticle => "bioc_get_article",
            Operation::DeepResearch => "deep_research",
            Operation::ArxivSearchByAbstract => "arxiv_search_by_abstract",
            Operation::OpenlibrarySearch => "openlibrary_search",
            Operation::EntrezSearch => "entrez_search",
            Operation::ArxivSearchById => "arxiv_search_by_id",
            Operation::ArxivSearchByTitle => "arxiv_search_by_title",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn service(self) -> Service {
        match self {
            Operation::CrossrefSearch => Service::Crossref,
            Operation::BiocGetArticle => Service::BioC,
            Operation::DeepResearch => Service::DeepResearch,
            Operation::ArxivSearchByAbstract => Service::ArxivAbstract,
            Operation::OpenlibrarySearch => Service::OpenLibrary,
            Operation::EntrezSearch => Service::Entrez,
            Operation::ArxivSearchById => Service::ArxivId,
            Operation::ArxivSearchByTitle => Service::ArxivTitle,
        }
    }

    /// Capability name on the remote service.
    pub fn capability(self) -> &'static str {
        match self {
            Operation::CrossrefSearch => "search_works",
            Operation::BiocGetArticle => "get_article_info",
            Operation::DeepResearch => "DeepResearch",
            Operation::ArxivSearchByAbstract => "searchArxivByAbstract",
            Operation::OpenlibrarySearch => "searchBooks",
            Operation::EntrezSearch => "ESearch",
            Operation::ArxivSearchById => "SearchByArxivNo",
            Operation::ArxivSearchByTitle => "searchArxivByTitle",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::CrossrefSearch => "Search scholarly metadata (title, authors, DOI, citation count). Best for published journal and conference papers.",
            Operation::BiocGetArticle => "Fetch biomedical literature details from PubMed Central (full text, authors, abstract). Requires a PMC ID.",
            Operation::DeepResearch => "Search high-quality academic papers with the Giiisp deep research engine. Returns titles, abstracts, DOIs and citations. The most comprehensive search tool.",
            Operation::ArxivSearchByAbstract => "Search arXiv preprints by abstract keywords. Best for recent results, especially in AI/ML.",
            Operation::OpenlibrarySearch => "Search book information (title, author, publication year, ISBN). Best for academic books and textbooks.",
            Operation::EntrezSearch => "Search NCBI databases (PubMed, GenBank, Protein, ...). Best for biomedical and life-science literature.",
            Operation::ArxivSearchById => "Look up an arXiv paper by its exact arXiv ID.",
            Operation::ArxivSearchByTitle => "Search arXiv by paper title. Use when the approximate title is known.",
        }
    }

    fn params(self) -> &'static [Param] {
        match self {
            Operation::CrossrefSearch => CROSSREF_PARAMS,
            Operation::BiocGetArticle => BIOC_PARAMS,
            Operation::DeepResearch => DEEP_RESEARCH_PARAMS,
            Operation::ArxivSearchByAbstract => ARXIV_ABSTRACT_PARAMS,
            Operation::OpenlibrarySearch => OPENLIBRARY_PARAMS,
            Operation::EntrezSearch => ENTREZ_PARAMS,
            Operation::ArxivSearchById => ARXIV_ID_PARAMS,
            Operation::ArxivSearchByTitle => ARXIV_TITLE_PARAMS,
        }
    }

    /// JSON-schema descriptor offered to the engine.
    pub fn descriptor(self) -> ToolDescriptor {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in self.params() {
            let mut schema = Map::new();
            let kind = match param.kind {
                ParamKind::String => "string",
                ParamKind::Integer => "integer",
            };
            schema.insert("type".into(), json!(kind));
            schema.insert("description".into(), json!(param.description));
            if !param.allowed.is_empty() {
                schema.insert("enum".into(), json!(param.allowed));
            }
            match param.default {
                Some(default) => {
                    schema.insert("default".into(), json!(default));
                }
                None => required.push(param.name),
            }
            properties.insert(param.name.into(), Value::Object(schema));
        }

        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Translate engine-supplied input into remote arguments.
    ///
    /// Known parameters are forwarded as given, optional ones fall back to
    /// their default, unknown keys are dropped.
    pub fn adapt(self, input: &Value) -> Result<Map<String, Value>, RouteError> {
        let empty = Map::new();
        let input = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(RouteError::NotAnObject {
                    operation: self.name().to_string(),
                })
            }
        };

        let mut arguments = Map::new();
        for param in self.params() {
            let value = match (input.get(param.name), param.default) {
                (Some(value), _) if !value.is_null() => value.clone(),
                (_, Some(default)) => json!(default),
                (_, None) => {
                    return Err(RouteError::MissingArgument {
                        operation: self.name().to_string(),
                        argument: param.name.to_string(),
                    })
                }
            };
            arguments.insert(param.name.to_string(), value);
        }
        Ok(arguments)
    }
}

/// The full operation menu, in catalogue order.
pub fn menu() -> Vec<ToolDescriptor> {
    Operation::ALL.into_iter().map(Operation::descriptor).collect()
}

// ============================================================================
// Routing
// ============================================================================

/// A logical call translated for one remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub service: Service,
    pub capability: &'static str,
    pub arguments: Map<String, Value>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown tool: {0}")]
    UnknownOperation(String),
    #[error("{operation}: missing required argument '{argument}'")]
    MissingArgument { operation: String, argument: String },
    #[error("{operation}: arguments must be a JSON object")]
    NotAnObject { operation: String },
}

/// Map an engine tool request onto its remote call.
pub fn route(name: &str, input: &Value) -> Result<RemoteCall, RouteError> {
    let operation =
        Operation::from_name(name).ok_or_else(|| RouteError::UnknownOperation(name.to_string()))?;
    Ok(RemoteCall {
        service: operation.service(),
        capability: operation.capability(),
        arguments: operation.adapt(input)?,
    })
}
