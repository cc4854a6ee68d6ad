//! Paper records extracted from raw service results, and their Markdown
//! rendering.

use chrono::{DateTime, Local};
use serde_json::Value;

/// Characters of abstract kept in a record.
pub const ABSTRACT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaperRecord {
    pub source: String,
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub abstract_text: Option<String>,
    pub url: String,
}

/// Records from a DeepResearch result (`data.data[]`).
pub fn from_deep_research(result: &Value) -> Vec<PaperRecord> {
    nested_items(result, &["data", "data"])
        .map(|paper| PaperRecord {
            source: "DeepResearch (Giiisp)".to_string(),
            title: string_field(paper, "title").unwrap_or_else(|| "Untitled".to_string()),
            authors: authors_field(paper.get("authors")),
            year: scalar_text(paper.get("year")),
            doi: string_field(paper, "doi"),
            arxiv_id: None,
            abstract_text: string_field(paper, "abstractText").map(|a| truncate_abstract(&a)),
            url: string_field(paper, "link")
                .or_else(|| string_field(paper, "doi"))
                .unwrap_or_else(|| "#".to_string()),
        })
        .collect()
}

/// Records from an arXiv abstract search (`data.data[]`).
pub fn from_arxiv(result: &Value) -> Vec<PaperRecord> {
    nested_items(result, &["data", "data"])
        .map(|paper| {
            // The service spells the field both ways.
            let arxiv_id = string_field(paper, "arxivNo")
                .or_else(|| string_field(paper, "arvixNo"))
                .map(|id| id.replace("arXiv:", ""));
            PaperRecord {
                source: "arXiv (preprint)".to_string(),
                title: string_field(paper, "title").unwrap_or_else(|| "Untitled".to_string()),
                authors: authors_field(paper.get("authors")),
                year: scalar_text(paper.get("year")),
                doi: None,
                url: arxiv_id
                    .as_ref()
                    .map(|id| format!("https://arxiv.org/abs/{id}"))
                    .unwrap_or_else(|| "#".to_string()),
                arxiv_id,
                abstract_text: string_field(paper, "paperAbstract").map(|a| truncate_abstract(&a)),
            }
        })
        .collect()
}

/// Records from a Crossref works search (`message.items[]`).
pub fn from_crossref(result: &Value) -> Vec<PaperRecord> {
    nested_items(result, &["message", "items"])
        .map(|item| {
            let authors: Vec<String> = item
                .get("author")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .take(3)
                        .map(|a| {
                            let given = a.get("given").and_then(Value::as_str).unwrap_or("");
                            let family = a.get("family").and_then(Value::as_str).unwrap_or("");
                            format!("{given} {family}").trim().to_string()
                        })
                        .collect()
                })
                .unwrap_or_default();

            PaperRecord {
                source: "Crossref (metadata)".to_string(),
                title: item
                    .get("title")
                    .and_then(Value::as_array)
                    .and_then(|titles| titles.first())
                    .and_then(Value::as_str)
                    .unwrap_or("Untitled")
                    .to_string(),
                authors: (!authors.is_empty()).then(|| authors.join(", ")),
                year: scalar_text(item.pointer("/published/date-parts/0/0")),
                doi: string_field(item, "DOI"),
                arxiv_id: None,
                abstract_text: None,
                url: string_field(item, "URL").unwrap_or_else(|| "#".to_string()),
            }
        })
        .collect()
}

/// First 200 characters followed by `...`.
pub fn truncate_abstract(text: &str) -> String {
    let head: String = text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Markdown report listing every paper.
pub fn render_markdown(
    topic: &str,
    sources: &[&str],
    papers: &[PaperRecord],
    generated_at: DateTime<Local>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {topic} Research Report\n\n"));
    out.push_str(&format!(
        "**Generated**: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&format!("**Sources**: {}\n\n", sources.join(", ")));
    out.push_str(&format!("**Papers**: {}\n\n", papers.len()));
    out.push_str("---\n\n");

    for (idx, paper) in papers.iter().enumerate() {
        out.push_str(&format!("## {}. {}\n\n", idx + 1, paper.title));
        out.push_str(&format!("- **Source**: {}\n", paper.source));
        if let Some(authors) = &paper.authors {
            out.push_str(&format!("- **Authors**: {authors}\n"));
        }
        if let Some(year) = &paper.year {
            out.push_str(&format!("- **Year**: {year}\n"));
        }
        if let Some(doi) = &paper.doi {
            out.push_str(&format!("- **DOI**: {doi}\n"));
        }
        if let Some(arxiv_id) = &paper.arxiv_id {
            out.push_str(&format!("- **arXiv ID**: {arxiv_id}\n"));
        }
        out.push_str(&format!("- **Link**: [View]({})\n", paper.url));
        if let Some(abstract_text) = &paper.abstract_text {
            out.push_str(&format!("\n**Abstract**:\n> {abstract_text}\n"));
        }
        out.push_str("\n---\n\n");
    }
    out
}

fn nested_items<'a>(value: &'a Value, path: &[&str]) -> impl Iterator<Item = &'a Value> {
    let mut current = Some(value);
    for key in path {
        current = current.and_then(|v| v.get(*key));
    }
    current
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.is_object())
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Authors arrive as a plain string, a list of names or a list of objects.
fn authors_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(list) => {
            let names: Vec<String> = list
                .iter()
                .filter_map(|a| match a {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => a.get("name").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}
