//! Tool descriptor discovery.
//!
//! Two sources feed the catalog: integration config JSON (`integrations.json`,
//! falling back to `.mcp.json`) and workflow documents (`workflows/*.md`).
//! Missing sources are not errors; a malformed descriptor file is logged and
//! skipped so one bad file never aborts a sync.

use crate::models::ToolKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// A tool descriptor as read from disk, before keyword extraction and
/// domain classification.
#[derive(Debug, Clone)]
pub struct RawTool {
    /// Provider the tool belongs to (integration name or `workflow`).
    pub provider: String,
    /// Operation or workflow name.
    pub name: String,
    /// Integration or workflow.
    pub kind: ToolKind,
    /// Descriptor file the record came from, relative to the base directory.
    pub source: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// Usage examples.
    pub examples: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IntegrationEntry {
    #[serde(default)]
    description: String,
    #[serde(default)]
    operations: Vec<OperationEntry>,
}

#[derive(Debug, Deserialize)]
struct OperationEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct McpConfig {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: BTreeMap<String, McpServerEntry>,
}

#[derive(Debug, Deserialize)]
struct McpServerEntry {
    #[serde(default)]
    description: String,
}

/// Discovers all tool descriptors under `base_dir`.
#[must_use]
pub fn discover(base_dir: &Path) -> Vec<RawTool> {
    let mut raw = discover_integrations(base_dir);
    raw.extend(discover_workflows(base_dir));
    raw
}

/// Reads integration descriptors: `integrations.json` maps provider name to
/// a description and operation list; `.mcp.json` is the fallback and yields
/// one provider-level record per configured server.
fn discover_integrations(base_dir: &Path) -> Vec<RawTool> {
    let integrations = base_dir.join("integrations.json");
    if let Some(text) = read_if_present(&integrations) {
        return match serde_json::from_str::<BTreeMap<String, IntegrationEntry>>(&text) {
            Ok(entries) => integration_tools(entries, "integrations.json"),
            Err(e) => {
                warn!(file = %integrations.display(), error = %e, "skipping malformed integration config");
                Vec::new()
            },
        };
    }

    let mcp = base_dir.join(".mcp.json");
    if let Some(text) = read_if_present(&mcp) {
        return match serde_json::from_str::<McpConfig>(&text) {
            Ok(config) => config
                .mcp_servers
                .into_iter()
                .map(|(provider, entry)| RawTool {
                    name: provider.clone(),
                    provider,
                    kind: ToolKind::Integration,
                    source: ".mcp.json".to_string(),
                    description: entry.description,
                    parameters: Vec::new(),
                    examples: Vec::new(),
                })
                .collect(),
            Err(e) => {
                warn!(file = %mcp.display(), error = %e, "skipping malformed mcp config");
                Vec::new()
            },
        };
    }

    Vec::new()
}

fn integration_tools(entries: BTreeMap<String, IntegrationEntry>, source: &str) -> Vec<RawTool> {
    let mut tools = Vec::new();
    for (provider, entry) in entries {
        if entry.operations.is_empty() {
            // A provider with no operation list is itself the tool.
            tools.push(RawTool {
                name: provider.clone(),
                provider,
                kind: ToolKind::Integration,
                source: source.to_string(),
                description: entry.description,
                parameters: Vec::new(),
                examples: Vec::new(),
            });
            continue;
        }
        for operation in entry.operations {
            tools.push(RawTool {
                provider: provider.clone(),
                name: operation.name,
                kind: ToolKind::Integration,
                source: source.to_string(),
                description: operation.description,
                parameters: operation.parameters,
                examples: operation.examples,
            });
        }
    }
    tools
}

/// Reads workflow descriptors from `workflows/*.md`. The description comes
/// from a `description:` frontmatter field, falling back to the first three
/// prose lines before the first `##` heading.
fn discover_workflows(base_dir: &Path) -> Vec<RawTool> {
    let dir = base_dir.join("workflows");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut paths: Vec<_> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let mut tools = Vec::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable workflow");
                continue;
            },
        };

        let (fields, body) = parse_frontmatter(&text);
        let description = fields
            .get("description")
            .cloned()
            .unwrap_or_else(|| leading_prose(body));

        tools.push(RawTool {
            provider: "workflow".to_string(),
            name: stem.to_string(),
            kind: ToolKind::Workflow,
            source: format!("workflows/{stem}.md"),
            description,
            parameters: Vec::new(),
            examples: Vec::new(),
        });
    }
    tools
}

fn read_if_present(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "skipping unreadable descriptor file");
            None
        },
    }
}

/// Splits a markdown document into YAML-ish frontmatter fields and body.
///
/// Frontmatter is a leading block fenced by `---` lines containing simple
/// `key: value` pairs. Documents without one return an empty field map and
/// the full text as body.
pub(crate) fn parse_frontmatter(content: &str) -> (BTreeMap<String, String>, &str) {
    let mut fields = BTreeMap::new();

    let Some(rest) = content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (fields, content);
    };

    let Some(end) = rest.find("\n---").map(|i| {
        let after = &rest[i + 4..];
        (i, after.strip_prefix('\n').or_else(|| after.strip_prefix("\r\n")).unwrap_or(after))
    }) else {
        return (fields, content);
    };
    let (fence, body) = end;

    for line in rest[..fence].lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                fields.insert(key.to_lowercase(), value.trim().to_string());
            }
        }
    }

    (fields, body)
}

/// The first three non-empty lines before the first `##` heading.
fn leading_prose(body: &str) -> String {
    body.lines()
        .take_while(|line| !line.starts_with("##"))
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}
