//! Graph renderers and the sinks that write them

use crate::config::OutputFormat;
use callweave_core::{Graph, Method, Snapshot};
use callweave_engine::GraphSink;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct NodeDocument {
    id: String,
    signature: String,
    unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<f32>,
}

#[derive(Debug, Serialize)]
struct EdgeDocument {
    caller: String,
    callee: String,
}

#[derive(Debug, Serialize)]
struct GraphDocument {
    nodes: Vec<NodeDocument>,
    edges: Vec<EdgeDocument>,
}

/// Method ids as fixed-width hex, stable across runs of the same build.
fn node_key(id: callweave_core::MethodId) -> String {
    format!("{:016x}", id.0)
}

pub fn render_json(graph: &Graph) -> serde_json::Result<String> {
    let document = GraphDocument {
        nodes: graph
            .all_nodes()
            .map(|node| NodeDocument {
                id: node_key(node.method.id),
                signature: node.method.signature(),
                unit: node.method.unit.to_string(),
                x: node.position.map(|p| p.x),
                y: node.position.map(|p| p.y),
            })
            .collect(),
        edges: graph
            .all_edges()
            .map(|(caller, callee)| EdgeDocument {
                caller: node_key(caller.method.id),
                callee: node_key(callee.method.id),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&document)
}

fn escape_dot(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Graphviz rendering, left to right. Positions become pinned `pos`
/// attributes for `neato -n`.
pub fn render_dot(graph: &Graph) -> String {
    let mut out = String::from("digraph callweave {\n    rankdir=LR;\n    node [shape=box];\n");
    for node in graph.all_nodes() {
        let _ = write!(
            out,
            "    \"{}\" [label=\"{}\"",
            node_key(node.method.id),
            escape_dot(&node.method.signature())
        );
        if let Some(p) = node.position {
            let _ = write!(out, ", pos=\"{},{}!\"", p.x, p.y);
        }
        out.push_str("];\n");
    }
    for (caller, callee) in graph.all_edges() {
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\";",
            node_key(caller.method.id),
            node_key(callee.method.id)
        );
    }
    out.push_str("}\n");
    out
}

fn push_pair(out: &mut String, caller: &Method, callee: &Method) {
    let _ = writeln!(out, "Caller: {}", caller.signature());
    let _ = writeln!(out, "Callee: {}", callee.signature());
    out.push('\n');
}

/// Every committed edge as a `Caller:` / `Callee:` pair, blank line between
/// pairs.
pub fn render_pairs(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for edge in &snapshot.edges {
        push_pair(&mut out, &edge.caller, &edge.callee);
    }
    out
}

/// Writes each graph it receives to a file, or to stdout.
pub struct RenderSink {
    format: OutputFormat,
    target: Option<PathBuf>,
}

impl RenderSink {
    pub fn new(format: OutputFormat, target: Option<PathBuf>) -> Self {
        RenderSink { format, target }
    }

    fn render(&self, graph: &Graph) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Json => render_json(graph)?,
            OutputFormat::Dot => render_dot(graph),
            OutputFormat::Pairs => {
                let mut out = String::new();
                for (caller, callee) in graph.all_edges() {
                    push_pair(&mut out, &caller.method, &callee.method);
                }
                out
            }
        })
    }

    fn write(&self, graph: &Graph) -> anyhow::Result<()> {
        let rendered = self.render(graph)?;
        match &self.target {
            Some(path) => {
                let tmp = path.with_extension("tmp");
                std::fs::write(&tmp, rendered)?;
                std::fs::rename(&tmp, path)?;
                tracing::info!("Graph written to {}", path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

impl GraphSink for RenderSink {
    fn reset(&self, graph: &Graph) {
        if let Err(e) = self.write(graph) {
            tracing::error!("Failed to write graph: {:#}", e);
        }
    }
}
