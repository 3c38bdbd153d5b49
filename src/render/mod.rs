//! Textual graph projections.
//!
//! Rendering is a pure projection of the graph topology: node labels are
//! the user-supplied ids verbatim, edges follow the declared (or compiled)
//! transitions, and conditional edges can optionally carry their mapping
//! labels. Two formats are emitted, a Mermaid flowchart and a PlantUML
//! state diagram, both deterministic (sources in registration order).
//! Both the builder and the compiled graph expose this through their
//! `get_graph` methods.

use std::fmt::Write;

use crate::types::{END_ID, NodeKind, START_ID};

/// Output dialect for `get_graph`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    /// Mermaid `flowchart TD`.
    Mermaid,
    /// PlantUML state diagram.
    PlantUml,
}

/// A rendered diagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphRepresentation {
    pub kind: RenderKind,
    pub content: String,
}

/// A source node's outgoing transition, as the renderer sees it: plain
/// arrows (one per target) or labeled conditional arrows.
pub(crate) enum EdgeView {
    Direct(Vec<NodeKind>),
    Conditional(Vec<(String, NodeKind)>),
}

/// Render a topology given its node order and a per-source edge lookup.
pub(crate) fn render_topology<F>(
    kind: RenderKind,
    title: &str,
    print_conditional: bool,
    node_order: &[NodeKind],
    edges_of: F,
) -> GraphRepresentation
where
    F: Fn(&NodeKind) -> Option<EdgeView>,
{
    let mut sources = vec![NodeKind::Start];
    sources.extend(node_order.iter().cloned());
    let content = match kind {
        RenderKind::Mermaid => mermaid(title, print_conditional, node_order, &sources, edges_of),
        RenderKind::PlantUml => plantuml(title, print_conditional, &sources, edges_of),
    };
    GraphRepresentation { kind, content }
}

/// Mermaid identifiers may not contain arbitrary punctuation; labels keep
/// the verbatim id.
fn mermaid_id(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Start => START_ID.to_string(),
        NodeKind::End => END_ID.to_string(),
        NodeKind::Custom(name) => name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect(),
    }
}

fn mermaid<F>(
    title: &str,
    print_conditional: bool,
    node_order: &[NodeKind],
    sources: &[NodeKind],
    edges_of: F,
) -> String
where
    F: Fn(&NodeKind) -> Option<EdgeView>,
{
    let mut out = String::new();
    if !title.is_empty() {
        let _ = writeln!(out, "---\ntitle: {title}\n---");
    }
    out.push_str("flowchart TD\n");
    let _ = writeln!(out, "\t{START_ID}((start))");
    let _ = writeln!(out, "\t{END_ID}((stop))");
    for node in node_order {
        let _ = writeln!(out, "\t{}[\"{}\"]", mermaid_id(node), node);
    }
    for source in sources {
        let Some(view) = edges_of(source) else {
            continue;
        };
        let from = mermaid_id(source);
        match view {
            EdgeView::Direct(targets) => {
                for target in &targets {
                    let _ = writeln!(out, "\t{from} --> {}", mermaid_id(target));
                }
            }
            EdgeView::Conditional(mapping) => {
                for (label, target) in &mapping {
                    if print_conditional {
                        let _ =
                            writeln!(out, "\t{from} -->|\"{label}\"| {}", mermaid_id(target));
                    } else {
                        let _ = writeln!(out, "\t{from} -.-> {}", mermaid_id(target));
                    }
                }
            }
        }
    }
    out
}

fn plantuml_name(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Start | NodeKind::End => "[*]".to_string(),
        NodeKind::Custom(name) => format!("\"{name}\""),
    }
}

fn plantuml<F>(title: &str, print_conditional: bool, sources: &[NodeKind], edges_of: F) -> String
where
    F: Fn(&NodeKind) -> Option<EdgeView>,
{
    let mut out = String::new();
    if title.is_empty() {
        out.push_str("@startuml\n");
    } else {
        let _ = writeln!(out, "@startuml {title}");
    }
    for source in sources {
        let Some(view) = edges_of(source) else {
            continue;
        };
        let from = plantuml_name(source);
        match view {
            EdgeView::Direct(targets) => {
                for target in &targets {
                    let _ = writeln!(out, "{from} --> {}", plantuml_name(target));
                }
            }
            EdgeView::Conditional(mapping) => {
                for (label, target) in &mapping {
                    if print_conditional {
                        let _ =
                            writeln!(out, "{from} --> {} : {label}", plantuml_name(target));
                    } else {
                        let _ = writeln!(out, "{from} --> {}", plantuml_name(target));
                    }
                }
            }
        }
    }
    out.push_str("@enduml\n");
    out
}
