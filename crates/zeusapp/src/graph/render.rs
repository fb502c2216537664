//! Plain-text renderings of the graph for the CLI (`graph --format`).

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{EdgeLayer, EntityGraph};

/// Mermaid flowchart. Every edge renders as `from --> to`.
pub fn mermaid(graph: &EntityGraph) -> String {
    let mut out = String::from("graph TD\n");
    for node in &graph.nodes {
        out.push_str(&format!(
            "    {}[\"{}\"]\n",
            node.id,
            node.title.replace('"', "'")
        ));
    }
    for edge in &graph.edges {
        out.push_str(&format!("    {} --> {}\n", edge.from, edge.to));
    }
    out
}

/// Graphviz dot. Structural edges solid, reference edges dashed.
pub fn dot(graph: &EntityGraph) -> String {
    let mut out = String::from("digraph zeus {\n    rankdir=TB;\n    node [shape=box];\n");
    for node in &graph.nodes {
        out.push_str(&format!(
            "    \"{}\" [label=\"{}\"];\n",
            node.id,
            node.title.replace('"', "'")
        ));
    }
    for edge in &graph.edges {
        let style = match edge.layer {
            EdgeLayer::Structural => "",
            EdgeLayer::Reference => " [style=dashed]",
        };
        out.push_str(&format!("    \"{}\" -> \"{}\"{};\n", edge.from, edge.to, style));
    }
    out.push_str("}\n");
    out
}

/// Indented tree along structural edges, then the reference edges as a flat
/// list.
pub fn text(graph: &EntityGraph) -> String {
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        if edge.layer == EdgeLayer::Structural {
            children
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.as_str());
            has_parent.insert(edge.from.as_str());
        }
    }
    for list in children.values_mut() {
        list.sort();
    }
    let titles: HashMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.title.as_str()))
        .collect();

    let mut out = String::new();
    let mut roots: Vec<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !has_parent.contains(id))
        .collect();
    roots.sort();

    fn walk(
        id: &str,
        depth: usize,
        children: &BTreeMap<&str, Vec<&str>>,
        titles: &HashMap<&str, &str>,
        seen: &mut HashSet<String>,
        out: &mut String,
    ) {
        if !seen.insert(id.to_string()) {
            return;
        }
        out.push_str(&format!(
            "{}{} {}\n",
            "  ".repeat(depth),
            id,
            titles.get(id).unwrap_or(&"")
        ));
        for child in children.get(id).into_iter().flatten() {
            walk(child, depth + 1, children, titles, seen, out);
        }
    }

    let mut seen = HashSet::new();
    for root in roots {
        walk(root, 0, &children, &titles, &mut seen, &mut out);
    }

    let references: Vec<&super::GraphEdge> = graph
        .edges
        .iter()
        .filter(|e| e.layer == EdgeLayer::Reference)
        .collect();
    if !references.is_empty() {
        out.push_str("\ndependencies:\n");
        for edge in references {
            out.push_str(&format!("  {} -> {}\n", edge.from, edge.to));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRelation, GraphEdge, GraphNode};
    use crate::model::{EntityStatus, Kind};

    fn node(id: &str, title: &str, kind: Kind, depth: usize) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            status: EntityStatus::Draft,
            structural_depth: depth,
        }
    }

    fn edge(from: &str, to: &str, relation: EdgeRelation) -> GraphEdge {
        GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            relation,
            layer: relation.layer(),
        }
    }

    /// Three activities, A depends on B, B depends on C.
    fn dependency_chain() -> EntityGraph {
        EntityGraph {
            nodes: vec![
                node("act-0000000a", "A", Kind::Activity, 0),
                node("act-0000000b", "B", Kind::Activity, 0),
                node("act-0000000c", "C", Kind::Activity, 0),
            ],
            edges: vec![
                edge("act-0000000a", "act-0000000b", EdgeRelation::DependsOn),
                edge("act-0000000b", "act-0000000c", EdgeRelation::DependsOn),
            ],
        }
    }

    #[test]
    fn mermaid_emits_exactly_the_dependency_edges() {
        let out = mermaid(&dependency_chain());
        assert!(out.starts_with("graph TD\n"));
        let arrows: Vec<&str> = out.lines().filter(|l| l.contains("-->")).collect();
        assert_eq!(
            arrows,
            vec![
                "    act-0000000a --> act-0000000b",
                "    act-0000000b --> act-0000000c",
            ]
        );
    }

    #[test]
    fn dot_marks_reference_edges_dashed() {
        let out = dot(&dependency_chain());
        assert!(out.contains("digraph"));
        assert_eq!(out.matches("[style=dashed]").count(), 2);
    }

    #[test]
    fn text_tree_indents_structural_children() {
        let graph = EntityGraph {
            nodes: vec![
                node("obj-00000001", "Goal", Kind::Objective, 0),
                node("uc-00000001", "Login", Kind::UseCase, 1),
            ],
            edges: vec![edge("uc-00000001", "obj-00000001", EdgeRelation::Contributes)],
        };
        let out = text(&graph);
        assert!(out.contains("obj-00000001 Goal\n  uc-00000001 Login\n"));
    }
}
