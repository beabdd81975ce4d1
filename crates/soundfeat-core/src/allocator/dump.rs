//! Graphviz dump of a lifetime tree.

use super::tree::LifetimeTree;
use std::fmt::Write as _;

/// Render `tree` as a DOT digraph.
///
/// Solid edges are parent → child, dashed edges follow the execution order.
pub fn to_dot(tree: &LifetimeTree) -> String {
    let mut out = String::from("digraph buffers {\n  node [shape=box, fontname=monospace];\n");

    // Writing into a String cannot fail.
    for (id, node) in tree.iter() {
        let address = node
            .address
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        let mut label = match &node.label {
            Some(name) => format!("{}\\n", escape(name)),
            None => String::new(),
        };
        let _ = write!(
            label,
            "#{} item {}\\nsize {} @ {}",
            id.index(),
            node.item,
            node.size,
            address
        );
        let style = if node.retained { ", style=bold" } else { "" };
        let _ = writeln!(out, "  n{} [label=\"{}\"{}];", id.index(), label, style);
    }

    for (id, node) in tree.iter() {
        for child in node.children() {
            let _ = writeln!(out, "  n{} -> n{};", id.index(), child.index());
        }
    }

    for pair in tree.order().windows(2) {
        let _ = writeln!(
            out,
            "  n{} -> n{} [style=dashed, color=gray, constraint=false];",
            pair[0].index(),
            pair[1].index()
        );
    }

    out.push_str("}\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
