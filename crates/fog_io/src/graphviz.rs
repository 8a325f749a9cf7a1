//! GraphViz dumps of the EFG and of the public-state tree. Visualization
//! only; nothing round-trips through these.

use std::{io::Write, rc::Rc};

use anyhow::Result;
use fog_games::{
    cache::PublicStateCache,
    efg::{EfgNode, NodeKind},
};

fn shape(node: &Rc<EfgNode>) -> &'static str {
    match node.kind() {
        NodeKind::Chance => "circle",
        NodeKind::Player => ["triangle", "invtriangle"][node.current_player().unwrap()],
        NodeKind::Terminal => "square",
    }
}

fn fill_color(node: &Rc<EfgNode>) -> &'static str {
    match node.kind() {
        NodeKind::Chance => "#FFFFFF",
        NodeKind::Player => ["#FF8888", "#88FF88"][node.current_player().unwrap()],
        NodeKind::Terminal => "#888888",
    }
}

fn write_header(out: &mut impl Write) -> Result<()> {
    writeln!(out, "digraph {{")?;
    writeln!(out, "\trankdir=LR")?;
    writeln!(out, "\tgraph [fontname=courier]")?;
    writeln!(
        out,
        "\tnode  [fontname=courier, shape=box, style=\"filled\", fillcolor=white]"
    )?;
    writeln!(out, "\tedge  [fontname=courier]")?;
    Ok(())
}

/// Dump the EFG rooted at `node` as a digraph, one box per node, edges
/// labelled with action labels.
pub fn export_graphviz(root: &Rc<EfgNode>, out: &mut impl Write) -> Result<()> {
    write_header(out)?;
    write_node(root, out)?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_node(node: &Rc<EfgNode>, out: &mut impl Write) -> Result<()> {
    let label = match node.kind() {
        NodeKind::Terminal => format!("{:?}", node.utilities()),
        _ => node.to_string(),
    };
    writeln!(
        out,
        "\t\"{}\" [fillcolor=\"{}\",label=\"{}\",shape=\"{}\"]",
        node,
        fill_color(node),
        label,
        shape(node)
    )?;
    if node.kind() == NodeKind::Terminal {
        return Ok(());
    }

    for action in node.available_actions() {
        let child = node.perform_action(&action);
        writeln!(
            out,
            "\t\"{}\" -> \"{}\" [label=\"{}\"]",
            node,
            child,
            action.label()
        )?;
        write_node(&child, out)?;
    }
    Ok(())
}

/// Dump the public-state tree of a fully built cache.
pub fn export_public_tree(cache: &PublicStateCache, out: &mut impl Write) -> Result<()> {
    write_header(out)?;
    let root = cache.root_public_state();
    write_public_state(cache, &root, out)?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_public_state(
    cache: &PublicStateCache,
    state: &Rc<fog_games::PublicState>,
    out: &mut impl Write,
) -> Result<()> {
    let label = match state.history().last() {
        Some(observation) => observation.to_string(),
        None => "∅".to_string(),
    };
    writeln!(
        out,
        "\t\"{:?}\" [label=\"{}\",shape=\"circle\"]",
        state, label
    )?;

    for child in cache.public_state_children(state) {
        writeln!(out, "\t\"{:?}\" -> \"{:?}\"", state, child)?;
        write_public_state(cache, &child, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use fog_games::{
        gamestates::matching_pennies::{MatchingPenniesDomain, Variant},
        EfgNode,
    };

    use super::*;

    #[test]
    fn test_graphviz_dump_mentions_every_terminal() {
        let root = EfgNode::root(Rc::new(MatchingPenniesDomain::new(Variant::SimultaneousMoves)));
        let mut buffer = vec![];
        export_graphviz(&root, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("digraph {"));
        assert!(text.trim_end().ends_with('}'));
        assert_eq!(text.matches("shape=\"square\"").count(), 4);
        assert_eq!(text.matches("shape=\"invtriangle\"").count(), 2);
    }

    #[test]
    fn test_public_tree_dump() {
        let mut cache = PublicStateCache::new(Rc::new(MatchingPenniesDomain::new(
            Variant::SimultaneousMoves,
        )));
        cache.build_tree();
        let mut buffer = vec![];
        export_public_tree(&cache, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        // four public states, three edges
        assert_eq!(text.matches(" -> ").count(), 3);
    }
}
