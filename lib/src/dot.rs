use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::ShuffleError;
use crate::links::{verb_name, LinkTable};
use crate::session::{ScriptRef, Session};

/// Renders the extracted link graph as a GraphViz digraph: one node per
/// room, one labelled edge per exit site.
pub fn render_room_map(session: &Session, links: &LinkTable) -> String {
    let mut out = String::new();
    out.push_str("digraph rooms {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    overlap=false;\n");
    out.push_str("    edge [fontsize=12];\n");

    let mut rooms: BTreeSet<u16> = BTreeSet::new();
    for entries in links.values() {
        for link in entries {
            rooms.insert(link.room_src);
            rooms.insert(link.room_dest);
        }
    }
    for room in &rooms {
        let name = session
            .rooms
            .get(room)
            .and_then(|r| r.name.as_deref())
            .unwrap_or("?");
        let _ = writeln!(
            out,
            "    room_{room} [label=\"[room {room}] {}\", shape=rectangle, \
             style=\"filled, rounded\", fillcolor=khaki];",
            escape(name)
        );
    }
    for entries in links.values() {
        for link in entries {
            let _ = writeln!(
                out,
                "    room_{} -> room_{} [label=\"{}\"];",
                link.room_src,
                link.room_dest,
                escape(&site_label(session, &link.site, link.offset))
            );
        }
    }
    out.push_str("}\n");
    out
}

pub fn write_room_map(
    path: &Path,
    session: &Session,
    links: &LinkTable,
) -> Result<(), ShuffleError> {
    std::fs::write(path, render_room_map(session, links))
        .map_err(|e| ShuffleError::Io(format!("Couldn't write {}", path.display()), e))
}

/// Same idea for the forest subroom graph, which has no room names to
/// show, only ids and dispatcher sites.
pub fn render_forest_map(graph: &crate::shuffle::ForestGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph forest {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    edge [fontsize=12];\n");
    let mut rooms: BTreeSet<u16> = BTreeSet::new();
    for &(src, dest) in graph.edges.keys() {
        rooms.insert(src);
        rooms.insert(dest);
    }
    for room in &rooms {
        let _ = writeln!(
            out,
            "    sub_{room} [label=\"subroom {room}\", shape=ellipse];"
        );
    }
    for ((src, dest), site) in &graph.edges {
        let _ = writeln!(
            out,
            "    sub_{src} -> sub_{dest} [label=\"{}\"];",
            escape(&format!("{} 0x{:04x}", site.site, site.offset))
        );
    }
    out.push_str("}\n");
    out
}

pub fn write_forest_map(
    path: &Path,
    graph: &crate::shuffle::ForestGraph,
) -> Result<(), ShuffleError> {
    std::fs::write(path, render_forest_map(graph))
        .map_err(|e| ShuffleError::Io(format!("Couldn't write {}", path.display()), e))
}

fn site_label(session: &Session, site: &ScriptRef, offset: usize) -> String {
    match site {
        ScriptRef::ObjectVerb { room, object, verb } => {
            let object_name = session
                .rooms
                .get(room)
                .and_then(|r| r.objects.get(object))
                .map(|o| String::from_utf8_lossy(&o.name).into_owned())
                .unwrap_or_default();
            let verb_label = verb_name(*verb)
                .map(str::to_string)
                .unwrap_or_else(|| format!("(verb {verb})"));
            format!("[obj {object} 0x{offset:04x}] {verb_label} {object_name}")
        }
        ScriptRef::Local { id, .. } => format!("[local {id} 0x{offset:04x}]"),
        ScriptRef::Global { id, .. } => format!("[global {id} 0x{offset:04x}]"),
        ScriptRef::Entry { .. } => format!("[entry 0x{offset:04x}]"),
        ScriptRef::Exit { .. } => format!("[exit 0x{offset:04x}]"),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_quotes_for_dot_labels() {
        assert_eq!(escape("a \"fine\" label"), "a \\\"fine\\\" label");
    }
}
