//! Graphviz 图

use anyhow::Result;

use crate::backend::record::{Record, RecordKind};

/// Graphviz 图，用于查看共享节点与分支结构
pub struct Dot;

impl super::Target for Dot {
    fn write(mut f: impl std::io::Write, records: &[Record]) -> Result<()> {
        writeln!(f, "digraph vignette {{")?;
        writeln!(f, "    node [shape=box, fontname=monospace];")?;
        for record in records {
            let shape = match record.kind {
                RecordKind::DataNode => "box",
                RecordKind::DecisionNode => "diamond",
                RecordKind::DocumentationNode => "note",
            };
            let mut label = record.node_id.to_string();
            for entry in &record.entries {
                let values = entry
                    .values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>();
                label.push_str(&format!("\\n{} = {}", entry.name, values.join(", ")));
            }
            writeln!(
                f,
                "    n{} [shape={}, label=\"{}\"];",
                record.node_id,
                shape,
                escape(&label)
            )?;
        }
        for record in records {
            for (i, child) in record.children.iter().enumerate() {
                match (record.kind, i) {
                    (RecordKind::DecisionNode, 0) => {
                        writeln!(f, "    n{} -> n{} [label=\"yes\"];", record.node_id, child)?
                    }
                    (RecordKind::DecisionNode, _) => {
                        writeln!(f, "    n{} -> n{} [label=\"no\"];", record.node_id, child)?
                    }
                    _ => writeln!(f, "    n{} -> n{};", record.node_id, child)?,
                }
            }
        }
        writeln!(f, "}}")?;
        Ok(())
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::record::{Entry, Value};
    use crate::backend::target::Target;
    use crate::backend::NodeId;

    #[test]
    fn writes_nodes_and_edges() {
        let records = vec![
            Record {
                kind: RecordKind::DecisionNode,
                node_id: NodeId(2),
                entries: vec![Entry::new("nickname", vec![Value::from("Pre_battle")])],
                children: vec![NodeId(3), NodeId(4)],
            },
            Record {
                kind: RecordKind::DataNode,
                node_id: NodeId(3),
                entries: vec![Entry::new("Weight", vec![Value::Int(1)])],
                children: vec![],
            },
        ];
        let mut output = Vec::new();
        Dot::write(&mut output, &records).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("digraph vignette {\n"));
        assert!(text.contains("n2 [shape=diamond, label=\"2\\nnickname = Pre_battle\"];"));
        assert!(text.contains("n3 [shape=box, label=\"3\\nWeight = 1\"];"));
        assert!(text.contains("n2 -> n3 [label=\"yes\"];"));
        assert!(text.contains("n2 -> n4 [label=\"no\"];"));
        assert!(text.ends_with("}\n"));
    }
}
