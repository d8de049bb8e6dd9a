//! 小节/条目形式的文本记录

use anyhow::Result;

use crate::backend::record::{Entry, Record, RecordKind, Value};
use crate::backend::NodeId;
use crate::error::IniError;

/// 小节/条目形式的文本记录
pub struct Ini;

impl super::Target for Ini {
    fn write(mut f: impl std::io::Write, records: &[Record]) -> Result<()> {
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", record.kind)?;
            writeln!(f, "node_id = {}", record.node_id)?;
            for entry in &record.entries {
                let values = entry
                    .values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>();
                writeln!(f, "{} = {}", entry.name, values.join(", "))?;
            }
            for child in &record.children {
                writeln!(f, "child_node = {}", child)?;
            }
        }
        Ok(())
    }
}

struct Section {
    kind: RecordKind,
    line: usize,
    node_id: Option<NodeId>,
    entries: Vec<Entry>,
    children: Vec<NodeId>,
}

impl Section {
    fn finish(self) -> std::result::Result<Record, IniError> {
        let node_id = self.node_id.ok_or_else(|| IniError {
            line: self.line,
            message: format!("section [{}] has no node_id", self.kind),
        })?;
        Ok(Record {
            kind: self.kind,
            node_id,
            entries: self.entries,
            children: self.children,
        })
    }
}

fn parse_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i32>() {
        Value::Int(i)
    } else if let Some(f) = text.parse::<f32>().ok().filter(|f| f.is_finite()) {
        Value::Float(f)
    } else if text.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if text.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        Value::Str(text.to_string())
    }
}

fn parse_id(values: &[Value], line: usize, name: &str) -> std::result::Result<NodeId, IniError> {
    match values {
        [Value::Int(id)] if *id >= 0 => Ok(NodeId(*id as u32)),
        _ => Err(IniError {
            line,
            message: format!("`{}` expects one non-negative integer", name),
        }),
    }
}

impl Ini {
    /// 读取文本记录。`;` 之后为注释。
    pub fn read(source: &str) -> std::result::Result<Vec<Record>, IniError> {
        let mut records = vec![];
        let mut section: Option<Section> = None;

        for (i, line) in source.lines().enumerate() {
            let line_no = i + 1;
            let line = line.split(';').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some(section) = section.take() {
                    records.push(section.finish()?);
                }
                let kind = name.trim().parse::<RecordKind>().map_err(|e| IniError {
                    line: line_no,
                    message: e.to_string(),
                })?;
                section = Some(Section {
                    kind,
                    line: line_no,
                    node_id: None,
                    entries: vec![],
                    children: vec![],
                });
                continue;
            }

            let Some((name, values)) = line.split_once('=') else {
                return Err(IniError {
                    line: line_no,
                    message: format!("expected `name = value`, found `{}`", line),
                });
            };
            let Some(section) = section.as_mut() else {
                return Err(IniError {
                    line: line_no,
                    message: "entry outside of a section".to_string(),
                });
            };
            let name = name.trim();
            let values = values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(parse_value)
                .collect::<Vec<_>>();

            if name.eq_ignore_ascii_case("node_id") {
                section.node_id = Some(parse_id(&values, line_no, name)?);
            } else if name.eq_ignore_ascii_case("child_node") {
                section.children.push(parse_id(&values, line_no, name)?);
            } else {
                section.entries.push(Entry::new(name, values));
            }
        }

        if let Some(section) = section {
            records.push(section.finish()?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::target::Target;

    fn write(records: &[Record]) -> String {
        let mut output = Vec::new();
        Ini::write(&mut output, records).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn writes_sections() {
        let records = vec![
            Record {
                kind: RecordKind::DataNode,
                node_id: NodeId(2),
                entries: vec![
                    Entry::new("Weight", vec![Value::Int(10)]),
                    Entry::new("difficulty", vec![Value::Float(0.5), Value::Float(2.0)]),
                ],
                children: vec![NodeId(3)],
            },
            Record {
                kind: RecordKind::DecisionNode,
                node_id: NodeId(3),
                entries: vec![Entry::new("nickname", vec!["Pre_battle".into()])],
                children: vec![],
            },
        ];
        assert_eq!(
            write(&records),
            "[DataNode]\n\
             node_id = 2\n\
             Weight = 10\n\
             difficulty = 0.5, 2\n\
             child_node = 3\n\
             \n\
             [DecisionNode]\n\
             node_id = 3\n\
             nickname = Pre_battle\n"
        );
    }

    #[test]
    fn reads_sections() {
        let records = Ini::read(
            "; comment\n\
             [DataNode]\n\
             node_id = 2\n\
             Implemented = false ; trailing\n\
             Offer_group = li_n_grp, br_n_grp\n\
             difficulty = 0.5, 2\n\
             child_node = 4\n\
             child_node = 5\n\
             \n\
             [documentationnode]\n\
             node_id = 4\n\
             documentation = intro\n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        let data = &records[0];
        assert_eq!(data.node_id, NodeId(2));
        assert_eq!(data.children, vec![NodeId(4), NodeId(5)]);
        assert_eq!(data.entries[0].values, vec![Value::Bool(false)]);
        assert_eq!(
            data.entries[1].values,
            vec![Value::from("li_n_grp"), Value::from("br_n_grp")]
        );
        assert_eq!(data.entries[2].values, vec![Value::Float(0.5), Value::Int(2)]);
        assert_eq!(records[1].kind, RecordKind::DocumentationNode);
    }

    #[test]
    fn read_errors() {
        let err = Ini::read("node_id = 2").unwrap_err();
        assert_eq!(err.line, 1);

        let err = Ini::read("[DataNode]\nWeight = 1\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("node_id"));

        let err = Ini::read("[DataNode]\nnode_id = -1\n").unwrap_err();
        assert_eq!(err.line, 2);

        let err = Ini::read("[Mission]\n").unwrap_err();
        assert!(err.message.contains("Mission"));

        let err = Ini::read("[DataNode]\nnode_id 2\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn write_then_read() {
        let records = vec![Record {
            kind: RecordKind::DataNode,
            node_id: NodeId(2),
            entries: vec![Entry::new(
                "Reward_text",
                vec![Value::Int(100), "a".into(), "b".into()],
            )],
            children: vec![NodeId(7)],
        }];
        assert_eq!(Ini::read(&write(&records)).unwrap(), records);
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vignette.ini");
        let records = vec![Record {
            kind: RecordKind::DocumentationNode,
            node_id: NodeId(2),
            entries: vec![Entry::new("documentation", vec!["intro".into()])],
            children: vec![],
        }];
        Ini::write_to_file(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Ini::read(&text).unwrap(), records);
    }
}
