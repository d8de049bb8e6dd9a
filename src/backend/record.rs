//! 扁平记录：节点图的持久化形式。

use std::fmt::Display;
use std::str::FromStr;

use crate::error::DecompileError;
use crate::schema::{
    CommSequence, DataNode, DecisionNode, DocumentationNode, FactionSet, ObjectiveText, OfferText,
    OfferTextItem, OfferTextOp, Plurality, VignetteString,
};

use super::optimize;
use super::{Node, NodeData, NodeId, Tree, ENTRY};

/// 记录种类
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    DataNode,
    DecisionNode,
    DocumentationNode,
}

impl RecordKind {
    /// 小节名
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::DataNode => "DataNode",
            RecordKind::DecisionNode => "DecisionNode",
            RecordKind::DocumentationNode => "DocumentationNode",
        }
    }
}

impl FromStr for RecordKind {
    type Err = DecompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            RecordKind::DataNode,
            RecordKind::DecisionNode,
            RecordKind::DocumentationNode,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| DecompileError::UnknownKind(s.to_string()))
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 记录中的值
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Value {
    /// 按整数读取。
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 按浮点数读取，整数也可以。
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Int(i) => Some(*i as f32),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 按布尔值读取。
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 按名称读取。`true`/`false` 这样的名称会被读成布尔值，这里还原回来。
    pub fn as_name(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => i.fmt(f),
            Value::Float(x) => x.fmt(f),
            Value::Bool(b) => b.fmt(f),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// 记录中的一个条目
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// 条目名
    pub name: String,
    /// 值
    pub values: Vec<Value>,
}

impl Entry {
    /// 创建一个新的条目。
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// 一个节点对应的记录
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 种类
    pub kind: RecordKind,
    /// 节点 ID
    pub node_id: NodeId,
    /// 除 `node_id` 与 `child_node` 以外的条目，按写出顺序
    pub entries: Vec<Entry>,
    /// 子节点
    pub children: Vec<NodeId>,
}

/// 可以按 ID 查询记录的数据源
pub trait GraphSource {
    /// 全部记录
    fn records(&self) -> &[Record];

    /// 查询一条记录
    fn record(&self, id: NodeId) -> Option<&Record> {
        self.records().iter().find(|record| record.node_id == id)
    }
}

impl GraphSource for [Record] {
    fn records(&self) -> &[Record] {
        self
    }
}

impl GraphSource for Vec<Record> {
    fn records(&self) -> &[Record] {
        self
    }
}

fn names(values: &[String]) -> Vec<Value> {
    values.iter().map(|s| Value::from(s.as_str())).collect()
}

fn string_values(text: &VignetteString) -> Vec<Value> {
    let mut values = vec![Value::Int(text.message_id)];
    values.extend(names(&text.args));
    values
}

fn offer_text_values(entry: &OfferText) -> Vec<Value> {
    let mut values = vec![Value::from(entry.op.as_str())];
    for item in &entry.items {
        if item.plurality != Plurality::None {
            values.push(Value::from(item.plurality.as_str()));
        }
        values.push(Value::Int(item.message_id));
        values.extend(names(&item.args));
    }
    values
}

fn data_entries(data: &DataNode) -> Vec<Entry> {
    let mut entries = vec![];
    if let Some(weight) = data.weight {
        entries.push(Entry::new("Weight", vec![weight.into()]));
    }
    if !data.implemented {
        entries.push(Entry::new("Implemented", vec![false.into()]));
    }
    if let Some(group) = data.offer_group.as_ref().filter(|g| !g.is_empty()) {
        entries.push(Entry::new("Offer_group", names(&group.0)));
    }
    if let Some(group) = data.hostile_group.as_ref().filter(|g| !g.is_empty()) {
        entries.push(Entry::new("Hostile_group", names(&group.0)));
    }
    if let Some(zones) = data.allowable_zone_types.as_ref().filter(|z| !z.is_empty()) {
        entries.push(Entry::new("allowable_zone_types", names(zones)));
    }
    if let Some((min, max)) = data.difficulty {
        entries.push(Entry::new("difficulty", vec![min.into(), max.into()]));
    }
    if let Some(text) = &data.failure_text {
        entries.push(Entry::new("Failure_text", string_values(text)));
    }
    if let Some(text) = &data.reward_text {
        entries.push(Entry::new("Reward_text", string_values(text)));
    }
    for ot in &data.objective_texts {
        let mut values = vec![Value::from(ot.target.as_str())];
        values.extend(string_values(&ot.text));
        entries.push(Entry::new("objective_text", values));
    }
    for entry in &data.offer_texts {
        entries.push(Entry::new("offer_text", offer_text_values(entry)));
    }
    for cs in &data.comm_sequences {
        entries.push(Entry::new(
            "comm_sequence",
            vec![
                cs.event.as_str().into(),
                cs.target.as_str().into(),
                cs.floats.0.into(),
                cs.floats.1.into(),
                cs.floats.2.into(),
                cs.source.as_str().into(),
                cs.comm.as_str().into(),
            ],
        ));
    }
    entries
}

impl Record {
    /// 由节点生成记录。反编译过程中的多路分支节点没有对应的记录。
    pub fn from_node(id: NodeId, node: &Node) -> Option<Self> {
        let (kind, entries) = match &node.data {
            NodeData::Data(data) => (RecordKind::DataNode, data_entries(data)),
            NodeData::Decision(decision) => (
                RecordKind::DecisionNode,
                vec![Entry::new("nickname", vec![decision.nickname.as_str().into()])],
            ),
            NodeData::Documentation(doc) => (
                RecordKind::DocumentationNode,
                vec![Entry::new(
                    "documentation",
                    vec![doc.documentation.as_str().into()],
                )],
            ),
            NodeData::IfElse(_) => return None,
        };
        Some(Self {
            kind,
            node_id: id,
            entries,
            children: node.children.clone(),
        })
    }
}

/// 按 ID 升序生成全部记录
pub fn to_records(tree: &Tree) -> Vec<Record> {
    tree.iter()
        .filter_map(|(id, node)| Record::from_node(id, node))
        .collect()
}

/// `singular` / `plural` 标记开始一个新的文本项
fn plurality_marker(value: &Value) -> Option<Plurality> {
    match value.as_name()?.parse::<Plurality>() {
        Ok(plurality @ (Plurality::Singular | Plurality::Plural)) => Some(plurality),
        _ => None,
    }
}

/// 逐个读取条目中的值
struct EntryReader<'a> {
    id: NodeId,
    entry: &'a Entry,
    pos: usize,
}

impl<'a> EntryReader<'a> {
    fn new(id: NodeId, entry: &'a Entry) -> Self {
        Self { id, entry, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> DecompileError {
        DecompileError::InvalidEntry {
            id: self.id,
            entry: self.entry.name.clone(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&'a Value> {
        self.entry.values.get(self.pos)
    }

    fn value(&mut self, what: &str) -> Result<&'a Value, DecompileError> {
        let value = self
            .peek()
            .ok_or_else(|| self.error(format!("missing {}", what)))?;
        self.pos += 1;
        Ok(value)
    }

    fn int(&mut self) -> Result<i32, DecompileError> {
        let value = self.value("integer")?;
        value
            .as_int()
            .ok_or_else(|| self.error(format!("expected integer, found `{}`", value)))
    }

    fn float(&mut self) -> Result<f32, DecompileError> {
        let value = self.value("number")?;
        value
            .as_float()
            .ok_or_else(|| self.error(format!("expected number, found `{}`", value)))
    }

    fn bool(&mut self) -> Result<bool, DecompileError> {
        let value = self.value("boolean")?;
        value
            .as_bool()
            .ok_or_else(|| self.error(format!("expected boolean, found `{}`", value)))
    }

    fn name(&mut self) -> Result<String, DecompileError> {
        let value = self.value("name")?;
        value
            .as_name()
            .ok_or_else(|| self.error(format!("expected name, found `{}`", value)))
    }

    fn keyword<T: FromStr>(&mut self) -> Result<T, DecompileError> {
        let name = self.name()?;
        name.parse()
            .map_err(|_| self.error(format!("unknown keyword `{}`", name)))
    }

    fn rest_names(&mut self) -> Result<Vec<String>, DecompileError> {
        let mut names = vec![];
        while self.peek().is_some() {
            names.push(self.name()?);
        }
        Ok(names)
    }

    fn string(&mut self) -> Result<VignetteString, DecompileError> {
        Ok(VignetteString {
            message_id: self.int()?,
            args: self.rest_names()?,
        })
    }

    fn offer_text(&mut self) -> Result<OfferText, DecompileError> {
        let op = self.keyword::<OfferTextOp>()?;
        let mut items = vec![];
        while self.peek().is_some() {
            let plurality = match self.peek().and_then(plurality_marker) {
                Some(plurality) => {
                    self.pos += 1;
                    plurality
                }
                None => Plurality::None,
            };
            let message_id = self.int()?;
            let mut args = vec![];
            while let Some(name) = self
                .peek()
                .filter(|value| plurality_marker(value).is_none())
                .and_then(Value::as_name)
            {
                args.push(name);
                self.pos += 1;
            }
            items.push(OfferTextItem {
                message_id,
                plurality,
                args,
            });
        }
        if items.is_empty() {
            return Err(self.error("expected at least one item"));
        }
        Ok(OfferText { op, items })
    }

    fn finish(&self) -> Result<(), DecompileError> {
        match self.peek() {
            Some(value) => Err(self.error(format!("unexpected `{}`", value))),
            None => Ok(()),
        }
    }
}

fn read_data(id: NodeId, entries: &[Entry]) -> Result<DataNode, DecompileError> {
    let mut data = DataNode::default();
    for entry in entries {
        let mut reader = EntryReader::new(id, entry);
        match entry.name.to_ascii_lowercase().as_str() {
            "weight" => data.weight = Some(reader.int()?),
            "implemented" => data.implemented = reader.bool()?,
            "offer_group" => data.offer_group = Some(FactionSet(reader.rest_names()?)),
            "hostile_group" => data.hostile_group = Some(FactionSet(reader.rest_names()?)),
            "allowable_zone_types" => data.allowable_zone_types = Some(reader.rest_names()?),
            "difficulty" => data.difficulty = Some((reader.float()?, reader.float()?)),
            "failure_text" => data.failure_text = Some(reader.string()?),
            "reward_text" => data.reward_text = Some(reader.string()?),
            "objective_text" => data.objective_texts.push(ObjectiveText {
                target: reader.name()?,
                text: reader.string()?,
            }),
            "offer_text" => data.offer_texts.push(reader.offer_text()?),
            "comm_sequence" => data.comm_sequences.push(CommSequence {
                event: reader.name()?,
                target: reader.keyword()?,
                floats: (reader.float()?, reader.float()?, reader.float()?),
                source: reader.keyword()?,
                comm: reader.name()?,
            }),
            _ => return Err(reader.error("unknown entry")),
        }
        reader.finish()?;
    }
    Ok(data)
}

fn read_single(id: NodeId, entries: &[Entry], name: &str) -> Result<String, DecompileError> {
    let mut value = None;
    for entry in entries {
        let mut reader = EntryReader::new(id, entry);
        if !entry.name.eq_ignore_ascii_case(name) {
            return Err(reader.error("unknown entry"));
        }
        value = Some(reader.name()?);
        reader.finish()?;
    }
    value.ok_or_else(|| DecompileError::InvalidEntry {
        id,
        entry: name.to_string(),
        message: "missing".to_string(),
    })
}

impl TryFrom<&Record> for Node {
    type Error = DecompileError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let id = record.node_id;
        let data = match record.kind {
            RecordKind::DataNode => NodeData::Data(read_data(id, &record.entries)?),
            RecordKind::DecisionNode => NodeData::Decision(DecisionNode {
                nickname: read_single(id, &record.entries, "nickname")?,
            }),
            RecordKind::DocumentationNode => NodeData::Documentation(DocumentationNode {
                documentation: read_single(id, &record.entries, "documentation")?,
            }),
        };
        Ok(Node {
            data,
            children: record.children.clone(),
        })
    }
}

/// 由记录重建节点图，并检查入口节点与子节点引用
pub fn load<S: GraphSource + ?Sized>(source: &S) -> Result<Tree, DecompileError> {
    let mut tree = Tree::new();
    for record in source.records() {
        if tree.contains(record.node_id) {
            return Err(DecompileError::DuplicateNode(record.node_id));
        }
        tree.insert(record.node_id, Node::try_from(record)?);
    }
    if source.record(ENTRY).is_none() {
        return Err(DecompileError::NoStartNode(ENTRY));
    }
    for record in source.records() {
        let missing = record
            .children
            .iter()
            .find(|child| source.record(**child).is_none());
        if let Some(child) = missing {
            return Err(DecompileError::MissingNode {
                parent: record.node_id,
                child: *child,
            });
        }
    }
    if let Some(id) = optimize::find_cycle(&tree) {
        return Err(DecompileError::Cycle(id));
    }
    Ok(tree)
}
