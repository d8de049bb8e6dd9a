//! 编译器后端：节点图。

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::frontend::ast::Condition;
use crate::schema::{DataNode, DecisionNode, DocumentationNode};

pub mod builder;
pub mod optimize;
pub mod record;
pub mod target;

/// 节点 ID
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 入口节点的 ID
pub const ENTRY: NodeId = NodeId(2);

/// 节点内容
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    /// 数据节点
    Data(DataNode),
    /// 二路决策节点
    Decision(DecisionNode),
    /// 文档节点
    Documentation(DocumentationNode),
    /// 反编译时由决策链合并而成的多路分支
    IfElse(Vec<Condition>),
}

/// 图中的节点。子节点只是引用，同一个节点可以有多个父节点。
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// 内容
    pub data: NodeData,
    /// 子节点，按顺序
    pub children: Vec<NodeId>,
}

impl Node {
    /// 创建没有子节点的节点。
    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            children: Vec::new(),
        }
    }

    /// 数据节点的内容。
    pub fn as_data(&self) -> Option<&DataNode> {
        match &self.data {
            NodeData::Data(data) => Some(data),
            _ => None,
        }
    }

    /// 决策节点的内容。
    pub fn as_decision(&self) -> Option<&DecisionNode> {
        match &self.data {
            NodeData::Decision(decision) => Some(decision),
            _ => None,
        }
    }
}

/// 以 ID 为索引的节点图。
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u32,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: ENTRY.0 + 1,
        }
    }
}

impl Tree {
    /// 创建一个空图，ID 2 留给入口节点。
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配新的 ID。
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// 分配 ID 并加入节点。
    pub fn add(&mut self, data: NodeData) -> NodeId {
        let id = self.next_id();
        self.nodes.insert(id, Node::new(data));
        id
    }

    /// 以指定 ID 加入节点。
    pub fn insert(&mut self, id: NodeId, node: Node) -> Option<Node> {
        self.next_id = self.next_id.max(id.0 + 1);
        self.nodes.insert(id, node)
    }

    /// 移除节点，不修改其他节点的引用。
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    #[allow(missing_docs)]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[allow(missing_docs)]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    #[allow(missing_docs)]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// 节点数量。
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 是否没有节点。
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 按 ID 升序遍历。
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// 所有 ID，升序。
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// 把所有对 `old` 的引用改为 `new`，并移除 `old`。
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Option<Node> {
        self.redirect(old, new);
        self.nodes.remove(&old)
    }

    /// 把节点 `old` 改名为 `new`，同时更新所有引用。
    pub fn rename(&mut self, old: NodeId, new: NodeId) {
        if let Some(node) = self.nodes.remove(&old) {
            self.redirect(old, new);
            self.insert(new, node);
        }
    }

    fn redirect(&mut self, old: NodeId, new: NodeId) {
        for node in self.nodes.values_mut() {
            for child in node.children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> NodeData {
        NodeData::Documentation(DocumentationNode {
            documentation: text.into(),
        })
    }

    #[test]
    fn ids_start_after_entry() {
        let mut tree = Tree::new();
        assert_eq!(tree.add(doc("a")), NodeId(3));
        assert_eq!(tree.add(doc("b")), NodeId(4));
        tree.insert(NodeId(10), Node::new(doc("c")));
        assert_eq!(tree.next_id(), NodeId(11));
    }

    #[test]
    fn replace_redirects_every_parent() {
        let mut tree = Tree::new();
        let a = tree.add(doc("a"));
        let b = tree.add(doc("b"));
        let shared = tree.add(doc("shared"));
        let target = tree.add(doc("target"));
        tree.get_mut(a).unwrap().children.push(shared);
        tree.get_mut(b).unwrap().children.push(shared);

        tree.replace(shared, target);
        assert!(!tree.contains(shared));
        assert_eq!(tree.get(a).unwrap().children, vec![target]);
        assert_eq!(tree.get(b).unwrap().children, vec![target]);
    }

    #[test]
    fn rename_moves_node() {
        let mut tree = Tree::new();
        let a = tree.add(doc("a"));
        let b = tree.add(doc("b"));
        tree.get_mut(a).unwrap().children.push(b);
        tree.rename(b, ENTRY);
        assert!(tree.contains(ENTRY));
        assert!(!tree.contains(b));
        assert_eq!(tree.get(a).unwrap().children, vec![ENTRY]);
    }
}
