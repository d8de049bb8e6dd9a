//! 节点图构建器。

use std::collections::HashMap;

use crate::error::CompileError;
use crate::frontend::ast::{self, Condition, Field, IfBlock, IfElse, Statement};
use crate::schema::{DataKind, DataNode, DecisionNode, DocumentationNode, FactionSet};
use crate::utils::Span;

use super::optimize;
use super::{Node, NodeData, NodeId, Tree, ENTRY};

type Result<T> = std::result::Result<T, CompileError>;

/// 把脚本编译为节点图，并完成压平、根提升与剪枝。
///
/// 不依赖 [`check_module`](crate::frontend::check::check_module)：重名声明、
/// 未知的子程序与势力组在这里同样报错，未经检查的模块也能安全构建。
pub fn build(module: ast::Module, source_name: &str) -> Result<Tree> {
    let mut builder = TreeBuilder::new(source_name);
    let body = builder.declarations(module)?;
    builder.module(body)?;
    let mut tree = builder.tree;
    optimize::optimize(&mut tree);
    Ok(tree)
}

/// 用于构建节点图的构建器。
pub struct TreeBuilder<'a> {
    source_name: &'a str,
    tree: Tree,
    groups: HashMap<String, FactionSet>,
    subs: HashMap<String, NodeId>,
    sub_bodies: Vec<(NodeId, Vec<Span<Statement>>)>,
}

impl<'a> TreeBuilder<'a> {
    /// 创建一个新的 `TreeBuilder`，入口节点已就位。
    pub fn new(source_name: &'a str) -> Self {
        let mut tree = Tree::new();
        tree.insert(ENTRY, Node::new(NodeData::Data(DataNode::default())));
        Self {
            source_name,
            tree,
            groups: HashMap::new(),
            subs: HashMap::new(),
            sub_bodies: vec![],
        }
    }

    /// 第一阶段：登记势力组，为子程序预留占位节点，返回其余语句。
    pub fn declarations(&mut self, module: ast::Module) -> Result<Vec<Span<Statement>>> {
        let mut body = vec![];
        for statement in module.statements {
            let (line, column) = (statement.line, statement.column);
            match statement.into_inner() {
                Statement::Group(group) => {
                    if self.groups.contains_key(&group.name) {
                        return Err(self.error_at(
                            line,
                            column,
                            format!("Duplicate group '{}'", group.name),
                        ));
                    }
                    self.groups
                        .insert(group.name, FactionSet(group.factions));
                }
                Statement::Sub(sub) => {
                    if self.subs.contains_key(&sub.name) {
                        return Err(self.error_at(
                            line,
                            column,
                            format!("Duplicate sub '{}'", sub.name),
                        ));
                    }
                    let id = self.tree.add(NodeData::Data(DataNode::default()));
                    self.subs.insert(sub.name, id);
                    self.sub_bodies.push((id, sub.body));
                }
                other => body.push(Span::new(other, line, column)),
            }
        }
        Ok(body)
    }

    /// 第二阶段：从入口节点编译顶层语句，再编译各子程序体。
    pub fn module(&mut self, body: Vec<Span<Statement>>) -> Result<()> {
        self.sequence(ENTRY, &body)?;
        for (id, body) in std::mem::take(&mut self.sub_bodies) {
            self.sequence(id, &body)?;
        }
        Ok(())
    }

    fn sequence(&mut self, mut cursor: NodeId, statements: &[Span<Statement>]) -> Result<NodeId> {
        for statement in statements {
            cursor = self.statement(cursor, statement)?;
        }
        Ok(cursor)
    }

    fn statement(&mut self, cursor: NodeId, statement: &Span<Statement>) -> Result<NodeId> {
        match &**statement {
            Statement::Sub(_) | Statement::Group(_) => Err(self.error(
                statement,
                "Declarations can only appear in the top level",
            )),
            Statement::If(if_else) => self.if_else(cursor, if_else, statement),
            Statement::Call(name) => {
                let target = self
                    .subs
                    .get(name)
                    .copied()
                    .ok_or_else(|| self.error(statement, format!("Unknown sub '{}'", name)))?;
                self.attach(cursor, target, statement)?;
                Ok(cursor)
            }
            Statement::Unimplemented => {
                if let Some(NodeData::Data(data)) = self.data_mut(cursor) {
                    data.implemented = false;
                    return Ok(cursor);
                }
                let id = self.new_data(cursor, statement)?;
                if let Some(NodeData::Data(data)) = self.data_mut(id) {
                    data.implemented = false;
                }
                Ok(id)
            }
            Statement::Doc(name) => {
                let id = self.tree.add(NodeData::Documentation(DocumentationNode {
                    documentation: name.clone(),
                }));
                self.attach(cursor, id, statement)?;
                Ok(id)
            }
            Statement::Field(field) => self.field(cursor, field, statement),
        }
    }

    fn field(&mut self, cursor: NodeId, field: &Field, at: &Span<Statement>) -> Result<NodeId> {
        let accepted = match self.tree.get(cursor) {
            Some(Node {
                data: NodeData::Data(data),
                children,
            }) => accepts(data, data.kind(!children.is_empty()), field),
            _ => false,
        };
        let target = if accepted {
            cursor
        } else {
            self.new_data(cursor, at)?
        };

        let group = match field {
            Field::OfferGroup(name) | Field::HostileGroup(name) => Some(self.group(name, at)?),
            _ => None,
        };
        let Some(NodeData::Data(data)) = self.data_mut(target) else {
            unreachable!("field target is always a data node");
        };
        match field.clone() {
            Field::CommSequence(cs) => data.comm_sequences.push(cs),
            Field::FailureText(text) => data.failure_text = Some(text),
            Field::RewardText(text) => data.reward_text = Some(text),
            Field::ObjectiveText(ot) => data.objective_texts.push(ot),
            Field::OfferText(entries) => data.offer_texts.extend(entries),
            Field::Difficulty(min, max) => data.difficulty = Some((min, max)),
            Field::Weight(weight) => data.weight = Some(weight),
            Field::AllowableZoneTypes(types) => data.allowable_zone_types = Some(types),
            Field::OfferGroup(_) => data.offer_group = group,
            Field::HostileGroup(_) => data.hostile_group = group,
        }
        Ok(target)
    }

    fn if_else(&mut self, cursor: NodeId, if_else: &IfElse, at: &Span<Statement>) -> Result<NodeId> {
        let blocks = &if_else.blocks;
        let first = self.decision(&blocks[0].condition);
        self.attach(cursor, first, at)?;
        self.block(first, &blocks[0], at)?;

        let mut decision = first;
        for (i, block) in blocks.iter().enumerate().skip(1) {
            if i + 1 == blocks.len() {
                self.block(decision, block, at)?;
            } else {
                let next = self.decision(&block.condition);
                self.attach(decision, next, at)?;
                self.block(next, block, at)?;
                decision = next;
            }
        }
        Ok(first)
    }

    fn decision(&mut self, condition: &Condition) -> NodeId {
        let nickname = match condition {
            Condition::Named(name) => name.clone(),
            Condition::Group(_) => DecisionNode::BRANCH.to_string(),
            Condition::Else => unreachable!("`else` is always the last block"),
        };
        self.tree
            .add(NodeData::Decision(DecisionNode { nickname }))
    }

    fn block(&mut self, parent: NodeId, block: &IfBlock, at: &Span<Statement>) -> Result<()> {
        if let Condition::Group(name) = &block.condition {
            let group = self.group(name, at)?;
            let node = self.new_data(parent, at)?;
            if let Some(NodeData::Data(data)) = self.data_mut(node) {
                data.offer_group = Some(group);
            }
            self.sequence(node, &block.body)?;
            return Ok(());
        }

        // 只含一个 if 的分支直接挂上决策节点，不经过空数据节点
        if let Some(first) = block.body.first() {
            if let Statement::If(inner) = &**first {
                if let Some(extra) = block.body.get(1) {
                    return Err(self.error(extra, "Control flow cannot continue past if"));
                }
                self.if_else(parent, inner, first)?;
                return Ok(());
            }
        }

        let node = self.new_data(parent, at)?;
        self.sequence(node, &block.body)?;
        Ok(())
    }

    fn new_data<T>(&mut self, parent: NodeId, at: &Span<T>) -> Result<NodeId> {
        self.check_attach(parent, at)?;
        let id = self.tree.add(NodeData::Data(DataNode::default()));
        self.attach(parent, id, at)?;
        Ok(id)
    }

    fn check_attach<T>(&self, parent: NodeId, at: &Span<T>) -> Result<()> {
        match self.tree.get(parent) {
            Some(node) if matches!(node.data, NodeData::Decision(_)) && node.children.len() >= 2 => {
                Err(self.error(at, "Control flow cannot continue past if"))
            }
            Some(_) => Ok(()),
            None => Err(self.error(at, format!("Cannot find node {}", parent))),
        }
    }

    fn attach<T>(&mut self, parent: NodeId, child: NodeId, at: &Span<T>) -> Result<()> {
        self.check_attach(parent, at)?;
        if let Some(node) = self.tree.get_mut(parent) {
            node.children.push(child);
        }
        Ok(())
    }

    fn group<T>(&self, name: &str, at: &Span<T>) -> Result<FactionSet> {
        self.groups
            .get(name)
            .cloned()
            .ok_or_else(|| self.error(at, format!("Unknown group '{}'", name)))
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.tree.get_mut(id).map(|node| &mut node.data)
    }

    fn error<T>(&self, at: &Span<T>, message: impl Into<String>) -> CompileError {
        self.error_at(at.line, at.column, message)
    }

    fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> CompileError {
        CompileError::new(self.source_name, line, column, message)
    }
}

/// 当前节点能否接收该字段
pub(crate) fn accepts(data: &DataNode, kind: DataKind, field: &Field) -> bool {
    use DataKind as K;
    match field {
        Field::Weight(_) => kind == K::None && data.weight.is_none(),
        Field::AllowableZoneTypes(_) => kind == K::None,
        Field::OfferText(_) => kind == K::None,
        Field::OfferGroup(_) => kind.accepts_groups() && data.offer_group.is_none(),
        Field::HostileGroup(_) => kind.accepts_groups() && data.hostile_group.is_none(),
        Field::FailureText(_) => {
            matches!(kind, K::None | K::Objective) && data.failure_text.is_none()
        }
        Field::RewardText(_) => {
            matches!(kind, K::None | K::Objective) && data.reward_text.is_none()
        }
        Field::ObjectiveText(_) => matches!(kind, K::None | K::Objective),
        Field::Difficulty(_, _) => {
            matches!(kind, K::None | K::Difficulty) && data.difficulty.is_none()
        }
        Field::CommSequence(_) => matches!(kind, K::None | K::CommSequence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;

    fn compile_raw(source: &str) -> Result<Tree> {
        let module = parse(source, "test").unwrap();
        let mut builder = TreeBuilder::new("test");
        let body = builder.declarations(module)?;
        builder.module(body)?;
        Ok(builder.tree)
    }

    fn data(tree: &Tree, id: NodeId) -> &DataNode {
        tree.get(id).unwrap().as_data().unwrap()
    }

    #[test]
    fn fields_merge_into_one_node() {
        let tree = compile_raw("group g li_n_grp; offer_group g; weight 10;").unwrap();
        assert_eq!(tree.len(), 1);
        let entry = data(&tree, ENTRY);
        assert_eq!(entry.weight, Some(10));
        assert_eq!(entry.offer_group, Some(FactionSet(vec!["li_n_grp".into()])));
    }

    #[test]
    fn exclusive_kinds_chain() {
        let tree = compile_raw("weight 10; difficulty 1, 2; reward_text 5;").unwrap();
        assert_eq!(tree.len(), 3);
        let entry = tree.get(ENTRY).unwrap();
        assert_eq!(entry.children, vec![NodeId(3)]);
        assert_eq!(data(&tree, NodeId(3)).difficulty, Some((1.0, 2.0)));
        assert_eq!(tree.get(NodeId(3)).unwrap().children, vec![NodeId(4)]);
        assert!(data(&tree, NodeId(4)).reward_text.is_some());
    }

    #[test]
    fn objective_fields_share_a_node() {
        let tree = compile_raw(
            "reward_text 1; failure_text 2; objective_text a, 3; objective_text b, 4;",
        )
        .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(data(&tree, ENTRY).objective_texts.len(), 2);

        let tree = compile_raw("reward_text 1; reward_text 2;").unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn groups_do_not_join_difficulty() {
        let tree = compile_raw("group g x; difficulty 1, 2; hostile_group g;").unwrap();
        assert_eq!(tree.len(), 2);
        assert!(data(&tree, NodeId(3)).hostile_group.is_some());
    }

    #[test]
    fn call_shares_placeholder() {
        let tree =
            compile_raw("sub s weight 1; end if a call s; else call s; end").unwrap();
        let sub = NodeId(3);
        assert_eq!(data(&tree, sub).weight, Some(1));
        let decision = tree.get(ENTRY).unwrap().children[0];
        let bodies = &tree.get(decision).unwrap().children;
        assert_eq!(bodies.len(), 2);
        for body in bodies {
            assert_eq!(tree.get(*body).unwrap().children, vec![sub]);
        }
    }

    #[test]
    fn elif_chain_nests_decisions() {
        let tree = compile_raw("if a weight 1; elif b weight 2; else weight 3; end").unwrap();
        let first = tree.get(ENTRY).unwrap().children[0];
        let first_node = tree.get(first).unwrap();
        assert_eq!(first_node.as_decision().unwrap().nickname, "a");
        let second = tree.get(first_node.children[1]).unwrap();
        assert_eq!(second.as_decision().unwrap().nickname, "b");
        assert_eq!(second.children.len(), 2);
    }

    #[test]
    fn group_branch_blocks() {
        let tree = compile_raw(
            "group g1 a; group g2 b; if group(g1) weight 1; elif group(g2) weight 2; end",
        )
        .unwrap();
        let decision = tree.get(ENTRY).unwrap().children[0];
        let node = tree.get(decision).unwrap();
        assert!(node.as_decision().unwrap().is_branch());
        for (child, group) in node.children.iter().zip(["a", "b"]) {
            let body = data(&tree, *child);
            assert_eq!(body.offer_group, Some(FactionSet(vec![group.into()])));
        }
    }

    #[test]
    fn nested_if_attaches_directly() {
        let tree =
            compile_raw("if a if b weight 1; else weight 2; end else weight 3; end").unwrap();
        let outer = tree.get(ENTRY).unwrap().children[0];
        let inner = tree.get(outer).unwrap().children[0];
        assert!(tree.get(inner).unwrap().as_decision().is_some());
    }

    #[test]
    fn nothing_after_if() {
        let err = compile_raw("if a weight 1; else weight 2; end\nweight 3;").unwrap_err();
        assert_eq!(err.message, "Control flow cannot continue past if");
        assert_eq!(err.line, 2);

        let err = compile_raw("if a if b weight 1; else weight 2; end weight 3; else weight 4; end")
            .unwrap_err();
        assert_eq!(err.message, "Control flow cannot continue past if");
    }

    #[test]
    fn unimplemented_marks_cursor() {
        let tree = compile_raw("weight 1; err_unimplemented;").unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!data(&tree, ENTRY).implemented);

        let tree = compile_raw("doc intro; err_unimplemented;").unwrap();
        assert_eq!(tree.len(), 3);
        let doc = tree.get(ENTRY).unwrap().children[0];
        let child = tree.get(doc).unwrap().children[0];
        assert!(!data(&tree, child).implemented);
    }

    #[test]
    fn doc_node_becomes_cursor() {
        let tree = compile_raw("doc intro; weight 1;").unwrap();
        let doc = tree.get(ENTRY).unwrap().children[0];
        assert!(matches!(
            tree.get(doc).unwrap().data,
            NodeData::Documentation(_)
        ));
        let child = tree.get(doc).unwrap().children[0];
        assert_eq!(data(&tree, child).weight, Some(1));
    }

    #[test]
    fn duplicate_declarations_without_check() {
        let err = compile_raw("group g a; group g b;").unwrap_err();
        assert_eq!(err.message, "Duplicate group 'g'");
        let err = compile_raw("sub s weight 1; end\nsub s weight 2; end").unwrap_err();
        assert_eq!(err.message, "Duplicate sub 's'");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unknown_names() {
        let err = compile_raw("call s;").unwrap_err();
        assert_eq!(err.message, "Unknown sub 's'");
        let err = compile_raw("offer_group g;").unwrap_err();
        assert_eq!(err.message, "Unknown group 'g'");
    }
}
