//! 反编译器：把节点图还原为脚本。

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::backend::builder::accepts;
use crate::backend::optimize;
use crate::backend::record::{self, GraphSource};
use crate::backend::{Node, NodeData, NodeId, Tree, ENTRY};
use crate::error::DecompileError;
use crate::frontend::ast::{self, Condition, Field};
use crate::options::Options;
use crate::schema::{DataNode, FactionSet, OfferText};

mod writer;
pub use writer::TabbedWriter;

/// 反编译一组记录
pub fn decompile<S: GraphSource + ?Sized>(
    source: &S,
    options: &Options,
) -> Result<String, DecompileError> {
    let tree = record::load(source)?;
    Decompiler::new(tree).run(options)
}

/// 反编译器
pub struct Decompiler {
    tree: Tree,
    /// 规范化势力集合到组名
    groups: HashMap<String, String>,
    declarations: Vec<ast::Group>,
    /// 势力分支的两个条件
    branches: HashMap<NodeId, (Condition, Option<Condition>)>,
    references: BTreeMap<NodeId, usize>,
}

impl Decompiler {
    /// 创建一个新的 `Decompiler`。
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            groups: HashMap::new(),
            declarations: vec![],
            branches: HashMap::new(),
            references: BTreeMap::new(),
        }
    }

    /// 完成全部步骤并输出脚本。
    pub fn run(mut self, options: &Options) -> Result<String, DecompileError> {
        optimize::flatten_empty_nodes(&mut self.tree);
        optimize::promote_root(&mut self.tree);
        optimize::cull_unreachable(&mut self.tree, ENTRY);
        // 合并决策链只移走引用数为 1 的决策节点，其余节点的引用数不变
        self.references = optimize::reference_counts(&self.tree, ENTRY);
        self.collect_groups();
        self.recover_branches()?;
        self.merge_chains();
        Ok(self.print(options))
    }

    fn add_group(&mut self, set: &FactionSet) {
        if set.is_empty() || self.groups.contains_key(&set.canonical()) {
            return;
        }
        let name = format!("group_{}", self.declarations.len());
        self.groups.insert(set.canonical(), name.clone());
        self.declarations.push(ast::Group {
            name,
            factions: set.0.clone(),
        });
    }

    /// 按 ID 升序为出现过的势力集合命名
    fn collect_groups(&mut self) {
        let sets = self
            .tree
            .iter()
            .filter_map(|(_, node)| node.as_data())
            .flat_map(|data| [data.offer_group.clone(), data.hostile_group.clone()])
            .flatten()
            .collect::<Vec<_>>();
        for set in &sets {
            self.add_group(set);
        }
    }

    fn group_name(&self, set: &FactionSet) -> String {
        self.groups
            .get(&set.canonical())
            .cloned()
            .unwrap_or_else(|| set.canonical())
    }

    fn offer_group(&self, id: NodeId) -> Option<&FactionSet> {
        self.tree
            .get(id)
            .and_then(Node::as_data)
            .and_then(|data| data.offer_group.as_ref())
            .filter(|set| !set.is_empty())
    }

    /// 检查决策节点，并把势力分支还原为 `group(...)` 条件
    fn recover_branches(&mut self) -> Result<(), DecompileError> {
        for (id, node) in self.tree.iter() {
            let Some(decision) = node.as_decision() else {
                continue;
            };
            if node.children.len() != 2 {
                return Err(DecompileError::DecisionArity {
                    id,
                    count: node.children.len(),
                });
            }
            if !decision.is_branch() {
                continue;
            }
            let first = self
                .offer_group(node.children[0])
                .ok_or(DecompileError::InvalidBranch(id))?;
            // 共享的第二分支只能写成 `else` 加 `call`
            let second = self
                .offer_group(node.children[1])
                .filter(|_| self.references(node.children[1]) <= 1);
            let a = Condition::Group(self.group_name(first));
            let b = second.map(|set| Condition::Group(self.group_name(set)));
            self.branches.insert(id, (a, b));
        }
        Ok(())
    }

    fn conditions(&self, id: NodeId) -> (Condition, Option<Condition>) {
        if let Some(branch) = self.branches.get(&id) {
            return branch.clone();
        }
        let nickname = self
            .tree
            .get(id)
            .and_then(Node::as_decision)
            .map(|decision| decision.nickname.clone())
            .unwrap_or_default();
        (Condition::Named(nickname), None)
    }

    /// 把第二个子节点为决策节点的决策链合并为多路分支。被共享的决策节点保持原样。
    fn merge_chains(&mut self) {
        let mut queue = self.tree.ids().into_iter().collect::<VecDeque<_>>();
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.tree.get(id) else {
                continue;
            };
            let next = match &node.data {
                NodeData::Decision(_) => node.children.get(1).copied(),
                NodeData::IfElse(conditions) if conditions.len() < node.children.len() => {
                    node.children.last().copied()
                }
                _ => None,
            };
            let Some(next) = next.filter(|next| *next != id) else {
                continue;
            };
            if self.references(next) > 1 {
                continue;
            }
            let Some(next_node) = self.tree.get(next).filter(|n| n.as_decision().is_some()) else {
                continue;
            };
            let next_children = next_node.children.clone();

            let (mut conditions, mut children) = match &node.data {
                NodeData::IfElse(conditions) => {
                    let mut children = node.children.clone();
                    children.pop();
                    (conditions.clone(), children)
                }
                _ => (vec![self.conditions(id).0], vec![node.children[0]]),
            };
            let (a, b) = self.conditions(next);
            conditions.push(a);
            conditions.extend(b);
            children.extend(next_children);

            self.tree.remove(next);
            self.tree.insert(
                id,
                Node {
                    data: NodeData::IfElse(conditions),
                    children,
                },
            );
            queue.push_back(id);
        }
    }

    fn references(&self, id: NodeId) -> usize {
        self.references.get(&id).copied().unwrap_or(0)
    }

    /// 数据节点的字段，按重新编译时能依次并入同一节点的顺序排列。
    ///
    /// `weight`、`allowable_zone_types`、`offer_text` 只能并入空节点，且三者至多出现一个；
    /// 势力组可以并入它们之后；文本、难度与通讯序列只能与势力组共存，排在最后。
    fn fields(&self, data: &DataNode, branch_parent: bool) -> Vec<Field> {
        let mut fields = vec![];
        if let Some(weight) = data.weight {
            fields.push(Field::Weight(weight));
        }
        if let Some(zones) = data.allowable_zone_types.as_ref().filter(|z| !z.is_empty()) {
            fields.push(Field::AllowableZoneTypes(zones.clone()));
        }
        if !data.offer_texts.is_empty() {
            fields.push(Field::OfferText(data.offer_texts.clone()));
        }
        if let Some(set) = data.offer_group.as_ref().filter(|set| !set.is_empty()) {
            if !branch_parent {
                fields.push(Field::OfferGroup(self.group_name(set)));
            }
        }
        if let Some(set) = data.hostile_group.as_ref().filter(|set| !set.is_empty()) {
            fields.push(Field::HostileGroup(self.group_name(set)));
        }
        if let Some(text) = &data.reward_text {
            fields.push(Field::RewardText(text.clone()));
        }
        if let Some(text) = &data.failure_text {
            fields.push(Field::FailureText(text.clone()));
        }
        fields.extend(data.objective_texts.iter().cloned().map(Field::ObjectiveText));
        if let Some((min, max)) = data.difficulty {
            fields.push(Field::Difficulty(min, max));
        }
        fields.extend(data.comm_sequences.iter().cloned().map(Field::CommSequence));
        fields
    }

    /// 紧接着 `parent` 的语句输出 `child` 时，重新编译能否在 `parent` 之下得到新节点
    fn continues(&self, parent: &Node, child: NodeId) -> bool {
        if self.references(child) > 1 {
            return false;
        }
        let Some(node) = self.tree.get(child) else {
            return false;
        };
        let Some(data) = node.as_data() else {
            return true;
        };
        // 没有字段的节点会并入父节点
        let Some(first) = self.fields(data, false).into_iter().next() else {
            return false;
        };
        match parent.as_data() {
            Some(parent_data) => {
                let kind = parent_data.kind(parent.children.len() > 1);
                !accepts(parent_data, kind, &first)
            }
            None => true,
        }
    }

    fn print(&self, options: &Options) -> String {
        let mut printer = Printer {
            decompiler: self,
            w: TabbedWriter::new(options.indent),
            calls: BTreeSet::new(),
        };
        printer.w.append_line("# Vignette Info Script");
        printer.w.append_line("");
        for group in &self.declarations {
            printer.w.append_line(&group.to_string());
        }
        printer.w.append_line("");

        printer.write_node(ENTRY, false);

        let mut printed = BTreeSet::new();
        loop {
            let next = printer.calls.difference(&printed).next().copied();
            let Some(id) = next else {
                break;
            };
            printed.insert(id);
            printer.w.append_line("");
            printer.w.append_line(&format!("sub node_{}", id));
            printer.w.indent();
            printer.write_node(id, false);
            printer.w.unindent();
            printer.w.append_line("end");
        }
        printer.w.finish()
    }
}

/// 输出脚本
struct Printer<'a> {
    decompiler: &'a Decompiler,
    w: TabbedWriter,
    /// 以 `call` 引用、需要输出为 `sub` 的节点
    calls: BTreeSet<NodeId>,
}

impl<'a> Printer<'a> {
    fn call(&mut self, id: NodeId) {
        self.w.append_line(&format!("call node_{};", id));
        self.calls.insert(id);
    }

    /// 分支体总是从新的数据节点开始编译，未共享的节点都可以展开
    fn write_block(&mut self, id: NodeId, branch_parent: bool) {
        self.w.indent();
        if self.decompiler.references(id) > 1 {
            self.call(id);
        } else {
            self.write_node(id, branch_parent);
        }
        self.w.unindent();
    }

    fn write_node(&mut self, id: NodeId, branch_parent: bool) {
        let d: &'a Decompiler = self.decompiler;
        let Some(node) = d.tree.get(id) else {
            return;
        };

        match &node.data {
            NodeData::IfElse(conditions) => {
                for (i, (condition, child)) in conditions.iter().zip(&node.children).enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    self.w.append_line(&format!("{} {}", keyword, condition));
                    self.write_block(*child, matches!(condition, Condition::Group(_)));
                }
                if conditions.len() < node.children.len() {
                    self.w.append_line("else");
                    if let Some(child) = node.children.last() {
                        self.write_block(*child, false);
                    }
                }
                self.w.append_line("end");
            }
            NodeData::Decision(_) => {
                let (a, b) = d.conditions(id);
                self.w.append_line(&format!("if {}", a));
                if let Some(child) = node.children.first() {
                    self.write_block(*child, matches!(a, Condition::Group(_)));
                }
                match &b {
                    Some(b) => self.w.append_line(&format!("elif {}", b)),
                    None => self.w.append_line("else"),
                }
                if let Some(child) = node.children.get(1) {
                    self.write_block(*child, b.is_some());
                }
                self.w.append_line("end");
            }
            NodeData::Documentation(doc) => {
                self.w.append_line(&format!("doc {};", doc.documentation));
                self.write_children(node);
            }
            NodeData::Data(data) => {
                self.write_data(data, branch_parent);
                self.write_children(node);
            }
        }
    }

    /// 只有最后一个子节点可能接着父节点展开，其余的子节点由 `call` 挂上
    fn write_children(&mut self, node: &Node) {
        let Some((last, rest)) = node.children.split_last() else {
            return;
        };
        for child in rest {
            self.call(*child);
        }
        if self.decompiler.continues(node, *last) {
            self.write_node(*last, false);
        } else {
            self.call(*last);
        }
    }

    fn write_data(&mut self, data: &DataNode, branch_parent: bool) {
        for field in self.decompiler.fields(data, branch_parent) {
            match &field {
                Field::OfferText(entries) => self.write_offer_text(entries),
                field => self.w.append_line(&format!("{};", field)),
            }
        }

        // 放在最后，保证重新编译时并入本节点而不是父节点
        if !data.implemented {
            self.w.append_line("err_unimplemented;");
        }
    }

    fn write_offer_text(&mut self, entries: &[OfferText]) {
        self.w.append_line("offer_text (");
        self.w.indent();
        for (i, entry) in entries.iter().enumerate() {
            let mut line = String::new();
            // 写入 String 不会失败
            let _ = ast::write_offer_entry(&mut line, entry);
            if i + 1 < entries.len() {
                line.push(',');
            }
            self.w.append_line(&line);
        }
        self.w.unindent();
        self.w.append_line(");");
    }
}
