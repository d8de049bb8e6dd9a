//! 节点图优化

use std::collections::{BTreeMap, BTreeSet};

use super::{Node, NodeId, Tree, ENTRY};

/// 压平空节点、提升根节点并移除不可达节点
pub fn optimize(tree: &mut Tree) {
    flatten_empty_nodes(tree);
    promote_root(tree);
    cull_unreachable(tree, ENTRY);
}

/// 不带数据、只有一个子节点的数据节点
fn forwards_to(node: &Node) -> Option<NodeId> {
    match node.as_data() {
        Some(data) if data.is_empty() && node.children.len() == 1 => Some(node.children[0]),
        _ => None,
    }
}

/// 把入口以外的空转发节点替换为其唯一的子节点
pub fn flatten_empty_nodes(tree: &mut Tree) {
    loop {
        let next = tree
            .iter()
            .filter(|(id, _)| *id != ENTRY)
            .find_map(|(id, node)| forwards_to(node).map(|child| (id, child)));
        let Some((id, child)) = next else {
            break;
        };
        tree.replace(id, child);
    }
}

/// 入口节点为空转发节点时，由它的子节点接替 ID 2
pub fn promote_root(tree: &mut Tree) {
    while let Some(child) = tree.get(ENTRY).and_then(forwards_to) {
        tree.remove(ENTRY);
        tree.rename(child, ENTRY);
    }
}

/// 从 `root` 出发可达的节点
pub fn reachable(tree: &Tree, root: NodeId) -> BTreeSet<NodeId> {
    let mut visited = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(node) = tree.get(id) {
            stack.extend(node.children.iter().rev());
        }
    }
    visited
}

/// 找出环上的一个节点
pub fn find_cycle(tree: &Tree) -> Option<NodeId> {
    // 1: 在栈上，2: 已完成
    let mut state = BTreeMap::new();
    for root in tree.ids() {
        if state.contains_key(&root) {
            continue;
        }
        let mut stack = vec![(root, 0)];
        state.insert(root, 1);
        while let Some((id, next)) = stack.pop() {
            let child = tree.get(id).and_then(|node| node.children.get(next)).copied();
            let Some(child) = child else {
                state.insert(id, 2);
                continue;
            };
            stack.push((id, next + 1));
            match state.get(&child) {
                Some(1) => return Some(child),
                Some(_) => {}
                None => {
                    state.insert(child, 1);
                    stack.push((child, 0));
                }
            }
        }
    }
    None
}

/// 移除不可达节点，返回被移除的 ID
pub fn cull_unreachable(tree: &mut Tree, root: NodeId) -> Vec<NodeId> {
    let reachable = reachable(tree, root);
    let removed = tree
        .ids()
        .into_iter()
        .filter(|id| !reachable.contains(id))
        .collect::<Vec<_>>();
    for id in &removed {
        tree.remove(*id);
    }
    removed
}

/// 每个可达节点被引用的次数；根节点计入一次外部引用
pub fn reference_counts(tree: &Tree, root: NodeId) -> BTreeMap<NodeId, usize> {
    let reachable = reachable(tree, root);
    let mut counts = reachable
        .iter()
        .map(|id| (*id, 0))
        .collect::<BTreeMap<_, _>>();
    if let Some(count) = counts.get_mut(&root) {
        *count += 1;
    }
    for id in &reachable {
        let Some(node) = tree.get(*id) else { continue };
        for child in &node.children {
            if let Some(count) = counts.get_mut(child) {
                *count += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NodeData;
    use crate::schema::DataNode;

    fn data(weight: Option<i32>) -> Node {
        Node::new(NodeData::Data(DataNode {
            weight,
            ..Default::default()
        }))
    }

    fn tree(nodes: &[(u32, Option<i32>, &[u32])]) -> Tree {
        let mut tree = Tree::new();
        for (id, weight, children) in nodes {
            let mut node = data(*weight);
            node.children = children.iter().map(|c| NodeId(*c)).collect();
            tree.insert(NodeId(*id), node);
        }
        tree
    }

    #[test]
    fn flattens_chains_of_empty_nodes() {
        let mut tree = tree(&[
            (2, Some(1), &[3]),
            (3, None, &[4]),
            (4, None, &[5]),
            (5, Some(2), &[]),
        ]);
        flatten_empty_nodes(&mut tree);
        assert_eq!(tree.ids(), vec![NodeId(2), NodeId(5)]);
        assert_eq!(tree.get(ENTRY).unwrap().children, vec![NodeId(5)]);
    }

    #[test]
    fn keeps_leaves_and_branching_nodes() {
        let mut tree = tree(&[(2, Some(1), &[3, 4]), (3, None, &[]), (4, None, &[3, 3])]);
        flatten_empty_nodes(&mut tree);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn unimplemented_nodes_are_kept() {
        let mut tree = Tree::new();
        tree.insert(ENTRY, data(Some(1)));
        let mut node = Node::new(NodeData::Data(DataNode {
            implemented: false,
            ..Default::default()
        }));
        node.children.push(NodeId(4));
        tree.insert(NodeId(3), node);
        tree.insert(NodeId(4), data(Some(2)));
        tree.get_mut(ENTRY).unwrap().children.push(NodeId(3));
        flatten_empty_nodes(&mut tree);
        assert!(tree.contains(NodeId(3)));
    }

    #[test]
    fn promotes_root() {
        let mut tree = tree(&[(2, None, &[3]), (3, None, &[4]), (4, Some(7), &[5]), (5, Some(1), &[])]);
        flatten_empty_nodes(&mut tree);
        promote_root(&mut tree);
        assert_eq!(tree.ids(), vec![ENTRY, NodeId(5)]);
        let root = tree.get(ENTRY).unwrap();
        assert_eq!(root.as_data().unwrap().weight, Some(7));
        assert_eq!(root.children, vec![NodeId(5)]);
    }

    #[test]
    fn finds_cycles() {
        let acyclic = tree(&[(2, Some(1), &[3, 4]), (3, Some(2), &[4]), (4, Some(3), &[])]);
        assert_eq!(find_cycle(&acyclic), None);

        let cyclic = tree(&[(2, Some(1), &[3]), (3, Some(2), &[4]), (4, Some(3), &[3])]);
        assert_eq!(find_cycle(&cyclic), Some(NodeId(3)));
    }

    #[test]
    fn culls_and_counts() {
        let mut tree = tree(&[
            (2, Some(1), &[3, 4]),
            (3, Some(2), &[5]),
            (4, Some(3), &[5]),
            (5, Some(4), &[]),
            (6, Some(5), &[5]),
        ]);
        assert_eq!(cull_unreachable(&mut tree, ENTRY), vec![NodeId(6)]);
        let counts = reference_counts(&tree, ENTRY);
        assert_eq!(counts[&ENTRY], 1);
        assert_eq!(counts[&NodeId(3)], 1);
        assert_eq!(counts[&NodeId(5)], 2);
    }
}
