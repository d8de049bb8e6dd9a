//! 解释运行

use colorized::{Color, Colors};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::backend::{Node, NodeData, NodeId, Tree, ENTRY};
use crate::options::Options;
use crate::schema::{DataNode, DecisionNode, FactionSet, OfferTextOp};

use super::{Parameters, VignetteInfo};

/// 运行时错误。
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("cannot find node {0}")]
    MissingNode(NodeId),

    #[error("decision node {id} has {count} children, expected 2")]
    DecisionArity { id: NodeId, count: usize },

    #[error("node {0} cannot be evaluated")]
    Unevaluable(NodeId),

    #[error("walk does not terminate (at node {0})")]
    Cycle(NodeId),
}

/// 虚拟机。
pub struct VM<'a> {
    tree: &'a Tree,
    params: &'a Parameters,
    rng: StdRng,
    /// Enable tracing.
    trace: bool,
}

impl<'a> VM<'a> {
    /// 创建虚拟机，随机数种子取自选项。
    pub fn new(tree: &'a Tree, params: &'a Parameters, options: &Options) -> Self {
        Self {
            tree,
            params,
            rng: StdRng::seed_from_u64(options.seed),
            trace: options.trace,
        }
    }

    fn node(&self, id: NodeId) -> Result<&'a Node, RuntimeError> {
        self.tree.get(id).ok_or(RuntimeError::MissingNode(id))
    }

    /// 从入口节点走到叶子。未实现的节点与势力不匹配的分支使结果带上错误标记。
    pub fn run(mut self) -> Result<VignetteInfo, RuntimeError> {
        let mut info = VignetteInfo::default();
        let mut current = Some(ENTRY);
        let mut steps = 0;

        while let Some(id) = current {
            steps += 1;
            if steps > self.tree.len() {
                return Err(RuntimeError::Cycle(id));
            }
            let node = self.node(id)?;

            if self.trace {
                let trace = format!("processing: {} {}", id, describe(node))
                    .color(Colors::BrightBlackFg);
                eprintln!("{trace}");
            }

            match &node.data {
                NodeData::Documentation(doc) => {
                    info.documentation.push(doc.documentation.clone());
                }
                NodeData::Data(data) => {
                    if !data.implemented {
                        error(id, "unimplemented");
                        info.is_error = true;
                        return Ok(info);
                    }
                    self.apply(data, &mut info);
                }
                NodeData::Decision(decision) => match self.decide(id, node, decision)? {
                    Some(next) => {
                        current = Some(next);
                        continue;
                    }
                    None => {
                        info.is_error = true;
                        return Ok(info);
                    }
                },
                NodeData::IfElse(_) => return Err(RuntimeError::Unevaluable(id)),
            }

            current = node.children.first().copied();
        }

        Ok(info)
    }

    fn apply(&mut self, data: &DataNode, info: &mut VignetteInfo) {
        if let Some(text) = &data.reward_text {
            info.reward_text = Some(text.clone());
        }
        if let Some(text) = &data.failure_text {
            info.failure_text = Some(text.clone());
        }
        let chosen = match data.offer_texts.len() {
            0 => None,
            1 => data.offer_texts.first(),
            n => data.offer_texts.get(self.rng.gen_range(0..n)),
        };
        if let Some(offer) = chosen {
            if offer.op == OfferTextOp::Replace {
                info.offer_text.clear();
            }
            info.offer_text.extend(offer.items.iter().cloned());
        }
        for ot in &data.objective_texts {
            info.objective_texts
                .insert(ot.target.clone(), ot.text.clone());
        }
        for cs in &data.comm_sequences {
            info.comm_sequences.insert(cs.event.clone(), cs.clone());
        }
    }

    /// 选出下一个节点；`None` 表示分支无法选择。
    fn decide(
        &self,
        id: NodeId,
        node: &Node,
        decision: &DecisionNode,
    ) -> Result<Option<NodeId>, RuntimeError> {
        let [first, second] = node.children[..] else {
            return Err(RuntimeError::DecisionArity {
                id,
                count: node.children.len(),
            });
        };

        if decision.is_branch() {
            let offer_group = |child| {
                self.node(child).map(|node| {
                    node.as_data()
                        .and_then(|data| data.offer_group.as_ref())
                        .filter(|set| !set.is_empty())
                })
            };
            let matches = |set: &FactionSet| {
                self.params
                    .offer_group
                    .as_deref()
                    .is_some_and(|group| set.contains(group))
            };

            let Some(a) = offer_group(first)? else {
                error(id, "invalid branch node");
                return Ok(None);
            };
            if matches(a) {
                return Ok(Some(first));
            }
            return match offer_group(second)? {
                Some(b) if matches(b) => Ok(Some(second)),
                Some(_) => {
                    error(
                        id,
                        &format!(
                            "{} not in either",
                            self.params.offer_group.as_deref().unwrap_or("<none>")
                        ),
                    );
                    Ok(None)
                }
                None => Ok(Some(second)),
            };
        }

        let condition = match self.params.condition(&decision.nickname) {
            Some(condition) => condition,
            None => {
                eprintln!(
                    "{}: unknown decision {}, assume false",
                    "warning".color(Colors::YellowFg),
                    decision.nickname
                );
                false
            }
        };
        Ok(Some(if condition { first } else { second }))
    }
}

fn describe(node: &Node) -> String {
    match &node.data {
        NodeData::Data(_) => "data".to_string(),
        NodeData::Decision(decision) => format!("decision {}", decision.nickname),
        NodeData::Documentation(doc) => format!("doc {}", doc.documentation),
        NodeData::IfElse(_) => "if".to_string(),
    }
}

fn error(id: NodeId, message: &str) {
    eprintln!("{}: {} at id={}", "error".color(Colors::RedFg), message, id);
}
