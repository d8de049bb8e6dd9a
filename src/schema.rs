//! 节点图中的字段类型。

use std::fmt::Display;
use std::str::FromStr;

/// 势力集合，按规范化字符串比较。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactionSet(pub Vec<String>);

impl FactionSet {
    /// 规范化表示：以 `, ` 连接。
    pub fn canonical(&self) -> String {
        self.0.join(", ")
    }

    /// 是否为空集合。
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 是否包含某个势力（忽略大小写）。
    pub fn contains(&self, faction: &str) -> bool {
        self.0.iter().any(|f| f.eq_ignore_ascii_case(faction))
    }
}

impl Display for FactionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// 带参数的文本引用。
#[derive(Debug, Clone, PartialEq)]
pub struct VignetteString {
    /// 文本资源 ID
    pub message_id: i32,
    /// 参数
    pub args: Vec<String>,
}

impl Display for VignetteString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message_id)?;
        for arg in &self.args {
            write!(f, ", {}", arg)?;
        }
        Ok(())
    }
}

/// 任务目标文本。
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveText {
    /// 目标名称
    pub target: String,
    /// 文本
    pub text: VignetteString,
}

/// `offer_text` 条目的操作。
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferTextOp {
    Append,
    Replace,
}

/// `offer_text` 条目的单复数标记。
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plurality {
    #[default]
    None,
    Singular,
    Plural,
}

/// `offer_text` 中的一项。
#[derive(Debug, Clone, PartialEq)]
pub struct OfferTextItem {
    /// 文本资源 ID
    pub message_id: i32,
    /// 单复数
    pub plurality: Plurality,
    /// 参数
    pub args: Vec<String>,
}

/// 一条 `offer_text`。
#[derive(Debug, Clone, PartialEq)]
pub struct OfferText {
    /// 操作
    pub op: OfferTextOp,
    /// 文本项
    pub items: Vec<OfferTextItem>,
}

/// 通讯序列的接收方。
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommTarget {
    None,
    Player,
    Target,
    Friendly,
    Hostile,
    Base,
}

/// 通讯序列的发起方。
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommSource {
    None,
    Player,
    Target,
    Friendly,
    Hostile,
    Base,
}

/// 通讯序列。
#[derive(Debug, Clone, PartialEq)]
pub struct CommSequence {
    /// 触发事件
    pub event: String,
    /// 接收方
    pub target: CommTarget,
    /// 三个浮点参数
    pub floats: (f32, f32, f32),
    /// 发起方
    pub source: CommSource,
    /// 通讯名称
    pub comm: String,
}

macro_rules! keyword_enum {
    ($ty:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        impl $ty {
            /// 脚本与记录中使用的关键字。
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)*
                }
            }
        }

        impl FromStr for $ty {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($ty::$variant);
                    }
                )*
                Err(())
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum!(OfferTextOp { Append => "append", Replace => "replace" });
keyword_enum!(Plurality { None => "none", Singular => "singular", Plural => "plural" });
keyword_enum!(CommTarget {
    None => "none",
    Player => "player",
    Target => "target",
    Friendly => "friendly",
    Hostile => "hostile",
    Base => "base",
});
keyword_enum!(CommSource {
    None => "none",
    Player => "player",
    Target => "target",
    Friendly => "friendly",
    Hostile => "hostile",
    Base => "base",
});

/// 数据节点当前占用的字段簇。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// 没有互斥字段
    None,
    /// 已有子节点，不再接受字段
    Closed,
    /// failure/reward/objective 文本
    Objective,
    /// 难度
    Difficulty,
    /// 权重
    Weight,
    /// 通讯序列
    CommSequence,
    /// 可用区域类型
    AllowableZone,
    /// offer_text
    Offer,
}

impl DataKind {
    /// `offer_group` / `hostile_group` 可以并入的种类
    pub fn accepts_groups(self) -> bool {
        matches!(
            self,
            DataKind::None | DataKind::Weight | DataKind::AllowableZone | DataKind::Offer
        )
    }
}

/// 数据节点。
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub weight: Option<i32>,
    pub implemented: bool,
    pub offer_group: Option<FactionSet>,
    pub hostile_group: Option<FactionSet>,
    pub allowable_zone_types: Option<Vec<String>>,
    pub difficulty: Option<(f32, f32)>,
    pub failure_text: Option<VignetteString>,
    pub reward_text: Option<VignetteString>,
    pub objective_texts: Vec<ObjectiveText>,
    pub offer_texts: Vec<OfferText>,
    pub comm_sequences: Vec<CommSequence>,
}

impl Default for DataNode {
    fn default() -> Self {
        Self {
            weight: None,
            implemented: true,
            offer_group: None,
            hostile_group: None,
            allowable_zone_types: None,
            difficulty: None,
            failure_text: None,
            reward_text: None,
            objective_texts: Vec::new(),
            offer_texts: Vec::new(),
            comm_sequences: Vec::new(),
        }
    }
}

impl DataNode {
    /// 计算节点的种类。
    pub fn kind(&self, has_children: bool) -> DataKind {
        if has_children {
            DataKind::Closed
        } else if self.reward_text.is_some()
            || self.failure_text.is_some()
            || !self.objective_texts.is_empty()
        {
            DataKind::Objective
        } else if self.difficulty.is_some() {
            DataKind::Difficulty
        } else if self.weight.is_some() {
            DataKind::Weight
        } else if !self.comm_sequences.is_empty() {
            DataKind::CommSequence
        } else if self.allowable_zone_types.is_some() {
            DataKind::AllowableZone
        } else if !self.offer_texts.is_empty() {
            DataKind::Offer
        } else {
            DataKind::None
        }
    }

    /// 是否不携带任何数据。
    pub fn is_empty(&self) -> bool {
        self.implemented && !self.has_fields()
    }

    /// 除 `implemented` 以外是否有任何字段。
    pub fn has_fields(&self) -> bool {
        self.weight.is_some()
            || self.offer_group.as_ref().is_some_and(|g| !g.is_empty())
            || self.hostile_group.as_ref().is_some_and(|g| !g.is_empty())
            || self.allowable_zone_types.as_ref().is_some_and(|z| !z.is_empty())
            || self.difficulty.is_some()
            || self.failure_text.is_some()
            || self.reward_text.is_some()
            || !self.objective_texts.is_empty()
            || !self.offer_texts.is_empty()
            || !self.comm_sequences.is_empty()
    }
}

/// 决策节点。
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionNode {
    /// 条件名，或表示势力分支的 [`DecisionNode::BRANCH`]
    pub nickname: String,
}

impl DecisionNode {
    /// 势力分支的哨兵条件名
    pub const BRANCH: &'static str = "branch";

    /// 是否为势力分支。
    pub fn is_branch(&self) -> bool {
        self.nickname.eq_ignore_ascii_case(Self::BRANCH)
    }
}

/// 文档节点。
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentationNode {
    /// 文档名
    pub documentation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_priority() {
        let mut data = DataNode::default();
        assert_eq!(data.kind(false), DataKind::None);
        data.weight = Some(3);
        assert_eq!(data.kind(false), DataKind::Weight);
        data.difficulty = Some((1.0, 2.0));
        assert_eq!(data.kind(false), DataKind::Difficulty);
        assert_eq!(data.kind(true), DataKind::Closed);
    }

    #[test]
    fn groups_do_not_change_kind() {
        let data = DataNode {
            offer_group: Some(FactionSet(vec!["li_n_grp".into()])),
            hostile_group: Some(FactionSet(vec!["li_p_grp".into()])),
            ..Default::default()
        };
        assert_eq!(data.kind(false), DataKind::None);
        assert!(!data.is_empty());
    }

    #[test]
    fn unimplemented_is_not_empty() {
        let data = DataNode {
            implemented: false,
            ..Default::default()
        };
        assert!(!data.is_empty());
        assert!(!data.has_fields());
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!("Replace".parse::<OfferTextOp>(), Ok(OfferTextOp::Replace));
        assert_eq!("PLAYER".parse::<CommTarget>(), Ok(CommTarget::Player));
        assert!("nobody".parse::<CommSource>().is_err());
        assert_eq!(Plurality::Singular.to_string(), "singular");
    }
}
