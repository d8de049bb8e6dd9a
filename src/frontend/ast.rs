//! 抽象语法树。

use std::fmt::Display;

use crate::schema::{CommSequence, ObjectiveText, OfferText, Plurality, VignetteString};
use crate::utils::Span;

/// 语句
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `sub NAME ... end`
    Sub(Sub),
    /// `group NAME f1, f2;`
    Group(Group),
    /// `if ... elif ... else ... end`
    If(IfElse),
    /// `call NAME;`
    Call(String),
    /// `err_unimplemented;`
    Unimplemented,
    /// `doc NAME;`
    Doc(String),
    /// 写入数据节点的字段
    Field(Field),
}

/// 子程序声明
#[derive(Debug, Clone, PartialEq)]
pub struct Sub {
    /// 名称
    pub name: String,
    /// 子程序体
    pub body: Vec<Span<Statement>>,
}

/// 势力组声明
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// 名称
    pub name: String,
    /// 势力
    pub factions: Vec<String>,
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group {} {};", self.name, self.factions.join(", "))
    }
}

/// 条件分支
#[derive(Debug, Clone, PartialEq)]
pub struct IfElse {
    /// 各个分支，至少两个
    pub blocks: Vec<IfBlock>,
}

/// 条件分支中的一块
#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    /// 条件
    pub condition: Condition,
    /// 语句
    pub body: Vec<Span<Statement>>,
}

/// 分支条件
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// 具名条件
    Named(String),
    /// `group(NAME)`
    Group(String),
    /// `else`
    Else,
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Named(name) => f.write_str(name),
            Condition::Group(name) => write!(f, "group({})", name),
            Condition::Else => f.write_str("else"),
        }
    }
}

/// 字段语句
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    CommSequence(CommSequence),
    FailureText(VignetteString),
    RewardText(VignetteString),
    ObjectiveText(ObjectiveText),
    OfferText(Vec<OfferText>),
    Difficulty(f32, f32),
    Weight(i32),
    AllowableZoneTypes(Vec<String>),
    OfferGroup(String),
    HostileGroup(String),
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::CommSequence(cs) => write!(
                f,
                "comm_sequence {}, {}, {}, {}, {}, {}, {}",
                cs.event, cs.target, cs.floats.0, cs.floats.1, cs.floats.2, cs.source, cs.comm
            ),
            Field::FailureText(text) => write!(f, "failure_text {}", text),
            Field::RewardText(text) => write!(f, "reward_text {}", text),
            Field::ObjectiveText(ot) => write!(f, "objective_text {}, {}", ot.target, ot.text),
            Field::OfferText(entries) => {
                f.write_str("offer_text (")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_offer_entry(f, entry)?;
                }
                f.write_str(")")
            }
            Field::Difficulty(min, max) => write!(f, "difficulty {}, {}", min, max),
            Field::Weight(weight) => write!(f, "weight {}", weight),
            Field::AllowableZoneTypes(types) => {
                write!(f, "allowable_zone_types {}", types.join(", "))
            }
            Field::OfferGroup(group) => write!(f, "offer_group {}", group),
            Field::HostileGroup(group) => write!(f, "hostile_group {}", group),
        }
    }
}

/// 写出 `append(...)` / `replace(...)`。
pub fn write_offer_entry(f: &mut impl std::fmt::Write, entry: &OfferText) -> std::fmt::Result {
    write!(f, "{}(", entry.op)?;
    for (i, item) in entry.items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if item.plurality != Plurality::None {
            write!(f, "{}, ", item.plurality)?;
        }
        write!(f, "{}", item.message_id)?;
        for arg in &item.args {
            write!(f, ", {}", arg)?;
        }
    }
    f.write_str(")")
}

/// 整个脚本
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// 顶层语句
    pub statements: Vec<Span<Statement>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommSource, CommTarget, OfferTextItem, OfferTextOp};

    #[test]
    fn display_fields() {
        assert_eq!(Field::Weight(10).to_string(), "weight 10");
        assert_eq!(Field::Difficulty(0.5, 2.0).to_string(), "difficulty 0.5, 2");
        assert_eq!(
            Field::ObjectiveText(ObjectiveText {
                target: "destroy".into(),
                text: VignetteString {
                    message_id: 1200,
                    args: vec!["a".into(), "b".into()],
                },
            })
            .to_string(),
            "objective_text destroy, 1200, a, b"
        );
        assert_eq!(
            Field::CommSequence(CommSequence {
                event: "start".into(),
                target: CommTarget::Player,
                floats: (0.0, 1.5, 3.0),
                source: CommSource::Target,
                comm: "hello".into(),
            })
            .to_string(),
            "comm_sequence start, player, 0, 1.5, 3, target, hello"
        );
    }

    #[test]
    fn display_offer_text() {
        let field = Field::OfferText(vec![
            OfferText {
                op: OfferTextOp::Replace,
                items: vec![OfferTextItem {
                    message_id: 5,
                    plurality: Plurality::Plural,
                    args: vec!["ships".into()],
                }],
            },
            OfferText {
                op: OfferTextOp::Append,
                items: vec![
                    OfferTextItem {
                        message_id: 6,
                        plurality: Plurality::None,
                        args: vec![],
                    },
                    OfferTextItem {
                        message_id: 7,
                        plurality: Plurality::None,
                        args: vec!["x".into()],
                    },
                ],
            },
        ]);
        assert_eq!(
            field.to_string(),
            "offer_text (replace(plural, 5, ships), append(6, 7, x))"
        );
    }

    #[test]
    fn display_group_and_condition() {
        let group = Group {
            name: "traders".into(),
            factions: vec!["li_n_grp".into(), "br_n_grp".into()],
        };
        assert_eq!(group.to_string(), "group traders li_n_grp, br_n_grp;");
        assert_eq!(Condition::Group("traders".into()).to_string(), "group(traders)");
        assert_eq!(Condition::Named("Pre_battle".into()).to_string(), "Pre_battle");
    }
}
