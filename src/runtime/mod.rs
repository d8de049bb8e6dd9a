//! 运行时：从入口节点出发对节点图求值。

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

use crate::backend::Tree;
use crate::options::Options;
use crate::schema::{CommSequence, OfferTextItem, Plurality, VignetteString};

pub mod vm;
pub use vm::{RuntimeError, VM};

/// 从入口节点求值整个节点图
pub fn run(tree: &Tree, params: &Parameters, options: &Options) -> Result<VignetteInfo, RuntimeError> {
    VM::new(tree, params, options).run()
}

/// 游戏提供的条件名
pub const KNOWN_CONDITIONS: &[&str] = &[
    "Assassinate_mission",
    "Assassinate_Ship",
    "Assassinate_solar",
    "Big_solar",
    "Bring_back_loot",
    "Continuous_reenforcements",
    "Defensive_solars",
    "Defensive_solars_at_main_battle",
    "Destroy_solars_mission",
    "Friendly_ships",
    "Friendly_ships_after_30_s",
    "Friendly_ships_at_installation",
    "Friendly_ships_at_main_battle",
    "Friendly_ships_come_in_to_whoop_up",
    "Hostile_ships",
    "Hostile_ships_after_30_s",
    "Hostile_waves",
    "Main_battle_non_target_wave",
    "Main_battle_wave_1",
    "Main_battle_wave_2",
    "Pk_defensive_solars",
    "Pk_hostile_ships",
    "Pre_battle",
    "Pre_battle_non_target_wave",
    "Pre_battle_wave_2",
    "Pre_battle_wave_runs",
    "target_drops_critical_loot",
    "Target_spawns_at_pre_battle",
    "Target_spawns_with_wave",
    "Tractor_in_loot",
    "Wave_just_after_main_battle_starts",
];

/// 求值参数
#[derive(Clone, Debug, Default)]
pub struct Parameters {
    /// 发布任务的势力
    pub offer_group: Option<String>,
    /// 为真的条件，小写
    conditions: HashSet<String>,
}

impl Parameters {
    /// 创建一组空参数，所有条件为假。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置发布任务的势力。
    pub fn offer_group(mut self, group: impl Into<String>) -> Self {
        self.offer_group = Some(group.into());
        self
    }

    /// 把条件设为真（忽略大小写）。
    pub fn set(mut self, condition: &str) -> Self {
        self.conditions.insert(condition.to_ascii_lowercase());
        self
    }

    /// 查询条件。未知的条件返回 `None`。
    pub fn condition(&self, name: &str) -> Option<bool> {
        if self.conditions.contains(&name.to_ascii_lowercase()) {
            Some(true)
        } else if KNOWN_CONDITIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name))
        {
            Some(false)
        } else {
            None
        }
    }
}

/// 求值结果
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VignetteInfo {
    pub is_error: bool,
    pub documentation: Vec<String>,
    pub objective_texts: BTreeMap<String, VignetteString>,
    pub comm_sequences: BTreeMap<String, CommSequence>,
    pub reward_text: Option<VignetteString>,
    pub failure_text: Option<VignetteString>,
    pub offer_text: Vec<OfferTextItem>,
}

impl Display for VignetteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error {
            writeln!(f, "error: true")?;
        }
        if !self.documentation.is_empty() {
            writeln!(f, "documentation: {}", self.documentation.join(", "))?;
        }
        if let Some(text) = &self.reward_text {
            writeln!(f, "reward_text: {}", text)?;
        }
        if let Some(text) = &self.failure_text {
            writeln!(f, "failure_text: {}", text)?;
        }
        for (target, text) in &self.objective_texts {
            writeln!(f, "objective_text {}: {}", target, text)?;
        }
        for (event, cs) in &self.comm_sequences {
            writeln!(
                f,
                "comm_sequence {}: {}, {}, {}, {}, {}, {}",
                event, cs.target, cs.floats.0, cs.floats.1, cs.floats.2, cs.source, cs.comm
            )?;
        }
        if !self.offer_text.is_empty() {
            let items = self
                .offer_text
                .iter()
                .map(|item| {
                    let mut s = match item.plurality {
                        Plurality::None => String::new(),
                        plurality => format!("{} ", plurality),
                    };
                    s.push_str(&item.message_id.to_string());
                    if !item.args.is_empty() {
                        s.push_str(&format!(" ({})", item.args.join(", ")));
                    }
                    s
                })
                .collect::<Vec<_>>();
            writeln!(f, "offer_text: {}", items.join("; "))?;
        }
        Ok(())
    }
}
