//! The declarative action model
//!
//! An [`Action`] is pure data: a stage, a closed [`ActionEffect`], trigger
//! filters and an optional alternate chain. The handler pattern-matches on
//! the effect at each stage; there is no open dispatch, so the full set of
//! behaviours is visible in one place.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sf_core::{Index, NULL_INDEX, Weighting};

use crate::chance::{ChanceModifier, modified_chance};
use crate::results::PenaltyKind;
use crate::spin::{Spin, SpinKind};

/// The fixed evaluation stages of one spin step, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Force-activated actions for bought (paid) rounds; runs pre-loop.
    PaidOnly,
    /// Before the reels land.
    PreSpin,
    /// Grid revision (nudges, morphs).
    ReviseGrid,
    /// Expansion before payout evaluation.
    ExpandBefore,
    /// Grid inspection (hold & win triggers, multipliers, flag counts).
    TestGrid,
    /// Payline evaluation.
    RegularPayouts,
    /// Reverse-win penalties.
    RegularPenalties,
    /// Symbol injection; retests payouts when it lands.
    Injection,
    /// Expansion after payout evaluation.
    ExpandAfter,
    /// Cross-spin state changes (collections).
    TestState,
    /// Scatter payouts.
    ExtraPayouts,
    /// Free spins and bonus games.
    AwardBonuses,
    /// Sticky symbol marking.
    TestStickiness,
    /// Winning-position clearance (cascades).
    TestClearance,
    /// Bonus symbol selection before entering free spins.
    PreBonus,
    /// Player decision resolution; runs pre-loop.
    TestPlayerChoice,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::PaidOnly => "paid-only",
            Stage::PreSpin => "pre-spin",
            Stage::ReviseGrid => "revise-grid",
            Stage::ExpandBefore => "expand-before",
            Stage::TestGrid => "test-grid",
            Stage::RegularPayouts => "regular-payouts",
            Stage::RegularPenalties => "regular-penalties",
            Stage::Injection => "injection",
            Stage::ExpandAfter => "expand-after",
            Stage::TestState => "test-state",
            Stage::ExtraPayouts => "extra-payouts",
            Stage::AwardBonuses => "award-bonuses",
            Stage::TestStickiness => "test-stickiness",
            Stage::TestClearance => "test-clearance",
            Stage::PreBonus => "pre-bonus",
            Stage::TestPlayerChoice => "test-player-choice",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a triggered action did to the round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Processed,
    Payout,
    Penalty,
    FreeSpins(u64),
    BonusGame,
    Refill,
    SuperRefill,
    Sticky,
    Multiplier(f64),
    SymbolsInjected,
    GridModified,
    ReelsNudged,
    InstantBonus(f64),
    PlayerChoiceRequired,
    MaxPayoutReached,
}

/// Composable predicate over spin state. All filters on an action must
/// hold for the action to be considered.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerFilter {
    /// Only for the listed spin kinds.
    Kinds(Vec<SpinKind>),
    FlagEquals { flag: usize, value: i32 },
    FlagAtLeast { flag: usize, min: i32 },
    SymbolsAtLeast { symbol: Index, count: u8 },
    FreeSpinsAtLeast(u64),
    SpinSeqBetween { min: u64, max: u64 },
}

impl TriggerFilter {
    pub fn holds(&self, spin: &Spin) -> bool {
        match self {
            TriggerFilter::Kinds(kinds) => kinds.contains(&spin.kind()),
            TriggerFilter::FlagEquals { flag, value } => spin.flag(*flag) == *value,
            TriggerFilter::FlagAtLeast { flag, min } => spin.flag(*flag) >= *min,
            TriggerFilter::SymbolsAtLeast { symbol, count } => {
                spin.count_symbol(*symbol) >= *count
            }
            TriggerFilter::FreeSpinsAtLeast(min) => spin.free_spins() >= *min,
            TriggerFilter::SpinSeqBetween { min, max } => {
                (*min..=*max).contains(&spin.seq())
            }
        }
    }
}

/// The closed set of action behaviours.
#[derive(Debug, Clone)]
pub enum ActionEffect {
    /// Force-activated bonus for a bought round.
    PaidBonus {
        bonus_buy: u8,
        free_spins: u64,
        flag: Option<(usize, i32)>,
    },
    /// Chance at an instant prize before the reels land.
    InstantPrize {
        chance: f64,
        amount: f64,
        player_choice: bool,
    },
    /// Nudges one missing scatter onto the grid when one short.
    NudgeScatter {
        symbol: Index,
        target: u8,
        chance: f64,
    },
    /// Morphs every occurrence of one symbol into another.
    MorphSymbol { from: Index, to: Index, chance: f64 },
    /// Wilds expand to fill their reel.
    ExpandWilds { symbol: Index, min_count: u8 },
    /// Hold & respin when enough trigger symbols land; newly landed
    /// triggers re-arm the refill until none land.
    HoldAndRespin {
        symbol: Index,
        min_count: u8,
        super_shape: bool,
    },
    /// Round multiplier scales with the symbol count.
    WildMultiplier { symbol: Index, scales: Vec<f64> },
    /// Records the symbol count in a round flag.
    CountToFlag { symbol: Index, flag: usize },
    /// Evaluates the configured paylines.
    LinePayouts,
    /// Reverse-win penalty when enough symbols land.
    Penalty {
        symbol: Index,
        min_count: u8,
        kind: PenaltyKind,
        value: f64,
    },
    /// Injects up to `max` extra symbols, then retests payouts.
    InjectSymbols { symbol: Index, chance: f64, max: u8 },
    /// Collects symbols into a round flag across spins; reaching the
    /// target awards free spins. `NULL_INDEX` collects the selected
    /// bonus symbol.
    CollectToFlag {
        symbol: Index,
        flag: usize,
        target: i32,
        free_spins: u64,
    },
    /// Scatters pay anywhere on the grid.
    ScatterPayout { symbol: Index, min_count: u8 },
    /// Scatters award free spins. Chain alternates for higher counts.
    ScatterFreeSpins {
        symbol: Index,
        count: u8,
        free_spins: u64,
        player_choice: bool,
    },
    /// Weighted bonus wheel, played as its own step.
    BonusWheel {
        chance: f64,
        prizes: Weighting,
        amounts: Vec<f64>,
    },
    /// Matching symbols become sticky for the rest of the round.
    StickySymbol { symbol: Index, min_count: u8 },
    /// Winning positions clear and refill (cascade).
    ClearPayouts,
    /// Selects the bonus symbol for the free spins.
    BonusSymbol { options: Weighting },
    /// Resolves a pending player decision into a round flag.
    PlayerChoice {
        key: String,
        options: Vec<String>,
        flag: usize,
    },
}

impl ActionEffect {
    /// The stage this effect canonically belongs to.
    pub fn default_stage(&self) -> Stage {
        match self {
            ActionEffect::PaidBonus { .. } => Stage::PaidOnly,
            ActionEffect::InstantPrize { .. } => Stage::PreSpin,
            ActionEffect::NudgeScatter { .. } | ActionEffect::MorphSymbol { .. } => {
                Stage::ReviseGrid
            }
            ActionEffect::ExpandWilds { .. } => Stage::ExpandBefore,
            ActionEffect::HoldAndRespin { .. }
            | ActionEffect::WildMultiplier { .. }
            | ActionEffect::CountToFlag { .. } => Stage::TestGrid,
            ActionEffect::LinePayouts => Stage::RegularPayouts,
            ActionEffect::Penalty { .. } => Stage::RegularPenalties,
            ActionEffect::InjectSymbols { .. } => Stage::Injection,
            ActionEffect::CollectToFlag { .. } => Stage::TestState,
            ActionEffect::ScatterPayout { .. } => Stage::ExtraPayouts,
            ActionEffect::ScatterFreeSpins { .. } | ActionEffect::BonusWheel { .. } => {
                Stage::AwardBonuses
            }
            ActionEffect::StickySymbol { .. } => Stage::TestStickiness,
            ActionEffect::ClearPayouts => Stage::TestClearance,
            ActionEffect::BonusSymbol { .. } => Stage::PreBonus,
            ActionEffect::PlayerChoice { .. } => Stage::TestPlayerChoice,
        }
    }
}

/// Shared handle to an action; action lists and scripts share instances.
pub type ActionRef = Arc<Action>;

/// A configured action.
#[derive(Debug, Clone)]
pub struct Action {
    id: u32,
    name: String,
    stage: Stage,
    effect: ActionEffect,
    filters: Vec<TriggerFilter>,
    modifiers: Vec<ChanceModifier>,
    alternate: Option<Box<Action>>,
}

impl Action {
    pub fn new(id: u32, name: &str, effect: ActionEffect) -> Self {
        Self {
            id,
            name: name.to_string(),
            stage: effect.default_stage(),
            effect,
            filters: Vec::new(),
            modifiers: Vec::new(),
            alternate: None,
        }
    }

    /// Overrides the canonical stage (e.g. expansion after payouts).
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_filter(mut self, filter: TriggerFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_modifier(mut self, modifier: ChanceModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Chains a lower-priority variant; the chain is walked front to back
    /// and the first variant whose threshold holds wins.
    pub fn with_alternate(mut self, alternate: Action) -> Self {
        match &mut self.alternate {
            Some(a) => a.push_alternate(alternate),
            None => self.alternate = Some(Box::new(alternate)),
        }
        self
    }

    fn push_alternate(&mut self, alternate: Action) {
        match &mut self.alternate {
            Some(a) => a.push_alternate(alternate),
            None => self.alternate = Some(Box::new(alternate)),
        }
    }

    pub fn into_ref(self) -> ActionRef {
        Arc::new(self)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn effect(&self) -> &ActionEffect {
        &self.effect
    }

    pub fn alternate(&self) -> Option<&Action> {
        self.alternate.as_deref()
    }

    pub fn filters(&self) -> &[TriggerFilter] {
        &self.filters
    }

    /// True when all trigger filters hold.
    pub fn can_trigger(&self, spin: &Spin) -> bool {
        self.filters.iter().all(|f| f.holds(spin))
    }

    /// Base chance put through the modifier pipeline.
    pub fn chance(&self, base: f64, spin: &Spin) -> f64 {
        modified_chance(base, &self.modifiers, spin)
    }

    /// Walks the alternate chain and returns the first variant whose
    /// filters and count threshold hold for the current grid.
    pub fn resolve(&self, spin: &Spin) -> Option<&Action> {
        let mut cur = Some(self);
        while let Some(a) = cur {
            if a.can_trigger(spin) && a.threshold_met(spin) {
                return Some(a);
            }
            cur = a.alternate.as_deref();
        }
        None
    }

    fn threshold_met(&self, spin: &Spin) -> bool {
        match &self.effect {
            ActionEffect::ScatterFreeSpins { symbol, count, .. } => {
                spin.count_symbol(*symbol) >= *count
            }
            ActionEffect::ScatterPayout { symbol, min_count } => {
                spin.count_symbol(*symbol) >= *min_count
            }
            _ => true,
        }
    }

    /// Resolves the collected symbol, honouring the bonus-symbol sentinel.
    pub fn collect_symbol(symbol: Index, spin: &Spin) -> Index {
        if symbol == NULL_INDEX {
            spin.bonus_symbol()
        } else {
            symbol
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin_with_scatters(n: usize) -> Spin {
        let mut spin = Spin::new(5, 3, 2);
        let mut grid = vec![1 as Index; 15];
        for cell in grid.iter_mut().take(n) {
            *cell = 12;
        }
        spin.load_grid(&grid).unwrap();
        spin
    }

    fn scatter_action(count: u8, free_spins: u64) -> Action {
        Action::new(
            count as u32,
            "free spins",
            ActionEffect::ScatterFreeSpins {
                symbol: 12,
                count,
                free_spins,
                player_choice: false,
            },
        )
    }

    #[test]
    fn test_filters_all_must_hold() {
        let action = Action::new(1, "test", ActionEffect::LinePayouts)
            .with_filter(TriggerFilter::Kinds(vec![SpinKind::Regular]))
            .with_filter(TriggerFilter::FlagEquals { flag: 0, value: 1 });

        let mut spin = Spin::new(5, 3, 2);
        assert!(!action.can_trigger(&spin));
        spin.set_flag(0, 1);
        assert!(action.can_trigger(&spin));
        spin.set_kind(SpinKind::FreeSpin);
        assert!(!action.can_trigger(&spin));
    }

    #[test]
    fn test_alternate_chain_resolves_highest_first() {
        let action = scatter_action(6, 25)
            .with_alternate(scatter_action(5, 15))
            .with_alternate(scatter_action(4, 10))
            .with_alternate(scatter_action(3, 8));

        for (scatters, expect) in [(6, Some(25)), (5, Some(15)), (4, Some(10)), (3, Some(8)), (2, None)] {
            let spin = spin_with_scatters(scatters);
            let resolved = action.resolve(&spin).map(|a| match a.effect() {
                ActionEffect::ScatterFreeSpins { free_spins, .. } => *free_spins,
                _ => unreachable!(),
            });
            assert_eq!(resolved, expect, "scatters={scatters}");
        }
    }

    #[test]
    fn test_seven_scatters_resolve_to_six_variant() {
        let action = scatter_action(6, 25).with_alternate(scatter_action(3, 8));
        let spin = spin_with_scatters(7);
        assert_eq!(action.resolve(&spin).map(|a| a.id()), Some(6));
    }

    #[test]
    fn test_default_stage_mapping() {
        assert_eq!(
            Action::new(1, "pay", ActionEffect::LinePayouts).stage(),
            Stage::RegularPayouts
        );
        let expand = Action::new(
            2,
            "expand late",
            ActionEffect::ExpandWilds {
                symbol: 11,
                min_count: 1,
            },
        )
        .with_stage(Stage::ExpandAfter);
        assert_eq!(expand.stage(), Stage::ExpandAfter);
    }

    #[test]
    fn test_collect_symbol_sentinel_reads_bonus_symbol() {
        let mut spin = Spin::new(3, 3, 2);
        spin.set_bonus_symbol(7);
        assert_eq!(Action::collect_symbol(NULL_INDEX, &spin), 7);
        assert_eq!(Action::collect_symbol(4, &spin), 4);
    }
}
