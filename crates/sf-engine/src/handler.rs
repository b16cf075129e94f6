//! Action handler — stage-bucketed execution
//!
//! Compiled once per action list, the handler partitions actions into one
//! bucket per stage and executes each bucket in configured order against
//! the live spin. Every evaluated action leaves an audit event, triggered
//! or not, carrying the PRNG draws it consumed.

use sf_core::{Index, NULL_INDEX, RngRecorder};

use crate::actions::{Action, ActionEffect, ActionOutcome, ActionRef, Stage};
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::results::{AuditEvent, BonusPlay, ChoiceRequest, PayoutItem, PenaltyItem, StepResult};
use crate::round::ChoiceMap;
use crate::spin::Spin;

/// Side effects a step hands back to the round orchestrator.
#[derive(Debug, Default)]
pub(crate) struct StepEffects {
    pub free_spins_awarded: u64,
    pub need_refill: bool,
    pub super_spin: bool,
    pub bonus_game: Option<ActionRef>,
    pub make_choice: bool,
}

/// Mutable view of everything one step touches.
pub(crate) struct StepCtx<'a> {
    pub cfg: &'a GameConfig,
    pub spin: &'a mut Spin,
    pub rng: &'a mut RngRecorder,
    pub fx: &'a mut StepEffects,
    pub step: &'a mut StepResult,
}

impl StepCtx<'_> {
    fn begin_event(&self) -> usize {
        self.rng.log_len()
    }

    fn finish_event(&mut self, action: &Action, outcome: Option<ActionOutcome>, mark: usize) {
        let rng = if self.rng.is_logging() && self.rng.log_len() > mark {
            Some(self.rng.log_slice(mark))
        } else {
            None
        };
        log::debug!(
            "action {} '{}' at {}: {}",
            action.id(),
            action.name(),
            action.stage(),
            if outcome.is_some() { "triggered" } else { "not triggered" },
        );
        self.step.events.push(AuditEvent {
            action: action.id(),
            outcome,
            rng,
        });
    }

    /// Random cell offset among the candidates.
    fn pick_cell(&mut self, candidates: &[usize]) -> Result<usize, EngineError> {
        let ix = self.rng.int_n(candidates.len() as u32)? as usize;
        Ok(candidates[ix])
    }
}

/// Actions partitioned by stage, in configured order within each bucket.
#[derive(Debug, Default)]
pub struct ActionHandler {
    paid: Vec<ActionRef>,
    pre_spin: Vec<ActionRef>,
    revise_grid: Vec<ActionRef>,
    expand_before: Vec<ActionRef>,
    test_grid: Vec<ActionRef>,
    regular_payouts: Vec<ActionRef>,
    regular_penalties: Vec<ActionRef>,
    injection: Vec<ActionRef>,
    expand_after: Vec<ActionRef>,
    test_state: Vec<ActionRef>,
    extra_payouts: Vec<ActionRef>,
    award_bonuses: Vec<ActionRef>,
    test_stickiness: Vec<ActionRef>,
    test_clearance: Vec<ActionRef>,
    pre_bonus: Vec<ActionRef>,
    player_choice: Vec<ActionRef>,
}

impl ActionHandler {
    pub fn compile(actions: &[ActionRef]) -> Self {
        let mut h = Self::default();
        for action in actions {
            let bucket = match action.stage() {
                Stage::PaidOnly => &mut h.paid,
                Stage::PreSpin => &mut h.pre_spin,
                Stage::ReviseGrid => &mut h.revise_grid,
                Stage::ExpandBefore => &mut h.expand_before,
                Stage::TestGrid => &mut h.test_grid,
                Stage::RegularPayouts => &mut h.regular_payouts,
                Stage::RegularPenalties => &mut h.regular_penalties,
                Stage::Injection => &mut h.injection,
                Stage::ExpandAfter => &mut h.expand_after,
                Stage::TestState => &mut h.test_state,
                Stage::ExtraPayouts => &mut h.extra_payouts,
                Stage::AwardBonuses => &mut h.award_bonuses,
                Stage::TestStickiness => &mut h.test_stickiness,
                Stage::TestClearance => &mut h.test_clearance,
                Stage::PreBonus => &mut h.pre_bonus,
                Stage::TestPlayerChoice => &mut h.player_choice,
            };
            bucket.push(action.clone());
        }
        h
    }

    /// The paid action matching a bonus buy, if configured.
    pub(crate) fn paid_action(&self, bonus_buy: u8) -> Option<&ActionRef> {
        self.paid.iter().find(|a| {
            matches!(a.effect(), ActionEffect::PaidBonus { bonus_buy: bb, .. } if *bb == bonus_buy)
        })
    }

    /// The decision the player is asked to make when suspending.
    pub(crate) fn choice_request(&self) -> Option<ChoiceRequest> {
        self.player_choice.iter().find_map(|a| match a.effect() {
            ActionEffect::PlayerChoice { key, options, .. } => Some(ChoiceRequest {
                key: key.clone(),
                options: options.clone(),
            }),
            _ => None,
        })
    }

    // --- pre-loop stages ---

    pub(crate) fn force_paid(
        &self,
        bonus_buy: u8,
        ctx: &mut StepCtx<'_>,
    ) -> Result<bool, EngineError> {
        let Some(action) = self.paid_action(bonus_buy) else {
            return Ok(false);
        };
        let mark = ctx.begin_event();
        let outcome = if let ActionEffect::PaidBonus {
            free_spins, flag, ..
        } = action.effect()
        {
            if let Some((ix, value)) = flag {
                ctx.spin.set_flag(*ix, *value);
            }
            ctx.fx.free_spins_awarded += free_spins;
            Some(ActionOutcome::FreeSpins(*free_spins))
        } else {
            None
        };
        ctx.finish_event(action, outcome, mark);
        Ok(true)
    }

    pub(crate) fn test_pre_spin(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.pre_spin {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::InstantPrize {
                    chance,
                    amount,
                    player_choice,
                } = action.effect()
                {
                    let c = action.chance(*chance, ctx.spin);
                    if ctx.rng.chance(c)? {
                        ctx.step.payouts.push(PayoutItem {
                            line: None,
                            symbol: 0,
                            count: 0,
                            amount: *amount,
                        });
                        outcome = if *player_choice {
                            ctx.fx.make_choice = true;
                            Some(ActionOutcome::PlayerChoiceRequired)
                        } else {
                            Some(ActionOutcome::InstantBonus(*amount))
                        };
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_choices(
        &self,
        ctx: &mut StepCtx<'_>,
        choices: &ChoiceMap,
    ) -> Result<(), EngineError> {
        for action in &self.player_choice {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if let ActionEffect::PlayerChoice { key, options, flag } = action.effect() {
                if let Some(pick) = choices.get(key) {
                    if let Some(pos) = options.iter().position(|o| o == pick) {
                        ctx.spin.set_flag(*flag, pos as i32 + 1);
                        outcome = Some(ActionOutcome::Processed);
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    // --- per-spin stages, in pipeline order ---

    pub(crate) fn test_grid_revisions(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.revise_grid {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                match action.effect() {
                    ActionEffect::NudgeScatter {
                        symbol,
                        target,
                        chance,
                    } => {
                        if ctx.spin.count_symbol(*symbol) + 1 == *target {
                            let c = action.chance(*chance, ctx.spin);
                            if ctx.rng.chance(c)? {
                                outcome = nudge_symbol(ctx, *symbol)?;
                            }
                        }
                    }
                    ActionEffect::MorphSymbol { from, to, chance } => {
                        let c = action.chance(*chance, ctx.spin);
                        if ctx.rng.chance(c)? {
                            let mut changed = false;
                            for ix in 0..ctx.spin.cell_count() {
                                if ctx.spin.cell_at(ix) == *from {
                                    ctx.spin.set_cell_at(ix, *to);
                                    changed = true;
                                }
                            }
                            if changed {
                                outcome = Some(ActionOutcome::GridModified);
                            }
                        }
                    }
                    _ => {}
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_before_expansions(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        Self::run_expansions(&self.expand_before, ctx)
    }

    pub(crate) fn test_after_expansions(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        Self::run_expansions(&self.expand_after, ctx)
    }

    fn run_expansions(bucket: &[ActionRef], ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in bucket {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::ExpandWilds { symbol, min_count } = action.effect() {
                    if ctx.spin.count_symbol(*symbol) >= *min_count {
                        let rows = ctx.spin.rows();
                        let mut changed = false;
                        for reel in 0..ctx.spin.reel_count() {
                            let has_wild =
                                (0..rows).any(|row| ctx.spin.cell(reel, row) == *symbol);
                            if has_wild {
                                for row in 0..rows {
                                    if ctx.spin.cell(reel, row) != *symbol {
                                        ctx.spin.set_cell(reel, row, *symbol);
                                        changed = true;
                                    }
                                }
                            }
                        }
                        if changed {
                            outcome = Some(ActionOutcome::GridModified);
                        }
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_grid_actions(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.test_grid {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                match action.effect() {
                    ActionEffect::HoldAndRespin {
                        symbol,
                        min_count,
                        super_shape,
                    } => {
                        if ctx.spin.count_symbol(*symbol) >= *min_count {
                            let mut newly_held = 0;
                            for ix in 0..ctx.spin.cell_count() {
                                if ctx.spin.cell_at(ix) == *symbol && !ctx.spin.is_sticky(ix) {
                                    ctx.spin.set_sticky(ix, true);
                                    newly_held += 1;
                                }
                            }
                            if newly_held > 0 {
                                ctx.fx.need_refill = true;
                                outcome = if *super_shape {
                                    ctx.fx.super_spin = true;
                                    Some(ActionOutcome::SuperRefill)
                                } else {
                                    Some(ActionOutcome::Refill)
                                };
                            }
                        }
                    }
                    ActionEffect::WildMultiplier { symbol, scales } => {
                        let count = ctx.spin.count_symbol(*symbol) as usize;
                        if count > 0 && !scales.is_empty() {
                            let scale = scales[count.min(scales.len()) - 1];
                            if scale > 1.0 {
                                let m = ctx.spin.multiplier() * scale;
                                ctx.spin.set_multiplier(m);
                                outcome = Some(ActionOutcome::Multiplier(scale));
                            }
                        }
                    }
                    ActionEffect::CountToFlag { symbol, flag } => {
                        let sym = Action::collect_symbol(*symbol, ctx.spin);
                        let count = ctx.spin.count_symbol(sym) as i32;
                        ctx.spin.set_flag(*flag, count);
                        outcome = Some(ActionOutcome::Processed);
                    }
                    _ => {}
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_regular_payouts(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.regular_payouts {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::LinePayouts = action.effect() {
                    let mut wins = Vec::new();
                    ctx.cfg.paytable().evaluate(
                        ctx.spin.grid(),
                        ctx.spin.rows(),
                        ctx.cfg.symbols(),
                        &mut wins,
                    );
                    if !wins.is_empty() {
                        let multiplier = ctx.spin.multiplier();
                        for win in &wins {
                            for &pos in &win.positions {
                                ctx.spin.mark_win(pos);
                            }
                            ctx.step.payouts.push(PayoutItem {
                                line: Some(win.line),
                                symbol: win.symbol,
                                count: win.count,
                                amount: win.amount * multiplier,
                            });
                        }
                        outcome = Some(ActionOutcome::Payout);
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_regular_penalties(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.regular_penalties {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::Penalty {
                    symbol,
                    min_count,
                    kind,
                    value,
                } = action.effect()
                {
                    if ctx.spin.count_symbol(*symbol) >= *min_count {
                        ctx.step.penalties.push(PenaltyItem {
                            kind: *kind,
                            value: *value,
                        });
                        outcome = Some(ActionOutcome::Penalty);
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    /// Injection retests payouts: when symbols land, earlier line payouts
    /// and penalties are wiped and re-evaluated on the revised grid.
    pub(crate) fn test_injections(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        let mut injected = false;
        for action in &self.injection {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::InjectSymbols {
                    symbol,
                    chance,
                    max,
                } = action.effect()
                {
                    let c = action.chance(*chance, ctx.spin);
                    if ctx.rng.chance(c)? {
                        let landed = inject_symbols(ctx, *symbol, *max)?;
                        if landed > 0 {
                            injected = true;
                            outcome = Some(ActionOutcome::SymbolsInjected);
                        }
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }

        if injected {
            ctx.step.payouts.retain(|p| p.line.is_none());
            ctx.step.penalties.clear();
            ctx.spin.clear_win_marks();
            self.test_regular_payouts(ctx)?;
            self.test_regular_penalties(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn test_state_changes(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.test_state {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::CollectToFlag {
                    symbol,
                    flag,
                    target,
                    free_spins,
                } = action.effect()
                {
                    let sym = Action::collect_symbol(*symbol, ctx.spin);
                    let count = ctx.spin.count_symbol(sym) as i32;
                    if count > 0 && sym != NULL_INDEX {
                        let before = ctx.spin.flag(*flag);
                        ctx.spin.inc_flag(*flag, count);
                        outcome = if before < *target && ctx.spin.flag(*flag) >= *target {
                            ctx.fx.free_spins_awarded += free_spins;
                            Some(ActionOutcome::FreeSpins(*free_spins))
                        } else {
                            Some(ActionOutcome::Processed)
                        };
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_extra_payouts(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.extra_payouts {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if let Some(resolved) = action.resolve(ctx.spin) {
                if let ActionEffect::ScatterPayout { symbol, min_count } = resolved.effect() {
                    let count = ctx.spin.count_symbol(*symbol);
                    if count >= *min_count {
                        let amount =
                            ctx.cfg.symbols().pay(*symbol, count) * ctx.spin.multiplier();
                        if amount > 0.0 {
                            ctx.step.payouts.push(PayoutItem {
                                line: None,
                                symbol: *symbol,
                                count,
                                amount,
                            });
                            outcome = Some(ActionOutcome::Payout);
                        }
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_bonuses(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.award_bonuses {
            let mark = ctx.begin_event();
            let mut outcome = None;
            match action.effect() {
                ActionEffect::ScatterFreeSpins { .. } => {
                    if let Some(resolved) = action.resolve(ctx.spin) {
                        if let ActionEffect::ScatterFreeSpins {
                            free_spins,
                            player_choice,
                            ..
                        } = resolved.effect()
                        {
                            ctx.fx.free_spins_awarded += free_spins;
                            outcome = if *player_choice {
                                ctx.fx.make_choice = true;
                                Some(ActionOutcome::PlayerChoiceRequired)
                            } else {
                                Some(ActionOutcome::FreeSpins(*free_spins))
                            };
                        }
                    }
                }
                ActionEffect::BonusWheel { chance, .. } => {
                    if action.can_trigger(ctx.spin) {
                        let c = action.chance(*chance, ctx.spin);
                        if ctx.rng.chance(c)? {
                            ctx.fx.bonus_game = Some(action.clone());
                            outcome = Some(ActionOutcome::BonusGame);
                        }
                    }
                }
                _ => {}
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_stickiness(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.test_stickiness {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::StickySymbol { symbol, min_count } = action.effect() {
                    if ctx.spin.count_symbol(*symbol) >= *min_count {
                        let mut marked = false;
                        for ix in 0..ctx.spin.cell_count() {
                            if ctx.spin.cell_at(ix) == *symbol && !ctx.spin.is_sticky(ix) {
                                ctx.spin.set_sticky(ix, true);
                                marked = true;
                            }
                        }
                        if marked {
                            outcome = Some(ActionOutcome::Sticky);
                        }
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    pub(crate) fn test_clearing(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.test_clearance {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::ClearPayouts = action.effect() {
                    if ctx.spin.has_win_marks() && ctx.spin.clear_marked_cells() > 0 {
                        ctx.fx.need_refill = true;
                        outcome = Some(ActionOutcome::Refill);
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    /// Runs only when the round continues into more spins.
    pub(crate) fn test_pre_bonus(&self, ctx: &mut StepCtx<'_>) -> Result<(), EngineError> {
        for action in &self.pre_bonus {
            let mark = ctx.begin_event();
            let mut outcome = None;
            if action.can_trigger(ctx.spin) {
                if let ActionEffect::BonusSymbol { options } = action.effect() {
                    if ctx.spin.bonus_symbol() == NULL_INDEX {
                        let symbol = options.sample(ctx.rng)?;
                        ctx.spin.set_bonus_symbol(symbol);
                        outcome = Some(ActionOutcome::Processed);
                    }
                }
            }
            ctx.finish_event(action, outcome, mark);
        }
        Ok(())
    }

    /// Plays a bonus wheel as its own step.
    pub(crate) fn run_bonus_wheel(
        action: &ActionRef,
        ctx: &mut StepCtx<'_>,
    ) -> Result<(), EngineError> {
        let mark = ctx.begin_event();
        let mut outcome = None;
        if let ActionEffect::BonusWheel {
            prizes, amounts, ..
        } = action.effect()
        {
            let prize = prizes.sample(ctx.rng)?;
            let amount = amounts.get(prize as usize).copied().unwrap_or(0.0);
            ctx.step.payouts.push(PayoutItem {
                line: None,
                symbol: 0,
                count: 0,
                amount,
            });
            ctx.step.bonus = Some(BonusPlay {
                action: action.id(),
                prize,
                amount,
            });
            outcome = Some(ActionOutcome::InstantBonus(amount));
        }
        ctx.finish_event(action, outcome, mark);
        Ok(())
    }
}

/// Nudges one more `symbol` onto the grid at a random cell not already
/// showing it, preferring reels without one.
fn nudge_symbol(ctx: &mut StepCtx<'_>, symbol: Index) -> Result<Option<ActionOutcome>, EngineError> {
    let rows = ctx.spin.rows();
    let mut candidates = Vec::new();
    for reel in 0..ctx.spin.reel_count() {
        let has = (0..rows).any(|row| ctx.spin.cell(reel, row) == symbol);
        if !has {
            for row in 0..rows {
                candidates.push(reel * rows + row);
            }
        }
    }
    if candidates.is_empty() {
        return Ok(None);
    }
    let at = ctx.pick_cell(&candidates)?;
    ctx.spin.set_cell_at(at, symbol);
    Ok(Some(ActionOutcome::ReelsNudged))
}

/// Injects 1..=max symbols at random cells not already showing the symbol.
fn inject_symbols(ctx: &mut StepCtx<'_>, symbol: Index, max: u8) -> Result<usize, EngineError> {
    let mut candidates: Vec<usize> = (0..ctx.spin.cell_count())
        .filter(|&ix| ctx.spin.cell_at(ix) != symbol && !ctx.spin.is_sticky(ix))
        .collect();
    if candidates.is_empty() || max == 0 {
        return Ok(0);
    }

    let count = if max > 1 {
        1 + ctx.rng.int_n(max as u32)? as usize
    } else {
        1
    };
    let count = count.min(candidates.len());

    for _ in 0..count {
        let pick = ctx.rng.int_n(candidates.len() as u32)? as usize;
        let at = candidates.swap_remove(pick);
        ctx.spin.set_cell_at(at, symbol);
    }
    Ok(count)
}
