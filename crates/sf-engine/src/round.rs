//! Round orchestration
//!
//! A [`Round`] owns the spin, the recorder and the compiled handlers, and
//! plays one round to completion: first spin, then free spins, refills,
//! bonus games and scripted branches until the counters drain, the payout
//! ceiling is hit, the reverse-win floor is reached, or a player decision
//! suspends the round. Buffers are reset and reused across rounds.

use std::collections::HashMap;
use std::sync::Arc;

use sf_core::{GameRng, Index, NULL_INDEX, RngLog, RngRecorder};

use crate::actions::{ActionOutcome, ActionRef};
use crate::config::GameConfig;
use crate::error::{ConfigError, EngineError};
use crate::handler::{ActionHandler, StepCtx, StepEffects};
use crate::results::{AuditEvent, ChoiceRequest, PenaltyKind, RoundResult, StepResult};
use crate::spin::{Spin, SpinKind, SpinSnapshot};

/// Player decisions, keyed by the choice key.
pub type ChoiceMap = HashMap<String, String>;

struct ScriptHandlers {
    first: ActionHandler,
    free: ActionHandler,
}

struct Handlers {
    first: ActionHandler,
    free: ActionHandler,
    first_bb: Option<ActionHandler>,
    free_bb: Option<ActionHandler>,
    scripts: HashMap<u32, ScriptHandlers>,
}

#[derive(Default)]
struct RoundState {
    total_payout: f64,
    max_payout_reached: bool,
    min_payout_reached: bool,
    free_spins: u64,
    need_refill: bool,
    super_spin: bool,
    make_choice: bool,
    free_started: bool,
    resuming: bool,
    debug: bool,
    forced_grid: bool,
    bonus_buy: u8,
    script: u32,
    bonus_game: Option<ActionRef>,
    pending_choice: Option<ChoiceRequest>,
    initial_choices: Option<ChoiceMap>,
    steps_run: usize,
    step_mark: usize,
}

/// Plays rounds for one game configuration.
pub struct Round {
    cfg: Arc<GameConfig>,
    spin: Spin,
    rng: RngRecorder,
    handlers: Handlers,
    steps: Vec<StepResult>,
    st: RoundState,
    suspended: Option<SpinSnapshot>,
}

impl Round {
    pub fn new(cfg: Arc<GameConfig>) -> Self {
        Self::with_recorder(cfg, RngRecorder::logging(Box::new(GameRng::new())))
    }

    pub fn with_recorder(cfg: Arc<GameConfig>, rng: RngRecorder) -> Self {
        let handlers = Handlers {
            first: ActionHandler::compile(cfg.first_actions()),
            free: ActionHandler::compile(cfg.free_actions()),
            first_bb: (!cfg.first_actions_bb().is_empty())
                .then(|| ActionHandler::compile(cfg.first_actions_bb())),
            free_bb: (!cfg.free_actions_bb().is_empty())
                .then(|| ActionHandler::compile(cfg.free_actions_bb())),
            scripts: cfg
                .scripts()
                .map(|sel| {
                    sel.scripts()
                        .iter()
                        .map(|s| {
                            (
                                s.id(),
                                ScriptHandlers {
                                    first: ActionHandler::compile(s.first_actions()),
                                    free: ActionHandler::compile(s.free_actions()),
                                },
                            )
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };
        let spin = Spin::new(cfg.reel_count(), cfg.rows(), cfg.flag_count());
        Self {
            cfg,
            spin,
            rng,
            handlers,
            steps: Vec::new(),
            st: RoundState::default(),
            suspended: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    /// The full draw log of the last round, for replay.
    pub fn rng_log(&self) -> &RngLog {
        self.rng.log()
    }

    // --- invocation surface ---

    /// Plays a round. `bonus_buy` 0 is a regular round; any other value
    /// force-activates the matching paid action.
    pub fn round(&mut self, bonus_buy: u8) -> Result<RoundResult, EngineError> {
        self.prepare_round(bonus_buy, false)?;
        self.play_out()
    }

    /// Plays a round with up-front player decisions.
    pub fn round_with_choices(
        &mut self,
        bonus_buy: u8,
        choices: ChoiceMap,
    ) -> Result<RoundResult, EngineError> {
        self.prepare_round(bonus_buy, false)?;
        self.st.initial_choices = Some(choices);
        self.play_out()
    }

    /// Debug: plays a round from a forced initial grid.
    pub fn round_with_grid(
        &mut self,
        grid: &[Index],
        bonus_buy: u8,
    ) -> Result<RoundResult, EngineError> {
        self.prepare_round(bonus_buy, true)?;
        self.spin.load_grid(grid)?;
        self.st.forced_grid = true;
        self.play_out()
    }

    /// Debug: replays a round from a captured draw log.
    pub fn round_with_cache(
        &mut self,
        cache: RngLog,
        bonus_buy: u8,
    ) -> Result<RoundResult, EngineError> {
        self.rng = RngRecorder::replay(cache);
        self.prepare_round(bonus_buy, false)?;
        self.st.debug = true;
        self.play_out()
    }

    /// Debug: plays a round with a forced script.
    pub fn round_scripted(
        &mut self,
        script: u32,
        bonus_buy: u8,
    ) -> Result<RoundResult, EngineError> {
        let known = self
            .cfg
            .scripts()
            .and_then(|sel| sel.script(script))
            .is_some();
        if !known {
            return Err(ConfigError::UnknownScript(script).into());
        }
        self.prepare_round(bonus_buy, true)?;
        self.set_script(script);
        self.play_out()
    }

    /// Loads a persisted suspension snapshot into this round.
    pub fn restore(&mut self, snapshot: SpinSnapshot) {
        self.suspended = Some(snapshot);
    }

    /// Resumes a suspended round with the player's decisions.
    pub fn resume(&mut self, choices: ChoiceMap) -> Result<RoundResult, EngineError> {
        let snapshot = self.suspended.take().ok_or(EngineError::NothingToResume)?;

        self.steps.clear();
        self.rng.reset_log();
        self.st = RoundState::default();
        self.spin.restore(&snapshot);
        self.st.resuming = true;
        self.st.bonus_buy = snapshot.bonus_buy;
        self.st.script = snapshot.script;
        self.st.total_payout = snapshot.total_payout;
        self.st.free_spins = snapshot.free_spins;
        self.st.free_started = snapshot.kind.is_free();

        let mut step = StepResult::new(self.spin.kind(), self.st.debug);
        let mut fx = StepEffects::default();
        {
            let handler = Self::pick(
                &self.handlers,
                self.st.script,
                self.st.free_started,
                self.st.bonus_buy,
            );
            let mut ctx = StepCtx {
                cfg: self.cfg.as_ref(),
                spin: &mut self.spin,
                rng: &mut self.rng,
                fx: &mut fx,
                step: &mut step,
            };
            handler.test_choices(&mut ctx, &choices)?;
        }

        if self.spin.seq() == 0 {
            // suspended before the reels landed; land the first spin now
            let kind = if self.cfg.double_spin() {
                SpinKind::First
            } else {
                SpinKind::Regular
            };
            self.spin.set_kind(kind);
            self.spin.spin(self.cfg.reels(), &mut self.rng)?;
            self.score_spin(step, fx)?;
        } else {
            self.settle(&mut step, fx)?;
            self.push_step(step);
        }

        self.result_loop()?;
        Ok(self.finish())
    }

    // --- round flow ---

    fn prepare_round(&mut self, bonus_buy: u8, debug: bool) -> Result<(), EngineError> {
        self.steps.clear();
        self.rng.reset_log();
        self.st = RoundState::default();
        self.suspended = None;
        self.spin.reset_round();
        self.st.bonus_buy = bonus_buy;
        self.st.debug = debug;

        let cfg = Arc::clone(&self.cfg);
        if let Some(sel) = cfg.scripts() {
            // the bonus-buy flag drives per-buy chance overrides
            if let Some(flag) = sel.bonus_flag() {
                self.spin.set_flag(flag, bonus_buy as i32);
            }
            if !debug
                && sel.bonus_buy_allowed(bonus_buy)
                && sel.triggered(&self.spin, &mut self.rng)?
            {
                if let Some(script) = sel.select(&mut self.rng, bonus_buy)? {
                    self.set_script(script.id());
                }
            }
        }
        Ok(())
    }

    fn set_script(&mut self, script: u32) {
        self.st.script = script;
        if let Some(flag) = self.cfg.scripts().and_then(|sel| sel.spin_flag()) {
            self.spin.set_flag(flag, script as i32);
        }
        log::debug!("scripted round {script} selected");
    }

    fn play_out(&mut self) -> Result<RoundResult, EngineError> {
        if !self.st.resuming {
            self.first_spin()?;
        }
        self.result_loop()?;
        Ok(self.finish())
    }

    fn first_spin(&mut self) -> Result<(), EngineError> {
        let kind = if self.cfg.double_spin() {
            SpinKind::First
        } else {
            SpinKind::Regular
        };
        self.spin.set_kind(kind);

        let mut step = StepResult::new(kind, self.st.debug);
        let mut fx = StepEffects::default();

        // pre-loop stages: up-front decisions, then pre-spin prizes
        {
            let handler = Self::pick(&self.handlers, self.st.script, false, self.st.bonus_buy);
            let mut ctx = StepCtx {
                cfg: self.cfg.as_ref(),
                spin: &mut self.spin,
                rng: &mut self.rng,
                fx: &mut fx,
                step: &mut step,
            };
            if let Some(choices) = self.st.initial_choices.take() {
                handler.test_choices(&mut ctx, &choices)?;
            }
            handler.test_pre_spin(&mut ctx)?;
        }
        if fx.make_choice {
            // suspend before the reels land
            self.settle(&mut step, fx)?;
            self.push_step(step);
            return Ok(());
        }

        if !self.st.forced_grid {
            self.spin.spin(self.cfg.reels(), &mut self.rng)?;
        }

        // a bought round must not carry an accidental base-game win
        if self.st.bonus_buy > 0 {
            let has_paid = Self::pick(&self.handlers, self.st.script, false, self.st.bonus_buy)
                .paid_action(self.st.bonus_buy)
                .is_some();
            if has_paid {
                let rows = self.spin.rows();
                self.cfg
                    .paytable()
                    .mismatch(self.spin.grid_mut(), rows, self.cfg.symbols());
                let handler =
                    Self::pick(&self.handlers, self.st.script, false, self.st.bonus_buy);
                let mut ctx = StepCtx {
                    cfg: self.cfg.as_ref(),
                    spin: &mut self.spin,
                    rng: &mut self.rng,
                    fx: &mut fx,
                    step: &mut step,
                };
                handler.force_paid(self.st.bonus_buy, &mut ctx)?;
            }
        }

        self.score_spin(step, fx)
    }

    fn result_loop(&mut self) -> Result<(), EngineError> {
        while !self.st.make_choice
            && !self.st.max_payout_reached
            && !self.st.min_payout_reached
            && (self.st.bonus_game.is_some() || self.st.free_spins > 0 || self.st.need_refill)
        {
            self.st.steps_run += 1;
            if self.st.steps_run > self.cfg.max_steps() {
                return Err(EngineError::StepLimit(self.cfg.max_steps()));
            }
            if let Some(bonus) = self.st.bonus_game.take() {
                self.play_bonus_game(bonus)?;
                continue;
            }
            self.play_free_spin()?;
        }
        Ok(())
    }

    fn play_free_spin(&mut self) -> Result<(), EngineError> {
        let kind = if self.st.need_refill {
            if self.st.super_spin {
                SpinKind::SuperSpin
            } else {
                SpinKind::RefillSpin
            }
        } else if self.cfg.double_spin() {
            SpinKind::FirstFree
        } else {
            SpinKind::FreeSpin
        };

        // refills do not consume the free-spin counter
        if !kind.is_refill() {
            self.st.free_spins -= 1;
            self.st.free_started = true;
        }
        self.st.need_refill = false;

        self.spin.set_kind(kind);
        self.spin.set_free_spins(self.st.free_spins);
        self.spin.spin(self.cfg.reels(), &mut self.rng)?;

        let step = StepResult::new(kind, self.st.debug);
        self.score_spin(step, StepEffects::default())
    }

    /// Scores the landed grid; a setup half spins and scores its second
    /// half as well.
    fn score_spin(&mut self, step: StepResult, fx: StepEffects) -> Result<(), EngineError> {
        if self.spin.kind().is_first_half() {
            self.run_setup_half(step, fx)?;
            let next = StepResult::new(self.spin.kind(), self.st.debug);
            self.run_scoring(next, StepEffects::default())
        } else {
            self.run_scoring(step, fx)
        }
    }

    /// The reduced stage subset of a double-spin setup half.
    fn run_setup_half(&mut self, mut step: StepResult, mut fx: StepEffects) -> Result<(), EngineError> {
        {
            let handler = Self::pick(
                &self.handlers,
                self.st.script,
                self.st.free_started,
                self.st.bonus_buy,
            );
            let mut ctx = StepCtx {
                cfg: self.cfg.as_ref(),
                spin: &mut self.spin,
                rng: &mut self.rng,
                fx: &mut fx,
                step: &mut step,
            };
            handler.test_grid_revisions(&mut ctx)?;
            handler.test_grid_actions(&mut ctx)?;
            handler.test_stickiness(&mut ctx)?;
        }
        self.settle(&mut step, fx)?;
        self.push_step(step);

        let next = if self.spin.kind() == SpinKind::First {
            SpinKind::Second
        } else {
            SpinKind::SecondFree
        };
        self.spin.set_kind(next);
        self.spin.spin(self.cfg.reels(), &mut self.rng)?;
        Ok(())
    }

    /// The full stage pipeline for a scoring spin.
    fn run_scoring(&mut self, mut step: StepResult, mut fx: StepEffects) -> Result<(), EngineError> {
        let kind = self.spin.kind();
        let super_spin = kind == SpinKind::SuperSpin;
        let skip_revisions = self.st.forced_grid && self.spin.seq() == 1;
        {
            let handler = Self::pick(
                &self.handlers,
                self.st.script,
                self.st.free_started,
                self.st.bonus_buy,
            );
            let mut ctx = StepCtx {
                cfg: self.cfg.as_ref(),
                spin: &mut self.spin,
                rng: &mut self.rng,
                fx: &mut fx,
                step: &mut step,
            };
            if !super_spin {
                if !skip_revisions {
                    handler.test_grid_revisions(&mut ctx)?;
                }
                handler.test_before_expansions(&mut ctx)?;
            }
            handler.test_grid_actions(&mut ctx)?;
            if super_spin {
                // a super spin only collects; it never scores paylines
                handler.test_state_changes(&mut ctx)?;
                handler.test_extra_payouts(&mut ctx)?;
            } else {
                handler.test_regular_payouts(&mut ctx)?;
                handler.test_regular_penalties(&mut ctx)?;
                handler.test_injections(&mut ctx)?;
                handler.test_after_expansions(&mut ctx)?;
                handler.test_state_changes(&mut ctx)?;
                handler.test_extra_payouts(&mut ctx)?;
                handler.test_bonuses(&mut ctx)?;
                handler.test_stickiness(&mut ctx)?;
                handler.test_clearing(&mut ctx)?;
            }

            // bonus symbol selection when the round continues into more spins
            let continuing = !ctx.fx.make_choice
                && (self.st.free_spins + ctx.fx.free_spins_awarded > 0
                    || ctx.fx.need_refill
                    || ctx.fx.bonus_game.is_some());
            if continuing {
                handler.test_pre_bonus(&mut ctx)?;
            }
        }

        self.settle(&mut step, fx)?;
        self.push_step(step);
        Ok(())
    }

    fn play_bonus_game(&mut self, action: ActionRef) -> Result<(), EngineError> {
        let mut step = StepResult::new(self.spin.kind(), self.st.debug);
        let mut fx = StepEffects::default();
        {
            let mut ctx = StepCtx {
                cfg: self.cfg.as_ref(),
                spin: &mut self.spin,
                rng: &mut self.rng,
                fx: &mut fx,
                step: &mut step,
            };
            ActionHandler::run_bonus_wheel(&action, &mut ctx)?;
        }
        self.settle(&mut step, fx)?;
        self.push_step(step);
        Ok(())
    }

    /// Applies step effects to round state and settles the payout.
    fn settle(&mut self, step: &mut StepResult, fx: StepEffects) -> Result<(), EngineError> {
        self.st.free_spins += fx.free_spins_awarded;
        step.awarded_free_spins = fx.free_spins_awarded;
        if fx.need_refill {
            self.st.need_refill = true;
        }
        if fx.super_spin {
            self.st.super_spin = true;
        }

        let kind = self.spin.kind();
        if kind == SpinKind::SuperSpin && !fx.need_refill {
            // the respin sequence is over; it consumes one free spin
            // unless it awarded its own
            self.st.super_spin = false;
            if fx.free_spins_awarded == 0 && self.st.free_spins > 0 {
                self.st.free_spins -= 1;
            }
        }

        if let Some(bonus) = fx.bonus_game {
            self.st.bonus_game = Some(bonus);
        }
        if fx.make_choice {
            self.st.make_choice = true;
            let handler = Self::pick(
                &self.handlers,
                self.st.script,
                self.st.free_started,
                self.st.bonus_buy,
            );
            self.st.pending_choice = handler.choice_request();
        }

        // payout accounting
        self.st.total_payout += step.payout_total();
        for p in &step.penalties {
            match p.kind {
                PenaltyKind::Divide => {
                    if p.value != 0.0 {
                        self.st.total_payout /= p.value;
                    }
                }
                PenaltyKind::Subtract => self.st.total_payout -= p.value,
            }
        }

        if self.cfg.reverse_win() && self.st.total_payout <= 0.0 && self.spin.seq() > 1 {
            self.st.min_payout_reached = true;
        }
        if self.st.total_payout < 0.0 {
            self.st.total_payout = 0.0;
        }

        let max = self.cfg.max_payout();
        if max > 0.0 && self.st.total_payout >= max {
            if !self.st.max_payout_reached {
                log::warn!(
                    "payout ceiling reached: {:.2} clamped to {max:.2}",
                    self.st.total_payout
                );
                step.events.push(AuditEvent {
                    action: 0,
                    outcome: Some(ActionOutcome::MaxPayoutReached),
                    rng: None,
                });
            }
            self.st.total_payout = max;
            self.st.max_payout_reached = true;
        }

        self.spin.set_free_spins(self.st.free_spins);
        self.spin
            .set_payout_ratio(if max > 0.0 { self.st.total_payout / max } else { 0.0 });
        Ok(())
    }

    fn push_step(&mut self, mut step: StepResult) {
        step.grid = self.spin.grid().to_vec();
        step.multiplier = self.spin.multiplier();
        step.free_spins_remaining = self.st.free_spins;
        if self.spin.has_sticky() {
            step.sticky = Some(self.spin.sticky_mask().to_vec());
        }
        if self.cfg.has_exported_flags() {
            step.flags = Some(self.cfg.export_flags(self.spin.flags()));
        }
        if self.spin.bonus_symbol() != NULL_INDEX {
            step.bonus_symbol = Some(self.spin.bonus_symbol());
        }
        if self.rng.is_logging() {
            step.rng = Some(self.rng.log_slice(self.st.step_mark));
        }
        self.st.step_mark = self.rng.log_len();
        self.steps.push(step);
    }

    fn finish(&mut self) -> RoundResult {
        if self.st.make_choice {
            self.suspended = Some(self.spin.snapshot(
                self.st.total_payout,
                self.st.script,
                self.st.bonus_buy,
            ));
        }
        log::info!(
            "round complete: {} steps, payout {:.2}, max={}, suspended={}",
            self.steps.len(),
            self.st.total_payout,
            self.st.max_payout_reached,
            self.st.make_choice,
        );
        RoundResult {
            steps: std::mem::take(&mut self.steps),
            total_payout: self.st.total_payout,
            max_payout_reached: self.st.max_payout_reached,
            min_payout_reached: self.st.min_payout_reached,
            pending_choice: self.st.pending_choice.clone(),
            snapshot: self.suspended.clone(),
            script: self.st.script,
            config_hash: self.cfg.hash().to_string(),
        }
    }

    fn pick<'h>(handlers: &'h Handlers, script: u32, free: bool, bonus_buy: u8) -> &'h ActionHandler {
        if script != 0 {
            if let Some(sh) = handlers.scripts.get(&script) {
                return if free { &sh.free } else { &sh.first };
            }
        }
        if bonus_buy > 0 {
            if free {
                if let Some(h) = &handlers.free_bb {
                    return h;
                }
            } else if let Some(h) = &handlers.first_bb {
                return h;
            }
        }
        if free { &handlers.free } else { &handlers.first }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use sf_core::GameRng;

    fn seeded_round(cfg: GameConfig, seed: u64) -> Round {
        Round::with_recorder(
            Arc::new(cfg),
            RngRecorder::logging(Box::new(GameRng::seeded(seed))),
        )
    }

    #[test]
    fn test_rounds_complete_with_consistent_accounting() {
        for seed in 0..50 {
            let mut round = seeded_round(presets::demo_config().unwrap(), seed);
            let result = round.round(0).unwrap();

            assert!(result.total_payout >= 0.0, "seed {seed}");
            assert!(result.total_payout <= 5_000.0, "seed {seed}");
            assert!(!result.is_suspended(), "seed {seed}");
            assert_eq!(result.script, 0);

            // every awarded free spin is consumed before the round ends
            if !result.max_payout_reached {
                let awarded: u64 = result.steps.iter().map(|s| s.awarded_free_spins).sum();
                let consumed = result
                    .steps
                    .iter()
                    .filter(|s| s.kind == SpinKind::FreeSpin)
                    .count() as u64;
                assert_eq!(awarded, consumed, "seed {seed}");
                assert_eq!(
                    result.steps.last().map(|s| s.free_spins_remaining),
                    Some(0),
                    "seed {seed}"
                );
            }
        }
    }

    #[test]
    fn test_step_rng_slices_cover_the_full_log() {
        let mut round = seeded_round(presets::demo_config().unwrap(), 11);
        let result = round.round(0).unwrap();

        let sliced: usize = result
            .steps
            .iter()
            .map(|s| s.rng.as_ref().map(|l| l.len()).unwrap_or(0))
            .sum();
        assert_eq!(sliced, round.rng_log().len());
    }

    #[test]
    fn test_result_carries_config_hash() {
        let cfg = presets::demo_config().unwrap();
        let hash = cfg.hash().to_string();
        let mut round = seeded_round(cfg, 3);
        let result = round.round(0).unwrap();
        assert_eq!(result.config_hash, hash);
    }

    #[test]
    fn test_resume_without_snapshot_fails() {
        let mut round = seeded_round(presets::demo_config().unwrap(), 1);
        let err = round.resume(ChoiceMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::NothingToResume));
    }

    #[test]
    fn test_unknown_script_is_rejected() {
        let mut round = seeded_round(presets::scripted_config().unwrap(), 1);
        let err = round.round_scripted(9, 0).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::UnknownScript(9))
        ));
    }
}
