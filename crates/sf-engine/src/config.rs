//! Game configuration
//!
//! A [`GameConfig`] is an explicit, validated object: the grid, the symbol
//! set, the reel distributions, the paytable, the round flags and the four
//! action lists (first / free, with optional bonus-buy variants), plus an
//! optional scripted-round selector. Configs are code-built through the
//! builder; the data model round-trips through JSON for tooling, and a
//! SHA-256 hash of the canonical descriptor travels with every result for
//! audit correlation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sf_core::{Index, NULL_INDEX};

use crate::actions::{Action, ActionEffect, ActionRef, TriggerFilter};
use crate::error::ConfigError;
use crate::paytable::{PayTable, Payline};
use crate::scripted::ScriptSelector;
use crate::spin::ReelSet;
use crate::symbols::SymbolSet;

/// A declared round flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFlag {
    pub id: usize,
    pub name: String,
    pub export: bool,
}

impl RoundFlag {
    pub fn new(id: usize, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            export: false,
        }
    }

    /// Makes the flag visible in step results.
    pub fn with_export(mut self) -> Self {
        self.export = true;
        self
    }
}

/// Serializable summary of one configured action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    pub id: u32,
    pub name: String,
    pub stage: String,
    pub list: String,
}

/// The data model of a config, used for JSON exchange and hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDescriptor {
    pub name: String,
    pub reels: usize,
    pub rows: usize,
    pub max_payout: f64,
    pub reverse_win: bool,
    pub double_spin: bool,
    pub symbols: SymbolSet,
    pub paylines: Vec<Payline>,
    pub flags: Vec<RoundFlag>,
    pub actions: Vec<ActionSummary>,
    pub scripts: Vec<u32>,
}

impl GameDescriptor {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A complete, validated game configuration.
#[derive(Debug, Clone)]
pub struct GameConfig {
    name: String,
    reel_count: usize,
    rows: usize,
    symbols: SymbolSet,
    reels: ReelSet,
    paytable: PayTable,
    flags: Vec<RoundFlag>,
    flag_count: usize,
    max_payout: f64,
    reverse_win: bool,
    double_spin: bool,
    max_steps: usize,
    first_actions: Vec<ActionRef>,
    free_actions: Vec<ActionRef>,
    first_actions_bb: Vec<ActionRef>,
    free_actions_bb: Vec<ActionRef>,
    scripts: Option<ScriptSelector>,
    hash: String,
}

impl GameConfig {
    pub fn builder(name: &str) -> GameConfigBuilder {
        GameConfigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reel_count(&self) -> usize {
        self.reel_count
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    pub fn reels(&self) -> &ReelSet {
        &self.reels
    }

    pub fn paytable(&self) -> &PayTable {
        &self.paytable
    }

    pub fn flags(&self) -> &[RoundFlag] {
        &self.flags
    }

    pub fn flag_count(&self) -> usize {
        self.flag_count
    }

    pub fn max_payout(&self) -> f64 {
        self.max_payout
    }

    pub fn reverse_win(&self) -> bool {
        self.reverse_win
    }

    pub fn double_spin(&self) -> bool {
        self.double_spin
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn first_actions(&self) -> &[ActionRef] {
        &self.first_actions
    }

    pub fn free_actions(&self) -> &[ActionRef] {
        &self.free_actions
    }

    pub fn first_actions_bb(&self) -> &[ActionRef] {
        &self.first_actions_bb
    }

    pub fn free_actions_bb(&self) -> &[ActionRef] {
        &self.free_actions_bb
    }

    pub fn scripts(&self) -> Option<&ScriptSelector> {
        self.scripts.as_ref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn has_exported_flags(&self) -> bool {
        self.flags.iter().any(|f| f.export)
    }

    /// Exported flag values; non-exported flags read as zero.
    pub fn export_flags(&self, values: &[i32]) -> Vec<i32> {
        let mut out = vec![0; self.flag_count];
        for flag in &self.flags {
            if flag.export {
                out[flag.id] = values.get(flag.id).copied().unwrap_or(0);
            }
        }
        out
    }

    /// The serializable data model of this config.
    pub fn descriptor(&self) -> GameDescriptor {
        let mut actions = Vec::new();
        let lists = [
            ("first", &self.first_actions),
            ("free", &self.free_actions),
            ("first-bb", &self.first_actions_bb),
            ("free-bb", &self.free_actions_bb),
        ];
        for (list, bucket) in lists {
            for action in bucket.iter() {
                summarize(action, list, &mut actions);
            }
        }
        let mut scripts = Vec::new();
        if let Some(sel) = &self.scripts {
            for script in sel.scripts() {
                scripts.push(script.id());
                for action in script.first_actions() {
                    summarize(action, "script-first", &mut actions);
                }
                for action in script.free_actions() {
                    summarize(action, "script-free", &mut actions);
                }
            }
        }
        GameDescriptor {
            name: self.name.clone(),
            reels: self.reel_count,
            rows: self.rows,
            max_payout: self.max_payout,
            reverse_win: self.reverse_win,
            double_spin: self.double_spin,
            symbols: self.symbols.clone(),
            paylines: self.paytable.paylines().to_vec(),
            flags: self.flags.clone(),
            actions,
            scripts,
        }
    }
}

fn summarize(action: &Action, list: &str, out: &mut Vec<ActionSummary>) {
    out.push(ActionSummary {
        id: action.id(),
        name: action.name().to_string(),
        stage: action.stage().name().to_string(),
        list: list.to_string(),
    });
    if let Some(alt) = action.alternate() {
        summarize(alt, list, out);
    }
}

// SHA-256 of the canonical descriptor JSON, hex-encoded.
fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Builder for [`GameConfig`]. Validation happens in [`build`].
///
/// [`build`]: GameConfigBuilder::build
pub struct GameConfigBuilder {
    name: String,
    reel_count: usize,
    rows: usize,
    symbols: Option<SymbolSet>,
    reels: Option<ReelSet>,
    paytable: Option<PayTable>,
    flags: Vec<RoundFlag>,
    max_payout: f64,
    reverse_win: bool,
    double_spin: bool,
    max_steps: usize,
    first_actions: Vec<ActionRef>,
    free_actions: Vec<ActionRef>,
    first_actions_bb: Vec<ActionRef>,
    free_actions_bb: Vec<ActionRef>,
    scripts: Option<ScriptSelector>,
}

impl GameConfigBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reel_count: 5,
            rows: 3,
            symbols: None,
            reels: None,
            paytable: None,
            flags: Vec::new(),
            max_payout: 0.0,
            reverse_win: false,
            double_spin: false,
            max_steps: 1000,
            first_actions: Vec::new(),
            free_actions: Vec::new(),
            first_actions_bb: Vec::new(),
            free_actions_bb: Vec::new(),
            scripts: None,
        }
    }

    pub fn grid(mut self, reel_count: usize, rows: usize) -> Self {
        self.reel_count = reel_count;
        self.rows = rows;
        self
    }

    pub fn symbols(mut self, symbols: SymbolSet) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn reels(mut self, reels: ReelSet) -> Self {
        self.reels = Some(reels);
        self
    }

    pub fn paytable(mut self, paytable: PayTable) -> Self {
        self.paytable = Some(paytable);
        self
    }

    pub fn flags(mut self, flags: Vec<RoundFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Payout ceiling in bet multiples; 0 disables the ceiling.
    pub fn max_payout(mut self, max: f64) -> Self {
        self.max_payout = max;
        self
    }

    pub fn reverse_win(mut self) -> Self {
        self.reverse_win = true;
        self
    }

    pub fn double_spin(mut self) -> Self {
        self.double_spin = true;
        self
    }

    /// Hard cap on steps per round; the liveness guard.
    pub fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn first_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.first_actions = actions;
        self
    }

    pub fn free_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.free_actions = actions;
        self
    }

    /// Action list overrides for bought rounds.
    pub fn paid_first_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.first_actions_bb = actions;
        self
    }

    pub fn paid_free_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.free_actions_bb = actions;
        self
    }

    pub fn scripts(mut self, selector: ScriptSelector) -> Self {
        self.scripts = Some(selector);
        self
    }

    pub fn build(self) -> Result<GameConfig, ConfigError> {
        if self.reel_count < 3 || self.rows < 2 {
            return Err(ConfigError::BadGrid {
                reels: self.reel_count,
                rows: self.rows,
            });
        }
        let symbols = self.symbols.ok_or(ConfigError::NoSymbols)?;
        let reels = self.reels.ok_or(ConfigError::EmptyReel(0))?;
        reels.validate()?;
        if reels.reel_count() != self.reel_count || reels.rows() != self.rows {
            return Err(ConfigError::BadGrid {
                reels: reels.reel_count(),
                rows: reels.rows(),
            });
        }

        let paytable = self
            .paytable
            .unwrap_or_else(|| PayTable::new(crate::paytable::default_paylines(self.reel_count, self.rows)));
        for line in paytable.paylines() {
            if line.positions.len() != self.reel_count
                || line.positions.iter().any(|&p| p as usize >= self.rows)
            {
                return Err(ConfigError::BadPayline {
                    index: line.index,
                    reels: self.reel_count,
                });
            }
        }

        let flag_count = self.flags.iter().map(|f| f.id + 1).max().unwrap_or(0);

        // collect every reachable action for cross-list validation
        let mut all: Vec<&ActionRef> = Vec::new();
        for list in [
            &self.first_actions,
            &self.free_actions,
            &self.first_actions_bb,
            &self.free_actions_bb,
        ] {
            all.extend(list.iter());
        }
        if let Some(sel) = &self.scripts {
            for script in sel.scripts() {
                all.extend(script.first_actions().iter());
                all.extend(script.free_actions().iter());
            }
        }

        for (ix, action) in all.iter().enumerate() {
            // shared instances are fine; distinct actions must not collide
            if all[..ix]
                .iter()
                .any(|o| o.id() == action.id() && !std::sync::Arc::ptr_eq(o, action))
            {
                return Err(ConfigError::DuplicateActionId(action.id()));
            }
            validate_action(action, &symbols, flag_count)?;
        }

        if let Some(sel) = &self.scripts {
            for flag in [sel.spin_flag()] {
                if let Some(f) = flag {
                    if f >= flag_count {
                        return Err(ConfigError::FlagOutOfRange {
                            flag: f,
                            declared: flag_count,
                        });
                    }
                }
            }
        }

        let mut cfg = GameConfig {
            name: self.name,
            reel_count: self.reel_count,
            rows: self.rows,
            symbols,
            reels,
            paytable,
            flags: self.flags,
            flag_count,
            max_payout: self.max_payout,
            reverse_win: self.reverse_win,
            double_spin: self.double_spin,
            max_steps: self.max_steps,
            first_actions: self.first_actions,
            free_actions: self.free_actions,
            first_actions_bb: self.first_actions_bb,
            free_actions_bb: self.free_actions_bb,
            scripts: self.scripts,
            hash: String::new(),
        };
        let json = cfg
            .descriptor()
            .to_json()
            .unwrap_or_else(|_| cfg.name.clone());
        cfg.hash = sha256_hex(json.as_bytes());
        Ok(cfg)
    }
}

fn validate_action(
    action: &Action,
    symbols: &SymbolSet,
    flag_count: usize,
) -> Result<(), ConfigError> {
    let check_flag = |flag: usize| {
        if flag >= flag_count {
            Err(ConfigError::FlagOutOfRange {
                flag,
                declared: flag_count,
            })
        } else {
            Ok(())
        }
    };
    let check_symbol = |symbol: Index| {
        // the sentinel resolves to the bonus symbol at runtime
        if symbol != NULL_INDEX && !symbols.contains(symbol) {
            Err(ConfigError::UnknownSymbol(symbol))
        } else {
            Ok(())
        }
    };

    match action.effect() {
        ActionEffect::PaidBonus { flag, .. } => {
            if let Some((ix, _)) = flag {
                check_flag(*ix)?;
            }
        }
        ActionEffect::NudgeScatter { symbol, .. }
        | ActionEffect::ExpandWilds { symbol, .. }
        | ActionEffect::HoldAndRespin { symbol, .. }
        | ActionEffect::WildMultiplier { symbol, .. }
        | ActionEffect::Penalty { symbol, .. }
        | ActionEffect::InjectSymbols { symbol, .. }
        | ActionEffect::ScatterPayout { symbol, .. }
        | ActionEffect::ScatterFreeSpins { symbol, .. }
        | ActionEffect::StickySymbol { symbol, .. } => check_symbol(*symbol)?,
        ActionEffect::MorphSymbol { from, to, .. } => {
            check_symbol(*from)?;
            check_symbol(*to)?;
        }
        ActionEffect::CountToFlag { symbol, flag } => {
            check_symbol(*symbol)?;
            check_flag(*flag)?;
        }
        ActionEffect::CollectToFlag { symbol, flag, .. } => {
            check_symbol(*symbol)?;
            check_flag(*flag)?;
        }
        ActionEffect::PlayerChoice { flag, .. } => check_flag(*flag)?,
        ActionEffect::InstantPrize { .. }
        | ActionEffect::LinePayouts
        | ActionEffect::ClearPayouts
        | ActionEffect::BonusWheel { .. }
        | ActionEffect::BonusSymbol { .. } => {}
    }

    for filter in action.filters() {
        match filter {
            TriggerFilter::FlagEquals { flag, .. } | TriggerFilter::FlagAtLeast { flag, .. } => {
                check_flag(*flag)?;
            }
            TriggerFilter::SymbolsAtLeast { symbol, .. } => check_symbol(*symbol)?,
            _ => {}
        }
    }

    if let Some(alt) = action.alternate() {
        validate_action(alt, symbols, flag_count)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn test_demo_config_builds_and_hashes() {
        let cfg = presets::demo_config().unwrap();
        assert_eq!(cfg.hash().len(), 64);
        assert!(cfg.hash().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(cfg.flag_count() >= 1);
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = presets::demo_config().unwrap();
        let b = presets::demo_config().unwrap();
        assert_eq!(a.hash(), b.hash());

        let c = presets::demo_config_named("other name").unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_descriptor_round_trips_through_json() {
        let cfg = presets::demo_config().unwrap();
        let json = cfg.descriptor().to_json().unwrap();
        let back = GameDescriptor::from_json(&json).unwrap();
        assert_eq!(back.name, cfg.name());
        assert_eq!(back.reels, cfg.reel_count());
        assert_eq!(back.actions.len(), cfg.descriptor().actions.len());
    }

    #[test]
    fn test_duplicate_action_ids_rejected() {
        let err = presets::demo_config_with_duplicate_id().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateActionId(_)));
    }

    #[test]
    fn test_flag_out_of_range_rejected() {
        let err = presets::demo_config_with_bad_flag().unwrap_err();
        assert!(matches!(err, ConfigError::FlagOutOfRange { .. }));
    }

    #[test]
    fn test_bad_grid_rejected() {
        let err = GameConfig::builder("tiny").grid(2, 1).build().unwrap_err();
        assert!(matches!(err, ConfigError::BadGrid { .. }));
    }
}
