//! Round and step results

use serde::{Deserialize, Serialize};
use sf_core::{Index, RngLog};

use crate::actions::ActionOutcome;
use crate::spin::{SpinKind, SpinSnapshot};

/// A single payout entry. `line` is `None` for scatter / instant payouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u8>,
    pub symbol: Index,
    pub count: u8,
    pub amount: f64,
}

/// How a penalty is applied to the accumulated payout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PenaltyKind {
    Divide,
    Subtract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyItem {
    pub kind: PenaltyKind,
    pub value: f64,
}

/// One audit entry per evaluated action, triggered or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ActionOutcome>,
    /// Draws consumed by this action, present when logging is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng: Option<RngLog>,
}

impl AuditEvent {
    pub fn triggered(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Outcome of a bonus-wheel play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusPlay {
    pub action: u32,
    pub prize: Index,
    pub amount: f64,
}

/// A pending player decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRequest {
    pub key: String,
    pub options: Vec<String>,
}

/// Result of one step of a round (a spin, a refill, or a bonus play).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub kind: SpinKind,
    pub grid: Vec<Index>,
    pub payouts: Vec<PayoutItem>,
    pub penalties: Vec<PenaltyItem>,
    pub awarded_free_spins: u64,
    pub free_spins_remaining: u64,
    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<BonusPlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_symbol: Option<Index>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<i32>>,
    pub events: Vec<AuditEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng: Option<RngLog>,
    pub debug: bool,
}

impl StepResult {
    pub(crate) fn new(kind: SpinKind, debug: bool) -> Self {
        Self {
            kind,
            grid: Vec::new(),
            payouts: Vec::new(),
            penalties: Vec::new(),
            awarded_free_spins: 0,
            free_spins_remaining: 0,
            multiplier: 1.0,
            bonus: None,
            bonus_symbol: None,
            sticky: None,
            flags: None,
            events: Vec::new(),
            rng: None,
            debug,
        }
    }

    /// Sum of all payouts in this step, before penalties.
    pub fn payout_total(&self) -> f64 {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    /// Audit event for a specific action id, if the action was evaluated.
    pub fn event(&self, action: u32) -> Option<&AuditEvent> {
        self.events.iter().find(|e| e.action == action)
    }
}

/// Result of a complete (or suspended) round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub steps: Vec<StepResult>,
    /// Total payout in bet multiples, clamped to the configured ceiling.
    pub total_payout: f64,
    pub max_payout_reached: bool,
    pub min_payout_reached: bool,
    /// Present when the round is suspended on a player decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_choice: Option<ChoiceRequest>,
    /// Snapshot to persist for resumption, present when suspended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SpinSnapshot>,
    /// Selected script id; 0 when the round was not scripted.
    pub script: u32,
    /// Config hash for audit correlation.
    pub config_hash: String,
}

impl RoundResult {
    pub fn is_suspended(&self) -> bool {
        self.pending_choice.is_some()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
