//! Spin state — the live grid and everything the actions read and mutate
//!
//! A [`Spin`] is owned by the round and reused across rounds; buffers are
//! reset in place rather than reallocated. Round flags live here because
//! actions use them to talk to each other across spins within one round.

use serde::{Deserialize, Serialize};
use sf_core::{Index, NULL_INDEX, RngRecorder, Weighting};

use crate::{ConfigError, EngineError};

/// The role a single spin plays within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpinKind {
    /// Ordinary paid spin.
    Regular,
    /// Setup half of a paid double spin.
    First,
    /// Scoring half of a paid double spin.
    Second,
    /// Ordinary free spin.
    FreeSpin,
    /// Setup half of a free double spin.
    FirstFree,
    /// Scoring half of a free double spin.
    SecondFree,
    /// Refill of empty / non-sticky cells (hold & win, cascades).
    RefillSpin,
    /// Refill towards a super shape.
    SuperSpin,
}

impl SpinKind {
    pub fn is_free(self) -> bool {
        matches!(
            self,
            SpinKind::FreeSpin | SpinKind::FirstFree | SpinKind::SecondFree
        )
    }

    /// Setup half of a double spin.
    pub fn is_first_half(self) -> bool {
        matches!(self, SpinKind::First | SpinKind::FirstFree)
    }

    pub fn is_refill(self) -> bool {
        matches!(self, SpinKind::RefillSpin | SpinKind::SuperSpin)
    }
}

/// Per-reel weighted symbol distributions.
#[derive(Debug, Clone)]
pub struct ReelSet {
    reels: Vec<Weighting>,
    rows: usize,
}

impl ReelSet {
    /// Same distribution on every reel.
    pub fn uniform(weighting: Weighting, reel_count: usize, rows: usize) -> Self {
        Self {
            reels: vec![weighting; reel_count],
            rows,
        }
    }

    /// One distribution per reel.
    pub fn from_reels(reels: Vec<Weighting>, rows: usize) -> Self {
        Self { reels, rows }
    }

    pub fn reel_count(&self) -> usize {
        self.reels.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (ix, reel) in self.reels.iter().enumerate() {
            if reel.is_empty() {
                return Err(ConfigError::EmptyReel(ix));
            }
        }
        Ok(())
    }

    /// Fills a whole reel column, honouring the reel's dedup mode.
    pub fn fill_reel(
        &self,
        reel: usize,
        rng: &mut RngRecorder,
        out: &mut [Index],
    ) -> Result<(), EngineError> {
        self.reels[reel].fill(rng, out)?;
        Ok(())
    }

    /// Draws a single cell for a reel.
    pub fn sample_cell(&self, reel: usize, rng: &mut RngRecorder) -> Result<Index, EngineError> {
        Ok(self.reels[reel].sample(rng)?)
    }
}

/// Serializable snapshot of a suspended or mid-double spin.
///
/// Snapshots are self-contained: restoring one brings back everything a
/// resumed round needs, including the payout accumulated so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinSnapshot {
    pub grid: Vec<Index>,
    pub sticky: Vec<bool>,
    pub locked: Vec<bool>,
    pub round_flags: Vec<i32>,
    pub kind: SpinKind,
    pub spin_seq: u64,
    pub free_spins: u64,
    pub multiplier: f64,
    pub bonus_symbol: Index,
    pub total_payout: f64,
    pub script: u32,
    pub bonus_buy: u8,
}

/// Live spin state.
#[derive(Debug, Clone)]
pub struct Spin {
    reel_count: usize,
    rows: usize,
    grid: Vec<Index>,
    sticky: Vec<bool>,
    locked: Vec<bool>,
    win_marks: Vec<bool>,
    round_flags: Vec<i32>,
    kind: SpinKind,
    spin_seq: u64,
    free_spins: u64,
    multiplier: f64,
    bonus_symbol: Index,
    payout_ratio: f64,
}

impl Spin {
    pub fn new(reel_count: usize, rows: usize, flag_count: usize) -> Self {
        let cells = reel_count * rows;
        Self {
            reel_count,
            rows,
            grid: vec![0; cells],
            sticky: vec![false; cells],
            locked: vec![false; reel_count],
            win_marks: vec![false; cells],
            round_flags: vec![0; flag_count],
            kind: SpinKind::Regular,
            spin_seq: 0,
            free_spins: 0,
            multiplier: 1.0,
            bonus_symbol: NULL_INDEX,
            payout_ratio: 0.0,
        }
    }

    /// Resets everything a new round must not inherit.
    pub fn reset_round(&mut self) {
        self.grid.fill(0);
        self.sticky.fill(false);
        self.locked.fill(false);
        self.win_marks.fill(false);
        self.round_flags.fill(0);
        self.kind = SpinKind::Regular;
        self.spin_seq = 0;
        self.free_spins = 0;
        self.multiplier = 1.0;
        self.bonus_symbol = NULL_INDEX;
        self.payout_ratio = 0.0;
    }

    // --- grid ---

    pub fn reel_count(&self) -> usize {
        self.reel_count
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    #[inline]
    pub fn offset(&self, reel: usize, row: usize) -> usize {
        reel * self.rows + row
    }

    pub fn cell(&self, reel: usize, row: usize) -> Index {
        self.grid[self.offset(reel, row)]
    }

    pub fn set_cell(&mut self, reel: usize, row: usize, symbol: Index) {
        let ix = self.offset(reel, row);
        self.grid[ix] = symbol;
    }

    pub fn cell_at(&self, offset: usize) -> Index {
        self.grid[offset]
    }

    pub fn set_cell_at(&mut self, offset: usize, symbol: Index) {
        self.grid[offset] = symbol;
    }

    pub fn grid(&self) -> &[Index] {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut [Index] {
        &mut self.grid
    }

    /// Loads a forced grid (debug rounds).
    pub fn load_grid(&mut self, cells: &[Index]) -> Result<(), ConfigError> {
        if cells.len() != self.grid.len() {
            return Err(ConfigError::BadGrid {
                reels: self.reel_count,
                rows: self.rows,
            });
        }
        self.grid.copy_from_slice(cells);
        self.spin_seq += 1;
        Ok(())
    }

    pub fn count_symbol(&self, symbol: Index) -> u8 {
        self.grid.iter().filter(|&&s| s == symbol).count() as u8
    }

    // --- spinning ---

    /// Lands a new grid.
    ///
    /// Refill kinds only redraw empty and non-sticky cells; all other kinds
    /// redraw every unlocked reel, keeping sticky cells in place.
    pub fn spin(&mut self, reels: &ReelSet, rng: &mut RngRecorder) -> Result<(), EngineError> {
        self.spin_seq += 1;
        self.win_marks.fill(false);

        if self.kind.is_refill() {
            if self.sticky.iter().any(|&s| s) {
                self.clear_non_sticky();
            }
            return self.refill(reels, rng);
        }

        for reel in 0..self.reel_count {
            if self.locked[reel] {
                continue;
            }
            let start = reel * self.rows;
            let column = start..start + self.rows;
            if self.sticky[column.clone()].iter().any(|&s| s) {
                for row in 0..self.rows {
                    if !self.sticky[start + row] {
                        self.grid[start + row] = reels.sample_cell(reel, rng)?;
                    }
                }
            } else {
                reels.fill_reel(reel, rng, &mut self.grid[column])?;
            }
        }
        Ok(())
    }

    /// Draws symbols into every empty cell.
    pub fn refill(&mut self, reels: &ReelSet, rng: &mut RngRecorder) -> Result<(), EngineError> {
        for reel in 0..self.reel_count {
            if self.locked[reel] {
                continue;
            }
            for row in 0..self.rows {
                let ix = self.offset(reel, row);
                if self.grid[ix] == 0 {
                    self.grid[ix] = reels.sample_cell(reel, rng)?;
                }
            }
        }
        Ok(())
    }

    pub fn clear_non_sticky(&mut self) {
        for ix in 0..self.grid.len() {
            if !self.sticky[ix] {
                self.grid[ix] = 0;
            }
        }
    }

    // --- sticky / locked / win marks ---

    pub fn is_sticky(&self, offset: usize) -> bool {
        self.sticky[offset]
    }

    pub fn set_sticky(&mut self, offset: usize, sticky: bool) {
        self.sticky[offset] = sticky;
    }

    pub fn has_sticky(&self) -> bool {
        self.sticky.iter().any(|&s| s)
    }

    pub fn sticky_mask(&self) -> &[bool] {
        &self.sticky
    }

    pub fn lock_reel(&mut self, reel: usize) {
        self.locked[reel] = true;
    }

    pub fn unlock_all(&mut self) {
        self.locked.fill(false);
    }

    pub fn mark_win(&mut self, offset: usize) {
        self.win_marks[offset] = true;
    }

    pub fn has_win_marks(&self) -> bool {
        self.win_marks.iter().any(|&m| m)
    }

    pub fn clear_win_marks(&mut self) {
        self.win_marks.fill(false);
    }

    /// Empties all marked cells and drops the marks. Returns the number of
    /// cells cleared.
    pub fn clear_marked_cells(&mut self) -> usize {
        let mut cleared = 0;
        for ix in 0..self.grid.len() {
            if self.win_marks[ix] && !self.sticky[ix] {
                self.grid[ix] = 0;
                cleared += 1;
            }
            self.win_marks[ix] = false;
        }
        cleared
    }

    // --- round flags ---

    pub fn flag(&self, ix: usize) -> i32 {
        self.round_flags.get(ix).copied().unwrap_or(0)
    }

    pub fn set_flag(&mut self, ix: usize, value: i32) {
        if let Some(f) = self.round_flags.get_mut(ix) {
            *f = value;
        }
    }

    pub fn inc_flag(&mut self, ix: usize, by: i32) {
        if let Some(f) = self.round_flags.get_mut(ix) {
            *f += by;
        }
    }

    pub fn flags(&self) -> &[i32] {
        &self.round_flags
    }

    // --- scalar state ---

    pub fn kind(&self) -> SpinKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: SpinKind) {
        self.kind = kind;
    }

    pub fn seq(&self) -> u64 {
        self.spin_seq
    }

    pub fn free_spins(&self) -> u64 {
        self.free_spins
    }

    pub fn set_free_spins(&mut self, n: u64) {
        self.free_spins = n;
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, m: f64) {
        self.multiplier = m;
    }

    pub fn bonus_symbol(&self) -> Index {
        self.bonus_symbol
    }

    pub fn set_bonus_symbol(&mut self, symbol: Index) {
        self.bonus_symbol = symbol;
    }

    pub fn payout_ratio(&self) -> f64 {
        self.payout_ratio
    }

    pub fn set_payout_ratio(&mut self, r: f64) {
        self.payout_ratio = r;
    }

    // --- snapshots ---

    pub fn snapshot(&self, total_payout: f64, script: u32, bonus_buy: u8) -> SpinSnapshot {
        SpinSnapshot {
            grid: self.grid.clone(),
            sticky: self.sticky.clone(),
            locked: self.locked.clone(),
            round_flags: self.round_flags.clone(),
            kind: self.kind,
            spin_seq: self.spin_seq,
            free_spins: self.free_spins,
            multiplier: self.multiplier,
            bonus_symbol: self.bonus_symbol,
            total_payout,
            script,
            bonus_buy,
        }
    }

    pub fn restore(&mut self, snapshot: &SpinSnapshot) {
        self.grid.copy_from_slice(&snapshot.grid);
        self.sticky.copy_from_slice(&snapshot.sticky);
        self.locked.copy_from_slice(&snapshot.locked);
        self.round_flags.copy_from_slice(&snapshot.round_flags);
        self.kind = snapshot.kind;
        self.spin_seq = snapshot.spin_seq;
        self.free_spins = snapshot.free_spins;
        self.multiplier = snapshot.multiplier;
        self.bonus_symbol = snapshot.bonus_symbol;
        self.win_marks.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::{GameRng, RngRecorder};

    fn reels_3x3() -> ReelSet {
        let w = Weighting::new()
            .add_weight(1, 10.0)
            .add_weight(2, 10.0)
            .add_weight(3, 10.0);
        ReelSet::uniform(w, 3, 3)
    }

    fn recorder() -> RngRecorder {
        RngRecorder::logging(Box::new(GameRng::seeded(7)))
    }

    #[test]
    fn test_spin_fills_every_cell() {
        let reels = reels_3x3();
        let mut rng = recorder();
        let mut spin = Spin::new(3, 3, 4);
        spin.spin(&reels, &mut rng).unwrap();
        assert!(spin.grid().iter().all(|&s| s != 0));
        assert_eq!(spin.seq(), 1);
    }

    #[test]
    fn test_refill_kind_keeps_sticky_cells() {
        let reels = reels_3x3();
        let mut rng = recorder();
        let mut spin = Spin::new(3, 3, 4);
        spin.spin(&reels, &mut rng).unwrap();

        spin.set_cell(1, 1, 99);
        spin.set_sticky(spin.offset(1, 1), true);
        spin.set_kind(SpinKind::RefillSpin);
        spin.spin(&reels, &mut rng).unwrap();

        assert_eq!(spin.cell(1, 1), 99);
        assert!(spin.grid().iter().all(|&s| s != 0));
    }

    #[test]
    fn test_regular_spin_keeps_sticky_cells_in_place() {
        let reels = reels_3x3();
        let mut rng = recorder();
        let mut spin = Spin::new(3, 3, 4);
        spin.spin(&reels, &mut rng).unwrap();

        spin.set_cell(0, 2, 88);
        spin.set_sticky(spin.offset(0, 2), true);
        spin.set_kind(SpinKind::SecondFree);
        spin.spin(&reels, &mut rng).unwrap();
        assert_eq!(spin.cell(0, 2), 88);
    }

    #[test]
    fn test_locked_reel_is_not_redrawn() {
        let reels = reels_3x3();
        let mut rng = recorder();
        let mut spin = Spin::new(3, 3, 4);
        spin.spin(&reels, &mut rng).unwrap();

        let before: Vec<Index> = (0..3).map(|row| spin.cell(2, row)).collect();
        spin.lock_reel(2);
        spin.spin(&reels, &mut rng).unwrap();
        let after: Vec<Index> = (0..3).map(|row| spin.cell(2, row)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_clear_marked_cells_skips_sticky() {
        let mut spin = Spin::new(3, 3, 4);
        spin.set_cell(0, 0, 5);
        spin.set_cell(0, 1, 5);
        spin.mark_win(spin.offset(0, 0));
        spin.mark_win(spin.offset(0, 1));
        spin.set_sticky(spin.offset(0, 1), true);

        assert_eq!(spin.clear_marked_cells(), 1);
        assert_eq!(spin.cell(0, 0), 0);
        assert_eq!(spin.cell(0, 1), 5);
        assert!(!spin.has_win_marks());
    }

    #[test]
    fn test_reset_round_clears_flags_and_state() {
        let mut spin = Spin::new(3, 3, 4);
        spin.set_flag(2, 7);
        spin.set_multiplier(3.0);
        spin.set_bonus_symbol(4);
        spin.reset_round();
        assert_eq!(spin.flag(2), 0);
        assert_eq!(spin.multiplier(), 1.0);
        assert_eq!(spin.bonus_symbol(), NULL_INDEX);
    }

    #[test]
    fn test_snapshot_restore_round_trips() {
        let reels = reels_3x3();
        let mut rng = recorder();
        let mut spin = Spin::new(3, 3, 4);
        spin.spin(&reels, &mut rng).unwrap();
        spin.set_flag(1, 3);
        spin.set_free_spins(5);
        spin.set_kind(SpinKind::FreeSpin);

        let snap = spin.snapshot(12.5, 2, 1);
        let json = serde_json::to_string(&snap).unwrap();
        let back: SpinSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);

        let mut other = Spin::new(3, 3, 4);
        other.restore(&back);
        assert_eq!(other.grid(), spin.grid());
        assert_eq!(other.flag(1), 3);
        assert_eq!(other.free_spins(), 5);
        assert_eq!(other.kind(), SpinKind::FreeSpin);
    }
}
