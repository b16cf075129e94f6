//! Paylines and win evaluation

use serde::{Deserialize, Serialize};
use sf_core::Index;

use crate::symbols::SymbolSet;

/// A payline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payline {
    /// Payline index (0-based).
    pub index: u8,
    /// Row position for each reel (e.g. `[1, 0, 0, 0, 1]` for a "V").
    pub positions: Vec<u8>,
}

impl Payline {
    /// Straight line: the same row across all reels.
    pub fn straight(index: u8, row: u8, reel_count: u8) -> Self {
        Self {
            index,
            positions: vec![row; reel_count as usize],
        }
    }

    /// V-shaped line dipping to the bottom row.
    pub fn v_shape(index: u8, rows: u8, reel_count: u8) -> Self {
        let mid = (reel_count - 1) / 2;
        let positions = (0..reel_count)
            .map(|i| i.min(reel_count - 1 - i).min(mid).min(rows - 1))
            .collect();
        Self { index, positions }
    }

    /// Inverted V rising from the bottom row.
    pub fn inverted_v(index: u8, rows: u8, reel_count: u8) -> Self {
        let v = Self::v_shape(index, rows, reel_count);
        let positions = v.positions.iter().map(|&p| rows - 1 - p).collect();
        Self { index, positions }
    }
}

/// Default payline set for a grid: one straight per row, a V, an inverted
/// V, and two zigzags.
pub fn default_paylines(reel_count: usize, rows: usize) -> Vec<Payline> {
    let rc = reel_count as u8;
    let rw = rows as u8;
    let mut lines = Vec::with_capacity(rows + 4);
    for row in 0..rw {
        lines.push(Payline::straight(lines.len() as u8, row, rc));
    }
    lines.push(Payline::v_shape(lines.len() as u8, rw, rc));
    lines.push(Payline::inverted_v(lines.len() as u8, rw, rc));
    let zig = (0..rc).map(|i| if i % 2 == 0 { 0 } else { 1 }).collect();
    lines.push(Payline {
        index: lines.len() as u8,
        positions: zig,
    });
    let zag = (0..rc)
        .map(|i| if i % 2 == 0 { rw - 1 } else { rw - 2 })
        .collect();
    lines.push(Payline {
        index: lines.len() as u8,
        positions: zag,
    });
    lines
}

/// A win on a single payline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineWin {
    pub line: u8,
    pub symbol: Index,
    pub count: u8,
    /// Pay value in bet multiples, before the round multiplier.
    pub amount: f64,
    /// Flat cell offsets of the winning positions.
    pub positions: Vec<usize>,
}

/// Payline evaluation over a flat reel-major grid.
#[derive(Debug, Clone)]
pub struct PayTable {
    paylines: Vec<Payline>,
    min_match: u8,
}

impl PayTable {
    pub fn new(paylines: Vec<Payline>) -> Self {
        Self {
            paylines,
            min_match: 3,
        }
    }

    pub fn with_min_match(mut self, min_match: u8) -> Self {
        self.min_match = min_match;
        self
    }

    pub fn paylines(&self) -> &[Payline] {
        &self.paylines
    }

    pub fn min_match(&self) -> u8 {
        self.min_match
    }

    /// Evaluates all paylines, appending wins to `wins`.
    pub fn evaluate(
        &self,
        grid: &[Index],
        rows: usize,
        symbols: &SymbolSet,
        wins: &mut Vec<LineWin>,
    ) {
        for payline in &self.paylines {
            if let Some(win) = self.evaluate_line(grid, rows, symbols, payline) {
                wins.push(win);
            }
        }
    }

    fn evaluate_line(
        &self,
        grid: &[Index],
        rows: usize,
        symbols: &SymbolSet,
        payline: &Payline,
    ) -> Option<LineWin> {
        let wild = symbols.wild_id().unwrap_or(0);
        let cell = |reel: usize| grid[reel * rows + payline.positions[reel] as usize];

        // first non-wild symbol determines the line
        let reel_count = payline.positions.len();
        let first = (0..reel_count)
            .map(cell)
            .find(|&s| s != wild && s != 0)
            .unwrap_or(wild);
        if first == 0 || first == wild {
            return None;
        }

        let mut count = 0u8;
        let mut positions = Vec::new();
        for reel in 0..reel_count {
            let s = cell(reel);
            if s == first || (wild != 0 && s == wild) {
                count += 1;
                positions.push(reel * rows + payline.positions[reel] as usize);
            } else {
                break;
            }
        }

        if count < self.min_match {
            return None;
        }
        let amount = symbols.pay(first, count);
        if amount <= 0.0 {
            return None;
        }

        Some(LineWin {
            line: payline.index,
            symbol: first,
            count,
            amount,
            positions,
        })
    }

    /// Revises a grid so it carries no paylines, deterministically.
    ///
    /// Used before forcing a paid bonus so a bought round cannot carry an
    /// accidental base-game win.
    pub fn mismatch(&self, grid: &mut [Index], rows: usize, symbols: &SymbolSet) {
        let regulars = symbols.regular_ids();
        if regulars.len() < 2 {
            return;
        }
        let wild = symbols.wild_id().unwrap_or(0);

        let mut wins = Vec::new();
        // bounded: each pass breaks one line, crossing lines can need a few
        for _ in 0..grid.len() * 4 {
            wins.clear();
            self.evaluate(grid, rows, symbols, &mut wins);
            let Some(win) = wins.first() else {
                return;
            };
            // break the line at its last winning position
            let at = *win.positions.last().unwrap_or(&0);
            let current = grid[at];
            let replacement = regulars
                .iter()
                .copied()
                .find(|&r| r != win.symbol && r != current && r != wild)
                .unwrap_or(regulars[0]);
            grid[at] = replacement;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbol;

    fn symbols() -> SymbolSet {
        SymbolSet::new(vec![
            Symbol::regular(1, "Cherry", &[0.0, 0.0, 0.5, 1.0, 2.0]),
            Symbol::regular(2, "Seven", &[0.0, 0.0, 2.0, 5.0, 20.0]),
            Symbol::regular(3, "Bell", &[0.0, 0.0, 1.0, 2.0, 5.0]),
            Symbol::wild(11, "Wild", &[]),
            Symbol::scatter(12, "Scatter", &[]),
        ])
        .unwrap()
    }

    // 5x3 grid from per-reel columns
    fn grid(cols: [[Index; 3]; 5]) -> Vec<Index> {
        cols.iter().flatten().copied().collect()
    }

    #[test]
    fn test_straight_line_win() {
        let pt = PayTable::new(vec![Payline::straight(0, 1, 5)]);
        let g = grid([
            [1, 2, 1],
            [1, 2, 1],
            [3, 2, 1],
            [3, 1, 1],
            [3, 3, 1],
        ]);
        let mut wins = Vec::new();
        pt.evaluate(&g, 3, &symbols(), &mut wins);
        assert_eq!(wins.len(), 1);
        let w = &wins[0];
        assert_eq!((w.symbol, w.count), (2, 3));
        assert_eq!(w.amount, 2.0);
        assert_eq!(w.positions, vec![1, 4, 7]);
    }

    #[test]
    fn test_wilds_substitute_and_extend() {
        let pt = PayTable::new(vec![Payline::straight(0, 0, 5)]);
        let g = grid([
            [11, 2, 2],
            [1, 2, 2],
            [11, 2, 2],
            [1, 2, 2],
            [2, 2, 2],
        ]);
        let mut wins = Vec::new();
        pt.evaluate(&g, 3, &symbols(), &mut wins);
        // wild, cherry, wild, cherry → 4 cherries; reel 4 breaks the run
        assert_eq!(wins.len(), 1);
        assert_eq!((wins[0].symbol, wins[0].count), (1, 4));
    }

    #[test]
    fn test_short_runs_do_not_pay() {
        let pt = PayTable::new(vec![Payline::straight(0, 0, 5)]);
        let g = grid([
            [2, 1, 1],
            [2, 1, 1],
            [3, 1, 1],
            [2, 1, 1],
            [2, 1, 1],
        ]);
        let mut wins = Vec::new();
        pt.evaluate(&g, 3, &symbols(), &mut wins);
        assert!(wins.is_empty());
    }

    #[test]
    fn test_default_paylines_span_all_reels() {
        let lines = default_paylines(6, 4);
        assert_eq!(lines.len(), 8);
        for line in &lines {
            assert_eq!(line.positions.len(), 6);
            assert!(line.positions.iter().all(|&p| p < 4));
        }
    }

    #[test]
    fn test_mismatch_strips_all_wins() {
        let pt = PayTable::new(default_paylines(5, 3));
        let syms = symbols();
        let mut g = grid([
            [2, 2, 2],
            [2, 2, 2],
            [2, 2, 2],
            [2, 2, 2],
            [2, 2, 2],
        ]);
        pt.mismatch(&mut g, 3, &syms);
        let mut wins = Vec::new();
        pt.evaluate(&g, 3, &syms, &mut wins);
        assert!(wins.is_empty());
    }
}
