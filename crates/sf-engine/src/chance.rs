//! Chance modifiers
//!
//! Pure transforms applied to an action's base chance before the draw.
//! Modifiers compose in registration order; each one reads a single live
//! observable of the spin state.

use crate::spin::Spin;

/// The spin observable a modifier reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChanceInput {
    /// Spin sequence number within the round.
    SpinSeq,
    /// Free spins remaining.
    FreeSpins,
    /// Value of a round flag.
    RoundFlag(usize),
    /// Accumulated payout as a fraction of the payout ceiling.
    PayoutRatio,
}

impl ChanceInput {
    pub fn observe(self, spin: &Spin) -> f64 {
        match self {
            ChanceInput::SpinSeq => spin.seq() as f64,
            ChanceInput::FreeSpins => spin.free_spins() as f64,
            ChanceInput::RoundFlag(ix) => spin.flag(ix) as f64,
            ChanceInput::PayoutRatio => spin.payout_ratio(),
        }
    }
}

/// A single chance transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChanceModifier {
    /// `chance * b^x + c`
    Power { b: f64, c: f64, input: ChanceInput },
    /// `chance * b / (x + c)`
    Divide { b: f64, c: f64, input: ChanceInput },
}

impl ChanceModifier {
    pub fn apply(&self, chance: f64, spin: &Spin) -> f64 {
        match *self {
            ChanceModifier::Power { b, c, input } => chance * b.powf(input.observe(spin)) + c,
            ChanceModifier::Divide { b, c, input } => {
                let d = input.observe(spin) + c;
                if d == 0.0 { chance } else { chance * b / d }
            }
        }
    }
}

/// Applies the modifiers in order and clamps the result to a percentage.
pub fn modified_chance(base: f64, modifiers: &[ChanceModifier], spin: &Spin) -> f64 {
    let mut chance = base;
    for m in modifiers {
        chance = m.apply(chance, spin);
    }
    chance.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin_at_seq(seq: u64) -> Spin {
        let mut spin = Spin::new(3, 3, 2);
        for _ in 0..seq {
            // bump the sequence without drawing symbols
            spin.load_grid(&[0; 9]).unwrap();
        }
        spin
    }

    #[test]
    fn test_power_modifier_decays_with_spin_seq() {
        let m = ChanceModifier::Power {
            b: 0.5,
            c: 0.0,
            input: ChanceInput::SpinSeq,
        };
        let s1 = spin_at_seq(1);
        let s3 = spin_at_seq(3);
        assert_eq!(m.apply(40.0, &s1), 20.0);
        assert_eq!(m.apply(40.0, &s3), 5.0);
    }

    #[test]
    fn test_divide_modifier_reads_round_flag() {
        let m = ChanceModifier::Divide {
            b: 6.0,
            c: 1.0,
            input: ChanceInput::RoundFlag(0),
        };
        let mut spin = Spin::new(3, 3, 2);
        spin.set_flag(0, 2);
        assert_eq!(m.apply(10.0, &spin), 20.0);
    }

    #[test]
    fn test_modifiers_compose_in_order() {
        let mods = [
            ChanceModifier::Power {
                b: 2.0,
                c: 0.0,
                input: ChanceInput::SpinSeq,
            },
            ChanceModifier::Divide {
                b: 1.0,
                c: 1.0,
                input: ChanceInput::FreeSpins,
            },
        ];
        let spin = spin_at_seq(1);
        // 10 * 2^1 = 20, then 20 * 1 / (0 + 1) = 20
        assert_eq!(modified_chance(10.0, &mods, &spin), 20.0);
    }

    #[test]
    fn test_result_is_clamped_to_percentage() {
        let m = [ChanceModifier::Power {
            b: 10.0,
            c: 0.0,
            input: ChanceInput::SpinSeq,
        }];
        let spin = spin_at_seq(3);
        assert_eq!(modified_chance(50.0, &m, &spin), 100.0);
    }
}
