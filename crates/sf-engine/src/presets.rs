//! Ready-made game configurations
//!
//! Small, complete configs exercising each engine feature in isolation.
//! They double as living documentation of the builder API and as fixtures
//! for the test suites; none of them is balanced for production play.

use sf_core::{DedupMode, NULL_INDEX, Weighting};

use crate::actions::{Action, ActionEffect, ActionRef, TriggerFilter};
use crate::config::{GameConfig, RoundFlag};
use crate::error::ConfigError;
use crate::results::PenaltyKind;
use crate::scripted::{Script, ScriptSelector};
use crate::spin::{ReelSet, SpinKind};
use crate::symbols::{Symbol, SymbolSet};

// Symbol ids shared by all presets.
const CHERRY: u16 = 1;
const LEMON: u16 = 2;
const BELL: u16 = 3;
const SEVEN: u16 = 4;
const WILD: u16 = 11;
const SCATTER: u16 = 12;
const COIN: u16 = 13;

fn classic_symbols() -> Result<SymbolSet, ConfigError> {
    SymbolSet::new(vec![
        Symbol::regular(CHERRY, "Cherry", &[0.0, 0.0, 0.5, 1.0, 2.5]),
        Symbol::regular(LEMON, "Lemon", &[0.0, 0.0, 0.5, 1.5, 4.0]),
        Symbol::regular(BELL, "Bell", &[0.0, 0.0, 1.0, 3.0, 10.0]),
        Symbol::regular(SEVEN, "Seven", &[0.0, 0.0, 2.5, 10.0, 50.0]),
        Symbol::wild(WILD, "Wild", &[]),
        Symbol::scatter(SCATTER, "Scatter", &[]),
    ])
}

fn classic_reels() -> ReelSet {
    let w = Weighting::new()
        .with_dedup(DedupMode::Window3)
        .add_weight(CHERRY, 28.0)
        .add_weight(LEMON, 26.0)
        .add_weight(BELL, 18.0)
        .add_weight(SEVEN, 11.0)
        .add_weight(WILD, 6.0)
        .add_weight(SCATTER, 5.0);
    ReelSet::uniform(w, 5, 3)
}

/// 3/4/5/6-scatter free-spin awards as one alternate chain.
fn scatter_free_spins(id: u32) -> Action {
    let variant = |count: u8, free_spins: u64| {
        Action::new(
            id + count as u32,
            "scatter free spins",
            ActionEffect::ScatterFreeSpins {
                symbol: SCATTER,
                count,
                free_spins,
                player_choice: false,
            },
        )
    };
    variant(6, 25)
        .with_alternate(variant(5, 15))
        .with_alternate(variant(4, 10))
        .with_alternate(variant(3, 8))
}

fn line_payouts() -> ActionRef {
    Action::new(1, "line payouts", ActionEffect::LinePayouts).into_ref()
}

/// The flagship demo: scatter free spins, expanding wilds, a scatter
/// counter flag and a long-shot instant prize.
pub fn demo_config() -> Result<GameConfig, ConfigError> {
    demo_config_named("classic fruits")
}

pub fn demo_config_named(name: &str) -> Result<GameConfig, ConfigError> {
    let pay = line_payouts();
    let expand = Action::new(
        3,
        "expanding wilds",
        ActionEffect::ExpandWilds {
            symbol: WILD,
            min_count: 2,
        },
    )
    .into_ref();
    let count_scatters = Action::new(
        7,
        "count scatters",
        ActionEffect::CountToFlag {
            symbol: SCATTER,
            flag: 0,
        },
    )
    .into_ref();

    GameConfig::builder(name)
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "scatters seen").with_export()])
        .max_payout(5_000.0)
        .first_actions(vec![
            Action::new(
                2,
                "mystery prize",
                ActionEffect::InstantPrize {
                    chance: 1.0,
                    amount: 5.0,
                    player_choice: false,
                },
            )
            .into_ref(),
            count_scatters.clone(),
            expand.clone(),
            pay.clone(),
            scatter_free_spins(20).into_ref(),
        ])
        .free_actions(vec![
            count_scatters,
            expand,
            pay,
            // retrigger pays less than the entry award
            Action::new(
                6,
                "retrigger",
                ActionEffect::ScatterFreeSpins {
                    symbol: SCATTER,
                    count: 3,
                    free_spins: 5,
                    player_choice: false,
                },
            )
            .into_ref(),
        ])
        .build()
}

/// Two distinct actions sharing an id; must not build.
pub fn demo_config_with_duplicate_id() -> Result<GameConfig, ConfigError> {
    GameConfig::builder("broken: duplicate id")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .first_actions(vec![
            line_payouts(),
            Action::new(
                1,
                "colliding payout",
                ActionEffect::ScatterPayout {
                    symbol: SCATTER,
                    min_count: 3,
                },
            )
            .into_ref(),
        ])
        .build()
}

/// References a flag that was never declared; must not build.
pub fn demo_config_with_bad_flag() -> Result<GameConfig, ConfigError> {
    GameConfig::builder("broken: bad flag")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "only flag")])
        .first_actions(vec![
            Action::new(
                4,
                "count into the void",
                ActionEffect::CountToFlag {
                    symbol: SCATTER,
                    flag: 5,
                },
            )
            .into_ref(),
        ])
        .build()
}

fn coin_symbols() -> Result<SymbolSet, ConfigError> {
    SymbolSet::new(vec![
        Symbol::regular(CHERRY, "Cherry", &[0.0, 0.0, 0.5, 1.0, 2.5]),
        Symbol::regular(LEMON, "Lemon", &[0.0, 0.0, 0.5, 1.5, 4.0]),
        Symbol::regular(BELL, "Bell", &[0.0, 0.0, 1.0, 3.0, 10.0]),
        // pays anywhere once enough are held, never on paylines
        Symbol::regular(COIN, "Coin", &[0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 5.0, 10.0, 25.0]),
    ])
}

fn coin_reels(coin_weight: f64) -> ReelSet {
    let w = Weighting::new()
        .add_weight(CHERRY, 35.0)
        .add_weight(LEMON, 30.0)
        .add_weight(BELL, 20.0)
        .add_weight(COIN, coin_weight);
    ReelSet::uniform(w, 5, 3)
}

fn hold_and_win_variant(
    name: &str,
    double_spin: bool,
    min_count: u8,
    super_shape: bool,
) -> Result<GameConfig, ConfigError> {
    let hold = Action::new(
        2,
        "hold & respin",
        ActionEffect::HoldAndRespin {
            symbol: COIN,
            min_count,
            super_shape,
        },
    )
    .into_ref();
    let collect = Action::new(
        3,
        "coin payout",
        ActionEffect::ScatterPayout {
            symbol: COIN,
            min_count: 6,
        },
    )
    .with_filter(TriggerFilter::Kinds(vec![
        SpinKind::RefillSpin,
        SpinKind::SuperSpin,
    ]))
    .into_ref();

    let mut builder = GameConfig::builder(name)
        .grid(5, 3)
        .symbols(coin_symbols()?)
        .reels(coin_reels(15.0))
        .max_payout(2_000.0);
    if double_spin {
        builder = builder.double_spin();
    }
    builder
        .first_actions(vec![line_payouts(), hold.clone(), collect.clone()])
        .free_actions(vec![hold, collect])
        .build()
}

fn hold_and_win(super_shape: bool) -> Result<GameConfig, ConfigError> {
    let name = if super_shape { "super coins" } else { "hold & win coins" };
    hold_and_win_variant(name, false, 3, super_shape)
}

/// Hold & win crossed with the double-spin and super axes. A hold
/// threshold above the cell count keeps respins from ever arming, so the
/// refill axis switches off independently of the other two.
pub fn hold_axes_config(
    double_spin: bool,
    refill: bool,
    super_shape: bool,
) -> Result<GameConfig, ConfigError> {
    let name = format!(
        "coins double={double_spin} refill={refill} super={super_shape}"
    );
    let min_count = if refill { 3 } else { 16 };
    hold_and_win_variant(&name, double_spin, min_count, super_shape)
}

/// Coins lock in place and re-arm refill spins while new ones land.
pub fn hold_and_win_config() -> Result<GameConfig, ConfigError> {
    hold_and_win(false)
}

/// Same mechanic, finishing in a super refill.
pub fn super_spin_config() -> Result<GameConfig, ConfigError> {
    hold_and_win(true)
}

/// Double spin: wilds go sticky in the setup half, the scoring half pays.
pub fn double_spin_config() -> Result<GameConfig, ConfigError> {
    let sticky = Action::new(
        2,
        "sticky wilds",
        ActionEffect::StickySymbol {
            symbol: WILD,
            min_count: 1,
        },
    )
    .into_ref();
    let pay = line_payouts();

    GameConfig::builder("double spin wilds")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .double_spin()
        .max_payout(5_000.0)
        .first_actions(vec![sticky.clone(), pay.clone(), scatter_free_spins(20).into_ref()])
        .free_actions(vec![sticky, pay])
        .build()
}

/// Cascading wins: winning positions clear and refill.
pub fn cascade_config() -> Result<GameConfig, ConfigError> {
    let clear = Action::new(5, "cascade", ActionEffect::ClearPayouts).into_ref();
    let pay = line_payouts();

    GameConfig::builder("cascades")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone(), clear.clone()])
        .free_actions(vec![pay, clear])
        .build()
}

/// Reverse win: the round starts from a granted pot and snakes eat it.
pub fn reverse_win_config() -> Result<GameConfig, ConfigError> {
    let pot = Action::new(
        2,
        "starting pot",
        ActionEffect::InstantPrize {
            chance: 100.0,
            amount: 20.0,
            player_choice: false,
        },
    )
    .into_ref();
    let snake = Action::new(
        3,
        "seven bite",
        ActionEffect::Penalty {
            symbol: SEVEN,
            min_count: 2,
            kind: PenaltyKind::Subtract,
            value: 4.0,
        },
    )
    .into_ref();
    GameConfig::builder("reverse win")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .reverse_win()
        .max_payout(1_000.0)
        .first_actions(vec![
            pot,
            snake.clone(),
            Action::new(
                6,
                "survive",
                ActionEffect::ScatterFreeSpins {
                    symbol: SCATTER,
                    count: 0,
                    free_spins: 3,
                    player_choice: false,
                },
            )
            .with_filter(TriggerFilter::SpinSeqBetween { min: 1, max: 1 })
            .into_ref(),
        ])
        .free_actions(vec![snake])
        .build()
}

/// Scripted rounds: script 1 forces a generous instant prize.
pub fn scripted_config() -> Result<GameConfig, ConfigError> {
    let scripted_prize = Action::new(
        9,
        "scripted prize",
        ActionEffect::InstantPrize {
            chance: 100.0,
            amount: 50.0,
            player_choice: false,
        },
    )
    .into_ref();
    let pay = line_payouts();
    let selector = ScriptSelector::new(
        100.0,
        vec![Script::new(
            1,
            1.0,
            vec![scripted_prize, pay.clone()],
            vec![pay.clone()],
        )],
    )?
    .with_spin_flag(0);

    GameConfig::builder("scripted")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "script id").with_export()])
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone()])
        .free_actions(vec![pay])
        .scripts(selector)
        .build()
}

/// Bonus buy 1 forces straight into the free spins.
pub fn bonus_buy_config() -> Result<GameConfig, ConfigError> {
    let pay = line_payouts();
    let entry = scatter_free_spins(20).into_ref();

    GameConfig::builder("bonus buy")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "bought").with_export()])
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone(), entry.clone()])
        .free_actions(vec![pay.clone()])
        .paid_first_actions(vec![
            Action::new(
                8,
                "buy free spins",
                ActionEffect::PaidBonus {
                    bonus_buy: 1,
                    free_spins: 8,
                    flag: Some((0, 1)),
                },
            )
            .into_ref(),
            pay.clone(),
            entry,
        ])
        .paid_free_actions(vec![pay])
        .build()
}

/// Bonus symbol collection across the free spins.
pub fn collector_config() -> Result<GameConfig, ConfigError> {
    let pay = line_payouts();
    let choose = Action::new(
        5,
        "choose bonus symbol",
        ActionEffect::BonusSymbol {
            options: Weighting::new()
                .add_weight(CHERRY, 40.0)
                .add_weight(BELL, 35.0)
                .add_weight(SEVEN, 25.0),
        },
    )
    .into_ref();
    let collect = Action::new(
        6,
        "collect bonus symbol",
        ActionEffect::CollectToFlag {
            symbol: NULL_INDEX,
            flag: 0,
            target: 12,
            free_spins: 4,
        },
    )
    .into_ref();

    GameConfig::builder("collector")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "collected").with_export()])
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone(), scatter_free_spins(20).into_ref(), choose.clone()])
        .free_actions(vec![pay, collect, choose])
        .build()
}

/// Every free spin awards another one; only the step cap stops it.
pub fn runaway_config() -> Result<GameConfig, ConfigError> {
    GameConfig::builder("runaway")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .max_steps(25)
        .first_actions(vec![
            Action::new(
                2,
                "ignition",
                ActionEffect::ScatterFreeSpins {
                    symbol: CHERRY,
                    count: 0,
                    free_spins: 1,
                    player_choice: false,
                },
            )
            .into_ref(),
        ])
        .free_actions(vec![
            Action::new(
                3,
                "perpetual retrigger",
                ActionEffect::ScatterFreeSpins {
                    symbol: CHERRY,
                    count: 0,
                    free_spins: 1,
                    player_choice: false,
                },
            )
            .into_ref(),
        ])
        .build()
}

/// Entry free spins gated on a player decision (volatility pick).
pub fn choice_config() -> Result<GameConfig, ConfigError> {
    let pay = line_payouts();
    let ask = Action::new(
        2,
        "pick volatility",
        ActionEffect::ScatterFreeSpins {
            symbol: SCATTER,
            count: 3,
            free_spins: 10,
            player_choice: true,
        },
    )
    .into_ref();
    let resolve = Action::new(
        3,
        "volatility choice",
        ActionEffect::PlayerChoice {
            key: "volatility".to_string(),
            options: vec!["steady".to_string(), "wild".to_string()],
            flag: 0,
        },
    )
    .into_ref();
    let boost = Action::new(
        4,
        "wild boost",
        ActionEffect::WildMultiplier {
            symbol: WILD,
            scales: vec![2.0, 3.0, 5.0],
        },
    )
    .with_filter(TriggerFilter::FlagEquals { flag: 0, value: 2 })
    .into_ref();

    GameConfig::builder("volatility choice")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .flags(vec![RoundFlag::new(0, "volatility").with_export()])
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone(), ask, resolve.clone()])
        .free_actions(vec![pay, boost, resolve])
        .build()
}

/// A guaranteed bonus wheel on the first spin.
pub fn wheel_config() -> Result<GameConfig, ConfigError> {
    let wheel = Action::new(
        2,
        "bonus wheel",
        ActionEffect::BonusWheel {
            chance: 100.0,
            prizes: Weighting::new()
                .add_weight(0, 50.0)
                .add_weight(1, 30.0)
                .add_weight(2, 20.0),
            amounts: vec![5.0, 20.0, 100.0],
        },
    )
    .into_ref();
    let pay = line_payouts();

    GameConfig::builder("wheel")
        .grid(5, 3)
        .symbols(classic_symbols()?)
        .reels(classic_reels())
        .max_payout(5_000.0)
        .first_actions(vec![pay.clone(), wheel])
        .free_actions(vec![pay])
        .build()
}
