//! Settlement math, kept pure: the transaction in
//! `handlers::settle_round` loads and locks rows, this module decides
//! every amount, and the handler applies the plan verbatim. All
//! arithmetic is integer; weights are basis points applied with floor
//! division, and every floor loss is accounted into carry.

use std::collections::BTreeMap;

use crate::constants::{
    ADMIN_TAKE_BPS, BPS_DENOM, CARRY_BPS, CATEGORY_WEIGHTS_BPS, WIN_POOL_BPS,
};
use crate::db::BetRow;
use crate::draw::Outcome;

#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    #[error("math overflow in settlement")]
    MathOverflow,
}

/// Per-bet result: payout stays zero and category `None` for losers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledBet {
    pub bet_id: i64,
    pub player_id: i64,
    pub payout: i64,
    pub category: Option<&'static str>,
}

/// Aggregated winnings: one balance credit and one WIN ledger row per
/// player per settlement, whatever the number of winning bets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCredit {
    pub player_id: i64,
    pub amount: i64,
    pub bets: u32,
    pub categories: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub pot: i64,
    pub admin_take: i64,
    pub win_pool: i64,
    pub carry_in: i64,
    pub carry_out: i64,
    pub total_paid: i64,
    pub bets: Vec<SettledBet>,
    /// Ascending player id, so balance updates take row locks in a
    /// stable order.
    pub credits: Vec<PlayerCredit>,
}

/// Prize category for a bet against the drawn outcome, or `None` for a
/// losing bet. Five or more matched mains classify as four.
pub fn classify(nums: &[i32], chance: i32, outcome: &Outcome) -> Option<&'static str> {
    let k = nums
        .iter()
        .filter(|&&n| outcome.main_contains(n))
        .count()
        .min(4);
    let c = chance == i32::from(outcome.chance);
    match (k, c) {
        (4, true) => Some("4+1"),
        (4, false) => Some("4+0"),
        (3, true) => Some("3+1"),
        (3, false) => Some("3+0"),
        (2, true) => Some("2+1"),
        (2, false) => Some("2+0"),
        (1, true) => Some("1+1"),
        _ => None,
    }
}

fn bps_share(pool: i64, bps: i64) -> Result<i64, SettleError> {
    pool.checked_mul(bps)
        .map(|v| v / BPS_DENOM)
        .ok_or(SettleError::MathOverflow)
}

/// Builds the full settlement for one round.
///
/// Split: adminTake/carry/winPool at 2500/1000/6500 bps of the pot,
/// floor losses to carry. Allocation base is `winPool + carryIn`; each
/// category takes its bps share, prorated by stake among its winners.
/// Empty-category pools, proration remainders, and the base's own floor
/// residue all flow to carry, so exactly
/// `adminTake + carryOut + Σ payouts == pot + carryIn`.
pub fn build_plan(
    stakes: &[BetRow],
    outcome: &Outcome,
    carry_in: i64,
) -> Result<SettlementPlan, SettleError> {
    let mut pot: i64 = 0;
    for s in stakes {
        pot = pot.checked_add(s.amount).ok_or(SettleError::MathOverflow)?;
    }

    let admin_take = bps_share(pot, ADMIN_TAKE_BPS)?;
    let carry_base = bps_share(pot, CARRY_BPS)?;
    let win_pool = bps_share(pot, WIN_POOL_BPS)?;
    let split_loss = pot - admin_take - carry_base - win_pool;
    let mut carry = carry_base + split_loss;

    let base = win_pool
        .checked_add(carry_in)
        .ok_or(SettleError::MathOverflow)?;

    let mut bets: Vec<SettledBet> = stakes
        .iter()
        .map(|s| SettledBet {
            bet_id: s.id,
            player_id: s.player_id,
            payout: 0,
            category: classify(&s.nums, s.chance, outcome),
        })
        .collect();

    let mut allocated: i64 = 0;
    let mut total_paid: i64 = 0;

    for (cat, weight) in CATEGORY_WEIGHTS_BPS {
        let cat_pool = bps_share(base, weight)?;
        allocated = allocated
            .checked_add(cat_pool)
            .ok_or(SettleError::MathOverflow)?;

        let winners: Vec<usize> = bets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.category == Some(cat))
            .map(|(i, _)| i)
            .collect();
        if winners.is_empty() {
            carry += cat_pool;
            continue;
        }

        let mut stake_total: i64 = 0;
        for &i in &winners {
            stake_total = stake_total
                .checked_add(stakes[i].amount)
                .ok_or(SettleError::MathOverflow)?;
        }
        if stake_total <= 0 {
            carry += cat_pool;
            continue;
        }

        let mut paid_in_cat: i64 = 0;
        for &i in &winners {
            // i128 keeps catPool * amount exact before the floor.
            let payout =
                ((i128::from(cat_pool) * i128::from(stakes[i].amount)) / i128::from(stake_total)) as i64;
            bets[i].payout = payout;
            paid_in_cat += payout;
        }
        carry += cat_pool - paid_in_cat;
        total_paid += paid_in_cat;
    }

    // Floor residue of the weighted allocation itself.
    carry += base - allocated;
    let carry_out = carry;

    debug_assert_eq!(admin_take + carry_out + total_paid, pot + carry_in);

    let mut by_player: BTreeMap<i64, PlayerCredit> = BTreeMap::new();
    for b in &bets {
        if b.payout > 0 {
            let entry = by_player.entry(b.player_id).or_insert(PlayerCredit {
                player_id: b.player_id,
                amount: 0,
                bets: 0,
                categories: Vec::new(),
            });
            entry.amount += b.payout;
            entry.bets += 1;
            if let Some(cat) = b.category {
                if !entry.categories.contains(&cat) {
                    entry.categories.push(cat);
                }
            }
        }
    }

    Ok(SettlementPlan {
        pot,
        admin_take,
        win_pool,
        carry_in,
        carry_out,
        total_paid,
        bets,
        credits: by_player.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> Outcome {
        Outcome {
            main: [3, 7, 11, 19],
            chance: 2,
        }
    }

    fn bet(id: i64, player_id: i64, nums: &[i32], chance: i32, amount: i64) -> BetRow {
        BetRow {
            id,
            player_id,
            round_id: 0,
            nums: nums.to_vec(),
            chance,
            amount,
        }
    }

    fn conservation_holds(plan: &SettlementPlan) {
        assert_eq!(
            plan.admin_take + plan.carry_out + plan.total_paid,
            plan.pot + plan.carry_in
        );
    }

    #[test]
    fn classification_table() {
        let o = outcome();
        assert_eq!(classify(&[3, 7, 11, 19], 2, &o), Some("4+1"));
        assert_eq!(classify(&[3, 7, 11, 19], 5, &o), Some("4+0"));
        assert_eq!(classify(&[3, 7, 11, 20], 2, &o), Some("3+1"));
        assert_eq!(classify(&[3, 7, 11, 20], 5, &o), Some("3+0"));
        assert_eq!(classify(&[3, 7, 12, 20], 2, &o), Some("2+1"));
        assert_eq!(classify(&[3, 7, 12, 20], 5, &o), Some("2+0"));
        assert_eq!(classify(&[3, 8, 12, 20], 2, &o), Some("1+1"));
        assert_eq!(classify(&[3, 8, 12, 20], 5, &o), None);
        assert_eq!(classify(&[4, 8, 12, 20], 2, &o), None);
        assert_eq!(classify(&[4, 8, 12, 20], 5, &o), None);
    }

    #[test]
    fn five_or_more_matches_classify_as_four() {
        let o = outcome();
        // 8-number selection covering all four mains.
        assert_eq!(classify(&[3, 7, 11, 19, 1, 2, 4, 5], 2, &o), Some("4+1"));
        assert_eq!(classify(&[3, 7, 11, 19, 1, 2, 4, 5], 4, &o), Some("4+0"));
    }

    // The worked example: pot 40 splits 10/4/26, the 4+1 winner takes
    // floor(26*0.35)=9, the 3+0 winner floor(26*0.10)=2, everything else
    // carries.
    #[test]
    fn worked_example_split() {
        let stakes = vec![
            bet(1, 100, &[3, 7, 11, 19], 2, 10), // 4+1
            bet(2, 200, &[3, 7, 11, 20], 5, 20), // 3+0
            bet(3, 300, &[4, 8, 12, 20], 5, 10), // loser
        ];
        let plan = build_plan(&stakes, &outcome(), 0).unwrap();

        assert_eq!(plan.pot, 40);
        assert_eq!(plan.admin_take, 10);
        assert_eq!(plan.win_pool, 26);

        assert_eq!(plan.bets[0].payout, 9);
        assert_eq!(plan.bets[0].category, Some("4+1"));
        assert_eq!(plan.bets[1].payout, 2);
        assert_eq!(plan.bets[1].category, Some("3+0"));
        assert_eq!(plan.bets[2].payout, 0);
        assert_eq!(plan.bets[2].category, None);

        assert_eq!(plan.total_paid, 11);
        // 40 + 0 carry-in - 10 admin - 11 paid
        assert_eq!(plan.carry_out, 19);
        conservation_holds(&plan);
    }

    #[test]
    fn proration_is_by_stake_with_remainder_to_carry() {
        // Two 4+1 winners at stakes 10 and 30; base 650 gives the
        // category floor(650*0.35)=227, split 56/170 with 1 to carry.
        let stakes = vec![
            bet(1, 100, &[3, 7, 11, 19], 2, 10),
            bet(2, 200, &[3, 7, 11, 19], 2, 30),
            bet(3, 300, &[4, 8, 12, 20], 5, 960),
        ];
        let plan = build_plan(&stakes, &outcome(), 0).unwrap();

        assert_eq!(plan.pot, 1_000);
        assert_eq!(plan.win_pool, 650);
        assert_eq!(plan.bets[0].payout, 56); // floor(227*10/40)
        assert_eq!(plan.bets[1].payout, 170); // floor(227*30/40)
        conservation_holds(&plan);
    }

    #[test]
    fn carry_in_joins_the_allocation_base() {
        let stakes = vec![bet(1, 100, &[3, 7, 11, 19], 2, 10)];
        let with_carry = build_plan(&stakes, &outcome(), 1_000).unwrap();
        let without = build_plan(&stakes, &outcome(), 0).unwrap();
        // base grows from 6 to 1006; the 4+1 pool from 2 to 352.
        assert!(with_carry.bets[0].payout > without.bets[0].payout);
        assert_eq!(with_carry.bets[0].payout, (1_006 * 3_500) / 10_000);
        conservation_holds(&with_carry);
        conservation_holds(&without);
    }

    #[test]
    fn no_winners_carries_everything_but_the_admin_take() {
        let stakes = vec![
            bet(1, 100, &[4, 8, 12, 20], 5, 100),
            bet(2, 200, &[5, 9, 13, 18], 4, 60),
        ];
        let plan = build_plan(&stakes, &outcome(), 25).unwrap();
        assert_eq!(plan.total_paid, 0);
        assert!(plan.credits.is_empty());
        assert_eq!(plan.carry_out, plan.pot - plan.admin_take + 25);
        conservation_holds(&plan);
    }

    #[test]
    fn empty_round_preserves_carry() {
        let plan = build_plan(&[], &outcome(), 123).unwrap();
        assert_eq!(plan.pot, 0);
        assert_eq!(plan.admin_take, 0);
        assert_eq!(plan.total_paid, 0);
        assert_eq!(plan.carry_out, 123);
        conservation_holds(&plan);
    }

    #[test]
    fn credits_aggregate_per_player_in_ascending_order() {
        let stakes = vec![
            bet(1, 200, &[3, 7, 11, 19], 2, 50),  // 4+1
            bet(2, 200, &[3, 7, 11, 20], 2, 50),  // 3+1
            bet(3, 100, &[3, 7, 11, 20], 2, 50),  // 3+1
            bet(4, 300, &[4, 8, 12, 20], 5, 850), // loser
        ];
        let plan = build_plan(&stakes, &outcome(), 0).unwrap();

        let ids: Vec<i64> = plan.credits.iter().map(|c| c.player_id).collect();
        assert_eq!(ids, vec![100, 200]);

        let p200 = &plan.credits[1];
        assert_eq!(p200.bets, 2);
        assert_eq!(p200.categories, vec!["4+1", "3+1"]);
        assert_eq!(
            p200.amount,
            plan.bets[0].payout + plan.bets[1].payout
        );
        conservation_holds(&plan);
    }

    #[test]
    fn conservation_holds_across_many_shapes() {
        let o = outcome();
        for carry_in in [0_i64, 1, 17, 9_999] {
            for n in 0..30_usize {
                let stakes: Vec<BetRow> = (0..n)
                    .map(|i| {
                        let nums: Vec<i32> = match i % 5 {
                            0 => vec![3, 7, 11, 19],
                            1 => vec![3, 7, 11, 20],
                            2 => vec![3, 7, 12, 20],
                            3 => vec![3, 8, 12, 20],
                            _ => vec![4, 8, 12, 20],
                        };
                        bet(i as i64 + 1, (i as i64 % 7) + 1, &nums, (i as i32 % 5) + 1, (i as i64 + 1) * 13)
                    })
                    .collect();
                let plan = build_plan(&stakes, &o, carry_in).unwrap();
                conservation_holds(&plan);
                assert!(plan.carry_out >= 0);
                assert!(plan.bets.iter().all(|b| b.payout >= 0));
            }
        }
    }
}
