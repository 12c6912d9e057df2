//! End-to-end ledger sequences over the pure engines: every operation the
//! store serializes is a composition of these balance-map updates, so the
//! zero-sum and reversibility properties proved here carry over to the
//! persisted documents.

use bson::oid::ObjectId;
use chrono::Utc;
use rust_decimal::Decimal;
use splitledger::ledger::membership::retire_member;
use splitledger::ledger::posting::{apply_expense, revert_expense};
use splitledger::ledger::projection::{
    project_cross_group_debts, project_group_debts, DebtDirection,
};
use splitledger::ledger::settlement::{apply_settlement, validate_settlement};
use splitledger::schemas::{BalanceMap, Group, UserId};

fn d(raw: &str) -> Decimal {
    Decimal::from_str_exact(raw).unwrap()
}

fn u(id: &str) -> UserId {
    id.to_string()
}

fn users(ids: &[&str]) -> Vec<UserId> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn zeroed(members: &[&str]) -> BalanceMap {
    members
        .iter()
        .map(|member| (member.to_string(), Decimal::ZERO))
        .collect()
}

fn group_with(members: &[&str], balances: BalanceMap) -> Group {
    let now = Utc::now();
    Group {
        id: ObjectId::new().to_hex(),
        name: "flat 7".to_string(),
        description: None,
        created_by: members[0].to_string(),
        members: users(members),
        balances,
        created_at: now,
        updated_at: now,
    }
}

fn assert_zero_sum(balances: &BalanceMap) {
    let sum: Decimal = balances.values().copied().sum();
    assert_eq!(sum, Decimal::ZERO, "ledger must stay zero-sum: {balances:?}");
}

#[test]
fn expense_then_full_settlement_clears_the_group() {
    // Scenario A: U1 fronts 100 for two -> {U1: 50, U2: -50}.
    let mut balances = zeroed(&["u1", "u2"]);
    apply_expense(&mut balances, &u("u1"), d("100"), &users(&["u1", "u2"])).unwrap();
    assert_eq!(balances["u1"], d("50"));
    assert_eq!(balances["u2"], d("-50"));
    assert_zero_sum(&balances);

    // Scenario B: U2 settles the full 50 back to U1.
    let debt = validate_settlement(&balances, &u("u2"), &u("u1"), d("50")).unwrap();
    assert_eq!(debt, d("50"));
    apply_settlement(&mut balances, &u("u2"), &u("u1"), d("50"));
    assert_eq!(balances, zeroed(&["u1", "u2"]));
}

#[test]
fn amending_an_expense_moves_balances_to_the_new_amount() {
    // Scenario C: the 100 expense is amended down to 60.
    let mut balances = zeroed(&["u1", "u2"]);
    let participants = users(&["u1", "u2"]);
    apply_expense(&mut balances, &u("u1"), d("100"), &participants).unwrap();

    revert_expense(&mut balances, &u("u1"), d("100"), &participants).unwrap();
    apply_expense(&mut balances, &u("u1"), d("60"), &participants).unwrap();

    assert_eq!(balances["u1"], d("30"));
    assert_eq!(balances["u2"], d("-30"));
    assert_zero_sum(&balances);
}

#[test]
fn three_way_split_projects_a_single_debt_for_each_debtor() {
    // Scenario D: U1 pays 90 split three ways.
    let mut balances = zeroed(&["u1", "u2", "u3"]);
    apply_expense(&mut balances, &u("u1"), d("90"), &users(&["u1", "u2", "u3"])).unwrap();
    assert_eq!(balances["u1"], d("60"));
    assert_eq!(balances["u2"], d("-30"));
    assert_eq!(balances["u3"], d("-30"));

    let group = group_with(&["u1", "u2", "u3"], balances);
    let summary = project_group_debts(&group, &u("u2"));
    assert_eq!(summary.user_balance, d("-30"));
    assert_eq!(summary.total_spend, d("60"));
    assert_eq!(summary.debts.len(), 1);
    assert_eq!(summary.debts[0].user, "u1");
    assert!(!summary.debts[0].owes_you);
    assert_eq!(summary.debts[0].amount, d("30"));
}

#[test]
fn overpaying_a_debt_is_rejected_and_changes_nothing() {
    // Scenario E: actual debt is 30, settling 60 must fail cleanly.
    let mut balances = zeroed(&["u1", "u2", "u3"]);
    apply_expense(&mut balances, &u("u1"), d("90"), &users(&["u1", "u2", "u3"])).unwrap();
    let before = balances.clone();

    let err = validate_settlement(&balances, &u("u2"), &u("u1"), d("60")).unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(balances, before);
}

#[test]
fn posting_then_deleting_restores_the_exact_prior_map() {
    let mut balances = zeroed(&["u1", "u2", "u3"]);
    apply_expense(&mut balances, &u("u2"), d("41.50"), &users(&["u1", "u3"])).unwrap();
    let before = balances.clone();

    // An uneven split exercises the remainder-cent allocation both ways.
    let participants = users(&["u1", "u2", "u3"]);
    apply_expense(&mut balances, &u("u1"), d("100"), &participants).unwrap();
    assert_ne!(balances, before);
    revert_expense(&mut balances, &u("u1"), d("100"), &participants).unwrap();

    assert_eq!(balances, before);
}

#[test]
fn long_mixed_sequences_stay_zero_sum() {
    let members = ["u1", "u2", "u3", "u4"];
    let mut balances = zeroed(&members);
    let everyone = users(&members);

    apply_expense(&mut balances, &u("u1"), d("100"), &everyone).unwrap();
    assert_zero_sum(&balances);
    apply_expense(&mut balances, &u("u2"), d("33.35"), &users(&["u2", "u3"])).unwrap();
    assert_zero_sum(&balances);
    apply_expense(&mut balances, &u("u3"), d("0.05"), &everyone).unwrap();
    assert_zero_sum(&balances);

    // Amend the second expense from 33.35 across {U2, U3} to 21 across all.
    revert_expense(&mut balances, &u("u2"), d("33.35"), &users(&["u2", "u3"])).unwrap();
    apply_expense(&mut balances, &u("u2"), d("21"), &everyone).unwrap();
    assert_zero_sum(&balances);

    // Settle what U4 owes U1, capped by the bilateral debt.
    let debt = validate_settlement(&balances, &u("u4"), &u("u1"), d("10")).unwrap();
    assert!(debt >= d("10"));
    apply_settlement(&mut balances, &u("u4"), &u("u1"), d("10"));
    assert_zero_sum(&balances);

    // Delete the first expense entirely.
    revert_expense(&mut balances, &u("u1"), d("100"), &everyone).unwrap();
    assert_zero_sum(&balances);
}

#[test]
fn members_leave_only_once_their_balance_is_settled() {
    let mut balances = zeroed(&["u1", "u2"]);
    apply_expense(&mut balances, &u("u1"), d("100"), &users(&["u1", "u2"])).unwrap();
    let mut group = group_with(&["u1", "u2"], balances);

    // An open debt blocks the removal and leaves the group untouched.
    let err = retire_member(&mut group, "u2").unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert!(group.is_member("u2"));

    apply_settlement(&mut group.balances, &u("u2"), &u("u1"), d("50"));
    retire_member(&mut group, "u2").unwrap();
    assert!(!group.is_member("u2"));
    assert!(!group.balances.contains_key("u2"));
    assert_zero_sum(&group.balances);
}

#[test]
fn settlement_from_the_creditor_side_is_always_rejected() {
    let mut balances = zeroed(&["u1", "u2"]);
    apply_expense(&mut balances, &u("u1"), d("80"), &users(&["u1", "u2"])).unwrap();

    for amount in ["1", "40", "80"] {
        let err = validate_settlement(&balances, &u("u1"), &u("u2"), d(amount)).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }
}

#[test]
fn cross_group_overview_nets_and_orders_counterparties() {
    // Group 1: U2 owes the viewer 50. Group 2: the viewer owes U3 20.
    let mut first = zeroed(&["me", "u2"]);
    apply_expense(&mut first, &u("me"), d("100"), &users(&["me", "u2"])).unwrap();
    let mut second = zeroed(&["me", "u3"]);
    apply_expense(&mut second, &u("u3"), d("40"), &users(&["me", "u3"])).unwrap();

    let groups = vec![
        group_with(&["me", "u2"], first),
        group_with(&["me", "u3"], second),
    ];
    let overview = project_cross_group_debts(&u("me"), &groups);

    assert_eq!(overview.you_are_owed, d("50"));
    assert_eq!(overview.you_owe, d("20"));
    assert_eq!(overview.total_balance, d("30"));
    assert_eq!(overview.debts.len(), 2);
    assert_eq!(overview.debts[0].direction, DebtDirection::OwesYou);
    assert_eq!(overview.debts[0].user, "u2");
    assert_eq!(overview.debts[1].direction, DebtDirection::YouOwe);
    assert_eq!(overview.debts[1].user, "u3");
}
