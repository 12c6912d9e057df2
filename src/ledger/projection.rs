use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::schemas::{Group, UserId};

/// One pairwise debt between the viewer and another group member.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebtEntry {
    pub user: UserId,
    pub owes_you: bool,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupDebtSummary {
    pub user_balance: Decimal,
    pub total_spend: Decimal,
    pub debts: Vec<DebtEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    OwesYou,
    YouOwe,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrossDebt {
    pub user: UserId,
    #[serde(rename = "type")]
    pub direction: DebtDirection,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceOverview {
    pub total_balance: Decimal,
    pub you_are_owed: Decimal,
    pub you_owe: Decimal,
    pub debts: Vec<CrossDebt>,
}

/// Derives "who owes whom" for one viewer from a group's balance map. Pure
/// read over the stored map; a member owes the viewer only while the viewer
/// is net positive and the member net negative, capped by the smaller
/// magnitude. `total_spend` is the sum of all positive balances, i.e. the
/// amount currently fronted by payers.
pub fn project_group_debts(group: &Group, viewer: &UserId) -> GroupDebtSummary {
    let user_balance = group.balance_of(viewer);
    let mut debts = Vec::new();

    for member in &group.members {
        if member == viewer {
            continue;
        }
        let member_balance = group.balance_of(member);
        if user_balance > Decimal::ZERO && member_balance < Decimal::ZERO {
            let amount = user_balance.min(member_balance.abs());
            if amount > Decimal::ZERO {
                debts.push(DebtEntry {
                    user: member.clone(),
                    owes_you: true,
                    amount: amount.round_dp(2),
                });
            }
        } else if user_balance < Decimal::ZERO && member_balance > Decimal::ZERO {
            let amount = user_balance.abs().min(member_balance);
            if amount > Decimal::ZERO {
                debts.push(DebtEntry {
                    user: member.clone(),
                    owes_you: false,
                    amount: amount.round_dp(2),
                });
            }
        }
    }

    let total_spend: Decimal = group
        .balances
        .values()
        .filter(|balance| **balance > Decimal::ZERO)
        .copied()
        .sum();

    GroupDebtSummary {
        user_balance: user_balance.round_dp(2),
        total_spend: total_spend.round_dp(2),
        debts,
    }
}

/// Aggregates the per-group pairwise logic across every group the viewer
/// belongs to, netting per counterparty. Display policy: everything owed to
/// the viewer first, then what the viewer owes, each block sorted by
/// descending amount.
pub fn project_cross_group_debts(viewer: &UserId, groups: &[Group]) -> BalanceOverview {
    // BTreeMap keeps counterparty iteration stable, so equal amounts come
    // out in a deterministic order.
    let mut net_by_user: BTreeMap<UserId, Decimal> = BTreeMap::new();
    let mut total_balance = Decimal::ZERO;

    for group in groups {
        let user_balance = group.balance_of(viewer);
        total_balance += user_balance;

        for member in &group.members {
            if member == viewer {
                continue;
            }
            let member_balance = group.balance_of(member);
            let net = net_by_user.entry(member.clone()).or_default();
            if user_balance > Decimal::ZERO && member_balance < Decimal::ZERO {
                *net += user_balance.min(member_balance.abs());
            } else if user_balance < Decimal::ZERO && member_balance > Decimal::ZERO {
                *net -= user_balance.abs().min(member_balance);
            }
        }
    }

    let mut debts = Vec::new();
    let mut you_are_owed = Decimal::ZERO;
    let mut you_owe = Decimal::ZERO;

    for (user, net_balance) in net_by_user {
        if net_balance.is_zero() {
            continue;
        }
        let direction = if net_balance > Decimal::ZERO {
            you_are_owed += net_balance;
            DebtDirection::OwesYou
        } else {
            you_owe += net_balance.abs();
            DebtDirection::YouOwe
        };
        debts.push(CrossDebt {
            user,
            direction,
            amount: net_balance.abs().round_dp(2),
        });
    }

    debts.sort_by(|a, b| match (a.direction, b.direction) {
        (DebtDirection::OwesYou, DebtDirection::YouOwe) => Ordering::Less,
        (DebtDirection::YouOwe, DebtDirection::OwesYou) => Ordering::Greater,
        _ => b.amount.cmp(&a.amount),
    });

    BalanceOverview {
        total_balance: total_balance.round_dp(2),
        you_are_owed: you_are_owed.round_dp(2),
        you_owe: you_owe.round_dp(2),
        debts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::BalanceMap;
    use bson::oid::ObjectId;
    use chrono::Utc;

    fn d(raw: &str) -> Decimal {
        Decimal::from_str_exact(raw).unwrap()
    }

    fn group(members: &[&str], balances: &[(&str, &str)]) -> Group {
        let now = Utc::now();
        Group {
            id: ObjectId::new().to_hex(),
            name: "trip".to_string(),
            description: None,
            created_by: members[0].to_string(),
            members: members.iter().map(|member| member.to_string()).collect(),
            balances: balances
                .iter()
                .map(|(user, amount)| (user.to_string(), d(amount)))
                .collect::<BalanceMap>(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn debtor_sees_a_single_entry_toward_the_payer() {
        // U1 paid 90 split three ways; U2's view shows owing U1 exactly 30.
        let group = group(
            &["u1", "u2", "u3"],
            &[("u1", "60"), ("u2", "-30"), ("u3", "-30")],
        );
        let summary = project_group_debts(&group, &"u2".to_string());

        assert_eq!(summary.user_balance, d("-30"));
        assert_eq!(summary.total_spend, d("60"));
        assert_eq!(
            summary.debts,
            vec![DebtEntry {
                user: "u1".to_string(),
                owes_you: false,
                amount: d("30"),
            }]
        );
    }

    #[test]
    fn creditor_sees_each_debtor_capped_by_their_share() {
        let group = group(
            &["u1", "u2", "u3"],
            &[("u1", "60"), ("u2", "-30"), ("u3", "-30")],
        );
        let summary = project_group_debts(&group, &"u1".to_string());

        assert_eq!(summary.user_balance, d("60"));
        assert_eq!(summary.debts.len(), 2);
        assert!(summary
            .debts
            .iter()
            .all(|entry| entry.owes_you && entry.amount == d("30")));
    }

    #[test]
    fn settled_group_projects_no_debts() {
        let group = group(&["u1", "u2"], &[("u1", "0"), ("u2", "0")]);
        let summary = project_group_debts(&group, &"u1".to_string());
        assert_eq!(summary.user_balance, Decimal::ZERO);
        assert_eq!(summary.total_spend, Decimal::ZERO);
        assert!(summary.debts.is_empty());
    }

    #[test]
    fn members_absent_from_the_map_read_as_zero() {
        let group = group(&["u1", "u2", "u3"], &[("u1", "20"), ("u2", "-20")]);
        let summary = project_group_debts(&group, &"u3".to_string());
        assert_eq!(summary.user_balance, Decimal::ZERO);
        assert!(summary.debts.is_empty());
    }

    #[test]
    fn nets_the_same_counterparty_across_groups() {
        // U2 owes the viewer 30 in one group and is owed 10 back in another.
        let groups = vec![
            group(&["u1", "u2"], &[("u1", "30"), ("u2", "-30")]),
            group(&["u1", "u2"], &[("u1", "-10"), ("u2", "10")]),
        ];
        let overview = project_cross_group_debts(&"u1".to_string(), &groups);

        assert_eq!(overview.total_balance, d("20"));
        assert_eq!(overview.you_are_owed, d("20"));
        assert_eq!(overview.you_owe, Decimal::ZERO);
        assert_eq!(
            overview.debts,
            vec![CrossDebt {
                user: "u2".to_string(),
                direction: DebtDirection::OwesYou,
                amount: d("20"),
            }]
        );
    }

    #[test]
    fn orders_credits_before_debts_then_by_descending_amount() {
        let groups = vec![
            group(&["me", "a"], &[("me", "5"), ("a", "-5")]),
            group(&["me", "b"], &[("me", "40"), ("b", "-40")]),
            group(&["me", "c"], &[("me", "-15"), ("c", "15")]),
            group(&["me", "d"], &[("me", "-60"), ("d", "60")]),
        ];
        let overview = project_cross_group_debts(&"me".to_string(), &groups);

        let order: Vec<(&str, DebtDirection)> = overview
            .debts
            .iter()
            .map(|debt| (debt.user.as_str(), debt.direction))
            .collect();
        assert_eq!(
            order,
            vec![
                ("b", DebtDirection::OwesYou),
                ("a", DebtDirection::OwesYou),
                ("d", DebtDirection::YouOwe),
                ("c", DebtDirection::YouOwe),
            ]
        );
        assert_eq!(overview.you_are_owed, d("45"));
        assert_eq!(overview.you_owe, d("75"));
        assert_eq!(overview.total_balance, d("-30"));
    }

    #[test]
    fn cross_debts_serialize_with_wire_field_names() {
        let debt = CrossDebt {
            user: "u2".to_string(),
            direction: DebtDirection::OwesYou,
            amount: d("12.50"),
        };
        let json = serde_json::to_value(&debt).unwrap();
        assert_eq!(json["type"], "owes_you");
        assert_eq!(json["amount"], "12.50");

        let debt = CrossDebt {
            direction: DebtDirection::YouOwe,
            ..debt
        };
        assert_eq!(serde_json::to_value(&debt).unwrap()["type"], "you_owe");
    }

    #[test]
    fn counterparties_with_zero_aggregate_are_dropped() {
        let groups = vec![
            group(&["u1", "u2"], &[("u1", "25"), ("u2", "-25")]),
            group(&["u1", "u2"], &[("u1", "-25"), ("u2", "25")]),
        ];
        let overview = project_cross_group_debts(&"u1".to_string(), &groups);
        assert!(overview.debts.is_empty());
        assert_eq!(overview.total_balance, Decimal::ZERO);
    }
}
