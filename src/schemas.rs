use std::collections::HashMap;

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = String;

/// Per-group ledger state: member id -> signed balance. Positive means the
/// group owes the member, negative means the member owes the group. A missing
/// key reads as zero. Every mutation keeps the sum of all values at exactly
/// zero, which is why amounts are decimals and never floats.
pub type BalanceMap = HashMap<UserId, Decimal>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: UserId,
    pub members: Vec<UserId>,
    #[serde(default)]
    pub balances: BalanceMap,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, user: &str) -> bool {
        self.members.iter().any(|member| member == user)
    }

    pub fn balance_of(&self, user: &str) -> Decimal {
        self.balances.get(user).copied().unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: String,
    pub group_id: String,
    pub paid_by: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub participants: Vec<UserId>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Append-only payment record. Settlements are never amended or deleted.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    #[serde(rename = "_id")]
    pub id: String,
    pub group_id: String,
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
