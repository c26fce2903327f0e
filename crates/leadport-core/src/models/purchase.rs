//! Purchase domain model: a user's paid subscription.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PurchaseStatus {
    Active,
    Expired,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Active => "ACTIVE",
            PurchaseStatus::Expired => "EXPIRED",
            PurchaseStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PurchaseStatus::Active),
            "EXPIRED" => Ok(PurchaseStatus::Expired),
            "CANCELLED" => Ok(PurchaseStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "purchase status",
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_cents: i64,
    pub status: PurchaseStatus,
    pub expires_at: DateTime<Utc>,
    /// Checkout session that created this purchase. Unique.
    pub stripe_session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// An `Active` purchase whose expiry has passed is stale: it still
    /// reads as active in storage until someone observes it.
    pub fn is_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PurchaseStatus::Active && self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_cents: i64,
    pub expires_at: DateTime<Utc>,
    pub stripe_session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn purchase(status: PurchaseStatus, expires_at: DateTime<Utc>) -> Purchase {
        Purchase {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            amount_cents: 4900,
            status,
            expires_at,
            stripe_session_id: "cs_test_1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn active_past_expiry_is_lapsed() {
        let now = Utc::now();
        assert!(purchase(PurchaseStatus::Active, now - Duration::seconds(1)).is_lapsed_at(now));
        assert!(!purchase(PurchaseStatus::Active, now + Duration::days(1)).is_lapsed_at(now));
    }

    #[test]
    fn non_active_is_never_lapsed() {
        let now = Utc::now();
        let past = now - Duration::days(3);
        assert!(!purchase(PurchaseStatus::Cancelled, past).is_lapsed_at(now));
        assert!(!purchase(PurchaseStatus::Expired, past).is_lapsed_at(now));
    }
}
