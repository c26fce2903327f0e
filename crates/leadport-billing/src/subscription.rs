//! Lazy subscription expiry.
//!
//! No background job flips purchases to `Expired`; every read that asks
//! "is this user subscribed?" goes through [`current_subscription`], which
//! expires a lapsed purchase on the spot.

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::purchase::Purchase;
use leadport_core::repository::PurchaseRepository;
use tracing::info;
use uuid::Uuid;

/// Bound on lapsed rows expired in one call.
const MAX_LAPSED_PER_READ: usize = 8;

/// The user's live purchase, if any, expiring lapsed ones as of `now`.
pub async fn current_subscription<P: PurchaseRepository>(
    purchases: &P,
    tenant_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> LeadportResult<Option<Purchase>> {
    for _ in 0..MAX_LAPSED_PER_READ {
        let Some(purchase) = purchases.find_active_for_user(tenant_id, user_id).await? else {
            return Ok(None);
        };
        if !purchase.is_lapsed_at(now) {
            return Ok(Some(purchase));
        }
        expire(purchases, &purchase).await?;
    }
    Ok(None)
}

/// Expire every lapsed entry in `history`, returning the refreshed list.
pub async fn expire_lapsed<P: PurchaseRepository>(
    purchases: &P,
    history: Vec<Purchase>,
    now: DateTime<Utc>,
) -> LeadportResult<Vec<Purchase>> {
    let mut refreshed = Vec::with_capacity(history.len());
    for purchase in history {
        if purchase.is_lapsed_at(now) {
            let current = match expire(purchases, &purchase).await? {
                Some(expired) => expired,
                None => purchases.get_by_id(purchase.tenant_id, purchase.id).await?,
            };
            refreshed.push(current);
        } else {
            refreshed.push(purchase);
        }
    }
    Ok(refreshed)
}

/// `None` when another reader got there first.
async fn expire<P: PurchaseRepository>(
    purchases: &P,
    purchase: &Purchase,
) -> LeadportResult<Option<Purchase>> {
    let expired = purchases
        .mark_expired(purchase.tenant_id, purchase.id)
        .await?;
    if expired.is_some() {
        info!(
            tenant_id = %purchase.tenant_id,
            user_id = %purchase.user_id,
            purchase_id = %purchase.id,
            expires_at = %purchase.expires_at,
            "Subscription expired"
        );
    }
    Ok(expired)
}
