use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MembershipStatus;

/// Member profile counts keyed by membership status
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipCounts {
    pub none: i64,
    pub pending: i64,
    pub active: i64,
    pub expired: i64,
    pub cancelled: i64,
    pub total: i64,
}

impl MembershipCounts {
    pub fn from_rows(rows: &[(MembershipStatus, i64)]) -> Self {
        let mut counts = Self::default();
        for &(status, count) in rows {
            let slot = match status {
                MembershipStatus::None => &mut counts.none,
                MembershipStatus::Pending => &mut counts.pending,
                MembershipStatus::Active => &mut counts.active,
                MembershipStatus::Expired => &mut counts.expired,
                MembershipStatus::Cancelled => &mut counts.cancelled,
            };
            *slot += count;
            counts.total += count;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub members: MembershipCounts,
    pub active_subscriptions: i64,
    pub pending_subscriptions: i64,
    pub open_diet_requests: i64,
    pub check_ins_today: i64,
    pub members_in_building: i64,
    pub orders_this_month: i64,
    pub store_revenue_cents_this_month: i64,
    pub generated_at: DateTime<Utc>,
}
