//! Subscription status of a space from its payment record

use crate::conversions::SpacePayments;
use serde::Serialize;

const DAY_MS: i128 = 86_400_000;

/// Days before expiry in which a space is asked to renew or activate
pub const RENEWAL_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Trial,
    Active,
    /// Inside the renewal window after the free trial was used
    Activate,
    Renew,
    Expired,
    /// No payment was ever recorded
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub expiry_time: u64,
    pub free_trial_used: bool,
    /// Signed whole days until expiry, rounded up; negative once expired
    pub days_left: i64,
    pub status: SubscriptionState,
}

/// `ceil((expiry_time * 1000 - now_ms) / 86_400_000)`
pub fn days_left(expiry_time: u64, now_ms: u64) -> i64 {
    let diff = i128::from(expiry_time) * 1000 - i128::from(now_ms);
    let floor = diff.div_euclid(DAY_MS);
    let days = if diff.rem_euclid(DAY_MS) == 0 {
        floor
    } else {
        floor + 1
    };
    days.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Resolve the subscription state at `now_ms` (unix milliseconds)
pub fn resolve(expiry_time: u64, free_trial_used: bool, now_ms: u64) -> SubscriptionStatus {
    if expiry_time == 0 {
        return SubscriptionStatus {
            expiry_time,
            free_trial_used,
            days_left: 0,
            status: SubscriptionState::Unknown,
        };
    }

    let days_left = days_left(expiry_time, now_ms);
    let status = if days_left <= 0 {
        SubscriptionState::Expired
    } else if days_left <= RENEWAL_WINDOW_DAYS {
        if free_trial_used {
            SubscriptionState::Activate
        } else {
            SubscriptionState::Renew
        }
    } else {
        SubscriptionState::Active
    };

    SubscriptionStatus {
        expiry_time,
        free_trial_used,
        days_left,
        status,
    }
}

/// Like [`resolve`], but reports `trial` for a space still running on its free
/// trial (trial used, nothing paid) outside the renewal window.
pub fn resolve_with_payment(
    expiry_time: u64,
    free_trial_used: bool,
    has_paid: bool,
    now_ms: u64,
) -> SubscriptionStatus {
    let mut resolved = resolve(expiry_time, free_trial_used, now_ms);
    if resolved.status == SubscriptionState::Active && free_trial_used && !has_paid {
        resolved.status = SubscriptionState::Trial;
    }
    resolved
}

/// Resolve straight from a decoded payments tuple and the paid flag
pub fn resolve_payments(payments: &SpacePayments, has_paid: bool, now_ms: u64) -> SubscriptionStatus {
    resolve_with_payment(payments.expiry_time, payments.free_trial_used, has_paid, now_ms)
}

/// Human countdown for a signed day count
pub fn countdown_label(days_left: i64) -> String {
    let n = days_left.unsigned_abs();
    let unit = if n == 1 { "day" } else { "days" };
    if days_left <= 0 {
        format!("expired {} {} ago", n, unit)
    } else {
        format!("{} {} left", n, unit)
    }
}
