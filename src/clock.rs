//! Duration & time classification: elapsed-time math over the RFC3339
//! timestamps the store carries, humanized display strings, and the
//! age-severity tiers used to flag orders waiting too long.
//!
//! Everything here is pure: callers pass `now` explicitly so behavior is
//! deterministic under test. Parse failures and negative spans degrade to
//! harmless values; nothing in this module can panic.

use chrono::{DateTime, Datelike, Months, Utc};

use crate::model::{Order, OrderStatus, EPSILON};

/// Minutes after which an open order is worth a second look.
pub const CAUTION_MINUTES: i64 = 30;
/// Minutes after which an open order is overdue.
pub const SEVERE_MINUTES: i64 = 60;

// ---------------------------------------------------------------------------
// Elapsed minutes
// ---------------------------------------------------------------------------

/// Parse an RFC3339 timestamp into UTC. `None` for unparseable input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole minutes elapsed between `raw` and `now`, clamped to zero when the
/// timestamp lies in the future (terminal clocks drift). `None` when the
/// timestamp does not parse.
pub fn minutes_since(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    let then = parse_timestamp(raw)?;
    Some((now - then).num_minutes().max(0))
}

// ---------------------------------------------------------------------------
// Humanized display
// ---------------------------------------------------------------------------

/// Compact elapsed-time label for list rows: `"now"`, `"12 min"`,
/// `"3 h 05 min"`, `"2 d 4 h"`. Unparseable input yields `"unavailable"`.
pub fn humanize_elapsed(raw: &str, now: DateTime<Utc>) -> String {
    let Some(total_minutes) = minutes_since(raw, now) else {
        return "unavailable".to_string();
    };
    if total_minutes < 1 {
        return "now".to_string();
    }
    if total_minutes < 60 {
        return format!("{total_minutes} min");
    }
    let total_hours = total_minutes / 60;
    if total_hours < 24 {
        let minutes = total_minutes % 60;
        if minutes == 0 {
            return format!("{total_hours} h");
        }
        return format!("{total_hours} h {minutes:02} min");
    }
    let days = total_hours / 24;
    let hours = total_hours % 24;
    if hours == 0 {
        format!("{days} d")
    } else {
        format!("{days} d {hours} h")
    }
}

/// `dd/MM/yyyy HH:mm` display form of a stored timestamp, or `"-"` when it
/// does not parse.
pub fn format_date_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%d/%m/%Y %H:%M").to_string(),
        None => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Calendar-aware detailed duration
// ---------------------------------------------------------------------------

/// A span broken into calendar fields. Years and months follow the actual
/// calendar (borrowing against real month lengths), not fixed 365/30-day
/// approximations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailedDuration {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl DetailedDuration {
    pub fn is_zero(&self) -> bool {
        *self == DetailedDuration::default()
    }
}

/// Break the span between two timestamps into calendar fields. A negative
/// span (or unparseable input) yields the zero duration.
///
/// Whole months are counted by advancing `from` month by month on the real
/// calendar (day-of-month clamped, so Jan 31 plus one month lands on the
/// last day of February); the remainder is then split into days, hours, and
/// minutes.
pub fn detailed_duration(from_raw: &str, to: DateTime<Utc>) -> DetailedDuration {
    let Some(from) = parse_timestamp(from_raw) else {
        return DetailedDuration::default();
    };
    if to <= from {
        return DetailedDuration::default();
    }

    let mut whole_months = i64::from(to.year() - from.year()) * 12
        + i64::from(to.month() as i32 - from.month() as i32);
    whole_months = whole_months.max(0);
    let mut anchor = add_months(from, whole_months);
    if anchor > to {
        whole_months -= 1;
        anchor = add_months(from, whole_months);
    }

    let remainder = to - anchor;
    let minutes_total = remainder.num_minutes();

    DetailedDuration {
        years: whole_months / 12,
        months: whole_months % 12,
        days: minutes_total / (24 * 60),
        hours: (minutes_total / 60) % 24,
        minutes: minutes_total % 60,
    }
}

fn add_months(from: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    if months <= 0 {
        return from;
    }
    from.checked_add_months(Months::new(months as u32))
        .unwrap_or(from)
}

/// Long-form label for a detailed duration, skipping zero fields. Spans of
/// a day or more show calendar fields only (`"1 y 2 mo 3 d"`); hours and
/// minutes appear only for sub-day spans. The zero duration renders as
/// `"now"`.
pub fn humanize_detailed(duration: &DetailedDuration) -> String {
    if duration.is_zero() {
        return "now".to_string();
    }
    let mut parts = Vec::new();
    if duration.years > 0 {
        parts.push(format!("{} y", duration.years));
    }
    if duration.months > 0 {
        parts.push(format!("{} mo", duration.months));
    }
    if duration.days > 0 {
        parts.push(format!("{} d", duration.days));
    }
    if parts.is_empty() {
        if duration.hours > 0 {
            parts.push(format!("{} h", duration.hours));
        }
        if duration.minutes > 0 {
            parts.push(format!("{} min", duration.minutes));
        }
    }
    if parts.is_empty() {
        "now".to_string()
    } else {
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Age severity
// ---------------------------------------------------------------------------

/// Age tier of an open order, for row highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Caution,
    Severe,
}

impl Severity {
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes >= SEVERE_MINUTES {
            Severity::Severe
        } else if minutes >= CAUTION_MINUTES {
            Severity::Caution
        } else {
            Severity::Normal
        }
    }
}

/// Age severity of an order from its creation time. Unparseable timestamps
/// count as fresh.
pub fn order_severity(order: &Order, now: DateTime<Utc>) -> Severity {
    match minutes_since(&order.created_at, now) {
        Some(minutes) => Severity::from_minutes(minutes),
        None => Severity::Normal,
    }
}

/// Whether an order deserves an overdue alert: still open, not fully paid,
/// and older than `threshold_minutes`.
pub fn overdue_alert(order: &Order, now: DateTime<Utc>, threshold_minutes: i64) -> bool {
    if order.status != OrderStatus::Open {
        return false;
    }
    let total = order.resolved_total();
    let paid_in_full = total > EPSILON && order.payment_value >= total - EPSILON;
    if paid_in_full {
        return false;
    }
    match minutes_since(&order.created_at, now) {
        Some(minutes) => minutes >= threshold_minutes,
        None => false,
    }
}
