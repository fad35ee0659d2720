use std::collections::HashSet;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::pantry::repo::PantryItem;

/// Items expiring further out than this produce no notification.
const EXPIRY_HORIZON_DAYS: i64 = 30;
/// Share of the initial quantity at or below which stock counts as low.
const LOW_STOCK_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ExpiringSoon,
    Expired,
    LowStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub food_id: Uuid,
    pub food_name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
    pub severity: Severity,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Notification {
    fn about(item: &PantryItem, id: String, kind: NotificationKind, now: OffsetDateTime) -> Self {
        Self {
            id,
            kind,
            title: String::new(),
            message: String::new(),
            food_id: item.id,
            food_name: item.name.clone(),
            quantity: item.quantity_remaining,
            unit: item.unit.clone(),
            expiry_date: None,
            days_until_expiry: None,
            severity: Severity::Info,
            created_at: now,
        }
    }
}

fn expiring(item: &PantryItem, expiry: OffsetDateTime, now: OffsetDateTime) -> Notification {
    let days = (expiry - now).whole_days();
    let (bucket, severity, title) = match days {
        0 => ("1day", Severity::Critical, "Food Expiring Today!"),
        1 => ("1day", Severity::Critical, "Food Expiring Tomorrow!"),
        2..=3 => ("3days", Severity::Critical, "Food Expiring in 3 Days!"),
        4..=7 => ("1week", Severity::Warning, "Food Expiring This Week"),
        _ => ("1month", Severity::Info, "Food Expiring This Month"),
    };
    let message = match days {
        0 => format!("{} expires today!", item.name),
        1 => format!("{} expires tomorrow!", item.name),
        d => format!("{} expires in {} days", item.name, d),
    };

    let id = format!("expiring_{}_{}_{}", bucket, item.id, days);
    Notification {
        title: title.into(),
        message,
        expiry_date: Some(expiry),
        days_until_expiry: Some(days),
        severity,
        ..Notification::about(item, id, NotificationKind::ExpiringSoon, now)
    }
}

fn expired(item: &PantryItem, expiry: OffsetDateTime, now: OffsetDateTime) -> Notification {
    Notification {
        title: "Food Expired".into(),
        message: format!("{} has expired. Please check or discard it.", item.name),
        expiry_date: Some(expiry),
        severity: Severity::Critical,
        ..Notification::about(
            item,
            format!("expired_{}", item.id),
            NotificationKind::Expired,
            now,
        )
    }
}

fn low_stock(item: &PantryItem, now: OffsetDateTime) -> Option<Notification> {
    if item.quantity_initial <= 0.0 {
        return None;
    }
    let percent = item.quantity_remaining / item.quantity_initial * 100.0;
    if percent > LOW_STOCK_PERCENT {
        return None;
    }
    Some(Notification {
        title: "Low Stock".into(),
        message: format!(
            "{} is running low. Only {:.1} {} left",
            item.name, item.quantity_remaining, item.unit
        ),
        ..Notification::about(
            item,
            format!("lowstock_{}", item.id),
            NotificationKind::LowStock,
            now,
        )
    })
}

/// Builds the user's notifications from pantry state. Ids in `read` are
/// dropped. Order: expiring soonest first, then expired most recent first,
/// then low stock.
pub fn derive(
    items: &[PantryItem],
    read: &HashSet<String>,
    now: OffsetDateTime,
    include_low_stock: bool,
) -> Vec<Notification> {
    let stocked: Vec<&PantryItem> = items
        .iter()
        .filter(|i| i.quantity_remaining > 0.0)
        .collect();
    let horizon = now + Duration::days(EXPIRY_HORIZON_DAYS);

    let mut soon: Vec<(&PantryItem, OffsetDateTime)> = stocked
        .iter()
        .filter_map(|i| i.expiry_date.map(|e| (*i, e)))
        .filter(|(_, e)| *e >= now && *e <= horizon)
        .collect();
    soon.sort_by_key(|(_, e)| *e);

    let mut gone: Vec<(&PantryItem, OffsetDateTime)> = stocked
        .iter()
        .filter_map(|i| i.expiry_date.map(|e| (*i, e)))
        .filter(|(_, e)| *e < now)
        .collect();
    gone.sort_by_key(|(_, e)| std::cmp::Reverse(*e));

    let mut out: Vec<Notification> = soon
        .into_iter()
        .map(|(i, e)| expiring(i, e, now))
        .chain(gone.into_iter().map(|(i, e)| expired(i, e, now)))
        .collect();

    if include_low_stock {
        out.extend(stocked.iter().filter_map(|i| low_stock(i, now)));
    }

    out.retain(|n| !read.contains(&n.id));
    out
}
