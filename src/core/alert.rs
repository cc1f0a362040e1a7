//! Deciding which category alerts reach the user.

use crate::core::aggregate::{CategoryAggregate, Status};
use crate::core::holding::{Category, Market};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub market: Market,
    pub category: Category,
    pub status: Status,
    pub percentage: f64,
}

impl Notification {
    pub fn action(&self) -> &'static str {
        match self.status {
            Status::Low => "buy signal",
            Status::High => "sell signal",
            Status::Normal => "no action",
        }
    }
}

/// Delivers notifications to the user.
pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Alerts already delivered this session, one per market, category and day.
#[derive(Debug, Default, Clone)]
pub struct NotificationLedger {
    sent: HashSet<(Market, Category, NaiveDate)>,
}

impl NotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, market: Market, category: Category, date: NaiveDate) -> bool {
        self.sent.contains(&(market, category, date))
    }

    /// Returns false if the key was already recorded.
    pub fn record(&mut self, market: Market, category: Category, date: NaiveDate) -> bool {
        self.sent.insert((market, category, date))
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

pub fn select_notifiable(alerts: &[CategoryAggregate]) -> Vec<CategoryAggregate> {
    alerts
        .iter()
        .filter(|a| a.status.needs_attention())
        .cloned()
        .collect()
}

/// Sends every out-of-band alert not yet delivered for `date`.
///
/// Returns how many notifications went out. A delivery failure is logged and
/// left out of the ledger so the next pass retries it.
pub fn dispatch(
    alerts: &[CategoryAggregate],
    market: Market,
    date: NaiveDate,
    ledger: &mut NotificationLedger,
    notifier: &dyn Notifier,
) -> usize {
    let mut delivered = 0;
    for alert in select_notifiable(alerts) {
        if ledger.contains(market, alert.category, date) {
            debug!("Already notified {} {} on {}", market, alert.category, date);
            continue;
        }
        let notification = Notification {
            market,
            category: alert.category,
            status: alert.status,
            percentage: alert.percentage,
        };
        match notifier.notify(&notification) {
            Ok(()) => {
                ledger.record(market, alert.category, date);
                delivered += 1;
            }
            Err(e) => warn!(
                "Failed to deliver alert for {} {}: {}",
                market, alert.category, e
            ),
        }
    }
    delivered
}
