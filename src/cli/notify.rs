use super::ui::{self, StyleType};
use crate::core::aggregate::Status;
use crate::core::alert::{Notification, Notifier};
use anyhow::Result;

/// Prints alerts to the terminal.
pub struct ConsoleNotifier;

pub fn format_notification(notification: &Notification) -> String {
    format!(
        "⚠️ {} alert: {} - {} (current {:.2}%)",
        notification.market,
        notification.category,
        notification.action(),
        notification.percentage
    )
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        let style_type = match notification.status {
            Status::Low => StyleType::Error,
            _ => StyleType::Warning,
        };
        println!(
            "{}",
            ui::style_text(&format_notification(notification), style_type)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::holding::{Category, Market};

    #[test]
    fn test_format_notification() {
        let notification = Notification {
            market: Market::Cn,
            category: Category::Gold,
            status: Status::Low,
            percentage: 9.876,
        };
        assert_eq!(
            format_notification(&notification),
            "⚠️ CN Market alert: Gold (黄金) - buy signal (current 9.88%)"
        );
    }
}
