//! Fixed price triggers for individually watched satellite positions.

use crate::core::holding::Holding;
use crate::core::resolver::PriceResolver;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    StopLoss,
    Buy,
    Hold,
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Signal::StopLoss => "Stop-loss triggered",
            Signal::Buy => "Buy signal",
            Signal::Hold => "Hold",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TacticalRule {
    pub code: &'static str,
    pub name: &'static str,
    pub stop_loss: f64,
    pub buy_below: Option<f64>,
}

/// Watched positions in the CN satellite sleeve.
pub const TACTICAL_RULES: [TacticalRule; 2] = [
    TacticalRule {
        code: "600276.SS",
        name: "恒瑞医药",
        stop_loss: 54.9,
        buy_below: Some(57.8),
    },
    TacticalRule {
        code: "300760.SZ",
        name: "迈瑞医疗",
        stop_loss: 180.0,
        buy_below: None,
    },
];

impl TacticalRule {
    /// No signal without a usable price.
    pub fn evaluate(&self, price: f64) -> Option<Signal> {
        if price.is_nan() || price <= 0.0 {
            return None;
        }
        if price <= self.stop_loss {
            return Some(Signal::StopLoss);
        }
        match self.buy_below {
            Some(level) if price <= level => Some(Signal::Buy),
            _ => Some(Signal::Hold),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TacticalReading {
    pub rule: TacticalRule,
    pub price: f64,
    pub signal: Option<Signal>,
}

/// Checks every rule against the table's first row with the matching code.
pub async fn check(holdings: &[Holding], resolver: &PriceResolver) -> Vec<TacticalReading> {
    let mut readings = Vec::with_capacity(TACTICAL_RULES.len());
    for rule in TACTICAL_RULES {
        let price = match holdings.iter().find(|h| h.code == rule.code) {
            Some(holding) => match holding.manual_price.filter(|m| *m > 0.0) {
                Some(manual) => manual,
                None => resolver.oracle_price(rule.code).await.price,
            },
            None => 0.0,
        };
        readings.push(TacticalReading {
            rule,
            price,
            signal: rule.evaluate(price),
        });
    }
    readings
}
