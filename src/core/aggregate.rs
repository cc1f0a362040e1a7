//! Tiered aggregation of a holdings table into per-category allocation.
//!
//! Every holding is valued on its own, summed into one of the five
//! categories, and each category's share of the grand total is compared
//! against its target band.
use crate::core::holding::{Category, Holding};
use crate::core::resolver::{PriceResolver, PriceSource, Resolution, is_cash_code};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// Core categories share an 85% allocation evenly.
pub const CORE_TARGET: f64 = 21.25;
pub const CORE_MIN: f64 = 16.25;
pub const CORE_MAX: f64 = 26.25;

pub const SATELLITE_TARGET: f64 = 15.0;
pub const SATELLITE_MIN: f64 = 13.0;
pub const SATELLITE_MAX: f64 = 17.0;

/// Manual values above this on a cash row are read as a total balance.
pub const CASH_BALANCE_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Under the band; buy signal.
    Low,
    /// Over the band; sell signal.
    High,
    Normal,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Low => "🔴 Low (buy)",
            Status::High => "🟠 High (sell)",
            Status::Normal => "✅ Normal",
        }
    }

    pub fn needs_attention(&self) -> bool {
        !matches!(self, Status::Normal)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBand {
    pub target: f64,
    pub min: f64,
    pub max: f64,
}

impl TargetBand {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Satellite => TargetBand {
                target: SATELLITE_TARGET,
                min: SATELLITE_MIN,
                max: SATELLITE_MAX,
            },
            _ => TargetBand {
                target: CORE_TARGET,
                min: CORE_MIN,
                max: CORE_MAX,
            },
        }
    }

    /// Bounds are inclusive: a percentage equal to `min` or `max` is Normal.
    pub fn classify(&self, percentage: f64) -> Status {
        if percentage < self.min {
            Status::Low
        } else if percentage > self.max {
            Status::High
        } else {
            Status::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAggregate {
    pub category: Category,
    pub total_value: f64,
    pub composition: Vec<String>,
    pub percentage: f64,
    pub target: f64,
    pub min: f64,
    pub max: f64,
    pub status: Status,
}

impl CategoryAggregate {
    pub fn composition_line(&self) -> String {
        self.composition.join(" | ")
    }
}

/// Something that was wrong with a row and got zeroed or skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIssue {
    InvalidShares(f64),
    InvalidPrice(f64),
    InvalidValue(f64),
    UnknownCategory(String),
}

/// How one holding was valued.
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub name: String,
    pub code: String,
    pub category: Option<Category>,
    pub price: f64,
    pub market_value: f64,
    pub source: PriceSource,
    pub cash_balance: bool,
    pub issues: Vec<RowIssue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    /// Divisor used for percentages; `1` when nothing has value.
    pub grand_total: f64,
    /// Actual sum of market values.
    pub invested_total: f64,
    pub alerts: Vec<CategoryAggregate>,
    pub rows: Vec<RowReport>,
}

impl PortfolioSnapshot {
    pub fn alert(&self, category: Category) -> Option<&CategoryAggregate> {
        self.alerts.iter().find(|a| a.category == category)
    }

    /// Rows whose price could not be obtained at all.
    pub fn failed_rows(&self) -> impl Iterator<Item = &RowReport> {
        self.rows
            .iter()
            .filter(|r| matches!(r.source, PriceSource::Failed(_)))
    }
}

/// A holding paired with its resolved unit price.
#[derive(Debug, Clone)]
pub struct PricedHolding<'a> {
    pub holding: &'a Holding,
    pub resolution: Resolution,
}

/// Cash rows may carry their whole balance in the manual price field.
///
/// Returns the market value to use when `code` is cash-like and `manual`
/// exceeds [`CASH_BALANCE_THRESHOLD`], otherwise `None` and the row is valued
/// as shares times price.
pub fn cash_balance_override(code: &str, manual: Option<f64>) -> Option<f64> {
    manual.filter(|m| is_cash_code(code) && *m > CASH_BALANCE_THRESHOLD)
}

/// Formats a value with thousands separators and no decimals.
pub fn format_amount(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && rounded != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn sanitize(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn value_row(priced: &PricedHolding<'_>) -> RowReport {
    let holding = priced.holding;
    let mut issues = Vec::new();

    let price = sanitize(priced.resolution.price).unwrap_or_else(|| {
        issues.push(RowIssue::InvalidPrice(priced.resolution.price));
        0.0
    });
    let shares = sanitize(holding.shares).unwrap_or_else(|| {
        issues.push(RowIssue::InvalidShares(holding.shares));
        0.0
    });

    let (price, market_value, cash_balance) =
        match cash_balance_override(&holding.code, holding.manual_price) {
            Some(balance) => (1.0, balance, true),
            None => (price, shares * price, false),
        };
    let market_value = sanitize(market_value).unwrap_or_else(|| {
        issues.push(RowIssue::InvalidValue(market_value));
        0.0
    });

    let category = holding.category();
    if category.is_none() {
        issues.push(RowIssue::UnknownCategory(holding.category.clone()));
    }

    RowReport {
        name: holding.name.clone(),
        code: holding.code.clone(),
        category,
        price,
        market_value,
        source: priced.resolution.source.clone(),
        cash_balance,
        issues,
    }
}

/// Aggregates priced holdings into the five category buckets.
///
/// Rows with an unrecognised category still count toward the grand total but
/// appear in no bucket, so the category percentages then sum to less than 100.
pub fn aggregate(rows: &[PricedHolding<'_>], currency_symbol: &str) -> PortfolioSnapshot {
    let mut buckets: HashMap<Category, (f64, Vec<String>)> = Category::ALL
        .into_iter()
        .map(|c| (c, (0.0, Vec::new())))
        .collect();
    let mut invested_total = 0.0;
    let mut reports = Vec::with_capacity(rows.len());

    for priced in rows {
        let report = value_row(priced);
        if !report.issues.is_empty() {
            warn!(
                "Row {} ({}) had issues: {:?}",
                report.name, report.code, report.issues
            );
        }

        invested_total += report.market_value;
        if let Some((total, items)) = report.category.and_then(|c| buckets.get_mut(&c)) {
            *total += report.market_value;
            items.push(format!(
                "{}: {}{}",
                report.name,
                currency_symbol,
                format_amount(report.market_value)
            ));
        }
        reports.push(report);
    }

    let grand_total = if invested_total == 0.0 {
        1.0
    } else {
        invested_total
    };
    debug!("Aggregated {} rows, total {}", rows.len(), invested_total);

    let alerts = Category::ALL
        .into_iter()
        .map(|category| {
            let (total_value, composition) = buckets.remove(&category).unwrap_or_default();
            let percentage = total_value / grand_total * 100.0;
            let band = TargetBand::for_category(category);
            CategoryAggregate {
                category,
                total_value,
                composition,
                percentage,
                target: band.target,
                min: band.min,
                max: band.max,
                status: band.classify(percentage),
            }
        })
        .collect();

    PortfolioSnapshot {
        grand_total,
        invested_total,
        alerts,
        rows: reports,
    }
}

/// Resolves every holding's price, then aggregates.
pub async fn evaluate(
    holdings: &[Holding],
    resolver: &PriceResolver,
    currency_symbol: &str,
) -> PortfolioSnapshot {
    let mut priced = Vec::with_capacity(holdings.len());
    for holding in holdings {
        let resolution = resolver
            .resolve_detailed(&holding.code, holding.manual_price)
            .await;
        priced.push(PricedHolding {
            holding,
            resolution,
        });
    }
    aggregate(&priced, currency_symbol)
}
