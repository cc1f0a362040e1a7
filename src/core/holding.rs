//! Holdings, asset categories and markets

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The five allocation buckets, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Category {
    Stock,
    Bond,
    Gold,
    Cash,
    Satellite,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Stock,
        Category::Bond,
        Category::Gold,
        Category::Cash,
        Category::Satellite,
    ];

    /// Label as written to the holdings file.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Stock => "Stock (权益)",
            Category::Bond => "Bond (长债)",
            Category::Gold => "Gold (黄金)",
            Category::Cash => "Cash (现金)",
            Category::Satellite => "Satellite (卫星)",
        }
    }

    fn short_name(&self) -> &'static str {
        match self {
            Category::Stock => "stock",
            Category::Bond => "bond",
            Category::Gold => "gold",
            Category::Cash => "cash",
            Category::Satellite => "satellite",
        }
    }

    /// Parses a stored label. Returns `None` for anything outside the five buckets.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL.into_iter().find(|c| {
            c.label() == label || c.short_name().eq_ignore_ascii_case(label)
        })
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Market {
    Us,
    Cn,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::Us, Market::Cn];

    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Market::Us => "$",
            Market::Cn => "¥",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Market::Us => "US Market",
            Market::Cn => "CN Market",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Market::Us => "us_data.csv",
            Market::Cn => "cn_data.csv",
        }
    }

    /// Starter table used when nothing has been saved yet.
    pub fn seed_holdings(&self) -> Vec<Holding> {
        use Category::*;
        match self {
            Market::Us => vec![
                Holding::new(Stock, "标普500", "SPY"),
                Holding::new(Stock, "全美市场", "VTI"),
                Holding::new(Bond, "20年美债", "TLT"),
                Holding::new(Bond, "抗通胀债", "TIP"),
                Holding::new(Cash, "短债(SHV)", "SHV"),
                Holding::new(Cash, "美元余额", "CASH_USD").with_position(1.0, Some(0.0)),
                Holding::new(Gold, "黄金GLD", "GLD"),
                Holding::new(Satellite, "谷歌GOOG", "GOOG"),
            ],
            Market::Cn => vec![
                Holding::new(Stock, "易方达300(场外)", "110020"),
                Holding::new(Stock, "300ETF(场内)", "510300.SS"),
                Holding::new(Bond, "10年长债", "511260.SS"),
                Holding::new(Bond, "政金债", "511520.SS"),
                Holding::new(Bond, "30年长债", "511090.SS"),
                Holding::new(Cash, "银华日利(货基)", "511880.SS"),
                Holding::new(Cash, "人民币余额", "CASH_CNY").with_position(1.0, Some(0.0)),
                Holding::new(Gold, "华安黄金(场外)", "000216"),
                Holding::new(Gold, "黄金ETF(场内)", "518880.SS"),
                Holding::new(Satellite, "恒瑞医药", "600276.SS"),
                Holding::new(Satellite, "迈瑞医疗", "300760.SZ"),
            ],
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "US" => Ok(Market::Us),
            "CN" => Ok(Market::Cn),
            _ => Err(anyhow!("Invalid market: {}", s)),
        }
    }
}

/// One row of a market's holdings table.
///
/// Deserialization is lenient: an unparsable `shares` reads as `0` and an
/// unparsable `manual_price` as no override, so one bad cell never drops the
/// whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(default, deserialize_with = "trimmed")]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_shares")]
    pub shares: f64,
    #[serde(default, deserialize_with = "lenient_price")]
    pub manual_price: Option<f64>,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn lenient_shares<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().unwrap_or(0.0))
}

fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan()))
}

impl Holding {
    pub fn new(category: Category, name: &str, code: &str) -> Self {
        Holding {
            category: category.label().to_string(),
            name: name.to_string(),
            code: code.to_string(),
            shares: 0.0,
            manual_price: None,
        }
    }

    pub fn with_position(mut self, shares: f64, manual_price: Option<f64>) -> Self {
        self.shares = shares;
        self.manual_price = manual_price;
        self
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_label(&self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("Stock (权益)"), Some(Category::Stock));
        assert_eq!(Category::from_label(" satellite "), Some(Category::Satellite));
        assert_eq!(Category::from_label("GOLD"), Some(Category::Gold));
        assert_eq!(Category::from_label("Crypto"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
    }

    #[test]
    fn test_market_from_str() {
        assert_eq!("us".parse::<Market>().unwrap(), Market::Us);
        assert_eq!("CN".parse::<Market>().unwrap(), Market::Cn);
        assert!("eu".parse::<Market>().is_err());
    }

    #[test]
    fn test_seed_holdings_use_known_categories() {
        for market in Market::ALL {
            let seed = market.seed_holdings();
            assert!(!seed.is_empty());
            assert!(seed.iter().all(|h| h.category().is_some()));
        }
        let cn = Market::Cn.seed_holdings();
        let cash = cn.iter().find(|h| h.code == "CASH_CNY").unwrap();
        assert_eq!(cash.shares, 1.0);
        assert_eq!(cash.manual_price, Some(0.0));
        assert_eq!(Market::Us.seed_holdings().len(), 8);
        assert_eq!(cn.len(), 11);
    }
}
