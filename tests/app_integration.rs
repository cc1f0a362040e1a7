use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tierfolio::cli::holdings::HoldingsEdit;
use tierfolio::core::aggregate::{Status, evaluate};
use tierfolio::core::holding::{Category, Holding, Market};
use tierfolio::core::resolver::{PriceResolver, PriceSource};
use tierfolio::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
use tierfolio::store::file::CsvHoldingsStore;
use tierfolio::store::{HoldingsRepository, LoadSource};
use tierfolio::{AppCommand, run_command};
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn chart_body(price: f64) -> String {
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "regularMarketPrice": {price}, "currency": "USD" }},
                        "indicators": {{ "quote": [{{ "close": [{price}] }}] }}
                    }}]
                }}
            }}"#
        )
    }

    /// Serves the given prices; every other chart request gets an empty result.
    pub async fn create_mock_server(prices: &[(&str, f64)]) -> MockServer {
        let mock_server = MockServer::start().await;
        for (symbol, price) in prices {
            Mock::given(method("GET"))
                .and(path(format!("/v8/finance/chart/{symbol}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(chart_body(*price)))
                .with_priority(1)
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path_regex(r"^/v8/finance/chart/.*$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"chart": {"result": []}}"#),
            )
            .with_priority(10)
            .mount(&mock_server)
            .await;
        mock_server
    }
}

fn write_config(dir: &TempDir, base_url: &str) -> String {
    let config_path = dir.path().join("config.yaml");
    let config_content = format!(
        r#"
providers:
  yahoo:
    base_url: "{}"
request_timeout_secs: 2
retries: 0
data_path: "{}"
"#,
        base_url,
        dir.path().join("data").display()
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_string_lossy().to_string()
}

fn resolver_for(base_url: &str) -> PriceResolver {
    PriceResolver::new(
        Arc::new(YahooFinanceProvider::new(base_url, 0)),
        Arc::new(YahooCurrencyProvider::new(base_url, 0)),
    )
}

#[test_log::test(tokio::test)]
async fn test_us_portfolio_against_mock_oracle() {
    let mock_server = test_utils::create_mock_server(&[
        ("SPY", 100.0),
        ("TLT", 50.0),
        ("GLD", 200.0),
        ("GOOG", 150.0),
    ])
    .await;
    let resolver = resolver_for(&mock_server.uri());

    let holdings = vec![
        Holding::new(Category::Stock, "S&P 500", "SPY").with_position(30.0, None),
        Holding::new(Category::Bond, "20y Treasury", "TLT").with_position(40.0, None),
        Holding::new(Category::Gold, "Gold", "GLD").with_position(10.0, None),
        Holding::new(Category::Cash, "USD balance", "CASH_USD").with_position(1.0, Some(1500.0)),
        Holding::new(Category::Satellite, "Google", "GOOG").with_position(10.0, None),
        Holding::new(Category::Satellite, "Delisted", "FAKE123").with_position(10.0, None),
    ];

    let snapshot = evaluate(&holdings, &resolver, "$").await;
    info!(?snapshot.alerts, "Evaluated mock portfolio");

    // 3000 + 2000 + 2000 + 1500 + 1500 + 0
    assert_eq!(snapshot.grand_total, 10000.0);
    let pct = |c| snapshot.alert(c).unwrap().percentage;
    assert_eq!(pct(Category::Stock), 30.0);
    assert_eq!(pct(Category::Bond), 20.0);
    assert_eq!(pct(Category::Gold), 20.0);
    assert_eq!(pct(Category::Cash), 15.0);
    assert_eq!(pct(Category::Satellite), 15.0);

    let status = |c| snapshot.alert(c).unwrap().status;
    assert_eq!(status(Category::Stock), Status::High);
    assert_eq!(status(Category::Bond), Status::Normal);
    assert_eq!(status(Category::Cash), Status::Low);
    assert_eq!(status(Category::Satellite), Status::Normal);

    assert_eq!(
        snapshot.alert(Category::Satellite).unwrap().composition,
        vec!["Google: $1,500".to_string(), "Delisted: $0".to_string()]
    );
    let failed: Vec<_> = snapshot.failed_rows().map(|r| r.code.as_str()).collect();
    assert_eq!(failed, vec!["FAKE123"]);
    assert_eq!(snapshot.rows[3].source, PriceSource::Manual);
    assert!(snapshot.rows[3].cash_balance);
}

#[test_log::test(tokio::test)]
async fn test_exchange_rate_default_when_oracle_has_nothing() {
    let mock_server = test_utils::create_mock_server(&[]).await;
    let resolver = resolver_for(&mock_server.uri());

    assert_eq!(resolver.usd_cny().await, 7.25);

    let mock_server = test_utils::create_mock_server(&[("USDCNY=X", 7.1)]).await;
    let resolver = resolver_for(&mock_server.uri());
    assert_eq!(resolver.usd_cny().await, 7.1);
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_mock_server(&[
        ("SPY", 500.0),
        ("510300.SS", 4.0),
        ("600276.SS", 56.0),
        ("300760.SZ", 200.0),
        ("USDCNY=X", 7.2),
    ])
    .await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(&dir, &mock_server.uri());

    let edits = [
        (
            Market::Us,
            HoldingsEdit::SetShares {
                code: "SPY".to_string(),
                shares: 4.0,
            },
        ),
        (
            Market::Cn,
            HoldingsEdit::SetShares {
                code: "510300.SS".to_string(),
                shares: 1000.0,
            },
        ),
        (
            Market::Cn,
            HoldingsEdit::SetPrice {
                code: "CASH_CNY".to_string(),
                price: Some(20000.0),
            },
        ),
    ];
    for (market, edit) in edits {
        let result = run_command(AppCommand::Holdings(market, edit), Some(&config_path)).await;
        assert!(result.is_ok(), "Holdings edit failed with: {:?}", result.err());
    }

    for command in [
        AppCommand::Alloc(None),
        AppCommand::Alloc(Some(Market::Cn)),
        AppCommand::Summary,
        AppCommand::Tactical,
    ] {
        let result = run_command(command.clone(), Some(&config_path)).await;
        assert!(
            result.is_ok(),
            "{command:?} failed with: {:?}",
            result.err()
        );
    }

    let store = Arc::new(CsvHoldingsStore::new(dir.path().join("data")));
    let cn = HoldingsRepository::open(store.clone(), Market::Cn);
    assert_eq!(cn.source(), LoadSource::Loaded);
    let cash = cn.holdings().iter().find(|h| h.code == "CASH_CNY").unwrap();
    assert_eq!(cash.manual_price, Some(20000.0));

    let us = HoldingsRepository::open(store, Market::Us);
    assert_eq!(us.holdings()[0].shares, 4.0);
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_fails() {
    let result = run_command(AppCommand::Summary, Some("/nonexistent/tierfolio.yaml")).await;
    assert!(result.is_err());
}
