//! `StockInfo`: the caller-facing entry point.
//!
//! ## Datasets
//!
//! Six quarterly finance-analysis tables (main index, profitability,
//! operation, growth, debt paying, cash flow) are scraped from paginated HTML.
//! Each call validates `(year, quarter)` first: an invalid pair makes no
//! request and yields `Ok(None)`.
//!
//! The listed-company profile snapshot comes from a JSON screener instead and
//! takes no query parameters.

use crate::config::{AppConfig, EndpointConfig, ScraperConfig};
use crate::error::Result;
use crate::models::{Dataset, ReportQuery, ResultTable};
use crate::scraper::cleaner::{CODE_WIDTH, zero_pad};
use crate::scraper::{HttpClient, PageRequest, ProfileFetcher, RetryPolicy, TableFetcher, Transport};
use crate::utils::Timer;
use anyhow::Context;
use tracing::warn;

pub struct StockInfo<T: Transport = HttpClient> {
    transport: T,
    scraper: ScraperConfig,
    endpoints: EndpointConfig,
}

impl StockInfo<HttpClient> {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let transport = HttpClient::new(&config.scraper).context("Failed to build scraper")?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> StockInfo<T> {
    pub fn with_transport(transport: T, config: &AppConfig) -> Self {
        Self {
            transport,
            scraper: config.scraper.clone(),
            endpoints: config.endpoints.clone(),
        }
    }

    /// Retry budget from configuration, for callers with no override.
    pub fn default_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.scraper)
    }

    /// Fetch every page of `dataset` for one reporting quarter.
    pub async fn financial(
        &self,
        dataset: Dataset,
        year: i32,
        quarter: i32,
        policy: &RetryPolicy,
    ) -> Result<Option<ResultTable>> {
        let Some(query) = ReportQuery::new(year, quarter) else {
            warn!(
                "Rejected {} query: year {} quarter {} (quarter must be 1-4, year >= 1989)",
                dataset, year, quarter
            );
            return Ok(None);
        };

        let _t = Timer::start(format!("{} {}", dataset, query));
        let shape = dataset.shape();
        let request = PageRequest {
            label: dataset.name(),
            template: self.endpoints.template(dataset),
            query,
            start_page: 1,
            page_size: self.scraper.page_size,
            shape: &shape,
        };

        let mut table = TableFetcher::new(&self.transport, &self.scraper.charset)
            .fetch(&request, policy)
            .await?;
        table.map_column("code", |v| zero_pad(v, CODE_WIDTH));
        Ok(Some(table))
    }

    /// Main financial indicators: eps, bvps, roe, net profits, distribution plan.
    pub async fn report(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::Report, year, quarter, policy).await
    }

    /// Profitability: roe, net and gross margins, business income.
    pub async fn profit(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::Profit, year, quarter, policy).await
    }

    /// Operating efficiency: receivable, inventory and current-asset turnover.
    pub async fn operation(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::Operation, year, quarter, policy).await
    }

    pub async fn growth(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::Growth, year, quarter, policy).await
    }

    /// Solvency ratios.
    pub async fn debt_paying(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::DebtPaying, year, quarter, policy).await
    }

    pub async fn cash_flow(&self, year: i32, quarter: i32, policy: &RetryPolicy) -> Result<Option<ResultTable>> {
        self.financial(Dataset::CashFlow, year, quarter, policy).await
    }

    /// Screener snapshot of every listed company. `issue_date_ts` is in seconds.
    pub async fn stock_profiles(&self, policy: &RetryPolicy) -> Result<ResultTable> {
        let _t = Timer::start("stock profiles");
        ProfileFetcher::new(
            &self.transport,
            &self.endpoints.listing_home,
            &self.endpoints.listing,
            self.scraper.listing_delay(),
        )
        .fetch(policy)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{REPORT_COLUMNS, Value};
    use crate::scraper::fixtures::{ScriptedTransport, profile_page, report_page};
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.endpoints.report =
            "http://fixture.test/mainindex?reportdate={year}&quarter={quarter}&p={page}&num={page_size}".into();
        cfg.endpoints.growth =
            "http://fixture.test/grow?reportdate={year}&quarter={quarter}&p={page}&num={page_size}".into();
        cfg.endpoints.listing_home = "http://listing.test/".into();
        cfg.endpoints.listing = "http://listing.test/list?page={page}&_={timestamp}".into();
        cfg.scraper.listing_delay_ms = 0;
        cfg
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_report_two_pages() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "http://fixture.test/mainindex?reportdate=2018&quarter=3&p=1&num=60",
            report_page(0, 60, Some(2)),
        );
        transport.respond(
            "http://fixture.test/mainindex?reportdate=2018&quarter=3&p=2&num=60",
            report_page(60, 15, None),
        );
        let info = StockInfo::with_transport(transport, &config());

        let table = assert_ok!(info.report(2018, 3, &policy()).await).expect("valid quarter");

        assert_eq!(table.len(), 75);
        assert_eq!(table.columns().names(), REPORT_COLUMNS);
        assert_eq!(table.get(0, "code").and_then(Value::as_str), Some("000001"));
        assert_eq!(table.get(74, "code").and_then(Value::as_str), Some("000075"));
        assert_eq!(table.get(3, "eps_yoy"), Some(&Value::Empty));
        assert_eq!(table.get(3, "roe"), Some(&Value::Number(12.5)));
        assert_eq!(
            table.get(3, "report_date").and_then(Value::as_str),
            Some("2018-10-30")
        );
    }

    #[tokio::test]
    async fn test_invalid_quarter_makes_no_request() {
        let info = StockInfo::with_transport(ScriptedTransport::new(), &config());

        for (year, quarter) in [(2018, 0), (2018, 5), (1988, 2), (2018, -1)] {
            assert!(assert_ok!(info.report(year, quarter, &policy()).await).is_none());
            assert!(assert_ok!(info.growth(year, quarter, &policy()).await).is_none());
        }
        assert_eq!(info.transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let info = StockInfo::with_transport(ScriptedTransport::new(), &config());
        let res = info.growth(2018, 3, &policy()).await;
        assert!(matches!(res, Err(crate::FetchError::Network { attempts: 3, .. })));
        assert_eq!(info.transport.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_stock_profiles() {
        let transport = ScriptedTransport::new();
        transport.respond_prefix("http://listing.test/list?page=1&", profile_page(0, 2));
        transport.respond_prefix("http://listing.test/list?page=2&", profile_page(2, 0));
        let info = StockInfo::with_transport(transport, &config());

        let table = assert_ok!(info.stock_profiles(&policy()).await);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "symbol").and_then(Value::as_str), Some("SH600001"));
        assert_eq!(table.get(1, "market_capital"), Some(&Value::Number(1.5e10)));
    }

    #[test]
    fn test_default_policy_follows_config() {
        let mut cfg = config();
        cfg.scraper.max_retries = 7;
        cfg.scraper.pause_secs = 0.5;
        let info = StockInfo::with_transport(ScriptedTransport::new(), &cfg);
        assert_eq!(info.default_policy(), RetryPolicy::new(7, Duration::from_millis(500)));
    }
}
