use crate::models::Dataset;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP session and retry defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Applies to the HTML finance pages only; the JSON listing has no timeout.
    #[serde(default = "default_html_timeout_secs")]
    pub html_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_pause_secs")]
    pub pause_secs: f64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_listing_delay_ms")]
    pub listing_delay_ms: u64,

    /// Fallback encoding when the finance pages don't declare one.
    #[serde(default = "default_charset")]
    pub charset: String,

    /// One entry is picked at client construction.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

/// Source URL templates.
///
/// Finance templates take `{year}`, `{quarter}`, `{page}` and `{page_size}`;
/// the listing template takes `{page}` and `{timestamp}` (epoch millis).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default = "default_report_url")]
    pub report: String,
    #[serde(default = "default_profit_url")]
    pub profit: String,
    #[serde(default = "default_operation_url")]
    pub operation: String,
    #[serde(default = "default_growth_url")]
    pub growth: String,
    #[serde(default = "default_debt_paying_url")]
    pub debt_paying: String,
    #[serde(default = "default_cash_flow_url")]
    pub cash_flow: String,

    /// Visited once to obtain the session cookie the listing requires.
    #[serde(default = "default_listing_home")]
    pub listing_home: String,
    #[serde(default = "default_listing_url")]
    pub listing: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

const FINANCE_BASE: &str = "http://vip.stock.finance.sina.com.cn/q/go.php/vFinanceAnalyze/kind";
const FINANCE_QUERY: &str =
    "index.phtml?s_i=&s_a=&s_c=&reportdate={year}&quarter={quarter}&p={page}&num={page_size}";

fn finance_url(kind: &str) -> String {
    format!("{}/{}/{}", FINANCE_BASE, kind, FINANCE_QUERY)
}

fn default_html_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_pause_secs() -> f64 {
    0.001
}
fn default_page_size() -> u32 {
    60
}
fn default_listing_delay_ms() -> u64 {
    1000
}
fn default_charset() -> String {
    "gbk".to_string()
}
fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95",
        "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/68.0.3440.106 Safari/537.36",
        "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:34.0) Gecko/20100101 Firefox/34.0",
        "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:69.0) Gecko/20100101 Firefox/69.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_headers() -> BTreeMap<String, String> {
    [
        ("Accept", "*/*"),
        ("Accept-Language", "zh-CN,zh;q=0.9"),
        ("Cache-Control", "max-age=0"),
        ("Upgrade-Insecure-Requests", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
fn default_report_url() -> String {
    finance_url("mainindex")
}
fn default_profit_url() -> String {
    finance_url("profit")
}
fn default_operation_url() -> String {
    finance_url("operation")
}
fn default_growth_url() -> String {
    finance_url("grow")
}
fn default_debt_paying_url() -> String {
    finance_url("debtpaying")
}
fn default_cash_flow_url() -> String {
    finance_url("cashflow")
}
fn default_listing_home() -> String {
    "https://xueqiu.com".to_string()
}
fn default_listing_url() -> String {
    "https://xueqiu.com/service/v5/stock/screener/quote/list?page={page}&size=90&order=desc\
     &orderby=percent&order_by=percent&market=CN&type=sh_sz&_={timestamp}"
        .to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            html_timeout_secs: default_html_timeout_secs(),
            max_retries: default_max_retries(),
            pause_secs: default_pause_secs(),
            page_size: default_page_size(),
            listing_delay_ms: default_listing_delay_ms(),
            charset: default_charset(),
            user_agents: default_user_agents(),
            headers: default_headers(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            report: default_report_url(),
            profit: default_profit_url(),
            operation: default_operation_url(),
            growth: default_growth_url(),
            debt_paying: default_debt_paying_url(),
            cash_flow: default_cash_flow_url(),
            listing_home: default_listing_home(),
            listing: default_listing_url(),
        }
    }
}

impl ScraperConfig {
    pub fn html_timeout(&self) -> Duration {
        Duration::from_secs(self.html_timeout_secs)
    }

    pub fn listing_delay(&self) -> Duration {
        Duration::from_millis(self.listing_delay_ms)
    }
}

impl EndpointConfig {
    pub fn template(&self, dataset: Dataset) -> &str {
        match dataset {
            Dataset::Report => &self.report,
            Dataset::Profit => &self.profit,
            Dataset::Operation => &self.operation,
            Dataset::Growth => &self.growth,
            Dataset::DebtPaying => &self.debt_paying,
            Dataset::CashFlow => &self.cash_flow,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("STOCKINFO").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.scraper.pause_secs.is_finite() && self.scraper.pause_secs >= 0.0,
            "scraper.pause_secs must be a non-negative number, got {}",
            self.scraper.pause_secs
        );
        anyhow::ensure!(self.scraper.page_size > 0, "scraper.page_size must be positive");
        Ok(())
    }
}
