pub mod cleaner;
pub mod http_client;
pub mod parsers;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::config::ScraperConfig;
use crate::error::{FetchError, Result};
use crate::models::{ColumnSchema, PROFILE_COLUMNS, ReportQuery, ResultTable, TableShape, Value};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, info, warn};
use url::Url;

pub use self::http_client::{HttpClient, Transport};
use self::parsers::{ParsedPage, parse_profile_page, parse_report_page};

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Per-call retry budget: attempts per page and the pause before each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, pause: Duration) -> Self {
        Self { max_retries, pause }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        let pause = Duration::try_from_secs_f64(config.pause_secs).unwrap_or_default();
        Self::new(config.max_retries, pause)
    }
}

/// Run `attempt` up to `policy.max_retries` times, pausing before each try.
///
/// Only transient failures are retried. Once the budget is spent the last
/// failure is wrapped in a terminal [`FetchError::Network`].
pub async fn with_retry<T, F, Fut>(url: &Url, policy: &RetryPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if policy.max_retries == 0 {
        return Err(FetchError::Network {
            url: url.to_string(),
            attempts: 0,
            last: "retry budget is zero".into(),
        });
    }

    sleep(policy.pause).await;
    let strategy = FixedInterval::new(policy.pause).take(policy.max_retries as usize - 1);

    let mut tries = 0u32;
    let outcome = RetryIf::start(
        strategy,
        || {
            tries += 1;
            let n = tries;
            let fut = attempt();
            async move {
                let res = fut.await;
                if let Err(e) = &res {
                    warn!("Attempt {} for {} failed: {}", n, url, e);
                }
                res
            }
        },
        |e: &FetchError| e.is_transient(),
    )
    .await;

    match outcome {
        Err(e) if e.is_transient() => Err(FetchError::Network {
            url: url.to_string(),
            attempts: policy.max_retries,
            last: e.to_string(),
        }),
        other => other,
    }
}

/// Substitute `{key}` placeholders and parse the result.
pub fn render_url(template: &str, vars: &[(&str, String)]) -> Result<Url> {
    let rendered = vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    });
    Url::parse(&rendered).map_err(|source| FetchError::Url {
        url: rendered,
        source,
    })
}

// ── Finance tables ────────────────────────────────────────────────────────────

/// One paginated finance query.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    /// Name used in log lines, e.g. "profit".
    pub label: &'a str,
    pub template: &'a str,
    pub query: ReportQuery,
    pub start_page: u32,
    pub page_size: u32,
    pub shape: &'a TableShape,
}

impl PageRequest<'_> {
    fn url(&self, page: u32) -> Result<Url> {
        render_url(
            self.template,
            &[
                ("year", self.query.year().to_string()),
                ("quarter", self.query.quarter().to_string()),
                ("page", page.to_string()),
                ("page_size", self.page_size.to_string()),
            ],
        )
    }
}

/// Walks the pager of a finance HTML table, page by page.
pub struct TableFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    charset: &'a str,
}

impl<'a, T: Transport + ?Sized> TableFetcher<'a, T> {
    pub fn new(transport: &'a T, charset: &'a str) -> Self {
        Self { transport, charset }
    }

    /// Collect every page from `request.start_page` until the pager runs out.
    ///
    /// A page that exhausts its retry budget aborts the whole query; rows
    /// already collected are discarded.
    pub async fn fetch(&self, request: &PageRequest<'_>, policy: &RetryPolicy) -> Result<ResultTable> {
        let mut table = ResultTable::new(request.shape.schema().clone());
        let mut page = request.start_page;

        loop {
            let url = request.url(page)?;
            let parsed = with_retry(&url, policy, || self.fetch_page(&url, request.shape)).await?;

            if parsed.rows.is_empty() {
                debug!("Empty page {}, stopping pagination", page);
                break;
            }

            info!("  Page {}: {} rows", page, parsed.rows.len());
            table.append(parsed.rows)?;

            match parsed.next_page {
                Some(next) if next > page => page = next,
                Some(next) => {
                    warn!("Pager on page {} points back to page {}, stopping", page, next);
                    break;
                }
                None => break,
            }
        }

        info!("{} {}: {} rows", request.label, request.query, table.len());
        Ok(table)
    }

    async fn fetch_page(&self, url: &Url, shape: &TableShape) -> Result<ParsedPage> {
        let body = self.transport.get_text(url, self.charset).await?;
        let body = cleaner::strip_placeholders(&body);
        parse_report_page(&body, shape)
    }
}

// ── Screener listing ──────────────────────────────────────────────────────────

/// Pages through the JSON stock screener until it returns an empty list.
pub struct ProfileFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    home: &'a str,
    template: &'a str,
    page_delay: Duration,
}

impl<'a, T: Transport + ?Sized> ProfileFetcher<'a, T> {
    pub fn new(transport: &'a T, home: &'a str, template: &'a str, page_delay: Duration) -> Self {
        Self {
            transport,
            home,
            template,
            page_delay,
        }
    }

    /// Each page gets the same bounded retry budget as the finance tables.
    pub async fn fetch(&self, policy: &RetryPolicy) -> Result<ResultTable> {
        let schema = ColumnSchema::from_static(PROFILE_COLUMNS);

        let home = Url::parse(self.home).map_err(|source| FetchError::Url {
            url: self.home.to_string(),
            source,
        })?;
        if let Err(e) = self.transport.visit(&home).await {
            warn!("Session priming via {} failed: {}; continuing without cookies", home, e);
        }

        let mut table = ResultTable::new(schema.clone());
        let mut page = 1u32;

        loop {
            let timestamp = Utc::now().timestamp_millis();
            let url = render_url(
                self.template,
                &[("page", page.to_string()), ("timestamp", timestamp.to_string())],
            )?;

            let rows = with_retry(&url, policy, || self.fetch_page(&url, &schema)).await?;
            if rows.is_empty() {
                debug!("Listing page {} is empty, done", page);
                break;
            }

            info!("  Listing page {}: {} rows", page, rows.len());
            table.append(rows)?;
            page += 1;
            sleep(self.page_delay).await;
        }

        table.map_column("issue_date_ts", cleaner::millis_to_secs);
        info!("Stock profiles: {} rows", table.len());
        Ok(table)
    }

    async fn fetch_page(&self, url: &Url, schema: &ColumnSchema) -> Result<Vec<Vec<Value>>> {
        let payload = self.transport.get_json(url).await?;
        parse_profile_page(&payload, schema)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
