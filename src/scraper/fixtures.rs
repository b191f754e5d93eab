//! Scripted transport and synthetic pages for fetcher tests.

use super::http_client::Transport;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

struct Script {
    key: String,
    exact: bool,
    replies: VecDeque<Result<String>>,
}

/// Serves queued replies per URL. Unscripted URLs answer HTTP 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<String>>,
    visits: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, key: &str, exact: bool, reply: Result<String>) {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.iter_mut().find(|s| s.key == key && s.exact == exact) {
            Some(script) => script.replies.push_back(reply),
            None => scripts.push(Script {
                key: key.to_string(),
                exact,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    pub fn respond(&self, url: &str, body: impl Into<String>) {
        self.push(url, true, Ok(body.into()));
    }

    /// For URLs carrying a timestamp.
    pub fn respond_prefix(&self, prefix: &str, body: impl Into<String>) {
        self.push(prefix, false, Ok(body.into()));
    }

    pub fn fail(&self, url: &str, times: usize) {
        for _ in 0..times {
            self.push(
                url,
                true,
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                }),
            );
        }
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn visits(&self) -> usize {
        *self.visits.lock().unwrap()
    }

    fn next_reply(&self, url: &Url) -> Result<String> {
        let url = url.as_str();
        self.calls.lock().unwrap().push(url.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .iter_mut()
            .find(|s| if s.exact { s.key == url } else { url.starts_with(&s.key) })
            .and_then(|s| s.replies.pop_front())
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_text(&self, url: &Url, _charset: &str) -> Result<String> {
        self.next_reply(url)
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value> {
        let body = self.next_reply(url)?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn visit(&self, _url: &Url) -> Result<()> {
        *self.visits.lock().unwrap() += 1;
        Ok(())
    }
}

/// A main-index page: header row, `rows` rows of 12 cells with codes
/// `first + 1 ..`, "--" in the eps_yoy column, and a pager.
pub(crate) fn report_page(first: usize, rows: usize, next: Option<u32>) -> String {
    let mut html = String::from(
        r#"<html><head><meta charset="gbk"></head><body>
<table class="list_table" id="dataTable">
<tr><th>股票代码</th><th>股票名称</th><th>每股收益</th><th>每股收益同比</th><th>每股净资产</th>
<th>净资产收益率</th><th>每股现金流量</th><th>净利润</th><th>净利润同比</th><th>分配方案</th>
<th>发布日期</th><th>详细</th></tr>
"#,
    );

    for i in first..first + rows {
        html.push_str(&format!(
            "<tr><td><a href=\"/corp/{code:06}\">{code:06}</a></td><td>公司{code}</td>\
             <td>0.52</td><td>--</td><td>3.10</td><td>12.5</td><td>0.8</td><td>1234.56</td>\
             <td>5.2</td><td>10派1</td><td>2018-10-30</td><td><a href=\"#\">明细</a></td></tr>\n",
            code = i + 1
        ));
    }
    html.push_str("</table>\n<div class=\"pages\"><a onclick=\"set_page_num('1')\">首页</a>");
    match next {
        Some(n) => html.push_str(&format!("<a onclick=\"set_page_num('{}')\">下一页</a>", n)),
        None => html.push_str("<a>尾页</a>"),
    }
    html.push_str("</div></body></html>");
    html
}

/// A screener listing page with `rows` items numbered from `first`.
pub(crate) fn profile_page(first: usize, rows: usize) -> String {
    let list: Vec<serde_json::Value> = (first..first + rows)
        .map(|i| {
            serde_json::json!({
                "symbol": format!("SH{:06}", 600_000 + i),
                "name": format!("公司{}", i),
                "current": 10.5,
                "pb": 1.2,
                "issue_date_ts": 1_000_000_000_123u64,
                "market_capital": 1.5e10
            })
        })
        .collect();
    let count = list.len();
    serde_json::json!({"data": {"count": count, "list": list}, "error_code": 0}).to_string()
}
