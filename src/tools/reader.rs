//! 网页读取：Jina Reader（远程抽取正文）或直接 HTTP 抓取 + html2text
//!
//! 直接抓取时可配置域名白名单（为空则不限制）；响应超过 max_result_chars 时截断并追加 ...[truncated]。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{key_or_env, ReaderSection};
use crate::core::AgentError;
use crate::observability::token_tracker::TokenTracker;

const JINA_READER_URL: &str = "https://r.jina.ai/";

/// 一次读取的结果
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub content: String,
}

/// 内容读取抽象：URL → 正文
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AgentError>;
}

fn fetch_err(url: &str, reason: impl std::fmt::Display) -> AgentError {
    AgentError::FetchFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn truncate_chars(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

#[derive(Debug, Default, Deserialize)]
struct JinaReaderUsage {
    #[serde(default)]
    tokens: u64,
}

#[derive(Debug, Default, Deserialize)]
struct JinaReaderData {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    usage: Option<JinaReaderUsage>,
}

#[derive(Debug, Deserialize)]
struct JinaReaderResponse {
    #[serde(default)]
    data: Option<JinaReaderData>,
}

/// Jina Reader：POST r.jina.ai，返回 markdown 正文
pub struct JinaReader {
    client: Client,
    api_key: String,
    max_result_chars: usize,
    tracker: TokenTracker,
}

impl JinaReader {
    pub fn new(
        api_key: impl Into<String>,
        timeout_secs: u64,
        max_result_chars: usize,
        tracker: TokenTracker,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            max_result_chars,
            tracker,
        }
    }
}

#[async_trait]
impl ContentFetcher for JinaReader {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AgentError> {
        let resp = self
            .client
            .post(JINA_READER_URL)
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Retain-Images", "none")
            .header("X-Return-Format", "markdown")
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| fetch_err(url, e))?;
        if !resp.status().is_success() {
            return Err(fetch_err(url, format!("HTTP {}", resp.status())));
        }
        let body: JinaReaderResponse = resp.json().await.map_err(|e| fetch_err(url, e))?;
        let data = body.data.ok_or_else(|| fetch_err(url, "no data in reader response"))?;

        if let Some(usage) = data.usage.as_ref().filter(|u| u.tokens > 0) {
            self.tracker.track_usage("read", usage.tokens);
        }
        if data.content.trim().is_empty() {
            return Err(fetch_err(url, "empty content"));
        }
        Ok(FetchedPage {
            url: if data.url.is_empty() { url.to_string() } else { data.url },
            content: truncate_chars(data.content, self.max_result_chars),
        })
    }
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 从 URL 中提取 host（小写，不含端口）
fn extract_domain(url: &str) -> Option<String> {
    reqwest::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// 直接抓取：GET 请求带超时与 User-Agent，HTML 转可读文本
pub struct DirectReader {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl DirectReader {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let allowed_domains = allowed_domains.into_iter().map(|s| s.to_lowercase()).collect();
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains,
            max_result_chars,
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), AgentError> {
        let domain = extract_domain(url).ok_or_else(|| fetch_err(url, "invalid or missing URL"))?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            return Ok(());
        }
        Err(fetch_err(url, format!("domain not in allowlist: {}", domain)))
    }

    fn html_to_text(html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }
}

#[async_trait]
impl ContentFetcher for DirectReader {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AgentError> {
        self.check_allowed(url)?;
        tracing::debug!(url = %url, "direct fetch");
        let resp = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| fetch_err(url, e))?;
        if !resp.status().is_success() {
            return Err(fetch_err(url, format!("HTTP {}", resp.status())));
        }
        let body = resp.text().await.map_err(|e| fetch_err(url, e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if looks_like_html(body) {
            Self::html_to_text(body)
        } else {
            body.to_string()
        };
        if text.trim().is_empty() {
            return Err(fetch_err(url, "empty content"));
        }
        Ok(FetchedPage {
            url: url.to_string(),
            content: truncate_chars(text, self.max_result_chars),
        })
    }
}

/// 按 [reader].provider 构建读取后端；jina 缺少密钥时返回配置错误
pub fn create_content_fetcher(
    cfg: &ReaderSection,
    jina_api_key: &Option<String>,
    tracker: TokenTracker,
) -> Result<Arc<dyn ContentFetcher>, AgentError> {
    match cfg.provider.to_lowercase().as_str() {
        "jina" => {
            let key = key_or_env(jina_api_key, "JINA_API_KEY").ok_or_else(|| {
                AgentError::ConfigError("missing API key for reader provider jina".to_string())
            })?;
            Ok(Arc::new(JinaReader::new(
                key,
                cfg.timeout_secs,
                cfg.max_result_chars,
                tracker,
            )))
        }
        "direct" => Ok(Arc::new(DirectReader::new(
            cfg.allowed_domains.clone(),
            cfg.timeout_secs,
            cfg.max_result_chars,
        ))),
        other => Err(AgentError::ConfigError(format!(
            "unknown reader provider: {}",
            other
        ))),
    }
}
