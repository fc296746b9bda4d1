//! 搜索后端：Jina / Brave / Serper，统一返回 `SearchResultMeta` 列表
//!
//! 返回的 URL 未经规范化，由 search 处理器统一规范化后写入 URL 账本。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchSection;
use crate::core::AgentError;
use crate::memory::SearchResultMeta;
use crate::observability::token_tracker::TokenTracker;

const JINA_SEARCH_URL: &str = "https://s.jina.ai/";
const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";

/// 搜索后端抽象：一条查询 → 有序结果
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError>;
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

fn search_err(provider: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::SearchFailed(format!("{}: {}", provider, e))
}

#[derive(Debug, Default, Deserialize)]
struct JinaUsage {
    #[serde(default)]
    tokens: u64,
}

#[derive(Debug, Deserialize)]
struct JinaSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    usage: Option<JinaUsage>,
}

#[derive(Debug, Deserialize)]
struct JinaSearchResponse {
    #[serde(default)]
    data: Vec<JinaSearchItem>,
}

/// Jina 搜索：GET s.jina.ai，按返回的 usage 记账
pub struct JinaSearch {
    client: Client,
    api_key: String,
    tracker: TokenTracker,
}

impl JinaSearch {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64, tracker: TokenTracker) -> Self {
        Self {
            client: build_client(timeout_secs),
            api_key: api_key.into(),
            tracker,
        }
    }
}

#[async_trait]
impl SearchProvider for JinaSearch {
    fn name(&self) -> &str {
        "jina"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError> {
        let resp = self
            .client
            .get(JINA_SEARCH_URL)
            .query(&[("q", query)])
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Retain-Images", "none")
            .send()
            .await
            .map_err(|e| search_err("jina", e))?;
        if !resp.status().is_success() {
            return Err(search_err("jina", format!("HTTP {}", resp.status())));
        }
        let body: JinaSearchResponse = resp.json().await.map_err(|e| search_err("jina", e))?;

        let tokens: u64 = body
            .data
            .iter()
            .filter_map(|d| d.usage.as_ref())
            .map(|u| u.tokens)
            .sum();
        if tokens > 0 {
            self.tracker.track_usage("search", tokens);
        }

        Ok(body
            .data
            .into_iter()
            .filter(|d| !d.url.is_empty())
            .map(|d| SearchResultMeta {
                title: d.title,
                url: d.url,
                description: d.description,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

/// Brave 搜索 API
pub struct BraveSearch {
    client: Client,
    api_key: String,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError> {
        let resp = self
            .client
            .get(BRAVE_SEARCH_URL)
            .query(&[("q", query)])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| search_err("brave", e))?;
        if !resp.status().is_success() {
            return Err(search_err("brave", format!("HTTP {}", resp.status())));
        }
        let body: BraveResponse = resp.json().await.map_err(|e| search_err("brave", e))?;
        Ok(body
            .web
            .results
            .into_iter()
            .map(|r| SearchResultMeta {
                title: r.title,
                url: r.url,
                description: r.description,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

/// Serper（Google 结果）
pub struct SerperSearch {
    client: Client,
    api_key: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError> {
        let resp = self
            .client
            .post(SERPER_SEARCH_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query, "autocorrect": false }))
            .send()
            .await
            .map_err(|e| search_err("serper", e))?;
        if !resp.status().is_success() {
            return Err(search_err("serper", format!("HTTP {}", resp.status())));
        }
        let body: SerperResponse = resp.json().await.map_err(|e| search_err("serper", e))?;
        Ok(body
            .organic
            .into_iter()
            .map(|r| SearchResultMeta {
                title: r.title,
                url: r.link,
                description: r.snippet,
            })
            .collect())
    }
}

/// 按 [search].provider 构建搜索后端；缺少密钥时返回配置错误
pub fn create_search_provider(
    cfg: &SearchSection,
    tracker: TokenTracker,
) -> Result<Arc<dyn SearchProvider>, AgentError> {
    let missing = |name: &str| AgentError::ConfigError(format!("missing API key for search provider {}", name));
    match cfg.provider.to_lowercase().as_str() {
        "jina" => {
            let key = cfg.jina_key().ok_or_else(|| missing("jina"))?;
            Ok(Arc::new(JinaSearch::new(key, cfg.timeout_secs, tracker)))
        }
        "brave" => {
            let key = cfg.brave_key().ok_or_else(|| missing("brave"))?;
            Ok(Arc::new(BraveSearch::new(key, cfg.timeout_secs)))
        }
        "serper" => {
            let key = cfg.serper_key().ok_or_else(|| missing("serper"))?;
            Ok(Arc::new(SerperSearch::new(key, cfg.timeout_secs)))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown search provider: {}",
            other
        ))),
    }
}
