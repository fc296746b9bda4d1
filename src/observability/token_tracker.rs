//! Token 用量跟踪
//!
//! 只增计数器，按工具（agent / evaluator / search ...）分类累计；可设置预算，
//! 超出预算时记录错误日志但仍计入，总量始终单调。每次记录通过 broadcast 通道发出 UsageEvent。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Token 估算器（简单的字符计数近似）
pub struct TokenEstimator;

impl TokenEstimator {
    /// 英文约 4 字符/token，中文约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

/// 一次用量记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEvent {
    pub tool: String,
    pub tokens: u64,
}

#[derive(Debug)]
struct Inner {
    usages: Mutex<Vec<UsageEvent>>,
    total: AtomicU64,
    budget: Option<u64>,
    events: broadcast::Sender<UsageEvent>,
}

/// 可克隆共享的用量跟踪器
#[derive(Debug, Clone)]
pub struct TokenTracker {
    inner: Arc<Inner>,
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// 带预算：累计超过预算时记错误日志，用量照常计入
    pub fn with_budget(budget: u64) -> Self {
        Self::build(Some(budget))
    }

    fn build(budget: Option<u64>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                usages: Mutex::new(Vec::new()),
                total: AtomicU64::new(0),
                budget,
                events,
            }),
        }
    }

    pub fn track_usage(&self, tool: &str, tokens: u64) {
        let mut usages = self.inner.usages.lock().unwrap_or_else(|e| e.into_inner());
        let event = UsageEvent {
            tool: tool.to_string(),
            tokens,
        };
        usages.push(event.clone());
        let total = self.inner.total.fetch_add(tokens, Ordering::SeqCst) + tokens;
        drop(usages);
        if let Some(budget) = self.inner.budget {
            if total > budget {
                tracing::error!(tool, tokens, total, budget, "token budget exceeded");
            }
        }
        // 无订阅者时发送失败，忽略
        let _ = self.inner.events.send(event);
    }

    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::SeqCst)
    }

    pub fn budget(&self) -> Option<u64> {
        self.inner.budget
    }

    /// 按工具汇总
    pub fn breakdown(&self) -> BTreeMap<String, u64> {
        let usages = self.inner.usages.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = BTreeMap::new();
        for u in usages.iter() {
            *out.entry(u.tool.clone()).or_insert(0) += u.tokens;
        }
        out
    }

    /// 订阅用量事件
    pub fn subscribe(&self) -> broadcast::Receiver<UsageEvent> {
        self.inner.events.subscribe()
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .breakdown()
            .into_iter()
            .map(|(tool, tokens)| format!("{}={}", tool, tokens))
            .collect();
        format!("total={} [{}]", self.total(), parts.join(", "))
    }
}
