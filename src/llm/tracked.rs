//! 带用量记录的 LLM 客户端装饰器
//!
//! 每次补全后按角色名（agent / evaluator / dedup ...）写入 TokenTracker；
//! 后端未返回用量时用 TokenEstimator 粗略估算，保证预算判断不会因为 0 用量失效。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionOptions, LlmClient, LlmError};
use crate::memory::Message;
use crate::observability::{TokenEstimator, TokenTracker};

pub struct TrackedLlmClient {
    inner: Arc<dyn LlmClient>,
    tracker: TokenTracker,
    role: String,
}

impl TrackedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, tracker: TokenTracker, role: impl Into<String>) -> Self {
        Self {
            inner,
            tracker,
            role: role.into(),
        }
    }
}

#[async_trait]
impl LlmClient for TrackedLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let completion = self.inner.complete(messages, options).await?;
        let tokens = match completion.total_tokens() {
            0 => {
                let prompt: usize = messages
                    .iter()
                    .map(|m| TokenEstimator::estimate(&m.content))
                    .sum();
                (prompt + TokenEstimator::estimate(&completion.content)) as u64
            }
            n => n,
        };
        self.tracker.track_usage(&self.role, tokens);
        Ok(completion)
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
