//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供结构化生成（llm::structured）决定是重新提示、退避重试还是终止。

use std::time::Duration;

use crate::core::{AgentError, RecoveryAction};
use crate::llm::LlmError;

/// 限流时的最长退避
const MAX_BACKOFF_MS: u64 = 30_000;

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default, Clone)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous reply could not be parsed as JSON: {raw}. \
                Respond with exactly one valid JSON object matching the JSON schema. \
                Do not add Markdown, code or any other text."
            )),
            AgentError::SchemaMismatch { action, allowed } => {
                RecoveryAction::RetryWithPrompt(format!(
                    "The action \"{action}\" is not available right now. \
                    Choose exactly one of: {allowed}. Respond with a single JSON object."
                ))
            }
            AgentError::LlmError(LlmError::EmptyResponse) => RecoveryAction::RetryWithPrompt(
                "Your previous reply was empty. Respond with a single JSON object.".to_string(),
            ),
            AgentError::LlmError(LlmError::RateLimited { retry_after_ms }) => {
                RecoveryAction::Backoff(Duration::from_millis((*retry_after_ms).min(MAX_BACKOFF_MS)))
            }
            _ => RecoveryAction::Abort,
        }
    }
}
