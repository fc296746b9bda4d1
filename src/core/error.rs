//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：结构化输出解析失败、动作不在允许集合内时决定 RetryWithPrompt / Backoff / Abort。
//! 契约违规（coding 未实现、最终结果不是已定稿的回答）属于不可恢复错误，直接返回给调用方。

use thiserror::Error;

use crate::llm::LlmError;

/// 研究循环中可能出现的错误（LLM、解析、Schema、搜索、抓取、契约违规等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    /// Oracle 返回了当前不允许的动作
    #[error("Action '{action}' is not permitted now (allowed: {allowed})")]
    SchemaMismatch { action: String, allowed: String },

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Coding step not implemented")]
    CodingNotImplemented,

    /// 结果组装时终态不是已定稿的 answer
    #[error("Final step is not a finalized answer: {0}")]
    NotFinal(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// 契约违规：不重试，直接上抛
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AgentError::CodingNotImplemented | AgentError::NotFinal(_))
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重新生成（如 JSON 格式错误、动作不被允许）
    RetryWithPrompt(String),
    /// 等待一段时间后原样重试（如限流）
    Backoff(std::time::Duration),
    /// 终止当前调用
    Abort,
}
