//! 结构化输出：JSON Schema 提示 + 提取 + 反序列化 + 失败重提示
//!
//! 所有由 LLM 支撑的协作者（下一步动作、评估、错误分析、改写、去重）都通过 ObjectGenerator 调用模型：
//! Schema（schemars 生成）拼入 system prompt，回复中提取 JSON 块并反序列化；
//! 解析或校验失败时交给 RecoveryEngine，RetryWithPrompt 则把原回复与纠正提示追加到对话后重试。

use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{CompletionOptions, LlmClient};
use crate::memory::Message;

/// 返回类型 T 的 JSON Schema 字符串，可拼入 system prompt
pub fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 在 prompt 末尾追加 JSON 输出要求与 Schema
pub fn with_schema_instruction(prompt: &str, schema: &str) -> String {
    format!(
        "{}\n\nRespond in valid JSON format matching exact JSON schema:\n{}",
        prompt.trim_end(),
        schema
    )
}

/// 从 LLM 输出中提取 JSON 对象（```json ... ``` 或首个 `{` 到末个 `}`）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 提取并反序列化为 T
pub fn parse_json_object<T: DeserializeOwned>(output: &str) -> Result<T, AgentError> {
    let json_str = extract_json(output)
        .ok_or_else(|| AgentError::JsonParseError(format!("no JSON object in: {}", preview(output))))?;
    serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))))
}

fn preview(s: &str) -> String {
    const MAX: usize = 200;
    if s.chars().count() > MAX {
        format!("{}...", s.chars().take(MAX).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 结构化生成器：持有 LLM、恢复引擎与最大尝试次数
#[derive(Clone)]
pub struct ObjectGenerator {
    llm: Arc<dyn LlmClient>,
    recovery: RecoveryEngine,
    max_attempts: usize,
}

impl ObjectGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize) -> Self {
        Self {
            llm,
            recovery: RecoveryEngine::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// 无额外校验的生成
    pub async fn generate<T>(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + Send,
    {
        self.generate_validated(system, messages, options, |_: &T| Ok(()))
            .await
    }

    /// 生成并校验；校验失败按 RecoveryEngine 的建议重提示
    pub async fn generate_validated<T, F>(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
        validate: F,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + Send,
        F: Fn(&T) -> Result<(), AgentError> + Send + Sync,
    {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(Message::system(system));
        conversation.extend_from_slice(messages);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (raw, outcome) = match self.llm.complete(&conversation, options).await {
                Ok(completion) => {
                    let parsed = parse_json_object::<T>(&completion.content)
                        .and_then(|value| validate(&value).map(|_| value));
                    (Some(completion.content), parsed)
                }
                Err(e) => (None, Err(AgentError::from(e))),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if attempt >= self.max_attempts {
                return Err(err);
            }

            match self.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::warn!(attempt, error = %err, "structured output rejected, re-prompting");
                    if let Some(raw) = raw {
                        conversation.push(Message::assistant(raw));
                    }
                    conversation.push(Message::user(prompt));
                }
                RecoveryAction::Backoff(delay) => {
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "LLM rate limited, backing off");
                    tokio::time::sleep(delay).await;
                }
                RecoveryAction::Abort => return Err(err),
            }
        }
    }
}
