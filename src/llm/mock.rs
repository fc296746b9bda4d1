//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序返回预置回复；预置回复耗尽后，取最后一条 User 消息回显为一个 answer 动作 JSON，
//! 便于在没有 API Key 时本地跑通研究循环。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionOptions, LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：预置回复队列 + 每次调用的消息记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
    tokens_per_call: u64,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定回复
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// 每次调用报告的 completion token 数
    pub fn with_tokens_per_call(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// 已收到的调用（每次调用的完整消息列表）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn echo_answer(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        serde_json::json!({
            "action": "answer",
            "think": "Mock client has no reasoning, echoing the question.",
            "answer": format!("Echo from Mock: {}", last_user),
            "references": []
        })
        .to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let content = scripted.unwrap_or_else(|| Self::echo_answer(messages));

        Ok(Completion {
            content,
            prompt_tokens: 0,
            completion_tokens: self.tokens_per_call,
        })
    }
}
