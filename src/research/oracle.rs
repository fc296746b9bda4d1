//! 下一步动作 Oracle：给定 system prompt、对话与本步动作 Schema，返回一个允许的 StepAction

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::structured::with_schema_instruction;
use crate::llm::{CompletionOptions, LlmClient, ObjectGenerator};
use crate::memory::Message;
use crate::research::action::StepAction;
use crate::research::schema::ActionSchema;

/// 一次选择动作的输入
pub struct OracleRequest<'a> {
    pub system_prompt: &'a str,
    pub messages: &'a [Message],
    pub schema: &'a ActionSchema,
    pub beast_mode: bool,
}

#[async_trait]
pub trait ActionOracle: Send + Sync {
    async fn choose_action(&self, request: OracleRequest<'_>) -> Result<StepAction, AgentError>;
}

/// LLM 支撑的 Oracle：回复不在允许集合内时重提示
pub struct LlmActionOracle {
    generator: ObjectGenerator,
    options: CompletionOptions,
    beast_options: CompletionOptions,
}

impl LlmActionOracle {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize, temperature: f32, beast_temperature: f32) -> Self {
        Self {
            generator: ObjectGenerator::new(llm, max_attempts),
            options: CompletionOptions::with_temperature(temperature),
            beast_options: CompletionOptions::with_temperature(beast_temperature),
        }
    }
}

#[async_trait]
impl ActionOracle for LlmActionOracle {
    async fn choose_action(&self, request: OracleRequest<'_>) -> Result<StepAction, AgentError> {
        let system = with_schema_instruction(request.system_prompt, &request.schema.to_json_string());
        let options = if request.beast_mode {
            &self.beast_options
        } else {
            &self.options
        };
        tracing::debug!(prompt_chars = system.len(), beast_mode = request.beast_mode, "asking oracle");
        let schema = request.schema;
        self.generator
            .generate_validated(&system, request.messages, options, |action: &StepAction| {
                schema.validate(action)
            })
            .await
    }
}
