//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、用量记录装饰器、结构化输出

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;
pub mod tracked;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{extract_json, parse_json_object, schema_json, ObjectGenerator};
pub use traits::{Completion, CompletionOptions, LlmClient, LlmError};
pub use tracked::TrackedLlmClient;
