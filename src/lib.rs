//! Sleuth - Rust 深度研究智能体
//!
//! 模块划分：
//! - **agent**: 按配置装配 Researcher（LLM 后端、各角色协作者、搜索与读取后端）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复策略
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、结构化输出
//! - **memory**: 对话消息、知识库、URL 账本、待解决问题队列
//! - **observability**: 日志初始化、token 用量与动作轨迹
//! - **research**: 搜索 / 阅读 / 反思 / 作答的迭代主循环
//! - **tools**: 搜索后端、网页读取、文本工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod research;
pub mod tools;

pub use agent::{create_llm_from_config, create_researcher};
pub use research::{ResearchResult, Researcher};
