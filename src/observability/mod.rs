//! 可观测性：日志初始化、token 用量跟踪、动作轨迹

pub mod action_tracker;
pub mod token_tracker;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use action_tracker::{ActionRecord, ActionTracker};
pub use token_tracker::{TokenEstimator, TokenTracker, UsageEvent};

/// 日志：默认 info，可通过 RUST_LOG 覆盖；重复初始化时静默忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 会话的用量/轨迹上下文：两个跟踪器都可由调用方注入并跨会话复用
#[derive(Debug, Clone, Default)]
pub struct TrackerContext {
    pub token_tracker: TokenTracker,
    pub action_tracker: ActionTracker,
}

impl TrackerContext {
    pub fn new(token_tracker: TokenTracker, action_tracker: ActionTracker) -> Self {
        Self {
            token_tracker,
            action_tracker,
        }
    }
}
