//! 记忆层：对话消息、知识库、URL 账本、待解决问题队列

pub mod conversation;
pub mod gaps;
pub mod knowledge;
pub mod ledger;

pub use conversation::{last_user_content, Message, Role};
pub use gaps::GapQueue;
pub use knowledge::{KnowledgeBase, KnowledgeItem, KnowledgeKind, Reference};
pub use ledger::{SearchResultMeta, UrlLedger};
