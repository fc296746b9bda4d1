//! 研究智能体：动作与 Schema、prompt、协作者、会话、主循环、结果组装

pub mod action;
pub mod analyzer;
pub mod dedup;
pub mod dump;
pub mod evaluator;
mod handlers;
pub mod loop_;
pub mod oracle;
pub mod prompt;
pub mod result;
pub mod rewriter;
pub mod schema;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionKind, AnswerAction, CodingAction, ReflectAction, SearchAction, StepAction, VisitAction};
pub use analyzer::{ErrorAnalysis, ErrorAnalyzer, LlmErrorAnalyzer};
pub use dedup::{Deduplicator, LexicalDeduplicator, LlmDeduplicator};
pub use evaluator::{AnswerEvaluator, CriteriaProvider, Evaluation, EvaluationKind, LlmEvaluator};
pub use loop_::{Collaborators, ResearchOptions, Researcher, StepOutcome};
pub use oracle::{ActionOracle, LlmActionOracle, OracleRequest};
pub use result::{build_md_from_answer, ResearchResult};
pub use rewriter::{LlmQueryRewriter, QueryRewriter};
pub use schema::{ActionPermissions, ActionSchema};
pub use session::{FailedAttempt, Session};
