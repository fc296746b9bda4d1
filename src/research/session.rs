//! 会话状态：一次提问对应一个 Session，由循环控制器独占
//!
//! 包含步数与预算计数、待解决问题队列、知识库、URL 账本、日志（diary）、失败记录、动作开关与本步动作。
//! search / visit / reflect 一旦在本会话内耗尽即永久关闭；每步开始时其余开关恢复为允许，coding 保持原值。

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::memory::{GapQueue, KnowledgeBase, Message, UrlLedger};
use crate::research::action::{ActionKind, StepAction};
use crate::research::evaluator::EvaluationKind;
use crate::research::schema::ActionPermissions;

/// 一次被拒的根问题回答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub question: String,
    pub answer: String,
    pub evaluation: String,
    pub recap: String,
    pub blame: String,
    pub improvement: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// 根问题
    pub question: String,
    /// 自上次重置以来的步数
    pub step: usize,
    /// 全局步数，不随重置归零
    pub total_step: usize,
    pub bad_attempts: usize,
    pub token_budget: u64,
    pub gaps: GapQueue,
    pub all_questions: Vec<String>,
    pub all_keywords: Vec<String>,
    pub knowledge: KnowledgeBase,
    pub bad_context: Vec<FailedAttempt>,
    pub diary: Vec<String>,
    pub urls: UrlLedger,
    pub evaluation_metrics: HashMap<String, Vec<EvaluationKind>>,
    pub permissions: ActionPermissions,
    exhausted: BTreeSet<ActionKind>,
    pub this_step: StepAction,
    pub current_question: String,
    pub step_log: Vec<Value>,
    pub messages: Vec<Message>,
    pub last_prompt: Option<String>,
    pub last_schema: Option<Value>,
}

impl Session {
    pub fn new(question: impl Into<String>, token_budget: u64, allow_coding: bool) -> Self {
        let question = question.into().trim().to_string();
        Self {
            id: Uuid::new_v4(),
            gaps: GapQueue::new(question.clone()),
            all_questions: vec![question.clone()],
            current_question: question.clone(),
            messages: vec![Message::user(question.clone())],
            question,
            step: 0,
            total_step: 0,
            bad_attempts: 0,
            token_budget,
            all_keywords: Vec::new(),
            knowledge: KnowledgeBase::new(),
            bad_context: Vec::new(),
            diary: Vec::new(),
            urls: UrlLedger::new(),
            evaluation_metrics: HashMap::new(),
            permissions: ActionPermissions::all(allow_coding),
            exhausted: BTreeSet::new(),
            this_step: StepAction::pending_answer(),
            step_log: Vec::new(),
            last_prompt: None,
            last_schema: None,
        }
    }

    /// 以已有对话创建会话；根问题取最后一条 user 消息
    pub fn from_messages(messages: Vec<Message>, token_budget: u64, allow_coding: bool) -> Option<Self> {
        let question = crate::memory::last_user_content(&messages)?.trim().to_string();
        if question.is_empty() {
            return None;
        }
        let mut session = Self::new(question, token_budget, allow_coding);
        session.messages = messages;
        Some(session)
    }

    pub fn is_root(&self, question: &str) -> bool {
        question.trim() == self.question
    }

    /// 取下一个待解决问题；队列为空时回到根问题
    pub fn next_question(&mut self) -> String {
        self.gaps.pop_front().unwrap_or_else(|| self.question.clone())
    }

    /// 本会话内永久关闭某个动作
    pub fn exhaust(&mut self, kind: ActionKind) {
        self.exhausted.insert(kind);
        self.permissions.set(kind, false);
    }

    pub fn is_exhausted(&self, kind: ActionKind) -> bool {
        self.exhausted.contains(&kind)
    }

    /// 每步选定动作后恢复开关：未耗尽的恢复允许，coding 不变
    pub fn reset_permissions(&mut self) {
        for kind in [ActionKind::Search, ActionKind::Visit, ActionKind::Reflect, ActionKind::Answer] {
            let allowed = !self.is_exhausted(kind);
            self.permissions.set(kind, allowed);
        }
    }

    pub fn log_step(&mut self, entry: Value) {
        self.step_log.push(entry);
    }

    pub fn unvisited_count(&self) -> usize {
        self.urls.unvisited_count()
    }
}
