//! 单步动作：Oracle 每步返回五种之一（search / visit / reflect / answer / coding）
//!
//! JSON 以 `action` 字段区分变体，其余字段为该变体的载荷。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Search,
    Visit,
    Reflect,
    Answer,
    Coding,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Search,
        ActionKind::Visit,
        ActionKind::Reflect,
        ActionKind::Answer,
        ActionKind::Coding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::Visit => "visit",
            ActionKind::Reflect => "reflect",
            ActionKind::Answer => "answer",
            ActionKind::Coding => "coding",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchAction {
    /// Explain why choose this action, what's the thought process behind choosing this action
    #[serde(default)]
    pub think: String,
    /// Required when action='search'. Always prefer a single request, only add another request if the original question covers multiple aspects or elements and one search request is definitely not enough, each request focus on one specific aspect of the original question. Minimize mutual information between each request.
    #[serde(default)]
    pub search_requests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitAction {
    /// Explain why choose this action, what's the thought process behind choosing this action
    #[serde(default)]
    pub think: String,
    /// Required when action='visit'. Must be an array of URLs, choose up the most relevant URLs to visit
    #[serde(default)]
    pub url_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReflectAction {
    /// Explain why choose this action, what's the thought process behind choosing this action
    #[serde(default)]
    pub think: String,
    /// Required when action='reflect'. List of most important questions to fill the knowledge gaps of finding the answer to the original question
    #[serde(default)]
    pub questions_to_answer: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAction {
    /// Explain why choose this action, what's the thought process behind choosing this action
    #[serde(default)]
    pub think: String,
    /// Required when action='answer'. Must be definitive, no ambiguity, uncertainty, or disclaimers. Must confident. Use markdown footnote syntax like [^1], [^2] to refer the corresponding reference item
    #[serde(default)]
    pub answer: String,
    /// Required when action='answer'. Must be an array of references that support the answer, each reference must contain an exact quote and the URL of the document
    #[serde(default)]
    pub references: Vec<Reference>,
    /// 只有处理器显式置位后才是终态，不接受 Oracle 回复中的同名字段
    #[serde(default, skip_deserializing)]
    #[schemars(skip)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub md_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodingAction {
    /// Explain why choose this action, what's the thought process behind choosing this action
    #[serde(default)]
    pub think: String,
    /// Required when action='coding'. Describe what issue to solve with coding, format like a github issue ticket. Specify the input value when it is short.
    #[serde(default)]
    pub coding_issue: String,
}

/// Oracle 返回的单步动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StepAction {
    Search(SearchAction),
    Visit(VisitAction),
    Reflect(ReflectAction),
    Answer(AnswerAction),
    Coding(CodingAction),
}

impl StepAction {
    /// 会话开始前的占位：未定稿的空回答
    pub fn pending_answer() -> Self {
        StepAction::Answer(AnswerAction {
            think: String::new(),
            answer: String::new(),
            references: Vec::new(),
            is_final: false,
            md_answer: None,
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            StepAction::Search(_) => ActionKind::Search,
            StepAction::Visit(_) => ActionKind::Visit,
            StepAction::Reflect(_) => ActionKind::Reflect,
            StepAction::Answer(_) => ActionKind::Answer,
            StepAction::Coding(_) => ActionKind::Coding,
        }
    }

    pub fn think(&self) -> &str {
        match self {
            StepAction::Search(a) => &a.think,
            StepAction::Visit(a) => &a.think,
            StepAction::Reflect(a) => &a.think,
            StepAction::Answer(a) => &a.think,
            StepAction::Coding(a) => &a.think,
        }
    }

    pub fn as_answer(&self) -> Option<&AnswerAction> {
        match self {
            StepAction::Answer(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_answer_mut(&mut self) -> Option<&mut AnswerAction> {
        match self {
            StepAction::Answer(a) => Some(a),
            _ => None,
        }
    }

    /// 已定稿的 answer
    pub fn is_final_answer(&self) -> bool {
        self.as_answer().map(|a| a.is_final).unwrap_or(false)
    }

    /// 该变体的必填载荷是否非空；answer 总是可分派
    pub fn has_payload(&self) -> bool {
        match self {
            StepAction::Search(a) => !a.search_requests.is_empty(),
            StepAction::Visit(a) => !a.url_targets.is_empty(),
            StepAction::Reflect(a) => !a.questions_to_answer.is_empty(),
            StepAction::Answer(_) => true,
            StepAction::Coding(a) => !a.coding_issue.trim().is_empty(),
        }
    }
}
