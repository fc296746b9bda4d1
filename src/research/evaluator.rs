//! 答案评估：按问题确定评估标准（缓存于会话），再逐项检查候选答案
//!
//! 标准总是包含 definitive；freshness / plurality 由 LLM 判断是否需要。
//! 逐项评估时遇到第一个不通过的标准即返回失败。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::structured::{schema_json, with_schema_instruction};
use crate::llm::{CompletionOptions, LlmClient, ObjectGenerator};
use crate::memory::Message;
use crate::research::action::AnswerAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationKind {
    /// 不含 "不知道"、"信息不足" 等不确定表述
    Definitive,
    /// 时效性问题需引用近期信息
    Freshness,
    /// 问题要求多个条目时答案需给出足够数量
    Plurality,
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvaluationKind::Definitive => "definitive",
            EvaluationKind::Freshness => "freshness",
            EvaluationKind::Plurality => "plurality",
        };
        f.write_str(s)
    }
}

/// 评估结论
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub pass: bool,
    pub reasoning: String,
    /// 未通过时记录失败的标准
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_kind: Option<EvaluationKind>,
}

impl Evaluation {
    pub fn passed(reasoning: impl Into<String>) -> Self {
        Self {
            pass: true,
            reasoning: reasoning.into(),
            failed_kind: None,
        }
    }

    pub fn failed(kind: EvaluationKind, reasoning: impl Into<String>) -> Self {
        Self {
            pass: false,
            reasoning: reasoning.into(),
            failed_kind: Some(kind),
        }
    }
}

/// 为问题给出评估标准
#[async_trait]
pub trait CriteriaProvider: Send + Sync {
    async fn criteria_for(&self, question: &str) -> Result<Vec<EvaluationKind>, AgentError>;
}

/// 按标准评估答案
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        question: &str,
        answer: &AnswerAction,
        criteria: &[EvaluationKind],
        visited_urls: &[String],
    ) -> Result<Evaluation, AgentError>;
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CriteriaResponse {
    /// Reasoning about what kind of answer the question expects
    #[serde(default)]
    think: String,
    /// Whether the question asks about recent or time-sensitive information
    #[serde(default)]
    needs_freshness: bool,
    /// Whether the question asks for multiple items, examples or a specific count
    #[serde(default)]
    needs_plurality: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CriterionResponse {
    /// Whether the answer satisfies the criterion
    pass: bool,
    /// Explanation of why the answer does or does not satisfy the criterion
    #[serde(default)]
    reasoning: String,
}

fn criteria_prompt(question: &str) -> String {
    format!(
        r#"You are an evaluator that determines which quality checks an answer to a question requires.

<rules>
- freshness: the question is about current events, latest versions, prices, recent releases or anything that changes over time.
- plurality: the question explicitly or implicitly asks for multiple items, a list, several examples or a specific count.
A definitiveness check is always applied; you only decide on freshness and plurality.
</rules>

Question: {}"#,
        serde_json::to_string(question).unwrap_or_default()
    )
}

fn criterion_prompt(kind: EvaluationKind, question: &str, answer: &AnswerAction, visited_urls: &[String]) -> String {
    let rule = match kind {
        EvaluationKind::Definitive => {
            r#"You are an evaluator of answer definitiveness. Analyze if the given answer provides a definitive response or not.

Core Evaluation Criterion:
- Definitiveness: "I don't know", "lack of information", "doesn't exist", "not sure" or highly uncertain/ambiguous responses are **not** definitive, must return false!

Examples:

Question: "What are the system requirements for running Python 3.9?"
Answer: "I'm not entirely sure, but I think you need a computer with some RAM."
Evaluation: {"pass": false, "reasoning": "The answer contains uncertainty markers like 'not entirely sure' and 'I think', making it non-definitive."}

Question: "What are the system requirements for running Python 3.9?"
Answer: "Python 3.9 requires Windows 7 or later, macOS 10.11 or later, or Linux."
Evaluation: {"pass": true, "reasoning": "The answer makes clear, definitive statements without uncertainty markers or ambiguity."}"#
        }
        EvaluationKind::Freshness => {
            r#"You are an evaluator of answer freshness. The question is time-sensitive.

Core Evaluation Criterion:
- Freshness: the answer must rely on up-to-date information and must not present outdated facts as current. If the answer cites no source or only sources that are clearly outdated for the question, return false."#
        }
        EvaluationKind::Plurality => {
            r#"You are an evaluator of answer plurality. The question asks for multiple items.

Core Evaluation Criterion:
- Plurality: the answer must provide the number of items the question asks for (or a reasonable number when unspecified). Fewer items than requested, or a single item when several are expected, must return false."#
        }
    };
    let references = answer
        .references
        .iter()
        .map(|r| r.url.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\n\nCurrent date: {}\nVisited URLs: {}\nAnswer references: {}\n\nNow evaluate this pair:\nQuestion: {}\nAnswer: {}",
        rule,
        chrono::Utc::now().format("%Y-%m-%d"),
        visited_urls.join(", "),
        references,
        serde_json::to_string(question).unwrap_or_default(),
        serde_json::to_string(&answer.answer).unwrap_or_default()
    )
}

/// LLM 支撑的标准提供者与评估器
pub struct LlmEvaluator {
    generator: ObjectGenerator,
    options: CompletionOptions,
}

impl LlmEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize, temperature: f32) -> Self {
        Self {
            generator: ObjectGenerator::new(llm, max_attempts),
            options: CompletionOptions::with_temperature(temperature),
        }
    }
}

#[async_trait]
impl CriteriaProvider for LlmEvaluator {
    async fn criteria_for(&self, question: &str) -> Result<Vec<EvaluationKind>, AgentError> {
        let system = with_schema_instruction(&criteria_prompt(question), &schema_json::<CriteriaResponse>());
        let resp: CriteriaResponse = self
            .generator
            .generate(&system, &[Message::user(question)], &self.options)
            .await?;
        tracing::debug!(think = %resp.think, "evaluation criteria decided");

        let mut kinds = vec![EvaluationKind::Definitive];
        if resp.needs_freshness {
            kinds.push(EvaluationKind::Freshness);
        }
        if resp.needs_plurality {
            kinds.push(EvaluationKind::Plurality);
        }
        Ok(kinds)
    }
}

#[async_trait]
impl AnswerEvaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        answer: &AnswerAction,
        criteria: &[EvaluationKind],
        visited_urls: &[String],
    ) -> Result<Evaluation, AgentError> {
        let schema = schema_json::<CriterionResponse>();
        for kind in criteria {
            let prompt = criterion_prompt(*kind, question, answer, visited_urls);
            let system = with_schema_instruction(&prompt, &schema);
            let resp: CriterionResponse = self
                .generator
                .generate(&system, &[Message::user("Evaluate the answer.")], &self.options)
                .await?;
            tracing::info!(criterion = %kind, pass = resp.pass, reasoning = %resp.reasoning, "answer evaluation");
            if !resp.pass {
                return Ok(Evaluation::failed(*kind, resp.reasoning));
            }
        }
        Ok(Evaluation::passed(format!(
            "The answer satisfies all criteria: {}",
            criteria.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
        )))
    }
}
