//! 结果组装：校验终态为已定稿的 answer，渲染 markdown 并汇总 URL 与追踪上下文

use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::observability::TrackerContext;
use crate::research::action::{AnswerAction, StepAction};
use crate::research::session::Session;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub answer: AnswerAction,
    /// 已访问与已发现 URL 的去重并集
    pub visited_urls: Vec<String>,
    /// 实际读取过的 URL
    pub read_urls: Vec<String>,
    pub step_log: Vec<Value>,
    pub total_steps: usize,
    pub bad_attempts: usize,
    #[serde(skip)]
    pub context: TrackerContext,
}

impl ResearchResult {
    /// 渲染后的回答（带脚注）
    pub fn md_answer(&self) -> &str {
        self.answer.md_answer.as_deref().unwrap_or(&self.answer.answer)
    }
}

/// 回答正文 + 引用脚注 `[^i]: quote [title](url)`
pub fn build_md_from_answer(answer: &AnswerAction) -> String {
    if answer.references.is_empty() {
        return answer.answer.clone();
    }
    let footnotes = answer
        .references
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let quote = r.exact_quote.split_whitespace().collect::<Vec<_>>().join(" ");
            let title = r.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&r.url);
            if quote.is_empty() {
                format!("[^{}]: [{}]({})", i + 1, title, r.url)
            } else {
                format!("[^{}]: {} [{}]({})", i + 1, quote, title, r.url)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", answer.answer.trim_end(), footnotes)
}

/// 终态必须是 is_final 的 answer，否则为契约违规
pub fn assemble(session: Session, context: TrackerContext) -> Result<ResearchResult, AgentError> {
    let mut answer = match session.this_step {
        StepAction::Answer(a) if a.is_final => a,
        StepAction::Answer(_) => {
            return Err(AgentError::NotFinal("answer is not marked final".to_string()))
        }
        other => return Err(AgentError::NotFinal(format!("terminal action is {}", other.kind()))),
    };
    answer.md_answer = Some(build_md_from_answer(&answer));

    Ok(ResearchResult {
        answer,
        visited_urls: session.urls.all_urls(),
        read_urls: session.urls.visited().to_vec(),
        step_log: session.step_log,
        total_steps: session.total_step,
        bad_attempts: session.bad_attempts,
        context,
    })
}
