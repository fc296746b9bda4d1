//! 错误分析：根问题答案被拒后，回顾日志给出 recap / blame / improvement 与可选子问题

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::structured::{schema_json, with_schema_instruction};
use crate::llm::{CompletionOptions, LlmClient, ObjectGenerator};
use crate::memory::Message;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    /// Recap of the actions taken and the steps conducted
    #[serde(default)]
    pub recap: String,
    /// Which action or the step was the root cause of the answer rejection
    #[serde(default)]
    pub blame: String,
    /// Suggested key improvement for the next iteration, do not use bullet points, be concise and hot-take vibe.
    #[serde(default)]
    pub improvement: String,
    /// List of most important reflect questions to fill the knowledge gaps
    #[serde(default)]
    pub questions_to_answer: Vec<String>,
}

#[async_trait]
pub trait ErrorAnalyzer: Send + Sync {
    async fn analyze(&self, diary: &[String]) -> Result<ErrorAnalysis, AgentError>;
}

const ANALYZER_PROMPT: &str = r#"You are an expert at analyzing search and reasoning processes. Your task is to analyze the given sequence of steps and identify what went wrong in the search process.

<rules>
1. The sequence of actions taken
2. The effectiveness of each step
3. The logic between consecutive steps
4. Alternative approaches that could have been taken
5. Signs of getting stuck in repetitive patterns
6. Whether the final answer matches the accumulated information

Analyze the steps and provide detailed feedback following these guidelines:
- In the recap: Summarize key actions chronologically, highlight patterns, and identify where the process started to go wrong
- In the blame: Point to specific steps or patterns that led to the inadequate answer
- In the improvement: Provide actionable suggestions that could have led to a better outcome
- In questionsToAnswer: List the sub-questions whose answers would most help answer the original question
</rules>"#;

pub struct LlmErrorAnalyzer {
    generator: ObjectGenerator,
    options: CompletionOptions,
}

impl LlmErrorAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize, temperature: f32) -> Self {
        Self {
            generator: ObjectGenerator::new(llm, max_attempts),
            options: CompletionOptions::with_temperature(temperature),
        }
    }
}

#[async_trait]
impl ErrorAnalyzer for LlmErrorAnalyzer {
    async fn analyze(&self, diary: &[String]) -> Result<ErrorAnalysis, AgentError> {
        let system = with_schema_instruction(ANALYZER_PROMPT, &schema_json::<ErrorAnalysis>());
        let steps = format!("<steps>\n{}\n</steps>", diary.join("\n\n"));
        let analysis: ErrorAnalysis = self
            .generator
            .generate(&system, &[Message::user(steps)], &self.options)
            .await?;
        tracing::info!(blame = %analysis.blame, improvement = %analysis.improvement, "error analysis");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_analyze_sends_diary_as_steps() {
        let mock = Arc::new(MockLlmClient::with_responses([
            r#"{"recap":"searched once","blame":"answered too early","improvement":"read sources","questionsToAnswer":["who founded it?"]}"#,
        ]));
        let analyzer = LlmErrorAnalyzer::new(mock.clone(), 2, 0.0);
        let analysis = analyzer
            .analyze(&["At step 1, search.".to_string(), "At step 2, answer.".to_string()])
            .await
            .unwrap();
        assert_eq!(analysis.blame, "answered too early");
        assert_eq!(analysis.questions_to_answer, vec!["who founded it?".to_string()]);

        let calls = mock.calls();
        assert!(calls[0][1].content.contains("<steps>"));
        assert!(calls[0][1].content.contains("At step 2, answer."));
    }

    #[test]
    fn test_missing_questions_default_to_empty() {
        let a: ErrorAnalysis = serde_json::from_str(r#"{"recap":"r","blame":"b","improvement":"i"}"#).unwrap();
        assert!(a.questions_to_answer.is_empty());
    }
}
