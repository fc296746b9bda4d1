//! 查询改写：把一条搜索请求改写为若干带运算符的关键词查询

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::structured::{schema_json, with_schema_instruction};
use crate::llm::{CompletionOptions, LlmClient, ObjectGenerator};
use crate::memory::Message;
use crate::research::action::SearchAction;

#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, action: &SearchAction) -> Result<Vec<String>, AgentError>;
}

#[derive(Debug, Deserialize, JsonSchema)]
struct KeywordsResponse {
    /// Strategic reasoning about query complexity and search approach
    #[serde(default)]
    think: String,
    /// Array of search queries, orthogonal to each other, each less than 30 characters
    queries: Vec<String>,
}

const REWRITER_PROMPT: &str = r#"You are an expert Information Retrieval Assistant. Transform user queries into precise keyword combinations with strategic reasoning and appropriate search operators.

<rules>
1. Generate search queries that directly include appropriate operators
2. Keep base keywords minimal: 2-3 words preferred
3. Use exact match quotes for specific phrases that must stay together
4. Split queries only when necessary for distinctly different aspects
5. Preserve crucial qualifiers while removing fluff words
6. Make the query resistant to SEO manipulation
7. When necessary, append <query-operators> at the end only when must needed

<query-operators>
A query can't only have operators; and operators can't be at the start a query;

- "phrase" : exact match for phrases
- +term : must include term; for critical terms that must appear
- -term : exclude term; exclude irrelevant or ambiguous terms
- filetype:pdf/doc : specific file type
- site:example.com : limit to specific site
- lang:xx : language filter (ISO 639-1 code)
- loc:xx : location filter (ISO 3166-1 code)
- intitle:term : term must be in title
- inbody:term : term must be in body text
</query-operators>
</rules>"#;

pub struct LlmQueryRewriter {
    generator: ObjectGenerator,
    options: CompletionOptions,
}

impl LlmQueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize, temperature: f32) -> Self {
        Self {
            generator: ObjectGenerator::new(llm, max_attempts),
            options: CompletionOptions::with_temperature(temperature),
        }
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, action: &SearchAction) -> Result<Vec<String>, AgentError> {
        let system = with_schema_instruction(REWRITER_PROMPT, &schema_json::<KeywordsResponse>());
        let input = format!(
            "Input Query: {}\n\nIntention: {}",
            action.search_requests.join(" | "),
            action.think
        );
        let resp: KeywordsResponse = self
            .generator
            .generate(&system, &[Message::user(input)], &self.options)
            .await?;
        tracing::debug!(think = %resp.think, queries = ?resp.queries, "query rewrite");
        Ok(resp
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect())
    }
}
