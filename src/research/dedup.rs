//! 查询 / 问题去重
//!
//! 候选只有与所有已接受候选、以及 `existing` 中每一项的相似度都低于阈值（0.2）时才保留。
//! 仅搜索运算符不同（site:、filetype:、lang:、引号短语、+/- 等）的查询互不视为重复。

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::structured::{schema_json, with_schema_instruction};
use crate::llm::{CompletionOptions, LlmClient, ObjectGenerator};
use crate::memory::Message;

/// 相似度 ≥ 该值即视为重复
pub const SIMILARITY_THRESHOLD: f64 = 0.2;

const OPERATOR_PREFIXES: [&str; 6] = ["site:", "filetype:", "lang:", "loc:", "intitle:", "inbody:"];
const STOP_WORDS: [&str; 16] = [
    "a", "an", "the", "of", "in", "on", "for", "to", "and", "or", "is", "are", "what", "how", "with", "by",
];

static QUOTED_RE: OnceLock<Regex> = OnceLock::new();

#[async_trait]
pub trait Deduplicator: Send + Sync {
    /// 返回 candidates 中保留下来的项，保持原顺序
    async fn dedup(&self, candidates: &[String], existing: &[String]) -> Result<Vec<String>, AgentError>;
}

/// 查询拆成 基础词 + 运算符 两部分
#[derive(Debug, PartialEq, Eq)]
struct QueryShape {
    words: BTreeSet<String>,
    operators: BTreeSet<String>,
}

fn shape_of(query: &str) -> QueryShape {
    let re = QUOTED_RE.get_or_init(|| Regex::new(r#""[^"]*""#).unwrap());
    let mut operators: BTreeSet<String> = re
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let rest = re.replace_all(query, " ");

    let mut words = BTreeSet::new();
    for token in rest.split_whitespace() {
        let lower = token.to_lowercase();
        let is_operator = OPERATOR_PREFIXES.iter().any(|p| lower.starts_with(p))
            || ((lower.starts_with('+') || lower.starts_with('-')) && lower.len() > 1);
        if is_operator {
            operators.insert(lower);
            continue;
        }
        let word = lower.trim_matches(|c: char| !c.is_alphanumeric()).to_string();
        if !word.is_empty() && !STOP_WORDS.contains(&word.as_str()) {
            words.insert(word);
        }
    }
    QueryShape { words, operators }
}

/// 0–1 相似度：运算符集合不同时为 0，否则为基础词的 Jaccard 系数
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (shape_of(a), shape_of(b));
    if a.operators != b.operators {
        return 0.0;
    }
    let union = a.words.union(&b.words).count();
    if union == 0 {
        return 1.0;
    }
    a.words.intersection(&b.words).count() as f64 / union as f64
}

/// 纯词法去重，无外部调用；LLM 去重失败时作为回退
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalDeduplicator;

impl LexicalDeduplicator {
    pub fn filter(&self, candidates: &[String], existing: &[String]) -> Vec<String> {
        let mut accepted: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                continue;
            }
            let duplicate = accepted
                .iter()
                .chain(existing.iter())
                .any(|other| similarity(candidate, other) >= SIMILARITY_THRESHOLD);
            if !duplicate {
                accepted.push(candidate.to_string());
            }
        }
        accepted
    }
}

#[async_trait]
impl Deduplicator for LexicalDeduplicator {
    async fn dedup(&self, candidates: &[String], existing: &[String]) -> Result<Vec<String>, AgentError> {
        Ok(self.filter(candidates, existing))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DedupResponse {
    /// Strategic reasoning about the overall deduplication approach
    #[serde(default)]
    think: String,
    /// Array of semantically unique queries
    unique_queries: Vec<String>,
}

const DEDUP_PROMPT: &str = r#"You are an expert in semantic similarity analysis. Given a set of queries (setA) and a set of queries (setB)

<rules>
Function FilterSetA(setA, setB, threshold):
    filteredA = empty set
    for each candidateQuery in setA:
        isValid = true
        for each acceptedQuery in filteredA:
            if calculateSimilarity(candidateQuery, acceptedQuery) >= threshold:
                isValid = false
                break
        if isValid:
            for each queryB in setB:
                if calculateSimilarity(candidateQuery, queryB) >= threshold:
                    isValid = false
                    break
        if isValid:
            add candidateQuery to filteredA
    return filteredA
</rules>

<similarity-definition>
1. Consider semantic meaning and query intent, not just lexical similarity
2. Account for different phrasings of the same information need
3. Queries with same base keywords but different operators are NOT duplicates
4. Different aspects or perspectives of the same topic are not duplicates
5. Consider query specificity - a more specific query is not a duplicate of a general one
6. Search operators that make queries behave differently: site:, filetype:, lang:, loc:, exact match phrases, +/- inclusion and exclusion, intitle: and inbody:
</similarity-definition>"#;

/// LLM 语义去重；只会保留 candidates 中原有的项
pub struct LlmDeduplicator {
    generator: ObjectGenerator,
    options: CompletionOptions,
}

impl LlmDeduplicator {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize, temperature: f32) -> Self {
        Self {
            generator: ObjectGenerator::new(llm, max_attempts),
            options: CompletionOptions::with_temperature(temperature),
        }
    }
}

#[async_trait]
impl Deduplicator for LlmDeduplicator {
    async fn dedup(&self, candidates: &[String], existing: &[String]) -> Result<Vec<String>, AgentError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let system = with_schema_instruction(DEDUP_PROMPT, &schema_json::<DedupResponse>());
        let input = format!(
            "Now with threshold set to {}; run FilterSetA on the following:\nSetA: {}\nSetB: {}",
            SIMILARITY_THRESHOLD,
            serde_json::to_string(candidates).unwrap_or_default(),
            serde_json::to_string(existing).unwrap_or_default()
        );
        let resp: DedupResponse = self
            .generator
            .generate(&system, &[Message::user(input)], &self.options)
            .await?;
        tracing::debug!(think = %resp.think, unique = ?resp.unique_queries, "dedup");

        // 模型可能改写措辞，只接受原样出现在 candidates 中的项
        let mut kept: Vec<String> = Vec::new();
        for q in resp.unique_queries {
            let q = q.trim().to_string();
            if candidates.iter().any(|c| c.trim() == q) && !kept.contains(&q) {
                kept.push(q);
            }
        }
        Ok(kept)
    }
}
