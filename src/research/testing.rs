//! 测试用协作者：脚本化 Oracle / 评估器，计数的搜索与读取，不访问网络

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::SearchResultMeta;
use crate::observability::token_tracker::TokenTracker;
use crate::observability::{ActionTracker, TrackerContext};
use crate::research::action::{
    ActionKind, AnswerAction, ReflectAction, SearchAction, StepAction, VisitAction,
};
use crate::research::analyzer::{ErrorAnalysis, ErrorAnalyzer};
use crate::research::dedup::Deduplicator;
use crate::research::evaluator::{AnswerEvaluator, CriteriaProvider, Evaluation, EvaluationKind};
use crate::research::loop_::{Collaborators, ResearchOptions, Researcher};
use crate::research::oracle::{ActionOracle, OracleRequest};
use crate::research::rewriter::QueryRewriter;
use crate::tools::{ContentFetcher, FetchedPage, SearchProvider};

pub fn search(queries: &[&str]) -> StepAction {
    StepAction::Search(SearchAction {
        think: "need more data".into(),
        search_requests: queries.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn visit(urls: &[&str]) -> StepAction {
    StepAction::Visit(VisitAction {
        think: "read sources".into(),
        url_targets: urls.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn reflect(questions: &[&str]) -> StepAction {
    StepAction::Reflect(ReflectAction {
        think: "find gaps".into(),
        questions_to_answer: questions.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn answer(text: &str) -> StepAction {
    StepAction::Answer(AnswerAction {
        think: "confident".into(),
        answer: text.to_string(),
        references: Vec::new(),
        is_final: false,
        md_answer: None,
    })
}

/// Oracle 收到的一次请求
#[derive(Debug, Clone)]
pub struct OracleCall {
    pub allowed: Vec<ActionKind>,
    pub beast_mode: bool,
    pub system_prompt: String,
}

/// 按脚本依次返回动作，每次调用按 tokens_per_call 记账；脚本用完后返回回答
pub struct ScriptedOracle {
    script: Mutex<VecDeque<StepAction>>,
    calls: Mutex<Vec<OracleCall>>,
    tracker: TokenTracker,
    tokens_per_call: u64,
}

impl ScriptedOracle {
    pub fn new(script: Vec<StepAction>, tracker: TokenTracker, tokens_per_call: u64) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            tracker,
            tokens_per_call,
        }
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionOracle for ScriptedOracle {
    async fn choose_action(&self, request: OracleRequest<'_>) -> Result<StepAction, AgentError> {
        self.calls.lock().unwrap().push(OracleCall {
            allowed: request.schema.permissions().allowed_kinds(),
            beast_mode: request.beast_mode,
            system_prompt: request.system_prompt.to_string(),
        });
        if self.tokens_per_call > 0 {
            self.tracker.track_usage("agent", self.tokens_per_call);
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| answer("fallback answer")))
    }
}

/// 固定返回 definitive，记录调用次数
#[derive(Default)]
pub struct FixedCriteria {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CriteriaProvider for FixedCriteria {
    async fn criteria_for(&self, _question: &str) -> Result<Vec<EvaluationKind>, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![EvaluationKind::Definitive])
    }
}

/// 依次返回脚本中的结论，用完后返回 default
pub struct ScriptedEvaluator {
    verdicts: Mutex<VecDeque<bool>>,
    default: bool,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    pub fn new(verdicts: Vec<bool>, default: bool) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            default,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.questions.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        _answer: &AnswerAction,
        _criteria: &[EvaluationKind],
        _visited_urls: &[String],
    ) -> Result<Evaluation, AgentError> {
        self.questions.lock().unwrap().push(question.to_string());
        let pass = self.verdicts.lock().unwrap().pop_front().unwrap_or(self.default);
        Ok(if pass {
            Evaluation::passed("looks right")
        } else {
            Evaluation::failed(EvaluationKind::Definitive, "too vague")
        })
    }
}

/// 返回固定的子问题
#[derive(Default)]
pub struct FakeAnalyzer {
    pub questions: Vec<String>,
}

#[async_trait]
impl ErrorAnalyzer for FakeAnalyzer {
    async fn analyze(&self, diary: &[String]) -> Result<ErrorAnalysis, AgentError> {
        Ok(ErrorAnalysis {
            recap: format!("{} steps", diary.len()),
            blame: "answered without evidence".into(),
            improvement: "read more sources".into(),
            questions_to_answer: self.questions.clone(),
        })
    }
}

/// 原样返回搜索请求
pub struct IdentityRewriter;

#[async_trait]
impl QueryRewriter for IdentityRewriter {
    async fn rewrite(&self, action: &SearchAction) -> Result<Vec<String>, AgentError> {
        Ok(action.search_requests.clone())
    }
}

/// 只去掉（忽略大小写与首尾空白后）完全相同的项
pub struct ExactDedup;

#[async_trait]
impl Deduplicator for ExactDedup {
    async fn dedup(&self, candidates: &[String], existing: &[String]) -> Result<Vec<String>, AgentError> {
        let key = |s: &str| s.trim().to_lowercase();
        let mut kept: Vec<String> = Vec::new();
        for c in candidates {
            let k = key(c.as_str());
            if !kept.iter().chain(existing.iter()).any(|o| key(o.as_str()) == k) {
                kept.push(c.trim().to_string());
            }
        }
        Ok(kept)
    }
}

/// 每条查询返回两条结果；fail_on 中的查询返回错误，empty_on 中的返回空列表
#[derive(Default)]
pub struct FakeSearch {
    pub queries: Mutex<Vec<String>>,
    pub fail_on: Vec<String>,
    pub empty_on: Vec<String>,
}

impl FakeSearch {
    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_on.iter().any(|f| f == query) {
            return Err(AgentError::SearchFailed(format!("fake failure for {}", query)));
        }
        if self.empty_on.iter().any(|e| e == query) {
            return Ok(Vec::new());
        }
        let slug: String = query
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        Ok((1..=2)
            .map(|i| SearchResultMeta {
                title: format!("{} result {}", query, i),
                url: format!("https://example.com/{}/{}/?utm_source=test", slug, i),
                description: format!("<b>{}</b> snippet {}", query, i),
            })
            .collect())
    }
}

/// URL 含 "broken" 时读取失败
#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AgentError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if url.contains("broken") {
            return Err(AgentError::FetchFailed {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(FetchedPage {
            url: url.to_string(),
            content: format!("Content of {}\nsecond line", url),
        })
    }
}

/// 一组测试协作者与构建好的 Researcher
pub struct Harness {
    pub oracle: Arc<ScriptedOracle>,
    pub criteria: Arc<FixedCriteria>,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub search: Arc<FakeSearch>,
    pub fetcher: Arc<FakeFetcher>,
    pub trackers: TrackerContext,
    pub researcher: Researcher,
}

pub struct HarnessBuilder {
    script: Vec<StepAction>,
    verdicts: Vec<bool>,
    default_verdict: bool,
    analyzer_questions: Vec<String>,
    deduplicator: Arc<dyn Deduplicator>,
    tokens_per_call: u64,
    tracker_budget: Option<u64>,
    search_fail_on: Vec<String>,
    search_empty_on: Vec<String>,
    options: ResearchOptions,
}

impl HarnessBuilder {
    pub fn new(script: Vec<StepAction>) -> Self {
        Self {
            script,
            verdicts: Vec::new(),
            default_verdict: true,
            analyzer_questions: Vec::new(),
            deduplicator: Arc::new(ExactDedup),
            tokens_per_call: 10,
            tracker_budget: None,
            search_fail_on: Vec::new(),
            search_empty_on: Vec::new(),
            options: ResearchOptions {
                step_sleep: Duration::ZERO,
                ..ResearchOptions::default()
            },
        }
    }

    pub fn verdicts(mut self, verdicts: Vec<bool>, default: bool) -> Self {
        self.verdicts = verdicts;
        self.default_verdict = default;
        self
    }

    pub fn analyzer_questions(mut self, questions: &[&str]) -> Self {
        self.analyzer_questions = questions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn deduplicator(mut self, dedup: Arc<dyn Deduplicator>) -> Self {
        self.deduplicator = dedup;
        self
    }

    pub fn tokens_per_call(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// 共享 TokenTracker 带预算
    pub fn tracker_budget(mut self, budget: u64) -> Self {
        self.tracker_budget = Some(budget);
        self
    }

    pub fn search_fail_on(mut self, queries: &[&str]) -> Self {
        self.search_fail_on = queries.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn search_empty_on(mut self, queries: &[&str]) -> Self {
        self.search_empty_on = queries.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn options(mut self, f: impl FnOnce(&mut ResearchOptions)) -> Self {
        f(&mut self.options);
        self
    }

    pub fn build(self) -> Harness {
        let trackers = match self.tracker_budget {
            Some(budget) => TrackerContext::new(TokenTracker::with_budget(budget), ActionTracker::new()),
            None => TrackerContext::default(),
        };
        let oracle = Arc::new(ScriptedOracle::new(
            self.script,
            trackers.token_tracker.clone(),
            self.tokens_per_call,
        ));
        let criteria = Arc::new(FixedCriteria::default());
        let evaluator = Arc::new(ScriptedEvaluator::new(self.verdicts, self.default_verdict));
        let search = Arc::new(FakeSearch {
            fail_on: self.search_fail_on,
            empty_on: self.search_empty_on,
            ..FakeSearch::default()
        });
        let fetcher = Arc::new(FakeFetcher::default());
        let collaborators = Collaborators {
            oracle: oracle.clone(),
            criteria: criteria.clone(),
            evaluator: evaluator.clone(),
            analyzer: Arc::new(FakeAnalyzer {
                questions: self.analyzer_questions,
            }),
            rewriter: Arc::new(IdentityRewriter),
            deduplicator: self.deduplicator,
            search: search.clone(),
            fetcher: fetcher.clone(),
        };
        let researcher = Researcher::new(collaborators, self.options, trackers.clone());
        Harness {
            oracle,
            criteria,
            evaluator,
            search,
            fetcher,
            trackers,
            researcher,
        }
    }
}
