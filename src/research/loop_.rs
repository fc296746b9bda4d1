//! 研究主循环
//!
//! 每步：计数 -> 计算允许的动作 -> 取下一个问题 -> 准备评估标准 -> 询问 Oracle -> 记录动作 ->
//! 重置开关 -> 分派处理器 -> 步间等待。
//! 继续条件：已用 token < 0.9 * 预算 且 bad_attempts <= max_bad_attempts。
//! 循环结束仍无定稿答案时执行一次强制作答（beast mode），最后组装结果。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::config::AgentSection;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::Message;
use crate::observability::action_tracker::ActionRecord;
use crate::observability::TrackerContext;
use crate::research::action::{ActionKind, StepAction};
use crate::research::analyzer::ErrorAnalyzer;
use crate::research::dedup::{Deduplicator, LexicalDeduplicator};
use crate::research::dump::DebugDumper;
use crate::research::evaluator::{AnswerEvaluator, CriteriaProvider, EvaluationKind};
use crate::research::oracle::{ActionOracle, OracleRequest};
use crate::research::prompt::build_system_prompt;
use crate::research::result::{assemble, ResearchResult};
use crate::research::rewriter::QueryRewriter;
use crate::research::schema::{ActionPermissions, ActionSchema};
use crate::research::session::Session;
use crate::tools::{ContentFetcher, SearchProvider};

/// 预算中留给强制作答的比例
const BUDGET_RESERVE_RATIO: f64 = 0.9;

/// 外部协作者：Oracle、评估、分析、改写、去重、搜索、读取
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn ActionOracle>,
    pub criteria: Arc<dyn CriteriaProvider>,
    pub evaluator: Arc<dyn AnswerEvaluator>,
    pub analyzer: Arc<dyn ErrorAnalyzer>,
    pub rewriter: Arc<dyn QueryRewriter>,
    pub deduplicator: Arc<dyn Deduplicator>,
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
}

/// 循环参数（来自 [agent] 与 [debug] 配置）
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub token_budget: u64,
    pub max_bad_attempts: usize,
    pub step_sleep: Duration,
    pub max_queries_per_step: usize,
    pub max_urls_per_step: usize,
    pub max_reflect_per_step: usize,
    pub max_unvisited_urls: usize,
    pub allow_coding: bool,
    pub oracle_max_attempts: usize,
    pub dump_dir: Option<PathBuf>,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self::from(&AgentSection::default())
    }
}

impl From<&AgentSection> for ResearchOptions {
    fn from(cfg: &AgentSection) -> Self {
        Self {
            token_budget: cfg.token_budget,
            max_bad_attempts: cfg.max_bad_attempts,
            step_sleep: Duration::from_millis(cfg.step_sleep_ms),
            max_queries_per_step: cfg.max_queries_per_step,
            max_urls_per_step: cfg.max_urls_per_step,
            max_reflect_per_step: cfg.max_reflect_per_step,
            max_unvisited_urls: cfg.max_unvisited_urls,
            allow_coding: cfg.allow_coding,
            oracle_max_attempts: cfg.oracle_max_attempts.max(1),
            dump_dir: None,
        }
    }
}

impl ResearchOptions {
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }
}

/// 单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// 本步得到定稿答案
    Finalized,
    /// 根问题在重试上限处再次被拒
    RetriesExhausted,
}

/// 研究智能体：持有协作者、参数与共享的 token / 动作追踪器
pub struct Researcher {
    pub(crate) collaborators: Collaborators,
    pub(crate) options: ResearchOptions,
    pub(crate) trackers: TrackerContext,
    recovery: RecoveryEngine,
}

impl Researcher {
    pub fn new(collaborators: Collaborators, options: ResearchOptions, trackers: TrackerContext) -> Self {
        Self {
            collaborators,
            options,
            trackers,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn options(&self) -> &ResearchOptions {
        &self.options
    }

    pub fn trackers(&self) -> &TrackerContext {
        &self.trackers
    }

    /// 回答一个问题
    pub async fn get_response(&self, question: &str) -> Result<ResearchResult, AgentError> {
        let session = Session::new(question, self.options.token_budget, self.options.allow_coding);
        self.run(session).await
    }

    /// 以对话回答：最后一条 user 消息为根问题
    pub async fn get_response_with_messages(&self, messages: Vec<Message>) -> Result<ResearchResult, AgentError> {
        let session = Session::from_messages(messages, self.options.token_budget, self.options.allow_coding)
            .ok_or_else(|| AgentError::ConfigError("no user question in messages".to_string()))?;
        self.run(session).await
    }

    /// 运行主循环直到定稿、预算耗尽或重试上限，必要时强制作答，然后组装结果
    pub async fn run(&self, mut session: Session) -> Result<ResearchResult, AgentError> {
        tracing::info!(session = %session.id, question = %session.question, "research started");

        while self.should_continue(&session) {
            match self.step(&mut session).await? {
                StepOutcome::Continue => {}
                StepOutcome::Finalized => break,
                StepOutcome::RetriesExhausted => {
                    tracing::warn!(bad_attempts = session.bad_attempts, "retry ceiling reached");
                    break;
                }
            }
        }

        if !session.this_step.is_final_answer() {
            self.beast_mode(&mut session).await?;
        }

        if let Some(dir) = &self.options.dump_dir {
            if let Err(e) = DebugDumper::new(dir.clone()).dump(&session).await {
                tracing::warn!(error = %e, "failed to write debug dump");
            }
        }

        tracing::info!(
            session = %session.id,
            total_step = session.total_step,
            bad_attempts = session.bad_attempts,
            tokens = %self.trackers.token_tracker.summary(),
            "research finished"
        );
        assemble(session, self.trackers.clone())
    }

    /// 已用 token < 0.9 * 预算 且 bad_attempts <= max_bad_attempts
    pub fn should_continue(&self, session: &Session) -> bool {
        let used = self.trackers.token_tracker.total() as f64;
        used < BUDGET_RESERVE_RATIO * session.token_budget as f64
            && session.bad_attempts <= self.options.max_bad_attempts
    }

    /// 执行一步
    pub async fn step(&self, session: &mut Session) -> Result<StepOutcome, AgentError> {
        session.step += 1;
        session.total_step += 1;

        let gaps_before = session.gaps.len();
        session.permissions.reflect = session.permissions.reflect && gaps_before <= 1;
        session.permissions.search =
            session.permissions.search && session.unvisited_count() < self.options.max_unvisited_urls;
        if !session.permissions.any() {
            session.permissions.set(ActionKind::Answer, true);
        }

        let question = session.next_question();
        session.current_question = question.clone();

        let used = self.trackers.token_tracker.total();
        tracing::info!(
            step = session.step,
            total_step = session.total_step,
            budget_used = %format!("{:.1}%", used as f64 * 100.0 / session.token_budget.max(1) as f64),
            gaps = gaps_before,
            question = %question,
            "step"
        );

        self.ensure_criteria(session, &question).await;

        let action = self.ask_oracle(session, false).await?;
        self.trackers.action_tracker.track_action(ActionRecord {
            total_step: session.total_step,
            action: action.clone(),
            gaps: session.gaps.to_vec(),
            bad_attempts: session.bad_attempts,
        });
        if !action.think().is_empty() {
            self.trackers.action_tracker.track_think(action.think());
        }
        session.this_step = action.clone();

        session.reset_permissions();

        let outcome = match action {
            StepAction::Answer(answer) => self.handle_answer(session, answer).await?,
            other if !other.has_payload() => {
                tracing::warn!(action = %other.kind(), "action without payload, skipped");
                StepOutcome::Continue
            }
            StepAction::Search(search) => self.handle_search(session, search).await?,
            StepAction::Visit(visit) => self.handle_visit(session, visit).await?,
            StepAction::Reflect(reflect) => self.handle_reflect(session, reflect).await?,
            StepAction::Coding(coding) => self.handle_coding(session, coding).await?,
        };

        if !self.options.step_sleep.is_zero() {
            tokio::time::sleep(self.options.step_sleep).await;
        }
        Ok(outcome)
    }

    /// 评估标准按问题原文缓存，只请求一次；请求失败时退回 definitive
    async fn ensure_criteria(&self, session: &mut Session, question: &str) {
        if session.evaluation_metrics.contains_key(question) {
            return;
        }
        let criteria = match self.collaborators.criteria.criteria_for(question).await {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => vec![EvaluationKind::Definitive],
            Err(e) => {
                tracing::warn!(error = %e, "criteria request failed, using definitive only");
                vec![EvaluationKind::Definitive]
            }
        };
        session.evaluation_metrics.insert(question.to_string(), criteria);
    }

    /// 构建 prompt 与 Schema 并询问 Oracle；返回的动作不在允许集合内时重提示
    async fn ask_oracle(&self, session: &mut Session, beast_mode: bool) -> Result<StepAction, AgentError> {
        let prompt = build_system_prompt(session, beast_mode);
        let schema = ActionSchema::new(session.permissions);
        session.last_prompt = Some(prompt.clone());
        session.last_schema = Some(schema.as_value().clone());

        let mut messages = session.messages.clone();
        if !session.is_root(&session.current_question) {
            messages.push(Message::user(format!(
                "Focus on this sub-question first: {}",
                session.current_question
            )));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let action = self
                .collaborators
                .oracle
                .choose_action(OracleRequest {
                    system_prompt: &prompt,
                    messages: &messages,
                    schema: &schema,
                    beast_mode,
                })
                .await?;
            let err = match schema.validate(&action) {
                Ok(()) => return Ok(action),
                Err(e) => e,
            };
            if attempt >= self.options.oracle_max_attempts {
                return Err(err);
            }
            match self.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(p) => {
                    tracing::warn!(attempt, error = %err, "oracle returned a disallowed action");
                    messages.push(Message::user(p));
                }
                _ => return Err(err),
            }
        }
    }

    /// 强制作答：只允许 answer，结果无条件定稿
    async fn beast_mode(&self, session: &mut Session) -> Result<(), AgentError> {
        tracing::info!(total_step = session.total_step + 1, "entering beast mode");
        session.step += 1;
        session.total_step += 1;
        session.permissions = ActionPermissions::answer_only();

        let action = self.ask_oracle(session, true).await?;
        let mut answer = match action {
            StepAction::Answer(a) => a,
            other => {
                return Err(AgentError::SchemaMismatch {
                    action: other.kind().to_string(),
                    allowed: ActionKind::Answer.to_string(),
                })
            }
        };
        answer.is_final = true;
        session.this_step = StepAction::Answer(answer);

        self.trackers.action_tracker.track_action(ActionRecord {
            total_step: session.total_step,
            action: session.this_step.clone(),
            gaps: session.gaps.to_vec(),
            bad_attempts: session.bad_attempts,
        });
        let entry = json!({
            "totalStep": session.total_step,
            "question": session.question,
            "beastMode": true,
            "action": session.this_step,
        });
        session.log_step(entry);
        Ok(())
    }

    /// 去重失败时退回词法去重
    pub(crate) async fn dedup(&self, candidates: &[String], existing: &[String]) -> Vec<String> {
        match self.collaborators.deduplicator.dedup(candidates, existing).await {
            Ok(unique) => unique,
            Err(e) => {
                tracing::warn!(error = %e, "dedup failed, falling back to lexical dedup");
                LexicalDeduplicator.filter(candidates, existing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::KnowledgeKind;
    use crate::research::action::CodingAction;
    use crate::research::testing::{answer, reflect, search, visit, HarnessBuilder};

    fn session_for(h: &crate::research::testing::Harness, question: &str) -> Session {
        Session::new(question, h.researcher.options().token_budget, h.researcher.options().allow_coding)
    }

    #[tokio::test]
    async fn test_first_step_answer_is_trusted() {
        let h = HarnessBuilder::new(vec![answer("Paris")]).build();
        let mut s = session_for(&h, "What is the capital of France?");
        assert_eq!(h.researcher.step(&mut s).await.unwrap(), StepOutcome::Finalized);
        assert!(s.this_step.is_final_answer());
        assert_eq!(s.bad_attempts, 0);
        assert!(s.bad_context.is_empty());
        assert_eq!(h.evaluator.call_count(), 0);

        let h = HarnessBuilder::new(vec![answer("Paris")]).build();
        let result = h.researcher.get_response("What is the capital of France?").await.unwrap();
        assert!(result.answer.is_final);
        assert_eq!(result.answer.answer, "Paris");
        assert_eq!(result.total_steps, 1);
        assert_eq!(result.bad_attempts, 0);
        assert_eq!(h.trackers.action_tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_ceiling_routes_to_beast_mode() {
        let script = vec![
            search(&["alpha"]),
            answer("guess one"),
            search(&["bravo"]),
            answer("guess two"),
            search(&["charlie"]),
            answer("guess three"),
            search(&["delta"]),
            answer("guess four"),
            answer("forced answer"),
        ];
        let h = HarnessBuilder::new(script).verdicts(vec![], false).build();
        let result = h.researcher.get_response("Who is the CEO of Example Corp?").await.unwrap();

        assert!(result.answer.is_final);
        assert_eq!(result.answer.answer, "forced answer");
        assert_eq!(result.bad_attempts, 3);
        assert_eq!(result.total_steps, 9);
        assert_eq!(h.evaluator.call_count(), 4);

        let calls = h.oracle.calls();
        assert_eq!(calls.len(), 9);
        let last = calls.last().unwrap();
        assert!(last.beast_mode);
        assert_eq!(last.allowed, vec![ActionKind::Answer]);
        // 第四次被拒不再记录
        assert!(last.system_prompt.contains("<attempt-3>"));
        assert!(!last.system_prompt.contains("<attempt-4>"));
        // 被拒后的下一步不允许 answer
        assert!(!calls[2].allowed.contains(&ActionKind::Answer));
        assert!(calls[3].allowed.contains(&ActionKind::Answer));
    }

    #[tokio::test]
    async fn test_search_dedups_before_calling_provider() {
        let h = HarnessBuilder::new(vec![search(&[
            "rust async runtime",
            "Rust async runtime",
            "rust async runtime?",
            "tokio scheduler design",
            "Tokio Scheduler design",
        ])])
        .deduplicator(Arc::new(LexicalDeduplicator))
        .build();
        let mut s = session_for(&h, "How does the tokio scheduler work?");
        assert_eq!(h.researcher.step(&mut s).await.unwrap(), StepOutcome::Continue);

        assert_eq!(h.search.call_count(), 2);
        assert_eq!(s.all_keywords, vec!["rust async runtime", "tokio scheduler design"]);
        assert_eq!(s.urls.known_count(), 4);
        assert!(s.urls.get("https://example.com/rust-async-runtime/1").is_some());
        assert_eq!(s.knowledge.count_of(KnowledgeKind::SideInfo), 2);
        assert!(!s.knowledge.items()[0].answer.contains("<b>"));
        assert!(!s.is_exhausted(ActionKind::Search));
    }

    #[tokio::test]
    async fn test_search_failures_are_isolated_and_exhaust_when_all_fail() {
        let h = HarnessBuilder::new(vec![search(&["alpha"]), search(&["alpha"])]).build();
        let mut s = session_for(&h, "q?");
        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.search.call_count(), 1);
        // 同一关键词再次出现，去重后没有可执行的查询
        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.search.call_count(), 1);
        assert!(s.is_exhausted(ActionKind::Search));
        assert!(!s.permissions.search);
        assert!(s.diary.last().unwrap().contains("think out of the box"));
    }

    #[tokio::test]
    async fn test_one_failing_query_does_not_stop_the_next() {
        let h = HarnessBuilder::new(vec![search(&["alpha", "bravo"]), search(&["charlie", "delta"])])
            .search_fail_on(&["alpha"])
            .search_empty_on(&["charlie"])
            .build();
        let mut s = session_for(&h, "q?");

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.search.call_count(), 2);
        assert_eq!(s.all_keywords, vec!["bravo".to_string()]);
        assert_eq!(s.knowledge.count_of(KnowledgeKind::SideInfo), 1);
        assert_eq!(
            s.knowledge.items()[0].question,
            "What do Internet say about \"bravo\"?"
        );
        assert!(s.permissions.search);
        assert!(!s.is_exhausted(ActionKind::Search));

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.search.call_count(), 4);
        assert_eq!(s.all_keywords, vec!["bravo".to_string(), "delta".to_string()]);
        assert!(s.permissions.search);
    }

    #[tokio::test]
    async fn test_all_failing_queries_disable_search() {
        let h = HarnessBuilder::new(vec![search(&["alpha", "bravo"]), search(&["charlie"])])
            .search_fail_on(&["alpha"])
            .search_empty_on(&["bravo"])
            .build();
        let mut s = session_for(&h, "q?");

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.search.call_count(), 2);
        assert!(s.all_keywords.is_empty());
        assert!(s.knowledge.is_empty());
        assert!(s.is_exhausted(ActionKind::Search));
        assert!(!s.permissions.search);

        h.researcher.step(&mut s).await.unwrap();
        assert!(!h.oracle.calls()[1].allowed.contains(&ActionKind::Search));
    }

    #[tokio::test]
    async fn test_visit_isolates_failures_and_never_retries() {
        let h = HarnessBuilder::new(vec![
            visit(&["https://a.com/1", "https://broken.example/x", "https://c.com/3#top"]),
            visit(&["https://broken.example/x", "https://d.com/4"]),
            visit(&["https://a.com/1"]),
        ])
        .build();
        let mut s = session_for(&h, "q?");

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(s.knowledge.count_of(KnowledgeKind::Url), 2);
        assert_eq!(s.urls.visited().len(), 3);
        assert!(s.urls.is_visited("https://broken.example/x"));
        assert!(s.urls.is_visited("https://c.com/3"));
        assert!(!s.knowledge.items()[0].answer.contains('\n'));

        h.researcher.step(&mut s).await.unwrap();
        let fetched = h.fetcher.fetched.lock().unwrap().clone();
        assert_eq!(fetched.len(), 4);
        assert_eq!(fetched.last().unwrap(), "https://d.com/4");

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.fetcher.fetched.lock().unwrap().len(), 4);
        assert!(s.is_exhausted(ActionKind::Visit));
    }

    #[tokio::test]
    async fn test_reflect_with_only_known_questions_disables_reflect() {
        let root = "What is the airspeed of an unladen swallow?";
        let h = HarnessBuilder::new(vec![reflect(&[root]), search(&["swallow speed"]), search(&["bird flight"])]).build();
        let mut s = session_for(&h, root);

        h.researcher.step(&mut s).await.unwrap();
        assert!(s.gaps.is_empty());
        assert!(s.is_exhausted(ActionKind::Reflect));
        assert_eq!(s.all_questions, vec![root.to_string()]);

        h.researcher.step(&mut s).await.unwrap();
        h.researcher.step(&mut s).await.unwrap();
        let calls = h.oracle.calls();
        assert!(calls[0].allowed.contains(&ActionKind::Reflect));
        assert!(!calls[1].allowed.contains(&ActionKind::Reflect));
        assert!(!calls[2].allowed.contains(&ActionKind::Reflect));
    }

    #[tokio::test]
    async fn test_reflect_enqueues_new_questions_before_root() {
        let h = HarnessBuilder::new(vec![reflect(&["who built it?", "when was it built?", "who built it?"])])
            .build();
        let mut s = session_for(&h, "Why was the tower built?");
        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(
            s.gaps.to_vec(),
            vec!["who built it?", "when was it built?", "Why was the tower built?"]
        );
        assert_eq!(s.all_questions.len(), 3);
        assert_eq!(s.step_log.len(), 1);
    }

    #[tokio::test]
    async fn test_budget_stops_before_next_step() {
        let h = HarnessBuilder::new(vec![
            search(&["alpha"]),
            search(&["bravo"]),
            search(&["charlie"]),
            answer("best effort"),
        ])
        .tokens_per_call(300)
        .options(|o| o.token_budget = 1000)
        .build();
        let result = h.researcher.get_response("q?").await.unwrap();

        assert!(result.answer.is_final);
        assert_eq!(result.answer.answer, "best effort");
        assert_eq!(result.total_steps, 4);
        assert_eq!(h.search.call_count(), 3);
        let calls = h.oracle.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[3].beast_mode);
        assert_eq!(h.trackers.token_tracker.total(), 1200);
    }

    #[tokio::test]
    async fn test_budgeted_tracker_still_reaches_budget_stop() {
        let h = HarnessBuilder::new(vec![
            search(&["alpha"]),
            search(&["bravo"]),
            search(&["charlie"]),
            answer("forced"),
            search(&["delta"]),
            search(&["echo"]),
        ])
        .tokens_per_call(400)
        .tracker_budget(1000)
        .options(|o| o.token_budget = 1000)
        .build();
        let result = h.researcher.get_response("q?").await.unwrap();

        assert!(result.answer.is_final);
        assert_eq!(result.answer.answer, "forced");
        assert_eq!(result.total_steps, 4);
        assert_eq!(h.search.call_count(), 3);
        let calls = h.oracle.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[3].beast_mode);
        // 超出预算的用量同样计入
        assert_eq!(h.trackers.token_tracker.total(), 1600);
        assert!(!h.researcher.should_continue(&Session::new("q?", 1000, false)));
    }

    #[tokio::test]
    async fn test_root_failure_decomposes_into_sub_questions() {
        let root = "Which company acquired Example Corp?";
        let h = HarnessBuilder::new(vec![
            search(&["example corp acquisition"]),
            answer("Nobody"),
            search(&["example corp buyer"]),
            answer("Acme bought it"),
        ])
        .verdicts(vec![false, true], true)
        .analyzer_questions(&["sub one?", "sub two?"])
        .build();
        let mut s = session_for(&h, root);

        h.researcher.step(&mut s).await.unwrap();
        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(s.bad_attempts, 1);
        assert_eq!(s.step, 0);
        assert_eq!(s.total_step, 2);
        assert!(s.diary.is_empty());
        assert_eq!(s.bad_context.len(), 1);
        assert_eq!(s.bad_context[0].improvement, "read more sources");
        assert_eq!(s.knowledge.count_of(KnowledgeKind::Qa), 1);
        assert_eq!(s.gaps.to_vec(), vec!["sub one?", "sub two?", root]);
        assert!(s.all_questions.contains(&"sub two?".to_string()));
        assert!(!s.permissions.answer);

        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(s.current_question, "sub one?");
        let calls = h.oracle.calls();
        assert_eq!(calls[2].allowed, vec![ActionKind::Search, ActionKind::Visit]);

        // 子问题通过评估：写入知识，会话继续
        let outcome = h.researcher.step(&mut s).await.unwrap();
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(s.current_question, "sub two?");
        assert!(!s.this_step.is_final_answer());
        assert_eq!(s.knowledge.count_of(KnowledgeKind::Qa), 2);
        assert!(s.diary.last().unwrap().contains("sub-question"));
    }

    #[tokio::test]
    async fn test_sub_question_rejection_is_absorbed() {
        let h = HarnessBuilder::new(vec![reflect(&["sub?"]), answer("maybe")])
            .verdicts(vec![false], true)
            .build();
        let mut s = session_for(&h, "root?");
        h.researcher.step(&mut s).await.unwrap();
        let outcome = h.researcher.step(&mut s).await.unwrap();
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(s.current_question, "sub?");
        assert_eq!(h.evaluator.call_count(), 1);
        assert_eq!(s.bad_attempts, 0);
        assert!(s.bad_context.is_empty());
        assert_eq!(s.knowledge.count_of(KnowledgeKind::Qa), 0);
        assert!(s.diary.last().unwrap().contains("rejected"));
        assert_eq!(s.gaps.to_vec(), vec!["root?"]);
    }

    #[tokio::test]
    async fn test_coding_is_a_contract_violation() {
        let coding = StepAction::Coding(CodingAction {
            think: "count".into(),
            coding_issue: "count vowels in 'banana'".into(),
        });
        let h = HarnessBuilder::new(vec![coding]).options(|o| o.allow_coding = true).build();
        let mut s = session_for(&h, "How many vowels in banana?");
        let err = h.researcher.step(&mut s).await.unwrap_err();
        assert!(matches!(err, AgentError::CodingNotImplemented));
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn test_disallowed_action_is_reprompted_by_controller() {
        let h = HarnessBuilder::new(vec![answer("too early"), search(&["alpha"])]).build();
        let mut s = session_for(&h, "q?");
        s.permissions.set(ActionKind::Answer, false);
        assert_eq!(h.researcher.step(&mut s).await.unwrap(), StepOutcome::Continue);
        assert_eq!(h.oracle.calls().len(), 2);
        assert_eq!(s.this_step.kind(), ActionKind::Search);
        assert_eq!(h.trackers.action_tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_criteria_are_memoized_per_question() {
        let h = HarnessBuilder::new(vec![search(&["alpha"]), search(&["bravo"])]).build();
        let mut s = session_for(&h, "q?");
        h.researcher.step(&mut s).await.unwrap();
        h.researcher.step(&mut s).await.unwrap();
        assert_eq!(h.criteria.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(s.evaluation_metrics.contains_key("q?"));
    }

    #[tokio::test]
    async fn test_empty_payload_is_skipped() {
        let h = HarnessBuilder::new(vec![search(&[])]).build();
        let mut s = session_for(&h, "q?");
        assert_eq!(h.researcher.step(&mut s).await.unwrap(), StepOutcome::Continue);
        assert_eq!(h.search.call_count(), 0);
        assert!(!s.is_exhausted(ActionKind::Search));
    }

    #[tokio::test]
    async fn test_continuation_predicate() {
        let h = HarnessBuilder::new(vec![]).options(|o| o.token_budget = 100).build();
        let mut s = session_for(&h, "q?");
        assert!(h.researcher.should_continue(&s));
        s.bad_attempts = 3;
        assert!(h.researcher.should_continue(&s));
        s.bad_attempts = 4;
        assert!(!h.researcher.should_continue(&s));
        s.bad_attempts = 0;
        h.trackers.token_tracker.track_usage("agent", 90);
        assert!(!h.researcher.should_continue(&s));
    }

    #[tokio::test]
    async fn test_debug_dump_is_written_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump");
        let h = HarnessBuilder::new(vec![answer("42")])
            .options(|o| o.dump_dir = Some(path.clone()))
            .build();
        h.researcher.get_response("meaning of life?").await.unwrap();
        assert!(path.join("prompt-1.txt").exists());
        assert!(path.join("knowledge.json").exists());
    }
}
