//! 研究智能体装配
//!
//! create_llm_from_config 按 [llm] 段选择后端（deepseek / openai / mock），
//! create_researcher 为每个角色包一层 TrackedLlmClient 并接上搜索与读取后端。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{key_or_env, AppConfig, LlmSection};
use crate::core::AgentError;
use crate::llm::deepseek::DEEPSEEK_BASE_URL;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, TrackedLlmClient};
use crate::observability::TrackerContext;
use crate::research::{
    Collaborators, Deduplicator, LexicalDeduplicator, LlmActionOracle, LlmDeduplicator, LlmErrorAnalyzer,
    LlmEvaluator, LlmQueryRewriter, ResearchOptions, Researcher,
};
use crate::tools::{create_content_fetcher, create_search_provider};

/// 根据配置创建 LLM 客户端；缺少密钥或后端未知时退回 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let timeout = Duration::from_secs(cfg.request_timeout_secs.max(1));
    match cfg.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        "openai" => match key_or_env(&cfg.api_key, "OPENAI_API_KEY") {
            Some(key) => {
                tracing::info!("Using OpenAI LLM ({})", cfg.model);
                Arc::new(
                    OpenAiClient::new(cfg.base_url.as_deref(), &cfg.model, Some(key.as_str())).with_timeout(timeout),
                )
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient::new())
            }
        },
        "deepseek" => {
            let key = key_or_env(&cfg.api_key, "DEEPSEEK_API_KEY")
                .or_else(|| key_or_env(&None, "OPENAI_API_KEY"));
            tracing::info!("Using DeepSeek LLM ({})", cfg.model);
            match (key, cfg.base_url.as_deref()) {
                (None, _) => {
                    tracing::warn!("DEEPSEEK_API_KEY not set, using Mock LLM");
                    Arc::new(MockLlmClient::new())
                }
                (Some(_), None) if cfg.api_key.is_none() => {
                    Arc::new(create_deepseek_client(Some(&cfg.model)).with_timeout(timeout))
                }
                (Some(key), base) => Arc::new(
                    OpenAiClient::new(Some(base.unwrap_or(DEEPSEEK_BASE_URL)), &cfg.model, Some(key.as_str()))
                        .with_timeout(timeout),
                ),
            }
        }
        other => {
            tracing::warn!("Unknown LLM provider {}, using Mock LLM", other);
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 装配 Researcher：各角色共享同一个 LLM 后端，用量按角色名记入 trackers.token_tracker
pub fn create_researcher(cfg: &AppConfig, trackers: TrackerContext) -> Result<Researcher, AgentError> {
    let base = create_llm_from_config(&cfg.llm);
    let tracker = trackers.token_tracker.clone();
    let role = |name: &str| -> Arc<dyn LlmClient> {
        Arc::new(TrackedLlmClient::new(base.clone(), tracker.clone(), name))
    };

    let temps = &cfg.llm.temperatures;
    let attempts = cfg.agent.oracle_max_attempts.max(1);

    let evaluator = Arc::new(LlmEvaluator::new(role("evaluator"), attempts, temps.evaluator));
    let deduplicator: Arc<dyn Deduplicator> = match cfg.agent.dedup.to_lowercase().as_str() {
        "lexical" => Arc::new(LexicalDeduplicator),
        _ => Arc::new(LlmDeduplicator::new(role("dedup"), attempts, temps.dedup)),
    };

    let collaborators = Collaborators {
        oracle: Arc::new(LlmActionOracle::new(role("agent"), attempts, temps.agent, temps.beast_mode)),
        criteria: evaluator.clone(),
        evaluator,
        analyzer: Arc::new(LlmErrorAnalyzer::new(role("analyzer"), attempts, temps.analyzer)),
        rewriter: Arc::new(LlmQueryRewriter::new(role("rewriter"), attempts, temps.rewriter)),
        deduplicator,
        search: create_search_provider(&cfg.search, tracker.clone())?,
        fetcher: create_content_fetcher(&cfg.reader, &cfg.search.jina_api_key, tracker.clone())?,
    };

    let options = ResearchOptions::from(&cfg.agent).with_dump_dir(cfg.debug.dump_dir.clone());
    tracing::info!(
        budget = options.token_budget,
        search = %cfg.search.provider,
        reader = %cfg.reader.provider,
        dedup = %cfg.agent.dedup,
        "researcher ready"
    );
    Ok(Researcher::new(collaborators, options, trackers))
}
