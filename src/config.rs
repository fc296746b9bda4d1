//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SLEUTH__*` 覆盖（双下划线表示嵌套，如 `SLEUTH__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub search: SearchSection,
    pub reader: ReaderSection,
    pub debug: DebugSection,
}

/// [llm] 段：后端选择、各角色温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY / DEEPSEEK_API_KEY
    pub api_key: Option<String>,
    pub temperatures: TemperatureSection,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            api_key: None,
            temperatures: TemperatureSection::default(),
            request_timeout_secs: 60,
        }
    }
}

/// [llm.temperatures] 段：按角色区分的采样温度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemperatureSection {
    pub agent: f32,
    pub beast_mode: f32,
    pub evaluator: f32,
    pub analyzer: f32,
    pub rewriter: f32,
    pub dedup: f32,
}

impl Default for TemperatureSection {
    fn default() -> Self {
        Self {
            agent: 0.7,
            beast_mode: 0.7,
            evaluator: 0.0,
            analyzer: 0.0,
            rewriter: 0.1,
            dedup: 0.1,
        }
    }
}

/// [agent] 段：预算、重试上限与每步上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub token_budget: u64,
    pub max_bad_attempts: usize,
    /// 每次搜索调用后的等待（毫秒），测试中设为 0
    pub step_sleep_ms: u64,
    pub max_queries_per_step: usize,
    pub max_urls_per_step: usize,
    pub max_reflect_per_step: usize,
    /// 超过该数量的未访问 URL 时本步禁止 search
    pub max_unvisited_urls: usize,
    pub allow_coding: bool,
    /// 结构化回复解析失败时的最大尝试次数
    pub oracle_max_attempts: usize,
    /// 去重实现：llm / lexical
    pub dedup: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            token_budget: 1_000_000,
            max_bad_attempts: 3,
            step_sleep_ms: 1000,
            max_queries_per_step: 5,
            max_urls_per_step: 5,
            max_reflect_per_step: 3,
            max_unvisited_urls: 50,
            allow_coding: false,
            oracle_max_attempts: 3,
            dedup: "llm".to_string(),
        }
    }
}

/// [search] 段：搜索后端与密钥
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// jina / brave / serper
    pub provider: String,
    pub timeout_secs: u64,
    pub jina_api_key: Option<String>,
    pub brave_api_key: Option<String>,
    pub serper_api_key: Option<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            provider: "jina".to_string(),
            timeout_secs: 30,
            jina_api_key: None,
            brave_api_key: None,
            serper_api_key: None,
        }
    }
}

impl SearchSection {
    pub fn jina_key(&self) -> Option<String> {
        key_or_env(&self.jina_api_key, "JINA_API_KEY")
    }

    pub fn brave_key(&self) -> Option<String> {
        key_or_env(&self.brave_api_key, "BRAVE_API_KEY")
    }

    pub fn serper_key(&self) -> Option<String> {
        key_or_env(&self.serper_api_key, "SERPER_API_KEY")
    }
}

/// [reader] 段：网页读取后端、超时、最大字符数、域名白名单（空表示不限制）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    /// jina / direct
    pub provider: String,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            provider: "jina".to_string(),
            timeout_secs: 30,
            max_result_chars: 20_000,
            allowed_domains: Vec::new(),
        }
    }
}

/// [debug] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DebugSection {
    /// 设置后，运行结束把 prompt / context / queries / questions / knowledge 写入该目录
    pub dump_dir: Option<PathBuf>,
}

/// 配置值优先，否则读环境变量；空串视为未设置
pub(crate) fn key_or_env(value: &Option<String>, env: &str) -> Option<String> {
    value
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(env).ok().filter(|s| !s.trim().is_empty()))
}

/// 从 config 目录加载配置，环境变量 SLEUTH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SLEUTH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SLEUTH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.token_budget, 1_000_000);
        assert_eq!(cfg.agent.max_bad_attempts, 3);
        assert!(!cfg.agent.allow_coding);
        assert_eq!(cfg.search.provider, "jina");
        assert!(cfg.reader.allowed_domains.is_empty());
        assert!(cfg.debug.dump_dir.is_none());
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\ntoken_budget = 5000\nmax_bad_attempts = 1\n\n[llm]\nprovider = \"mock\"\n\n[llm.temperatures]\nagent = 0.2"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.token_budget, 5000);
        assert_eq!(cfg.agent.max_bad_attempts, 1);
        assert_eq!(cfg.agent.max_urls_per_step, 5);
        assert_eq!(cfg.llm.provider, "mock");
        assert!((cfg.llm.temperatures.agent - 0.2).abs() < f32::EPSILON);
        assert!((cfg.llm.temperatures.evaluator - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_key_or_env_prefers_config_value() {
        let v = Some("abc".to_string());
        assert_eq!(key_or_env(&v, "SLEUTH_TEST_UNSET_KEY"), Some("abc".to_string()));
        assert_eq!(key_or_env(&Some("  ".to_string()), "SLEUTH_TEST_UNSET_KEY"), None);
    }
}
