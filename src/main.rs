//! Sleuth 命令行入口
//!
//! 用法：`sleuth [--config <file>] <question...>`。
//! 初始化日志、加载配置、装配 Researcher，回答问题后输出 Markdown 答案、URL 与 token 用量。

use std::path::PathBuf;

use anyhow::Context;
use sleuth::config::load_config;
use sleuth::create_researcher;
use sleuth::observability::{self, ActionTracker, TokenTracker, TrackerContext};

const USAGE: &str = "usage: sleuth [--config <file>] <question...>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut config_path: Option<PathBuf> = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context(USAGE)?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => words.push(arg),
        }
    }
    let question = words.join(" ");
    if question.trim().is_empty() {
        anyhow::bail!(USAGE);
    }

    let cfg = load_config(config_path).context("Failed to load config")?;
    let trackers = TrackerContext::new(
        TokenTracker::with_budget(cfg.agent.token_budget),
        ActionTracker::new(),
    );
    let researcher = create_researcher(&cfg, trackers).context("Failed to create researcher")?;

    let result = researcher
        .get_response(&question)
        .await
        .context("Research failed")?;

    println!("{}", result.md_answer());
    if !result.read_urls.is_empty() {
        println!("\nRead URLs:");
        for url in &result.read_urls {
            println!("- {}", url);
        }
    }
    println!(
        "\nSteps: {}, bad attempts: {}, {}",
        result.total_steps,
        result.bad_attempts,
        researcher.trackers().token_tracker.summary()
    );
    Ok(())
}
