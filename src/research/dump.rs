//! 调试转储：运行结束后把最后一次 prompt、步骤日志、关键词、问题与知识写入目录
//!
//! 调用方只记录失败日志，不影响会话结果。

use std::path::PathBuf;

use serde::Serialize;

use crate::core::AgentError;
use crate::research::session::Session;

pub struct DebugDumper {
    dir: PathBuf,
}

impl DebugDumper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), AgentError> {
        let body = serde_json::to_string_pretty(value)
            .map_err(|e| AgentError::JsonParseError(e.to_string()))?;
        tokio::fs::write(self.dir.join(name), body).await?;
        Ok(())
    }

    pub async fn dump(&self, session: &Session) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let schema = session
            .last_schema
            .as_ref()
            .and_then(|s| serde_json::to_string_pretty(s).ok())
            .unwrap_or_default();
        let prompt = format!(
            "Prompt:\n\n{}\n\nJSONSchema:\n\n{}",
            session.last_prompt.as_deref().unwrap_or_default(),
            schema
        );
        tokio::fs::write(self.dir.join(format!("prompt-{}.txt", session.total_step)), prompt).await?;

        self.write_json("context.json", &session.step_log).await?;
        self.write_json("queries.json", &session.all_keywords).await?;
        self.write_json("questions.json", &session.all_questions).await?;
        self.write_json("knowledge.json", &session.knowledge).await?;
        tracing::debug!(dir = %self.dir.display(), "debug dump written");
        Ok(())
    }
}
