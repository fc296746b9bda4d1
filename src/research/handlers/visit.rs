//! visit 处理器
//!
//! 规范化目标 URL、去掉已访问、截断后并发读取；每个尝试过的 URL 都记为已访问。
//! 单个读取失败互不影响；全部失败或没有新 URL 时本会话内永久关闭 visit。

use futures_util::future::join_all;
use serde_json::json;

use crate::core::AgentError;
use crate::memory::KnowledgeItem;
use crate::research::action::{ActionKind, VisitAction};
use crate::research::loop_::{Researcher, StepOutcome};
use crate::research::session::Session;
use crate::tools::{choose_k, normalize_url, remove_all_line_breaks};

impl Researcher {
    pub(crate) async fn handle_visit(
        &self,
        session: &mut Session,
        action: VisitAction,
    ) -> Result<StepOutcome, AgentError> {
        let mut candidates: Vec<String> = Vec::new();
        for url in action.url_targets.iter().map(|u| normalize_url(u)) {
            if !url.is_empty() && !session.urls.is_visited(&url) && !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        let targets = choose_k(&candidates, self.options.max_urls_per_step);

        if targets.is_empty() {
            session.diary.push(format!(
                "At step {}, you took the **visit** action. But then you realized you have already visited these URLs and you already know very well about their contents.\nYou decided to think out of the box or cut from a completely different angle.",
                session.step
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "action": "visit",
                "think": action.think,
                "urlTargets": action.url_targets,
                "result": "You have visited all possible URLs and found no new information. You must think out of the box or different angle!!!",
            });
            session.log_step(entry);
            session.exhaust(ActionKind::Visit);
            return Ok(StepOutcome::Continue);
        }

        self.trackers
            .action_tracker
            .track_think(format!("Reading: {}", targets.join(", ")));

        let fetcher = &self.collaborators.fetcher;
        let results = join_all(targets.iter().map(|url| fetcher.fetch(url))).await;

        let mut read = Vec::new();
        for (url, result) in targets.iter().zip(results) {
            session.urls.mark_visited(url.clone());
            match result {
                Ok(page) if !page.content.trim().is_empty() => {
                    let source = if page.url.is_empty() { url.clone() } else { page.url };
                    session
                        .knowledge
                        .push(KnowledgeItem::url(&source, remove_all_line_breaks(&page.content)));
                    read.push(url.clone());
                }
                Ok(_) => tracing::warn!(url = %url, "fetched page is empty"),
                Err(e) => tracing::warn!(url = %url, error = %e, "fetch failed"),
            }
        }

        if read.is_empty() {
            session.diary.push(format!(
                "At step {}, you took the **visit** action and try to visit some URLs but failed to read the content. You need to think out of the box or cut from a completely different angle.",
                session.step
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "action": "visit",
                "think": action.think,
                "urlTargets": targets,
                "result": "You have tried all possible URLs and found no new information. You must think out of the box or different angle!!!",
            });
            session.log_step(entry);
            session.exhaust(ActionKind::Visit);
        } else {
            session.diary.push(format!(
                "At step {}, you took the **visit** action and deep dive into the following URLs:\n{}\nYou found some useful information on the web and add them to your knowledge for future reference.",
                session.step,
                read.join("\n")
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "question": session.current_question,
                "action": "visit",
                "think": action.think,
                "urlTargets": targets,
                "read": read,
            });
            session.log_step(entry);
        }
        Ok(StepOutcome::Continue)
    }
}
