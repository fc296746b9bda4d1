//! search 处理器
//!
//! 请求自身去重并截断 -> 改写为关键词查询 -> 与历史关键词去重并截断 -> 逐条顺序调用搜索后端（每条之后等待）。
//! 单条失败或无结果只记日志；没有任何一条成功时本会话内永久关闭 search。

use serde_json::json;

use crate::core::AgentError;
use crate::memory::{KnowledgeItem, SearchResultMeta};
use crate::research::action::{ActionKind, SearchAction};
use crate::research::loop_::{Researcher, StepOutcome};
use crate::research::session::Session;
use crate::tools::{choose_k, normalize_url, remove_html_tags};

impl Researcher {
    pub(crate) async fn handle_search(
        &self,
        session: &mut Session,
        action: SearchAction,
    ) -> Result<StepOutcome, AgentError> {
        let max = self.options.max_queries_per_step;
        let requests = choose_k(&self.dedup(&action.search_requests, &[]).await, max);

        let rewritten = if requests.is_empty() {
            Vec::new()
        } else {
            let request = SearchAction {
                think: action.think.clone(),
                search_requests: requests.clone(),
            };
            match self.collaborators.rewriter.rewrite(&request).await {
                Ok(queries) if !queries.is_empty() => queries,
                Ok(_) => requests.clone(),
                Err(e) => {
                    tracing::warn!(error = %e, "query rewrite failed, using raw requests");
                    requests.clone()
                }
            }
        };
        let keywords = choose_k(&self.dedup(&rewritten, &session.all_keywords).await, max);
        let question = session.current_question.clone();

        let mut any_result = false;
        if !keywords.is_empty() {
            self.trackers
                .action_tracker
                .track_think(format!("Searching for: {}", keywords.join(", ")));

            for query in &keywords {
                tracing::info!(query = %query, provider = self.collaborators.search.name(), "search");
                match self.collaborators.search.search(query).await {
                    Ok(results) if !results.is_empty() => {
                        let results: Vec<SearchResultMeta> = results
                            .into_iter()
                            .map(|r| SearchResultMeta {
                                url: normalize_url(&r.url),
                                ..r
                            })
                            .filter(|r| !r.url.is_empty())
                            .collect();
                        let summary = remove_html_tags(
                            &results
                                .iter()
                                .map(|r| r.description.as_str())
                                .collect::<Vec<_>>()
                                .join("; "),
                        );
                        session.urls.merge(results);
                        session.all_keywords.push(query.clone());
                        session.knowledge.push(KnowledgeItem::side_info(query, summary));
                        any_result = true;
                    }
                    Ok(_) => tracing::warn!(query = %query, "search returned no results"),
                    Err(e) => tracing::warn!(query = %query, error = %e, "search failed"),
                }
                if !self.options.step_sleep.is_zero() {
                    tokio::time::sleep(self.options.step_sleep).await;
                }
            }
        }

        if any_result {
            session.diary.push(format!(
                "At step {}, you took the **search** action and look for external information for the question: \"{}\".\nIn particular, you tried to search for the following keywords: \"{}\".\nYou found quite some information and add them to your URL list and **visit** them later when needed.",
                session.step,
                question,
                keywords.join(", ")
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "question": question,
                "action": "search",
                "think": action.think,
                "searchRequests": requests,
                "keywords": keywords,
            });
            session.log_step(entry);
        } else {
            session.diary.push(format!(
                "At step {}, you took the **search** action and look for external information for the question: \"{}\".\nIn particular, you tried to search for the following keywords: {}.\nBut then you realized you have already searched for these keywords before, no new information is returned.\nYou decided to think out of the box or cut from a completely different angle.",
                session.step,
                question,
                keywords.join(", ")
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "action": "search",
                "think": action.think,
                "searchRequests": action.search_requests,
                "result": "You have tried all possible queries and found no new information. You must think out of the box or different angle!!!",
            });
            session.log_step(entry);
            session.exhaust(ActionKind::Search);
        }
        Ok(StepOutcome::Continue)
    }
}
