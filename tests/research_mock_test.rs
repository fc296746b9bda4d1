//! 研究循环集成测试：真实的 LLM 协作者 + Mock LLM，搜索与读取用本地假实现

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use sleuth::core::AgentError;
    use sleuth::llm::{LlmClient, MockLlmClient, TrackedLlmClient};
    use sleuth::memory::SearchResultMeta;
    use sleuth::observability::TrackerContext;
    use sleuth::research::{
        Collaborators, LexicalDeduplicator, LlmActionOracle, LlmErrorAnalyzer, LlmEvaluator, LlmQueryRewriter,
        ResearchOptions, Researcher,
    };
    use sleuth::tools::{ContentFetcher, FetchedPage, SearchProvider};

    struct BookSearch {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchProvider for BookSearch {
        fn name(&self) -> &str {
            "books"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchResultMeta>, AgentError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![SearchResultMeta {
                title: "Dune (novel)".to_string(),
                url: "https://example.com/dune/".to_string(),
                description: "<em>Dune</em> is a 1965 science fiction novel".to_string(),
            }])
        }
    }

    struct BookFetcher;

    #[async_trait]
    impl ContentFetcher for BookFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, AgentError> {
            Ok(FetchedPage {
                url: url.to_string(),
                content: "Dune is a 1965 novel\nby American author Frank Herbert.".to_string(),
            })
        }
    }

    fn build(responses: Vec<&str>) -> (Researcher, Arc<MockLlmClient>, Arc<BookSearch>) {
        let mock = Arc::new(MockLlmClient::with_responses(responses).with_tokens_per_call(100));
        let trackers = TrackerContext::default();
        let role = |name: &str| -> Arc<dyn LlmClient> {
            Arc::new(TrackedLlmClient::new(mock.clone(), trackers.token_tracker.clone(), name))
        };
        let evaluator = Arc::new(LlmEvaluator::new(role("evaluator"), 2, 0.0));
        let search = Arc::new(BookSearch {
            queries: Mutex::new(Vec::new()),
        });
        let collaborators = Collaborators {
            oracle: Arc::new(LlmActionOracle::new(role("agent"), 2, 0.7, 0.7)),
            criteria: evaluator.clone(),
            evaluator,
            analyzer: Arc::new(LlmErrorAnalyzer::new(role("analyzer"), 2, 0.0)),
            rewriter: Arc::new(LlmQueryRewriter::new(role("rewriter"), 2, 0.1)),
            deduplicator: Arc::new(LexicalDeduplicator),
            search: search.clone(),
            fetcher: Arc::new(BookFetcher),
        };
        let options = ResearchOptions {
            step_sleep: std::time::Duration::ZERO,
            ..ResearchOptions::default()
        };
        (Researcher::new(collaborators, options, trackers), mock, search)
    }

    const CRITERIA: &str = r#"{"think":"single fact","needsFreshness":false,"needsPlurality":false}"#;
    const SEARCH: &str = r#"{"action":"search","think":"look it up","searchRequests":["who wrote dune"]}"#;
    const REWRITE: &str = r#"{"think":"simple","queries":["dune novel author"]}"#;
    const VISIT: &str = r#"{"action":"visit","think":"read the page","urlTargets":["example.com/dune"]}"#;
    const ANSWER: &str = r#"{"action":"answer","think":"found it","answer":"Frank Herbert wrote Dune.","references":[{"exactQuote":"by American author Frank Herbert","url":"https://example.com/dune"}]}"#;

    #[tokio::test]
    async fn test_search_visit_answer_with_references() {
        let (researcher, mock, search) = build(vec![
            CRITERIA,
            SEARCH,
            REWRITE,
            VISIT,
            ANSWER,
            r#"{"pass":true,"reasoning":"definitive"}"#,
        ]);

        let result = researcher.get_response("Who wrote Dune?").await.unwrap();

        assert!(result.answer.is_final);
        assert_eq!(result.total_steps, 3);
        assert_eq!(mock.call_count(), 6);
        assert_eq!(*search.queries.lock().unwrap(), vec!["dune novel author".to_string()]);
        assert_eq!(result.read_urls, vec!["https://example.com/dune".to_string()]);
        assert!(result.md_answer().contains(
            "[^1]: by American author Frank Herbert [Dune (novel)](https://example.com/dune)"
        ));

        let breakdown = researcher.trackers().token_tracker.breakdown();
        assert_eq!(breakdown.get("agent"), Some(&300));
        assert_eq!(breakdown.get("evaluator"), Some(&200));
        assert_eq!(breakdown.get("rewriter"), Some(&100));
        assert_eq!(researcher.trackers().action_tracker.len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_answer_is_retried_after_analysis() {
        let (researcher, mock, _) = build(vec![
            CRITERIA,
            SEARCH,
            REWRITE,
            r#"{"action":"answer","think":"guess","answer":"Probably Isaac Asimov."}"#,
            r#"{"pass":false,"reasoning":"hedged and wrong"}"#,
            r#"{"recap":"searched once then guessed","blame":"answered before reading","improvement":"visit the page first","questionsToAnswer":[]}"#,
            VISIT,
            ANSWER,
            r#"{"pass":true,"reasoning":"definitive"}"#,
        ]);

        let result = researcher.get_response("Who wrote Dune?").await.unwrap();

        assert!(result.answer.is_final);
        assert_eq!(result.answer.answer, "Frank Herbert wrote Dune.");
        assert_eq!(result.bad_attempts, 1);
        assert_eq!(result.total_steps, 4);
        assert_eq!(mock.call_count(), 9);

        // 被拒后的 prompt 带上失败记录与改进策略
        let calls = mock.calls();
        let visit_prompt = &calls[6][0].content;
        assert!(visit_prompt.contains("Probably Isaac Asimov."));
        assert!(visit_prompt.contains("visit the page first"));
    }

    #[tokio::test]
    async fn test_unparseable_oracle_reply_is_reprompted() {
        let (researcher, mock, _) = build(vec![
            CRITERIA,
            "I think I should answer now.",
            r#"{"action":"answer","think":"","answer":"Frank Herbert"}"#,
        ]);

        let result = researcher.get_response("Who wrote Dune?").await.unwrap();
        assert_eq!(result.answer.answer, "Frank Herbert");
        assert_eq!(mock.call_count(), 3);
    }
}
