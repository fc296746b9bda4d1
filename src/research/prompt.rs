//! 下一步动作的 system prompt：知识、日志、失败尝试与当前允许的动作说明

use crate::memory::KnowledgeItem;
use crate::research::session::Session;
use crate::tools::remove_extra_line_breaks;

fn knowledge_section(knowledge: &[KnowledgeItem]) -> String {
    let items = knowledge
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let refs = if k.references.is_empty() {
                String::new()
            } else {
                format!(
                    "\n<references>\n{}\n</references>\n",
                    serde_json::to_string(&k.references).unwrap_or_default()
                )
            };
            format!(
                "<knowledge-{n}>\n<question>\n{}\n</question>\n<answer>\n{}\n</answer>{}\n</knowledge-{n}>",
                k.question,
                k.answer,
                refs,
                n = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You have successfully gathered some knowledge which might be useful for answering the original question. Here is the knowledge you have gathered so far:\n<knowledge>\n\n{}\n\n</knowledge>",
        items
    )
}

fn bad_attempts_section(session: &Session) -> String {
    let attempts = session
        .bad_context
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "<attempt-{n}>\n- Question: {}\n- Answer: {}\n- Reject Reason: {}\n- Actions Recap: {}\n- Actions Blame: {}\n</attempt-{n}>",
                c.question,
                c.answer,
                c.evaluation,
                c.recap,
                c.blame,
                n = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let strategy = session
        .bad_context
        .iter()
        .map(|c| c.improvement.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Also, you have tried the following actions but failed to find the answer to the question:\n<bad-attempts>\n\n{}\n\n</bad-attempts>\n\nBased on the failed attempts, you have learned the following strategy:\n<learned-strategy>\n{}\n</learned-strategy>",
        attempts, strategy
    )
}

fn visit_section(session: &Session) -> String {
    let url_list = session
        .urls
        .unvisited()
        .iter()
        .map(|r| format!("  + \"{}\": \"{}\"", r.url, r.title))
        .collect::<Vec<_>>()
        .join("\n");
    let mut s = String::from("<action-visit>\n- Access and read full content from URLs\n- Must check URLs mentioned in <question>");
    if !url_list.is_empty() {
        s.push_str("\n- Review relevant URLs below for additional information\n<url-list>\n");
        s.push_str(&url_list);
        s.push_str("\n</url-list>");
    }
    s.push_str("\n</action-visit>");
    s
}

fn search_section(session: &Session) -> String {
    let mut s = String::from(
        "<action-search>\n- Use web search to find relevant information\n- Build a search request based on the deep intention behind the original question and the expected answer format\n- Always prefer a single search request, only add another request if the original question covers multiple aspects or elements and one query is not enough, each request focus on one specific aspect of the original question",
    );
    if !session.all_keywords.is_empty() {
        s.push_str("\n- Avoid those unsuccessful search requests and queries:\n<bad-requests>\n");
        s.push_str(&session.all_keywords.join("\n"));
        s.push_str("\n</bad-requests>");
    }
    s.push_str("\n</action-search>");
    s
}

const CODING_SECTION: &str = "<action-coding>\n- This solution helps you handle programming tasks like counting, filtering, transforming, sorting, regex extraction, and data processing.\n- Simply describe your problem in the \"codingIssue\" field. Include actual values for small inputs or variable names for larger datasets.\n- No code writing is required, senior engineers will handle the implementation.\n</action-coding>";

const ANSWER_SECTION: &str = "<action-answer>\n- For greetings, casual conversation, or general knowledge questions, answer directly without references.\n- For all other questions, provide a verified answer with references. Each reference must include exactQuote and url.";

const BEAST_SECTION: &str = "<action-answer>\nENGAGE MAXIMUM FORCE! ABSOLUTE PRIORITY OVERRIDE!\n\nPRIME DIRECTIVE:\n- DEMOLISH ALL HESITATION! ANY RESPONSE SURPASSES SILENCE!\n- PARTIAL STRIKES AUTHORIZED - DEPLOY WITH FULL CONTEXTUAL FIREPOWER\n- TACTICAL REUSE FROM <bad-attempts> SANCTIONED\n- WHEN IN DOUBT: UNLEASH CALCULATED STRIKES BASED ON AVAILABLE INTEL!\n\nFAILURE IS NOT AN OPTION. EXECUTE WITH EXTREME PREJUDICE!\n</action-answer>";

const REFLECT_SECTION: &str = "<action-reflect>\n- Critically examine <question>, <context>, <knowledge>, <bad-attempts>, and <learned-strategy> to identify gaps and the problems.\n- Identify gaps and ask key clarifying questions that deeply related to the original question and lead to the answer\n- Ensure each reflection:\n - Cuts to core emotional truths while staying anchored to original <question>\n - Transforms surface-level problems into deeper psychological insights\n - Makes the unconscious conscious\n</action-reflect>";

/// 按会话当前状态渲染 system prompt；beast_mode 时 answer 说明替换为强制作答指令
pub fn build_system_prompt(session: &Session, beast_mode: bool) -> String {
    let mut sections = vec![format!(
        "Current date: {}\n\nYou are an advanced AI research agent. You are specialized in multistep reasoning. Using your training data and prior lessons learned, answer the user question with absolute certainty.",
        chrono::Utc::now().to_rfc2822()
    )];

    if !session.knowledge.is_empty() {
        sections.push(knowledge_section(session.knowledge.items()));
    }
    if !session.diary.is_empty() {
        sections.push(format!(
            "You have conducted the following actions:\n<context>\n{}\n\n</context>",
            session.diary.join("\n")
        ));
    }
    if !session.bad_context.is_empty() {
        sections.push(bad_attempts_section(session));
    }

    let perms = session.permissions;
    let mut actions = Vec::new();
    if perms.visit && !beast_mode {
        actions.push(visit_section(session));
    }
    if perms.coding && !beast_mode {
        actions.push(CODING_SECTION.to_string());
    }
    if perms.search && !beast_mode {
        actions.push(search_section(session));
    }
    if beast_mode {
        actions.push(BEAST_SECTION.to_string());
    } else if perms.answer {
        let mut answer = ANSWER_SECTION.to_string();
        if perms.reflect {
            answer.push_str("\n- If uncertain, use <action-reflect>");
        }
        answer.push_str("\n</action-answer>");
        actions.push(answer);
    }
    if perms.reflect && !beast_mode {
        actions.push(REFLECT_SECTION.to_string());
    }
    sections.push(format!(
        "Based on the current context, you must choose one of the following actions:\n<actions>\n{}\n</actions>",
        actions.join("\n\n")
    ));

    sections.push("Respond in valid JSON format matching exact JSON schema.".to_string());
    remove_extra_line_breaks(&sections.join("\n\n"))
}
