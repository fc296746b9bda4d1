//! 知识库：只追加的 KnowledgeItem 序列
//!
//! 三类来源：qa（被拒或通过评估的问答）、side-info（搜索摘要）、url（读取的网页全文）。
//! 条目写入后不可修改，也不支持遗忘。

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 回答引用：原文片段 + URL；title 由 URL 账本补全，不出现在给 Oracle 的 Schema 中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Exact relevant quote from the document
    #[serde(default)]
    pub exact_quote: String,
    /// Source URL of the quote
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub title: Option<String>,
}

impl Reference {
    pub fn url_only(url: impl Into<String>) -> Self {
        Self {
            exact_quote: String::new(),
            url: url.into(),
            title: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeKind {
    Qa,
    SideInfo,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    #[serde(rename = "type")]
    pub kind: KnowledgeKind,
    pub updated: DateTime<Utc>,
}

impl KnowledgeItem {
    pub fn qa(question: impl Into<String>, answer: impl Into<String>, references: Vec<Reference>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            references,
            kind: KnowledgeKind::Qa,
            updated: Utc::now(),
        }
    }

    /// 一次搜索的结果摘要
    pub fn side_info(query: &str, summary: impl Into<String>) -> Self {
        Self {
            question: format!("What do Internet say about \"{}\"?", query),
            answer: summary.into(),
            references: Vec::new(),
            kind: KnowledgeKind::SideInfo,
            updated: Utc::now(),
        }
    }

    /// 一个网页的正文
    pub fn url(url: &str, content: impl Into<String>) -> Self {
        Self {
            question: format!("What is in {}?", url),
            answer: content.into(),
            references: vec![Reference::url_only(url)],
            kind: KnowledgeKind::Url,
            updated: Utc::now(),
        }
    }
}

/// 只追加的知识库
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: KnowledgeItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn count_of(&self, kind: KnowledgeKind) -> usize {
        self.items.iter().filter(|k| k.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
