//! URL 账本：搜索发现的 URL 元数据 + 已访问集合
//!
//! 以规范化 URL 为键，同一 URL 后写覆盖先写；保留首次发现顺序，便于 prompt 输出稳定。
//! 访问过的 URL（无论抓取成功与否）不会再次被选中。

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// 搜索结果元数据（url 已规范化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultMeta {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct UrlLedger {
    known: HashMap<String, SearchResultMeta>,
    order: Vec<String>,
    visited: Vec<String>,
    visited_set: HashSet<String>,
}

impl UrlLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一批搜索结果（后写覆盖）
    pub fn merge(&mut self, results: impl IntoIterator<Item = SearchResultMeta>) {
        for r in results {
            if !self.known.contains_key(&r.url) {
                self.order.push(r.url.clone());
            }
            self.known.insert(r.url.clone(), r);
        }
    }

    pub fn get(&self, url: &str) -> Option<&SearchResultMeta> {
        self.known.get(url)
    }

    pub fn title_of(&self, url: &str) -> Option<&str> {
        self.known.get(url).map(|m| m.title.as_str())
    }

    /// 记为已访问；重复记录无副作用
    pub fn mark_visited(&mut self, url: impl Into<String>) {
        let url = url.into();
        if self.visited_set.insert(url.clone()) {
            self.visited.push(url);
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_set.contains(url)
    }

    /// 已访问 URL（按访问顺序）
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// 已知 URL（按首次发现顺序）
    pub fn known(&self) -> impl Iterator<Item = &SearchResultMeta> {
        self.order.iter().filter_map(|u| self.known.get(u))
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// 已发现但尚未访问的 URL
    pub fn unvisited(&self) -> Vec<&SearchResultMeta> {
        self.known().filter(|m| !self.is_visited(&m.url)).collect()
    }

    pub fn unvisited_count(&self) -> usize {
        self.order.iter().filter(|u| !self.is_visited(u)).count()
    }

    /// 已访问 ∪ 已发现，去重，已访问在前
    pub fn all_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.visited
            .iter()
            .chain(self.order.iter())
            .filter(|u| seen.insert(u.as_str()))
            .cloned()
            .collect()
    }
}
