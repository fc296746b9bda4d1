//! 文本与 URL 工具：URL 规范化、HTML 标签清除、换行整理、截取前 k 个

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
static EXTRA_BREAKS_RE: OnceLock<Regex> = OnceLock::new();
static LINE_BREAK_RE: OnceLock<Regex> = OnceLock::new();

/// 规范化 URL：补全 scheme、小写 host、去掉 fragment 与 utm_* 参数、去掉路径末尾的 `/`。
/// 无法解析时原样返回（去首尾空白）。
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let mut url = match Url::parse(&with_scheme) {
        Ok(u) => u,
        Err(_) => return trimmed.to_string(),
    };

    url.set_fragment(None);

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !k.starts_with("utm_")).collect();
    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != pairs.len() {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    let mut out = url.to_string();
    if url.path() == "/" && url.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    out
}

/// 去掉 HTML 标签
pub fn remove_html_tags(text: &str) -> String {
    let re = HTML_TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    re.replace_all(text, "").to_string()
}

/// 所有换行替换为空格（网页正文写入知识库前使用）
pub fn remove_all_line_breaks(text: &str) -> String {
    let re = LINE_BREAK_RE.get_or_init(|| Regex::new(r"(\r\n|\r|\n)+").unwrap());
    re.replace_all(text, " ").to_string()
}

/// 连续空行压缩为一个空行
pub fn remove_extra_line_breaks(text: &str) -> String {
    let re = EXTRA_BREAKS_RE.get_or_init(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());
    re.replace_all(text, "\n\n").to_string()
}

/// 取前 k 个
pub fn choose_k<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    items.iter().take(k).cloned().collect()
}
