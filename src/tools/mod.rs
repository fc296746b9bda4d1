//! 外部工具：搜索后端、网页读取、文本与 URL 工具

pub mod reader;
pub mod text;
pub mod web_search;

pub use reader::{create_content_fetcher, ContentFetcher, DirectReader, FetchedPage, JinaReader};
pub use text::{choose_k, normalize_url, remove_all_line_breaks, remove_extra_line_breaks, remove_html_tags};
pub use web_search::{create_search_provider, BraveSearch, JinaSearch, SearchProvider, SerperSearch};
