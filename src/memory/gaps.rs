//! 待解决问题队列（FIFO）
//!
//! 初始只含根问题；失败恢复或反思发现子问题时，子问题入队后再把根问题追加到队尾，
//! 保证处理完子问题后总会回到根问题。

use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct GapQueue {
    items: VecDeque<String>,
}

impl GapQueue {
    /// 以根问题初始化
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            items: VecDeque::from(vec![root.into()]),
        }
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    /// 子问题依次入队，随后追加根问题
    pub fn enqueue_with_root(&mut self, questions: &[String], root: &str) {
        self.items.extend(questions.iter().cloned());
        self.items.push_back(root.to_string());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }
}
