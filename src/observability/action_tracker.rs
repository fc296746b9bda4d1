//! 动作轨迹：记录每一步 Oracle 选择的动作与若干思考提示
//!
//! 只追加；可克隆共享，跨会话复用时轨迹持续累积。每条记录同时通过 broadcast 通道推送。

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::research::StepAction;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 一步动作的快照
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub total_step: usize,
    pub action: StepAction,
    pub gaps: Vec<String>,
    pub bad_attempts: usize,
}

#[derive(Debug)]
struct Inner {
    records: Mutex<Vec<ActionRecord>>,
    thoughts: Mutex<Vec<String>>,
    events: broadcast::Sender<ActionRecord>,
}

#[derive(Debug, Clone)]
pub struct ActionTracker {
    inner: Arc<Inner>,
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(Vec::new()),
                thoughts: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    pub fn track_action(&self, record: ActionRecord) {
        self.inner
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        let _ = self.inner.events.send(record);
    }

    /// 记录一条面向用户的进度提示（如 "Searching for: ..."）
    pub fn track_think(&self, thought: impl Into<String>) {
        self.inner
            .thoughts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(thought.into());
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<ActionRecord> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn thoughts(&self) -> Vec<String> {
        self.inner
            .thoughts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionRecord> {
        self.inner.events.subscribe()
    }
}
