//! Bounded conversation history owned by the conversational responder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::capabilities::conversation::ConversationTopic;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// One user turn and the reply it got
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exchange {
    pub user_input: String,
    pub topic: ConversationTopic,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(user_input: &str, topic: ConversationTopic, response: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            topic,
            response: response.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Fixed-capacity ring buffer of exchanges. Oldest entries are dropped on overflow.
#[derive(Debug)]
pub struct ConversationHistory {
    capacity: usize,
    exchanges: Mutex<VecDeque<Exchange>>,
    started_at: DateTime<Utc>,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            exchanges: Mutex::new(VecDeque::with_capacity(capacity)),
            started_at: Utc::now(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn record(&self, exchange: Exchange) {
        let mut exchanges = self.exchanges.lock().await;
        exchanges.push_back(exchange);
        while exchanges.len() > self.capacity {
            exchanges.pop_front();
        }
    }

    /// Up to `n` most recent exchanges, oldest first
    pub async fn recent(&self, n: usize) -> Vec<Exchange> {
        let exchanges = self.exchanges.lock().await;
        let skip = exchanges.len().saturating_sub(n);
        exchanges.iter().skip(skip).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.exchanges.lock().await.len()
    }

    /// One-line session state, given to the model as context
    pub async fn summary(&self) -> String {
        let count = self.len().await;
        if count == 0 {
            "New conversation session started".to_string()
        } else {
            format!(
                "Conversation active with {} exchanges since {}",
                count,
                self.started_at.to_rfc3339()
            )
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(i: usize) -> Exchange {
        Exchange::new(&format!("msg {}", i), ConversationTopic::Casual, "ok")
    }

    #[tokio::test]
    async fn test_history_truncates_to_capacity() {
        let history = ConversationHistory::default();
        for i in 0..15 {
            history.record(exchange(i)).await;
        }
        assert_eq!(history.len().await, DEFAULT_HISTORY_CAPACITY);
        let all = history.recent(100).await;
        assert_eq!(all.first().unwrap().user_input, "msg 5");
        assert_eq!(all.last().unwrap().user_input, "msg 14");
    }

    #[tokio::test]
    async fn test_recent_returns_tail_in_order() {
        let history = ConversationHistory::new(5);
        for i in 0..4 {
            history.record(exchange(i)).await;
        }
        let tail: Vec<String> = history
            .recent(2)
            .await
            .into_iter()
            .map(|e| e.user_input)
            .collect();
        assert_eq!(tail, vec!["msg 2", "msg 3"]);
    }

    #[tokio::test]
    async fn test_summary() {
        let history = ConversationHistory::new(0);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len().await, 0);
        assert_eq!(history.summary().await, "New conversation session started");
        history.record(exchange(1)).await;
        assert!(history.summary().await.starts_with("Conversation active with 1 exchanges"));
    }

    #[tokio::test]
    async fn test_separate_histories_do_not_interfere() {
        let a = ConversationHistory::default();
        let b = ConversationHistory::default();
        a.record(exchange(1)).await;
        assert_eq!(a.len().await, 1);
        assert_eq!(b.len().await, 0);
    }
}
