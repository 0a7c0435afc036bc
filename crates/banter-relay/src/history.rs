use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Reply texts kept per client session.
///
/// Each session holds at most `max_messages` replies (oldest dropped first) and at most
/// `max_sessions` sessions are tracked; the least recently used one is evicted to make
/// room for a new session.
pub struct SessionHistory {
    max_sessions: usize,
    max_messages: usize,
    inner: Mutex<Sessions>,
}

#[derive(Default)]
struct Sessions {
    logs: HashMap<String, SessionLog>,
    clock: u64,
}

struct SessionLog {
    messages: VecDeque<String>,
    last_used: u64,
}

impl SessionHistory {
    pub fn new(max_sessions: usize, max_messages: usize) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            max_messages: max_messages.max(1),
            inner: Mutex::new(Sessions::default()),
        }
    }

    pub fn record(&self, session_id: &str, message: &str) {
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.logs.contains_key(session_id) && sessions.logs.len() >= self.max_sessions {
            let oldest = sessions
                .logs
                .iter()
                .min_by_key(|(_, log)| log.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                log::debug!("[relay] evicting history for session {id}");
                sessions.logs.remove(&id);
            }
        }

        let log = sessions
            .logs
            .entry(session_id.to_string())
            .or_insert_with(|| SessionLog {
                messages: VecDeque::new(),
                last_used: now,
            });
        log.last_used = now;
        log.messages.push_back(message.to_string());
        while log.messages.len() > self.max_messages {
            log.messages.pop_front();
        }
    }

    /// Replies recorded for `session_id`, oldest first. Unknown sessions are empty.
    pub fn messages(&self, session_id: &str) -> Vec<String> {
        let sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .logs
            .get(session_id)
            .map(|log| log.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).logs.len()
    }
}
