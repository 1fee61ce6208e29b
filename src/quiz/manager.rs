use std::collections::HashMap;

use crate::models::Question;

use super::session::QuizSession;

/// Owns every in-memory quiz session, keyed by domain. A session exists iff
/// the domain is blocked and a question set has been fetched; completion or
/// discard removes it exactly once.
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<String, QuizSession>,
    required_correct: u32,
}

impl SessionManager {
    pub fn new(required_correct: u32) -> Self {
        Self {
            sessions: HashMap::new(),
            required_correct,
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.sessions.contains_key(domain)
    }

    pub fn get(&self, domain: &str) -> Option<&QuizSession> {
        self.sessions.get(domain)
    }

    pub fn get_mut(&mut self, domain: &str) -> Option<&mut QuizSession> {
        self.sessions.get_mut(domain)
    }

    /// Create the session for `domain` if absent. `questions` is only used
    /// on creation, so a racing second caller keeps the first session.
    pub fn ensure(&mut self, domain: &str, questions: Vec<Question>) -> &mut QuizSession {
        let required = self.required_correct;
        self.sessions
            .entry(domain.to_string())
            .or_insert_with(|| QuizSession::new(questions, required))
    }

    /// Remove the session on streak completion, handing the final state back
    /// for reporting.
    pub fn complete(&mut self, domain: &str) -> Option<QuizSession> {
        self.sessions.remove(domain)
    }

    /// Drop a session without completing it (explicit user reset).
    pub fn discard(&mut self, domain: &str) {
        self.sessions.remove(domain);
    }
}
