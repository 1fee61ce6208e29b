use serde::{Deserialize, Serialize};

/// A multiple-choice quiz question. Immutable once fetched for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Audit-trail entry for an incorrect submission, reported to the backend
/// when the streak completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswer {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub selected_index: usize,
}
