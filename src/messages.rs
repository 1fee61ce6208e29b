use serde::{Deserialize, Serialize};

use crate::models::Question;
use crate::quiz::SessionPhase;

/// Kind of feedback attached to a quiz-state push, used by the overlay to
/// pick styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Correct,
    Wrong,
    Success,
}

/// One-way push from the background coordinator to a content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TabMessage {
    #[serde(rename = "BLOCK_PAGE", rename_all = "camelCase")]
    BlockPage {
        questions: Vec<Question>,
        current_question_index: usize,
        consecutive_correct: u32,
        required_correct: u32,
        last_wrong_selected_index: Option<usize>,
        phase: SessionPhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feedback_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feedback_type: Option<FeedbackType>,
    },
    #[serde(rename = "UNBLOCK_PAGE")]
    Unblock,
}

/// Request sent by a content script to the background coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentRequest {
    #[serde(rename = "QUIZ_ANSWER", rename_all = "camelCase")]
    QuizAnswer { selected_index: usize },
    #[serde(rename = "QUIZ_NEXT")]
    QuizNext,
    #[serde(rename = "QUIZ_REVEAL")]
    QuizReveal,
    #[serde(rename = "GET_STATUS")]
    GetStatus,
}

/// Reply to a [`ContentRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentResponse {
    #[serde(rename_all = "camelCase")]
    Status {
        is_blocked: bool,
        time_spent: f64,
        time_limit: f64,
    },
    Ack { success: bool },
}
