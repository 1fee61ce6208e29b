//! Background gating engine for ScrollStop: accrues time spent on tracked
//! domains, blocks a domain once its limit is reached and gates unblocking
//! behind a streak of correct quiz answers.
//!
//! The hosting browser, persistence and the quiz backend are injected
//! collaborators; [`Coordinator`] is the event-driven core that host event
//! listeners forward into.

mod api;
mod coordinator;
mod db;
mod domain;
mod messages;
mod models;
mod quiz;
mod tabs;

pub use api::{ApiClient, ApiError, CompletionReport, ReportedWrongAnswer};
pub use coordinator::{Coordinator, HEARTBEAT_INTERVAL};
pub use db::Storage;
pub use domain::{extract_domain, is_tracked};
pub use messages::{ContentRequest, ContentResponse, FeedbackType, TabMessage};
pub use models::{
    DomainTimeRecord, Question, Settings, StoredUser, TimeTrackingMap, TrackedDomain, WrongAnswer,
};
pub use quiz::{
    fallback_questions, AnswerOutcome, QuizSession, SessionManager, SessionPhase, REQUIRED_CORRECT,
};
pub use tabs::{TabHost, TabId, TabInfo};
