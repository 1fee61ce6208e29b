mod fallback;
mod manager;
mod session;

pub use fallback::fallback_questions;
pub use manager::SessionManager;
pub use session::{AnswerOutcome, QuizSession, SessionPhase, REQUIRED_CORRECT};
