use serde::{Deserialize, Serialize};

use crate::models::{Question, WrongAnswer};

/// Consecutive correct answers required to unblock a domain.
pub const REQUIRED_CORRECT: u32 = 5;

/// Where a session currently sits in the answer/reveal/advance flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// The current question awaits an answer.
    Active,
    /// Last answer was wrong; the explanation is withheld until the user
    /// either retries in place or asks for a reveal.
    WrongCollapsed,
    /// Explanation and correct answer are shown; advancing needs an explicit
    /// next-question request.
    WrongRevealed,
    /// Streak requirement satisfied; the session is about to be torn down.
    Complete,
}

/// Result of a single answer submission.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Right answer, streak not yet finished.
    Correct { remaining: u32 },
    /// Right answer and the streak requirement is now met.
    Completed,
    /// New wrong answer; streak reset and the attempt recorded.
    Wrong { explanation: Option<String> },
    /// Same wrong option resubmitted for the same question without
    /// acknowledgment. Not penalized again.
    RepeatWrong,
    /// Submission arrived after the streak already completed.
    AlreadyComplete,
}

/// Per-domain quiz progression. Lives only in memory; a browser restart
/// drops it and a fresh one is built from the persisted blocked flag.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    current_question_index: usize,
    consecutive_correct: u32,
    required_correct: u32,
    wrong_answers: Vec<WrongAnswer>,
    // Guard against double-penalizing a duplicate click, keyed by
    // (question position, selected option) so a stale guard from an earlier
    // question can never suppress a genuine wrong answer.
    last_wrong: Option<(usize, usize)>,
    phase: SessionPhase,
}

impl QuizSession {
    /// `questions` must be nonempty; callers fall back to the built-in set
    /// before constructing a session.
    pub fn new(questions: Vec<Question>, required_correct: u32) -> Self {
        debug_assert!(!questions.is_empty());
        Self {
            questions,
            current_question_index: 0,
            consecutive_correct: 0,
            required_correct,
            wrong_answers: Vec::new(),
            last_wrong: None,
            phase: SessionPhase::Active,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// The question currently shown. Wraps modulo the question count so a
    /// short set (e.g. the 5 fallback items) supports any streak length.
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_question_index % self.questions.len()]
    }

    pub fn consecutive_correct(&self) -> u32 {
        self.consecutive_correct
    }

    pub fn required_correct(&self) -> u32 {
        self.required_correct
    }

    pub fn wrong_answers(&self) -> &[WrongAnswer] {
        &self.wrong_answers
    }

    pub fn last_wrong_selected_index(&self) -> Option<usize> {
        self.last_wrong.map(|(_, selected)| selected)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    /// Apply one answer submission. Valid in any phase except `Complete`;
    /// a retry with a different option while in a wrong phase counts as a
    /// fresh submission against the same question.
    pub fn submit_answer(&mut self, selected_index: usize) -> AnswerOutcome {
        if self.phase == SessionPhase::Complete {
            return AnswerOutcome::AlreadyComplete;
        }

        let position = self.current_question_index;
        let question = self.current_question().clone();

        if selected_index == question.correct_index {
            self.consecutive_correct += 1;
            self.last_wrong = None;

            if self.consecutive_correct >= self.required_correct {
                self.phase = SessionPhase::Complete;
                return AnswerOutcome::Completed;
            }

            self.current_question_index += 1;
            self.phase = SessionPhase::Active;
            return AnswerOutcome::Correct {
                remaining: self.required_correct - self.consecutive_correct,
            };
        }

        if self.last_wrong == Some((position, selected_index)) {
            return AnswerOutcome::RepeatWrong;
        }

        self.consecutive_correct = 0;
        self.last_wrong = Some((position, selected_index));
        self.wrong_answers.push(WrongAnswer {
            question: question.question.clone(),
            options: question.options.clone(),
            correct_index: question.correct_index,
            selected_index,
        });
        self.phase = SessionPhase::WrongCollapsed;

        AnswerOutcome::Wrong {
            explanation: question.explanation.clone(),
        }
    }

    /// Show the withheld explanation. Only meaningful right after a wrong
    /// answer; leaves streak and index untouched.
    pub fn reveal(&mut self) -> bool {
        if self.phase == SessionPhase::WrongCollapsed {
            self.phase = SessionPhase::WrongRevealed;
            true
        } else {
            false
        }
    }

    /// Explicit next-question request after a wrong answer. Clears the
    /// repeat-wrong guard and moves on without touching the streak.
    pub fn advance(&mut self) -> bool {
        match self.phase {
            SessionPhase::WrongCollapsed | SessionPhase::WrongRevealed => {
                self.last_wrong = None;
                self.current_question_index += 1;
                self.phase = SessionPhase::Active;
                true
            }
            SessionPhase::Active | SessionPhase::Complete => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, correct_index: usize) -> Question {
        Question {
            id: id.to_string(),
            question: format!("question {id}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
            explanation: Some(format!("because {id}")),
        }
    }

    fn session() -> QuizSession {
        // All five questions keyed to option 0 keeps the answer scripts
        // below readable.
        let questions = (0..5).map(|i| question(&format!("q{i}"), 0)).collect();
        QuizSession::new(questions, REQUIRED_CORRECT)
    }

    #[test]
    fn five_straight_correct_answers_complete() {
        let mut s = session();
        for _ in 0..4 {
            assert!(matches!(s.submit_answer(0), AnswerOutcome::Correct { .. }));
        }
        assert_eq!(s.submit_answer(0), AnswerOutcome::Completed);
        assert_eq!(s.phase(), SessionPhase::Complete);
        assert_eq!(s.consecutive_correct(), 5);
    }

    #[test]
    fn correct_answer_reports_remaining_count() {
        let mut s = session();
        assert_eq!(s.submit_answer(0), AnswerOutcome::Correct { remaining: 4 });
        assert_eq!(s.submit_answer(0), AnswerOutcome::Correct { remaining: 3 });
    }

    #[test]
    fn wrong_answer_resets_streak_and_records_attempt() {
        let mut s = session();
        s.submit_answer(0);
        s.submit_answer(0);
        assert_eq!(s.consecutive_correct(), 2);

        let outcome = s.submit_answer(3);
        assert!(matches!(outcome, AnswerOutcome::Wrong { .. }));
        assert_eq!(s.consecutive_correct(), 0);
        assert_eq!(s.wrong_answers().len(), 1);
        assert_eq!(s.wrong_answers()[0].selected_index, 3);
        assert_eq!(s.phase(), SessionPhase::WrongCollapsed);
    }

    #[test]
    fn repeated_identical_wrong_answer_is_not_penalized_twice() {
        let mut s = session();
        s.submit_answer(1);
        assert_eq!(s.wrong_answers().len(), 1);

        assert_eq!(s.submit_answer(1), AnswerOutcome::RepeatWrong);
        assert_eq!(s.wrong_answers().len(), 1);
        assert_eq!(s.consecutive_correct(), 0);
    }

    #[test]
    fn different_wrong_option_counts_as_new_wrong_answer() {
        let mut s = session();
        s.submit_answer(1);
        assert!(matches!(s.submit_answer(2), AnswerOutcome::Wrong { .. }));
        assert_eq!(s.wrong_answers().len(), 2);
        assert_eq!(s.last_wrong_selected_index(), Some(2));
    }

    #[test]
    fn retry_in_place_with_correct_option_restarts_streak() {
        let mut s = session();
        s.submit_answer(1);
        assert_eq!(s.submit_answer(0), AnswerOutcome::Correct { remaining: 4 });
        assert_eq!(s.consecutive_correct(), 1);
        assert_eq!(s.last_wrong_selected_index(), None);
        assert_eq!(s.phase(), SessionPhase::Active);
    }

    #[test]
    fn guard_is_scoped_to_the_question_position() {
        let mut s = session();
        s.submit_answer(1);
        assert!(s.advance());
        // Same selected option on the next question is a fresh wrong answer.
        assert!(matches!(s.submit_answer(1), AnswerOutcome::Wrong { .. }));
        assert_eq!(s.wrong_answers().len(), 2);
    }

    #[test]
    fn reveal_only_valid_while_collapsed() {
        let mut s = session();
        assert!(!s.reveal());

        s.submit_answer(1);
        assert!(s.reveal());
        assert_eq!(s.phase(), SessionPhase::WrongRevealed);
        assert!(!s.reveal());
    }

    #[test]
    fn advance_requires_a_wrong_phase() {
        let mut s = session();
        assert!(!s.advance());
        assert_eq!(s.current_question_index(), 0);

        s.submit_answer(1);
        s.reveal();
        assert!(s.advance());
        assert_eq!(s.current_question_index(), 1);
        assert_eq!(s.last_wrong_selected_index(), None);
        assert_eq!(s.phase(), SessionPhase::Active);
    }

    #[test]
    fn question_index_wraps_past_the_set_length() {
        let questions = vec![question("only", 0), question("other", 0)];
        let mut s = QuizSession::new(questions, REQUIRED_CORRECT);
        s.submit_answer(0);
        s.submit_answer(0);
        s.submit_answer(0);
        assert_eq!(s.current_question_index(), 3);
        assert_eq!(s.current_question().id, "other");
    }

    #[test]
    fn mixed_answer_script_completes_with_one_recorded_wrong() {
        // correct, correct, wrong(1), wrong(1) repeat, then five correct.
        let mut s = session();
        s.submit_answer(0);
        s.submit_answer(0);
        assert!(matches!(s.submit_answer(1), AnswerOutcome::Wrong { .. }));
        assert_eq!(s.submit_answer(1), AnswerOutcome::RepeatWrong);
        for _ in 0..4 {
            assert!(matches!(s.submit_answer(0), AnswerOutcome::Correct { .. }));
        }
        assert_eq!(s.submit_answer(0), AnswerOutcome::Completed);
        assert_eq!(s.wrong_answers().len(), 1);
    }

    #[test]
    fn submissions_after_completion_are_no_ops() {
        let mut s = session();
        for _ in 0..5 {
            s.submit_answer(0);
        }
        assert_eq!(s.submit_answer(0), AnswerOutcome::AlreadyComplete);
        assert_eq!(s.submit_answer(2), AnswerOutcome::AlreadyComplete);
        assert_eq!(s.wrong_answers().len(), 0);
    }
}
