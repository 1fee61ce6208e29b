use crate::models::Question;

fn item(id: &str, text: &str, options: [&str; 4], correct_index: usize) -> Question {
    Question {
        id: id.to_string(),
        question: text.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        correct_index,
        explanation: None,
    }
}

/// Fixed general-knowledge set used whenever the backend cannot supply
/// questions. Deterministic order; the session wraps over it for streaks
/// longer than five.
pub fn fallback_questions() -> Vec<Question> {
    vec![
        item(
            "fb1",
            "What is the capital of France?",
            ["London", "Berlin", "Paris", "Madrid"],
            2,
        ),
        item("fb2", "What is 7 x 8?", ["54", "56", "58", "62"], 1),
        item(
            "fb3",
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Saturn"],
            1,
        ),
        item(
            "fb4",
            "What year did the World Wide Web become publicly available?",
            ["1989", "1991", "1993", "1995"],
            1,
        ),
        item(
            "fb5",
            "What is the chemical symbol for gold?",
            ["Ag", "Fe", "Au", "Cu"],
            2,
        ),
    ]
}
