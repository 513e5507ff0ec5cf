use std::fmt::Write;

use crate::api::portal::{LevelOffer, QuizHistory};
use crate::quiz::{Question, SubmissionResult};

/// An attempt counts as passed from this percentage on.
pub const PASS_PERCENTAGE: f64 = 70.0;

pub fn question(index: usize, total: usize, question: &Question) -> String {
    let mut text = format!(
        "Question {} of {} ({}s, {} pts)\n\n{}\n",
        index + 1,
        total,
        question.time_limit,
        question.points,
        question.text
    );
    for (i, option) in question.options.iter().enumerate() {
        let _ = write!(text, "\n{}. {}", i + 1, option.text);
    }
    text
}

/// Button text of a level choice.
pub fn level(offer: &LevelOffer) -> String {
    match (offer.questions, offer.required_score) {
        (Some(1), _) => format!("{} (1 question)", offer.level),
        (Some(n), _) => format!("{} ({} questions)", offer.level, n),
        (None, Some(score)) => format!("{} (required score {}%)", offer.level, score),
        (None, None) => offer.level.to_string(),
    }
}

pub fn result(result: &SubmissionResult) -> String {
    let mut text = format!(
        "Quiz results\nScore: {} / {}\nTime taken: {} seconds\n",
        result.total_score, result.max_score, result.time_spent
    );
    for (i, outcome) in result.outcomes.iter().enumerate() {
        let mark = if outcome.is_correct { "✅" } else { "❌" };
        let answer = match outcome.selected {
            Some(option) => format!("Option {}", option + 1),
            None => "No answer".to_string(),
        };
        let _ = write!(
            text,
            "\n{}. {} {}\nYour answer: {}",
            i + 1,
            mark,
            outcome.question,
            answer
        );
        if let Some(explanation) = &outcome.explanation {
            let _ = write!(text, "\n{}", explanation);
        }
        text.push('\n');
    }
    text
}

pub fn history(history: &QuizHistory) -> String {
    if history.quiz_attempts.is_empty() {
        return "No quiz attempts yet".to_string();
    }

    let best = history
        .quiz_attempts
        .iter()
        .map(|a| a.percentage_score)
        .fold(f64::MIN, f64::max);
    let mut text = format!(
        "Quiz performance\nTotal attempts: {}\nBest score: {:.0}%\nPass rate: {:.0}%\n\nRecent attempts:",
        history.stats.total_attempts, best, history.stats.pass_rate
    );
    for attempt in &history.quiz_attempts {
        let status = if attempt.percentage_score >= PASS_PERCENTAGE {
            "Passed"
        } else {
            "Failed"
        };
        let date = attempt
            .completed_at
            .as_deref()
            .and_then(|d| d.split('T').next())
            .unwrap_or("-");
        let _ = write!(
            text,
            "\n{} · {} · {:.0}% · {} · {}",
            attempt.tech_stack.name, attempt.level, attempt.percentage_score, date, status
        );
    }
    text
}
