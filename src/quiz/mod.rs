pub mod attempt;
pub mod render;
pub mod scoring;
pub mod session;

use std::fmt;
use std::str::FromStr;

use serde::Serializer;

/// Time limit used when the backend does not send one.
pub const DEFAULT_TIME_LIMIT: u32 = 30;

/// Wire value recorded for a question left unanswered.
pub const UNANSWERED: i64 = -1;

pub type QuestionSet = Vec<Question>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    /// Seconds the user has for this question.
    pub time_limit: u32,
    pub points: u32,
}

impl Question {
    pub fn new(id: String, text: String, options: Vec<QuizOption>, time_limit: u32, points: u32) -> Self {
        Self {
            id,
            text,
            options,
            time_limit,
            points,
        }
    }

    /// Index of the correct option, if the backend disclosed it.
    pub fn correct_option(&self) -> Option<usize> {
        self.options
            .iter()
            .position(|o| o.is_correct == Some(true))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizOption {
    pub text: String,
    /// Only known up front in the client-scored variant.
    pub is_correct: Option<bool>,
}

impl QuizOption {
    pub fn new(text: String, is_correct: Option<bool>) -> Self {
        Self { text, is_correct }
    }
}

/// One entry of the submitted answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    #[serde(serialize_with = "serialize_selection")]
    pub selected_option_index: Option<usize>,
    pub time_spent: u32,
}

fn serialize_selection<S: Serializer>(selected: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match selected {
        Some(index) => s.serialize_i64(*index as i64),
        None => s.serialize_i64(UNANSWERED),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub total_score: u32,
    /// Sum of the points of every question in the set.
    pub max_score: u32,
    /// Seconds spent over all questions.
    pub time_spent: u32,
    pub outcomes: Vec<QuestionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub question: String,
    pub selected: Option<usize>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    /// Capitalized form used in tech-stack question paths.
    pub fn title(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }

    /// Lowercase form used in practice request bodies.
    pub fn slug(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| QuizError::Validation(format!("unknown level '{}'", s.trim())))
    }
}

/// What the chat asked to practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub stack_id: String,
    pub level: Difficulty,
}

/// Where the answer sheet of a loaded quiz has to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    TechStack { stack_id: String, level: Difficulty },
    Practice { attempt_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedQuiz {
    pub questions: QuestionSet,
    pub target: SubmitTarget,
}

/// What the backend answered to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub total_score: Option<u32>,
    pub outcomes: Vec<QuestionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("Please login to attempt the quiz")]
    AuthRequired,
    #[error("You are not allowed to access this quiz")]
    Forbidden,
    #[error("{0}")]
    NetworkOrServer(String),
    #[error("Invalid quiz data: {0}")]
    Validation(String),
}
