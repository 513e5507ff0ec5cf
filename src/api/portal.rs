use std::collections::HashMap;
use std::str::FromStr;

use crate::api::client::{Auth, PortalClient};
use crate::api::ApiError;
use crate::quiz::scoring::Scoring;
use crate::quiz::session::QuizBackend;
use crate::quiz::{
    AnswerRecord, Difficulty, LoadedQuiz, Question, QuestionOutcome, QuizError, QuizOption, QuizRequest,
    SubmitTarget, Verdict, DEFAULT_TIME_LIMIT,
};

/// The two quiz backends the portal exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizVariant {
    /// `/api/techstack/...`: options come with correctness flags.
    TechStack,
    /// `/api/practice/...`: the server keeps the key and scores.
    Practice,
}

impl QuizVariant {
    pub fn scoring(self) -> Scoring {
        match self {
            QuizVariant::TechStack => Scoring::Client,
            QuizVariant::Practice => Scoring::Server,
        }
    }
}

impl FromStr for QuizVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "techstack" | "interview" => Ok(QuizVariant::TechStack),
            "practice" => Ok(QuizVariant::Practice),
            other => Err(format!("unknown quiz variant '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub levels: Vec<StackLevel>,
    #[serde(default)]
    pub question_counts: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackLevel {
    pub name: String,
    #[serde(default)]
    pub required_score: Option<u32>,
}

/// A level the chat can pick for a stack.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LevelOffer {
    pub level: Difficulty,
    /// Questions available, when the backend counts them.
    pub questions: Option<u32>,
    pub required_score: Option<u32>,
}

impl LevelOffer {
    pub fn is_available(&self) -> bool {
        self.questions != Some(0)
    }
}

impl TechStack {
    /// Levels to offer for this stack. Declared `levels` win, then
    /// `questionCounts` (levels without questions stay listed but are not
    /// available), then every difficulty.
    pub fn level_offers(&self) -> Vec<LevelOffer> {
        if !self.levels.is_empty() {
            return self
                .levels
                .iter()
                .filter_map(|l| match l.name.parse::<Difficulty>() {
                    Ok(level) => Some(LevelOffer {
                        level,
                        questions: None,
                        required_score: l.required_score,
                    }),
                    Err(_) => {
                        log::warn!("Stack {} declares unknown level '{}'", self.name, l.name);
                        None
                    }
                })
                .collect();
        }

        Difficulty::ALL
            .into_iter()
            .map(|level| LevelOffer {
                level,
                questions: if self.question_counts.is_empty() {
                    None
                } else {
                    Some(self.question_counts.get(level.slug()).copied().unwrap_or(0))
                },
                required_score: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizHistory {
    pub quiz_attempts: Vec<HistoryEntry>,
    pub stats: HistoryStats,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub tech_stack: HistoryStack,
    pub level: String,
    pub percentage_score: f64,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct HistoryStack {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_attempts: u32,
    pub pass_rate: f64,
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT
}

fn default_points() -> u32 {
    1
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackQuestion {
    #[serde(rename = "_id")]
    id: String,
    question: String,
    options: Vec<StackOption>,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default = "default_time_limit")]
    time_limit: u32,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackOption {
    text: String,
    #[serde(default)]
    is_correct: bool,
}

impl From<StackQuestion> for Question {
    fn from(q: StackQuestion) -> Self {
        let options = q
            .options
            .into_iter()
            .map(|o| QuizOption::new(o.text, Some(o.is_correct)))
            .collect();
        Question::new(q.id, q.question, options, q.time_limit, q.points)
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StartPractice<'a> {
    tech_stack_id: &'a str,
    difficulty: &'a str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PracticeStarted {
    attempt_id: String,
    questions: Vec<PracticeQuestion>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PracticeQuestion {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    question: String,
    options: Vec<String>,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default = "default_time_limit")]
    time_limit: u32,
}

#[derive(serde::Serialize)]
struct AnswerSheet<'a> {
    answers: &'a [AnswerRecord],
}

/// Practice submissions carry one chosen index per question, `null` when
/// the question went unanswered.
#[derive(serde::Serialize)]
struct ChoiceSheet {
    answers: Vec<Option<usize>>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    total_score: Option<u32>,
    #[serde(default)]
    questions: Vec<OutcomeBody>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeBody {
    #[serde(default)]
    question: String,
    #[serde(default)]
    selected_option: Option<i64>,
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    explanation: Option<String>,
}

impl From<SubmitResponse> for Verdict {
    fn from(response: SubmitResponse) -> Self {
        let outcomes = response
            .questions
            .into_iter()
            .map(|o| QuestionOutcome {
                question: o.question,
                selected: o.selected_option.and_then(|i| usize::try_from(i).ok()),
                is_correct: o.is_correct,
                explanation: o.explanation,
            })
            .collect();
        Verdict {
            total_score: response.total_score,
            outcomes,
        }
    }
}

/// Typed endpoints of the portal backend for one chat.
#[derive(Clone)]
pub struct PortalApi {
    client: PortalClient,
    variant: QuizVariant,
}

impl PortalApi {
    pub fn new(client: PortalClient, variant: QuizVariant) -> Self {
        Self { client, variant }
    }

    pub async fn tech_stacks(&self) -> Result<Vec<TechStack>, ApiError> {
        match self.variant {
            QuizVariant::TechStack => self.client.get(&["api", "techstack"], Auth::Optional).await,
            QuizVariant::Practice => {
                self.client
                    .get(&["api", "practice", "tech-stacks"], Auth::Optional)
                    .await
            }
        }
    }

    pub async fn quiz_history(&self) -> Result<QuizHistory, ApiError> {
        self.client
            .get(&["api", "profile", "quiz-attempts"], Auth::Required)
            .await
    }
}

impl QuizBackend for PortalApi {
    async fn load(&self, request: &QuizRequest) -> Result<LoadedQuiz, QuizError> {
        match self.variant {
            QuizVariant::TechStack => {
                let questions: Vec<StackQuestion> = self
                    .client
                    .get(
                        &[
                            "api",
                            "techstack",
                            request.stack_id.as_str(),
                            "questions",
                            request.level.title(),
                        ],
                        Auth::Required,
                    )
                    .await?;
                Ok(LoadedQuiz {
                    questions: questions.into_iter().map(Question::from).collect(),
                    target: SubmitTarget::TechStack {
                        stack_id: request.stack_id.clone(),
                        level: request.level,
                    },
                })
            }
            QuizVariant::Practice => {
                let body = StartPractice {
                    tech_stack_id: request.stack_id.as_str(),
                    difficulty: request.level.slug(),
                };
                let started: PracticeStarted = self
                    .client
                    .post(&["api", "practice", "start"], &body, Auth::Required)
                    .await?;
                let questions = started
                    .questions
                    .into_iter()
                    .enumerate()
                    .map(|(i, q)| {
                        let options = q
                            .options
                            .into_iter()
                            .map(|text| QuizOption::new(text, None))
                            .collect();
                        let id = q.id.unwrap_or_else(|| i.to_string());
                        Question::new(id, q.question, options, q.time_limit, q.points)
                    })
                    .collect();
                Ok(LoadedQuiz {
                    questions,
                    target: SubmitTarget::Practice {
                        attempt_id: started.attempt_id,
                    },
                })
            }
        }
    }

    async fn submit(&self, target: &SubmitTarget, answers: &[AnswerRecord]) -> Result<Verdict, QuizError> {
        let response: SubmitResponse = match target {
            SubmitTarget::TechStack { stack_id, level } => {
                self.client
                    .post(
                        &["api", "techstack", stack_id.as_str(), "questions", level.title(), "submit"],
                        &AnswerSheet { answers },
                        Auth::Required,
                    )
                    .await?
            }
            SubmitTarget::Practice { attempt_id } => {
                let sheet = ChoiceSheet {
                    answers: answers.iter().map(|a| a.selected_option_index).collect(),
                };
                self.client
                    .post(
                        &["api", "practice", "submit", attempt_id.as_str()],
                        &sheet,
                        Auth::Required,
                    )
                    .await?
            }
        };
        Ok(response.into())
    }
}
