//! Timed multiple-choice attempt.
//!
//! `Attempt` is a plain synchronous state machine: it never sleeps and never
//! talks to the network. Whoever drives it calls [`Attempt::tick`] once per
//! second and forwards user actions to [`Attempt::select`] and
//! [`Attempt::next`]. Every call reports what happened as an [`Advance`].

use crate::quiz::{AnswerRecord, Question, QuestionSet, QuizError};

#[derive(Debug)]
pub struct Attempt {
    questions: QuestionSet,
    current: usize,
    selected: Option<usize>,
    answers: Vec<AnswerRecord>,
    remaining: u32,
    completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The attempt is already finished; nothing changed.
    Ignored,
    /// The countdown moved but the question did not change.
    Tick { remaining: u32 },
    /// The previous answer was recorded and `index` is now current.
    Moved { index: usize, time_limit: u32 },
    /// The last answer was recorded. Returned exactly once per attempt.
    Finished(Vec<AnswerRecord>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("the question set is empty")]
    Empty,
    #[error("question {question} has no options")]
    NoOptions { question: usize },
    #[error("question {question} has no time limit")]
    NoTimeLimit { question: usize },
    #[error("option {option} does not exist, this question has {available} options")]
    NoSuchOption { option: usize, available: usize },
    #[error("the attempt is already finished")]
    Closed,
}

impl From<AttemptError> for QuizError {
    fn from(err: AttemptError) -> Self {
        QuizError::Validation(err.to_string())
    }
}

impl Attempt {
    pub fn start(questions: QuestionSet) -> Result<Self, AttemptError> {
        let first = questions.first().ok_or(AttemptError::Empty)?;
        let remaining = first.time_limit;

        for (index, question) in questions.iter().enumerate() {
            if question.options.is_empty() {
                return Err(AttemptError::NoOptions { question: index });
            }
            if question.time_limit == 0 {
                return Err(AttemptError::NoTimeLimit { question: index });
            }
        }

        Ok(Self {
            answers: Vec::with_capacity(questions.len()),
            questions,
            current: 0,
            selected: None,
            remaining,
            completed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Chooses an option for the current question, replacing any earlier choice.
    pub fn select(&mut self, option: usize) -> Result<(), AttemptError> {
        if self.completed {
            return Err(AttemptError::Closed);
        }
        let available = self.current_question().options.len();
        if option >= available {
            return Err(AttemptError::NoSuchOption { option, available });
        }
        self.selected = Some(option);
        Ok(())
    }

    /// Explicit "next" (or "submit" on the last question).
    pub fn next(&mut self) -> Advance {
        if self.completed {
            return Advance::Ignored;
        }
        let spent = self.current_question().time_limit - self.remaining;
        self.record(spent)
    }

    /// One second elapsed. Reaching zero advances in the same call.
    pub fn tick(&mut self) -> Advance {
        if self.completed {
            return Advance::Ignored;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return Advance::Tick {
                remaining: self.remaining,
            };
        }
        let spent = self.current_question().time_limit;
        self.record(spent)
    }

    fn record(&mut self, time_spent: u32) -> Advance {
        let question = &self.questions[self.current];
        self.answers.push(AnswerRecord {
            question_id: question.id.clone(),
            selected_option_index: self.selected.take(),
            time_spent,
        });

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.remaining = self.questions[self.current].time_limit;
            return Advance::Moved {
                index: self.current,
                time_limit: self.remaining,
            };
        }

        self.completed = true;
        Advance::Finished(self.answers.clone())
    }
}
