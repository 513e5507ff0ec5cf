use crate::quiz::{AnswerRecord, Question, QuestionOutcome, QuizError, SubmissionResult, Verdict};

/// Who decides the score of a submitted attempt.
///
/// `Client` scores from the correctness flags delivered with the questions and
/// only posts the sheet for bookkeeping. `Server` trusts the verdict returned
/// by the submission endpoint. The two are never mixed within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    Client,
    Server,
}

impl Scoring {
    pub fn resolve(
        self,
        questions: &[Question],
        answers: &[AnswerRecord],
        verdict: Verdict,
    ) -> Result<SubmissionResult, QuizError> {
        let max_score = questions.iter().map(|q| q.points).sum();
        match self {
            Scoring::Client => {
                let result = score_locally(questions, answers);
                if let Some(server_score) = verdict.total_score {
                    if server_score != result.total_score {
                        log::warn!(
                            "Backend scored the attempt {} but the local score is {}",
                            server_score,
                            result.total_score
                        );
                    }
                }
                Ok(result)
            }
            Scoring::Server => {
                let total_score = verdict.total_score.ok_or_else(|| {
                    QuizError::Validation("submission response has no totalScore".to_string())
                })?;
                Ok(SubmissionResult {
                    total_score,
                    max_score,
                    time_spent: total_time(answers),
                    outcomes: verdict.outcomes,
                })
            }
        }
    }
}

pub fn score_locally(questions: &[Question], answers: &[AnswerRecord]) -> SubmissionResult {
    let mut total_score = 0;
    let outcomes = questions
        .iter()
        .zip(answers)
        .map(|(question, answer)| {
            let selected = answer.selected_option_index;
            let is_correct = selected
                .and_then(|i| question.options.get(i))
                .and_then(|o| o.is_correct)
                .unwrap_or(false);
            if is_correct {
                total_score += question.points;
            }
            let explanation = question
                .correct_option()
                .and_then(|i| question.options.get(i))
                .map(|o| format!("Correct answer: {}", o.text));
            QuestionOutcome {
                question: question.text.clone(),
                selected,
                is_correct,
                explanation,
            }
        })
        .collect();

    SubmissionResult {
        total_score,
        max_score: questions.iter().map(|q| q.points).sum(),
        time_spent: total_time(answers),
        outcomes,
    }
}

fn total_time(answers: &[AnswerRecord]) -> u32 {
    answers.iter().map(|a| a.time_spent).sum()
}
