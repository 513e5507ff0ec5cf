//! Drives one [`Attempt`] from loading to a terminal phase.
//!
//! A session owns exactly one attempt and exactly one countdown. The countdown
//! only exists while the attempt is in progress: it is dropped as soon as the
//! last answer is recorded or the input channel closes, so a stale timer can
//! never touch a finished or discarded attempt.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::quiz::attempt::{Advance, Attempt, AttemptError};
use crate::quiz::scoring::Scoring;
use crate::quiz::{
    AnswerRecord, LoadedQuiz, Question, QuizError, QuizRequest, SubmissionResult, SubmitTarget,
    Verdict,
};

pub const TICK: Duration = Duration::from_secs(1);

/// User actions forwarded from the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Select(usize),
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    InProgress(usize),
    Submitting,
    Completed(SubmissionResult),
    Failed(QuizError),
}

/// Source of question sets and sink for answer sheets.
pub trait QuizBackend: Send + Sync {
    fn load(&self, request: &QuizRequest) -> impl Future<Output = Result<LoadedQuiz, QuizError>> + Send;

    fn submit(
        &self,
        target: &SubmitTarget,
        answers: &[AnswerRecord],
    ) -> impl Future<Output = Result<Verdict, QuizError>> + Send;
}

/// Whatever shows the attempt to the user.
pub trait Presenter: Send {
    fn question(
        &mut self,
        index: usize,
        total: usize,
        question: &Question,
        is_last: bool,
    ) -> impl Future<Output = ()> + Send;

    fn selected(&mut self, option: usize) -> impl Future<Output = ()> + Send;

    fn countdown(&mut self, remaining: u32) -> impl Future<Output = ()> + Send;

    fn rejected(&mut self, err: &AttemptError) -> impl Future<Output = ()> + Send;

    fn submitting(&mut self) -> impl Future<Output = ()> + Send;

    /// Called once with `Completed` or `Failed`.
    fn finished(&mut self, phase: &Phase) -> impl Future<Output = ()> + Send;
}

/// The one timer slot of an attempt.
struct Countdown {
    interval: Interval,
}

impl Countdown {
    fn start(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    fn restart(&mut self) {
        self.interval.reset();
    }
}

enum Event {
    Tick,
    Input(Option<Input>),
}

pub struct QuizSession<B, P> {
    backend: B,
    presenter: P,
    scoring: Scoring,
    phase: Phase,
}

impl<B: QuizBackend, P: Presenter> QuizSession<B, P> {
    pub fn new(backend: B, presenter: P, scoring: Scoring) -> Self {
        Self {
            backend,
            presenter,
            scoring,
            phase: Phase::Loading,
        }
    }

    /// Runs the attempt to completion.
    ///
    /// Returns the terminal phase, or the in-progress phase the attempt was
    /// in when `inputs` closed (the attempt is then discarded unsubmitted).
    pub async fn run(mut self, request: QuizRequest, mut inputs: mpsc::Receiver<Input>) -> Phase {
        log::info!(
            "Loading {} questions for stack {}",
            request.level,
            request.stack_id
        );
        let LoadedQuiz { questions, target } = match self.backend.load(&request).await {
            Ok(loaded) => loaded,
            Err(err) => return self.finish(Phase::Failed(err)).await,
        };
        let mut attempt = match Attempt::start(questions) {
            Ok(attempt) => attempt,
            Err(err) => return self.finish(Phase::Failed(err.into())).await,
        };

        let Some(answers) = self.play(&mut attempt, &mut inputs).await else {
            log::info!(
                "Attempt abandoned at question {} of {}",
                attempt.current_index() + 1,
                attempt.len()
            );
            return self.phase;
        };

        self.phase = Phase::Submitting;
        self.presenter.submitting().await;
        log::info!("Submitting {} answers", answers.len());

        let verdict = match self.backend.submit(&target, &answers).await {
            Ok(verdict) => verdict,
            Err(err) => return self.finish(Phase::Failed(err)).await,
        };
        match self.scoring.resolve(attempt.questions(), &answers, verdict) {
            Ok(result) => self.finish(Phase::Completed(result)).await,
            Err(err) => self.finish(Phase::Failed(err)).await,
        }
    }

    async fn play(
        &mut self,
        attempt: &mut Attempt,
        inputs: &mut mpsc::Receiver<Input>,
    ) -> Option<Vec<AnswerRecord>> {
        self.phase = Phase::InProgress(0);
        self.presenter
            .question(0, attempt.len(), attempt.current_question(), attempt.is_last())
            .await;

        let mut countdown = Countdown::start(TICK);
        loop {
            let event = tokio::select! {
                _ = countdown.tick() => Event::Tick,
                input = inputs.recv() => Event::Input(input),
            };

            let advance = match event {
                Event::Tick => attempt.tick(),
                Event::Input(Some(Input::Next)) => attempt.next(),
                Event::Input(Some(Input::Select(option))) => {
                    match attempt.select(option) {
                        Ok(()) => self.presenter.selected(option).await,
                        Err(err) => self.presenter.rejected(&err).await,
                    }
                    continue;
                }
                Event::Input(None) => return None,
            };

            match advance {
                Advance::Ignored => {}
                Advance::Tick { remaining } => {
                    log::debug!("{} seconds left", remaining);
                    self.presenter.countdown(remaining).await;
                }
                Advance::Moved { index, .. } => {
                    countdown.restart();
                    self.phase = Phase::InProgress(index);
                    self.presenter
                        .question(index, attempt.len(), attempt.current_question(), attempt.is_last())
                        .await;
                }
                Advance::Finished(answers) => return Some(answers),
            }
        }
    }

    async fn finish(mut self, phase: Phase) -> Phase {
        match &phase {
            Phase::Failed(err) => log::warn!("Attempt failed: {}", err),
            Phase::Completed(result) => log::info!(
                "Attempt completed with {} of {} points",
                result.total_score,
                result.max_score
            ),
            _ => {}
        }
        self.phase = phase;
        self.presenter.finished(&self.phase).await;
        self.phase
    }
}
