use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use practice_bot::api::portal::LevelOffer;
use practice_bot::quiz::attempt::AttemptError;
use practice_bot::quiz::render;
use practice_bot::quiz::session::{Input, Phase, Presenter};
use practice_bot::quiz::{Difficulty, Question, QuizError};
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};
use tokio::sync::mpsc;

use crate::{HandlerResult, QuizDialogue, State};

pub const NEXT_BUTTON: &str = "Next ▶";
pub const SUBMIT_BUTTON: &str = "Submit ✅";
pub const PRACTICE_AGAIN: &str = "Practice again";

/// Remaining seconds at which the chat gets a reminder.
const WARN_AT: [u32; 2] = [10, 5];

/// Running attempts by chat. Each entry carries a generation number so a
/// finishing attempt never evicts the one that replaced it.
#[derive(Clone, Default)]
pub struct ActiveAttempts {
    inputs: Arc<Mutex<HashMap<ChatId, (u64, mpsc::Sender<Input>)>>>,
    generation: Arc<AtomicU64>,
}

impl ActiveAttempts {
    pub fn register(&self, chat: ChatId, sender: mpsc::Sender<Input>) -> u64 {
        let id = self.generation.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat, (id, sender));
        if replaced.is_some() {
            log::info!("Chat {} started a new attempt, dropping the old one", chat);
        }
        id
    }

    pub fn sender(&self, chat: ChatId) -> Option<mpsc::Sender<Input>> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .map(|(_, sender)| sender.clone())
    }

    pub fn is_current(&self, chat: ChatId, id: u64) -> bool {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .is_some_and(|(current, _)| *current == id)
    }

    /// Forgets the attempt `id` of `chat` if it is still the current one.
    pub fn release(&self, chat: ChatId, id: u64) {
        let mut inputs = self.inputs.lock().unwrap_or_else(PoisonError::into_inner);
        if inputs.get(&chat).is_some_and(|(current, _)| *current == id) {
            inputs.remove(&chat);
        }
    }

    /// Drops the chat's attempt. Its session sees the closed channel and stops.
    pub fn cancel(&self, chat: ChatId) -> bool {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chat)
            .is_some()
    }
}

/// The offered level a chat answer refers to, by button text or level name.
pub fn pick_level<'a>(offers: &'a [LevelOffer], text: &str) -> Option<&'a LevelOffer> {
    let named = text.parse::<Difficulty>().ok();
    offers
        .iter()
        .find(|offer| render::level(offer) == text || named == Some(offer.level))
}

pub fn keyboard<I, S>(rows: I) -> KeyboardMarkup
where
    I: IntoIterator<Item = Vec<S>>,
    S: Into<String>,
{
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
}

/// Turns a failed request into the matching "navigation": the login prompt
/// for missing or rejected tokens, the menu for everything else.
pub async fn redirect(bot: &Bot, dialogue: &QuizDialogue, err: &QuizError) -> HandlerResult {
    let chat = dialogue.chat_id();
    match err {
        QuizError::AuthRequired => {
            bot.send_message(
                chat,
                format!("{}. Send me your portal access token.", err),
            )
            .reply_markup(KeyboardRemove::new())
            .await?;
            dialogue.update(State::ReceiveToken).await?;
        }
        QuizError::Forbidden => {
            bot.send_message(chat, "You are not authorized to view this page.")
                .reply_markup(keyboard([vec![PRACTICE_AGAIN]]))
                .await?;
            dialogue.update(State::Start).await?;
        }
        QuizError::NetworkOrServer(_) | QuizError::Validation(_) => {
            bot.send_message(chat, err.to_string())
                .reply_markup(keyboard([vec![PRACTICE_AGAIN]]))
                .await?;
            dialogue.update(State::Start).await?;
        }
    }
    Ok(())
}

/// Shows a running attempt in its chat.
pub struct ChatPresenter {
    bot: Bot,
    dialogue: QuizDialogue,
    attempts: ActiveAttempts,
    id: u64,
}

impl ChatPresenter {
    /// `id` is the generation `attempts` handed out for this attempt.
    pub fn new(bot: Bot, dialogue: QuizDialogue, attempts: ActiveAttempts, id: u64) -> Self {
        Self {
            bot,
            dialogue,
            attempts,
            id,
        }
    }

    async fn say(&self, text: String, markup: Option<ReplyMarkup>) {
        let mut request = self.bot.send_message(self.dialogue.chat_id(), text);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        // A lost message must not stop the attempt.
        if let Err(err) = request.await {
            log::warn!("Failed to message chat {}: {}", self.dialogue.chat_id(), err);
        }
    }
}

impl Presenter for ChatPresenter {
    async fn question(&mut self, index: usize, total: usize, question: &Question, is_last: bool) {
        let options = (1..=question.options.len())
            .map(|n| n.to_string())
            .collect::<Vec<_>>();
        let advance = if is_last { SUBMIT_BUTTON } else { NEXT_BUTTON };
        let markup = keyboard([options, vec![advance.to_string()]]);
        self.say(render::question(index, total, question), Some(markup.into()))
            .await;
    }

    async fn selected(&mut self, option: usize) {
        self.say(format!("Selected option {}", option + 1), None).await;
    }

    async fn countdown(&mut self, remaining: u32) {
        if WARN_AT.contains(&remaining) {
            self.say(format!("⏳ {} seconds left", remaining), None).await;
        }
    }

    async fn rejected(&mut self, err: &AttemptError) {
        self.say(format!("That did not work: {}", err), None).await;
    }

    async fn submitting(&mut self) {
        self.say(
            "Submitting your answers...".to_string(),
            Some(KeyboardRemove::new().into()),
        )
        .await;
    }

    async fn finished(&mut self, phase: &Phase) {
        let chat = self.dialogue.chat_id();
        // A cancelled or replaced attempt must not move the chat's dialogue.
        if !self.attempts.is_current(chat, self.id) {
            log::info!("Attempt {} in chat {} was replaced, dropping its outcome", self.id, chat);
            return;
        }
        let result = match phase {
            Phase::Completed(result) => {
                self.say(
                    render::result(result),
                    Some(keyboard([vec![PRACTICE_AGAIN]]).into()),
                )
                .await;
                self.dialogue.update(State::Start).await
            }
            Phase::Failed(err) => redirect(&self.bot, &self.dialogue, err).await,
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::error!("Failed to leave the quiz in chat {}: {}", chat, err);
        }
    }
}
