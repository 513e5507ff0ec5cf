mod chat;

use std::sync::Arc;

use chat::{keyboard, ActiveAttempts, ChatPresenter, NEXT_BUTTON, SUBMIT_BUTTON};
use dotenv::dotenv;
use practice_bot::{
    api::{
        credentials::{CredentialProvider, TokenVault},
        portal::{LevelOffer, TechStack},
        Portal,
    },
    config::Config,
    quiz::{
        render,
        session::{Input, QuizSession},
        QuizError, QuizRequest,
    },
};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::KeyboardRemove,
    utils::command::BotCommands,
};
use tokio::sync::mpsc;

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = std::sync::Arc<ErasedStorage<State>>;

/// Inputs buffered per attempt before the chat has to wait.
const INPUT_BUFFER: usize = 16;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveToken,
    ChooseStack {
        stacks: Vec<StackChoice>,
    },
    ChooseLevel {
        stack: StackChoice,
    },
    InQuiz,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct StackChoice {
    id: String,
    name: String,
    description: Option<String>,
    levels: Vec<LevelOffer>,
}

impl From<TechStack> for StackChoice {
    fn from(stack: TechStack) -> Self {
        let levels = stack.level_offers();
        Self {
            id: stack.id,
            name: stack.name,
            description: stack.description,
            levels,
        }
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "pick a tech stack to practice.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "save your portal access token: /login <token>.")]
    Login(String),
    #[command(description = "forget your access token.")]
    Logout,
    #[command(description = "show your quiz history.")]
    History,
    #[command(description = "abandon the running quiz.")]
    Cancel,
}

#[tokio::main]
async fn main() {
    let env_file = dotenv();
    pretty_env_logger::init();
    if let Err(err) = env_file {
        log::warn!("No .env file loaded: {}", err);
    }
    log::info!("Starting practice bot...");

    let config = Config::from_env().expect("Invalid configuration");
    let tokens = TokenVault::open(&config.token_store).expect("Failed to open the token store");
    let portal = Arc::new(
        Portal::new(
            config.api_url.clone(),
            config.variant,
            tokens,
            config.request_timeout,
        )
        .expect("Failed to build the HTTP client"),
    );
    log::info!("Using {} ({:?} quizzes)", config.api_url, config.variant);

    let bot = Bot::from_env();

    log::info!("Opening dialogue storage {}", config.dialogue_db);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();
    let attempts = ActiveAttempts::default();

    let handler = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(dptree::entry().filter_command::<Command>().endpoint(command))
        .branch(dptree::case![State::Start].endpoint(start))
        .branch(dptree::case![State::ReceiveToken].endpoint(receive_token))
        .branch(dptree::case![State::ChooseStack { stacks }].endpoint(receive_stack))
        .branch(dptree::case![State::ChooseLevel { stack }].endpoint(receive_level))
        .branch(dptree::case![State::InQuiz].endpoint(quiz_input));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, portal, attempts])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn command(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    cmd: Command,
    portal: Arc<Portal>,
    attempts: ActiveAttempts,
) -> HandlerResult {
    let chat = msg.chat.id;
    match cmd {
        Command::Start => {
            attempts.cancel(chat);
            show_stacks(&bot, &dialogue, &portal).await?;
        }
        Command::Help => {
            bot.send_message(chat, Command::descriptions().to_string())
                .await?;
        }
        Command::Login(token) => {
            let token = token.trim();
            if token.is_empty() {
                bot.send_message(chat, "Send me your portal access token.")
                    .await?;
                dialogue.update(State::ReceiveToken).await?;
                return Ok(());
            }
            save_token(&portal, chat, token.to_string()).await?;
            bot.send_message(chat, "Token saved. Send /start to pick a quiz.")
                .await?;
        }
        Command::Logout => {
            let credentials = portal.credentials(chat.0);
            tokio::task::spawn_blocking(move || credentials.clear()).await?;
            bot.send_message(chat, "Logged out.").await?;
        }
        Command::History => match portal.api_for(chat.0).quiz_history().await {
            Ok(history) => {
                bot.send_message(chat, render::history(&history)).await?;
            }
            Err(err) => redirect(&bot, &dialogue, err.into()).await?,
        },
        Command::Cancel => {
            if attempts.cancel(chat) {
                bot.send_message(chat, "Quiz cancelled.")
                    .reply_markup(keyboard([vec![chat::PRACTICE_AGAIN]]))
                    .await?;
                dialogue.update(State::Start).await?;
            } else {
                bot.send_message(chat, "No quiz is running.").await?;
            }
        }
    }
    Ok(())
}

/// Stores the token off the async workers, the vault writes a file.
async fn save_token(portal: &Portal, chat: ChatId, token: String) -> HandlerResult {
    let credentials = portal.credentials(chat.0);
    tokio::task::spawn_blocking(move || credentials.store(token)).await?;
    Ok(())
}

async fn redirect(bot: &Bot, dialogue: &QuizDialogue, err: QuizError) -> HandlerResult {
    chat::redirect(bot, dialogue, &err).await
}

async fn show_stacks(bot: &Bot, dialogue: &QuizDialogue, portal: &Portal) -> HandlerResult {
    let chat = dialogue.chat_id();
    let stacks = match portal.api_for(chat.0).tech_stacks().await {
        Ok(stacks) => stacks,
        Err(err) => return redirect(bot, dialogue, err.into()).await,
    };
    if stacks.is_empty() {
        bot.send_message(chat, "No tech stacks are available yet.")
            .await?;
        return Ok(());
    }

    let stacks: Vec<StackChoice> = stacks.into_iter().map(StackChoice::from).collect();
    let rows = stacks.iter().map(|s| vec![s.name.clone()]);
    bot.send_message(chat, "Which tech stack do you want to practice?")
        .reply_markup(keyboard(rows))
        .await?;

    dialogue.update(State::ChooseStack { stacks }).await?;
    Ok(())
}

async fn start(bot: Bot, dialogue: QuizDialogue, portal: Arc<Portal>) -> HandlerResult {
    show_stacks(&bot, &dialogue, &portal).await
}

async fn receive_token(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    portal: Arc<Portal>,
) -> HandlerResult {
    match msg.text().map(str::trim) {
        Some(token) if !token.is_empty() => {
            save_token(&portal, msg.chat.id, token.to_string()).await?;
            bot.send_message(msg.chat.id, "Token saved.").await?;
            show_stacks(&bot, &dialogue, &portal).await
        }
        _ => {
            bot.send_message(msg.chat.id, "Please send the token as text.")
                .await?;
            Ok(())
        }
    }
}

async fn receive_stack(
    bot: Bot,
    dialogue: QuizDialogue,
    stacks: Vec<StackChoice>,
    msg: Message,
) -> HandlerResult {
    let Some(stack) = msg
        .text()
        .and_then(|text| stacks.iter().find(|s| s.name == text))
    else {
        bot.send_message(msg.chat.id, "Please choose one of the listed tech stacks.")
            .await?;
        return Ok(());
    };

    if stack.levels.is_empty() {
        bot.send_message(msg.chat.id, "This tech stack has no levels yet, pick another one.")
            .await?;
        return Ok(());
    }

    let mut prompt = format!("{}: which level?", stack.name);
    if let Some(description) = &stack.description {
        prompt = format!("{}\n\n{}", description, prompt);
    }
    let levels = stack.levels.iter().map(|offer| vec![render::level(offer)]);
    bot.send_message(msg.chat.id, prompt)
        .reply_markup(keyboard(levels))
        .await?;

    dialogue
        .update(State::ChooseLevel {
            stack: stack.clone(),
        })
        .await?;
    Ok(())
}

async fn receive_level(
    bot: Bot,
    dialogue: QuizDialogue,
    stack: StackChoice,
    msg: Message,
    portal: Arc<Portal>,
    attempts: ActiveAttempts,
) -> HandlerResult {
    let Some(offer) = msg.text().and_then(|text| chat::pick_level(&stack.levels, text)) else {
        bot.send_message(msg.chat.id, "Please choose one of the listed levels.")
            .await?;
        return Ok(());
    };
    if !offer.is_available() {
        bot.send_message(
            msg.chat.id,
            format!("There are no {} questions yet, pick another level.", offer.level),
        )
        .await?;
        return Ok(());
    }
    let level = offer.level;

    let chat = msg.chat.id;
    let (inputs, receiver) = mpsc::channel(INPUT_BUFFER);
    let id = attempts.register(chat, inputs);
    dialogue.update(State::InQuiz).await?;
    bot.send_message(chat, format!("Loading {} {} quiz...", stack.name, level))
        .reply_markup(KeyboardRemove::new())
        .await?;

    let session = QuizSession::new(
        portal.api_for(chat.0),
        ChatPresenter::new(bot.clone(), dialogue.clone(), attempts.clone(), id),
        portal.variant().scoring(),
    );
    let request = QuizRequest {
        stack_id: stack.id,
        level,
    };
    tokio::spawn(async move {
        let phase = session.run(request, receiver).await;
        attempts.release(chat, id);
        log::info!("Attempt in chat {} ended as {:?}", chat, phase);
    });
    Ok(())
}

async fn quiz_input(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    attempts: ActiveAttempts,
) -> HandlerResult {
    let input = match msg.text().map(str::trim) {
        Some(NEXT_BUTTON) | Some(SUBMIT_BUTTON) => Some(Input::Next),
        Some(text) => text
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map(Input::Select),
        None => None,
    };
    let Some(input) = input else {
        bot.send_message(msg.chat.id, "Pick an option number or press Next.")
            .await?;
        return Ok(());
    };

    let delivered = match attempts.sender(msg.chat.id) {
        Some(sender) => sender.send(input).await.is_ok(),
        None => false,
    };
    if !delivered {
        // Attempts live in memory only, a restart loses them.
        bot.send_message(msg.chat.id, "This quiz is no longer running.")
            .reply_markup(keyboard([vec![chat::PRACTICE_AGAIN]]))
            .await?;
        dialogue.update(State::Start).await?;
    }
    Ok(())
}
