mod config;
mod quiz;
mod scheduler;
mod store;

use std::sync::Arc;

use chatgpt::client::ChatGPT;
use config::{Config, DailySchedule};
use dotenv::dotenv;
use quiz::{
    ai_helper::{chatgpt_client, QuizHelper, EXPLANATION_MAX_TOKENS, QUESTION_MAX_TOKENS},
    answer_keyboard, flow,
    session::QuizSessions,
    QuizAction,
};
use store::{SetTopicError, SubscriberStore, TopicStore, TOPIC_MAX_CHARS, TOPIC_MIN_CHARS};
use teloxide::{
    dispatching::{
        dialogue::{self, ErasedStorage, InMemStorage, Storage},
        UpdateHandler,
    },
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{ChatAction, ChatId},
    update_listeners::Polling,
    utils::command::BotCommands,
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Helper = QuizHelper<ChatGPT>;

/// Topic entry sub-state. The outstanding question lives in [`QuizSessions`].
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveTopic,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Commands:")]
enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "display this text.")]
    Help,
    #[command(description = "change your topic.")]
    Modify,
    #[command(description = "see your current topic.")]
    MyTopic,
    #[command(description = "start a quiz.")]
    Quiz,
    #[command(description = "get a quiz every day.")]
    Subscribe,
    #[command(description = "stop daily quizzes.")]
    Unsubscribe,
    #[command(description = "show your account info.")]
    MyId,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    let config = Config::from_env().expect("Invalid configuration");
    log::info!("Starting quiz bot...");

    let bot = Bot::new(&config.telegram_token);

    // ChatGPTEngine::Custom takes a &'static str.
    let model: &'static str = Box::leak(config.model.clone().into_boxed_str());
    let helper: Arc<Helper> = Arc::new(QuizHelper::new(
        chatgpt_client(&config, model, QUESTION_MAX_TOKENS).expect("Unable to create completion client"),
        chatgpt_client(&config, model, EXPLANATION_MAX_TOKENS).expect("Unable to create completion client"),
    ));
    let topics = Arc::new(TopicStore::new(&config.topic_file));
    let subscribers = Arc::new(SubscriberStore::new(&config.subscribers_file));
    let sessions = Arc::new(QuizSessions::new());
    let storage: Arc<ErasedStorage<State>> = InMemStorage::<State>::new().erase();

    tokio::spawn(scheduler::run_daily(
        config.daily,
        helper.clone(),
        topics.clone(),
        subscribers.clone(),
        sessions.clone(),
        bot.clone(),
    ));
    tokio::spawn(scheduler::keep_alive(config.keep_alive));

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            storage,
            helper,
            topics,
            subscribers,
            sessions,
            config.daily
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Help].endpoint(start))
        .branch(case![Command::Modify].endpoint(modify))
        .branch(case![Command::MyTopic].endpoint(my_topic))
        .branch(case![Command::Quiz].endpoint(start_quiz))
        .branch(case![Command::Subscribe].endpoint(subscribe))
        .branch(case![Command::Unsubscribe].endpoint(unsubscribe))
        .branch(case![Command::MyId].endpoint(my_id));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::ReceiveTopic].endpoint(receive_topic))
        .endpoint(invalid_state);

    dialogue::enter::<Update, ErasedStorage<State>, State, _>()
        .branch(message_handler)
        .branch(Update::filter_callback_query().endpoint(receive_answer))
}

async fn start(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        format!(
            "🎓 Welcome to the Quiz Bot!\n\n{}",
            Command::descriptions()
        ),
    )
    .await?;
    Ok(())
}

async fn modify(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "📝 Enter the topic you want to learn:\n(e.g., Python, JavaScript, Machine Learning, Data Structures, etc.)",
    )
    .await?;
    dialogue.update(State::ReceiveTopic).await?;
    Ok(())
}

async fn my_topic(bot: Bot, msg: Message, topics: Arc<TopicStore>) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let topic = topics.get(user.id)?;
    bot.send_message(msg.chat.id, format!("📚 Your current topic: {}", topic))
        .await?;
    Ok(())
}

async fn receive_topic(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    topics: Arc<TopicStore>,
) -> HandlerResult {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        bot.send_message(msg.chat.id, "Please send the topic as text.")
            .await?;
        return Ok(());
    };
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, "Unknown command. Enter your topic or /help.")
            .await?;
        return Ok(());
    }

    match topics.set(user.id, text) {
        Ok(topic) => {
            log::info!("User {} set topic {:?}", user.id, topic);
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Topic saved successfully!\n📚 Your topic: {}\n\nUse /quiz to start practicing!",
                    topic
                ),
            )
            .await?;
            dialogue.update(State::Start).await?;
        }
        Err(SetTopicError::Invalid(e)) => {
            log::debug!("User {} sent an invalid topic: {}", user.id, e);
            bot.send_message(
                msg.chat.id,
                format!(
                    "❌ Topic should be between {}-{} characters. Try again:",
                    TOPIC_MIN_CHARS, TOPIC_MAX_CHARS
                ),
            )
            .await?;
        }
        Err(SetTopicError::Store(e)) => return Err(e.into()),
    }
    Ok(())
}

async fn start_quiz(
    bot: Bot,
    msg: Message,
    helper: Arc<Helper>,
    topics: Arc<TopicStore>,
    sessions: Arc<QuizSessions>,
) -> HandlerResult {
    let Some(user_id) = msg.from().map(|user| user.id) else {
        return Ok(());
    };
    let topic = topics.get(user_id)?;

    bot.send_message(msg.chat.id, "🤔 Generating question, please wait...")
        .await?;
    // Only cosmetic, so a failure here is ignored.
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    match flow::request_quiz(&helper, &sessions, user_id, &topic).await {
        Ok(text) => {
            bot.send_message(msg.chat.id, text)
                .reply_markup(answer_keyboard())
                .await?;
        }
        Err(e) => {
            log::warn!("Question for user {} about {:?} failed: {}", user_id, topic, e);
            bot.send_message(msg.chat.id, flow::GENERATION_FAILED).await?;
        }
    }
    Ok(())
}

async fn receive_answer(
    bot: Bot,
    q: CallbackQuery,
    helper: Arc<Helper>,
    sessions: Arc<QuizSessions>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat.id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    let Some(action) = q.data.as_deref().and_then(|data| data.parse::<QuizAction>().ok()) else {
        log::warn!("Unexpected callback data {:?} from {}", q.data, q.from.id);
        return Ok(());
    };

    if action == QuizAction::Explain {
        let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    }
    let text = flow::handle_action(&helper, &sessions, q.from.id, action).await;

    bot.send_message(chat_id, text).await?;
    Ok(())
}

async fn subscribe(
    bot: Bot,
    msg: Message,
    subscribers: Arc<SubscriberStore>,
    schedule: DailySchedule,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let text = if subscribers.add(user.id)? {
        log::info!("User {} subscribed to daily quizzes", user.id);
        format!(
            "✅ Subscribed to daily quizzes!\n\n🕘 You'll receive a quiz every day at {} ({})\nUse /unsubscribe to stop daily quizzes",
            schedule.at.format("%H:%M"),
            schedule.timezone
        )
    } else {
        "ℹ️ You're already subscribed to daily quizzes!".to_string()
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn unsubscribe(bot: Bot, msg: Message, subscribers: Arc<SubscriberStore>) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let text = if subscribers.remove(user.id)? {
        log::info!("User {} unsubscribed from daily quizzes", user.id);
        "❌ Unsubscribed from daily quizzes!"
    } else {
        "ℹ️ You weren't subscribed to daily quizzes."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn my_id(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let name = if user.first_name.is_empty() {
        "No name"
    } else {
        user.first_name.as_str()
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "👤 Your Account Info:\n\n🆔 User ID: {}\n👤 Name: {}\n📝 Username: @{}\n\nCopy the User ID number above ☝️",
            user.id,
            name,
            user.username.as_deref().unwrap_or("No username")
        ),
    )
    .await?;
    Ok(())
}

async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
