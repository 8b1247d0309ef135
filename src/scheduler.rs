//! Daily quiz broadcast and the liveness tick.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardMarkup, UserId},
    ApiError, RequestError,
};

use crate::{
    config::DailySchedule,
    quiz::{
        ai_helper::{Complete, QuizHelper},
        answer_keyboard,
        session::QuizSessions,
    },
    store::{SubscriberStore, TopicStore},
};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient blocked the bot or deleted their account.
    #[error("recipient is unreachable: {0}")]
    Unreachable(String),
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Outbound side of the broadcast.
pub trait Deliver: Send + Sync {
    fn deliver(
        &self,
        user: UserId,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl Deliver for Bot {
    async fn deliver(
        &self,
        user: UserId,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), DeliveryError> {
        self.send_message(ChatId::from(user), text)
            .reply_markup(keyboard)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated) => {
                    DeliveryError::Unreachable(e.to_string())
                }
                other => DeliveryError::Failed(other.to_string()),
            })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<UserId>,
    pub skipped: Vec<UserId>,
    pub pruned: Vec<UserId>,
}

/// Sends one freshly generated question to every subscriber.
///
/// Works on a snapshot of the subscriber list; unreachable recipients are
/// collected and removed in one write after the loop. A failure for one
/// recipient never stops delivery to the rest.
pub async fn broadcast_daily<C: Complete, D: Deliver>(
    helper: &QuizHelper<C>,
    topics: &TopicStore,
    subscribers: &SubscriberStore,
    sessions: &QuizSessions,
    deliver: &D,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    let snapshot = match subscribers.list() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::error!("Error in daily quiz job: {}", e);
            return report;
        }
    };
    log::info!("Sending daily quiz to {} subscribers", snapshot.len());

    for user in snapshot {
        let topic = match topics.get(user) {
            Ok(topic) => topic,
            Err(e) => {
                log::error!("Failed to read topic for user {}: {}", user, e);
                report.skipped.push(user);
                continue;
            }
        };

        let quiz = match helper.new_quiz(&topic).await {
            Ok(quiz) => quiz,
            Err(e) => {
                log::error!("Failed to generate valid question for user {}: {}", user, e);
                report.skipped.push(user);
                continue;
            }
        };

        // Stored before sending so a fast button press finds it.
        let text = quiz.render_daily();
        if sessions.is_active(user) {
            log::info!("Daily quiz replaces an unanswered question for user {}", user);
        }
        sessions.start(user, quiz);

        match deliver.deliver(user, text, answer_keyboard()).await {
            Ok(()) => {
                log::info!("Daily quiz sent successfully to user {}", user);
                report.delivered.push(user);
            }
            Err(e) => {
                log::error!("Failed to send daily quiz to user {}: {}", user, e);
                sessions.finish(user);
                match e {
                    DeliveryError::Unreachable(_) => report.pruned.push(user),
                    DeliveryError::Failed(_) => report.skipped.push(user),
                }
            }
        }
    }

    if !report.pruned.is_empty() {
        match subscribers.remove_all(&report.pruned) {
            Ok(removed) => log::info!("Removed {} unreachable users from subscribers", removed),
            Err(e) => log::error!("Failed to prune subscribers {:?}: {}", report.pruned, e),
        }
    }

    report
}

/// The first occurrence of `schedule.at` in its timezone strictly after `now`.
pub fn next_fire(now: DateTime<Utc>, schedule: &DailySchedule) -> DateTime<Utc> {
    next_local(now, schedule.at, schedule.timezone)
}

fn next_local(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let mut date = now.with_timezone(&tz).date_naive();
    loop {
        // A time skipped by a DST jump has no local instant; try the next day.
        if let Some(fire) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            let fire = fire.with_timezone(&Utc);
            if fire > now {
                return fire;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return now,
        };
    }
}

/// Runs [`broadcast_daily`] at the scheduled time, every day, forever.
pub async fn run_daily<C: Complete, D: Deliver>(
    schedule: DailySchedule,
    helper: Arc<QuizHelper<C>>,
    topics: Arc<TopicStore>,
    subscribers: Arc<SubscriberStore>,
    sessions: Arc<QuizSessions>,
    deliver: D,
) {
    log::info!(
        "Daily quiz scheduled for {} {}",
        schedule.at.format("%H:%M"),
        schedule.timezone
    );
    loop {
        let now = Utc::now();
        let fire = next_fire(now, &schedule);
        let wait = (fire - now).to_std().unwrap_or(Duration::ZERO);
        log::debug!("Next daily quiz at {}", fire);
        tokio::time::sleep(wait).await;

        let report = broadcast_daily(&helper, &topics, &subscribers, &sessions, &deliver).await;
        log::info!(
            "Daily quiz finished: {} delivered, {} skipped, {} pruned",
            report.delivered.len(),
            report.skipped.len(),
            report.pruned.len()
        );
    }
}

/// Periodic log line that keeps hosting platforms from idling the process.
pub async fn keep_alive(period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        log::info!("Keep alive ping");
    }
}
