//! Per-user quiz transitions, independent of the chat transport.

use teloxide::types::UserId;

use super::{
    ai_helper::{Complete, QuizError, QuizHelper},
    session::QuizSessions,
    QuizAction,
};

pub const NO_ACTIVE_QUIZ: &str = "❌ No active quiz found. Use /quiz to start a new one.";
pub const GENERATION_FAILED: &str = "❌ Error generating question. Please try again with /quiz";

/// Generates a question on `topic` and makes it the user's active one.
/// Returns the text to show. On failure nothing is stored.
pub async fn request_quiz<C: Complete>(
    helper: &QuizHelper<C>,
    sessions: &QuizSessions,
    user: UserId,
    topic: &str,
) -> Result<String, QuizError> {
    let quiz = helper.new_quiz(topic).await?;
    if sessions.is_active(user) {
        log::debug!("User {} left a question unanswered", user);
    }
    let text = quiz.render();
    sessions.start(user, quiz);
    Ok(text)
}

/// Resolves a button press against the user's active question and clears it.
pub async fn handle_action<C: Complete>(
    helper: &QuizHelper<C>,
    sessions: &QuizSessions,
    user: UserId,
    action: QuizAction,
) -> String {
    let Some(quiz) = sessions.finish(user) else {
        return NO_ACTIVE_QUIZ.to_string();
    };

    match action {
        QuizAction::Answer(label) => {
            log::info!(
                "User {} answered {} (correct: {})",
                user,
                label,
                quiz.question.correct
            );
            quiz.render_verdict(label)
        }
        QuizAction::Explain => {
            let detailed = helper.generate_detailed_explanation(&quiz).await;
            quiz.render_explanation(&detailed)
        }
    }
}
