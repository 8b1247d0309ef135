use std::{collections::HashMap, sync::Mutex};

use teloxide::types::UserId;

use super::ActiveQuiz;

/// Outstanding question per user. Lives only as long as the process.
#[derive(Default)]
pub struct QuizSessions {
    active: Mutex<HashMap<UserId, ActiveQuiz>>,
}

impl QuizSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any question the user had not answered yet.
    pub fn start(&self, user: UserId, quiz: ActiveQuiz) {
        self.lock().insert(user, quiz);
    }

    /// Removes and returns the user's question, so it is answered at most once.
    pub fn finish(&self, user: UserId) -> Option<ActiveQuiz> {
        self.lock().remove(&user)
    }

    pub fn is_active(&self, user: UserId) -> bool {
        self.lock().contains_key(&user)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, ActiveQuiz>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
