use std::num::NonZeroU64;

/// The single user allowed to drive the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    user_id: NonZeroU64,
}

impl Operator {
    pub fn new(user_id: NonZeroU64) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id.get()
    }

    pub fn is_authorized(&self, sender_id: u64) -> bool {
        self.user_id.get() == sender_id
    }
}
