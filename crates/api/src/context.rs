use boardstock_core::UserId;

/// Actor context for a request.
///
/// Identity issuance is owned by an external collaborator; the API only
/// needs a stable actor id to stamp onto production entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    user_id: UserId,
}

impl ActorContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
