//! Helper functions to build UserContext from an InteractionStore
//!
//! The context is gathered once per request so the scorers never query the
//! store themselves.

use crate::types::UserContext;
use data_loader::{InteractionStore, UserId};

/// Build a UserContext from the train-side store for a given user
///
/// Unknown users get an empty context; whether that means cold start is the
/// engine's decision.
pub fn build_user_context(store: &InteractionStore, user_id: UserId) -> UserContext {
    let mut context = UserContext::new(user_id);

    let interactions = store.user_interactions(user_id);
    if interactions.is_empty() {
        return context;
    }

    context.interactions = interactions.to_vec();
    context.read_articles = interactions.iter().map(|i| i.article_id).collect();
    context.reference_time = interactions
        .iter()
        .map(|i| i.timestamp)
        .max()
        .unwrap_or_default();

    context
}
