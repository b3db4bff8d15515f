//! Routing of inbound chat messages.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};
use wr_core::IncomingMessage;

use crate::admin;
use crate::context::RelayContext;

/// Routes one message to the correlation registry or the command handler.
///
/// Bot-authored messages (including our own posts) are dropped first.
pub async fn dispatch(ctx: &RelayContext, message: IncomingMessage) {
    if message.author_is_bot {
        trace!(channel = %message.channel, "ignoring bot message");
        return;
    }

    let config = ctx.config().snapshot();
    if let Some(token) = ctx.registry().resolve(
        &message,
        &config.discord.principal,
        &config.discord.moderation_channel,
    ) {
        debug!(token = %token, "caption received");
        return;
    }

    admin::handle(ctx, &message).await;
}

/// Drains the inbound channel until every sender is gone.
pub async fn run_inbound(mut inbound: mpsc::Receiver<IncomingMessage>, ctx: Arc<RelayContext>) {
    while let Some(message) = inbound.recv().await {
        dispatch(&ctx, message).await;
    }
    debug!("inbound channel closed");
}
