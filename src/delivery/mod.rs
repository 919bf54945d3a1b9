//! Outbound payloads, their validation, and the reply-then-push delivery chain.

mod payload;
mod validate;

pub use payload::{ResponsePayload, plain_text_of};
pub use validate::{PayloadLimits, sanitize_text, validate};

use tracing::{info, warn};

use crate::channels::MessagingClient;
use crate::idempotency::DeliveryChannel;
use crate::telemetry;

/// One way of getting a response to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRoute {
    Reply { reply_token: String },
    Push { user_id: String },
}

impl DeliveryRoute {
    pub fn channel(&self) -> DeliveryChannel {
        match self {
            DeliveryRoute::Reply { .. } => DeliveryChannel::Reply,
            DeliveryRoute::Push { .. } => DeliveryChannel::Push,
        }
    }
}

/// Routes to try, in order. A claimed reply token is tried first with push as
/// the fallback; everything else goes straight to push.
pub fn plan_routes(
    channel: DeliveryChannel,
    reply_token: Option<&str>,
    user_id: &str,
) -> Vec<DeliveryRoute> {
    let push = DeliveryRoute::Push {
        user_id: user_id.to_string(),
    };
    match (channel, reply_token) {
        (DeliveryChannel::Reply, Some(token)) => vec![
            DeliveryRoute::Reply {
                reply_token: token.to_string(),
            },
            push,
        ],
        _ => vec![push],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(DeliveryChannel),
    Failed,
}

/// Try each route in order and stop at the first success.
pub async fn deliver(
    client: &dyn MessagingClient,
    routes: &[DeliveryRoute],
    payloads: &[ResponsePayload],
) -> DeliveryOutcome {
    for route in routes {
        let channel = route.channel();
        let result = match route {
            DeliveryRoute::Reply { reply_token } => client.reply(reply_token, payloads).await,
            DeliveryRoute::Push { user_id } => client.push(user_id, payloads).await,
        };
        match result {
            Ok(()) => {
                telemetry::record_delivery(channel.as_str(), "ok");
                return DeliveryOutcome::Delivered(channel);
            }
            Err(e) if e.is_token_rejection() => {
                telemetry::record_delivery(channel.as_str(), "token_rejected");
                info!("{} rejected: {}, trying next route", channel.as_str(), e);
            }
            Err(e) => {
                telemetry::record_delivery(channel.as_str(), "error");
                warn!("{} delivery failed: {}", channel.as_str(), e);
            }
        }
    }
    DeliveryOutcome::Failed
}

#[cfg(test)]
mod tests;
