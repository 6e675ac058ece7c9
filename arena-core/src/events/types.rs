//! Messages passed between pipeline stages.
//!
//! Chain events flow into the enricher, enriched records flow into the
//! dispatch queue, and on the control-plane side received webhooks are
//! re-published on a broadcast bus as [`PipelineEvent`]s.

use arena_sdk::objects::{WebhookEnvelope, WebhookEventType};
use serde_json::{Map, Value};

/// A notification ready to be delivered to the control plane.
///
/// `payload` already carries decimal-string quantities; the dispatcher only
/// wraps it in the envelope and signs it.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub event_type: WebhookEventType,
    /// Idempotency key of the source chain log, kept for failure logs.
    pub event_id: String,
    pub payload: Value,
}

/// An event published on the control plane's internal bus.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A trade of a monachad in `match_id`; `trade` is the full flattened
    /// webhook body.
    TradeExecuted { match_id: String, trade: Value },
    /// A match lifecycle change; `fields` excludes `matchId`.
    MatchUpdated {
        match_id: String,
        fields: Map<String, Value>,
    },
}

impl PipelineEvent {
    /// Translate a received webhook into a bus event.
    ///
    /// Returns `None` when the envelope does not name a match.
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Option<Self> {
        let match_id = envelope.match_id()?.to_owned();
        let Value::Object(mut fields) = envelope.to_value() else {
            return None;
        };

        if envelope.event_type.is_trade() {
            Some(PipelineEvent::TradeExecuted {
                match_id,
                trade: Value::Object(fields),
            })
        } else {
            fields.remove("matchId");
            Some(PipelineEvent::MatchUpdated { match_id, fields })
        }
    }

    pub fn match_id(&self) -> &str {
        match self {
            PipelineEvent::TradeExecuted { match_id, .. } => match_id,
            PipelineEvent::MatchUpdated { match_id, .. } => match_id,
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, PipelineEvent::TradeExecuted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_envelopes_become_trades() {
        let envelope = WebhookEnvelope::new(
            WebhookEventType::TradeOpened,
            10,
            json!({ "eventId": "1_1_1", "matchId": "3", "value": "5" }),
        );
        let event = PipelineEvent::from_envelope(&envelope).unwrap();
        assert_eq!(event.match_id(), "3");
        let PipelineEvent::TradeExecuted { trade, .. } = event else {
            panic!("expected a trade");
        };
        assert_eq!(trade["eventType"], "trade_opened");
        assert_eq!(trade["matchId"], "3");
    }

    #[test]
    fn lifecycle_envelopes_drop_the_match_key() {
        let envelope = WebhookEnvelope::new(
            WebhookEventType::MatchStarted,
            10,
            json!({ "matchId": "3", "startTime": "1700000000" }),
        );
        let PipelineEvent::MatchUpdated { match_id, fields } =
            PipelineEvent::from_envelope(&envelope).unwrap()
        else {
            panic!("expected a match update");
        };
        assert_eq!(match_id, "3");
        assert!(!fields.contains_key("matchId"));
        assert_eq!(fields["eventType"], "match_started");
    }

    #[test]
    fn envelopes_without_match_are_ignored() {
        let envelope = WebhookEnvelope::new(WebhookEventType::MatchCreated, 1, json!({}));
        assert!(PipelineEvent::from_envelope(&envelope).is_none());
    }
}
