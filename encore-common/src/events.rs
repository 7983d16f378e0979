//! Event types and the change-notification channel
//!
//! Every mutation the engine makes to a gig row broadcasts a [`GigEvent`].
//! Focused viewers subscribe and re-advance immediately when the gig they
//! are watching changes, so the visible state never lags the true state by
//! more than one round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Encore event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GigEvent {
    /// Gig transitioned from scheduled to in_progress
    GigStarted {
        gig_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A setlist position was performed and persisted
    SongPerformed {
        gig_id: Uuid,
        song_id: Uuid,
        position: i64,
        score: f64,
        timestamp: DateTime<Utc>,
    },

    /// The gig's song cursor moved forward
    PositionAdvanced {
        gig_id: Uuid,
        position: i64,
        timestamp: DateTime<Utc>,
    },

    /// Final outcome computed, gig transitioned to completed
    GigCompleted {
        gig_id: Uuid,
        overall_rating: f64,
        net_profit: f64,
        timestamp: DateTime<Utc>,
    },

    /// Gig was cancelled before completion
    GigCancelled {
        gig_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A ticket-demand sweep sold tickets for a scheduled gig
    TicketsSold {
        gig_id: Uuid,
        count: i64,
        tickets_sold: i64,
        timestamp: DateTime<Utc>,
    },
}

impl GigEvent {
    /// The gig this event concerns (all variants carry one)
    pub fn gig_id(&self) -> Uuid {
        match self {
            GigEvent::GigStarted { gig_id, .. }
            | GigEvent::SongPerformed { gig_id, .. }
            | GigEvent::PositionAdvanced { gig_id, .. }
            | GigEvent::GigCompleted { gig_id, .. }
            | GigEvent::GigCancelled { gig_id, .. }
            | GigEvent::TicketsSold { gig_id, .. } => *gig_id,
        }
    }
}

/// Publish/subscribe channel for gig mutations
///
/// Wraps a `tokio::sync::broadcast` sender. Sends never block and never
/// fail: an event with no subscribers is simply dropped.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<GigEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        // Lagging subscribers lose old events; every loop re-reads the
        // database on wake, so a dropped notification is only a delay.
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    pub fn notify(&self, event: GigEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<GigEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_without_subscribers_is_ok() {
        let notifier = ChangeNotifier::new();
        notifier.notify(GigEvent::PositionAdvanced {
            gig_id: Uuid::new_v4(),
            position: 1,
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        let gig_id = Uuid::new_v4();
        notifier.notify(GigEvent::GigStarted {
            gig_id,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.gig_id(), gig_id);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GigEvent::TicketsSold {
            gig_id: Uuid::new_v4(),
            count: 12,
            tickets_sold: 40,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"TicketsSold\""));
    }
}
