//! Live status channel.
//!
//! A thin wrapper over `tokio::sync::broadcast`: every published record
//! goes to each subscriber connected at that moment. Nothing is replayed
//! to late joiners, and a subscriber that falls more than `capacity`
//! records behind skips ahead instead of stalling the sampler.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::StatusRecord;

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct LiveChannel {
    tx: broadcast::Sender<StatusRecord>,
}

impl LiveChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// deliver `record` to current subscribers; returns how many got it
    ///
    /// having no subscribers is not an error.
    pub fn publish(&self, record: StatusRecord) -> usize {
        let delivered = self.tx.send(record).unwrap_or(0);
        trace!(delivered, "status published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusRecord> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;
    use chrono::{TimeZone, Utc};

    fn record(second: u32) -> StatusRecord {
        StatusRecord {
            timestamp: Utc.with_ymd_and_hms(2020, 4, 19, 10, 0, second).unwrap(),
            status: Status::Idle,
            inside_temp: 3.8,
            outside_temp: 22.1,
            target_temp: 4.0,
            p: 1.0,
            i: 0.0,
            d: 0.0,
            correction: None,
        }
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let live = LiveChannel::default();
        assert_eq!(live.publish(record(0)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_record() {
        let live = LiveChannel::default();
        let mut a = live.subscribe();
        let mut b = live.subscribe();
        assert_eq!(live.publish(record(0)), 2);
        assert_eq!(a.recv().await.unwrap(), record(0));
        assert_eq!(b.recv().await.unwrap(), record(0));
    }

    #[tokio::test]
    async fn late_subscribers_get_no_replay() {
        let live = LiveChannel::default();
        let _early = live.subscribe();
        live.publish(record(0));
        let mut late = live.subscribe();
        live.publish(record(1));
        assert_eq!(late.recv().await.unwrap(), record(1));
    }

    #[tokio::test]
    async fn slow_subscribers_lag_instead_of_blocking() {
        let live = LiveChannel::new(2);
        let mut slow = live.subscribe();
        for second in 0..5 {
            live.publish(record(second));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(slow.recv().await.unwrap(), record(3));
    }
}
