//! Explicit recomputation driver.
//!
//! New post collections and clock ticks arrive as [`FeedEvent`]s, from any
//! thread, over a channel. Each event produces exactly one fresh
//! [`DashboardSnapshot`]; nothing is recomputed behind the caller's back.

use crossbeam_channel::Receiver;
use time::{OffsetDateTime, UtcOffset};

use crate::dashboard::{aggregate, DashboardSnapshot};
use crate::model::Post;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Replaces the whole post collection.
    Posts(Vec<Post>),
    /// Advances the clock the dashboard is evaluated at.
    Tick(OffsetDateTime),
}

#[derive(Debug)]
pub struct DashboardFeed {
    zone: UtcOffset,
    trend_days: u16,
    posts: Vec<Post>,
    now: Option<OffsetDateTime>,
    latest: Option<DashboardSnapshot>,
}

impl DashboardFeed {
    pub fn new(zone: UtcOffset, trend_days: u16) -> Self {
        Self {
            zone,
            trend_days,
            posts: Vec::new(),
            now: None,
            latest: None,
        }
    }

    pub fn latest(&self) -> Option<&DashboardSnapshot> {
        self.latest.as_ref()
    }

    /// Folds one event into the feed and recomputes. Until the first tick the
    /// system clock stands in for `now`.
    pub fn apply(&mut self, event: FeedEvent) -> &DashboardSnapshot {
        match event {
            FeedEvent::Posts(posts) => {
                tracing::debug!(count = posts.len(), "feed received post collection");
                self.posts = posts;
            }
            FeedEvent::Tick(now) => self.now = Some(now),
        }
        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        let snapshot = aggregate(&self.posts, now, self.zone, self.trend_days);
        self.latest.insert(snapshot)
    }

    /// Drains `events` until every sender hangs up, handing each snapshot to
    /// `sink`. Returns how many snapshots were produced.
    pub fn run<F>(&mut self, events: &Receiver<FeedEvent>, mut sink: F) -> usize
    where
        F: FnMut(&DashboardSnapshot),
    {
        let mut produced = 0;
        for event in events.iter() {
            sink(self.apply(event));
            produced += 1;
        }
        tracing::debug!(produced, "feed channel closed");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use time::macros::datetime;

    fn post(id: i64, scheduled_time: &str) -> Post {
        Post {
            id,
            content: String::new(),
            scheduled_time: scheduled_time.into(),
            images: Vec::new(),
            posted: false,
            posted_at: None,
            facebook_post_id: None,
            created_at: None,
        }
    }

    #[test]
    fn ticks_reclassify_the_same_collection() {
        let mut feed = DashboardFeed::new(UtcOffset::UTC, 7);
        feed.apply(FeedEvent::Tick(datetime!(2024-01-10 07:00 UTC)));
        let before = feed.apply(FeedEvent::Posts(vec![post(1, "2024-01-10 08:00:00")]));
        assert_eq!(before.scheduled_count, 1);

        let after = feed.apply(FeedEvent::Tick(datetime!(2024-01-10 09:00 UTC)));
        assert_eq!(after.scheduled_count, 0);
        assert_eq!(after.overdue_count, 1);
        assert_eq!(feed.latest().map(|s| s.total), Some(1));
    }

    #[test]
    fn run_emits_one_snapshot_per_event() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let producer = thread::spawn(move || {
            tx.send(FeedEvent::Tick(datetime!(2024-01-10 07:00 UTC)))
                .expect("send tick");
            tx.send(FeedEvent::Posts(vec![
                post(1, "2024-01-10 08:00:00"),
                post(2, "2024-01-11 08:00:00"),
            ]))
            .expect("send posts");
            tx.send(FeedEvent::Tick(datetime!(2024-01-10 12:00 UTC)))
                .expect("send tick");
        });

        let mut feed = DashboardFeed::new(UtcOffset::UTC, 7);
        let mut scheduled = Vec::new();
        let produced = feed.run(&rx, |snapshot| scheduled.push(snapshot.scheduled_count));
        producer.join().expect("producer thread");

        assert_eq!(produced, 3);
        assert_eq!(scheduled, vec![0, 2, 1]);
    }

    #[test]
    fn empty_feed_produces_nothing() {
        let (tx, rx) = crossbeam_channel::unbounded::<FeedEvent>();
        drop(tx);
        let mut feed = DashboardFeed::new(UtcOffset::UTC, 7);
        assert_eq!(feed.run(&rx, |_| {}), 0);
        assert!(feed.latest().is_none());
    }
}
