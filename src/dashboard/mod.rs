//! Dashboard aggregation.
//!
//! [`aggregate`] turns one immutable view of the post collection into the
//! numbers, ranked lists and trend series a dashboard shows. It is a pure
//! function of its inputs: calling it twice with the same posts, instant and
//! zone yields the same snapshot.

use time::{OffsetDateTime, UtcOffset};

use crate::model::Post;
use crate::status::{classify, PostStatus};
use crate::timestamp::local_date;

mod trend;

pub use trend::TrendPoint;

use self::trend::DailyTrend;

pub const DEFAULT_TREND_DAYS: u16 = 7;
pub const UPCOMING_LIMIT: usize = 5;
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub total: usize,
    pub scheduled_count: usize,
    pub posted_count: usize,
    pub overdue_count: usize,
    pub unknown_count: usize,
    pub today_count: usize,
    pub upcoming: Vec<Post>,
    pub recent: Vec<Post>,
    pub daily_trend: Vec<TrendPoint>,
}

impl DashboardSnapshot {
    pub fn count(&self, status: PostStatus) -> usize {
        match status {
            PostStatus::Posted => self.posted_count,
            PostStatus::Scheduled => self.scheduled_count,
            PostStatus::Overdue => self.overdue_count,
            PostStatus::Unknown => self.unknown_count,
        }
    }

    pub fn trend_total(&self) -> usize {
        self.daily_trend.iter().map(|point| point.count).sum()
    }
}

/// Builds the dashboard view of `posts` as seen at `now`.
///
/// `zone` decides calendar days for the "today" count and the trend buckets.
/// Posts whose timestamps cannot be read still count towards `total` and their
/// status tally but are left out of every time-ordered view.
pub fn aggregate(
    posts: &[Post],
    now: OffsetDateTime,
    zone: UtcOffset,
    trend_days: u16,
) -> DashboardSnapshot {
    let today = local_date(now, zone);
    let mut trend = DailyTrend::ending_on(today, trend_days);
    let mut upcoming: Vec<(OffsetDateTime, &Post)> = Vec::new();
    let mut recent: Vec<(OffsetDateTime, &Post)> = Vec::new();
    let mut snapshot = DashboardSnapshot {
        total: posts.len(),
        scheduled_count: 0,
        posted_count: 0,
        overdue_count: 0,
        unknown_count: 0,
        today_count: 0,
        upcoming: Vec::new(),
        recent: Vec::new(),
        daily_trend: Vec::new(),
    };

    for post in posts {
        let scheduled = post.scheduled_instant();
        if scheduled.is_some_and(|at| local_date(at, zone) == today) {
            snapshot.today_count += 1;
        }

        match classify(post, now) {
            PostStatus::Posted => {
                snapshot.posted_count += 1;
                match post.posted_instant() {
                    Some(posted_at) => {
                        recent.push((posted_at, post));
                        trend.record(local_date(posted_at, zone));
                    }
                    None => {
                        tracing::debug!(post_id = post.id, "posted post has no readable posted_at");
                    }
                }
            }
            PostStatus::Scheduled => {
                snapshot.scheduled_count += 1;
                if let Some(at) = scheduled {
                    upcoming.push((at, post));
                }
            }
            PostStatus::Overdue => snapshot.overdue_count += 1,
            PostStatus::Unknown => {
                snapshot.unknown_count += 1;
                tracing::debug!(
                    post_id = post.id,
                    scheduled_time = %post.scheduled_time,
                    "post schedule could not be normalized"
                );
            }
        }
    }

    // Equal instants fall back to ascending id so repeated runs rank identically.
    upcoming.sort_by(|(a_at, a), (b_at, b)| a_at.cmp(b_at).then_with(|| a.id.cmp(&b.id)));
    recent.sort_by(|(a_at, a), (b_at, b)| b_at.cmp(a_at).then_with(|| a.id.cmp(&b.id)));
    snapshot.upcoming = take_posts(upcoming, UPCOMING_LIMIT);
    snapshot.recent = take_posts(recent, RECENT_LIMIT);
    snapshot.daily_trend = trend.into_points();

    tracing::debug!(
        total = snapshot.total,
        scheduled = snapshot.scheduled_count,
        posted = snapshot.posted_count,
        overdue = snapshot.overdue_count,
        unknown = snapshot.unknown_count,
        "aggregated dashboard snapshot"
    );
    snapshot
}

fn take_posts(ranked: Vec<(OffsetDateTime, &Post)>, limit: usize) -> Vec<Post> {
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, post)| post.clone())
        .collect()
}
