use strum::{AsRefStr, Display, EnumIter, EnumString};
use time::OffsetDateTime;

use crate::model::Post;

/// Lifecycle state of a post relative to a given instant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum PostStatus {
    Posted,
    Scheduled,
    Overdue,
    Unknown,
}

impl PostStatus {
    pub fn label(self) -> &'static str {
        match self {
            PostStatus::Posted => "Posted",
            PostStatus::Scheduled => "Scheduled",
            PostStatus::Overdue => "Overdue",
            PostStatus::Unknown => "Unknown",
        }
    }
}

/// A post due exactly at `now` counts as overdue, not upcoming.
pub fn classify(post: &Post, now: OffsetDateTime) -> PostStatus {
    if post.posted {
        return PostStatus::Posted;
    }
    match post.scheduled_instant() {
        None => PostStatus::Unknown,
        Some(scheduled) if scheduled > now => PostStatus::Scheduled,
        Some(_) => PostStatus::Overdue,
    }
}
