use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A timestamp could not be turned into an instant.
    #[error("could not parse '{input}' as a timestamp")]
    Parse { input: String },
    /// A proposed schedule lies before the current instant.
    #[error("scheduled time {requested} is earlier than now ({now})")]
    Validation {
        requested: OffsetDateTime,
        now: OffsetDateTime,
    },
    #[error("'{input}' is not a valid UTC offset (expected UTC, Z or +HH:MM)")]
    InvalidZone { input: String },
}

impl Error {
    pub(crate) fn parse(input: &str) -> Self {
        Error::Parse {
            input: input.to_owned(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

/// Violations of the post lifecycle rules found in an imported record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("post #{id} is marked posted but has no posted_at timestamp")]
    PostedWithoutTimestamp { id: i64 },
    #[error("post #{id} has a posted_at timestamp but is not marked posted")]
    TimestampWithoutPosted { id: i64 },
    #[error("post #{id} was posted at {posted_at} before it was created at {created_at}")]
    PostedBeforeCreated {
        id: i64,
        posted_at: OffsetDateTime,
        created_at: OffsetDateTime,
    },
}
