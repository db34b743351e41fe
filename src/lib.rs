pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod model;
pub mod schedule;
pub mod status;
pub mod timestamp;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use dashboard::{aggregate, DashboardSnapshot, TrendPoint};
pub use error::{Error, PostError, Result};
pub use model::{decode_posts, ImageAttachment, Post};
pub use status::{classify, PostStatus};
