use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, NoneAsEmptyString};
use time::OffsetDateTime;

use crate::error::PostError;
use crate::timestamp;

/// A scheduled post as exported by the upstream store.
///
/// Timestamps stay in their raw form; callers go through [`crate::timestamp`]
/// whenever they need an instant.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub scheduled_time: String,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    #[serde(default)]
    pub posted: bool,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub facebook_post_id: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Post {
    pub fn scheduled_instant(&self) -> Option<OffsetDateTime> {
        timestamp::normalize(&self.scheduled_time)
    }

    pub fn posted_instant(&self) -> Option<OffsetDateTime> {
        self.posted_at.as_deref().and_then(timestamp::normalize)
    }

    pub fn created_instant(&self) -> Option<OffsetDateTime> {
        self.created_at.as_deref().and_then(timestamp::normalize)
    }

    /// Checks the publish bookkeeping: `posted_at` is present exactly when the
    /// post is published and never precedes creation.
    pub fn check_consistency(&self) -> Result<(), PostError> {
        match (self.posted, self.posted_at.is_some()) {
            (true, false) => return Err(PostError::PostedWithoutTimestamp { id: self.id }),
            (false, true) => return Err(PostError::TimestampWithoutPosted { id: self.id }),
            _ => {}
        }
        if let (Some(posted_at), Some(created_at)) = (self.posted_instant(), self.created_instant())
        {
            if posted_at < created_at {
                return Err(PostError::PostedBeforeCreated {
                    id: self.id,
                    posted_at,
                    created_at,
                });
            }
        }
        Ok(())
    }

    pub fn sources(&self) -> impl Iterator<Item = ImageSource<'_>> {
        self.images.iter().filter_map(ImageAttachment::source)
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub facebook_photo_id: Option<String>,
}

impl ImageAttachment {
    /// An uploaded file wins over an external URL; attachments with neither
    /// have no source.
    pub fn source(&self) -> Option<ImageSource<'_>> {
        if let Some(path) = self.image_path.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(ImageSource::Local(path));
        }
        self.image_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(ImageSource::Remote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    Local(&'a str),
    Remote(&'a str),
}

impl ImageSource<'_> {
    /// Where a viewer fetches the image from. Uploaded files are served under
    /// `/uploads/<file name>`.
    pub fn public_url(&self) -> String {
        match self {
            ImageSource::Local(path) => {
                let file_name = Path::new(path)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(path);
                format!("/uploads/{file_name}")
            }
            ImageSource::Remote(url) => (*url).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedPosts {
    pub posts: Vec<Post>,
    pub rejected: Vec<RejectedRecord>,
}

/// Decodes a JSON array of post records one element at a time so a single
/// malformed record cannot take the rest of the export down with it.
pub fn decode_posts(json: &str) -> Result<DecodedPosts> {
    let document: Value = serde_json::from_str(json).context("parsing posts export")?;
    let Value::Array(items) = document else {
        bail!("posts export must be a JSON array");
    };

    let mut decoded = DecodedPosts::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Post>(item) {
            Ok(post) => decoded.posts.push(post),
            Err(err) => {
                tracing::warn!(index, %err, "skipping malformed post record");
                decoded.rejected.push(RejectedRecord {
                    index,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn post(id: i64) -> Post {
        Post {
            id,
            content: format!("post {id}"),
            scheduled_time: "2024-01-10 08:00:00".into(),
            images: Vec::new(),
            posted: false,
            posted_at: None,
            facebook_post_id: None,
            created_at: None,
        }
    }

    #[test]
    fn decodes_backend_records_and_skips_malformed_ones() -> anyhow::Result<()> {
        let json = r#"[
            {
                "id": 1,
                "content": "hello",
                "scheduled_time": "2024-01-10T08:00:00",
                "posted": true,
                "posted_at": "2024-01-10T08:00:03.120000",
                "facebook_post_id": "123_456",
                "created_at": "2024-01-09T10:00:00",
                "images": [{"id": 9, "image_path": "uploads/a.jpg", "image_url": null}]
            },
            {"id": "not-a-number"},
            {"id": 3, "scheduled_time": "2024-01-11 09:00:00", "posted_at": "", "facebook_post_id": ""}
        ]"#;
        let decoded = decode_posts(json)?;
        assert_eq!(decoded.posts.len(), 2);
        assert_eq!(decoded.rejected.len(), 1);
        assert_eq!(decoded.rejected[0].index, 1);

        let first = &decoded.posts[0];
        assert!(first.posted);
        assert_eq!(first.facebook_post_id.as_deref(), Some("123_456"));
        assert_eq!(first.images.len(), 1);

        let third = &decoded.posts[1];
        assert_eq!(third.posted_at, None);
        assert_eq!(third.facebook_post_id, None);
        assert!(third.images.is_empty());
        Ok(())
    }

    #[test]
    fn non_array_exports_are_rejected() {
        assert!(decode_posts(r#"{"id": 1}"#).is_err());
        assert!(decode_posts("not json").is_err());
    }

    #[test]
    fn missing_scheduled_time_decodes_as_empty() -> anyhow::Result<()> {
        let decoded = decode_posts(r#"[{"id": 5}]"#)?;
        assert_eq!(decoded.posts[0].scheduled_time, "");
        assert_eq!(decoded.posts[0].scheduled_instant(), None);
        Ok(())
    }

    #[test]
    fn consistency_flags_each_broken_rule() {
        let mut unposted_with_time = post(1);
        unposted_with_time.posted_at = Some("2024-01-10T08:00:00Z".into());
        assert_matches!(
            unposted_with_time.check_consistency(),
            Err(PostError::TimestampWithoutPosted { id: 1 })
        );

        let mut posted_without_time = post(2);
        posted_without_time.posted = true;
        assert_matches!(
            posted_without_time.check_consistency(),
            Err(PostError::PostedWithoutTimestamp { id: 2 })
        );

        let mut backwards = post(3);
        backwards.posted = true;
        backwards.posted_at = Some("2024-01-09T08:00:00Z".into());
        backwards.created_at = Some("2024-01-10T08:00:00Z".into());
        assert_matches!(
            backwards.check_consistency(),
            Err(PostError::PostedBeforeCreated { id: 3, .. })
        );

        let mut fine = post(4);
        fine.posted = true;
        fine.posted_at = Some("2024-01-10T08:00:00Z".into());
        fine.created_at = Some("2024-01-09T08:00:00".into());
        assert_matches!(fine.check_consistency(), Ok(()));
    }

    #[test]
    fn local_upload_wins_over_remote_url() {
        let both = ImageAttachment {
            image_path: Some("uploads/5f1c.png".into()),
            image_url: Some("https://cdn.example.com/x.png".into()),
            ..ImageAttachment::default()
        };
        assert_eq!(both.source(), Some(ImageSource::Local("uploads/5f1c.png")));
        assert_eq!(both.source().map(|s| s.public_url()).as_deref(), Some("/uploads/5f1c.png"));

        let remote = ImageAttachment {
            image_path: Some("  ".into()),
            image_url: Some("https://cdn.example.com/x.png".into()),
            ..ImageAttachment::default()
        };
        assert_eq!(
            remote.source().map(|s| s.public_url()).as_deref(),
            Some("https://cdn.example.com/x.png")
        );

        assert_eq!(ImageAttachment::default().source(), None);
    }
}
