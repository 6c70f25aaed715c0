// src/upstream/types.rs
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Opaque pagination token. Never parsed or built locally; passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Listing order requested from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    Top,
    New,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::Top => "top",
            SortMode::New => "new",
        }
    }

    /// Extra query parameters the upstream expects for this ordering.
    pub fn extra_params(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            SortMode::Hot => &[("g", "GLOBAL")],
            SortMode::Top => &[("t", "week")],
            SortMode::New => &[],
        }
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(SortMode::Hot),
            "top" => Ok(SortMode::Top),
            "new" => Ok(SortMode::New),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// One upstream entry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub num_comments: u64,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub collection: String,
    pub permalink: String,
    pub url: String,
    pub is_self: bool,
}

/// One page of a listing plus the cursors to walk to its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ListingPage {
    pub items: Vec<Item>,
    pub after: Option<Cursor>,
    pub before: Option<Cursor>,
}

/// Parameters of one listing fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub source: String,
    pub sort: SortMode,
    pub limit: i64,
    pub after: Option<Cursor>,
    pub before: Option<Cursor>,
}

impl ListingQuery {
    pub fn first_page(source: impl Into<String>, sort: SortMode, limit: i64) -> Self {
        Self {
            source: source.into(),
            sort,
            limit,
            after: None,
            before: None,
        }
    }

    pub fn after(mut self, cursor: impl Into<Cursor>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<Cursor>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn has_cursor(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    /// Same request against a different source.
    pub fn for_source(&self, source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..self.clone()
        }
    }
}

// ---- Wire shape of the upstream listing JSON ----

#[derive(Debug, Deserialize)]
pub(crate) struct RawListing {
    pub data: RawListingData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawListingData {
    #[serde(default)]
    pub children: Vec<RawChild>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChild {
    pub data: RawPost,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_self: bool,
}

impl RawPost {
    /// `None` when the comment count is negative (not a valid entry).
    pub(crate) fn into_item(self) -> Option<Item> {
        let num_comments = u64::try_from(self.num_comments).ok()?;
        let created_at = Utc
            .timestamp_opt(self.created_utc as i64, 0)
            .single()
            .unwrap_or_default();
        let body = if self.selftext.trim().is_empty() {
            None
        } else {
            Some(self.selftext)
        };
        Some(Item {
            id: self.id,
            title: self.title,
            body,
            author: self.author,
            num_comments,
            score: self.score,
            created_at,
            collection: self.subreddit,
            permalink: self.permalink,
            url: self.url,
            is_self: self.is_self,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_mode_parses_case_insensitively() {
        assert_eq!("HOT".parse::<SortMode>().unwrap(), SortMode::Hot);
        assert_eq!(" top ".parse::<SortMode>().unwrap(), SortMode::Top);
        assert!("rising".parse::<SortMode>().is_err());
    }

    #[test]
    fn cursor_serializes_as_plain_string() {
        let c = Cursor::new("t3_abc");
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"t3_abc\"");
    }

    #[test]
    fn negative_comment_count_is_rejected() {
        let raw: RawPost = serde_json::from_str(
            r#"{"id":"x","title":"Some title","num_comments":-1}"#,
        )
        .unwrap();
        assert!(raw.into_item().is_none());
    }

    #[test]
    fn blank_selftext_becomes_none() {
        let raw: RawPost =
            serde_json::from_str(r#"{"id":"x","title":"Some title","selftext":"  "}"#).unwrap();
        assert_eq!(raw.into_item().unwrap().body, None);
    }
}
