use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub foreign_id: Option<String>,
}

impl User {
    /// Mention record for this user, or `None` when the user has no usable username.
    pub fn as_mention(&self) -> Option<Mention> {
        let username = self.username.as_deref().map(str::trim).unwrap_or_default();
        if username.is_empty() {
            return None;
        }
        Some(Mention {
            id: self.id.clone(),
            username: username.to_string(),
            foreign_id: self.foreign_id.clone(),
            name: self.name.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub foreign_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Mention {
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty()
    }

    /// The `@username` form as it appears in comment text.
    pub fn token(&self) -> String {
        format!("@{}", self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Gif {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub gif_url: String,
    #[serde(default)]
    pub gif_preview_url: String,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub gif: Option<Gif>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A comment pinned to the head of a feed, usually reached through a deep link.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlighted {
    pub comment: Comment,
    pub parent_comment: Option<Comment>,
}

impl Highlighted {
    /// The single comment rendered ahead of the feed.
    pub fn pinned(&self) -> &Comment {
        self.parent_comment.as_ref().unwrap_or(&self.comment)
    }

    pub fn covers(&self, id: &str) -> bool {
        self.comment.id == id
            || self
                .parent_comment
                .as_ref()
                .is_some_and(|parent| parent.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub entity_id: String,
    pub content: String,
    pub mentions: Vec<Mention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif: Option<Gif>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Top,
    New,
    Old,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Top => "top",
            SortBy::New => "new",
            SortBy::Old => "old",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "top" => Some(SortBy::Top),
            "new" => Some(SortBy::New),
            "old" => Some(SortBy::Old),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pagination {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GifPage {
    pub items: Vec<Gif>,
    pub pagination: Pagination,
}
