use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of generated artifact stored in `generated_content.content_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Title,
    SeoDescription,
    BlogIdeas,
    BlogOutline,
    FullBlogPost,
    SeoFaqs,
    SocialMediaPosts,
}

impl ContentType {
    /// Every content type, in declaration order.
    pub const ALL: [ContentType; 7] = [
        Self::Title,
        Self::SeoDescription,
        Self::BlogIdeas,
        Self::BlogOutline,
        Self::FullBlogPost,
        Self::SeoFaqs,
        Self::SocialMediaPosts,
    ];

    /// The snake_case tag persisted in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::SeoDescription => "seo_description",
            Self::BlogIdeas => "blog_ideas",
            Self::BlogOutline => "blog_outline",
            Self::FullBlogPost => "full_blog_post",
            Self::SeoFaqs => "seo_faqs",
            Self::SocialMediaPosts => "social_media_posts",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ContentTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| ContentTypeParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`ContentType`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid content type: {0:?}")]
pub struct ContentTypeParseError(pub String);

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A user account with its subscription tier and quota counters.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub subscription_tier: String,
    pub api_call_count: i32,
    pub monthly_api_limit: i32,
    pub api_limit_reset_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted generation result.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedContent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub input_params: Option<serde_json::Value>,
    pub generated_text: String,
    pub display_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_tags_match_schema() {
        let tags: Vec<&str> = ContentType::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "title",
                "seo_description",
                "blog_ideas",
                "blog_outline",
                "full_blog_post",
                "seo_faqs",
                "social_media_posts",
            ]
        );
    }

    #[test]
    fn content_type_parses_its_own_display() {
        for ct in ContentType::ALL {
            assert_eq!(ct.to_string().parse::<ContentType>().unwrap(), ct);
        }
    }

    #[test]
    fn content_type_invalid() {
        let err = "blog_post".parse::<ContentType>().unwrap_err();
        assert_eq!(err.to_string(), "invalid content type: \"blog_post\"");
    }

    #[test]
    fn content_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&ContentType::SocialMediaPosts).unwrap();
        assert_eq!(json, "\"social_media_posts\"");
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "writer".to_string(),
            email: None,
            hashed_password: Some("$2b$12$secret".to_string()),
            full_name: None,
            is_active: true,
            is_superuser: false,
            subscription_tier: "free".to_string(),
            api_call_count: 0,
            monthly_api_limit: 100,
            api_limit_reset_at: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("hashed_password").is_none());
        assert_eq!(value["username"], "writer");
    }
}
