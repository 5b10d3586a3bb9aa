//! Request types for each content operation.
//!
//! The serialized form of a request is what gets stored as a record's
//! `input_params`, so every field is serialized, including unset options.

use serde::{Deserialize, Serialize};

use crate::generator::GenerationConfig;

use super::ContentError;

/// Most items a single request may ask for (ideas, sections, FAQs, posts).
pub const MAX_ITEM_COUNT: usize = 50;

fn check_count(field: &str, value: usize) -> Result<(), ContentError> {
    if value > MAX_ITEM_COUNT {
        return Err(ContentError::Validation(format!(
            "{field} must be at most {MAX_ITEM_COUNT}."
        )));
    }
    Ok(())
}

fn default_title_style() -> String {
    "informative".to_string()
}

fn default_max_length() -> usize {
    160
}

fn default_num_keywords() -> usize {
    5
}

fn default_five() -> usize {
    5
}

fn default_three() -> usize {
    3
}

fn default_platform() -> String {
    "General".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRequest {
    pub topic: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default = "default_title_style")]
    pub style: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl TitleRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            keywords: None,
            style: default_title_style(),
            tone: None,
            generation_params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoDescriptionRequest {
    pub text_content: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl SeoDescriptionRequest {
    pub fn new(text_content: impl Into<String>) -> Self {
        Self {
            text_content: text_content.into(),
            keywords: None,
            max_length: default_max_length(),
            generation_params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordsRequest {
    pub text_content: String,
    #[serde(default = "default_num_keywords")]
    pub num_keywords: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsRequest {
    pub topic: String,
    pub extracted_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogIdeasRequest {
    pub topic: String,
    #[serde(default = "default_five")]
    pub num_ideas: usize,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl BlogIdeasRequest {
    pub fn validate(&self) -> Result<(), ContentError> {
        check_count("num_ideas", self.num_ideas)
    }

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_ideas: default_five(),
            target_audience: None,
            style: None,
            generation_params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogOutlineRequest {
    pub topic: String,
    #[serde(default = "default_five")]
    pub num_sections: usize,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl BlogOutlineRequest {
    pub fn validate(&self) -> Result<(), ContentError> {
        check_count("num_sections", self.num_sections)
    }

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_sections: default_five(),
            target_audience: None,
            style: None,
            generation_params: None,
        }
    }
}

/// Target size of a full blog post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl BlogLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Main sections, including introduction and conclusion.
    pub fn sections(&self) -> usize {
        match self {
            Self::Short => 3,
            Self::Medium => 4,
            Self::Long => 5,
        }
    }

    pub fn approx_words(&self) -> usize {
        match self {
            Self::Short => 300,
            Self::Medium => 600,
            Self::Long => 1000,
        }
    }

    /// Output-token ceiling sent to the model for this length.
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            Self::Short => 500,
            Self::Medium => 1000,
            Self::Long => 1700,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullBlogPostRequest {
    pub topic: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub blog_length: BlogLength,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl FullBlogPostRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            target_audience: None,
            style: None,
            blog_length: BlogLength::default(),
            generation_params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoFaqsRequest {
    pub topic: String,
    #[serde(default = "default_three")]
    pub num_faqs: usize,
    #[serde(default)]
    pub content_snippet: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl SeoFaqsRequest {
    pub fn validate(&self) -> Result<(), ContentError> {
        check_count("num_faqs", self.num_faqs)
    }

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_faqs: default_three(),
            content_snippet: None,
            style: None,
            generation_params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMediaPostsRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub content_snippet: Option<String>,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_three")]
    pub num_posts: usize,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub call_to_action: Option<String>,
    #[serde(default = "default_true")]
    pub include_hashtags: bool,
    #[serde(default)]
    pub generation_params: Option<GenerationConfig>,
}

impl SocialMediaPostsRequest {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            content_snippet: None,
            platform: default_platform(),
            num_posts: default_three(),
            tone: None,
            call_to_action: None,
            include_hashtags: true,
            generation_params: None,
        }
    }

    /// The topic, if present and not blank.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref().filter(|t| !t.is_empty())
    }

    pub fn content_snippet(&self) -> Option<&str> {
        self.content_snippet.as_deref().filter(|s| !s.is_empty())
    }

    /// Needs a topic or a snippet, and a bounded post count.
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.topic().is_none() && self.content_snippet().is_none() {
            return Err(ContentError::Validation(
                "Either topic or content_snippet must be provided.".to_string(),
            ));
        }
        check_count("num_posts", self.num_posts)
    }
}
