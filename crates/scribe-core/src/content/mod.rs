//! Content generation orchestrator.
//!
//! Every operation follows the same pipeline: build a prompt, call the
//! [`TextGenerator`], parse the reply, optionally persist it, return it.
//! When the generator errors or produces nothing usable, the operation
//! returns deterministic fallback content instead. Fallback results are
//! never persisted.

pub mod fallback;
pub mod requests;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scribe_db::models::{ContentType, GeneratedContent};
use scribe_db::queries::content::{self as content_queries, NewContent};

use crate::generator::{GenerationConfig, TextGenerator};
use crate::parse::{self, FaqItem, Outline};
use crate::prompt::{self, truncate_chars};

use requests::{
    BlogIdeasRequest, BlogOutlineRequest, FullBlogPostRequest, SeoDescriptionRequest,
    SeoFaqsRequest, SocialMediaPostsRequest, TitleRequest,
};

/// Longest display label stored with a record.
pub const DISPLAY_TITLE_MAX_CHARS: usize = 255;

/// Page size for history listings when the caller gives none.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
/// Upper bound on history page size.
pub const MAX_HISTORY_LIMIT: i64 = 100;

const POST_SEPARATOR: &str = "\n\n---\n\n";

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Where generation results are saved and read back.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn save(&self, new: NewContent) -> anyhow::Result<GeneratedContent>;

    /// A user's records, newest first.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        skip: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<GeneratedContent>>;

    /// One record, visible only to its owner.
    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<GeneratedContent>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ContentStore) {}
};

/// [`ContentStore`] over the `generated_content` table.
#[derive(Debug, Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn save(&self, new: NewContent) -> anyhow::Result<GeneratedContent> {
        content_queries::insert_content(&self.pool, &new).await
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        skip: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<GeneratedContent>> {
        content_queries::list_content_for_user(&self.pool, user_id, skip, limit).await
    }

    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<GeneratedContent>> {
        content_queries::get_content_for_user(&self.pool, user_id, id).await
    }
}

/// Clamp history pagination parameters to sane bounds.
pub fn history_window(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    (skip, limit)
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Whether a value came from the model or from a fallback template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Model,
    Fallback,
}

/// One generation outcome.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    pub source: Source,
    /// The saved record, when a persistence context was supplied and the
    /// value came from the model.
    pub record: Option<GeneratedContent>,
}

impl<T> Generated<T> {
    fn fallback(value: T) -> Self {
        Self {
            value,
            source: Source::Fallback,
            record: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }
}

/// Who to save results for, and where.
#[derive(Clone, Copy)]
pub struct PersistContext<'a> {
    pub store: &'a dyn ContentStore,
    pub user_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs content operations against one [`TextGenerator`].
#[derive(Clone)]
pub struct ContentGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl ContentGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    /// Call the model. `None` means the caller should fall back.
    async fn call(
        &self,
        kind: ContentType,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Option<String> {
        debug!(%kind, generator = self.generator.name(), %prompt, "sending prompt");
        match self.generator.generate(prompt, config).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(%kind, generator = self.generator.name(), "generator returned no text, using fallback");
                None
            }
            Err(e) => {
                warn!(%kind, generator = self.generator.name(), error = %e, "generation failed, using fallback");
                None
            }
        }
    }

    async fn persist<R: Serialize>(
        ctx: Option<&PersistContext<'_>>,
        content_type: ContentType,
        request: &R,
        generated_text: String,
        display_title: &str,
    ) -> Result<Option<GeneratedContent>, ContentError> {
        let Some(ctx) = ctx else {
            return Ok(None);
        };
        let input_params = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        let record = ctx
            .store
            .save(NewContent {
                user_id: ctx.user_id,
                content_type,
                input_params,
                generated_text,
                display_title: truncate_chars(display_title, DISPLAY_TITLE_MAX_CHARS).to_string(),
            })
            .await?;
        info!(user_id = %ctx.user_id, %content_type, record_id = %record.id, "saved generated content");
        Ok(Some(record))
    }

    pub async fn title(
        &self,
        req: &TitleRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<String>, ContentError> {
        let prompt = prompt::title_prompt(req);
        let title = self
            .call(ContentType::Title, &prompt, req.generation_params.as_ref())
            .await
            .map(|text| text.trim().trim_matches('"').trim().to_string())
            .filter(|t| !t.is_empty());

        let Some(title) = title else {
            return Ok(Generated::fallback(fallback::title(req)));
        };
        let record = Self::persist(ctx, ContentType::Title, req, title.clone(), &title).await?;
        Ok(Generated {
            value: title,
            source: Source::Model,
            record,
        })
    }

    pub async fn seo_description(
        &self,
        req: &SeoDescriptionRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<String>, ContentError> {
        if req.text_content.is_empty() {
            return Ok(Generated::fallback(fallback::EMPTY_SEO_SOURCE.to_string()));
        }

        let prompt = prompt::seo_description_prompt(req);
        let description = self
            .call(ContentType::SeoDescription, &prompt, req.generation_params.as_ref())
            .await
            .map(|text| {
                let cleaned = text.trim().trim_matches('"').trim();
                truncate_chars(cleaned, req.max_length).to_string()
            })
            .filter(|d| !d.is_empty());

        let Some(description) = description else {
            return Ok(Generated::fallback(fallback::seo_description(req)));
        };
        let label = format!("SEO Desc: {}...", truncate_chars(&description, 70));
        let record = Self::persist(
            ctx,
            ContentType::SeoDescription,
            req,
            description.clone(),
            &label,
        )
        .await?;
        Ok(Generated {
            value: description,
            source: Source::Model,
            record,
        })
    }

    pub async fn blog_ideas(
        &self,
        req: &BlogIdeasRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<Vec<String>>, ContentError> {
        req.validate()?;
        let prompt = prompt::blog_ideas_prompt(req);
        let mut ideas = match self
            .call(ContentType::BlogIdeas, &prompt, req.generation_params.as_ref())
            .await
        {
            Some(text) => parse::parse_numbered_list(&text),
            None => Vec::new(),
        };
        if ideas.is_empty() {
            return Ok(Generated::fallback(fallback::blog_ideas(req)));
        }
        ideas.truncate(req.num_ideas);

        let label = format!("Blog Ideas: {}", req.topic);
        let record =
            Self::persist(ctx, ContentType::BlogIdeas, req, ideas.join("\n"), &label).await?;
        Ok(Generated {
            value: ideas,
            source: Source::Model,
            record,
        })
    }

    pub async fn blog_outline(
        &self,
        req: &BlogOutlineRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<Outline>, ContentError> {
        req.validate()?;
        let prompt = prompt::blog_outline_prompt(req);
        let outline = match self
            .call(ContentType::BlogOutline, &prompt, req.generation_params.as_ref())
            .await
        {
            Some(text) => parse::parse_outline(&text),
            None => Outline::new(),
        };
        if outline.is_empty() {
            return Ok(Generated::fallback(fallback::blog_outline(req)));
        }

        let text = serde_json::to_string_pretty(&outline).map_err(anyhow::Error::from)?;
        let label = format!("Outline: {}", req.topic);
        let record = Self::persist(ctx, ContentType::BlogOutline, req, text, &label).await?;
        Ok(Generated {
            value: outline,
            source: Source::Model,
            record,
        })
    }

    pub async fn full_blog_post(
        &self,
        req: &FullBlogPostRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<String>, ContentError> {
        let prompt = prompt::full_blog_post_prompt(req);
        // Length decides the token ceiling, whatever the caller asked for.
        let config = GenerationConfig {
            max_output_tokens: Some(req.blog_length.max_output_tokens()),
            ..req.generation_params.unwrap_or_default()
        };
        let post = self
            .call(ContentType::FullBlogPost, &prompt, Some(&config))
            .await
            .map(|text| text.trim().to_string());

        let Some(post) = post else {
            return Ok(Generated::fallback(fallback::full_blog_post(req)));
        };
        let label = format!("Blog Post: {}...", truncate_chars(&req.topic, 50));
        let record =
            Self::persist(ctx, ContentType::FullBlogPost, req, post.clone(), &label).await?;
        Ok(Generated {
            value: post,
            source: Source::Model,
            record,
        })
    }

    pub async fn seo_faqs(
        &self,
        req: &SeoFaqsRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<Vec<FaqItem>>, ContentError> {
        req.validate()?;
        let prompt = prompt::seo_faqs_prompt(req);
        let mut faqs = match self
            .call(ContentType::SeoFaqs, &prompt, req.generation_params.as_ref())
            .await
        {
            Some(text) => parse::parse_faqs(&text),
            None => Vec::new(),
        };
        if faqs.is_empty() {
            return Ok(Generated::fallback(fallback::seo_faqs(req)));
        }
        faqs.truncate(req.num_faqs);

        let text = serde_json::to_string_pretty(&faqs).map_err(anyhow::Error::from)?;
        let label = format!("FAQs: {}", req.topic);
        let record = Self::persist(ctx, ContentType::SeoFaqs, req, text, &label).await?;
        Ok(Generated {
            value: faqs,
            source: Source::Model,
            record,
        })
    }

    /// Fails with [`ContentError::Validation`] when neither a topic nor a
    /// content snippet is given, or too many posts are requested.
    pub async fn social_media_posts(
        &self,
        req: &SocialMediaPostsRequest,
        ctx: Option<&PersistContext<'_>>,
    ) -> Result<Generated<Vec<String>>, ContentError> {
        req.validate()?;

        let prompt = prompt::social_posts_prompt(req);
        let mut posts = match self
            .call(ContentType::SocialMediaPosts, &prompt, req.generation_params.as_ref())
            .await
        {
            Some(text) => parse::parse_social_posts(&text),
            None => Vec::new(),
        };
        if posts.is_empty() {
            return Ok(Generated::fallback(fallback::social_media_posts(req)));
        }
        posts.truncate(req.num_posts);

        let label = format!(
            "Social Posts for {}: {}",
            req.platform,
            req.topic().unwrap_or("General Content")
        );
        let record = Self::persist(
            ctx,
            ContentType::SocialMediaPosts,
            req,
            posts.join(POST_SEPARATOR),
            &label,
        )
        .await?;
        Ok(Generated {
            value: posts,
            source: Source::Model,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_window_defaults_and_caps() {
        assert_eq!(history_window(None, None), (0, 20));
        assert_eq!(history_window(Some(40), Some(500)), (40, 100));
        assert_eq!(history_window(Some(-3), Some(0)), (0, 1));
    }

    #[test]
    fn source_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Source::Fallback).unwrap(), "\"fallback\"");
    }
}
