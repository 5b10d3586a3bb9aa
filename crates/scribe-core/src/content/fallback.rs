//! Deterministic substitutes used when the model is unavailable.

use crate::parse::{FaqItem, Outline};
use crate::prompt::truncate_chars;

use super::requests::{
    BlogIdeasRequest, BlogOutlineRequest, FullBlogPostRequest, MAX_ITEM_COUNT,
    SeoDescriptionRequest, SeoFaqsRequest, SocialMediaPostsRequest, TitleRequest,
};

/// Returned for an SEO description request with no source text.
pub const EMPTY_SEO_SOURCE: &str = "Discover more about this interesting topic.";

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn title(req: &TitleRequest) -> String {
    let topic = title_case(req.topic.trim());
    let keyword = req
        .keywords
        .as_ref()
        .and_then(|k| k.first())
        .filter(|k| !k.is_empty())
        .map(|k| title_case(k));

    if req.style == "informative" {
        match keyword {
            Some(k) => format!("{topic}: Understanding {k}"),
            None => format!("A Comprehensive Guide to {topic}"),
        }
    } else {
        format!("Content about: {topic}")
    }
}

/// The source text itself, cut to `max_length` chars with a `...` marker.
pub fn seo_description(req: &SeoDescriptionRequest) -> String {
    let text = &req.text_content;
    if text.chars().count() > req.max_length {
        let keep = req.max_length.saturating_sub(3);
        format!("{}...", truncate_chars(text, keep))
    } else {
        text.clone()
    }
}

pub fn blog_ideas(req: &BlogIdeasRequest) -> Vec<String> {
    let style = req.style.as_deref().unwrap_or("general");
    let idea = format!("Idea about {} - Style: {style}", req.topic);
    vec![idea; req.num_ideas.min(MAX_ITEM_COUNT)]
}

pub fn blog_outline(req: &BlogOutlineRequest) -> Outline {
    let topic = &req.topic;
    let mut outline = Outline::new();
    outline.push_section("Introduction", vec![format!("Introduce {topic}")]);
    outline.push_section(
        format!("Main Body (Discuss {topic})"),
        vec!["Point 1".to_string(), "Point 2".to_string()],
    );
    outline.push_section("Conclusion", vec![format!("Conclude thoughts on {topic}")]);
    outline
}

pub fn full_blog_post(req: &FullBlogPostRequest) -> String {
    format!(
        "Error generating blog post about {}. Please try again.",
        req.topic
    )
}

pub fn seo_faqs(req: &SeoFaqsRequest) -> Vec<FaqItem> {
    let item = FaqItem {
        question: format!("What is {}?", req.topic),
        answer: format!("Learn more about {} here.", req.topic),
    };
    vec![item; req.num_faqs.min(MAX_ITEM_COUNT)]
}

pub fn social_media_posts(req: &SocialMediaPostsRequest) -> Vec<String> {
    let base = req.topic().unwrap_or("your amazing content");
    let post = format!(
        "Check out our latest on {base}! #{} #{}",
        req.platform.to_lowercase(),
        base.replace(' ', "").to_lowercase()
    );
    vec![post; req.num_posts.min(MAX_ITEM_COUNT)]
}
