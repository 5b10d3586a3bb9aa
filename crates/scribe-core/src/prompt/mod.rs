//! Prompt construction, one builder per content type.
//!
//! Each prompt is an ordered list of clauses: a base instruction, optional
//! clauses for the parameters the caller actually supplied, and a closing
//! directive describing the output format the parsers in
//! [`crate::parse`] expect.

use crate::content::requests::{
    BlogIdeasRequest, BlogOutlineRequest, FullBlogPostRequest, SeoDescriptionRequest,
    SeoFaqsRequest, SocialMediaPostsRequest, TitleRequest,
};

/// Source-text budget for SEO description prompts, in chars.
pub const SEO_SNIPPET_CHARS: usize = 800;
/// Context budget for FAQ prompts, in chars.
pub const FAQ_SNIPPET_CHARS: usize = 500;
/// Context budget for social-post prompts, in chars.
pub const SOCIAL_SNIPPET_CHARS: usize = 700;

/// First `max_chars` chars of `text`, with `...` appended only if anything
/// was cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// First `max_chars` chars of `text`, no marker.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn title_prompt(req: &TitleRequest) -> String {
    let mut parts = vec![format!(
        "Generate a compelling and {} title for a piece of content about '{}'.",
        req.style,
        req.topic.trim()
    )];
    if let Some(keywords) = non_empty(&req.keywords) {
        parts.push(format!(
            "Try to naturally incorporate one or more of these keywords if relevant: {}.",
            keywords.join(", ")
        ));
    }
    if let Some(tone) = &req.tone {
        parts.push(format!("The desired tone for the title is: {tone}."));
    }
    parts.push(
        "The title should be concise and engaging. Return only the title itself, \
         without any extra conversational text or quotation marks."
            .to_string(),
    );
    parts.join(" ")
}

pub fn seo_description_prompt(req: &SeoDescriptionRequest) -> String {
    let mut parts = vec![format!(
        "Write an engaging SEO meta description for the following content. The description \
         should be approximately {} characters long (but not exceeding it by much).",
        req.max_length
    )];
    if let Some(keywords) = non_empty(&req.keywords) {
        parts.push(format!(
            "If possible, naturally include some of these keywords: {}.",
            keywords.join(", ")
        ));
    }
    parts.push(format!(
        "The content is about: '{}'.",
        snippet(&req.text_content, SEO_SNIPPET_CHARS)
    ));
    parts.push(
        "The description should be a single, coherent paragraph. Return only the description \
         itself, without any extra conversational text or quotation marks."
            .to_string(),
    );
    parts.join(" ")
}

pub fn blog_ideas_prompt(req: &BlogIdeasRequest) -> String {
    let mut parts = vec![format!(
        "Generate a list of {} engaging blog post ideas about '{}'.",
        req.num_ideas,
        req.topic.trim()
    )];
    if let Some(audience) = &req.target_audience {
        parts.push(format!(
            "The target audience for these blog posts is: {audience}."
        ));
    }
    if let Some(style) = &req.style {
        parts.push(format!(
            "The desired style for the blog ideas is: {style} (e.g., 'how-to guides', \
             'listicles', 'case studies', 'opinion pieces')."
        ));
    }
    parts.push(
        "Each idea should be a concise and compelling title or a short concept suitable for \
         a blog post."
            .to_string(),
    );
    parts.push(
        "Please format the output as a numbered list, with each idea on a new line. \
         For example:\n1. First idea\n2. Second idea"
            .to_string(),
    );
    parts.join(" ")
}

pub fn blog_outline_prompt(req: &BlogOutlineRequest) -> String {
    let mut parts = vec![
        format!(
            "Generate a detailed blog post outline for the topic: '{}'.",
            req.topic.trim()
        ),
        format!(
            "The outline should have approximately {} main sections, including an \
             introduction and a conclusion.",
            req.num_sections
        ),
        "For each main section, provide a clear title and 2-4 key bullet points or \
         sub-topics to cover within that section."
            .to_string(),
    ];
    if let Some(audience) = &req.target_audience {
        parts.push(format!("The target audience is: {audience}."));
    }
    if let Some(style) = &req.style {
        parts.push(format!("The desired style of the blog post is: {style}."));
    }
    parts.push(
        "Please format the output clearly. Main section titles should start with '## ' \
         (e.g., '## Introduction'). Bullet points under each section should start with \
         '- ' (e.g., '- Key point 1')."
            .to_string(),
    );
    parts.join("\n")
}

pub fn full_blog_post_prompt(req: &FullBlogPostRequest) -> String {
    let length = req.blog_length;
    let mut prompt = format!(
        "Write a {} blog post (~{} words) about {}. The post should have {} main sections \
         including introduction and conclusion. ",
        length.as_str(),
        length.approx_words(),
        req.topic,
        length.sections()
    );
    if let Some(audience) = &req.target_audience {
        prompt.push_str(&format!("Target audience: {audience}. "));
    }
    if let Some(style) = &req.style {
        prompt.push_str(&format!("Writing style: {style}. "));
    }
    prompt.push_str(
        "Format the post in Markdown with appropriate headings, paragraphs, and section \
         breaks. Make it engaging and well-structured.",
    );
    prompt
}

pub fn seo_faqs_prompt(req: &SeoFaqsRequest) -> String {
    let mut parts = vec![format!(
        "Generate a list of {} frequently asked questions (FAQs) and their concise answers \
         related to the topic: '{}'.",
        req.num_faqs,
        req.topic.trim()
    )];
    if let Some(context) = req.content_snippet.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!(
            "Consider the following content snippet for context: \"{}\"",
            snippet(context, FAQ_SNIPPET_CHARS)
        ));
    }
    if let Some(style) = &req.style {
        parts.push(format!("The desired style of the answers is: {style}."));
    }
    parts.push(
        "Format each FAQ with 'Q: [Question]' followed by 'A: [Answer]' on new lines. \
         Ensure answers are informative yet brief, suitable for an FAQ section aimed at \
         improving SEO."
            .to_string(),
    );
    parts.join("\n")
}

pub fn social_posts_prompt(req: &SocialMediaPostsRequest) -> String {
    let platform = &req.platform;
    let mut parts = vec![format!(
        "Generate {} engaging social media posts for the {platform} platform.",
        req.num_posts
    )];
    if let Some(topic) = req.topic() {
        parts.push(format!(
            "The posts should be about the topic: '{}'.",
            topic.trim()
        ));
    }
    if let Some(context) = req.content_snippet() {
        parts.push(format!(
            "Base the posts on the following content snippet (extract key messages): \"{}\"",
            snippet(context, SOCIAL_SNIPPET_CHARS)
        ));
    }
    if let Some(tone) = &req.tone {
        parts.push(format!("The desired tone is: {tone}."));
    }
    if let Some(cta) = &req.call_to_action {
        parts.push(format!(
            "Each post should ideally include or lead to this call to action: '{cta}'."
        ));
    }
    if req.include_hashtags {
        parts.push("Include 2-3 relevant hashtags for each post.".to_string());
    }
    parts.push(format!(
        "Ensure each post is concise and suitable for {platform}. Format the output as a \
         list of posts, each on a new line or numbered."
    ));
    parts.join("\n")
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|l| !l.is_empty())
}
