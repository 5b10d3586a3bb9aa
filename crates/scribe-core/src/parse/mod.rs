//! Parsers that turn free-form model output into structured values.
//!
//! None of these fail: malformed input yields whatever structure could be
//! recovered, and empty input yields an empty structure.

use std::sync::LazyLock;

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

static LIST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid list-number regex"));

static POST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\n\s*\n|^\d+\.\s*").expect("valid post-separator regex")
});

// ---------------------------------------------------------------------------
// Numbered lists
// ---------------------------------------------------------------------------

/// One entry per non-empty line, with any leading `N.` marker removed.
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    text.trim()
        .lines()
        .map(|line| LIST_NUMBER.replace(line.trim(), "").into_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Outlines
// ---------------------------------------------------------------------------

/// Section titles mapped to bullet points, in document order.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    sections: Vec<(String, Vec<String>)>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section. A title that already exists is replaced in place.
    pub fn push_section(&mut self, title: impl Into<String>, points: Vec<String>) {
        let title = title.into();
        match self.sections.iter_mut().find(|(t, _)| *t == title) {
            Some((_, existing)) => *existing = points,
            None => self.sections.push((title, points)),
        }
    }

    pub fn sections(&self) -> &[(String, Vec<String>)] {
        &self.sections
    }

    pub fn get(&self, title: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, points)| points.as_slice())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Serialize for Outline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (title, points) in &self.sections {
            map.serialize_entry(title, points)?;
        }
        map.end()
    }
}

fn keeps_empty_section(title: &str) -> bool {
    title.eq_ignore_ascii_case("introduction") || title.eq_ignore_ascii_case("conclusion")
}

/// Parse `## Section` headers and `- bullet` lines.
///
/// A non-bullet line directly under a header that has no bullets yet is
/// taken as its first bullet. Sections left without bullets are dropped,
/// except an introduction or conclusion.
pub fn parse_outline(text: &str) -> Outline {
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.trim().lines() {
        let line = line.trim();
        if let Some(title) = line.strip_prefix("## ") {
            let title = title.trim();
            let idx = match sections.iter().position(|(t, _)| t == title) {
                Some(idx) => {
                    sections[idx].1.clear();
                    idx
                }
                None => {
                    sections.push((title.to_string(), Vec::new()));
                    sections.len() - 1
                }
            };
            current = Some(idx);
        } else if let (Some(point), Some(idx)) = (line.strip_prefix("- "), current) {
            let point = point.trim();
            if !point.is_empty() {
                sections[idx].1.push(point.to_string());
            }
        } else if let Some(idx) = current {
            if !line.is_empty() && sections[idx].1.is_empty() {
                sections[idx].1.push(line.to_string());
            }
        }
    }

    sections.retain(|(title, points)| !points.is_empty() || keeps_empty_section(title));
    Outline { sections }
}

// ---------------------------------------------------------------------------
// FAQs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// Strip `prefix` from the start of `line`, ignoring ASCII case.
fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn question_text(line: &str) -> Option<&str> {
    strip_prefix_ci(line, "q:").or_else(|| strip_prefix_ci(line, "question:"))
}

fn answer_text(line: &str) -> Option<&str> {
    strip_prefix_ci(line, "a:").or_else(|| strip_prefix_ci(line, "answer:"))
}

/// Parse `Q:`/`A:` (or `Question:`/`Answer:`) pairs.
///
/// Lines after an answer line are folded into that answer. Blank lines are
/// ignored. Pairs missing either half are discarded.
pub fn parse_faqs(text: &str) -> Vec<FaqItem> {
    fn flush(q: &Option<String>, a: &Option<String>, out: &mut Vec<FaqItem>) {
        if let (Some(q), Some(a)) = (q, a) {
            let (q, a) = (q.trim(), a.trim());
            if !q.is_empty() && !a.is_empty() {
                out.push(FaqItem {
                    question: q.to_string(),
                    answer: a.to_string(),
                });
            }
        }
    }

    let mut faqs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Option<String> = None;

    for line in text.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(q) = question_text(line) {
            flush(&question, &answer, &mut faqs);
            question = Some(q.trim().to_string());
            answer = Some(String::new());
        } else if let Some(a) = answer_text(line) {
            if question.is_some() {
                answer = Some(a.trim().to_string());
            }
        } else if let Some(a) = answer.as_mut() {
            if !a.is_empty() {
                a.push(' ');
            }
            a.push_str(line);
        }
    }
    flush(&question, &answer, &mut faqs);

    faqs
}

// ---------------------------------------------------------------------------
// Social posts
// ---------------------------------------------------------------------------

/// Split a block of posts on blank lines or `N.` markers.
///
/// If that produces at most one post but the text spans several lines, each
/// non-empty line is taken as its own post.
pub fn parse_social_posts(text: &str) -> Vec<String> {
    let posts: Vec<String> = POST_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if posts.len() <= 1 && text.contains('\n') {
        return text
            .trim()
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
    }
    posts
}
