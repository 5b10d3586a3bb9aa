//! Core logic for the scribe content service: quota accounting, the tier
//! registry, prompt construction, response parsing and the generation
//! orchestrator that ties them to a [`generator::TextGenerator`].

pub mod accounts;
pub mod content;
pub mod generator;
pub mod parse;
pub mod prompt;
pub mod quota;
pub mod text;
pub mod tiers;
pub mod token;
