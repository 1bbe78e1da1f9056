//! Pre-run guardrails.
//!
//! A guardrail sees the first user message of a run, once, before the model
//! is called. It either lets the run proceed or rejects it outright.

use serde::{Deserialize, Serialize};

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// The injection point for request policy.
pub trait Guardrail: Send + Sync {
    fn check(&self, prompt: &str) -> Result<(), Rejection>;
}

/// Lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Guardrail for AllowAll {
    fn check(&self, _prompt: &str) -> Result<(), Rejection> {
        Ok(())
    }
}

/// Rejects prompts containing any denied keyword (case-insensitive).
///
/// Rules come from text with one directive per line; only lines of the form
/// `deny: keyword` are understood, everything else is ignored.
#[derive(Debug, Clone, Default)]
pub struct DenyKeywordGuardrail {
    keywords: Vec<String>,
}

impl DenyKeywordGuardrail {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parse `deny:` directives out of free-form guardrail text.
    pub fn from_rules(text: &str) -> Self {
        let keywords = text.lines().filter_map(|line| {
            let line = line.trim();
            let prefix = line.get(..5)?;
            if prefix.eq_ignore_ascii_case("deny:") {
                Some(line[5..].trim().to_string())
            } else {
                None
            }
        });
        Self::new(keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Guardrail for DenyKeywordGuardrail {
    fn check(&self, prompt: &str) -> Result<(), Rejection> {
        let lowered = prompt.to_lowercase();
        match self.keywords.iter().find(|k| lowered.contains(k.as_str())) {
            Some(keyword) => Err(Rejection::new(format!("prompt mentions denied keyword '{keyword}'"))),
            None => Ok(()),
        }
    }
}
