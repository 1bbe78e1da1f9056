//! Token usage accounting.
//!
//! Providers do not always report every counter. An absent counter means
//! "no data", which is different from zero, so merging keeps absence when
//! both sides are absent.

use serde::{Deserialize, Serialize};

/// Token counts for one turn or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(input: Option<u64>, output: Option<u64>, total: Option<u64>) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
        }
    }

    /// All three counters present; total is input + output.
    pub fn counted(input: u64, output: u64) -> Self {
        Self::new(Some(input), Some(output), Some(input + output))
    }

    /// Null-safe component-wise sum.
    pub fn merge(self, other: Self) -> Self {
        Self {
            input_tokens: safe_sum(self.input_tokens, other.input_tokens),
            output_tokens: safe_sum(self.output_tokens, other.output_tokens),
            total_tokens: safe_sum(self.total_tokens, other.total_tokens),
        }
    }

    /// True when no counter was ever reported.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }
}

fn safe_sum(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x),
        (Some(x), Some(y)) => Some(x.saturating_add(y)),
    }
}

impl std::ops::Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn show(v: Option<u64>) -> String {
            v.map_or_else(|| "-".to_string(), |n| n.to_string())
        }
        write!(
            f,
            "TokenUsage {{ input: {}, output: {}, total: {} }}",
            show(self.input_tokens),
            show(self.output_tokens),
            show(self.total_tokens)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_plus_absent_keeps_present() {
        let a = TokenUsage::new(Some(5), None, None);
        let b = TokenUsage::default();
        assert_eq!(a.merge(b).input_tokens, Some(5));
        assert_eq!(b.merge(a).input_tokens, Some(5));
    }

    #[test]
    fn absent_plus_absent_stays_absent() {
        let merged = TokenUsage::default().merge(TokenUsage::default());
        assert!(merged.is_empty());
        assert_eq!(merged, TokenUsage::default());
    }

    #[test]
    fn zero_is_not_absent() {
        let merged = TokenUsage::new(Some(0), None, None).merge(TokenUsage::default());
        assert_eq!(merged.input_tokens, Some(0));
        assert!(!merged.is_empty());
    }

    #[test]
    fn counted_sums_components() {
        let mut total = TokenUsage::counted(10, 5);
        total += TokenUsage::counted(3, 2);
        assert_eq!(total, TokenUsage::new(Some(13), Some(7), Some(20)));
    }

    #[test]
    fn display_marks_absent_counters() {
        let usage = TokenUsage::new(Some(5), None, Some(5));
        assert_eq!(usage.to_string(), "TokenUsage { input: 5, output: -, total: 5 }");
    }
}
