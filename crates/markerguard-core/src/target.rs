//! Target extraction from free-form command text
//!
//! Commands name their object with `id:`, `label:` and `set:` pairs, quoted
//! or bare, anywhere in the text. A command without a `label:` pair falls back
//! to its first positional token that is not itself a pair.

use once_cell::sync::Lazy;
use regex::Regex;

static ARG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b([a-z]+):("[^"]*"|\S+)"#).expect("argument pattern is valid")
});

/// Which object a command refers to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetDescriptor {
    /// Object id given with `id:`
    pub explicit_id: Option<String>,
    /// Display label from `label:` or the first positional token
    pub label: Option<String>,
    /// Scope given with `set:`
    pub scope: Option<String>,
}

impl TargetDescriptor {
    /// Descriptor with only an explicit id
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            explicit_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Descriptor with only a label
    #[must_use]
    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Set the scope
    #[must_use]
    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Extract a descriptor from command text
    ///
    /// # Arguments
    /// * `raw` - Command text scanned for `key:value` pairs
    /// * `tokens` - Whitespace-split tokens of the same command
    /// * `start` - Index of the first positional token after the verbs
    ///
    /// # Returns
    /// `None` if neither an id nor a label could be found
    #[must_use]
    pub fn extract(raw: &str, tokens: &[&str], start: usize) -> Option<Self> {
        let mut descriptor = Self::default();

        for captures in ARG_PATTERN.captures_iter(raw) {
            let value = strip_quotes(&captures[2]).to_string();
            match captures[1].to_ascii_lowercase().as_str() {
                "id" => descriptor.explicit_id = Some(value),
                "label" => descriptor.label = Some(value),
                "set" => descriptor.scope = Some(value),
                _ => {}
            }
        }

        if descriptor.label.is_none() {
            descriptor.label = tokens
                .iter()
                .skip(start)
                .find(|token| !token.contains(':'))
                .map(|token| strip_quotes(token).to_string());
        }

        if descriptor.explicit_id.is_none() && descriptor.label.is_none() {
            return None;
        }
        Some(descriptor)
    }

    /// Scope name with empty treated as absent
    #[inline]
    #[must_use]
    pub fn scope_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.scope.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => default,
        }
    }
}

/// Trim, then strip one pair of surrounding double quotes
fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}
