use regex::{Regex, RegexBuilder};

use crate::error::QueryError;

/// Upper bound on the compiled program size of a single pattern
const MAX_COMPILED_SIZE: usize = 1 << 20;

/// Compiled URL pattern.
///
/// Syntax is that of the `regex` crate. Matching is full-match: the pattern
/// has to cover the whole URL, so `.*` and `^.*$` both accept everything while
/// a bare `a\.com` accepts nothing longer than `a.com`. Content and header
/// assertions reuse it with the same full-match rule.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Result<Self, QueryError> {
        if pattern.is_empty() {
            return Err(QueryError::InvalidPattern {
                pattern: String::new(),
                reason: "empty string is not a valid pattern".to_string(),
            });
        }

        // Validate the pattern on its own first so input like ")(" cannot
        // close the anchoring group.
        build(pattern).map_err(|err| invalid(pattern, err))?;
        let regex = build(&format!("^(?:{pattern})$")).map_err(|err| invalid(pattern, err))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn build(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .size_limit(MAX_COMPILED_SIZE)
        .build()
}

fn invalid(pattern: &str, err: regex::Error) -> QueryError {
    let reason = match err {
        regex::Error::CompiledTooBig(limit) => {
            format!("compiled pattern exceeds the {limit} byte limit")
        }
        other => other
            .to_string()
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .to_string(),
    };
    QueryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    }
}
