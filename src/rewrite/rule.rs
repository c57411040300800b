//! Rule set compilation and the header rewrite pass.
//!
//! # Responsibilities
//! - Compile raw `(header, regex, replacement)` declarations once, at startup
//! - Reject the whole set if any pattern fails to compile
//! - Apply every rule, in order, to a response header map
//!
//! # Design Decisions
//! - Patterns run in byte mode so values that are not UTF-8 still rewrite
//! - Header names are resolved the way `HeaderMap` stores them (lowercase);
//!   a name that can never be a header key makes the rule a permanent skip
//! - Templates use `$1`, `${1}` and `${name}`; unknown groups expand to ""

use std::borrow::Cow;

use axum::http::{header::Entry, HeaderMap, HeaderName, HeaderValue};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rewrite::observer::{RewriteEvent, RewriteObserver};

/// One rewrite declaration as it appears in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Response header whose values are rewritten.
    pub header: String,

    /// Regular expression matched against each value.
    pub regex: String,

    /// Replacement template for every match.
    pub replacement: String,
}

impl RewriteConfig {
    pub fn new(
        header: impl Into<String>,
        regex: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            header: header.into(),
            regex: regex.into(),
            replacement: replacement.into(),
        }
    }
}

/// Raised when a rule set cannot be built.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("rewrite #{index} for header {header:?}: invalid regex {pattern:?}: {source}")]
    InvalidPattern {
        index: usize,
        header: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    header: String,
    key: Option<HeaderName>,
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Compile a single declaration.
    pub fn compile(config: &RewriteConfig) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&config.regex)?;
        let key = HeaderName::from_bytes(config.header.as_bytes()).ok();
        if key.is_none() {
            tracing::warn!(
                header = %config.header,
                "Rewrite targets a name that is not a valid header; it will never match"
            );
        }

        Ok(Self {
            header: config.header.clone(),
            key,
            pattern,
            replacement: config.replacement.clone(),
        })
    }

    /// Header name as declared.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Source text of the pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Replace every non-overlapping match in `value` with the template.
    ///
    /// Borrows when nothing matched.
    pub fn substitute<'v>(&self, value: &'v [u8]) -> Cow<'v, [u8]> {
        self.pattern.replace_all(value, self.replacement.as_bytes())
    }

    /// Rewrite every value of this rule's header in place, keeping order.
    pub fn apply(&self, headers: &mut HeaderMap, observer: &dyn RewriteObserver) {
        let key = match &self.key {
            Some(key) => key,
            None => {
                observer.on_event(&RewriteEvent::NoValues {
                    header: &self.header,
                });
                return;
            }
        };

        // Values are rewritten in place so the header keeps its position in
        // the map and its values keep their order.
        let mut entry = match headers.entry(key) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(_) => {
                observer.on_event(&RewriteEvent::NoValues {
                    header: &self.header,
                });
                return;
            }
        };

        for value in entry.iter_mut() {
            if let Some(rewritten) = self.rewrite_value(value, observer) {
                *value = rewritten;
            }
        }
    }

    /// New value for `original`, or `None` when it stays as it is.
    fn rewrite_value(
        &self,
        original: &HeaderValue,
        observer: &dyn RewriteObserver,
    ) -> Option<HeaderValue> {
        match self.substitute(original.as_bytes()) {
            Cow::Borrowed(_) => {
                observer.on_event(&RewriteEvent::Unmatched {
                    header: &self.header,
                    value: original,
                });
                None
            }
            Cow::Owned(bytes) => match HeaderValue::from_bytes(&bytes) {
                Ok(mut rewritten) => {
                    rewritten.set_sensitive(original.is_sensitive());
                    observer.on_event(&RewriteEvent::Rewritten {
                        header: &self.header,
                        original,
                        rewritten: &rewritten,
                    });
                    Some(rewritten)
                }
                Err(_) => {
                    observer.on_event(&RewriteEvent::ValueRejected {
                        header: &self.header,
                        original,
                    });
                    None
                }
            },
        }
    }
}

/// Ordered, immutable collection of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    /// Compile all declarations, preserving order.
    ///
    /// Fails on the first pattern that does not compile; no partial set is
    /// returned.
    pub fn compile(configs: &[RewriteConfig]) -> Result<Self, ConfigurationError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                RewriteRule::compile(config).map_err(|source| ConfigurationError::InvalidPattern {
                    index,
                    header: config.header.clone(),
                    pattern: config.regex.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// A rule set that leaves every response untouched.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter()
    }

    /// Run every rule against `headers`, in declaration order.
    pub fn rewrite(&self, headers: &mut HeaderMap, observer: &dyn RewriteObserver) {
        for rule in &self.rules {
            rule.apply(headers, observer);
        }
    }
}
