//! Python identifiers derived from labels and keys.

use std::collections::HashSet;

use heck::{ToSnakeCase, ToUpperCamelCase};

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

fn identifier_chars(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

/// `"summarize text"` → `SummarizeText`. Falls back to `fallback` for empty labels.
pub fn class_name(label: &str, fallback: &str) -> String {
    let name = identifier_chars(&label.to_upper_camel_case());
    if name.is_empty() {
        return fallback.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("{}{}", fallback, name);
    }
    name
}

/// `"Final Answer"` → `final_answer`; keywords get a trailing underscore.
pub fn snake_name(key: &str, fallback: &str) -> String {
    let mut name = identifier_chars(&key.to_snake_case());
    if name.is_empty() {
        name = fallback.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("{}_{}", fallback, name);
    }
    if PYTHON_KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !PYTHON_KEYWORDS.contains(&s)
}

/// Hands out names that are unique within one namespace.
#[derive(Debug, Clone, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `base`, or `base{sep}2`, `base{sep}3`, ... if already taken.
    pub fn claim(&mut self, base: &str, sep: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}{}", base, sep, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
