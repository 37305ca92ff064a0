//! `$NAME$` placeholder substitution applied to the raw document text.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error};

/// Maps literal tokens (`$NAME$`) to their replacement text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    tokens: BTreeMap<String, String>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a comma-separated list of variable names, trimming whitespace
    /// and dropping empty entries.
    pub fn parse_names(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Builds a table from the process environment. Names that are not set
    /// (or not valid unicode) are silently left out.
    pub fn from_env<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_names_with(names, |name| std::env::var(name).ok())
    }

    /// Builds a table using a custom lookup, so callers and tests need not
    /// touch the process environment.
    pub fn from_names_with<I, S>(names: I, lookup: impl Fn(&str) -> Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for name in names {
            let name = name.as_ref();
            match lookup(name) {
                Some(value) => {
                    // first mention wins
                    if table.get(name).is_none() {
                        table.insert(name, value);
                    }
                }
                None => debug!(variable = %name, "Substitution variable not set, skipping"),
            }
        }
        table
    }

    /// Registers `$name$` → `value`.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.tokens.insert(token_for(name), value.into());
    }

    /// Replacement registered for variable `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(&token_for(name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Variable names (without delimiters) present in the table.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .keys()
            .map(|token| token.trim_start_matches('$').trim_end_matches('$'))
    }
}

// values may hold secrets
impl fmt::Debug for SubstitutionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tokens.keys()).finish()
    }
}

fn token_for(name: &str) -> String {
    format!("${name}$")
}

/// Replaces every non-overlapping occurrence of a table token in `text` in a
/// single pass. Longer tokens are tried first, so a token is never split by a
/// shorter one that happens to be its prefix.
pub fn substitute(text: &str, table: &SubstitutionTable) -> String {
    if table.is_empty() {
        return text.to_owned();
    }

    let mut tokens: Vec<&String> = table.tokens.keys().collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            error!(error = ?e, tokens = tokens.len(), "Failed to build substitution pattern, leaving text untouched");
            return text.to_owned();
        }
    };

    re.replace_all(text, |caps: &Captures<'_>| {
        table.tokens.get(&caps[0]).cloned().unwrap_or_default()
    })
    .into_owned()
}
