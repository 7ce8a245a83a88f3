// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Field identifier normalization
//!
//! Raw header tokens carry units and decorations ("velocity (m/s)") and can
//! repeat within a single header. A field identifier is the leading run of
//! word characters of the token; repeats get `_1`, `_2`, ... appended in
//! order of appearance.

use crate::{Error, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static LEADING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+").expect("leading word pattern is valid"));

/// The leading run of word characters of `token`
pub fn first_word(token: &str) -> Result<&str> {
    LEADING_WORD
        .find(token)
        .map(|m| m.as_str())
        .ok_or_else(|| Error::InvalidFieldName {
            token: token.to_string(),
        })
}

/// Reduce every token to its first word, keeping duplicates
pub fn first_words<I, S>(tokens: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| first_word(t.as_ref()).map(str::to_string))
        .collect()
}

/// Suffix repeated names with `_1`, `_2`, ... so every name is distinct.
///
/// The store treats identifiers case-insensitively, so names differing only
/// in ASCII case count as repeats. A suffix already taken by another name is
/// skipped.
#[must_use]
pub fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut unified = Vec::with_capacity(names.len());

    for name in names {
        let key = name.to_ascii_lowercase();
        if taken.insert(key.clone()) {
            unified.push(name);
            continue;
        }
        let counter = repeats.entry(key).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{name}_{counter}");
            if taken.insert(candidate.to_ascii_lowercase()) {
                unified.push(candidate);
                break;
            }
        }
    }
    unified
}

/// First-word normalization followed by de-duplication
pub fn normalize<I, S>(tokens: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(dedupe(first_words(tokens)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_word_strips_decorations() {
        assert_eq!(first_word("velocity (m/s)").unwrap(), "velocity");
        assert_eq!(first_word("coordX").unwrap(), "coordX");
        assert_eq!(first_word("a_1").unwrap(), "a_1");
        assert_eq!(first_word("Points_0").unwrap(), "Points_0");
        assert!(matches!(
            first_word("(m/s)"),
            Err(Error::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn test_dedupe_suffixes_in_order() {
        let names = ["a", "b", "a", "a", "b"].map(String::from).to_vec();
        assert_eq!(dedupe(names), vec!["a", "b", "a_1", "a_2", "b_1"]);
    }

    #[test]
    fn test_dedupe_skips_taken_suffix() {
        let names = ["a", "a_1", "a"].map(String::from).to_vec();
        assert_eq!(dedupe(names), vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn test_dedupe_is_case_insensitive() {
        let names = ["MLUPs", "mlups"].map(String::from).to_vec();
        assert_eq!(dedupe(names), vec!["MLUPs", "mlups_1"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(["t (s)", "rho", "rho", "u:0", "rho_1"]).unwrap();
        assert_eq!(once, vec!["t", "rho", "rho_1", "u", "rho_1_1"]);
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }
}
