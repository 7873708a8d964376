//! Caption templates.
//!
//! A caption is free text with variables taken from the image's tag table.
//! Variables use a two-character `##` delimiter so that a single `#` (hex
//! colors, "photo #3") needs no escaping:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `##DateTime` | value of tag `DateTime` |
//! | `##{Model}x` | braced form, for variables followed by identifier characters |
//! | `####` | a literal `##` |
//!
//! Identifiers are ASCII letters, digits and `_`, not starting with a digit.
//! Anything else after `##` is left alone.
//!
//! Substitution is **safe**: a variable missing from the tag table stays in the
//! caption verbatim and is reported in [`Composition::missing`]. One photo
//! lacking a `Model` tag must not take down a batch of hundreds.

use crate::metadata::MetadataMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Variable delimiter.
pub const DELIMITER: &str = "##";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"##(?:(?P<escaped>##)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("placeholder pattern is valid")
});

/// Result of expanding a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    /// The caption text, with unresolved variables left as written.
    pub text: String,
    /// Variables referenced by the template but absent from the tag table,
    /// in order of appearance, without duplicates.
    pub missing: Vec<String>,
}

/// Expand `template` against `variables`.
pub fn compose(template: &str, variables: &MetadataMap) -> Composition {
    let mut missing: Vec<String> = Vec::new();

    let text = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        if caps.name("escaped").is_some() {
            return DELIMITER.to_string();
        }
        let Some(name) = caps.name("named").or_else(|| caps.name("braced")) else {
            return caps[0].to_string();
        };
        match variables.get(name.as_str()) {
            Some(value) => value.to_string(),
            None => {
                if !missing.iter().any(|m| m == name.as_str()) {
                    missing.push(name.as_str().to_string());
                }
                caps[0].to_string()
            }
        }
    });

    for name in &missing {
        log::warn!("Missed variable '{name}' given in caption '{template}'. Left unexpanded.");
    }

    Composition {
        text: text.into_owned(),
        missing,
    }
}

/// Variable names referenced by a template, in order, without duplicates.
pub fn variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(name) = caps.name("named").or_else(|| caps.name("braced")) else {
            continue;
        };
        if !names.iter().any(|n| n == name.as_str()) {
            names.push(name.as_str().to_string());
        }
    }
    names
}
