//! Placeholder substitution for command and path templates
//!
//! Two placeholder kinds exist and are never mixed:
//!
//! - **named** `{cam}`, `{root}`, `{anything}`: used in `command` and `log`,
//!   resolved against a [`Bindings`] implementation by [`render`]
//! - **positional** `{}`: used in `files` and `performance.file`, replaced by
//!   the camera name in [`render_positional`]
//!
//! `{{` and `}}` produce literal braces in both kinds. Rendering is a single
//! pass: substituted values are copied verbatim and never re-scanned.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use nip_harness::template::{render, render_positional};
//!
//! let mut vars = BTreeMap::new();
//! vars.insert("cam".to_string(), "Nikon D90".to_string());
//! assert_eq!(render("--cam \"{cam}\"", &vars)?, "--cam \"Nikon D90\"");
//! assert_eq!(render_positional("snapshots/{}/inet", "Nikon D90")?, "snapshots/Nikon D90/inet");
//! # Ok::<(), nip_harness::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::{Error, Result};

/// Source of values for named placeholders.
pub trait Bindings {
    /// Value bound to `key`, if any.
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl Bindings for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl<S: BuildHasher> Bindings for HashMap<String, String, S> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl<B: Bindings + ?Sized> Bindings for &B {
    fn lookup(&self, key: &str) -> Option<&str> {
        (**self).lookup(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Named(&'a str),
    Positional,
}

fn is_valid_name(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split a template into literal runs and placeholders.
fn tokenize(template: &str) -> Result<Vec<Token<'_>>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                // Doubled brace: keep one as literal text.
                tokens.push(Token::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                if literal_start < i {
                    tokens.push(Token::Literal(&template[literal_start..i]));
                }
                let close = template[i + 1..]
                    .find('}')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| {
                        Error::template(template, format!("unterminated placeholder at byte {i}"))
                    })?;
                let name = &template[i + 1..close];
                if name.is_empty() {
                    tokens.push(Token::Positional);
                } else if is_valid_name(name) {
                    tokens.push(Token::Named(name));
                } else {
                    return Err(Error::template(
                        template,
                        format!("invalid placeholder name '{name}'"),
                    ));
                }
                i = close + 1;
                literal_start = i;
            }
            b'}' => {
                return Err(Error::template(
                    template,
                    format!("unmatched '}}' at byte {i}"),
                ));
            }
            _ => i += 1,
        }
    }

    if literal_start < bytes.len() {
        tokens.push(Token::Literal(&template[literal_start..]));
    }
    Ok(tokens)
}

/// Render a template with named placeholders.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template is malformed, contains a
/// positional `{}` placeholder, or references a name `bindings` does not
/// provide.
pub fn render(template: &str, bindings: &impl Bindings) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for token in tokenize(template)? {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Named(name) => {
                let value = bindings.lookup(name).ok_or_else(|| {
                    Error::template(template, format!("no value for placeholder '{{{name}}}'"))
                })?;
                out.push_str(value);
            }
            Token::Positional => {
                return Err(Error::template(
                    template,
                    "positional placeholder '{}' is not allowed in a named template",
                ));
            }
        }
    }
    Ok(out)
}

/// Render a template whose `{}` placeholders all take `value`.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template is malformed or contains a
/// named placeholder.
pub fn render_positional(template: &str, value: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len() + value.len());
    for token in tokenize(template)? {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Positional => out.push_str(value),
            Token::Named(name) => {
                return Err(Error::template(
                    template,
                    format!("named placeholder '{{{name}}}' is not allowed in a positional template"),
                ));
            }
        }
    }
    Ok(out)
}

/// Distinct named placeholders referenced by `template`, in first-use order.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template is malformed.
pub fn placeholders(template: &str) -> Result<Vec<&str>> {
    let mut names: Vec<&str> = Vec::new();
    for token in tokenize(template)? {
        if let Token::Named(name) = token {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}
