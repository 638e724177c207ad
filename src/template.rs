//! Template substitution against session state
//!
//! Message texts, comments and HTTP bodies may carry `{{placeholder}}`
//! markers. The three `contact.*` placeholders resolve against the session's
//! contact record; any other `{{identifier}}` resolves against the session
//! variables. Unmatched placeholders survive verbatim so that workflow
//! authors can see what never got filled in.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::session::Session;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid pattern"))
}

/// Substitute placeholders in `text` from the session.
pub fn substitute(text: &str, session: &Session) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = text
        .replace("{{contact.name}}", &session.contact.name)
        .replace("{{contact.phone_number}}", &session.contact.phone_number)
        .replace("{{contact.email}}", &session.contact.email);

    variable_pattern()
        .replace_all(&text, |caps: &Captures| {
            match session.variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
