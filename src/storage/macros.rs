//! Localized link macro substitution.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Language placeholder embedded in server-provided links
    static ref LANGUAGE_MACRO: Regex = Regex::new(r"(?i)%%LANGUAGE%%").unwrap();
}

/// Replace every `%%LANGUAGE%%` placeholder in `link` with `language`.
pub fn substitute_language_macro(link: &str, language: &str) -> String {
    LANGUAGE_MACRO
        .replace_all(link, regex::NoExpand(language))
        .into_owned()
}
