//! Text normalization shared by every matching stage
//!
//! Comparison keys are never shown to a user; display strings go through
//! [`FilenameScrubber`] or [`clean_tag_name`] instead.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::warn;

/// Release-group / resolution / codec / source tokens removed from filenames
const BUILTIN_SCRUB_PATTERNS: &[&str] = &[
    r"\b\d{3,4}p\b",
    r"MP4-(.+?)$",
    r"WMV-(.+?)$",
    r"x264-(.+?)$",
    r"\bXXX\b",
    r"-UNKNOWN",
    r"DVDRip",
    r"WEBRIP",
    r"\bWEB\b",
    r"\[PRiVATE\]",
    r"HEVC",
    r"x265",
    r"PRT-xpost",
    r"-xpost",
    r"\bSD\b",
    r"\bHD\b",
    r"\brq\b",
    r"\bKTR\b",
    r"\bRARBG\b",
    r"&",
];

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Canonical comparison key: lower-cased, punctuation removed, a
/// connecting "and" dropped, all whitespace removed.
///
/// Idempotent: the output is a single whitespace-free token, which a second
/// pass leaves untouched.
pub fn normalize_for_compare(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced: String = lowered
        .chars()
        .filter_map(|c| match c {
            '-' | '#' | '&' => Some(' '),
            '\'' | ':' | '.' | ',' | '?' | '!' => None,
            other => Some(other),
        })
        .collect();

    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let last = tokens.len().saturating_sub(1);
    tokens
        .iter()
        .enumerate()
        .filter(|(i, token)| !(**token == "and" && *i != 0 && *i != last))
        .map(|(_, token)| *token)
        .collect()
}

/// Replacement hook that fully takes over filename cleanup
pub type ScrubOverride = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Filename de-noiser: a case-insensitive regex deny-list, or an injected
/// override function that replaces the built-in rules entirely.
#[derive(Clone)]
pub struct FilenameScrubber {
    patterns: Vec<Regex>,
    override_fn: Option<ScrubOverride>,
}

impl std::fmt::Debug for FilenameScrubber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilenameScrubber")
            .field("patterns", &self.patterns.len())
            .field("override", &self.override_fn.is_some())
            .finish()
    }
}

impl Default for FilenameScrubber {
    fn default() -> Self {
        Self::from_patterns(BUILTIN_SCRUB_PATTERNS.iter().copied())
    }
}

impl FilenameScrubber {
    /// Build from user patterns; invalid patterns are skipped with a warning
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref();
                match RegexBuilder::new(p).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = %p, error = %e, "Skipping invalid scrub pattern");
                        None
                    }
                }
            })
            .collect();
        Self {
            patterns,
            override_fn: None,
        }
    }

    /// Replace the built-in rules with `f`
    pub fn with_override(f: ScrubOverride) -> Self {
        Self {
            patterns: Vec::new(),
            override_fn: Some(f),
        }
    }

    /// Clean a filename stem for use as a search query
    pub fn scrub(&self, name: &str) -> String {
        if let Some(f) = &self.override_fn {
            return f(name).trim().to_string();
        }

        let mut cleaned = name.replace(['.', '_'], " ").replace('\'', "");
        for re in &self.patterns {
            cleaned = re.replace_all(&cleaned, " ").into_owned();
        }
        WHITESPACE_RUN.replace_all(cleaned.trim(), " ").into_owned()
    }
}

/// Tag display name: hyphens to spaces, parentheses dropped, title-cased
pub fn clean_tag_name(name: &str) -> String {
    let spaced = name.replace('-', " ").replace(['(', ')'], "");
    title_case(spaced.trim())
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Remove `prefix` from the start of `text` when present (case-sensitive)
pub fn strip_leading<'a>(text: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return text;
    }
    text.strip_prefix(prefix).unwrap_or(text)
}

/// Studio name with all spaces removed
pub fn compact_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_key_strips_punctuation_and_space() {
        assert_eq!(normalize_for_compare("Jane Doe's: Big-Day, Part #2."), "janedoesbigdaypart2");
        assert_eq!(normalize_for_compare("Jane & John"), "janejohn");
        assert_eq!(normalize_for_compare("Jane and John"), "janejohn");
    }

    #[test]
    fn compare_key_keeps_edge_and() {
        assert_eq!(normalize_for_compare("and"), "and");
        assert_eq!(normalize_for_compare("Sand and Sea"), "sandsea");
        assert_eq!(normalize_for_compare("Black and"), "blackand");
    }

    #[test]
    fn compare_key_is_idempotent() {
        let samples = [
            "",
            "   ",
            "an d",
            "Jane Doe And John Roe Sc1 1080p",
            "A.N.D",
            "Ünïcödé - Straße & Co.",
            "and and and",
        ];
        for s in samples {
            let once = normalize_for_compare(s);
            assert_eq!(normalize_for_compare(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn scrub_removes_release_noise() {
        let scrubber = FilenameScrubber::default();
        assert_eq!(
            scrubber.scrub("Some.Studio.21.03.04.Jane.Doe.XXX.1080p.MP4-KTR"),
            "Some Studio 21 03 04 Jane Doe"
        );
        assert_eq!(scrubber.scrub("jane_doe_hd_web"), "jane doe");
        assert_eq!(scrubber.scrub(""), "");
    }

    #[test]
    fn custom_patterns_replace_builtin() {
        let scrubber = FilenameScrubber::from_patterns(["promo", "(unclosed"]);
        assert_eq!(scrubber.scrub("Promo.Clip.1080p"), "Clip 1080p");
    }

    #[test]
    fn override_hook_wins() {
        let scrubber = FilenameScrubber::with_override(Arc::new(|s: &str| s.to_uppercase()));
        assert_eq!(scrubber.scrub(" clip.1080p "), "CLIP.1080P");
    }

    #[test]
    fn tag_names_are_cleaned() {
        assert_eq!(clean_tag_name("big-tits"), "Big Tits");
        assert_eq!(clean_tag_name("(POV) close up"), "Pov Close Up");
        assert_eq!(clean_tag_name("3d"), "3D");
    }

    #[test]
    fn strip_leading_only_at_start() {
        assert_eq!(strip_leading("Jane Doe and John", "Jane Doe"), " and John");
        assert_eq!(strip_leading("John and Jane Doe", "Jane Doe"), "John and Jane Doe");
        assert_eq!(compact_name("Brazzers Exxtra"), "BrazzersExxtra");
    }
}
