//! Search query construction from a local scene
//!
//! Two strategies: the filename stem (optionally prefixed with trailing
//! directory names), or the scene's own metadata (studio, date, title).
//! Providers with structured release names can plug in a [`QueryPrePass`]
//! that pulls a date and a cleaner title out of the filename first.

use crate::config::ScrapeConfig;
use crate::error::PathParseError;
use crate::services::normalizer::FilenameScrubber;
use crate::types::LocalScene;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// A path split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Directory segments, root first (drive letters excluded)
    pub dirs: Vec<String>,
    pub stem: String,
    pub extension: String,
}

/// Split a POSIX or Windows path into directories, stem and extension
pub fn parse_scene_path(path: &str) -> Result<ParsedPath, PathParseError> {
    let fail = |reason| PathParseError {
        path: path.to_string(),
        reason,
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(fail("empty path"));
    }

    let windows = trimmed.contains('\\') && !trimmed.contains('/');
    let separator = if windows { '\\' } else { '/' };

    let mut segments: Vec<&str> = trimmed.split(separator).filter(|s| !s.is_empty()).collect();
    let file_name = segments.pop().ok_or_else(|| fail("no file name"))?;

    let dot = file_name
        .rfind('.')
        .filter(|&i| i > 0 && i + 1 < file_name.len())
        .ok_or_else(|| fail("no extension separator"))?;

    let dirs = segments
        .into_iter()
        .filter(|s| !is_drive_letter(s))
        .map(str::to_string)
        .collect();

    Ok(ParsedPath {
        dirs,
        stem: file_name[..dot].to_string(),
        extension: file_name[dot + 1..].to_string(),
    })
}

fn is_drive_letter(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Structural hints recovered while building a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHints {
    /// Directory segments of the scene path
    pub dirs: Vec<String>,
    /// Date from the scene or extracted from the filename
    pub date: Option<NaiveDate>,
    /// Working title the query was derived from
    pub title: Option<String>,
}

/// Normalized search string plus hints; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub hints: QueryHints,
}

impl Query {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Same hints, wider text (narrowing retries append studio or date)
    pub fn with_suffix(&self, suffix: &str) -> Query {
        Query {
            text: format!("{} {}", self.text, suffix).trim().to_string(),
            hints: self.hints.clone(),
        }
    }
}

/// What a pre-pass recovered from a filename stem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrePassHints {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
}

/// Provider-specific filename analysis run before scrubbing
pub trait QueryPrePass: Send + Sync {
    fn extract(&self, stem: &str) -> PrePassHints;
}

static DATED_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)[-._ ](\d{2})[-._ ](\d{2})[-._ ](\d{2})[-._ ](.+)$")
        .expect("dated release regex should compile")
});
static EPISODE_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[-._ ]E(\d{2,3})[-._ ](.+)$").expect("episode release regex should compile")
});
static RELEASE_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[-._ ]XXX([-._ ].*)?$").expect("release tail regex should compile")
});

/// `Studio.YY.MM.DD.Title.XXX...` and `Show.E123.Title.XXX...` releases
#[derive(Debug, Clone, Copy, Default)]
pub struct EpisodeDatePrePass;

impl EpisodeDatePrePass {
    fn title_from(rest: &str) -> Option<String> {
        let title = RELEASE_TAIL.replace(rest, "");
        let title = title.replace(['.', '_'], " ");
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    }
}

impl QueryPrePass for EpisodeDatePrePass {
    fn extract(&self, stem: &str) -> PrePassHints {
        if let Some(caps) = DATED_RELEASE.captures(stem) {
            let date = NaiveDate::parse_from_str(
                &format!("20{}-{}-{}", &caps[2], &caps[3], &caps[4]),
                "%Y-%m-%d",
            )
            .ok();
            if date.is_some() {
                return PrePassHints {
                    date,
                    title: Self::title_from(&caps[5]),
                };
            }
        }

        if let Some(caps) = EPISODE_RELEASE.captures(stem) {
            return PrePassHints {
                date: None,
                title: Self::title_from(&caps[2]),
            };
        }

        PrePassHints::default()
    }
}

/// Query strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    Filename { clean: bool, dirs_in_query: usize },
    Metadata { clean: bool },
}

#[derive(Clone)]
pub struct QueryBuilder {
    strategy: QueryStrategy,
    scrubber: FilenameScrubber,
    pre_pass: Option<Arc<dyn QueryPrePass>>,
}

impl QueryBuilder {
    pub fn new(
        strategy: QueryStrategy,
        scrubber: FilenameScrubber,
        pre_pass: Option<Arc<dyn QueryPrePass>>,
    ) -> Self {
        Self {
            strategy,
            scrubber,
            pre_pass,
        }
    }

    pub fn from_config(config: &ScrapeConfig, pre_pass: Option<Arc<dyn QueryPrePass>>) -> Self {
        let strategy = if config.parse_with_filename {
            QueryStrategy::Filename {
                clean: config.clean_filename,
                dirs_in_query: config.dirs_in_query,
            }
        } else {
            QueryStrategy::Metadata {
                clean: config.clean_filename,
            }
        };
        let scrubber = match &config.scrub_patterns {
            Some(patterns) => FilenameScrubber::from_patterns(patterns),
            None => FilenameScrubber::default(),
        };
        Self::new(strategy, scrubber, pre_pass)
    }

    pub fn strategy(&self) -> QueryStrategy {
        self.strategy
    }

    /// Build the search query for `scene`
    pub fn build(&self, scene: &LocalScene) -> Result<Query, PathParseError> {
        match self.strategy {
            QueryStrategy::Filename {
                clean,
                dirs_in_query,
            } => self.build_from_filename(scene, clean, dirs_in_query),
            QueryStrategy::Metadata { clean } => self.build_from_metadata(scene, clean),
        }
    }

    fn build_from_filename(
        &self,
        scene: &LocalScene,
        clean: bool,
        dirs_in_query: usize,
    ) -> Result<Query, PathParseError> {
        let parsed = parse_scene_path(&scene.path)?;
        let extracted = self.run_pre_pass(&parsed.stem);

        let raw_title = extracted.title.as_deref().unwrap_or(&parsed.stem);
        let title = if clean {
            self.scrubber.scrub(raw_title)
        } else {
            raw_title.to_string()
        };

        // Trailing directories, kept in path order
        let take = dirs_in_query.min(parsed.dirs.len());
        let mut parts: Vec<&str> = parsed.dirs[parsed.dirs.len() - take..]
            .iter()
            .map(String::as_str)
            .collect();
        parts.push(&title);

        Ok(Query {
            text: join_nonempty(parts),
            hints: QueryHints {
                date: scene.date.or(extracted.date),
                title: Some(title.clone()),
                dirs: parsed.dirs,
            },
        })
    }

    fn build_from_metadata(&self, scene: &LocalScene, clean: bool) -> Result<Query, PathParseError> {
        let parsed = parse_scene_path(&scene.path);
        let stem = parsed.as_ref().ok().map(|p| p.stem.as_str());

        let mut date = scene.date;
        let mut title = scene.title().map(str::to_string);

        // Untitled scenes (or titles copied from the filename) go through the pre-pass
        let derived_from_filename = title.is_none() || title.as_deref() == stem;
        if let (true, Some(stem)) = (derived_from_filename, stem) {
            let extracted = self.run_pre_pass(stem);
            date = date.or(extracted.date);
            title = extracted.title.or_else(|| Some(stem.to_string()));
        }

        let title = title.map(|t| if clean { self.scrubber.scrub(&t) } else { t });
        let date_text = date.map(|d| d.format("%Y-%m-%d").to_string());

        let text = join_nonempty([
            scene.studio_name().unwrap_or_default(),
            date_text.as_deref().unwrap_or_default(),
            title.as_deref().unwrap_or_default(),
        ]);

        if text.is_empty() {
            // Nothing to search with; surface the path problem if there was one
            return Err(parsed.err().unwrap_or_else(|| PathParseError {
                path: scene.path.clone(),
                reason: "scene has no studio, date or title",
            }));
        }

        Ok(Query {
            text,
            hints: QueryHints {
                dirs: parsed.map(|p| p.dirs).unwrap_or_default(),
                date,
                title,
            },
        })
    }

    fn run_pre_pass(&self, stem: &str) -> PrePassHints {
        self.pre_pass
            .as_ref()
            .map(|p| p.extract(stem))
            .unwrap_or_default()
    }
}

fn join_nonempty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

static DATE_TOKEN_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-._ ]\d{4}[-._ ]\d{2}[-._ ]\d{2}([-._ ])").expect("long date regex should compile")
});
static DATE_TOKEN_SHORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-._ ]\d{2}[-._ ]\d{2}[-._ ]\d{2}([-._ ])").expect("short date regex should compile")
});

/// Remove one family of date tokens from a path for a narrower retry.
///
/// Returns `None` when the path holds no date token.
pub fn strip_date_token(path: &str) -> Option<String> {
    for re in [&*DATE_TOKEN_LONG, &*DATE_TOKEN_SHORT] {
        if re.is_match(path) {
            let stripped = re.replace_all(path, " $1").replace("  ", " ");
            return Some(stripped);
        }
    }
    None
}
