//! Document selectors.
//!
//! A selector binds a glob pattern, a URI scheme and a language identifier.
//! Only documents whose URI satisfies both the scheme and the pattern are
//! forwarded to the server, and they are announced with the selector's
//! language identifier.

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobMatcher};
use lsp_types::{DocumentFilter, Url};

use crate::error::SelectorError;

/// Language identifier of the wflang server.
pub const WFLANG_LANGUAGE: &str = "wflang";

/// File extension of wflang sources.
pub const WFLANG_EXTENSION: &str = "wflang";

/// Scheme of documents backed by files on disk.
pub const FILE_SCHEME: &str = "file";

// A pattern that matches either of these is not bound to a language.
const CATCH_ALL_PROBES: [&str; 2] = ["selector-probe", "selector-probe/file.selector-probe"];

/// Immutable predicate over documents: `{pattern, scheme, language}`.
#[derive(Clone)]
pub struct DocumentSelector {
    pattern: String,
    scheme: String,
    language: String,
    matcher: GlobMatcher,
}

impl DocumentSelector {
    /// Builds a selector from its three parts.
    /// ## Errors
    /// `SelectorError` if a field is empty, the pattern does not compile, or
    /// the pattern would match files of any language.
    pub fn new(
        pattern: impl Into<String>,
        scheme: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, SelectorError> {
        let pattern = pattern.into();
        let scheme = scheme.into();
        let language = language.into();

        if pattern.trim().is_empty() {
            return Err(SelectorError::EmptyField("pattern"));
        }
        if scheme.trim().is_empty() {
            return Err(SelectorError::EmptyField("scheme"));
        }
        if language.trim().is_empty() {
            return Err(SelectorError::EmptyField("language"));
        }

        let matcher = Glob::new(&pattern)
            .map_err(|source| SelectorError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?
            .compile_matcher();

        if CATCH_ALL_PROBES.iter().any(|probe| matcher.is_match(probe)) {
            return Err(SelectorError::CatchAllPattern(pattern));
        }

        Ok(Self {
            pattern,
            scheme,
            language,
            matcher,
        })
    }

    /// Selector for on-disk files with the given extension: `**/*.<ext>`.
    /// ## Errors
    /// See [`DocumentSelector::new`].
    pub fn for_extension(extension: &str, language: impl Into<String>) -> Result<Self, SelectorError> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(SelectorError::EmptyField("extension"));
        }
        Self::new(format!("**/*.{extension}"), FILE_SCHEME, language)
    }

    /// The selector used for wflang sources.
    /// ## Errors
    /// See [`DocumentSelector::new`].
    pub fn wflang() -> Result<Self, SelectorError> {
        Self::for_extension(WFLANG_EXTENSION, WFLANG_LANGUAGE)
    }

    /// The glob pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The URI scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The language identifier documents are announced with.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether a document with this URI belongs to the server.
    pub fn matches(&self, uri: &Url) -> bool {
        if uri.scheme() != self.scheme {
            return false;
        }
        if uri.scheme() == FILE_SCHEME {
            return uri
                .to_file_path()
                .is_ok_and(|path| self.matcher.is_match(path));
        }
        self.matcher.is_match(uri.path())
    }

    /// Whether an on-disk path belongs to the server.
    pub fn matches_path(&self, path: &Path) -> bool {
        self.scheme == FILE_SCHEME && self.matcher.is_match(path)
    }

    /// The selector as a protocol-level document filter.
    pub fn to_filter(&self) -> DocumentFilter {
        DocumentFilter {
            language: Some(self.language.clone()),
            scheme: Some(self.scheme.clone()),
            pattern: Some(self.pattern.clone()),
        }
    }
}

impl fmt::Debug for DocumentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSelector")
            .field("pattern", &self.pattern)
            .field("scheme", &self.scheme)
            .field("language", &self.language)
            .finish()
    }
}

impl PartialEq for DocumentSelector {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.scheme == other.scheme
            && self.language == other.language
    }
}

impl Eq for DocumentSelector {}
