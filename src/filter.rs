//! Record filtering for selective backups.
//!
//! A [`FilterOptions`] holds an optional set of predicates: name keywords or
//! a raw regex, suffixes, a size window, an mtime window, and an owner name.
//! All configured predicates must hold for a record to pass (conjunction);
//! directory records always pass so the tree structure survives filtering.

use regex::Regex;

use crate::record::FileRecord;
use crate::{Error, Result};

/// Filter predicate options.
///
/// The zero value (all fields empty) passes every record. Keywords take
/// precedence over `name_regex`: when `name_keywords` is non-empty the raw
/// regex is ignored.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Keywords matched anywhere in the relative path. Each keyword is
    /// regex-escaped, so `(v1+2)` matches those literal characters.
    pub name_keywords: Vec<String>,
    /// Raw regex searched against the full relative path.
    pub name_regex: String,
    /// Accepted path suffixes (case-sensitive), e.g. `.log`.
    pub suffixes: Vec<String>,
    /// Minimum file size in bytes.
    pub min_size: u64,
    /// Maximum file size in bytes; 0 means unbounded.
    pub max_size: u64,
    /// Earliest accepted mtime (seconds since epoch); 0 disables.
    pub start_time: i64,
    /// Latest accepted mtime (seconds since epoch); 0 disables.
    pub end_time: i64,
    /// Required owner name; empty disables.
    pub user_name: String,
}

impl FilterOptions {
    /// Builds the combined name pattern, if any is configured.
    ///
    /// Keywords become `.*(k1|k2|…).*` with each keyword regex-escaped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilterPattern`] when the configured raw regex
    /// does not compile. (Escaped keywords always compile.)
    pub fn validate(&self) -> Result<Option<Regex>> {
        if !self.name_keywords.is_empty() {
            let escaped: Vec<String> = self.name_keywords.iter().map(|k| regex::escape(k)).collect();
            let pattern = format!(".*({}).*", escaped.join("|"));
            return Regex::new(&pattern)
                .map(Some)
                .map_err(|e| Error::InvalidFilterPattern {
                    pattern,
                    reason: e.to_string(),
                });
        }
        if !self.name_regex.is_empty() {
            return Regex::new(&self.name_regex)
                .map(Some)
                .map_err(|e| Error::InvalidFilterPattern {
                    pattern: self.name_regex.clone(),
                    reason: e.to_string(),
                });
        }
        Ok(None)
    }
}

/// A filter: an enabled flag plus predicate options.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    enabled: bool,
    options: FilterOptions,
}

impl Filter {
    /// Creates an enabled filter with the given options.
    pub fn new(options: FilterOptions) -> Self {
        Self {
            enabled: true,
            options,
        }
    }

    /// Creates a disabled filter that passes everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns true if the filter is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the predicate options.
    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Returns the subsequence of records passing all predicates.
    ///
    /// Directory records bypass every predicate. A malformed raw regex is
    /// logged and the name predicate is dropped for this run.
    pub fn apply(&self, records: Vec<FileRecord>) -> Vec<FileRecord> {
        if !self.enabled {
            return records;
        }

        let name_pattern = match self.options.validate() {
            Ok(pattern) => pattern,
            Err(e) => {
                log::warn!("dropping name predicate: {e}");
                None
            }
        };

        records
            .into_iter()
            .filter(|rec| rec.is_dir() || self.passes(rec, name_pattern.as_ref()))
            .collect()
    }

    fn passes(&self, rec: &FileRecord, name_pattern: Option<&Regex>) -> bool {
        let opts = &self.options;

        if rec.size < opts.min_size {
            return false;
        }
        if opts.max_size > 0 && rec.size > opts.max_size {
            return false;
        }

        if opts.start_time > 0 && rec.mtime < opts.start_time {
            return false;
        }
        if opts.end_time > 0 && rec.mtime > opts.end_time {
            return false;
        }

        if !opts.user_name.is_empty() && rec.owner_name != opts.user_name {
            return false;
        }

        if !opts.suffixes.is_empty()
            && !opts
                .suffixes
                .iter()
                .any(|s| rec.relative_path.ends_with(s.as_str()))
        {
            return false;
        }

        if let Some(pattern) = name_pattern {
            // A search over the full relative path, not an anchored match.
            if !pattern.is_match(&rec.relative_path) {
                return false;
            }
        }

        true
    }
}
