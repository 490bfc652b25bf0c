/**
This modules gives the tooling necessary to parse the lines of a BIO corpus split into a table of
token records grouped by sentence.
*/
use crate::config::CorpusConfig;
use crate::datastructure::TokenTable;
use ahash::AHashSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::Display,
    io,
    ops::Deref,
    path::{Path, PathBuf},
};
use tracing::debug;

mod source;

// Re-exporting
pub use source::{prepare, Corpus, PreparedCorpus, Split};

/// A token of the corpus, its label and the sentence it belongs to.
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRecord {
    pub sentence_id: usize,
    pub label: String,
    pub token: String,
}

impl TokenRecord {
    pub fn new(sentence_id: usize, label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            sentence_id,
            label: label.into(),
            token: token.into(),
        }
    }
}

impl Display for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.sentence_id, self.label, self.token)
    }
}

/// A single raw line once classified. It only lives for the duration of the parsing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum TaggedLine<'a> {
    /// Blank line separating two sentences.
    Delimiter,
    Content { label: &'a str, token: &'a str },
    /// Line that does not hold exactly two fields. It is dropped.
    Malformed,
}

impl<'a> TaggedLine<'a> {
    fn parse(line: &'a str, label_first: bool) -> Self {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Self::Delimiter;
        }
        match line.split_whitespace().collect_tuple() {
            Some((first, second)) if label_first => Self::Content {
                label: first,
                token: second,
            },
            Some((first, second)) => Self::Content {
                label: second,
                token: first,
            },
            None => Self::Malformed,
        }
    }
}

/// Parses the raw lines of a split with the default `CorpusConfig`. Each blank line increments
/// the sentence id and every `<label> <token>` line becomes a record carrying the current id.
/// Lines with a different number of fields are silently dropped.
///
/// * `raw_lines`: Lines of the split, with or without their line terminator.
pub fn parse_split<S: AsRef<str>>(raw_lines: &[S]) -> Result<TokenTable, CorpusError> {
    parse_split_conf(raw_lines, &CorpusConfig::default())
}

/// Same as `parse_split`, with a custom configuration. The sampling parameters of the config are
/// not used here; see `TokenTable::sample`.
pub fn parse_split_conf<S: AsRef<str>>(
    raw_lines: &[S],
    config: &CorpusConfig,
) -> Result<TokenTable, CorpusError> {
    let mut dropped = 0usize;
    let (_, records) = raw_lines.iter().enumerate().try_fold(
        (0usize, Vec::with_capacity(raw_lines.len())),
        |(sentence_id, mut records), (i, raw)| {
            let raw = raw.as_ref();
            let content_len = raw.trim_end_matches(['\n', '\r']).len();
            if config.max_line_len.is_some_and(|max| content_len > max) {
                return Err(CorpusError::ParseError {
                    path: None,
                    line_number: i + 1,
                    raw: String::from(raw),
                });
            }
            match TaggedLine::parse(raw, config.label_first) {
                TaggedLine::Delimiter => Ok((sentence_id + 1, records)),
                TaggedLine::Content { label, token } => {
                    records.push(TokenRecord::new(sentence_id, label, token));
                    Ok((sentence_id, records))
                }
                TaggedLine::Malformed => {
                    debug!(line_number = i + 1, raw, "dropping malformed line");
                    dropped += 1;
                    Ok((sentence_id, records))
                }
            }
        },
    )?;
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "parsed split with malformed lines");
    }
    Ok(TokenTable::from(records))
}

/// Returns the distinct labels of the records. The result does not depend on the order of the
/// records.
pub fn derive_label_set(records: &[TokenRecord]) -> LabelSet {
    LabelSet(records.iter().map(|r| r.label.clone()).collect())
}

/// Set of the distinct labels observed in a split. It is used to configure the output vocabulary
/// of a model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSet(AHashSet<String>);

impl LabelSet {
    /// Labels in lexicographic order.
    pub fn into_sorted_vec(self) -> Vec<String> {
        self.0.into_iter().sorted_unstable().collect()
    }
}

impl Deref for LabelSet {
    type Target = AHashSet<String>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        LabelSet(iter.into_iter().map(Into::into).collect())
    }
}

impl Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().sorted_unstable().join(", "))
    }
}

/// Summary of a parsed split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitStats {
    pub tokens: usize,
    pub sentences: usize,
}

impl Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tokens, {} sentences", self.tokens, self.sentences)
    }
}

#[derive(Debug)]
/// Enum error encompassing the failures that can happen when reading and parsing a corpus.
pub enum CorpusError {
    /// The corpus directory or one of its split files does not exist.
    NotFound(PathBuf),
    /// A line is present but cannot be read, because it is not valid UTF-8 or is longer than the
    /// configured maximum. The line terminator does not count toward the length. `path` is the
    /// file holding the line, when the lines were read from disk.
    ParseError {
        path: Option<PathBuf>,
        line_number: usize,
        raw: String,
    },
    /// The sampling fraction is not in `(0, 1]`.
    InvalidFraction(f64),
    Io(io::Error),
}

impl Display for CorpusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Corpus source not found: {}", path.display()),
            Self::ParseError {
                path: Some(path),
                line_number,
                raw,
            } => write!(
                f,
                "Could not read line {} of {}: {:?}",
                line_number,
                path.display(),
                raw
            ),
            Self::ParseError {
                path: None,
                line_number,
                raw,
            } => write!(
                f,
                "Could not read line {} of the corpus: {:?}",
                line_number, raw
            ),
            Self::InvalidFraction(fraction) => write!(
                f,
                "The fraction of data to process must be in (0, 1], got {}",
                fraction
            ),
            Self::Io(io_err) => Display::fmt(io_err, f),
        }
    }
}

impl Error for CorpusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(io_err) => Some(io_err),
            _ => None,
        }
    }
}

impl CorpusError {
    /// Attaches `file` to a `ParseError` that does not know where its line comes from. Other
    /// errors are returned unchanged.
    pub(crate) fn in_file(self, file: &Path) -> Self {
        match self {
            Self::ParseError {
                path: None,
                line_number,
                raw,
            } => Self::ParseError {
                path: Some(file.to_path_buf()),
                line_number,
                raw,
            },
            other => other,
        }
    }
}

impl From<io::Error> for CorpusError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
