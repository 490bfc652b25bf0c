use crate::config::CorpusConfig;
use crate::corpus::{parse_split_conf, CorpusError, LabelSet};
use crate::datastructure::TokenTable;
use ahash::AHashMap;
use enum_iterator::{all, Sequence};
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, warn};

/// Extension of the corpus files.
const BIO_EXTENSION: &str = "bio";

/// The named partitions of a corpus. Each split is stored in its own `<stem>.bio` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Stem of the file holding this split, as laid out in the MIT movie corpus.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Train => "engtrain",
            Self::Test => "engtest",
        }
    }
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), BIO_EXTENSION)
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Split {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" | "engtrain" => Ok(Self::Train),
            "test" | "engtest" => Ok(Self::Test),
            _ => Err(format!("Impossible to parse the string ({}) into a Split", s)),
        }
    }
}

/// Raw lines of every `.bio` file found in a corpus directory, keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    root: PathBuf,
    files: AHashMap<String, Vec<String>>,
}

impl Corpus {
    /// Checks whether every split file exists in `dir`.
    pub fn check_exists<P: AsRef<Path>>(dir: P) -> bool {
        let dir = dir.as_ref();
        all::<Split>().all(|split| dir.join(split.file_name()).is_file())
    }

    /// Loads every `.bio` file of `dir`. Returns `NotFound` if the directory does not exist and a
    /// `ParseError` if a line of a file is not valid UTF-8.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CorpusError> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CorpusError::NotFound(root));
        }
        let mut files = AHashMap::default();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            let is_bio = path.extension().is_some_and(|ext| ext == BIO_EXTENSION);
            if !path.is_file() || !is_bio {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => String::from(stem),
                None => continue,
            };
            let lines = read_lines(&path)?;
            debug!(file = %path.display(), lines = lines.len(), "loaded corpus file");
            files.insert(stem, lines);
        }
        Ok(Self { root, files })
    }

    /// Raw lines of `split`, or `NotFound` if its file was not in the corpus directory.
    pub fn lines(&self, split: Split) -> Result<&[String], CorpusError> {
        match self.files.get(split.file_stem()) {
            Some(lines) => Ok(lines),
            None => {
                let path = self.root.join(split.file_name());
                warn!(%split, path = %path.display(), "split file is missing");
                Err(CorpusError::NotFound(path))
            }
        }
    }

    /// Stems of the loaded files, in lexicographic order.
    pub fn stems(&self) -> Vec<&str> {
        let mut stems: Vec<&str> = self.files.keys().map(String::as_str).collect();
        stems.sort_unstable();
        stems
    }

    /// Parses the lines of `split`. A `ParseError` names the split file.
    fn parse(&self, split: Split, config: &CorpusConfig) -> Result<TokenTable, CorpusError> {
        parse_split_conf(self.lines(split)?, config)
            .map_err(|err| err.in_file(&self.root.join(split.file_name())))
    }
}

/// Reads a file and splits it into lines, keeping blank lines. A line that is not valid UTF-8 is
/// reported with the file path and its lossy decoding.
fn read_lines(path: &Path) -> Result<Vec<String>, CorpusError> {
    let bytes = fs::read(path)?;
    let mut chunks: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // The terminator of the last line does not open a new one.
    if chunks.last().is_some_and(|last| last.is_empty()) {
        chunks.pop();
    }
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            String::from_utf8(chunk.to_vec()).map_err(|_| CorpusError::ParseError {
                path: Some(path.to_path_buf()),
                line_number: i + 1,
                raw: String::from_utf8_lossy(chunk).into_owned(),
            })
        })
        .collect()
}

/// Both splits of a corpus, parsed, and the label set of the training split.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCorpus {
    pub train: TokenTable,
    pub test: TokenTable,
    pub labels: LabelSet,
}

/// Loads the corpus located in `dir`, parses its train and test splits and derives the label set
/// from the train split. When the config asks for a fraction of the data, both splits are sampled
/// after the label set is derived, so the vocabulary always covers the full training split.
pub fn prepare<P: AsRef<Path>>(
    dir: P,
    config: &CorpusConfig,
) -> Result<PreparedCorpus, CorpusError> {
    let corpus = Corpus::open(dir)?;
    let mut train = corpus.parse(Split::Train, config)?;
    let mut test = corpus.parse(Split::Test, config)?;
    let labels = train.label_set();
    info!(
        train_tokens = train.len(),
        test_tokens = test.len(),
        labels = labels.len(),
        "loaded corpus"
    );
    if config.fraction != 1.0 {
        train = train.sample(config.fraction, config.seed)?;
        test = test.sample(config.fraction, config.seed)?;
        info!(
            fraction = config.fraction,
            train = %train.stats(),
            test = %test.stats(),
            "sampled corpus"
        );
    }
    Ok(PreparedCorpus {
        train,
        test,
        labels,
    })
}
