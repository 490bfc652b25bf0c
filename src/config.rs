/*
 * This modules contains the configuration structs of both stages. `CorpusConfig` drives the
 * parsing and sampling of a corpus split and `AggregatorConfig` drives the collection and export
 * of the model predictions. Both implement the default trait and come with a builder.
*/
use either::Either as LeftOrRight;
use std::fmt::Display;

/// Value written in place of a missing prediction when none is configured.
pub(crate) const DEFAULT_MISSING_VALUE: &str = "0";

#[derive(Clone, Debug, PartialEq)]
/// Config struct used to simplify the parameters of the corpus preparation functions. It
/// implements the default trait.
pub struct CorpusConfig {
    /// Is the label the first field of a content line? The BIO files of the MIT movie corpus put
    /// the label first (`B-ACTOR Vin`). If the token comes first, this parameter should be
    /// `false`.
    pub(crate) label_first: bool,
    /// Lines longer than this many bytes are rejected with a parsing error instead of being
    /// parsed. `None` accepts lines of any length.
    pub(crate) max_line_len: Option<usize>,
    /// Fraction of the records kept after parsing. Must be in `(0, 1]`.
    pub(crate) fraction: f64,
    /// Seed of the random generator used to sample the records.
    pub(crate) seed: u64,
}

impl CorpusConfig {
    pub fn label_first(&self) -> bool {
        self.label_first
    }
    pub fn max_line_len(&self) -> Option<usize> {
        self.max_line_len
    }
    pub fn fraction(&self) -> f64 {
        self.fraction
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            label_first: true,
            max_line_len: None,
            fraction: 1.0,
            seed: 42,
        }
    }
}

impl Display for CorpusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!("Label located in the front of the lines: {}\n Maximum line length: {:?}\n Fraction of the records kept: {}\n Sampling seed: {}", self.label_first, self.max_line_len, self.fraction, self.seed);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize a `CorpusConfig` stucture.
#[derive(Clone, Debug, Default)]
pub struct CorpusConfigBuilder {
    inner: CorpusConfig,
}

impl CorpusConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn label_first(mut self, label_first: bool) -> Self {
        self.inner.label_first = label_first;
        self
    }
    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.inner.max_line_len = Some(max_line_len);
        self
    }
    pub fn fraction(mut self, fraction: f64) -> Self {
        self.inner.fraction = fraction;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> CorpusConfig {
        self.inner
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
/// Config struct used when comparing models. It implements the default trait.
pub struct AggregatorConfig {
    /// Can we run the predictors on multiple cores? The aggregation itself is always sequential
    /// and its output does not depend on this parameter.
    parallel: bool,
    /// String written in place of a missing prediction when exporting the table.
    missing_value: String,
}

impl AggregatorConfig {
    pub fn parallel(&self) -> bool {
        self.parallel
    }
    pub fn missing_value(&self) -> &str {
        &self.missing_value
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            missing_value: String::from(DEFAULT_MISSING_VALUE),
        }
    }
}

impl<S> From<AggregatorConfigBuilder<S>> for AggregatorConfig
where
    S: Into<String>,
{
    fn from(value: AggregatorConfigBuilder<S>) -> Self {
        Self {
            parallel: value.parallel,
            missing_value: value.missing_value.either_into(),
        }
    }
}

impl Display for AggregatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Using parallel predictions: {}\n Missing prediction value: {}",
            self.parallel, self.missing_value
        )
    }
}

/// This builder can be used to build and customize an `AggregatorConfig` stucture.
pub struct AggregatorConfigBuilder<S>
where
    S: Into<String>,
{
    parallel: bool,
    missing_value: LeftOrRight<S, &'static str>,
}

impl Default for AggregatorConfigBuilder<String> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AggregatorConfigBuilder<S>
where
    S: Into<String>,
{
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn missing_value(mut self, missing_value: S) -> Self {
        self.missing_value = LeftOrRight::Left(missing_value);
        self
    }
    pub fn new() -> Self {
        Self {
            parallel: false,
            missing_value: LeftOrRight::Right(DEFAULT_MISSING_VALUE),
        }
    }
    pub fn build(self) -> AggregatorConfig {
        AggregatorConfig::from(self)
    }
}
