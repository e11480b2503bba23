use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"\w+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","after","again","all","also","any","are","as","at",
            "be","because","been","before","but","by",
            "can","could",
            "day","do","down",
            "each","even",
            "first","for","from",
            "have","he","here","his","how",
            "if","in","into","is","it",
            "just",
            "know",
            "little","long",
            "many","may","more","most","must","my",
            "new","no","not","now",
            "of","off","on","one","only","or","other","our","out","over",
            "place",
            "same","should","so","some","still","such",
            "take","tell","than","that","the","their","them","then","there","these","they","this","to","too",
            "up","use",
            "very",
            "was","way","we","well","what","when","which","why","will","with","would",
            "you","your"
        ];
        words.iter().copied().collect()
    };
}

/// Whether `token` is in the built-in stop-word list.
pub fn is_default_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Drop markup before tokenizing; entities are decoded.
    pub strip_html: bool,
    /// Apply the English Snowball stemmer to every kept token.
    pub stem: bool,
    /// Stop-words removed in addition to the built-in list.
    pub extra_stopwords: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { strip_html: true, stem: false, extra_stopwords: Vec::new() }
    }
}

/// Text cleaner shared by documents and queries.
///
/// Pipeline: optional HTML stripping, NFKC normalization, lowercasing, `\w+`
/// segmentation, stop-word removal, optional stemming. Stop-words are matched
/// before stemming.
pub struct Tokenizer {
    config: TokenizerConfig,
    extra: HashSet<String>,
    stemmer: Option<Stemmer>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let extra = config.extra_stopwords.iter().map(|w| w.to_lowercase()).collect();
        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));
        Self { config, extra, stemmer }
    }

    pub fn config(&self) -> &TokenizerConfig { &self.config }

    pub fn is_stopword(&self, token: &str) -> bool {
        is_default_stopword(token) || self.extra.contains(token)
    }

    /// Tokenize text into an ordered term sequence, duplicates retained.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.surface_tokens(text).iter().map(|token| self.stem(token)).collect()
    }

    /// Tokens after cleaning and stop-word removal but before stemming.
    pub fn surface_tokens(&self, text: &str) -> Vec<String> {
        let text = if self.config.strip_html { strip_html(text) } else { text.to_owned() };
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        RE.find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|token| !self.is_stopword(token))
            .map(str::to_owned)
            .collect()
    }

    /// Clean a raw JSON field. Non-string values are rejected with a short reason.
    pub fn clean(&self, raw: &Value) -> Result<Vec<String>, String> {
        match raw {
            Value::String(text) => Ok(self.tokenize(text)),
            other => Err(format!("expected text, found {}", json_kind(other))),
        }
    }

    /// Stem a surface token when stemming is enabled.
    pub fn stem(&self, token: &str) -> String {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(token).into_owned(),
            None => token.to_owned(),
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(TokenizerConfig::default()) }
}

impl Clone for Tokenizer {
    fn clone(&self) -> Self { Self::new(self.config.clone()) }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer").field("config", &self.config).finish()
    }
}

fn strip_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_owned();
    }
    Html::parse_fragment(text).root_element().text().collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
