use rank_core::tokenizer::{Tokenizer, TokenizerConfig};

#[test]
fn it_normalizes_and_stems() {
    let tok = Tokenizer::new(TokenizerConfig { stem: true, ..Default::default() });
    let words = tok.tokenize("Running Runners RUN! The ﬁsh menu.");
    assert!(words.contains(&"run".to_string()));
    // NFKC folds the "ﬁ" ligature
    assert!(words.contains(&"fish".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = Tokenizer::default().tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "and", "lazy", "dog"]);
}

#[test]
fn it_keeps_duplicates_in_order() {
    let words = Tokenizer::default().tokenize("cat dog cat");
    assert_eq!(words, vec!["cat", "dog", "cat"]);
}

#[test]
fn html_stripping_can_be_disabled() {
    let raw = Tokenizer::new(TokenizerConfig { strip_html: false, ..Default::default() });
    assert_eq!(raw.tokenize("<b>bold</b>"), vec!["b", "bold", "b"]);
    assert_eq!(Tokenizer::default().tokenize("<b>bold</b>"), vec!["bold"]);
}
