//! Term weighting formulas.
//!
//! `idf(t) = ln((N + 1) / (df + 1))`. The smoothing keeps the ratio finite for
//! any `df`; the result is zero when a term occurs in every document and can
//! dip below zero only if `df > N`, which corpus statistics never produce.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length-normalization strength, `0..=1`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: DEFAULT_K1, b: DEFAULT_B } }
}

impl Bm25Params {
    pub fn new(k1: f64, b: f64) -> Result<Self> {
        let params = Self { k1, b };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::Config(format!("k1 must be a non-negative number, got {}", self.k1)));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(Error::Config(format!("b must lie in [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

/// Weighting scheme applied to every (term, document) pair at build time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Weighting {
    Bm25(Bm25Params),
    TfIdf,
}

impl Default for Weighting {
    fn default() -> Self { Weighting::Bm25(Bm25Params::default()) }
}

impl Weighting {
    pub fn name(&self) -> &'static str {
        match self {
            Weighting::Bm25(_) => "bm25",
            Weighting::TfIdf => "tfidf",
        }
    }

    /// Weight of a term occurring `tf` times in a document of `doc_len` tokens.
    pub fn weight(&self, tf: u32, idf: f64, doc_len: usize, avg_doc_len: f64) -> f64 {
        match self {
            Weighting::Bm25(p) => bm25(tf, idf, doc_len, avg_doc_len, p),
            Weighting::TfIdf => tf_idf(tf, idf),
        }
    }
}

#[inline]
pub fn idf(num_docs: u32, df: u32) -> f64 {
    ((f64::from(num_docs) + 1.0) / (f64::from(df) + 1.0)).ln()
}

#[inline]
pub fn tf_idf(tf: u32, idf: f64) -> f64 { f64::from(tf) * idf }

#[inline]
pub fn bm25(tf: u32, idf: f64, doc_len: usize, avg_doc_len: f64, params: &Bm25Params) -> f64 {
    let tf = f64::from(tf);
    let norm = 1.0 - params.b + params.b * (doc_len as f64 / avg_doc_len);
    idf * (tf * (params.k1 + 1.0)) / (tf + params.k1 * norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example_bm25() {
        let idf_cat = idf(2, 1);
        assert!((idf_cat - 1.5f64.ln()).abs() < 1e-12);
        assert_eq!(idf(2, 2), 0.0);
        let w = bm25(2, idf_cat, 3, 2.5, &Bm25Params::default());
        assert!((w - 0.544).abs() < 1e-3, "got {w}");
    }

    #[test]
    fn idf_strictly_decreasing_in_df() {
        let n = 50;
        for df in 1..n {
            assert!(idf(n, df) > idf(n, df + 1));
        }
    }

    #[test]
    fn bm25_saturates_in_tf() {
        let p = Bm25Params::default();
        let w1 = bm25(1, 1.0, 10, 10.0, &p);
        let w10 = bm25(10, 1.0, 10, 10.0, &p);
        let w1000 = bm25(1000, 1.0, 10, 10.0, &p);
        assert!(w1 < w10 && w10 < w1000);
        assert!(w1000 < p.k1 + 1.0);
    }

    #[test]
    fn b_zero_ignores_length() {
        let p = Bm25Params::new(1.2, 0.0).unwrap();
        assert_eq!(bm25(3, 1.0, 5, 10.0, &p), bm25(3, 1.0, 500, 10.0, &p));
    }

    #[test]
    fn tfidf_is_linear_in_tf() {
        let w = Weighting::TfIdf;
        assert_eq!(w.weight(3, 0.5, 100, 1.0), 1.5);
    }

    #[test]
    fn params_are_validated() {
        assert!(Bm25Params::new(-0.1, 0.5).is_err());
        assert!(Bm25Params::new(1.2, 1.5).is_err());
        assert!(Bm25Params::new(f64::NAN, 0.5).is_err());
        assert!(Bm25Params::new(0.0, 1.0).is_ok());
    }

    #[test]
    fn weighting_serializes_with_mode_tag() {
        let json = serde_json::to_value(Weighting::default()).unwrap();
        assert_eq!(json["mode"], "bm25");
        assert_eq!(json["k1"], 1.5);
        let back: Weighting = serde_json::from_value(serde_json::json!({"mode": "tfidf"})).unwrap();
        assert_eq!(back, Weighting::TfIdf);
    }
}
