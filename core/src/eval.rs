//! Offline evaluation of TREC run files against TREC qrels.
//!
//! Scores are averaged over the queries of the qrels; a judged query that is
//! missing from the run contributes 0, unjudged run queries are ignored.
//! Relevance labels `<= 0` count as non-relevant.

use crate::error::{Error, Result};
use crate::search::{compare_hits, Hit};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// query id → document id → graded relevance.
pub type Qrels = HashMap<String, HashMap<String, i32>>;
/// query id → hits ordered by descending score.
pub type Run = HashMap<String, Vec<Hit>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Precision(usize),
    Recall(usize),
    Ndcg(usize),
    Mrr,
    Map,
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let bad = || Error::Config(format!("unknown metric {s:?}"));
        match lower.as_str() {
            "mrr" => return Ok(Metric::Mrr),
            "map" => return Ok(Metric::Map),
            _ => {}
        }
        let (name, k) = lower.split_once('@').ok_or_else(bad)?;
        let k: usize = k.parse().map_err(|_| bad())?;
        if k == 0 {
            return Err(bad());
        }
        match name {
            "precision" | "p" => Ok(Metric::Precision(k)),
            "recall" => Ok(Metric::Recall(k)),
            "ndcg" => Ok(Metric::Ndcg(k)),
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Precision(k) => write!(f, "precision@{k}"),
            Metric::Recall(k) => write!(f, "recall@{k}"),
            Metric::Ndcg(k) => write!(f, "ndcg@{k}"),
            Metric::Mrr => f.write_str("mrr"),
            Metric::Map => f.write_str("map"),
        }
    }
}

fn fields(line: &str, n: usize, lineno: usize) -> Result<Vec<&str>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != n {
        return Err(Error::Parse { line: lineno, reason: format!("expected {n} fields, found {}", parts.len()) });
    }
    Ok(parts)
}

/// Parse `qid iter docid relevance` lines.
pub fn parse_qrels<R: BufRead>(reader: R) -> Result<Qrels> {
    let mut qrels = Qrels::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let f = fields(&line, 4, i + 1)?;
        let rel: i32 = f[3]
            .parse()
            .map_err(|_| Error::Parse { line: i + 1, reason: format!("bad relevance {:?}", f[3]) })?;
        qrels.entry(f[0].to_owned()).or_default().insert(f[2].to_owned(), rel);
    }
    Ok(qrels)
}

/// Parse `qid Q0 docid rank score tag` lines; hits are re-sorted by score.
pub fn parse_run<R: BufRead>(reader: R) -> Result<Run> {
    let mut run = Run::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let f = fields(&line, 6, i + 1)?;
        let score: f64 = f[4]
            .parse()
            .map_err(|_| Error::Parse { line: i + 1, reason: format!("bad score {:?}", f[4]) })?;
        run.entry(f[0].to_owned()).or_default().push(Hit { doc_id: f[2].to_owned(), score });
    }
    for hits in run.values_mut() {
        hits.sort_by(compare_hits);
    }
    Ok(run)
}

pub fn load_qrels(path: &Path) -> Result<Qrels> {
    parse_qrels(BufReader::new(File::open(path)?))
}

pub fn load_run(path: &Path) -> Result<Run> {
    parse_run(BufReader::new(File::open(path)?))
}

fn is_relevant(judged: &HashMap<String, i32>, doc_id: &str) -> bool {
    judged.get(doc_id).is_some_and(|&r| r > 0)
}

fn query_score(metric: Metric, judged: &HashMap<String, i32>, hits: &[Hit]) -> f64 {
    let total_relevant = judged.values().filter(|&&r| r > 0).count();
    match metric {
        Metric::Precision(k) => {
            let found = hits.iter().take(k).filter(|h| is_relevant(judged, &h.doc_id)).count();
            found as f64 / k as f64
        }
        Metric::Recall(k) => {
            if total_relevant == 0 {
                return 0.0;
            }
            let found = hits.iter().take(k).filter(|h| is_relevant(judged, &h.doc_id)).count();
            found as f64 / total_relevant as f64
        }
        Metric::Ndcg(k) => {
            let gain = |rel: i32| f64::from(rel.max(0));
            let discount = |i: usize| ((i + 2) as f64).log2();
            let dcg: f64 = hits
                .iter()
                .take(k)
                .enumerate()
                .map(|(i, h)| gain(judged.get(&h.doc_id).copied().unwrap_or(0)) / discount(i))
                .sum();
            let mut ideal: Vec<i32> = judged.values().copied().filter(|&r| r > 0).collect();
            ideal.sort_unstable_by(|a, b| b.cmp(a));
            let idcg: f64 = ideal.into_iter().take(k).enumerate().map(|(i, r)| gain(r) / discount(i)).sum();
            if idcg == 0.0 { 0.0 } else { dcg / idcg }
        }
        Metric::Mrr => hits
            .iter()
            .position(|h| is_relevant(judged, &h.doc_id))
            .map_or(0.0, |i| 1.0 / (i + 1) as f64),
        Metric::Map => {
            if total_relevant == 0 {
                return 0.0;
            }
            let mut found = 0usize;
            let mut sum = 0.0;
            for (i, h) in hits.iter().enumerate() {
                if is_relevant(judged, &h.doc_id) {
                    found += 1;
                    sum += found as f64 / (i + 1) as f64;
                }
            }
            sum / total_relevant as f64
        }
    }
}

/// Metric value for every judged query.
pub fn per_query(qrels: &Qrels, run: &Run, metric: Metric) -> BTreeMap<String, f64> {
    qrels
        .iter()
        .map(|(qid, judged)| {
            let hits = run.get(qid).map(Vec::as_slice).unwrap_or(&[]);
            (qid.clone(), query_score(metric, judged, hits))
        })
        .collect()
}

/// Mean metric value over judged queries.
pub fn evaluate(qrels: &Qrels, run: &Run, metric: Metric) -> f64 {
    if qrels.is_empty() {
        return 0.0;
    }
    let scores = per_query(qrels, run, metric);
    scores.values().sum::<f64>() / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const QRELS: &str = "q1 0 d1 1\nq1 0 d3 2\nq1 0 d4 0\n\nq2 0 d9 1\n";
    const RUN: &str = "q1 0 d2 1 3.0 Run1\nq1 0 d1 2 2.0 Run1\nq1 0 d3 3 1.0 Run1\nq3 0 d1 1 1.0 Run1\n";

    fn fixtures() -> (Qrels, Run) {
        (parse_qrels(QRELS.as_bytes()).unwrap(), parse_run(RUN.as_bytes()).unwrap())
    }

    #[test]
    fn parses_metric_names() {
        assert_eq!("precision@5".parse::<Metric>().unwrap(), Metric::Precision(5));
        assert_eq!("P@1".parse::<Metric>().unwrap(), Metric::Precision(1));
        assert_eq!("nDCG@10".parse::<Metric>().unwrap(), Metric::Ndcg(10));
        assert_eq!("MAP".parse::<Metric>().unwrap(), Metric::Map);
        assert!("ndcg".parse::<Metric>().is_err());
        assert!("precision@0".parse::<Metric>().is_err());
        assert_eq!(Metric::Recall(3).to_string(), "recall@3");
    }

    #[test]
    fn computes_metrics() {
        let (qrels, run) = fixtures();
        let per = per_query(&qrels, &run, Metric::Precision(2));
        assert_eq!(per["q1"], 0.5);
        assert_eq!(per["q2"], 0.0);
        assert_eq!(evaluate(&qrels, &run, Metric::Precision(2)), 0.25);
        assert_eq!(per_query(&qrels, &run, Metric::Mrr)["q1"], 0.5);
        let ap = (1.0 / 2.0 + 2.0 / 3.0) / 2.0;
        assert!((per_query(&qrels, &run, Metric::Map)["q1"] - ap).abs() < 1e-12);
        assert_eq!(per_query(&qrels, &run, Metric::Recall(3))["q1"], 1.0);
    }

    #[test]
    fn ndcg_against_ideal_order() {
        let (qrels, run) = fixtures();
        let dcg = 0.0 + 1.0 / 3f64.log2() + 2.0 / 4f64.log2();
        let idcg = 2.0 + 1.0 / 3f64.log2();
        let got = per_query(&qrels, &run, Metric::Ndcg(3))["q1"];
        assert!((got - dcg / idcg).abs() < 1e-12);
    }

    #[test]
    fn run_is_resorted_by_score() {
        let run = parse_run("q 0 a 1 0.1 t\nq 0 b 2 0.9 t\n".as_bytes()).unwrap();
        assert_eq!(run["q"][0].doc_id, "b");
    }

    #[test]
    fn reports_bad_lines() {
        assert!(matches!(parse_qrels("q1 0 d1\n".as_bytes()), Err(Error::Parse { line: 1, .. })));
        assert!(matches!(parse_run("q 0 a 1 x t\n".as_bytes()), Err(Error::Parse { line: 1, .. })));
    }
}
