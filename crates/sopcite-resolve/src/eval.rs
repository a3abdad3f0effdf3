//! Retrieval evaluation against a gold question set.
//!
//! Answerable questions are scored at two granularities: the document
//! (`doc_id`) and the document section (`doc_id`, `section`). Retrieved
//! chunks are deduplicated at each granularity in rank order before hit@k
//! and MRR are computed. Questions marked `no_answer` score the abstention
//! rule instead.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sopcite_core::Result;
use sopcite_store::read_jsonl;

use crate::retriever::{should_abstain, Retriever};

/// Cutoffs reported by default.
pub const DEFAULT_KS: [usize; 4] = [1, 3, 5, 10];

/// Minimum number of chunks searched per question before deduplication.
const MIN_CANDIDATES: usize = 30;

/// Weight of doc-level MRR in the combined score; section-level gets the rest.
const DOC_WEIGHT: f64 = 0.3;

/// A string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn to_set(&self) -> BTreeSet<String> {
        match self {
            Self::One(s) => BTreeSet::from([s.clone()]),
            Self::Many(v) => v.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpectedTarget {
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

/// One line of the gold file.
#[derive(Debug, Clone, Deserialize)]
pub struct GoldRecord {
    pub query: String,
    #[serde(default)]
    pub expected: Vec<ExpectedTarget>,
    #[serde(default)]
    pub expected_doc_ids: Option<OneOrMany>,
    #[serde(default)]
    pub expected_doc_id: Option<OneOrMany>,
    #[serde(default)]
    pub expected_sections: Option<OneOrMany>,
    #[serde(default)]
    pub expected_section: Option<OneOrMany>,
    #[serde(default)]
    pub no_answer: bool,
}

/// The plural key when it holds anything, else the singular one.
fn either(plural: &Option<OneOrMany>, singular: &Option<OneOrMany>) -> BTreeSet<String> {
    let set = plural.as_ref().map(OneOrMany::to_set).unwrap_or_default();
    if !set.is_empty() {
        return set;
    }
    singular.as_ref().map(OneOrMany::to_set).unwrap_or_default()
}

impl GoldRecord {
    pub fn expected_doc_ids(&self) -> BTreeSet<String> {
        either(&self.expected_doc_ids, &self.expected_doc_id)
    }

    pub fn expected_sections(&self) -> BTreeSet<String> {
        either(&self.expected_sections, &self.expected_section)
    }

    /// `expected` pairs; failing that, every listed doc crossed with every
    /// listed section.
    pub fn expected_pairs(&self) -> BTreeSet<(String, String)> {
        let pairs: BTreeSet<(String, String)> = self
            .expected
            .iter()
            .filter_map(|t| match (&t.doc_id, &t.section) {
                (Some(d), Some(s)) if !d.is_empty() && !s.is_empty() => {
                    Some((d.clone(), s.clone()))
                }
                _ => None,
            })
            .collect();
        if !pairs.is_empty() {
            return pairs;
        }

        let docs = self.expected_doc_ids();
        let sections = self.expected_sections();
        docs.iter()
            .flat_map(|d| sections.iter().map(move |s| (d.clone(), s.clone())))
            .collect()
    }
}

pub fn load_gold(path: &Path) -> Result<Vec<GoldRecord>> {
    read_jsonl(path)
}

/// Hit counts and rank statistics at one granularity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalMetrics {
    /// Denominator for hit@k: all answerable questions at doc level, those
    /// with section gold at section level.
    pub scored: usize,
    /// Questions with a hit within the top k, by k.
    pub hits: BTreeMap<usize, usize>,
    pub median_first_hit: Option<f64>,
    /// Answerable questions with no hit within the top K.
    pub misses: usize,
    pub mrr: f64,
}

impl RetrievalMetrics {
    fn new(ks: &[usize]) -> Self {
        Self {
            hits: ks.iter().map(|&k| (k, 0)).collect(),
            ..Default::default()
        }
    }

    fn finish(&mut self, ranks: &[Option<usize>], answerable: usize) {
        self.median_first_hit = median(ranks);
        self.misses = ranks.iter().filter(|r| r.is_none()).count();
        self.mrr = mrr(ranks, answerable);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub examples: usize,
    pub answerable: usize,
    pub no_answer: usize,
    pub threshold: f32,
    /// Largest cutoff; MRR and misses are computed at this depth.
    pub k_max: usize,
    pub doc: RetrievalMetrics,
    pub pair: RetrievalMetrics,
    /// `no_answer` questions where retrieval correctly abstained.
    pub abstain_correct: usize,
    /// `no_answer` questions where retrieval answered anyway.
    pub false_positives: usize,
    /// Answerable questions where retrieval abstained.
    pub false_abstains: usize,
    /// `0.3·MRR_doc + 0.7·MRR_pair`, when any question has section gold.
    pub combined: Option<f64>,
}

/// 1-based rank of the first item satisfying `pred`.
fn first_hit_rank<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Option<usize> {
    items.iter().position(pred).map(|i| i + 1)
}

fn unique_in_order<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|x| seen.insert(x.clone())).collect()
}

fn median(ranks: &[Option<usize>]) -> Option<f64> {
    let mut xs: Vec<usize> = ranks.iter().flatten().copied().collect();
    if xs.is_empty() {
        return None;
    }
    xs.sort_unstable();
    let mid = xs.len() / 2;
    Some(if xs.len() % 2 == 0 {
        (xs[mid - 1] + xs[mid]) as f64 / 2.0
    } else {
        xs[mid] as f64
    })
}

fn mrr(ranks: &[Option<usize>], denom: usize) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    ranks.iter().flatten().map(|&r| 1.0 / r as f64).sum::<f64>() / denom as f64
}

/// Run every gold question through `retriever` and score the results.
pub fn evaluate(
    retriever: &Retriever,
    gold: &[GoldRecord],
    ks: &[usize],
    threshold: f32,
) -> Result<EvalReport> {
    let ks: Vec<usize> = if ks.is_empty() { DEFAULT_KS.to_vec() } else { ks.to_vec() };
    let k_max = ks.iter().copied().max().unwrap_or(1);
    let candidates = MIN_CANDIDATES.max(10 * k_max);

    let mut doc = RetrievalMetrics::new(&ks);
    let mut pair = RetrievalMetrics::new(&ks);
    let mut doc_ranks: Vec<Option<usize>> = Vec::new();
    let mut pair_ranks: Vec<Option<usize>> = Vec::new();

    let mut answerable = 0;
    let mut no_answer = 0;
    let mut abstain_correct = 0;
    let mut false_positives = 0;
    let mut false_abstains = 0;

    for record in gold {
        let hits = retriever.search(&record.query, candidates)?;
        let abstain = should_abstain(hits.first().map(|h| h.score), threshold);

        if record.no_answer {
            no_answer += 1;
            if abstain {
                abstain_correct += 1;
            } else {
                false_positives += 1;
            }
            continue;
        }

        answerable += 1;
        if abstain {
            debug!("Abstained on answerable question {:?}", record.query);
            false_abstains += 1;
            doc_ranks.push(None);
            pair_ranks.push(None);
            continue;
        }

        let expected_pairs = record.expected_pairs();
        let mut expected_docs = record.expected_doc_ids();
        if expected_docs.is_empty() {
            expected_docs = expected_pairs.iter().map(|(d, _)| d.clone()).collect();
        }

        let mut docs = unique_in_order(hits.iter().map(|h| h.chunk.doc_id.as_str()));
        docs.truncate(k_max);
        let mut pairs = unique_in_order(
            hits.iter()
                .map(|h| (h.chunk.doc_id.as_str(), h.chunk.section.as_str())),
        );
        pairs.truncate(k_max);

        doc_ranks.push(first_hit_rank(&docs, |d| expected_docs.contains(*d)));
        for &k in &ks {
            if docs.iter().take(k).any(|d| expected_docs.contains(*d)) {
                *doc.hits.entry(k).or_insert(0) += 1;
            }
        }

        if expected_pairs.is_empty() {
            pair_ranks.push(None);
            continue;
        }
        let is_expected = |(d, s): &(&str, &str)| {
            expected_pairs
                .iter()
                .any(|(ed, es)| ed.as_str() == *d && es.as_str() == *s)
        };
        pair.scored += 1;
        pair_ranks.push(first_hit_rank(&pairs, is_expected));
        for &k in &ks {
            if pairs.iter().take(k).any(is_expected) {
                *pair.hits.entry(k).or_insert(0) += 1;
            }
        }
    }

    doc.scored = answerable;
    doc.finish(&doc_ranks, answerable);
    pair.finish(&pair_ranks, answerable);
    let combined = (pair.scored > 0).then(|| DOC_WEIGHT * doc.mrr + (1.0 - DOC_WEIGHT) * pair.mrr);

    let report = EvalReport {
        examples: gold.len(),
        answerable,
        no_answer,
        threshold,
        k_max,
        doc,
        pair,
        abstain_correct,
        false_positives,
        false_abstains,
        combined,
    };
    info!(
        "Evaluated {} questions ({} answerable, {} no-answer)",
        report.examples, report.answerable, report.no_answer
    );
    Ok(report)
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

fn write_metrics(
    f: &mut fmt::Formatter<'_>,
    m: &RetrievalMetrics,
    k_max: usize,
    answerable: usize,
) -> fmt::Result {
    for (k, hits) in &m.hits {
        writeln!(f, "hit@{}: {}/{} = {:.3}", k, hits, m.scored, ratio(*hits, m.scored))?;
    }
    let median = m
        .median_first_hit
        .map(|v| v.to_string())
        .unwrap_or_else(|| "NA".into());
    writeln!(
        f,
        "first_hit_k@{} median: {} | miss@{}: {}/{}",
        k_max, median, k_max, m.misses, m.scored
    )?;
    writeln!(f, "MRR@{}: {:.3} (over {} answerable)", k_max, m.mrr, answerable)
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Examples: {}", self.examples)?;
        writeln!(f, "Answerable: {} | No-answer: {}", self.answerable, self.no_answer)?;
        writeln!(f, "No-answer threshold: {}", self.threshold)?;

        writeln!(f, "\n=== DOC-ONLY (answerable only) ===")?;
        if self.answerable > 0 {
            write_metrics(f, &self.doc, self.k_max, self.answerable)?;
        } else {
            writeln!(f, "No answerable examples to score.")?;
        }

        writeln!(f, "\n=== DOC+SECTION (answerable only) ===")?;
        writeln!(
            f,
            "Answerable examples with section labels in gold: {}/{}",
            self.pair.scored, self.answerable
        )?;
        if self.pair.scored > 0 {
            write_metrics(f, &self.pair, self.k_max, self.answerable)?;
        }
        if let Some(combined) = self.combined {
            writeln!(f, "\nCombined score (0.3*doc + 0.7*doc+section): {:.3}", combined)?;
        }

        writeln!(f, "\n=== NO-ANSWER ===")?;
        if self.no_answer > 0 {
            writeln!(
                f,
                "abstain accuracy: {}/{} = {:.3}",
                self.abstain_correct,
                self.no_answer,
                ratio(self.abstain_correct, self.no_answer)
            )?;
            writeln!(
                f,
                "false positives (should abstain but didn't): {}/{} = {:.3}",
                self.false_positives,
                self.no_answer,
                ratio(self.false_positives, self.no_answer)
            )?;
        } else {
            writeln!(f, "No no_answer examples in gold.")?;
        }
        if self.answerable > 0 {
            writeln!(
                f,
                "false abstains (should answer but abstained): {}/{} = {:.3}",
                self.false_abstains,
                self.answerable,
                ratio(self.false_abstains, self.answerable)
            )?;
        }
        Ok(())
    }
}
