//! Picking the right grid out of the candidates on a page.
//!
//! Header labels on upstream pages drift ("Change%", "Change %",
//! "Change (%)"), so candidates are scored by how many expected tokens
//! appear anywhere in their headers rather than matched exactly.

use crate::errors::NoMatch;
use crate::models::CandidateTable;

/// Expected header tokens plus the minimum score a candidate must reach.
#[derive(Debug, Clone)]
pub struct TokenSet {
    tokens: Vec<String>,
    /// Tokens a candidate must carry to score at all.
    required: Vec<String>,
    pub min_score: usize,
}

impl TokenSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            required: Vec::new(),
            min_score: 1,
        }
    }

    pub fn requiring(mut self, token: &str) -> Self {
        let token = token.trim().to_lowercase();
        if !token.is_empty() {
            self.required.push(token);
        }
        self
    }

    pub fn with_min_score(mut self, min_score: usize) -> Self {
        self.min_score = min_score.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens found (case-insensitive substring) in any header;
    /// 0 when a required token is missing.
    pub fn score(&self, candidate: &CandidateTable) -> usize {
        let headers: Vec<String> = candidate.headers().iter().map(|h| h.to_lowercase()).collect();
        let found = |t: &String| headers.iter().any(|h| h.contains(t.as_str()));
        if !self.required.iter().all(found) {
            return 0;
        }
        self.tokens.iter().filter(|t| found(*t)).count()
    }
}

/// Highest-scoring candidate; ties go to the earliest.
pub fn select_best<'a>(
    candidates: &'a [CandidateTable],
    tokens: &TokenSet,
) -> Result<&'a CandidateTable, NoMatch> {
    let mut best: Option<(usize, &CandidateTable)> = None;
    for candidate in candidates {
        let score = tokens.score(candidate);
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }

    match best {
        None => Err(NoMatch::NoCandidates),
        Some((score, _)) if score < tokens.min_score => Err(NoMatch::BelowMinimum {
            best: score,
            tokens: tokens.len(),
            min_score: tokens.min_score,
        }),
        Some((_, candidate)) => Ok(candidate),
    }
}

/// Every candidate clearing the minimum score, in page order. For logical
/// tables the page splits across several `<table>` elements.
pub fn select_all<'a>(
    candidates: &'a [CandidateTable],
    tokens: &TokenSet,
) -> Result<Vec<&'a CandidateTable>, NoMatch> {
    if candidates.is_empty() {
        return Err(NoMatch::NoCandidates);
    }
    let scored: Vec<(usize, &CandidateTable)> =
        candidates.iter().map(|c| (tokens.score(c), c)).collect();
    let picked: Vec<&CandidateTable> = scored
        .iter()
        .filter(|(s, _)| *s >= tokens.min_score)
        .map(|(_, c)| *c)
        .collect();

    if picked.is_empty() {
        let best = scored.iter().map(|(s, _)| *s).max().unwrap_or(0);
        return Err(NoMatch::BelowMinimum {
            best,
            tokens: tokens.len(),
            min_score: tokens.min_score,
        });
    }
    Ok(picked)
}
