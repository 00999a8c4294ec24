// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repetition and stall detection (§4.3): word-shingle Jaccard similarity
//! over a rolling window of recent responses, plus independent
//! termination-phrase matching.

use std::collections::{HashSet, VecDeque};

/// Shingle width in words. Two-word shingles catch paraphrase-level
/// repetition without flagging on shared single words.
const SHINGLE_SIZE: usize = 2;

/// Rolling window size (§4.3: K=5).
const WINDOW: usize = 5;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split_whitespace().map(str::to_owned).collect()
}

fn shingles(tokens: &[String]) -> HashSet<String> {
    if tokens.is_empty() {
        return HashSet::new();
    }
    if tokens.len() < SHINGLE_SIZE {
        return tokens.iter().cloned().collect();
    }
    tokens.windows(SHINGLE_SIZE).map(|w| w.join(" ")).collect()
}

/// Word-shingle Jaccard similarity between two texts, normalized per §4.3:
/// 1.0 on exact match after normalization, 0.0 if either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    if ta == tb {
        return 1.0;
    }
    let sa = shingles(&ta);
    let sb = shingles(&tb);
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Stateful per-agent tracker for the rolling-window trigger rule and
/// the independent termination-phrase check.
#[derive(Debug, Clone)]
pub struct RepetitionDetector {
    threshold: f64,
    max_consecutive: u32,
    window: VecDeque<String>,
    consecutive_similar: u32,
    termination_phrases: Vec<String>,
}

/// Default termination phrase set (§9 open question: "make this
/// configurable and default to a small set").
pub fn default_termination_phrases() -> Vec<String> {
    vec!["[done]".to_owned(), "end of conversation".to_owned(), "goodbye and end".to_owned()]
}

impl RepetitionDetector {
    pub fn new(threshold: f64, max_consecutive: u32, termination_phrases: Vec<String>) -> Self {
        Self {
            threshold,
            max_consecutive,
            window: VecDeque::with_capacity(WINDOW),
            consecutive_similar: 0,
            termination_phrases,
        }
    }

    pub fn consecutive_similar(&self) -> u32 {
        self.consecutive_similar
    }

    /// Case-insensitive substring match against the configured phrase set.
    pub fn matches_termination_phrase(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.termination_phrases.iter().find(|p| lower.contains(p.to_lowercase().as_str())).map(String::as_str)
    }

    /// Feed a new candidate output: computes `max_sim` over the last K
    /// peer responses union this agent's own recent outputs, updates
    /// `consecutive_similar`, and reports whether the repetition-loop
    /// condition is now satisfied. The output is then pushed into this
    /// agent's own window regardless of outcome; `peer_responses` is not
    /// retained since the caller already owns the transcript it came from.
    pub fn observe(&mut self, output: &str, peer_responses: &[String]) -> bool {
        let own_max =
            self.window.iter().map(|prior| similarity(output, prior)).fold(0.0_f64, f64::max);
        let peer_max = peer_responses
            .iter()
            .rev()
            .take(WINDOW)
            .map(|prior| similarity(output, prior))
            .fold(0.0_f64, f64::max);
        let max_sim = own_max.max(peer_max);

        if max_sim >= self.threshold {
            self.consecutive_similar += 1;
        } else {
            self.consecutive_similar = 0;
        }

        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(output.to_owned());

        self.consecutive_similar >= self.max_consecutive
    }
}

#[cfg(test)]
#[path = "repetition_tests.rs"]
mod tests;
