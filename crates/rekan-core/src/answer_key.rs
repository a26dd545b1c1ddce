//! Answer-key parsing, shared by scoring and question-bank validation.
//!
//! Key formats per question type:
//! - SINGLE_CHOICE: `A`
//! - MULTI_CHOICE: `A,C` (order irrelevant)
//! - TRUE_FALSE_SET: `A:TRUE,B:FALSE`
//! - LIKERT: `A:4,B:3,C:2,D:1`

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnswerKeyError;
use crate::model::QuestionType;

/// Highest weight a LIKERT option may carry. Survey percentages divide by
/// `question_count * MAX_LIKERT_WEIGHT`, so weight tables must stay within it.
pub const MAX_LIKERT_WEIGHT: u32 = 4;

/// A statement judgement in a TRUE_FALSE_SET question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::True => write!(f, "TRUE"),
            Verdict::False => write!(f, "FALSE"),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRUE" | "BENAR" => Ok(Verdict::True),
            "FALSE" | "SALAH" => Ok(Verdict::False),
            other => Err(format!("invalid verdict: {other}")),
        }
    }
}

/// A parsed answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    Single(String),
    Multi(BTreeSet<String>),
    TrueFalse(BTreeMap<String, Verdict>),
    Likert(BTreeMap<String, u32>),
}

impl AnswerKey {
    /// Parse `raw` according to `question_type`.
    pub fn parse(question_type: QuestionType, raw: &str) -> Result<Self, AnswerKeyError> {
        match question_type {
            QuestionType::SingleChoice => parse_single(raw).map(AnswerKey::Single),
            QuestionType::MultiChoice => parse_choice_set(raw).map(AnswerKey::Multi),
            QuestionType::TrueFalseSet => parse_verdicts(raw).map(AnswerKey::TrueFalse),
            QuestionType::Likert => parse_weights(raw).map(AnswerKey::Likert),
        }
    }

    /// Option or statement keys this answer key refers to.
    pub fn referenced_keys(&self) -> Vec<&str> {
        match self {
            AnswerKey::Single(k) => vec![k.as_str()],
            AnswerKey::Multi(set) => set.iter().map(String::as_str).collect(),
            AnswerKey::TrueFalse(map) => map.keys().map(String::as_str).collect(),
            AnswerKey::Likert(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

fn parse_single(raw: &str) -> Result<String, AnswerKeyError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(AnswerKeyError::Empty);
    }
    // Trimmed like answer input, otherwise compared case-sensitively.
    Ok(key.to_string())
}

/// Parse a comma-separated option list into a normalized set.
pub fn parse_choice_set(raw: &str) -> Result<BTreeSet<String>, AnswerKeyError> {
    let mut set = BTreeSet::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !set.insert(part.to_string()) {
            return Err(AnswerKeyError::DuplicateKey(part.to_string()));
        }
    }
    if set.is_empty() {
        return Err(AnswerKeyError::Empty);
    }
    Ok(set)
}

fn split_pairs(raw: &str) -> Result<Vec<(&str, &str)>, AnswerKeyError> {
    let pairs: Vec<(&str, &str)> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => {
                Ok((k.trim(), v.trim()))
            }
            _ => Err(AnswerKeyError::MalformedPair(pair.to_string())),
        })
        .collect::<Result<_, _>>()?;
    if pairs.is_empty() {
        return Err(AnswerKeyError::Empty);
    }
    Ok(pairs)
}

/// Parse `statementKey:TRUE|FALSE` pairs.
pub fn parse_verdicts(raw: &str) -> Result<BTreeMap<String, Verdict>, AnswerKeyError> {
    let mut map = BTreeMap::new();
    for (key, value) in split_pairs(raw)? {
        let verdict = value
            .parse::<Verdict>()
            .map_err(|_| AnswerKeyError::InvalidVerdict(value.to_string()))?;
        if map.insert(key.to_string(), verdict).is_some() {
            return Err(AnswerKeyError::DuplicateKey(key.to_string()));
        }
    }
    Ok(map)
}

/// Parse `optionKey:weight` pairs.
pub fn parse_weights(raw: &str) -> Result<BTreeMap<String, u32>, AnswerKeyError> {
    let mut map = BTreeMap::new();
    for (key, value) in split_pairs(raw)? {
        let weight = value
            .parse::<u32>()
            .map_err(|_| AnswerKeyError::InvalidWeight(value.to_string()))?;
        if map.insert(key.to_string(), weight).is_some() {
            return Err(AnswerKeyError::DuplicateKey(key.to_string()));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_key_is_order_insensitive() {
        let a = AnswerKey::parse(QuestionType::MultiChoice, "C, A").unwrap();
        let b = AnswerKey::parse(QuestionType::MultiChoice, "A,C").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_key_is_trimmed() {
        assert_eq!(
            AnswerKey::parse(QuestionType::SingleChoice, " B "),
            Ok(AnswerKey::Single("B".into()))
        );
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert_eq!(
            AnswerKey::parse(QuestionType::MultiChoice, " , "),
            Err(AnswerKeyError::Empty)
        );
        assert_eq!(
            AnswerKey::parse(QuestionType::SingleChoice, ""),
            Err(AnswerKeyError::Empty)
        );
    }

    #[test]
    fn verdict_pairs() {
        let key = parse_verdicts("A:TRUE, B:false").unwrap();
        assert_eq!(key.get("A"), Some(&Verdict::True));
        assert_eq!(key.get("B"), Some(&Verdict::False));
        assert_eq!(
            parse_verdicts("A:MAYBE"),
            Err(AnswerKeyError::InvalidVerdict("MAYBE".into()))
        );
        assert_eq!(
            parse_verdicts("A"),
            Err(AnswerKeyError::MalformedPair("A".into()))
        );
    }

    #[test]
    fn weight_table() {
        let weights = parse_weights("A:4,B:3,C:2,D:1").unwrap();
        assert_eq!(weights.len(), 4);
        assert_eq!(weights["A"], 4);
        assert!(matches!(
            parse_weights("A:x"),
            Err(AnswerKeyError::InvalidWeight(_))
        ));
        assert_eq!(
            parse_weights("A:1,A:2"),
            Err(AnswerKeyError::DuplicateKey("A".into()))
        );
    }

    #[test]
    fn referenced_keys_of_verdicts() {
        let key = AnswerKey::parse(QuestionType::TrueFalseSet, "B:TRUE,A:FALSE").unwrap();
        assert_eq!(key.referenced_keys(), vec!["A", "B"]);
    }
}
