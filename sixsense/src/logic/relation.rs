//! Binary relations between a candidate value and an expected value.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::messages;

/// How a flow connector compares its candidate to its expected value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinaryRelation {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    /// The expected value contains the candidate.
    ContainedBy,
    NotContainedBy,
    StartsWith,
    EndsWith,
    LesserThan,
    GreaterThan,
    LesserOrEqualTo,
    GreaterOrEqualTo,
    /// Unanchored regex search of the candidate.
    MatchesRegex,
    /// Constant true.
    #[default]
    None,
}

/// Why a relation could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationFault {
    /// One of the numeric operands does not parse as a number.
    NotNumeric,
    /// The expected value is not a usable pattern.
    InvalidPattern,
}

impl RelationFault {
    pub fn message(&self) -> &'static str {
        match self {
            RelationFault::NotNumeric => messages::EXPECTED_OUTCOME_NOT_NUMERIC,
            RelationFault::InvalidPattern => messages::UNSUPPORTED_BINARY_RELATION,
        }
    }
}

impl BinaryRelation {
    /// Evaluate `candidate <relation> expected`.
    pub fn evaluate(&self, candidate: &str, expected: &str) -> Result<bool, RelationFault> {
        let holds = match self {
            BinaryRelation::Equals => candidate == expected,
            BinaryRelation::NotEquals => candidate != expected,
            BinaryRelation::Contains => candidate.contains(expected),
            BinaryRelation::NotContains => !candidate.contains(expected),
            BinaryRelation::ContainedBy => expected.contains(candidate),
            BinaryRelation::NotContainedBy => !expected.contains(candidate),
            BinaryRelation::StartsWith => candidate.starts_with(expected),
            BinaryRelation::EndsWith => candidate.ends_with(expected),
            BinaryRelation::LesserThan => {
                let (c, e) = numeric_operands(candidate, expected)?;
                c < e
            }
            BinaryRelation::GreaterThan => {
                let (c, e) = numeric_operands(candidate, expected)?;
                c > e
            }
            BinaryRelation::LesserOrEqualTo => {
                let (c, e) = numeric_operands(candidate, expected)?;
                c <= e
            }
            BinaryRelation::GreaterOrEqualTo => {
                let (c, e) = numeric_operands(candidate, expected)?;
                c >= e
            }
            BinaryRelation::MatchesRegex => Regex::new(expected)
                .map_err(|_| RelationFault::InvalidPattern)?
                .is_match(candidate),
            BinaryRelation::None => true,
        };
        Ok(holds)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BinaryRelation::LesserThan
                | BinaryRelation::GreaterThan
                | BinaryRelation::LesserOrEqualTo
                | BinaryRelation::GreaterOrEqualTo
        )
    }
}

fn numeric_operands(candidate: &str, expected: &str) -> Result<(f64, f64), RelationFault> {
    let c = candidate.trim().parse::<f64>();
    let e = expected.trim().parse::<f64>();
    match (c, e) {
        (Ok(c), Ok(e)) => Ok((c, e)),
        _ => Err(RelationFault::NotNumeric),
    }
}
