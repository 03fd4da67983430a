//! Referral codes and the handshake distance.
//!
//! Every user carries a referral code that spells out its position in the
//! invite tree: root accounts get a single segment (`"3"`), everyone else
//! appends a sequential suffix to the inviter's code (`"3-1"`, `"3-1-2"`).
//! Because a code is a root-to-node path, the tree distance between two users
//! can be computed from the two strings alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

const SEPARATOR: char = '-';

/// A validated, dash-separated referral code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode {
    segments: Vec<u32>,
}

impl ReferralCode {
    /// Code of the `n`-th root account.
    pub fn root(n: u32) -> ResultEngine<Self> {
        if n == 0 {
            return Err(EngineError::InvalidReferralCode(
                "segments start at 1".to_string(),
            ));
        }
        Ok(Self { segments: vec![n] })
    }

    /// Code of the `n`-th user invited by the owner of `self`.
    pub fn child(&self, n: u32) -> ResultEngine<Self> {
        if n == 0 {
            return Err(EngineError::InvalidReferralCode(
                "segments start at 1".to_string(),
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(n);
        Ok(Self { segments })
    }

    /// The inviter's code, or `None` for a root code.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Fails unless `self` sits directly under `inviter` in the tree.
    pub fn ensure_child_of(&self, inviter: &ReferralCode) -> ResultEngine<()> {
        if self.parent().as_ref() != Some(inviter) {
            return Err(EngineError::InvalidReferralCode(format!(
                "{self} is not a direct child of {inviter}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Number of handshakes separating the owners of the two codes.
    #[must_use]
    pub fn distance_to(&self, other: &ReferralCode) -> u32 {
        let common = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        ((self.segments.len() - common) + (other.segments.len() - common)) as u32
    }
}

/// Handshake distance between two raw referral codes.
///
/// This is the tree distance in the invite forest: the number of edges from
/// `a` up to the closest shared ancestor and down to `b`. Codes that share no
/// root are as far apart as the sum of their depths.
///
/// ```rust
/// use engine::handshake_distance;
///
/// assert_eq!(handshake_distance("1-2", "1-2-3").unwrap(), 1);
/// assert_eq!(handshake_distance("1-2", "1-4").unwrap(), 2);
/// ```
pub fn handshake_distance(a: &str, b: &str) -> ResultEngine<u32> {
    let a: ReferralCode = a.parse()?;
    let b: ReferralCode = b.parse()?;
    Ok(a.distance_to(&b))
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for ReferralCode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidReferralCode(
                "empty referral code".to_string(),
            ));
        }
        let segments = trimmed
            .split(SEPARATOR)
            .map(|segment| {
                if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
                    return Err(EngineError::InvalidReferralCode(format!(
                        "invalid segment in {trimmed:?}"
                    )));
                }
                match segment.parse::<u32>() {
                    Ok(0) | Err(_) => Err(EngineError::InvalidReferralCode(format!(
                        "invalid segment in {trimmed:?}"
                    ))),
                    Ok(value) => Ok(value),
                }
            })
            .collect::<ResultEngine<Vec<u32>>>()?;
        Ok(Self { segments })
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferralCode> for String {
    fn from(value: ReferralCode) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> ReferralCode {
        raw.parse().unwrap()
    }

    #[test]
    fn seed_distances() {
        assert_eq!(handshake_distance("1-2", "1-2-3").unwrap(), 1);
        assert_eq!(handshake_distance("1-2", "1-4").unwrap(), 2);
    }

    #[test]
    fn identical_codes_are_zero_apart() {
        for raw in ["1", "3-1-2", "10-20-30-40"] {
            assert_eq!(handshake_distance(raw, raw).unwrap(), 0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let codes = ["1", "1-2", "1-2-3", "1-4", "2", "2-1-1", "10-1"];
        for a in codes {
            for b in codes {
                assert_eq!(
                    handshake_distance(a, b).unwrap(),
                    handshake_distance(b, a).unwrap(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn disjoint_roots_sum_full_lengths() {
        assert_eq!(handshake_distance("1-2", "2-2-5").unwrap(), 5);
        assert_eq!(handshake_distance("1", "2").unwrap(), 2);
    }

    #[test]
    fn segments_compare_numerically_not_textually() {
        // "1" is not a prefix of "10".
        assert_eq!(handshake_distance("1-1", "10-1").unwrap(), 4);
    }

    #[test]
    fn parent_and_child_round_trip() {
        let parent = code("3-1");
        let child = parent.child(2).unwrap();
        assert_eq!(child.to_string(), "3-1-2");
        assert_eq!(child.parent(), Some(parent));
        assert_eq!(ReferralCode::root(4).unwrap().parent(), None);
    }

    #[test]
    fn child_check_requires_the_direct_parent() {
        let inviter = code("3-1");
        assert!(code("3-1-4").ensure_child_of(&inviter).is_ok());
        for raw in ["3-1", "3-2-1", "3-1-4-1", "3", "4-1-1"] {
            assert!(matches!(
                code(raw).ensure_child_of(&inviter).unwrap_err(),
                EngineError::InvalidReferralCode(_)
            ));
        }
        assert!(code("3").is_root());
        assert!(!code("3-1").is_root());
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in ["", "-", "1-", "-1", "1--2", "a-1", "0", "1-0", "1.2"] {
            assert!(raw.parse::<ReferralCode>().is_err(), "{raw:?}");
        }
    }
}
