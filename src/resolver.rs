//! Majority-vote resolution of denormalized display attributes.
//!
//! A building's listings rarely agree on its name, and station blurbs vary
//! between sites. The resolver picks the best-supported value from the
//! current listing population; the result is derived data, recomputed
//! whenever listings change, never hand-edited.

use chrono::{DateTime, Utc};

use crate::normalize::normalize;

/// Weight of an active listing's vote relative to a delisted one.
const ACTIVE_WEIGHT: u32 = 2;
const DELISTED_WEIGHT: u32 = 1;

/// One candidate value with its provenance.
#[derive(Debug, Clone)]
pub struct VoteCandidate {
    pub value: String,
    pub observed_at: DateTime<Utc>,
    pub is_active: bool,
}

impl VoteCandidate {
    pub fn new(value: impl Into<String>, observed_at: DateTime<Utc>, is_active: bool) -> Self {
        Self {
            value: value.into(),
            observed_at,
            is_active,
        }
    }

    fn weight(&self) -> u32 {
        if self.is_active {
            ACTIVE_WEIGHT
        } else {
            DELISTED_WEIGHT
        }
    }
}

/// Resolve the best-supported name among candidates.
///
/// Candidates are grouped by their normalized form, so width and
/// punctuation variants of the same name vote together.
pub fn resolve(candidates: &[VoteCandidate]) -> Option<String> {
    resolve_by(candidates, |v| normalize(v))
}

/// Resolve the best-supported free-text block among candidates.
///
/// Blocks vote as whole values (grouped by trimmed text). Line-level
/// merging across blocks is deliberately avoided: it can fabricate
/// combinations no source ever published.
pub fn resolve_blocks(candidates: &[VoteCandidate]) -> Option<String> {
    resolve_by(candidates, |v| v.trim().to_string())
}

/// Grouped majority vote with a caller-supplied grouping key.
///
/// Empty-after-keying candidates are discarded. The winning group has the
/// highest total weight; ties break toward the group whose freshest
/// candidate was observed latest. The returned value is the raw value of
/// the winning group's freshest candidate. No candidates → None, so a
/// known-good stored value is never overwritten with "unknown".
fn resolve_by<F>(candidates: &[VoteCandidate], key_fn: F) -> Option<String>
where
    F: Fn(&str) -> String,
{
    struct Group {
        weight: u32,
        latest: DateTime<Utc>,
        value: String,
    }

    let mut groups: Vec<(String, Group)> = Vec::new();

    for candidate in candidates {
        let key = key_fn(&candidate.value);
        if key.is_empty() {
            continue;
        }

        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => {
                group.weight += candidate.weight();
                if candidate.observed_at > group.latest {
                    group.latest = candidate.observed_at;
                    group.value = candidate.value.clone();
                }
            }
            None => groups.push((
                key,
                Group {
                    weight: candidate.weight(),
                    latest: candidate.observed_at,
                    value: candidate.value.clone(),
                },
            )),
        }
    }

    groups
        .into_iter()
        .max_by_key(|(_, g)| (g.weight, g.latest))
        .map(|(_, g)| g.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_majority_wins() {
        let candidates = vec![
            VoteCandidate::new("Foo Tower", at(1), true),
            VoteCandidate::new("Foo Tower", at(2), true),
            VoteCandidate::new("FooTower", at(3), false),
        ];
        assert_eq!(resolve(&candidates).as_deref(), Some("Foo Tower"));
    }

    #[test]
    fn test_active_outweighs_delisted() {
        // One active listing beats one delisted listing of a different name.
        let candidates = vec![
            VoteCandidate::new("旧名称ビル", at(5), false),
            VoteCandidate::new("新名称ビル", at(1), true),
        ];
        assert_eq!(resolve(&candidates).as_deref(), Some("新名称ビル"));
    }

    #[test]
    fn test_exact_tie_breaks_by_recency() {
        let candidates = vec![
            VoteCandidate::new("Alpha", at(1), true),
            VoteCandidate::new("Beta", at(2), true),
        ];
        assert_eq!(resolve(&candidates).as_deref(), Some("Beta"));
    }

    #[test]
    fn test_variants_vote_together() {
        // Width variants normalize to the same key and pool their weight.
        let candidates = vec![
            VoteCandidate::new("パークタワーⅡ", at(1), true),
            VoteCandidate::new("パークタワー2", at(2), true),
            VoteCandidate::new("別のタワー", at(3), true),
        ];
        assert_eq!(resolve(&candidates).as_deref(), Some("パークタワー2"));
    }

    #[test]
    fn test_empty_input_resolves_none() {
        assert_eq!(resolve(&[]), None);
        let blank = vec![VoteCandidate::new("   ", at(1), true)];
        assert_eq!(resolve(&blank), None);
    }

    #[test]
    fn test_blocks_vote_whole() {
        let a = "JR山手線 品川駅 徒歩5分\n京急本線 北品川駅 徒歩8分";
        let b = "JR山手線 品川駅 徒歩5分";
        let candidates = vec![
            VoteCandidate::new(a, at(1), true),
            VoteCandidate::new(a, at(2), false),
            VoteCandidate::new(b, at(3), true),
        ];
        // Block-level vote: the two-line block wins intact, no line mixing.
        assert_eq!(resolve_blocks(&candidates).as_deref(), Some(a));
    }
}
