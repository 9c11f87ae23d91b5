//! # Distance Bucket Search
//!
//! Splits a candidate list into concentric distance tiers around an agent and
//! walks them nearest-first, stopping at the first candidate a predicate
//! accepts. Nothing is sorted and only as many candidates are validated as it
//! takes to find a match.
//!
//! ## Tiers
//!
//! Thresholds are squared distances. With thresholds `[100.0, 400.0]` the
//! tiers are:
//!
//! | Tier | Squared distance     | Real distance |
//! |------|----------------------|---------------|
//! | 0    | `d <= 100`           | up to 10      |
//! | 1    | `100 < d <= 400`     | 10 to 20      |
//! | 2    | `d > 400` (or NaN)   | beyond 20     |
//!
//! Inside a tier candidates keep the order of the input list. The result is
//! "some valid target in the nearest non-empty band", not the nearest one.

use crate::types::Position;
use tracing::{debug, trace};

/// One distance band.
#[derive(Debug, Clone)]
pub struct Tier<'a, E> {
    /// Inclusive squared-distance upper bound, `None` for the final tier.
    pub upper_bound: Option<f64>,
    pub members: Vec<&'a E>,
}

/// Candidates grouped into ascending distance tiers.
///
/// Borrows the candidates, so it lives no longer than the list it was built
/// from (normally a cached `Arc<[E]>`).
#[derive(Debug, Clone)]
pub struct BucketSet<'a, E> {
    tiers: Vec<Tier<'a, E>>,
}

impl<'a, E> BucketSet<'a, E> {
    /// A set that never matches.
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn tiers(&self) -> &[Tier<'a, E>] {
        &self.tiers
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Total number of bucketed candidates.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(|tier| tier.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A predicate match and where it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierMatch<'a, E> {
    pub tier: usize,
    pub target: &'a E,
}

/// Result of [`find_first_valid_with_tier`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome<'a, E> {
    pub found: Option<TierMatch<'a, E>>,
    /// How many times the predicate ran
    pub evaluations: usize,
}

/// Sorts ascending, drops NaN and duplicates.
fn normalise_thresholds(thresholds: &[f64]) -> Vec<f64> {
    let mut bounds: Vec<f64> = thresholds.iter().copied().filter(|t| !t.is_nan()).collect();
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();

    if bounds.as_slice() != thresholds {
        debug!(?thresholds, normalised = ?bounds, "bucket thresholds were not strictly ascending");
    }
    bounds
}

/// Index of the tier a squared distance belongs to.
#[inline]
fn tier_for(bounds: &[f64], distance_sq: f64) -> usize {
    if distance_sq.is_nan() {
        return bounds.len();
    }
    bounds.partition_point(|&bound| bound < distance_sq)
}

/// Groups `candidates` by their squared distance from `agent_pos`.
///
/// Each candidate lands in the first tier whose bound is `>= distance_fn`;
/// anything beyond the last bound goes to a final unbounded tier. No
/// candidates or no thresholds give an empty set.
pub fn create_buckets<'a, E, D>(
    agent_pos: Position,
    candidates: &'a [E],
    mut distance_fn: D,
    thresholds: &[f64],
) -> BucketSet<'a, E>
where
    D: FnMut(Position, &E) -> f64,
{
    if candidates.is_empty() || thresholds.is_empty() {
        return BucketSet::empty();
    }

    let bounds = normalise_thresholds(thresholds);
    if bounds.is_empty() {
        return BucketSet::empty();
    }

    let mut tiers: Vec<Tier<'a, E>> = bounds
        .iter()
        .map(|&bound| Tier {
            upper_bound: Some(bound),
            members: Vec::new(),
        })
        .collect();
    tiers.push(Tier {
        upper_bound: None,
        members: Vec::new(),
    });

    for candidate in candidates {
        let tier = tier_for(&bounds, distance_fn(agent_pos, candidate));
        tiers[tier].members.push(candidate);
    }

    BucketSet { tiers }
}

/// First candidate accepted by `predicate`, nearest tier first.
pub fn find_first_valid<'a, E, A, P>(buckets: &BucketSet<'a, E>, agent: &A, predicate: P) -> Option<&'a E>
where
    A: ?Sized,
    P: FnMut(&E, &A) -> bool,
{
    find_first_valid_with_tier(buckets, agent, predicate)
        .found
        .map(|found| found.target)
}

/// Like [`find_first_valid`], also reporting the tier of the match and how
/// many predicate evaluations it took.
pub fn find_first_valid_with_tier<'a, E, A, P>(
    buckets: &BucketSet<'a, E>,
    agent: &A,
    mut predicate: P,
) -> SearchOutcome<'a, E>
where
    A: ?Sized,
    P: FnMut(&E, &A) -> bool,
{
    let mut evaluations = 0;

    for (index, tier) in buckets.tiers.iter().enumerate() {
        for &candidate in &tier.members {
            evaluations += 1;
            if predicate(candidate, agent) {
                trace!(tier = index, evaluations, "bucket search matched");
                return SearchOutcome {
                    found: Some(TierMatch {
                        tier: index,
                        target: candidate,
                    }),
                    evaluations,
                };
            }
        }
    }

    trace!(evaluations, "bucket search found nothing");
    SearchOutcome {
        found: None,
        evaluations,
    }
}
