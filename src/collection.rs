//! Per-sequence feature collections with an explicit sort state.
//!
//! A `FeatureSet` holds the features of one sequence. Any mutation
//! invalidates the `sorted` flag; consolidation requires the flag to be
//! set and reports an error rather than sorting implicitly, because a
//! falsely asserted sort order is a caller bug worth surfacing.

use crate::error::{Error, Result};
use crate::interval::Feature;
use crate::relation::Relation;

/// An ordered collection of features scoped to one sequence.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    seqid: String,
    features: Vec<Feature>,
    sorted: bool,
}

impl FeatureSet {
    pub fn new(seqid: impl Into<String>) -> Self {
        Self {
            seqid: seqid.into(),
            features: Vec::new(),
            // An empty set is trivially sorted.
            sorted: true,
        }
    }

    #[inline]
    pub fn seqid(&self) -> &str {
        &self.seqid
    }

    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Total number of positions covered, counting each feature's extent.
    pub fn sum_intervals(&self) -> u64 {
        self.features.iter().map(|f| f.len()).sum()
    }

    /// Append a feature. The sort flag is dropped because checking order
    /// on every push would make bulk loading quadratic in comparisons;
    /// callers sort (or `check_sorted`) once loading is complete.
    pub fn push(&mut self, feature: Feature) {
        debug_assert_eq!(feature.seqid(), self.seqid);
        self.features.push(feature);
        self.sorted = false;
    }

    /// Append many features, dropping the sort flag once.
    pub fn extend(&mut self, features: impl IntoIterator<Item = Feature>) {
        self.features.extend(features);
        self.sorted = false;
    }

    /// Re-derive the sort flag by scanning the current order.
    pub fn check_sorted(&mut self) -> bool {
        self.sorted = self.features.windows(2).all(|w| {
            (w[0].start(), w[0].end()) <= (w[1].start(), w[1].end())
        });
        self.sorted
    }

    /// Sort by ascending start, ties by ascending end. A stable sort, so
    /// features with identical coordinates keep their relative order
    /// within this invocation. Returns whether a sort was actually done;
    /// an already-sorted set is left untouched.
    pub fn sort(&mut self) -> bool {
        if self.sorted {
            return false;
        }
        self.features
            .sort_by(|a, b| a.start().cmp(&b.start()).then(a.end().cmp(&b.end())));
        self.sorted = true;
        true
    }

    /// Collapse overlapping and contained features into single features,
    /// returning the number of merges performed.
    ///
    /// Each feature is classified against the last keeper. `Precedes` and
    /// `Meets` start a new keeper (adjacency alone never merges); genuine
    /// overlap or containment absorbs into the keeper with the
    /// field-agreement rule of [`Feature::absorb`]. Any relationship that
    /// means the incoming feature starts before the keeper proves the
    /// sort flag was falsely asserted and is a fatal error.
    ///
    /// Consolidating an empty set is legal and returns 0. The operation
    /// is destructive (duplicates and contained features are gone) and
    /// idempotent.
    pub fn consolidate(&mut self) -> Result<usize> {
        if !self.sorted {
            return Err(Error::UnsortedSet {
                seqid: self.seqid.clone(),
            });
        }

        let mut merged = 0usize;
        let mut keepers: Vec<Feature> = Vec::with_capacity(self.features.len());

        for feature in self.features.drain(..) {
            let Some(keeper) = keepers.last_mut() else {
                keepers.push(feature);
                continue;
            };
            match Relation::classify(&keeper.interval, &feature.interval) {
                Relation::Precedes | Relation::Meets => keepers.push(feature),
                Relation::Overlaps
                | Relation::Starts
                | Relation::IsStartedBy
                | Relation::IsFinishedBy
                | Relation::Contains
                | Relation::Equals => {
                    keeper.absorb(&feature);
                    merged += 1;
                }
                Relation::Indeterminate => {
                    return Err(Error::IndeterminateRelation {
                        seqid: self.seqid.clone(),
                        keeper: keeper.interval.clone(),
                        incoming: feature.interval.clone(),
                    });
                }
                // Finishes, IsContainedBy, IsOverlappedBy, IsMetBy,
                // IsPrecededBy: the incoming feature starts before the
                // keeper, so the set was never sorted.
                relation => {
                    return Err(Error::OrderViolation {
                        seqid: self.seqid.clone(),
                        keeper: keeper.interval.clone(),
                        incoming: feature.interval.clone(),
                        relation,
                    });
                }
            }
        }

        self.features = keepers;
        Ok(merged)
    }

}
