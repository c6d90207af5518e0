//! Cross-collection merging that never absorbs an overlap silently.
//!
//! Folding one feature set onto another splits every overlapping pair
//! into up to three pieces: the stretch covered only by the accumulator,
//! the shared stretch, and the stretch covered only by the incoming set.
//! Nothing about either side's extent is lost, which makes it possible
//! to quantify afterwards how much of the axis each source covered
//! exclusively and how much both covered.

use std::cmp::Ordering;

use crate::collection::FeatureSet;
use crate::error::{Error, Result};
use crate::interval::{agree, shared_attributes, Feature, Strand};
use crate::relation::Relation;

/// Category label for pieces covered only by the accumulator set.
pub const ACCUMULATOR_ONLY: &str = "accumulator-only";
/// Category label for pieces covered only by the incoming set.
pub const INCOMING_ONLY: &str = "incoming-only";
/// Category label for pieces covered by both sets.
pub const OVERLAP: &str = "overlap";

/// Fold `incoming` onto `accumulator`, splitting overlaps three ways.
///
/// Both sets must describe the same sequence, be sorted, and be free of
/// internal overlap (consolidated). Adjacent features stay distinct and
/// an `Equals` pair degenerates to a single overlap-only piece. Each
/// output piece's category records its provenance; the overlap piece's
/// remaining fields follow the field-agreement rule, exclusive pieces
/// keep their source feature's fields.
///
/// Every position covered by an input is covered by exactly one output
/// piece per covering side, so the summed length of exclusive pieces
/// plus twice the overlap pieces equals the two inputs' summed extents.
/// That identity is verified on every call; a mismatch is a fatal
/// internal error, not a warning.
pub fn merge_into(accumulator: FeatureSet, incoming: FeatureSet) -> Result<FeatureSet> {
    if accumulator.seqid() != incoming.seqid() {
        return Err(Error::SeqidMismatch {
            accumulator: accumulator.seqid().to_string(),
            incoming: incoming.seqid().to_string(),
        });
    }
    if !accumulator.is_sorted() {
        return Err(Error::UnsortedSet {
            seqid: accumulator.seqid().to_string(),
        });
    }
    if !incoming.is_sorted() {
        return Err(Error::UnsortedSet {
            seqid: incoming.seqid().to_string(),
        });
    }

    let seqid = accumulator.seqid().to_string();
    let expected = accumulator.sum_intervals() + incoming.sum_intervals();

    let mut acc_iter = accumulator.into_features().into_iter();
    let mut inc_iter = incoming.into_features().into_iter();
    let mut acc_cur = acc_iter.next();
    let mut inc_cur = inc_iter.next();

    let mut out = FeatureSet::new(seqid.clone());
    // Each position is counted once per source covering it, so the total
    // must land exactly on `expected`.
    let mut covered: u64 = 0;

    loop {
        let (a, b) = match (acc_cur.take(), inc_cur.take()) {
            (None, None) => break,
            (Some(a), None) => {
                covered += a.len();
                out.push(labeled(a, ACCUMULATOR_ONLY));
                acc_cur = acc_iter.next();
                continue;
            }
            (None, Some(b)) => {
                covered += b.len();
                out.push(labeled(b, INCOMING_ONLY));
                inc_cur = inc_iter.next();
                continue;
            }
            (Some(a), Some(b)) => (a, b),
        };

        match Relation::classify(&a.interval, &b.interval) {
            Relation::Indeterminate => {
                return Err(Error::IndeterminateRelation {
                    seqid,
                    keeper: a.interval.clone(),
                    incoming: b.interval.clone(),
                });
            }
            Relation::Precedes | Relation::Meets => {
                covered += a.len();
                out.push(labeled(a, ACCUMULATOR_ONLY));
                acc_cur = acc_iter.next();
                inc_cur = Some(b);
            }
            Relation::IsPrecededBy | Relation::IsMetBy => {
                covered += b.len();
                out.push(labeled(b, INCOMING_ONLY));
                inc_cur = inc_iter.next();
                acc_cur = Some(a);
            }
            _ => {
                let cut_start = a.start().max(b.start());
                let cut_end = a.end().min(b.end());

                // Exclusive stretch before the overlap, owned by
                // whichever side starts first (at most one side does).
                if a.start() < cut_start {
                    covered += cut_start - a.start();
                    out.push(slice(&a, a.start(), cut_start, ACCUMULATOR_ONLY));
                } else if b.start() < cut_start {
                    covered += cut_start - b.start();
                    out.push(slice(&b, b.start(), cut_start, INCOMING_ONLY));
                }

                covered += 2 * (cut_end - cut_start);
                out.push(overlap_piece(&a, &b, cut_start, cut_end));

                // The longer side re-enters the sweep as a remainder so
                // it can meet the other side's next feature.
                match a.end().cmp(&b.end()) {
                    Ordering::Less => {
                        inc_cur = Some(trim_front(b, cut_end));
                        acc_cur = acc_iter.next();
                    }
                    Ordering::Greater => {
                        acc_cur = Some(trim_front(a, cut_end));
                        inc_cur = inc_iter.next();
                    }
                    Ordering::Equal => {
                        acc_cur = acc_iter.next();
                        inc_cur = inc_iter.next();
                    }
                }
            }
        }
    }

    if covered != expected {
        return Err(Error::CoverageInvariant {
            seqid,
            expected,
            actual: covered,
        });
    }

    // Pieces were emitted in ascending start order.
    out.check_sorted();
    Ok(out)
}

fn labeled(mut feature: Feature, label: &str) -> Feature {
    feature.category = Some(label.to_string());
    feature
}

/// A sub-range of `feature` carrying its fields and a provenance label.
fn slice(feature: &Feature, start: u64, end: u64, label: &str) -> Feature {
    let mut piece = feature.clone();
    piece.interval.start = start;
    piece.interval.end = end;
    piece.category = Some(label.to_string());
    piece
}

/// The shared stretch of two features, with fields kept only on agreement.
fn overlap_piece(a: &Feature, b: &Feature, start: u64, end: u64) -> Feature {
    let mut piece = Feature::new(a.seqid(), start, end);
    piece.source = agree(&a.source, &b.source);
    piece.category = Some(OVERLAP.to_string());
    piece.score = agree(&a.score, &b.score);
    piece.strand = if a.strand == b.strand {
        a.strand
    } else {
        Strand::Unknown
    };
    piece.phase = agree(&a.phase, &b.phase);
    piece.attributes = shared_attributes(&a.attributes, &b.attributes);
    piece
}

fn trim_front(mut feature: Feature, new_start: u64) -> Feature {
    feature.interval.start = new_start;
    feature
}
