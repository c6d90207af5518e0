//! Generic single-pass run detection.
//!
//! One two-state machine serves every scan in the toolkit: homopolymer
//! stretches, ambiguous-base runs, low-mapping-quality regions and
//! abnormal read-depth regions differ only in their predicate, their
//! hard-break condition and the aggregate they accumulate. Memory is
//! O(1) beyond the open run: a closed run is handed back immediately
//! and never buffered.

/// A closed, reported run over `[start, end)`.
///
/// `count` is the number of positions folded in and `aggregate` the
/// accumulated value, so a caller can recompute an average without
/// revisiting the raw data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<A> {
    pub start: u64,
    pub end: u64,
    pub count: u64,
    pub aggregate: A,
}

impl<A> Run<A> {
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

enum State<A> {
    Idle,
    InRun { start: u64, count: u64, aggregate: A },
}

/// A streaming run detector.
///
/// The machine is `Idle` until the predicate holds, `InRun` while it
/// keeps holding, and closes the run when the predicate fails, a hard
/// break is seen, or the caller signals end of input via [`finish`].
/// A hard break always closes before the triggering position is
/// considered, so that position never opens or extends a run. Closed
/// runs shorter than `min_len` are silently discarded.
///
/// `seed_len` is the length credited when a run opens: 1 for a
/// per-position predicate, 2 for a predicate over (previous, current)
/// pairs, which retroactively claims the previous position as the run
/// start.
///
/// [`finish`]: RunDetector::finish
pub struct RunDetector<V, A, P, H, F> {
    min_len: u64,
    seed_len: u64,
    predicate: P,
    hard_break: H,
    fold: F,
    state: State<A>,
    _values: std::marker::PhantomData<fn(&V)>,
}

impl<V, A, P, H, F> RunDetector<V, A, P, H, F>
where
    A: Default,
    P: FnMut(&V) -> bool,
    H: FnMut(&V) -> bool,
    F: FnMut(&mut A, &V),
{
    pub fn new(min_len: u64, seed_len: u64, predicate: P, hard_break: H, fold: F) -> Self {
        Self {
            min_len,
            seed_len,
            predicate,
            hard_break,
            fold,
            state: State::Idle,
            _values: std::marker::PhantomData,
        }
    }

    /// Feed one position. Returns a run if this position closed one that
    /// meets the minimum length.
    pub fn step(&mut self, pos: u64, value: &V) -> Option<Run<A>> {
        if (self.hard_break)(value) {
            return self.close(pos);
        }
        if !(self.predicate)(value) {
            return self.close(pos);
        }
        match &mut self.state {
            State::InRun { count, aggregate, .. } => {
                (self.fold)(aggregate, value);
                *count += 1;
            }
            State::Idle => {
                let mut aggregate = A::default();
                (self.fold)(&mut aggregate, value);
                self.state = State::InRun {
                    start: (pos + 1).saturating_sub(self.seed_len),
                    count: self.seed_len,
                    aggregate,
                };
            }
        }
        None
    }

    /// Signal end of the sequence, closing any open run with `end` as
    /// its exclusive end.
    pub fn finish(&mut self, end: u64) -> Option<Run<A>> {
        self.close(end)
    }

    fn close(&mut self, end: u64) -> Option<Run<A>> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => None,
            State::InRun {
                start,
                count,
                aggregate,
            } => {
                if end.saturating_sub(start) >= self.min_len {
                    Some(Run {
                        start,
                        end,
                        count,
                        aggregate,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Consume an ordered `(position, value)` sequence, yielding closed
    /// runs lazily. The last position's successor is used as the
    /// exclusive end for a run still open when the input ends.
    pub fn scan<I>(self, items: I) -> Runs<I::IntoIter, V, A, P, H, F>
    where
        I: IntoIterator<Item = (u64, V)>,
    {
        Runs {
            detector: self,
            items: items.into_iter(),
            next_end: 0,
            exhausted: false,
        }
    }
}

/// Lazy iterator over the runs closed by a scan. See [`RunDetector::scan`].
pub struct Runs<I, V, A, P, H, F> {
    detector: RunDetector<V, A, P, H, F>,
    items: I,
    next_end: u64,
    exhausted: bool,
}

impl<I, V, A, P, H, F> Iterator for Runs<I, V, A, P, H, F>
where
    I: Iterator<Item = (u64, V)>,
    A: Default,
    P: FnMut(&V) -> bool,
    H: FnMut(&V) -> bool,
    F: FnMut(&mut A, &V),
{
    type Item = Run<A>;

    fn next(&mut self) -> Option<Run<A>> {
        if self.exhausted {
            return None;
        }
        for (pos, value) in self.items.by_ref() {
            self.next_end = pos + 1;
            if let Some(run) = self.detector.step(pos, &value) {
                return Some(run);
            }
        }
        self.exhausted = true;
        self.detector.finish(self.next_end)
    }
}

/// Detector over (previous, current) base pairs reporting stretches of
/// one repeated byte. The aggregate is the repeated byte itself. There
/// is no hard break: the predicate is byte equality, so a stretch of
/// ambiguous bases is a run like any other.
pub fn homopolymer_detector(
    min_len: u64,
) -> RunDetector<(u8, u8), u8, impl FnMut(&(u8, u8)) -> bool, impl FnMut(&(u8, u8)) -> bool, impl FnMut(&mut u8, &(u8, u8))>
{
    RunDetector::new(
        min_len,
        2,
        |&(prev, this): &(u8, u8)| prev == this,
        |_: &(u8, u8)| false,
        |base: &mut u8, &(prev, _): &(u8, u8)| *base = prev,
    )
}

/// Per-position detector for runs of ambiguous (`N`/`n`) bases. The
/// predicate already ends a run at the first regular base, so no
/// separate hard break is needed.
pub fn ambiguous_run_detector(
    min_len: u64,
) -> RunDetector<u8, (), impl FnMut(&u8) -> bool, impl FnMut(&u8) -> bool, impl FnMut(&mut (), &u8)>
{
    RunDetector::new(
        min_len,
        1,
        |&base: &u8| matches!(base, b'N' | b'n'),
        |_: &u8| false,
        |_: &mut (), _: &u8| {},
    )
}

/// Iterate a byte sequence as `(position, (previous, current))` pairs
/// for pair-predicate scans. Positions start at 1 because every item
/// looks back at the previous byte.
pub fn base_pairs(seq: &[u8]) -> impl Iterator<Item = (u64, (u8, u8))> + '_ {
    (1..seq.len()).map(|i| (i as u64, (seq[i - 1], seq[i])))
}
