//! Boolean category query evaluation.
//!
//! A [`CategoryQuery`] compiles into a lazy ascending stream of
//! sequence numbers at or after a floor. The combinators are standard
//! sorted merges: intersection advances the smaller head and emits on
//! equality, union emits the smaller head and collapses equal heads to
//! one emission, and negation subtracts the inner stream from the
//! ambient entry universe. Strict ascending order with no duplicates is
//! load-bearing: pagination resumes on the last emitted sequence.

use std::iter::Peekable;

use syndex_core::{CategoryQuery, IndexError};
use syndex_storage::CollectionIndex;

/// Lazy ascending stream of sequence numbers.
pub type SeqStream = Box<dyn Iterator<Item = u64>>;

struct Intersect {
    left: Peekable<SeqStream>,
    right: Peekable<SeqStream>,
}

impl Iterator for Intersect {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            let l = *self.left.peek()?;
            let r = *self.right.peek()?;
            match l.cmp(&r) {
                std::cmp::Ordering::Less => {
                    self.left.next();
                }
                std::cmp::Ordering::Greater => {
                    self.right.next();
                }
                std::cmp::Ordering::Equal => {
                    self.left.next();
                    self.right.next();
                    return Some(l);
                }
            }
        }
    }
}

struct Union {
    left: Peekable<SeqStream>,
    right: Peekable<SeqStream>,
}

impl Iterator for Union {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match (self.left.peek().copied(), self.right.peek().copied()) {
            (Some(l), Some(r)) => match l.cmp(&r) {
                std::cmp::Ordering::Less => {
                    self.left.next();
                    Some(l)
                }
                std::cmp::Ordering::Greater => {
                    self.right.next();
                    Some(r)
                }
                std::cmp::Ordering::Equal => {
                    // Equal heads collapse to one emission.
                    self.left.next();
                    self.right.next();
                    Some(l)
                }
            },
            (Some(l), None) => {
                self.left.next();
                Some(l)
            }
            (None, Some(r)) => {
                self.right.next();
                Some(r)
            }
            (None, None) => None,
        }
    }
}

struct Subtract {
    universe: Peekable<SeqStream>,
    inner: Peekable<SeqStream>,
}

impl Iterator for Subtract {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            let candidate = *self.universe.peek()?;
            while self.inner.peek().is_some_and(|&i| i < candidate) {
                self.inner.next();
            }
            if self.inner.peek() == Some(&candidate) {
                self.universe.next();
                self.inner.next();
                continue;
            }
            self.universe.next();
            return Some(candidate);
        }
    }
}

/// Compile a query tree against one collection's indices.
///
/// The floor is an inclusive lower bound on the emitted sequences. The
/// term streams are snapshots taken at compile time; the merges over
/// them are lazy.
pub fn compile_query(
    query: &CategoryQuery,
    index: &dyn CollectionIndex,
    floor: u64,
) -> Result<SeqStream, IndexError> {
    match query {
        CategoryQuery::Simple { scheme, term } => {
            let seqs = match scheme {
                Some(scheme) => index.term_tail_from(scheme, term, floor)?,
                None => index.term_tail_from_any(term, floor)?,
            };
            Ok(Box::new(seqs.into_iter()))
        }
        CategoryQuery::And(left, right) => {
            let left = compile_query(left, index, floor)?.peekable();
            let right = compile_query(right, index, floor)?.peekable();
            Ok(Box::new(Intersect { left, right }))
        }
        CategoryQuery::Or(left, right) => {
            let left = compile_query(left, index, floor)?.peekable();
            let right = compile_query(right, index, floor)?.peekable();
            Ok(Box::new(Union { left, right }))
        }
        CategoryQuery::Not(inner) => {
            let universe: SeqStream = Box::new(
                index
                    .tail_from(floor)?
                    .into_iter()
                    .map(|r| r.sequence),
            );
            let inner = compile_query(inner, index, floor)?.peekable();
            Ok(Box::new(Subtract {
                universe: universe.peekable(),
                inner,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syndex_core::{CategoryTerm, CollectionKey, EntryRecord, new_entry_id};
    use syndex_storage::InMemoryCollectionIndex;

    /// Ten entries; evens carry (urn:color)red, multiples of three
    /// carry (urn:size)big, and 1..=5 carry (urn:age)old.
    fn fixture() -> InMemoryCollectionIndex {
        let key = CollectionKey::new("w", "c");
        let index = InMemoryCollectionIndex::new(key.clone());
        for i in 1u64..=10 {
            let mut terms = Vec::new();
            if i % 2 == 0 {
                terms.push(CategoryTerm::new("urn:color", "red"));
            }
            if i % 3 == 0 {
                terms.push(CategoryTerm::new("urn:size", "big"));
            }
            if i <= 5 {
                terms.push(CategoryTerm::new("urn:age", "old"));
            }
            let rec =
                EntryRecord::new(key.clone(), new_entry_id(), b"x").with_categories(terms);
            index.append(rec).unwrap();
        }
        index
    }

    fn eval(query: &CategoryQuery, index: &InMemoryCollectionIndex, floor: u64) -> Vec<u64> {
        compile_query(query, index, floor).unwrap().collect()
    }

    #[test]
    fn simple_term_stream() {
        let index = fixture();
        let q = CategoryQuery::simple("urn:color", "red");
        assert_eq!(eval(&q, &index, 0), vec![2, 4, 6, 8, 10]);
        assert_eq!(eval(&q, &index, 5), vec![6, 8, 10]);
    }

    #[test]
    fn absent_term_is_empty() {
        let index = fixture();
        let q = CategoryQuery::simple("urn:color", "chartreuse");
        assert!(eval(&q, &index, 0).is_empty());
    }

    #[test]
    fn and_is_intersection() {
        let index = fixture();
        let q = CategoryQuery::simple("urn:color", "red").and(CategoryQuery::simple("urn:size", "big"));
        assert_eq!(eval(&q, &index, 0), vec![6]);
    }

    #[test]
    fn or_is_deduplicated_union() {
        let index = fixture();
        let q = CategoryQuery::simple("urn:color", "red").or(CategoryQuery::simple("urn:size", "big"));
        assert_eq!(eval(&q, &index, 0), vec![2, 3, 4, 6, 8, 9, 10]);
    }

    #[test]
    fn not_subtracts_from_ambient_universe() {
        let index = fixture();
        let q = CategoryQuery::simple("urn:color", "red").negate();
        assert_eq!(eval(&q, &index, 0), vec![1, 3, 5, 7, 9]);
        assert_eq!(eval(&q, &index, 6), vec![7, 9]);
    }

    #[test]
    fn nested_combination() {
        let index = fixture();
        // (red AND big) OR old  ->  {6} ∪ {1..5}
        let q = CategoryQuery::simple("urn:color", "red")
            .and(CategoryQuery::simple("urn:size", "big"))
            .or(CategoryQuery::simple("urn:age", "old"));
        assert_eq!(eval(&q, &index, 0), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn schemeless_simple_unions_schemes() {
        let key = CollectionKey::new("w", "c");
        let index = InMemoryCollectionIndex::new(key.clone());
        for scheme in ["urn:a", "urn:b", "urn:a"] {
            let rec = EntryRecord::new(key.clone(), new_entry_id(), b"x")
                .with_categories([CategoryTerm::new(scheme, "hot")]);
            index.append(rec).unwrap();
        }
        let q = CategoryQuery::term_only("hot");
        assert_eq!(eval(&q, &index, 0), vec![1, 2, 3]);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn build(reds: &BTreeSet<u8>, bigs: &BTreeSet<u8>, n: u8) -> InMemoryCollectionIndex {
            let key = CollectionKey::new("w", "c");
            let index = InMemoryCollectionIndex::new(key.clone());
            for i in 1..=n {
                let mut terms = Vec::new();
                if reds.contains(&i) {
                    terms.push(CategoryTerm::new("c", "red"));
                }
                if bigs.contains(&i) {
                    terms.push(CategoryTerm::new("s", "big"));
                }
                index
                    .append(
                        EntryRecord::new(key.clone(), new_entry_id(), b"x")
                            .with_categories(terms),
                    )
                    .unwrap();
            }
            index
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            /// AND/OR/NOT agree with set intersection/union/difference
            /// over arbitrary overlapping and disjoint term sets.
            #[test]
            fn prop_combinators_match_set_algebra(
                reds in prop::collection::btree_set(1u8..30, 0..20),
                bigs in prop::collection::btree_set(1u8..30, 0..20),
                floor in 0u64..32,
            ) {
                let n = 30;
                let index = build(&reds, &bigs, n);
                let red = CategoryQuery::simple("c", "red");
                let big = CategoryQuery::simple("s", "big");

                let red_set: BTreeSet<u64> = eval(&red, &index, floor).into_iter().collect();
                let big_set: BTreeSet<u64> = eval(&big, &index, floor).into_iter().collect();
                let universe: BTreeSet<u64> = (floor.max(1)..=n as u64).collect();

                let and: Vec<u64> = eval(&red.clone().and(big.clone()), &index, floor);
                let or: Vec<u64> = eval(&red.clone().or(big.clone()), &index, floor);
                let not: Vec<u64> = eval(&red.clone().negate(), &index, floor);

                prop_assert_eq!(and, red_set.intersection(&big_set).copied().collect::<Vec<_>>());
                prop_assert_eq!(or, red_set.union(&big_set).copied().collect::<Vec<_>>());
                prop_assert_eq!(not, universe.difference(&red_set).copied().collect::<Vec<_>>());
            }

            /// Output is strictly ascending, hence duplicate-free.
            #[test]
            fn prop_output_strictly_ascending(
                reds in prop::collection::btree_set(1u8..30, 0..20),
                bigs in prop::collection::btree_set(1u8..30, 0..20),
            ) {
                let index = build(&reds, &bigs, 30);
                let q = CategoryQuery::simple("c", "red")
                    .or(CategoryQuery::simple("s", "big"))
                    .and(CategoryQuery::simple("c", "red").negate());
                let out = eval(&q, &index, 0);
                for pair in out.windows(2) {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }
    }
}
