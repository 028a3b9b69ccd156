// src/query/conjunction.rs
//! Set algebra over primary keys
//!
//! Every conjunction node reduces its children's key sets to one key set:
//!
//! | type | result                                            |
//! |------|---------------------------------------------------|
//! | AND  | intersection of all children (empty list: empty)   |
//! | OR   | union of all children                             |
//! | XOR  | keys present in exactly one child                 |
//! | NOR  | universe minus the union                          |
//! | NAND | universe minus the intersection                   |
//!
//! The universe is the set of keys the node is evaluated over: the upstream
//! stream if there is one, the whole collection otherwise.

use ahash::AHashMap;

use super::{ConjunctionType, PredicateTree};
use crate::document::Document;
use crate::store::KeySet;

/// Combine child results according to `conjunction_type`
pub fn combine(conjunction_type: ConjunctionType, children: Vec<KeySet>, universe: &KeySet) -> KeySet {
    match conjunction_type {
        ConjunctionType::And => intersect_all(children),
        ConjunctionType::Or => union_all(children),
        ConjunctionType::Xor => exactly_one(children),
        ConjunctionType::Nor => complement(universe, &union_all(children)),
        ConjunctionType::Nand => complement(universe, &intersect_all(children)),
    }
}

/// Intersection of every set; no sets yields the empty set
pub fn intersect_all(children: Vec<KeySet>) -> KeySet {
    let mut children = children;
    // start from the smallest set so the retain pass is cheap
    children.sort_by_key(|set| set.len());
    let mut iter = children.into_iter();
    let Some(mut result) = iter.next() else {
        return KeySet::new();
    };
    for set in iter {
        if result.is_empty() {
            break;
        }
        result.retain(|key| set.contains(key));
    }
    result
}

pub fn union_all(children: Vec<KeySet>) -> KeySet {
    let mut iter = children.into_iter();
    let Some(mut result) = iter.next() else {
        return KeySet::new();
    };
    for set in iter {
        result.extend(set);
    }
    result
}

/// Keys that occur in exactly one child set
pub fn exactly_one(children: Vec<KeySet>) -> KeySet {
    let mut occurrences: AHashMap<String, usize> = AHashMap::new();
    for set in children {
        for key in set {
            *occurrences.entry(key).or_insert(0) += 1;
        }
    }
    occurrences
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(key, _)| key)
        .collect()
}

/// `universe \ excluded`
pub fn complement(universe: &KeySet, excluded: &KeySet) -> KeySet {
    universe.iter().filter(|key| !excluded.contains(*key)).cloned().collect()
}

/// Boolean evaluation of a tree against one document.
///
/// Agrees with [`combine`] for a document inside the universe: empty
/// AND/OR/XOR are false, empty NOR/NAND are true.
pub fn matches_document(tree: &PredicateTree, document: &Document) -> bool {
    match tree {
        PredicateTree::Field(op) => op.matches(document),
        PredicateTree::Conjunction(node) => truth(
            node.conjunction_type,
            node.operators.len(),
            node.operators.iter().map(|child| matches_document(child, document)),
        ),
    }
}

/// Fold child verdicts for one document. `results` is pulled lazily, so
/// AND/OR/NOR/NAND stop at the first deciding child.
pub fn truth<I>(conjunction_type: ConjunctionType, operand_count: usize, results: I) -> bool
where
    I: IntoIterator<Item = bool>,
{
    let mut results = results.into_iter();
    match conjunction_type {
        ConjunctionType::And => operand_count > 0 && results.all(|hit| hit),
        ConjunctionType::Or => results.any(|hit| hit),
        ConjunctionType::Xor => results.filter(|hit| *hit).take(2).count() == 1,
        ConjunctionType::Nor => !results.any(|hit| hit),
        ConjunctionType::Nand => operand_count == 0 || !results.all(|hit| hit),
    }
}
