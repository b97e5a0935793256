//! Deduplication of fetched candidates against the seen-item ledger

use std::collections::HashSet;

use super::model::Candidate;

/// Return the candidates whose id is not in `seen`, in fetch order.
///
/// Ids repeated within `fetched` are collapsed to their first occurrence, so
/// the result never contains the same id twice.
pub fn diff(seen: &HashSet<String>, fetched: Vec<Candidate>) -> Vec<Candidate> {
    let mut emitted: HashSet<String> = HashSet::new();
    fetched
        .into_iter()
        .filter(|candidate| !seen.contains(&candidate.id) && emitted.insert(candidate.id.clone()))
        .collect()
}
