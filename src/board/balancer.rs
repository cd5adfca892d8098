//! Assignment balancer — picks the least-loaded user for a task.

use crate::storage::UserRow;

/// Select the candidate with the strictly smallest open-task count.
///
/// Ties go to the first candidate in iteration order; the engine feeds
/// candidates earliest-created-first, making the tie-break deterministic.
/// Returns `None` for an empty candidate set.
pub fn select(candidates: &[(UserRow, i64)]) -> Option<&UserRow> {
    let mut best: Option<(&UserRow, i64)> = None;
    for (user, count) in candidates {
        match best {
            Some((_, min)) if *count >= min => {}
            _ => best = Some((user, *count)),
        }
    }
    best.map(|(user, _)| user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(id: &str) -> UserRow {
        UserRow {
            id: id.to_string(),
            username: format!("user-{id}"),
            email: format!("{id}@example.com"),
            created_at: String::new(),
        }
    }

    #[test]
    fn empty_candidate_set_yields_none() {
        assert!(select(&[]).is_none());
    }

    #[test]
    fn picks_smallest_open_count() {
        // Non-Done counts {2, 0, 1}: the zero-count user wins.
        let candidates = vec![(user("a"), 2), (user("b"), 0), (user("c"), 1)];
        assert_eq!(select(&candidates).unwrap().id, "b");
    }

    #[test]
    fn tie_goes_to_first_in_order() {
        let candidates = vec![(user("a"), 1), (user("b"), 1), (user("c"), 1)];
        assert_eq!(select(&candidates).unwrap().id, "a");
    }

    proptest! {
        // The selected user's count is ≤ every other candidate's count.
        #[test]
        fn selected_count_is_minimal(counts in proptest::collection::vec(0i64..100, 1..20)) {
            let candidates: Vec<(UserRow, i64)> = counts
                .iter()
                .enumerate()
                .map(|(i, &c)| (user(&i.to_string()), c))
                .collect();
            let best = select(&candidates).unwrap();
            let best_count = candidates.iter().find(|(u, _)| u.id == best.id).unwrap().1;
            prop_assert!(counts.iter().all(|&c| best_count <= c));
        }
    }
}
