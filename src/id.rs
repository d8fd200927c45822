//! Entity id generation for tempo.
//!
//! Entity ids are short, human-typable strings: a kind prefix plus a
//! lowercase slice of a fresh ULID's random segment, e.g. `tsk-9fk2qx`.
//! Event ids are UUIDs and live in the event model; this module only
//! covers the project/milestone/task namespace.

use ulid::Ulid;

/// Prefix for project ids
pub const PROJECT_PREFIX: &str = "prj";

/// Prefix for milestone ids
pub const MILESTONE_PREFIX: &str = "ms";

/// Prefix for task ids
pub const TASK_PREFIX: &str = "tsk";

const ULID_TIME_LEN: usize = 10;
const ULID_RANDOM_LEN: usize = 16;

/// Generate a fresh id with the given prefix, retrying until the suffix is
/// unused. `exists` is checked against the caller's current projection.
pub fn generate(prefix: &str, suffix_len: usize, exists: impl Fn(&str) -> bool) -> String {
    let len = suffix_len.clamp(1, ULID_RANDOM_LEN);
    loop {
        let base = Ulid::new().to_string().to_lowercase();
        let random = &base[ULID_TIME_LEN..ULID_TIME_LEN + ULID_RANDOM_LEN];
        let candidate = format!("{}-{}", prefix, &random[..len]);
        if !exists(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_carry_the_prefix() {
        let id = generate(TASK_PREFIX, 6, |_| false);
        assert!(id.starts_with("tsk-"));
        assert_eq!(id.len(), "tsk-".len() + 6);
    }

    #[test]
    fn collisions_force_a_retry() {
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let id = generate(PROJECT_PREFIX, 4, |candidate| seen.contains(candidate));
            assert!(seen.insert(id));
        }
        assert_eq!(seen.len(), 50);
    }
}
