//! Task identity.

use std::hash::{self, Hash};

/// Unique ID identifying a scheduled task, derived from its name.
///
/// Submissions are validated for name uniqueness, so within one scheduler
/// run the ID is a faithful stand-in for the name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Hashes the given task name into an ID.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        Self(const_fnv1a_hash::fnv1a_hash_str_64(name))
    }

    /// Returns the `u64` value corresponding to the ID.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Hash for TaskId {
    #[inline]
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u64(self.0);
    }
}

impl nohash_hasher::IsEnabled for TaskId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_for_a_given_name() {
        assert_eq!(TaskId::from_name("compress"), TaskId::from_name("compress"));
    }

    #[test]
    fn ids_differ_between_names() {
        assert_ne!(TaskId::from_name("compress"), TaskId::from_name("upload"));
    }
}
