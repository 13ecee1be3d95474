use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, PackageId};

/// Position of a course inside a package; read-only for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseChainEntry {
    pub course_id: CourseId,
    pub package_id: PackageId,
    pub order_index: u32,
}

/// The course that follows `current` in its package: the entry of the same
/// package with the smallest `order_index` strictly greater than `current`'s.
///
/// Returns `None` when `current` is the last course of the package.
#[must_use]
pub fn next_course<'a>(
    entries: &'a [CourseChainEntry],
    current: &CourseChainEntry,
) -> Option<&'a CourseChainEntry> {
    entries
        .iter()
        .filter(|e| e.package_id == current.package_id && e.order_index > current.order_index)
        .min_by_key(|e| (e.order_index, e.course_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(course: u64, package: u64, order: u32) -> CourseChainEntry {
        CourseChainEntry {
            course_id: CourseId::new(course),
            package_id: PackageId::new(package),
            order_index: order,
        }
    }

    #[test]
    fn picks_smallest_greater_order_in_same_package() {
        let entries = vec![
            entry(30, 1, 5),
            entry(10, 1, 0),
            entry(20, 1, 2),
            entry(99, 2, 1),
        ];
        let next = next_course(&entries, &entries[1]).unwrap();
        assert_eq!(next.course_id, CourseId::new(20));
    }

    #[test]
    fn last_course_ends_the_chain() {
        let entries = vec![entry(10, 1, 0), entry(20, 1, 1)];
        assert!(next_course(&entries, &entries[1]).is_none());
    }
}
