use super::model::RasterEntry;
use std::collections::BTreeMap;

/// Combine-group membership derived from stack order
///
/// Group numbers are 1-based and assigned in stack order. Positions are
/// zero-based stack indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    /// Group number for each position
    assignments: Vec<usize>,
    /// Positions of each group, indexed by `group - 1`
    groups: Vec<Vec<usize>>,
}

impl Grouping {
    /// Scan combine flags left to right; the first flag is ignored
    pub fn from_flags<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut assignments = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (position, combine) in flags.into_iter().enumerate() {
            if position == 0 || !combine {
                groups.push(Vec::new());
            }
            let group = groups.len();
            groups[group - 1].push(position);
            assignments.push(group);
        }

        Self { assignments, groups }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_of(&self, position: usize) -> Option<usize> {
        self.assignments.get(position).copied()
    }

    pub fn members(&self, group: usize) -> Option<&[usize]> {
        group
            .checked_sub(1)
            .and_then(|index| self.groups.get(index))
            .map(Vec::as_slice)
    }

    /// Whether `position` is the first row of its group (where the group label goes)
    pub fn is_head(&self, position: usize) -> bool {
        self.group_of(position)
            .and_then(|group| self.members(group))
            .and_then(|members| members.first())
            == Some(&position)
    }

    /// Head position of every group, in group order
    pub fn heads(&self) -> Vec<usize> {
        self.groups.iter().filter_map(|members| members.first().copied()).collect()
    }

    /// `(group number, positions)` pairs in group order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, members)| (index + 1, members.as_slice()))
    }

    pub fn to_map(&self) -> BTreeMap<usize, Vec<usize>> {
        self.iter()
            .map(|(group, members)| (group, members.to_vec()))
            .collect()
    }
}

/// Derives combine groups from the ordered stack
pub struct GroupingEngine;

impl GroupingEngine {
    /// Full recomputation over the current entry order
    pub fn compute(entries: &[RasterEntry]) -> Grouping {
        let grouping = Grouping::from_flags(entries.iter().map(RasterEntry::combine));
        log::debug!(
            "Recomputed grouping: {} entries in {} group(s)",
            entries.len(),
            grouping.group_count()
        );
        grouping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stack_has_no_groups() {
        let grouping = Grouping::from_flags(Vec::new());
        assert_eq!(grouping.group_count(), 0);
        assert_eq!(grouping.group_of(0), None);
        assert!(grouping.members(1).is_none());
    }

    #[test]
    fn test_first_flag_is_ignored() {
        let grouping = Grouping::from_flags(vec![true, true]);
        assert_eq!(grouping.group_count(), 1);
        assert_eq!(grouping.group_of(0), Some(1));
        assert_eq!(grouping.members(1), Some(&[0, 1][..]));
    }

    #[test]
    fn test_mixed_runs() {
        // A | B+C | D | E+F+G
        let flags = vec![false, false, true, false, false, true, true];
        let grouping = Grouping::from_flags(flags.clone());

        let breaks = flags.iter().skip(1).filter(|c| !**c).count();
        assert_eq!(grouping.group_count(), 1 + breaks);
        assert_eq!(grouping.members(2), Some(&[1, 2][..]));
        assert_eq!(grouping.members(4), Some(&[4, 5, 6][..]));
        assert_eq!(grouping.heads(), vec![0, 1, 3, 4]);
        assert!(grouping.is_head(4));
        assert!(!grouping.is_head(5));
        assert!(grouping.members(0).is_none());
    }

    #[test]
    fn test_map_view() {
        let grouping = Grouping::from_flags(vec![false, true, false]);
        let map = grouping.to_map();
        assert_eq!(map.get(&1), Some(&vec![0, 1]));
        assert_eq!(map.get(&2), Some(&vec![2]));
    }
}
