use super::grouping::{Grouping, GroupingEngine};
use super::validator::{ParameterOutcome, ParameterValidator, Rejection};
use crate::request::catalog::DirectoryItem;
use crate::types::{ParameterField, SuitabilityError, SuitabilityResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Direction for moving an entry within the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One selected raster layer and its suitability parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterEntry {
    file_path: String,
    display_name: String,
    /// Bounds as issued by the directory listing
    source_min: f64,
    source_max: f64,
    min_val: f64,
    max_val: f64,
    opti_from: Option<f64>,
    opti_to: Option<f64>,
    combine: bool,
}

impl RasterEntry {
    pub(crate) fn new(file_path: &str, display_name: &str, min_val: f64, max_val: f64) -> Self {
        Self {
            file_path: file_path.to_string(),
            display_name: display_name.to_string(),
            source_min: min_val,
            source_max: max_val,
            min_val,
            max_val,
            opti_from: None,
            opti_to: None,
            combine: false,
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source_min(&self) -> f64 {
        self.source_min
    }

    pub fn source_max(&self) -> f64 {
        self.source_max
    }

    pub fn min_val(&self) -> f64 {
        self.min_val
    }

    pub fn max_val(&self) -> f64 {
        self.max_val
    }

    pub fn opti_from(&self) -> Option<f64> {
        self.opti_from
    }

    pub fn opti_to(&self) -> Option<f64> {
        self.opti_to
    }

    /// Stored combine flag; always false at position 0
    pub fn combine(&self) -> bool {
        self.combine
    }

    pub fn value(&self, field: ParameterField) -> Option<f64> {
        match field {
            ParameterField::MinVal => Some(self.min_val),
            ParameterField::MaxVal => Some(self.max_val),
            ParameterField::OptiFrom => self.opti_from,
            ParameterField::OptiTo => self.opti_to,
        }
    }

    /// Both optimum values are present
    pub fn is_complete(&self) -> bool {
        self.opti_from.is_some() && self.opti_to.is_some()
    }

    /// Bounds cannot be unset; `None` leaves them untouched
    pub(crate) fn set_value(&mut self, field: ParameterField, value: Option<f64>) {
        match (field, value) {
            (ParameterField::MinVal, Some(v)) => self.min_val = v,
            (ParameterField::MaxVal, Some(v)) => self.max_val = v,
            (ParameterField::MinVal | ParameterField::MaxVal, None) => {}
            (ParameterField::OptiFrom, v) => self.opti_from = v,
            (ParameterField::OptiTo, v) => self.opti_to = v,
        }
    }
}

/// Human-readable name for a raster path: the file stem
pub fn display_name_for(file_path: &str) -> String {
    Path::new(file_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_path)
        .to_string()
}

/// Ordered stack of selected rasters with derived combine groups
#[derive(Debug, Clone, Default)]
pub struct RasterStackModel {
    entries: Vec<RasterEntry>,
    grouping: Grouping,
}

impl RasterStackModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a saved stack
    ///
    /// Entries keep their stored values; optimum ranges are only checked
    /// again when a request is built.
    pub fn from_entries(entries: Vec<RasterEntry>) -> SuitabilityResult<Self> {
        let mut stack = Self::new();
        for entry in entries {
            if stack.contains(&entry.file_path) {
                return Err(SuitabilityError::DuplicateEntry(entry.file_path));
            }
            let (min_val, max_val) = (entry.min_val, entry.max_val);
            if !min_val.is_finite() || !max_val.is_finite() || min_val > max_val {
                return Err(SuitabilityError::InvalidBounds {
                    file_path: entry.file_path,
                    min_val,
                    max_val,
                });
            }
            stack.entries.push(entry);
        }
        stack.recompute();
        log::debug!("Restored stack of {} raster(s)", stack.len());
        Ok(stack)
    }

    /// Append a raster at the end of the stack
    pub fn add(
        &mut self,
        file_path: &str,
        display_name: &str,
        min_val: f64,
        max_val: f64,
    ) -> SuitabilityResult<&RasterEntry> {
        if self.contains(file_path) {
            return Err(SuitabilityError::DuplicateEntry(file_path.to_string()));
        }
        if !min_val.is_finite() || !max_val.is_finite() || min_val > max_val {
            return Err(SuitabilityError::InvalidBounds {
                file_path: file_path.to_string(),
                min_val,
                max_val,
            });
        }

        self.entries.push(RasterEntry::new(file_path, display_name, min_val, max_val));
        self.recompute();

        log::info!(
            "Added raster {} at position {} (min_val={}, max_val={})",
            file_path,
            self.entries.len() - 1,
            min_val,
            max_val
        );
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Add a file from a directory listing, using the listing's bounds
    pub fn add_from_listing(&mut self, directory: &str, item: &DirectoryItem) -> SuitabilityResult<&RasterEntry> {
        let file_path = format!("{}/{}", directory.trim_end_matches('/'), item.name);
        let (min_val, max_val) = item
            .bounds()
            .ok_or_else(|| SuitabilityError::MissingBounds(file_path.clone()))?;
        let display_name = display_name_for(&file_path);
        self.add(&file_path, &display_name, min_val, max_val)
    }

    /// Remove a raster; absent paths are a logged no-op
    pub fn remove(&mut self, file_path: &str) -> bool {
        match self.position(file_path) {
            Some(position) => {
                self.entries.remove(position);
                self.recompute();
                log::info!("Removed raster {} from position {}", file_path, position);
                true
            }
            None => {
                log::warn!("Ignoring removal of raster not in stack: {}", file_path);
                false
            }
        }
    }

    /// Swap an entry with its neighbour; no-op at the stack boundary
    pub fn reorder(&mut self, file_path: &str, direction: Direction) -> SuitabilityResult<bool> {
        let position = self
            .position(file_path)
            .ok_or_else(|| SuitabilityError::EntryNotFound(file_path.to_string()))?;

        let target = match direction {
            Direction::Up if position > 0 => position - 1,
            Direction::Down if position + 1 < self.entries.len() => position + 1,
            _ => {
                log::debug!("Raster {} cannot move {:?} from position {}", file_path, direction, position);
                return Ok(false);
            }
        };

        self.entries.swap(position, target);
        self.recompute();
        log::info!("Moved raster {} from position {} to {}", file_path, position, target);
        Ok(true)
    }

    /// Set the combine flag; the first entry's flag is not editable
    pub fn set_combine(&mut self, file_path: &str, combine: bool) -> SuitabilityResult<bool> {
        let position = self
            .position(file_path)
            .ok_or_else(|| SuitabilityError::EntryNotFound(file_path.to_string()))?;

        if position == 0 {
            log::warn!("Combine flag of the first raster is fixed to No: {}", file_path);
            return Ok(false);
        }

        self.entries[position].combine = combine;
        self.recompute();
        Ok(true)
    }

    /// Validate and commit a numeric parameter edit
    ///
    /// A rejected value restores the field and reports the rejection
    /// instead of failing. See [`ParameterValidator::restore_value`].
    pub fn set_parameter(
        &mut self,
        file_path: &str,
        field: ParameterField,
        value: f64,
    ) -> SuitabilityResult<ParameterOutcome> {
        let position = self
            .position(file_path)
            .ok_or_else(|| SuitabilityError::EntryNotFound(file_path.to_string()))?;
        let entry = &mut self.entries[position];

        match ParameterValidator::check(entry, field, value) {
            Ok(()) => {
                entry.set_value(field, Some(value));
                log::debug!("{} {} = {}", file_path, field, value);
                Ok(ParameterOutcome::Committed(value))
            }
            Err(reason) => {
                let restored = ParameterValidator::restore_value(entry, field, reason);
                entry.set_value(field, restored);
                let rejection = Rejection { field, reason, restored };
                log::warn!("{}: {}", file_path, rejection);
                Ok(ParameterOutcome::Rejected(rejection))
            }
        }
    }

    /// Same as [`set_parameter`](Self::set_parameter) for raw form input
    pub fn set_parameter_text(
        &mut self,
        file_path: &str,
        field: ParameterField,
        raw: &str,
    ) -> SuitabilityResult<ParameterOutcome> {
        let value = ParameterValidator::parse_input(raw).unwrap_or(f64::NAN);
        self.set_parameter(file_path, field, value)
    }

    pub fn entries(&self) -> &[RasterEntry] {
        &self.entries
    }

    pub fn get(&self, file_path: &str) -> Option<&RasterEntry> {
        self.entries.iter().find(|e| e.file_path == file_path)
    }

    pub fn position(&self, file_path: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.file_path == file_path)
    }

    pub fn contains(&self, file_path: &str) -> bool {
        self.position(file_path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// Group number of a raster
    pub fn group_of(&self, file_path: &str) -> Option<usize> {
        self.position(file_path).and_then(|p| self.grouping.group_of(p))
    }

    /// File paths of each group, in group order
    pub fn groups_by_path(&self) -> Vec<Vec<&str>> {
        self.grouping
            .iter()
            .map(|(_, members)| {
                members
                    .iter()
                    .map(|&p| self.entries[p].file_path.as_str())
                    .collect()
            })
            .collect()
    }

    fn recompute(&mut self) {
        if let Some(first) = self.entries.first_mut() {
            first.combine = false;
        }
        self.grouping = GroupingEngine::compute(&self.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_stack() -> RasterStackModel {
        let mut stack = RasterStackModel::new();
        stack.add("/Africa/A.tif", "A", 0.0, 10.0).unwrap();
        stack.add("/Africa/B.tif", "B", 0.0, 20.0).unwrap();
        stack
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut stack = two_layer_stack();
        let err = stack.add("/Africa/A.tif", "A again", 0.0, 5.0).unwrap_err();
        assert!(matches!(err, SuitabilityError::DuplicateEntry(path) if path == "/Africa/A.tif"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_restore_forces_first_combine_off() {
        let mut first = RasterEntry::new("/Africa/A.tif", "A", 0.0, 10.0);
        first.combine = true;
        let mut second = RasterEntry::new("/Africa/B.tif", "B", 0.0, 20.0);
        second.combine = true;

        let stack = RasterStackModel::from_entries(vec![first.clone(), second]).unwrap();
        assert!(!stack.entries()[0].combine());
        assert_eq!(stack.grouping().group_count(), 1);

        let err = RasterStackModel::from_entries(vec![first.clone(), first]).unwrap_err();
        assert!(matches!(err, SuitabilityError::DuplicateEntry(_)));
    }

    #[test]
    fn test_add_rejects_inverted_bounds() {
        let mut stack = RasterStackModel::new();
        assert!(matches!(
            stack.add("/x.tif", "x", 5.0, 1.0),
            Err(SuitabilityError::InvalidBounds { .. })
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_new_entries_start_unset() {
        let stack = two_layer_stack();
        let b = stack.get("/Africa/B.tif").unwrap();
        assert_eq!(b.opti_from(), None);
        assert_eq!(b.opti_to(), None);
        assert!(!b.combine());
        assert_eq!(stack.grouping().group_count(), 2);
    }

    #[test]
    fn test_scenario_combined_and_separate() {
        let mut stack = two_layer_stack();

        assert!(stack.set_combine("/Africa/B.tif", true).unwrap());
        assert_eq!(stack.groups_by_path(), vec![vec!["/Africa/A.tif", "/Africa/B.tif"]]);

        stack.set_combine("/Africa/B.tif", false).unwrap();
        assert_eq!(
            stack.groups_by_path(),
            vec![vec!["/Africa/A.tif"], vec!["/Africa/B.tif"]]
        );
    }

    #[test]
    fn test_first_entry_combine_not_editable() {
        let mut stack = two_layer_stack();
        assert!(!stack.set_combine("/Africa/A.tif", true).unwrap());
        assert!(!stack.entries()[0].combine());
    }

    #[test]
    fn test_reorder_boundaries_and_regrouping() {
        let mut stack = two_layer_stack();
        stack.add("/Africa/C.tif", "C", 0.0, 1.0).unwrap();
        stack.set_combine("/Africa/B.tif", true).unwrap();

        assert!(!stack.reorder("/Africa/A.tif", Direction::Up).unwrap());
        assert!(!stack.reorder("/Africa/C.tif", Direction::Down).unwrap());

        // B moves to the top and loses its combine flag
        assert!(stack.reorder("/Africa/B.tif", Direction::Up).unwrap());
        assert_eq!(stack.position("/Africa/B.tif"), Some(0));
        assert!(!stack.entries()[0].combine());
        assert_eq!(stack.grouping().group_count(), 3);

        assert!(matches!(
            stack.reorder("/missing.tif", Direction::Up),
            Err(SuitabilityError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut stack = two_layer_stack();
        assert!(stack.remove("/Africa/A.tif"));
        assert!(!stack.remove("/Africa/A.tif"));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.position("/Africa/B.tif"), Some(0));
        assert_eq!(stack.group_of("/Africa/B.tif"), Some(1));
    }

    #[test]
    fn test_rejected_opti_from_is_cleared() {
        let mut stack = two_layer_stack();
        let outcome = stack
            .set_parameter("/Africa/A.tif", ParameterField::OptiFrom, 12.0)
            .unwrap();

        assert!(!outcome.is_committed());
        let a = stack.get("/Africa/A.tif").unwrap();
        assert_eq!(a.opti_from(), None);
        assert_eq!(a.min_val(), 0.0);
        assert_eq!(a.max_val(), 10.0);
    }

    #[test]
    fn test_rejected_min_resets_to_source() {
        let mut stack = two_layer_stack();
        stack.set_parameter("/Africa/A.tif", ParameterField::MinVal, 2.0).unwrap();
        let outcome = stack
            .set_parameter("/Africa/A.tif", ParameterField::MinVal, -3.0)
            .unwrap();

        match outcome {
            ParameterOutcome::Rejected(rejection) => assert_eq!(rejection.restored, Some(0.0)),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(stack.get("/Africa/A.tif").unwrap().min_val(), 0.0);
    }

    #[test]
    fn test_bound_crossing_optimum_keeps_last_valid_value() {
        let mut stack = two_layer_stack();
        let path = "/Africa/A.tif";
        stack.set_parameter(path, ParameterField::MinVal, 2.0).unwrap();
        stack.set_parameter(path, ParameterField::MaxVal, 9.0).unwrap();
        stack.set_parameter(path, ParameterField::OptiFrom, 3.0).unwrap();
        stack.set_parameter(path, ParameterField::OptiTo, 7.0).unwrap();

        let outcome = stack.set_parameter(path, ParameterField::MinVal, 4.0).unwrap();
        match outcome {
            ParameterOutcome::Rejected(rejection) => assert_eq!(rejection.restored, Some(2.0)),
            other => panic!("expected rejection, got {:?}", other),
        }

        let outcome = stack.set_parameter_text(path, ParameterField::MaxVal, "six").unwrap();
        assert!(!outcome.is_committed());

        let a = stack.get(path).unwrap();
        assert_eq!(a.min_val(), 2.0);
        assert_eq!(a.max_val(), 9.0);
        assert_eq!(a.opti_from(), Some(3.0));
    }

    #[test]
    fn test_text_input_not_a_number() {
        let mut stack = two_layer_stack();
        stack.set_parameter_text("/Africa/A.tif", ParameterField::OptiTo, "8").unwrap();
        let outcome = stack
            .set_parameter_text("/Africa/A.tif", ParameterField::OptiTo, "eight")
            .unwrap();
        assert!(!outcome.is_committed());
        assert_eq!(stack.get("/Africa/A.tif").unwrap().opti_to(), None);
    }

    #[test]
    fn test_display_name_for() {
        assert_eq!(display_name_for("/Africa/Ethiopia/annual_precipitation.tif"), "annual_precipitation");
        assert_eq!(display_name_for("plain"), "plain");
    }
}
