use super::model::RasterEntry;
use crate::types::ParameterField;

/// Why a parameter edit was refused
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    NotANumber,
    /// Lower bound widened past the source data's floor
    BelowSourceMinimum { floor: f64 },
    /// Upper bound widened past the source data's ceiling
    AboveSourceMaximum { ceiling: f64 },
    BelowMinimum { min_val: f64 },
    AboveMaximum { max_val: f64 },
    /// Value sits above the next field in the chain
    AboveUpperLimit { field: ParameterField, limit: f64 },
    /// Value sits below the previous field in the chain
    BelowLowerLimit { field: ParameterField, limit: f64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotANumber => write!(f, "value is not a number"),
            RejectReason::BelowSourceMinimum { floor } => {
                write!(f, "value is below the raster minimum {}", floor)
            }
            RejectReason::AboveSourceMaximum { ceiling } => {
                write!(f, "value is above the raster maximum {}", ceiling)
            }
            RejectReason::BelowMinimum { min_val } => {
                write!(f, "value is below min_val {}", min_val)
            }
            RejectReason::AboveMaximum { max_val } => {
                write!(f, "value is above max_val {}", max_val)
            }
            RejectReason::AboveUpperLimit { field, limit } => {
                write!(f, "value is greater than {} {}", field, limit)
            }
            RejectReason::BelowLowerLimit { field, limit } => {
                write!(f, "value is less than {} {}", field, limit)
            }
        }
    }
}

/// A refused edit and what the field was restored to
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub field: ParameterField,
    pub reason: RejectReason,
    /// Value the field holds after the rejection; `None` when it was cleared
    pub restored: Option<f64>,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.restored {
            Some(value) => write!(f, "{} rejected ({}), reset to {}", self.field, self.reason, value),
            None => write!(f, "{} rejected ({}), cleared", self.field, self.reason),
        }
    }
}

/// Result of a single-field edit
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterOutcome {
    Committed(f64),
    Rejected(Rejection),
}

impl ParameterOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ParameterOutcome::Committed(_))
    }
}

/// Single-entry validation of the `min_val <= opti_from <= opti_to <= max_val` chain
pub struct ParameterValidator;

impl ParameterValidator {
    /// Parse user text; blanks and non-finite values are not numbers
    pub fn parse_input(raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Check a candidate value for one field against the entry's other fields
    pub fn check(entry: &RasterEntry, field: ParameterField, value: f64) -> Result<(), RejectReason> {
        if !value.is_finite() {
            return Err(RejectReason::NotANumber);
        }

        match field {
            ParameterField::MinVal => {
                if value < entry.source_min() {
                    return Err(RejectReason::BelowSourceMinimum { floor: entry.source_min() });
                }
                Self::check_upper_chain(entry, field, value)
            }
            ParameterField::MaxVal => {
                if value > entry.source_max() {
                    return Err(RejectReason::AboveSourceMaximum { ceiling: entry.source_max() });
                }
                Self::check_lower_chain(entry, field, value)
            }
            ParameterField::OptiFrom => {
                if value < entry.min_val() {
                    return Err(RejectReason::BelowMinimum { min_val: entry.min_val() });
                }
                if value > entry.max_val() {
                    return Err(RejectReason::AboveMaximum { max_val: entry.max_val() });
                }
                Self::check_upper_chain(entry, field, value)
            }
            ParameterField::OptiTo => {
                if value > entry.max_val() {
                    return Err(RejectReason::AboveMaximum { max_val: entry.max_val() });
                }
                if value < entry.min_val() {
                    return Err(RejectReason::BelowMinimum { min_val: entry.min_val() });
                }
                Self::check_lower_chain(entry, field, value)
            }
        }
    }

    /// Value the field falls back to after a rejection
    ///
    /// A bound pushed past the source data resets to the server-issued
    /// value; any other rejected bound keeps its last valid value.
    /// Optimum fields are cleared.
    pub fn restore_value(entry: &RasterEntry, field: ParameterField, reason: RejectReason) -> Option<f64> {
        match (field, reason) {
            (ParameterField::MinVal, RejectReason::BelowSourceMinimum { floor }) => Some(floor),
            (ParameterField::MaxVal, RejectReason::AboveSourceMaximum { ceiling }) => Some(ceiling),
            (ParameterField::MinVal, _) => Some(entry.min_val()),
            (ParameterField::MaxVal, _) => Some(entry.max_val()),
            (ParameterField::OptiFrom | ParameterField::OptiTo, _) => None,
        }
    }

    /// Fields after `field` in the chain that currently hold a value
    fn check_upper_chain(entry: &RasterEntry, field: ParameterField, value: f64) -> Result<(), RejectReason> {
        for (other, limit) in Self::chain(entry).into_iter().skip_while(|(f, _)| *f != field).skip(1) {
            if let Some(limit) = limit {
                if value > limit {
                    return Err(RejectReason::AboveUpperLimit { field: other, limit });
                }
            }
        }
        Ok(())
    }

    /// Fields before `field` in the chain that currently hold a value
    fn check_lower_chain(entry: &RasterEntry, field: ParameterField, value: f64) -> Result<(), RejectReason> {
        for (other, limit) in Self::chain(entry).into_iter().rev().skip_while(|(f, _)| *f != field).skip(1) {
            if let Some(limit) = limit {
                if value < limit {
                    return Err(RejectReason::BelowLowerLimit { field: other, limit });
                }
            }
        }
        Ok(())
    }

    fn chain(entry: &RasterEntry) -> [(ParameterField, Option<f64>); 4] {
        [
            (ParameterField::MinVal, Some(entry.min_val())),
            (ParameterField::OptiFrom, entry.opti_from()),
            (ParameterField::OptiTo, entry.opti_to()),
            (ParameterField::MaxVal, Some(entry.max_val())),
        ]
    }
}
