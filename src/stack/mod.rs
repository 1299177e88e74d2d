//! Raster stack composition: ordered entries, combine groups, parameter validation

pub mod model;
pub mod grouping;
pub mod validator;

pub use model::{display_name_for, Direction, RasterEntry, RasterStackModel};
pub use grouping::{Grouping, GroupingEngine};
pub use validator::{ParameterOutcome, ParameterValidator, RejectReason, Rejection};
