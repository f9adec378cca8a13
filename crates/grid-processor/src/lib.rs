//! Grid processing for forecast lookups.
//!
//! Turns decoded grids into answers:
//!
//! - [`normalize`]: scanning-mode flip and longitude shift into [0, 360)
//! - [`locate`]: nearest grid cell to a query point
//! - [`adjusted_time`]: forecast timestamp for accumulated fields
//! - [`point_records`] / [`cells_in_bbox`]: response rows
//!
//! All functions are pure; they take the grid and query explicitly so they
//! can run on any task without shared state.

pub mod forecast_time;
pub mod nearest;
pub mod normalize;
pub mod query;

pub use forecast_time::{adjusted_time, AdjustedTime, StepPolicy};
pub use nearest::{locate, NearestPoint};
pub use normalize::normalize;
pub use query::{cells_in_bbox, point_records, BboxCell, ResultRecord};
