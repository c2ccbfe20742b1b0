//! Compute marketplace order viewer: fetches the public order listing,
//! normalizes prices to dollars per GPU-hour and renders a timeline,
//! an order table and sell-side statistics.

pub mod chart;
pub mod config;
pub mod logging;
pub mod order;
pub mod overview;
pub mod report;
pub mod source;
pub mod table;
pub mod units;
