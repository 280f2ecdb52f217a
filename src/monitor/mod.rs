//! Monitoring backend access
//!
//! The relay only needs one capability from the backend: list the problems
//! that are currently open for a severity and (optionally) a host group.

pub mod client;
pub mod model;

pub use client::{ApiVersion, AuthMode, MonitorError, ProblemSource, ZabbixClient};
pub use model::{Problem, ProblemQuery, Tag};
