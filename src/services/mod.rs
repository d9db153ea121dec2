//! Business logic services

pub mod availability;
pub mod cancellation;
pub mod cluster;
pub mod commit;
pub mod geo;
pub mod naming;
pub mod planner;
pub mod preview;
pub mod routing;
