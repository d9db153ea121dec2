//! Type definitions

pub mod cluster;
pub mod employee;
pub mod location;
pub mod messages;
pub mod planner;
pub mod route;
pub mod shift;
pub mod vehicle;

pub use cluster::*;
pub use employee::*;
pub use location::*;
pub use messages::*;
pub use planner::*;
pub use route::*;
pub use shift::*;
pub use vehicle::*;
