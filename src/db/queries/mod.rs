//! Database queries

pub mod employee;
pub mod location;
pub mod route;
pub mod shift;
pub mod vehicle;
