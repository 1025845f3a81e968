//! Request middleware for the edge service.

pub mod edge;

pub use edge::{EdgeDecision, EdgeRequest, EdgeRouter, edge_routing};
