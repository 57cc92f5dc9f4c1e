//! Clearing network model: nodes, bilateral edges and shared-rate
//! hyperedges, stored as flat arenas addressed by index.

pub mod builder;
pub mod components;
pub mod network;

pub use builder::MixedClearingNetworkBuilder;
pub use network::{Flow, MixedClearingNetwork};
