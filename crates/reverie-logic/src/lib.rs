//! Batched navigation environment for the REVERIE remote object grounding
//! task.
//!
//! This crate holds everything between a viewpoint simulator and a learning
//! agent: scene graphs with precomputed shortest paths, a batch of simulator
//! sessions, candidate resolution with a per-location view cache, object
//! features, the episode controller and trajectory scoring. The simulator
//! and the feature stores are traits, so the same code drives real
//! renderers, precomputed data or the graph-only [`simulator::GraphSimulator`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`angles`] | 36-view discretization and the angle encoding |
//! | [`batch`] | Batch of simulator sessions and the image feature store |
//! | [`candidates`] | Candidate viewpoints per location, cached view sweeps |
//! | [`config`] | Environment and camera configuration with validation |
//! | [`connectivity`] | Connectivity file parsing |
//! | [`episode`] | Instruction dataset, minibatches, observations |
//! | [`error`] | Shared error type |
//! | [`eval`] | Success, SPL and object grounding metrics |
//! | [`objects`] | Object features and the object visibility index |
//! | [`pathfinding`] | Scene graphs and all-pairs Dijkstra |
//! | [`simulator`] | Simulator session trait and a graph-only implementation |

pub mod angles;
pub mod batch;
pub mod candidates;
pub mod config;
pub mod connectivity;
pub mod episode;
pub mod error;
pub mod eval;
pub mod objects;
pub mod pathfinding;
pub mod simulator;
