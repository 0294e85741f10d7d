//! Atomera Molecules - stage executors backing the binding-affinity pipeline.
//!
//! This crate wraps the external tools behind each pipeline stage:
//! 1. Structure prediction (ESMFold) or pass-through of an uploaded PDB
//! 2. Binding pocket detection (P2Rank)
//! 3. Affinity scoring (Boltz-2, AutoDock Vina)
//!
//! Stub executors reproduce canned outputs for local runs without the tools installed.

pub mod uploads;
pub mod pdb;
pub mod process;
pub mod structure;
pub mod pocket;
pub mod boltz;
pub mod docking;
pub mod affinity;
pub mod stub;
pub mod pipeline;

pub type Result<T> = anyhow::Result<T>;
