//! A period-stepped hierarchical market-equilibrium simulation engine.
//!
//! For each period in the simulation calendar, the [`scenario::Scenario`] seeds trial prices
//! from the previous committed period, invokes the [`solver`] to find a price vector at which
//! every market clears, and commits the result before advancing. Supply and demand come from
//! an aggregation hierarchy of regions, sectors, subsectors and technologies evaluated
//! against the prices posted in the [`marketplace::Marketplace`].
#![warn(missing_docs)]
pub mod commodity;
pub mod id;
pub mod log;
pub mod market;
pub mod marketplace;
pub mod model_time;
pub mod output;
pub mod region;
pub mod scenario;
pub mod sector;
pub mod settings;
pub mod solver;
pub mod subsector;
pub mod technology;
pub mod world;

#[cfg(test)]
mod fixture;
