//! The iterative equilibrium solver.
//!
//! The solver repeatedly triggers the full aggregation cascade and adjusts the price of every
//! uncleared market until all markets clear or the iteration budget is exhausted. The price
//! update is bracket-and-bisect: each market's price walks multiplicatively until the sign of
//! its excess demand flips, then the resulting bracket is bisected. Markets are visited in
//! registration order, so runs with identical inputs are deterministic.
use crate::commodity::MarketKind;
use crate::market::MarketKey;
use crate::marketplace::{Marketplace, StructuralError};
use crate::model_time::Period;
use crate::settings::SolverSettings;
use crate::world::World;
use itertools::Itertools;
use log::{debug, info, warn};
use strum::Display;

/// Whether a period's markets all cleared within the iteration budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConvergenceStatus {
    /// Every market cleared within tolerance
    #[strum(serialize = "solved")]
    Solved,
    /// The iteration budget was exhausted with markets still uncleared
    #[strum(serialize = "unsolved")]
    Unsolved,
}

/// The result of solving one period
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    /// Whether all markets cleared
    pub status: ConvergenceStatus,
    /// Number of iterations spent
    pub iterations: usize,
    /// Number of numeric degeneracies encountered (non-finite prices or quantities)
    pub degeneracies: usize,
    /// Markets still uncleared when the solver stopped, in registration order
    pub unsolved: Vec<MarketKey>,
}

impl SolverOutcome {
    /// Whether every market cleared
    pub fn is_solved(&self) -> bool {
        self.status == ConvergenceStatus::Solved
    }
}

/// Find a market-clearing price vector for `period`.
///
/// Trial prices must already have been seeded with [`Marketplace::init_period`]. Each
/// iteration zeroes the accumulated quantities, runs the full cascade and updates every
/// uncleared market's price from its supply/demand imbalance. A non-finite price or quantity
/// restores the market's last finite price and counts toward the iteration budget; a price
/// update is vetted as soon as it is computed, so a non-finite price is never left in place.
///
/// Non-convergence is an outcome, not an error: the best-effort prices are left in place for
/// the caller to commit and the uncleared markets are reported. Prices are not stepped on the
/// final iteration, so the committed quantities match the committed prices.
pub fn solve(
    period: Period,
    world: &mut World,
    marketplace: &mut Marketplace,
    settings: &SolverSettings,
) -> Result<SolverOutcome, StructuralError> {
    let mut degeneracies = 0;

    for iteration in 1..=settings.max_iterations {
        marketplace.reset_to_zero(period.0);
        world.evaluate(period, marketplace)?;

        let mut all_solved = true;
        for (key, market) in marketplace.iter_mut() {
            if market.kind != MarketKind::Solved {
                continue;
            }

            if !market.is_finite(period.0) {
                debug!(
                    "Period {period}: non-finite state in market {}/{}; restoring last price",
                    key.0, key.1
                );
                degeneracies += 1;
                market.restore_price(period.0);
                market.clear_solved(period.0);
                all_solved = false;
                continue;
            }

            if market.is_cleared(period.0, settings.tolerance) {
                market.set_solved(period.0);
                continue;
            }

            // Previously cleared markets can drift back out of tolerance when other
            // markets' prices move
            market.clear_solved(period.0);
            all_solved = false;

            // No step on the final iteration: the committed quantities must correspond
            // to the committed prices
            if iteration == settings.max_iterations {
                continue;
            }

            let next = market.step_price(period.0, settings);
            if !next.is_finite() {
                debug!(
                    "Period {period}: price update overflowed in market {}/{}; restoring last price",
                    key.0, key.1
                );
                degeneracies += 1;
                market.restore_price(period.0);
            }
        }

        if all_solved {
            info!("Period {period}: all markets cleared after {iteration} iterations");
            return Ok(SolverOutcome {
                status: ConvergenceStatus::Solved,
                iterations: iteration,
                degeneracies,
                unsolved: Vec::new(),
            });
        }
    }

    let unsolved = marketplace.unsolved_markets(period.0);
    warn!(
        "Period {period}: iteration budget ({}) exhausted with {} uncleared markets: {}",
        settings.max_iterations,
        unsolved.len(),
        unsolved
            .iter()
            .map(|(region_id, commodity_id)| format!("{region_id}/{commodity_id}"))
            .join(", ")
    );

    Ok(SolverOutcome {
        status: ConvergenceStatus::Unsolved,
        iterations: settings.max_iterations,
        degeneracies,
        unsolved,
    })
}
