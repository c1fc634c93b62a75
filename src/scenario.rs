//! The scenario drives the run: period setup, solve and commit, in period order.
use crate::commodity::{CommodityID, CommodityMap};
use crate::marketplace::Marketplace;
use crate::model_time::{ModelTime, Period};
use crate::region::{Region, RegionID};
use crate::settings::SolverSettings;
use crate::solver::{solve, ConvergenceStatus, SolverOutcome};
use crate::world::World;
use anyhow::{ensure, Context, Result};
use log::{info, warn};

/// Where the run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `run` has not been called
    NotStarted,
    /// The given period is being solved
    Running(Period),
    /// The given period has been committed; the next has not started
    PeriodCommitted(Period),
    /// Every period has been committed
    Completed,
}

/// Committed result for one period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodResult {
    /// The period solved
    pub period: Period,
    /// Its calendar year
    pub year: u32,
    /// Whether all markets cleared
    pub status: ConvergenceStatus,
    /// Iterations spent by the solver
    pub iterations: usize,
    /// Numeric degeneracies encountered
    pub degeneracies: usize,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// One result per period, in period order
    pub periods: Vec<PeriodResult>,
}

impl RunSummary {
    /// Whether every period converged
    pub fn all_solved(&self) -> bool {
        self.periods
            .iter()
            .all(|result| result.status == ConvergenceStatus::Solved)
    }
}

/// The top-level driver for a run.
///
/// Owns the calendar, the world and the marketplace for the lifetime of the run, and is the
/// single point of truth for which period is currently being solved. Periods are solved
/// strictly in order; each period's committed state feeds the next period's setup and is
/// read-only thereafter.
pub struct Scenario {
    model_time: ModelTime,
    commodities: CommodityMap,
    world: World,
    marketplace: Marketplace,
    settings: SolverSettings,
    state: RunState,
    outcomes: Vec<Option<SolverOutcome>>,
}

impl Scenario {
    /// Build a scenario from the parsed structural tree.
    ///
    /// Registers every market the tree implies and validates commodity references; a
    /// malformed tree fails here, before the run begins.
    pub fn new(
        model_time: ModelTime,
        commodities: CommodityMap,
        regions: Vec<Region>,
        settings: SolverSettings,
    ) -> Result<Self> {
        let num_periods = model_time.num_periods();
        let mut world = World::new(regions)?;
        let mut marketplace = Marketplace::new(num_periods, settings.initial_price);
        world.complete_init(&commodities, &mut marketplace, num_periods)?;

        Ok(Scenario {
            model_time,
            commodities,
            world,
            marketplace,
            settings,
            state: RunState::NotStarted,
            outcomes: vec![None; num_periods],
        })
    }

    /// Set the exogenous price of a fixed-price market for every period.
    ///
    /// Must be called before the run begins; the target market must be of fixed-price kind.
    pub fn set_fixed_price(
        &mut self,
        region_id: &RegionID,
        commodity_id: &CommodityID,
        price: f64,
    ) -> Result<()> {
        ensure!(
            self.state == RunState::NotStarted,
            "Fixed prices must be set before the run begins"
        );
        let key = (region_id.clone(), commodity_id.clone());
        ensure!(
            self.marketplace.market(&key)?.kind == crate::commodity::MarketKind::FixedPrice,
            "Market {region_id}/{commodity_id} is not a fixed-price market"
        );
        for period in self.model_time.periods() {
            self.marketplace.set_price(&key, period.0, price)?;
        }
        Ok(())
    }

    /// Run the simulation: for each period in calendar order, derive period inputs, solve
    /// for clearing prices and commit the result.
    ///
    /// A period that fails to converge is committed with its best-effort values and flagged;
    /// the run continues, since later periods may still be informative. The caller can
    /// inspect the summary and escalate if it chooses.
    pub fn run(&mut self) -> Result<RunSummary> {
        ensure!(
            self.state == RunState::NotStarted,
            "Scenario has already been run"
        );

        for period in self.model_time.periods() {
            let year = self.model_time.year(period);
            self.state = RunState::Running(period);
            info!("Solving period {period} ({year})");

            // Period setup: trial prices from the previous committed period, exogenous
            // drivers from the calendar
            self.marketplace.init_period(period.0);
            self.world.init_period(period, &self.model_time);

            let outcome = solve(
                period,
                &mut self.world,
                &mut self.marketplace,
                &self.settings,
            )?;
            if !outcome.is_solved() {
                warn!("Period {period} ({year}) committed without convergence");
            }

            // Commit: the period's values are frozen and become read-only inputs to
            // subsequent periods
            self.outcomes[period.0] = Some(outcome);
            self.state = RunState::PeriodCommitted(period);
        }
        self.state = RunState::Completed;

        Ok(self.summary())
    }

    /// Summary of the committed periods so far
    pub fn summary(&self) -> RunSummary {
        let periods = self
            .model_time
            .iter()
            .filter_map(|(period, year)| {
                let outcome = self.outcomes[period.0].as_ref()?;
                Some(PeriodResult {
                    period,
                    year,
                    status: outcome.status,
                    iterations: outcome.iterations,
                    degeneracies: outcome.degeneracies,
                })
            })
            .collect();
        RunSummary { periods }
    }

    /// Where the run currently stands
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The convergence status of a committed period, if it has been committed
    pub fn period_status(&self, period: Period) -> Option<ConvergenceStatus> {
        Some(self.outcomes.get(period.0)?.as_ref()?.status)
    }

    /// The committed price for a market in a period
    pub fn price(
        &self,
        region_id: &RegionID,
        commodity_id: &CommodityID,
        period: Period,
    ) -> Result<f64> {
        self.check_committed(period)?;
        let key = (region_id.clone(), commodity_id.clone());
        Ok(self.marketplace.price(&key, period.0)?)
    }

    /// The committed supply for a market in a period
    pub fn supply(
        &self,
        region_id: &RegionID,
        commodity_id: &CommodityID,
        period: Period,
    ) -> Result<f64> {
        self.check_committed(period)?;
        let key = (region_id.clone(), commodity_id.clone());
        Ok(self.marketplace.supply(&key, period.0)?)
    }

    /// The committed demand for a market in a period
    pub fn demand(
        &self,
        region_id: &RegionID,
        commodity_id: &CommodityID,
        period: Period,
    ) -> Result<f64> {
        self.check_committed(period)?;
        let key = (region_id.clone(), commodity_id.clone());
        Ok(self.marketplace.demand(&key, period.0)?)
    }

    fn check_committed(&self, period: Period) -> Result<()> {
        self.outcomes
            .get(period.0)
            .and_then(Option::as_ref)
            .with_context(|| format!("Period {period} has not been committed"))?;
        Ok(())
    }

    /// The simulation calendar
    pub fn model_time(&self) -> &ModelTime {
        &self.model_time
    }

    /// The commodity definitions
    pub fn commodities(&self) -> &CommodityMap {
        &self.commodities
    }

    /// The world's region tree, for reporting
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The marketplace, for reporting
    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, commodities, linear_region, model_time, solver_settings};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_run_commits_every_period(
        linear_region: Region,
        commodities: CommodityMap,
        model_time: ModelTime,
        solver_settings: SolverSettings,
    ) {
        let mut scenario =
            Scenario::new(model_time, commodities, vec![linear_region], solver_settings).unwrap();
        assert_eq!(scenario.state(), RunState::NotStarted);

        let summary = scenario.run().unwrap();
        assert_eq!(scenario.state(), RunState::Completed);
        assert!(summary.all_solved());
        assert_eq!(summary.periods.len(), 3);

        let region = "GBR".into();
        let commodity = "ELC".into();
        for period in scenario.model_time().periods() {
            assert_eq!(
                scenario.period_status(period),
                Some(ConvergenceStatus::Solved)
            );
            assert_approx_eq!(
                f64,
                scenario.price(&region, &commodity, period).unwrap(),
                50.0,
                epsilon = 1e-4
            );
        }
    }

    #[rstest]
    fn test_run_twice_is_error(
        linear_region: Region,
        commodities: CommodityMap,
        model_time: ModelTime,
        solver_settings: SolverSettings,
    ) {
        let mut scenario =
            Scenario::new(model_time, commodities, vec![linear_region], solver_settings).unwrap();
        scenario.run().unwrap();
        assert_error!(scenario.run(), "Scenario has already been run");
    }

    #[rstest]
    fn test_accessors_before_commit_are_errors(
        linear_region: Region,
        commodities: CommodityMap,
        model_time: ModelTime,
        solver_settings: SolverSettings,
    ) {
        let scenario =
            Scenario::new(model_time, commodities, vec![linear_region], solver_settings).unwrap();
        let result = scenario.price(&"GBR".into(), &"ELC".into(), Period(0));
        assert!(result.is_err());
    }
}
