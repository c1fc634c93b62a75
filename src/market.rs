//! A market is the clearing unit for one commodity in one region.
//!
//! Each market holds one value slot per period: the trial price, the supply and demand
//! accumulated during the current solver iteration, a solved flag and the price bracket the
//! solver is narrowing. Slots are reused across periods by seeding each period from the last.
use crate::commodity::{CommodityID, MarketKind};
use crate::region::RegionID;
use crate::settings::SolverSettings;
use float_cmp::approx_eq;

/// Key identifying a market within the marketplace
pub type MarketKey = (RegionID, CommodityID);

/// Per-period state for a market
#[derive(Debug, Clone)]
struct PeriodValues {
    /// Current trial price
    price: f64,
    /// The last finite price posted, restored on numeric degeneracy
    prev_price: f64,
    /// Supply accumulated in the current solver iteration
    supply: f64,
    /// Demand accumulated in the current solver iteration
    demand: f64,
    /// Whether this market has cleared in this period
    solved: bool,
    /// Largest price known to leave excess demand positive
    lower: Option<f64>,
    /// Smallest price known to leave excess demand negative
    upper: Option<f64>,
}

impl PeriodValues {
    fn new(price: f64) -> Self {
        PeriodValues {
            price,
            prev_price: price,
            supply: 0.0,
            demand: 0.0,
            solved: false,
            lower: None,
            upper: None,
        }
    }
}

/// The clearing unit for one commodity in one region, across all periods
#[derive(Debug, Clone)]
pub struct Market {
    /// The region this market belongs to
    pub region_id: RegionID,
    /// The commodity traded in this market
    pub commodity_id: CommodityID,
    /// Whether the solver adjusts this market's price
    pub kind: MarketKind,
    periods: Vec<PeriodValues>,
}

impl Market {
    /// Create a market with one value slot per period, all priced at `initial_price`
    pub fn new(
        region_id: RegionID,
        commodity_id: CommodityID,
        kind: MarketKind,
        num_periods: usize,
        initial_price: f64,
    ) -> Self {
        Market {
            region_id,
            commodity_id,
            kind,
            periods: vec![PeriodValues::new(initial_price); num_periods],
        }
    }

    /// Prepare the slot for `period`: seed the trial price from the previous period's committed
    /// price and clear all solver bookkeeping.
    pub fn init_period(&mut self, period: usize) {
        let price = if period > 0 {
            self.periods[period - 1].price
        } else {
            self.periods[0].price
        };
        self.periods[period] = PeriodValues::new(price);
    }

    /// Zero the accumulated supply and demand for `period`.
    ///
    /// Called at the start of every solver iteration; contributions are then accumulated
    /// exactly once per contributing entity.
    pub fn reset_to_zero(&mut self, period: usize) {
        let values = &mut self.periods[period];
        values.supply = 0.0;
        values.demand = 0.0;
    }

    /// Accumulate supplied quantity. A negative amount represents net consumption.
    pub fn add_to_supply(&mut self, period: usize, amount: f64) {
        self.periods[period].supply += amount;
    }

    /// Accumulate demanded quantity. A negative amount represents net production.
    pub fn add_to_demand(&mut self, period: usize, amount: f64) {
        self.periods[period].demand += amount;
    }

    /// The current trial price for `period`
    pub fn price(&self, period: usize) -> f64 {
        self.periods[period].price
    }

    /// Set the trial price for `period`, remembering the outgoing price if it was finite
    pub fn set_price(&mut self, period: usize, price: f64) {
        let values = &mut self.periods[period];
        if values.price.is_finite() {
            values.prev_price = values.price;
        }
        values.price = price;
    }

    /// The supply accumulated for `period` in the current iteration
    pub fn supply(&self, period: usize) -> f64 {
        self.periods[period].supply
    }

    /// The demand accumulated for `period` in the current iteration
    pub fn demand(&self, period: usize) -> f64 {
        self.periods[period].demand
    }

    /// Demand minus supply at the current trial price
    pub fn excess_demand(&self, period: usize) -> f64 {
        let values = &self.periods[period];
        values.demand - values.supply
    }

    /// Whether the market has been marked as cleared for `period`
    pub fn is_solved(&self, period: usize) -> bool {
        self.periods[period].solved
    }

    /// Mark the market as cleared for `period`
    pub fn set_solved(&mut self, period: usize) {
        self.periods[period].solved = true;
    }

    /// Mark the market as not cleared for `period`.
    ///
    /// Used when a previously cleared market drifts out of tolerance because other markets'
    /// prices have moved.
    pub fn clear_solved(&mut self, period: usize) {
        self.periods[period].solved = false;
    }

    /// Whether supply and demand balance within the relative tolerance.
    ///
    /// The imbalance is measured relative to `max(|supply|, |demand|, 1)` so that near-zero
    /// markets neither divide by zero nor require absolute precision. A market with no supply
    /// and no demand at any price is trivially cleared.
    pub fn is_cleared(&self, period: usize, tolerance: f64) -> bool {
        let values = &self.periods[period];
        if self.is_trivially_cleared(period) {
            return true;
        }
        let scale = values.supply.abs().max(values.demand.abs()).max(1.0);
        (values.supply - values.demand).abs() <= tolerance * scale
    }

    /// Whether both supply and demand are structurally zero
    pub fn is_trivially_cleared(&self, period: usize) -> bool {
        let values = &self.periods[period];
        approx_eq!(f64, values.supply, 0.0, epsilon = 1e-12)
            && approx_eq!(f64, values.demand, 0.0, epsilon = 1e-12)
    }

    /// Whether the current supply, demand and price are all finite
    pub fn is_finite(&self, period: usize) -> bool {
        let values = &self.periods[period];
        values.price.is_finite() && values.supply.is_finite() && values.demand.is_finite()
    }

    /// Restore the last finite price after a numeric degeneracy
    pub fn restore_price(&mut self, period: usize) {
        let values = &mut self.periods[period];
        values.price = values.prev_price;
        // The bracket may have been poisoned by the degenerate evaluation
        values.lower = None;
        values.upper = None;
    }

    /// Width of the price bracket, once both bounds are known
    pub fn bracket_width(&self, period: usize) -> Option<f64> {
        let values = &self.periods[period];
        Some(values.upper? - values.lower?)
    }

    /// Compute the next trial price from the current imbalance and update the bracket.
    ///
    /// Positive excess demand marks the current price as a lower bound, negative as an upper
    /// bound. While only one bound is known the price walks multiplicatively in the direction
    /// of the imbalance; once the sign of excess demand has flipped the bracket is closed and
    /// each step bisects it, so the bracket width strictly decreases.
    pub fn step_price(&mut self, period: usize, settings: &SolverSettings) -> f64 {
        let excess = self.excess_demand(period);
        let step = settings.bracket_interval;
        let values = &mut self.periods[period];
        let price = values.price;

        let next = if excess > 0.0 {
            values.lower = Some(match values.lower {
                Some(lower) => lower.max(price),
                None => price,
            });
            match values.upper {
                Some(upper) => (price + upper) / 2.0,
                None if price > 0.0 => price * (1.0 + step),
                None => step,
            }
        } else {
            values.upper = Some(match values.upper {
                Some(upper) => upper.min(price),
                None => price,
            });
            match values.lower {
                Some(lower) => (lower + price) / 2.0,
                None => price / (1.0 + step),
            }
        };

        if values.price.is_finite() {
            values.prev_price = values.price;
        }
        values.price = next;
        next
    }
}
