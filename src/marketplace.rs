//! The marketplace owns every market in the run and is the only mutation surface for them.
//!
//! Markets are registered once during setup; the key set is fixed for the lifetime of the run.
//! Requesting a key that was never registered is a [`StructuralError`]: it means the input tree
//! referenced a market that does not exist, and continuing would silently corrupt aggregation.
use crate::commodity::{CommodityID, MarketKind};
use crate::market::{Market, MarketKey};
use crate::region::RegionID;
use crate::settings::SolverSettings;
use indexmap::IndexMap;
use std::error::Error;
use std::fmt;

/// A contract violation in the structure of the model.
///
/// Raised when a market, region or commodity key is referenced but was never registered.
/// This is fatal: it is never caught locally and surfaces to the top-level caller.
#[derive(Debug, Clone)]
pub struct StructuralError {
    message: String,
}

impl StructuralError {
    /// A lookup of a market key that was never registered
    pub fn unknown_market(region_id: &RegionID, commodity_id: &CommodityID) -> StructuralError {
        StructuralError {
            message: format!(
                "No market registered for commodity {commodity_id} in region {region_id}"
            ),
        }
    }

    /// A reference to a commodity that was never defined
    pub fn unknown_commodity(commodity_id: &CommodityID) -> StructuralError {
        StructuralError {
            message: format!("Commodity {commodity_id} referenced but never defined"),
        }
    }

    /// A region defined more than once
    pub fn duplicate_region(region_id: &RegionID) -> StructuralError {
        StructuralError {
            message: format!("Region {region_id} defined more than once"),
        }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StructuralError {}

/// The collection of all markets across regions and periods
#[derive(Debug, Clone)]
pub struct Marketplace {
    markets: IndexMap<MarketKey, Market>,
    num_periods: usize,
    initial_price: f64,
}

impl Marketplace {
    /// Create an empty marketplace for a run with `num_periods` periods
    pub fn new(num_periods: usize, initial_price: f64) -> Self {
        Marketplace {
            markets: IndexMap::new(),
            num_periods,
            initial_price,
        }
    }

    /// Register the market for `(region_id, commodity_id)`.
    ///
    /// Registration happens only during setup. Registering the same key again is a no-op, so
    /// that every entity trading a commodity can declare the market it needs.
    pub fn register(&mut self, region_id: RegionID, commodity_id: CommodityID, kind: MarketKind) {
        let key = (region_id, commodity_id);
        if !self.markets.contains_key(&key) {
            let market = Market::new(
                key.0.clone(),
                key.1.clone(),
                kind,
                self.num_periods,
                self.initial_price,
            );
            self.markets.insert(key, market);
        }
    }

    /// The number of registered markets
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether no markets are registered
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Look up a market, failing with a [`StructuralError`] if the key was never registered
    pub fn market(&self, key: &MarketKey) -> Result<&Market, StructuralError> {
        self.markets
            .get(key)
            .ok_or_else(|| StructuralError::unknown_market(&key.0, &key.1))
    }

    fn market_mut(&mut self, key: &MarketKey) -> Result<&mut Market, StructuralError> {
        self.markets
            .get_mut(key)
            .ok_or_else(|| StructuralError::unknown_market(&key.0, &key.1))
    }

    /// Iterate over all markets in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&MarketKey, &Market)> {
        self.markets.iter()
    }

    /// Iterate mutably over all markets in registration order
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&MarketKey, &mut Market)> {
        self.markets.iter_mut()
    }

    /// Seed each market's trial price for `period` from the previous period's committed price
    /// (or leave the configured seed price for the first period) and clear solver bookkeeping.
    pub fn init_period(&mut self, period: usize) {
        for market in self.markets.values_mut() {
            market.init_period(period);
        }
    }

    /// Zero the accumulated supply and demand of every market for `period`.
    ///
    /// Called at the start of every solver iteration.
    pub fn reset_to_zero(&mut self, period: usize) {
        for market in self.markets.values_mut() {
            market.reset_to_zero(period);
        }
    }

    /// Accumulate supplied quantity into a market. The amount may be negative, representing
    /// net consumption.
    pub fn add_to_supply(
        &mut self,
        key: &MarketKey,
        period: usize,
        amount: f64,
    ) -> Result<(), StructuralError> {
        self.market_mut(key)?.add_to_supply(period, amount);
        Ok(())
    }

    /// Accumulate demanded quantity into a market. The amount may be negative, representing
    /// net production.
    pub fn add_to_demand(
        &mut self,
        key: &MarketKey,
        period: usize,
        amount: f64,
    ) -> Result<(), StructuralError> {
        self.market_mut(key)?.add_to_demand(period, amount);
        Ok(())
    }

    /// The current trial price of a market for `period`
    pub fn price(&self, key: &MarketKey, period: usize) -> Result<f64, StructuralError> {
        Ok(self.market(key)?.price(period))
    }

    /// Set the trial price of a market for `period`
    pub fn set_price(
        &mut self,
        key: &MarketKey,
        period: usize,
        price: f64,
    ) -> Result<(), StructuralError> {
        self.market_mut(key)?.set_price(period, price);
        Ok(())
    }

    /// The supply accumulated for a market in `period`
    pub fn supply(&self, key: &MarketKey, period: usize) -> Result<f64, StructuralError> {
        Ok(self.market(key)?.supply(period))
    }

    /// The demand accumulated for a market in `period`
    pub fn demand(&self, key: &MarketKey, period: usize) -> Result<f64, StructuralError> {
        Ok(self.market(key)?.demand(period))
    }

    /// Report, per market, whether supply and demand balance within `tolerance` for `period`
    pub fn check_clearance(&self, period: usize, tolerance: f64) -> Vec<(MarketKey, bool)> {
        self.markets
            .iter()
            .map(|(key, market)| (key.clone(), market.is_cleared(period, tolerance)))
            .collect()
    }

    /// Keys of solved-kind markets not yet cleared in `period`, in registration order
    pub fn unsolved_markets(&self, period: usize) -> Vec<MarketKey> {
        self.markets
            .iter()
            .filter(|(_, market)| market.kind == MarketKind::Solved && !market.is_solved(period))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// A read-only view of the prices visible to one region for one period
    pub fn region_prices<'a>(&'a self, region_id: &'a RegionID, period: usize) -> RegionPrices<'a> {
        RegionPrices {
            marketplace: self,
            region_id,
            period,
        }
    }

    /// Apply one bracket-and-bisect price update to a market and return the new trial price
    pub(crate) fn step_price(
        &mut self,
        key: &MarketKey,
        period: usize,
        settings: &SolverSettings,
    ) -> Result<f64, StructuralError> {
        Ok(self.market_mut(key)?.step_price(period, settings))
    }
}

/// The prices visible to one region's aggregation cascade for one period.
///
/// This is the only view of the marketplace the hierarchy sees during evaluation; quantities
/// are posted separately by [`crate::world::World`], so evaluation cannot mutate market state.
pub struct RegionPrices<'a> {
    marketplace: &'a Marketplace,
    region_id: &'a RegionID,
    period: usize,
}

impl RegionPrices<'_> {
    /// The current trial price of the given commodity in this region
    pub fn price(&self, commodity_id: &CommodityID) -> Result<f64, StructuralError> {
        let key = (self.region_id.clone(), commodity_id.clone());
        self.marketplace.price(&key, self.period)
    }
}
