//! The simulation calendar: an immutable mapping between period indices and calendar years.
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// A discrete simulation time slice, identified by its index into the calendar.
///
/// Periods are totally ordered; period 0 is the first modelled year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period(pub usize);

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of periods modelled in a run and their calendar years.
///
/// Shared read-only by every other component; immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModelTimeRaw")]
pub struct ModelTime {
    years: Vec<u32>,
}

/// Raw form of [`ModelTime`] as it appears in input data
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ModelTimeRaw {
    years: Vec<u32>,
}

impl TryFrom<ModelTimeRaw> for ModelTime {
    type Error = anyhow::Error;

    fn try_from(raw: ModelTimeRaw) -> Result<Self> {
        ModelTime::new(raw.years)
    }
}

/// Check that the modelled years are valid
fn check_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "years is empty");
    ensure!(
        years.windows(2).all(|pair| pair[0] < pair[1]),
        "years must be composed of unique values in order"
    );

    Ok(())
}

impl ModelTime {
    /// Create a calendar from a list of calendar years.
    ///
    /// The years must be strictly increasing.
    pub fn new(years: Vec<u32>) -> Result<Self> {
        check_years(&years)?;
        Ok(ModelTime { years })
    }

    /// The number of periods in the run
    pub fn num_periods(&self) -> usize {
        self.years.len()
    }

    /// The calendar year for the given period.
    ///
    /// # Panics
    ///
    /// Panics if `period` is out of range. The period set is fixed at construction, so an
    /// out-of-range period is a programming error.
    pub fn year(&self, period: Period) -> u32 {
        self.years[period.0]
    }

    /// The period whose calendar year is `year`, if it is modelled
    pub fn period_for_year(&self, year: u32) -> Result<Period> {
        let index = self
            .years
            .binary_search(&year)
            .ok()
            .with_context(|| format!("Year {year} is not a modelled year"))?;
        Ok(Period(index))
    }

    /// The first modelled year
    pub fn base_year(&self) -> u32 {
        self.years[0]
    }

    /// Iterate over periods in increasing order, with their calendar years
    pub fn iter(&self) -> impl Iterator<Item = (Period, u32)> + '_ {
        self.years
            .iter()
            .enumerate()
            .map(|(index, year)| (Period(index), *year))
    }

    /// Iterate over periods in increasing order
    pub fn periods(&self) -> impl Iterator<Item = Period> + std::fmt::Debug {
        (0..self.years.len()).map(Period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_years() {
        assert!(check_years(&[]).is_err());
        assert!(check_years(&[1990]).is_ok());
        assert!(check_years(&[1990, 2005]).is_ok());
        assert!(check_years(&[1990, 1990]).is_err());
        assert!(check_years(&[2005, 1990]).is_err());
    }

    #[test]
    fn test_period_year_mapping() {
        let time = ModelTime::new(vec![1990, 2005, 2020]).unwrap();
        assert_eq!(time.num_periods(), 3);
        assert_eq!(time.year(Period(0)), 1990);
        assert_eq!(time.year(Period(2)), 2020);
        assert_eq!(time.period_for_year(2005).unwrap(), Period(1));
        assert!(time.period_for_year(2000).is_err());
        assert_eq!(time.base_year(), 1990);
    }

    #[test]
    fn test_iter_in_order() {
        let time = ModelTime::new(vec![1990, 2005]).unwrap();
        let pairs: Vec<_> = time.iter().collect();
        assert_eq!(pairs, vec![(Period(0), 1990), (Period(1), 2005)]);
    }

    #[test]
    fn test_deserialize_rejects_unordered_years() {
        let good: Result<ModelTime, _> = toml::from_str("years = [1990, 2005]");
        assert!(good.is_ok());
        let bad: Result<ModelTime, _> = toml::from_str("years = [2005, 1990]");
        assert!(bad.is_err());
    }
}
