//! Domain types: bars, macro observations, phases, quarters, series.

pub mod bar;
pub mod macro_obs;
pub mod phase;
pub mod quarter;
pub mod series;

pub use bar::PriceBar;
pub use macro_obs::{derive_growth_rates, MacroObservation, PhasedObservation};
pub use phase::Phase;
pub use quarter::{quarter_end, Quarter};
pub use series::{Observation, TimeSeries};
