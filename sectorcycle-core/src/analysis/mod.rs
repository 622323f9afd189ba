//! Analytics over cached series: phases, returns, per-phase performance,
//! recommendation and correlation. Everything here is pure.

pub mod correlation;
pub mod performance;
pub mod phase;
pub mod recommend;
pub mod returns;

pub use correlation::{correlation_matrix, CorrelationMatrix};
pub use performance::{analyze, phase_by_quarter, PerformanceSummary, PhaseStats, SectorPerformance};
pub use phase::{classify, last_two_growth, phase_for_pair};
pub use recommend::{current_phase, qualifies, recommend, Recommendation, RecommendError, SectorScore};
pub use returns::{daily_returns, momentum, quarterly_returns, QuarterlyReturn};
