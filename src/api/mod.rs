//! Session API: localization runs, scenario output and reports

pub mod scenario;
pub mod session;
pub mod statistics;

pub use scenario::{render_scenario, topology_prelude, write_scenario};
pub use session::{Localizer, SessionOutcome, TopologyAnalysis};
pub use statistics::{NodeReport, NodeStatus, RunningStats, SessionReport, StatusCounts};
