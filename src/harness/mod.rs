pub mod driver;
pub mod planner;
pub mod sweep;
pub mod types;

pub use driver::{FlowDriver, RunState};
pub use planner::{PlanReport, RunPlanner, RunTarget, declared_upper_bound, should_continue};
pub use sweep::run_sweep;
pub use types::{DriverSettings, HarnessError, HarnessResult, Selectors, WaitPolicy};
