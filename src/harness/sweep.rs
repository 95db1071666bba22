use chrono::Utc;
use tracing::{error, info};

use super::driver::FlowDriver;
use super::planner::RunPlanner;
use crate::browser::Browser;
use crate::runner::SweepReport;

/// Plan every combination of the exhaustive questions and run it.
///
/// Outcomes are written into the driver's table whether or not the sweep
/// completes; on a fatal error the report carries the message and every run
/// that finished before it.
pub fn run_sweep<B: Browser>(driver: &mut FlowDriver<B>) -> SweepReport {
    let started = Utc::now();
    let exhaustive = driver.registry().exhaustive();
    let mut planner = RunPlanner::new(exhaustive.clone());

    let result = planner.execute(driver);
    let written = driver.record_results();

    let error = match result {
        Ok(report) => {
            info!(runs = report.runs(), outcomes = written, "sweep complete");
            None
        }
        Err(e) => {
            error!(runs = planner.records().len(), error = %e, "sweep aborted");
            Some(e.to_string())
        }
    };

    SweepReport {
        completed: error.is_none(),
        error,
        exhaustive,
        runs: planner.records().to_vec(),
        started,
        finished: Utc::now(),
    }
}
