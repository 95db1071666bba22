//! Combinatorial run planner.
//!
//! Enumerates the cross product of option indices over the exhaustive
//! questions, one full run per combination. How many options a question
//! really has is only known once a run has rendered it, so each level loops
//! until the question reports that its last rendered option was applied, or
//! until the declared option count is used up.

use tracing::{debug, info};

use super::types::HarnessResult;
use crate::runner::{Outcome, RunRecord};

/// Something that can execute runs with planned option indices
pub trait RunTarget {
    /// Plan option `index` for `question` in the next run and rearm its
    /// last-option signal
    fn prepare_option(&mut self, question: &str, index: usize) -> HarnessResult<()>;

    /// Execute one full run with the current plan
    fn execute_run(&mut self) -> HarnessResult<Outcome>;

    /// Whether the most recent run applied the question's last rendered option
    fn last_option_reached(&self, question: &str) -> HarnessResult<bool>;

    /// Option count declared in configuration
    fn declared_options(&self, question: &str) -> HarnessResult<usize>;
}

/// Whether a question's enumeration continues with `next_option`.
///
/// The live signal wins: a question that reported its last rendered option
/// stops even if more options were declared.
pub fn should_continue(last_option_reached: bool, next_option: usize, declared: usize) -> bool {
    !last_option_reached && next_option < declared
}

/// Upper bound on runs implied by declared option counts
pub fn declared_upper_bound(declared: &[usize]) -> usize {
    declared.iter().map(|&n| n.max(1)).product()
}

/// Every run the planner executed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanReport {
    /// Exhaustive questions in plan order
    pub questions: Vec<String>,
    pub records: Vec<RunRecord>,
}

impl PlanReport {
    pub fn runs(&self) -> usize {
        self.records.len()
    }
}

/// Recursive enumerator over an ordered list of exhaustive questions
#[derive(Debug, Clone)]
pub struct RunPlanner {
    questions: Vec<String>,
    records: Vec<RunRecord>,
}

impl RunPlanner {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            records: Vec::new(),
        }
    }

    /// Runs executed so far, including those before a failure
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Enumerate to exhaustion. With no exhaustive questions this is exactly one run.
    pub fn execute(&mut self, target: &mut dyn RunTarget) -> HarnessResult<PlanReport> {
        self.records.clear();
        info!(questions = self.questions.len(), "starting plan");
        let mut combination = Vec::with_capacity(self.questions.len());
        self.enumerate(target, 0, &mut combination)?;
        info!(runs = self.records.len(), "plan exhausted");
        Ok(PlanReport {
            questions: self.questions.clone(),
            records: self.records.clone(),
        })
    }

    fn enumerate(&mut self, target: &mut dyn RunTarget, level: usize, combination: &mut Vec<usize>) -> HarnessResult<()> {
        if level == self.questions.len() {
            let outcome = target.execute_run()?;
            let run = self.records.len() + 1;
            debug!(run, ?combination, %outcome, "run finished");
            self.records.push(RunRecord {
                run,
                combination: combination.clone(),
                outcome,
            });
            return Ok(());
        }

        let question = self.questions[level].clone();
        let declared = target.declared_options(&question)?;
        let mut option = 0;
        loop {
            target.prepare_option(&question, option)?;
            combination.push(option);
            self.enumerate(target, level + 1, combination)?;
            combination.pop();

            option += 1;
            if !should_continue(target.last_option_reached(&question)?, option, declared) {
                break;
            }
        }
        debug!(question = %question, options = option, "level exhausted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::types::HarnessError;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Questions with declared and live option counts; each run applies
    /// every question the way a page would
    struct FakeTarget {
        declared: HashMap<String, usize>,
        live: HashMap<String, usize>,
        planned: HashMap<String, usize>,
        last: HashMap<String, bool>,
        order: Vec<String>,
        runs: Vec<Vec<usize>>,
        fail_on_run: Option<usize>,
    }

    impl FakeTarget {
        fn new(questions: &[(&str, usize, usize)]) -> Self {
            Self {
                declared: questions.iter().map(|(q, d, _)| (q.to_string(), *d)).collect(),
                live: questions.iter().map(|(q, _, l)| (q.to_string(), *l)).collect(),
                planned: HashMap::new(),
                last: HashMap::new(),
                order: questions.iter().map(|(q, _, _)| q.to_string()).collect(),
                runs: Vec::new(),
                fail_on_run: None,
            }
        }

        fn names(&self) -> Vec<String> {
            self.order.clone()
        }
    }

    impl RunTarget for FakeTarget {
        fn prepare_option(&mut self, question: &str, index: usize) -> HarnessResult<()> {
            self.planned.insert(question.to_string(), index);
            self.last.insert(question.to_string(), true);
            Ok(())
        }

        fn execute_run(&mut self) -> HarnessResult<Outcome> {
            if self.fail_on_run == Some(self.runs.len() + 1) {
                return Err(HarnessError::StepLimit(1));
            }
            let mut tuple = Vec::new();
            for q in &self.order {
                let index = self.planned.get(q).copied().unwrap_or(0);
                let live = self.live[q];
                if index >= live {
                    return Err(HarnessError::OptionOutOfRange {
                        question: q.clone(),
                        index,
                        available: live,
                    });
                }
                self.last.insert(q.clone(), index + 1 == live);
                tuple.push(index);
            }
            self.runs.push(tuple);
            Ok(if self.runs.len() % 2 == 1 { Outcome::Success } else { Outcome::Failure })
        }

        fn last_option_reached(&self, question: &str) -> HarnessResult<bool> {
            Ok(self.last.get(question).copied().unwrap_or(true))
        }

        fn declared_options(&self, question: &str) -> HarnessResult<usize> {
            self.declared
                .get(question)
                .copied()
                .ok_or_else(|| HarnessError::UnknownQuestion(question.to_string()))
        }
    }

    #[test]
    fn test_should_continue() {
        assert!(should_continue(false, 1, 3));
        assert!(!should_continue(true, 1, 3));
        assert!(!should_continue(false, 3, 3));
        assert!(!should_continue(false, 1, 0));
    }

    #[test]
    fn test_full_cross_product() {
        let mut target = FakeTarget::new(&[("A", 2, 2), ("B", 3, 3), ("C", 2, 2)]);
        let mut planner = RunPlanner::new(target.names());
        let report = planner.execute(&mut target).unwrap();

        assert_eq!(report.runs(), 12);
        let mut expected = Vec::new();
        for a in 0..2 {
            for b in 0..3 {
                for c in 0..2 {
                    expected.push(vec![a, b, c]);
                }
            }
        }
        assert_eq!(target.runs, expected);
        let combos: Vec<Vec<usize>> = report.records.iter().map(|r| r.combination.clone()).collect();
        assert_eq!(combos, expected);
        assert_eq!(report.records[11].run, 12);
    }

    #[test]
    fn test_live_count_below_declared_stops_early() {
        let mut target = FakeTarget::new(&[("A", 5, 3)]);
        let mut planner = RunPlanner::new(target.names());
        let report = planner.execute(&mut target).unwrap();
        assert_eq!(report.runs(), 3);
        assert_eq!(target.runs, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_declared_count_caps_enumeration() {
        let mut target = FakeTarget::new(&[("A", 2, 4), ("B", 2, 2)]);
        let mut planner = RunPlanner::new(target.names());
        assert_eq!(planner.execute(&mut target).unwrap().runs(), 4);
    }

    #[test]
    fn test_inner_drift_does_not_disturb_outer_level() {
        let mut target = FakeTarget::new(&[("A", 3, 3), ("B", 4, 2)]);
        let mut planner = RunPlanner::new(target.names());
        let report = planner.execute(&mut target).unwrap();
        assert_eq!(report.runs(), 6);
    }

    #[test]
    fn test_no_exhaustive_questions_runs_once() {
        let mut target = FakeTarget::new(&[]);
        let mut planner = RunPlanner::new(Vec::new());
        let report = planner.execute(&mut target).unwrap();
        assert_eq!(report.runs(), 1);
        assert!(report.records[0].combination.is_empty());
    }

    #[test]
    fn test_failure_keeps_completed_records() {
        let mut target = FakeTarget::new(&[("A", 3, 3)]);
        target.fail_on_run = Some(3);
        let mut planner = RunPlanner::new(target.names());
        assert!(planner.execute(&mut target).is_err());
        assert_eq!(planner.records().len(), 2);
        assert_eq!(planner.records()[1].outcome, Outcome::Failure);
    }

    #[test]
    fn test_declared_upper_bound() {
        assert_eq!(declared_upper_bound(&[2, 4, 3]), 24);
        assert_eq!(declared_upper_bound(&[]), 1);
        assert_eq!(declared_upper_bound(&[0, 2]), 2);
    }
}
