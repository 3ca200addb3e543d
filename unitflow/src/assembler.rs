//! Result assembly.
//!
//! Processed units arrive in completion order. The assembler keeps them as
//! they come and sorts by unit index only when asked for a view, so the
//! merged output is ascending by index whatever order the workers finished in.

use crate::job::{ProcessedUnit, UnitOutcome};

/// Collects processed units for one job.
#[derive(Debug, Clone, Default)]
pub struct ResultAssembler {
    /// Units in the order they completed
    units: Vec<ProcessedUnit>,
    degraded: usize,
    cancelled: usize,
}

impl ResultAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty assembler sized for `capacity` units.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Records one processed unit.
    pub fn record(&mut self, unit: ProcessedUnit) {
        match unit.outcome {
            UnitOutcome::Degraded { .. } => self.degraded += 1,
            UnitOutcome::Cancelled => self.cancelled += 1,
            _ => {}
        }
        self.units.push(unit);
    }

    /// Number of units recorded so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[inline]
    pub fn degraded_count(&self) -> usize {
        self.degraded
    }

    #[inline]
    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }

    /// Returns the units recorded so far, sorted by index.
    pub fn snapshot(&self) -> AssembledResult {
        AssembledResult::from_units(self.units.clone())
    }

    /// Consumes the assembler and returns the sorted result.
    pub fn finish(self) -> AssembledResult {
        AssembledResult::from_units(self.units)
    }
}

/// Units sorted ascending by index, plus aggregate flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledResult {
    /// Processed units, ascending by index
    pub units: Vec<ProcessedUnit>,
    /// True if any unit fell back to its original content
    pub degraded: bool,
    /// True if any unit was cancelled
    pub cancelled: bool,
}

impl AssembledResult {
    fn from_units(mut units: Vec<ProcessedUnit>) -> Self {
        units.sort_by_key(|u| u.index);
        let degraded = units.iter().any(|u| u.outcome.is_degraded());
        let cancelled = units.iter().any(|u| u.outcome.is_cancelled());
        Self {
            units,
            degraded,
            cancelled,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the number of units that succeeded (first try or after retry).
    pub fn success_count(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_success()).count()
    }

    pub fn degraded_count(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_degraded()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_cancelled()).count()
    }

    /// Returns true if every unit succeeded.
    pub fn is_complete_success(&self) -> bool {
        !self.degraded && !self.cancelled
    }

    /// Joins the unit contents in index order.
    pub fn merged(&self, separator: &str) -> String {
        let mut out = String::with_capacity(
            self.units.iter().map(|u| u.content.len() + separator.len()).sum(),
        );
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_str(&unit.content);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Unit;

    fn ok(index: u64, content: &str) -> ProcessedUnit {
        ProcessedUnit {
            index,
            content: content.to_string(),
            outcome: UnitOutcome::Succeeded,
        }
    }

    #[test]
    fn test_sorted_regardless_of_completion_order() {
        let mut assembler = ResultAssembler::new();
        for index in [3, 0, 4, 1, 2] {
            assembler.record(ok(index, &index.to_string()));
        }

        let result = assembler.finish();
        let indices: Vec<u64> = result.units.iter().map(|u| u.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(result.merged(","), "0,1,2,3,4");
        assert!(result.is_complete_success());
    }

    #[test]
    fn test_flags_track_degraded_and_cancelled() {
        let mut assembler = ResultAssembler::with_capacity(3);
        assembler.record(ok(0, "a"));
        assembler.record(ProcessedUnit::degraded(Unit::new(1, "b"), 3, "503"));
        assembler.record(ProcessedUnit::cancelled(Unit::new(2, "c")));

        assert_eq!(assembler.degraded_count(), 1);
        assert_eq!(assembler.cancelled_count(), 1);

        let result = assembler.finish();
        assert!(result.degraded);
        assert!(result.cancelled);
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.merged(""), "abc");
    }

    #[test]
    fn test_snapshot_leaves_assembler_usable() {
        let mut assembler = ResultAssembler::new();
        assembler.record(ok(1, "b"));

        let partial = assembler.snapshot();
        assert_eq!(partial.len(), 1);

        assembler.record(ok(0, "a"));
        assert_eq!(assembler.finish().merged("\n\n"), "a\n\nb");
    }

    #[test]
    fn test_empty_merge() {
        let result = ResultAssembler::new().finish();
        assert!(result.is_empty());
        assert_eq!(result.merged("\n\n"), "");
    }
}
