use chrono::{DateTime, Datelike, Utc};
use configuration::{CalendarPeriod, RebalancePolicy};

/// Decides whether a rebalancing decision is due at a given step.
///
/// `is_due` is a pure function of the step index and the panel's timestamps, so the
/// schedule carries no mutable state. Step 0 is always due so the initial cash can be
/// deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceSchedule {
    EveryStep,
    FixedInterval(usize),
    /// First step of every calendar period.
    Calendar(CalendarPeriod),
    FirstStepOnly,
}

impl RebalanceSchedule {
    pub fn from_policy(policy: &RebalancePolicy) -> Self {
        match policy {
            RebalancePolicy::EveryStep => Self::EveryStep,
            RebalancePolicy::FixedInterval { every } => Self::FixedInterval(*every),
            RebalancePolicy::Calendar { period } => Self::Calendar(*period),
            RebalancePolicy::FirstStepOnly => Self::FirstStepOnly,
        }
    }

    pub fn is_due(&self, time_index: usize, index: &[DateTime<Utc>]) -> bool {
        if time_index == 0 {
            return true;
        }
        match self {
            Self::EveryStep => true,
            Self::FixedInterval(every) => *every > 0 && time_index % every == 0,
            Self::Calendar(period) => match (index.get(time_index - 1), index.get(time_index)) {
                (Some(previous), Some(current)) => period_key(*period, previous) != period_key(*period, current),
                _ => false,
            },
            Self::FirstStepOnly => false,
        }
    }
}

fn period_key(period: CalendarPeriod, timestamp: &DateTime<Utc>) -> (i32, u32) {
    match period {
        CalendarPeriod::Week => {
            let week = timestamp.iso_week();
            (week.year(), week.week())
        }
        CalendarPeriod::Month => (timestamp.year(), timestamp.month()),
        CalendarPeriod::Quarter => (timestamp.year(), timestamp.month0() / 3),
        CalendarPeriod::Year => (timestamp.year(), 0),
    }
}
