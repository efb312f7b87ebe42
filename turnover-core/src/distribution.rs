//! Fair distribution: greedy load balancing of cleaners over open tasks.
//!
//! Algorithm (deterministic for a given input snapshot):
//! 1) seed per-cleaner load from tasks already assigned inside the period,
//!    counting active roster cleaners only
//! 2) walk unassigned tasks in the period by (current date, id)
//! 3) candidates = active cleaners who declared that date available
//! 4) pick the smallest load; ties go to the earlier cleaner in roster order
//! 5) no candidate -> the task is skipped, not an error
//!
//! This is an online heuristic, not an optimal min-max assignment. The
//! plan is pure; persisting it is the caller's business.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;
use crate::cleaner::{Availability, Cleaner};
use crate::task::CleaningTask;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAssignment {
    pub task_id: String,
    pub booking_id: String,
    pub date: NaiveDate,
    pub cleaner_id: String,
    pub cleaner_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoCleanerAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTask {
    pub task_id: String,
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPlan {
    pub assignments: Vec<PlannedAssignment>,
    pub skipped: Vec<SkippedTask>,
    pub load_before: BTreeMap<String, usize>,
    pub load_after: BTreeMap<String, usize>,
}

impl DistributionPlan {
    /// Max minus min load over cleaners carrying at least one task.
    pub fn spread(load: &BTreeMap<String, usize>) -> usize {
        let busy = load.values().copied().filter(|n| *n > 0);
        let (min, max) = busy.fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
        max.saturating_sub(if min == usize::MAX { 0 } else { min })
    }

    pub fn summary(&self) -> String {
        format!(
            "fair-distribution: assigned {} tasks, skipped {} (spread {} -> {})",
            self.assignments.len(),
            self.skipped.len(),
            Self::spread(&self.load_before),
            Self::spread(&self.load_after),
        )
    }
}

pub fn plan_fair_distribution(
    tasks: &[CleaningTask],
    cleaners: &[Cleaner],
    availability: &[Availability],
    period: DateRange,
) -> DistributionPlan {
    let mut declared: HashMap<&str, BTreeSet<NaiveDate>> = HashMap::new();
    for a in availability {
        declared
            .entry(a.cleaner_id.as_str())
            .or_default()
            .extend(a.available_dates.iter().copied());
    }

    // Roster order is the tie-breaker; drop inactive and repeated entries.
    let mut seen = HashSet::new();
    let roster: Vec<&Cleaner> = cleaners
        .iter()
        .filter(|c| c.is_active)
        .filter(|c| seen.insert(c.id.as_str()))
        .collect();

    let in_period: Vec<&CleaningTask> = tasks
        .iter()
        .filter(|t| period.contains(t.current_cleaning_date))
        .collect();

    // Only roster cleaners carry load; work held by someone inactive or
    // unknown is neither theirs to balance nor anyone else's.
    let mut load: BTreeMap<String, usize> = roster.iter().map(|c| (c.id.clone(), 0)).collect();
    for t in &in_period {
        if let Some(n) = t.cleaner_id.as_ref().and_then(|id| load.get_mut(id)) {
            *n += 1;
        }
    }
    let load_before = load.clone();

    let mut open: Vec<&CleaningTask> = in_period.into_iter().filter(|t| !t.is_assigned()).collect();
    open.sort_by(|a, b| {
        a.current_cleaning_date
            .cmp(&b.current_cleaning_date)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut plan = DistributionPlan::default();

    for task in open {
        let date = task.current_cleaning_date;
        let chosen = roster
            .iter()
            .filter(|c| {
                declared
                    .get(c.id.as_str())
                    .is_some_and(|dates| dates.contains(&date))
            })
            .min_by_key(|c| load.get(&c.id).copied().unwrap_or(0));

        let Some(cleaner) = chosen else {
            plan.skipped.push(SkippedTask {
                task_id: task.id.clone(),
                date,
                reason: SkipReason::NoCleanerAvailable,
            });
            continue;
        };

        *load.entry(cleaner.id.clone()).or_default() += 1;
        plan.assignments.push(PlannedAssignment {
            task_id: task.id.clone(),
            booking_id: task.booking_id.clone(),
            date,
            cleaner_id: cleaner.id.clone(),
            cleaner_name: cleaner.name.clone(),
        });
    }

    plan.load_before = load_before;
    plan.load_after = load;
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Month;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn august() -> DateRange {
        "2025-08".parse::<Month>().unwrap().range()
    }

    fn task(checkout: &str, booking: &str) -> CleaningTask {
        CleaningTask::skeleton(d(checkout), booking, booking.to_uppercase())
    }

    fn avail(cleaner: &str, dates: &[&str]) -> Availability {
        Availability::new(
            cleaner,
            "2025-08".parse().unwrap(),
            dates.iter().map(|s| d(s)),
        )
        .unwrap()
    }

    #[test]
    fn picks_least_loaded_available_cleaner() {
        let mut bobs = task("2025-08-03", "old");
        bobs.assign("bob", "Bob");
        let open = task("2025-08-10", "x");

        let cleaners = vec![Cleaner::new("bob", "Bob"), Cleaner::new("alice", "Alice")];
        let availability = vec![avail("alice", &["2025-08-10"]), avail("bob", &["2025-08-10"])];

        let plan = plan_fair_distribution(&[bobs, open], &cleaners, &availability, august());
        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].cleaner_id, "alice");
        assert_eq!(plan.load_before.get("bob"), Some(&1));
        assert_eq!(plan.load_after.get("alice"), Some(&1));
    }

    #[test]
    fn ties_follow_roster_order() {
        let cleaners = vec![Cleaner::new("c2", "Chika"), Cleaner::new("c1", "Aoi")];
        let availability = vec![avail("c1", &["2025-08-05"]), avail("c2", &["2025-08-05"])];

        let plan = plan_fair_distribution(&[task("2025-08-05", "x")], &cleaners, &availability, august());
        assert_eq!(plan.assignments[0].cleaner_id, "c2");
    }

    #[test]
    fn spreads_tasks_evenly_over_shared_dates() {
        let tasks: Vec<_> = (1..=6)
            .map(|i| task(&format!("2025-08-{:02}", i), &format!("b{i}")))
            .collect();
        let dates: Vec<String> = (1..=6).map(|i| format!("2025-08-{:02}", i)).collect();
        let date_refs: Vec<&str> = dates.iter().map(String::as_str).collect();
        let cleaners = vec![
            Cleaner::new("a", "A"),
            Cleaner::new("b", "B"),
            Cleaner::new("c", "C"),
        ];
        let availability = vec![
            avail("a", &date_refs),
            avail("b", &date_refs),
            avail("c", &date_refs),
        ];

        let plan = plan_fair_distribution(&tasks, &cleaners, &availability, august());
        assert_eq!(plan.assignments.len(), 6);
        assert!(plan.load_after.values().all(|n| *n == 2));
        assert_eq!(DistributionPlan::spread(&plan.load_after), 0);
    }

    #[test]
    fn skips_tasks_nobody_can_take_and_ignores_inactive_cleaners() {
        let cleaners = vec![Cleaner::new("a", "A").inactive(), Cleaner::new("b", "B")];
        let availability = vec![avail("a", &["2025-08-07"]), avail("b", &["2025-08-08"])];
        let tasks = vec![task("2025-08-07", "x"), task("2025-08-08", "y")];

        let plan = plan_fair_distribution(&tasks, &cleaners, &availability, august());
        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].task_id, "2025-08-08_y");
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::NoCleanerAvailable);
    }

    #[test]
    fn load_ignores_assignments_held_outside_the_active_roster() {
        let mut gone = task("2025-08-02", "g");
        gone.assign("retired", "R");
        let mut ghost = task("2025-08-03", "h");
        ghost.assign("nobody", "N");
        let mut mine = task("2025-08-04", "m");
        mine.assign("a", "A");
        let cleaners = vec![Cleaner::new("a", "A"), Cleaner::new("retired", "R").inactive()];
        let availability = vec![avail("a", &["2025-08-09"])];

        let plan = plan_fair_distribution(
            &[gone, ghost, mine, task("2025-08-09", "o")],
            &cleaners,
            &availability,
            august(),
        );
        assert_eq!(plan.load_before, BTreeMap::from([("a".to_string(), 1)]));
        assert_eq!(plan.load_after, BTreeMap::from([("a".to_string(), 2)]));
    }

    #[test]
    fn only_touches_open_tasks_inside_the_period() {
        let mut assigned = task("2025-08-12", "done");
        assigned.assign("a", "A");
        let outside = task("2025-09-01", "later");
        let cleaners = vec![Cleaner::new("a", "A")];
        let availability = vec![avail("a", &["2025-08-12"])];

        let plan = plan_fair_distribution(&[assigned, outside], &cleaners, &availability, august());
        assert!(plan.assignments.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn uses_current_date_not_anchor() {
        let mut moved = task("2025-08-10", "x");
        moved.schedule_on(d("2025-08-11"));
        let cleaners = vec![Cleaner::new("a", "A"), Cleaner::new("b", "B")];
        let availability = vec![avail("a", &["2025-08-10"]), avail("b", &["2025-08-11"])];

        let plan = plan_fair_distribution(&[moved], &cleaners, &availability, august());
        assert_eq!(plan.assignments[0].cleaner_id, "b");
        assert_eq!(plan.assignments[0].date, d("2025-08-11"));
    }

    #[test]
    fn spread_does_not_grow_when_balancing_a_skewed_roster() {
        let mut seeded = Vec::new();
        for i in 1..=3 {
            let mut t = task(&format!("2025-08-0{i}"), &format!("s{i}"));
            t.assign("a", "A");
            seeded.push(t);
        }
        let mut b_task = task("2025-08-04", "s4");
        b_task.assign("b", "B");
        seeded.push(b_task);
        seeded.push(task("2025-08-20", "o1"));
        seeded.push(task("2025-08-21", "o2"));

        let cleaners = vec![Cleaner::new("a", "A"), Cleaner::new("b", "B")];
        let days = ["2025-08-20", "2025-08-21"];
        let availability = vec![avail("a", &days), avail("b", &days)];

        let plan = plan_fair_distribution(&seeded, &cleaners, &availability, august());
        assert!(DistributionPlan::spread(&plan.load_after) <= DistributionPlan::spread(&plan.load_before));
        assert_eq!(plan.load_after.get("b"), Some(&3));
    }
}
