use crate::{
    stat::Stat,
    util::random::BoundedDistribution,
    world::case::{AlertStatus, Case, CaseId, VirusStatus},
    world::event::{AlertEvent, CompletedContacts, Event},
    Error,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// One tracing trigger: fires when a reporting case's (alert status, virus
/// status) pair matches, and describes how its recent contacts are alerted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracingPolicyItem {
    pub reporter_alert_status: AlertStatus,
    pub reporter_virus_status: VirusStatus,
    /// How far back (in time steps) the completed-contact log is searched.
    pub recent_contacts_lookback: u32,
    /// Alert delay sampled once per trace link, cumulative across hops.
    pub delay_per_trace_link: BoundedDistribution,
    /// Percent chance (sampled per link) that the link is not followed.
    pub probability_skipping_trace_link: BoundedDistribution,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracingPolicy {
    pub description: String,
    /// Number of hops traced outward from the reporting case.
    pub max_levels: u32,
    pub items: Vec<TracingPolicyItem>,
}

/// Walks the historical contact graph outward from a reporting case and
/// emits alert events. Reads cases and the contact log by reference; the
/// loop applies whatever events come back.
pub struct AlertEngine {
    policy: TracingPolicy,
}

impl AlertEngine {
    pub fn new(policy: TracingPolicy) -> Self {
        Self { policy }
    }

    /// Scans policy items in order; the first whose reporter predicate
    /// matches fires. The reporter gets a REQUESTED_TEST (or ALERTED, when
    /// it was already in the testing pipeline) at `time + 1`, then its
    /// recent contacts are traced.
    pub fn check_for_alert<R: Rng>(
        &self,
        reporter: &Case,
        cases: &[Case],
        log: &CompletedContacts,
        time: u32,
        day: u32,
        rng: &mut R,
        stat: &mut Stat,
    ) -> Result<Vec<Event>, Error> {
        let Some(item) = self.policy.items.iter().find(|it| {
            it.reporter_alert_status == reporter.alert_status
                && it.reporter_virus_status == reporter.virus_status
        }) else {
            return Ok(Vec::new());
        };

        let next = if reporter.alert_status == AlertStatus::None {
            AlertStatus::RequestedTest
        } else {
            AlertStatus::Alerted
        };
        let mut events = vec![Event::Alert(AlertEvent {
            time: time + 1,
            id: reporter.id,
            old: reporter.alert_status,
            next,
        })];

        let start = time.saturating_sub(item.recent_contacts_lookback);
        let traced = self.trace_recent_contacts(
            log,
            cases,
            start,
            time,
            reporter.id,
            self.policy.max_levels,
            item,
            rng,
            stat,
            day,
        )?;
        debug!(reporter = %reporter.id, traced = traced.len(), "alert check fired");

        for (id, delay) in traced {
            let contact = &cases[id.idx()];
            events.push(Event::Alert(AlertEvent {
                time: time + delay,
                id,
                old: contact.alert_status,
                next: AlertStatus::Alerted,
            }));
        }
        Ok(events)
    }

    /// Breadth-first expansion over completed contacts in
    /// `[start_time, current_time]`, up to `max_levels` hops. Discovered ids
    /// union across levels; the origin is excluded at every level, as are
    /// already-alerted and dead cases. Per-level counts are recorded before
    /// the skip and app-ownership filters; only app owners can receive an
    /// alert.
    #[allow(clippy::too_many_arguments)]
    fn trace_recent_contacts<R: Rng>(
        &self,
        log: &CompletedContacts,
        cases: &[Case],
        start_time: u32,
        current_time: u32,
        origin: CaseId,
        max_levels: u32,
        item: &TracingPolicyItem,
        rng: &mut R,
        stat: &mut Stat,
        day: u32,
    ) -> Result<Vec<(CaseId, u32)>, Error> {
        let mut discovered: BTreeSet<CaseId> = BTreeSet::new();
        let mut alerts: Vec<(CaseId, u32)> = Vec::new();
        let mut frontier: Vec<(CaseId, u32)> = vec![(origin, 0)];

        for _ in 0..max_levels {
            let mut next_frontier: Vec<(CaseId, u32)> = Vec::new();
            for (person, base_delay) in frontier {
                for found in log.contacts_of(person, start_time, current_time) {
                    if found == origin || discovered.contains(&found) {
                        continue;
                    }
                    let case = &cases[found.idx()];
                    if case.alert_status == AlertStatus::Alerted
                        || case.virus_status == VirusStatus::Dead
                    {
                        continue;
                    }
                    discovered.insert(found);
                    let delay = base_delay + item.delay_per_trace_link.sample(rng)?;
                    next_frontier.push((found, delay));
                }
            }

            stat.record_contacts_traced(day, next_frontier.len() as u32);

            for &(id, delay) in &next_frontier {
                let skip = item.probability_skipping_trace_link.sample(rng)?;
                if rng.gen::<f64>() * 100.0 < f64::from(skip) {
                    continue;
                }
                if !cases[id.idx()].has_app {
                    continue;
                }
                alerts.push((id, delay));
            }

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }
        Ok(alerts)
    }
}
