use crate::{
    stat::Stat,
    util::random::BoundedDistribution,
    world::case::{AlertStatus, Case, CaseId, VirusStatus},
    Error,
};

use math::{Percentage, Proportion};
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One isolation rule. Probability and duration values are sampled in
/// percent / time steps respectively; a missing duration means the case
/// isolates until the policy context changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsolationProperty {
    pub id: String,
    pub priority: i32,
    pub isolation_probability: BoundedDistribution,
    pub isolation_duration: Option<BoundedDistribution>,
}

impl IsolationProperty {
    fn outcome(&self) -> (&BoundedDistribution, Option<&BoundedDistribution>) {
        (
            &self.isolation_probability,
            self.isolation_duration.as_ref(),
        )
    }

    fn time_bounded(&self) -> bool {
        self.isolation_duration.is_some()
    }
}

/// Infected-proportion bucket `[min, max)`, keyed in percent while the
/// observed proportion is fractional. The `*100` rescale is deliberate and
/// pinned by tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProportionBucket {
    pub min: Percentage,
    pub max: Percentage,
}

impl ProportionBucket {
    pub fn contains(&self, infected: Proportion) -> bool {
        let p = infected.as_percentage();
        self.min <= p && p < self.max
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalIsolationRule {
    pub bucket: ProportionBucket,
    pub property: IsolationProperty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirusStatusRule {
    pub status: VirusStatus,
    pub property: IsolationProperty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertStatusRule {
    pub status: AlertStatus,
    pub property: IsolationProperty,
}

/// The full isolation rule set: proportion-bucketed global rules, status
/// rules, exactly one default, and the global probability threshold
/// distribution every draw is compared against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsolationProperties {
    pub global: Vec<GlobalIsolationRule>,
    pub virus_status: Vec<VirusStatusRule>,
    pub alert_status: Vec<AlertStatusRule>,
    pub default_policy: IsolationProperty,
    pub threshold: BoundedDistribution,
}

#[derive(Clone, Debug)]
struct IsolationRecord {
    policy_id: String,
    start_time: u32,
    max_duration: Option<u32>,
}

/// Resolves which isolation rule applies to a case and whether the case
/// isolates, tracking active isolation windows so a case does not re-roll
/// isolation every tick.
pub struct IsolationPolicyEngine {
    properties: IsolationProperties,
    records: FxHashMap<CaseId, IsolationRecord>,
}

impl IsolationPolicyEngine {
    pub fn new(properties: IsolationProperties) -> Self {
        Self {
            properties,
            records: FxHashMap::default(),
        }
    }

    /// Candidates from all four tiers, reduced to the highest priority
    /// present. Policies sharing that priority must agree on outcome;
    /// priorities that leave the outcome ambiguous are a configuration
    /// error, not something re-sampling can fix.
    fn resolve(&self, case: &Case, infected: Proportion) -> Result<&IsolationProperty, Error> {
        let mut candidates: Vec<&IsolationProperty> = Vec::new();
        for rule in &self.properties.global {
            if rule.bucket.contains(infected) {
                candidates.push(&rule.property);
            }
        }
        for rule in &self.properties.virus_status {
            if rule.status == case.virus_status {
                candidates.push(&rule.property);
            }
        }
        for rule in &self.properties.alert_status {
            if rule.status == case.alert_status {
                candidates.push(&rule.property);
            }
        }
        candidates.push(&self.properties.default_policy);

        let top = candidates.iter().map(|p| p.priority).max().unwrap_or(0);
        let mut group = candidates.into_iter().filter(|p| p.priority == top);
        let first = group.next().unwrap();
        for other in group {
            if other.outcome() != first.outcome() {
                return Err(Error::AmbiguousPolicy {
                    priority: top,
                    first: first.id.clone(),
                    second: other.id.clone(),
                });
            }
        }
        Ok(first)
    }

    /// Whether `case` is isolated at `time` given the population-wide
    /// infected proportion.
    pub fn is_isolated<R: Rng>(
        &mut self,
        case: &Case,
        infected: Proportion,
        time: u32,
        rng: &mut R,
        stat: &mut Stat,
    ) -> Result<bool, Error> {
        let policy = self.resolve(case, infected)?.clone();

        if let Some(record) = self.records.get(&case.id) {
            let active = record.policy_id == policy.id
                && match record.max_duration {
                    None => true,
                    Some(d) => time.saturating_sub(record.start_time) < d,
                };
            if active {
                // Active window for this exact policy: no new draw.
                return Ok(true);
            }
        }
        // Window expired or the policy context changed: book the served
        // days and clear the record before a fresh draw.
        if let Some(record) = self.records.remove(&case.id) {
            Self::close_record(case.id, &record, time, stat);
        }

        let threshold = self.properties.threshold.sample(rng)?;
        let required = policy.isolation_probability.sample(rng)?;
        let compliant = rng.gen::<f64>() < case.compliance.r();
        let isolating = threshold < required && compliant;
        let duration = match &policy.isolation_duration {
            Some(d) => Some(d.sample(rng)?),
            None => None,
        };

        // Only time-bounded policies and the default persist a window;
        // anything else is re-evaluated on every call.
        let is_default = policy.id == self.properties.default_policy.id;
        if isolating && (policy.time_bounded() || is_default) {
            self.records.insert(
                case.id,
                IsolationRecord {
                    policy_id: policy.id,
                    start_time: time,
                    max_duration: duration,
                },
            );
        }
        Ok(isolating)
    }

    /// Closes every open isolation window at `time`, booking the days each
    /// case actually served. Called once when the run ends.
    pub fn finalize(&mut self, time: u32, stat: &mut Stat) {
        for (id, record) in self.records.drain() {
            Self::close_record(id, &record, time, stat);
        }
    }

    fn close_record(id: CaseId, record: &IsolationRecord, time: u32, stat: &mut Stat) {
        let elapsed = time.saturating_sub(record.start_time);
        let served = match record.max_duration {
            Some(d) => elapsed.min(d),
            None => elapsed,
        };
        stat.record_days_in_isolation(id, served);
    }

    /// Pairwise contact rule: a contact is suppressed iff either case is
    /// individually isolated and the contact is weak (weight below the
    /// disease's exposure threshold). Strong contacts always happen.
    pub fn is_contact_isolated<R: Rng>(
        &mut self,
        a: &Case,
        b: &Case,
        weight: f64,
        exposure_threshold: f64,
        infected: Proportion,
        time: u32,
        rng: &mut R,
        stat: &mut Stat,
    ) -> Result<bool, Error> {
        if weight >= exposure_threshold {
            return Ok(false);
        }
        if self.is_isolated(a, infected, time, rng, stat)? {
            return Ok(true);
        }
        self.is_isolated(b, infected, time, rng, stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::case::Gender;
    use rand::{rngs::StdRng, SeedableRng};

    fn case(id: u32) -> Case {
        Case::new(
            CaseId(id),
            35,
            Gender::Male,
            Proportion::new(1.0),
            Proportion::new(0.5),
            true,
        )
    }

    // Always samples 0: `threshold < required` can never reject by chance.
    fn always_zero() -> BoundedDistribution {
        BoundedDistribution::flat(0.0, 1.0, 0)
    }

    // Always samples a value >= 10.
    fn always_high() -> BoundedDistribution {
        BoundedDistribution::flat(10.0, 20.0, 100)
    }

    fn property(id: &str, priority: i32, duration: Option<BoundedDistribution>) -> IsolationProperty {
        IsolationProperty {
            id: id.into(),
            priority,
            isolation_probability: always_high(),
            isolation_duration: duration,
        }
    }

    fn properties(default_policy: IsolationProperty) -> IsolationProperties {
        IsolationProperties {
            global: Vec::new(),
            virus_status: Vec::new(),
            alert_status: Vec::new(),
            default_policy,
            threshold: always_zero(),
        }
    }

    #[test]
    fn bucket_matching_is_percent_based() {
        let bucket = ProportionBucket {
            min: Percentage::new(10.0),
            max: Percentage::new(20.0),
        };
        assert!(bucket.contains(Proportion::new(0.10)));
        assert!(bucket.contains(Proportion::new(0.199)));
        assert!(!bucket.contains(Proportion::new(0.20)));
        assert!(!bucket.contains(Proportion::new(0.0999)));
    }

    #[test]
    fn default_policy_isolates_compliant_case() {
        let mut engine = IsolationPolicyEngine::new(properties(property("default", 0, None)));
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();
        let c = case(1);
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());
        // unbounded default: record keeps the case isolated without re-rolls
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 50, &mut rng, &mut stat)
            .unwrap());
        engine.finalize(100, &mut stat);
        assert_eq!(stat.total_isolation_steps(), 100);
    }

    #[test]
    fn zero_probability_policy_never_isolates() {
        let mut props = properties(property("default", 0, None));
        props.default_policy.isolation_probability = always_zero();
        let mut engine = IsolationPolicyEngine::new(props);
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();
        let c = case(1);
        for t in 0..5 {
            assert!(!engine
                .is_isolated(&c, Proportion::new(0.0), t, &mut rng, &mut stat)
                .unwrap());
        }
        assert_eq!(stat.total_isolation_steps(), 0);
    }

    #[test]
    fn non_compliant_case_never_isolates() {
        let mut engine = IsolationPolicyEngine::new(properties(property("default", 0, None)));
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();
        let mut c = case(1);
        c.compliance = Proportion::new(0.0);
        assert!(!engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());
    }

    #[test]
    fn expired_window_is_cleared_and_case_can_reisolate() {
        // duration always samples 5
        let duration = BoundedDistribution::flat(5.0, 6.0, 10);
        let mut engine =
            IsolationPolicyEngine::new(properties(property("default", 0, Some(duration))));
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();
        let c = case(1);

        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());
        for t in 1..5 {
            assert!(engine
                .is_isolated(&c, Proportion::new(0.0), t, &mut rng, &mut stat)
                .unwrap());
        }
        // window over: the stale record is dropped and a fresh draw under
        // the always-isolate policy opens a new window
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 5, &mut rng, &mut stat)
            .unwrap());
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 50, &mut rng, &mut stat)
            .unwrap());
        engine.finalize(60, &mut stat);
        // three windows: [0,5), [5,10), and 5 served of the one opened at 50
        assert_eq!(stat.total_isolation_steps(), 15);
    }

    #[test]
    fn policy_change_books_only_served_days() {
        let mut props = properties(property("default", 0, None));
        let mut no_isolation = property("symptomatic-exempt", 10, None);
        no_isolation.isolation_probability = always_zero();
        props.virus_status.push(VirusStatusRule {
            status: VirusStatus::Symptomatic,
            property: no_isolation,
        });
        let mut engine = IsolationPolicyEngine::new(props);
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();

        let c = case(1);
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());

        // symptom onset resolves a different policy; the open default
        // window closes after 10 served days
        let mut c = c;
        c.virus_status = VirusStatus::Symptomatic;
        assert!(!engine
            .is_isolated(&c, Proportion::new(0.0), 10, &mut rng, &mut stat)
            .unwrap());
        assert_eq!(stat.total_isolation_steps(), 10);
    }

    #[test]
    fn higher_priority_rule_wins_over_default() {
        let mut props = properties(property("default", 0, None));
        props.default_policy.isolation_probability = always_zero();
        props.virus_status.push(VirusStatusRule {
            status: VirusStatus::Symptomatic,
            property: property("symptomatic-stay-home", 10, None),
        });
        let mut engine = IsolationPolicyEngine::new(props);
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();

        let mut c = case(1);
        c.virus_status = VirusStatus::Symptomatic;
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());

        let healthy = case(2);
        assert!(!engine
            .is_isolated(&healthy, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap());
    }

    #[test]
    fn same_priority_conflicting_outcomes_is_fatal() {
        let mut props = properties(property("default", 0, None));
        props.virus_status.push(VirusStatusRule {
            status: VirusStatus::Symptomatic,
            property: property("a", 5, None),
        });
        props.alert_status.push(AlertStatusRule {
            status: AlertStatus::None,
            property: property("b", 5, Some(always_high())),
        });
        let mut engine = IsolationPolicyEngine::new(props);
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();

        let mut c = case(1);
        c.virus_status = VirusStatus::Symptomatic;
        let err = engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousPolicy { priority: 5, .. }));
    }

    #[test]
    fn same_priority_identical_outcomes_is_fine() {
        let mut props = properties(property("default", 0, None));
        props.virus_status.push(VirusStatusRule {
            status: VirusStatus::Symptomatic,
            property: property("a", 5, None),
        });
        props.alert_status.push(AlertStatusRule {
            status: AlertStatus::None,
            property: property("b", 5, None),
        });
        let mut engine = IsolationPolicyEngine::new(props);
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();

        let mut c = case(1);
        c.virus_status = VirusStatus::Symptomatic;
        assert!(engine
            .is_isolated(&c, Proportion::new(0.0), 0, &mut rng, &mut stat)
            .is_ok());
    }

    #[test]
    fn strong_contacts_are_never_suppressed() {
        let mut engine = IsolationPolicyEngine::new(properties(property("default", 0, None)));
        let mut rng = StdRng::seed_from_u64(1);
        let mut stat = Stat::default();
        let (a, b) = (case(1), case(2));

        // both would individually isolate under the default policy
        assert!(!engine
            .is_contact_isolated(
                &a,
                &b,
                5.0,
                1.0,
                Proportion::new(0.0),
                0,
                &mut rng,
                &mut stat
            )
            .unwrap());
        // weak contact with an isolated participant is suppressed
        assert!(engine
            .is_contact_isolated(
                &a,
                &b,
                0.5,
                1.0,
                Proportion::new(0.0),
                0,
                &mut rng,
                &mut stat
            )
            .unwrap());
    }
}
