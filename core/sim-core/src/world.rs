pub mod alert;
pub mod case;
pub mod commons;
pub mod event;
pub mod isolation;

use self::{
    alert::{AlertEngine, TracingPolicy},
    case::{AlertStatus, Case, CaseId, VirusStatus},
    commons::{DiseaseProperties, RunSettings},
    event::{AlertEvent, CompletedContacts, ContactEvent, Event, EventQueue, InfectionEvent, VirusEvent},
    isolation::{IsolationPolicyEngine, IsolationProperties},
};
use crate::{
    stat::{CompartmentCounts, SpreadEntry, Stat, TestCounts},
    Error,
};

use math::Proportion;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, trace};

/// Chance that a single contact exposes its susceptible target.
fn exposure_probability(disease: &DiseaseProperties, weight: f64, health: Proportion) -> f64 {
    (disease.exposure_rate.r() * weight.powf(disease.exposure_exponent) * (1.0 - health.r()))
        .clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct RunSummary {
    pub total_infected: u32,
    pub total_contacts_traced: u32,
    pub person_days_in_isolation: f64,
    pub tests: TestCounts,
}

/// One simulation run: the population, the pending-event queue, both policy
/// engines, and the single sequential random source. Everything in a run is
/// reproducible bit-for-bit from `RunSettings::seed`.
pub struct World {
    settings: RunSettings,
    disease: DiseaseProperties,
    cases: Vec<Case>,
    queue: EventQueue,
    completed_contacts: CompletedContacts,
    isolation: IsolationPolicyEngine,
    alerts: AlertEngine,
    stat: Stat,
    compartments: CompartmentCounts,
    rng: StdRng,
    time: u32,
}

impl World {
    pub fn new(
        settings: RunSettings,
        disease: DiseaseProperties,
        isolation_properties: IsolationProperties,
        tracing_policy: TracingPolicy,
        cases: Vec<Case>,
        contact_schedule: Vec<ContactEvent>,
    ) -> Result<Self, Error> {
        let n = settings.population_size as usize;
        if cases.len() != n {
            return Err(Error::InvalidConfig(format!(
                "population size {} does not match case list length {}",
                settings.population_size,
                cases.len()
            )));
        }
        for (i, case) in cases.iter().enumerate() {
            if case.id.idx() != i {
                return Err(Error::InvalidConfig(format!(
                    "case ids must be dense and ordered; found {} at index {i}",
                    case.id
                )));
            }
        }
        if settings.initial_exposures as usize > n {
            return Err(Error::InvalidConfig(format!(
                "{} initial exposures exceed population of {n}",
                settings.initial_exposures
            )));
        }
        disease.validate()?;
        for case in &cases {
            if !(0.0..=1.0).contains(&case.compliance.r())
                || !(0.0..=1.0).contains(&case.health.r())
            {
                return Err(Error::InvalidConfig(format!(
                    "case {}: compliance and health must lie in [0, 1]",
                    case.id
                )));
            }
        }

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut queue = EventQueue::new();
        for contact in contact_schedule {
            if contact.from.idx() >= n || contact.to.idx() >= n {
                return Err(Error::InvalidConfig(format!(
                    "contact at time {} references unknown case",
                    contact.time
                )));
            }
            queue.push(Event::Contact(contact));
        }
        for i in rand::seq::index::sample(&mut rng, n, settings.initial_exposures as usize) {
            queue.push(Event::Infection(InfectionEvent {
                time: 0,
                id: cases[i].id,
                next: VirusStatus::Exposed,
                exposed_by: None,
                exposed_time: 0,
            }));
        }

        Ok(Self {
            compartments: CompartmentCounts::with_susceptible(settings.population_size),
            isolation: IsolationPolicyEngine::new(isolation_properties),
            alerts: AlertEngine::new(tracing_policy),
            completed_contacts: CompletedContacts::default(),
            stat: Stat::default(),
            settings,
            disease,
            cases,
            queue,
            rng,
            time: 0,
        })
    }

    pub fn stat(&self) -> &Stat {
        &self.stat
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn case(&self, id: CaseId) -> &Case {
        &self.cases[id.idx()]
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_infected: self.stat.total_infected(),
            total_contacts_traced: self.stat.total_contacts_traced(),
            person_days_in_isolation: f64::from(self.stat.total_isolation_steps())
                / f64::from(self.settings.steps_per_day.max(1)),
            tests: self.stat.tests(),
        }
    }

    fn infected_proportion(&self) -> Proportion {
        Proportion::new(
            f64::from(self.compartments.n_infected()) / f64::from(self.settings.population_size),
        )
    }

    /// Done when the queue is drained and the clock has passed the limit.
    pub fn is_ended(&self) -> bool {
        self.queue.is_empty() && self.time > self.settings.time_limit
    }

    pub fn run(&mut self) -> Result<(), Error> {
        info!(
            population = self.settings.population_size,
            time_limit = self.settings.time_limit,
            seed = self.settings.seed,
            "starting run"
        );
        while !self.is_ended() {
            self.step()?;
        }
        self.isolation.finalize(self.time, &mut self.stat);
        self.finalize_spread();
        info!(
            infected = self.stat.total_infected(),
            traced = self.stat.total_contacts_traced(),
            "run complete"
        );
        Ok(())
    }

    /// One time step: drain every event due now, then background infection,
    /// then a compartment snapshot.
    pub fn step(&mut self) -> Result<(), Error> {
        let t = self.time;
        trace!(time = t, pending = self.queue.len(), "step");
        loop {
            match self.queue.peek_time() {
                Some(due) if due <= t => {
                    let Some(event) = self.queue.pop() else {
                        break;
                    };
                    self.process_event(event)?;
                }
                _ => break,
            }
        }
        if t <= self.settings.time_limit {
            self.random_infection();
        }
        self.stat.push_compartments(self.compartments.clone());
        self.time += 1;
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Result<(), Error> {
        match event {
            Event::Contact(c) => self.process_contact(c),
            Event::Infection(i) => self.process_infection(i),
            Event::Virus(v) => self.process_virus(v),
            Event::Alert(a) => self.process_alert(a),
        }
    }

    fn process_contact(&mut self, contact: ContactEvent) -> Result<(), Error> {
        let infected = self.infected_proportion();
        let t = self.time;
        let Self {
            cases,
            isolation,
            rng,
            stat,
            disease,
            queue,
            completed_contacts,
            ..
        } = self;
        let from = &cases[contact.from.idx()];
        let to = &cases[contact.to.idx()];
        let involves_dead =
            from.virus_status == VirusStatus::Dead || to.virus_status == VirusStatus::Dead;
        if !involves_dead {
            let suppressed = isolation.is_contact_isolated(
                from,
                to,
                contact.weight,
                disease.exposure_threshold,
                infected,
                t,
                rng,
                stat,
            )?;
            if !suppressed
                && from.virus_status.is_infectious()
                && to.virus_status == VirusStatus::Susceptible
            {
                let p = exposure_probability(disease, contact.weight, to.health);
                if rng.gen_bool(p) {
                    queue.push(Event::Infection(InfectionEvent {
                        time: t + 1,
                        id: to.id,
                        next: VirusStatus::Exposed,
                        exposed_by: Some(from.id),
                        exposed_time: t + 1,
                    }));
                }
            }
        }
        // the contact happened either way; tracing may consult it later
        completed_contacts.record(contact);
        Ok(())
    }

    fn process_infection(&mut self, infection: InfectionEvent) -> Result<(), Error> {
        let case = &mut self.cases[infection.id.idx()];
        if case.virus_status != VirusStatus::Susceptible {
            // a competing exposure landed first
            debug!(id = %infection.id, "dropping infection event for non-susceptible case");
            return Ok(());
        }
        let old = case.virus_status;
        case.apply_virus_status(infection.next)?;
        case.exposed_by = infection.exposed_by;
        case.exposed_time = Some(infection.exposed_time);
        self.compartments.apply_difference(old, infection.next);
        self.stat
            .record_person_infected(self.settings.day_of(self.time));
        self.schedule_progression(infection.id, infection.next)
    }

    fn process_virus(&mut self, virus: VirusEvent) -> Result<(), Error> {
        let case = &mut self.cases[virus.id.idx()];
        let old = case.virus_status;
        case.apply_virus_status(virus.next)?;
        self.compartments.apply_difference(old, virus.next);
        if virus.next == VirusStatus::Symptomatic {
            self.run_alert_check(virus.id)?;
        }
        self.schedule_progression(virus.id, virus.next)
    }

    /// Schedules the next disease-stage event for a case that just entered
    /// `status`, per that stage's duration distribution and branch rates.
    fn schedule_progression(&mut self, id: CaseId, status: VirusStatus) -> Result<(), Error> {
        use VirusStatus::*;
        let t = self.time;
        let Self {
            disease,
            rng,
            queue,
            ..
        } = self;
        let next = match status {
            Exposed => {
                let next = if rng.gen_bool(disease.probability_symptomatic.r()) {
                    Exposed2
                } else {
                    Asymptomatic
                };
                Some((next, disease.latent_period.sample(rng)?))
            }
            Exposed2 => Some((Presymptomatic, disease.latent_period.sample(rng)?)),
            Asymptomatic => Some((Recovered, disease.asymptomatic_recovery_period.sample(rng)?)),
            Presymptomatic => Some((Symptomatic, disease.onset_period.sample(rng)?)),
            Symptomatic => {
                if rng.gen_bool(disease.severity_rate.r()) {
                    Some((SeverelySymptomatic, disease.decline_period.sample(rng)?))
                } else {
                    Some((Recovered, disease.symptomatic_recovery_period.sample(rng)?))
                }
            }
            SeverelySymptomatic => {
                if rng.gen_bool(disease.mortality_rate.r()) {
                    Some((Dead, disease.death_period.sample(rng)?))
                } else {
                    Some((Recovered, disease.severe_recovery_period.sample(rng)?))
                }
            }
            Susceptible | Recovered | Dead => None,
        };
        if let Some((next, delay)) = next {
            queue.push(Event::Virus(VirusEvent {
                time: t + delay.max(1),
                id,
                old: status,
                next,
            }));
        }
        Ok(())
    }

    fn run_alert_check(&mut self, id: CaseId) -> Result<(), Error> {
        let t = self.time;
        let day = self.settings.day_of(t);
        let Self {
            cases,
            alerts,
            completed_contacts,
            rng,
            stat,
            queue,
            ..
        } = self;
        let reporter = &cases[id.idx()];
        let events =
            alerts.check_for_alert(reporter, cases, completed_contacts, t, day, rng, stat)?;
        queue.extend(events);
        Ok(())
    }

    fn process_alert(&mut self, alert: AlertEvent) -> Result<(), Error> {
        let t = self.time;
        {
            let case = &mut self.cases[alert.id.idx()];
            if case.virus_status == VirusStatus::Dead {
                return Ok(());
            }
            case.apply_alert_status(alert.next);
        }
        match alert.next {
            AlertStatus::RequestedTest => {
                let delay = self.disease.test_administered_delay.sample(&mut self.rng)?;
                self.queue.push(Event::Alert(AlertEvent {
                    time: t + delay.max(1),
                    id: alert.id,
                    old: alert.next,
                    next: AlertStatus::AwaitingResult,
                }));
            }
            AlertStatus::AwaitingResult => {
                let infected = self.cases[alert.id.idx()].virus_status.is_infected();
                let accurate = self.rng.gen_bool(self.disease.test_accuracy.r());
                let positive = if infected { accurate } else { !accurate };
                self.stat.record_test_result(infected, positive);
                let delay = self.disease.test_result_delay.sample(&mut self.rng)?;
                self.queue.push(Event::Alert(AlertEvent {
                    time: t + delay.max(1),
                    id: alert.id,
                    old: alert.next,
                    next: if positive {
                        AlertStatus::TestedPositive
                    } else {
                        AlertStatus::TestedNegative
                    },
                }));
            }
            // a confirmed case reports; policy items keyed on
            // TESTED_POSITIVE decide whether its contacts are traced
            AlertStatus::TestedPositive => self.run_alert_check(alert.id)?,
            _ => {}
        }
        Ok(())
    }

    /// Susceptible cases may be exposed independently of any contact.
    fn random_infection(&mut self) {
        let rate = self.disease.random_infection_rate.r();
        if rate <= 0.0 {
            return;
        }
        let t = self.time;
        let Self { cases, rng, queue, .. } = self;
        for case in cases.iter() {
            if case.virus_status == VirusStatus::Susceptible && rng.gen_bool(rate) {
                queue.push(Event::Infection(InfectionEvent {
                    time: t + 1,
                    id: case.id,
                    next: VirusStatus::Exposed,
                    exposed_by: None,
                    exposed_time: t + 1,
                }));
            }
        }
    }

    /// Aggregates secondary-infection counts per seed into the R0
    /// progression buckets once the run is over.
    fn finalize_spread(&mut self) {
        let mut secondary: FxHashMap<CaseId, u32> = FxHashMap::default();
        for case in &self.cases {
            if let Some(seed) = case.exposed_by {
                *secondary.entry(seed).or_insert(0) += 1;
            }
        }
        for case in &self.cases {
            if let Some(exposed_time) = case.exposed_time {
                self.stat.record_infection_spread(
                    self.settings.day_of(exposed_time),
                    SpreadEntry {
                        seed: case.id,
                        secondary_infections: secondary.get(&case.id).copied().unwrap_or(0),
                    },
                );
            }
        }
    }
}
