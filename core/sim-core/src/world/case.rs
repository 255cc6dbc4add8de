use crate::Error;

use math::Proportion;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumCount, EnumIter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub u32);

impl CaseId {
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Disease compartment of a case. Transitions are restricted to the fixed
/// table in [`VirusStatus::valid_next`]; `Recovered` and `Dead` accept none.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumCount,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VirusStatus {
    Susceptible,
    Exposed,
    #[strum(serialize = "EXPOSED_2")]
    #[serde(rename = "EXPOSED_2")]
    Exposed2,
    Asymptomatic,
    Presymptomatic,
    Symptomatic,
    SeverelySymptomatic,
    Recovered,
    Dead,
}

impl VirusStatus {
    pub fn valid_next(self) -> &'static [VirusStatus] {
        use VirusStatus::*;
        match self {
            Susceptible => &[Exposed],
            Exposed => &[Exposed2, Asymptomatic],
            Exposed2 => &[Presymptomatic],
            Asymptomatic => &[Recovered],
            Presymptomatic => &[Symptomatic],
            Symptomatic => &[SeverelySymptomatic, Recovered],
            SeverelySymptomatic => &[Recovered, Dead],
            Recovered | Dead => &[],
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        self.valid_next().is_empty()
    }

    /// Carrying the virus in any stage, infectious or not.
    pub fn is_infected(self) -> bool {
        use VirusStatus::*;
        matches!(
            self,
            Exposed | Exposed2 | Asymptomatic | Presymptomatic | Symptomatic
                | SeverelySymptomatic
        )
    }

    /// Able to pass the virus on through a contact.
    pub fn is_infectious(self) -> bool {
        use VirusStatus::*;
        matches!(
            self,
            Asymptomatic | Presymptomatic | Symptomatic | SeverelySymptomatic
        )
    }

    pub fn can_transition(self, next: VirusStatus) -> bool {
        self.valid_next().contains(&next)
    }

    pub fn apply(self, next: VirusStatus) -> Result<VirusStatus, Error> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// Behavioral/testing state. Unlike [`VirusStatus`] there is no transition
/// table; policies assign whatever they need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    None,
    RequestedTest,
    AwaitingResult,
    Alerted,
    TestedPositive,
    TestedNegative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
}

/// One simulated individual. Demographics are fixed at population
/// generation; only the status fields and exposure record change during a
/// run, and only the simulation loop mutates them.
#[derive(Clone, Debug)]
pub struct Case {
    pub id: CaseId,
    pub age: u32,
    pub gender: Gender,
    pub compliance: Proportion,
    pub health: Proportion,
    pub has_app: bool,
    pub virus_status: VirusStatus,
    pub alert_status: AlertStatus,
    pub exposed_by: Option<CaseId>,
    pub exposed_time: Option<u32>,
}

impl Case {
    pub fn new(
        id: CaseId,
        age: u32,
        gender: Gender,
        compliance: Proportion,
        health: Proportion,
        has_app: bool,
    ) -> Self {
        Self {
            id,
            age,
            gender,
            compliance,
            health,
            has_app,
            virus_status: VirusStatus::Susceptible,
            alert_status: AlertStatus::None,
            exposed_by: None,
            exposed_time: None,
        }
    }

    pub fn apply_virus_status(&mut self, next: VirusStatus) -> Result<(), Error> {
        self.virus_status = self.virus_status.apply(next)?;
        Ok(())
    }

    pub fn apply_alert_status(&mut self, next: AlertStatus) {
        self.alert_status = next;
    }
}
