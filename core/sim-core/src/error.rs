use crate::world::case::VirusStatus;

/// Fatal conditions of a simulation run. None of these are recovered
/// silently; the statistical validity of a run depends on every sampled or
/// derived value being well-defined.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid virus status transition from {from} to {to}")]
    InvalidTransition { from: VirusStatus, to: VirusStatus },

    #[error(
        "isolation policies {first} and {second} share priority {priority} \
         but disagree on outcome"
    )]
    AmbiguousPolicy {
        priority: i32,
        first: String,
        second: String,
    },

    #[error(
        "bounded sampler exhausted {attempts} attempts without landing in \
         [1, {max}] for {distribution}"
    )]
    SampleExhausted {
        distribution: String,
        max: u32,
        attempts: u32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
