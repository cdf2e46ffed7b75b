//! Candidate screening and uniform random choice
//!
//! Screening runs every instance through the same ordered stages:
//! running phase, targeting selector, protection rules, safety engine.
//! The final pick draws from an injected [`RandomSource`] so tests can
//! enumerate outcomes while production draws from OS entropy.

use crate::models::{Instance, Phase};
use crate::safety::{SafetyEngine, Verdict};
use crate::selector::Selector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Source of the index used for the final pick
pub trait RandomSource {
    /// Return an index in `0..len`; `len` is never zero
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Randomness seeded from the operating system on every construction
pub struct EntropySource {
    rng: StdRng,
}

impl EntropySource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropySource {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Replays a fixed sequence of indices, wrapping each into range
///
/// Deterministic by construction; meant for tests and replaying a
/// recorded decision, never for live disruption.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    indices: Vec<usize>,
    cursor: usize,
}

impl SequenceSource {
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self {
            indices: indices.into(),
            cursor: 0,
        }
    }
}

impl RandomSource for SequenceSource {
    fn pick_index(&mut self, len: usize) -> usize {
        let raw = self.indices.get(self.cursor).copied().unwrap_or(self.cursor);
        self.cursor = (self.cursor + 1) % self.indices.len().max(1);
        raw % len
    }
}

/// Stage at which an instance left the candidate pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    NotRunning(Phase),
    NotTargeted,
    Judged(Verdict),
}

/// Outcome of screening one instance
#[derive(Debug, Clone)]
pub struct Screened<'a> {
    pub instance: &'a Instance,
    pub screen: Screen,
}

impl Screened<'_> {
    pub fn admitted(&self) -> bool {
        matches!(&self.screen, Screen::Judged(v) if v.admitted)
    }
}

/// Serializable verdict row for reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceVerdict {
    pub instance: String,
    pub phase: Phase,
    pub admitted: bool,
    pub reason: String,
}

impl From<&Screened<'_>> for InstanceVerdict {
    fn from(s: &Screened<'_>) -> Self {
        let reason = match &s.screen {
            Screen::NotRunning(phase) => format!("not running (phase {})", phase),
            Screen::NotTargeted => "not matched by targeting selector".to_string(),
            Screen::Judged(verdict) => verdict.reason.to_string(),
        };
        Self {
            instance: s.instance.name.clone(),
            phase: s.instance.phase,
            admitted: s.admitted(),
            reason,
        }
    }
}

/// Run every instance through the screening stages
pub fn screen<'a>(
    instances: &'a [Instance],
    target: &Selector,
    engine: &SafetyEngine<'_>,
) -> Vec<Screened<'a>> {
    instances
        .iter()
        .map(|instance| {
            let screen = if instance.phase != Phase::Running {
                Screen::NotRunning(instance.phase)
            } else if !target.matches(&instance.labels) {
                Screen::NotTargeted
            } else {
                Screen::Judged(engine.can_disrupt(instance))
            };
            Screened { instance, screen }
        })
        .collect()
}

/// Uniform choice among admitted instances; `None` when nothing survived
pub fn pick<'a, R>(screened: &[Screened<'a>], rng: &mut R) -> Option<&'a Instance>
where
    R: RandomSource + ?Sized,
{
    let admitted: Vec<&'a Instance> = screened
        .iter()
        .filter(|s| s.admitted())
        .map(|s| s.instance)
        .collect();

    if admitted.is_empty() {
        return None;
    }

    Some(admitted[rng.pick_index(admitted.len())])
}

/// Screen and pick in one call
pub fn select_one<'a, R>(
    instances: &'a [Instance],
    target: &Selector,
    engine: &SafetyEngine<'_>,
    rng: &mut R,
) -> Option<&'a Instance>
where
    R: RandomSource + ?Sized,
{
    pick(&screen(instances, target, engine), rng)
}
