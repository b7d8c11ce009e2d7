/// Feature-extraction pipeline.
///
/// ```text
///  SmoothedSpectrum ───┐
///                      ▼
///  BaselineStore ──► TransmissionComputer ──► TransmissionCurve
///                                                   │
///                                                   ▼
///                                           FeatureTracker ──► Run
/// ```

pub mod baseline;
pub mod error;
pub mod geometry;
pub mod tracker;
pub mod transmission;

use crate::data::model::SmoothedSpectrum;

use baseline::BaselineStore;
use error::TrackerError;
use tracker::{FeatureTracker, SkipReason, TickOutcome};
use transmission::{TransmissionComputer, TransmissionCurve};

/// Result of one feature-tracking tick.
#[derive(Debug, Clone)]
pub struct Tick {
    pub outcome: TickOutcome,
    /// The curve the tick was computed from, when baselines were ready.
    pub curve: Option<TransmissionCurve>,
}

/// Compute the transmission of the most recent live sample and feed it to the
/// tracker. `live` is used as already smoothed. A missing sample or baseline
/// skips the tick.
pub fn run_tick(
    computer: &TransmissionComputer,
    tracker: &mut FeatureTracker,
    live: Option<&SmoothedSpectrum>,
    baselines: &BaselineStore,
) -> Result<Tick, TrackerError> {
    let Some(curve) = live.and_then(|s| computer.compute_smoothed(s.clone(), baselines)) else {
        log::debug!("Tick skipped: {}", SkipReason::NotReady);
        return Ok(Tick {
            outcome: TickOutcome::Skipped(SkipReason::NotReady),
            curve: None,
        });
    };
    let outcome = tracker.advance(&curve)?;
    Ok(Tick {
        outcome,
        curve: Some(curve),
    })
}
