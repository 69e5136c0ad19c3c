//! Event loop for one kinematic slice: acceptance, pair selection, records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::SelectionConfig;
use crate::event::{Event, JetCandidate, Particle};
use crate::record::{PairRecord, build_record};
use crate::selection::select_dijets;
use crate::slice::{SliceSummary, SliceWriter};
use crate::source::EventSource;

/// Particles the detector would see: final state, visible, and inside the
/// particle acceptance.
pub fn accepted_particles(particles: &[Particle], cfg: &SelectionConfig) -> Vec<Particle> {
    particles
        .iter()
        .filter(|p| p.final_state && p.visible)
        .filter(|p| p.pt >= cfg.particle_pt_min && p.eta.abs() <= cfg.particle_eta_max)
        .copied()
        .collect()
}

/// Jet candidates passing the jet pt and eta requirements.
pub fn accepted_jets(jets: &[JetCandidate], cfg: &SelectionConfig) -> Vec<JetCandidate> {
    jets.iter()
        .filter(|j| j.pt >= cfg.jet_pt_min && j.eta.abs() <= cfg.jet_eta_max)
        .cloned()
        .collect()
}

/// All pair records of one event. Empty when no back-to-back pair survives.
pub fn process_event(event: &Event, cfg: &SelectionConfig) -> Vec<PairRecord> {
    let jets = accepted_jets(&event.jets, cfg);
    if jets.len() < 2 {
        return Vec::new();
    }
    let pairs = select_dijets(&jets, cfg.min_dphi);
    if pairs.is_empty() {
        return Vec::new();
    }
    let cone_particles = accepted_particles(&event.particles, cfg);
    let acceptance = cfg.particle_acceptance();
    pairs
        .iter()
        .map(|pair| {
            build_record(
                pair,
                &jets,
                &event.particles,
                &cone_particles,
                cfg.jet_radius,
                acceptance,
            )
        })
        .collect()
}

/// Run up to `n_events` generator attempts from `source` into `writer`.
///
/// Stops early when the source is exhausted or `stop` is set; the summary
/// then records the attempts actually made, so the slice weight stays right.
pub fn run_slice(
    source: &mut dyn EventSource,
    n_events: u64,
    cfg: &SelectionConfig,
    mut writer: SliceWriter,
    stop: &AtomicBool,
) -> std::io::Result<SliceSummary> {
    let start = Instant::now();
    let mut attempted = 0u64;
    let mut accepted = 0u64;
    let mut failed = 0u64;

    while attempted < n_events {
        if stop.load(Ordering::SeqCst) {
            log::warn!(
                "stopped after {attempted} of {n_events} events in {}",
                writer.dir().display()
            );
            break;
        }
        let Some(next) = source.next_event() else {
            log::info!("{} exhausted after {attempted} events", source.name());
            break;
        };
        attempted += 1;
        let event = match next {
            Ok(event) => event,
            Err(e) => {
                failed += 1;
                log::debug!("generator attempt {attempted} failed: {e}");
                continue;
            }
        };
        let records = process_event(&event, cfg);
        if !records.is_empty() {
            accepted += 1;
            writer.write_records(&records)?;
        }
    }

    if failed > 0 {
        log::warn!("{failed} of {attempted} generator attempts failed");
    }
    let summary = writer.finish(attempted, accepted, source.cross_section())?;
    log::info!(
        "slice {}: {} events, {} accepted, {} pairs, sigma {:.4e} mb ({:.1}s)",
        summary.label,
        summary.n_events,
        summary.n_accepted,
        summary.n_pairs,
        summary.sigma_gen_mb,
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::slice::{KinematicSlice, PtHatRange, SliceConfig};
    use crate::source::{CrossSection, ToyDijetSource};
    use std::collections::VecDeque;
    use std::f64::consts::PI;

    fn jet(pt: f64, eta: f64, phi: f64, constituents: Vec<usize>) -> JetCandidate {
        JetCandidate {
            pt,
            eta,
            phi,
            constituents,
        }
    }

    fn back_to_back_event() -> Event {
        Event {
            particles: vec![
                Particle::charged_final(6.0, 0.0, 0.0),
                Particle::charged_final(4.0, 0.1, PI - 0.1),
                Particle::charged_final(0.5, 0.0, PI / 2.0),
                Particle {
                    final_state: false,
                    ..Particle::charged_final(0.5, 0.05, PI / 2.0)
                },
                Particle {
                    visible: false,
                    ..Particle::charged_final(0.5, 0.0, -PI / 2.0)
                },
            ],
            jets: vec![
                jet(10.0, 0.0, 0.0, vec![0]),
                jet(8.0, 0.1, PI - 0.1, vec![1]),
            ],
        }
    }

    /// Scripted source for loop-control tests.
    struct ScriptedSource {
        events: VecDeque<Result<Event, SourceError>>,
    }

    impl EventSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn next_event(&mut self) -> Option<Result<Event, SourceError>> {
            self.events.pop_front()
        }

        fn cross_section(&self) -> CrossSection {
            CrossSection {
                sigma_gen_mb: 4.0,
                sigma_err_mb: 0.2,
            }
        }
    }

    fn writer(dir: &std::path::Path) -> SliceWriter {
        SliceWriter::new(SliceConfig {
            dir: dir.to_path_buf(),
            pt_hat: PtHatRange::new(5.0, Some(7.0)).unwrap(),
            source: "scripted".to_string(),
            seed: None,
            selection: SelectionConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn process_event_builds_one_record() {
        let records = process_event(&back_to_back_event(), &SelectionConfig::default());
        assert_eq!(records.len(), 1);
        let r = records[0];
        assert_eq!(r.lead_pt, 10.0);
        assert_eq!(r.sub_pt, 8.0);
        assert_eq!(r.lead_n_charged, 1);
        assert_eq!(r.sub_n_charged, 1);
        // Only the final-state, visible particle counts in the cones.
        assert_eq!(r.background_mult_a, 1);
        assert_eq!(r.background_mult_b, 0);
        assert!((r.closeness - 0.1).abs() < 1e-12);
    }

    #[test]
    fn jet_acceptance_is_reapplied() {
        let cfg = SelectionConfig::default();
        let mut event = back_to_back_event();
        event.jets[1].eta = 0.8;
        assert!(process_event(&event, &cfg).is_empty());

        let mut event = back_to_back_event();
        event.jets[1].pt = 2.0;
        assert!(process_event(&event, &cfg).is_empty());
    }

    #[test]
    fn event_without_jets_has_no_records() {
        assert!(process_event(&Event::default(), &SelectionConfig::default()).is_empty());
    }

    #[test]
    fn run_slice_counts_failed_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("slice");
        let mut source = ScriptedSource {
            events: VecDeque::from(vec![
                Ok(back_to_back_event()),
                Err(SourceError::Parse {
                    line: 2,
                    reason: "bad".to_string(),
                }),
                Ok(Event::default()),
                Ok(back_to_back_event()),
            ]),
        };
        let stop = AtomicBool::new(false);
        let cfg = SelectionConfig::default();
        let summary = run_slice(&mut source, 100, &cfg, writer(&dir), &stop).unwrap();
        assert_eq!(summary.n_events, 4);
        assert_eq!(summary.n_accepted, 2);
        assert_eq!(summary.n_pairs, 2);
        assert_eq!(summary.sigma_gen_mb, 4.0);

        let slice = KinematicSlice::load(&dir).unwrap();
        assert_eq!(slice.records.len(), 2);
    }

    #[test]
    fn run_slice_respects_event_limit_and_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SelectionConfig::default();
        let range = PtHatRange::new(10.0, Some(15.0)).unwrap();

        let mut toy = ToyDijetSource::new(range, 3).unwrap();
        let stop = AtomicBool::new(false);
        let summary = run_slice(&mut toy, 25, &cfg, writer(&tmp.path().join("a")), &stop).unwrap();
        assert_eq!(summary.n_events, 25);
        assert!(summary.n_accepted <= 25);

        let mut toy = ToyDijetSource::new(range, 3).unwrap();
        let stop = AtomicBool::new(true);
        let summary = run_slice(&mut toy, 25, &cfg, writer(&tmp.path().join("b")), &stop).unwrap();
        assert_eq!(summary.n_events, 0);
        assert_eq!(summary.event_weight(), None);
    }

    #[test]
    fn toy_slice_produces_balanced_pairs() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SelectionConfig::default();
        let range = PtHatRange::new(20.0, Some(25.0)).unwrap();
        let mut toy = ToyDijetSource::new(range, 11).unwrap();
        let stop = AtomicBool::new(false);
        let summary =
            run_slice(&mut toy, 500, &cfg, writer(&tmp.path().join("toy")), &stop).unwrap();
        assert!(summary.n_accepted > 0);
        let slice = KinematicSlice::load(&tmp.path().join("toy")).unwrap();
        for r in &slice.records {
            assert!(r.lead_pt >= r.sub_pt);
            assert!(r.closeness >= 0.0 && r.closeness <= PI / 4.0 + 1e-12);
            assert!(r.lead_eta.abs() <= cfg.jet_eta_max);
        }
    }
}
