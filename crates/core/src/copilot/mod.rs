use std::collections::HashMap;

use rand::Rng;

use crate::config::CopilotLevel;
use crate::world::{RoadKind, RoadSegment, Severity, Surface};
use crate::{AssetStore, AudioClip, Result};

/// Surface cues trail the segment change by this many seconds.
pub const SURFACE_CUE_DELAY: f32 = 1.0;

const SEVERITIES: [Severity; 4] = [
    Severity::Easy,
    Severity::Normal,
    Severity::Hard,
    Severity::Hairpin,
];

/// Clip key prefix of a turn category, e.g. `copilot/left_hard`.
pub fn curve_prefix(kind: RoadKind) -> Option<String> {
    match kind {
        RoadKind::Straight => None,
        RoadKind::Left(severity) => Some(format!("copilot/left_{}", severity.name())),
        RoadKind::Right(severity) => Some(format!("copilot/right_{}", severity.name())),
    }
}

pub fn surface_prefix(surface: Surface) -> String {
    format!("copilot/surface_{}", surface.name())
}

/// What the copilot wants said about the road ahead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadCues {
    /// Play right away on the radio channel.
    pub curve: Option<AudioClip>,
    /// Play [`SURFACE_CUE_DELAY`] seconds from now.
    pub surface: Option<AudioClip>,
}

/// Per-category pools of recorded copilot variants.
#[derive(Debug, Clone)]
pub struct CopilotAnnouncer {
    curves: HashMap<RoadKind, Vec<AudioClip>>,
    surfaces: HashMap<Surface, Vec<AudioClip>>,
}

impl CopilotAnnouncer {
    /// Probes every turn and surface pool. A category without its first
    /// variant makes the race unplayable and fails the whole load.
    pub fn load(assets: &mut AssetStore) -> Result<Self> {
        let mut curves = HashMap::new();
        for severity in SEVERITIES {
            for kind in [RoadKind::Left(severity), RoadKind::Right(severity)] {
                if let Some(prefix) = curve_prefix(kind) {
                    curves.insert(kind, assets.probe_pool(&prefix)?);
                }
            }
        }

        let mut surfaces = HashMap::new();
        for surface in Surface::ALL {
            surfaces.insert(surface, assets.probe_pool(&surface_prefix(surface))?);
        }

        tracing::debug!(
            curve_pools = curves.len(),
            surface_pools = surfaces.len(),
            "copilot pools loaded"
        );
        Ok(Self { curves, surfaces })
    }

    pub fn curve_pool(&self, kind: RoadKind) -> &[AudioClip] {
        self.curves.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn surface_pool(&self, surface: Surface) -> &[AudioClip] {
        self.surfaces.get(&surface).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn on_road_ahead<R: Rng>(
        &self,
        next: &RoadSegment,
        current: &RoadSegment,
        level: CopilotLevel,
        rng: &mut R,
    ) -> RoadCues {
        let mut cues = RoadCues::default();

        if level.announces_curves() && next.kind.is_turn() {
            cues.curve = pick(self.curve_pool(next.kind), rng);
        }
        if level.announces_surfaces() && next.surface != current.surface {
            cues.surface = pick(self.surface_pool(next.surface), rng);
        }
        cues
    }
}

fn pick<R: Rng>(pool: &[AudioClip], rng: &mut R) -> Option<AudioClip> {
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.gen_range(0..pool.len())].clone())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::testing;
    use crate::RaceError;

    fn segment(kind: RoadKind, surface: Surface) -> RoadSegment {
        RoadSegment {
            kind,
            surface,
            length: 100.0,
        }
    }

    #[test]
    fn pool_sizes_follow_probed_files() {
        let mut assets = testing::assets();
        let copilot = CopilotAnnouncer::load(&mut assets).unwrap();

        assert_eq!(copilot.curve_pool(RoadKind::Left(Severity::Easy)).len(), 3);
        assert_eq!(copilot.curve_pool(RoadKind::Right(Severity::Hairpin)).len(), 1);
        assert_eq!(copilot.surface_pool(Surface::Gravel).len(), 2);
        assert!(copilot.curve_pool(RoadKind::Straight).is_empty());
    }

    #[test]
    fn missing_first_variant_is_fatal() {
        let mut manifest = testing::manifest();
        manifest
            .languages
            .get_mut("en")
            .unwrap()
            .remove("copilot/right_hard1");
        let mut assets = AssetStore::new(manifest, "en", "en").unwrap();

        let err = CopilotAnnouncer::load(&mut assets).unwrap_err();
        assert!(matches!(err, RaceError::MissingMandatoryAsset(key) if key == "copilot/right_hard1"));
    }

    #[test]
    fn announces_turns_and_surface_changes_by_level() {
        let mut assets = testing::assets();
        let copilot = CopilotAnnouncer::load(&mut assets).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let current = segment(RoadKind::Straight, Surface::Asphalt);
        let next = segment(RoadKind::Left(Severity::Easy), Surface::Gravel);

        let cues = copilot.on_road_ahead(&next, &current, CopilotLevel::CurvesAndSurfaces, &mut rng);
        assert!(cues.curve.unwrap().key().starts_with("copilot/left_easy"));
        assert!(cues.surface.unwrap().key().starts_with("copilot/surface_gravel"));

        let cues = copilot.on_road_ahead(&next, &current, CopilotLevel::Curves, &mut rng);
        assert!(cues.curve.is_some());
        assert!(cues.surface.is_none());

        let cues = copilot.on_road_ahead(&next, &current, CopilotLevel::Off, &mut rng);
        assert_eq!(cues, RoadCues::default());
    }

    #[test]
    fn straight_on_same_surface_is_silent() {
        let mut assets = testing::assets();
        let copilot = CopilotAnnouncer::load(&mut assets).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let road = segment(RoadKind::Straight, Surface::Snow);

        let cues = copilot.on_road_ahead(&road, &road, CopilotLevel::CurvesAndSurfaces, &mut rng);
        assert_eq!(cues, RoadCues::default());
    }

    #[test]
    fn seeded_selection_is_reproducible_and_covers_the_pool() {
        let mut assets = testing::assets();
        let copilot = CopilotAnnouncer::load(&mut assets).unwrap();
        let current = segment(RoadKind::Straight, Surface::Asphalt);
        let next = segment(RoadKind::Left(Severity::Easy), Surface::Asphalt);

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..64)
                .map(|_| {
                    copilot
                        .on_road_ahead(&next, &current, CopilotLevel::Curves, &mut rng)
                        .curve
                        .unwrap()
                        .key()
                        .to_string()
                })
                .collect::<Vec<_>>()
        };

        let first = run(42);
        assert_eq!(first, run(42));

        let mut distinct = first.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 3);
    }
}
