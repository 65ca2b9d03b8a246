//! Static description of sites, stages, and teams.
//!
//! A `Catalog` is built once from a `CatalogSpec`, validated, and then
//! treated as immutable. Every stage gets a dense index in input order so the
//! engine can keep per-stage state in flat vectors.

mod spec;
mod template;

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use thiserror::Error;

use crate::config::AllocationConfig;
use crate::engine::effort_duration;
use crate::interner::{StageIdInterner, StageIdx};

pub use spec::{CatalogSpec, SiteSpec, StageSpec, TeamSpec};
pub use template::{default_teams, sample_catalog_spec, standard_stages, TEMPLATE_DURATIONS};

/// Dense team index.
pub type TeamIdx = u32;
/// Dense site index.
pub type SiteIdx = u32;

/// Errors raised while loading a catalog. All of them are fatal.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Catalog defines no sites")]
    NoSites,
    #[error("Duplicate site id: {0}")]
    DuplicateSite(String),
    #[error("Duplicate team id: {0}")]
    DuplicateTeam(String),
    #[error("Duplicate stage id: {0}")]
    DuplicateStage(String),
    #[error("Stage {stage} references unknown team {team}")]
    UnknownTeam { stage: String, team: String },
    #[error("Team {0} has zero capacity")]
    ZeroCapacity(String),
    #[error("Stage {0} has zero nominal crew size")]
    ZeroCrewSize(String),
    #[error("Stage {stage} has invalid base duration {duration}")]
    InvalidDuration { stage: String, duration: f64 },
    #[error("Shared team {team} needs at least {floor} workers but has capacity {capacity}")]
    FloorExceedsCapacity {
        team: String,
        floor: u32,
        capacity: u32,
    },
    #[error("Stage {stage} cannot run with its smallest crew of {workers} workers")]
    NoViableCrew { stage: String, workers: u32 },
}

/// An immutable stage definition.
#[derive(Debug, Clone)]
pub struct Stage {
    pub idx: StageIdx,
    /// `"{site_id}_{name}"`
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub site: SiteIdx,
    pub order: u32,
    pub team: TeamIdx,
    /// Dedicated stages take the whole team; shared stages take a partial count.
    pub dedicated: bool,
    pub nominal_crew_size: u32,
    pub base_duration: f64,
    pub parallel: bool,
}

/// A workpoint with its stages in input order.
#[derive(Debug, Clone)]
pub struct Site {
    pub idx: SiteIdx,
    pub id: String,
    pub name: String,
    pub stages: Vec<StageIdx>,
}

/// A crew shared by stages across all sites.
#[derive(Debug, Clone)]
pub struct Team {
    pub idx: TeamIdx,
    pub id: String,
    pub capacity: u32,
    pub dedicated: bool,
}

/// Validated arena of stages, sites, and teams.
#[derive(Debug, Clone)]
pub struct Catalog {
    stages: Vec<Stage>,
    sites: Vec<Site>,
    teams: Vec<Team>,
    stage_ids: StageIdInterner,
}

impl Catalog {
    /// Build and validate a catalog from its input description.
    pub fn build(spec: &CatalogSpec) -> Result<Self, CatalogError> {
        if spec.sites.is_empty() {
            return Err(CatalogError::NoSites);
        }

        let mut teams: Vec<Team> = Vec::with_capacity(spec.teams.len());
        let mut team_lookup: FxHashMap<&str, TeamIdx> = FxHashMap::default();
        for team_spec in &spec.teams {
            if team_lookup.contains_key(team_spec.id.as_str()) {
                return Err(CatalogError::DuplicateTeam(team_spec.id.clone()));
            }
            if team_spec.capacity == 0 {
                return Err(CatalogError::ZeroCapacity(team_spec.id.clone()));
            }
            let idx = teams.len() as TeamIdx;
            team_lookup.insert(team_spec.id.as_str(), idx);
            teams.push(Team {
                idx,
                id: team_spec.id.clone(),
                capacity: team_spec.capacity,
                dedicated: team_spec.dedicated,
            });
        }

        let template = standard_stages();
        let mut stages: Vec<Stage> = Vec::new();
        let mut sites: Vec<Site> = Vec::with_capacity(spec.sites.len());
        let mut site_ids: FxHashMap<&str, SiteIdx> = FxHashMap::default();
        let mut stage_ids = StageIdInterner::default();

        for site_spec in &spec.sites {
            if site_ids.contains_key(site_spec.id.as_str()) {
                return Err(CatalogError::DuplicateSite(site_spec.id.clone()));
            }
            let site_idx = sites.len() as SiteIdx;
            site_ids.insert(site_spec.id.as_str(), site_idx);

            let site_name = site_spec
                .name
                .clone()
                .unwrap_or_else(|| site_spec.id.clone());
            let label = site_label(&site_spec.id, site_spec.name.as_deref());
            let stage_specs = if site_spec.stages.is_empty() {
                &template
            } else {
                &site_spec.stages
            };

            let mut site_stages = Vec::with_capacity(stage_specs.len());
            for stage_spec in stage_specs {
                let id = format!("{}_{}", site_spec.id, stage_spec.name);
                let team = *team_lookup.get(stage_spec.team.as_str()).ok_or_else(|| {
                    CatalogError::UnknownTeam {
                        stage: id.clone(),
                        team: stage_spec.team.clone(),
                    }
                })?;
                if stage_spec.nominal_crew_size == 0 {
                    return Err(CatalogError::ZeroCrewSize(id));
                }
                if !stage_spec.base_duration.is_finite() || stage_spec.base_duration <= 0.0 {
                    return Err(CatalogError::InvalidDuration {
                        stage: id,
                        duration: stage_spec.base_duration,
                    });
                }
                let idx = stage_ids
                    .insert(&id)
                    .ok_or_else(|| CatalogError::DuplicateStage(id.clone()))?;

                stages.push(Stage {
                    idx,
                    display_name: format!("{}-{}", label, stage_spec.name),
                    id,
                    name: stage_spec.name.clone(),
                    site: site_idx,
                    order: stage_spec.order,
                    team,
                    dedicated: stage_spec
                        .dedicated
                        .unwrap_or(teams[team as usize].dedicated),
                    nominal_crew_size: stage_spec.nominal_crew_size,
                    base_duration: stage_spec.base_duration,
                    parallel: stage_spec.parallel,
                });
                site_stages.push(idx);
            }

            sites.push(Site {
                idx: site_idx,
                id: site_spec.id.clone(),
                name: site_name,
                stages: site_stages,
            });
        }

        Ok(Self {
            stages,
            sites,
            teams,
            stage_ids,
        })
    }

    /// Parse a JSON `CatalogSpec` and build it.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let spec: CatalogSpec = serde_json::from_str(json)?;
        Self::build(&spec)
    }

    /// The built-in three-site sample.
    pub fn sample() -> Result<Self, CatalogError> {
        Self::build(&sample_catalog_spec())
    }

    /// Reject teams and stages for which no allocation could ever start.
    ///
    /// Only teams that host at least one shared stage are checked against
    /// the floor. Each stage must also have a positive duration with the
    /// smallest crew it can be given: the whole team when dedicated, the
    /// floor otherwise.
    pub fn check_allocation_floors(&self, config: &AllocationConfig) -> Result<(), CatalogError> {
        for team in &self.teams {
            let hosts_shared = self
                .stages
                .iter()
                .any(|s| s.team == team.idx && !s.dedicated);
            let floor = config.min_floor(team.capacity);
            if hosts_shared && (floor == 0 || floor > team.capacity) {
                return Err(CatalogError::FloorExceedsCapacity {
                    team: team.id.clone(),
                    floor,
                    capacity: team.capacity,
                });
            }
        }
        for stage in &self.stages {
            let capacity = self.teams[stage.team as usize].capacity;
            let workers = if stage.dedicated {
                capacity
            } else {
                config.min_floor(capacity)
            };
            if effort_duration(stage.base_duration, stage.nominal_crew_size, workers).is_none() {
                return Err(CatalogError::NoViableCrew {
                    stage: stage.id.clone(),
                    workers,
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn stage(&self, idx: StageIdx) -> Option<&Stage> {
        self.stages.get(idx as usize)
    }

    #[inline]
    pub fn team(&self, idx: TeamIdx) -> &Team {
        &self.teams[idx as usize]
    }

    #[inline]
    pub fn site(&self, idx: SiteIdx) -> &Site {
        &self.sites[idx as usize]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn stage_count(&self) -> usize {
        self.stage_ids.len()
    }

    /// Look up a stage index by its string id.
    pub fn stage_index(&self, id: &str) -> Option<StageIdx> {
        self.stage_ids.get(id)
    }

    /// String id of a stage index.
    pub fn stage_id(&self, idx: StageIdx) -> Option<&str> {
        self.stage_ids.resolve(idx)
    }

    /// Stages of the same site, including `idx` itself.
    pub fn site_stages(&self, idx: StageIdx) -> &[StageIdx] {
        match self.stage(idx) {
            Some(stage) => &self.sites[stage.site as usize].stages,
            None => &[],
        }
    }

    /// Deterministic hash of everything that affects scheduling.
    ///
    /// Two catalogs with the same fingerprint produce the same schedules for
    /// the same action sequence.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        let mut site_order: Vec<&Site> = self.sites.iter().collect();
        site_order.sort_by(|a, b| a.id.cmp(&b.id));

        for site in site_order {
            site.id.hash(&mut hasher);
            for &stage_idx in &site.stages {
                let stage = &self.stages[stage_idx as usize];
                let team = &self.teams[stage.team as usize];
                stage.name.hash(&mut hasher);
                stage.order.hash(&mut hasher);
                team.id.hash(&mut hasher);
                team.capacity.hash(&mut hasher);
                stage.dedicated.hash(&mut hasher);
                stage.nominal_crew_size.hash(&mut hasher);
                stage.base_duration.to_bits().hash(&mut hasher);
                stage.parallel.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Short site label used in display names: the last `_` segment of the id.
/// Words dropped from a site name when building the display prefix.
const SITE_NAME_MARKERS: [&str; 2] = ["工作点", "Workpoint"];

/// Display prefix of a site: its name without the workpoint marker, or the
/// last `_` segment of its id when that leaves nothing.
fn site_label(site_id: &str, site_name: Option<&str>) -> String {
    let from_name = site_name
        .map(|name| {
            SITE_NAME_MARKERS
                .iter()
                .fold(name.to_string(), |acc, marker| acc.replace(marker, ""))
        })
        .unwrap_or_default();
    let trimmed = from_name.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    site_id.rsplit('_').next().unwrap_or(site_id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_site(stages: Vec<StageSpec>) -> CatalogSpec {
        CatalogSpec {
            teams: default_teams(),
            sites: vec![SiteSpec::new("wp_1", "Site 1", stages)],
        }
    }

    #[test]
    fn test_sample_catalog_builds() {
        let catalog = Catalog::sample().unwrap();
        assert_eq!(catalog.sites().len(), 3);
        assert_eq!(catalog.teams().len(), 6);
        // 8 + 8 explicit stages plus the 15-stage template
        assert_eq!(catalog.stage_count(), 31);
        assert_eq!(catalog.site(2).stages.len(), 15);
    }

    #[test]
    fn test_dense_indices_follow_input_order() {
        let catalog = Catalog::sample().unwrap();
        for (i, stage) in catalog.stages().iter().enumerate() {
            assert_eq!(stage.idx as usize, i);
            assert_eq!(catalog.stage_index(&stage.id), Some(stage.idx));
            assert_eq!(catalog.stage_id(stage.idx), Some(stage.id.as_str()));
        }
        let first = catalog.stage(0).unwrap();
        assert_eq!(first.id, "workpoint_1_scaffolding");
        assert_eq!(first.display_name, "1-scaffolding");
    }

    #[test]
    fn test_site_label_prefers_name() {
        assert_eq!(site_label("workpoint_1", Some("Workpoint 1")), "1");
        assert_eq!(site_label("wp_7", Some("工作点7")), "7");
        assert_eq!(site_label("wp_1", Some("North")), "North");
        assert_eq!(site_label("wp_2", Some("Workpoint")), "2");
        assert_eq!(site_label("wp_3", None), "3");
        assert_eq!(site_label("plant", None), "plant");
    }

    #[test]
    fn test_dedicated_defaults_to_team_flag() {
        let catalog = Catalog::build(&one_site(vec![
            StageSpec::new("a", 1, "team1", 5, 1.0),
            StageSpec::new("b", 2, "team2", 10, 1.0),
            StageSpec::new("c", 3, "team2", 10, 1.0).dedicated(true),
        ]))
        .unwrap();
        assert!(catalog.stage(0).unwrap().dedicated);
        assert!(!catalog.stage(1).unwrap().dedicated);
        assert!(catalog.stage(2).unwrap().dedicated);
    }

    #[test]
    fn test_zero_crew_rejected() {
        let err = Catalog::build(&one_site(vec![StageSpec::new("a", 1, "team2", 0, 5.0)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::ZeroCrewSize(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let spec = CatalogSpec {
            teams: vec![TeamSpec::new("t", 0, false)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![StageSpec::new("a", 1, "t", 1, 5.0)],
            )],
        };
        assert!(matches!(
            Catalog::build(&spec).unwrap_err(),
            CatalogError::ZeroCapacity(_)
        ));
    }

    #[test]
    fn test_unknown_team_rejected() {
        let err = Catalog::build(&one_site(vec![StageSpec::new("a", 1, "nope", 5, 5.0)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownTeam { .. }));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let err = Catalog::build(&one_site(vec![StageSpec::new("a", 1, "team2", 5, -1.0)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDuration { .. }));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = Catalog::build(&one_site(vec![
            StageSpec::new("a", 1, "team2", 5, 1.0),
            StageSpec::new("a", 2, "team2", 5, 1.0),
        ]))
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateStage(_)));
    }

    #[test]
    fn test_no_sites_rejected() {
        let spec = CatalogSpec {
            teams: default_teams(),
            sites: vec![],
        };
        assert!(matches!(
            Catalog::build(&spec).unwrap_err(),
            CatalogError::NoSites
        ));
    }

    #[test]
    fn test_floor_exceeding_capacity_rejected() {
        let spec = CatalogSpec {
            teams: vec![TeamSpec::new("tiny", 1, false)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![StageSpec::new("a", 1, "tiny", 1, 5.0)],
            )],
        };
        let catalog = Catalog::build(&spec).unwrap();
        let err = catalog
            .check_allocation_floors(&AllocationConfig::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::FloorExceedsCapacity { .. }));
    }

    #[test]
    fn test_oversized_dedicated_team_rejected() {
        // A 30-person team on a one-person stage leaves no positive duration
        let spec = CatalogSpec {
            teams: vec![TeamSpec::new("crane", 30, true)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![StageSpec::new("lift", 1, "crane", 1, 5.0)],
            )],
        };
        let catalog = Catalog::build(&spec).unwrap();
        assert!(matches!(
            catalog.check_allocation_floors(&AllocationConfig::default()),
            Err(CatalogError::NoViableCrew { workers: 30, .. })
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = Catalog::build(&one_site(vec![StageSpec::new("a", 1, "team2", 5, 0.0)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDuration { .. }));
    }

    #[test]
    fn test_from_json_parse_error() {
        assert!(matches!(
            Catalog::from_json("{not json").unwrap_err(),
            CatalogError::Parse(_)
        ));
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = Catalog::sample().unwrap();
        let b = Catalog::sample().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut spec = sample_catalog_spec();
        spec.sites[0].stages[1].base_duration = 6.0;
        let c = Catalog::build(&spec).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
