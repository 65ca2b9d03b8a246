//! Serializable catalog input.

use serde::{Deserialize, Serialize};

/// Complete catalog description: teams plus sites in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub teams: Vec<TeamSpec>,
    pub sites: Vec<SiteSpec>,
}

/// A crew that stages draw workers from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSpec {
    pub id: String,
    pub capacity: u32,
    #[serde(default)]
    pub dedicated: bool,
}

/// A workpoint and its stage pipeline.
///
/// An empty `stages` list expands to the standard template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "steps")]
    pub stages: Vec<StageSpec>,
}

/// One stage definition inside a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub order: u32,
    pub team: String,
    /// Falls back to the team's flag when absent.
    #[serde(default)]
    pub dedicated: Option<bool>,
    #[serde(alias = "team_size")]
    pub nominal_crew_size: u32,
    #[serde(alias = "duration")]
    pub base_duration: f64,
    #[serde(default)]
    pub parallel: bool,
}

impl TeamSpec {
    pub fn new(id: impl Into<String>, capacity: u32, dedicated: bool) -> Self {
        Self {
            id: id.into(),
            capacity,
            dedicated,
        }
    }
}

impl SiteSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            stages,
        }
    }
}

impl StageSpec {
    pub fn new(
        name: impl Into<String>,
        order: u32,
        team: impl Into<String>,
        nominal_crew_size: u32,
        base_duration: f64,
    ) -> Self {
        Self {
            name: name.into(),
            order,
            team: team.into(),
            dedicated: None,
            nominal_crew_size,
            base_duration,
            parallel: false,
        }
    }

    pub fn dedicated(mut self, dedicated: bool) -> Self {
        self.dedicated = Some(dedicated);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }
}
