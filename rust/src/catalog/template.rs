//! Standard stage template, default crews, and a sample catalog.

use super::spec::{CatalogSpec, SiteSpec, StageSpec, TeamSpec};

/// Base durations applied to the template stages, in template order.
pub const TEMPLATE_DURATIONS: [f64; 15] = [
    10.0, 5.0, 8.0, 6.0, 7.0, 9.0, 6.0, 7.0, 6.0, 7.0, 7.0, 7.0, 4.0, 7.0, 5.0,
];

/// The six crews used by the standard inspection pipeline.
pub fn default_teams() -> Vec<TeamSpec> {
    vec![
        TeamSpec::new("team1", 5, true),
        TeamSpec::new("team2", 10, false),
        TeamSpec::new("team3", 10, false),
        TeamSpec::new("team4", 5, true),
        TeamSpec::new("team5", 15, false),
        TeamSpec::new("team6", 5, true),
    ]
}

/// The standard 15-stage inspection/maintenance pipeline.
///
/// Order 4 is the parallel inspection block.
pub fn standard_stages() -> Vec<StageSpec> {
    let rows: [(&str, u32, &str, bool, u32, bool); 15] = [
        ("scaffolding", 1, "team1", true, 5, false),
        ("insulation_removal", 2, "team2", false, 10, false),
        ("grinding", 3, "team2", false, 10, false),
        ("macro_inspection", 4, "team3", false, 10, true),
        ("wall_thickness", 4, "team3", false, 10, true),
        ("radiographic_testing", 4, "team4", true, 5, true),
        ("surface_testing", 4, "team5", false, 15, true),
        ("ultrasonic_testing", 4, "team5", false, 15, true),
        ("other_ndt", 4, "team5", false, 15, true),
        ("ferrite_testing", 4, "team3", false, 10, true),
        ("hardness_testing", 4, "team3", false, 10, true),
        ("metallography", 4, "team3", false, 10, true),
        ("result_evaluation", 5, "team3", false, 10, false),
        ("repair", 6, "team6", true, 5, false),
        ("report_issuance", 7, "team3", false, 10, false),
    ];

    rows.iter()
        .zip(TEMPLATE_DURATIONS.iter())
        .map(|(&(name, order, team, dedicated, crew, parallel), &duration)| {
            let stage = StageSpec::new(name, order, team, crew, duration).dedicated(dedicated);
            if parallel {
                stage.parallel()
            } else {
                stage
            }
        })
        .collect()
}

/// Three-site sample: two explicit pipelines and one templated site.
pub fn sample_catalog_spec() -> CatalogSpec {
    let site_1 = vec![
        StageSpec::new("scaffolding", 1, "team1", 5, 10.0).dedicated(true),
        StageSpec::new("insulation_removal", 2, "team2", 10, 5.0),
        StageSpec::new("grinding", 3, "team2", 10, 8.0),
        StageSpec::new("macro_inspection", 4, "team3", 10, 6.0).parallel(),
        StageSpec::new("wall_thickness", 4, "team3", 10, 7.0).parallel(),
        StageSpec::new("radiographic_testing", 4, "team4", 5, 9.0)
            .dedicated(true)
            .parallel(),
        StageSpec::new("result_evaluation", 5, "team3", 10, 4.0).dedicated(true),
        StageSpec::new("report_issuance", 7, "team3", 10, 5.0).dedicated(true),
    ];
    let site_2 = vec![
        StageSpec::new("scaffolding", 1, "team1", 5, 12.0).dedicated(true),
        StageSpec::new("insulation_removal", 2, "team2", 10, 6.0),
        StageSpec::new("grinding", 3, "team2", 10, 7.0),
        StageSpec::new("surface_testing", 4, "team5", 15, 8.0).parallel(),
        StageSpec::new("ultrasonic_testing", 4, "team5", 15, 9.0).parallel(),
        StageSpec::new("result_evaluation", 5, "team3", 10, 5.0).dedicated(true),
        StageSpec::new("repair", 6, "team6", 5, 8.0).dedicated(true),
        StageSpec::new("report_issuance", 7, "team3", 10, 4.0).dedicated(true),
    ];

    CatalogSpec {
        teams: default_teams(),
        sites: vec![
            SiteSpec::new("workpoint_1", "Workpoint 1", site_1),
            SiteSpec::new("workpoint_2", "Workpoint 2", site_2),
            SiteSpec::new("workpoint_3", "Workpoint 3", Vec::new()),
        ],
    }
}
