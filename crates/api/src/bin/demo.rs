//! Synchronous demo entry: captures a sample job through the intake path and
//! writes its bundle under ./runs, printing where it landed. Exits 0 on
//! success.

use estiflow::intake::{self, IntakeForm};

fn main() -> anyhow::Result<()> {
    let run_root = std::path::PathBuf::from(
        std::env::var("ESTIFLOW_RUN_ROOT").unwrap_or_else(|_| "./runs".to_string()),
    );

    let form = IntakeForm {
        client: "Acme Builders Ltd.".to_string(),
        site_address: "123 Industrial Rd, Toronto".to_string(),
        estimator: "D. Reyes".to_string(),
        estimate_type: "NSD".to_string(),
        building_type: "Warehouse".to_string(),
        building_material: "Precast".to_string(),
        building_height: "26".to_string(),
        scope_description: "Reline warehouse walls and ceiling".to_string(),
        exclusions: "Permits".to_string(),
        segments_json: r#"[
            {"length_ft": 120, "angle_deg": 0},
            {"length_ft": 80, "angle_deg": 90},
            {"length_ft": 120, "angle_deg": 180},
            {"length_ft": 80, "angle_deg": 270}
        ]"#
        .to_string(),
        openings_json: r#"[
            {"type": "dock", "width_ft": 10, "height_ft": 10, "wall_index": 0, "offset_ft": 20}
        ]"#
        .to_string(),
    };

    let (bundle, path) = intake::process(&form, &run_root)?;
    println!("Wrote {} ({})", path.display(), bundle.job.id);
    Ok(())
}
