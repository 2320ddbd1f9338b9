//! Integration tests for verified sorting.
//!
//! Tests cover:
//! - Identified vs. Unidentified gating on confidence and IoU
//! - Images without a reference row
//! - Missing image files
//! - The verification log layout

mod common;

use std::path::Path;

use xrayprep::tasks::run_verified_sorting;
use xrayprep::tasks::verify::LOG_FILE_NAME;

use common::*;

/// a: good box, b: wrong place, c: low confidence, d: no reference, e: missing.
fn setup(root: &Path) -> VerifyConfig {
    let images = root.join("Image_512");
    write_png(&images.join("a.png"), 32, 10);
    write_png(&images.join("b.png"), 32, 20);
    write_png(&images.join("c.png"), 32, 30);
    write_png(&images.join("d.png"), 32, 40);

    write_file(
        &root.join("train.csv"),
        "Image Index,Finding Label\n\
         a.png,Mass\n\
         b.png,Nodule\n\
         a.png,Effusion\n\
         c.png,Mass\n\
         d.png,Mass\n\
         e.png,Mass\n",
    );
    write_file(
        &root.join("reference.csv"),
        "Image Index,x,y,w,h\n\
         a.png,0,0,512,512\n\
         a.png,900,900,10,10\n\
         b.png,0,0,512,512\n\
         c.png,256,256,512,512\n",
    );

    VerifyConfig {
        images_csv: root.join("train.csv"),
        reference_csv: root.join("reference.csv"),
        image_dir: images,
        output_root: root.join("Sorted_Results"),
        ..Default::default()
    }
}

fn detector() -> ScriptedDetector {
    ScriptedDetector::new()
        .answer(10, 0.92, BoundingBox::new(0.0, 0.0, 0.5, 0.5))
        .answer(20, 0.95, BoundingBox::new(0.5, 0.5, 0.5, 0.5))
        .answer(30, 0.40, BoundingBox::new(0.25, 0.25, 0.5, 0.5))
}

#[test]
fn test_sorts_into_buckets() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let summary = run_verified_sorting(&config, &detector())?;

    assert_eq!(summary.total, 5, "duplicates in the image list count once");
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.identified, 1);
    assert_eq!(summary.unidentified, 2);
    assert_eq!(summary.no_ref, 1);

    let identified = config.output_root.join("Identified");
    let unidentified = config.output_root.join("Unidentified");
    assert_eq!(file_names(&identified), vec!["a.png"]);
    assert_eq!(file_names(&unidentified), vec!["b.png", "c.png", "d.png"]);

    // Sources are copied, never moved.
    assert_eq!(
        file_names(&config.image_dir),
        vec!["a.png", "b.png", "c.png", "d.png"]
    );
    Ok(())
}

#[test]
fn test_first_reference_row_is_used() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let summary = run_verified_sorting(&config, &detector())?;
    let a = summary
        .outcomes
        .iter()
        .find(|o| o.image_index == "a.png")
        .expect("a.png has an outcome");

    assert!(a.iou > 0.99, "iou was {}", a.iou);
    assert_eq!(a.status, VerificationStatus::Identified);
    Ok(())
}

#[test]
fn test_log_lists_every_present_image() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let summary = run_verified_sorting(&config, &detector())?;
    assert_eq!(summary.log_path, config.output_root.join(LOG_FILE_NAME));

    let mut reader = csv::Reader::from_path(&summary.log_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["Image Index", "Confidence", "IoU", "Status"]);

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    let by_name = |name: &str| {
        rows.iter()
            .find(|r| &r[0] == name)
            .unwrap_or_else(|| panic!("{name} missing from log"))
            .clone()
    };
    assert_eq!(rows.len(), 4, "missing images are not logged");

    let a = by_name("a.png");
    assert_eq!(a[1].parse::<f64>()?, 0.92);
    assert_eq!(a[2].parse::<f64>()?, 1.0);
    assert_eq!(&a[3], "Identified");

    let b = by_name("b.png");
    assert_eq!(b[2].parse::<f64>()?, 0.0);
    assert_eq!(&b[3], "Unidentified");

    let d = by_name("d.png");
    assert_eq!(d[1].parse::<f64>()?, 0.0);
    assert_eq!(d[2].parse::<f64>()?, 0.0);
    assert_eq!(&d[3], "Unidentified (No Ref)");
    Ok(())
}

#[test]
fn test_stricter_thresholds_demote_images() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = VerifyConfig {
        conf_threshold: 0.95,
        ..setup(dir.path())
    };

    let summary = run_verified_sorting(&config, &detector())?;
    assert_eq!(summary.identified, 0);
    assert_eq!(summary.unidentified, 3);
    Ok(())
}

#[test]
fn test_inference_failure_aborts_run() {
    let dir = create_workspace();
    let config = setup(dir.path());

    // No answer scripted for c.png.
    let detector = ScriptedDetector::new()
        .answer(10, 0.92, BoundingBox::new(0.0, 0.0, 0.5, 0.5))
        .answer(20, 0.95, BoundingBox::new(0.5, 0.5, 0.5, 0.5));

    let result = run_verified_sorting(&config, &detector);
    assert!(result.is_err());
    assert!(!config.output_root.join(LOG_FILE_NAME).exists());
}
