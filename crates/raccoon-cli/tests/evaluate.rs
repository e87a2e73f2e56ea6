use assert_cmd::cargo::cargo_bin_cmd;
use std::{error::Error, fs};

#[test]
fn evaluate_rejects_insufficient_configuration() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("eval.toml");
    fs::write(
        &config,
        r#"
input_dir = "records"
output_dir = "out"

[[detectors]]
type = "PanTompkins"
"#,
    )?;
    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("evaluate").arg(&config);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("cross-validation"), "{stderr}");
    Ok(())
}

#[test]
fn evaluate_needs_records() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("records"))?;
    let config = dir.path().join("eval.json");
    fs::write(
        &config,
        r#"{
            "input_dir": "records",
            "output_dir": "out",
            "cv_method": "loocv",
            "detectors": [{"type": "PanTompkins", "name": "pt"}]
        }"#,
    )?;
    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("evaluate").arg(&config);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("no records found"), "{stderr}");
    Ok(())
}
