use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs};

#[derive(Deserialize)]
struct Summary {
    tp: usize,
    tn: usize,
    fp: usize,
    #[serde(rename = "fn")]
    fn_: usize,
    sensitivity: f64,
    #[serde(default)]
    matches: Option<Vec<serde_json::Value>>,
}

#[test]
fn match_triggers_counts_confusion() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let actual = dir.path().join("actual.txt");
    let detected = dir.path().join("detected.txt");
    fs::write(&actual, "10\n100\n200\n")?;
    fs::write(&detected, "12\n11\n95\n260\n")?;

    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("match-triggers")
        .arg("--actual")
        .arg(&actual)
        .arg("--detected")
        .arg(&detected)
        .args(["--tolerance", "5", "--matches"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let summary: Summary = serde_json::from_slice(&out)?;
    assert_eq!(
        (summary.tp, summary.tn, summary.fp, summary.fn_),
        (2, 0, 2, 1)
    );
    assert!((summary.sensitivity - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.matches.map(|m| m.len()), Some(5));
    Ok(())
}

#[test]
fn find_qrs_writes_annotations_and_plot() -> Result<(), Box<dyn Error>> {
    let fs_hz = 360.0;
    let beats: Vec<usize> = (180..3240).step_by(300).collect();
    let width = 0.02 * fs_hz;
    let samples: Vec<String> = (0..3600)
        .map(|i| {
            let v: f64 = beats
                .iter()
                .map(|&b| {
                    let d = (i as f64 - b as f64) / width;
                    1.2 * (-0.5 * d * d).exp()
                })
                .sum();
            v.to_string()
        })
        .collect();
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("synthetic.txt");
    fs::write(&input, samples.join("\n"))?;
    let atr = dir.path().join("synthetic.atr");
    let svg = dir.path().join("synthetic.svg");

    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("find-qrs")
        .arg("--input")
        .arg(&input)
        .arg("--annotations")
        .arg(&atr)
        .arg("--plot")
        .arg(&svg)
        .args(["--plot-xlim", "2000"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let points: Vec<usize> = serde_json::from_slice(&out)?;
    assert!(points.len() >= beats.len() - 1, "{points:?}");
    assert!(svg.exists());

    // the annotation file reads back as the detected points
    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("match-triggers")
        .arg("--actual")
        .arg(&atr)
        .arg("--detected")
        .arg(&atr)
        .args(["--tolerance", "0"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let summary: Summary = serde_json::from_slice(&out)?;
    assert_eq!(summary.tp, points.len());
    assert_eq!(summary.fp, 0);
    Ok(())
}

#[test]
fn add_noise_keeps_signal_length() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let noise = dir.path().join("noise.txt");
    fs::write(&noise, "1\n-1\n0.5\n")?;
    let signal: String = (0..20).map(|i| format!("{}\n", (i as f64 * 0.3).sin())).collect();

    let mut cmd = cargo_bin_cmd!("raccoon");
    cmd.arg("add-noise")
        .arg("--noise")
        .arg(&noise)
        .args(["--snr-db", "6"])
        .write_stdin(signal);
    let out = cmd.assert().success().get_output().stdout.clone();
    assert_eq!(String::from_utf8(out)?.lines().count(), 20);
    Ok(())
}
