use assert_cmd::Command;
use predicates::str::contains;
use serde_json::json;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tokenlayer"))
}

#[test]
fn build_runs_the_full_pipeline_and_writes_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let out_dir = temp.path().join("out");
    let config_path = temp.path().join("config.json");

    let config = json!({
        "layers": [{ "name": "base", "context": {} }],
        "sources": [{
            "layer": "base",
            "repository": {
                "kind": "virtual",
                "documents": [{
                    "uri": "colors.json",
                    "document": {
                        "color": {
                            "primary": { "type": "color", "value": "#336699" }
                        }
                    },
                    "context": {}
                }]
            },
            "pointer_template": "{stem}",
            "context": {}
        }],
        "formatters": [{ "name": "json-dump", "options": {}, "output": {} }],
        "policies": [],
        "default_out_dir": out_dir
    });
    std::fs::write(&config_path, serde_json::to_vec_pretty(&config)?)?;

    let mut cmd = cli();
    cmd.args([
        "build",
        "--config",
        config_path.to_str().unwrap(),
        "--cache-dir",
        temp.path().join("cache").to_str().unwrap(),
        "--json",
    ]);

    cmd.assert()
        .success()
        .stdout(contains("\"token_count\":1"));

    assert!(out_dir.join("tokens.json").is_file());
    Ok(())
}

#[test]
fn build_reports_missing_config_as_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;

    let mut cmd = cli();
    cmd.args([
        "build",
        "--config",
        temp.path().join("missing.json").to_str().unwrap(),
    ]);

    cmd.assert().failure().code(71);
    Ok(())
}
