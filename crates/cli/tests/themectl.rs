use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = r#"<header class="header">
  {% render 'icon-cart' %}
</header>
{% schema %}
{
  "name": "Header",
  "settings": [
    { "type": "image_picker", "id": "logo", "label": "Logo" }
  ]
}
{% endschema %}
"#;

fn setup_theme() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    for dir in ["layout", "sections", "snippets", "assets"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    fs::write(
        root.join("layout/theme.liquid"),
        "{% section 'header' %}\n{{ content_for_layout }}\n{% section 'footer' %}\n",
    )
    .unwrap();
    fs::write(root.join("sections/header.liquid"), HEADER).unwrap();
    fs::write(
        root.join("sections/footer.liquid"),
        "<footer class=\"footer\">{{ 'footer.copyright' | t }}</footer>\n",
    )
    .unwrap();
    fs::write(
        root.join("snippets/icon-cart.liquid"),
        "<svg class=\"icon icon-cart\"></svg>\n",
    )
    .unwrap();
    fs::write(
        root.join("assets/base.css"),
        ".header { display: flex; }\n.footer { padding: 0; }\n",
    )
    .unwrap();
    temp
}

#[allow(deprecated)]
fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = Command::cargo_bin("themectl")
        .expect("binary")
        .current_dir(workdir)
        .env_remove("THEME_POLICY_TIER")
        .env_remove("THEME_POLICY_CONFIG")
        .arg("--json")
        .arg("--quiet")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn index_persists_map_and_lookup_finds_basename() {
    let temp = setup_theme();
    let root = temp.path();

    let summary = run_json(root, &["index", "."]);
    assert_eq!(summary["files"], 5);
    assert!(root.join(".theme-map").is_dir());

    let result = run_json(root, &["lookup", ".", "footer.liquid"]);
    assert_eq!(result["targets"][0]["path"], "sections/footer.liquid");
    assert_eq!(result["confident"], true);
}

#[test]
fn chunk_reports_schema_settings() {
    let temp = setup_theme();
    let chunks = run_json(temp.path(), &["chunk", "sections/header.liquid"]);
    let chunks = chunks.as_array().unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c["file"] == "sections/header.liquid"));
}

#[test]
fn keyword_only_search_tags_keyword() {
    let temp = setup_theme();
    let hits = run_json(temp.path(), &["search", ".", "footer", "--keyword-only"]);
    let hits = hits.as_array().unwrap();
    assert!(!hits.is_empty());
    assert!(hits
        .iter()
        .all(|h| h["sources"] == serde_json::json!(["keyword"])));
}

#[test]
fn context_respects_budget() {
    let temp = setup_theme();
    let bundle = run_json(temp.path(), &["context", ".", "header logo", "--budget", "60"]);
    assert_eq!(bundle["included"][0]["path"], "sections/header.liquid");
    assert!(bundle["used_tokens"].as_u64().unwrap() <= 60);
}

#[test]
fn policy_tier_from_flag_and_config() {
    let temp = tempdir().unwrap();
    let policy = run_json(temp.path(), &["policy", "--tier", "aggressive"]);
    assert_eq!(policy["tier"], "aggressive");
    assert_eq!(policy["thresholds"]["read_only_streak_limit"], 3);

    let config = temp.path().join("policy.toml");
    fs::write(&config, "tier = \"aggressive\"\n\n[tiers.aggressive]\nmax_rethinks = 5\n").unwrap();
    let policy = run_json(
        temp.path(),
        &["policy", "--policy-config", config.to_str().unwrap()],
    );
    assert_eq!(policy["thresholds"]["max_rethinks"], 5);
}

#[test]
#[allow(deprecated)]
fn unknown_tier_is_rejected() {
    Command::cargo_bin("themectl")
        .expect("binary")
        .args(["policy", "--tier", "reckless"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reckless"));
}
