//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version is consistent across all Cargo.toml files.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("workspace root")
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    toml::from_str(&text)
        .unwrap_or_else(|e| panic!("parse {}: {}", path.display(), e))
}

/// Read the workspace version from the root Cargo.toml.
fn workspace_version() -> String {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    doc["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version")
        .to_string()
}

/// Workspace members as listed in the root manifest.
fn members() -> Vec<String> {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    doc["workspace"]["members"]
        .as_array()
        .expect("workspace.members")
        .iter()
        .filter_map(|m| m.as_str().map(str::to_string))
        .collect()
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    let members = members();
    assert!(!members.is_empty());

    for krate in &members {
        let doc = read_toml(&root.join(krate).join("Cargo.toml"));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool())
            == Some(true);
        assert!(inherits, "{} should use version.workspace = true", krate);
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let ws_version = workspace_version();
    let pkg_version = env!("CARGO_PKG_VERSION");
    assert_eq!(
        ws_version, pkg_version,
        "workspace version ({}) != CARGO_PKG_VERSION ({})",
        ws_version, pkg_version
    );
    assert_eq!(credence_core::VERSION, pkg_version);
}
