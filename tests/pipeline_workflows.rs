//! Conjure a repository on disk, then read it back with perceive.

use std::fs;

use rpki_forge::infra::config::{ConfigManager, RepositoryConfiguration};
use rpki_forge::pipelines::conjure::{ConjureOptions, ConjureWorkflow};
use rpki_forge::pipelines::perceive::{PerceiveOptions, PerceiveWorkflow};
use rpki_forge::{ContentTypeRegistry, TrustAnchorLocator};
use tempfile::TempDir;

fn conjure(root: &std::path::Path) {
    let config = RepositoryConfiguration {
        key_bits: 1024,
        ..RepositoryConfiguration::default()
    };
    ConjureWorkflow::new(config)
        .run(root, &ConjureOptions::demo().unwrap())
        .unwrap();
}

#[test]
fn conjured_repository_is_perceivable() {
    let temp = TempDir::new().unwrap();
    conjure(temp.path());

    let registry = ContentTypeRegistry::builtins();
    let workflow = PerceiveWorkflow::new(&registry, PerceiveOptions::default());
    let ca_dir = temp.path().join("repo/rpki.example.net/rpki/TA/CA");

    let mut names = Vec::new();
    for entry in fs::read_dir(&ca_dir).unwrap() {
        let path = entry.unwrap().path();
        if let Some(json) = workflow.perceive_file(&path).unwrap() {
            names.push(json["name"].as_str().unwrap().to_string());
        }
    }
    names.sort();
    assert_eq!(names, vec!["routeOriginAuthz", "rpkiGhostbusters", "rpkiManifest"]);
}

#[test]
fn conjured_tal_points_at_written_certificate() {
    let temp = TempDir::new().unwrap();
    conjure(temp.path());

    let text = fs::read_to_string(temp.path().join("tals/TA.tal")).unwrap();
    let tal = TrustAnchorLocator::parse(&text).unwrap();
    let rel = tal.uris[0].trim_start_matches("rsync://");
    assert!(temp.path().join("repo").join(rel).is_file());
}

#[test]
fn configuration_drives_conjure() {
    let temp = TempDir::new().unwrap();
    let manager = ConfigManager::with_path(temp.path().join("config.toml"));
    manager.load_or_create_default().unwrap();
    manager.update_value("base_uri", "rsync://repo.test/module").unwrap();
    manager.update_value("ca_name", "Child").unwrap();
    manager.update_value("key_bits", "1024").unwrap();

    let out = temp.path().join("out");
    ConjureWorkflow::new(manager.load().unwrap())
        .run(&out, &ConjureOptions::demo().unwrap())
        .unwrap();
    assert!(out.join("repo/repo.test/module/TA/Child.cer").is_file());
    assert!(out.join("repo/repo.test/module/TA/Child/manifest.mft").is_file());
}
