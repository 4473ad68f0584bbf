use std::path::PathBuf;

use serde_json::json;

use placidial::{
    config_store::{ConfigStore, FileConfigStore},
    settings::Settings,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("placidial-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_absent_file_reads_as_none() {
    let store = FileConfigStore::new(temp_path("settings.json"));
    assert_eq!(store.read(), None);
}

#[test]
fn test_malformed_file_reads_as_none() {
    let path = temp_path("settings.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{\"batwarn\": ").unwrap();

    let store = FileConfigStore::new(&path);
    assert_eq!(store.read(), None);

    std::fs::write(&path, "\"just a string\"").unwrap();
    assert_eq!(store.read(), None);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_write_creates_directories_and_round_trips() {
    let path = temp_path("nested/settings.json");
    let store = FileConfigStore::new(&path);

    let mut settings = Settings::new();
    settings.insert("batwarn", 30);
    settings.insert("colorflip", false);
    settings.insert("hourcol", json!([0, 85, 170]));
    store.write(&settings).unwrap();

    assert!(path.exists());
    assert_eq!(store.read(), Some(settings.clone()));

    // A later save replaces the earlier one.
    let mut newer = Settings::new();
    newer.insert("batwarn", 5);
    store.write(&newer).unwrap();
    assert_eq!(store.read(), Some(newer));

    std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).unwrap();
}
