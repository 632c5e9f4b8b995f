use bt_core::state_machine::BotStatus;
use bt_core::store::{load_json, save_json, JsonFileStore, StateStore, KEY_BOTS, KEY_CONFIG};
use bt_core::types::{BotPreferences, BotPriority, Specialization, TeamBot, TeamConfig};

fn bot() -> TeamBot {
    TeamBot::new(
        "Reviewer",
        Specialization::CodeReviewer,
        "claude-sonnet",
        BotPreferences {
            target_paths: vec!["src/**".into()],
            exclude_paths: vec![],
            schedule_minutes: 30,
            auto_approve: false,
            max_tasks_per_cycle: 5,
            priority: BotPriority::High,
            custom_instructions: None,
        },
    )
}

#[test]
fn missing_key_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    assert!(store.get(KEY_BOTS).unwrap().is_none());
    assert!(!store.remove(KEY_BOTS).unwrap());
}

#[test]
fn put_is_visible_to_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut original = bot();
    original.status = BotStatus::Active;
    {
        let store = JsonFileStore::new(dir.path());
        save_json(&store, KEY_BOTS, &vec![original.clone()]).unwrap();
    }
    let reopened = JsonFileStore::new(dir.path());
    let loaded: Vec<TeamBot> = load_json(&reopened, KEY_BOTS).unwrap().unwrap();
    assert_eq!(loaded, vec![original]);
}

#[test]
fn put_overwrites_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    save_json(&store, KEY_CONFIG, &TeamConfig::default()).unwrap();
    let updated = TeamConfig {
        enabled: false,
        ..TeamConfig::default()
    };
    save_json(&store, KEY_CONFIG, &updated).unwrap();

    let loaded: TeamConfig = load_json(&store, KEY_CONFIG).unwrap().unwrap();
    assert!(!loaded.enabled);

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["team-config.json".to_string()]);
}

#[test]
fn corrupt_file_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("team-bots.json"), "{not json").unwrap();
    let store = JsonFileStore::new(dir.path());
    let err = store.get(KEY_BOTS).expect_err("corrupt");
    assert!(err.to_string().starts_with("Serialization error"));
}
