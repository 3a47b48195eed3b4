#![cfg(feature = "state-persistence")]

//! Bridges over the file-backed persistent store.

use serde_json::json;
use tabsync_runtime::{
    ChannelConfig, EventChannel, FileStorage, ReactiveStorage, StorageArea, StorageScope,
    StoredValue,
};

#[test]
fn value_written_in_one_session_seeds_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.json");

    {
        let channel = EventChannel::new(ChannelConfig::new().with_location("app://first"));
        let local = StorageArea::new(FileStorage::open(&path).unwrap(), StorageScope::Local);
        let dice = ReactiveStorage::with_channel(&channel, &local, "dice").unwrap();
        let _mounted = dice.mount();

        channel
            .update_storage_json(&local, "dice", &json!({"sides": 20, "last": 17}))
            .unwrap();
        assert_eq!(dice.value().to_json(), json!({"sides": 20, "last": 17}));
    }

    let channel = EventChannel::new(ChannelConfig::new().with_location("app://second"));
    let local = StorageArea::new(FileStorage::open(&path).unwrap(), StorageScope::Local);
    let dice = ReactiveStorage::with_channel(&channel, &local, "dice").unwrap();
    assert_eq!(
        dice.value(),
        StoredValue::Json(json!({"sides": 20, "last": 17}))
    );
}

#[test]
fn removal_is_persisted_and_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.json");
    let channel = EventChannel::default();
    let local = StorageArea::new(FileStorage::open(&path).unwrap(), StorageScope::Local);

    channel.update_storage(&local, "mail", "not-json{").unwrap();
    let mail = ReactiveStorage::with_channel(&channel, &local, "mail").unwrap();
    assert_eq!(mail.value(), StoredValue::Raw("not-json{".into()));

    let _mounted = mail.mount();
    channel.remove_storage(&local, "mail").unwrap();
    assert!(mail.value().is_null());

    let reopened = FileStorage::open(&path).unwrap();
    assert!(reopened.is_empty());
}
