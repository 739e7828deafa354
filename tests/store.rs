// Tests for the JSON-backed gains store
use smart_thermostat::hardware::{ConfigStore, JsonGainsStore};

#[tokio::test]
async fn test_missing_file_reads_as_no_stored_layer() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonGainsStore::new(dir.path().join("gains.json"));
    let gains = store.read_gains().await.unwrap();
    assert!(gains.is_none());
}

#[tokio::test]
async fn test_written_gains_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonGainsStore::new(dir.path().join("gains.json"));

    store.write_gains(1.2345, 0.0321, 0.5).await.unwrap();
    let gains = store.read_gains().await.unwrap().expect("gains stored");
    assert_eq!(gains.kp, 1.2345);
    assert_eq!(gains.ki, 0.0321);
    assert_eq!(gains.kd, 0.5);

    // second write replaces the first
    store.write_gains(0.9, 0.01, 0.1).await.unwrap();
    let gains = store.read_gains().await.unwrap().unwrap();
    assert_eq!(gains.kp, 0.9);
}

#[tokio::test]
async fn test_corrupt_file_surfaces_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gains.json");
    std::fs::write(&path, "not json at all").unwrap();

    let store = JsonGainsStore::new(path);
    assert!(store.read_gains().await.is_err());
}
