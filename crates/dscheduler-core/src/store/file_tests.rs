use super::*;
use crate::model::JobSpec;
use tempfile::TempDir;

fn spec(name: &str, group: &str) -> JobSpec {
    JobSpec::new(name, group, "SampleJob", "0 0 0/1 * * ?").with_description("test job")
}

async fn submit(store: &FileJobStore, name: &str, group: &str) -> JobIdentity {
    let (definition, trigger) = spec(name, group).into_parts();
    let id = definition.identity.clone();
    store.submit_job_and_trigger(definition, trigger).await.unwrap();
    id
}

#[tokio::test]
async fn test_file_job_store_save_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let id = {
        let store = FileJobStore::open(temp_dir.path()).await.unwrap();
        submit(&store, "report", "g1").await
    };

    let reopened = FileJobStore::open(temp_dir.path()).await.unwrap();
    let definition = reopened.job_definition(&id).await.unwrap().unwrap();
    assert_eq!(definition.executable, "SampleJob");
    assert_eq!(definition.description.as_deref(), Some("test job"));

    let triggers = reopened.triggers_for_job(&id).await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].state, TriggerState::Normal);
}

#[tokio::test]
async fn test_file_job_store_pause_persists() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileJobStore::open(temp_dir.path()).await.unwrap();
    let id = submit(&store, "report", "g1").await;
    store.pause(&id).await.unwrap();
    drop(store);

    let reopened = FileJobStore::open(temp_dir.path()).await.unwrap();
    let state = reopened.trigger_state(&TriggerKey::for_job(&id)).await.unwrap();
    assert_eq!(state, TriggerState::Paused);
}

#[tokio::test]
async fn test_file_job_store_delete_removes_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileJobStore::open(temp_dir.path()).await.unwrap();
    let id = submit(&store, "to-delete", "g1").await;
    assert!(store.job_path(&id).exists());

    store.delete(&id).await.unwrap();
    assert!(!store.job_path(&id).exists());
    assert!(!store.job_exists(&id).await.unwrap());
}

#[tokio::test]
async fn test_file_job_store_group_operations() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileJobStore::open(temp_dir.path()).await.unwrap();
    for i in 0..3 {
        submit(&store, &format!("job-{}", i), "g1").await;
    }
    submit(&store, "other", "g2").await;

    assert_eq!(store.pause_group("g1").await.unwrap(), 3);
    drop(store);

    let reopened = FileJobStore::open(temp_dir.path()).await.unwrap();
    assert_eq!(reopened.list_job_identities().await.unwrap().len(), 4);
    let paused = reopened
        .trigger_state(&TriggerKey::for_job(&JobIdentity::new("job-0", "g1")))
        .await
        .unwrap();
    assert_eq!(paused, TriggerState::Paused);
    let untouched = reopened
        .trigger_state(&TriggerKey::for_job(&JobIdentity::new("other", "g2")))
        .await
        .unwrap();
    assert_eq!(untouched, TriggerState::Normal);
}

#[tokio::test]
async fn test_file_job_store_skips_corrupt_files() {
    let temp_dir = TempDir::new().unwrap();
    let jobs_dir = temp_dir.path().join("jobs");
    std::fs::create_dir_all(&jobs_dir).unwrap();
    std::fs::write(jobs_dir.join("broken.json"), "{ not json").unwrap();
    std::fs::write(jobs_dir.join("notes.txt"), "ignored").unwrap();

    let store = FileJobStore::open(temp_dir.path()).await.unwrap();
    assert!(store.list_job_identities().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_job_store_invalid_cron_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileJobStore::open(temp_dir.path()).await.unwrap();
    let (definition, trigger) = JobSpec::new("bad", "g1", "SampleJob", "61 * * * * ?").into_parts();
    let id = definition.identity.clone();

    let err = store.submit_job_and_trigger(definition, trigger).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidSchedule { .. }));
    assert!(!store.job_path(&id).exists());
}

#[test]
fn test_encode_component() {
    assert_eq!(FileJobStore::encode_component("report-1"), "report-1");
    assert_eq!(FileJobStore::encode_component("a_b"), "a_5fb");
    assert_eq!(FileJobStore::encode_component("a/b"), "a_2fb");
    assert_eq!(FileJobStore::encode_component("a.b"), "a_2eb");
    assert_eq!(FileJobStore::encode_component("G1"), "_471");
}

#[tokio::test]
async fn test_file_job_store_colliding_names_keep_separate_files() {
    let temp_dir = TempDir::new().unwrap();
    let pairs = [
        ("a/b", "g"),
        ("a_b", "g"),
        ("b.c", "a"),
        ("c", "a.b"),
        ("Report", "g1"),
        ("report", "g1"),
    ];
    {
        let store = FileJobStore::open(temp_dir.path()).await.unwrap();
        for (name, group) in pairs {
            submit(&store, name, group).await;
        }
        let paths: BTreeSet<PathBuf> = pairs
            .iter()
            .map(|(name, group)| store.job_path(&JobIdentity::new(*name, *group)))
            .collect();
        assert_eq!(paths.len(), pairs.len());

        // deleting one must not touch its look-alike
        store.delete(&JobIdentity::new("a_b", "g")).await.unwrap();
    }

    let reopened = FileJobStore::open(temp_dir.path()).await.unwrap();
    let live = reopened.list_job_identities().await.unwrap();
    assert_eq!(live.len(), pairs.len() - 1);
    assert!(live.contains(&JobIdentity::new("a/b", "g")));
    assert!(!live.contains(&JobIdentity::new("a_b", "g")));
    assert!(live.contains(&JobIdentity::new("b.c", "a")));
    assert!(live.contains(&JobIdentity::new("c", "a.b")));
    assert!(live.contains(&JobIdentity::new("Report", "g1")));
}
