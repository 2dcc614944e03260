//! End-to-end tests for the library service: bootstrap, sync, views and
//! user edits.

use async_trait::async_trait;
use core_library::{
    FilterState, SortColumn, SortState, SyncRunStatus, TrackEntry, TrackId, TriState,
};
use core_metadata::{MetadataExtractor, TrackMetadata};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, LibraryEvent, SyncEvent};
use core_service::{CoreError, LibraryService};
use core_sync::SyncError;
use mockall::mock;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

mock! {
    Extractor {}

    #[async_trait]
    impl MetadataExtractor for Extractor {
        async fn extract(&self, path: &Path) -> core_metadata::Result<TrackMetadata>;
    }
}

/// Extractor mapping "<title>-<artist>.mp3" file names to tags.
fn extractor() -> Arc<dyn MetadataExtractor> {
    let mut mock = MockExtractor::new();
    mock.expect_extract().returning(|path| {
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        let (title, artist) = stem.split_once('-').unwrap_or((stem.as_str(), ""));
        Ok(TrackMetadata {
            title: title.to_string(),
            artist: artist.to_string(),
            album: "Album".to_string(),
            duration_ms: 60_000 + title.len() as u64,
        })
    });
    Arc::new(mock)
}

async fn in_memory_service() -> LibraryService {
    let config = CoreConfig::builder().in_memory_database().build().unwrap();
    LibraryService::with_extractor(config, extractor())
        .await
        .unwrap()
}

fn music_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        fs::write(dir.path().join(name), name.as_bytes()).unwrap();
    }
    dir
}

async fn sync(service: &LibraryService, folder: &Path) -> core_sync::SyncReport {
    let (handle, mut events) = service.start_sync_with_channel(folder).unwrap();
    while let Some(event) = events.recv().await {
        if event.is_terminal() {
            break;
        }
    }
    handle.wait().await.unwrap()
}

fn titles(entries: &[TrackEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.track.title.as_str()).collect()
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() {
    let mut config = CoreConfig::builder().in_memory_database().build().unwrap();
    config.event_buffer_size = 0;

    let result = LibraryService::with_extractor(config, extractor()).await;
    assert!(matches!(result, Err(CoreError::Config(_))));
}

#[tokio::test]
async fn test_sync_then_view_with_tags_and_ratings() {
    let service = in_memory_service().await;
    let dir = music_dir(&["T1-Ann.mp3", "T2-Bob.mp3", "T3-Cy.mp3"]);

    let report = sync(&service, dir.path()).await;
    assert_eq!(report.status, SyncRunStatus::Completed);
    assert_eq!(report.summary.added, 3);

    let snapshot = service.snapshot().await.unwrap();
    let id_of = |title: &str| {
        snapshot
            .iter()
            .find(|e| e.track.title == title)
            .unwrap()
            .track
            .id
    };
    let (t1, t2, t3) = (id_of("T1"), id_of("T2"), id_of("T3"));

    let rock = service.create_tag("Rock", "#ff0000").await.unwrap();
    let jazz = service.create_tag("Jazz", "#0000ff").await.unwrap();
    service.assign_tag(t1, rock.id).await.unwrap();
    service.assign_tag(t3, jazz.id).await.unwrap();
    service.set_rating(t1, 5).await.unwrap();
    service.set_rating(t2, 3).await.unwrap();
    service.set_rating(t3, 5).await.unwrap();

    let mut sort = SortState::default();
    sort.click(SortColumn::Title);

    let mut filter = FilterState::default();
    filter.set_rating(5, TriState::Include);
    let view = service.view(&filter, &sort).await.unwrap();
    assert_eq!(titles(&view), vec!["T1", "T3"]);

    filter.set_tag(jazz.id, TriState::Exclude);
    let view = service.view(&filter, &sort).await.unwrap();
    assert_eq!(titles(&view), vec!["T1"]);

    filter.clear();
    filter.set_query("bob");
    let view = service.view(&filter, &sort).await.unwrap();
    assert_eq!(titles(&view), vec!["T2"]);
}

#[tokio::test]
async fn test_ratings_survive_resync() {
    let service = in_memory_service().await;
    let dir = music_dir(&["Song-Ann.mp3"]);
    sync(&service, dir.path()).await;

    let id = service.snapshot().await.unwrap()[0].track.id;
    service.set_rating(id, 4).await.unwrap();
    fs::write(dir.path().join("Song-Ann.mp3"), b"new bytes").unwrap();

    let report = sync(&service, dir.path()).await;
    assert_eq!(report.summary.updated, 1);

    let track = service.track(id).await.unwrap().unwrap();
    assert_eq!(track.rating, 4);
    assert_eq!(track.fingerprint, core_metadata::fingerprint_bytes(b"new bytes"));
    assert!(service.track(TrackId(9_999)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_library_events_are_published() {
    let service = in_memory_service().await;
    let dir = music_dir(&["A-Ann.mp3"]);
    sync(&service, dir.path()).await;
    let id = service.snapshot().await.unwrap()[0].track.id;

    let mut events = service.subscribe();
    let tag = service.create_tag("Live", "#abc").await.unwrap();
    assert_eq!(service.set_rating(id, 9).await.unwrap(), 5);
    assert_eq!(service.tag(tag.id).await.unwrap(), Some(tag.clone()));
    assert!(service.delete_tag(tag.id).await.unwrap());
    assert!(service.tag(tag.id).await.unwrap().is_none());

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::TagCreated {
            tag_id: tag.id.0,
            name: "Live".to_string()
        })
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::RatingChanged {
            track_id: id.0,
            rating: 5
        })
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::TagDeleted { tag_id: tag.id.0 })
    );
}

#[tokio::test]
async fn test_sync_events_reach_subscribers() {
    let service = in_memory_service().await;
    let dir = music_dir(&["A-Ann.mp3", "B-Bob.mp3"]);
    let mut events = service.subscribe();

    let report = sync(&service, dir.path()).await;

    let mut seen = Vec::new();
    while let Some(Ok(CoreEvent::Sync(event))) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(SyncEvent::Started { total_files: 2, .. })));
    assert!(matches!(
        seen.last(),
        Some(SyncEvent::Completed { summary, .. }) if summary.added == 2
    ));
    assert!(seen.iter().all(|e| e.run_id() == report.run_id.to_string()));
}

#[tokio::test]
async fn test_start_while_syncing_is_rejected() {
    let service = in_memory_service().await;
    let dir = music_dir(&["A-Ann.mp3"]);

    let (first, _events) = service.start_sync_with_channel(dir.path()).unwrap();
    assert!(service.is_syncing());

    let second = service.start_sync_with_channel(dir.path());
    assert!(matches!(
        second,
        Err(CoreError::Sync(SyncError::AlreadyRunning { .. }))
    ));

    first.wait().await.unwrap();
    assert!(!service.is_syncing());
    assert!(!service.cancel_sync());
}

#[tokio::test]
async fn test_file_database_persists_across_restarts() {
    let data = TempDir::new().unwrap();
    let db_path = data.path().join("catalog.db");
    let dir = music_dir(&["A-Ann.mp3", "B-Bob.mp3"]);

    {
        let config = CoreConfig::builder().database_path(&db_path).build().unwrap();
        let service = LibraryService::with_extractor(config, extractor())
            .await
            .unwrap();
        sync(&service, dir.path()).await;
        let id = service.snapshot().await.unwrap()[0].track.id;
        service.set_rating(id, 2).await.unwrap();
        service.shutdown(None).await.unwrap();
    }

    let config = CoreConfig::builder().database_path(&db_path).build().unwrap();
    let service = LibraryService::with_extractor(config, extractor())
        .await
        .unwrap();

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].track.rating, 2);

    let history = service.sync_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncRunStatus::Completed);
    assert_eq!(history[0].added, 2);

    let report = sync(&service, dir.path()).await;
    assert_eq!(report.summary.changes(), 0);
}
