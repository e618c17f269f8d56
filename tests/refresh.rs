// tests/refresh.rs

//! Catalog refresh, selections and the operation gate.

mod common;

use common::{FlatExtractor, Fixture, OGM_XML, PayloadDownloader, StaticLister, release, sample_catalog};
use knxkit::{CacheStore, Error, OperationKind, OperationState, Repository};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_refresh_replaces_catalog_exactly() {
    let fixture = Fixture::new();
    let toolbox = &fixture.toolbox;

    let count = toolbox.refresh(true, &CancellationToken::new()).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(toolbox.repositories(), sample_catalog());

    let smaller = vec![Repository::new(
        "BEM",
        vec![release("BEM-0.9.0.zip", (0, 9, 0), false)],
    )];
    fixture.lister.set(smaller.clone());
    toolbox.refresh(true, &CancellationToken::new()).await.unwrap();

    assert_eq!(toolbox.repositories(), smaller);
    assert!(toolbox.find_repository("OGM").is_none());
}

#[tokio::test]
async fn test_refresh_persists_catalog() {
    let fixture = Fixture::new();
    fixture
        .toolbox
        .refresh(true, &CancellationToken::new())
        .await
        .unwrap();

    let store = CacheStore::new(fixture.storage());
    assert_eq!(store.load_catalog().unwrap(), sample_catalog());
}

#[tokio::test]
async fn test_refresh_without_prereleases() {
    let fixture = Fixture::new();
    fixture
        .toolbox
        .refresh(false, &CancellationToken::new())
        .await
        .unwrap();

    let sen = fixture.toolbox.find_repository("SEN").unwrap();
    let names: Vec<_> = sen.releases.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["SEN-1.0.0.zip"]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_catalog() {
    let fixture = Fixture::new();
    fixture
        .toolbox
        .refresh(true, &CancellationToken::new())
        .await
        .unwrap();

    let failing = Fixture::with(
        StaticLister::failing(),
        PayloadDownloader::new(OGM_XML),
        Arc::new(FlatExtractor::new("OGM.xml")),
    );
    std::fs::copy(
        fixture.storage().join("cache.json"),
        failing.storage().join("cache.json"),
    )
    .unwrap();
    let toolbox = failing.reopen();
    assert_eq!(toolbox.repositories(), sample_catalog());

    let err = toolbox
        .refresh(true, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RefreshError(_)));
    assert_eq!(toolbox.repositories(), sample_catalog());
    assert!(toolbox.state().is_idle());
    assert!(toolbox.availability().can_start_update);
}

#[tokio::test]
async fn test_cancelled_refresh_keeps_catalog() {
    let fixture = Fixture::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fixture.toolbox.refresh(true, &cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled(OperationKind::Refresh)));
    assert!(fixture.toolbox.repositories().is_empty());
    assert!(!fixture.storage().join("cache.json").exists());
}

#[tokio::test]
async fn test_second_operation_rejected_while_refreshing() {
    let notify = Arc::new(Notify::new());
    let fixture = Fixture::with(
        StaticLister::blocking(sample_catalog(), notify.clone()),
        PayloadDownloader::new(OGM_XML),
        Arc::new(FlatExtractor::new("OGM.xml")),
    );
    let toolbox = &fixture.toolbox;

    let cancel = CancellationToken::new();
    let refresh = toolbox.refresh(true, &cancel);
    let contender = async {
        while fixture.lister.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(toolbox.state(), OperationState::Running(OperationKind::Refresh));
        assert!(toolbox.state().is_updating());
        assert!(!toolbox.availability().can_start_update);

        let second = toolbox.refresh(true, &CancellationToken::new()).await;
        let selection = toolbox.select_repository("OGM");
        notify.notify_one();
        (second, selection)
    };

    let (refreshed, (second, selection)) = tokio::join!(refresh, contender);

    assert_eq!(refreshed.unwrap(), 2);
    assert!(second.unwrap_err().is_concurrent());
    assert!(selection.unwrap_err().is_concurrent());
    assert_eq!(fixture.lister.calls.load(Ordering::SeqCst), 1);
    assert!(toolbox.state().is_idle());
}

#[tokio::test]
async fn test_selection_rules() {
    let fixture = Fixture::new();
    let toolbox = &fixture.toolbox;

    let availability = toolbox.availability();
    assert!(availability.can_start_update);
    assert!(!availability.can_select_repository);
    assert!(!availability.can_select_release);
    assert!(!availability.can_start_download);

    toolbox.refresh(true, &CancellationToken::new()).await.unwrap();
    assert!(matches!(
        toolbox.select_release("OGM-1.2.3.zip"),
        Err(Error::NoSelectionError("repository"))
    ));

    toolbox.select_repository("SEN").unwrap();
    assert!(matches!(
        toolbox.select_release("OGM-1.2.3.zip"),
        Err(Error::SelectionMismatch { .. })
    ));

    toolbox.select_release("SEN-1.0.0.zip").unwrap();
    assert!(toolbox.availability().can_start_download);

    // a different repository drops the foreign release selection
    toolbox.select_repository("OGM").unwrap();
    assert!(toolbox.selected_release().is_none());
    assert!(!toolbox.availability().can_start_download);
    assert!(toolbox.availability().can_select_release);
}

#[tokio::test]
async fn test_refresh_clears_vanished_selection() {
    let fixture = Fixture::new();
    let toolbox = &fixture.toolbox;
    toolbox.refresh(true, &CancellationToken::new()).await.unwrap();
    toolbox.select_repository("SEN").unwrap();
    toolbox.select_release("SEN-2.0.0.zip").unwrap();

    toolbox.refresh(false, &CancellationToken::new()).await.unwrap();

    assert_eq!(toolbox.selected_repository().unwrap().name, "SEN");
    assert!(toolbox.selected_release().is_none());
}

#[tokio::test]
async fn test_storage_locked_by_another_process() {
    let fixture = Fixture::new();
    let store = CacheStore::new(fixture.storage());
    let _held = store.try_lock().unwrap().unwrap();

    let err = fixture
        .toolbox
        .refresh(true, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_concurrent());
    assert_eq!(fixture.lister.calls.load(Ordering::SeqCst), 0);
    assert!(fixture.toolbox.state().is_idle());
}
