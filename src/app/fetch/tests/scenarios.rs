//! End-to-end behaviour of the fetch orchestrator

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::support::{client, eventually, payload, Fixture, RecordingSelector, Reply};
use crate::app::fetch::{FetchConfig, ResponseSink};
use crate::app::models::{CacheStatus, Resource, ResourceId};
use crate::app::storage::StorageProvider;
use crate::app::throttle::Speed;
use crate::errors::FetchError;

const PACKAGE: &str = "foo-1.0-1-x86_64.pkg.tar.zst";

#[tokio::test]
async fn test_concurrent_clients_share_one_upstream_get() {
    let fixture = Fixture::new(FetchConfig::default().with_buffer_size(1024));
    let data = payload(64 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.upstream.pace(&path, 4096, Duration::from_millis(10));

    let mut first = ResponseSink::new(Vec::new());
    let mut second = ResponseSink::new(Vec::new());
    let (a, b) = tokio::join!(
        fixture.orchestrator.fetch(&resource, client(&mut first), None),
        fixture.orchestrator.fetch(&resource, client(&mut second), None),
    );

    assert_eq!(a.unwrap(), CacheStatus::Stream);
    assert_eq!(b.unwrap(), CacheStatus::Stream);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![0]);

    for sink in [&first, &second] {
        assert_eq!(sink.header("X-Cache"), Some("STREAM"));
        assert_eq!(sink.content_length(), Some(data.len() as u64));
    }
    assert_eq!(first.into_writer(), data);
    assert_eq!(second.into_writer(), data);

    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
    assert!(fixture.partial_bytes(&resource).await.is_none());

    // The next request is a plain hit
    let mut third = ResponseSink::new(Vec::new());
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut third), None)
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(third.header("X-Cache"), Some("HIT"));
    assert_eq!(fixture.upstream.get_offsets(&path).len(), 1);
}

#[tokio::test]
async fn test_background_callers_share_one_fetch() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(32 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.upstream.pace(&path, 4096, Duration::from_millis(10));

    let (a, b) = tokio::join!(
        fixture.orchestrator.prefetch(&resource, None),
        fixture.orchestrator.prefetch(&resource, None),
    );

    assert_eq!(a.unwrap(), CacheStatus::Fetched);
    assert_eq!(b.unwrap(), CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![0]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_completion_replaces_partial_with_full() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap().len(), data.len());
    assert!(fixture.partial_bytes(&resource).await.is_none());
    assert!(fixture.orchestrator.active_fetches().is_empty());
}

#[tokio::test]
async fn test_integrity_failure_leaves_nothing_behind() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = fixture.package(PACKAGE, b"the expected content");
    fixture
        .upstream
        .serve(resource.uri.path(), b"something else entirely");

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Discarded);
    assert!(fixture.full_bytes(&resource).await.is_none());
    assert!(fixture.partial_bytes(&resource).await.is_none());
}

#[tokio::test]
async fn test_integrity_check_can_be_disabled() {
    let fixture = Fixture::new(FetchConfig::default().with_checksum_integrity_check(false));
    let resource = fixture.package(PACKAGE, b"the expected content");
    fixture
        .upstream
        .serve(resource.uri.path(), b"something else entirely");

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert!(fixture.full_bytes(&resource).await.is_some());
    assert!(fixture.orchestrator.verify_cached(&resource, false).await.is_none());
}

#[tokio::test]
async fn test_resume_requests_partial_length() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    fixture.write_partial(&resource, &data[..3000]).await;

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    // The digest covers resumed bytes too, so a pass proves the prefix was hashed
    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(resource.uri.path()), vec![3000]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_resume_disabled_starts_from_zero() {
    let fixture = Fixture::new(FetchConfig::default().with_reuse_partial_downloads(false));
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    fixture.write_partial(&resource, &data[..3000]).await;

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(resource.uri.path()), vec![0]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_range_not_satisfiable_restarts_once() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.write_partial(&resource, &data[..3000]).await;
    fixture.upstream.reply_with(&path, [Reply::Status(416)]);

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![3000, 0]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_persistent_range_failure_is_bounded() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.write_partial(&resource, &data[..3000]).await;
    fixture
        .upstream
        .reply_with(&path, [Reply::Status(416), Reply::Status(416)]);

    let error = fixture.orchestrator.prefetch(&resource, None).await.unwrap_err();

    assert_eq!(error.status_code(), Some(416));
    assert_eq!(fixture.upstream.get_offsets(&path), vec![3000, 0]);
}

#[tokio::test]
async fn test_size_change_during_resume_restarts() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.write_partial(&resource, &data[..3000]).await;
    fixture
        .upstream
        .reply_with(&path, [Reply::WrongTotal(20_000)]);

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![3000, 0]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_ignored_range_rewrites_from_zero() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.write_partial(&resource, &data[..3000]).await;
    fixture.upstream.reply_with(&path, [Reply::IgnoreRange]);

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![3000]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_incomplete_download_keeps_partial_for_resume() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.upstream.reply_with(&path, [Reply::Truncate(4000)]);

    let error = fixture.orchestrator.prefetch(&resource, None).await.unwrap_err();
    assert!(matches!(
        error.into_shared().as_ref(),
        FetchError::IncompleteDownload {
            received: 4000,
            expected: 10_000
        }
    ));
    assert_eq!(fixture.partial_bytes(&resource).await.unwrap().len(), 4000);
    assert!(fixture.full_bytes(&resource).await.is_none());

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![0, 4000]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_ranged_request_beyond_partial_bypasses_cache() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let path = resource.uri.path().to_string();
    fixture.write_partial(&resource, &data[..2000]).await;

    let mut sink = ResponseSink::new(Vec::new()).with_offset(5000);
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();

    assert_eq!(status, CacheStatus::Passthrough);
    assert_eq!(sink.status(), Some(206));
    assert_eq!(sink.header("X-Cache"), Some("PASSTHROUGH"));
    assert_eq!(sink.header("Content-Range"), Some("bytes 5000-9999/10000"));
    assert_eq!(sink.into_writer(), &data[5000..]);

    assert_eq!(fixture.upstream.get_offsets(&path), vec![5000]);
    assert_eq!(fixture.partial_bytes(&resource).await.unwrap(), &data[..2000]);
    assert!(fixture.full_bytes(&resource).await.is_none());
}

#[tokio::test]
async fn test_ranged_request_on_cached_file_is_a_hit() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    fixture.write_full(&resource, &data).await;

    let mut sink = ResponseSink::new(Vec::new()).with_offset(9000);
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();

    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(sink.status(), Some(206));
    assert_eq!(sink.into_writer(), &data[9000..]);
    assert!(fixture.upstream.get_offsets(resource.uri.path()).is_empty());
}

#[tokio::test]
async fn test_client_departure_cancels_fetch() {
    let fixture = Fixture::new(FetchConfig::default().with_buffer_size(1024));
    let data = payload(100 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    fixture
        .upstream
        .pace(resource.uri.path(), 1024, Duration::from_millis(20));

    let consumer = spawn_client(&fixture, &resource);
    let partial = fixture.partial_path(&resource);
    assert!(eventually(|| partial.exists(), Duration::from_secs(2)).await);
    consumer.abort();

    let orchestrator = fixture.orchestrator.clone();
    assert!(
        eventually(
            || orchestrator.active_fetches().is_empty(),
            Duration::from_secs(2)
        )
        .await
    );
    assert!(fixture.full_bytes(&resource).await.is_none());
    let kept = fixture.partial_bytes(&resource).await.unwrap();
    assert!(kept.len() < data.len());
}

#[tokio::test]
async fn test_keep_downloading_survives_client_departure() {
    let fixture = Fixture::new(
        FetchConfig::default()
            .with_buffer_size(1024)
            .with_keep_downloading(true),
    );
    let data = payload(50 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    fixture
        .upstream
        .pace(resource.uri.path(), 1024, Duration::from_millis(5));

    let consumer = spawn_client(&fixture, &resource);
    let partial = fixture.partial_path(&resource);
    assert!(eventually(|| partial.exists(), Duration::from_secs(2)).await);
    consumer.abort();

    let full = fixture.full_path(&resource);
    assert!(eventually(|| full.exists(), Duration::from_secs(10)).await);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test]
async fn test_background_joiner_keeps_fetch_alive() {
    let fixture = Fixture::new(FetchConfig::default().with_buffer_size(1024));
    let data = payload(100 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    fixture
        .upstream
        .pace(resource.uri.path(), 1024, Duration::from_millis(20));

    let consumer = spawn_client(&fixture, &resource);
    let partial = fixture.partial_path(&resource);
    assert!(eventually(|| partial.exists(), Duration::from_secs(2)).await);

    let orchestrator = fixture.orchestrator.clone();
    let background = resource.clone();
    let prefetch = tokio::spawn(async move { orchestrator.prefetch(&background, None).await });

    let transfers = fixture.orchestrator.transfers.clone();
    let id = resource.id.clone();
    assert!(
        eventually(
            || {
                transfers
                    .get(&id)
                    .map_or(false, |c| c.cancellation().attached() == 2)
            },
            Duration::from_secs(2)
        )
        .await
    );
    consumer.abort();

    let status = prefetch.await.unwrap().unwrap();
    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
    assert_eq!(fixture.upstream.get_offsets(resource.uri.path()), vec![0]);
}

#[tokio::test]
async fn test_streaming_client_sees_integrity_failure() {
    let fixture = Fixture::new(FetchConfig::default().with_buffer_size(1024));
    let data = payload(32 * 1024);
    let resource = fixture.package(PACKAGE, &data);
    let mut corrupted = data.clone();
    corrupted[1000] ^= 0xff;
    fixture.upstream.serve(resource.uri.path(), &corrupted);
    fixture
        .upstream
        .pace(resource.uri.path(), 4096, Duration::from_millis(20));

    let mut sink = ResponseSink::new(Vec::new());
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();

    assert_eq!(status, CacheStatus::Discarded);
    assert_eq!(sink.into_writer(), corrupted);
    assert!(fixture.full_bytes(&resource).await.is_none());
    assert!(fixture.partial_bytes(&resource).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_background_fetch_is_held_to_its_speed() {
    let fixture = Fixture::new(
        FetchConfig::default()
            .with_buffer_size(1024)
            .with_background_speed(Speed::from_bytes_per_second(8192)),
    );
    let data = payload(32 * 1024);
    let resource = fixture.package(PACKAGE, &data);

    let start = tokio::time::Instant::now();
    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status, CacheStatus::Fetched);
    // 32 KiB at 8 KiB/s
    assert!(elapsed >= Duration::from_millis(3990), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "took {:?}", elapsed);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), data);
}

#[tokio::test(start_paused = true)]
async fn test_joining_client_speeds_up_background_fetch() {
    let fixture = Fixture::new(
        FetchConfig::default()
            .with_buffer_size(1024)
            .with_background_speed(Speed::from_bytes_per_second(1024)),
    );
    let data = payload(64 * 1024);
    let resource = fixture.package(PACKAGE, &data);

    let start = tokio::time::Instant::now();
    let orchestrator = fixture.orchestrator.clone();
    let background = resource.clone();
    let prefetch = tokio::spawn(async move { orchestrator.prefetch(&background, None).await });

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fixture.full_bytes(&resource).await.is_none());

    let mut sink = ResponseSink::new(Vec::new());
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status, CacheStatus::Stream);
    assert_eq!(sink.into_writer(), data);
    // 64 KiB at the background speed alone would take over a minute
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    assert_eq!(prefetch.await.unwrap().unwrap(), CacheStatus::Fetched);
}

fn spawn_client(
    fixture: &Fixture,
    resource: &Resource,
) -> tokio::task::JoinHandle<Result<CacheStatus, FetchError>> {
    let orchestrator = fixture.orchestrator.clone();
    let resource = resource.clone();
    tokio::spawn(async move {
        let mut sink = ResponseSink::new(Vec::new());
        orchestrator.fetch(&resource, client(&mut sink), None).await
    })
}

#[tokio::test]
async fn test_dynamic_resource_revalidation() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = fixture.database("core.db", b"new database");
    let path = resource.uri.path().to_string();
    fixture.write_full(&resource, b"old database").await;

    // Unchanged upstream: served from cache without a GET
    fixture.upstream.set_head(&path, Some(304));
    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    assert_eq!(status, CacheStatus::Hit);
    assert!(fixture.upstream.get_offsets(&path).is_empty());
    assert_eq!(fixture.upstream.head_count(&path), 1);

    // Changed upstream: stale copy is discarded and refetched from zero
    fixture.upstream.set_head(&path, Some(200));
    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.get_offsets(&path), vec![0]);
    assert_eq!(fixture.full_bytes(&resource).await.unwrap(), b"new database");

    // Probe failure: the cached copy is trusted
    fixture.upstream.set_head(&path, None);
    let mut sink = ResponseSink::new(Vec::new());
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(sink.into_writer(), b"new database");
    assert_eq!(fixture.upstream.get_offsets(&path).len(), 1);
}

#[tokio::test]
async fn test_uncached_dynamic_resource_is_not_probed() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = fixture.database("extra.db", b"database");
    let path = resource.uri.path().to_string();

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    assert_eq!(status, CacheStatus::Fetched);
    assert_eq!(fixture.upstream.head_count(&path), 0);
}

#[tokio::test]
async fn test_non_cacheable_resources_pass_through() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = Resource::passthrough(
        ResourceId::new("core", "x86_64", "core.files"),
        super::support::url("/core/os/x86_64/core.files"),
    );
    let path = resource.uri.path().to_string();
    fixture.upstream.serve(&path, b"file list");

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    assert_eq!(status, CacheStatus::Skipped);
    assert!(fixture.upstream.get_offsets(&path).is_empty());

    let mut sink = ResponseSink::new(Vec::new());
    let status = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap();

    assert_eq!(status, CacheStatus::Passthrough);
    assert_eq!(sink.status(), Some(200));
    assert_eq!(sink.header("ETag"), Some("\"scripted\""));
    assert_eq!(sink.into_writer(), b"file list");
    assert!(fixture.full_bytes(&resource).await.is_none());
    assert!(fixture.partial_bytes(&resource).await.is_none());
}

#[tokio::test]
async fn test_mirror_failure_requests_reselection() {
    let fixture = Fixture::new(FetchConfig::default());
    let selector = Arc::new(RecordingSelector::default());
    let orchestrator = fixture
        .orchestrator
        .clone()
        .with_mirror_selector(selector.clone());
    let resource = fixture.package(PACKAGE, b"content");
    let path = resource.uri.path().to_string();
    fixture
        .upstream
        .reply_with(&path, [Reply::Status(503), Reply::Status(404)]);

    let error = orchestrator.prefetch(&resource, None).await.unwrap_err();
    assert_eq!(error.status_code(), Some(503));
    assert_eq!(selector.calls.lock().len(), 1);
    assert_eq!(selector.calls.lock()[0].1, 503);

    // Not a mirror failure: no reselection
    let error = orchestrator.prefetch(&resource, None).await.unwrap_err();
    assert_eq!(error.status_code(), Some(404));
    assert_eq!(selector.calls.lock().len(), 1);
}

#[tokio::test]
async fn test_failure_reaches_streaming_client() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = fixture.package(PACKAGE, b"content");
    fixture
        .upstream
        .reply_with(resource.uri.path(), [Reply::Status(404)]);

    let mut sink = ResponseSink::new(Vec::new());
    let error = fixture
        .orchestrator
        .fetch(&resource, client(&mut sink), None)
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), Some(404));
    assert!(sink.into_writer().is_empty());

    let orchestrator = fixture.orchestrator.clone();
    assert!(
        eventually(
            || orchestrator.active_fetches().is_empty(),
            Duration::from_secs(2)
        )
        .await
    );
}

#[tokio::test]
async fn test_progress_reports_every_chunk() {
    let fixture = Fixture::new(FetchConfig::default().with_buffer_size(1000));
    let data = payload(10_000);
    let resource = fixture.package(PACKAGE, &data);
    let (sender, mut receiver) = mpsc::channel(64);

    fixture
        .orchestrator
        .prefetch(&resource, Some(sender))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }

    let last = events.last().unwrap();
    assert_eq!(last.so_far, 10_000);
    assert_eq!(last.total, Some(10_000));
    assert_eq!(last.fraction(), Some(1.0));
    assert_eq!(events.iter().map(|e| e.new_bytes).sum::<u64>(), 10_000);
}

#[tokio::test]
async fn test_waits_for_foreign_lock() {
    let fixture = Fixture::new(FetchConfig::default());
    let resource = fixture.package(PACKAGE, b"content");
    assert!(fixture.storage.try_lock_resource(&resource.id));

    let storage: Arc<dyn StorageProvider> = fixture.storage.clone();
    let id = resource.id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        storage.release_resource(&id);
    });

    let status = fixture.orchestrator.prefetch(&resource, None).await.unwrap();
    assert_eq!(status, CacheStatus::Fetched);
}

#[tokio::test]
async fn test_verify_cached_detects_corruption() {
    let fixture = Fixture::new(FetchConfig::default());
    let data = payload(4096);
    let resource = fixture.package(PACKAGE, &data);
    fixture.orchestrator.prefetch(&resource, None).await.unwrap();

    let report = fixture
        .orchestrator
        .verify_cached(&resource, false)
        .await
        .unwrap();
    assert!(report.is_successful());

    fixture.write_full(&resource, b"tampered").await;
    let report = fixture
        .orchestrator
        .verify_cached(&resource, true)
        .await
        .unwrap();
    assert_eq!(report.files_failed, 1);
    assert!(fixture.full_bytes(&resource).await.is_none());
}
