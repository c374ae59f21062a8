//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and run whole jobs
//! through the engine, checking counters, records and files on disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sumi_harvest::state::ErrorKind;
use sumi_harvest::{CrawlJob, Engine, HarvestError, JobConfig, JobId, JobStatus, Outcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a job configuration writing under `save_root`, with short backoff
fn create_test_config(save_root: &Path) -> JobConfig {
    JobConfig {
        save_root: save_root.to_path_buf(),
        timeout_ms: 5_000,
        backoff_base_ms: 10,
        backoff_max_ms: 50,
        ..JobConfig::default()
    }
}

/// Mounts an HTML page at `route`
async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts a binary resource at `route`
async fn mount_bytes(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

async fn wait_for(engine: &Engine, id: JobId) -> CrawlJob {
    tokio::time::timeout(Duration::from_secs(30), engine.wait(id))
        .await
        .expect("job did not finish in time")
        .expect("job vanished")
}

fn job_dir(save_root: &Path, job: &CrawlJob) -> PathBuf {
    save_root.join(job.id.to_string())
}

fn record<'a>(job: &'a CrawlJob, url_suffix: &str) -> &'a sumi_harvest::ResourceRecord {
    job.records
        .iter()
        .find(|r| r.url.ends_with(url_suffix) && r.outcome != Outcome::SkippedDuplicate)
        .unwrap_or_else(|| panic!("no record for {}", url_suffix))
}

#[tokio::test]
async fn test_full_harvest_single_page() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body>
            <img src="/a.png">
            <img src="/b.png">
            <div style="background: url('/c.png')"></div>
        </body></html>"#,
    )
    .await;
    mount_bytes(&server, "/a.png", b"image-a").await;
    mount_bytes(&server, "/c.png", b"image-c!").await;
    Mock::given(method("GET"))
        .and(path("/b.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = Engine::default();
    let id = engine
        .submit(&format!("{}/", server.uri()), create_test_config(root.path()))
        .unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.discovered, 3);
    assert_eq!(job.counters.downloaded, 2);
    assert_eq!(job.counters.failed, 1);
    assert_eq!(job.counters.skipped_duplicate, 0);
    assert_eq!(job.counters.bytes_written, 15);
    assert!(job.counters.is_balanced());

    let failed = record(&job, "/b.png");
    assert_eq!(failed.error_kind(), Some(ErrorKind::HttpClientError));
    assert_eq!(failed.attempts, 1);

    let dir = job_dir(root.path(), &job);
    assert_eq!(std::fs::read(dir.join("image/a.png")).unwrap(), b"image-a");
    assert_eq!(std::fs::read(dir.join("image/c.png")).unwrap(), b"image-c!");
    assert!(!dir.join("image/b.png").exists());

    // reports land next to the resources
    assert!(dir.join("manifest.json").is_file());
    assert!(dir.join("summary.md").is_file());

    // every success path stays inside the job directory
    for r in job.records.iter().filter(|r| r.is_success()) {
        let saved = dir.join(r.path.as_ref().unwrap());
        assert!(saved.starts_with(&dir));
        assert!(saved.is_file());
    }
}

#[tokio::test]
async fn test_duplicate_reference_downloaded_once() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_page(
        &server,
        "/",
        r#"<img src="/a.png"><style>div { background: url('/a.png'); }</style>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let engine = Engine::default();
    let id = engine
        .submit(&format!("{}/", server.uri()), create_test_config(root.path()))
        .unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.discovered, 2);
    assert_eq!(job.counters.downloaded, 1);
    assert_eq!(job.counters.skipped_duplicate, 1);
    assert!(job.counters.is_balanced());
}

#[tokio::test]
async fn test_hanging_resource_times_out_after_max_attempts() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_page(&server, "/", r#"<script src="/slow.js"></script>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("never delivered")
                .set_delay(Duration::from_secs(10)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let config = JobConfig {
        timeout_ms: 200,
        max_attempts: 3,
        ..create_test_config(root.path())
    };

    let engine = Engine::default();
    let id = engine.submit(&format!("{}/", server.uri()), config).unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.failed, 1);

    let slow = record(&job, "/slow.js");
    assert_eq!(slow.error_kind(), Some(ErrorKind::Timeout));
    assert_eq!(slow.attempts, 3);
    assert!(!job_dir(root.path(), &job).join("script/slow.js").exists());
}

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_page(&server, "/", r#"<link rel="stylesheet" href="/site.css">"#).await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_bytes(&server, "/site.css", b"body{}").await;

    let engine = Engine::default();
    let id = engine
        .submit(&format!("{}/", server.uri()), create_test_config(root.path()))
        .unwrap();
    let job = wait_for(&engine, id).await;

    let css = record(&job, "/site.css");
    assert_eq!(css.outcome, Outcome::Success);
    assert_eq!(css.attempts, 3);
    assert_eq!(
        std::fs::read(job_dir(root.path(), &job).join("style/site.css")).unwrap(),
        b"body{}"
    );
}

#[tokio::test]
async fn test_cancel_stops_in_flight_downloads() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let images: String = (0..6)
        .map(|i| format!(r#"<img src="/slow-{}.png">"#, i))
        .collect();
    mount_page(&server, "/", &images).await;
    for i in 0..6 {
        Mock::given(method("GET"))
            .and(path(format!("/slow-{}.png", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![7u8; 64])
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;
    }

    let config = JobConfig {
        max_concurrent: 2,
        ..create_test_config(root.path())
    };

    let engine = Engine::default();
    let id = engine.submit(&format!("{}/", server.uri()), config).unwrap();

    // let the seed page through and the first downloads start
    let mut progress = engine.subscribe(id).unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        progress.wait_for(|p| p.counters.discovered > 0),
    )
    .await
    .unwrap()
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let cancelled_at = Instant::now();
    engine.cancel(id).unwrap();
    let job = wait_for(&engine, id).await;

    assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.counters.discovered, 6);
    assert_eq!(job.counters.downloaded, 0);
    assert!(job.counters.is_balanced());
    assert!(job
        .records
        .iter()
        .all(|r| r.error_kind() == Some(ErrorKind::Cancelled)));

    // no partial files left behind
    let image_dir = job_dir(root.path(), &job).join("image");
    if image_dir.exists() {
        assert_eq!(std::fs::read_dir(&image_dir).unwrap().count(), 0);
    }

    // cancelling again is harmless
    engine.cancel(id).unwrap();
    assert_eq!(engine.status(id).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_rate_limit_spaces_requests() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let images: String = (0..6).map(|i| format!(r#"<img src="/{}.png">"#, i)).collect();
    mount_page(&server, "/", &images).await;
    for i in 0..6 {
        mount_bytes(&server, &format!("/{}.png", i), b"x").await;
    }

    // 7 requests at 2 per 300ms: the last one cannot start before 900ms
    let config = JobConfig {
        max_concurrent: 6,
        rate_limit_per_interval: 2,
        rate_interval_ms: 300,
        ..create_test_config(root.path())
    };

    let engine = Engine::default();
    let started = Instant::now();
    let id = engine.submit(&format!("{}/", server.uri()), config).unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.counters.downloaded, 6);
    assert!(
        started.elapsed() >= Duration::from_millis(900),
        "finished in {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_single_worker_downloads_sequentially() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let fonts: String = (0..3)
        .map(|i| format!(r#"<link rel="preload" as="font" href="/f{}.woff2">"#, i))
        .collect();
    mount_page(&server, "/", &fonts).await;
    for i in 0..3 {
        Mock::given(method("GET"))
            .and(path(format!("/f{}.woff2", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"wOF2".to_vec())
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
    }

    let config = JobConfig {
        max_concurrent: 1,
        ..create_test_config(root.path())
    };

    let engine = Engine::default();
    let started = Instant::now();
    let id = engine.submit(&format!("{}/", server.uri()), config).unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.counters.downloaded, 3);
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert!(job_dir(root.path(), &job).join("font/f0.woff2").is_file());
}

#[tokio::test]
async fn test_unreachable_seed_fails_job() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = Engine::default();
    let id = engine
        .submit(
            &format!("{}/missing", server.uri()),
            create_test_config(root.path()),
        )
        .unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap_or("").contains("404"));
    assert_eq!(job.counters.discovered, 0);
    assert!(job.records.is_empty());
}

#[tokio::test]
async fn test_page_without_resources_completes_empty() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_page(&server, "/", "<html><body><p>Just text</p></body></html>").await;

    let engine = Engine::default();
    let id = engine
        .submit(&format!("{}/", server.uri()), create_test_config(root.path()))
        .unwrap();
    let job = wait_for(&engine, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.discovered, 0);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn test_invalid_submissions_rejected() {
    let engine = Engine::default();

    assert!(matches!(
        engine.submit("javascript:alert(1)", JobConfig::default()),
        Err(HarvestError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.submit("/relative/only", JobConfig::default()),
        Err(HarvestError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.status(uuid::Uuid::new_v4()),
        Err(HarvestError::NotFound(_))
    ));
}
