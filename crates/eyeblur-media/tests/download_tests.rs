//! HTTP acquisition against a mock server.

use eyeblur_media::{acquire, MediaError, ProcessingContext, VideoSource};
use eyeblur_models::SourceType;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_http_download_writes_body_and_cleans_up() {
    let server = MockServer::start().await;
    let body = vec![7u8; 4096];
    Mock::given(method("GET"))
        .and(path("/clips/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("video.mp4");
    let source = VideoSource::new(
        SourceType::Vimeo,
        format!("{}/clips/video.mp4", server.uri()),
    );

    let acquired = acquire(
        &source,
        &target,
        &reqwest::Client::new(),
        &ProcessingContext::new("download"),
    )
    .await
    .unwrap();

    assert_eq!(acquired.path(), target.as_path());
    assert!(acquired.is_temporary());
    assert_eq!(std::fs::read(&target).unwrap(), body);

    acquired.cleanup().await.unwrap();
    assert!(!target.exists());
}

#[tokio::test]
async fn test_http_error_status_is_acquisition_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("video.mp4");
    let source = VideoSource::new(SourceType::Vimeo, format!("{}/gone.mp4", server.uri()));

    let err = acquire(
        &source,
        &target,
        &reqwest::Client::new(),
        &ProcessingContext::detached(),
    )
    .await
    .unwrap_err();

    match err {
        MediaError::Acquisition { message, status } => {
            assert_eq!(status, Some(404));
            assert!(message.contains("404"));
        }
        other => panic!("expected acquisition error, got {other}"),
    }
    assert!(!target.exists());
}

#[tokio::test]
async fn test_unreachable_host_is_acquisition_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("video.mp4");
    // Port 9 (discard) on localhost is closed on test hosts.
    let source = VideoSource::new(SourceType::Vimeo, "http://127.0.0.1:9/video.mp4");

    let err = acquire(
        &source,
        &target,
        &reqwest::Client::new(),
        &ProcessingContext::detached(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MediaError::Acquisition { status: None, .. }));
}
