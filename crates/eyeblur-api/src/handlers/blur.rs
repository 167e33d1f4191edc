//! `POST /blur-eyes` handler.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use eyeblur_media::{
    acquire, blur_eyes_in_video, AcquiredVideo, BlurOutcome, MediaError, ProcessingContext,
    VideoSource,
};
use eyeblur_models::{BlurEyesRequest, BlurEyesResponse, SourceType};
use tracing::{info, warn, Instrument};

use crate::error::{ApiError, ApiResult, INVALID_SOURCE_TYPE, LOCAL_FILE_NOT_FOUND, NO_SOURCE};
use crate::metrics;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Validated form of a [`BlurEyesRequest`].
#[derive(Debug)]
struct BlurJob {
    source: VideoSource,
    output: PathBuf,
    fps: Option<u32>,
}

/// Acquire the input, blur every detected eye and write the result into the
/// downloads directory.
pub async fn blur_eyes(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<BlurEyesRequest>, JsonRejection>,
) -> ApiResult<Json<BlurEyesResponse>> {
    let Json(request) = payload.map_err(|rejection| rejected(ApiError::bad_request(rejection.body_text())))?;
    let job = validate(&request, &state.config.downloads_dir).map_err(rejected)?;

    let ctx = match request_id {
        Some(Extension(RequestId(id))) => ProcessingContext::new(id),
        None => ProcessingContext::generate(),
    };
    let source_label = job.source.kind.as_str();

    async {
        info!(
            source = source_label,
            location = %job.source.location,
            output = %job.output.display(),
            "Blur request accepted"
        );

        tokio::fs::create_dir_all(&state.config.downloads_dir)
            .await
            .map_err(|e| {
                let err = std::io::Error::new(
                    e.kind(),
                    format!("cannot create {}: {}", state.config.downloads_dir.display(), e),
                );
                fail(source_label, ctx.fail(MediaError::Io(err)))
            })?;

        let staging = state.config.remote_input_path();
        let acquire_started = Instant::now();
        let acquired = acquire(&job.source, &staging, &state.http, &ctx)
            .await
            .map_err(|e| fail(source_label, e))?;
        metrics::record_acquisition_duration(source_label, acquire_started.elapsed().as_secs_f64());

        let started = Instant::now();
        let outcome = match run_blur_job(&state, acquired.path(), &job, &ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_input(&acquired).await;
                return Err(fail(source_label, e));
            }
        };
        metrics::record_video_processed(
            source_label,
            &outcome.stats,
            started.elapsed().as_secs_f64(),
        );

        remove_input(&acquired).await;

        let output_file = outcome.artifact.path.to_string_lossy().into_owned();
        info!(
            output = %output_file,
            frames = outcome.artifact.frame_count,
            regions_blurred = outcome.stats.regions_blurred,
            "Video processed"
        );
        Ok::<_, ApiError>(Json(BlurEyesResponse::processed(output_file)))
    }
    .instrument(ctx.span().clone())
    .await
}

fn validate(request: &BlurEyesRequest, downloads_dir: &Path) -> ApiResult<BlurJob> {
    if !request.has_source() {
        return Err(ApiError::bad_request(NO_SOURCE));
    }
    let kind = request
        .parsed_source_type()
        .map_err(|_| ApiError::bad_request(INVALID_SOURCE_TYPE))?;
    let location = request.path_or_url.clone().unwrap_or_default();

    if !is_bare_file_name(&request.output_filename) {
        return Err(ApiError::bad_request(format!(
            "output_filename must be a plain file name, got {:?}",
            request.output_filename
        )));
    }
    if request.fps == Some(0) {
        return Err(ApiError::bad_request("fps must be positive"));
    }
    if kind == SourceType::Local && !Path::new(&location).is_file() {
        return Err(ApiError::bad_request(LOCAL_FILE_NOT_FOUND));
    }

    Ok(BlurJob {
        source: VideoSource::new(kind, location),
        output: downloads_dir.join(&request.output_filename),
        fps: request.fps,
    })
}

fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Run the synchronous core on a blocking worker thread.
async fn run_blur_job(
    state: &AppState,
    input: &Path,
    job: &BlurJob,
    ctx: &ProcessingContext,
) -> Result<BlurOutcome, MediaError> {
    let input = input.to_path_buf();
    let output = job.output.clone();
    let fps = job.fps;
    let pipeline = state.pipeline.clone();
    let worker_ctx = ctx.clone();
    tokio::task::spawn_blocking(move || blur_eyes_in_video(&input, &output, &pipeline, fps, &worker_ctx))
        .await
        .map_err(|e| {
            ctx.fail(MediaError::Io(std::io::Error::other(format!("blur worker panicked: {}", e))))
        })?
}

/// Delete a downloaded input. Local inputs are left alone.
async fn remove_input(acquired: &AcquiredVideo) {
    if let Err(e) = acquired.cleanup().await {
        warn!(path = %acquired.path().display(), "Failed to remove temporary input: {}", e);
    }
}

fn fail(source: &str, err: MediaError) -> ApiError {
    metrics::record_video_failed(source, err.operation());
    ApiError::from(err)
}

/// Log a rejected request before it is answered with a client error.
fn rejected(err: ApiError) -> ApiError {
    warn!(operation = "validate", error = %err, "Blur request rejected");
    err
}
