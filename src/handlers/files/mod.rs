// File service: file blobs, folders and folder membership.

mod folders;
mod uploads;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::app::AppState;
use crate::config::AppConfig;

/// Largest request body accepted for an upload of the maximum file size.
pub fn upload_body_limit(config: &AppConfig) -> usize {
    // Base64 inflates uploads by a third; leave room for the JSON around it
    config.storage.max_file_size_bytes / 3 * 4 + 64 * 1024
}

pub fn routes(state: AppState) -> Router {
    let body_limit = upload_body_limit(&state.config);

    super::protected(
        Router::new()
            .route("/projects/:id/files", post(uploads::upload).get(uploads::list))
            .route(
                "/files/:id",
                get(uploads::show).patch(uploads::rename).delete(uploads::destroy),
            )
            .route("/files/:id/content", get(uploads::content))
            .route("/files/:id/folders", get(uploads::folders))
            .route("/projects/:id/folders", post(folders::create).get(folders::list))
            .route(
                "/projects/:id/folders/:folder_id",
                get(folders::show).patch(folders::rename).delete(folders::destroy),
            )
            .route("/folders/:id/files", get(folders::files))
            .route("/folders/:id/files/:file_id", post(folders::link).delete(folders::unlink)),
        &state,
    )
    .layer(DefaultBodyLimit::max(body_limit))
    .with_state(state)
}
