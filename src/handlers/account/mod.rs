// Account service: registration, login and user lookup.

mod auth;
mod users;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub fn routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password));

    let protected = super::protected(
        Router::new()
            .route("/auth/me", get(auth::me))
            .route("/auth/verify", get(auth::verify))
            .route("/users/batch", get(users::batch))
            .route("/users/search", get(users::search))
            .route("/users/:id", get(users::show)),
        &state,
    );

    let internal = super::internal(
        Router::new()
            .route("/internal/users/batch", get(users::batch))
            .route("/internal/users/:id", get(users::show)),
        &state,
    );

    public.merge(protected).merge(internal).with_state(state)
}
