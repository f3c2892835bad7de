// Group service: groups, memberships, invitations and the internal lookup surface.

mod internal;
mod invitations;
mod lifecycle;
mod members;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub fn routes(state: AppState) -> Router {
    let protected = super::protected(
        Router::new()
            .route("/groups", post(lifecycle::create).get(lifecycle::list))
            .route(
                "/groups/:id",
                get(lifecycle::show).put(lifecycle::update).delete(lifecycle::destroy),
            )
            .route("/groups/:id/details", get(lifecycle::details))
            .route("/groups/:id/transfer-ownership/:user_id", post(lifecycle::transfer_ownership))
            .route("/groups/:id/members", post(members::add).get(members::list))
            .route(
                "/groups/:id/members/:user_id",
                get(members::show).put(members::update).delete(members::remove),
            )
            .route("/groups/:id/invite", post(invitations::invite))
            .route("/groups/:id/accept-invitation", post(invitations::accept))
            .route("/groups/:id/decline-invitation", post(invitations::decline))
            .route("/groups/:id/leave", post(invitations::leave))
            .route("/groups/:id/invite-link", post(invitations::invite_link))
            .route("/groups/:id/join", post(invitations::join)),
        &state,
    );

    let internal = super::internal(
        Router::new()
            .route("/internal/groups", get(internal::list))
            .route("/internal/groups/search", get(internal::search))
            .route("/internal/groups/stats", get(internal::stats))
            .route("/internal/groups/:id", get(internal::show))
            .route("/internal/groups/:id/members", get(internal::members))
            .route("/internal/groups/:id/member-ids", get(internal::member_ids))
            .route("/internal/groups/:id/check-member/:user_id", get(internal::check_member))
            .route("/internal/users/:id/groups", get(internal::user_groups)),
        &state,
    );

    protected.merge(internal).with_state(state)
}
