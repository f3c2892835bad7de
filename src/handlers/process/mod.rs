// Process service: todos and MoSCoW items (both "elements") with their tasks.

mod elements;
mod tasks;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::app::AppState;

pub fn routes(state: AppState) -> Router {
    super::protected(
        Router::new()
            .route("/process/todos", post(elements::create_todo).get(elements::list_todos))
            .route("/process/todos/:id", get(elements::show_todo).put(elements::update_todo))
            .route("/process/moscows", post(elements::create_moscow).get(elements::list_moscows))
            .route(
                "/process/moscows/:id",
                get(elements::show_moscow).put(elements::update_moscow),
            )
            .route("/process/elements/:id", delete(elements::destroy))
            .route("/process/elements/:id/tasks", get(tasks::list))
            .route("/process/tasks", post(tasks::create))
            .route("/process/tasks/:id", put(tasks::update).delete(tasks::destroy)),
        &state,
    )
    .with_state(state)
}
