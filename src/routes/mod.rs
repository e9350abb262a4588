pub mod auth;
pub mod backup;
pub mod categories;
pub mod courses;
pub mod health;
pub mod plans;
pub mod sessions;
pub mod settings;
pub mod topics;
pub mod users;

use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::AppState;

/// Wrap a payload in the uniform success envelope
pub fn envelope<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Build the full application router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me).put(auth::update_me))
        .route("/api/auth/password", put(auth::change_password))
        // Admin user management
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Catalog
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/categories/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/api/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/api/courses/:id",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route(
            "/api/topics",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route(
            "/api/topics/:id",
            put(topics::update_topic).delete(topics::delete_topic),
        )
        // Plans
        .route("/api/plans", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/api/plans/:id",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/api/plans/:id/stats", get(plans::plan_stats))
        // Study sessions
        .route(
            "/api/study-sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route("/api/study-sessions/stats", get(sessions::session_stats))
        .route(
            "/api/study-sessions/:id",
            get(sessions::get_session)
                .put(sessions::update_session)
                .delete(sessions::delete_session),
        )
        .route("/api/study-sessions/:id/start", post(sessions::start_session))
        .route("/api/study-sessions/:id/pause", post(sessions::pause_session))
        .route(
            "/api/study-sessions/:id/complete",
            post(sessions::complete_session),
        )
        .route(
            "/api/study-sessions/:id/cancel",
            post(sessions::cancel_session),
        )
        // Settings
        .route("/api/settings", get(settings::list_settings))
        .route(
            "/api/settings/:key",
            get(settings::get_setting)
                .put(settings::put_setting)
                .delete(settings::delete_setting),
        )
        // Backups
        .route(
            "/api/backup",
            get(backup::list_backups).post(backup::create_backup),
        )
        .route("/api/backup/:id", delete(backup::delete_backup))
        .route("/api/backup/:id/restore", post(backup::restore_backup))
        .with_state(state)
}
