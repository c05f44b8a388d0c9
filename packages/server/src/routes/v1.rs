use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/projects", project_routes(config))
        .nest("/files", file_routes(config))
}

fn project_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::file::upload_file,
            handlers::file::list_project_files
        ))
        .layer(handlers::file::upload_body_limit(
            config.storage.max_blob_size,
        ))
}

fn file_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let read = OpenApiRouter::new()
        .routes(routes!(handlers::file::get_file))
        .routes(routes!(handlers::file::get_latest_version))
        .routes(routes!(handlers::file::download_file));

    let versions = OpenApiRouter::new()
        .routes(routes!(
            handlers::file::upload_version,
            handlers::file::list_versions
        ))
        .layer(handlers::file::upload_body_limit(
            config.storage.max_blob_size,
        ));

    read.merge(versions)
}
