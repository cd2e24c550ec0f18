// API route configuration

use crate::api::{errors, handlers};
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(errors::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(errors::query_error_handler))
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/countries")
                .route("/", web::get().to(handlers::list_countries))
                .route("/", web::post().to(handlers::create_country))
                // literal segments before /{id}/
                .route("/search/", web::get().to(handlers::search))
                .route("/code/{cca3}/", web::get().to(handlers::get_country_by_code))
                .route("/region/{region}/", web::get().to(handlers::by_region))
                .route("/language/{code}/", web::get().to(handlers::by_language))
                .route("/{id}/", web::get().to(handlers::get_country))
                .route("/{id}/", web::put().to(handlers::update_country))
                .route("/{id}/", web::delete().to(handlers::delete_country))
                .route("/{id}/region/", web::get().to(handlers::same_region))
                .route("/{id}/borders/", web::get().to(handlers::border_neighbours)),
        );
}
