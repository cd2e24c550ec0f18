// Request logging, compression and CORS shared by every App instance.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, Logger};

pub fn setup_middleware() -> (Logger, Compress) {
    let logger = Logger::new("%a \"%r\" %s %b %Dms");
    let compress = Compress::default();
    (logger, compress)
}

/// `*` allows any origin; otherwise a comma-separated origin list.
pub fn setup_cors(allowed_origins: &str) -> Cors {
    let base = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);

    if allowed_origins.trim() == "*" {
        return base.allow_any_origin();
    }

    allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .fold(base, |cors, origin| cors.allowed_origin(origin))
}
