// API server implementation using actix-web

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

use crate::api::{middleware, routes};
use crate::store::CountryStore;
use crate::util::env::{env_opt, env_parse};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("API_PORT") {
            Some(raw) => raw.trim().parse().context("Invalid API_PORT")?,
            None => 8080,
        };
        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, store: Arc<dyn CountryStore>) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        let workers = env_parse("API_WORKERS", 0usize);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting country catalog API server"
        );

        let store_data: web::Data<dyn CountryStore> = web::Data::from(store);
        let allowed_origins = self.allowed_origins.clone();

        let mut server = HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(store_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        });
        if workers > 0 {
            server = server.workers(workers);
        }

        server
            .bind(&bind_addr)
            .with_context(|| format!("Failed to bind to {}", bind_addr))?
            .run()
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}
