// src/main.rs
use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{
    http::header,
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_web_httpauth::middleware::HttpAuthentication;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod allocation;
mod auth;
mod backend;
mod config;
mod daybook_handlers;
mod error;
mod finance_handlers;
mod handlers;
mod models;
mod monitoring;
mod outgoing_handlers;
mod sessions;
pub mod validator;

use backend::{ColdStorageBackend, HttpBackend};
use config::{load_config, Config};
use error::ApiError;
use monitoring::{start_maintenance_tasks, Metrics, RequestLogger};
use sessions::SessionStore;

pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn ColdStorageBackend>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn ColdStorageBackend>) -> Self {
        let sessions = SessionStore::new(
            Duration::from_secs(config.sessions.idle_timeout_minutes * 60),
            config.sessions.max_sessions,
        );
        Self { config, backend, sessions }
    }
}

// ==================== ROUTES ====================

pub fn configure_api(cfg: &mut web::ServiceConfig) {
    let bearer = HttpAuthentication::bearer(auth::bearer_middleware);

    cfg
        // Health check and metrics (no auth)
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint)),
        )
        // Login is proxied to the backend, no token yet
        .service(
            web::scope("/api/v1/auth")
                .route("/login", web::post().to(auth::login)),
        )
        // Protected API endpoints
        .service(
            web::scope("/api/v1")
                .wrap(bearer)
                .service(
                    web::scope("/farmers")
                        .route("", web::get().to(handlers::list_farmers))
                        .route("/{id}/profile", web::get().to(daybook_handlers::get_farmer_profile)),
                )
                .service(
                    web::scope("/outgoing/sessions")
                        .route("", web::post().to(outgoing_handlers::create_session))
                        .route("/{id}", web::get().to(outgoing_handlers::get_session))
                        .route("/{id}", web::delete().to(outgoing_handlers::delete_session))
                        .route("/{id}/farmer", web::put().to(outgoing_handlers::change_farmer))
                        .route("/{id}/refresh", web::post().to(outgoing_handlers::refresh_vouchers))
                        .route("/{id}/filters", web::put().to(outgoing_handlers::update_filters))
                        .route("/{id}/columns/toggle", web::post().to(outgoing_handlers::toggle_column))
                        .route("/{id}/allocations", web::put().to(outgoing_handlers::set_allocation))
                        .route("/{id}/allocations/{key}", web::delete().to(outgoing_handlers::remove_allocation))
                        .route("/{id}/vouchers/{voucher_id}/toggle", web::post().to(outgoing_handlers::toggle_voucher))
                        .route("/{id}/reset", web::post().to(outgoing_handlers::reset_session))
                        .route("/{id}/review", web::post().to(outgoing_handlers::review))
                        .route("/{id}/submit", web::post().to(outgoing_handlers::submit)),
                )
                .route("/daybook", web::get().to(daybook_handlers::get_daybook))
                .service(
                    web::scope("/finances")
                        .route("/ledgers", web::get().to(finance_handlers::list_ledgers))
                        .route("/balance-sheet", web::get().to(finance_handlers::get_balance_sheet)),
                ),
        );
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    let backend = HttpBackend::new(&config.backend).context("Failed to build backend HTTP client")?;
    let app_state = Arc::new(AppState::new(config.clone(), Arc::new(backend)));

    start_maintenance_tasks(app_state.clone());

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics_arc = Arc::new(Metrics::new());
    let server_config = config.server.clone();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&config);
        let security_headers = setup_security_headers(&config.security);
        let json_config = web::JsonConfig::default()
            .limit(config.security.max_request_size)
            .error_handler(|err, _req| ApiError::bad_request(&err.to_string()).into());

        let app = App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(metrics_arc.clone()))
            .app_data(json_config)
            .configure(configure_api);

        // Console frontend, when a build directory is configured
        match &config.frontend.build_dir {
            Some(build_dir) => app
                .service(Files::new("/assets", build_dir.join("assets")))
                .default_service(web::route().to(serve_index)),
            None => app.default_service(web::route().to(not_found)),
        }
    })
    .keep_alive(Duration::from_secs(server_config.keep_alive))
    .client_request_timeout(Duration::from_secs(server_config.client_timeout))
    .client_disconnect_timeout(Duration::from_secs(server_config.client_shutdown));

    if let Some(workers) = server_config.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_cors(config: &Config) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    // Production configs with a wildcard are rejected in Config::validate
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        return cors.allow_any_origin();
    }

    for origin in config.security.allowed_origins.iter().filter(|o| !o.is_empty()) {
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    let compact = config.logging.format.eq_ignore_ascii_case("compact");

    tracing_subscriber::registry()
        .with(filter)
        .with(compact.then(|| tracing_subscriber::fmt::layer().compact()))
        .with((!compact).then(|| tracing_subscriber::fmt::layer()))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}

/// Single-page console: every unknown non-API path gets index.html
async fn serve_index(app_state: web::Data<Arc<AppState>>) -> actix_web::Result<NamedFile> {
    let build_dir = app_state
        .config
        .frontend
        .build_dir
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Page"))?;

    Ok(NamedFile::open(build_dir.join("index.html"))?)
}

async fn not_found() -> Result<actix_web::HttpResponse, ApiError> {
    Err(ApiError::not_found("Resource"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use backend::fake::FakeBackend;
    use serde_json::{json, Value};

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), Arc::new(FakeBackend::default())))
    }

    #[actix_rt::test]
    async fn test_login_is_public_and_proxied() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "mobileNumber": "9876543210", "password": "secret" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["token"], "token-1");
        assert_eq!(body["message"], "Login successful");

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "mobileNumber": "9876543210", "password": "wrong" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "mobileNumber": "12", "password": "secret" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_rt::test]
    async fn test_cors_and_security_headers() {
        let config = Config::default();
        let app = test::init_service(
            App::new()
                .wrap(setup_cors(&config))
                .wrap(setup_security_headers(&config.security))
                .app_data(web::Data::new(app_state()))
                .app_data(web::Data::new(Arc::new(Metrics::new())))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Origin", "http://localhost:3000"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
    }
}
