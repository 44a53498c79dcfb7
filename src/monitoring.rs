// src/monitoring.rs
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use std::future::{ready, Ready};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::time::Instant;
use tokio::time::{interval, Duration};
use crate::AppState;

const RESPONSE_TIME_WINDOW: usize = 1000;

#[derive(Debug)]
pub struct Metrics {
    pub request_count: AtomicU64,
    pub error_count: AtomicU64,
    pub response_times: std::sync::Mutex<Vec<u64>>,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            response_times: std::sync::Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, time_ms: u64) {
        if let Ok(mut times) = self.response_times.lock() {
            times.push(time_ms);
            if times.len() > RESPONSE_TIME_WINDOW {
                times.remove(0);
            }
        }
    }

    pub fn average_response_time(&self) -> f64 {
        match self.response_times.lock() {
            Ok(times) if !times.is_empty() => times.iter().sum::<u64>() as f64 / times.len() as f64,
            _ => 0.0,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_response_time_ms: f64,
    pub open_sessions: usize,
    pub uptime_seconds: u64,
}

pub async fn health_check(metrics: web::Data<Arc<Metrics>>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: metrics.uptime_seconds(),
    })
}

pub async fn metrics_endpoint(
    metrics: web::Data<Arc<Metrics>>,
    app_state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    HttpResponse::Ok().json(MetricsResponse {
        requests_total: metrics.request_count.load(Ordering::Relaxed),
        errors_total: metrics.error_count.load(Ordering::Relaxed),
        avg_response_time_ms: metrics.average_response_time(),
        open_sessions: app_state.sessions.len().unwrap_or(0),
        uptime_seconds: metrics.uptime_seconds(),
    })
}

// ==================== REQUEST METRICS MIDDLEWARE ====================

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let metrics = self.metrics.clone();
        let method = req.method().clone();
        let path = req.path().to_string();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.increment_requests();
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            metrics.record_response_time(elapsed);

            match res {
                Ok(ref response) if response.status().is_server_error() => {
                    metrics.increment_errors();
                    log::warn!("{} {} -> {} in {}ms", method, path, response.status(), elapsed);
                }
                Ok(ref response) if response.status().is_client_error() => {
                    metrics.increment_errors();
                    log::debug!("{} {} -> {} in {}ms", method, path, response.status(), elapsed);
                }
                Err(_) => metrics.increment_errors(),
                _ => {}
            }
            res
        })
    }
}

// ==================== MAINTENANCE ====================

pub fn start_maintenance_tasks(app_state: Arc<AppState>) {
    let period = Duration::from_secs(app_state.config.sessions.sweep_interval_seconds.max(1));

    tokio::spawn(async move {
        let mut interval = interval(period);
        loop {
            interval.tick().await;
            sweep_sessions(&app_state);
        }
    });
}

fn sweep_sessions(app_state: &AppState) {
    match app_state.sessions.sweep_expired() {
        Ok(0) => {}
        Ok(removed) => log::info!("Swept {} idle outgoing sessions", removed),
        Err(e) => log::error!("Failed to sweep outgoing sessions: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as actix_test, App};
    use crate::backend::fake::FakeBackend;
    use crate::config::Config;

    #[test]
    fn test_response_time_window() {
        let metrics = Metrics::new();
        assert_eq!(metrics.average_response_time(), 0.0);

        for ms in 0..(RESPONSE_TIME_WINDOW as u64 + 10) {
            metrics.record_response_time(ms);
        }
        assert_eq!(metrics.response_times.lock().unwrap().len(), RESPONSE_TIME_WINDOW);
        assert_eq!(metrics.response_times.lock().unwrap()[0], 10);
    }

    #[actix_rt::test]
    async fn test_request_logger_counts_errors() {
        let metrics = Arc::new(Metrics::new());
        let app_state = Arc::new(AppState::new(Config::default(), Arc::new(FakeBackend::default())));
        let app = actix_test::init_service(
            App::new()
                .wrap(RequestLogger::new(metrics.clone()))
                .app_data(web::Data::new(metrics.clone()))
                .app_data(web::Data::new(app_state.clone()))
                .configure(crate::configure_api),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get().uri("/api/v1/farmers").to_request();
        let status = match actix_test::try_call_service(&app, req).await {
            Ok(resp) => resp.status().as_u16(),
            Err(err) => err.as_response_error().status_code().as_u16(),
        };
        assert_eq!(status, 401);

        assert_eq!(metrics.request_count.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.error_count.load(Ordering::Relaxed), 1);
    }
}
