//! HTTP routes of the service.

use actix_web::{HttpResponse, get, web};
use serde_json::json;

use labstore::{
    database::Database,
    error::{ConnectionError, DbError},
};

use crate::error::{ApiError, ApiResult};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(machines).service(health);
}

#[get("/machines")]
async fn machines() -> HttpResponse {
    HttpResponse::Ok().body("MACHINES")
}

/// Reports whether the database connection is up.
#[get("/health")]
async fn health(database: web::Data<Database>) -> ApiResult<HttpResponse> {
    if !database.is_ready().await {
        return Err(ApiError::from(DbError::from(ConnectionError::NotReady)));
    }

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use labstore::{config::DatabaseConfig, memory::InMemoryStore};
    use serde_json::Value;

    #[actix_web::test]
    async fn machines_returns_the_literal() {
        let app = test::init_service(App::new().configure(configure)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/machines").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = test::read_body(response).await;
        assert_eq!(body, "MACHINES");
    }

    #[actix_web::test]
    async fn health_is_unavailable_before_initialization() {
        let database = web::Data::new(Database::new());
        let app = test::init_service(App::new().app_data(database.clone()).configure(configure)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["statusCode"], 503);
        assert_eq!(body["error"], "ConnectionError");
        assert_eq!(body["message"], "Database is not ready!");
    }

    #[actix_web::test]
    async fn health_is_ok_once_connected() {
        let database = web::Data::new(Database::new());
        database.initialize(InMemoryStore::builder(), "").await.unwrap();
        let app = test::init_service(App::new().app_data(database.clone()).configure(configure)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let config = DatabaseConfig::new("memory://", "lab");
        let error = labstore::initialize(&database, &config, || {}).await.unwrap_err();
        assert_eq!(ApiError::from(error).kind(), "ConfigurationError");
    }
}
