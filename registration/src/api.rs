use crate::errors::RegistrationError;
use crate::registrar::Registrar;
use crate::types::{RegistrationRequest, RegistrationResult};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use std::future::Future;
use tokio::net::TcpListener;

pub const REGISTRATION_PATH: &str = "/api/cadastro";

pub fn router(registrar: Registrar) -> Router {
    Router::new()
        .route(
            REGISTRATION_PATH,
            post(register).options(preflight).fallback(method_not_allowed),
        )
        .layer(middleware::map_response(with_cors))
        .with_state(registrar)
}

pub async fn serve<F>(
    listener: TcpListener,
    registrar: Registrar,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(registrar))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'static str>,
}

async fn register(
    State(registrar): State<Registrar>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("invalid registration payload: {}", rejection.body_text());
            let body = Json(ApiErrorResponse {
                error: rejection.body_text(),
                details: None,
            });
            return (StatusCode::BAD_REQUEST, body).into_response();
        }
    };

    let result: Result<Json<RegistrationResult>, RegistrationError> =
        registrar.register(request).await.map(Json);
    result.into_response()
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    let body = Json(ApiErrorResponse {
        error: "Método não permitido".into(),
        details: None,
    });
    (StatusCode::METHOD_NOT_ALLOWED, body).into_response()
}

async fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        tracing::error!(category = self.category(), "registration failed: {self}");

        let body = Json(ApiErrorResponse {
            error: self.to_string(),
            details: Some("Verifique os logs para mais informações"),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
