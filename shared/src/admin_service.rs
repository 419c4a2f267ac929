use crate::ServeError;
use crate::http::{full_body, make_error_response, make_json_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// Point-in-time status reported by the admin listener.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    pub ready: bool,
    pub details: Map<String, Value>,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'static str,
    #[serde(flatten)]
    details: &'a Map<String, Value>,
}

/// Serves `/health`, `/ready` and `/status` on the admin listener.
///
/// `status` is polled once per request and must be cheap; it never triggers
/// outbound work.
pub struct AdminService<F> {
    status: F,
}

impl<F> AdminService<F>
where
    F: Fn() -> ServiceStatus,
{
    pub fn new(status: F) -> Self {
        Self { status }
    }
}

impl<F> Service<Request<Incoming>> for AdminService<F>
where
    F: Fn() -> ServiceStatus + Send + Sync + 'static,
{
    type Response = Response<BoxBody<Bytes, ServeError>>;
    type Error = ServeError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let status = (self.status)();

        Box::pin(async move {
            if req.method() != Method::GET {
                return Ok(make_error_response(StatusCode::METHOD_NOT_ALLOWED));
            }

            let res = match req.uri().path() {
                "/health" => Response::new(full_body("ok\n")),
                "/ready" => match status.ready {
                    true => Response::new(full_body("ok\n")),
                    false => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                "/status" => {
                    let body = StatusBody {
                        status: if status.ready { "ok" } else { "not_ready" },
                        details: &status.details,
                    };
                    make_json_response(StatusCode::OK, &body)?
                }
                _ => make_error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}
