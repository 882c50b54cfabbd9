use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::errors::BridgeError;
use crate::event::IncomingEvent;
use crate::integration::IntegrationConfig;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use redmine::IssueId;
use serde::Serialize;
use shared::http::make_boxed_error_response;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;

const EVENTS_PATH: &str = "/events";

#[derive(Serialize)]
struct DispatchResponse {
    result: &'static str,
    issue_id: Option<IssueId>,
}

impl From<DispatchResult> for DispatchResponse {
    fn from(result: DispatchResult) -> Self {
        DispatchResponse {
            result: result.as_str(),
            issue_id: result.issue_id(),
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

/// Receives Sentry event notifications and hands them to the dispatcher
/// together with the settings of the event's project.
#[derive(Clone)]
pub struct BridgeService {
    dispatcher: Dispatcher,
    projects: Arc<BTreeMap<String, IntegrationConfig>>,
}

impl BridgeService {
    pub fn new(dispatcher: Dispatcher, projects: BTreeMap<String, IntegrationConfig>) -> Self {
        BridgeService {
            dispatcher,
            projects: Arc::new(projects),
        }
    }

    async fn handle<B>(&self, req: Request<B>) -> Response<BoxBody<Bytes, BridgeError>>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        if req.uri().path() != EVENTS_PATH {
            return make_boxed_error_response(StatusCode::NOT_FOUND);
        }
        if *req.method() != Method::POST {
            return make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return make_boxed_error_response(StatusCode::BAD_REQUEST);
            }
        };

        let event: IncomingEvent = match serde_json::from_slice(&body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed event notification");
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &ApiErrorResponse {
                        error_message: e.to_string(),
                    },
                );
            }
        };

        // Unknown projects dispatch with empty settings and are skipped
        let unconfigured = IntegrationConfig::default();
        let config = self
            .projects
            .get(&event.project_slug)
            .unwrap_or(&unconfigured);

        match self.dispatcher.handle_event(config, &event).await {
            Ok(result) => json_response(StatusCode::OK, &DispatchResponse::from(result)),
            Err(e) => {
                tracing::error!(
                    project = %event.project_slug,
                    group_id = %event.group_id,
                    error = %e,
                    "Event dispatch failed"
                );
                json_response(
                    StatusCode::BAD_GATEWAY,
                    &ApiErrorResponse {
                        error_message: e.to_string(),
                    },
                )
            }
        }
    }
}

impl Service<Request<Incoming>> for BridgeService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = BridgeError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody<Bytes, BridgeError>> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            return make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut response = Response::new(
        Full::new(Bytes::from(bytes))
            .map_err(|never| match never {})
            .boxed(),
    );
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
