//! Authentication gate middleware
//!
//! Runs the credential chain for every request on the wrapped scope, then
//! enforces that no header/body/query field asserts a different user than
//! the one that authenticated. The `required` variant answers 401 when no
//! credential verifies; the `optional` variant lets the request through
//! without a bound identity.

use std::collections::HashMap;
use std::rc::Rc;

use actix_http::h1;
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ResponseError;
use actix_web::http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use actix_web::http::uri::{PathAndQuery, Uri};
use actix_web::{web, Error, HttpMessage};
use bytes::{Bytes, BytesMut};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use futures_util::StreamExt;
use serde_json::Value;

use crate::auth::chain::RequestCredentials;
use crate::auth::identity::{self, USER_ID_HEADER};
use crate::error::AppError;
use crate::state::app_state::AppState;

pub struct AuthGate {
    required: bool,
}

impl AuthGate {
    /// Gate that rejects unauthenticated requests with 401.
    pub fn required() -> Self {
        Self { required: true }
    }

    /// Gate that binds an identity when one verifies but lets
    /// unauthenticated requests through.
    pub fn optional() -> Self {
        Self { required: false }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateMiddleware {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct AuthGateMiddleware<S> {
    service: Rc<S>,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for AuthGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required = self.required;

        Box::pin(async move {
            let app_state = match req.app_data::<web::Data<AppState>>() {
                Some(state) => state.clone(),
                None => {
                    return Ok(reject(
                        req,
                        AppError::internal("AppState not available".to_string()),
                    ))
                }
            };

            let credentials = RequestCredentials::from_headers(req.headers());
            match app_state.auth_chain.authenticate(&credentials).await {
                Some(user) => {
                    if let Err(e) = enforce_request_identity(&mut req, user.id).await {
                        return Ok(reject(req, e));
                    }
                    req.extensions_mut().insert(user);
                    service
                        .call(req)
                        .await
                        .map(|res| res.map_into_left_body())
                }
                // The specific failure cause was already logged by the chain;
                // the caller only ever sees a generic 401.
                None if required => Ok(reject(req, AppError::unauthorized())),
                None => service
                    .call(req)
                    .await
                    .map(|res| res.map_into_left_body()),
            }
        })
    }
}

/// Turn the request into an error response without touching the inner
/// service, keeping the Problem Details contract for gate rejections.
fn reject<B>(req: ServiceRequest, err: AppError) -> ServiceResponse<EitherBody<B>> {
    let response = err.error_response().map_into_right_body();
    req.into_response(response)
}

/// Run the identity enforcer over the raw request, rewriting body and query
/// in place so downstream handlers see the backfilled fields.
async fn enforce_request_identity(req: &mut ServiceRequest, user_id: i64) -> Result<(), AppError> {
    let header_user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Only JSON bodies participate; other payloads pass through untouched.
    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    let mut body_value: Option<Value> = None;
    let mut raw_body: Option<Bytes> = None;
    if is_json {
        let mut payload = req.take_payload();
        let mut buf = BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::bad_request("INVALID_BODY", format!("failed to read request body: {e}"))
            })?;
            buf.extend_from_slice(&chunk);
        }
        let bytes = buf.freeze();
        if !bytes.is_empty() {
            // Unparsable JSON is not this middleware's problem; the
            // downstream extractor will produce the 400.
            body_value = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .filter(Value::is_object);
            raw_body = Some(bytes);
        }
    }

    let mut query: HashMap<String, String> =
        web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .map(web::Query::into_inner)
            .unwrap_or_default();
    let query_before = query.clone();

    let enforce_result = identity::enforce(
        user_id,
        header_user_id.as_deref(),
        body_value.as_mut().and_then(Value::as_object_mut),
        &mut query,
    );

    if let Some(value) = &body_value {
        // Re-serialize the (possibly backfilled) object back into the payload.
        let bytes = serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| AppError::internal(format!("failed to re-encode request body: {e}")))?;
        reset_payload(req, bytes);
    } else if let Some(bytes) = raw_body {
        reset_payload(req, bytes);
    }

    enforce_result?;

    if query != query_before {
        rewrite_query(req, &query)?;
    }

    Ok(())
}

/// Put a buffered (and possibly rewritten) body back onto the request.
fn reset_payload(req: &mut ServiceRequest, bytes: Bytes) {
    if let Ok(len) = HeaderValue::from_str(&bytes.len().to_string()) {
        req.headers_mut().insert(CONTENT_LENGTH, len);
    }
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(bytes);
    req.set_payload(Payload::from(payload));
}

fn rewrite_query(req: &mut ServiceRequest, query: &HashMap<String, String>) -> Result<(), AppError> {
    let encoded = serde_urlencoded::to_string(query)
        .map_err(|e| AppError::internal(format!("failed to re-encode query string: {e}")))?;
    let path_and_query = format!("{}?{}", req.uri().path(), encoded);

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query.as_str())
            .map_err(|e| AppError::internal(format!("failed to rebuild request uri: {e}")))?,
    );
    req.head_mut().uri = Uri::from_parts(parts)
        .map_err(|e| AppError::internal(format!("failed to rebuild request uri: {e}")))?;
    Ok(())
}
