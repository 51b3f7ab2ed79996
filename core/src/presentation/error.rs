// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Maps [`ManagerError`] onto HTTP status codes per §7: `InvalidEvent`→400,
//! `UnknownAgent`→404, `InvalidIdentity`/`InvalidPolicyConfig`→400,
//! `Busy`→503 with `Retry-After`, everything else→500. `DuplicateEvent` is
//! never constructed at this boundary — the ingest service absorbs it and
//! returns the stored record instead (§4.3 step 2).

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::error::ManagerError;
use crate::domain::repository::RepositoryError;

pub struct ApiError(pub ManagerError);

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after) = match &self.0 {
            ManagerError::InvalidIdentity(_) => (StatusCode::BAD_REQUEST, None),
            ManagerError::UnknownAgent(_) => (StatusCode::NOT_FOUND, None),
            ManagerError::InvalidEvent(_) => (StatusCode::BAD_REQUEST, None),
            ManagerError::DuplicateEvent => (StatusCode::OK, None),
            ManagerError::InvalidPolicyConfig(_) => (StatusCode::BAD_REQUEST, None),
            ManagerError::Busy => (StatusCode::SERVICE_UNAVAILABLE, Some(1u64)),
            ManagerError::Repository(RepositoryError::NotFound(_)) => (StatusCode::NOT_FOUND, None),
            ManagerError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = Json(json!({ "error": self.0.to_string() }));
        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from_str(&secs.to_string()).unwrap());
        }
        response
    }
}
