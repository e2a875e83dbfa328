// SPDX-License-Identifier: GPL-3.0-only

//! HTTP implementation of the recognition backend

use super::ScanBackend;
use super::types::{
    EncodedImage, Recognition, RecognitionResponse, SessionCreated, SessionPoll,
    SessionPollResponse,
};
use crate::config::Config;
use crate::constants::api;
use crate::errors::{RecognitionError, SessionError};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// reqwest-backed [`ScanBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, RecognitionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api::REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RecognitionError> {
        Self::new(&config.api_base_url, config.auth_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn image_form(image: EncodedImage) -> Result<Form, RecognitionError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(image.mime)
            .map_err(|e| RecognitionError::Encoding(e.to_string()))?;
        Ok(Form::new().part(api::IMAGE_FIELD, part))
    }

    /// Turn a non-success status into a backend error, keeping the body text
    async fn backend_error(response: Response) -> RecognitionError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RecognitionError::Backend { status, message }
    }

    async fn recognize_impl(&self, image: EncodedImage) -> Result<Recognition, RecognitionError> {
        let size = image.bytes.len();
        let form = Self::image_form(image)?;
        debug!(size, "Submitting region for recognition");

        let response = self
            .client
            .post(self.url(api::INFER_PATH))
            .multipart(form)
            .send()
            .await?;

        // The backend answers 404 when nothing in its index matched
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Backend reported no matching card");
            return Ok(Recognition::NoMatch);
        }
        if !response.status().is_success() {
            let error = Self::backend_error(response).await;
            warn!(error = %error, "Recognition request failed");
            return Err(error);
        }

        let body: RecognitionResponse = response.json().await?;
        Ok(body.into_recognition())
    }

    async fn create_session_impl(&self) -> Result<String, RecognitionError> {
        let mut request = self.client.post(self.url(api::SESSION_CREATE_PATH));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }

        let created: SessionCreated = response.json().await?;
        info!(session_id = %created.session_id, "Remote session created");
        Ok(created.session_id)
    }

    /// Map session endpoint statuses onto [`SessionError`]
    async fn check_session_status(
        response: Response,
        session_id: &str,
    ) -> Result<Response, SessionError> {
        let status = response.status();
        if let Some(error) = session_status_error(status, session_id) {
            return Err(error);
        }
        if status.is_success() {
            Ok(response)
        } else {
            Err(SessionError::Transport(Self::backend_error(response).await))
        }
    }

    async fn poll_session_impl(&self, session_id: &str) -> Result<SessionPoll, SessionError> {
        let url = format!("{}/{}", self.url(api::SESSION_RESULT_PATH), session_id);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(RecognitionError::from)?;
        let response = Self::check_session_status(response, session_id).await?;

        let body: SessionPollResponse = response.json().await.map_err(RecognitionError::from)?;
        body.into_poll().ok_or_else(|| {
            SessionError::Transport(RecognitionError::InvalidResponse(
                "completed result without result_id".to_string(),
            ))
        })
    }

    async fn submit_to_session_impl(
        &self,
        session_id: &str,
        image: EncodedImage,
    ) -> Result<(), SessionError> {
        let form = Self::image_form(image)?;
        let url = format!("{}/{}", self.url(api::SESSION_SUBMIT_PATH), session_id);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(RecognitionError::from)?;
        Self::check_session_status(response, session_id).await?;
        debug!(session_id, "Capture uploaded to remote session");
        Ok(())
    }
}

/// Statuses that mean the session itself is gone and a new one is needed
fn session_status_error(status: StatusCode, session_id: &str) -> Option<SessionError> {
    match status {
        StatusCode::FORBIDDEN => Some(SessionError::Expired {
            session_id: session_id.to_string(),
        }),
        StatusCode::NOT_FOUND => Some(SessionError::NotFound {
            session_id: session_id.to_string(),
        }),
        _ => None,
    }
}

impl ScanBackend for HttpBackend {
    fn recognize(&self, image: EncodedImage) -> BoxFuture<'_, Result<Recognition, RecognitionError>> {
        self.recognize_impl(image).boxed()
    }

    fn create_session(&self) -> BoxFuture<'_, Result<String, RecognitionError>> {
        self.create_session_impl().boxed()
    }

    fn poll_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<SessionPoll, SessionError>> {
        self.poll_session_impl(session_id).boxed()
    }

    fn submit_to_session<'a>(
        &'a self,
        session_id: &'a str,
        image: EncodedImage,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        self.submit_to_session_impl(session_id, image).boxed()
    }
}
