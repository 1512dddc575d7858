use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, Url, multipart::Form};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    backend::{BackendClient, BackendError, BackendFuture, ErrorBody},
    models::{
        AccessToken, Attachment, Client, ClientRegistration, ReceiverRegistration, TokenPair, User,
        Vehicle, VehicleRequest, VehicleType, VehicleUpdate,
    },
    storage::{TokenKind, TokenStorage},
};

pub mod form;

#[cfg(test)]
mod tests;

use form::{PlannedBody, VehicleCreatePlan};

/// # REST backend client
///
/// Talks to the backend over HTTP. Every request carries the access token found in token storage
/// at send time, so a token refreshed by the session is picked up by the next request without
/// rebuilding the client.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenStorage>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Endpoints sometimes answer a create with one record and sometimes with a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<Vehicle>),
    Many(Vec<Vehicle>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<Vehicle> {
        match self {
            OneOrMany::One(vehicle) => vec![*vehicle],
            OneOrMany::Many(vehicles) => vehicles,
        }
    }
}

impl HttpBackend {
    pub fn new(base_url: Url, tokens: Arc<dyn TokenStorage>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, tokens)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        tokens: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Starts a request and attaches the stored access token, if any.
    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match self.tokens.load(TokenKind::Access).await {
            Ok(Some(access)) => builder.bearer_auth(access),
            Ok(None) => builder,
            Err(error) => {
                warn!("Failed to read access token, sending request without it: {error}");
                builder
            }
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "Backend rejected request");
        Err(BackendError::Status {
            status: status.as_u16(),
            body: ErrorBody::parse(&text),
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BackendError> {
        Ok(Self::send(builder).await?.json().await?)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), BackendError> {
        Self::send(builder).await?;
        Ok(())
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<Response, BackendError> {
        Self::send(self.request(Method::POST, path).await.multipart(form)).await
    }
}

impl BackendClient for HttpBackend {
    fn obtain_tokens<'a>(
        &self,
        identifier: &'a str,
        secret: &'a str,
    ) -> BackendFuture<'a, TokenPair> {
        let this = self.clone();
        Box::pin(async move {
            let builder = this
                .request(Method::POST, "/accounts/token/")
                .await
                .json(&json!({ "phone": identifier, "password": secret }));
            Self::send_json(builder).await
        })
    }

    fn refresh_access<'a>(&self, refresh: &'a str) -> BackendFuture<'a, AccessToken> {
        let this = self.clone();
        Box::pin(async move {
            let builder = this
                .request(Method::POST, "/accounts/token/refresh/")
                .await
                .json(&json!({ "refresh": refresh }));
            Self::send_json(builder).await
        })
    }

    fn register<'a>(&self, draft: &'a ReceiverRegistration) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let form = form::into_form(form::plan_receiver_registration(draft))?;
            this.post_form("/accounts/register/", form).await?;
            Ok(())
        })
    }

    fn register_client<'a>(&self, draft: &'a ClientRegistration) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let form = form::into_form(form::plan_client_registration(draft))?;
            this.post_form("/accounts/register/client/", form).await?;
            Ok(())
        })
    }

    fn onboard(&self) -> BackendFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            Self::send_empty(this.request(Method::POST, "/accounts/onboard/").await).await
        })
    }

    fn list_users(&self) -> BackendFuture<'static, Vec<User>> {
        let this = self.clone();
        Box::pin(async move {
            Self::send_json(this.request(Method::GET, "/accounts/users/").await).await
        })
    }

    fn list_clients(&self) -> BackendFuture<'static, Vec<Client>> {
        let this = self.clone();
        Box::pin(async move {
            Self::send_json(this.request(Method::GET, "/accounts/clients/").await).await
        })
    }

    fn approve_user(&self, id: i64) -> BackendFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let path = format!("/accounts/users/{id}/approve/");
            Self::send_empty(this.request(Method::POST, &path).await).await
        })
    }

    fn list_vehicle_types(&self) -> BackendFuture<'static, Vec<VehicleType>> {
        let this = self.clone();
        Box::pin(async move {
            Self::send_json(this.request(Method::GET, "/autotrips/vehicles-types/").await).await
        })
    }

    fn list_vehicles(&self, client_id: Option<i64>) -> BackendFuture<'static, Vec<Vehicle>> {
        let this = self.clone();
        Box::pin(async move {
            let mut builder = this.request(Method::GET, "/autotrips/vehicles/").await;
            if let Some(client_id) = client_id {
                builder = builder.query(&[("client_id", client_id)]);
            }
            Self::send_json(builder).await
        })
    }

    fn get_vehicle(&self, id: i64) -> BackendFuture<'static, Vehicle> {
        let this = self.clone();
        Box::pin(async move {
            let path = format!("/autotrips/vehicles/{id}/");
            Self::send_json(this.request(Method::GET, &path).await).await
        })
    }

    fn create_vehicles<'a>(
        &self,
        vehicles: &'a [VehicleRequest],
    ) -> BackendFuture<'a, Vec<Vehicle>> {
        let this = self.clone();
        Box::pin(async move {
            let plan = form::plan_vehicle_create(vehicles)
                .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
            match plan {
                VehicleCreatePlan::Batch(body) => {
                    debug!(count = vehicles.len(), "Creating vehicles in one JSON request");
                    let builder = this
                        .request(Method::POST, "/autotrips/vehicles/")
                        .await
                        .json(&body);
                    Ok(Self::send_json::<OneOrMany>(builder).await?.into_vec())
                }
                VehicleCreatePlan::PerRecord(requests) => {
                    debug!(count = requests.len(), "Creating vehicles one multipart request each");
                    let mut created = Vec::with_capacity(requests.len());
                    for (index, parts) in requests.into_iter().enumerate() {
                        let form = form::into_form(parts)?;
                        let response = this
                            .post_form("/autotrips/vehicles/", form)
                            .await
                            .map_err(|error| match error {
                                BackendError::Status { status, body } => BackendError::Status {
                                    status,
                                    body: body.at_record(index),
                                },
                                other => other,
                            })?;
                        created.extend(response.json::<OneOrMany>().await?.into_vec());
                    }
                    Ok(created)
                }
            }
        })
    }

    fn update_vehicle<'a>(&self, id: i64, update: &'a VehicleUpdate) -> BackendFuture<'a, Vehicle> {
        let this = self.clone();
        Box::pin(async move {
            let path = format!("/autotrips/vehicles/{id}/");
            let builder = this.request(Method::PATCH, &path).await;
            let builder = match form::plan_vehicle_update(update)
                .map_err(|e| BackendError::InvalidRequest(e.to_string()))?
            {
                PlannedBody::Json(body) => builder.json(&body),
                PlannedBody::Multipart(parts) => builder.multipart(form::into_form(parts)?),
            };
            Self::send_json(builder).await
        })
    }

    fn upload_spreadsheet<'a>(
        &self,
        client_id: i64,
        file: &'a Attachment,
    ) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let form = form::into_form(form::plan_spreadsheet(client_id, file))?;
            this.post_form("/autotrips/vehicles/upload-excel/", form).await?;
            Ok(())
        })
    }
}
