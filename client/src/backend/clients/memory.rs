use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use serde_json::{Value, json};

use crate::{
    backend::{BackendClient, BackendError, BackendFuture, ErrorBody},
    models::{
        AccessToken, Attachment, Claims, Client, ClientRegistration, Photo, ReceiverRegistration,
        Role, TokenPair, User, Vehicle, VehicleRequest, VehicleType, VehicleUpdate,
    },
    session::token::encode_unsigned,
};

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";

#[derive(Debug, Clone)]
struct Account {
    id: i64,
    full_name: String,
    phone: String,
    telegram: String,
    email: String,
    company: Option<String>,
    address: Option<String>,
    password: String,
    role: Role,
    is_approved: bool,
    is_onboarded: bool,
}

impl Account {
    fn claims(&self) -> Claims {
        Claims {
            user_id: self.id,
            role: self.role,
            is_approved: self.is_approved,
            is_onboarded: self.is_onboarded,
            exp: None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    vehicles: Vec<Vehicle>,
    types: Vec<VehicleType>,
    refresh_tokens: HashMap<String, i64>,
    current: Option<i64>,
    next_id: i64,
    offline: bool,
    fail_onboarding: bool,
    spreadsheet_rejection: Option<Value>,
    calls: HashMap<&'static str, usize>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Counts a call and fails it when the backend is offline.
    fn enter(&mut self, operation: &'static str) -> Result<(), BackendError> {
        *self.calls.entry(operation).or_default() += 1;
        if self.offline {
            return Err(BackendError::Network("backend is offline".to_string()));
        }
        Ok(())
    }

    fn account_conflicts(&self, phone: &str, telegram: &str, email: &str) -> Option<ErrorBody> {
        let mut conflicts = serde_json::Map::new();
        if self.accounts.iter().any(|a| a.phone == phone) {
            conflicts.insert(
                "phone".to_string(),
                json!({
                    "error_type": "phone_exists",
                    "message": "This phone number is already registered.",
                }),
            );
        }
        if self.accounts.iter().any(|a| a.telegram == telegram) {
            conflicts.insert(
                "telegram".to_string(),
                json!({
                    "error_type": "telegram_exists",
                    "message": "This Telegram login is already registered.",
                }),
            );
        }
        if !email.is_empty() && self.accounts.iter().any(|a| a.email == email) {
            conflicts.insert(
                "email".to_string(),
                json!({
                    "error_type": "email_exists",
                    "message": "This e-mail is already registered.",
                }),
            );
        }
        (!conflicts.is_empty()).then(|| ErrorBody(Value::Object(conflicts)))
    }
}

/// # In-process backend
///
/// Implements [`BackendClient`] over in-memory accounts and vehicles. Issued access tokens are
/// unsigned but carry real claims, so everything downstream of the credential exchange behaves as
/// against the real backend. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

fn bad_request(body: Value) -> BackendError {
    BackendError::Status {
        status: 400,
        body: ErrorBody(body),
    }
}

fn not_found() -> BackendError {
    BackendError::Status {
        status: 404,
        body: ErrorBody(json!({ "detail": "Not found." })),
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an account and returns its id.
    pub fn add_account(
        &self,
        phone: &str,
        password: &str,
        role: Role,
        is_approved: bool,
        is_onboarded: bool,
    ) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        state.accounts.push(Account {
            id,
            full_name: format!("Account {id}"),
            phone: phone.to_string(),
            telegram: format!("account{id}"),
            email: String::new(),
            company: None,
            address: None,
            password: password.to_string(),
            role,
            is_approved,
            is_onboarded,
        });
        id
    }

    pub fn add_vehicle_type(&self, label: &str) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        state.types.push(VehicleType {
            id,
            label: label.to_string(),
        });
        id
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn fail_onboarding(&self, fail: bool) {
        self.lock().fail_onboarding = fail;
    }

    /// Makes every spreadsheet upload fail with `body`.
    pub fn reject_spreadsheets(&self, body: Value) {
        self.lock().spreadsheet_rejection = Some(body);
    }

    /// Number of times `operation` (a [`BackendClient`] method name) was called.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.lock().vehicles.clone()
    }

    /// Whether the account with `id` has been approved by an administrator.
    #[must_use]
    pub fn is_approved(&self, id: i64) -> bool {
        self.lock()
            .accounts
            .iter()
            .any(|a| a.id == id && a.is_approved)
    }

    fn attach_photos(state: &mut State, photos: &[Attachment]) -> Vec<Photo> {
        photos
            .iter()
            .map(|photo| Photo {
                id: state.next_id(),
                image: format!("/media/documents/{}", photo.file_name),
            })
            .collect()
    }

    fn to_vehicle(state: &mut State, id: i64, request: &VehicleRequest) -> Vehicle {
        let client_name = state
            .accounts
            .iter()
            .find(|a| a.id == request.client)
            .map(|a| a.full_name.clone());
        let v_type_name = request
            .v_type
            .and_then(|t| state.types.iter().find(|vt| vt.id == t))
            .map(|vt| vt.label.clone());
        let document_photos = Self::attach_photos(state, &request.document_photos);
        let now = Utc::now();
        Vehicle {
            id,
            client: Some(request.client),
            client_name,
            year_brand_model: request.year_brand_model.clone(),
            v_type: request.v_type,
            v_type_name,
            vin: request.vin.clone(),
            price: request.price.map(|p| format!("{p:.2}")),
            container_number: request.container_number.clone(),
            arrival_date: request.arrival_date,
            transporter: request.transporter.clone(),
            recipient: request.recipient.clone(),
            comment: request.comment.clone(),
            status: request.status,
            status_changed: request.status.map(|_| now),
            creation_time: Some(now),
            document_photos,
        }
    }
}

impl BackendClient for MemoryBackend {
    fn obtain_tokens<'a>(
        &self,
        identifier: &'a str,
        secret: &'a str,
    ) -> BackendFuture<'a, TokenPair> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("obtain_tokens")?;
            let Some(account) = state
                .accounts
                .iter()
                .find(|a| a.phone == identifier && a.password == secret)
                .cloned()
            else {
                return Err(BackendError::Status {
                    status: 401,
                    body: ErrorBody(json!({ "detail": NO_ACTIVE_ACCOUNT })),
                });
            };
            let refresh = format!("refresh-{}-{}", account.id, state.next_id());
            state.refresh_tokens.insert(refresh.clone(), account.id);
            state.current = Some(account.id);
            Ok(TokenPair {
                access: encode_unsigned(&account.claims()),
                refresh,
            })
        })
    }

    fn refresh_access<'a>(&self, refresh: &'a str) -> BackendFuture<'a, AccessToken> {
        let this = self.clone();
        Box::pin(async move {
            this.lock().enter("refresh_access")?;
            // let concurrent callers observe the request as outstanding
            tokio::task::yield_now().await;
            let mut state = this.lock();
            let account = state
                .refresh_tokens
                .get(refresh)
                .and_then(|id| state.accounts.iter().find(|a| a.id == *id))
                .cloned()
                .ok_or_else(|| BackendError::Status {
                    status: 401,
                    body: ErrorBody(json!({
                        "detail": "Token is invalid or expired",
                        "code": "token_not_valid",
                    })),
                })?;
            state.current = Some(account.id);
            Ok(AccessToken {
                access: encode_unsigned(&account.claims()),
            })
        })
    }

    fn register<'a>(&self, draft: &'a ReceiverRegistration) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("register")?;
            if let Some(conflicts) = state.account_conflicts(&draft.phone, &draft.telegram, "") {
                return Err(BackendError::Status {
                    status: 400,
                    body: conflicts,
                });
            }
            let id = state.next_id();
            state.accounts.push(Account {
                id,
                full_name: draft.full_name.clone(),
                phone: draft.phone.clone(),
                telegram: draft.telegram.clone(),
                email: String::new(),
                company: None,
                address: None,
                password: draft.password.clone(),
                role: Role::User,
                is_approved: false,
                is_onboarded: false,
            });
            Ok(())
        })
    }

    fn register_client<'a>(&self, draft: &'a ClientRegistration) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("register_client")?;
            if let Some(conflicts) =
                state.account_conflicts(&draft.phone, &draft.telegram, &draft.email)
            {
                return Err(BackendError::Status {
                    status: 400,
                    body: conflicts,
                });
            }
            let id = state.next_id();
            let optional = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
            state.accounts.push(Account {
                id,
                full_name: draft.full_name.clone(),
                phone: draft.phone.clone(),
                telegram: draft.telegram.clone(),
                email: draft.email.clone(),
                company: optional(&draft.company),
                address: optional(&draft.address),
                password: draft.password.clone(),
                role: Role::Client,
                is_approved: false,
                is_onboarded: false,
            });
            Ok(())
        })
    }

    fn onboard(&self) -> BackendFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("onboard")?;
            if state.fail_onboarding {
                return Err(BackendError::Status {
                    status: 500,
                    body: ErrorBody::default(),
                });
            }
            let current = state.current;
            let account = state
                .accounts
                .iter_mut()
                .find(|a| Some(a.id) == current)
                .ok_or_else(not_found)?;
            account.is_onboarded = true;
            Ok(())
        })
    }

    fn list_users(&self) -> BackendFuture<'static, Vec<User>> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("list_users")?;
            Ok(state
                .accounts
                .iter()
                .map(|a| User {
                    id: a.id,
                    full_name: a.full_name.clone(),
                    phone: a.phone.clone(),
                    telegram: a.telegram.clone(),
                    role: a.role,
                    is_approved: a.is_approved,
                    is_onboarded: a.is_onboarded,
                    documents: Vec::new(),
                })
                .collect())
        })
    }

    fn list_clients(&self) -> BackendFuture<'static, Vec<Client>> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("list_clients")?;
            Ok(state
                .accounts
                .iter()
                .filter(|a| a.role == Role::Client)
                .map(|a| Client {
                    id: a.id,
                    full_name: a.full_name.clone(),
                    email: a.email.clone(),
                    telegram: a.telegram.clone(),
                    phone: a.phone.clone(),
                    company: a.company.clone(),
                    address: a.address.clone(),
                })
                .collect())
        })
    }

    fn approve_user(&self, id: i64) -> BackendFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("approve_user")?;
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(not_found)?;
            account.is_approved = true;
            Ok(())
        })
    }

    fn list_vehicle_types(&self) -> BackendFuture<'static, Vec<VehicleType>> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("list_vehicle_types")?;
            Ok(state.types.clone())
        })
    }

    fn list_vehicles(&self, client_id: Option<i64>) -> BackendFuture<'static, Vec<Vehicle>> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("list_vehicles")?;
            Ok(state
                .vehicles
                .iter()
                .filter(|v| client_id.is_none() || v.client == client_id)
                .cloned()
                .collect())
        })
    }

    fn get_vehicle(&self, id: i64) -> BackendFuture<'static, Vehicle> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("get_vehicle")?;
            state
                .vehicles
                .iter()
                .find(|v| v.id == id)
                .cloned()
                .ok_or_else(not_found)
        })
    }

    fn create_vehicles<'a>(
        &self,
        vehicles: &'a [VehicleRequest],
    ) -> BackendFuture<'a, Vec<Vehicle>> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("create_vehicles")?;

            let mut rejected = false;
            let issues: Vec<Value> = vehicles
                .iter()
                .enumerate()
                .map(|(i, request)| {
                    let taken = state.vehicles.iter().any(|v| v.vin == request.vin)
                        || vehicles[..i].iter().any(|r| r.vin == request.vin);
                    if taken {
                        rejected = true;
                        json!({ "vin": ["vehicle with this vin already exists."] })
                    } else {
                        json!({})
                    }
                })
                .collect();
            if rejected {
                return Err(bad_request(Value::Array(issues)));
            }

            let mut created = Vec::with_capacity(vehicles.len());
            for request in vehicles {
                let id = state.next_id();
                let vehicle = Self::to_vehicle(&mut state, id, request);
                state.vehicles.push(vehicle.clone());
                created.push(vehicle);
            }
            Ok(created)
        })
    }

    fn update_vehicle<'a>(&self, id: i64, update: &'a VehicleUpdate) -> BackendFuture<'a, Vehicle> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("update_vehicle")?;
            if let Some(vin) = &update.vin {
                if state.vehicles.iter().any(|v| v.id != id && &v.vin == vin) {
                    return Err(bad_request(
                        json!({ "vin": ["vehicle with this vin already exists."] }),
                    ));
                }
            }
            let added = Self::attach_photos(&mut state, &update.document_photos);
            let v_type_name = update.v_type.map(|t| {
                t.and_then(|t| state.types.iter().find(|vt| vt.id == t))
                    .map(|vt| vt.label.clone())
            });
            let vehicle = state
                .vehicles
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(not_found)?;

            if let Some(value) = &update.year_brand_model {
                vehicle.year_brand_model.clone_from(value);
            }
            if let Some(value) = &update.vin {
                vehicle.vin.clone_from(value);
            }
            if let Some(value) = update.v_type {
                vehicle.v_type = value;
                vehicle.v_type_name = v_type_name.flatten();
            }
            if let Some(value) = update.price {
                vehicle.price = value.map(|p| format!("{p:.2}"));
            }
            if let Some(value) = update.arrival_date {
                vehicle.arrival_date = value;
            }
            for (field, value) in [
                (&mut vehicle.container_number, &update.container_number),
                (&mut vehicle.transporter, &update.transporter),
                (&mut vehicle.recipient, &update.recipient),
                (&mut vehicle.comment, &update.comment),
            ] {
                if let Some(value) = value {
                    *field = (!value.is_empty()).then(|| value.clone());
                }
            }
            if let Some(status) = update.status {
                if vehicle.status != Some(status) {
                    vehicle.status_changed = Some(Utc::now());
                }
                vehicle.status = Some(status);
            }
            vehicle
                .document_photos
                .retain(|p| !update.remove_document_photo_ids.contains(&p.id));
            vehicle.document_photos.extend(added);
            Ok(vehicle.clone())
        })
    }

    fn upload_spreadsheet<'a>(
        &self,
        client_id: i64,
        file: &'a Attachment,
    ) -> BackendFuture<'a, ()> {
        let this = self.clone();
        Box::pin(async move {
            let mut state = this.lock();
            state.enter("upload_spreadsheet")?;
            if !file.is_spreadsheet() {
                return Err(bad_request(
                    json!({ "excel_file": ["Only .xlsx and .xls files are supported."] }),
                ));
            }
            if !state.accounts.iter().any(|a| a.id == client_id) {
                return Err(bad_request(json!({ "client": ["Invalid client."] })));
            }
            match state.spreadsheet_rejection.clone() {
                Some(body) => Err(bad_request(body)),
                None => Ok(()),
            }
        })
    }
}
