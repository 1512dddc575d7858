//! # User administration
//!
//! Admin-only views: the account list, the client list and account approval.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    backend::{BackendClient, BackendError},
    models::{Client, SelectOption, User},
};

pub struct UserStore {
    backend: Arc<dyn BackendClient>,
    users: Vec<User>,
    clients: Vec<Client>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            users: Vec::new(),
            clients: Vec::new(),
        }
    }

    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    #[must_use]
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// Accounts still waiting for approval.
    pub fn pending(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| !u.is_approved)
    }

    pub async fn fetch_users(&mut self) -> Result<&[User], BackendError> {
        self.users = self.backend.list_users().await?;
        debug!(count = self.users.len(), "Fetched users");
        Ok(&self.users)
    }

    pub async fn fetch_clients(&mut self) -> Result<&[Client], BackendError> {
        self.clients = self.backend.list_clients().await?;
        debug!(count = self.clients.len(), "Fetched clients");
        Ok(&self.clients)
    }

    /// Approves an account and marks it approved in the cached list.
    pub async fn approve(&mut self, id: i64) -> Result<(), BackendError> {
        self.backend.approve_user(id).await?;
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.is_approved = true;
        }
        info!(id, "Approved account");
        Ok(())
    }

    /// Clients as select options, labelled by company when one is set.
    #[must_use]
    pub fn client_options(&self) -> Vec<SelectOption> {
        self.clients
            .iter()
            .map(|c| {
                let label = match c.company.as_deref().map(str::trim) {
                    Some(company) if !company.is_empty() => format!("{company} ({})", c.full_name),
                    _ => c.full_name.clone(),
                };
                SelectOption::new(c.id, label)
            })
            .collect()
    }
}
