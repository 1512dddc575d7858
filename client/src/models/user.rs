use serde::{Deserialize, Serialize};

use crate::models::{Attachment, Role};

/// A stored photograph, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub telegram: String,
    pub role: Role,
    pub is_approved: bool,
    pub is_onboarded: bool,
    #[serde(default)]
    pub documents: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub telegram: String,
    pub phone: String,
    pub company: Option<String>,
    pub address: Option<String>,
}

/// New-account payload for a vehicle receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverRegistration {
    pub full_name: String,
    pub phone: String,
    pub telegram: String,
    pub identity_photos: Vec<Attachment>,
    pub password: String,
    pub confirm_password: String,
    pub consent: bool,
}

/// New-account payload for a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRegistration {
    pub full_name: String,
    pub company: String,
    pub phone: String,
    pub telegram: String,
    pub address: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub consent: bool,
}
