//! # Registration forms
//!
//! Receiver and client sign-up. Both forms are checked locally, then registered and signed in
//! through the [`SessionStore`]. Conflicts reported by the backend (phone, Telegram login or
//! e-mail already taken) land on the matching field.

use tracing::warn;

use crate::{
    backend::ErrorBody,
    forms::field::{ErrorKind, FieldErrors},
    models::{Attachment, ClientRegistration, ReceiverRegistration, TokenPair},
    session::{SessionError, SessionStore},
};

pub const FULL_NAME_REQUIRED: &str = "Enter your full name.";
pub const PHONE_REQUIRED: &str = "Enter your phone number.";
pub const PHONE_INVALID: &str =
    "Enter the phone number in international format, e.g. +998 90 123 45 67.";
pub const TELEGRAM_REQUIRED: &str = "Enter your Telegram login.";
pub const TELEGRAM_STARTS_WITH_AT: &str = "Enter the Telegram login without the leading @.";
pub const ADDRESS_REQUIRED: &str = "Enter your address.";
pub const EMAIL_INVALID: &str = "Enter a valid e-mail address.";
pub const PHOTOS_REQUIRED: &str = "Attach at least one identity photo.";
pub const PHOTOS_LIMIT: &str = "Attach no more than 10 photos.";
pub const PASSWORD_TOO_SHORT: &str = "The password must be at least 6 characters long.";
pub const PASSWORD_COMPLEXITY: &str =
    "The password must contain an uppercase letter, a lowercase letter, a digit and one of @$!%*?&.";
pub const PASSWORDS_MUST_MATCH: &str = "The passwords do not match.";
pub const CONSENT_REQUIRED: &str = "You must agree to the processing of personal data.";
pub const PHONE_EXISTS: &str = "This phone number is already registered.";
pub const TELEGRAM_EXISTS: &str = "This Telegram login is already registered.";
pub const EMAIL_EXISTS: &str = "This e-mail is already registered.";

const MAX_IDENTITY_PHOTOS: usize = 10;
const MIN_PASSWORD_LEN: usize = 6;
const PASSWORD_SYMBOLS: &str = "@$!%*?&";

/// Fields of the registration forms, in the order they are laid out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterField {
    FullName,
    Company,
    Phone,
    Telegram,
    Address,
    Email,
    IdentityPhotos,
    Password,
    ConfirmPassword,
    Consent,
}

impl RegisterField {
    #[must_use]
    pub fn from_wire(name: &str) -> Option<RegisterField> {
        Some(match name {
            "full_name" => RegisterField::FullName,
            "company" => RegisterField::Company,
            "phone" => RegisterField::Phone,
            "telegram" => RegisterField::Telegram,
            "address" => RegisterField::Address,
            "email" => RegisterField::Email,
            "uploaded_images" => RegisterField::IdentityPhotos,
            "password" => RegisterField::Password,
            "confirm_password" => RegisterField::ConfirmPassword,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationDraft {
    Receiver(ReceiverRegistration),
    Client(ClientRegistration),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("field {field:?} is invalid")]
    Invalid { field: RegisterField },

    /// The backend refused some fields; they are now set on the form.
    #[error("registration was rejected: {0}")]
    Rejected(#[source] SessionError),

    #[error(transparent)]
    Session(SessionError),
}

#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub draft: RegistrationDraft,
    errors: FieldErrors<RegisterField>,
    focus: Option<RegisterField>,
}

impl RegistrationForm {
    #[must_use]
    pub fn receiver() -> Self {
        Self::new(RegistrationDraft::Receiver(ReceiverRegistration::default()))
    }

    #[must_use]
    pub fn client() -> Self {
        Self::new(RegistrationDraft::Client(ClientRegistration::default()))
    }

    #[must_use]
    pub fn new(draft: RegistrationDraft) -> Self {
        Self {
            draft,
            errors: FieldErrors::new(),
            focus: None,
        }
    }

    #[must_use]
    pub fn errors(&self) -> &FieldErrors<RegisterField> {
        &self.errors
    }

    #[must_use]
    pub fn focus(&self) -> Option<RegisterField> {
        self.focus
    }

    /// Runs the form rules and focuses the first invalid field. Returns whether the form is
    /// valid.
    pub fn validate(&mut self) -> bool {
        self.errors = match &self.draft {
            RegistrationDraft::Receiver(draft) => validate_receiver(draft),
            RegistrationDraft::Client(draft) => validate_client(draft),
        };
        self.focus = self.errors.first().map(|(field, _)| field);
        self.errors.is_empty()
    }

    /// Validates, registers and signs the new account in.
    pub async fn submit(&mut self, session: &SessionStore) -> Result<TokenPair, RegistrationError> {
        if !self.validate() {
            let field = self.focus.unwrap_or(RegisterField::FullName);
            return Err(RegistrationError::Invalid { field });
        }
        let result = match &self.draft {
            RegistrationDraft::Receiver(draft) => session.register(draft).await,
            RegistrationDraft::Client(draft) => session.register_client(draft).await,
        };
        let error = match result {
            Ok(pair) => return Ok(pair),
            Err(error) => error,
        };

        if let SessionError::Backend { source, .. } = &error {
            if let Some(body) = source.body() {
                self.errors = conflict_errors(body);
            }
        }
        match self.errors.first() {
            Some((field, _)) => {
                warn!(?field, "Registration rejected by the backend");
                self.focus = Some(field);
                Err(RegistrationError::Rejected(error))
            }
            None => Err(RegistrationError::Session(error)),
        }
    }
}

#[must_use]
pub fn validate_receiver(draft: &ReceiverRegistration) -> FieldErrors<RegisterField> {
    let mut errors = FieldErrors::new();
    check_identity(&mut errors, &draft.full_name, &draft.phone, &draft.telegram);
    if let Some(message) = identity_photos_error(&draft.identity_photos) {
        errors.insert(RegisterField::IdentityPhotos, ErrorKind::Schema, message);
    }
    check_credentials(&mut errors, &draft.password, &draft.confirm_password, draft.consent);
    errors
}

#[must_use]
pub fn validate_client(draft: &ClientRegistration) -> FieldErrors<RegisterField> {
    let mut errors = FieldErrors::new();
    check_identity(&mut errors, &draft.full_name, &draft.phone, &draft.telegram);
    if draft.address.trim().is_empty() {
        errors.insert(RegisterField::Address, ErrorKind::Schema, ADDRESS_REQUIRED);
    }
    let email = draft.email.trim();
    if !email.is_empty() && !is_valid_email(email) {
        errors.insert(RegisterField::Email, ErrorKind::Schema, EMAIL_INVALID);
    }
    check_credentials(&mut errors, &draft.password, &draft.confirm_password, draft.consent);
    errors
}

/// Field errors for a rejected registration. Known conflict codes get a fixed message; anything
/// else keeps the backend's text.
#[must_use]
pub fn conflict_errors(body: &ErrorBody) -> FieldErrors<RegisterField> {
    let mut errors = FieldErrors::new();
    for (name, issue) in body.field_issues() {
        let Some(field) = RegisterField::from_wire(&name) else {
            continue;
        };
        let message = match issue.code.as_deref() {
            Some("phone_exists") => PHONE_EXISTS.to_string(),
            Some("telegram_exists") => TELEGRAM_EXISTS.to_string(),
            Some("email_exists") => EMAIL_EXISTS.to_string(),
            _ => issue.message,
        };
        errors.insert(field, ErrorKind::Manual, message);
    }
    errors
}

fn check_identity(
    errors: &mut FieldErrors<RegisterField>,
    full_name: &str,
    phone: &str,
    telegram: &str,
) {
    if full_name.trim().is_empty() {
        errors.insert(RegisterField::FullName, ErrorKind::Schema, FULL_NAME_REQUIRED);
    }
    if phone.is_empty() {
        errors.insert(RegisterField::Phone, ErrorKind::Schema, PHONE_REQUIRED);
    } else if !is_valid_phone(phone) {
        errors.insert(RegisterField::Phone, ErrorKind::Schema, PHONE_INVALID);
    }
    if telegram.is_empty() {
        errors.insert(RegisterField::Telegram, ErrorKind::Schema, TELEGRAM_REQUIRED);
    } else if telegram.starts_with('@') {
        errors.insert(
            RegisterField::Telegram,
            ErrorKind::Schema,
            TELEGRAM_STARTS_WITH_AT,
        );
    }
}

fn check_credentials(
    errors: &mut FieldErrors<RegisterField>,
    password: &str,
    confirm: &str,
    consent: bool,
) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(RegisterField::Password, ErrorKind::Schema, PASSWORD_TOO_SHORT);
    } else if !is_complex_password(password) {
        errors.insert(RegisterField::Password, ErrorKind::Schema, PASSWORD_COMPLEXITY);
    }
    if password != confirm {
        errors.insert(
            RegisterField::ConfirmPassword,
            ErrorKind::Schema,
            PASSWORDS_MUST_MATCH,
        );
    }
    if !consent {
        errors.insert(RegisterField::Consent, ErrorKind::Schema, CONSENT_REQUIRED);
    }
}

fn identity_photos_error(photos: &[Attachment]) -> Option<String> {
    if photos.is_empty() {
        return Some(PHOTOS_REQUIRED.to_string());
    }
    if photos.len() > MAX_IDENTITY_PHOTOS {
        return Some(PHOTOS_LIMIT.to_string());
    }
    photos
        .iter()
        .find_map(|photo| photo.validate_image().err())
        .map(|error| error.to_string())
}

/// `+`, a country code of 1-3 digits without a leading zero, then 7-20 digits or spaces.
fn is_valid_phone(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('+') else {
        return false;
    };
    let mut chars = rest.chars();
    if !chars.next().is_some_and(|c| matches!(c, '1'..='9')) {
        return false;
    }
    let tail: Vec<char> = chars.collect();
    if !tail.iter().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return false;
    }
    // up to two more country-code digits may be taken from the front
    let movable = tail.iter().take(2).take_while(|c| c.is_ascii_digit()).count();
    tail.len() >= 7 && tail.len() - movable <= 20
}

fn is_complex_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend::clients::memory::MemoryBackend,
        models::Role,
        storage::clients::memory::MemoryStorage,
    };

    fn receiver() -> ReceiverRegistration {
        ReceiverRegistration {
            full_name: "Bobur Karimov".to_string(),
            phone: "+998 90 123 45 67".to_string(),
            telegram: "bobur_k".to_string(),
            identity_photos: vec![Attachment::new("passport.jpg", "image/jpeg", vec![1, 2, 3])],
            password: "Cargo2025!".to_string(),
            confirm_password: "Cargo2025!".to_string(),
            consent: true,
        }
    }

    fn client() -> ClientRegistration {
        ClientRegistration {
            full_name: "Dilnoza Yusupova".to_string(),
            company: String::new(),
            phone: "+998911234567".to_string(),
            telegram: "dilnoza".to_string(),
            address: "Tashkent, Chilonzor 7".to_string(),
            email: "dilnoza@example.com".to_string(),
            password: "Cargo2025!".to_string(),
            confirm_password: "Cargo2025!".to_string(),
            consent: true,
        }
    }

    fn tools() -> (SessionStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let session = SessionStore::new(
            Arc::new(backend.clone()),
            Arc::new(MemoryStorage::new()),
        );
        (session, backend)
    }

    #[test]
    fn test_phone_format() {
        for valid in ["+998901234567", "+998 90 123 45 67", "+1 2345678", "+44 20 7946 0958"] {
            assert!(is_valid_phone(valid), "{valid} should be accepted");
        }
        for invalid in ["998901234567", "+0 901234567", "+99890", "+998-90-123-45-67", "+"] {
            assert!(!is_valid_phone(invalid), "{invalid} should be rejected");
        }
        // 3 code digits + 20 digits is the longest accepted number
        assert!(is_valid_phone(&format!("+123{}", "4".repeat(20))));
        assert!(!is_valid_phone(&format!("+123{}", "4".repeat(21))));
    }

    #[test]
    fn test_password_rules() {
        let mut draft = receiver();
        draft.password = "Ab1!".to_string();
        draft.confirm_password = draft.password.clone();
        let errors = validate_receiver(&draft);
        assert_eq!(
            errors.get(RegisterField::Password).unwrap().message,
            PASSWORD_TOO_SHORT
        );

        draft.password = "cargo2025".to_string();
        let errors = validate_receiver(&draft);
        assert_eq!(
            errors.get(RegisterField::Password).unwrap().message,
            PASSWORD_COMPLEXITY
        );
        assert_eq!(
            errors.get(RegisterField::ConfirmPassword).unwrap().message,
            PASSWORDS_MUST_MATCH
        );
    }

    #[test]
    fn test_receiver_rules() {
        assert!(validate_receiver(&receiver()).is_empty());

        let mut draft = receiver();
        draft.telegram = "@bobur_k".to_string();
        draft.identity_photos.clear();
        draft.consent = false;
        let errors = validate_receiver(&draft);
        let fields: Vec<_> = errors.iter().map(|(field, _)| field).collect();
        assert_eq!(
            fields,
            [
                RegisterField::Telegram,
                RegisterField::IdentityPhotos,
                RegisterField::Consent
            ]
        );

        draft.identity_photos = vec![Attachment::new("id.png", "image/png", vec![0]); 11];
        assert_eq!(
            validate_receiver(&draft)
                .get(RegisterField::IdentityPhotos)
                .unwrap()
                .message,
            PHOTOS_LIMIT
        );
    }

    #[test]
    fn test_client_rules() {
        assert!(validate_client(&client()).is_empty());

        let mut draft = client();
        draft.email.clear();
        assert!(validate_client(&draft).is_empty(), "e-mail is optional");

        draft.email = "dilnoza@localhost".to_string();
        draft.address = " ".to_string();
        let errors = validate_client(&draft);
        assert_eq!(errors.first().unwrap().0, RegisterField::Address);
        assert!(errors.get(RegisterField::Email).is_some());
    }

    #[test]
    fn test_conflict_codes_use_fixed_messages() {
        let body = ErrorBody::parse(
            r#"{
                "phone": {"error_type": "phone_exists", "message": "phone taken"},
                "email": ["Enter a valid email address."],
                "non_field_errors": ["ignored"]
            }"#,
        );
        let errors = conflict_errors(&body);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(RegisterField::Phone).unwrap().message, PHONE_EXISTS);
        assert_eq!(
            errors.get(RegisterField::Email).unwrap().message,
            "Enter a valid email address."
        );
        assert_eq!(errors.get(RegisterField::Phone).unwrap().kind, ErrorKind::Manual);
    }

    #[tokio::test]
    async fn test_submit_registers_and_signs_in() {
        let (session, backend) = tools();
        let mut form = RegistrationForm::new(RegistrationDraft::Receiver(receiver()));

        form.submit(&session)
            .await
            .expect("expected registration to succeed");

        let state = session.session();
        assert!(state.is_authenticated);
        assert_eq!(state.role, Some(Role::User));
        assert!(!state.approved);
        assert_eq!(backend.calls("register"), 1);
    }

    #[tokio::test]
    async fn test_invalid_form_is_not_sent() {
        let (session, backend) = tools();
        let mut form = RegistrationForm::client();

        let error = form.submit(&session).await.unwrap_err();
        assert!(matches!(
            error,
            RegistrationError::Invalid {
                field: RegisterField::FullName
            }
        ));
        assert_eq!(form.focus(), Some(RegisterField::FullName));
        assert_eq!(backend.calls("register_client"), 0);
    }

    #[tokio::test]
    async fn test_conflicts_are_focused() {
        let (session, backend) = tools();
        backend.add_account("+998911234567", "Cargo2025!", Role::Client, true, true);
        let mut form = RegistrationForm::new(RegistrationDraft::Client(client()));

        let error = form.submit(&session).await.unwrap_err();
        assert!(matches!(error, RegistrationError::Rejected(_)));
        assert_eq!(form.focus(), Some(RegisterField::Phone));
        assert_eq!(
            form.errors().get(RegisterField::Phone).unwrap().message,
            PHONE_EXISTS
        );
        assert!(!session.session().is_authenticated);
    }

    #[tokio::test]
    async fn test_network_failure_is_not_a_field_error() {
        let (session, backend) = tools();
        backend.set_offline(true);
        let mut form = RegistrationForm::new(RegistrationDraft::Receiver(receiver()));

        let error = form.submit(&session).await.unwrap_err();
        assert!(matches!(error, RegistrationError::Session(_)));
        assert!(form.errors().is_empty());
    }
}
