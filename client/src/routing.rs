//! # View routing
//!
//! Decides which view a session may see. Anonymous sessions only see public views, accounts
//! awaiting approval are held on the approval-pending view, approved accounts that have not
//! acknowledged the guide are held on the guide, and everyone else is limited to the views of
//! their role.

use crate::models::{Role, Session, SessionPhase};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Welcome,
    Auth,
    Register,
    /// Shown while an administrator has not approved the account.
    Regards,
    Guide,
    CarAcceptance,
    CarPhotos,
    KeyPhotos,
    DocsPhotos,
    Documents,
    UserDocs,
    Client,
    Clients,
    Admin,
    Comparisons,
}

const ROUTES: &[(Route, &str)] = &[
    (Route::Welcome, "/"),
    (Route::Auth, "/auth"),
    (Route::Register, "/register"),
    (Route::Regards, "/regards"),
    (Route::Guide, "/guide"),
    (Route::CarAcceptance, "/car-acceptance"),
    (Route::CarPhotos, "/car-photos"),
    (Route::KeyPhotos, "/key-photos"),
    (Route::DocsPhotos, "/docs-photos"),
    (Route::Documents, "/documents"),
    (Route::UserDocs, "/user-docs"),
    (Route::Client, "/client"),
    (Route::Clients, "/clients"),
    (Route::Admin, "/admin"),
    (Route::Comparisons, "/comparisons"),
];

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        ROUTES
            .iter()
            .find(|(route, _)| *route == self)
            .map_or("/", |(_, path)| *path)
    }

    /// Parses a path, ignoring a trailing slash.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Route> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        ROUTES
            .iter()
            .find(|(_, p)| *p == path)
            .map(|(route, _)| *route)
    }

    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Route::Welcome | Route::Auth | Route::Register)
    }

    /// Whether a fully onboarded account with `role` may open this view.
    #[must_use]
    pub fn allows(self, role: Role) -> bool {
        match self {
            Route::Welcome | Route::Auth | Route::Register | Route::Regards | Route::Guide => false,
            Route::Admin | Route::Clients | Route::Comparisons | Route::UserDocs => {
                role == Role::Admin
            }
            Route::Client => matches!(role, Role::Client | Role::Admin),
            Route::CarAcceptance | Route::CarPhotos | Route::KeyPhotos | Route::DocsPhotos => {
                matches!(role, Role::User | Role::Admin)
            }
            Route::Documents => true,
        }
    }
}

/// Home view of a role.
#[must_use]
pub fn home_route(role: Role) -> Route {
    match role {
        Role::Admin => Route::Admin,
        Role::Client => Route::Client,
        Role::User => Route::CarAcceptance,
    }
}

/// Where a session lands after signing in or restoring.
#[must_use]
pub fn landing_route(session: &Session) -> Route {
    match session.phase() {
        SessionPhase::Anonymous | SessionPhase::Authenticating => Route::Welcome,
        SessionPhase::PendingApproval(_) => Route::Regards,
        SessionPhase::Onboarding(_) => Route::Guide,
        SessionPhase::Active(role) => home_route(role),
    }
}

/// Resolves a requested view to the view the session actually gets.
#[must_use]
pub fn resolve(session: &Session, requested: Route) -> Route {
    match session.phase() {
        SessionPhase::Anonymous | SessionPhase::Authenticating => {
            if requested.is_public() {
                requested
            } else {
                Route::Welcome
            }
        }
        SessionPhase::PendingApproval(_) => Route::Regards,
        SessionPhase::Onboarding(_) => Route::Guide,
        SessionPhase::Active(role) => {
            if requested.allows(role) {
                requested
            } else {
                home_route(role)
            }
        }
    }
}
