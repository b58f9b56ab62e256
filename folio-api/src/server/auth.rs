use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Basic};
use std::{fmt::Debug, sync::Arc};

type AuthorizationHeader = TypedHeader<Authorization<Basic>>;

/// The one account allowed to change content.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AdminCredentials {
    username: String,
    /// Without a password nobody is admin.
    password: Option<String>,
}

impl AdminCredentials {
    #[must_use]
    pub fn new(username: String, password: Option<String>) -> Self {
        Self { username, password }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    fn accepts(&self, basic: &Basic) -> bool {
        self.password
            .as_deref()
            .is_some_and(|password| basic.username() == self.username && basic.password() == password)
    }
}

impl Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// What the caller of a request may see and do.
///
/// Requests without an `Authorization` header are public. A header that is present has to carry
/// valid admin credentials, anything else is rejected.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Access {
    is_admin: bool,
}

impl Access {
    pub const PUBLIC: Self = Self { is_admin: false };
    pub const ADMIN: Self = Self { is_admin: true };

    #[must_use]
    pub fn is_admin(self) -> bool {
        self.is_admin
    }
}

impl<S> FromRequestParts<S> for Access
where
    Arc<AdminCredentials>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(basic)) =
            match AuthorizationHeader::from_request_parts(parts, state).await {
                Ok(header) => header,
                Err(rejection) if rejection.is_missing() => return Ok(Self::PUBLIC),
                Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
            };

        if Arc::<AdminCredentials>::from_ref(state).accepts(&basic) {
            Ok(Self::ADMIN)
        } else {
            Err(ServerError::InvalidCredentials)
        }
    }
}

/// Extracts only for admin callers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Admin;

impl<S> FromRequestParts<S> for Admin
where
    Arc<AdminCredentials>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if Access::from_request_parts(parts, state).await?.is_admin() {
            Ok(Self)
        } else {
            Err(ServerError::AdminRequired)
        }
    }
}
