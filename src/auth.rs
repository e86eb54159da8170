//! Authentication is owned by whatever sits in front of the server.
//!
//! The server only reads who the user is, to greet them; it never gates
//! playback on it.

use rouille::Request;
use thiserror::Error;

use crate::config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
}

pub trait AuthProvider {
    fn current_user(&self, request: &Request) -> Result<User, AuthError>;

    /// Ends the user's session with the provider.
    fn logout(&self, request: &Request) -> Result<(), AuthError>;
}

/// Trusts a header set by an authenticating reverse proxy.
///
/// Without a configured header nobody is ever authenticated.
pub struct ProxyHeaderAuth {
    header: Option<String>,
}

impl ProxyHeaderAuth {
    pub fn new(config: &config::Auth) -> Self {
        Self {
            header: config.user_header.clone(),
        }
    }
}

impl AuthProvider for ProxyHeaderAuth {
    fn current_user(&self, request: &Request) -> Result<User, AuthError> {
        self.header
            .as_deref()
            .and_then(|header| request.header(header))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| User {
                username: name.to_string(),
            })
            .ok_or(AuthError::NotAuthenticated)
    }

    /// The proxy owns the session, so this is only an acknowledgement.
    fn logout(&self, _request: &Request) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: Vec<(String, String)>) -> Request {
        Request::fake_http("GET", "/api/profile", headers, vec![])
    }

    fn auth(header: Option<&str>) -> ProxyHeaderAuth {
        ProxyHeaderAuth::new(&config::Auth {
            user_header: header.map(str::to_string),
        })
    }

    #[test]
    fn reads_user_from_configured_header() {
        let request = request_with(vec![("X-Forwarded-User".into(), "sasha".into())]);
        assert_eq!(
            auth(Some("X-Forwarded-User")).current_user(&request),
            Ok(User {
                username: "sasha".into()
            })
        );
    }

    #[test]
    fn missing_or_blank_header_is_not_authenticated() {
        let auth = auth(Some("X-Forwarded-User"));
        assert_eq!(
            auth.current_user(&request_with(vec![])),
            Err(AuthError::NotAuthenticated)
        );
        assert_eq!(
            auth.current_user(&request_with(vec![("X-Forwarded-User".into(), "  ".into())])),
            Err(AuthError::NotAuthenticated)
        );
    }

    #[test]
    fn without_configured_header_nobody_is_authenticated() {
        let request = request_with(vec![("X-Forwarded-User".into(), "sasha".into())]);
        assert_eq!(
            auth(None).current_user(&request),
            Err(AuthError::NotAuthenticated)
        );
    }
}
