//! Session context: where the server lives and how to authenticate to it.
//!
//! Created once at startup and passed to the transport and the app; there is
//! no process-wide session state.

use serde::Deserialize;

/// Credential attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// JWT issued by the SSO proxy.
    Bearer(String),
    /// Username and password for HTTP basic auth.
    Basic { user: String, password: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
            Credential::Basic { user, .. } => write!(f, "Basic({user}:***)"),
        }
    }
}

/// Authentication requirements advertised by `GET /api/v1/auth/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// SSO proxy URL; when set, the server expects a bearer token.
    #[serde(default)]
    pub sso_proxy_url: Option<String>,
    /// Basic-auth user name; when set, the server expects basic credentials.
    #[serde(default)]
    pub auth_user: Option<String>,
}

impl AuthConfig {
    pub fn requires_auth(&self) -> bool {
        self.sso_proxy_url.is_some() || self.auth_user.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    base_url: String,
    credential: Option<Credential>,
    auth: AuthConfig,
}

impl SessionContext {
    pub fn new(base_url: impl Into<String>, credential: Option<Credential>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            credential,
            auth: AuthConfig::default(),
        }
    }

    /// Attaches the server's auth requirements, once fetched.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// True when the server requires authentication and we have nothing to send.
    pub fn needs_reauth(&self) -> bool {
        self.auth.requires_auth() && self.credential.is_none()
    }

    /// Absolute URL for an API path such as `/api/v1/snapshot`.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Display name of the authenticated user, if known.
    pub fn username(&self) -> Option<&str> {
        match &self.credential {
            Some(Credential::Basic { user, .. }) => Some(user),
            _ => self.auth.auth_user.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let ctx = SessionContext::new("http://db1:8080/", None);
        assert_eq!(ctx.base_url(), "http://db1:8080");
        assert_eq!(ctx.endpoint("/api/v1/schema"), "http://db1:8080/api/v1/schema");
        assert_eq!(ctx.endpoint("api/v1/stream"), "http://db1:8080/api/v1/stream");
    }

    #[test]
    fn reauth_needed_only_without_credential() {
        let open = SessionContext::new("http://x", None);
        assert!(!open.needs_reauth());

        let sso = AuthConfig {
            sso_proxy_url: Some("https://sso.example".into()),
            auth_user: None,
        };
        let anonymous = SessionContext::new("http://x", None).with_auth(sso.clone());
        assert!(anonymous.needs_reauth());

        let token = SessionContext::new("http://x", Some(Credential::Bearer("jwt".into())))
            .with_auth(sso);
        assert!(!token.needs_reauth());
    }

    #[test]
    fn debug_hides_secrets() {
        let basic = Credential::Basic {
            user: "admin".into(),
            password: "hunter2".into(),
        };
        let out = format!("{:?}", basic);
        assert!(out.contains("admin"));
        assert!(!out.contains("hunter2"));
        assert!(!format!("{:?}", Credential::Bearer("secret".into())).contains("secret"));
    }

    #[test]
    fn username_prefers_basic_credential() {
        let ctx = SessionContext::new(
            "http://x",
            Some(Credential::Basic {
                user: "alice".into(),
                password: "p".into(),
            }),
        );
        assert_eq!(ctx.username(), Some("alice"));
        let ctx = SessionContext::new("http://x", None).with_auth(AuthConfig {
            sso_proxy_url: None,
            auth_user: Some("bob".into()),
        });
        assert_eq!(ctx.username(), Some("bob"));
    }
}
