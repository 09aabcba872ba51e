//! Sign-in and page access policy.
//!
//! Sign-in happens through Supabase OAuth in the frontend; the backend only
//! decides whether an address belongs to the university domain and which
//! frontend paths need a session or organiser rights.

use serde::Serialize;
use subtle::ConstantTimeEq;

/// Paths reachable without a session
const PUBLIC_PATHS: [&str; 5] = ["/", "/auth/callback", "/error", "/about", "/auth"];

/// Path prefixes that require the `is_organiser` flag
const ORGANISER_PREFIXES: [&str; 3] = ["/manage", "/create", "/edit"];

/// Restricts sign-in to a single email domain.
#[derive(Debug, Clone)]
pub struct EmailDomainPolicy {
    domain: String,
}

impl EmailDomainPolicy {
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        Self {
            domain: domain.trim().trim_start_matches('@').to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `true` when the address has a local part and ends with `@<domain>`.
    pub fn is_allowed(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        match email.rsplit_once('@') {
            Some((local, domain)) => !local.is_empty() && domain == self.domain,
            None => false,
        }
    }

    /// Decide whether a visitor may open a page of the given access level.
    ///
    /// `email` is `None` for visitors without a session; `is_organiser` is
    /// their `users.is_organiser` flag, `false` when they have no row.
    pub fn page_access(
        &self,
        access: PageAccess,
        email: Option<&str>,
        is_organiser: bool,
    ) -> AccessDecision {
        match (access, email) {
            (PageAccess::Static | PageAccess::Public, _) => AccessDecision::Allow,
            (_, None) => AccessDecision::SignIn,
            (_, Some(email)) if !self.is_allowed(email) => AccessDecision::Denied,
            (PageAccess::Authenticated, Some(_)) => AccessDecision::Allow,
            (PageAccess::OrganiserOnly, Some(_)) if is_organiser => AccessDecision::Allow,
            (PageAccess::OrganiserOnly, Some(_)) => AccessDecision::Denied,
        }
    }

    pub fn check(&self, email: &str) -> Result<(), AuthError> {
        if self.is_allowed(email) {
            Ok(())
        } else {
            Err(AuthError::forbidden(format!(
                "Only @{} accounts may sign in",
                self.domain
            )))
        }
    }
}

/// Access level of a frontend path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAccess {
    /// Next.js internals and static assets
    Static,
    Public,
    Authenticated,
    OrganiserOnly,
}

pub fn classify_path(path: &str) -> PageAccess {
    if path.starts_with("/_next/") || path.starts_with("/static/") || path.contains('.') {
        return PageAccess::Static;
    }
    if PUBLIC_PATHS.contains(&path) {
        return PageAccess::Public;
    }
    if ORGANISER_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return PageAccess::OrganiserOnly;
    }
    PageAccess::Authenticated
}

/// Outcome of a page access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    /// No session; the visitor has to sign in first
    SignIn,
    Denied,
}

impl AccessDecision {
    /// Frontend path to send the visitor to instead
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::SignIn => Some("/auth"),
            AccessDecision::Denied => Some("/error"),
        }
    }
}

/// Authentication error with HTTP status code
#[derive(Debug, Clone)]
pub struct AuthError {
    /// HTTP status code (400, 401, 403)
    pub status_code: u16,
    /// Error message for client
    pub message: String,
}

impl AuthError {
    /// Create a 400 Bad Request error (malformed Authorization header)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            message: message.into(),
        }
    }

    /// Create a 401 Unauthorized error (missing/invalid key)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status_code: 401,
            message: message.into(),
        }
    }

    /// Create a 403 Forbidden error (address outside the allowed domain)
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status_code: 403,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)
    }
}

impl std::error::Error for AuthError {}

/// Extract the token of a `Bearer` Authorization header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::bad_request("Authorization header must use Bearer scheme"))
}

/// Compare a presented secret with the configured one in constant time.
///
/// Only the lengths are compared early.
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_policy() {
        let policy = EmailDomainPolicy::new("christuniversity.in");

        assert!(policy.is_allowed("student@christuniversity.in"));
        assert!(policy.is_allowed("Student@ChristUniversity.IN"));
        assert!(!policy.is_allowed("student@gmail.com"));
        assert!(!policy.is_allowed("student@evilchristuniversity.in"));
        assert!(!policy.is_allowed("@christuniversity.in"));
        assert!(!policy.is_allowed("christuniversity.in"));
    }

    #[test]
    fn test_domain_policy_check_error() {
        let policy = EmailDomainPolicy::new("@christuniversity.in");
        assert_eq!(policy.domain(), "christuniversity.in");

        let err = policy.check("someone@example.com").unwrap_err();
        assert_eq!(err.status_code, 403);
        assert!(err.message.contains("christuniversity.in"));
    }

    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path("/_next/static/chunk.js"), PageAccess::Static);
        assert_eq!(classify_path("/favicon.ico"), PageAccess::Static);
        assert_eq!(classify_path("/"), PageAccess::Public);
        assert_eq!(classify_path("/auth/callback"), PageAccess::Public);
        assert_eq!(classify_path("/discover"), PageAccess::Authenticated);
        assert_eq!(classify_path("/event/abc"), PageAccess::Authenticated);
        assert_eq!(classify_path("/manage"), PageAccess::OrganiserOnly);
        assert_eq!(classify_path("/create/event"), PageAccess::OrganiserOnly);
        assert_eq!(classify_path("/edit/fest/xyz"), PageAccess::OrganiserOnly);
    }

    #[test]
    fn test_page_access_decisions() {
        let policy = EmailDomainPolicy::new("christuniversity.in");
        let student = Some("student@christuniversity.in");

        assert_eq!(
            policy.page_access(PageAccess::Public, None, false),
            AccessDecision::Allow
        );
        assert_eq!(
            policy.page_access(PageAccess::Authenticated, None, false),
            AccessDecision::SignIn
        );
        assert_eq!(
            policy.page_access(PageAccess::OrganiserOnly, None, true),
            AccessDecision::SignIn
        );
        assert_eq!(
            policy.page_access(PageAccess::Authenticated, student, false),
            AccessDecision::Allow
        );
        assert_eq!(
            policy.page_access(PageAccess::OrganiserOnly, student, false),
            AccessDecision::Denied
        );
        assert_eq!(
            policy.page_access(PageAccess::OrganiserOnly, student, true),
            AccessDecision::Allow
        );
        assert_eq!(
            policy.page_access(PageAccess::Authenticated, Some("someone@gmail.com"), false),
            AccessDecision::Denied
        );

        assert_eq!(AccessDecision::SignIn.redirect(), Some("/auth"));
        assert_eq!(AccessDecision::Denied.redirect(), Some("/error"));
        assert_eq!(AccessDecision::Allow.redirect(), None);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(None).unwrap_err().status_code, 401);
        assert_eq!(bearer_token(Some("Basic abc")).unwrap_err().status_code, 400);
        assert_eq!(bearer_token(Some("Bearer ")).unwrap_err().status_code, 400);
    }

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches("sk-admin", "sk-admin"));
        assert!(!secret_matches("sk-admiN", "sk-admin"));
        assert!(!secret_matches("sk-admin-longer", "sk-admin"));
        assert!(!secret_matches("", "sk-admin"));
    }

    #[test]
    fn test_auth_error_display() {
        let error = AuthError::unauthorized("Invalid admin key");
        assert_eq!(error.to_string(), "401: Invalid admin key");
    }
}
