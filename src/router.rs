//! Path-to-view routing with authentication guards.
//!
//! Every navigation is checked synchronously against the current session:
//!
//! - `requires_auth` and signed out → redirect to the login route
//! - `requires_guest` and signed in → redirect to the home route
//! - otherwise the route is entered and the document title updated
//!
//! Redirect targets go through the same checks. A chain longer than
//! [`MAX_REDIRECTS`] hops, or one that revisits a path, is an error.
use std::fmt;
use thiserror::Error;

use crate::stores::SessionStore;
use crate::types::Session;

/// Title used when a route does not configure one.
pub const DEFAULT_TITLE: &str = "News Digest";

/// Maximum number of guard redirects followed for one navigation.
pub const MAX_REDIRECTS: usize = 3;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("No route matches path '{0}'")]
    NotFound(String),

    #[error("Redirect loop detected at '{0}'")]
    RedirectLoop(String),

    #[error("Too many redirects (max {MAX_REDIRECTS})")]
    TooManyRedirects,
}

// ============================================================================
// Routes
// ============================================================================

/// Anything that can answer "is someone signed in right now".
pub trait AuthStatus {
    fn is_authenticated(&self) -> bool;
}

impl AuthStatus for Session {
    fn is_authenticated(&self) -> bool {
        self.is_signed_in()
    }
}

impl AuthStatus for SessionStore {
    fn is_authenticated(&self) -> bool {
        SessionStore::is_authenticated(self)
    }
}

impl AuthStatus for bool {
    fn is_authenticated(&self) -> bool {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    Login,
    Settings,
    About,
}

impl RouteName {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteName::Home => "home",
            RouteName::Login => "login",
            RouteName::Settings => "settings",
            RouteName::About => "about",
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub path: &'static str,
    pub requires_auth: bool,
    pub requires_guest: bool,
    /// The view renders without the navigation bar.
    pub hide_navigation: bool,
    pub title: Option<&'static str>,
}

impl Route {
    const fn new(name: RouteName, path: &'static str) -> Self {
        Self {
            name,
            path,
            requires_auth: false,
            requires_guest: false,
            hide_navigation: false,
            title: None,
        }
    }
}

/// The application's route table.
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new(RouteName::Home, "/"),
        Route {
            requires_guest: true,
            hide_navigation: true,
            title: Some("Sign In - News Digest"),
            ..Route::new(RouteName::Login, "/login")
        },
        Route {
            requires_auth: true,
            title: Some("Settings - News Digest"),
            ..Route::new(RouteName::Settings, "/settings")
        },
        Route {
            title: Some("About - News Digest"),
            ..Route::new(RouteName::About, "/about")
        },
    ]
}

// ============================================================================
// Navigation
// ============================================================================

/// Guard decision for a single route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(RouteName),
}

/// Outcome of a completed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Route actually entered.
    pub route: RouteName,
    pub path: &'static str,
    pub title: String,
    /// Path originally requested when a guard redirected elsewhere.
    pub redirected_from: Option<String>,
}

impl Navigation {
    pub fn was_redirected(&self) -> bool {
        self.redirected_from.is_some()
    }
}

pub struct Router {
    routes: Vec<Route>,
    current: Option<RouteName>,
    default_title: String,
    document_title: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(default_routes())
    }
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self::with_default_title(routes, DEFAULT_TITLE)
    }

    pub fn with_default_title(routes: Vec<Route>, default_title: impl Into<String>) -> Self {
        let default_title = default_title.into();
        Self {
            routes,
            current: None,
            document_title: default_title.clone(),
            default_title,
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn current(&self) -> Option<&Route> {
        self.current.and_then(|name| self.route(name))
    }

    pub fn document_title(&self) -> &str {
        &self.document_title
    }

    pub fn route(&self, name: RouteName) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Trailing slashes are ignored, except for the root path.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let normalized = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        self.routes.iter().find(|r| r.path == normalized)
    }

    /// Evaluate the guard for one route without navigating.
    pub fn guard(route: &Route, auth: &impl AuthStatus) -> GuardDecision {
        if route.requires_auth && !auth.is_authenticated() {
            GuardDecision::Redirect(RouteName::Login)
        } else if route.requires_guest && auth.is_authenticated() {
            GuardDecision::Redirect(RouteName::Home)
        } else {
            GuardDecision::Proceed
        }
    }

    /// Attempt to enter `path`, following guard redirects.
    ///
    /// On success the router's current route and document title are updated.
    /// On error neither changes.
    pub fn navigate(
        &mut self,
        path: &str,
        auth: &impl AuthStatus,
    ) -> Result<Navigation, RouterError> {
        let mut route = self
            .resolve(path)
            .ok_or_else(|| RouterError::NotFound(path.to_string()))?;
        let mut visited = vec![route.path];

        loop {
            match Self::guard(route, auth) {
                GuardDecision::Proceed => break,
                GuardDecision::Redirect(target) => {
                    if visited.len() > MAX_REDIRECTS {
                        return Err(RouterError::TooManyRedirects);
                    }
                    let next = self
                        .route(target)
                        .ok_or_else(|| RouterError::NotFound(target.to_string()))?;
                    if visited.contains(&next.path) {
                        tracing::warn!(from = %route.path, to = %next.path, "Redirect loop detected");
                        return Err(RouterError::RedirectLoop(next.path.to_string()));
                    }
                    tracing::debug!(
                        from = %route.path,
                        to = %next.path,
                        hop = visited.len(),
                        "Guard redirect"
                    );
                    visited.push(next.path);
                    route = next;
                }
            }
        }

        let navigation = Navigation {
            route: route.name,
            path: route.path,
            title: route
                .title
                .map_or_else(|| self.default_title.clone(), str::to_string),
            redirected_from: (visited.len() > 1).then(|| path.to_string()),
        };

        self.current = Some(navigation.route);
        self.document_title.clone_from(&navigation.title);
        Ok(navigation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_guest_may_open_public_routes() {
        let mut router = Router::default();

        let nav = router.navigate("/", &false).unwrap();
        assert_eq!(nav.route, RouteName::Home);
        assert_eq!(router.document_title(), DEFAULT_TITLE);

        let nav = router.navigate("/about", &false).unwrap();
        assert_eq!(nav.title, "About - News Digest");
        assert!(!nav.was_redirected());
    }

    #[test]
    fn test_protected_route_redirects_to_login() {
        let mut router = Router::default();

        let nav = router.navigate("/settings", &false).unwrap();
        assert_eq!(
            nav,
            Navigation {
                route: RouteName::Login,
                path: "/login",
                title: "Sign In - News Digest".to_string(),
                redirected_from: Some("/settings".to_string()),
            }
        );
        assert_eq!(router.current().unwrap().name, RouteName::Login);
        assert!(router.current().unwrap().hide_navigation);
    }

    #[test]
    fn test_signed_in_user_bounced_from_login() {
        let mut router = Router::default();

        let nav = router.navigate("/login", &true).unwrap();
        assert_eq!(nav.route, RouteName::Home);
        assert_eq!(router.document_title(), DEFAULT_TITLE);

        let nav = router.navigate("/settings", &true).unwrap();
        assert_eq!(nav.route, RouteName::Settings);
        assert_eq!(router.document_title(), "Settings - News Digest");
    }

    #[test]
    fn test_configured_default_title() {
        let mut router = Router::with_default_title(default_routes(), "Morning Brief");
        assert_eq!(router.document_title(), "Morning Brief");

        router.navigate("/about", &false).unwrap();
        assert_eq!(router.document_title(), "About - News Digest");

        let nav = router.navigate("/", &false).unwrap();
        assert_eq!(nav.title, "Morning Brief");
        assert_eq!(router.document_title(), "Morning Brief");
    }

    #[test]
    fn test_unknown_path_leaves_state_untouched() {
        let mut router = Router::default();
        router.navigate("/about", &false).unwrap();

        let err = router.navigate("/nope", &false).unwrap_err();
        assert_eq!(err, RouterError::NotFound("/nope".to_string()));
        assert_eq!(router.current().unwrap().name, RouteName::About);
        assert_eq!(router.document_title(), "About - News Digest");
    }

    #[test]
    fn test_trailing_slash_resolves() {
        let router = Router::default();
        assert_eq!(router.resolve("/settings/").unwrap().name, RouteName::Settings);
        assert_eq!(router.resolve("").unwrap().name, RouteName::Home);
    }

    #[test]
    fn test_misconfigured_table_reports_loop() {
        // A login page that itself requires auth can never be entered.
        let routes = vec![
            Route::new(RouteName::Home, "/"),
            Route {
                requires_auth: true,
                ..Route::new(RouteName::Login, "/login")
            },
            Route {
                requires_auth: true,
                ..Route::new(RouteName::Settings, "/settings")
            },
        ];
        let mut router = Router::new(routes);

        let err = router.navigate("/settings", &false).unwrap_err();
        assert_eq!(err, RouterError::RedirectLoop("/login".to_string()));
        assert!(router.current().is_none());
    }

    #[test]
    fn test_session_implements_auth_status() {
        assert_eq!(
            Router::guard(
                Router::default().route(RouteName::Settings).unwrap(),
                &Session::default()
            ),
            GuardDecision::Redirect(RouteName::Login)
        );
    }
}
