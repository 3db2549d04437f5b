use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{MethodFilter, MethodRouter, on},
};

use crate::{AppState, auth, error::ConfigError, handlers};

/// Extra room granted on top of the image limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Link
///
/// One unit of a handler chain. A guard inspects the request and either
/// answers it or delegates onward; a controller produces the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Resolves the caller identity (401 on failure).
    Authenticate,
    /// Lets only admins through (403 for other roles).
    RequireAdmin,
    /// Stores an uploaded image.
    UploadImage,
}

impl Link {
    pub fn name(self) -> &'static str {
        match self {
            Link::Authenticate => "authenticate",
            Link::RequireAdmin => "require_admin",
            Link::UploadImage => "upload_img",
        }
    }

    pub fn is_controller(self) -> bool {
        matches!(self, Link::UploadImage)
    }

    /// Wraps `route` with this guard. Controllers leave it untouched.
    fn wrap(self, route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
        match self {
            Link::Authenticate => route.route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            )),
            Link::RequireAdmin => route.route_layer(middleware::from_fn(auth::require_admin)),
            Link::UploadImage => route,
        }
    }

    /// The method handler of a controller link.
    ///
    /// # Panics
    /// Panics for a guard. `register` only stores controllers in that position.
    fn endpoint(self, filter: MethodFilter, state: &AppState) -> MethodRouter<AppState> {
        match self {
            Link::UploadImage => on(filter, handlers::upload_img).layer(DefaultBodyLimit::max(
                state.config.max_image_bytes.saturating_add(MULTIPART_OVERHEAD),
            )),
            Link::Authenticate | Link::RequireAdmin => {
                unreachable!("guard `{}` registered as a controller", self.name())
            }
        }
    }
}

/// RouteDescriptor
///
/// Read-only view of a registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: Method,
    pub prefix: String,
    pub path: String,
    pub effective_path: String,
    pub chain: Vec<&'static str>,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    method: Method,
    filter: MethodFilter,
    path: String,
    guards: Vec<Link>,
    controller: Link,
}

impl RouteEntry {
    fn chain_names(&self) -> Vec<&'static str> {
        self.guards
            .iter()
            .chain(std::iter::once(&self.controller))
            .map(|link| link.name())
            .collect()
    }
}

/// ScopedRouter
///
/// A prefixed route table. Routes are registered once at startup; the table
/// is then turned into an axum `Router` and never mutated again.
#[derive(Debug, Clone)]
pub struct ScopedRouter {
    prefix: String,
    entries: Vec<RouteEntry>,
}

impl ScopedRouter {
    /// Creates an empty table. `prefix` is either empty or `/seg[/seg...]`.
    pub fn new(prefix: &str) -> Result<Self, ConfigError> {
        validate_prefix(prefix)?;
        Ok(Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            entries: Vec::new(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// register
    ///
    /// Appends `method path` with its handler chain. The chain must be made of
    /// zero or more guards followed by exactly one controller.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        chain: &[Link],
    ) -> Result<(), ConfigError> {
        validate_path(path)?;
        let (controller, guards) = validate_chain(path, chain)?;

        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| ConfigError::UnsupportedMethod(method.clone()))?;

        // Capture names do not matter to the matcher: `/{id}` and `/{name}` collide.
        let shape = route_shape(path);
        if self
            .entries
            .iter()
            .any(|e| e.method == method && route_shape(&e.path) == shape)
        {
            return Err(ConfigError::DuplicateRoute {
                method,
                path: join_paths(&self.prefix, path),
            });
        }

        self.entries.push(RouteEntry {
            method,
            filter,
            path: path.to_string(),
            guards: guards.to_vec(),
            controller,
        });
        Ok(())
    }

    pub fn post(&mut self, path: &str, chain: &[Link]) -> Result<(), ConfigError> {
        self.register(Method::POST, path, chain)
    }

    /// nest_under
    ///
    /// Moves the whole table below `parent`. Methods and chains are kept.
    pub fn nest_under(mut self, parent: &str) -> Result<Self, ConfigError> {
        validate_prefix(parent)?;
        self.prefix = join_paths(parent, &self.prefix);
        if self.prefix == "/" {
            self.prefix.clear();
        }
        Ok(self)
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> Vec<RouteDescriptor> {
        self.entries
            .iter()
            .map(|entry| RouteDescriptor {
                method: entry.method.clone(),
                prefix: self.prefix.clone(),
                path: entry.path.clone(),
                effective_path: join_paths(&self.prefix, &entry.path),
                chain: entry.chain_names(),
            })
            .collect()
    }

    /// into_router
    ///
    /// Materializes the table. The last layer added runs first, so guards are
    /// applied back to front to make execution order equal chain order.
    pub fn into_router(self, state: &AppState) -> Router<AppState> {
        let mut router = Router::new();

        for entry in self.entries {
            let effective = join_paths(&self.prefix, &entry.path);
            let names = entry.chain_names();

            let mut route = entry.controller.endpoint(entry.filter, state);
            for guard in entry.guards.iter().rev() {
                route = guard.wrap(route, state);
            }

            tracing::info!(
                method = %entry.method,
                path = %effective,
                chain = ?names,
                "registered route"
            );
            router = router.route(&effective, route);
        }

        router
    }
}

/// Splits a chain into its controller and the guards in front of it.
fn validate_chain<'a>(path: &str, chain: &'a [Link]) -> Result<(Link, &'a [Link]), ConfigError> {
    let Some((last, guards)) = chain.split_last() else {
        return Err(ConfigError::EmptyChain {
            path: path.to_string(),
        });
    };

    if let Some(early) = guards.iter().find(|link| link.is_controller()) {
        return Err(ConfigError::ControllerNotLast {
            path: path.to_string(),
            link: early.name(),
        });
    }

    if !last.is_controller() {
        return Err(ConfigError::MissingController {
            path: path.to_string(),
        });
    }

    Ok((*last, guards))
}

fn check_shape(raw: &str) -> Result<(), &'static str> {
    if !raw.starts_with('/') {
        return Err("must start with `/`");
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("must not contain whitespace");
    }
    if raw == "/" {
        return Ok(());
    }
    if raw.ends_with('/') {
        return Err("must not end with `/`");
    }
    if raw.contains("//") {
        return Err("must not contain empty segments");
    }
    if raw.split('/').any(|segment| segment == "." || segment == "..") {
        return Err("must not contain `.` or `..` segments");
    }
    if raw
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err("use `{name}` captures instead of `:name` or `*name`");
    }
    Ok(())
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// validate_path
///
/// Checks a route path against the pattern rules axum accepts:
/// captures are whole segments (`{id}`), a catch-all (`{*rest}`) is last.
pub fn validate_path(path: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("must not be empty"));
    }
    check_shape(path).map_err(invalid)?;

    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (index, segment) in segments.iter().enumerate() {
        let has_brace = segment.contains('{') || segment.contains('}');
        if !has_brace {
            continue;
        }

        let inner = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| invalid("a capture must span the whole segment"))?;

        match inner.strip_prefix('*') {
            Some(name) => {
                if !is_param_name(name) {
                    return Err(invalid("invalid capture name"));
                }
                if index + 1 != segments.len() {
                    return Err(invalid("a catch-all capture must be the last segment"));
                }
            }
            None if !is_param_name(inner) => return Err(invalid("invalid capture name")),
            None => {}
        }
    }

    Ok(())
}

/// validate_prefix
///
/// A prefix is empty or a literal path without captures.
pub fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Ok(());
    }

    let invalid = |reason| ConfigError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason,
    };

    check_shape(prefix).map_err(invalid)?;
    if prefix != "/" && (prefix.contains('{') || prefix.contains('}')) {
        return Err(invalid("must not contain captures"));
    }
    Ok(())
}

/// route_shape
///
/// A validated path with capture names erased: `{id}` becomes `{}` and
/// `{*rest}` becomes `{*}`.
fn route_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix('{') {
            Some(inner) if inner.starts_with('*') => "{*}",
            Some(_) => "{}",
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// join_paths
///
/// Concatenates a prefix and a path. A `/` path maps onto the prefix itself.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path == "/" || path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD_CHAIN: [Link; 3] = [Link::Authenticate, Link::RequireAdmin, Link::UploadImage];

    #[test]
    fn registers_post_under_prefix() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        router.post("/img", &UPLOAD_CHAIN).unwrap();

        let routes = router.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, Method::POST);
        assert_eq!(routes[0].effective_path, "/upload/img");
        assert_eq!(
            routes[0].chain,
            vec!["authenticate", "require_admin", "upload_img"]
        );
    }

    #[test]
    fn empty_chain_is_rejected() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        let err = router.post("/img", &[]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyChain {
                path: "/img".to_string()
            }
        );
        assert!(router.routes().is_empty());
    }

    #[test]
    fn chain_must_end_with_a_controller() {
        let mut router = ScopedRouter::new("/upload").unwrap();

        let err = router
            .post("/img", &[Link::Authenticate, Link::RequireAdmin])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingController { .. }));

        let err = router
            .post("/img", &[Link::UploadImage, Link::Authenticate, Link::UploadImage])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ControllerNotLast { link: "upload_img", .. }
        ));
    }

    #[test]
    fn controller_alone_is_a_valid_chain() {
        let mut router = ScopedRouter::new("").unwrap();
        router.post("/img", &[Link::UploadImage]).unwrap();
        assert_eq!(router.routes()[0].effective_path, "/img");
    }

    #[test]
    fn malformed_paths_fail_fast() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        for bad in [
            "", "img", "/img/", "//img", "/a b", "/:id", "/*rest", "/img{id}", "/{}",
            "/{*rest}/tail", "/../img",
        ] {
            let err = router.post(bad, &UPLOAD_CHAIN).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidPath { .. }),
                "`{}` should be rejected, got {:?}",
                bad,
                err
            );
        }
        assert!(router.routes().is_empty());
    }

    #[test]
    fn captures_are_accepted() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        router.post("/img/{id}", &UPLOAD_CHAIN).unwrap();
        router.post("/files/{*path}", &UPLOAD_CHAIN).unwrap();
        router.post("/", &UPLOAD_CHAIN).unwrap();

        let paths: Vec<String> = router
            .routes()
            .into_iter()
            .map(|r| r.effective_path)
            .collect();
        assert_eq!(paths, vec!["/upload/img/{id}", "/upload/files/{*path}", "/upload"]);
    }

    #[test]
    fn invalid_prefixes_are_rejected() {
        for bad in ["upload", "/upload/", "/{tenant}", "/up load", "/:v1", "/*x", "/api/:tenant"] {
            assert!(
                matches!(ScopedRouter::new(bad), Err(ConfigError::InvalidPrefix { .. })),
                "`{}` should be rejected",
                bad
            );
        }
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        router.post("/img", &UPLOAD_CHAIN).unwrap();

        let err = router.post("/img", &[Link::UploadImage]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRoute {
                method: Method::POST,
                path: "/upload/img".to_string()
            }
        );

        // Renamed captures still collide.
        router.post("/img/{id}", &UPLOAD_CHAIN).unwrap();
        let err = router.post("/img/{name}", &UPLOAD_CHAIN).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRoute {
                method: Method::POST,
                path: "/upload/img/{name}".to_string()
            }
        );
        router.post("/files/{*path}", &UPLOAD_CHAIN).unwrap();
        assert!(router.post("/files/{*rest}", &UPLOAD_CHAIN).is_err());

        // Same path, other method is fine.
        router
            .register(Method::PUT, "/img", &[Link::UploadImage])
            .unwrap();
        assert_eq!(router.routes().len(), 4);
    }

    #[test]
    fn nesting_under_a_legacy_param_prefix_fails() {
        let router = ScopedRouter::new("/upload").unwrap();
        assert!(matches!(
            router.clone().nest_under("/:v1"),
            Err(ConfigError::InvalidPrefix { .. })
        ));
        assert!(matches!(
            router.nest_under("/*all"),
            Err(ConfigError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn route_shape_erases_capture_names() {
        assert_eq!(route_shape("/img/{id}"), route_shape("/img/{name}"));
        assert_eq!(route_shape("/files/{*path}"), "/files/{*}");
        assert_ne!(route_shape("/img/{id}"), route_shape("/img/latest"));
    }

    #[test]
    fn nesting_changes_only_the_effective_path() {
        let mut router = ScopedRouter::new("/upload").unwrap();
        router.post("/img", &UPLOAD_CHAIN).unwrap();
        let before = router.routes().remove(0);

        let nested = router.nest_under("/api/v1").unwrap();
        let after = nested.routes().remove(0);

        assert_eq!(after.effective_path, "/api/v1/upload/img");
        assert_eq!(after.prefix, "/api/v1/upload");
        assert_eq!(after.method, before.method);
        assert_eq!(after.path, before.path);
        assert_eq!(after.chain, before.chain);
    }

    #[test]
    fn nesting_under_root_is_a_no_op() {
        let router = ScopedRouter::new("/upload").unwrap();
        assert_eq!(router.clone().nest_under("").unwrap().prefix(), "/upload");
        assert_eq!(router.nest_under("/").unwrap().prefix(), "/upload");
        assert_eq!(ScopedRouter::new("").unwrap().nest_under("/").unwrap().prefix(), "");
    }

    #[test]
    fn join_paths_handles_root() {
        assert_eq!(join_paths("", "/"), "/");
        assert_eq!(join_paths("", "/img"), "/img");
        assert_eq!(join_paths("/upload", "/"), "/upload");
        assert_eq!(join_paths("/upload", "/img"), "/upload/img");
    }
}
