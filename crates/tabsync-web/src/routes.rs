#![forbid(unsafe_code)]

//! Static client-side route table.
//!
//! Routes are matched in declaration order. Matching ignores the query
//! string, the fragment, ASCII case, and a trailing slash, and only applies
//! below the configured base path.

/// Page a route renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    CyberDice,
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub view: View,
}

impl Route {
    pub fn new(path: impl Into<String>, name: impl Into<String>, view: View) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            view,
        }
    }
}

/// Errors from building a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Path does not start with `/`.
    InvalidPath(String),
    /// Two routes share a name.
    DuplicateName(String),
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "route path must start with '/': {path}"),
            Self::DuplicateName(name) => write!(f, "duplicate route name: {name}"),
        }
    }
}

impl std::error::Error for RouteError {}

/// Ordered, validated list of routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    base: String,
    routes: Vec<Route>,
}

impl RouteTable {
    /// Validate and build a table.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Result<Self, RouteError> {
        let mut table = Self::default();
        for route in routes {
            if !route.path.starts_with('/') {
                return Err(RouteError::InvalidPath(route.path));
            }
            if table.by_name(&route.name).is_some() {
                return Err(RouteError::DuplicateName(route.name));
            }
            table.routes.push(route);
        }
        Ok(table)
    }

    /// Serve the table below `base` (e.g. `/app/`).
    #[must_use]
    pub fn with_base(mut self, base: &str) -> Self {
        let trimmed = base.trim_matches('/');
        self.base = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    #[must_use]
    pub fn base(&self) -> &str {
        if self.base.is_empty() { "/" } else { &self.base }
    }

    /// First route matching `location`.
    #[must_use]
    pub fn resolve(&self, location: &str) -> Option<&Route> {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = self.strip_base(path)?;
        let path = normalize(path);
        self.routes
            .iter()
            .find(|route| normalize(&route.path).eq_ignore_ascii_case(path))
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// Full href of the named route, including the base.
    #[must_use]
    pub fn href_for(&self, name: &str) -> Option<String> {
        let route = self.by_name(name)?;
        Some(format!("{}{}", self.base, route.path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn strip_base<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base.is_empty() {
            return Some(path);
        }
        let prefix = path.get(..self.base.len())?;
        if !prefix.eq_ignore_ascii_case(&self.base) {
            return None;
        }
        let rest = &path[self.base.len()..];
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

/// The application's routes.
#[must_use]
pub fn app_routes() -> RouteTable {
    RouteTable {
        base: String::new(),
        routes: vec![
            Route::new("/", "home", View::Home),
            Route::new("/cyber-dice", "cyber-dice", View::CyberDice),
        ],
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn app_routes_resolve() {
        let table = app_routes();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("/").map(|r| r.view), Some(View::Home));
        assert_eq!(table.resolve("").map(|r| r.view), Some(View::Home));
        assert_eq!(
            table.resolve("/cyber-dice").map(|r| r.name.as_str()),
            Some("cyber-dice")
        );
        assert_eq!(table.resolve("/cyber-mail"), None);
    }

    #[test]
    fn resolve_ignores_query_fragment_case_and_trailing_slash() {
        let table = app_routes();
        for location in [
            "/cyber-dice/",
            "/Cyber-Dice",
            "/cyber-dice?sides=20",
            "/cyber-dice#history",
        ] {
            assert_eq!(
                table.resolve(location).map(|r| r.view),
                Some(View::CyberDice),
                "{location}"
            );
        }
    }

    #[test]
    fn base_path_is_required_and_prefixed() {
        let table = app_routes().with_base("/app/");
        assert_eq!(table.base(), "/app");
        assert_eq!(table.resolve("/app").map(|r| r.view), Some(View::Home));
        assert_eq!(
            table.resolve("/app/cyber-dice").map(|r| r.view),
            Some(View::CyberDice)
        );
        assert_eq!(table.resolve("/cyber-dice"), None);
        assert_eq!(table.resolve("/application"), None);
        assert_eq!(table.href_for("cyber-dice").as_deref(), Some("/app/cyber-dice"));
        assert_eq!(table.href_for("home").as_deref(), Some("/app/"));
        assert_eq!(table.href_for("missing"), None);
    }

    #[test]
    fn root_base_is_empty() {
        let table = app_routes().with_base("/");
        assert_eq!(table.base(), "/");
        assert_eq!(table.href_for("home").as_deref(), Some("/"));
    }

    #[test]
    fn first_declared_route_wins() {
        let table = RouteTable::new([
            Route::new("/dice", "dice", View::CyberDice),
            Route::new("/dice/", "dice-again", View::Home),
        ])
        .unwrap();
        assert_eq!(table.resolve("/dice").map(|r| r.name.as_str()), Some("dice"));
    }

    #[test]
    fn invalid_tables_are_rejected() {
        assert_eq!(
            RouteTable::new([Route::new("dice", "dice", View::CyberDice)]),
            Err(RouteError::InvalidPath("dice".to_string()))
        );
        assert_eq!(
            RouteTable::new([
                Route::new("/", "home", View::Home),
                Route::new("/home", "home", View::Home),
            ]),
            Err(RouteError::DuplicateName("home".to_string()))
        );
    }

    #[test]
    fn iteration_keeps_declaration_order() {
        let names: Vec<_> = app_routes().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["home".to_string(), "cyber-dice".to_string()]);
    }
}
