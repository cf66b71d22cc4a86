use crate::content::{ContentVariant, EVENTS_SUFFIX};
use crate::error::{RouteError, WebError};
use http::Method;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A successful lookup: the content to dispatch and the captures to hand it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub content: ContentVariant,
    /// Positional capture values, in group order.
    pub captures: Vec<String>,
}

/// Nested lookup below a route's match point.
///
/// `remainder` is what is left of the normalized path after the route's prefix or pattern
/// matched: `""` for an exact match, otherwise usually `/`-led. `captures` are the route's own
/// captures. Returning `None` declines the request and lets the table keep scanning.
pub trait Resolver: Send + Sync {
    fn resolve(&self, remainder: &str, captures: &[String], method: &Method) -> Option<Resolved>;
}

/// Outcome of testing a single route.
#[derive(Debug)]
pub enum Resolution {
    /// The route's pattern does not cover the path.
    NoMatch,
    Matched(Resolved),
    /// The pattern matched but the nested resolver turned the path down.
    Declined,
}

#[derive(Clone)]
pub enum RoutePattern {
    Prefix(String),
    Pattern(Regex),
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Prefix(p) => f.write_str(p),
            RoutePattern::Pattern(re) => write!(f, "re:{}", re.as_str()),
        }
    }
}

/// A pattern paired with the content it serves.
#[derive(Clone)]
pub struct Route {
    pattern: RoutePattern,
    content: ContentVariant,
}

impl Route {
    /// Literal-prefix route.
    ///
    /// # Errors
    ///
    /// [`RouteError::ArityMismatch`] if `content` is an endpoint expecting captures; a literal
    /// prefix supplies none.
    pub fn prefix(
        prefix: impl Into<String>,
        content: impl Into<ContentVariant>,
    ) -> Result<Self, RouteError> {
        let prefix = prefix.into();
        let content = content.into();
        check_arity(&prefix, &content, 0)?;
        Ok(Self {
            pattern: RoutePattern::Prefix(prefix),
            content,
        })
    }

    /// Regular-expression route.
    ///
    /// The expression is anchored for you: leaf content must match the whole path, nested content
    /// a leading part of it.
    ///
    /// # Errors
    ///
    /// - [`RouteError::InvalidPattern`] if the expression does not compile
    /// - [`RouteError::ArityMismatch`] if an endpoint's arity differs from the group count
    pub fn pattern(pattern: &str, content: impl Into<ContentVariant>) -> Result<Self, RouteError> {
        let content = content.into();
        let anchored = if content.is_nested() {
            format!("^(?:{pattern})")
        } else {
            format!("^(?:{pattern})$")
        };
        let regex = Regex::new(&anchored).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        check_arity(pattern, &content, regex.captures_len() - 1)?;
        Ok(Self {
            pattern: RoutePattern::Pattern(regex),
            content,
        })
    }

    #[must_use]
    pub fn route_pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    #[must_use]
    pub fn content(&self) -> &ContentVariant {
        &self.content
    }

    /// Test this route against a normalized path.
    #[must_use]
    pub fn matches(&self, path: &str, method: &Method) -> Resolution {
        match &self.pattern {
            RoutePattern::Prefix(prefix) => {
                if path == prefix {
                    return self.finish("", Vec::new(), method);
                }
                if !self.content.is_nested() || !path.starts_with(prefix.as_str()) {
                    return Resolution::NoMatch;
                }
                // A trailing slash on the prefix stays with a directory or mount remainder. An
                // object only ever sees its own sub-resource name.
                let keeps_slash = !matches!(self.content, ContentVariant::Object(_));
                let cut = if keeps_slash && prefix.ends_with('/') {
                    prefix.len() - 1
                } else {
                    prefix.len()
                };
                self.finish(&path[cut..], Vec::new(), method)
            }
            RoutePattern::Pattern(regex) => {
                let Some(caps) = regex.captures(path) else {
                    return Resolution::NoMatch;
                };
                let end = caps.get(0).map_or(0, |m| m.end());
                let captures = caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect();
                self.finish(&path[end..], captures, method)
            }
        }
    }

    fn finish(&self, remainder: &str, captures: Vec<String>, method: &Method) -> Resolution {
        let nested = match &self.content {
            ContentVariant::Directory(dir) => dir.resolve(remainder, &captures, method),
            ContentVariant::Mount(resolver) => resolver.resolve(remainder, &captures, method),
            ContentVariant::Object(object) => {
                let content = match remainder {
                    "" => ContentVariant::Object(Arc::clone(object)),
                    EVENTS_SUFFIX => ContentVariant::Events(Arc::clone(object)),
                    _ => return Resolution::Declined,
                };
                Some(Resolved { content, captures })
            }
            leaf => {
                return Resolution::Matched(Resolved {
                    content: leaf.clone(),
                    captures,
                })
            }
        };
        match nested {
            Some(resolved) => Resolution::Matched(resolved),
            None => Resolution::Declined,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {:?}", self.pattern, self.content)
    }
}

fn check_arity(route: &str, content: &ContentVariant, groups: usize) -> Result<(), RouteError> {
    if let ContentVariant::Endpoint(endpoint) = content {
        if endpoint.arity() != groups {
            return Err(RouteError::ArityMismatch {
                route: route.to_string(),
                groups,
                arity: endpoint.arity(),
            });
        }
    }
    Ok(())
}

/// Ordered, immutable list of routes.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Arc<[Route]>,
}

impl RouteTable {
    /// Build a table; order is significant, the first matching route wins.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        let routes_summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|r| format!("{} -> {}", r.pattern, r.content.kind()))
            .collect();
        info!(
            routes_count = routes.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );
        Self {
            routes: routes.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Print every route to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.routes.len());
        for route in self.routes.iter() {
            println!("[route] {route:?}");
        }
    }

    /// Find the content for a normalized path.
    ///
    /// # Errors
    ///
    /// [`WebError::RouteNotFound`] when no route matches or every match declines.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<Resolved, WebError> {
        debug!(method = %method, path = %path, "Route match attempt");
        for (index, route) in self.routes.iter().enumerate() {
            match route.matches(path, method) {
                Resolution::Matched(resolved) => {
                    debug!(
                        path = %path,
                        route_index = index,
                        route_pattern = %route.pattern,
                        content = resolved.content.kind(),
                        captures = ?resolved.captures,
                        "Route matched"
                    );
                    return Ok(resolved);
                }
                Resolution::Declined => {
                    debug!(
                        path = %path,
                        route_index = index,
                        route_pattern = %route.pattern,
                        "Nested resolver declined"
                    );
                }
                Resolution::NoMatch => {}
            }
        }
        warn!(method = %method, path = %path, "No route matched");
        Err(WebError::RouteNotFound {
            path: path.to_string(),
        })
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}
