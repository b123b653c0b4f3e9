use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;

use crate::state::AppState;

type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A handler bound to one `(method, prefix)` pair: given the request state
/// and the path suffix past the prefix, produces a response.
pub type Handler = Arc<dyn Fn(AppState, String) -> BoxFuture + Send + Sync>;

struct Route {
    method: Method,
    prefix: String,
    handler: Handler,
}

/// Matches the request's method and path against the *longest* registered
/// `(method, prefix)` pair, independent of the order routes were added.
///
/// This stands in deliberately for a general-purpose router: the contract
/// this type exists to pin is "longest registered prefix wins", not "the
/// prefixes happen to be mutually exclusive" (they may nest).
#[derive(Default)]
pub struct PrefixDispatcher {
    routes: Vec<Route>,
}

impl PrefixDispatcher {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn register(&mut self, method: Method, prefix: impl Into<String>, handler: Handler) {
        self.routes.push(Route { method, prefix: prefix.into(), handler });
        self.routes
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix)));
    }

    /// Returns the matched handler and the path suffix past its prefix.
    pub fn dispatch<'a>(&self, method: &Method, path: &'a str) -> Option<(&Handler, &'a str)> {
        self.routes
            .iter()
            .find(|r| &r.method == method && path.starts_with(r.prefix.as_str()))
            .map(|r| (&r.handler, &path[r.prefix.len()..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> Handler {
        Arc::new(|_state, _rest| Box::pin(async { Response::default() }))
    }

    #[test]
    fn longest_prefix_wins_regardless_of_registration_order() {
        let mut d = PrefixDispatcher::new();
        d.register(Method::GET, "/a", noop_handler());
        d.register(Method::GET, "/a/b/c", noop_handler());
        d.register(Method::GET, "/a/b", noop_handler());

        let (_, rest) = d.dispatch(&Method::GET, "/a/b/c/d").unwrap();
        assert_eq!(rest, "/d");
    }

    #[test]
    fn unknown_method_does_not_match() {
        let mut d = PrefixDispatcher::new();
        d.register(Method::GET, "/a", noop_handler());
        assert!(d.dispatch(&Method::POST, "/a").is_none());
    }

    #[test]
    fn no_matching_prefix_returns_none() {
        let mut d = PrefixDispatcher::new();
        d.register(Method::GET, "/a", noop_handler());
        assert!(d.dispatch(&Method::GET, "/z").is_none());
    }
}
