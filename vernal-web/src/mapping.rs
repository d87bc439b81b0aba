//! Mapping requests to handlers. [PathPatternHandlerMapping] maps explicitly registered path
//! patterns, while [BeanNameHandlerMapping] maps beans whose names start with `/`.

use crate::error::WebError;
use crate::handler::Handler;
use crate::interceptor::{HandlerExecutionChain, HandlerInterceptorPtr};
use crate::request::WebRequest;
use axum::http::Method;
use fxhash::FxHashMap;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::trace;
use vernal_beans::definition::Capability;
use vernal_beans::error::ErrorPtr;
use vernal_beans::factory::BeanFactory;
use vernal_beans::instance_provider::BeanInstanceProvider;

/// Maps requests to handlers with their interceptors.
#[cfg_attr(test, automock)]
pub trait HandlerMapping {
    /// Returns a handler for given request or `None` if this mapping has no match. Mappings can
    /// store extracted information, e.g. path variables, in the request.
    fn handler(
        &self,
        request: &mut WebRequest,
    ) -> Result<Option<HandlerExecutionChain>, ErrorPtr>;

    /// Mappings with lower order are consulted first.
    fn order(&self) -> i32 {
        crate::strategy::LOWEST_PRECEDENCE
    }
}

pub type HandlerMappingPtr = Arc<dyn HandlerMapping + Send + Sync>;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
    // *
    Wildcard,
    // ** - only as the last segment
    CatchAll,
}

/// Path pattern made of `/`-separated segments. A segment can be a literal, a `{name}` variable,
/// `*` matching any single segment, or `**` matching all remaining segments (only allowed at the
/// end).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, WebError> {
        let segments: Vec<_> = split_path(pattern)
            .map(|segment| match segment {
                "*" => Segment::Wildcard,
                "**" => Segment::CatchAll,
                segment if segment.starts_with('{') && segment.ends_with('}') => {
                    Segment::Variable(segment[1..segment.len() - 1].to_string())
                }
                segment => Segment::Literal(segment.to_string()),
            })
            .collect();

        if segments
            .iter()
            .rev()
            .skip(1)
            .any(|segment| *segment == Segment::CatchAll)
        {
            return Err(WebError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "'**' is only allowed as the last segment".to_string(),
            });
        }

        if let Some(name) = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) => Some(name),
                _ => None,
            })
            .duplicates()
            .next()
        {
            return Err(WebError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("duplicate variable '{name}'"),
            });
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Matches given path, returning extracted variables on success.
    pub fn matches(&self, path: &str) -> Option<FxHashMap<String, String>> {
        let mut variables = FxHashMap::default();
        let mut path_segments = split_path(path);

        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return Some(variables),
                segment => {
                    let path_segment = path_segments.next()?;
                    match segment {
                        Segment::Literal(literal) if literal != path_segment => return None,
                        Segment::Variable(name) => {
                            variables.insert(name.clone(), path_segment.to_string());
                        }
                        _ => {}
                    }
                }
            }
        }

        path_segments.next().is_none().then_some(variables)
    }

    /// Sort key - more specific patterns come first: without `**`, with fewer variables and
    /// wildcards, with more segments.
    fn specificity(&self) -> (bool, usize, Reverse<usize>) {
        let catch_all = self.segments.last() == Some(&Segment::CatchAll);
        let open_segments = self
            .segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Variable(_) | Segment::Wildcard))
            .count();

        (catch_all, open_segments, Reverse(self.segments.len()))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Clone)]
struct Route {
    pattern: PathPattern,
    method: Option<Method>,
    handler: Handler,
}

#[derive(Clone)]
struct MappedInterceptor {
    patterns: Vec<PathPattern>,
    interceptor: HandlerInterceptorPtr,
}

impl MappedInterceptor {
    fn matches(&self, path: &str) -> bool {
        self.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|pattern| pattern.matches(path).is_some())
    }
}

/// Maps path patterns, optionally restricted to a method, to handlers. When multiple patterns
/// match, the most specific one wins. A path matching only routes for other methods results in
/// [WebError::MethodNotSupported].
#[derive(Clone)]
pub struct PathPatternHandlerMapping {
    routes: Vec<Route>,
    interceptors: Vec<MappedInterceptor>,
    order: i32,
}

impl Default for PathPatternHandlerMapping {
    fn default() -> Self {
        Self {
            routes: vec![],
            interceptors: vec![],
            order: 0,
        }
    }
}

impl PathPatternHandlerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for any method.
    pub fn with_route(self, pattern: &str, handler: Handler) -> Result<Self, WebError> {
        self.add_route(pattern, None, handler)
    }

    /// Adds a route for given method only.
    pub fn with_method_route(
        self,
        method: Method,
        pattern: &str,
        handler: Handler,
    ) -> Result<Self, WebError> {
        self.add_route(pattern, Some(method), handler)
    }

    /// Adds an interceptor applied to all handlers.
    pub fn with_interceptor(mut self, interceptor: HandlerInterceptorPtr) -> Self {
        self.interceptors.push(MappedInterceptor {
            patterns: vec![],
            interceptor,
        });
        self
    }

    /// Adds an interceptor applied to handlers of requests matching any of given patterns.
    pub fn with_mapped_interceptor(
        mut self,
        patterns: &[&str],
        interceptor: HandlerInterceptorPtr,
    ) -> Result<Self, WebError> {
        let patterns = patterns
            .iter()
            .map(|pattern| PathPattern::parse(pattern))
            .try_collect()?;

        self.interceptors.push(MappedInterceptor {
            patterns,
            interceptor,
        });
        Ok(self)
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn add_route(
        mut self,
        pattern: &str,
        method: Option<Method>,
        handler: Handler,
    ) -> Result<Self, WebError> {
        let pattern = PathPattern::parse(pattern)?;
        if self
            .routes
            .iter()
            .any(|route| route.pattern.segments == pattern.segments && route.method == method)
        {
            return Err(WebError::AmbiguousMapping {
                pattern: pattern.pattern,
                handler: handler.name().to_string(),
            });
        }

        self.routes.push(Route {
            pattern,
            method,
            handler,
        });
        Ok(self)
    }
}

impl HandlerMapping for PathPatternHandlerMapping {
    fn handler(
        &self,
        request: &mut WebRequest,
    ) -> Result<Option<HandlerExecutionChain>, ErrorPtr> {
        let path = request.path();
        let matching: Vec<_> = self
            .routes
            .iter()
            .filter_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|variables| (route, variables))
            })
            .collect();

        if matching.is_empty() {
            return Ok(None);
        }

        let best = matching
            .iter()
            .filter(|(route, _)| {
                route
                    .method
                    .as_ref()
                    .map(|method| method == request.method())
                    .unwrap_or(true)
            })
            .min_by_key(|(route, _)| route.pattern.specificity());

        let Some((route, variables)) = best else {
            return Err(Arc::new(WebError::MethodNotSupported {
                method: request.method().clone(),
            }) as ErrorPtr);
        };

        trace!(
            pattern = route.pattern.as_str(),
            handler = route.handler.name(),
            "Mapped request to handler."
        );

        let interceptors = self
            .interceptors
            .iter()
            .filter(|interceptor| interceptor.matches(path))
            .map(|interceptor| interceptor.interceptor.clone())
            .collect();

        let chain = HandlerExecutionChain::with_interceptors(route.handler.clone(), interceptors);
        request.set_path_variables(variables.clone());

        Ok(Some(chain))
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// Maps beans whose names or patterns start with `/` as handlers, e.g. a bean named
/// `/users/{id}` handles `/users/7`. Handler beans are created when the mapping is created.
#[derive(Clone)]
pub struct BeanNameHandlerMapping {
    mapping: PathPatternHandlerMapping,
}

impl BeanNameHandlerMapping {
    pub fn from_factory(factory: &mut BeanFactory) -> Result<Self, ErrorPtr> {
        let names = factory
            .registry()
            .definition_names()
            .into_iter()
            .filter(|name| name.starts_with('/'))
            .filter(|name| {
                factory
                    .registry()
                    .definition(name)
                    .map(|definition| definition.capability == Capability::Object)
                    .unwrap_or(false)
            })
            .collect_vec();

        let mut mapping = PathPatternHandlerMapping::new().with_order(2);
        for name in names {
            let target = factory
                .bean(&name)
                .map_err(|error| Arc::new(error) as ErrorPtr)?
                .into_object();

            if let Some(target) = target {
                trace!(bean = name.as_str(), "Mapping handler bean by name.");
                mapping = mapping
                    .with_route(&name, Handler::new(&name, target))
                    .map_err(|error| Arc::new(error) as ErrorPtr)?;
            }
        }

        Ok(Self { mapping })
    }

    pub fn with_interceptor(mut self, interceptor: HandlerInterceptorPtr) -> Self {
        self.mapping = self.mapping.with_interceptor(interceptor);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.mapping = self.mapping.with_order(order);
        self
    }
}

impl HandlerMapping for BeanNameHandlerMapping {
    fn handler(
        &self,
        request: &mut WebRequest,
    ) -> Result<Option<HandlerExecutionChain>, ErrorPtr> {
        self.mapping.handler(request)
    }

    fn order(&self) -> i32 {
        self.mapping.order()
    }
}
