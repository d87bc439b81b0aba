//! Advisors bind interceptors to operations selected by a [Pointcut].

use crate::error::AopError;
use crate::proxy::InterceptorPtr;
use std::str::FromStr;

const WILDCARD: char = '*';

/// Operation (or bean) name matcher: `*` matches anything, `prefix*` matches by prefix and
/// anything else must match exactly.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Pointcut {
    Any,
    Prefix(String),
    Exact(String),
}

impl Pointcut {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pointcut::Any => true,
            Pointcut::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Pointcut::Exact(exact) => name == exact,
        }
    }
}

impl FromStr for Pointcut {
    type Err = AopError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AopError::InvalidPointcut(pattern.to_string()));
        }

        if pattern == "*" {
            return Ok(Pointcut::Any);
        }

        match pattern.strip_suffix(WILDCARD) {
            Some(prefix) if !prefix.contains(WILDCARD) => Ok(Pointcut::Prefix(prefix.to_string())),
            None if !pattern.contains(WILDCARD) => Ok(Pointcut::Exact(pattern.to_string())),
            _ => Err(AopError::InvalidPointcut(pattern.to_string())),
        }
    }
}

/// Interceptor applied to operations matching its pointcut.
#[derive(Clone)]
pub struct Advisor {
    pub pointcut: Pointcut,
    pub interceptor: InterceptorPtr,
}

impl Advisor {
    pub fn new(pointcut: Pointcut, interceptor: InterceptorPtr) -> Self {
        Self {
            pointcut,
            interceptor,
        }
    }

    /// Creates an advisor from a textual pattern.
    pub fn with_pattern(pattern: &str, interceptor: InterceptorPtr) -> Result<Self, AopError> {
        Ok(Self::new(pattern.parse()?, interceptor))
    }

    /// Creates an advisor matching all operations.
    pub fn always(interceptor: InterceptorPtr) -> Self {
        Self::new(Pointcut::Any, interceptor)
    }

    #[inline]
    pub fn matches(&self, operation: &str) -> bool {
        self.pointcut.matches(operation)
    }
}
