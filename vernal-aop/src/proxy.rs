//! Delegating proxies. A [Target] exposes its operations through an explicit dispatch method,
//! which lets a proxy stand in for it and run [interceptors](MethodInterceptor) around every call.

use crate::advisor::Advisor;
use crate::error::AopError;
use crate::policy::{select_strategy, ProxyConfig, ProxyStrategy, TargetType, PROXY_MARKER_INTERFACE};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use vernal_beans::error::ErrorPtr;

pub type TargetPtr = Arc<dyn Target + Send + Sync>;

pub type InterceptorPtr = Arc<dyn MethodInterceptor + Send + Sync>;

/// Named set of operations exposed by a target.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Interface {
    pub name: String,
    pub operations: Vec<String>,
}

impl Interface {
    pub fn new<N, I, O>(name: N, operations: I) -> Self
    where
        N: ToString,
        I: IntoIterator<Item = O>,
        O: ToString,
    {
        Self {
            name: name.to_string(),
            operations: operations
                .into_iter()
                .map(|operation| operation.to_string())
                .collect(),
        }
    }

    #[inline]
    pub fn declares(&self, operation: &str) -> bool {
        self.operations.iter().any(|declared| declared == operation)
    }
}

/// Object which can be proxied. Operations are invoked by name with JSON arguments.
#[cfg_attr(test, automock)]
pub trait Target {
    fn target_type(&self) -> TargetType;

    /// Interfaces declared by the target.
    fn interfaces(&self) -> Vec<Interface> {
        vec![]
    }

    /// All operations supported by the target.
    fn operations(&self) -> Vec<String>;

    fn invoke(&self, operation: &str, arguments: &Value) -> Result<Value, ErrorPtr>;
}

/// Interceptor wrapped around target invocations. Calling [MethodInvocation::proceed] continues
/// down the chain, eventually reaching the target; not calling it short-circuits the invocation.
pub trait MethodInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> Result<Value, ErrorPtr>;
}

/// A single call going through an interceptor chain.
pub struct MethodInvocation<'a> {
    operation: &'a str,
    arguments: Value,
    target: &'a (dyn Target + Send + Sync),
    interceptors: &'a [InterceptorPtr],
    current: usize,
}

impl<'a> MethodInvocation<'a> {
    pub fn new(
        operation: &'a str,
        arguments: Value,
        target: &'a (dyn Target + Send + Sync),
        interceptors: &'a [InterceptorPtr],
    ) -> Self {
        Self {
            operation,
            arguments,
            target,
            interceptors,
            current: 0,
        }
    }

    #[inline]
    pub fn operation(&self) -> &str {
        self.operation
    }

    #[inline]
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Interceptors may replace arguments before proceeding.
    #[inline]
    pub fn arguments_mut(&mut self) -> &mut Value {
        &mut self.arguments
    }

    #[inline]
    pub fn target(&self) -> &(dyn Target + Send + Sync) {
        self.target
    }

    /// Invokes the next interceptor or, at the end of the chain, the target itself.
    pub fn proceed(&mut self) -> Result<Value, ErrorPtr> {
        let interceptors = self.interceptors;
        match interceptors.get(self.current) {
            Some(interceptor) => {
                self.current += 1;
                interceptor.invoke(self)
            }
            None => self.target.invoke(self.operation, &self.arguments),
        }
    }
}

struct AdvisedTarget {
    target: TargetPtr,
    advisors: Vec<Advisor>,
}

impl AdvisedTarget {
    fn invoke(&self, operation: &str, arguments: &Value) -> Result<Value, ErrorPtr> {
        let chain: Vec<InterceptorPtr> = self
            .advisors
            .iter()
            .filter(|advisor| advisor.matches(operation))
            .map(|advisor| advisor.interceptor.clone())
            .collect();

        if chain.is_empty() {
            return self.target.invoke(operation, arguments);
        }

        MethodInvocation::new(operation, arguments.clone(), self.target.as_ref(), &chain).proceed()
    }

    fn proxy_type(&self) -> TargetType {
        TargetType {
            name: self.target.target_type().name,
            is_interface: false,
            is_proxy: true,
        }
    }

    fn unsupported(&self, operation: &str) -> ErrorPtr {
        Arc::new(AopError::UnsupportedOperation {
            operation: operation.to_string(),
            target: self.target.target_type().name,
        })
    }
}

fn marker_interface() -> Interface {
    Interface::new(PROXY_MARKER_INTERFACE, Vec::<String>::new())
}

/// Proxy exposing only operations declared by its interfaces.
pub struct InterfaceProxy {
    advised: AdvisedTarget,
    interfaces: Vec<Interface>,
}

impl InterfaceProxy {
    #[inline]
    pub fn target(&self) -> &TargetPtr {
        &self.advised.target
    }
}

impl Target for InterfaceProxy {
    fn target_type(&self) -> TargetType {
        self.advised.proxy_type()
    }

    fn interfaces(&self) -> Vec<Interface> {
        let mut interfaces = self.interfaces.clone();
        interfaces.push(marker_interface());
        interfaces
    }

    fn operations(&self) -> Vec<String> {
        let mut operations: Vec<String> = vec![];
        for operation in self
            .interfaces
            .iter()
            .flat_map(|interface| interface.operations.iter())
        {
            if !operations.contains(operation) {
                operations.push(operation.clone());
            }
        }

        operations
    }

    fn invoke(&self, operation: &str, arguments: &Value) -> Result<Value, ErrorPtr> {
        if !self
            .interfaces
            .iter()
            .any(|interface| interface.declares(operation))
        {
            return Err(self.advised.unsupported(operation));
        }

        self.advised.invoke(operation, arguments)
    }
}

/// Proxy standing in for the target type, exposing every target operation.
pub struct SubclassProxy {
    advised: AdvisedTarget,
}

impl SubclassProxy {
    #[inline]
    pub fn target(&self) -> &TargetPtr {
        &self.advised.target
    }
}

impl Target for SubclassProxy {
    fn target_type(&self) -> TargetType {
        self.advised.proxy_type()
    }

    fn interfaces(&self) -> Vec<Interface> {
        let mut interfaces = self.advised.target.interfaces();
        interfaces.push(marker_interface());
        interfaces
    }

    fn operations(&self) -> Vec<String> {
        self.advised.target.operations()
    }

    fn invoke(&self, operation: &str, arguments: &Value) -> Result<Value, ErrorPtr> {
        if !self
            .advised
            .target
            .operations()
            .iter()
            .any(|declared| declared == operation)
        {
            return Err(self.advised.unsupported(operation));
        }

        self.advised.invoke(operation, arguments)
    }
}

/// Creates proxies for a single target, choosing the strategy with [select_strategy].
pub struct ProxyFactory {
    target: TargetPtr,
    interfaces: Option<Vec<String>>,
    proxy_target_type: bool,
    optimize: bool,
    advisors: Vec<Advisor>,
}

impl ProxyFactory {
    pub fn new(target: TargetPtr) -> Self {
        Self {
            target,
            interfaces: None,
            proxy_target_type: false,
            optimize: false,
            advisors: vec![],
        }
    }

    /// Restricts exposed interfaces. By default, all target interfaces are exposed.
    pub fn with_interface<T: ToString>(mut self, interface: T) -> Self {
        self.interfaces
            .get_or_insert_with(Vec::new)
            .push(interface.to_string());
        self
    }

    pub fn with_proxy_target_type(mut self, proxy_target_type: bool) -> Self {
        self.proxy_target_type = proxy_target_type;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// Adds an interceptor applied to all operations.
    pub fn with_interceptor(self, interceptor: InterceptorPtr) -> Self {
        self.with_advisor(Advisor::always(interceptor))
    }

    pub fn config(&self) -> ProxyConfig {
        let interfaces = match &self.interfaces {
            Some(interfaces) => interfaces.clone(),
            None => self
                .target
                .interfaces()
                .into_iter()
                .map(|interface| interface.name)
                .collect(),
        };

        ProxyConfig {
            interfaces,
            proxy_target_type: self.proxy_target_type,
            optimize: self.optimize,
            target_type: Some(self.target.target_type()),
        }
    }

    pub fn strategy(&self) -> Result<ProxyStrategy, AopError> {
        select_strategy(&self.config())
    }

    pub fn proxy(&self) -> Result<TargetPtr, AopError> {
        let config = self.config();
        let strategy = select_strategy(&config)?;

        debug!(
            target = self.target.target_type().name.as_str(),
            %strategy,
            "Creating proxy."
        );

        let advised = AdvisedTarget {
            target: self.target.clone(),
            advisors: self.advisors.clone(),
        };

        Ok(match strategy {
            ProxyStrategy::Interface => {
                let mut interfaces: Vec<Interface> = self
                    .target
                    .interfaces()
                    .into_iter()
                    .filter(|interface| {
                        interface.name != PROXY_MARKER_INTERFACE
                            && config.interfaces.contains(&interface.name)
                    })
                    .collect();

                // an interface-only target exposes itself
                if interfaces.is_empty() {
                    if let Some(target_type) = config.target_type.filter(|t| t.is_interface) {
                        interfaces.push(Interface::new(target_type.name, self.target.operations()));
                    }
                }

                Arc::new(InterfaceProxy {
                    advised,
                    interfaces,
                }) as TargetPtr
            }
            ProxyStrategy::Subclass => Arc::new(SubclassProxy { advised }) as TargetPtr,
        })
    }
}
