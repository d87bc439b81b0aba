//! Delegating proxies for beans.
//!
//! Any [Target](proxy::Target) can be wrapped by a [ProxyFactory](proxy::ProxyFactory), which
//! decides between an interface proxy and a subclass proxy using
//! [select_strategy](policy::select_strategy) and runs [advisors](advisor::Advisor) around each
//! invocation. Registering an [AutoProxyProcessor](auto_proxy::AutoProxyProcessor) proxies
//! matching beans automatically when they are created.

pub mod advisor;
pub mod auto_proxy;
pub mod error;
pub mod policy;
pub mod proxy;
