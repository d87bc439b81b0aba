//! Selection of the proxy strategy for a given [ProxyConfig].

use crate::error::AopError;
use derive_more::Display;

/// Marker interface implemented by every proxy. It is never considered a user-supplied
/// interface.
pub const PROXY_MARKER_INTERFACE: &str = "vernal_aop::Proxy";

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Display)]
pub enum ProxyStrategy {
    /// Proxy exposing only the declared interfaces of the target.
    Interface,
    /// Proxy standing in for the target type itself, exposing all its operations.
    Subclass,
}

/// Description of the proxied type.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TargetType {
    pub name: String,
    /// The type is only an interface, so there is nothing concrete to stand in for.
    pub is_interface: bool,
    /// The type is already a proxy.
    pub is_proxy: bool,
}

impl TargetType {
    pub fn concrete<T: ToString>(name: T) -> Self {
        Self {
            name: name.to_string(),
            is_interface: false,
            is_proxy: false,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct ProxyConfig {
    /// Interfaces to expose.
    pub interfaces: Vec<String>,
    /// Proxy the target type, even if it declares interfaces.
    pub proxy_target_type: bool,
    /// Apply aggressive optimizations; implies a subclass proxy.
    pub optimize: bool,
    pub target_type: Option<TargetType>,
}

impl ProxyConfig {
    fn has_no_user_supplied_interfaces(&self) -> bool {
        match self.interfaces.as_slice() {
            [] => true,
            [single] => single == PROXY_MARKER_INTERFACE,
            _ => false,
        }
    }
}

/// Chooses a proxy strategy:
///
/// * without flags and with at least one user interface - [ProxyStrategy::Interface]
/// * otherwise [ProxyStrategy::Subclass], unless the target type is an interface or already a
///   proxy, which can only be proxied by interfaces
pub fn select_strategy(config: &ProxyConfig) -> Result<ProxyStrategy, AopError> {
    if config.optimize || config.proxy_target_type || config.has_no_user_supplied_interfaces() {
        let target_type = config.target_type.as_ref().ok_or(AopError::NoTarget)?;
        if target_type.is_interface || target_type.is_proxy {
            return Ok(ProxyStrategy::Interface);
        }

        return Ok(ProxyStrategy::Subclass);
    }

    Ok(ProxyStrategy::Interface)
}
