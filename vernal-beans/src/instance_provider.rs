use crate::definition::Bean;
use crate::error::BeanInstanceProviderError;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any};
use std::sync::Arc;

pub type BeanInstancePtr<T> = Arc<T>;

pub type BeanInstanceAnyPtr = BeanInstancePtr<dyn Any + Send + Sync + 'static>;

/// Generic provider for bean instances.
#[cfg_attr(test, automock)]
pub trait BeanInstanceProvider {
    /// Returns the bean registered under given name or alias, creating it if its scope does not
    /// hold an instance yet.
    fn bean(&mut self, name: &str) -> Result<Bean, BeanInstanceProviderError>;
}

/// Helper trait for [BeanInstanceProvider] providing strongly-typed access to object beans.
pub trait TypedBeanInstanceProvider {
    /// Returns an object bean downcast to `T`.
    fn instance_typed<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError>;

    /// Tries to get an instance like [TypedBeanInstanceProvider::instance_typed] does, but returns
    /// `None` on missing definition.
    fn instance_option<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanInstanceProviderError>;
}

impl<P: BeanInstanceProvider + ?Sized> TypedBeanInstanceProvider for P {
    fn instance_typed<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError> {
        let incompatible = || BeanInstanceProviderError::IncompatibleBean {
            name: name.to_string(),
            expected: type_name::<T>().to_string(),
        };

        self.bean(name)?
            .into_object()
            .ok_or_else(incompatible)?
            .downcast::<T>()
            .map_err(|_| incompatible())
    }

    fn instance_option<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanInstanceProviderError> {
        match self.instance_typed(name) {
            Ok(instance) => Ok(Some(instance)),
            Err(BeanInstanceProviderError::NoDefinition(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}
