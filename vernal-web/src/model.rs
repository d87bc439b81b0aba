//! Holder for both model and view returned by handlers.

use crate::view::ViewPtr;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Debug, Formatter};

/// Model attributes exposed to views.
pub type Model = Map<String, Value>;

/// View to render, either by name, to be resolved by
/// [ViewResolvers](crate::view::ViewResolver), or a direct instance.
#[derive(Clone)]
pub enum ViewReference {
    Name(String),
    Instance(ViewPtr),
}

impl Debug for ViewReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewReference::Name(name) => f.debug_tuple("Name").field(name).finish(),
            ViewReference::Instance(_) => f.write_str("Instance"),
        }
    }
}

/// Model and view returned by handlers and exception resolvers. An empty instance means the
/// request has already been handled and there is nothing left to render.
#[derive(Clone, Debug, Default)]
pub struct ModelAndView {
    view: Option<ViewReference>,
    model: Model,
    status: Option<StatusCode>,
    cleared: bool,
}

impl ModelAndView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_name<T: ToString>(view_name: T) -> Self {
        Self {
            view: Some(ViewReference::Name(view_name.to_string())),
            ..Default::default()
        }
    }

    pub fn with_view(view: ViewPtr) -> Self {
        Self {
            view: Some(ViewReference::Instance(view)),
            ..Default::default()
        }
    }

    pub fn add_object<N: ToString, T: Serialize>(
        mut self,
        name: N,
        value: T,
    ) -> Result<Self, serde_json::Error> {
        self.model.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn view(&self) -> Option<&ViewReference> {
        self.view.as_ref()
    }

    pub fn view_name(&self) -> Option<&str> {
        match &self.view {
            Some(ViewReference::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn set_view_name<T: ToString>(&mut self, view_name: T) {
        self.view = Some(ViewReference::Name(view_name.to_string()));
    }

    #[inline]
    pub fn has_view(&self) -> bool {
        self.view.is_some()
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[inline]
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Checks if there's neither a view nor a model.
    pub fn is_empty(&self) -> bool {
        self.view.is_none() && self.model.is_empty()
    }

    /// Clears the view and model. Interceptors can use it to suppress rendering.
    pub fn clear(&mut self) {
        self.view = None;
        self.model.clear();
        self.cleared = true;
    }

    /// Checks if [ModelAndView::clear] has been called and nothing has been added since.
    pub fn was_cleared(&self) -> bool {
        self.cleared && self.is_empty()
    }
}
