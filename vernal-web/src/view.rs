//! Views render a [Model] into the response. [ViewResolvers](ViewResolver) map logical view
//! names to views, and a [ViewNameTranslator] provides the name when a handler did not.

use crate::model::Model;
use crate::request::{WebRequest, WebResponse};
#[cfg(test)]
use mockall::automock;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use vernal_beans::error::ErrorPtr;

/// Prefix of view names resolved to a [RedirectView].
pub const REDIRECT_URL_PREFIX: &str = "redirect:";

#[cfg_attr(test, automock)]
pub trait View {
    fn render(
        &self,
        model: &Model,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr>;
}

pub type ViewPtr = Arc<dyn View + Send + Sync>;

#[cfg_attr(test, automock)]
pub trait ViewResolver {
    /// Returns the view for given name, or `None` to let other resolvers try.
    fn resolve_view_name(&self, view_name: &str) -> Result<Option<ViewPtr>, ErrorPtr>;

    /// Resolvers with lower order are consulted first.
    fn order(&self) -> i32 {
        crate::strategy::LOWEST_PRECEDENCE
    }
}

pub type ViewResolverPtr = Arc<dyn ViewResolver + Send + Sync>;

/// Provides a view name for requests whose handlers returned a model without one.
#[cfg_attr(test, automock)]
pub trait ViewNameTranslator {
    fn view_name(&self, request: &WebRequest) -> Result<Option<String>, ErrorPtr>;
}

pub type ViewNameTranslatorPtr = Arc<dyn ViewNameTranslator + Send + Sync>;

/// Serializes the whole model as a JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonView;

impl View for JsonView {
    fn render(
        &self,
        model: &Model,
        _request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        let body = serde_json::to_vec(model).map_err(|error| Arc::new(error) as ErrorPtr)?;
        response.set_content_type("application/json");
        response.write(body);
        Ok(())
    }
}

/// Redirects to an url. `{name}` segments are replaced with path variables of the current request.
#[derive(Clone, Debug)]
pub struct RedirectView {
    url: String,
}

impl RedirectView {
    pub fn new<T: ToString>(url: T) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    fn expand_url(&self, request: &WebRequest) -> String {
        request
            .path_variables()
            .iter()
            .fold(self.url.clone(), |url, (name, value)| {
                url.replace(&format!("{{{name}}}"), value)
            })
    }
}

impl View for RedirectView {
    fn render(
        &self,
        _model: &Model,
        request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        response
            .send_redirect(&self.expand_url(request))
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }
}

/// Text template with `{{name}}` placeholders replaced by model attributes. String attributes are
/// inserted as-is, other values as JSON. Missing attributes render as empty text.
#[derive(Clone, Debug)]
pub struct TemplateView {
    template: String,
    content_type: &'static str,
}

impl TemplateView {
    pub fn new<T: ToString>(template: T) -> Self {
        Self {
            template: template.to_string(),
            content_type: "text/html; charset=utf-8",
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    fn render_template(&self, model: &Model) -> String {
        let mut result = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(length) = rest[start + 2..].find("}}") else {
                break;
            };

            result.push_str(&rest[..start]);

            let name = rest[start + 2..start + 2 + length].trim();
            match model.get(name) {
                Some(Value::String(value)) => result.push_str(value),
                Some(Value::Null) | None => {}
                Some(value) => result.push_str(&value.to_string()),
            }

            rest = &rest[start + length + 4..];
        }

        result.push_str(rest);
        result
    }
}

impl View for TemplateView {
    fn render(
        &self,
        model: &Model,
        _request: &WebRequest,
        response: &mut WebResponse,
    ) -> Result<(), ErrorPtr> {
        response.set_content_type(self.content_type);
        response.write(self.render_template(model));
        Ok(())
    }
}

/// Resolves names prefixed with [REDIRECT_URL_PREFIX] to a [RedirectView] and other names to a
/// [TemplateView] read from `prefix + name + suffix`. Missing template files are not resolved, so
/// other resolvers can try. Resolved views are cached.
pub struct UrlBasedViewResolver {
    prefix: PathBuf,
    suffix: String,
    order: i32,
    cache: RwLock<FxHashMap<String, ViewPtr>>,
}

impl UrlBasedViewResolver {
    pub fn new<P: Into<PathBuf>, S: ToString>(prefix: P, suffix: S) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.to_string(),
            order: crate::strategy::LOWEST_PRECEDENCE,
            cache: Default::default(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn load_view(&self, view_name: &str) -> Result<Option<ViewPtr>, ErrorPtr> {
        if let Some(url) = view_name.strip_prefix(REDIRECT_URL_PREFIX) {
            return Ok(Some(Arc::new(RedirectView::new(url))));
        }

        let path = self.prefix.join(format!("{view_name}{}", self.suffix));
        match std::fs::read_to_string(&path) {
            Ok(template) => Ok(Some(Arc::new(TemplateView::new(template)))),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(
                    view_name,
                    path = %path.display(),
                    "No template found for view."
                );
                Ok(None)
            }
            Err(error) => Err(Arc::new(error) as ErrorPtr),
        }
    }
}

impl ViewResolver for UrlBasedViewResolver {
    fn resolve_view_name(&self, view_name: &str) -> Result<Option<ViewPtr>, ErrorPtr> {
        if let Some(view) = self.cache.read().get(view_name) {
            return Ok(Some(view.clone()));
        }

        let view = self.load_view(view_name)?;
        if let Some(view) = &view {
            self.cache
                .write()
                .insert(view_name.to_string(), view.clone());
        }

        Ok(view)
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// Resolves views registered explicitly by name.
#[derive(Clone, Default)]
pub struct StaticViewResolver {
    views: FxHashMap<String, ViewPtr>,
    order: i32,
}

impl StaticViewResolver {
    pub fn with_view<T: ToString>(mut self, view_name: T, view: ViewPtr) -> Self {
        self.views.insert(view_name.to_string(), view);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl ViewResolver for StaticViewResolver {
    fn resolve_view_name(&self, view_name: &str) -> Result<Option<ViewPtr>, ErrorPtr> {
        Ok(self.views.get(view_name).cloned())
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// Uses the request path as view name, without leading and trailing slashes and the extension of
/// the last segment, e.g. `/users/list.html` becomes `users/list`.
#[derive(Clone, Debug, Default)]
pub struct PathViewNameTranslator {
    prefix: String,
    suffix: String,
}

impl PathViewNameTranslator {
    pub fn new<P: ToString, S: ToString>(prefix: P, suffix: S) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }
}

impl ViewNameTranslator for PathViewNameTranslator {
    fn view_name(&self, request: &WebRequest) -> Result<Option<String>, ErrorPtr> {
        let path = request.path().trim_matches('/');
        let path = match path.rfind('.') {
            Some(index) if !path[index..].contains('/') => &path[..index],
            _ => path,
        };

        if path.is_empty() {
            return Ok(None);
        }

        Ok(Some(format!("{}{path}{}", self.prefix, self.suffix)))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Model;
    use crate::request::{WebRequest, WebResponse};
    use crate::view::{
        PathViewNameTranslator, RedirectView, TemplateView, UrlBasedViewResolver, View,
        ViewNameTranslator, ViewResolver,
    };
    use axum::http::{Method, StatusCode, Uri};
    use fxhash::FxHashMap;
    use serde_json::json;

    fn request(path: &'static str) -> WebRequest {
        WebRequest::new(Method::GET, Uri::from_static(path))
    }

    #[test]
    fn should_translate_paths_to_view_names() {
        let translator = PathViewNameTranslator::default();

        assert_eq!(
            translator.view_name(&request("/users/list.html")).unwrap(),
            Some("users/list".to_string())
        );
        assert_eq!(
            translator.view_name(&request("/users/")).unwrap(),
            Some("users".to_string())
        );
        assert_eq!(translator.view_name(&request("/")).unwrap(), None);
        assert_eq!(
            PathViewNameTranslator::new("pages/", "")
                .view_name(&request("/v1.2/users"))
                .unwrap(),
            Some("pages/v1.2/users".to_string())
        );
    }

    #[test]
    fn should_render_templates() {
        let mut model = Model::new();
        model.insert("name".to_string(), json!("Alice"));
        model.insert("count".to_string(), json!(3));

        let mut response = WebResponse::default();
        TemplateView::new("Hello {{ name }}, you have {{count}} messages{{missing}}. {{unclosed")
            .render(&model, &request("/"), &mut response)
            .unwrap();

        assert_eq!(
            response.body(),
            b"Hello Alice, you have 3 messages. {{unclosed"
        );
    }

    #[test]
    fn should_expand_redirect_urls() {
        let mut request = request("/users/7");
        request.set_path_variables(FxHashMap::from_iter([(
            "id".to_string(),
            "7".to_string(),
        )]));

        let mut response = WebResponse::default();
        RedirectView::new("/accounts/{id}")
            .render(&Model::new(), &request, &mut response)
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/accounts/7");
    }

    #[test]
    fn should_resolve_redirects_and_skip_missing_templates() {
        let resolver = UrlBasedViewResolver::new("missing-templates", ".html");

        assert!(resolver
            .resolve_view_name("redirect:/home")
            .unwrap()
            .is_some());
        assert!(resolver.resolve_view_name("users").unwrap().is_none());
    }
}
