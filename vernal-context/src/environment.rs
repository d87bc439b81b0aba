//! Environment holding ordered [PropertySource]s and resolving `${...}` placeholders against them.
//!
//! Sources are searched in order and the first one containing a given key wins. Configuration
//! units can contribute additional sources, loaded through a [PropertySourceLoader].

use crate::error::EnvironmentError;
use config::{Config, ConfigError, File, Value};
use fxhash::{FxHashMap, FxHashSet};
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type EnvironmentPtr = Arc<RwLock<Environment>>;

pub type PropertySourceLoaderPtr = Arc<dyn PropertySourceLoader + Send + Sync>;

/// Name of the property source containing process environment variables.
pub const SYSTEM_ENVIRONMENT: &str = "systemEnvironment";

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: char = '}';
const VALUE_SEPARATOR: char = ':';

/// Named source of string properties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PropertySource {
    Map {
        name: String,
        values: FxHashMap<String, String>,
    },
    /// Source delegating to nested sources in order.
    Composite {
        name: String,
        sources: Vec<PropertySource>,
    },
}

impl PropertySource {
    pub fn from_map<N: ToString>(name: N, values: FxHashMap<String, String>) -> Self {
        Self::Map {
            name: name.to_string(),
            values,
        }
    }

    pub fn composite<N: ToString>(name: N) -> Self {
        Self::Composite {
            name: name.to_string(),
            sources: vec![],
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Map { name, .. } | Self::Composite { name, .. } => name,
        }
    }

    /// Returns the same source under a different name.
    pub fn renamed<N: ToString>(self, new_name: N) -> Self {
        match self {
            Self::Map { values, .. } => Self::Map {
                name: new_name.to_string(),
                values,
            },
            Self::Composite { sources, .. } => Self::Composite {
                name: new_name.to_string(),
                sources,
            },
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        match self {
            Self::Map { values, .. } => values.get(key).map(String::as_str),
            Self::Composite { sources, .. } => {
                sources.iter().find_map(|source| source.property(key))
            }
        }
    }

    /// Adds a nested source with the highest precedence. Does nothing for non-composite sources.
    pub fn add_first_source(&mut self, source: PropertySource) {
        if let Self::Composite { sources, .. } = self {
            sources.insert(0, source);
        }
    }

    /// Adds a nested source with the lowest precedence. Does nothing for non-composite sources.
    pub fn add_source(&mut self, source: PropertySource) {
        if let Self::Composite { sources, .. } = self {
            sources.push(source);
        }
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }
}

/// Ordered collection of property sources with placeholder support.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    property_sources: Vec<PropertySource>,
}

impl Environment {
    /// Creates an environment with process environment variables as the only source.
    pub fn standard() -> Self {
        let mut environment = Self::default();
        environment.add_last(PropertySource::from_map(
            SYSTEM_ENVIRONMENT,
            std::env::vars().collect(),
        ));
        environment
    }

    /// Returns the first value for given key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.property_sources
            .iter()
            .find_map(|source| source.property(key))
    }

    #[inline]
    pub fn contains_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// Returns the value for given key, with placeholders resolved.
    pub fn resolved_property(&self, key: &str) -> Result<Option<String>, EnvironmentError> {
        self.property(key)
            .map(|value| self.resolve_required_placeholders(value))
            .transpose()
    }

    #[inline]
    pub fn property_sources(&self) -> &[PropertySource] {
        &self.property_sources
    }

    pub fn get(&self, name: &str) -> Option<&PropertySource> {
        self.property_sources
            .iter()
            .find(|source| source.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertySource> {
        self.property_sources
            .iter_mut()
            .find(|source| source.name() == name)
    }

    /// Adds a source with the highest precedence, replacing any source with the same name.
    pub fn add_first(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.property_sources.insert(0, source);
    }

    /// Adds a source with the lowest precedence, replacing any source with the same name.
    pub fn add_last(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.property_sources.push(source);
    }

    /// Adds a source with precedence immediately higher than the named relative source.
    pub fn add_before(
        &mut self,
        relative: &str,
        source: PropertySource,
    ) -> Result<(), EnvironmentError> {
        self.remove(source.name());
        let index = self.index_of(relative)?;
        self.property_sources.insert(index, source);
        Ok(())
    }

    /// Adds a source with precedence immediately lower than the named relative source.
    pub fn add_after(
        &mut self,
        relative: &str,
        source: PropertySource,
    ) -> Result<(), EnvironmentError> {
        self.remove(source.name());
        let index = self.index_of(relative)?;
        self.property_sources.insert(index + 1, source);
        Ok(())
    }

    /// Replaces the source with given name.
    pub fn replace(&mut self, name: &str, source: PropertySource) -> Result<(), EnvironmentError> {
        let index = self.index_of(name)?;
        self.property_sources[index] = source;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertySource> {
        self.property_sources
            .iter()
            .position(|source| source.name() == name)
            .map(|index| self.property_sources.remove(index))
    }

    /// Resolves placeholders, leaving unresolvable ones untouched.
    pub fn resolve_placeholders(&self, text: &str) -> String {
        let mut visited = FxHashSet::default();
        self.parse_value(text, false, &mut visited)
            .unwrap_or_else(|_| text.to_string())
    }

    /// Resolves placeholders, failing on any without a value or default.
    pub fn resolve_required_placeholders(&self, text: &str) -> Result<String, EnvironmentError> {
        let mut visited = FxHashSet::default();
        self.parse_value(text, true, &mut visited)
    }

    fn index_of(&self, name: &str) -> Result<usize, EnvironmentError> {
        self.property_sources
            .iter()
            .position(|source| source.name() == name)
            .ok_or_else(|| EnvironmentError::MissingPropertySource(name.to_string()))
    }

    fn parse_value(
        &self,
        text: &str,
        required: bool,
        visited: &mut FxHashSet<String>,
    ) -> Result<String, EnvironmentError> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            result.push_str(&rest[..start]);

            let body_start = start + PLACEHOLDER_PREFIX.len();
            let Some(body_length) = find_placeholder_end(&rest[body_start..]) else {
                rest = &rest[start..];
                break;
            };

            let placeholder = &rest[body_start..body_start + body_length];
            let placeholder = self.parse_value(placeholder, required, visited)?;

            if !visited.insert(placeholder.clone()) {
                return Err(EnvironmentError::CircularPlaceholder(placeholder));
            }

            let (key, default) = match placeholder.split_once(VALUE_SEPARATOR) {
                Some((key, default)) if self.property(&placeholder).is_none() => {
                    (key, Some(default))
                }
                _ => (placeholder.as_str(), None),
            };

            match self.property(key).map(str::to_string).or_else(|| default.map(str::to_string)) {
                Some(value) => {
                    let value = self.parse_value(&value, required, visited)?;
                    result.push_str(&value);
                }
                None if required => {
                    return Err(EnvironmentError::UnresolvablePlaceholder {
                        placeholder: key.to_string(),
                        value: text.to_string(),
                    });
                }
                None => {
                    result.push_str(PLACEHOLDER_PREFIX);
                    result.push_str(&placeholder);
                    result.push(PLACEHOLDER_SUFFIX);
                }
            }

            visited.remove(&placeholder);
            rest = &rest[body_start + body_length + 1..];
        }

        result.push_str(rest);
        Ok(result)
    }
}

// handles nested placeholders, e.g. ${a:${b}}
fn find_placeholder_end(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut chars = text.char_indices().peekable();

    while let Some((index, character)) = chars.next() {
        match character {
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                depth += 1;
                chars.next();
            }
            PLACEHOLDER_SUFFIX if depth == 0 => return Some(index),
            PLACEHOLDER_SUFFIX => depth -= 1,
            _ => {}
        }
    }

    None
}

/// Loads property sources from locations declared by configuration units.
#[cfg_attr(test, automock)]
pub trait PropertySourceLoader {
    /// Loads a source from given location. Without an explicit name, the location is used.
    fn load(&self, name: Option<String>, location: &str) -> Result<PropertySource, EnvironmentError>;
}

/// Loader reading files in any format supported by the `config` crate. Nested tables are
/// flattened into dotted keys.
#[derive(Default, Copy, Clone, Debug)]
pub struct ConfigFileLoader;

impl PropertySourceLoader for ConfigFileLoader {
    fn load(&self, name: Option<String>, location: &str) -> Result<PropertySource, EnvironmentError> {
        let config = Config::builder()
            .add_source(File::with_name(location))
            .build()
            .map_err(|error| match error {
                ConfigError::NotFound(_) | ConfigError::Foreign(_) => {
                    EnvironmentError::ResourceNotFound {
                        location: location.to_string(),
                        message: error.to_string(),
                    }
                }
                _ => EnvironmentError::Load {
                    location: location.to_string(),
                    message: error.to_string(),
                },
            })?;

        let table = config
            .try_deserialize::<HashMap<String, Value>>()
            .map_err(|error| EnvironmentError::Load {
                location: location.to_string(),
                message: error.to_string(),
            })?;

        let mut values = FxHashMap::default();
        for (key, value) in table {
            flatten_value(&key, value, &mut values);
        }

        Ok(PropertySource::from_map(
            name.unwrap_or_else(|| location.to_string()),
            values,
        ))
    }
}

fn flatten_value(prefix: &str, value: Value, values: &mut FxHashMap<String, String>) {
    if let Ok(table) = value.clone().into_table() {
        for (key, value) in table {
            flatten_value(&format!("{prefix}.{key}"), value, values);
        }
    } else if let Ok(array) = value.clone().into_array() {
        for (index, value) in array.into_iter().enumerate() {
            flatten_value(&format!("{prefix}[{index}]"), value, values);
        }
    } else if let Ok(value) = value.into_string() {
        values.insert(prefix.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::{
        ConfigFileLoader, Environment, PropertySource, PropertySourceLoader,
    };
    use crate::error::EnvironmentError;
    use std::fs;

    fn create_environment() -> Environment {
        let mut environment = Environment::default();
        environment.add_last(PropertySource::from_map(
            "first",
            [
                ("host".to_string(), "localhost".to_string()),
                ("url".to_string(), "http://${host}:${port:8080}".to_string()),
                ("loop".to_string(), "${loop}".to_string()),
            ]
            .into_iter()
            .collect(),
        ));
        environment.add_last(PropertySource::from_map(
            "second",
            [
                ("host".to_string(), "shadowed".to_string()),
                ("name".to_string(), "app".to_string()),
            ]
            .into_iter()
            .collect(),
        ));
        environment
    }

    #[test]
    fn should_prefer_first_source() {
        let environment = create_environment();
        assert_eq!(environment.property("host"), Some("localhost"));
        assert_eq!(environment.property("name"), Some("app"));
    }

    #[test]
    fn should_resolve_nested_placeholders_with_defaults() {
        let environment = create_environment();
        assert_eq!(
            environment.resolved_property("url").unwrap().unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            environment
                .resolve_required_placeholders("${missing:${name}}-x")
                .unwrap(),
            "app-x"
        );
    }

    #[test]
    fn should_leave_unresolvable_placeholders() {
        let environment = create_environment();
        assert_eq!(
            environment.resolve_placeholders("a ${missing} b"),
            "a ${missing} b"
        );
        assert!(matches!(
            environment
                .resolve_required_placeholders("a ${missing} b")
                .unwrap_err(),
            EnvironmentError::UnresolvablePlaceholder { placeholder, .. } if placeholder == "missing"
        ));
    }

    #[test]
    fn should_detect_circular_placeholders() {
        let environment = create_environment();
        assert_eq!(
            environment.resolve_required_placeholders("${loop}").unwrap_err(),
            EnvironmentError::CircularPlaceholder("loop".to_string())
        );
    }

    #[test]
    fn should_order_sources() {
        let mut environment = create_environment();
        environment
            .add_before("second", PropertySource::from_map("middle", Default::default()))
            .unwrap();
        environment.add_first(PropertySource::composite("top"));

        let names: Vec<_> = environment
            .property_sources()
            .iter()
            .map(|source| source.name())
            .collect();
        assert_eq!(names, vec!["top", "first", "middle", "second"]);

        assert_eq!(
            environment
                .replace("missing", PropertySource::composite("x"))
                .unwrap_err(),
            EnvironmentError::MissingPropertySource("missing".to_string())
        );
    }

    #[test]
    fn should_search_composite_sources_in_order() {
        let mut composite = PropertySource::composite("composite");
        composite.add_source(PropertySource::from_map(
            "a",
            [("key".to_string(), "a".to_string())].into_iter().collect(),
        ));
        composite.add_first_source(PropertySource::from_map(
            "b",
            [("key".to_string(), "b".to_string())].into_iter().collect(),
        ));

        assert_eq!(composite.property("key"), Some("b"));
    }

    #[test]
    fn should_load_flattened_properties_from_file() {
        let location = std::env::temp_dir().join(format!(
            "vernal_environment_{}.json",
            std::process::id()
        ));
        fs::write(
            &location,
            r#"{"db": {"url": "x", "port": 5432, "hosts": ["a", "b"]}, "flag": true}"#,
        )
        .unwrap();

        let source = ConfigFileLoader
            .load(Some("file".to_string()), location.to_str().unwrap())
            .unwrap();
        fs::remove_file(&location).unwrap();

        assert_eq!(source.name(), "file");
        assert_eq!(source.property("db.url"), Some("x"));
        assert_eq!(source.property("db.port"), Some("5432"));
        assert_eq!(source.property("db.hosts[0]"), Some("a"));
        assert_eq!(source.property("db.hosts[1]"), Some("b"));
        assert_eq!(source.property("flag"), Some("true"));
        assert_eq!(source.property("missing"), None);
    }

    #[test]
    fn should_report_missing_file() {
        let location = std::env::temp_dir().join("vernal_environment_missing.json");

        assert!(matches!(
            ConfigFileLoader.load(None, location.to_str().unwrap()),
            Err(EnvironmentError::ResourceNotFound { .. })
        ));
    }
}
