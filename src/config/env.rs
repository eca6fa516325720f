//! Environment variable overrides.
//!
//! An [`EnvOverride`] maps one variable onto one configuration key. The raw string
//! is used as-is unless a converter turns it into a typed value first.

use crate::error::{ConvertError, LoadError, LoadResult};
use crate::key::Key;
use heck::ToShoutySnakeCase;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

/// Turns a raw environment string into a configuration value.
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, ConvertError> + Send + Sync>;

/// Read access to environment variables.
pub trait EnvSource {
    /// The raw value of `name`, which need not be valid UTF-8.
    fn var(&self, name: &str) -> Option<OsString>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<OsString> {
        self.get(name).map(OsString::from)
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<OsString> {
        self.get(name).map(OsString::from)
    }
}

/// Overrides `key` with the value of `env_var` when it is set.
#[derive(Clone)]
pub struct EnvOverride {
    pub env_var: String,
    pub key: Key,
    converter: Option<Converter>,
}

impl EnvOverride {
    pub fn new(env_var: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            env_var: env_var.into(),
            key: key.into(),
            converter: None,
        }
    }

    /// Override named after the key: `("APP", "db.pool_size")` reads `APP_DB_POOL_SIZE`.
    pub fn derived(prefix: &str, key: impl Into<Key>) -> Self {
        let key = key.into();
        let mut parts: Vec<String> = Vec::with_capacity(key.len() + 1);
        if !prefix.is_empty() {
            parts.push(prefix.to_shouty_snake_case());
        }
        parts.extend(key.parts().iter().map(|p| p.to_shouty_snake_case()));
        Self::new(parts.join("_"), key)
    }

    pub fn with_converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ConvertError> + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// The configuration value for a raw environment string.
    pub fn convert(&self, raw: &str) -> LoadResult<Value> {
        match &self.converter {
            None => Ok(Value::String(raw.to_string())),
            Some(convert) => convert(raw).map_err(|source| LoadError::Conversion {
                env_var: self.env_var.clone(),
                source,
            }),
        }
    }

    /// The variable's value from `env`, or `None` when it is unset. A value that is
    /// not valid UTF-8 is a conversion error.
    pub fn read(&self, env: &dyn EnvSource) -> LoadResult<Option<String>> {
        env.var(&self.env_var)
            .map(|raw| {
                raw.into_string().map_err(|raw| LoadError::Conversion {
                    env_var: self.env_var.clone(),
                    source: format!("value {raw:?} is not valid UTF-8").into(),
                })
            })
            .transpose()
    }
}

impl fmt::Debug for EnvOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvOverride")
            .field("env_var", &self.env_var)
            .field("key", &self.key)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

/// Common converters.
pub mod convert {
    use crate::error::ConvertError;
    use serde_json::Value;

    pub fn integer(raw: &str) -> Result<Value, ConvertError> {
        Ok(Value::from(raw.trim().parse::<i64>()?))
    }

    pub fn float(raw: &str) -> Result<Value, ConvertError> {
        Ok(Value::from(raw.trim().parse::<f64>()?))
    }

    /// Accepts `1/0`, `t/f`, `true/false`, `yes/no` and `on/off` in any case.
    pub fn boolean(raw: &str) -> Result<Value, ConvertError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "f" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            other => Err(format!("invalid boolean '{other}'").into()),
        }
    }

    /// Splits on `separator` into a list of trimmed strings. An empty value is an
    /// empty list.
    pub fn list(separator: char) -> impl Fn(&str) -> Result<Value, ConvertError> {
        move |raw: &str| {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            Ok(Value::Array(
                raw.split(separator)
                    .map(|item| Value::String(item.trim().to_string()))
                    .collect(),
            ))
        }
    }

    pub fn json(raw: &str) -> Result<Value, ConvertError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derived_name() {
        let eo = EnvOverride::derived("myApp", "db.poolSize");
        assert_eq!(eo.env_var, "MY_APP_DB_POOL_SIZE");
        assert_eq!(eo.key.to_string(), "db.poolSize");

        let bare = EnvOverride::derived("", ["log", "level"]);
        assert_eq!(bare.env_var, "LOG_LEVEL");
    }

    #[test]
    fn test_raw_string_without_converter() {
        let eo = EnvOverride::new("X", "a");
        assert_eq!(eo.convert("222").unwrap(), json!("222"));
    }

    #[test]
    fn test_read_from_map() {
        let env = HashMap::from([("ENVB".to_string(), "222".to_string())]);
        let eo = EnvOverride::new("ENVB", "b");
        assert_eq!(eo.read(&env).unwrap().as_deref(), Some("222"));
        assert_eq!(EnvOverride::new("UNSET", "b").read(&env).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_non_utf8_is_conversion_error() {
        use std::os::unix::ffi::OsStringExt;

        struct Raw;
        impl EnvSource for Raw {
            fn var(&self, _name: &str) -> Option<OsString> {
                Some(OsString::from_vec(vec![b'a', 0xff]))
            }
        }

        match EnvOverride::new("ENVB", "b").read(&Raw).unwrap_err() {
            LoadError::Conversion { env_var, .. } => assert_eq!(env_var, "ENVB"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_converter_failure_is_conversion_error() {
        let eo = EnvOverride::new("ENVB", "b").with_converter(convert::integer);
        assert_eq!(eo.convert(" 222 ").unwrap(), json!(222));
        match eo.convert("abc").unwrap_err() {
            LoadError::Conversion { env_var, .. } => assert_eq!(env_var, "ENVB"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_converters() {
        assert_eq!(convert::float("1.5").unwrap(), json!(1.5));
        assert_eq!(convert::boolean("Yes").unwrap(), json!(true));
        assert_eq!(convert::boolean("0").unwrap(), json!(false));
        assert!(convert::boolean("maybe").is_err());
        assert_eq!(convert::list(',')("a, b,c").unwrap(), json!(["a", "b", "c"]));
        assert_eq!(convert::list(',')("").unwrap(), json!([]));
        assert_eq!(convert::json(r#"{"x": [1]}"#).unwrap(), json!({"x": [1]}));
    }

    #[test]
    fn test_map_env_sources() {
        let env = HashMap::from([("A".to_string(), "1".to_string())]);
        assert_eq!(env.var("A").as_deref(), Some(std::ffi::OsStr::new("1")));
        assert_eq!(env.var("B"), None);

        let env: BTreeMap<String, String> = BTreeMap::from([("B".into(), "2".into())]);
        assert_eq!(env.var("B").as_deref(), Some(std::ffi::OsStr::new("2")));
    }
}
