use http::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Identity of a route: method plus path template.
///
/// Several routes may share a path as long as their methods differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A route as exposed by the host's route table.
///
/// Validation options live under `settings.plugins.<plugin name>`, next to
/// whatever other plugins the host keeps there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    #[serde(
        serialize_with = "serialize_method",
        deserialize_with = "deserialize_method"
    )]
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub settings: RouteSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSettings {
    #[serde(default)]
    pub plugins: HashMap<String, Value>,
}

impl RouteDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            settings: RouteSettings::default(),
        }
    }

    /// Attach validation options under `plugin_name`.
    pub fn with_plugin(mut self, plugin_name: impl Into<String>, options: Value) -> Self {
        self.settings.plugins.insert(plugin_name.into(), options);
        self
    }

    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.method.clone(), self.path.clone())
    }

    /// Parse the validation options stored under `plugin_name`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - the route carries no options for this plugin
    /// * `Ok(Some(options))` - parsed options
    /// * `Err(_)` - the options exist but do not have the expected shape
    pub fn validation_options(
        &self,
        plugin_name: &str,
    ) -> Result<Option<ValidationOptions>, serde_json::Error> {
        match self.settings.plugins.get(plugin_name) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => ValidationOptions::deserialize(raw).map(Some),
        }
    }
}

/// Per-route validation options.
///
/// Each surface is optional; a JSON `null` means the same as leaving the key
/// out. Keys that do not name a surface are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseOptions>,
}

/// Response validation options: `{ schema, sample, failAction }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleSetting>,
    #[serde(
        default,
        rename = "failAction",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_action: Option<FailAction>,
}

impl ResponseOptions {
    pub fn policy(&self) -> ResponsePolicy {
        ResponsePolicy {
            sample: self
                .sample
                .map(SampleRate::from)
                .unwrap_or(SampleRate::Always),
            fail_action: self.fail_action.unwrap_or_default(),
        }
    }
}

/// Raw `sample` value as written in route settings: a percentage or a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleSetting {
    Flag(bool),
    Percent(u64),
}

/// Normalized sampling decision for response validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    /// Validate every response.
    Always,
    /// Never validate.
    Never,
    /// Validate roughly this percentage (1-99) of responses.
    Percent(u8),
}

impl From<SampleSetting> for SampleRate {
    fn from(setting: SampleSetting) -> Self {
        match setting {
            SampleSetting::Flag(false) | SampleSetting::Percent(0) => SampleRate::Never,
            SampleSetting::Flag(true) => SampleRate::Always,
            SampleSetting::Percent(p) if p >= 100 => SampleRate::Always,
            SampleSetting::Percent(p) => SampleRate::Percent(p as u8),
        }
    }
}

/// What to do with a response that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailAction {
    /// Turn the failure into a server error for the request.
    #[default]
    Error,
    /// Record the failure and let the response through untouched.
    Log,
}

impl From<&str> for FailAction {
    fn from(s: &str) -> Self {
        // Anything other than "log" escalates.
        if s == "log" {
            FailAction::Log
        } else {
            FailAction::Error
        }
    }
}

impl Serialize for FailAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            FailAction::Error => "error",
            FailAction::Log => "log",
        })
    }
}

impl<'de> Deserialize<'de> for FailAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FailAction::from(raw.as_str()))
    }
}

/// Sampling and failure policy registered for a route's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub sample: SampleRate,
    pub fail_action: FailAction,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            sample: SampleRate::Always,
            fail_action: FailAction::Error,
        }
    }
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

fn deserialize_method<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| serde::de::Error::custom(format!("invalid HTTP method '{raw}': {e}")))
}
