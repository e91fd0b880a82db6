pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub use http::{ReqwestTransport, Transport, TransportResponse};

/// Default per-request timeout for control routes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    #[default]
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            other => Err(anyhow::anyhow!("unsupported method: {}", other)),
        }
    }
}

/// Scalar parameter value sent to a control route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Query string rendering; booleans travel as `1`/`0`.
    pub fn to_query_value(&self) -> String {
        match self {
            ParamValue::Bool(true) => "1".to_string(),
            ParamValue::Bool(false) => "0".to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Str(s) => s.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

/// One call to a remote control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommandRequest {
    pub base_url: String,
    pub route: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    #[serde(default)]
    pub is_text: bool,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

impl RemoteCommandRequest {
    pub fn new(base_url: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            route: route.into(),
            method: Method::Post,
            params: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            is_text: false,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn text(mut self) -> Self {
        self.is_text = true;
        self
    }

    /// Fully qualified target URL.
    ///
    /// A route that is already absolute is used as-is, otherwise it is
    /// appended to the base URL. Anything aimed at `localhost` is forced
    /// onto plain HTTP since same-host sidecars do not terminate TLS.
    pub fn url(&self) -> String {
        let url = if self.route.starts_with("http://") || self.route.starts_with("https://") {
            self.route.clone()
        } else {
            format!("{}{}", self.base_url, self.route)
        };

        if url.contains("localhost") {
            url.replace("https://", "http://")
        } else {
            url
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_query_value()))
            .collect()
    }

    pub fn params_json(&self) -> String {
        serde_json::to_string(&self.params).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Normalized outcome of a remote call. Exactly one state per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteCommandResult {
    Success {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Failure {
        message: String,
    },
    /// Target was unreachable or the action was a no-op.
    NotExecuted,
}

impl RemoteCommandResult {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        RemoteCommandResult::Success {
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        RemoteCommandResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RemoteCommandResult::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            RemoteCommandResult::Success { message, .. } => message,
            RemoteCommandResult::Failure { message } => message,
            RemoteCommandResult::NotExecuted => "",
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            RemoteCommandResult::Success { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            RemoteCommandResult::Success { data, .. } => data,
            _ => None,
        }
    }

    /// Replace the message while keeping the state and payload.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            RemoteCommandResult::Success { data, .. } => RemoteCommandResult::Success {
                message: message.into(),
                data,
            },
            RemoteCommandResult::Failure { .. } => RemoteCommandResult::failure(message),
            RemoteCommandResult::NotExecuted => RemoteCommandResult::NotExecuted,
        }
    }
}
