use super::*;

#[derive(Debug, Snafu)]
pub enum InternalError {
    #[snafu(display("invalid hex integer `{input}`"))]
    ParseHexInt {
        input: String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("{reason}"))]
    InvalidValue { reason: String },
}

/// Share rejection codes carried in the error tuple of a submit reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StratumError {
    Unknown = 20,
    JobNotFound = 21,
    Duplicate = 22,
    LowDifficulty = 23,
    Unauthorized = 24,
    NotSubscribed = 25,
}

impl StratumError {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unknown => "other/unknown",
            Self::JobNotFound => "job not found",
            Self::Duplicate => "duplicate share",
            Self::LowDifficulty => "low difficulty share",
            Self::Unauthorized => "unauthorized worker",
            Self::NotSubscribed => "not subscribed",
        }
    }

    pub fn into_response(self, traceback: Option<Value>) -> JsonRpcError {
        JsonRpcError {
            error_code: self as i32,
            message: self.message().into(),
            traceback,
        }
    }
}

/// The wire error 3-tuple `[code, message, data]`. The derived deserializer
/// accepts the sequence form; serialization always emits it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub error_code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.error_code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.traceback {
            Some(traceback) => write!(
                f,
                "Stratum error {}: {} (traceback: {})",
                self.error_code,
                self.message,
                serde_json::to_string(traceback).unwrap_or_else(|_| "<invalid traceback>".into())
            ),
            None => write!(f, "Stratum error {}: {}", self.error_code, self.message),
        }
    }
}
