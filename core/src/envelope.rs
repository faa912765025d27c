use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ApplicationError, GatewayError};

/// Envelope code the backend uses for an expired access token.
pub const TOKEN_EXPIRED: i64 = 40101;

/// Standard wrapper around every backend response.
///
/// Serializes back to what was received: fields sent as `null` or `""`, and
/// top-level fields not modelled here, are kept in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T = Value> {
    pub code: i64,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: Option<i64>,
    pub pagination: Option<PageInfo>,
    pub extra: Map<String, Value>,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("code", &self.code)?;
        let mut written = vec!["code"];
        if !self.message.is_empty() {
            map.serialize_entry("message", &self.message)?;
            written.push("message");
        }
        if let Some(data) = &self.data {
            map.serialize_entry("data", data)?;
            written.push("data");
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
            written.push("error");
        }
        if let Some(timestamp) = &self.timestamp {
            map.serialize_entry("timestamp", timestamp)?;
            written.push("timestamp");
        }
        if let Some(pagination) = &self.pagination {
            map.serialize_entry("pagination", pagination)?;
            written.push("pagination");
        }
        for (key, value) in &self.extra {
            if !written.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let code = match fields.remove("code") {
            Some(value) => serde_json::from_value(value).map_err(D::Error::custom)?,
            None => return Err(D::Error::missing_field("code")),
        };

        let mut extra = Map::new();
        let message: Option<String> =
            take_field(&mut fields, &mut extra, "message").map_err(D::Error::custom)?;
        let message = match message {
            Some(text) if text.is_empty() => {
                extra.insert("message".to_string(), Value::String(text));
                String::new()
            }
            Some(text) => text,
            None => String::new(),
        };
        let data = take_field(&mut fields, &mut extra, "data").map_err(D::Error::custom)?;
        let error = take_field(&mut fields, &mut extra, "error").map_err(D::Error::custom)?;
        let timestamp =
            take_field(&mut fields, &mut extra, "timestamp").map_err(D::Error::custom)?;
        let pagination =
            take_field(&mut fields, &mut extra, "pagination").map_err(D::Error::custom)?;
        extra.extend(fields);

        Ok(Self {
            code,
            message,
            data,
            error,
            timestamp,
            pagination,
            extra,
        })
    }
}

/// Pull a known field out of `fields`. An explicit `null` is parked in `extra`.
fn take_field<U: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    extra: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<U>, serde_json::Error> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::Null) => {
            extra.insert(key.to_string(), Value::Null);
            Ok(None)
        }
        Some(value) => serde_json::from_value(value).map(Some),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageInfo {
    /// The pagination block returned for an empty first page.
    pub fn empty(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            total: 0,
            total_pages: 0,
        }
    }
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: ApiCode::Success.code(),
            message: "Success".to_string(),
            data: Some(data),
            error: None,
            timestamp: None,
            pagination: None,
            extra: Map::new(),
        }
    }

    pub fn with_pagination(mut self, pagination: PageInfo) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == ApiCode::Success.code()
    }

    pub fn is_token_expired(&self) -> bool {
        self.code == TOKEN_EXPIRED
    }

    /// Known backend code for this envelope, if it is one of the catalogued ones.
    pub fn api_code(&self) -> Option<ApiCode> {
        ApiCode::from_code(self.code)
    }

    /// Turn an application-level failure into an error for callers that do not
    /// want to branch on `code` themselves.
    pub fn into_result(self) -> Result<Self, ApplicationError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = if self.message.is_empty() {
            ApiCode::from_code(self.code)
                .map(|code| code.default_message().to_string())
                .unwrap_or_default()
        } else {
            self.message
        };
        Err(ApplicationError {
            code: self.code,
            message,
            detail: self.error,
        })
    }
}

impl Envelope<Value> {
    /// Re-type the payload. Everything except `data` is carried over untouched.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, GatewayError> {
        let data = match self.data {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|err| GatewayError::Decode(format!("unexpected payload: {err}")))?,
            ),
            None => None,
        };
        Ok(Envelope {
            code: self.code,
            message: self.message,
            data,
            error: self.error,
            timestamp: self.timestamp,
            pagination: self.pagination,
            extra: self.extra,
        })
    }

    /// Borrowing variant of [`Envelope::decode`] that only looks at `data`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Codes the backend is known to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCode {
    Success,
    InvalidParams,
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    InternalError,
    DatabaseError,
    AiServiceError,
    EncryptionError,
}

impl ApiCode {
    pub const ALL: [ApiCode; 12] = [
        ApiCode::Success,
        ApiCode::InvalidParams,
        ApiCode::ValidationError,
        ApiCode::Unauthorized,
        ApiCode::Forbidden,
        ApiCode::NotFound,
        ApiCode::Conflict,
        ApiCode::TooManyRequests,
        ApiCode::InternalError,
        ApiCode::DatabaseError,
        ApiCode::AiServiceError,
        ApiCode::EncryptionError,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::InvalidParams => 40001,
            Self::ValidationError => 40002,
            Self::Unauthorized => TOKEN_EXPIRED,
            Self::Forbidden => 40301,
            Self::NotFound => 40401,
            Self::Conflict => 40901,
            Self::TooManyRequests => 42901,
            Self::InternalError => 50001,
            Self::DatabaseError => 50002,
            Self::AiServiceError => 50003,
            Self::EncryptionError => 50004,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.code() == code)
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidParams => "invalid parameters",
            Self::ValidationError => "validation error",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "resource not found",
            Self::Conflict => "resource conflict",
            Self::TooManyRequests => "too many requests",
            Self::InternalError => "internal server error",
            Self::DatabaseError => "database error",
            Self::AiServiceError => "AI service error",
            Self::EncryptionError => "encryption error",
        }
    }
}
