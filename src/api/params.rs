use crate::api::error::ApiError;
use crate::query::parse_port;
use crate::storage::har::parse_query;

/// Decoded query-string parameters of one request
#[derive(Debug, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        Self {
            pairs: query.map(parse_query).unwrap_or_default(),
        }
    }

    /// First value for `name`; later duplicates are ignored
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, name: &'static str) -> Result<&str, ApiError> {
        self.get(name).ok_or(ApiError::MissingParameter(name))
    }

    /// Like [`get`](Self::get), but an empty value counts as absent
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn require_non_empty(&self, name: &'static str) -> Result<&str, ApiError> {
        self.non_empty(name).ok_or(ApiError::MissingParameter(name))
    }

    pub fn port(&self, name: &str) -> Result<Option<u16>, ApiError> {
        self.get(name)
            .map(parse_port)
            .transpose()
            .map_err(ApiError::from)
    }

    pub fn require_u64(&self, name: &'static str) -> Result<u64, ApiError> {
        let raw = self.require(name)?;
        raw.trim()
            .parse::<u64>()
            .map_err(|err| ApiError::InvalidParameter {
                name,
                reason: format!("'{raw}' is not a non-negative integer ({err})"),
            })
    }

    pub fn require_status(&self, name: &'static str) -> Result<u16, ApiError> {
        let raw = self.require(name)?;
        match raw.trim().parse::<u16>() {
            Ok(code) if (100..=999).contains(&code) => Ok(code),
            _ => Err(ApiError::InvalidParameter {
                name,
                reason: format!("'{raw}' is not an HTTP status code"),
            }),
        }
    }
}
