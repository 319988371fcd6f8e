//! Conversions from infrastructure errors into domain errors.
//!
//! `InfraError` is a thin wrapper so that `From` impls for foreign error
//! types can live in this crate; call sites convert with `?` or
//! `map_err(InfraError::from)` and hand the domain error up.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use rusqlite::ffi::ErrorCode;
use trellis_domain::TrellisError;

#[derive(Debug)]
pub struct InfraError(pub TrellisError);

impl From<InfraError> for TrellisError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TrellisError> for InfraError {
    fn from(value: TrellisError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        let mapped = match value {
            SqlError::QueryReturnedNoRows => {
                TrellisError::NotFound("no matching row".into())
            }
            SqlError::SqliteFailure(err, message) => match err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    TrellisError::Persistence("database is busy".into())
                }
                ErrorCode::ConstraintViolation => TrellisError::Persistence(format!(
                    "constraint violation: {}",
                    message.unwrap_or_default()
                )),
                code => TrellisError::Persistence(format!(
                    "sqlite failure {code:?}: {}",
                    message.unwrap_or_default()
                )),
            },
            SqlError::FromSqlConversionFailure(_, _, cause) => {
                TrellisError::Persistence(format!("unreadable stored value: {cause}"))
            }
            other => TrellisError::Persistence(other.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(TrellisError::Persistence(format!("connection pool exhausted: {value}")))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return InfraError(TrellisError::Network("request timed out".into()));
        }
        if value.is_connect() {
            return InfraError(TrellisError::Network(format!("connection failed: {value}")));
        }

        let mapped = match value.status().map(|s| s.as_u16()) {
            Some(code @ (401 | 403)) => TrellisError::Auth(format!("HTTP {code}")),
            Some(404) => TrellisError::NotFound("HTTP 404".into()),
            Some(429) => TrellisError::Network("HTTP 429".into()),
            Some(code @ 400..=499) => TrellisError::Validation(format!("HTTP {code}")),
            Some(code) => TrellisError::Network(format!("HTTP {code}")),
            None => TrellisError::Network(value.to_string()),
        };
        InfraError(mapped)
    }
}
