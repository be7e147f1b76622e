//! Error mapping shared by every city service handler.
//!
//! Handlers return [`CityError`] for protocol faults only. Expected business
//! outcomes (a full parking lot, for instance) travel as ordinary responses
//! with a `success` flag and never pass through this module.
//!
//! # gRPC Status Codes
//!
//! | Code | Name | Usage |
//! |------|------|-------|
//! | `INVALID_ARGUMENT` (3) | Invalid Argument | Missing id, unknown light color |
//! | `NOT_FOUND` (5) | Not Found | Unknown light, intersection, lot or vehicle |
//! | `INTERNAL` (13) | Internal Error | Unexpected defect while handling a call |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tonic::Code;
use tonic_types::{ErrorDetails, StatusExt};

/// Domain attached to every `ErrorInfo` detail.
pub const ERROR_DOMAIN: &str = "smartcity";

/// Kinds of entity a lookup can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Traffic light.
    TrafficLight,
    /// Monitored intersection.
    Intersection,
    /// Parking lot.
    ParkingLot,
    /// Transport vehicle.
    Vehicle,
}

impl ResourceKind {
    /// Resource type reported in `ResourceInfo` details.
    #[must_use]
    pub const fn resource_type(self) -> &'static str {
        match self {
            Self::TrafficLight => "traffic_light",
            Self::Intersection => "intersection",
            Self::ParkingLot => "parking_lot",
            Self::Vehicle => "vehicle",
        }
    }

    /// Human readable label used in status messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TrafficLight => "Traffic light",
            Self::Intersection => "Intersection",
            Self::ParkingLot => "Parking lot",
            Self::Vehicle => "Vehicle",
        }
    }

    const fn not_found_code(self) -> ErrorCode {
        match self {
            Self::TrafficLight => ErrorCode::LightNotFound,
            Self::Intersection => ErrorCode::IntersectionNotFound,
            Self::ParkingLot => ErrorCode::LotNotFound,
            Self::Vehicle => ErrorCode::VehicleNotFound,
        }
    }
}

/// Error codes for the city services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (INVALID_ARGUMENT)
    /// Required identifying field missing or blank.
    MissingField,
    /// Light color outside red, yellow, green.
    InvalidColor,

    // Not found errors (NOT_FOUND)
    /// Traffic light not found.
    LightNotFound,
    /// Intersection not found.
    IntersectionNotFound,
    /// Parking lot not found.
    LotNotFound,
    /// Vehicle not found.
    VehicleNotFound,

    // Internal errors (INTERNAL)
    /// Unexpected defect.
    Internal,
}

impl ErrorCode {
    /// Get the gRPC status code for this error.
    #[must_use]
    pub const fn grpc_code(&self) -> Code {
        match self {
            Self::MissingField | Self::InvalidColor => Code::InvalidArgument,

            Self::LightNotFound
            | Self::IntersectionNotFound
            | Self::LotNotFound
            | Self::VehicleNotFound => Code::NotFound,

            Self::Internal => Code::Internal,
        }
    }

    /// Get the error reason string (for gRPC `ErrorInfo`).
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidColor => "INVALID_COLOR",
            Self::LightNotFound => "LIGHT_NOT_FOUND",
            Self::IntersectionNotFound => "INTERSECTION_NOT_FOUND",
            Self::LotNotFound => "LOT_NOT_FOUND",
            Self::VehicleNotFound => "VEHICLE_NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    const fn is_validation(self) -> bool {
        matches!(self, Self::MissingField | Self::InvalidColor)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A protocol-level fault raised by a city service handler.
#[derive(Debug, Clone, Error)]
pub struct CityError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl CityError {
    /// Create a new error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Convert to a tonic Status with rich error details.
    #[must_use]
    pub fn to_status(&self) -> tonic::Status {
        let mut details = ErrorDetails::new();

        let metadata: HashMap<String, String> = self.context.iter().cloned().collect();
        details.set_error_info(self.code.reason(), ERROR_DOMAIN, metadata);

        if self.code.is_validation() {
            let field = self.context_value("field").unwrap_or("request");
            details.add_bad_request_violation(field, &self.message);
        }

        if self.code.grpc_code() == Code::NotFound {
            details.set_resource_info(
                self.context_value("resource_type").unwrap_or_default(),
                self.context_value("resource_id").unwrap_or_default(),
                "",
                &self.message,
            );
        }

        tonic::Status::with_error_details(self.code.grpc_code(), &self.message, details)
    }
}

impl std::fmt::Display for CityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

impl From<CityError> for tonic::Status {
    fn from(error: CityError) -> Self {
        error.to_status()
    }
}

/// Convenience constructors for common errors.
impl CityError {
    /// A required identifying field was missing or blank.
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("{field} is required"))
            .with_context("field", field)
    }

    /// A light color outside red, yellow, green.
    #[must_use]
    pub fn invalid_color(value: &str) -> Self {
        Self::new(
            ErrorCode::InvalidColor,
            "Invalid color. Must be red, yellow, or green.",
        )
        .with_context("field", "color")
        .with_context("value", value)
    }

    /// Lookup of `id` missed.
    #[must_use]
    pub fn not_found(kind: ResourceKind, id: &str) -> Self {
        Self::new(kind.not_found_code(), format!("{} not found", kind.label()))
            .with_context("resource_type", kind.resource_type())
            .with_context("resource_id", id)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

/// Reject a missing or blank identifying field, returning the trimmed id.
///
/// # Errors
///
/// Returns [`ErrorCode::MissingField`] when `value` is empty after trimming.
pub fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str, CityError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CityError::missing_field(field));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_grpc_mapping() {
        assert_eq!(ErrorCode::MissingField.grpc_code(), Code::InvalidArgument);
        assert_eq!(ErrorCode::InvalidColor.grpc_code(), Code::InvalidArgument);
        assert_eq!(ErrorCode::LightNotFound.grpc_code(), Code::NotFound);
        assert_eq!(ErrorCode::IntersectionNotFound.grpc_code(), Code::NotFound);
        assert_eq!(ErrorCode::LotNotFound.grpc_code(), Code::NotFound);
        assert_eq!(ErrorCode::VehicleNotFound.grpc_code(), Code::NotFound);
        assert_eq!(ErrorCode::Internal.grpc_code(), Code::Internal);
    }

    #[test]
    fn test_not_found_message_and_details() {
        let error = CityError::not_found(ResourceKind::ParkingLot, "lot-999");
        assert_eq!(error.message(), "Parking lot not found");

        let status = error.to_status();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "Parking lot not found");

        let details = status.get_error_details();
        let resource = details.resource_info().unwrap();
        assert_eq!(resource.resource_type, "parking_lot");
        assert_eq!(resource.resource_name, "lot-999");
        assert_eq!(details.error_info().unwrap().reason, "LOT_NOT_FOUND");
    }

    #[test]
    fn test_validation_status_carries_field_violation() {
        let status = CityError::invalid_color("purple").to_status();
        assert_eq!(status.code(), Code::InvalidArgument);

        let details = status.get_error_details();
        let bad_request = details.bad_request().unwrap();
        assert_eq!(bad_request.field_violations[0].field, "color");
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("light_id", " light-001 ").unwrap(), "light-001");

        let error = require_id("vehicle_id", "   ").unwrap_err();
        assert_eq!(error.code(), ErrorCode::MissingField);
        assert_eq!(error.message(), "vehicle_id is required");
    }

    #[test]
    fn test_error_display() {
        let error = CityError::internal("sampler exploded");
        assert_eq!(error.to_string(), "[INTERNAL_ERROR] sampler exploded");
    }
}
