//! Custom types for common data structures

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used for TIMESTAMPTZ columns
pub type DBDateTime = ChronoDateTime<Utc>;

/// Standard UTC DateTime type used across all Temps crates
///
/// Serializes as ISO 8601 with a 'Z' suffix: `2025-10-12T12:15:47.609192Z`.
///
/// # OpenAPI Schema
/// When using with utoipa, add the schema attribute:
/// ```rust,ignore
/// #[schema(value_type = String, format = DateTime)]
/// pub field: UtcDateTime,
/// ```
pub type UtcDateTime = ChronoDateTime<Utc>;
