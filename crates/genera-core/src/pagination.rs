//! Pagination for list endpoints.
//!
//! Lists accept `limit` with either `offset` or `page` (1-indexed). When
//! `page` is present it wins over `offset`. Responses carry a
//! [`PaginationMeta`] next to the data:
//!
//! ```json
//! { "data": [...], "meta": { "total": 42, "limit": 10, "offset": 20, "page": 3, "has_more": true } }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Query-string numbers arrive as strings; an empty value means "not set".
fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    /// Limit that was applied
    pub limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Whether there are more items after this page
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Hash, Deserialize, ToSchema)]
pub struct PaginationParams {
    /// Maximum number of items to return (1-100, default: 10)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub limit: Option<i64>,
    /// Number of items to skip (ignored if `page` is set)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub offset: Option<i64>,
    /// Page number (1-indexed)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
}

impl PaginationParams {
    /// Effective limit, clamped to [1, 100].
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Effective offset, derived from `page` when present. Saturates
    /// instead of overflowing on huge pages.
    #[must_use]
    pub fn offset(&self) -> i64 {
        if let Some(page) = self.page {
            (page.max(1) - 1).saturating_mul(self.limit())
        } else {
            self.offset.unwrap_or(0).max(0)
        }
    }

    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page.map(|p| p.max(1))
    }

    /// Builds the response metadata for a page of `returned` items out of `total`.
    #[must_use]
    pub fn meta(&self, total: i64, returned: usize) -> PaginationMeta {
        let offset = self.offset();
        PaginationMeta {
            total,
            limit: self.limit(),
            offset: Some(offset),
            page: self.page(),
            has_more: offset.saturating_add(i64::try_from(returned).unwrap_or(i64::MAX)) < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.page(), None);
    }

    #[test]
    fn test_limit_is_clamped() {
        for (input, expected) in [(Some(0), 1), (Some(-4), 1), (Some(50), 50), (Some(500), 100)] {
            let params = PaginationParams {
                limit: input,
                ..Default::default()
            };
            assert_eq!(params.limit(), expected);
        }
    }

    #[test]
    fn test_negative_offset_is_zero() {
        let params = PaginationParams {
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let params = PaginationParams {
            limit: Some(20),
            offset: Some(7),
            page: Some(3),
        };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.page(), Some(3));
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let params = PaginationParams {
            limit: Some(10),
            offset: None,
            page: Some(0),
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.page(), Some(1));
    }

    #[test]
    fn test_meta_has_more() {
        let params = PaginationParams {
            limit: Some(10),
            offset: Some(10),
            page: None,
        };
        let meta = params.meta(25, 10);
        assert!(meta.has_more);
        assert_eq!(meta.offset, Some(10));

        let last = PaginationParams {
            limit: Some(10),
            offset: Some(20),
            page: None,
        }
        .meta(25, 5);
        assert!(!last.has_more);
    }

    #[test]
    fn test_huge_page_saturates() {
        let params = PaginationParams {
            limit: Some(100),
            offset: None,
            page: Some(i64::MAX),
        };
        assert_eq!(params.offset(), i64::MAX);
        assert!(!params.meta(10, 0).has_more);
    }

    #[test]
    fn test_huge_offset_meta_does_not_overflow() {
        let params = PaginationParams {
            limit: None,
            offset: Some(i64::MAX),
            page: None,
        };
        let meta = params.meta(10, 1);
        assert_eq!(meta.offset, Some(i64::MAX));
        assert!(!meta.has_more);
    }

    #[test]
    fn test_deserialize_from_query_strings() {
        let params: PaginationParams =
            serde_json::from_str(r#"{"limit":"25","offset":"50"}"#).unwrap();
        assert_eq!(params.limit(), 25);
        assert_eq!(params.offset(), 50);

        let empty: PaginationParams = serde_json::from_str(r#"{"limit":"","offset":""}"#).unwrap();
        assert_eq!(empty.limit(), 10);
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn test_meta_skips_missing_page() {
        let meta = PaginationParams::default().meta(3, 3);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains(r#""total":3"#));
        assert!(!json.contains("page"));
    }
}
