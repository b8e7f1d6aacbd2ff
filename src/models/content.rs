//! Content model
//!
//! Content items move through a fixed editorial workflow. Their bodies live
//! in an append-only version history; the item row only holds metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editorial workflow state of a content item.
///
/// Allowed transitions:
/// - draft -> review
/// - review -> published | draft
/// - published -> archived
/// - archived is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    #[default]
    Draft,
    Review,
    Published,
    Archived,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 4] = [
        WorkflowState::Draft,
        WorkflowState::Review,
        WorkflowState::Published,
        WorkflowState::Archived,
    ];

    /// States reachable from this one in a single transition
    pub fn allowed_targets(&self) -> &'static [WorkflowState] {
        match self {
            WorkflowState::Draft => &[WorkflowState::Review],
            WorkflowState::Review => &[WorkflowState::Published, WorkflowState::Draft],
            WorkflowState::Published => &[WorkflowState::Archived],
            WorkflowState::Archived => &[],
        }
    }

    pub fn can_transition_to(&self, target: WorkflowState) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Draft => "draft",
            WorkflowState::Review => "review",
            WorkflowState::Published => "published",
            WorkflowState::Archived => "archived",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(WorkflowState::Draft),
            "review" => Ok(WorkflowState::Review),
            "published" => Ok(WorkflowState::Published),
            "archived" => Ok(WorkflowState::Archived),
            _ => Err(anyhow::anyhow!("Invalid workflow state: {}", s)),
        }
    }
}

/// Content item metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    /// Content kind (article, page, video, ...)
    #[serde(rename = "type")]
    pub content_type: String,
    pub title: String,
    /// URL-friendly identifier (unique)
    pub slug: String,
    /// Publication status, mirrors `workflow_state`
    pub status: String,
    pub workflow_state: WorkflowState,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn is_published(&self) -> bool {
        self.workflow_state == WorkflowState::Published
    }
}

/// Immutable snapshot of a content body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: i64,
    pub content_id: i64,
    /// 1-based, increments by one per edit
    pub version_number: i64,
    pub body: String,
    pub diff: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
}

/// Attachment of a media asset to a content item under a role (hero, inline, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentMediaLink {
    pub media_id: i64,
    #[serde(default = "default_media_role")]
    pub role: String,
}

pub fn default_media_role() -> String {
    "inline".to_string()
}

/// Input for creating a content item together with its first version.
#[derive(Debug, Clone)]
pub struct CreateContentInput {
    pub content_type: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub category_ids: Vec<i64>,
    pub media: Vec<ContentMediaLink>,
    pub created_by: Option<i64>,
}

/// Partial metadata update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateContentInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content_type: Option<String>,
    pub category_ids: Option<Vec<i64>>,
    pub media: Option<Vec<ContentMediaLink>>,
    pub updated_by: Option<i64>,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Filter for content listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFilter {
    pub workflow_state: Option<WorkflowState>,
    /// Restrict to published items regardless of `workflow_state`
    pub published_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transition_table() {
        use WorkflowState::*;
        assert!(Draft.can_transition_to(Review));
        assert!(!Draft.can_transition_to(Published));
        assert!(Review.can_transition_to(Published));
        assert!(Review.can_transition_to(Draft));
        assert!(!Review.can_transition_to(Archived));
        assert!(Published.can_transition_to(Archived));
        assert!(!Published.can_transition_to(Draft));
        assert!(Archived.allowed_targets().is_empty());
    }

    #[test]
    fn test_workflow_state_parse_and_display() {
        for state in WorkflowState::ALL {
            assert_eq!(state.to_string().parse::<WorkflowState>().unwrap(), state);
        }
        assert!("deleted".parse::<WorkflowState>().is_err());
        assert_eq!(
            serde_json::to_value(WorkflowState::Review).unwrap(),
            serde_json::json!("review")
        );
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);

        let params = ListParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_paged_result_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages(), 2);
    }

    fn state_strategy() -> impl Strategy<Value = WorkflowState> {
        prop::sample::select(WorkflowState::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// No state can transition to itself, and archived is never left.
        #[test]
        fn transitions_never_loop_or_leave_archived(from in state_strategy(), to in state_strategy()) {
            if from == to {
                prop_assert!(!from.can_transition_to(to));
            }
            if from == WorkflowState::Archived {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        /// Published is only reachable from review.
        #[test]
        fn published_only_from_review(from in state_strategy()) {
            prop_assert_eq!(
                from.can_transition_to(WorkflowState::Published),
                from == WorkflowState::Review
            );
        }
    }
}
