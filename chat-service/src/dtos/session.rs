use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Message, TokenUsage};
use crate::services::chat::Pagination;

pub const DEFAULT_PAGE_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 200, message = "Model id must be at most 200 characters"))]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMessageRequest {
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,

    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,

    pub model: Option<String>,

    pub tokens: Option<TokenUsage>,
}

/// `?limit=&offset=`; unset or zero limit means the default page size.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PageQuery {
    pub fn limit(&self) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub success: bool,
    pub data: Vec<Message>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.limit(), 50);
        assert_eq!(query.offset(), 0);

        let zero = PageQuery {
            limit: Some(0),
            offset: Some(3),
        };
        assert_eq!(zero.limit(), 50);
        assert_eq!(zero.offset(), 3);
    }

    #[test]
    fn empty_content_fails_validation() {
        let req = AddMessageRequest {
            role: "user".to_string(),
            content: String::new(),
            model: None,
            tokens: None,
        };
        assert!(req.validate().is_err());
    }
}
