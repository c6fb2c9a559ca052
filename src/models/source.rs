use serde::{Deserialize, Serialize};

use super::AuthorityLevel;

/// A registered source book. The title is the stable key; the authority
/// level is fixed at first registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBook {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author: Option<String>,
    pub authority_level: AuthorityLevel,
}

impl SourceBook {
    pub fn new(title: impl Into<String>, authority_level: AuthorityLevel) -> Self {
        Self {
            title: title.into(),
            author: None,
            authority_level,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
