use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ApiError;

/// A comment left on a strain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub author: String,
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strain {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub flavor: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Strain {
    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }
}

/// Envelope used by every endpoint that returns several strains
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrainList {
    pub strains: Vec<Strain>,
}

/// Body of `POST /strains`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStrain {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flavor: String,
}

impl NewStrain {
    /// Check required fields and the strain type
    pub fn validate(&self) -> Result<(), ApiError> {
        let fields = [
            ("name", &self.name),
            ("type", &self.kind),
            ("description", &self.description),
            ("flavor", &self.flavor),
        ];
        for (location, value) in fields {
            if value.trim().is_empty() {
                return Err(ApiError::invalid("Missing field", location));
            }
        }

        if StrainKind::parse(&self.kind).is_none() {
            return Err(ApiError::invalid(StrainKind::INVALID_MESSAGE, "type"));
        }

        Ok(())
    }
}

/// Body of `POST /strains/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub comment: CommentBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub content: String,
    /// Ignored by the server, which always records the caller as author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl NewComment {
    pub fn new(content: impl Into<String>, author: Option<String>) -> Self {
        Self {
            comment: CommentBody {
                content: content.into(),
                author,
            },
        }
    }
}

/// Display class of a strain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrainKind {
    Sativa,
    Indica,
    Hybrid,
}

impl StrainKind {
    pub const INVALID_MESSAGE: &'static str = "\"Type\" must be \"Sativa\", \"Indica\", or \"Hybrid\"";

    /// Strict parse used when creating strains: only a lower- or upper-case
    /// first letter is accepted ("sativa" or "Sativa")
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sativa" | "Sativa" => Some(StrainKind::Sativa),
            "indica" | "Indica" => Some(StrainKind::Indica),
            "hybrid" | "Hybrid" => Some(StrainKind::Hybrid),
            _ => None,
        }
    }

    /// Lenient classification used for display; anything unrecognized is a hybrid
    pub fn classify(s: &str) -> Self {
        match Self::parse(s) {
            Some(StrainKind::Sativa) => StrainKind::Sativa,
            Some(StrainKind::Indica) => StrainKind::Indica,
            _ => StrainKind::Hybrid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrainKind::Sativa => "Sativa",
            StrainKind::Indica => "Indica",
            StrainKind::Hybrid => "Hybrid",
        }
    }
}

impl fmt::Display for StrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
