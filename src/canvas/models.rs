//! Data models for Canvas REST API responses.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::html::html_to_text;

/// Lifecycle state of a course as reported by Canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CourseState {
    Active,
    Concluded,
    Unpublished,
    Deleted,
    Other(String),
}

impl CourseState {
    fn parse(raw: &str) -> Self {
        match raw {
            "active" | "available" => CourseState::Active,
            "completed" | "concluded" => CourseState::Concluded,
            "unpublished" | "created" | "claimed" => CourseState::Unpublished,
            "deleted" => CourseState::Deleted,
            other => CourseState::Other(other.to_string()),
        }
    }
}

/// A Canvas course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: u64,
    pub name: String,
    pub course_code: Option<String>,
    pub state: CourseState,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.state == CourseState::Active
    }
}

#[derive(Deserialize)]
struct RawEnrollment {
    #[serde(default)]
    enrollment_state: Option<String>,
}

#[derive(Deserialize)]
struct RawCourse {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    course_code: Option<String>,
    #[serde(default)]
    workflow_state: Option<String>,
    #[serde(default)]
    enrollments: Option<Vec<RawEnrollment>>,
    #[serde(default)]
    access_restricted_by_date: bool,
}

impl<'de> Deserialize<'de> for Course {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCourse::deserialize(deserializer)?;

        // Date-restricted courses come back as a bare id.
        let state = if raw.access_restricted_by_date {
            CourseState::Other("access_restricted_by_date".to_string())
        } else if let Some(state) = raw.workflow_state.as_deref() {
            CourseState::parse(state)
        } else {
            raw.enrollments
                .as_deref()
                .and_then(|e| e.iter().find_map(|e| e.enrollment_state.as_deref()))
                .map(CourseState::parse)
                .unwrap_or_else(|| CourseState::Other("unknown".to_string()))
        };

        Ok(Course {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            course_code: raw.course_code,
            state,
        })
    }
}

/// What a module item points at.
///
/// Item types this crate does not know about decode to [`ModuleItemKind::Unknown`]
/// with the full item payload preserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModuleItemKind {
    Page { page_url: String },
    File { file_id: u64 },
    Assignment { assignment_id: u64 },
    Quiz { quiz_id: u64 },
    Discussion { topic_id: u64 },
    ExternalUrl { url: String },
    ExternalTool { url: Option<String> },
    SubHeader,
    Unknown { type_name: String, raw: Value },
}

impl ModuleItemKind {
    /// Canvas type name for this kind.
    pub fn type_name(&self) -> &str {
        match self {
            ModuleItemKind::Page { .. } => "Page",
            ModuleItemKind::File { .. } => "File",
            ModuleItemKind::Assignment { .. } => "Assignment",
            ModuleItemKind::Quiz { .. } => "Quiz",
            ModuleItemKind::Discussion { .. } => "Discussion",
            ModuleItemKind::ExternalUrl { .. } => "ExternalUrl",
            ModuleItemKind::ExternalTool { .. } => "ExternalTool",
            ModuleItemKind::SubHeader => "SubHeader",
            ModuleItemKind::Unknown { type_name, .. } => type_name.as_str(),
        }
    }
}

/// A single entry inside a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleItem {
    pub id: u64,
    pub title: String,
    pub position: Option<u32>,
    pub html_url: Option<String>,
    pub kind: ModuleItemKind,
}

#[derive(Deserialize)]
struct RawModuleItem {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    position: Option<u32>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content_id: Option<u64>,
    #[serde(default)]
    page_url: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

impl<'de> Deserialize<'de> for ModuleItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let raw = RawModuleItem::deserialize(&value).map_err(D::Error::custom)?;

        let content_id = |what: &str| {
            raw.content_id.ok_or_else(|| {
                D::Error::custom(format!("{} item {} has no content_id", what, raw.id))
            })
        };

        let kind = match raw.kind.as_str() {
            "Page" => ModuleItemKind::Page {
                page_url: raw.page_url.clone().ok_or_else(|| {
                    D::Error::custom(format!("Page item {} has no page_url", raw.id))
                })?,
            },
            "File" => ModuleItemKind::File {
                file_id: content_id("File")?,
            },
            "Assignment" => ModuleItemKind::Assignment {
                assignment_id: content_id("Assignment")?,
            },
            "Quiz" => ModuleItemKind::Quiz {
                quiz_id: content_id("Quiz")?,
            },
            "Discussion" => ModuleItemKind::Discussion {
                topic_id: content_id("Discussion")?,
            },
            "ExternalUrl" => ModuleItemKind::ExternalUrl {
                url: raw.external_url.clone().unwrap_or_default(),
            },
            "ExternalTool" => ModuleItemKind::ExternalTool {
                url: raw.external_url.clone(),
            },
            "SubHeader" => ModuleItemKind::SubHeader,
            other => ModuleItemKind::Unknown {
                type_name: other.to_string(),
                raw: value.clone(),
            },
        };

        Ok(ModuleItem {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            position: raw.position,
            html_url: raw.html_url,
            kind,
        })
    }
}

/// A course module with its items in server order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub id: u64,
    pub course_id: u64,
    pub name: String,
    pub position: Option<u32>,
    pub items: Vec<ModuleItem>,
}

impl Module {
    /// File items in this module, in order.
    pub fn files(&self) -> impl Iterator<Item = (&ModuleItem, u64)> {
        self.items.iter().filter_map(|item| match item.kind {
            ModuleItemKind::File { file_id } => Some((item, file_id)),
            _ => None,
        })
    }
}

/// Module as returned by `/courses/{id}/modules`.
///
/// `items` is absent when the module is too large for Canvas to inline.
#[derive(Debug, Deserialize)]
pub(crate) struct ModuleResponse {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub items: Option<Vec<ModuleItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentResponse {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An assignment with its description rendered as plain text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: u64,
    pub name: String,
    pub due_at: Option<String>,
    pub description: String,
}

impl From<AssignmentResponse> for Assignment {
    fn from(raw: AssignmentResponse) -> Self {
        Self {
            id: raw.id,
            name: raw.name.unwrap_or_else(|| "Unnamed Assignment".to_string()),
            due_at: raw.due_at,
            description: html_to_text(raw.description.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizResponse {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A quiz with its description rendered as plain text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    pub id: u64,
    pub title: String,
    pub due_at: Option<String>,
    pub description: String,
}

impl From<QuizResponse> for Quiz {
    fn from(raw: QuizResponse) -> Self {
        Self {
            id: raw.id,
            title: raw.title.unwrap_or_else(|| "Unnamed Quiz".to_string()),
            due_at: raw.due_at,
            description: html_to_text(raw.description.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageResponse {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// A wiki page with its body rendered as plain text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub body: String,
}

impl From<PageResponse> for Page {
    fn from(raw: PageResponse) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| raw.url.clone()),
            body: html_to_text(raw.body.as_deref()),
            url: raw.url,
        }
    }
}

/// File metadata from `/files/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "content-type")]
    pub content_type: Option<String>,
    /// Signed download URL; empty or missing when the file is locked.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl FileMetadata {
    /// Name to store the file under, preferring the human-facing display name.
    pub fn preferred_name(&self) -> String {
        self.display_name
            .as_deref()
            .or(self.filename.as_deref())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("file-{}", self.id))
    }
}

/// A fully downloaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileContent {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Canvas error body: `{"errors": [{"message": ...}]}` or `{"message": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorResponse {
    pub fn message(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        match self.errors.as_ref()? {
            Value::Array(errors) => {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            other => Some(other.to_string()),
        }
    }
}
