//! Canvas LMS content traversal and retrieval.

pub mod client;
pub mod models;
pub mod pagination;

pub use client::CanvasClient;
pub use models::{
    Assignment, Course, CourseState, FileContent, FileMetadata, Module, ModuleItem,
    ModuleItemKind, Page, Quiz,
};
