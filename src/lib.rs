//! canvas_drive - Copy Canvas LMS course files into Google Drive.
//!
//! This library provides:
//! - A Canvas REST client that follows pagination and exposes typed accessors
//!   for courses, modules, assignments, quizzes, pages and file content
//! - A Google Drive sink that lists folders and uploads file bytes
//! - Orchestration that walks course modules and transfers every file
//!
//! # Example
//!
//! ```no_run
//! use canvas_drive::{CanvasClient, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let canvas = CanvasClient::new(&config)?;
//!
//!     for course in canvas.get_active_courses().await? {
//!         println!("{}\t{}", course.id, course.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod canvas;
pub mod config;
pub mod drive;
pub mod error;
pub mod html;
pub mod ids;
pub mod sync;

// Re-exports for convenience
pub use canvas::CanvasClient;
pub use config::Config;
pub use drive::{Authenticator, DriveClient, DriveSink};
pub use error::{CanvasError, ConfigError, DriveError, Result, SyncError};
