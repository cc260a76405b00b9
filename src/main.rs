//! canvas_drive CLI - Copy Canvas course files into Google Drive.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canvas_drive::config::{
    DEFAULT_CANVAS_URL, DEFAULT_CONCURRENCY, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT,
};
use canvas_drive::drive::models::format_size;
use canvas_drive::ids::{extract_folder_id, parse_course_id};
use canvas_drive::sync::sync_courses;
use canvas_drive::{Authenticator, CanvasClient, Config, ConfigError, DriveClient};

/// Copy Canvas LMS course files into a Google Drive folder.
#[derive(Parser)]
#[command(name = "canvas_drive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Canvas personal access token.
    #[arg(long, env = "CANVAS_API_TOKEN", hide_env_values = true)]
    canvas_token: Option<String>,

    /// Canvas API root.
    #[arg(long, env = "CANVAS_URL", default_value = DEFAULT_CANVAS_URL)]
    canvas_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "CANVAS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Items requested per Canvas page (max 100).
    #[arg(long, env = "CANVAS_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Maximum concurrent Canvas listing requests.
    #[arg(long, env = "CANVAS_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Google OAuth client or service account JSON file.
    #[arg(long, env = "GOOGLE_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Where the Google user token is stored between runs.
    #[arg(long, env = "GOOGLE_TOKEN_FILE", default_value = "token.json")]
    token_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active courses.
    Courses,

    /// List a course's modules and their items.
    Modules {
        /// Course ID or URL.
        course: String,
    },

    /// List a course's assignments.
    Assignments {
        /// Course ID or URL.
        course: String,
    },

    /// List a course's quizzes.
    Quizzes {
        /// Course ID or URL.
        course: String,
    },

    /// List Google Drive folders.
    Folders,

    /// Copy every file in the courses' modules to Drive.
    Sync {
        /// Course IDs or URLs.
        #[arg(required = true)]
        courses: Vec<String>,

        /// Destination folder URL or ID. Prompts when omitted.
        #[arg(long, short = 'f', conflicts_with = "root")]
        folder: Option<String>,

        /// Upload into the Drive root instead of a folder.
        #[arg(long)]
        root: bool,
    },
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let token = self
            .canvas_token
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("CANVAS_API_TOKEN".to_string()))?;
        let config = Config::new(&self.canvas_url, token)?
            .with_timeout(Duration::from_secs(self.timeout))?
            .with_page_size(self.page_size)?
            .with_concurrency(self.concurrency)?;
        Ok(config)
    }

    fn drive(&self) -> Result<DriveClient> {
        let auth = Authenticator::from_files(&self.credentials, &self.token_file)
            .with_context(|| format!("Failed to load credentials from {:?}", self.credentials))?;
        Ok(DriveClient::new(auth))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("canvas_drive=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Validate before any network call.
    let config = cli.config().context("Invalid configuration")?;
    let canvas = CanvasClient::new(&config)?;

    match &cli.command {
        Commands::Courses => {
            let courses = canvas
                .get_active_courses()
                .await
                .context("Failed to list courses")?;

            if courses.is_empty() {
                println!("No active courses found.");
            } else {
                println!("{:<10} {:<20} {}", "ID", "CODE", "NAME");
                println!("{}", "-".repeat(80));
                for course in courses {
                    let code = course.course_code.as_deref().unwrap_or("-");
                    println!("{:<10} {:<20} {}", course.id, code, course.name);
                }
            }
        }

        Commands::Modules { course } => {
            let course_id = course_arg(course)?;
            let modules = canvas
                .get_course_modules(course_id)
                .await
                .with_context(|| format!("Failed to list modules for course {}", course_id))?;

            if modules.is_empty() {
                println!("No modules found.");
            }
            for module in modules {
                println!("{} ({} items)", module.name, module.items.len());
                for item in &module.items {
                    println!("  [{}] {}", item.kind.type_name(), item.title);
                }
            }
        }

        Commands::Assignments { course } => {
            let course_id = course_arg(course)?;
            let assignments = canvas
                .get_assignments(course_id)
                .await
                .with_context(|| format!("Failed to list assignments for course {}", course_id))?;

            println!("Assignments ({}):", assignments.len());
            for a in assignments {
                println!("  - {} (Due: {})", a.name, a.due_at.as_deref().unwrap_or("none"));
                if !a.description.is_empty() {
                    println!("    {}", preview(&a.description, 100));
                }
            }
        }

        Commands::Quizzes { course } => {
            let course_id = course_arg(course)?;
            let quizzes = canvas
                .get_quizzes(course_id)
                .await
                .with_context(|| format!("Failed to list quizzes for course {}", course_id))?;

            println!("Quizzes ({}):", quizzes.len());
            for q in quizzes {
                println!("  - {} (Due: {})", q.title, q.due_at.as_deref().unwrap_or("none"));
                if !q.description.is_empty() {
                    println!("    {}", preview(&q.description, 100));
                }
            }
        }

        Commands::Folders => {
            let drive = cli.drive()?;
            let folders = drive.list_folders().await.context("Failed to list folders")?;

            if folders.is_empty() {
                println!("No folders found.");
            } else {
                println!("{:<44} {}", "ID", "NAME");
                println!("{}", "-".repeat(80));
                for folder in folders {
                    println!("{:<44} {}", folder.id, folder.name);
                }
            }
        }

        Commands::Sync {
            courses,
            folder,
            root,
        } => {
            let course_ids = courses
                .iter()
                .map(|c| course_arg(c))
                .collect::<Result<Vec<u64>>>()?;

            let drive = cli.drive()?;
            drive
                .authenticator()
                .authenticate()
                .await
                .context("Google Drive authentication failed")?;

            let folder_id = match (folder, root) {
                (Some(folder), _) => Some(
                    extract_folder_id(folder)
                        .with_context(|| format!("Invalid folder URL or ID: {}", folder))?,
                ),
                (None, true) => None,
                (None, false) => select_folder(&drive).await?,
            };

            println!(
                "Syncing {} course(s) to {}...",
                course_ids.len(),
                folder_id.as_deref().unwrap_or("My Drive")
            );

            let outcomes = sync_courses(
                &canvas,
                &drive,
                &course_ids,
                folder_id.as_deref(),
                |idx, total, file, result| match result {
                    Ok(uploaded) => println!(
                        "[{}/{}] {} / {}... OK ({}, {})",
                        idx,
                        total,
                        file.module_name,
                        file.title,
                        uploaded.drive_id,
                        format_size(uploaded.size as u64)
                    ),
                    Err(e) => {
                        println!("[{}/{}] {} / {}... FAILED", idx, total, file.module_name, file.title);
                        eprintln!("  Error: {}", e);
                    }
                },
            )
            .await;

            let mut failures = 0;
            println!();
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(report) => {
                        failures += report.failed.len();
                        println!(
                            "Course {}: {} uploaded ({}), {} failed",
                            outcome.course_id,
                            report.uploaded.len(),
                            format_size(report.bytes_uploaded() as u64),
                            report.failed.len()
                        );
                    }
                    Err(e) => {
                        failures += 1;
                        println!("Course {}: FAILED ({})", outcome.course_id, e);
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{} transfer(s) failed", failures);
            }
            println!("Done.");
        }
    }

    Ok(())
}

fn course_arg(input: &str) -> Result<u64> {
    parse_course_id(input).with_context(|| format!("Invalid course ID or URL: {}", input))
}

/// Prompt for a destination folder. `None` means the Drive root.
async fn select_folder(drive: &DriveClient) -> Result<Option<String>> {
    let folders = drive.list_folders().await.context("Failed to list folders")?;
    if folders.is_empty() {
        println!("No folders found. Files will be uploaded to the Drive root.");
        return Ok(None);
    }

    println!("0. Root folder (My Drive)");
    for (i, folder) in folders.iter().enumerate() {
        println!("{}. {}", i + 1, folder.name);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("Select folder (0-{}):", folders.len());
        let line = lines
            .next_line()
            .await?
            .context("No folder selected")?;

        match parse_selection(&line, folders.len()) {
            Some(Some(idx)) => {
                println!("Selected folder: {}", folders[idx].name);
                return Ok(Some(folders[idx].id.clone()));
            }
            Some(None) => return Ok(None),
            None => println!("Invalid selection. Please try again."),
        }
    }
}

/// Parse a menu choice: `Some(None)` for root, `Some(Some(i))` for folder `i`.
fn parse_selection(input: &str, count: usize) -> Option<Option<usize>> {
    match input.trim().parse::<usize>().ok()? {
        0 => Some(None),
        n if n <= count => Some(Some(n - 1)),
        _ => None,
    }
}

fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("0", 3), Some(None));
        assert_eq!(parse_selection(" 2 ", 3), Some(Some(1)));
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("abc", 3), None);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }

    #[test]
    fn test_cli_parses_sync() {
        let cli = Cli::try_parse_from([
            "canvas_drive",
            "--canvas-token",
            "t",
            "sync",
            "213007",
            "--folder",
            "https://drive.google.com/drive/folders/abc",
        ])
        .unwrap();
        match &cli.command {
            Commands::Sync { courses, folder, root } => {
                assert_eq!(courses, &vec!["213007".to_string()]);
                assert!(folder.is_some());
                assert!(!root);
            }
            _ => panic!("expected sync"),
        }
        assert!(cli.config().is_ok());
    }

    #[test]
    fn test_timeout_defaults_to_config_default() {
        let cli = Cli::try_parse_from(["canvas_drive", "--canvas-token", "t", "courses"]).unwrap();
        if std::env::var_os("CANVAS_TIMEOUT_SECS").is_none() {
            assert_eq!(cli.timeout, DEFAULT_TIMEOUT.as_secs());
        }
        assert_eq!(cli.config().unwrap().timeout(), Duration::from_secs(cli.timeout));
    }

    #[test]
    fn test_sync_folder_conflicts_with_root() {
        let parsed = Cli::try_parse_from([
            "canvas_drive",
            "sync",
            "1",
            "--folder",
            "abc",
            "--root",
        ]);
        assert!(parsed.is_err());
    }
}
