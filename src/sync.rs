//! Canvas to Drive transfer: gather file items from course modules, download
//! each one and hand it to a [`DriveSink`].

use tracing::{info, warn};

use crate::canvas::{CanvasClient, Module};
use crate::drive::DriveSink;
use crate::error::{CanvasError, SyncError};

/// A file referenced from a course module.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseFile {
    pub course_id: u64,
    pub module_name: String,
    pub title: String,
    pub file_id: u64,
}

/// A file that made it to Drive.
#[derive(Debug, Clone, PartialEq)]
pub struct Uploaded {
    pub title: String,
    pub filename: String,
    pub drive_id: String,
    pub size: usize,
}

/// A file that could not be transferred.
#[derive(Debug)]
pub struct Failed {
    pub title: String,
    pub file_id: u64,
    pub error: SyncError,
}

/// Per-file outcomes of a transfer run.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub uploaded: Vec<Uploaded>,
    pub failed: Vec<Failed>,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn bytes_uploaded(&self) -> usize {
        self.uploaded.iter().map(|u| u.size).sum()
    }
}

/// Outcome for one course. Module listing failures halt only that course.
#[derive(Debug)]
pub struct CourseOutcome {
    pub course_id: u64,
    pub result: Result<TransferReport, CanvasError>,
}

/// File items across modules, in module order then item order.
pub fn files_in_modules(modules: &[Module]) -> Vec<CourseFile> {
    modules
        .iter()
        .flat_map(|module| {
            module.files().map(move |(item, file_id)| CourseFile {
                course_id: module.course_id,
                module_name: module.name.clone(),
                title: item.title.clone(),
                file_id,
            })
        })
        .collect()
}

/// List every file item in a course's modules.
pub async fn collect_course_files(
    canvas: &CanvasClient,
    course_id: u64,
) -> Result<Vec<CourseFile>, CanvasError> {
    let modules = canvas.get_course_modules(course_id).await?;
    let files = files_in_modules(&modules);
    info!(course_id, modules = modules.len(), files = files.len(), "collected course files");
    Ok(files)
}

/// Download one file from Canvas and upload it.
pub async fn transfer_file(
    canvas: &CanvasClient,
    sink: &dyn DriveSink,
    file: &CourseFile,
    folder_id: Option<&str>,
) -> Result<Uploaded, SyncError> {
    let content = canvas.get_file_content(file.file_id).await?;
    let filename = content.filename.clone();
    let size = content.len();
    let drive_id = sink.upload(content, folder_id).await?;
    Ok(Uploaded {
        title: file.title.clone(),
        filename,
        drive_id,
        size,
    })
}

/// Transfer files one after another, continuing past failures.
///
/// `on_file` is called after each file with its 1-based index, the total and
/// the outcome.
pub async fn transfer_files<F>(
    canvas: &CanvasClient,
    sink: &dyn DriveSink,
    files: &[CourseFile],
    folder_id: Option<&str>,
    mut on_file: F,
) -> TransferReport
where
    F: FnMut(usize, usize, &CourseFile, &Result<Uploaded, SyncError>),
{
    let mut report = TransferReport::default();

    for (idx, file) in files.iter().enumerate() {
        let result = transfer_file(canvas, sink, file, folder_id).await;
        on_file(idx + 1, files.len(), file, &result);

        match result {
            Ok(uploaded) => report.uploaded.push(uploaded),
            Err(error) => {
                warn!(file_id = file.file_id, title = %file.title, error = %error, "transfer failed");
                report.failed.push(Failed {
                    title: file.title.clone(),
                    file_id: file.file_id,
                    error,
                });
            }
        }
    }

    info!(
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        "transfer finished"
    );
    report
}

/// Transfer the module files of several courses into one folder.
///
/// Module listings are fetched concurrently; files are transferred course by
/// course. A course whose listing fails is reported and skipped.
pub async fn sync_courses<F>(
    canvas: &CanvasClient,
    sink: &dyn DriveSink,
    course_ids: &[u64],
    folder_id: Option<&str>,
    mut on_file: F,
) -> Vec<CourseOutcome>
where
    F: FnMut(usize, usize, &CourseFile, &Result<Uploaded, SyncError>),
{
    let listings = canvas.get_modules_for_courses(course_ids).await;
    let mut outcomes = Vec::with_capacity(listings.len());

    for (course_id, modules) in listings {
        let result = match modules {
            Ok(modules) => {
                let files = files_in_modules(&modules);
                Ok(transfer_files(canvas, sink, &files, folder_id, &mut on_file).await)
            }
            Err(e) => {
                warn!(course_id, error = %e, "skipping course");
                Err(e)
            }
        };
        outcomes.push(CourseOutcome { course_id, result });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_files_in_modules_keeps_order() {
        let modules = vec![
            Module {
                id: 1,
                course_id: 7,
                name: "Week 1".to_string(),
                position: Some(1),
                items: serde_json::from_value(json!([
                    {"id": 10, "type": "File", "content_id": 100, "title": "a.pdf"},
                    {"id": 11, "type": "Page", "page_url": "notes", "title": "Notes"}
                ]))
                .unwrap(),
            },
            Module {
                id: 2,
                course_id: 7,
                name: "Week 2".to_string(),
                position: Some(2),
                items: serde_json::from_value(json!([
                    {"id": 12, "type": "File", "content_id": 101, "title": "b.pdf"}
                ]))
                .unwrap(),
            },
        ];

        let files = files_in_modules(&modules);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].module_name, "Week 1");
        assert_eq!(files[0].file_id, 100);
        assert_eq!(files[1].title, "b.pdf");
        assert_eq!(files[1].course_id, 7);
    }

    #[test]
    fn test_report_totals() {
        let mut report = TransferReport::default();
        report.uploaded.push(Uploaded {
            title: "a".to_string(),
            filename: "a.pdf".to_string(),
            drive_id: "d1".to_string(),
            size: 10,
        });
        report.failed.push(Failed {
            title: "b".to_string(),
            file_id: 2,
            error: SyncError::Canvas(CanvasError::NotFound("/files/2".to_string())),
        });
        assert_eq!(report.total(), 2);
        assert_eq!(report.bytes_uploaded(), 10);
    }
}
