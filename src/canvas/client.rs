//! Canvas REST API client.

use futures::{stream, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::{Origin, Url};

use super::models::{
    ApiErrorResponse, Assignment, AssignmentResponse, Course, FileContent, FileMetadata, Module,
    ModuleItem, ModuleResponse, Page, PageResponse, Quiz, QuizResponse,
};
use super::pagination::{decode_page, next_link};
use crate::config::Config;
use crate::error::{CanvasError, Result};

/// Client for the Canvas LMS REST API.
///
/// Every list accessor follows pagination to the end and returns the complete
/// result in server order, or the first error encountered.
pub struct CanvasClient {
    base_url: String,
    origin: Option<Origin>,
    token: String,
    page_size: u32,
    concurrency: usize,
    http: Client,
}

impl CanvasClient {
    /// Create a new CanvasClient from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CanvasError::Transient {
                resource: config.canvas_url().to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.canvas_url().to_string(),
            origin: Url::parse(config.canvas_url()).ok().map(|u| u.origin()),
            token: config.api_token().to_string(),
            page_size: config.page_size(),
            concurrency: config.concurrency(),
            http,
        })
    }

    /// List the user's active courses, in server order.
    pub async fn get_active_courses(&self) -> Result<Vec<Course>> {
        let courses: Vec<Course> = self
            .get_paginated("/courses", &[("enrollment_state", "active")])
            .await?;
        let total = courses.len();
        let active: Vec<Course> = courses.into_iter().filter(Course::is_active).collect();
        info!(total, active = active.len(), "fetched courses");
        Ok(active)
    }

    /// Get a single course.
    pub async fn get_course(&self, course_id: u64) -> Result<Course> {
        self.get_one(&format!("/courses/{}", course_id)).await
    }

    /// List a course's modules, each with its full item list.
    ///
    /// Items are requested inline; modules Canvas returns without inline items
    /// get their items fetched separately.
    pub async fn get_course_modules(&self, course_id: u64) -> Result<Vec<Module>> {
        let path = format!("/courses/{}/modules", course_id);
        let modules: Vec<ModuleResponse> =
            self.get_paginated(&path, &[("include[]", "items")]).await?;

        let modules: Vec<Module> = stream::iter(modules)
            .map(|module| async move {
                let items = match module.items {
                    Some(items) => items,
                    None => self.get_module_items(course_id, module.id).await?,
                };
                Ok::<_, CanvasError>(Module {
                    id: module.id,
                    course_id,
                    name: module.name,
                    position: module.position,
                    items,
                })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        info!(course_id, modules = modules.len(), "fetched modules");
        Ok(modules)
    }

    /// List the items of one module.
    pub async fn get_module_items(&self, course_id: u64, module_id: u64) -> Result<Vec<ModuleItem>> {
        let path = format!("/courses/{}/modules/{}/items", course_id, module_id);
        self.get_paginated(&path, &[]).await
    }

    /// Fetch module listings for several courses concurrently.
    ///
    /// Results are returned in the order of `course_ids`; a failure for one
    /// course does not affect the others.
    pub async fn get_modules_for_courses(
        &self,
        course_ids: &[u64],
    ) -> Vec<(u64, Result<Vec<Module>>)> {
        stream::iter(course_ids.iter().copied())
            .map(|course_id| async move { (course_id, self.get_course_modules(course_id).await) })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// List a course's assignments.
    pub async fn get_assignments(&self, course_id: u64) -> Result<Vec<Assignment>> {
        let path = format!("/courses/{}/assignments", course_id);
        let raw: Vec<AssignmentResponse> = self.get_paginated(&path, &[]).await?;
        Ok(raw.into_iter().map(Assignment::from).collect())
    }

    /// List a course's quizzes.
    pub async fn get_quizzes(&self, course_id: u64) -> Result<Vec<Quiz>> {
        let path = format!("/courses/{}/quizzes", course_id);
        let raw: Vec<QuizResponse> = self.get_paginated(&path, &[]).await?;
        Ok(raw.into_iter().map(Quiz::from).collect())
    }

    /// Get a wiki page by its URL slug.
    pub async fn get_page(&self, course_id: u64, page_url: &str) -> Result<Page> {
        let path = format!("/courses/{}/pages/{}", course_id, page_url);
        let raw: PageResponse = self.get_one(&path).await?;
        Ok(raw.into())
    }

    /// Get file metadata, including the signed download URL.
    pub async fn get_file_metadata(&self, file_id: u64) -> Result<FileMetadata> {
        self.get_one(&format!("/files/{}", file_id)).await
    }

    /// Download a file's full content.
    ///
    /// Resolves the download URL from the file metadata, then fetches the
    /// whole body. Nothing is returned unless the body was read completely.
    pub async fn get_file_content(&self, file_id: u64) -> Result<FileContent> {
        let path = format!("/files/{}", file_id);
        let metadata = self.get_file_metadata(file_id).await?;
        let filename = metadata.preferred_name();

        let download_url = metadata
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                CanvasError::NotFound(format!("{} has no download URL (locked or hidden)", path))
            })?;

        let mut request = self.http.get(download_url);
        if self.is_canvas_url(download_url) {
            request = request.bearer_auth(&self.token);
        }
        let response = self.send(&path, request).await?;

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let announced = response.content_length();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CanvasError::transport(&path, e))?;

        if let Some(announced) = announced {
            if bytes.len() as u64 != announced {
                return Err(CanvasError::Transient {
                    resource: path,
                    reason: format!(
                        "download truncated: received {} of {} bytes",
                        bytes.len(),
                        announced
                    ),
                });
            }
        }
        if let Some(size) = metadata.size {
            if size != bytes.len() as u64 {
                warn!(file_id, expected = size, actual = bytes.len(), "file size differs from metadata");
            }
        }

        let content_type = metadata
            .content_type
            .filter(|t| !t.trim().is_empty())
            .or(header_type)
            .unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });

        debug!(file_id, bytes = bytes.len(), %content_type, "downloaded file");

        Ok(FileContent {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn is_canvas_url(&self, url: &str) -> bool {
        match (&self.origin, Url::parse(url)) {
            (Some(origin), Ok(target)) => *origin == target.origin(),
            _ => false,
        }
    }

    /// Send a request and map non-success statuses onto the error taxonomy.
    async fn send(&self, resource: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| CanvasError::transport(resource, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(resource, status = status.as_u16(), "request failed");

        Err(match status.as_u16() {
            401 | 403 => CanvasError::Auth {
                status: status.as_u16(),
                resource: resource.to_string(),
            },
            404 => CanvasError::NotFound(resource.to_string()),
            408 | 429 => CanvasError::Transient {
                resource: resource.to_string(),
                reason: format!("server returned {}", status),
            },
            _ if status.is_server_error() => CanvasError::Transient {
                resource: resource.to_string(),
                reason: format!("server returned {}", status),
            },
            code => CanvasError::Api {
                status: code,
                resource: resource.to_string(),
                message: error_message(&body),
            },
        })
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http.get(self.url(path)).bearer_auth(&self.token);
        let response = self.send(path, request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| CanvasError::transport(path, e))?;
        serde_json::from_str(&body).map_err(|e| CanvasError::malformed(path, e, &body))
    }

    /// Fetch every page of a list endpoint, concatenated in page order.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut pages = 0usize;
        let mut request = Some(
            self.http
                .get(self.url(path))
                .query(query)
                .query(&[("per_page", self.page_size)]),
        );

        while let Some(current) = request.take() {
            let response = self.send(path, current.bearer_auth(&self.token)).await?;
            let next = next_link(response.headers());
            if let Some(next) = next.as_deref() {
                if next == response.url().as_str() {
                    return Err(CanvasError::malformed(
                        path,
                        "next link points at the current page",
                        next,
                    ));
                }
                // The token only ever goes to the Canvas host.
                if !self.is_canvas_url(next) {
                    return Err(CanvasError::malformed(
                        path,
                        "next link leaves the Canvas host",
                        next,
                    ));
                }
            }

            let body = response
                .text()
                .await
                .map_err(|e| CanvasError::transport(path, e))?;
            let page: Vec<T> = decode_page(path, &body)?;
            pages += 1;
            debug!(resource = path, page = pages, items = page.len(), "fetched page");
            results.extend(page);

            request = next.map(|url| self.http.get(url));
        }

        Ok(results)
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.message())
        .unwrap_or_else(|| body.to_string())
}
