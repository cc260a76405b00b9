//! Parsing of user-supplied identifiers: Drive folder links and Canvas course links.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::DriveError;

static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

static DRIVE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Matches `.../courses/<id>` in both site and API URLs.
static COURSE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/\s]+(?:/api/v1)?/courses/(\d+)(?:[/?#].*)?$")
        .expect("Invalid course URL regex")
});

/// Extract a Google Drive folder ID from a folder link or validate a raw ID.
///
/// Supported forms:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use canvas_drive::ids::extract_folder_id;
///
/// let id = extract_folder_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_folder_id(url_or_id: &str) -> Result<String, DriveError> {
    let trimmed = url_or_id.trim();

    for regex in [&*FOLDER_URL_REGEX, &*OPEN_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if !trimmed.contains("://") && DRIVE_ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Extract a Canvas course ID from a course URL or a bare number.
///
/// ```
/// use canvas_drive::ids::parse_course_id;
///
/// assert_eq!(parse_course_id("https://canvas.example.edu/courses/213007/modules"), Some(213007));
/// assert_eq!(parse_course_id("213007"), Some(213007));
/// assert_eq!(parse_course_id("abc"), None);
/// ```
pub fn parse_course_id(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if let Ok(id) = trimmed.parse::<u64>() {
        return Some(id);
    }
    COURSE_URL_REGEX
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_url_with_user() {
        let url = "https://drive.google.com/drive/u/2/folders/1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_file_links_are_not_folders() {
        assert!(extract_folder_id("https://drive.google.com/file/d/1abc/view").is_err());
    }

    #[test]
    fn test_blank_folder_rejected() {
        assert!(extract_folder_id("").is_err());
        assert!(extract_folder_id("   ").is_err());
    }

    #[test]
    fn test_course_api_url() {
        assert_eq!(
            parse_course_id("https://canvas.test/api/v1/courses/42"),
            Some(42)
        );
    }

    #[test]
    fn test_course_url_rejects_other_paths() {
        assert_eq!(parse_course_id("https://canvas.test/users/42"), None);
        assert_eq!(parse_course_id("-3"), None);
    }
}
