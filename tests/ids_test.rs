//! Tests for folder and course identifier parsing.

use canvas_drive::ids::{extract_folder_id, parse_course_id};
use canvas_drive::DriveError;

mod folder_links {
    use super::*;

    #[test]
    fn basic_folder_url() {
        let url = "https://drive.google.com/drive/folders/1abc123XYZ-_def456";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ-_def456");
    }

    #[test]
    fn folder_url_with_user_0() {
        let url = "https://drive.google.com/drive/u/0/folders/1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn folder_url_http() {
        let url = "http://drive.google.com/drive/folders/1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn folder_url_with_query_params() {
        let url = "https://drive.google.com/drive/folders/1abc123XYZ?usp=sharing";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn open_link() {
        let url = "https://drive.google.com/open?id=1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let url = "  https://drive.google.com/drive/folders/1abc123XYZ \n";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }
}

mod raw_ids {
    use super::*;

    #[test]
    fn plain_id() {
        assert_eq!(extract_folder_id("1abc123XYZ_-def").unwrap(), "1abc123XYZ_-def");
    }

    #[test]
    fn id_with_spaces_rejected() {
        assert!(matches!(
            extract_folder_id("not a folder"),
            Err(DriveError::InvalidUrlOrId(_))
        ));
    }

    #[test]
    fn other_hosts_rejected() {
        assert!(extract_folder_id("https://example.com/drive/folders/abc").is_err());
    }

    #[test]
    fn file_link_rejected() {
        assert!(extract_folder_id("https://drive.google.com/file/d/1abc123XYZ/view").is_err());
    }
}

mod course_ids {
    use super::*;

    #[test]
    fn bare_number() {
        assert_eq!(parse_course_id("213007"), Some(213007));
        assert_eq!(parse_course_id(" 7 "), Some(7));
    }

    #[test]
    fn site_urls() {
        assert_eq!(
            parse_course_id("https://canvas.nus.edu.sg/courses/213007"),
            Some(213007)
        );
        assert_eq!(
            parse_course_id("https://canvas.nus.edu.sg/courses/213007/modules#module_5"),
            Some(213007)
        );
        assert_eq!(
            parse_course_id("https://canvas.nus.edu.sg/courses/213007?view=home"),
            Some(213007)
        );
    }

    #[test]
    fn rejects_non_course_input() {
        assert_eq!(parse_course_id(""), None);
        assert_eq!(parse_course_id("course 5"), None);
        assert_eq!(parse_course_id("https://canvas.nus.edu.sg/courses/abc"), None);
        assert_eq!(parse_course_id("https://canvas.nus.edu.sg/courses/12abc"), None);
    }
}
