use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Title used when the source reports none or sanitizing leaves nothing
pub const FALLBACK_TITLE: &str = "download";

static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\p{Cc}]"#).unwrap());

/// Strip characters that are illegal in file names (`< > : " / \ | ? *` and control characters)
pub fn sanitize_title(title: &str) -> String {
    let stripped = ILLEGAL_FILENAME_CHARS.replace_all(title, "");
    let trimmed = stripped.trim();

    // Limit length to 200 characters
    let limited: String = trimmed.chars().take(200).collect();

    if limited.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        limited
    }
}

/// Get file extension from path, lowercased
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// MIME type for the extensions yt-dlp may leave behind
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My <Video>: \"Test\"?"), "My Video Test");
        assert_eq!(sanitize_title("a/b\\c|d*e"), "abcde");
        assert_eq!(sanitize_title("  spaced  "), "spaced");
        assert_eq!(sanitize_title("Xin chào thế giới"), "Xin chào thế giới");
    }

    #[test]
    fn test_sanitize_title_never_leaves_illegal_chars() {
        let titles = [
            "<<<>>>",
            "C:\\Users\\me",
            "what?*|now",
            "line\nbreak\ttab",
            "\"quoted\" / slashed",
        ];

        for title in titles {
            let clean = sanitize_title(title);
            assert!(
                !clean.chars().any(|c| "<>:\"/\\|?*".contains(c) || c.is_control()),
                "{title:?} sanitized to {clean:?}"
            );
            assert!(!clean.is_empty());
        }
    }

    #[test]
    fn test_sanitize_title_fallback() {
        assert_eq!(sanitize_title(""), FALLBACK_TITLE);
        assert_eq!(sanitize_title("???"), FALLBACK_TITLE);
    }

    #[test]
    fn test_sanitize_title_limits_length_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(sanitize_title(&long).chars().count(), 200);
    }

    #[test]
    fn test_file_extension_and_content_type() {
        assert_eq!(get_file_extension(Path::new("downloads/abc.MP3")), Some("mp3".to_string()));
        assert_eq!(get_file_extension(Path::new("downloads/abc")), None);
        assert_eq!(content_type_for_extension("mp3"), "audio/mpeg");
        assert_eq!(content_type_for_extension("opus"), "application/octet-stream");
    }
}
