use std::path::{Path, PathBuf};

/// Форматирует размер в байтах в человеко-читаемый вид.
///
/// # Arguments
///
/// * `size_bytes` - Размер в байтах
///
/// # Returns
///
/// Строка вида "1.50 MB", "0B" для нуля.
///
/// # Example
///
/// ```
/// use snexus::core::utils::format_size;
///
/// assert_eq!(format_size(0), "0B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}

/// Экранирует специальные символы в имени файла.
///
/// Заменяет разделители путей, зарезервированные символы Windows и
/// управляющие символы, чтобы имя можно было безопасно использовать
/// в любой файловой системе.
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "file".to_string()
    } else if result.len() > 200 {
        result.chars().take(200).collect()
    } else {
        result.to_string()
    }
}

/// Basic URL validation — only http(s) links are accepted from users
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Media platform a user link points at
///
/// Used to route a URL to the right download adapter and to label
/// songs/history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Spotify,
    AppleMusic,
    SoundCloud,
    Youtube,
    Instagram,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::AppleMusic => "apple_music",
            Platform::SoundCloud => "soundcloud",
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Other => "other",
        }
    }
}

/// Extract platform from a URL by hostname substring, mirroring the
/// services the bot advertises
pub fn extract_platform_from_url(url: &str) -> Platform {
    let url = url.to_lowercase();

    if url.contains("spotify.com") {
        Platform::Spotify
    } else if url.contains("music.apple.com") {
        Platform::AppleMusic
    } else if url.contains("soundcloud.com") {
        Platform::SoundCloud
    } else if url.contains("youtube.com") || url.contains("youtu.be") {
        Platform::Youtube
    } else if url.contains("instagram.com") {
        Platform::Instagram
    } else {
        Platform::Other
    }
}

/// Check if URL points at a playlist rather than a single item
///
/// Each platform spells "playlist" differently; SoundCloud calls them sets.
pub fn is_playlist_url(url: &str) -> bool {
    let url = url.to_lowercase();

    match extract_platform_from_url(&url) {
        Platform::Spotify | Platform::AppleMusic => url.contains("playlist"),
        Platform::SoundCloud => url.contains("/sets/"),
        Platform::Youtube => url.contains("playlist") || url.contains("list="),
        _ => false,
    }
}

/// Create (if needed) and return the per-user download directory
///
/// # Arguments
///
/// * `base_dir` - Root download folder from config
/// * `user_id` - Telegram user id
pub fn create_user_download_dir(base_dir: &str, user_id: i64) -> std::io::Result<PathBuf> {
    let user_dir = Path::new(base_dir).join(format!("user_{}", user_id));
    std::fs::create_dir_all(&user_dir)?;
    Ok(user_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size_zero() {
        assert_eq!(format_size(0), "0B");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.00 GB");
    }

    #[test]
    fn test_escape_filename_reserved_chars() {
        assert_eq!(escape_filename("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(escape_filename("say \"hi\""), "say 'hi'");
    }

    #[test]
    fn test_escape_filename_empty_becomes_placeholder() {
        assert_eq!(escape_filename("   "), "file");
        assert_eq!(escape_filename("..."), "file");
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://open.spotify.com/track/x"));
        assert!(is_valid_url("http://example.com"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("just text"));
    }

    #[test]
    fn test_extract_platform() {
        assert_eq!(
            extract_platform_from_url("https://open.spotify.com/track/abc"),
            Platform::Spotify
        );
        assert_eq!(
            extract_platform_from_url("https://music.apple.com/us/album/x"),
            Platform::AppleMusic
        );
        assert_eq!(
            extract_platform_from_url("https://soundcloud.com/artist/track"),
            Platform::SoundCloud
        );
        assert_eq!(extract_platform_from_url("https://youtu.be/abc"), Platform::Youtube);
        assert_eq!(
            extract_platform_from_url("https://www.instagram.com/reel/abc/"),
            Platform::Instagram
        );
        assert_eq!(extract_platform_from_url("https://example.com/x"), Platform::Other);
    }

    #[test]
    fn test_is_playlist_url() {
        assert!(is_playlist_url("https://open.spotify.com/playlist/abc"));
        assert!(is_playlist_url("https://soundcloud.com/artist/sets/mix"));
        assert!(is_playlist_url(
            "https://www.youtube.com/watch?v=abc&list=PL123"
        ));
        assert!(!is_playlist_url("https://open.spotify.com/track/abc"));
        assert!(!is_playlist_url("https://www.instagram.com/reel/abc/"));
    }
}
