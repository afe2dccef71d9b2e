use anyhow::Result;

/// Playlist helpers for station urls that point at .pls/.m3u files instead of audio.
pub struct ParsingUtils;

impl ParsingUtils {
    /// Parse a .pls playlist to extract the first stream URL
    pub fn parse_pls_content(content: &str) -> Result<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| line.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("file")))
            .filter_map(|line| line.split_once('='))
            .map(|(_, url)| url.trim())
            .find(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No stream URL found in .pls file"))
    }

    /// Parse an .m3u/.m3u8 playlist: the first line that is not a comment
    pub fn parse_m3u_content(content: &str) -> Result<String> {
        content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No stream URL found in m3u playlist"))
    }

    pub fn is_pls_url(url: &str) -> bool {
        path_of(url).ends_with(".pls")
    }

    pub fn is_m3u_url(url: &str) -> bool {
        let path = path_of(url);
        path.ends_with(".m3u") || path.ends_with(".m3u8")
    }

    pub fn is_playlist_url(url: &str) -> bool {
        Self::is_pls_url(url) || Self::is_m3u_url(url)
    }

    /// Picks the parser from the playlist url's extension.
    pub fn first_stream_in_playlist(url: &str, content: &str) -> Result<String> {
        if Self::is_pls_url(url) {
            Self::parse_pls_content(content)
        } else if Self::is_m3u_url(url) {
            Self::parse_m3u_content(content)
        } else {
            anyhow::bail!("Not a playlist url: {}", url)
        }
    }
}

// Lowercased url without query string or fragment.
fn path_of(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_ascii_lowercase()
}
