pub mod rewriter;

pub use rewriter::{LineKind, RewriteReport, classify_line, rewrite_playlist};

/// Media types that mark a response as an HLS playlist.
const PLAYLIST_CONTENT_TYPES: &[&str] = &["application/vnd.apple.mpegurl", "application/x-mpegurl"];

/// True when a `Content-Type` value names an M3U8 playlist.
///
/// Matching is case-insensitive and tolerates parameters such as
/// `; charset=utf-8`.
pub fn is_playlist_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    PLAYLIST_CONTENT_TYPES
        .iter()
        .any(|ct| content_type.contains(ct))
}
