//! M3U8 URI rewriting.
//!
//! Every URI line of a playlist is resolved against the playlist's own URL
//! and replaced by a link back through the proxy (`<proxy_base>?url=<encoded>`),
//! so that variant playlists and segments are fetched through the same access
//! gate and header policy as the playlist itself.
//!
//! The rewrite is line-oriented and never re-serializes the playlist: tags the
//! rewriter does not understand survive byte-for-byte, including `\r` from
//! CRLF files and the trailing newline.

use tracing::{debug, warn};
use url::Url;

use crate::metrics;

/// Variant stream tag. Its attributes describe the URI on the next line.
pub const STREAM_INF_PREFIX: &str = "#EXT-X-STREAM-INF:";

/// Classification of one playlist line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// `#EXT-X-STREAM-INF:` tag carrying metadata for the following URI line
    Directive,
    /// Blank line, comment, or any other tag
    CommentOrBlank,
    /// Segment or playlist reference
    Uri,
}

/// Classify a single line (without its `\n` terminator).
pub fn classify_line(line: &str) -> LineKind {
    if line.starts_with(STREAM_INF_PREFIX) {
        LineKind::Directive
    } else if line.trim().is_empty() || line.starts_with('#') {
        LineKind::CommentOrBlank
    } else {
        LineKind::Uri
    }
}

/// Counters gathered during a rewrite
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// URI lines replaced with proxy links
    pub rewritten: usize,
    /// URI lines that failed to resolve and were left untouched
    pub unresolved: usize,
}

/// Rewrite every URI line of `playlist` to route through `proxy_base`.
///
/// `target` is the URL the playlist was fetched from; relative lines resolve
/// against it. `proxy_base` is the proxy's own `scheme://host/path` with no
/// query string.
///
/// Not idempotent: feeding the output back in encodes the proxy links again.
pub fn rewrite_playlist(playlist: &str, target: &Url, proxy_base: &str) -> (String, RewriteReport) {
    let mut report = RewriteReport::default();

    let rewritten = playlist
        .split('\n')
        .enumerate()
        .map(|(index, line)| match classify_line(line) {
            LineKind::Directive | LineKind::CommentOrBlank => line.to_string(),
            LineKind::Uri => match proxy_link(line, target, proxy_base) {
                Ok(link) => {
                    report.rewritten += 1;
                    link
                }
                Err(e) => {
                    warn!(
                        "Failed to resolve playlist line {} ({:?}) against {}: {}",
                        index + 1,
                        line,
                        target,
                        e
                    );
                    metrics::record_rewrite_warning();
                    report.unresolved += 1;
                    line.to_string()
                }
            },
        })
        .collect::<Vec<_>>()
        .join("\n");

    debug!(
        "Rewrote playlist from {}: {} URIs rewritten, {} left unresolved",
        target, report.rewritten, report.unresolved
    );

    (rewritten, report)
}

/// Resolve `line` against `target` and wrap it in a proxy link.
fn proxy_link(line: &str, target: &Url, proxy_base: &str) -> Result<String, url::ParseError> {
    let resolved = target.join(line)?;
    Ok(format!(
        "{}?url={}",
        proxy_base,
        urlencoding::encode(&origin_path(&resolved))
    ))
}

/// `scheme://host[:port]/path[?query]`, dropping credentials and fragment.
fn origin_path(url: &Url) -> String {
    let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path());
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = "https://proxy.example/route";

    fn target() -> Url {
        Url::parse("https://origin.example/path/index.m3u8").unwrap()
    }

    fn rewrite(input: &str) -> String {
        rewrite_playlist(input, &target(), PROXY).0
    }

    // --- classification ---

    #[test]
    fn classifies_stream_inf_as_directive() {
        assert_eq!(
            classify_line("#EXT-X-STREAM-INF:BANDWIDTH=100"),
            LineKind::Directive
        );
    }

    #[test]
    fn classifies_tags_comments_and_blanks() {
        assert_eq!(classify_line("#EXTM3U"), LineKind::CommentOrBlank);
        assert_eq!(classify_line("#EXTINF:10.0,"), LineKind::CommentOrBlank);
        assert_eq!(classify_line("# just a comment"), LineKind::CommentOrBlank);
        assert_eq!(classify_line(""), LineKind::CommentOrBlank);
        assert_eq!(classify_line("   \t"), LineKind::CommentOrBlank);
        assert_eq!(classify_line("\r"), LineKind::CommentOrBlank);
    }

    #[test]
    fn classifies_uri_lines() {
        assert_eq!(classify_line("seg.ts"), LineKind::Uri);
        assert_eq!(classify_line("/abs/seg.ts"), LineKind::Uri);
        assert_eq!(classify_line("https://cdn.example/seg.ts"), LineKind::Uri);
        // Indented tags are not tags
        assert_eq!(classify_line("  #EXTINF:10,"), LineKind::Uri);
    }

    // --- rewriting ---

    #[test]
    fn rewrites_reference_playlist() {
        let input = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=100\nchunk1.ts\n/abs/chunk2.ts\nhttps://other.example/chunk3.ts\n";
        let expected = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=100\n\
            https://proxy.example/route?url=https%3A%2F%2Forigin.example%2Fpath%2Fchunk1.ts\n\
            https://proxy.example/route?url=https%3A%2F%2Forigin.example%2Fabs%2Fchunk2.ts\n\
            https://proxy.example/route?url=https%3A%2F%2Fother.example%2Fchunk3.ts\n";

        let (output, report) = rewrite_playlist(input, &target(), PROXY);
        assert_eq!(output, expected);
        assert_eq!(
            report,
            RewriteReport {
                rewritten: 3,
                unresolved: 0
            }
        );
    }

    #[test]
    fn keeps_query_and_non_default_port() {
        let target = Url::parse("http://origin.example:8080/live/index.m3u8?token=a").unwrap();
        let (output, _) = rewrite_playlist("seg1.ts?part=2", &target, PROXY);
        assert_eq!(
            output,
            "https://proxy.example/route?url=http%3A%2F%2Forigin.example%3A8080%2Flive%2Fseg1.ts%3Fpart%3D2"
        );
    }

    #[test]
    fn drops_fragment_and_credentials() {
        let (output, _) = rewrite_playlist("https://user:pw@cdn.example/a.ts#t=5", &target(), PROXY);
        assert_eq!(
            output,
            "https://proxy.example/route?url=https%3A%2F%2Fcdn.example%2Fa.ts"
        );
    }

    #[test]
    fn default_port_omitted() {
        let (output, _) = rewrite_playlist("https://cdn.example:443/a.ts", &target(), PROXY);
        assert_eq!(
            output,
            "https://proxy.example/route?url=https%3A%2F%2Fcdn.example%2Fa.ts"
        );
    }

    #[test]
    fn parent_relative_paths_resolve() {
        assert_eq!(
            rewrite("../other/seg.ts"),
            "https://proxy.example/route?url=https%3A%2F%2Forigin.example%2Fother%2Fseg.ts"
        );
    }

    #[test]
    fn protocol_relative_uri_takes_target_scheme() {
        assert_eq!(
            rewrite("//cdn.example/seg.ts"),
            "https://proxy.example/route?url=https%3A%2F%2Fcdn.example%2Fseg.ts"
        );
    }

    #[test]
    fn tags_with_uri_attributes_untouched() {
        let input = "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXT-X-MAP:URI=\"init.mp4\"";
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn preserves_crlf_and_blank_lines() {
        let input = "#EXTM3U\r\n\r\n#EXTINF:4,\r\nseg.ts\r\n";
        let output = rewrite(input);
        assert_eq!(
            output,
            "#EXTM3U\r\n\r\n#EXTINF:4,\r\nhttps://proxy.example/route?url=https%3A%2F%2Forigin.example%2Fpath%2Fseg.ts\n"
        );
    }

    #[test]
    fn no_trailing_newline_stays_without() {
        let output = rewrite("#EXTM3U\nseg.ts");
        assert!(!output.ends_with('\n'));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn empty_playlist_unchanged() {
        assert_eq!(rewrite(""), "");
        assert_eq!(rewrite("\n\n"), "\n\n");
    }

    #[test]
    fn unresolvable_line_passed_through() {
        let input = "#EXTM3U\nhttp://[not-an-ip]/seg.ts\nseg2.ts";
        let (output, report) = rewrite_playlist(input, &target(), PROXY);

        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "http://[not-an-ip]/seg.ts");
        assert_eq!(
            lines[2],
            "https://proxy.example/route?url=https%3A%2F%2Forigin.example%2Fpath%2Fseg2.ts"
        );
        assert_eq!(
            report,
            RewriteReport {
                rewritten: 1,
                unresolved: 1
            }
        );
    }

    #[test]
    fn rewriting_twice_double_encodes() {
        let once = rewrite("chunk1.ts");
        let twice = rewrite(&once);

        assert_ne!(once, twice);
        assert!(twice.contains("%253A"), "second pass should re-encode: {}", twice);
    }

    #[test]
    fn line_count_preserved() {
        let input = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10,\na.ts\n#EXTINF:10,\nb.ts\n#EXT-X-ENDLIST\n";
        assert_eq!(
            rewrite(input).split('\n').count(),
            input.split('\n').count()
        );
    }
}
