//! Extended M3U rendering

use crate::models::ResolvedStream;
use std::fmt::Write;

/// First line of every playlist
pub const M3U_HEADER: &str = "#EXTM3U";

/// MIME type the playlist is served with
pub const M3U_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// Playlist published before the first successful cycle
pub fn empty_playlist() -> String {
    format!("{}\n", M3U_HEADER)
}

/// Renders the streams in the given order
///
/// Every stream gives an `#EXTINF` line followed by its URL. Streams sharing
/// a URL are all kept.
pub fn build_playlist(streams: &[ResolvedStream]) -> String {
    let mut out = empty_playlist();
    for stream in streams {
        // write! on a String cannot fail
        let _ = writeln!(
            out,
            "#EXTINF:-1 group-title=\"{}\", {}",
            stream.group_label, stream.display_name
        );
        let _ = writeln!(out, "{}", stream.media_url);
    }
    out
}
