//! FFmpeg filter graphs for the vertical output format.

use std::path::Path;

use vshort_models::EditingStyle;

/// Output frame width.
pub const OUTPUT_WIDTH: u32 = 1080;
/// Output frame height.
pub const OUTPUT_HEIGHT: u32 = 1920;

/// Fill the 9:16 frame and crop the overflow.
pub const FILTER_DYNAMIC: &str =
    "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1";

/// Blurred fill behind the full frame, slightly enlarged.
pub const FILTER_MINIMAL: &str = concat!(
    "split=2[bg][fg];",
    "[bg]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,gblur=sigma=50[bgb];",
    "[fg]scale=1296:-2,crop='min(iw,1080)':'min(ih,1920)'[fgs];",
    "[bgb][fgs]overlay=(W-w)/2:(H-h)/2,setsar=1"
);

/// Oversized crop with contrast and sharpening.
pub const FILTER_DRAMATIC: &str = concat!(
    "scale=1296:2304:force_original_aspect_ratio=increase,crop=1080:1920,",
    "eq=contrast=1.15:saturation=1.1:brightness=-0.02,",
    "unsharp=5:5:1.0:5:5:0.0,setsar=1"
);

/// Filter chain for an editing style, without input/output labels.
pub fn build_style_filter(style: EditingStyle) -> &'static str {
    match style {
        EditingStyle::Dynamic => FILTER_DYNAMIC,
        EditingStyle::Minimal => FILTER_MINIMAL,
        EditingStyle::Dramatic => FILTER_DRAMATIC,
    }
}

/// Escape a path for use inside a filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\\\\\")
        .replace(':', "\\\\:")
        .replace('\'', "\\\\\\'")
        .replace(',', "\\,")
        .replace('[', "\\[")
        .replace(']', "\\]")
}

/// Burn-in filter for an ASS file.
pub fn subtitles_filter(ass_path: &Path) -> String {
    format!("subtitles={}", escape_filter_path(ass_path))
}

/// Video part of the composition graph, reading `[0:v]` and producing `[v]`.
pub fn video_graph(style: EditingStyle, subtitles: Option<&Path>) -> String {
    let mut graph = format!("[0:v]{}", build_style_filter(style));
    if let Some(ass) = subtitles {
        graph.push(',');
        graph.push_str(&subtitles_filter(ass));
    }
    graph.push_str("[v]");
    graph
}

/// Mix a voice stream with a looping music stream at `music_volume`, producing `[a]`.
///
/// The mix lasts as long as the voice stream.
pub fn music_mix_graph(voice: &str, music: &str, music_volume: f64) -> String {
    format!(
        "[{voice}]volume=1.0[a0];[{music}]volume={vol:.2}[a1];\
         [a0][a1]amix=inputs=2:duration=first:dropout_transition=2:normalize=0[a]",
        voice = voice,
        music = music,
        vol = music_volume.clamp(0.0, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_filters_target_vertical_frame() {
        for style in EditingStyle::ALL {
            assert!(build_style_filter(*style).contains("1080:1920"));
        }
        assert!(FILTER_MINIMAL.contains("gblur"));
        assert!(FILTER_DRAMATIC.contains("unsharp"));
    }

    #[test]
    fn test_video_graph_with_subtitles() {
        let graph = video_graph(EditingStyle::Dynamic, Some(Path::new("/tmp/s.ass")));
        assert!(graph.starts_with("[0:v]scale="));
        assert!(graph.contains("subtitles=/tmp/s.ass"));
        assert!(graph.ends_with("[v]"));
    }

    #[test]
    fn test_video_graph_without_subtitles() {
        let graph = video_graph(EditingStyle::Minimal, None);
        assert!(!graph.contains("subtitles"));
        assert!(graph.ends_with("[v]"));
    }

    #[test]
    fn test_escape_filter_path() {
        let escaped = escape_filter_path(Path::new("C:/dir,1/s.ass"));
        assert!(escaped.contains("\\\\:"));
        assert!(escaped.contains("\\,"));
    }

    #[test]
    fn test_music_mix_graph() {
        let graph = music_mix_graph("1:a", "2:a", 0.1);
        assert!(graph.contains("[2:a]volume=0.10[a1]"));
        assert!(graph.contains("duration=first"));
        assert!(graph.ends_with("[a]"));
    }
}
