//! ASS and SRT subtitle rendering.

use std::fmt::Write as _;
use std::path::Path;

use vshort_models::{format_srt_time, SubtitleCue};

use crate::error::MediaResult;
use crate::filters::{OUTPUT_HEIGHT, OUTPUT_WIDTH};

const FONT_NAME: &str = "Montserrat Bold";
const FONT_SIZE: u32 = 78;

fn ass_header(width: u32, height: u32) -> String {
    format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {width}\n\
         PlayResY: {height}\n\
         WrapStyle: 2\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
         Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, \
         Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,{FONT_NAME},{FONT_SIZE},&H00FFFFFF,&H000000FF,&H00000000,&H80000000,\
         -1,0,0,0,100,100,0,0,1,4,2,2,60,60,200,1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"
    )
}

/// Keep ASS override syntax out of cue text.
fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "")
        .replace(['{', '}'], "")
        .replace('\n', "\\N")
}

/// Render cues as an ASS script for the vertical frame.
pub fn render_ass(cues: &[SubtitleCue]) -> String {
    let mut out = ass_header(OUTPUT_WIDTH, OUTPUT_HEIGHT);
    let x = OUTPUT_WIDTH / 2;
    let y = (OUTPUT_HEIGHT as f64 * 0.85).round() as u32;

    for cue in cues {
        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},Default,,0,0,0,,{{\\pos({},{})\\an2}}{}",
            cue.ass_start(),
            cue.ass_end(),
            x,
            y,
            escape_ass_text(&cue.text.to_uppercase())
        );
    }
    out
}

/// Render cues as SRT.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (idx, cue) in cues.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            idx + 1,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text
        );
    }
    out
}

/// Write cues to an ASS file.
pub async fn write_ass(path: impl AsRef<Path>, cues: &[SubtitleCue]) -> MediaResult<()> {
    tokio::fs::write(path.as_ref(), render_ass(cues)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues() -> Vec<SubtitleCue> {
        vec![
            SubtitleCue::new(0.5, 2.0, "HELLO WORLD"),
            SubtitleCue::new(2.0, 3.25, "second line"),
        ]
    }

    #[test]
    fn test_render_ass() {
        let ass = render_ass(&cues());
        assert!(ass.starts_with("[Script Info]"));
        assert!(ass.contains("PlayResX: 1080"));
        assert!(ass.contains("PlayResY: 1920"));
        assert!(ass.contains(
            "Dialogue: 0,0:00:00.50,0:00:02.00,Default,,0,0,0,,{\\pos(540,1632)\\an2}HELLO WORLD"
        ));
        assert!(ass.contains("SECOND LINE"));
    }

    #[test]
    fn test_ass_text_cannot_inject_overrides() {
        let ass = render_ass(&[SubtitleCue::new(0.0, 1.0, "a{\\b1}b")]);
        assert!(ass.contains("\\an2}AB1B"));
    }

    #[test]
    fn test_render_srt() {
        let srt = render_srt(&cues());
        assert!(srt.starts_with("1\n00:00:00,500 --> 00:00:02,000\nHELLO WORLD\n\n2\n"));
    }

    #[tokio::test]
    async fn test_write_ass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.ass");
        write_ass(&path, &cues()).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.matches("Dialogue:").count(), 2);
    }
}
