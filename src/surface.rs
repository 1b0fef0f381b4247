//! Where frames end up

use anyhow::{Context, Result};
use std::io::Write;

use crate::playback::ViewMode;
use crate::render::{Frame, StatusLevel};

pub trait RenderSurface: Send {
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// Plain-text rendition of a frame, one block per present
pub struct TextSurface<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn status_tag(level: StatusLevel) -> &'static str {
    match level {
        StatusLevel::Info => "INFO",
        StatusLevel::Accent => "MODE",
        StatusLevel::Ok => "OK",
        StatusLevel::Warn => "WARN",
        StatusLevel::Danger => "ERR",
    }
}

/// Render a frame as text
pub fn format_frame(frame: &Frame) -> String {
    let header = &frame.header;
    let mut out = String::new();

    let clock = header
        .clock
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let mode = match header.mode {
        ViewMode::Live => "LIVE".to_string(),
        ViewMode::Timelapse => {
            let position = header
                .position
                .map(|(current, latest)| format!(" {}/{}", current, latest))
                .unwrap_or_default();
            let playing = if header.playing { " ▶" } else { "" };
            format!("TIMELAPSE{}{}", position, playing)
        }
    };
    let editing = if header.editing { "  [EDIT]" } else { "" };

    out.push_str(&format!(
        "== {}  {}  {}{}\n",
        clock, mode, frame.hud_counts, editing
    ));
    out.push_str(&format!(
        "[{}] {}\n",
        status_tag(header.status.level),
        header.status.message
    ));

    for card in &frame.cards {
        let marker = if card.selected { '*' } else { ' ' };
        out.push_str(&format!(
            "{} @({:.0},{:.0})\n",
            marker, card.rect.x, card.rect.y
        ));
        for line in &card.lines {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

impl<W: Write + Send> RenderSurface for TextSurface<W> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        self.out
            .write_all(format_frame(frame).as_bytes())
            .context("Failed to write frame")?;
        self.out.flush().context("Failed to flush frame")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{CardView, FrameHeader, StatusLine};
    use crate::geometry::{Rect, ScreenPoint};

    fn frame(mode: ViewMode) -> Frame {
        Frame {
            header: FrameHeader {
                clock: None,
                status: StatusLine::new(StatusLevel::Danger, "Feed error: HTTP 500"),
                mode,
                playing: true,
                position: Some((3, 9)),
                editing: true,
            },
            hud_counts: "4 stands • 1 flights".to_string(),
            cards: vec![CardView {
                key: "LV-AAA".to_string(),
                rect: Rect::new(114.0, 88.0, 190.0, 102.0),
                anchor: ScreenPoint::new(100.0, 100.0),
                selected: true,
                lines: vec!["LV-AAA  Stand 72".to_string(), "[ARR]".to_string()],
            }],
            aircraft: vec![],
            arrows: vec![],
            stands: vec![],
            flights: vec![],
        }
    }

    #[test]
    fn test_text_frame() {
        let text = format_frame(&frame(ViewMode::Timelapse));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "== --:--:--  TIMELAPSE 3/9 ▶  4 stands • 1 flights  [EDIT]"
        );
        assert_eq!(lines[1], "[ERR] Feed error: HTTP 500");
        assert_eq!(lines[2], "* @(114,88)");
        assert_eq!(lines[3], "    LV-AAA  Stand 72");
    }

    #[test]
    fn test_live_frame_hides_position() {
        let mut surface = TextSurface::new(Vec::new());
        surface.present(&frame(ViewMode::Live)).unwrap();
        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert!(text.starts_with("== --:--:--  LIVE  4 stands"));
    }
}
