//! Explicit render state for the board
//!
//! Cards, aircraft markers, transition arrows and stand markers are held
//! here, keyed by movement key or stand name, and rebuilt or diffed on
//! every update. Interaction arrives as [`RenderEvent`] values applied in
//! order by [`RenderState::apply`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::correlation::MovementRecord;
use crate::feed::RawMovement;
use crate::geometry::{GeoPoint, Offset, Rect, ScreenPoint};
use crate::layout::{CardFootprint, LayoutOutcome, OverlapResolver};
use crate::playback::ViewMode;
use crate::stands::StandMap;
use crate::viewport::Viewport;

/// Where a new card sits relative to its stand
pub const DEFAULT_CARD_OFFSET: Offset = Offset { dx: 14.0, dy: -12.0 };

pub const CARD_WIDTH: f64 = 190.0;
const CARD_HEADER_HEIGHT: f64 = 34.0;
const CARD_LEG_HEIGHT: f64 = 44.0;
const CARD_PILLS_HEIGHT: f64 = 24.0;

/// Zoom used when focusing a selected card
const CARD_FOCUS_ZOOM: f64 = 16.0;
/// Zoom used when focusing a stand
const STAND_FOCUS_ZOOM: f64 = 15.0;

/// Card size for a record: one block per leg
pub fn card_size(movement: &MovementRecord) -> (f64, f64) {
    let legs = usize::from(movement.arrival.is_some()) + usize::from(movement.departure.is_some());
    (
        CARD_WIDTH,
        CARD_HEADER_HEIGHT + CARD_LEG_HEIGHT * legs as f64 + CARD_PILLS_HEIGHT,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Accent,
    Ok,
    Warn,
    Danger,
}

/// User-facing status indicator
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusLine {
    pub fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn ready() -> Self {
        Self::new(StatusLevel::Info, "Ready")
    }
}

/// A floating information card
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub movement: MovementRecord,
    pub stand_point: GeoPoint,
    pub anchor: ScreenPoint,
    pub offset: Offset,
    pub width: f64,
    pub height: f64,
}

impl Card {
    pub fn key(&self) -> &str {
        &self.movement.key
    }

    pub fn rect(&self) -> Rect {
        Rect::at(self.anchor.translate(self.offset), self.width, self.height)
    }

    fn footprint(&self) -> CardFootprint {
        CardFootprint::new(self.key(), self.anchor, self.width, self.height).with_offset(self.offset)
    }
}

/// Aircraft glyph drawn on its stand, nose along the stand heading
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftMarker {
    pub key: String,
    pub point: GeoPoint,
    pub heading_deg: u16,
}

/// Dashed arrow from the current stand to the target stand
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionArrow {
    pub key: String,
    pub from: GeoPoint,
    pub to: GeoPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandMarker {
    pub name: String,
    pub point: GeoPoint,
    pub heading_deg: u16,
}

/// Interaction messages consumed by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// Manual drag of a card by a screen delta
    CardDragged { key: String, dx: f64, dy: f64 },
    /// Card or sidebar selection; `focus` flies the map to the card
    Select { key: String, focus: bool },
    /// Click on empty map
    ClearSelection,
    /// Click on a stand marker or a stand in the list
    FocusStand { name: String },
}

#[derive(Debug, Default)]
pub struct RenderState {
    cards: Vec<Card>,
    index: HashMap<String, usize>,
    aircraft: Vec<AircraftMarker>,
    arrows: Vec<TransitionArrow>,
    stand_markers: Vec<StandMarker>,
    selected: Option<String>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, key: &str) -> Option<&Card> {
        self.index.get(key).map(|&i| &self.cards[i])
    }

    pub fn aircraft(&self) -> &[AircraftMarker] {
        &self.aircraft
    }

    pub fn arrows(&self) -> &[TransitionArrow] {
        &self.arrows
    }

    pub fn stand_markers(&self) -> &[StandMarker] {
        &self.stand_markers
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Rebuild stand markers after the stand set changed
    pub fn rebuild_stands(&mut self, stands: &StandMap) {
        self.stand_markers = stands
            .values()
            .map(|s| StandMarker {
                name: s.name.clone(),
                point: s.point(),
                heading_deg: s.heading_deg,
            })
            .collect();
    }

    /// Replace the displayed movements. Cards whose key survives keep their
    /// offset; new cards start at [`DEFAULT_CARD_OFFSET`].
    pub fn show(&mut self, movements: &[MovementRecord], stands: &StandMap, viewport: &dyn Viewport) {
        let previous: HashMap<String, Offset> = self
            .cards
            .drain(..)
            .map(|c| (c.movement.key, c.offset))
            .collect();

        self.index.clear();
        self.aircraft.clear();
        self.arrows.clear();

        for movement in movements {
            let Some(stand) = stands.get(&movement.stand) else {
                continue;
            };
            let (width, height) = card_size(movement);
            let offset = previous
                .get(&movement.key)
                .copied()
                .unwrap_or(DEFAULT_CARD_OFFSET);

            self.index.insert(movement.key.clone(), self.cards.len());
            self.cards.push(Card {
                movement: movement.clone(),
                stand_point: stand.point(),
                anchor: viewport.project(stand.point()),
                offset,
                width,
                height,
            });
            self.aircraft.push(AircraftMarker {
                key: movement.key.clone(),
                point: stand.point(),
                heading_deg: stand.heading_deg,
            });

            if let Some(transition) = &movement.transition {
                if let (Some(from), Some(to)) =
                    (stands.get(&transition.from), stands.get(&transition.to))
                {
                    self.arrows.push(TransitionArrow {
                        key: movement.key.clone(),
                        from: from.point(),
                        to: to.point(),
                    });
                }
            }
        }

        if let Some(key) = &self.selected {
            if !self.index.contains_key(key) {
                debug!("Selected movement {} no longer displayed", key);
            }
        }
    }

    /// Re-project anchors for the current viewport and, when a resolver is
    /// given, declutter the cards
    pub fn relayout(
        &mut self,
        viewport: &dyn Viewport,
        resolver: Option<&OverlapResolver>,
    ) -> Option<LayoutOutcome> {
        for card in &mut self.cards {
            card.anchor = viewport.project(card.stand_point);
        }

        let resolver = resolver?;
        let mut footprints: Vec<CardFootprint> = self.cards.iter().map(Card::footprint).collect();
        let outcome = resolver.layout(&mut footprints, viewport.bounds());
        for (card, footprint) in self.cards.iter_mut().zip(footprints) {
            card.offset = footprint.offset;
        }
        debug!(
            "Laid out {} cards in {} passes (converged: {})",
            self.cards.len(),
            outcome.passes,
            outcome.converged
        );
        Some(outcome)
    }

    /// Apply one interaction. Returns whether anything visible changed.
    pub fn apply(&mut self, event: RenderEvent, viewport: &mut dyn Viewport) -> bool {
        match event {
            RenderEvent::CardDragged { key, dx, dy } => match self.index.get(&key) {
                Some(&i) => {
                    let card = &mut self.cards[i];
                    card.offset = card.offset.add(dx, dy);
                    true
                }
                None => false,
            },
            RenderEvent::Select { key, focus } => {
                let Some(&i) = self.index.get(&key) else {
                    return false;
                };
                if focus {
                    let zoom = viewport.zoom().max(CARD_FOCUS_ZOOM);
                    viewport.fly_to(self.cards[i].stand_point, zoom);
                }
                self.selected = Some(key);
                true
            }
            RenderEvent::ClearSelection => self.selected.take().is_some(),
            RenderEvent::FocusStand { name } => {
                match self.stand_markers.iter().find(|m| m.name == name) {
                    Some(marker) => {
                        let zoom = viewport.zoom().max(STAND_FOCUS_ZOOM);
                        viewport.fly_to(marker.point, zoom);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Everything a surface needs to draw one frame
    pub fn frame(&self, header: FrameHeader) -> Frame {
        let cards = self
            .cards
            .iter()
            .map(|c| CardView {
                key: c.key().to_string(),
                rect: c.rect(),
                anchor: c.anchor,
                selected: self.selected.as_deref() == Some(c.key()),
                lines: card_lines(&c.movement),
            })
            .collect();

        let flights = self
            .cards
            .iter()
            .map(|c| {
                format!(
                    "{:<4} {:<8} Stand {}",
                    c.movement.mode.label(),
                    c.movement.registration,
                    c.movement.stand
                )
            })
            .collect();

        Frame {
            hud_counts: format!(
                "{} stands • {} flights",
                self.stand_markers.len(),
                self.cards.len()
            ),
            header,
            cards,
            aircraft: self.aircraft.clone(),
            arrows: self.arrows.clone(),
            stands: self.stand_markers.clone(),
            flights,
        }
    }
}

/// Non-card parts of a frame, supplied by the owner of the render state
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub clock: Option<DateTime<Utc>>,
    pub status: StatusLine,
    pub mode: ViewMode,
    pub playing: bool,
    /// `(current, latest)` snapshot indices
    pub position: Option<(usize, usize)>,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub key: String,
    pub rect: Rect,
    pub anchor: ScreenPoint,
    pub selected: bool,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub hud_counts: String,
    pub cards: Vec<CardView>,
    pub aircraft: Vec<AircraftMarker>,
    pub arrows: Vec<TransitionArrow>,
    pub stands: Vec<StandMarker>,
    /// Sidebar list, one line per displayed movement
    pub flights: Vec<String>,
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s.trim() }
}

fn leg_line(label: &str, place_label: &str, leg: &RawMovement) -> String {
    format!(
        "{} {}  {} {}  TIME {}  ST {}",
        label,
        or_dash(&leg.flight),
        place_label,
        or_dash(leg.counterpart_airport()),
        or_dash(&leg.time),
        or_dash(&leg.status)
    )
}

/// Text content of a card
pub fn card_lines(movement: &MovementRecord) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    let stand = if movement.stand.is_empty() {
        "No stand".to_string()
    } else {
        format!("Stand {}", movement.stand)
    };
    lines.push(format!("{}  {}", or_dash(&movement.registration), stand));

    if let Some(arr) = &movement.arrival {
        lines.push(leg_line("ARR", "ORIG", arr));
    }
    if let Some(dep) = &movement.departure {
        lines.push(leg_line("DEP", "DEST", dep));
    }

    let mut pills = vec![format!("[{}]", movement.mode.label())];
    if let Some(t) = &movement.transition {
        pills.push(format!("[MOVE {}→{}]", t.from, t.to));
    }
    lines.push(pills.join(" "));
    lines
}
