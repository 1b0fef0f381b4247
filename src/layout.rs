//! Card de-overlap by iterative pairwise repulsion
//!
//! Each card is drawn at `anchor + offset`. Overlapping pairs push their
//! offsets apart by a fixed step along the line between their centers, then
//! every card is pulled back inside the viewport. This is a best-effort
//! declutter: under heavy density overlap may remain when the pass cap is
//! reached.

use serde::{Deserialize, Serialize};

use crate::geometry::{Offset, Rect, ScreenPoint, repulsion_direction};

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Upper bound on full pairwise passes
    pub max_passes: usize,
    /// Distance each card of an overlapping pair moves per pass, in pixels
    pub step: f64,
    /// Extra gap kept from a viewport edge when a card is pulled back inside
    pub edge_padding: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            max_passes: 40,
            step: 6.0,
            edge_padding: 0.0,
        }
    }
}

/// Screen footprint of one card
#[derive(Debug, Clone, PartialEq)]
pub struct CardFootprint {
    pub key: String,
    pub anchor: ScreenPoint,
    pub width: f64,
    pub height: f64,
    pub offset: Offset,
}

impl CardFootprint {
    pub fn new(key: impl Into<String>, anchor: ScreenPoint, width: f64, height: f64) -> Self {
        Self {
            key: key.into(),
            anchor,
            width,
            height,
            offset: Offset::default(),
        }
    }

    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = offset;
        self
    }

    /// Rectangle the card currently occupies
    pub fn rect(&self) -> Rect {
        Rect::at(self.anchor.translate(self.offset), self.width, self.height)
    }
}

/// How a layout run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOutcome {
    pub passes: usize,
    /// A pass finished without any pairwise push
    pub converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverlapResolver {
    params: LayoutParams,
}

impl OverlapResolver {
    pub fn new(params: LayoutParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Adjust card offsets until no two cards overlap or the pass cap is hit.
    /// Anchors are never touched.
    pub fn layout(&self, cards: &mut [CardFootprint], viewport: Rect) -> LayoutOutcome {
        if cards.is_empty() {
            return LayoutOutcome {
                passes: 0,
                converged: true,
            };
        }

        let step = self.params.step;
        for pass in 1..=self.params.max_passes {
            let mut moved = false;

            for i in 0..cards.len() {
                for j in (i + 1)..cards.len() {
                    let a = cards[i].rect();
                    let b = cards[j].rect();
                    if !a.overlaps(&b) {
                        continue;
                    }

                    let (dx, dy) = repulsion_direction(a.center(), b.center());
                    cards[i].offset = cards[i].offset.add(dx * step, dy * step);
                    cards[j].offset = cards[j].offset.add(-dx * step, -dy * step);
                    moved = true;
                }
            }

            for card in cards.iter_mut() {
                self.keep_inside(card, viewport);
            }

            if !moved {
                return LayoutOutcome {
                    passes: pass,
                    converged: true,
                };
            }
        }

        LayoutOutcome {
            passes: self.params.max_passes,
            converged: false,
        }
    }

    /// Translate a card back inside `viewport`, correcting each violated edge
    /// independently by the minimum amount (plus padding)
    pub fn keep_inside(&self, card: &mut CardFootprint, viewport: Rect) {
        let pad = self.params.edge_padding;
        let r = card.rect();
        let mut dx = 0.0;
        let mut dy = 0.0;

        if r.left() < viewport.left() {
            dx += viewport.left() - r.left() + pad;
        }
        if r.top() < viewport.top() {
            dy += viewport.top() - r.top() + pad;
        }
        if r.right() > viewport.right() {
            dx -= r.right() - viewport.right() + pad;
        }
        if r.bottom() > viewport.bottom() {
            dy -= r.bottom() - viewport.bottom() + pad;
        }

        if dx != 0.0 || dy != 0.0 {
            card.offset = card.offset.add(dx, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    #[test]
    fn test_two_overlapping_cards_separate() {
        let mut cards = vec![
            CardFootprint::new("A", ScreenPoint::new(400.0, 300.0), 120.0, 60.0),
            CardFootprint::new("B", ScreenPoint::new(420.0, 310.0), 120.0, 60.0),
        ];
        let anchors: Vec<ScreenPoint> = cards.iter().map(|c| c.anchor).collect();

        let outcome = OverlapResolver::default().layout(&mut cards, viewport());

        assert!(outcome.converged || outcome.passes == 40);
        if outcome.converged {
            assert!(!cards[0].rect().overlaps(&cards[1].rect()));
        }
        for (card, anchor) in cards.iter().zip(anchors) {
            assert_eq!(card.anchor, anchor);
        }
        assert_eq!(cards[0].key, "A");
        assert_eq!(cards[1].key, "B");
    }

    #[test]
    fn test_pair_pushed_symmetrically() {
        let mut cards = vec![
            CardFootprint::new("A", ScreenPoint::new(100.0, 100.0), 50.0, 50.0),
            CardFootprint::new("B", ScreenPoint::new(110.0, 100.0), 50.0, 50.0),
        ];
        let resolver = OverlapResolver::new(LayoutParams {
            max_passes: 1,
            ..Default::default()
        });
        resolver.layout(&mut cards, viewport());

        // B is to the right of A, so A moves left and B moves right
        assert_eq!(cards[0].offset, Offset::new(-6.0, 0.0));
        assert_eq!(cards[1].offset, Offset::new(6.0, 0.0));
    }

    #[test]
    fn test_coincident_cards_use_fallback_direction() {
        let mut cards = vec![
            CardFootprint::new("A", ScreenPoint::new(100.0, 100.0), 50.0, 50.0),
            CardFootprint::new("B", ScreenPoint::new(100.0, 100.0), 50.0, 50.0),
        ];
        let outcome = OverlapResolver::default().layout(&mut cards, viewport());
        assert!(outcome.converged);
        assert!(!cards[0].rect().overlaps(&cards[1].rect()));
        assert!(cards.iter().all(|c| c.offset.dx.is_finite() && c.offset.dy.is_finite()));
    }

    #[test]
    fn test_clamps_right_edge_after_one_pass() {
        let mut cards = vec![CardFootprint::new(
            "A",
            ScreenPoint::new(950.0, 100.0),
            120.0,
            60.0,
        )];
        let resolver = OverlapResolver::new(LayoutParams {
            max_passes: 1,
            ..Default::default()
        });
        resolver.layout(&mut cards, viewport());

        assert!(cards[0].rect().right() <= viewport().right());
        assert_eq!(cards[0].anchor, ScreenPoint::new(950.0, 100.0));
    }

    #[test]
    fn test_clamps_each_edge_independently() {
        let resolver = OverlapResolver::new(LayoutParams {
            edge_padding: 6.0,
            ..Default::default()
        });
        let mut card = CardFootprint::new("A", ScreenPoint::new(-20.0, 790.0), 100.0, 50.0);
        resolver.keep_inside(&mut card, viewport());

        let r = card.rect();
        assert_eq!(r.left(), 6.0);
        assert_eq!(r.bottom(), 794.0);
    }

    #[test]
    fn test_separated_cards_converge_immediately() {
        let mut cards = vec![
            CardFootprint::new("A", ScreenPoint::new(0.0, 0.0), 50.0, 50.0),
            CardFootprint::new("B", ScreenPoint::new(300.0, 300.0), 50.0, 50.0),
        ];
        let outcome = OverlapResolver::default().layout(&mut cards, viewport());
        assert_eq!(
            outcome,
            LayoutOutcome {
                passes: 1,
                converged: true
            }
        );
        assert_eq!(cards[0].offset, Offset::default());
    }

    #[test]
    fn test_dense_stack_stops_at_cap() {
        let mut cards: Vec<CardFootprint> = (0..30)
            .map(|i| CardFootprint::new(format!("C{i}"), ScreenPoint::new(10.0, 10.0), 200.0, 100.0))
            .collect();
        let small = Rect::new(0.0, 0.0, 220.0, 120.0);
        let outcome = OverlapResolver::default().layout(&mut cards, small);

        assert!(!outcome.converged);
        assert_eq!(outcome.passes, 40);
        assert!(cards.iter().all(|c| c.anchor == ScreenPoint::new(10.0, 10.0)));
    }
}
