//! Merge arrival and departure legs into per-aircraft movement records
//!
//! Legs are paired by registration. A registration seen on both lists is a
//! turnaround. The stand comes from the departure leg when there is one, and
//! only records whose stand exists in the active stand set are returned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::feed::RawMovement;
use crate::stands::StandMap;

/// `<from>><to>` with whitespace already stripped
static TRANSITION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^>]+)>([^>]+)$").unwrap());

/// Which legs a movement record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    Arrival,
    Departure,
    Turnaround,
}

impl MovementMode {
    /// Short label shown on cards
    pub fn label(&self) -> &'static str {
        match self {
            MovementMode::Arrival => "ARR",
            MovementMode::Departure => "DEP",
            MovementMode::Turnaround => "TA",
        }
    }
}

impl std::fmt::Display for MovementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An aircraft moving from one stand to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
}

/// Unified per-aircraft view for one polling cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub key: String,
    pub registration: String,
    /// Display stand: the transition's origin, or the raw stand code
    pub stand: String,
    pub transition: Option<Transition>,
    pub mode: MovementMode,
    pub arrival: Option<RawMovement>,
    pub departure: Option<RawMovement>,
}

/// Parse a stand code such as `72>50B` or `72 > 50B`.
///
/// Whitespace is ignored; exactly one `>` with text on both sides is required.
pub fn parse_transition(code: &str) -> Option<Transition> {
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = TRANSITION_RE.captures(&compact)?;
    Some(Transition {
        from: caps[1].to_string(),
        to: caps[2].to_string(),
    })
}

/// Trimmed, upper-cased registration used as the pairing key
pub fn normalize_registration(registration: &str) -> String {
    registration.trim().to_uppercase()
}

/// Stable identity of a record: the registration, or the flight number when
/// the registration is blank
pub fn movement_key(
    registration: &str,
    arrival: Option<&RawMovement>,
    departure: Option<&RawMovement>,
) -> String {
    if !registration.is_empty() {
        return registration.to_string();
    }
    arrival
        .or(departure)
        .map(|leg| leg.flight.trim())
        .filter(|flight| !flight.is_empty())
        .map(|flight| format!("FLT:{}", flight.to_uppercase()))
        .unwrap_or_else(|| "FLT:?".to_string())
}

/// Index a leg list by normalized registration. Blank registrations cannot be
/// paired and are dropped; a repeated registration keeps its last entry.
fn index_by_registration(legs: &[RawMovement]) -> HashMap<String, &RawMovement> {
    let mut index = HashMap::with_capacity(legs.len());
    for leg in legs {
        let reg = normalize_registration(&leg.registration);
        if reg.is_empty() {
            continue;
        }
        index.insert(reg, leg);
    }
    index
}

/// Correlate arrivals and departures against the active stand set
pub fn correlate(
    arrivals: &[RawMovement],
    departures: &[RawMovement],
    stands: &StandMap,
) -> Vec<MovementRecord> {
    let arrivals_by_reg = index_by_registration(arrivals);
    let departures_by_reg = index_by_registration(departures);

    let registrations: BTreeSet<&String> = arrivals_by_reg
        .keys()
        .chain(departures_by_reg.keys())
        .collect();

    let mut records: Vec<MovementRecord> = registrations
        .into_iter()
        .filter_map(|reg| {
            let arrival = arrivals_by_reg.get(reg).copied();
            let departure = departures_by_reg.get(reg).copied();

            let mode = match (arrival, departure) {
                (Some(_), Some(_)) => MovementMode::Turnaround,
                (Some(_), None) => MovementMode::Arrival,
                (None, Some(_)) => MovementMode::Departure,
                (None, None) => return None,
            };

            // The departure's stand wins; an arrival-side transition is discarded
            let raw_stand = departure
                .map(|d| d.stand.trim())
                .filter(|s| !s.is_empty())
                .or_else(|| arrival.map(|a| a.stand.trim()))
                .unwrap_or_default();

            let transition = parse_transition(raw_stand);
            let stand = match &transition {
                Some(t) => t.from.clone(),
                None => raw_stand.to_string(),
            };

            if stand.is_empty() || !stands.contains_key(&stand) {
                return None;
            }

            Some(MovementRecord {
                key: movement_key(reg, arrival, departure),
                registration: reg.clone(),
                stand,
                transition,
                mode,
                arrival: arrival.cloned(),
                departure: departure.cloned(),
            })
        })
        .collect();

    records.sort_by(|a, b| {
        natural_cmp(&a.stand, &b.stand).then_with(|| a.registration.cmp(&b.registration))
    });
    records
}

/// Split into alternating digit and non-digit runs
fn chunks(s: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match current {
            Some(kind) if kind == is_digit => {}
            Some(kind) => {
                out.push((kind, &s[start..i]));
                start = i;
                current = Some(is_digit);
            }
            None => current = Some(is_digit),
        }
    }
    if let Some(kind) = current {
        out.push((kind, &s[start..]));
    }
    out
}

fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering for stand codes: digit runs compare by value, text runs
/// case-insensitively, digits sort before text. `"2" < "9" < "10" < "10A"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            ((true, x), (true, y)) => cmp_numeric(x, y),
            ((false, x), (false, y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            ((true, _), (false, _)) => Ordering::Less,
            ((false, _), (true, _)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}
