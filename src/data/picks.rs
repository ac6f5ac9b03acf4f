use chrono::{DateTime, Utc};

use super::model::split_station_id;

// ---------------------------------------------------------------------------
// Phase – the closed set of arrival types
// ---------------------------------------------------------------------------

/// The seismological arrival type a pick marks. The set is closed: no
/// runtime extension, and import resolves names only through [`Phase::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    P,
    S,
    Amp,
    /// Generic marker 1.
    M1,
    /// Generic marker 2.
    M2,
}

impl Phase {
    /// All variants, in picker-button order.
    pub const ALL: [Phase; 5] = [Phase::P, Phase::S, Phase::Amp, Phase::M1, Phase::M2];

    /// Canonical display name, used verbatim on export.
    pub fn name(self) -> &'static str {
        match self {
            Phase::P => "P",
            Phase::S => "S",
            Phase::Amp => "Amp",
            Phase::M1 => "1",
            Phase::M2 => "2",
        }
    }

    /// Case-insensitive resolution of a phase name. Unknown names yield
    /// `None`; callers decide how to surface that.
    pub fn from_name(name: &str) -> Option<Phase> {
        match name.to_ascii_uppercase().as_str() {
            "P" => Some(Phase::P),
            "S" => Some(Phase::S),
            "AMP" => Some(Phase::Amp),
            "1" => Some(Phase::M1),
            "2" => Some(Phase::M2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Pick – one marked arrival
// ---------------------------------------------------------------------------

/// What a plot click produces. The active phase travels alongside, chosen by
/// the presentation layer from its own button table.
#[derive(Debug, Clone)]
pub struct PickRequest {
    /// `"NET.STA.LOC.CHA"` of the clicked trace.
    pub station_id: String,
    pub station_lat: f64,
    pub station_lon: f64,
    pub time: DateTime<Utc>,
    pub amplitude: f64,
}

/// A single user-marked time/amplitude annotation, owned by exactly one
/// [`Event`].
#[derive(Debug, Clone)]
pub struct Pick {
    pub station_id: String,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Denormalized copy of the station coordinates at pick time.
    pub station_lat: f64,
    pub station_lon: f64,
    pub time: DateTime<Utc>,
    pub phase: Phase,
    /// Kept as text so interchange files round-trip verbatim.
    pub amplitude: String,
}

impl Pick {
    fn from_request(req: &PickRequest, phase: Phase) -> anyhow::Result<Pick> {
        let [network, station, location, channel] = split_station_id(&req.station_id)?;
        Ok(Pick {
            station_id: req.station_id.clone(),
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            station_lat: req.station_lat,
            station_lon: req.station_lon,
            time: req.time,
            phase,
            amplitude: req.amplitude.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Event – a logical grouping of picks
// ---------------------------------------------------------------------------

/// A group of picks believed to originate from one seismic source.
///
/// Ids are not required to be unique; [`PickRegistry::get_event`] returns the
/// first match in list order. Draft sessions renumber ids later, and a JSON
/// re-import of such a session must stay lossless.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    /// Picks in insertion order; deletion keeps survivor order.
    pub picks: Vec<Pick>,
}

impl Event {
    pub fn new(id: i64) -> Event {
        Event {
            id,
            picks: Vec::new(),
        }
    }

    /// Number of distinct stations with at least one pick.
    pub fn picked_station_count(&self) -> usize {
        let mut stations: Vec<&str> = self.picks.iter().map(|p| p.station.as_str()).collect();
        stations.sort_unstable();
        stations.dedup();
        stations.len()
    }
}

// ---------------------------------------------------------------------------
// PickRegistry – the events container
// ---------------------------------------------------------------------------

/// A model mutation, queued for the presentation layer.
///
/// The data model never touches widgets; the UI drains this queue once per
/// frame and updates its own bookkeeping (scroll targets, status text).
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryChange {
    EventAdded { index: usize },
    EventRemoved { id: i64 },
    ActiveChanged { index: Option<usize> },
    PickAdded { event_index: usize, pick_index: usize },
    PickRemoved { event_index: usize },
}

/// Owns all events of a session and tracks at most one active event, the
/// target for new picks.
#[derive(Debug, Clone, Default)]
pub struct PickRegistry {
    pub events: Vec<Event>,
    active: Option<usize>,
    changes: Vec<RegistryChange>,
}

impl PickRegistry {
    pub fn new() -> PickRegistry {
        PickRegistry::default()
    }

    /// Append a new event and make it active. With no explicit id the event
    /// is numbered `events.len() + 1`. Duplicate ids are permitted.
    pub fn add_event(&mut self, id: Option<i64>) -> &Event {
        let id = id.unwrap_or(self.events.len() as i64 + 1);
        self.events.push(Event::new(id));
        let index = self.events.len() - 1;
        self.changes.push(RegistryChange::EventAdded { index });
        self.set_active(index);
        &self.events[index]
    }

    /// First event in list order with the given id.
    pub fn get_event(&self, id: i64) -> Option<&Event> {
        self.events.iter().find(|ev| ev.id == id)
    }

    pub fn get_event_mut(&mut self, id: i64) -> Option<&mut Event> {
        self.events.iter_mut().find(|ev| ev.id == id)
    }

    /// Index of the active event, if any.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_event(&self) -> Option<&Event> {
        self.active.map(|i| &self.events[i])
    }

    /// Mark exactly one event active. Out-of-range indices are rejected.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index >= self.events.len() {
            return false;
        }
        if self.active != Some(index) {
            self.active = Some(index);
            self.changes.push(RegistryChange::ActiveChanged {
                index: Some(index),
            });
        }
        true
    }

    /// Remove an event and all its picks. The last remaining event becomes
    /// active; deleting the sole event leaves the registry active-event-less.
    pub fn delete_event(&mut self, index: usize) {
        if index >= self.events.len() {
            return;
        }
        let removed = self.events.remove(index);
        self.changes.push(RegistryChange::EventRemoved { id: removed.id });
        if self.events.is_empty() {
            self.active = None;
            self.changes
                .push(RegistryChange::ActiveChanged { index: None });
        } else {
            let last = self.events.len() - 1;
            self.active = Some(last);
            self.changes
                .push(RegistryChange::ActiveChanged { index: Some(last) });
        }
    }

    /// Remove one pick; survivors keep their relative order.
    pub fn delete_pick(&mut self, event_index: usize, pick_index: usize) {
        let Some(event) = self.events.get_mut(event_index) else {
            return;
        };
        if pick_index < event.picks.len() {
            event.picks.remove(pick_index);
            self.changes
                .push(RegistryChange::PickRemoved { event_index });
        }
    }

    /// Append a pick to the active event. A silent no-op when no event is
    /// active; callers check the returned indices before using them.
    pub fn record_pick(
        &mut self,
        req: &PickRequest,
        phase: Phase,
    ) -> anyhow::Result<Option<(usize, usize)>> {
        let Some(event_index) = self.active else {
            return Ok(None);
        };
        let pick = Pick::from_request(req, phase)?;
        let event = &mut self.events[event_index];
        event.picks.push(pick);
        let pick_index = event.picks.len() - 1;
        self.changes.push(RegistryChange::PickAdded {
            event_index,
            pick_index,
        });
        Ok(Some((event_index, pick_index)))
    }

    /// Append an already-validated pick to the first event with `event_id`.
    /// Used by file import; `false` when no such event exists.
    pub fn attach_pick(&mut self, event_id: i64, pick: Pick) -> bool {
        let Some(event_index) = self.events.iter().position(|ev| ev.id == event_id) else {
            return false;
        };
        self.events[event_index].picks.push(pick);
        let pick_index = self.events[event_index].picks.len() - 1;
        self.changes.push(RegistryChange::PickAdded {
            event_index,
            pick_index,
        });
        true
    }

    /// All picks across all events, in event-then-pick order.
    pub fn all_picks(&self) -> impl Iterator<Item = &Pick> {
        self.events.iter().flat_map(|ev| ev.picks.iter())
    }

    pub fn pick_count(&self) -> usize {
        self.events.iter().map(|ev| ev.picks.len()).sum()
    }

    /// Drain queued mutation notifications.
    pub fn take_changes(&mut self) -> Vec<RegistryChange> {
        std::mem::take(&mut self.changes)
    }
}
