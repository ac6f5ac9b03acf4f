use chrono::{DateTime, Duration, Utc};

use crate::data::filter::{BandpassConfig, bandpass};
use crate::data::model::StationSet;
use crate::data::picks::{Phase, PickRegistry, PickRequest, RegistryChange};

// ---------------------------------------------------------------------------
// Phase picker buttons
// ---------------------------------------------------------------------------

/// Button label → phase, the explicit table the pick panel is built from.
pub const PHASE_BUTTONS: [(&str, Phase); 5] = [
    ("P", Phase::P),
    ("S", Phase::S),
    ("Amp", Phase::Amp),
    ("1", Phase::M1),
    ("2", Phase::M2),
];

// ---------------------------------------------------------------------------
// Filter widget state
// ---------------------------------------------------------------------------

/// Scratch values behind the bandpass sliders. `enabled` decides whether a
/// [`BandpassConfig`] is applied at all.
#[derive(Debug, Clone)]
pub struct FilterControls {
    pub enabled: bool,
    pub freqmin: f64,
    pub freqmax: f64,
    pub corners: u32,
    pub zerophase: bool,
}

impl Default for FilterControls {
    fn default() -> Self {
        let defaults = BandpassConfig::default();
        FilterControls {
            enabled: false,
            freqmin: defaults.freqmin,
            freqmax: defaults.freqmax,
            corners: defaults.corners,
            zerophase: defaults.zerophase,
        }
    }
}

impl FilterControls {
    /// Keep the corners ordered, as the original spin boxes did.
    pub fn clamp(&mut self) {
        if self.freqmin >= self.freqmax {
            self.freqmin = (self.freqmax - 0.1).max(0.01);
        }
        self.corners = self.corners.clamp(1, 8);
    }

    pub fn config(&self) -> Option<BandpassConfig> {
        self.enabled.then_some(BandpassConfig {
            freqmin: self.freqmin,
            freqmax: self.freqmax,
            corners: self.corners,
            zerophase: self.zerophase,
        })
    }
}

// ---------------------------------------------------------------------------
// Prepared plot series
// ---------------------------------------------------------------------------

/// One plot-ready trace: the visible component of a visible station, with
/// the rendering filter already applied. Stored samples stay untouched.
#[derive(Debug, Clone)]
pub struct PreparedTrace {
    pub station_index: usize,
    pub station_label: String,
    /// `"NET.STA.LOC.CHA"` of the rendered channel.
    pub station_id: String,
    /// Trace start relative to [`AppState::reference_time`], seconds.
    pub offset_secs: f64,
    pub delta: f64,
    pub samples: Vec<f64>,
}

impl PreparedTrace {
    /// Amplitude of the sample nearest to plot coordinate `x`.
    pub fn amplitude_at(&self, x: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let idx = ((x - self.offset_secs) / self.delta).round();
        let idx = idx.clamp(0.0, (self.samples.len() - 1) as f64) as usize;
        self.samples[idx]
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset (None until the user opens a file).
    pub dataset: Option<StationSet>,

    pub registry: PickRegistry,

    /// Phase assigned to the next pick.
    pub active_phase: Phase,

    /// Component letter currently plotted ('Z', 'N' or 'E').
    pub visible_component: char,

    pub filter_controls: FilterControls,

    /// The bandpass currently applied to rendering, if any.
    pub filter: Option<BandpassConfig>,

    /// Plot-ready series for the visible stations (cached).
    pub prepared: Vec<PreparedTrace>,

    /// Zero point of the shared time axis: earliest visible trace start.
    pub reference_time: Option<DateTime<Utc>>,

    /// Pick to scroll the event tree to, set from change notifications.
    pub scroll_to_pick: Option<(usize, usize)>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    pub project_name: String,

    /// How many stations are made visible when a dataset loads.
    pub initial_visible: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: None,
            registry: PickRegistry::new(),
            active_phase: Phase::P,
            visible_component: 'Z',
            filter_controls: FilterControls::default(),
            filter: None,
            prepared: Vec::new(),
            reference_time: None,
            scroll_to_pick: None,
            status_message: None,
            project_name: "Untitled".to_string(),
            initial_visible: 5,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded dataset; the first few stations start visible.
    pub fn set_dataset(&mut self, mut dataset: StationSet) {
        for (i, station) in dataset.stations.iter_mut().enumerate() {
            station.visible = i < self.initial_visible;
        }
        self.dataset = Some(dataset);
        self.status_message = None;
        self.rebuild_prepared();
    }

    pub fn toggle_station_visibility(&mut self, index: usize) {
        if let Some(dataset) = &mut self.dataset {
            if let Some(station) = dataset.stations.get_mut(index) {
                station.visible = !station.visible;
            }
        }
        self.rebuild_prepared();
    }

    pub fn set_visible_component(&mut self, component: char) {
        self.visible_component = component;
        self.rebuild_prepared();
    }

    pub fn sort_stations_by(&mut self, key: &str) {
        if let Some(dataset) = &mut self.dataset {
            dataset.sort_by_attribute(key);
        }
        self.rebuild_prepared();
    }

    /// Read the slider scratch into the applied filter and re-render.
    pub fn apply_filter_controls(&mut self) {
        self.filter_controls.clamp();
        self.filter = self.filter_controls.config();
        self.rebuild_prepared();
    }

    /// Recompute the plot-ready series after any dataset, visibility,
    /// component or filter change.
    pub fn rebuild_prepared(&mut self) {
        self.prepared.clear();
        self.reference_time = None;
        let Some(dataset) = &self.dataset else {
            return;
        };

        let visible = dataset.visible_indices();
        let reference = visible
            .iter()
            .filter_map(|&i| {
                dataset.stations[i]
                    .channel_for_component(self.visible_component)
                    .map(|ch| ch.trace.start_time)
            })
            .min();
        let Some(reference) = reference else {
            return;
        };
        self.reference_time = Some(reference);

        for &station_index in &visible {
            let station = &dataset.stations[station_index];
            let Some(channel) = station.channel_for_component(self.visible_component) else {
                continue;
            };
            let samples = match &self.filter {
                Some(config) => bandpass(&channel.trace.samples, channel.trace.delta, config),
                None => channel.trace.samples.clone(),
            };
            let offset = (channel.trace.start_time - reference)
                .num_nanoseconds()
                .unwrap_or(0) as f64
                / 1e9;
            self.prepared.push(PreparedTrace {
                station_index,
                station_label: station.label(),
                station_id: station.station_id(&channel.code),
                offset_secs: offset,
                delta: channel.trace.delta,
                samples,
            });
        }
    }

    /// Turn a plot click on a prepared trace into a pick on the active
    /// event. A no-op (with a status hint) when no event is active.
    pub fn record_pick_at(&mut self, prepared_index: usize, x: f64) {
        let Some(reference) = self.reference_time else {
            return;
        };
        let Some(prepared) = self.prepared.get(prepared_index) else {
            return;
        };
        let Some(dataset) = &self.dataset else {
            return;
        };
        let station = &dataset.stations[prepared.station_index];

        let request = PickRequest {
            station_id: prepared.station_id.clone(),
            station_lat: station.latitude,
            station_lon: station.longitude,
            time: reference + Duration::nanoseconds((x * 1e9) as i64),
            amplitude: prepared.amplitude_at(x),
        };
        match self.registry.record_pick(&request, self.active_phase) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.status_message = Some("No active event – add one first".to_string());
            }
            Err(e) => {
                log::error!("Pick rejected: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Drain model notifications once per frame; the UI reacts here instead
    /// of the model reaching into widgets.
    pub fn process_changes(&mut self) {
        for change in self.registry.take_changes() {
            match change {
                RegistryChange::PickAdded {
                    event_index,
                    pick_index,
                } => {
                    self.scroll_to_pick = Some((event_index, pick_index));
                }
                RegistryChange::EventRemoved { id } => {
                    log::debug!("event {id} removed");
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{StationSet, Trace, TraceHeader};
    use std::collections::BTreeMap;

    fn dataset() -> StationSet {
        let header = TraceHeader {
            network: "XX".to_string(),
            station: "STA1".to_string(),
            location: "00".to_string(),
            channel: "BHZ".to_string(),
            latitude: 46.0,
            longitude: 7.0,
            elevation: 500.0,
            metadata: BTreeMap::new(),
        };
        let trace = Trace {
            start_time: DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            delta: 0.5,
            samples: vec![0.0, 10.0, 20.0, 30.0],
        };
        StationSet::from_traces(vec![(header, trace)])
    }

    #[test]
    fn prepared_series_cover_visible_stations_with_the_component() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        assert_eq!(state.prepared.len(), 1);
        assert_eq!(state.prepared[0].station_id, "XX.STA1.00.BHZ");
        assert_eq!(state.prepared[0].offset_secs, 0.0);

        state.set_visible_component('N');
        assert!(state.prepared.is_empty());
        assert!(state.reference_time.is_none());
    }

    #[test]
    fn click_maps_to_time_and_nearest_sample_amplitude() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        state.registry.add_event(None);

        // x = 1.1 s, delta 0.5 s → nearest sample index 2, amplitude 20.
        state.record_pick_at(0, 1.1);
        let pick = &state.registry.events[0].picks[0];
        assert_eq!(pick.amplitude, "20");
        assert_eq!(
            pick.time,
            state.reference_time.unwrap() + Duration::milliseconds(1100)
        );
        assert_eq!(pick.phase, Phase::P);
    }

    #[test]
    fn picking_without_an_active_event_sets_a_status_hint() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        state.record_pick_at(0, 0.5);
        assert_eq!(state.registry.pick_count(), 0);
        assert!(state.status_message.is_some());
    }

    #[test]
    fn filter_controls_clamp_and_apply() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        state.filter_controls.enabled = true;
        state.filter_controls.freqmin = 12.0;
        state.filter_controls.freqmax = 10.0;
        state.apply_filter_controls();
        let config = state.filter.unwrap();
        assert!(config.freqmin < config.freqmax);
        // Rendering uses a filtered copy; stored samples stay untouched.
        assert_eq!(
            state.dataset.as_ref().unwrap().stations[0].channels[0]
                .trace
                .samples,
            vec![0.0, 10.0, 20.0, 30.0]
        );
    }
}
