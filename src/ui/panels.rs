use std::path::PathBuf;

use eframe::egui::{self, Align, Color32, RichText, ScrollArea, Ui};

use crate::color::{phase_color, phase_fill};
use crate::data::{hypo, io, loader};
use crate::state::{AppState, PHASE_BUTTONS};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open waveforms…").clicked() {
                open_waveforms_dialog(state);
                ui.close_menu();
            }
            if ui.button("Import picks (JSON)…").clicked() {
                import_picks_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Save picks as JSON…").clicked() {
                save_picks_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export picks as CSV…").clicked() {
                export_csv_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export station file…").clicked() {
                export_station_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} stations, {} visible – {} events, {} picks",
                ds.len(),
                ds.visible_indices().len(),
                state.registry.events.len(),
                state.registry.pick_count()
            ));
        }

        if let Some(event) = state.registry.active_event() {
            ui.separator();
            ui.label(format!("Picking into Ev {}", event.id));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Side panel – picking, events, stations, filter
// ---------------------------------------------------------------------------

enum EventAction {
    Activate(usize),
    DeleteEvent(usize),
    DeletePick(usize, usize),
}

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading(&state.project_name);
    ui.separator();

    phase_buttons(ui, state);
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            event_tree(ui, state);
            ui.separator();
            station_list(ui, state);
            ui.separator();
            filter_controls(ui, state);
        });
}

fn phase_buttons(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Phase");
    ui.horizontal(|ui: &mut Ui| {
        for (label, phase) in PHASE_BUTTONS {
            let selected = state.active_phase == phase;
            let text = RichText::new(label).color(phase_color(phase));
            if ui.selectable_label(selected, text).clicked() {
                state.active_phase = phase;
            }
        }
    });
}

fn event_tree(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Events");
        if ui.small_button("＋").clicked() {
            state.registry.add_event(None);
        }
    });

    let mut action: Option<EventAction> = None;
    let scroll_target = state.scroll_to_pick.take();
    let active_index = state.registry.active_index();

    for (event_index, event) in state.registry.events.iter().enumerate() {
        let is_active = active_index == Some(event_index);
        ui.horizontal(|ui: &mut Ui| {
            let mut header = RichText::new(format!(
                "Ev {}  ({} stations)",
                event.id,
                event.picked_station_count()
            ));
            if is_active {
                header = header.strong();
            }
            if ui.selectable_label(is_active, header).clicked() {
                action = Some(EventAction::Activate(event_index));
            }
            if ui.small_button("🗑").clicked() {
                action = Some(EventAction::DeleteEvent(event_index));
            }
        });

        for (pick_index, pick) in event.picks.iter().enumerate() {
            ui.horizontal(|ui: &mut Ui| {
                ui.add_space(12.0);
                let text = RichText::new(format!(
                    "{} – {}  {}",
                    pick.phase,
                    pick.station_id,
                    pick.time.format("%H:%M:%S%.3f")
                ))
                .small()
                .background_color(phase_fill(pick.phase));
                let response = ui.label(text);
                if scroll_target == Some((event_index, pick_index)) {
                    response.scroll_to_me(Some(Align::Center));
                }
                if ui.small_button("✕").clicked() {
                    action = Some(EventAction::DeletePick(event_index, pick_index));
                }
            });
        }
    }

    match action {
        Some(EventAction::Activate(index)) => {
            state.registry.set_active(index);
        }
        Some(EventAction::DeleteEvent(index)) => {
            state.registry.delete_event(index);
        }
        Some(EventAction::DeletePick(event_index, pick_index)) => {
            state.registry.delete_pick(event_index, pick_index);
        }
        None => {}
    }
}

fn station_list(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Stations");

    // Component selector, one of Z/N/E.
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Component:");
        for component in ['Z', 'N', 'E'] {
            let selected = state.visible_component == component;
            if ui
                .selectable_label(selected, component.to_string())
                .clicked()
            {
                state.set_visible_component(component);
            }
        }
    });

    let Some(dataset) = &state.dataset else {
        ui.label("No waveforms loaded.");
        return;
    };

    // Sort selector over attributes every station carries.
    let attributes = dataset.sortable_attributes();
    let mut sort_request: Option<String> = None;
    if !attributes.is_empty() {
        let current = dataset.sorted_by.clone().unwrap_or_default();
        egui::ComboBox::from_id_salt("sort_by")
            .selected_text(if current.is_empty() {
                "Sort by…".to_string()
            } else {
                format!("Sorted by {current}")
            })
            .show_ui(ui, |ui: &mut Ui| {
                for attribute in &attributes {
                    if ui
                        .selectable_label(current == *attribute, attribute)
                        .clicked()
                    {
                        sort_request = Some(attribute.clone());
                    }
                }
            });
    }

    let mut toggle_request: Option<usize> = None;
    for (index, station) in dataset.stations.iter().enumerate() {
        ui.horizontal(|ui: &mut Ui| {
            let mut visible = station.visible;
            if ui.checkbox(&mut visible, station.label()).changed() {
                toggle_request = Some(index);
            }
            let channel_info: Vec<String> = station
                .channels
                .iter()
                .map(|ch| {
                    format!(
                        "{} @ {:.0} Hz\n{} – {}",
                        ch.code,
                        ch.trace.sampling_rate(),
                        ch.trace.start_time.format("%Y-%m-%d %H:%M:%S"),
                        ch.trace.end_time().format("%H:%M:%S")
                    )
                })
                .collect();
            ui.label(
                RichText::new(format!(
                    "{} ch, {:.3}°N {:.3}°E",
                    station.channels.len(),
                    station.latitude,
                    station.longitude
                ))
                .small()
                .weak(),
            )
            .on_hover_text(channel_info.join("\n"));
        });
    }

    if let Some(key) = sort_request {
        state.sort_stations_by(&key);
    }
    if let Some(index) = toggle_request {
        state.toggle_station_visibility(index);
    }
}

fn filter_controls(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Bandpass filter");

    let mut changed = false;
    let controls = &mut state.filter_controls;

    changed |= ui
        .checkbox(&mut controls.enabled, "Enable")
        .changed();
    changed |= ui
        .add(
            egui::Slider::new(&mut controls.freqmin, 0.01..=50.0)
                .logarithmic(true)
                .text("fmin [Hz]"),
        )
        .changed();
    changed |= ui
        .add(
            egui::Slider::new(&mut controls.freqmax, 0.1..=50.0)
                .logarithmic(true)
                .text("fmax [Hz]"),
        )
        .changed();
    changed |= ui
        .add(egui::Slider::new(&mut controls.corners, 1..=8).text("corners"))
        .changed();
    changed |= ui
        .checkbox(&mut controls.zerophase, "zerophase")
        .changed();

    if changed {
        state.apply_filter_controls();
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

fn with_extension(mut path: PathBuf, extension: &str) -> PathBuf {
    let has_it = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if !has_it {
        path.set_extension(extension);
    }
    path
}

pub fn open_waveforms_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open waveform data")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        match loader::load_file(&path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} stations from {}",
                    dataset.len(),
                    path.display()
                );
                state.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

pub fn import_picks_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Import picks")
        .add_filter("JSON File", &["json"])
        .pick_file();

    if let Some(path) = file {
        match io::import_json(&path, &mut state.registry) {
            Ok(count) => {
                log::info!("Imported {count} picks from {}", path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Pick import failed: {e}");
                state.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}

pub fn save_picks_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save picks")
        .set_file_name(format!("{}.json", state.project_name))
        .add_filter("JSON File", &["json"])
        .save_file();

    if let Some(path) = file {
        let path = with_extension(path, "json");
        if let Err(e) = io::export_json(&path, &state.registry) {
            log::error!("Pick export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

pub fn export_csv_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export picks as CSV")
        .set_file_name(format!("{}.csv", state.project_name))
        .add_filter("CSV File", &["csv"])
        .save_file();

    if let Some(path) = file {
        let path = with_extension(path, "csv");
        if let Err(e) = io::export_csv(&path, &state.registry) {
            log::error!("CSV export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

pub fn export_station_dialog(state: &mut AppState) {
    let Some(dataset) = &state.dataset else {
        state.status_message = Some("No stations to export".to_string());
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Export station file")
        .set_file_name(format!("{}.sta", state.project_name))
        .add_filter("STA File", &["sta"])
        .save_file();

    if let Some(path) = file {
        let path = with_extension(path, "sta");
        if let Err(e) = hypo::write_station_file(&path, dataset) {
            log::error!("Station export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
