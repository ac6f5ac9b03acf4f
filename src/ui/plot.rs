use eframe::egui::{RichText, Ui};
use egui_plot::{Line, Plot, PlotPoints, VLine};

use crate::color::{generate_palette, phase_color, phase_fill};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Waveform plots (central panel)
// ---------------------------------------------------------------------------

/// Render one x-linked plot per visible station and turn clicks into picks.
pub fn waveform_plots(ui: &mut Ui, state: &mut AppState) {
    let Some(dataset) = &state.dataset else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a waveform file to start picking  (File → Open…)");
        });
        return;
    };
    if state.prepared.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label(format!(
                "No visible station has a '{}' component",
                state.visible_component
            ));
        });
        return;
    }

    let palette = generate_palette(dataset.len());
    let link_group = ui.id().with("waveform_link");
    let n = state.prepared.len();
    let row_height = ((ui.available_height() - 18.0 * n as f32) / n as f32).max(60.0);
    let reference = state.reference_time;

    // Clicks are applied after the rendering loop; the registry must not be
    // mutated while the plots borrow it.
    let mut clicked: Option<(usize, f64)> = None;

    for (index, prepared) in state.prepared.iter().enumerate() {
        let trace_color = palette[prepared.station_index % palette.len()];
        ui.label(
            RichText::new(&prepared.station_id)
                .small()
                .color(trace_color),
        );

        let is_bottom = index + 1 == n;
        Plot::new(("waveform", prepared.station_index))
            .height(row_height)
            .link_axis(link_group, [true, false])
            .show_axes([is_bottom, true])
            .allow_boxed_zoom(true)
            .allow_drag(true)
            .allow_zoom(true)
            .allow_scroll(false)
            .show(ui, |plot_ui| {
                let points: PlotPoints = prepared
                    .samples
                    .iter()
                    .enumerate()
                    .map(|(j, &y)| [prepared.offset_secs + j as f64 * prepared.delta, y])
                    .collect();
                plot_ui.line(
                    Line::new(points)
                        .color(trace_color)
                        .width(1.0)
                        .name(&prepared.station_label),
                );

                // Pick markers of this station, all events.
                let station = &dataset.stations[prepared.station_index];
                let active_index = state.registry.active_index();
                for (event_index, event) in state.registry.events.iter().enumerate() {
                    let is_active = active_index == Some(event_index);
                    for pick in &event.picks {
                        if pick.network != station.network || pick.station != station.station {
                            continue;
                        }
                        let Some(reference) = reference else { continue };
                        let x = (pick.time - reference).num_nanoseconds().unwrap_or(0) as f64
                            / 1e9;
                        // Active-event picks at full strength, others dimmed.
                        let color = if is_active {
                            phase_color(pick.phase)
                        } else {
                            phase_fill(pick.phase)
                        };
                        plot_ui.vline(
                            VLine::new(x)
                                .color(color)
                                .width(if is_active { 2.0 } else { 1.0 })
                                .name(pick.phase.name()),
                        );
                    }
                }

                if plot_ui.response().clicked() {
                    if let Some(pos) = plot_ui.pointer_coordinate() {
                        clicked = Some((index, pos.x));
                    }
                }
            });
    }

    if let Some((index, x)) = clicked {
        state.record_pick_at(index, x);
    }
}
