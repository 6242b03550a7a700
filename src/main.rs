#[cfg(feature = "gui")]
use std::sync::Arc;

#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use rhythmcraft::{
    export_to_file, midi::midi_note_name, sequencer, AudioClock, DrumSynth, MidiOutputDevice,
    MidiVoiceBank, Session, SynthVoices, SystemClock, Track, RUDIMENTS,
};

#[cfg(feature = "gui")]
const EXPORT_FILE: &str = "rhythm-craft-beat.mid";

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    init_tracing();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 640.0])
            .with_title("RhythmCraft"),
        ..Default::default()
    };

    eframe::run_native(
        "RhythmCraft",
        options,
        Box::new(|_cc| Ok(Box::new(SequencerApp::new()))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(feature = "gui")]
type Voices = (Option<SynthVoices>, Option<MidiVoiceBank>);

#[cfg(feature = "gui")]
struct SequencerApp {
    session: Session<Voices>,
    // Keeps the output stream alive
    _synth: Option<DrumSynth>,
    clock: Arc<dyn AudioClock>,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    proposal_text: String,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl SequencerApp {
    fn new() -> Self {
        let (synth, clock): (Option<DrumSynth>, Arc<dyn AudioClock>) = match DrumSynth::new() {
            Ok(synth) => {
                let clock: Arc<dyn AudioClock> = synth.clock();
                (Some(synth), clock)
            }
            Err(err) => {
                tracing::warn!(%err, "audio output unavailable, running silent");
                let clock: Arc<dyn AudioClock> = Arc::new(SystemClock::new());
                (None, clock)
            }
        };
        let voices = (synth.as_ref().map(DrumSynth::voices), None);

        Self {
            session: Session::new(voices, Arc::clone(&clock)),
            _synth: synth,
            clock,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            proposal_text: String::new(),
            status: None,
        }
    }

    fn connect_midi(&mut self, port_index: usize) {
        let mut device = MidiOutputDevice::new();
        let bank = device
            .connect(port_index)
            .and_then(|()| device.into_voice_bank(Arc::clone(&self.clock)));
        match bank {
            Ok(bank) => {
                let synth = self.session.voices().0.clone();
                self.session.set_voices((synth, Some(bank)));
                self.selected_port = Some(port_index);
                // Pick up the new voices straight away
                if self.session.is_playing() {
                    self.session.stop();
                    self.session.start();
                }
            }
            Err(err) => self.status = Some(format!("MIDI: {err}")),
        }
    }

    fn export(&mut self) {
        let snapshot = self.session.snapshot();
        self.status = Some(match export_to_file(EXPORT_FILE, &snapshot) {
            Ok(()) => format!("Exported {EXPORT_FILE}"),
            Err(err) => err.to_string(),
        });
    }

    fn transport_ui(&mut self, ui: &mut egui::Ui) {
        let transport = self.session.snapshot().transport;

        ui.horizontal(|ui| {
            let label = if self.session.is_playing() { "⏹ Stop" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.session.toggle_play();
            }

            ui.add_space(20.0);

            ui.label("BPM:");
            let mut tempo = transport.tempo();
            if ui
                .add(egui::Slider::new(&mut tempo, sequencer::MIN_TEMPO..=sequencer::MAX_TEMPO))
                .changed()
            {
                self.session.set_tempo(tempo);
            }

            ui.label("Swing:");
            let mut swing = transport.swing();
            if ui
                .add(egui::Slider::new(&mut swing, 0..=sequencer::MAX_SWING).suffix("%"))
                .changed()
            {
                self.session.set_swing(swing);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Beats:");
            let mut beats = transport.beats();
            if ui
                .add(egui::DragValue::new(&mut beats).range(sequencer::MIN_BEATS..=sequencer::MAX_BEATS))
                .changed()
            {
                self.session.set_beats(beats);
            }

            ui.label("Subdivision:");
            let mut subdivision = transport.subdivision();
            if ui
                .add(
                    egui::DragValue::new(&mut subdivision)
                        .range(sequencer::MIN_SUBDIVISION..=sequencer::MAX_SUBDIVISION),
                )
                .changed()
            {
                self.session.set_subdivision(subdivision);
            }

            ui.add_space(20.0);

            if ui.button("Clear").clicked() {
                self.session.clear();
            }

            let active = self.session.store().active_rudiment();
            egui::ComboBox::from_id_source("rudiment")
                .selected_text(active.map(|r| r.name).unwrap_or("Rudiments..."))
                .show_ui(ui, |ui| {
                    for rudiment in RUDIMENTS.iter() {
                        if ui
                            .selectable_label(active == Some(rudiment), rudiment.name)
                            .on_hover_text(rudiment.description)
                            .clicked()
                        {
                            self.session.load_rudiment(rudiment);
                        }
                    }
                });

            if ui.button("⬇ Export MIDI").clicked() {
                self.export();
            }
        });
    }

    fn grid_ui(&mut self, ui: &mut egui::Ui) {
        let snapshot = self.session.snapshot();
        let steps = snapshot.transport.total_steps();
        let subdivision = snapshot.transport.subdivision() as usize;
        let playhead = self.session.displayed_step();
        let rudiment = self.session.store().active_rudiment();

        egui::Grid::new("pattern").spacing([2.0, 2.0]).show(ui, |ui| {
            if let Some(rudiment) = rudiment {
                ui.label("");
                ui.label("");
                for step in 0..steps {
                    let letter = rudiment.sticking_at(step).letter().unwrap_or(' ');
                    ui.label(letter.to_string());
                }
                ui.end_row();
            }

            for track in Track::ALL {
                let muted = snapshot.mutes.is_muted(track);
                ui.label(track.name())
                    .on_hover_text(midi_note_name(track.midi_note()));
                if ui.selectable_label(muted, if muted { "M" } else { "m" }).clicked() {
                    self.session.toggle_mute(track);
                }

                for step in 0..steps {
                    let enabled = snapshot.pattern.get(track, step);
                    let is_current = playhead == Some(step);
                    let beat_start = step % subdivision == 0;

                    let fill = if enabled && muted {
                        egui::Color32::from_rgb(70, 70, 110)
                    } else if enabled {
                        egui::Color32::from_rgb(60, 60, 200)
                    } else if is_current {
                        egui::Color32::from_rgb(70, 110, 70)
                    } else if beat_start {
                        egui::Color32::from_rgb(55, 55, 55)
                    } else {
                        egui::Color32::from_rgb(40, 40, 40)
                    };

                    let button = egui::Button::new("").min_size(egui::vec2(24.0, 24.0)).fill(fill);
                    if ui.add(button).clicked() {
                        self.session.toggle_cell(track, step);
                    }
                }
                ui.end_row();
            }
        });
    }

    fn midi_ui(&mut self, ui: &mut egui::Ui) {
        let mut selected_port_changed = None;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_label("")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
            }
        });

        if let Some(port_idx) = selected_port_changed {
            self.connect_midi(port_idx);
        }
    }

    fn proposal_ui(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("Load pattern JSON", |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.proposal_text)
                    .hint_text(r#"{"pattern": [[true, false, ...], ...]}"#)
                    .desired_rows(4),
            );
            if ui.button("Apply").clicked() {
                match self.session.apply_proposal(&self.proposal_text) {
                    Ok(()) => {
                        self.proposal_text.clear();
                        self.status = None;
                    }
                    Err(err) => self.status = Some(format!("Failed to load pattern: {err}")),
                }
            }
        });
    }
}

#[cfg(feature = "gui")]
impl eframe::App for SequencerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        if !ctx.wants_keyboard_input() && ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.session.toggle_play();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("RhythmCraft");
            ui.add_space(10.0);

            self.midi_ui(ui);
            ui.add_space(10.0);
            self.transport_ui(ui);
            ui.add_space(20.0);
            self.grid_ui(ui);

            ui.separator();
            self.proposal_ui(ui);

            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::YELLOW, status);
            }
            if self.session.voices().0.is_none() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No audio output - MIDI playback only",
                );
            }
        });
    }
}
