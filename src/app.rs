//! egui front end: navigation sidebar plus one central view per router state.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex},
};

use eframe::{egui, App, Frame};
use egui::{Color32, ColorImage, RichText, TextureOptions, Visuals};

use crate::gateway::BackendGateway;
use crate::model::{HistoryEntry, TaskStatus, Theme};
use crate::router::{Transition, View};
use crate::session::{AppState, DownloadRequest, Session};
use crate::sync::EventSynchronizer;
use crate::{spawn, spawn_blocking, thumbnail};

const THUMB_SIZE: egui::Vec2 = egui::vec2(128.0, 72.0);

/// User intents collected while drawing, executed once the state lock is released
enum Action {
    Analyze,
    ConfirmSingle,
    StartBatch,
    AnalyzePlaylist,
    DownloadPlaylist,
    Download(DownloadRequest),
    RefreshHistory,
    OpenFile(String),
    OpenFolder(String),
    AskDelete(HistoryEntry),
    Delete { id: String, also_file: bool },
    CancelDelete,
    ToggleTheme,
    ChooseDirectory,
}

pub struct YtdApp {
    session: Session,
    /// Cached textures for thumbnails, keyed by URL
    thumbnails: HashMap<String, egui::TextureHandle>,
    requested: HashSet<String>,
    /// Incoming thumbnail fetch results (url, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
    /// History entry awaiting the keep/delete-file choice
    pending_delete: Option<HistoryEntry>,
    applied_theme: Option<Theme>,
}

impl YtdApp {
    pub fn new(cc: &eframe::CreationContext<'_>, gateway: Arc<dyn BackendGateway>) -> Self {
        let ctx = cc.egui_ctx.clone();
        let session = Session::new(gateway, Arc::new(move || ctx.request_repaint()));

        match EventSynchronizer::subscribe(&session) {
            Some(sync) => spawn(sync.run()),
            None => log::error!("backend event channel already taken; progress will not update"),
        }
        let startup = session.clone();
        spawn(async move { startup.load_settings().await });

        Self {
            session,
            thumbnails: HashMap::new(),
            requested: HashSet::new(),
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            pending_delete: None,
            applied_theme: None,
        }
    }

    fn run<F, Fut>(&self, flow: F)
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        spawn(flow(self.session.clone()));
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Analyze => self.run(|s| async move { s.analyze_video().await }),
            Action::ConfirmSingle => self.run(|s| async move {
                s.confirm_single().await;
            }),
            Action::StartBatch => self.run(|s| async move {
                s.start_batch_text().await;
            }),
            Action::AnalyzePlaylist => self.run(|s| async move { s.analyze_playlist().await }),
            Action::DownloadPlaylist => self.run(|s| async move {
                s.download_playlist().await;
            }),
            Action::Download(request) => self.run(move |s| async move {
                s.start_download(request).await;
            }),
            Action::RefreshHistory => self.run(|s| async move { s.refresh_history().await }),
            Action::OpenFile(path) => self.run(move |s| async move { s.open_file(&path).await }),
            Action::OpenFolder(path) => self.run(move |s| async move { s.open_folder(&path).await }),
            Action::AskDelete(entry) => self.pending_delete = Some(entry),
            Action::Delete { id, also_file } => {
                self.pending_delete = None;
                self.run(move |s| async move { s.delete_history(&id, also_file).await });
            }
            Action::CancelDelete => self.pending_delete = None,
            Action::ToggleTheme => self.run(|s| async move { s.toggle_theme().await }),
            Action::ChooseDirectory => self.run(|s| async move { s.choose_directory().await }),
        }
    }

    /// Returns the texture for `url`, starting a background fetch the first time.
    fn thumbnail(&mut self, ctx: &egui::Context, url: &str) -> Option<egui::TextureHandle> {
        if url.is_empty() {
            return None;
        }
        if let Some(tex) = self.thumbnails.get(url) {
            return Some(tex.clone());
        }
        if self.requested.insert(url.to_string()) {
            let url_c = url.to_string();
            let results = Arc::clone(&self.thumbnail_results);
            let ctx_c = ctx.clone();
            spawn_blocking(move || {
                if let Some(img) = thumbnail::fetch_thumbnail(&url_c) {
                    if let Ok(mut pending) = results.lock() {
                        pending.push((url_c, img));
                    }
                    ctx_c.request_repaint();
                }
            });
        }
        None
    }

    fn show_thumbnail(&mut self, ui: &mut egui::Ui, url: &str, size: egui::Vec2) {
        match self.thumbnail(ui.ctx(), url) {
            Some(tex) => {
                ui.add(egui::Image::new(&tex).fit_to_exact_size(size));
            }
            None => {
                ui.allocate_exact_size(size, egui::Sense::hover());
            }
        }
    }

    fn sidebar(ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<Action>) {
        ui.add_space(12.0);
        for view in View::ALL {
            if view == View::Settings {
                ui.separator();
            }
            let mut label = view.title().to_string();
            if view == View::Downloading && !state.tasks.is_empty() {
                label = format!("{}  ({})", label, state.tasks.len());
            }
            if ui.selectable_label(state.router.active() == view, label).clicked() {
                select_view(state, view, actions);
            }
        }
    }

    fn view_single(&mut self, ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<Action>) {
        ui.heading("Single video");
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut state.single.url);
            let label = if state.analyzing { "Analyzing…" } else { "Analyze" };
            if ui.add_enabled(!state.analyzing, egui::Button::new(label)).clicked() {
                actions.push(Action::Analyze);
            }
        });

        let single = &mut state.single;
        let Some(details) = &single.details else {
            return;
        };
        ui.add_space(12.0);
        ui.group(|ui| {
            ui.horizontal(|ui| {
                self.show_thumbnail(ui, &details.thumbnail, egui::vec2(200.0, 112.0));
                ui.label(RichText::new(&details.title).strong());
            });

            ui.add_space(8.0);
            ui.weak("Category | ID | Extension | Resolution");
            let selected = details
                .processed_formats
                .iter()
                .find(|f| f.format_id == single.selected_format)
                .map(|f| f.label.as_str())
                .unwrap_or("Auto (best video + best audio)");
            egui::ComboBox::from_id_source("format")
                .width(ui.available_width())
                .selected_text(RichText::new(selected).monospace())
                .show_ui(ui, |ui| {
                    ui.selectable_value(
                        &mut single.selected_format,
                        String::new(),
                        "Auto (best video + best audio)",
                    );
                    for f in &details.processed_formats {
                        ui.selectable_value(
                            &mut single.selected_format,
                            f.format_id.clone(),
                            RichText::new(&f.label).monospace(),
                        );
                    }
                });

            ui.add_space(8.0);
            if ui.button("Add to download queue").clicked() {
                actions.push(Action::ConfirmSingle);
            }
        });
    }

    fn view_batch(&mut self, ui: &mut egui::Ui, state: &mut AppState, actions: &mut Vec<Action>) {
        ui.heading("Batch & playlist");
        ui.weak("Batch: one video URL per line. Playlist: paste a playlist URL and analyze it.");
        ui.add(
            egui::TextEdit::multiline(&mut state.batch.urls)
                .desired_rows(6)
                .desired_width(f32::INFINITY)
                .code_editor(),
        );

        ui.horizontal(|ui| {
            let has_text = !state.batch.urls.trim().is_empty();
            if ui
                .add_enabled(has_text && !state.analyzing, egui::Button::new("Start batch"))
                .clicked()
            {
                actions.push(Action::StartBatch);
            }
            let label = if state.analyzing { "Analyzing playlist…" } else { "Analyze playlist" };
            if ui
                .add_enabled(has_text && !state.analyzing, egui::Button::new(label))
                .clicked()
            {
                actions.push(Action::AnalyzePlaylist);
            }
        });

        if state.batch.playlist.is_empty() {
            return;
        }
        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.strong(format!("Playlist ({} videos)", state.batch.playlist.len()));
            if ui.button("Download all").clicked() {
                actions.push(Action::DownloadPlaylist);
            }
        });
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for item in &state.batch.playlist {
                    ui.horizontal(|ui| {
                        self.show_thumbnail(ui, &item.thumbnail, egui::vec2(80.0, 45.0));
                        ui.label(item.title.as_str());
                        if ui.small_button("Download").clicked() {
                            actions.push(Action::Download(DownloadRequest::from(item)));
                        }
                    });
                    ui.separator();
                }
            });
    }

    fn view_downloading(&mut self, ui: &mut egui::Ui, state: &AppState) {
        ui.heading("Current downloads");
        if state.tasks.is_empty() {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| ui.weak("No running tasks"));
            return;
        }
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for task in state.tasks.iter() {
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            self.show_thumbnail(ui, &task.thumbnail, THUMB_SIZE);
                            ui.vertical(|ui| {
                                ui.label(RichText::new(&task.title).strong());
                                ui.add(
                                    egui::ProgressBar::new(task.percent / 100.0)
                                        .text(format!("{:.1}% [{}]", task.percent, task.status.label())),
                                );
                                let stats = format!("⚡ {} | ⏱ remaining: {}", task.speed, task.eta);
                                if task.status == TaskStatus::Error {
                                    ui.colored_label(Color32::RED, stats);
                                } else {
                                    ui.weak(stats);
                                }
                            });
                        });
                    });
                }
            });
    }

    fn view_history(&mut self, ui: &mut egui::Ui, state: &AppState, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            ui.heading("Download history");
            if ui.button("🔄 Refresh").clicked() {
                actions.push(Action::RefreshHistory);
            }
        });
        if state.history.is_empty() {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| ui.weak("No downloads yet"));
            return;
        }
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for entry in state.history.entries() {
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            self.show_thumbnail(ui, &entry.thumbnail, THUMB_SIZE);
                            ui.vertical(|ui| {
                                ui.label(RichText::new(&entry.title).strong());
                                ui.horizontal(|ui| {
                                    if ui.button("▶ Play").clicked() {
                                        actions.push(Action::OpenFile(entry.file_path.clone()));
                                    }
                                    if ui.button("📂 Open folder").clicked() {
                                        actions.push(Action::OpenFolder(entry.file_path.clone()));
                                    }
                                    if ui
                                        .add(egui::Button::new(RichText::new("🗑 Delete").color(Color32::RED)))
                                        .clicked()
                                    {
                                        actions.push(Action::AskDelete(entry.clone()));
                                    }
                                });
                            });
                        });
                    });
                }
            });
    }

    fn view_settings(ui: &mut egui::Ui, state: &AppState, actions: &mut Vec<Action>) {
        ui.heading("Settings");
        ui.add_space(12.0);
        ui.strong("Download folder");
        ui.horizontal(|ui| {
            let shown = if state.settings.download_path.is_empty() {
                "(default location)"
            } else {
                state.settings.download_path.as_str()
            };
            ui.label(shown);
            if ui.button("Browse…").clicked() {
                actions.push(Action::ChooseDirectory);
            }
        });
        ui.add_space(20.0);
        ui.strong("Appearance");
        let label = match state.settings.theme {
            Theme::Light => "🌙 Switch to dark mode",
            Theme::Dark => "☀ Switch to light mode",
        };
        if ui.button(label).clicked() {
            actions.push(Action::ToggleTheme);
        }
    }

    fn delete_dialog(&self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        let Some(entry) = &self.pending_delete else {
            return;
        };
        egui::Window::new("Delete download")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Remove \"{}\" from history.", entry.title));
                ui.label("Delete the downloaded file as well?");
                ui.horizontal(|ui| {
                    if ui.button("Delete file").clicked() {
                        actions.push(Action::Delete { id: entry.id.clone(), also_file: true });
                    }
                    if ui.button("Keep file").clicked() {
                        actions.push(Action::Delete { id: entry.id.clone(), also_file: false });
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(Action::CancelDelete);
                    }
                });
            });
    }
}

/// Applies a sidebar click within the current frame. Only the history refresh
/// it may trigger is deferred to the runtime.
fn select_view(state: &mut AppState, view: View, actions: &mut Vec<Action>) {
    if state.router.navigate(view) == Transition::RefreshHistory {
        actions.push(Action::RefreshHistory);
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for YtdApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Handle completed thumbnail fetches
        if let Ok(mut pending) = self.thumbnail_results.lock() {
            for (url, img) in pending.drain(..) {
                let tex = ctx.load_texture(&url, img, TextureOptions::default());
                self.thumbnails.insert(url, tex);
            }
        }

        let session = self.session.clone();
        let mut actions = Vec::new();
        {
            let mut guard = session.state();
            let state = &mut *guard;

            let theme = state.settings.theme;
            if self.applied_theme != Some(theme) {
                ctx.set_visuals(match theme {
                    Theme::Light => Visuals::light(),
                    Theme::Dark => Visuals::dark(),
                });
                self.applied_theme = Some(theme);
            }

            egui::SidePanel::left("nav")
                .resizable(false)
                .exact_width(200.0)
                .show(ctx, |ui| Self::sidebar(ui, state, &mut actions));

            egui::CentralPanel::default().show(ctx, |ui| match state.router.active() {
                View::Single => self.view_single(ui, state, &mut actions),
                View::Batch => self.view_batch(ui, state, &mut actions),
                View::Downloading => self.view_downloading(ui, state),
                View::Finished => self.view_history(ui, state, &mut actions),
                View::Settings => Self::view_settings(ui, state, &mut actions),
            });
        }

        self.delete_dialog(ctx, &mut actions);
        for action in actions {
            self.apply(action);
        }
    }
}
