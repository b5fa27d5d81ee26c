mod cards;
mod state;
mod ui;

use crate::api::SeguimientoClient;
use crate::auth::validate_login;
use crate::config::AppConfig;
use crate::export::export_pdf;
use crate::session::{BackNavigation, SessionContext};
use crate::staging::{
    load_preview, stream_images, CandidateFile, HydrationRequest, ImageId, StagingList,
};
use crate::upload::{SubmitProcessor, UploadStatus};
use cards::CardBoard;
use eframe::{egui, App};
use state::{
    ActionProgress, AppEvent, Dialog, HydrationProgress, MessageKind, Screen, UiState,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

/// What the user asked for during one frame. Applied after rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Login,
    Logout,
    OpenFamily,
    OpenCreateFamily,
    ConfirmCreateFamily,
    PickImages,
    RemoveImage(ImageId),
    ViewImage(ImageId),
    CloseViewer,
    RequestClearImages,
    ConfirmClearImages,
    CloseDialog,
    FinishFamily,
    Submit,
    GoBack,
    ExportPdf,
    AddCompromiso,
    RemoveCompromiso(usize),
    AddParticipante,
    RemoveParticipante(usize),
    AddComment,
}

pub struct SeguimientoApp {
    config: AppConfig,
    client: SeguimientoClient,
    runtime: tokio::runtime::Handle,
    ctx: egui::Context,
    sender: std_mpsc::Sender<AppEvent>,
    receiver: std_mpsc::Receiver<AppEvent>,
    adviser_id: Option<String>,
    session: Option<SessionContext>,
    state: UiState,
    staging: StagingList,
    cards: CardBoard,
    hydration: HydrationProgress,
}

impl SeguimientoApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        client: SeguimientoClient,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        tracing::info!("Starting follow-up client against {}", config.base_url);
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let (sender, receiver) = std_mpsc::channel();
        Self {
            staging: StagingList::new(config.max_image_bytes),
            cards: CardBoard::new(config.remove_animation()),
            config,
            client,
            runtime,
            ctx: cc.egui_ctx.clone(),
            sender,
            receiver,
            adviser_id: None,
            session: None,
            state: UiState::default(),
            hydration: HydrationProgress::default(),
        }
    }

    /// Runs `task` on the runtime and delivers its event to the UI thread.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let sender = self.sender.clone();
        let ctx = self.ctx.clone();
        self.runtime.spawn(async move {
            let event = task.await;
            if sender.send(event).is_err() {
                tracing::debug!("UI closed before task finished");
            }
            ctx.request_repaint();
        });
    }

    fn login(&mut self) {
        let username = self.state.login.username.trim().to_string();
        let password = self.state.login.password.clone();

        if let Err(errors) = validate_login(&username, &password) {
            self.state.login.errors = errors;
            return;
        }
        self.state.login.errors = Default::default();
        self.state.progress = ActionProgress::LoggingIn;

        let client = self.client.clone();
        self.spawn(async move {
            let result = client
                .login(&username, &password)
                .await
                .map(|_| username)
                .map_err(|e| e.user_message());
            AppEvent::LoggedIn(result)
        });
    }

    fn logout(&mut self) {
        let client = self.client.clone();
        self.spawn(async move {
            if let Err(e) = client.logout().await {
                tracing::warn!("Logout failed: {}", e);
            }
            AppEvent::LoggedOut
        });
    }

    fn open_family(&mut self) {
        let family = self.state.family_input.trim().to_string();
        let Some(adviser) = self.adviser_id.clone() else {
            self.state.screen = Screen::Login;
            return;
        };
        if family.is_empty() {
            self.state
                .push_dialog(Dialog::error("Debe ingresar un número de documento"));
            return;
        }

        tracing::info!("Opening follow-ups for family {}", family);
        self.session = Some(SessionContext::open(family, adviser, self.config.max_steps));
        self.state.reset_form();
        self.state.screen = Screen::Form;
        self.load_step();
    }

    fn leave_form(&mut self) {
        self.session = None;
        self.hydration.cancel();
        // invalidates any hydration still in flight
        self.staging.begin_hydration();
        self.state.reset_form();
        self.state.screen = Screen::Families;
    }

    fn load_step(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let step = session.step();
        self.state.progress = ActionProgress::Loading { step };

        let client = self.client.clone();
        self.spawn(async move {
            let result = client
                .get_seguimiento(&session)
                .await
                .map_err(|e| e.user_message());
            AppEvent::SnapshotLoaded { step, result }
        });
    }

    /// Replaces the staged images with the ones stored for this step.
    /// Results are streamed back tagged with the run's token; a later call
    /// makes them stale.
    fn start_hydration(&mut self, request: HydrationRequest) {
        let token = self.staging.begin_hydration();
        if request.names().is_empty() {
            self.hydration.cancel();
            return;
        }
        self.hydration.start(token);

        let client = self.client.clone();
        let sender = self.sender.clone();
        let ctx = self.ctx.clone();
        self.runtime.spawn(async move {
            let failed = stream_images(&client, &request, |image| {
                if sender.send(AppEvent::ImageHydrated { token, image }).is_err() {
                    tracing::debug!("UI closed while images were loading");
                }
                ctx.request_repaint();
            })
            .await;
            if sender
                .send(AppEvent::HydrationFinished { token, failed })
                .is_err()
            {
                tracing::debug!("UI closed before images finished loading");
            }
            ctx.request_repaint();
        });
    }

    fn add_files(&mut self, paths: Vec<PathBuf>) {
        let mut unreadable = Vec::new();
        let candidates: Vec<CandidateFile> = paths
            .iter()
            .filter_map(|path| match CandidateFile::from_path(path) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", path.display(), e);
                    unreadable.push(format!("{}: Archivo no válido", path.display()));
                    None
                }
            })
            .collect();

        let report = self.staging.add(candidates);

        let mut errors = unreadable;
        errors.extend(report.error_message());
        if !errors.is_empty() {
            self.state.show_error(errors.join(", "));
        }
        if let Some(message) = report.success_message() {
            self.state.show_success(message);
        }

        for id in report.accepted {
            let Some(file) = self.staging.local_file(id).cloned() else {
                continue;
            };
            self.spawn(async move {
                let result = load_preview(&file).await.map_err(|e| e.to_string());
                AppEvent::PreviewLoaded { id, result }
            });
        }
    }

    fn pick_images(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Imágenes", &["jpg", "jpeg", "png", "gif", "webp"])
            .pick_files()
        {
            self.add_files(paths);
        }
    }

    fn remove_image(&mut self, id: ImageId) {
        if self.state.viewer == Some(id) {
            self.state.viewer = None;
        }
        if self.staging.remove(id) {
            self.state.show_success("Imagen eliminada correctamente");
        }
    }

    fn submit(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let missing = self.state.form.missing_fields();
        if !missing.is_empty() {
            tracing::info!("Form incomplete: {:?}", missing);
            self.state.invalid_fields = missing.into_iter().collect();
            self.state.push_dialog(Dialog::message(
                MessageKind::Warning,
                "Campos incompletos",
                "Por favor, completa todos los campos requeridos antes de continuar.",
            ));
            return;
        }
        self.state.invalid_fields.clear();

        let payload = self.staging.export_payload();
        self.state.progress = ActionProgress::Submitting {
            images: payload.len(),
        };
        let processor = SubmitProcessor::new(session, self.state.form.clone(), payload);
        let client = self.client.clone();
        self.spawn(async move {
            let result = processor.run(&client).await.map_err(|e| e.user_message());
            AppEvent::Submitted(result)
        });
    }

    fn go_back(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.go_back() {
            BackNavigation::Step(_) => self.load_step(),
            BackNavigation::ExitToFamilies => self.leave_form(),
        }
    }

    fn export_pdf(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !self.state.form.is_complete() {
            self.state.push_dialog(Dialog::message(
                MessageKind::Warning,
                "Formulario incompleto",
                "Por favor, complete el formulario antes de generar el PDF.",
            ));
            return;
        }

        let form = self.state.form.clone();
        let title = session.form_title();
        let step = session.step();
        let dir = self.config.resolved_export_dir();
        self.state.progress = ActionProgress::Exporting;

        self.spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || export_pdf(&form, &title, step, &dir)).await;
            let result = match result {
                Ok(inner) => inner.map_err(|e| e.user_message()),
                Err(e) => Err(e.to_string()),
            };
            AppEvent::PdfExported(result)
        });
    }

    fn create_family(&mut self) {
        let Some(Dialog::CreateFamily {
            doc_number,
            apellido,
            error,
        }) = self.state.dialogs.front_mut()
        else {
            return;
        };

        let doc_number = doc_number.trim().to_string();
        let apellido = apellido.trim().to_string();
        if doc_number.is_empty() || apellido.is_empty() {
            *error = Some("Debe completar ambos campos".to_string());
            return;
        }

        self.state.dialogs.pop_front();
        self.state.progress = ActionProgress::CreatingFamily;
        let client = self.client.clone();
        self.spawn(async move {
            let result = client
                .create_document(&doc_number, &apellido)
                .await
                .map_err(|e| e.user_message());
            AppEvent::DocumentCreated { doc_number, result }
        });
    }

    fn add_comment(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let Some(text) = self.state.comment_to_send() else {
            return;
        };
        let step = session.step();
        self.state.progress = ActionProgress::Commenting;

        let client = self.client.clone();
        self.spawn(async move {
            let result = match client.add_comment(&session, &text).await {
                Ok(()) => client
                    .get_seguimiento(&session)
                    .await
                    .map(|snapshot| snapshot.comentarios),
                Err(e) => Err(e),
            };
            AppEvent::CommentAdded {
                step,
                result: result.map_err(|e| e.user_message()),
            }
        });
    }

    fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::Login => self.login(),
            UiAction::Logout => self.logout(),
            UiAction::OpenFamily => self.open_family(),
            UiAction::OpenCreateFamily => self.state.push_dialog(Dialog::CreateFamily {
                doc_number: String::new(),
                apellido: String::new(),
                error: None,
            }),
            UiAction::ConfirmCreateFamily => self.create_family(),
            UiAction::PickImages | UiAction::RemoveImage(_) if !self.state.can_edit_images() => {}
            UiAction::PickImages => self.pick_images(),
            UiAction::RemoveImage(id) => self.remove_image(id),
            UiAction::ViewImage(id) => self.state.viewer = Some(id),
            UiAction::CloseViewer => self.state.viewer = None,
            UiAction::RequestClearImages => {
                // nothing to confirm on an empty list
                if !self.staging.is_empty() {
                    self.state.push_dialog(Dialog::ConfirmClearImages {
                        count: self.staging.len(),
                    });
                }
            }
            UiAction::ConfirmClearImages => {
                self.state.dialogs.pop_front();
                if self.staging.clear_all(|_| true) {
                    self.state.push_dialog(Dialog::message(
                        MessageKind::Success,
                        "¡Eliminadas!",
                        "Todas las imágenes han sido eliminadas.",
                    ));
                }
            }
            UiAction::CloseDialog => {
                self.state.dialogs.pop_front();
            }
            UiAction::FinishFamily => {
                self.state.dialogs.pop_front();
                self.leave_form();
            }
            UiAction::Submit => self.submit(),
            UiAction::GoBack => self.go_back(),
            UiAction::ExportPdf => self.export_pdf(),
            UiAction::AddCompromiso => self.state.form.compromisos.push(Default::default()),
            UiAction::RemoveCompromiso(i) => {
                if i < self.state.form.compromisos.len() {
                    self.state.form.compromisos.remove(i);
                    self.state.invalid_fields.clear();
                }
            }
            UiAction::AddComment => self.add_comment(),
            UiAction::AddParticipante => self.state.form.participantes.push(Default::default()),
            UiAction::RemoveParticipante(i) => {
                if i < self.state.form.participantes.len() {
                    self.state.form.participantes.remove(i);
                }
            }
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::LoggedIn(result) => {
                self.state.progress = ActionProgress::Idle;
                match result {
                    Ok(username) => {
                        tracing::info!("Logged in as {}", username);
                        self.adviser_id = Some(username);
                        self.state.login.password.clear();
                        self.state.screen = Screen::Families;
                    }
                    Err(message) => {
                        tracing::warn!("Login failed: {}", message);
                        self.state.login.errors.username = Some(message);
                    }
                }
            }
            AppEvent::LoggedOut => {
                self.leave_form();
                self.adviser_id = None;
                self.state.screen = Screen::Login;
            }
            AppEvent::SnapshotLoaded { step, result } => {
                let Some(session) = self.session.clone() else {
                    return;
                };
                if session.step() != step {
                    tracing::debug!("Ignoring snapshot for step {}", step);
                    return;
                }
                self.state.progress = ActionProgress::Idle;
                match result {
                    Ok(snapshot) => {
                        self.state.invalid_fields.clear();
                        self.state.form = snapshot.form.clone();
                        self.state.comentarios = snapshot.comentarios.clone();
                        self.start_hydration(HydrationRequest::new(
                            session.document_key(),
                            session.step_key(),
                            snapshot.image_names_csv(),
                            self.config.image_endpoint.clone(),
                        ));
                    }
                    Err(message) => self.state.push_dialog(Dialog::error(message)),
                }
            }
            AppEvent::PreviewLoaded { id, result } => match result {
                Ok(preview) => {
                    self.staging.attach_preview(id, preview);
                }
                Err(message) => tracing::warn!("Preview for {} failed: {}", id, message),
            },
            AppEvent::ImageHydrated { token, image } => {
                self.hydration.image(&mut self.staging, token, image);
            }
            AppEvent::HydrationFinished { token, failed } => {
                if let Some(message) = self.hydration.finish(token, failed) {
                    self.state.show_success(message);
                }
            }
            AppEvent::Submitted(result) => {
                self.state.progress = ActionProgress::Idle;
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(message) => {
                        self.state.push_dialog(Dialog::error(message));
                        return;
                    }
                };

                match &outcome.images {
                    UploadStatus::Skipped => {}
                    UploadStatus::Success(count) => {
                        self.staging.clear();
                        self.state.push_dialog(Dialog::message(
                            MessageKind::Success,
                            "¡Imágenes subidas!",
                            format!("Se han subido {} imágenes correctamente.", count),
                        ));
                    }
                    UploadStatus::Error(message) => {
                        self.state.push_dialog(Dialog::message(
                            MessageKind::Error,
                            "Error con las imágenes",
                            format!(
                                "Los datos se guardaron pero hubo un problema subiendo las imágenes: {}",
                                message
                            ),
                        ));
                    }
                }

                match (outcome.next_step, self.session.as_mut()) {
                    (Some(next), Some(session)) => {
                        session.advance_to(next);
                        self.load_step();
                    }
                    _ => self.state.push_dialog(Dialog::AllStepsCompleted),
                }
            }
            AppEvent::DocumentCreated { doc_number, result } => {
                self.state.progress = ActionProgress::Idle;
                match result {
                    Ok(response) if response.success => {
                        tracing::info!("Family {} created", doc_number);
                        self.state.family_input = doc_number;
                        self.state.push_dialog(Dialog::message(
                            MessageKind::Success,
                            "¡Familia creada!",
                            "La carpeta y el archivo JSON fueron generados correctamente.",
                        ));
                    }
                    Ok(response) => self.state.push_dialog(Dialog::error(
                        response
                            .detail
                            .unwrap_or_else(|| "Hubo un error al crear la familia.".to_string()),
                    )),
                    Err(message) => self.state.push_dialog(Dialog::error(message)),
                }
            }
            AppEvent::CommentAdded { step, result } => {
                self.state.progress = ActionProgress::Idle;
                if self.session.as_ref().map(SessionContext::step) != Some(step) {
                    return;
                }
                match result {
                    Ok(comentarios) => {
                        self.state.comentarios = comentarios;
                        self.state.comment_draft.clear();
                        self.state.show_success("Comentario agregado");
                    }
                    Err(message) => self.state.push_dialog(Dialog::error(message)),
                }
            }
            AppEvent::PdfExported(result) => {
                self.state.progress = ActionProgress::Idle;
                match result {
                    Ok(path) => {
                        self.state
                            .show_success(format!("PDF guardado en {}", path.display()));
                        if self.config.open_exported_pdf {
                            if let Err(e) = open::that(&path) {
                                tracing::warn!("Could not open {}: {}", path.display(), e);
                            }
                        }
                    }
                    Err(message) => self.state.push_dialog(Dialog::error(format!(
                        "Ocurrió un error al generar el PDF: {}",
                        message
                    ))),
                }
            }
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.receiver.try_recv() {
            self.handle_event(event);
        }

        if self.state.screen == Screen::Form {
            let dropped: Vec<PathBuf> = ctx.input(|i| {
                i.raw
                    .dropped_files
                    .iter()
                    .filter_map(|f| f.path.clone())
                    .collect()
            });
            if !dropped.is_empty() {
                if self.state.can_edit_images() {
                    self.add_files(dropped);
                } else {
                    tracing::info!("Ignoring {} dropped file(s) while busy", dropped.len());
                }
            }
        }

        let now = Instant::now();
        self.cards.sync(&mut self.staging, now);
        if self.cards.tick(now) {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
        for id in self.cards.take_released() {
            ctx.forget_image(&cards::texture_uri(id));
        }

        if let Some(left) = self.state.expire_notice(now) {
            ctx.request_repaint_after(left);
        }
    }
}

impl App for SeguimientoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        let actions = self.render(ctx);
        for action in actions {
            self.handle_action(action);
        }
    }
}
