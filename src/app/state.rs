use crate::api::{Comentario, CreateDocumentResponse, SeguimientoSnapshot};
use crate::auth::LoginErrors;
use crate::form::{FormField, SeguimientoForm};
use crate::staging::{
    FetchedImage, HydrationSummary, HydrationToken, ImageId, Preview, StagingList,
};
use crate::upload::SubmitOutcome;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const SUCCESS_NOTICE: Duration = Duration::from_secs(3);
const ERROR_NOTICE: Duration = Duration::from_secs(5);

/// Results sent back from background tasks to the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    LoggedIn(Result<String, String>),
    LoggedOut,
    SnapshotLoaded {
        step: u32,
        result: Result<SeguimientoSnapshot, String>,
    },
    PreviewLoaded {
        id: ImageId,
        result: Result<Preview, String>,
    },
    ImageHydrated {
        token: HydrationToken,
        image: FetchedImage,
    },
    HydrationFinished {
        token: HydrationToken,
        failed: usize,
    },
    Submitted(Result<SubmitOutcome, String>),
    DocumentCreated {
        doc_number: String,
        result: Result<CreateDocumentResponse, String>,
    },
    PdfExported(Result<PathBuf, String>),
    /// Comments reloaded after posting one.
    CommentAdded {
        step: u32,
        result: Result<Vec<Comentario>, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Login,
    Families,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Message {
        kind: MessageKind,
        title: String,
        text: String,
    },
    ConfirmClearImages {
        count: usize,
    },
    CreateFamily {
        doc_number: String,
        apellido: String,
        error: Option<String>,
    },
    AllStepsCompleted,
}

impl Dialog {
    pub fn error(text: impl Into<String>) -> Self {
        Dialog::Message {
            kind: MessageKind::Error,
            title: "Error".to_string(),
            text: text.into(),
        }
    }

    pub fn message(kind: MessageKind, title: impl Into<String>, text: impl Into<String>) -> Self {
        Dialog::Message {
            kind,
            title: title.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Short-lived banner above the image grid.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub expires_at: Instant,
}

#[derive(Clone, Default)]
pub enum ActionProgress {
    #[default]
    Idle,
    LoggingIn,
    Loading {
        step: u32,
    },
    Submitting {
        images: usize,
    },
    CreatingFamily,
    Exporting,
    Commenting,
}

#[derive(Default)]
pub struct LoginState {
    pub username: String,
    pub password: String,
    pub show_password: bool,
    pub errors: LoginErrors,
}

/// In-flight hydration and how many of its images landed so far.
#[derive(Debug, Clone, Copy)]
struct HydrationRun {
    token: HydrationToken,
    loaded: usize,
}

/// Applies hydration results arriving over the channel. Only the run
/// started last may add images or report a summary.
#[derive(Debug, Default)]
pub struct HydrationProgress {
    run: Option<HydrationRun>,
}

impl HydrationProgress {
    pub fn start(&mut self, token: HydrationToken) {
        self.run = Some(HydrationRun { token, loaded: 0 });
    }

    pub fn cancel(&mut self) {
        self.run = None;
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn image(&mut self, staging: &mut StagingList, token: HydrationToken, image: FetchedImage) {
        if !staging.apply_hydrated(token, image) {
            return;
        }
        if let Some(run) = self.run.as_mut().filter(|r| r.token == token) {
            run.loaded += 1;
        }
    }

    /// Closes the run and returns the message to show, if any.
    pub fn finish(&mut self, token: HydrationToken, failed: usize) -> Option<String> {
        let run = self.run.filter(|r| r.token == token)?;
        self.run = None;
        HydrationSummary {
            loaded: run.loaded,
            failed,
        }
        .message()
    }
}

#[derive(Default)]
pub struct UiState {
    pub screen: Screen,
    pub progress: ActionProgress,
    pub login: LoginState,
    pub family_input: String,
    pub form: SeguimientoForm,
    pub comentarios: Vec<Comentario>,
    pub comment_draft: String,
    pub invalid_fields: HashSet<FormField>,
    pub dialogs: VecDeque<Dialog>,
    pub notice: Option<Notice>,
    pub viewer: Option<ImageId>,
}

impl UiState {
    pub fn is_busy(&self) -> bool {
        !matches!(self.progress, ActionProgress::Idle)
    }

    /// Staged images are frozen while a request runs, so a submit never
    /// clears an image it did not upload.
    pub fn can_edit_images(&self) -> bool {
        !self.is_busy() && self.dialogs.is_empty()
    }

    pub fn show_success(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Success,
            text: text.into(),
            expires_at: Instant::now() + SUCCESS_NOTICE,
        });
    }

    pub fn show_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            text: text.into(),
            expires_at: Instant::now() + ERROR_NOTICE,
        });
    }

    /// Drops the notice once it expired. Returns the time left otherwise.
    pub fn expire_notice(&mut self, now: Instant) -> Option<Duration> {
        let expires_at = self.notice.as_ref()?.expires_at;
        if now >= expires_at {
            self.notice = None;
            None
        } else {
            Some(expires_at - now)
        }
    }

    /// The trimmed draft, or `None` when there is nothing to send.
    pub fn comment_to_send(&self) -> Option<String> {
        let text = self.comment_draft.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn push_dialog(&mut self, dialog: Dialog) {
        self.dialogs.push_back(dialog);
    }

    pub fn reset_form(&mut self) {
        self.form = SeguimientoForm::default();
        self.comentarios.clear();
        self.comment_draft.clear();
        self.invalid_fields.clear();
        self.viewer = None;
    }

    pub fn get_status_text(&self) -> String {
        match &self.progress {
            ActionProgress::Idle => String::new(),
            ActionProgress::LoggingIn => "Iniciando sesión...".to_string(),
            ActionProgress::Loading { step } => format!("Cargando seguimiento {}...", step),
            ActionProgress::Submitting { images: 0 } => "Guardando seguimiento...".to_string(),
            ActionProgress::Submitting { images } => {
                format!("Guardando seguimiento y subiendo {} imagen(es)...", images)
            }
            ActionProgress::CreatingFamily => "Creando familia...".to_string(),
            ActionProgress::Exporting => "Generando PDF...".to_string(),
            ActionProgress::Commenting => "Agregando comentario...".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_expires() {
        let mut state = UiState::default();
        state.show_success("listo");
        let created = Instant::now();

        assert!(state.expire_notice(created).is_some());
        assert!(state.notice.is_some());

        assert!(state.expire_notice(created + Duration::from_secs(4)).is_none());
        assert!(state.notice.is_none());
    }

    #[test]
    fn test_error_notice_lasts_longer() {
        let mut state = UiState::default();
        state.show_error("falló");
        let left = state.expire_notice(Instant::now()).unwrap();
        assert!(left > SUCCESS_NOTICE);
    }

    fn image(name: &str) -> FetchedImage {
        FetchedImage {
            name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xFFu8, 0xD8].into(),
        }
    }

    #[test]
    fn test_hydration_results_follow_latest_run() {
        let mut staging = StagingList::default();
        let mut progress = HydrationProgress::default();

        let old = staging.begin_hydration();
        progress.start(old);
        let current = staging.begin_hydration();
        progress.start(current);

        progress.image(&mut staging, old, image("vieja.jpg"));
        assert!(staging.is_empty());

        progress.image(&mut staging, current, image("a.jpg"));
        progress.image(&mut staging, current, image("b.jpg"));
        assert_eq!(staging.len(), 2);

        assert_eq!(progress.finish(old, 0), None);
        assert!(progress.is_running());

        assert_eq!(
            progress.finish(current, 1).as_deref(),
            Some("2 imagen(es) cargada(s) desde el servidor")
        );
        assert!(!progress.is_running());
        assert_eq!(progress.finish(current, 0), None);
    }

    #[test]
    fn test_cancelled_hydration_reports_nothing() {
        let mut staging = StagingList::default();
        let mut progress = HydrationProgress::default();

        let token = staging.begin_hydration();
        progress.start(token);
        progress.cancel();
        staging.begin_hydration();

        progress.image(&mut staging, token, image("a.jpg"));
        assert!(staging.is_empty());
        assert_eq!(progress.finish(token, 0), None);
    }

    #[test]
    fn test_images_frozen_while_busy() {
        let mut state = UiState::default();
        assert!(state.can_edit_images());

        state.progress = ActionProgress::Submitting { images: 1 };
        assert!(!state.can_edit_images());

        state.progress = ActionProgress::Idle;
        state.push_dialog(Dialog::error("x"));
        assert!(!state.can_edit_images());
    }

    #[test]
    fn test_blank_comment_is_not_sent() {
        let mut state = UiState::default();
        assert_eq!(state.comment_to_send(), None);

        state.comment_draft = "  \n ".to_string();
        assert_eq!(state.comment_to_send(), None);

        state.comment_draft = "  Visita reprogramada \n".to_string();
        assert_eq!(state.comment_to_send().as_deref(), Some("Visita reprogramada"));

        state.reset_form();
        assert!(state.comment_draft.is_empty());
    }

    #[test]
    fn test_status_text() {
        let mut state = UiState::default();
        assert!(!state.is_busy());
        assert_eq!(state.get_status_text(), "");

        state.progress = ActionProgress::Submitting { images: 2 };
        assert!(state.is_busy());
        assert_eq!(
            state.get_status_text(),
            "Guardando seguimiento y subiendo 2 imagen(es)..."
        );
    }
}
