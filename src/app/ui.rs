use super::state::{Dialog, MessageKind, NoticeKind, Screen};
use super::{SeguimientoApp, UiAction};
use crate::form::{FormField, DIMENSIONES};
use crate::staging::EntryState;
use crate::utils::color::palette;
use crate::utils::file_size::FileSizeUtils;
use eframe::egui::{self, Align, Align2, Color32, RichText, Stroke};
use std::time::Instant;

const CARD_WIDTH: f32 = 140.0;
const THUMB_SIZE: f32 = 120.0;

impl SeguimientoApp {
    /// Draws the frame and returns what the user asked for.
    pub fn render(&mut self, ctx: &egui::Context) -> Vec<UiAction> {
        let mut actions = Vec::new();
        let blocked = !self.state.dialogs.is_empty() || self.state.viewer.is_some();

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.state.is_busy() {
                    ui.spinner();
                }
                ui.label(self.state.get_status_text());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!blocked, |ui| match self.state.screen {
                Screen::Login => self.render_login(ui, &mut actions),
                Screen::Families => self.render_families(ui, &mut actions),
                Screen::Form => {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| self.render_form(ui, &mut actions));
                }
            });
        });

        self.render_dialog(ctx, &mut actions);
        self.render_viewer(ctx, &mut actions);
        actions
    }

    fn render_login(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let busy = self.state.is_busy();
        let login = &mut self.state.login;

        ui.add_space(60.0);
        ui.vertical_centered(|ui| {
            ui.heading("Seguimiento a familias");
            ui.add_space(5.0);
            ui.label(
                RichText::new("Ingrese con su usuario de asesor")
                    .color(ui.visuals().text_color().gamma_multiply(0.7)),
            );
            ui.add_space(20.0);

            ui.group(|ui| {
                ui.set_width(320.0);
                ui.label("Usuario");
                ui.add(egui::TextEdit::singleline(&mut login.username).desired_width(300.0));
                if let Some(error) = &login.errors.username {
                    ui.colored_label(palette::error(), error.as_str());
                }

                ui.add_space(8.0);
                ui.label("Contraseña");
                let password = ui.add(
                    egui::TextEdit::singleline(&mut login.password)
                        .password(!login.show_password)
                        .desired_width(300.0),
                );
                if let Some(error) = &login.errors.password {
                    ui.colored_label(palette::error(), error.as_str());
                }
                ui.checkbox(&mut login.show_password, "Mostrar contraseña");

                let submitted =
                    password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(10.0);
                ui.add_enabled_ui(!busy, |ui| {
                    let button = egui::Button::new("Ingresar").min_size(egui::vec2(300.0, 32.0));
                    if ui.add(button).clicked() || (submitted && !busy) {
                        actions.push(UiAction::Login);
                    }
                });
            });
        });
    }

    fn render_families(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let busy = self.state.is_busy();

        ui.horizontal(|ui| {
            if let Some(adviser) = &self.adviser_id {
                ui.label(format!("Asesor: {}", adviser));
            }
            ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                if ui.button("Cerrar sesión").clicked() {
                    actions.push(UiAction::Logout);
                }
            });
        });
        ui.separator();

        ui.add_space(40.0);
        ui.vertical_centered(|ui| {
            ui.heading("Familias");
            ui.add_space(20.0);
            ui.group(|ui| {
                ui.set_width(360.0);
                ui.label("Número de documento de la familia");
                let input = ui.add(
                    egui::TextEdit::singleline(&mut self.state.family_input)
                        .hint_text("Ej. 1234567890")
                        .desired_width(340.0),
                );
                let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(10.0);
                ui.add_enabled_ui(!busy, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("📂 Abrir seguimientos").clicked() || submitted {
                            actions.push(UiAction::OpenFamily);
                        }
                        if ui.button("➕ Crear familia").clicked() {
                            actions.push(UiAction::OpenCreateFamily);
                        }
                    });
                });
            });
        });
    }

    fn render_form(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let busy = self.state.is_busy();

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            for i in 1..=session.max_steps() {
                let (dot, color) = if i == session.step() {
                    ("●", palette::accent())
                } else if session.is_step_reached(i) {
                    ("●", palette::success())
                } else {
                    ("○", palette::muted())
                };
                ui.colored_label(color, dot).on_hover_text(format!("Seguimiento {}", i));
            }
            ui.add_space(8.0);
            ui.label(session.progress_label());
        });

        ui.add_space(5.0);
        ui.heading(session.form_title());
        ui.label(
            RichText::new(format!(
                "Documento {} · Asesor {}",
                session.family_id(),
                session.adviser_id()
            ))
            .small()
            .color(palette::muted()),
        );
        ui.separator();

        self.render_fields(ui, actions);
        ui.add_space(15.0);

        ui.label(RichText::new("Comentarios").strong());
        ui.group(|ui| {
            ui.set_min_width(ui.available_width());
            if self.state.comentarios.is_empty() {
                ui.label(RichText::new("Sin comentarios").color(palette::muted()));
            }
            for comentario in &self.state.comentarios {
                ui.label(
                    RichText::new(format!("{} · {}", comentario.autor, comentario.fecha))
                        .small()
                        .color(palette::muted()),
                );
                ui.label(comentario.contenido.as_str());
                ui.add_space(4.0);
            }
            ui.separator();
            ui.add(
                egui::TextEdit::multiline(&mut self.state.comment_draft)
                    .hint_text("Escriba un comentario")
                    .desired_rows(2)
                    .desired_width(f32::INFINITY),
            );
            let can_send = !busy && self.state.comment_to_send().is_some();
            ui.add_enabled_ui(can_send, |ui| {
                if ui.button("💬 Agregar comentario").clicked() {
                    actions.push(UiAction::AddComment);
                }
            });
        });
        ui.add_space(15.0);

        self.render_images(ui, actions);
        ui.add_space(20.0);

        ui.add_enabled_ui(!busy, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⬅ Regresar").clicked() {
                    actions.push(UiAction::GoBack);
                }
                if ui.button("📄 Exportar PDF").clicked() {
                    actions.push(UiAction::ExportPdf);
                }
                let save = egui::Button::new(
                    RichText::new("Guardar y continuar").color(Color32::WHITE),
                )
                .fill(palette::accent())
                .min_size(egui::vec2(180.0, 32.0));
                if ui.add(save).clicked() {
                    actions.push(UiAction::Submit);
                }
            });
        });
        ui.add_space(20.0);
    }

    fn render_fields(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let invalid = &self.state.invalid_fields;
        let form = &mut self.state.form;

        ui.label(RichText::new("Dimensiones a intervenir").strong());
        if invalid.contains(&FormField::Dimensiones) {
            ui.colored_label(palette::error(), "Seleccione al menos una dimensión");
        }
        egui::Grid::new("dimensiones").num_columns(3).show(ui, |ui| {
            for (i, (id, label)) in DIMENSIONES.iter().enumerate() {
                let mut checked = form.has_dimension(id);
                if ui.checkbox(&mut checked, *label).changed() {
                    form.set_dimension(id, checked);
                }
                if i % 3 == 2 {
                    ui.end_row();
                }
            }
        });

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            ui.label("Fecha");
            let r = ui.add(
                egui::TextEdit::singleline(&mut form.fecha)
                    .hint_text("AAAA-MM-DD")
                    .desired_width(110.0),
            );
            mark_invalid(ui, &r, invalid.contains(&FormField::Fecha));
            ui.add_space(10.0);
            ui.label("Hora");
            let r = ui.add(
                egui::TextEdit::singleline(&mut form.hora)
                    .hint_text("HH:MM")
                    .desired_width(70.0),
            );
            mark_invalid(ui, &r, invalid.contains(&FormField::Hora));
        });

        ui.add_space(10.0);
        let sections = [
            ("Objetivo de la visita", &mut form.objetivo, Some(FormField::Objetivo)),
            ("Aspectos abordados", &mut form.aspectos, None),
            ("Avances", &mut form.avances, None),
            ("Retos", &mut form.retos, None),
            ("Oportunidades", &mut form.oportunidades, None),
        ];
        for (label, text, field) in sections {
            ui.label(RichText::new(label).strong());
            let r = ui.add(
                egui::TextEdit::multiline(text)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
            mark_invalid(ui, &r, field.is_some_and(|f| invalid.contains(&f)));
            ui.add_space(6.0);
        }

        ui.add_space(6.0);
        ui.label(RichText::new("Compromisos").strong());
        for (i, compromiso) in form.compromisos.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut compromiso.descripcion)
                        .hint_text("Descripción")
                        .desired_width(260.0),
                );
                let r = ui.add(
                    egui::TextEdit::singleline(&mut compromiso.fecha_cumplimiento)
                        .hint_text("AAAA-MM-DD")
                        .desired_width(110.0),
                );
                mark_invalid(ui, &r, invalid.contains(&FormField::CompromisoFecha(i)));
                let r = ui.add(
                    egui::TextEdit::singleline(&mut compromiso.responsable)
                        .hint_text("Responsable")
                        .desired_width(140.0),
                );
                mark_invalid(ui, &r, invalid.contains(&FormField::CompromisoResponsable(i)));
                if ui.small_button("✖").on_hover_text("Quitar").clicked() {
                    actions.push(UiAction::RemoveCompromiso(i));
                }
            });
        }
        if ui.button("➕ Agregar compromiso").clicked() {
            actions.push(UiAction::AddCompromiso);
        }

        ui.add_space(10.0);
        ui.label(RichText::new("Participantes").strong());
        for (i, participante) in form.participantes.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut participante.nombre)
                        .hint_text("Nombre")
                        .desired_width(220.0),
                );
                ui.add(
                    egui::TextEdit::singleline(&mut participante.rol)
                        .hint_text("Rol")
                        .desired_width(160.0),
                );
                if ui.small_button("✖").on_hover_text("Quitar").clicked() {
                    actions.push(UiAction::RemoveParticipante(i));
                }
            });
        }
        if ui.button("➕ Agregar participante").clicked() {
            actions.push(UiAction::AddParticipante);
        }
    }

    fn render_images(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("Evidencias fotográficas").strong());
            ui.label(
                RichText::new(format!("({})", self.staging.len())).color(palette::muted()),
            );
            let pending = self
                .staging
                .images()
                .iter()
                .filter(|img| img.state() == EntryState::PendingPreview)
                .count();
            if self.hydration.is_running() {
                ui.spinner();
                ui.label(
                    RichText::new("Cargando imágenes del servidor...")
                        .small()
                        .color(palette::muted()),
                );
            } else if pending > 0 {
                ui.spinner();
                ui.label(RichText::new("Leyendo imágenes...").small().color(palette::muted()));
            }
        });

        if let Some(notice) = &self.state.notice {
            let color = match notice.kind {
                NoticeKind::Success => palette::success(),
                NoticeKind::Error => palette::error(),
            };
            ui.colored_label(color, notice.text.as_str());
        }

        let editable = self.state.can_edit_images();
        ui.horizontal(|ui| {
            ui.add_enabled_ui(editable, |ui| {
                if ui.button("🖼 Agregar imágenes").clicked() {
                    actions.push(UiAction::PickImages);
                }
            });
            ui.add_enabled_ui(editable && !self.staging.is_empty(), |ui| {
                if ui
                    .button(RichText::new("🗑 Eliminar todas").color(palette::danger()))
                    .clicked()
                {
                    actions.push(UiAction::RequestClearImages);
                }
            });
        });

        let hovering = editable && ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let stroke = if hovering {
            Stroke::new(2.0, palette::accent())
        } else {
            Stroke::new(1.0, palette::muted())
        };

        egui::Frame::none()
            .stroke(stroke)
            .rounding(6.0)
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                if self.cards.cards().is_empty() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(20.0);
                        ui.label(
                            RichText::new("Arrastre imágenes aquí (JPG, PNG, GIF o WEBP)")
                                .color(palette::muted()),
                        );
                        ui.add_space(20.0);
                    });
                    return;
                }

                let now = Instant::now();
                ui.horizontal_wrapped(|ui| {
                    for card in self.cards.cards() {
                        let opacity = self.cards.opacity(card, now);
                        let fading = card.fading_since.is_some();

                        ui.allocate_ui(egui::vec2(CARD_WIDTH, THUMB_SIZE + 70.0), |ui| {
                            ui.group(|ui| {
                                ui.set_width(CARD_WIDTH);
                                ui.vertical_centered(|ui| {
                                    match &card.preview {
                                        Some(preview) => {
                                            let image = egui::Image::from_bytes(
                                                card.texture_uri(),
                                                egui::load::Bytes::Shared(preview.bytes.clone()),
                                            )
                                            .fit_to_exact_size(egui::vec2(THUMB_SIZE, THUMB_SIZE))
                                            .tint(Color32::WHITE.gamma_multiply(opacity));
                                            ui.add(image);
                                        }
                                        None => {
                                            ui.add_sized(
                                                [THUMB_SIZE, THUMB_SIZE],
                                                egui::Spinner::new(),
                                            );
                                        }
                                    }
                                    ui.label(RichText::new(truncate(&card.name, 18)).small())
                                        .on_hover_text(card.name.as_str());
                                    ui.label(
                                        RichText::new(FileSizeUtils::format_size(card.size))
                                            .small()
                                            .color(palette::muted()),
                                    );
                                    ui.add_enabled_ui(!fading, |ui| {
                                        ui.horizontal(|ui| {
                                            if ui.small_button("Ver").clicked() {
                                                actions.push(UiAction::ViewImage(card.id));
                                            }
                                            ui.add_enabled_ui(editable, |ui| {
                                                let remove = RichText::new("Eliminar")
                                                    .color(palette::danger());
                                                if ui.small_button(remove).clicked() {
                                                    actions.push(UiAction::RemoveImage(card.id));
                                                }
                                            });
                                        });
                                    });
                                });
                            });
                        });
                    }
                });
            });
    }

    fn render_dialog(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let Some(dialog) = self.state.dialogs.front_mut() else {
            return;
        };

        let title = match &*dialog {
            Dialog::Message { title, .. } => title.clone(),
            Dialog::ConfirmClearImages { .. } => "¿Estás seguro?".to_string(),
            Dialog::CreateFamily { .. } => "Crear familia".to_string(),
            Dialog::AllStepsCompleted => "¡Completado!".to_string(),
        };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| match dialog {
                Dialog::Message { kind, text, .. } => {
                    let color = match kind {
                        MessageKind::Success => palette::success(),
                        MessageKind::Warning => palette::accent(),
                        MessageKind::Error => palette::error(),
                    };
                    ui.colored_label(color, text.as_str());
                    ui.add_space(10.0);
                    if ui.button("Aceptar").clicked() {
                        actions.push(UiAction::CloseDialog);
                    }
                }
                Dialog::ConfirmClearImages { count } => {
                    ui.label(format!(
                        "Se eliminarán {} imágenes. Esta acción no se puede deshacer.",
                        count
                    ));
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        let confirm = egui::Button::new(
                            RichText::new("Sí, eliminar todas").color(Color32::WHITE),
                        )
                        .fill(palette::danger());
                        if ui.add(confirm).clicked() {
                            actions.push(UiAction::ConfirmClearImages);
                        }
                        if ui.button("Cancelar").clicked() {
                            actions.push(UiAction::CloseDialog);
                        }
                    });
                }
                Dialog::CreateFamily {
                    doc_number,
                    apellido,
                    error,
                } => {
                    ui.label("Número de documento");
                    ui.text_edit_singleline(doc_number);
                    ui.label("Apellido");
                    ui.text_edit_singleline(apellido);
                    if let Some(error) = error {
                        ui.colored_label(palette::error(), error.as_str());
                    }
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Crear").clicked() {
                            actions.push(UiAction::ConfirmCreateFamily);
                        }
                        if ui.button("Cancelar").clicked() {
                            actions.push(UiAction::CloseDialog);
                        }
                    });
                }
                Dialog::AllStepsCompleted => {
                    ui.label("Has completado todos los seguimientos para esta familia.");
                    ui.add_space(10.0);
                    if ui.button("Volver a familias").clicked() {
                        actions.push(UiAction::FinishFamily);
                    }
                }
            });
    }

    fn render_viewer(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let Some(id) = self.state.viewer else {
            return;
        };
        let Some(card) = self.cards.cards().iter().find(|c| c.id == id) else {
            actions.push(UiAction::CloseViewer);
            return;
        };

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            actions.push(UiAction::CloseViewer);
        }

        let max = ctx.screen_rect().size() * 0.8;
        egui::Window::new(card.name.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                match &card.preview {
                    Some(preview) => {
                        let image = egui::Image::from_bytes(
                            card.texture_uri(),
                            egui::load::Bytes::Shared(preview.bytes.clone()),
                        )
                        .max_size(max)
                        .maintain_aspect_ratio(true);
                        ui.add(image);
                    }
                    None => {
                        ui.spinner();
                    }
                }
                ui.vertical_centered(|ui| {
                    if ui.button("Cerrar").clicked() {
                        actions.push(UiAction::CloseViewer);
                    }
                });
            });
    }
}

/// Outlines a field the last submit found empty.
fn mark_invalid(ui: &egui::Ui, response: &egui::Response, invalid: bool) {
    if invalid {
        ui.painter()
            .rect_stroke(response.rect, 2.0, Stroke::new(1.5, palette::error()));
    }
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let head: String = name.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("foto.jpg", 18), "foto.jpg");
        assert_eq!(truncate("una_foto_muy_larga.jpeg", 10), "una_foto_…");
    }
}
