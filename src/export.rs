use crate::error::Result;
use crate::form::{dimension_label, SeguimientoForm};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};

// A4 portrait in points, 10 mm margins
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 28;

const BODY_SIZE: i64 = 10;
const HEADING_SIZE: i64 = 12;
const TITLE_SIZE: i64 = 16;
const WRAP_COLUMNS: usize = 95;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Title(String),
    Heading(String),
    Text(String),
    Gap,
}

impl Line {
    fn leading(&self) -> i64 {
        match self {
            Line::Title(_) => TITLE_SIZE + 10,
            Line::Heading(_) => HEADING_SIZE + 6,
            Line::Text(_) => BODY_SIZE + 4,
            Line::Gap => BODY_SIZE,
        }
    }
}

pub fn pdf_file_name(step: u32) -> String {
    format!("Seguimiento_{}.pdf", step)
}

/// Writes one follow-up as a PDF into `dir` and returns the file path.
pub fn export_pdf(form: &SeguimientoForm, title: &str, step: u32, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(pdf_file_name(step));

    let mut doc = render(form, title)?;
    doc.compress();
    doc.save(&path)?;

    tracing::info!("Exported PDF to {}", path.display());
    Ok(path)
}

fn render(form: &SeguimientoForm, title: &str) -> Result<Document> {
    let pages = paginate(layout(form, title));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in &pages {
        let content = Content {
            operations: page_operations(lines),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

fn layout(form: &SeguimientoForm, title: &str) -> Vec<Line> {
    let mut lines = vec![Line::Title(title.to_string()), Line::Gap];

    lines.push(Line::Heading("Dimensiones a intervenir".to_string()));
    for id in &form.dimensiones {
        lines.push(Line::Text(format!("[x] {}", dimension_label(id))));
    }
    lines.push(Line::Gap);

    lines.push(Line::Heading("Información básica".to_string()));
    lines.push(Line::Text(format!("Fecha: {}", form.fecha)));
    lines.push(Line::Text(format!("Hora: {}", form.hora)));
    lines.push(Line::Gap);

    let sections = [
        ("Objetivo de la visita", &form.objetivo),
        ("Aspectos abordados", &form.aspectos),
        ("Avances", &form.avances),
        ("Retos", &form.retos),
        ("Oportunidades", &form.oportunidades),
    ];
    for (heading, text) in sections {
        lines.push(Line::Heading(heading.to_string()));
        lines.extend(wrap(text, WRAP_COLUMNS).into_iter().map(Line::Text));
        lines.push(Line::Gap);
    }

    if !form.compromisos.is_empty() {
        lines.push(Line::Heading("Compromisos".to_string()));
        for (i, compromiso) in form.compromisos.iter().enumerate() {
            let text = format!("{}. {}", i + 1, compromiso.descripcion);
            lines.extend(wrap(&text, WRAP_COLUMNS).into_iter().map(Line::Text));
            lines.push(Line::Text(format!(
                "    Fecha: {}   Responsable: {}",
                compromiso.fecha_cumplimiento, compromiso.responsable
            )));
        }
        lines.push(Line::Gap);
    }

    if !form.participantes.is_empty() {
        lines.push(Line::Heading("Participantes".to_string()));
        for participante in &form.participantes {
            lines.push(Line::Text(format!(
                "{} - {}",
                participante.nombre, participante.rol
            )));
        }
    }

    lines
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;

    for line in lines {
        let leading = line.leading();
        if used + leading > usable {
            pages.push(Vec::new());
            used = 0;
            if line == Line::Gap {
                continue;
            }
        }
        used += leading;
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
    }
    pages
}

fn page_operations(lines: &[Line]) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        y -= line.leading();
        let (font, size, text) = match line {
            Line::Title(t) => ("F2", TITLE_SIZE, t),
            Line::Heading(t) => ("F2", HEADING_SIZE, t),
            Line::Text(t) => ("F1", BODY_SIZE, t),
            Line::Gap => continue,
        };
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        ops.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(win_ansi(text))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// Latin-1 maps onto WinAnsi for everything the form uses. Other
/// characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            0x09 => b' ',
            _ => b'?',
        })
        .collect()
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut out = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            // words longer than a line get hard-split
            while word.len() > columns {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(columns);
                out.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > columns && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    if out.is_empty() {
        out.push(String::new());
    }
    out
}
