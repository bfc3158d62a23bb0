//! Registro extraído y su representación CSV (`;`, comillas dobles).

use serde::{Deserialize, Serialize};

use crate::constants::{ARTIFACT_HEADER, CSV_SEPARATOR};

/// Una unidad lógica extraída de una respuesta (una fila del artifact).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub url: String,
    pub content: String,
    pub depth: u32,
}

impl Record {
    pub fn new(url: impl Into<String>, content: impl Into<String>, depth: u32) -> Self {
        Self { url: url.into(),
               content: content.into(),
               depth }
    }

    /// Fila CSV terminada en `\n`.
    pub(crate) fn to_csv_row(&self) -> String {
        csv_row(&[&self.url, &self.content, &self.depth.to_string()])
    }
}

/// Fila CSV con el mismo dialecto que los artifacts, terminada en `\n`.
pub fn csv_row(fields: &[&str]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    let mut row = escaped.join(&CSV_SEPARATOR.to_string());
    row.push('\n');
    row
}

pub(crate) fn header_row() -> String {
    let mut row = ARTIFACT_HEADER.join(&CSV_SEPARATOR.to_string());
    row.push('\n');
    row
}

fn escape_field(s: &str) -> String {
    if s.contains(CSV_SEPARATOR) || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parte el contenido completo de un artifact en filas de campos.
/// Los saltos de línea dentro de un campo entrecomillado se conservan.
pub(crate) fn split_rows(input: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            c if c == CSV_SEPARATOR => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            other => field.push(other),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

/// Decodifica un artifact completo (cabecera incluida) a registros.
pub(crate) fn parse_records(input: &str) -> Result<Vec<Record>, String> {
    let mut rows = split_rows(input)?.into_iter();
    match rows.next() {
        Some(header) if header == ARTIFACT_HEADER => {}
        Some(header) => return Err(format!("unexpected header {header:?}")),
        None => return Err("missing header".to_string()),
    }
    rows.enumerate()
        .map(|(i, fields)| match fields.as_slice() {
            [url, content, depth] => {
                let depth = depth.trim()
                                 .parse::<u32>()
                                 .map_err(|e| format!("row {}: invalid depth '{depth}': {e}", i + 1))?;
                Ok(Record::new(url.clone(), content.clone(), depth))
            }
            other => Err(format!("row {}: expected 3 fields, found {}", i + 1, other.len())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_not_quoted() {
        let r = Record::new("https://a.test/", "hello", 0);
        assert_eq!(r.to_csv_row(), "https://a.test/;hello;0\n");
    }

    #[test]
    fn separator_quotes_and_newlines_are_escaped() {
        let r = Record::new("https://a.test/", "a;b \"c\"\nd", 2);
        assert_eq!(r.to_csv_row(), "https://a.test/;\"a;b \"\"c\"\"\nd\";2\n");
    }

    #[test]
    fn parse_reads_back_escaped_rows() {
        let records = vec![Record::new("https://a.test/", "a;b \"c\"\nd", 2),
                           Record::new("https://a.test/x", "", 3)];
        let mut body = header_row();
        for r in &records {
            body.push_str(&r.to_csv_row());
        }
        assert_eq!(parse_records(&body).expect("parse"), records);
    }

    #[test]
    fn header_only_artifact_has_no_records() {
        assert!(parse_records(&header_row()).expect("parse").is_empty());
    }

    #[test]
    fn wrong_header_is_rejected() {
        assert!(parse_records("a;b\n").is_err());
        assert!(parse_records("").is_err());
    }
}
