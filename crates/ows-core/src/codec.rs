//! Identifier Codec: target URL ↔ clave de artifact apta para el filesystem.
//!
//! `encode` toma el texto crudo de `netloc + path` (el mismo nombre que usa
//! el worker para sus archivos) y sustituye cada `/` por `_`. No se
//! normaliza nada: ni mayúsculas del host, ni puertos por defecto, ni
//! caracteres fuera de ASCII.
//!
//! Colisiones aceptadas, sin escape:
//! - `https://a.test/x_y` y `https://a.test/x/y` producen la misma clave.
//! - Un path que termina en `-INCOMPLETE` produce un archivo completo
//!   indistinguible del incompleto de otro target (`a.test_x-INCOMPLETE.csv`).
//!   `ArtifactStore::list` lo clasifica como incompleto.
//!
//! `decode` es la sustitución inversa y sólo sirve para mostrar; nunca para
//! decidir qué re-descargar.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::KEY_FILLER;

/// Clave estable de un artifact dentro del directorio de un job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Construye una clave a partir de un nombre de archivo ya codificado.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quita el esquema (`scheme:`) si el prefijo es un esquema válido.
fn strip_scheme(target: &str) -> &str {
    match target.find(':') {
        Some(i) if i > 0
                   && target[..i].starts_with(|c: char| c.is_ascii_alphabetic())
                   && target[..i].chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            &target[i + 1..]
        }
        _ => target,
    }
}

/// netloc + path tal como aparecen en el texto. Sin `//` tras el esquema no
/// hay netloc y todo es path; query, fragmento y los `;params` del último
/// segmento quedan fuera.
fn netloc_and_path(target: &str) -> &str {
    let rest = strip_scheme(target);
    let (netloc, rest) = match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(after.len());
            after.split_at(end)
        }
        None => ("", rest),
    };
    let path = &rest[..rest.find(|c: char| c == '?' || c == '#').unwrap_or(rest.len())];
    let last_segment = path.rfind('/').map_or(0, |i| i + 1);
    let path = match path[last_segment..].find(';') {
        Some(i) => &path[..last_segment + i],
        None => path,
    };
    // netloc y path son contiguos en el texto original
    let start = target.len() - rest.len() - netloc.len();
    &target[start..start + netloc.len() + path.len()]
}

/// Deriva la clave de artifact de un target. Pura y determinista.
pub fn encode(target: &str) -> ArtifactKey {
    ArtifactKey(netloc_and_path(target).replace('/', &KEY_FILLER.to_string()))
}

/// Inversa aproximada de `encode`: los `_` originales se convierten en `/`.
pub fn decode(key: &ArtifactKey) -> String {
    key.0.replace(KEY_FILLER, "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_replaces_path_separators() {
        assert_eq!(encode("https://a.example/x").as_str(), "a.example_x");
        assert_eq!(encode("https://x.test/").as_str(), "x.test_");
        assert_eq!(encode("http://b.example/y/z?q=1#frag").as_str(), "b.example_y_z");
    }

    #[test]
    fn encode_keeps_explicit_port() {
        assert_eq!(encode("http://localhost:8080/docs").as_str(), "localhost:8080_docs");
        assert_eq!(encode("https://a.example:443/x").as_str(), "a.example:443_x");
    }

    #[test]
    fn encode_does_not_normalize() {
        // sin path no se agrega `/`
        assert_eq!(encode("https://c.example").as_str(), "c.example");
        assert_eq!(encode("http://b.test?q=1").as_str(), "b.test");
        assert_eq!(encode("https://A.Example/x").as_str(), "A.Example_x");
        assert_eq!(encode("https://a.test/ä").as_str(), "a.test_ä");
        assert_eq!(encode("https://user@a.test/x").as_str(), "user@a.test_x");
    }

    #[test]
    fn encode_drops_params_of_last_segment() {
        assert_eq!(encode("https://a.test/x;v=1").as_str(), "a.test_x");
        assert_eq!(encode("https://a.test/x;v=1/y").as_str(), "a.test_x;v=1_y");
    }

    #[test]
    fn encode_is_deterministic() {
        let url = "https://c.example/some/deep/path";
        assert_eq!(encode(url), encode(url));
    }

    #[test]
    fn encode_tolerates_relative_input() {
        assert_eq!(encode("a.example/x?y").as_str(), "a.example_x");
    }

    #[test]
    fn collisions_are_accepted() {
        assert_eq!(encode("https://a.test/x_y"), encode("https://a.test/x/y"));
        assert_eq!(encode("https://a.test/x-INCOMPLETE").as_str(), "a.test_x-INCOMPLETE");
    }

    #[test]
    fn decode_is_best_effort() {
        assert_eq!(decode(&encode("https://a.example/x/y")), "a.example/x/y");
        // el guion bajo original no se recupera
        assert_eq!(decode(&encode("https://a.example/x_y")), "a.example/x/y");
    }
}
