//! Parsing of model replies into field maps.
//!
//! Replies are nominally JSON but models sometimes wrap them in markdown
//! fences, surround them with prose, or answer with Python-style literals.
//! Each strategy in [`STRATEGIES`] is tried in order; the first one that
//! yields an object or array wins.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{RawExtraction, RawValue};

lazy_static! {
    // Body of a markdown code fence
    static ref FENCED_BLOCK: Regex = Regex::new(
        r"(?s)```(?:json|JSON)?\s*(.*?)```"
    ).unwrap();

    // Outermost object or array span in free text
    static ref EMBEDDED_SPAN: Regex = Regex::new(
        r"(?s)\{.*\}|\[.*\]"
    ).unwrap();
}

/// Outcome of parsing a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// A non-empty field map.
    Fields(Map<String, Value>),
    /// Blank reply, `{}`, or `[]`.
    Empty,
    /// No strategy produced an object or array.
    Unparsable,
}

type Strategy = fn(&str) -> Option<Value>;

const STRATEGIES: [(&str, Strategy); 4] = [
    ("strict", strict_json),
    ("fenced", fenced_block),
    ("embedded", embedded_span),
    ("literal", permissive_literal),
];

/// Parse a raw reply with the ordered strategy chain.
pub fn parse_reply(text: &str) -> ParsedReply {
    let text = text.trim();
    if text.is_empty() {
        return ParsedReply::Empty;
    }

    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(text) {
            debug!("Reply parsed with {} strategy", name);
            return from_value(value);
        }
    }
    ParsedReply::Unparsable
}

fn from_value(value: Value) -> ParsedReply {
    match value {
        Value::Object(map) if map.is_empty() => ParsedReply::Empty,
        Value::Object(map) => ParsedReply::Fields(map),
        Value::Array(items) => match items.into_iter().next() {
            None => ParsedReply::Empty,
            Some(first) if first.is_object() => from_value(first),
            Some(_) => ParsedReply::Unparsable,
        },
        _ => ParsedReply::Unparsable,
    }
}

fn structured(value: Value) -> Option<Value> {
    (value.is_object() || value.is_array()).then_some(value)
}

fn strict_json(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok().and_then(structured)
}

fn fenced_block(text: &str) -> Option<Value> {
    if let Some(body) = FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
        if let Some(value) = strict_json(body.as_str().trim()) {
            return Some(value);
        }
    }
    let stripped = text.replace("```json", "").replace("```", "");
    strict_json(stripped.trim())
}

fn embedded_span(text: &str) -> Option<Value> {
    EMBEDDED_SPAN
        .find(text)
        .and_then(|span| strict_json(span.as_str()))
}

fn permissive_literal(text: &str) -> Option<Value> {
    let candidate = EMBEDDED_SPAN
        .find(text)
        .map(|span| span.as_str())
        .unwrap_or(text);
    strict_json(&literal_to_json(candidate))
}

/// Rewrite a Python-style literal into JSON: single-quoted strings,
/// `None`/`True`/`False`, and trailing commas.
fn literal_to_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                // Copy double-quoted strings verbatim
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if chars[i - 1] == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() && chars[i + 1] == '\'' => {
                            out.push('\'');
                            i += 2;
                        }
                        '\\' if i + 1 < chars.len() => {
                            out.push('\\');
                            out.push(chars[i + 1]);
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        other => {
                            out.push(other);
                            i += 1;
                        }
                    }
                }
                out.push('"');
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    _ => word.as_str(),
                });
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Map the reply vocabulary onto the fixed raw extraction schema.
///
/// Keys outside the vocabulary are ignored; values that are neither strings
/// nor numbers are treated as absent.
pub fn to_raw_extraction(reply: &Map<String, Value>) -> RawExtraction {
    let field = |key: &str| reply.get(key).and_then(RawValue::from_json);

    RawExtraction {
        proveedor: field("proveedor_nombre"),
        nit: field("proveedor_nit"),
        direccion: field("proveedor_direccion"),
        telefono: field("proveedor_telefono"),
        ciudad: field("proveedor_ciudad"),
        factura_numero: field("factura_numero"),
        fecha: field("fecha_emision"),
        fecha_emision: None,
        fecha_vencimiento: field("fecha_vencimiento"),
        descripcion: field("descripcion_general"),
        moneda: field("moneda"),
        base: field("base_imponible"),
        impuestos: field("impuestos"),
        total: field("total"),
        cufe: field("cufe"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> ParsedReply {
        match value {
            Value::Object(map) => ParsedReply::Fields(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_strict_json() {
        assert_eq!(
            parse_reply(r#"{"total": 1500.5, "moneda": "COP"}"#),
            fields(json!({"total": 1500.5, "moneda": "COP"}))
        );
    }

    #[test]
    fn test_fenced_block() {
        let reply = "```json\n{\"factura_numero\": \"FE-12\"}\n```";
        assert_eq!(parse_reply(reply), fields(json!({"factura_numero": "FE-12"})));
    }

    #[test]
    fn test_embedded_span() {
        let reply = "Aquí está el resultado: {\"total\": 40000} Espero que sirva.";
        assert_eq!(parse_reply(reply), fields(json!({"total": 40000})));
    }

    #[test]
    fn test_permissive_literal() {
        let reply = "{'proveedor_nombre': 'Tienda \"El Sol\"', 'cufe': None, 'pagada': True, 'total': 10,}";
        assert_eq!(
            parse_reply(reply),
            fields(json!({
                "proveedor_nombre": "Tienda \"El Sol\"",
                "cufe": null,
                "pagada": true,
                "total": 10
            }))
        );
    }

    #[test]
    fn test_literal_keeps_words_inside_strings() {
        assert_eq!(
            literal_to_json("{'descripcion': 'None of the above, True'}"),
            r#"{"descripcion": "None of the above, True"}"#
        );
    }

    #[test]
    fn test_array_takes_first_element() {
        assert_eq!(
            parse_reply(r#"[{"total": 1}, {"total": 2}]"#),
            fields(json!({"total": 1}))
        );
        assert_eq!(parse_reply("[]"), ParsedReply::Empty);
    }

    #[test]
    fn test_empty_and_unparsable() {
        assert_eq!(parse_reply("   "), ParsedReply::Empty);
        assert_eq!(parse_reply("{}"), ParsedReply::Empty);
        assert_eq!(parse_reply("no encontré datos"), ParsedReply::Unparsable);
        assert_eq!(parse_reply("42"), ParsedReply::Unparsable);
    }

    #[test]
    fn test_to_raw_extraction_mapping() {
        let reply = json!({
            "proveedor_nombre": "Papelería Central SAS",
            "proveedor_nit": "900.123.456-8",
            "fecha_emision": "2024-03-05",
            "descripcion_general": "Compra papelería",
            "base_imponible": 100000,
            "impuestos": "19.000",
            "total": null,
            "moneda": ["COP"],
            "desconocido": "x"
        });
        let raw = to_raw_extraction(reply.as_object().unwrap());

        assert_eq!(raw.proveedor, Some(RawValue::from("Papelería Central SAS")));
        assert_eq!(raw.nit, Some(RawValue::from("900.123.456-8")));
        assert_eq!(raw.fecha, Some(RawValue::from("2024-03-05")));
        assert_eq!(raw.fecha_emision, None);
        assert_eq!(raw.descripcion, Some(RawValue::from("Compra papelería")));
        assert_eq!(raw.base, Some(RawValue::from(100000.0)));
        assert_eq!(raw.impuestos, Some(RawValue::from("19.000")));
        assert_eq!(raw.total, None);
        assert_eq!(raw.moneda, None);
    }
}
