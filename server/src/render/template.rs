//! AcroForm template filling.
//!
//! Loads a PDF form template and writes event property values into
//! fields whose names match property keys (case-insensitive). The
//! output is serialized straight to a byte buffer; nothing touches
//! disk or network here.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lopdf::{Document, Object};
use serde_json::Value;
use tracing::{debug, info};

use super::RenderError;

/// Load a PDF template from disk.
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Document, RenderError> {
    let file = File::open(&path)
        .map_err(|e| RenderError::Template(format!("failed to open template: {}", e)))?;
    let reader = BufReader::new(file);

    Document::load_from(reader)
        .map_err(|e| RenderError::Template(format!("failed to parse template: {}", e)))
}

/// Fill the template at `path` with `properties` and return the bytes.
pub fn fill_template<P: AsRef<Path>>(
    path: P,
    properties: &BTreeMap<String, Value>,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = load_template(path)?;

    let filled = fill_form(&mut doc, properties)?;

    info!(fields_filled = filled, "template_form_filled");

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Template(format!("failed to serialize document: {}", e)))?;

    Ok(buffer)
}

/// Write property values into matching form fields.
///
/// Field names are matched against property keys case-insensitively.
/// Unmatched fields keep their existing value; unmatched properties
/// are ignored. Returns the number of fields written.
pub fn fill_form(
    doc: &mut Document,
    properties: &BTreeMap<String, Value>,
) -> Result<usize, RenderError> {
    let field_refs = {
        let catalog = doc
            .catalog()
            .map_err(|e| RenderError::Template(format!("template has no catalog: {}", e)))?;

        let acroform_ref = catalog
            .get(b"AcroForm")
            .map_err(|_| RenderError::Template("template has no fillable form".to_string()))?
            .as_reference()
            .map_err(|_| {
                RenderError::Template("AcroForm is not an indirect reference".to_string())
            })?;

        let acroform = doc
            .get_dictionary(acroform_ref)
            .map_err(|e| RenderError::Template(format!("unreadable AcroForm: {}", e)))?;

        match acroform.get(b"Fields") {
            Ok(Object::Array(fields)) => fields
                .iter()
                .filter_map(|field_ref| field_ref.as_reference().ok())
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        }
    };

    debug!(field_count = field_refs.len(), "template_fields_found");

    let mut filled = 0;

    for field_ref in field_refs {
        let Ok(field_dict) = doc.get_dictionary_mut(field_ref) else {
            continue;
        };

        let Ok(Object::String(name_bytes, _)) = field_dict.get(b"T") else {
            continue;
        };
        let field_name = String::from_utf8_lossy(name_bytes.as_slice()).into_owned();

        let matched = properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&field_name));

        if let Some((key, value)) = matched {
            debug!(field = %field_name, property = %key, "template_field_fill");
            field_dict.set(b"V", value_to_text(value));
            filled += 1;
        }
    }

    Ok(filled)
}

/// Render a property value as form field text.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Build a minimal one-page template with named text fields.
#[cfg(test)]
pub(crate) fn sample_template(field_names: &[&str]) -> Document {
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let field_ids: Vec<Object> = field_names
        .iter()
        .map(|name| {
            let id = doc.add_object(dictionary! {
                "FT" => "Tx",
                "T" => Object::string_literal(*name),
                "V" => Object::string_literal(""),
            });
            Object::Reference(id)
        })
        .collect();

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => field_ids,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
        "AcroForm" => Object::Reference(acroform_id),
    });
    doc.trailer.set("Root", catalog_id);

    doc
}
