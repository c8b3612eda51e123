//! Fillable form templates.
//!
//! The buy order document is produced by writing text into the named fields
//! of a fixed template and flattening it. Rendering belongs to whatever
//! library backs [`FormTemplate`]; this crate ships [`FieldSheet`], a
//! JSON-backed template that records every write.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Kind of a template field. Only text fields are ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    #[default]
    Text,
    /// Check box
    Checkbox,
    /// Signature box
    Signature,
    /// Anything else (radio groups, dropdowns, buttons)
    Other,
}

/// Horizontal text alignment inside a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// A field as exposed by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name in the template
    pub name: String,
    /// Field kind
    #[serde(default)]
    pub kind: FieldKind,
}

impl FormField {
    /// A text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }
}

/// A loaded fillable document.
pub trait FormTemplate {
    /// Every field in document order.
    fn fields(&self) -> Vec<FormField>;

    /// Writes text into a field.
    fn set_text(&mut self, field: &str, value: &str) -> Result<()>;

    /// Sets the font size of a field, in points.
    fn set_font_size(&mut self, field: &str, size: f32) -> Result<()>;

    /// Sets the text alignment of a field. Not every renderer supports it.
    fn set_alignment(&mut self, field: &str, alignment: Alignment) -> Result<()>;

    /// Makes every field static content.
    fn flatten(&mut self) -> Result<()>;

    /// Serializes the document.
    fn save(&mut self) -> Result<Vec<u8>>;

    /// File extension of the saved document.
    fn extension(&self) -> &'static str {
        "pdf"
    }
}

/// Something a fresh template can be loaded from.
pub trait TemplateSource {
    /// Template type produced by this source
    type Template: FormTemplate;

    /// Loads a fresh, unfilled template.
    fn load(&self) -> Result<Self::Template>;
}

/// One field of a [`FieldSheet`] with everything written to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SheetField {
    /// Field name
    pub name: String,
    /// Field kind
    #[serde(default)]
    pub kind: FieldKind,
    /// Written text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Font size in points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// Alignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
}

/// JSON-backed template: a list of named fields that records writes and
/// saves as pretty JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSheet {
    fields: Vec<SheetField>,
    #[serde(default)]
    flattened: bool,
}

impl FieldSheet {
    /// A sheet with the given fields and nothing written.
    pub fn new(fields: impl IntoIterator<Item = FormField>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|f| SheetField {
                    name: f.name,
                    kind: f.kind,
                    ..SheetField::default()
                })
                .collect(),
            flattened: false,
        }
    }

    /// Parses a JSON array of `{"name": ..., "kind": ...}` objects.
    pub fn from_manifest(json: &str) -> Result<Self> {
        let fields: Vec<FormField> = serde_json::from_str(json).map_err(|e| Error::Template {
            message: format!("invalid field manifest: {e}"),
        })?;
        Ok(Self::new(fields))
    }

    /// The recorded state of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SheetField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Text written into a field, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|f| f.value.as_deref())
    }

    /// Whether [`FormTemplate::flatten`] has run.
    #[must_use]
    pub const fn is_flattened(&self) -> bool {
        self.flattened
    }

    fn writable(&mut self, name: &str) -> Result<&mut SheetField> {
        if self.flattened {
            return Err(Error::FieldWrite {
                field: name.to_string(),
                message: "form is flattened".to_string(),
            });
        }
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FieldWrite {
                field: name.to_string(),
                message: "no such field".to_string(),
            })
    }
}

impl FormTemplate for FieldSheet {
    fn fields(&self) -> Vec<FormField> {
        self.fields
            .iter()
            .map(|f| FormField {
                name: f.name.clone(),
                kind: f.kind,
            })
            .collect()
    }

    fn set_text(&mut self, field: &str, value: &str) -> Result<()> {
        let target = self.writable(field)?;
        if target.kind != FieldKind::Text {
            return Err(Error::FieldWrite {
                field: field.to_string(),
                message: "not a text field".to_string(),
            });
        }
        target.value = Some(value.to_string());
        Ok(())
    }

    fn set_font_size(&mut self, field: &str, size: f32) -> Result<()> {
        self.writable(field)?.font_size = Some(size);
        Ok(())
    }

    fn set_alignment(&mut self, field: &str, alignment: Alignment) -> Result<()> {
        self.writable(field)?.alignment = Some(alignment);
        Ok(())
    }

    fn flatten(&mut self) -> Result<()> {
        self.flattened = true;
        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Template {
            message: format!("could not serialize sheet: {e}"),
        })
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Loads a [`FieldSheet`] from a manifest file on every call.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    /// Path to the JSON manifest
    pub path: PathBuf,
}

impl TemplateSource for ManifestFile {
    type Template = FieldSheet;

    fn load(&self) -> Result<FieldSheet> {
        debug!("Loading form manifest {}", self.path.display());
        let json = std::fs::read_to_string(&self.path).map_err(|e| Error::Template {
            message: format!("could not read {}: {e}", self.path.display()),
        })?;
        FieldSheet::from_manifest(&json)
    }
}

/// Field names of the dealer's buy order form, in document order.
pub const BUY_ORDER_FIELDS: &[&str] = &[
    "DlrName", "DlrAddress", "DlrCSZ", "DlrPh", "Slsmn", "StockNo", "DealDate", "Buyer", "Address",
    "BuyerCSZ", "HomePh", "BuyerDL", "BuyerDOB", "Yr", "Make", "Model", "Body", "Color", "Miles",
    "VIN", "Cyl", "FuelType", "Price", "Allow", "SubTotal", "StTax", "StTaxRate", "CityTax",
    "CityTaxRate", "MiscTax", "MiscTaxRate", "RTDTax", "RTDTaxRate", "SalesPrice", "FilingFee",
    "FilingFeeDesc", "TotalFees", "Payoff", "PlusPayOff", "Fees", "Total", "CashDn", "AmtFin",
];

/// Built-in template source exposing [`BUY_ORDER_FIELDS`] as text fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinBuyOrderSheet;

impl TemplateSource for BuiltinBuyOrderSheet {
    type Template = FieldSheet;

    fn load(&self) -> Result<FieldSheet> {
        Ok(FieldSheet::new(BUY_ORDER_FIELDS.iter().map(|n| FormField::text(*n))))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_manifest_defaults_to_text() {
        let sheet =
            FieldSheet::from_manifest(r#"[{"name":"Buyer"},{"name":"Sig","kind":"signature"}]"#)
                .unwrap();
        let fields = sheet.fields();
        assert_eq!(fields[0], FormField::text("Buyer"));
        assert_eq!(fields[1].kind, FieldKind::Signature);
    }

    #[test]
    fn test_bad_manifest_is_template_error() {
        assert!(matches!(
            FieldSheet::from_manifest("{"),
            Err(Error::Template { .. })
        ));
        let missing = ManifestFile {
            path: PathBuf::from("/nonexistent/form.json"),
        };
        assert!(matches!(missing.load(), Err(Error::Template { .. })));
    }

    #[test]
    fn test_writes_and_flatten() {
        let mut sheet = BuiltinBuyOrderSheet.load().unwrap();
        sheet.set_text("Buyer", "Jane Doe").unwrap();
        sheet.set_font_size("Buyer", 12.0).unwrap();
        assert!(sheet.set_text("Nope", "x").is_err());

        sheet.flatten().unwrap();
        assert!(sheet.is_flattened());
        assert!(matches!(
            sheet.set_text("Buyer", "other"),
            Err(Error::FieldWrite { .. })
        ));

        let saved: serde_json::Value = serde_json::from_slice(&sheet.save().unwrap()).unwrap();
        assert_eq!(saved["flattened"], true);
        assert_eq!(sheet.value("Buyer"), Some("Jane Doe"));
    }
}
