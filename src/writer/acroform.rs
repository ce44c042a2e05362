//! The document-level interactive form (`/AcroForm`, ISO 32000-1 §12.7.2).
//!
//! Preparation either builds a fresh AcroForm or merges new fields into the
//! one a document already has. Signing only touches `/SigFlags`, through
//! [`mark_signed`].

use crate::object::{Dict, Object, ObjectRef};

/// SigFlags bit 1: the document contains at least one signature field.
pub const SIG_FLAGS_SIGNATURES_EXIST: i64 = 1;
/// SigFlags bit 2: the document must only be saved incrementally.
pub const SIG_FLAGS_APPEND_ONLY: i64 = 2;

/// Collects field references and form-wide defaults.
#[derive(Debug, Clone)]
pub struct AcroFormBuilder {
    fields: Vec<ObjectRef>,
    /// `/DA` inherited by fields that carry none
    default_appearance: String,
}

impl Default for AcroFormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AcroFormBuilder {
    /// Empty form using Helvetica 10pt black.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            default_appearance: "/Helv 10 Tf 0 g".to_string(),
        }
    }

    /// Append one field.
    pub fn add_field(&mut self, field_ref: ObjectRef) {
        self.fields.push(field_ref);
    }

    /// Append fields in order.
    pub fn add_fields(&mut self, fields: impl IntoIterator<Item = ObjectRef>) {
        self.fields.extend(fields);
    }

    /// Replace the default appearance, e.g. `/Helv 12 Tf 0 g`.
    pub fn with_default_appearance(mut self, da: impl Into<String>) -> Self {
        self.default_appearance = da.into();
        self
    }

    /// Number of fields collected so far.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Build a fresh AcroForm dictionary.
    pub fn build(&self) -> Dict {
        let mut dict = Dict::new();
        dict.insert(
            "Fields".to_string(),
            Object::Array(self.fields.iter().map(|r| Object::Reference(*r)).collect()),
        );
        self.apply_settings(&mut dict);
        dict.insert("DR".to_string(), Self::build_default_resources());
        dict
    }

    /// Merge into an AcroForm that already exists in the document.
    ///
    /// New fields are appended after the existing ones. Default resources
    /// gain the fonts field appearances refer to, without dropping any the
    /// document already declares.
    pub fn merge_into(&self, existing: &mut Dict) {
        let mut fields = existing
            .get("Fields")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default();
        fields.extend(self.fields.iter().map(|r| Object::Reference(*r)));
        existing.insert("Fields".to_string(), Object::Array(fields));
        self.apply_settings(existing);

        let defaults = Self::build_default_resources();
        let has_dr = existing.contains_key("DR");
        match existing.get_mut("DR").and_then(|dr| dr.as_dict_mut()) {
            Some(dr) => {
                let default_fonts = defaults
                    .as_dict()
                    .and_then(|d| d.get("Font"))
                    .and_then(|f| f.as_dict())
                    .cloned()
                    .unwrap_or_default();
                let fonts = dr
                    .entry("Font".to_string())
                    .or_insert_with(|| Object::Dictionary(Dict::new()));
                if let Some(fonts) = fonts.as_dict_mut() {
                    for (name, font) in default_fonts {
                        fonts.entry(name).or_insert(font);
                    }
                }
            },
            // An indirect /DR is left alone; its fonts are the document's choice
            None if has_dr => {},
            None => {
                existing.insert("DR".to_string(), defaults);
            },
        }
    }

    fn apply_settings(&self, dict: &mut Dict) {
        // Widgets carry their own appearance streams
        dict.remove("NeedAppearances");
        dict.insert("DA".to_string(), Object::text(&self.default_appearance));
    }

    /// Default resources with the two standard fonts field appearances use.
    ///
    /// - Helv: Helvetica, for text values
    /// - ZaDb: ZapfDingbats, for check marks and radio dots
    pub fn build_default_resources() -> Object {
        let type1 = |base: &str, encoding: Option<&str>| {
            let mut font = Dict::new();
            font.insert("Type".to_string(), Object::name("Font"));
            font.insert("Subtype".to_string(), Object::name("Type1"));
            font.insert("BaseFont".to_string(), Object::name(base));
            if let Some(encoding) = encoding {
                font.insert("Encoding".to_string(), Object::name(encoding));
            }
            Object::Dictionary(font)
        };

        let mut fonts = Dict::new();
        fonts.insert("Helv".to_string(), type1("Helvetica", Some("WinAnsiEncoding")));
        fonts.insert("ZaDb".to_string(), type1("ZapfDingbats", None));

        Object::dict([("Font", Object::Dictionary(fonts))])
    }
}

/// Set the signature flags on an AcroForm dictionary in place.
pub fn mark_signed(acroform: &mut Dict) {
    let current = acroform.get("SigFlags").and_then(|f| f.as_integer()).unwrap_or(0);
    acroform.insert(
        "SigFlags".to_string(),
        Object::Integer(current | SIG_FLAGS_SIGNATURES_EXIST | SIG_FLAGS_APPEND_ONLY),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fresh_form() {
        let mut builder = AcroFormBuilder::new();
        builder.add_fields([ObjectRef::new(5, 0), ObjectRef::new(6, 0)]);
        assert_eq!(builder.field_count(), 2);

        let dict = builder.build();
        let fields = dict.get("Fields").and_then(|f| f.as_array()).unwrap();
        assert_eq!(fields[0], Object::Reference(ObjectRef::new(5, 0)));
        assert_eq!(dict.get("DA").and_then(|d| d.as_text()).as_deref(), Some("/Helv 10 Tf 0 g"));
        assert!(!dict.contains_key("NeedAppearances"));
        assert!(!dict.contains_key("SigFlags"));

        let fonts = dict["DR"].as_dict().unwrap()["Font"].as_dict().unwrap();
        assert!(fonts.contains_key("Helv"));
        assert!(fonts.contains_key("ZaDb"));
    }

    #[test]
    fn test_mark_signed_keeps_other_bits() {
        let mut form = Dict::new();
        mark_signed(&mut form);
        assert_eq!(form.get("SigFlags").and_then(|f| f.as_integer()), Some(3));

        let mut form = Dict::new();
        form.insert("SigFlags".to_string(), Object::Integer(4));
        mark_signed(&mut form);
        assert_eq!(form.get("SigFlags").and_then(|f| f.as_integer()), Some(7));
    }

    #[test]
    fn test_merge_keeps_existing_fields_and_fonts() {
        let mut existing = Dict::new();
        existing.insert(
            "Fields".to_string(),
            Object::Array(vec![Object::Reference(ObjectRef::new(2, 0))]),
        );
        existing.insert(
            "DR".to_string(),
            Object::dict([(
                "Font",
                Object::dict([("Cour", Object::Reference(ObjectRef::new(3, 0)))]),
            )]),
        );

        let mut builder = AcroFormBuilder::new().with_default_appearance("/Helv 12 Tf 0 g");
        builder.add_field(ObjectRef::new(9, 0));
        builder.merge_into(&mut existing);

        let fields = existing["Fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1], Object::Reference(ObjectRef::new(9, 0)));
        assert_eq!(existing["DA"].as_text().as_deref(), Some("/Helv 12 Tf 0 g"));

        let fonts = existing["DR"].as_dict().unwrap()["Font"].as_dict().unwrap();
        assert!(fonts.contains_key("Cour"));
        assert!(fonts.contains_key("Helv"));
        assert!(fonts.contains_key("ZaDb"));
    }

    #[test]
    fn test_merge_resources_by_shape() {
        let indirect = Object::Reference(ObjectRef::new(4, 0));
        let mut existing = Dict::new();
        existing.insert("DR".to_string(), indirect.clone());
        AcroFormBuilder::new().merge_into(&mut existing);
        assert_eq!(existing["DR"], indirect);

        let mut bare = Dict::new();
        AcroFormBuilder::new().merge_into(&mut bare);
        let fonts = bare["DR"].as_dict().unwrap()["Font"].as_dict().unwrap();
        assert!(fonts.contains_key("Helv"));
        assert!(bare["Fields"].as_array().unwrap().is_empty());
    }
}
