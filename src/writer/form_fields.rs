//! Form field and signature field dictionaries.
//!
//! Fields are written as merged field/widget dictionaries (ISO 32000-1
//! §12.5.6.19): one object carries both the field entries (`/FT`, `/T`,
//! `/Ff`, `/V`) and the widget annotation entries (`/Subtype /Widget`,
//! `/Rect`, `/P`). Every field built here has exactly one widget.

use crate::object::{Dict, Object, ObjectRef};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Field flags (`/Ff`), ISO 32000-1 Tables 221 and 226.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u32 {
        /// Bit 1: Field is read-only; user cannot change the value
        const READ_ONLY = 1 << 0;
        /// Bit 2: Field is required; must have a value before submit
        const REQUIRED = 1 << 1;
        /// Bit 3: Field should not be exported by submit-form action
        const NO_EXPORT = 1 << 2;
        /// Bit 15: Radio group where one button must always be on
        const NO_TOGGLE_TO_OFF = 1 << 14;
        /// Bit 16: Button is a radio button
        const RADIO = 1 << 15;
        /// Bit 17: Button is a push button
        const PUSHBUTTON = 1 << 16;
    }
}

/// Widget annotation flag bit 3: print the annotation.
pub const ANNOT_FLAG_PRINT: i64 = 4;

/// Kind of a fillable form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text field (`/FT /Tx`)
    Text,
    /// Two-state check box (`/FT /Btn`)
    Checkbox,
    /// Radio button (`/FT /Btn` with the Radio flag)
    Radio,
}

impl FieldKind {
    /// `/FT` value for this kind.
    pub fn field_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "Tx",
            FieldKind::Checkbox | FieldKind::Radio => "Btn",
        }
    }

    /// `/Ff` bits set at creation.
    pub fn creation_flags(&self) -> FieldFlags {
        match self {
            FieldKind::Text | FieldKind::Checkbox => FieldFlags::empty(),
            FieldKind::Radio => FieldFlags::RADIO | FieldFlags::NO_TOGGLE_TO_OFF,
        }
    }

    /// Classify an existing field from its `/FT` and `/Ff`.
    ///
    /// Push buttons, choice fields and signature fields have no kind.
    pub fn classify(field_type: &str, flags: FieldFlags) -> Option<FieldKind> {
        match field_type {
            "Tx" => Some(FieldKind::Text),
            "Btn" if flags.contains(FieldFlags::PUSHBUTTON) => None,
            "Btn" if flags.contains(FieldFlags::RADIO) => Some(FieldKind::Radio),
            "Btn" => Some(FieldKind::Checkbox),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
        };
        f.write_str(name)
    }
}

/// `/AP /N` appearance states of a button widget.
#[derive(Debug, Clone, Copy)]
pub struct ButtonAppearance {
    /// Stream drawn in the `/Yes` state
    pub on: ObjectRef,
    /// Stream drawn in the `/Off` state
    pub off: ObjectRef,
}

/// Builder for a merged text/checkbox/radio field widget.
#[derive(Debug, Clone)]
pub struct FieldWidgetBuilder {
    name: String,
    kind: FieldKind,
    rect: [f64; 4],
    page: ObjectRef,
    default_appearance: String,
    button_appearance: Option<ButtonAppearance>,
}

impl FieldWidgetBuilder {
    /// Start a widget for `name` of `kind`, placed at `rect` (`[llx lly urx ury]`) on `page`.
    pub fn new(name: impl Into<String>, kind: FieldKind, rect: [f64; 4], page: ObjectRef) -> Self {
        Self {
            name: name.into(),
            kind,
            rect,
            page,
            default_appearance: "/Helv 10 Tf 0 g".to_string(),
            button_appearance: None,
        }
    }

    /// Default appearance string for text rendering.
    pub fn with_default_appearance(mut self, da: impl Into<String>) -> Self {
        self.default_appearance = da.into();
        self
    }

    /// On/off appearance streams for checkbox and radio widgets.
    pub fn with_button_appearance(mut self, appearance: ButtonAppearance) -> Self {
        self.button_appearance = Some(appearance);
        self
    }

    /// Build the merged field/widget dictionary.
    pub fn build(&self) -> Object {
        let mut dict = widget_base(&self.name, self.rect, self.page);
        dict.insert("FT".to_string(), Object::name(self.kind.field_type()));
        dict.insert(
            "Ff".to_string(),
            Object::Integer(self.kind.creation_flags().bits() as i64),
        );

        match self.kind {
            FieldKind::Text => {
                dict.insert("DA".to_string(), Object::text(&self.default_appearance));
            },
            FieldKind::Checkbox | FieldKind::Radio => {
                dict.insert("V".to_string(), Object::name("Off"));
                dict.insert("AS".to_string(), Object::name("Off"));
                dict.insert(
                    "DA".to_string(),
                    Object::text(&self.default_appearance.replace("/Helv", "/ZaDb")),
                );
                if let Some(ap) = self.button_appearance {
                    dict.insert(
                        "AP".to_string(),
                        Object::dict([(
                            "N",
                            Object::dict([("Yes", ap.on.into()), ("Off", ap.off.into())]),
                        )]),
                    );
                }
            },
        }

        Object::Dictionary(dict)
    }
}

/// Field-locking rule carried by a signature field (`/Lock`, §12.7.4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockPolicy {
    /// Lock every field except the listed ones
    Exclude(Vec<String>),
    /// Lock every field
    All,
}

impl LockPolicy {
    /// The `/SigFieldLock` dictionary.
    pub fn to_object(&self) -> Object {
        match self {
            LockPolicy::All => Object::dict([
                ("Type", Object::name("SigFieldLock")),
                ("Action", Object::name("All")),
            ]),
            LockPolicy::Exclude(fields) => Object::dict([
                ("Type", Object::name("SigFieldLock")),
                ("Action", Object::name("Exclude")),
                (
                    "Fields",
                    Object::Array(fields.iter().map(|f| Object::text(f)).collect()),
                ),
            ]),
        }
    }

    /// Read a `/SigFieldLock` dictionary back.
    pub fn from_object(obj: &Object) -> Option<Self> {
        let dict = obj.as_dict()?;
        let fields = || -> Vec<String> {
            dict.get("Fields")
                .and_then(|f| f.as_array())
                .map(|arr| arr.iter().filter_map(|f| f.as_text()).collect())
                .unwrap_or_default()
        };
        match dict.get("Action").and_then(|a| a.as_name())? {
            "All" => Some(LockPolicy::All),
            "Exclude" => Some(LockPolicy::Exclude(fields())),
            _ => None,
        }
    }

    /// Whether applying this policy locks the field called `name`.
    pub fn locks(&self, name: &str) -> bool {
        match self {
            LockPolicy::All => true,
            LockPolicy::Exclude(fields) => !fields.iter().any(|f| f == name),
        }
    }
}

/// Builder for an unsigned signature field widget.
#[derive(Debug, Clone)]
pub struct SignatureFieldBuilder {
    name: String,
    rect: [f64; 4],
    page: ObjectRef,
    lock: Option<LockPolicy>,
}

impl SignatureFieldBuilder {
    /// Start a signature field for `name` at `rect` on `page`.
    pub fn new(name: impl Into<String>, rect: [f64; 4], page: ObjectRef) -> Self {
        Self {
            name: name.into(),
            rect,
            page,
            lock: None,
        }
    }

    /// Attach a field lock policy.
    pub fn with_lock(mut self, lock: LockPolicy) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Build the merged field/widget dictionary.
    pub fn build(&self) -> Object {
        let mut dict = widget_base(&self.name, self.rect, self.page);
        dict.insert("FT".to_string(), Object::name("Sig"));
        if let Some(lock) = &self.lock {
            dict.insert("Lock".to_string(), lock.to_object());
        }
        Object::Dictionary(dict)
    }
}

fn widget_base(name: &str, rect: [f64; 4], page: ObjectRef) -> Dict {
    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("Annot"));
    dict.insert("Subtype".to_string(), Object::name("Widget"));
    dict.insert("T".to_string(), Object::text(name));
    dict.insert("Rect".to_string(), Object::rect(rect[0], rect[1], rect[2], rect[3]));
    dict.insert("P".to_string(), page.into());
    dict.insert("F".to_string(), Object::Integer(ANNOT_FLAG_PRINT));
    dict
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: ObjectRef = ObjectRef { id: 3, gen: 0 };

    #[test]
    fn test_text_widget() {
        let obj = FieldWidgetBuilder::new("name", FieldKind::Text, [72.0, 700.0, 272.0, 720.0], PAGE)
            .build();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict["FT"].as_name(), Some("Tx"));
        assert_eq!(dict["Subtype"].as_name(), Some("Widget"));
        assert_eq!(dict["T"].as_text().as_deref(), Some("name"));
        assert_eq!(dict["Ff"].as_integer(), Some(0));
        assert_eq!(dict["F"].as_integer(), Some(4));
        assert_eq!(dict["P"], Object::Reference(PAGE));
        assert_eq!(dict["DA"].as_text().as_deref(), Some("/Helv 10 Tf 0 g"));
        assert!(!dict.contains_key("V"));
    }

    #[test]
    fn test_radio_widget_flags_and_states() {
        let ap = ButtonAppearance {
            on: ObjectRef::new(10, 0),
            off: ObjectRef::new(11, 0),
        };
        let obj = FieldWidgetBuilder::new("choice", FieldKind::Radio, [0.0, 0.0, 12.0, 12.0], PAGE)
            .with_button_appearance(ap)
            .build();
        let dict = obj.as_dict().unwrap();
        let ff = FieldFlags::from_bits_truncate(dict["Ff"].as_integer().unwrap() as u32);
        assert!(ff.contains(FieldFlags::RADIO | FieldFlags::NO_TOGGLE_TO_OFF));
        assert_eq!(dict["AS"].as_name(), Some("Off"));
        let normal = dict["AP"].as_dict().unwrap()["N"].as_dict().unwrap();
        assert_eq!(normal["Yes"], Object::Reference(ObjectRef::new(10, 0)));
        assert_eq!(dict["DA"].as_text().as_deref(), Some("/ZaDb 10 Tf 0 g"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(FieldKind::classify("Tx", FieldFlags::empty()), Some(FieldKind::Text));
        assert_eq!(FieldKind::classify("Btn", FieldFlags::empty()), Some(FieldKind::Checkbox));
        assert_eq!(
            FieldKind::classify("Btn", FieldKind::Radio.creation_flags()),
            Some(FieldKind::Radio)
        );
        assert_eq!(FieldKind::classify("Btn", FieldFlags::PUSHBUTTON), None);
        assert_eq!(FieldKind::classify("Sig", FieldFlags::empty()), None);
    }

    #[test]
    fn test_lock_policy_round_trip() {
        let lock = LockPolicy::Exclude(vec!["agree".to_string(), "SignatureB".to_string()]);
        assert_eq!(LockPolicy::from_object(&lock.to_object()), Some(lock.clone()));
        assert!(lock.locks("name"));
        assert!(!lock.locks("SignatureB"));
        assert!(LockPolicy::All.locks("anything"));
        assert_eq!(LockPolicy::from_object(&LockPolicy::All.to_object()), Some(LockPolicy::All));
    }

    #[test]
    fn test_signature_field() {
        let obj = SignatureFieldBuilder::new("SignatureB", [230.0, 20.0, 430.0, 70.0], PAGE)
            .with_lock(LockPolicy::All)
            .build();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict["FT"].as_name(), Some("Sig"));
        assert!(!dict.contains_key("V"));
        let lock = dict["Lock"].as_dict().unwrap();
        assert_eq!(lock["Type"].as_name(), Some("SigFieldLock"));
        assert_eq!(lock["Action"].as_name(), Some("All"));
    }
}
