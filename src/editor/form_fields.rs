//! AcroForm field access for [`DocumentEditor`].
//!
//! Fields are located by fully qualified name (`parent.child`), walking the
//! `/Fields` tree with inherited `/FT` and `/Ff`. Values are written to the
//! terminal field; appearance states are written to each of its widgets.

use super::DocumentEditor;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{font_size_from_da, AppearanceGenerator, FieldFlags, FieldKind};
use indexmap::IndexMap;
use std::collections::HashSet;

const MAX_FIELD_DEPTH: usize = 32;

/// Value to write into a form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormFieldValue {
    /// Text string value (for text fields)
    Text(String),
    /// Checked state (for checkboxes)
    Boolean(bool),
    /// Selected option (for radio buttons)
    Choice(String),
}

impl FormFieldValue {
    /// Interpret a caller-supplied string according to the field kind.
    ///
    /// Checkboxes accept `true`, `yes`, `on` and `1` (any case) as checked;
    /// every other string unchecks.
    pub fn parse(kind: FieldKind, raw: &str) -> Self {
        match kind {
            FieldKind::Text => FormFieldValue::Text(raw.to_string()),
            FieldKind::Checkbox => FormFieldValue::Boolean(is_truthy(raw)),
            FieldKind::Radio => FormFieldValue::Choice(raw.to_string()),
        }
    }
}

/// Boolean-like field value check.
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

/// A terminal field in the form tree.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// Fully qualified field name
    pub name: String,
    /// The field dictionary
    pub reference: ObjectRef,
    /// `/FT`, possibly inherited
    pub field_type: Option<String>,
    /// `/Ff`, possibly inherited
    pub flags: FieldFlags,
    /// Widget annotations; the field itself when field and widget are merged
    pub widgets: Vec<ObjectRef>,
}

impl FieldNode {
    /// Fillable kind, if any.
    pub fn kind(&self) -> Option<FieldKind> {
        self.field_type
            .as_deref()
            .and_then(|ft| FieldKind::classify(ft, self.flags))
    }

    /// Whether this is a signature field.
    pub fn is_signature(&self) -> bool {
        self.field_type.as_deref() == Some("Sig")
    }

    /// Whether the read-only flag is set.
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(FieldFlags::READ_ONLY)
    }
}

/// Summary of one field, for display and inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldInfo {
    /// Fully qualified field name
    pub name: String,
    /// `/FT` value (`Tx`, `Btn`, `Ch`, `Sig`)
    pub field_type: String,
    /// Fillable kind, if any
    pub kind: Option<FieldKind>,
    /// Current value as text (`/V` string or name)
    pub value: Option<String>,
    /// Read-only flag
    pub read_only: bool,
    /// Signature fields: whether `/V` holds a signature
    pub signed: bool,
    /// Page of the first widget
    pub page_index: Option<usize>,
    /// Rectangle of the first widget, `[llx lly urx ury]`
    pub rect: Option<[f64; 4]>,
}

/// Load the AcroForm dictionary, inline or indirect.
pub fn load_acroform(editor: &DocumentEditor) -> Result<Option<Dict>> {
    match editor.catalog()?.get("AcroForm") {
        None => Ok(None),
        Some(obj) => match editor.resolve(obj)? {
            Object::Dictionary(dict) => Ok(Some(dict)),
            other => Err(Error::InvalidObjectType {
                expected: "AcroForm dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        },
    }
}

/// Store an AcroForm dictionary where the catalog expects it.
///
/// An indirect AcroForm is updated in place; otherwise the catalog gets the
/// dictionary as a new indirect object.
pub fn store_acroform(editor: &mut DocumentEditor, acroform: Dict) -> Result<()> {
    let mut catalog = editor.catalog()?;
    match catalog.get("AcroForm").and_then(|a| a.as_reference()) {
        Some(existing) => editor.set(existing.id, Object::Dictionary(acroform)),
        None => {
            let new_ref = editor.add(Object::Dictionary(acroform));
            catalog.insert("AcroForm".to_string(), new_ref.into());
            editor.set_catalog(catalog)?;
        },
    }
    Ok(())
}

/// Terminal fields of a document, in `/Fields` order.
#[derive(Debug, Clone, Default)]
pub struct FormFields {
    fields: IndexMap<String, FieldNode>,
}

impl FormFields {
    /// Walk the field tree. Returns `None` when the document has no AcroForm.
    pub fn load(editor: &DocumentEditor) -> Result<Option<Self>> {
        let Some(acroform) = load_acroform(editor)? else {
            return Ok(None);
        };
        let roots = match acroform.get("Fields") {
            Some(fields) => editor.resolve(fields)?,
            None => Object::Array(Vec::new()),
        };

        let mut form = FormFields::default();
        let mut visited = HashSet::new();
        for root in roots.as_array().map(|a| a.as_slice()).unwrap_or(&[]) {
            if let Some(r) = root.as_reference() {
                form.walk(editor, r, None, None, FieldFlags::empty(), 0, &mut visited)?;
            }
        }
        Ok(Some(form))
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        editor: &DocumentEditor,
        node_ref: ObjectRef,
        parent_name: Option<&str>,
        inherited_type: Option<&str>,
        inherited_flags: FieldFlags,
        depth: usize,
        visited: &mut HashSet<u32>,
    ) -> Result<()> {
        if depth > MAX_FIELD_DEPTH || !visited.insert(node_ref.id) {
            return Err(Error::CircularReference(node_ref));
        }
        let node = editor.get(node_ref.id)?;
        let dict = node.expect_dict()?;

        let Some(partial) = dict.get("T").and_then(|t| t.as_text()) else {
            log::debug!("skipping nameless field object {}", node_ref);
            return Ok(());
        };
        let name = match parent_name {
            Some(parent) => format!("{}.{}", parent, partial),
            None => partial,
        };
        let field_type = dict
            .get("FT")
            .and_then(|ft| ft.as_name())
            .or(inherited_type)
            .map(str::to_string);
        let flags = dict
            .get("Ff")
            .and_then(|ff| ff.as_integer())
            .map(|ff| FieldFlags::from_bits_truncate(ff as u32))
            .unwrap_or(inherited_flags);

        let kids: Vec<ObjectRef> = match dict.get("Kids") {
            Some(kids) => editor
                .resolve(kids)?
                .as_array()
                .map(|a| a.iter().filter_map(|k| k.as_reference()).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let mut child_fields = Vec::new();
        let mut widgets = Vec::new();
        for kid in kids {
            let kid_obj = editor.get(kid.id)?;
            if kid_obj.as_dict().is_some_and(|d| d.contains_key("T")) {
                child_fields.push(kid);
            } else {
                widgets.push(kid);
            }
        }

        if child_fields.is_empty() {
            if widgets.is_empty() && dict.contains_key("Rect") {
                widgets.push(node_ref);
            }
            self.fields.insert(
                name.clone(),
                FieldNode {
                    name,
                    reference: node_ref,
                    field_type,
                    flags,
                    widgets,
                },
            );
            return Ok(());
        }

        for child in child_fields {
            self.walk(
                editor,
                child,
                Some(&name),
                field_type.as_deref(),
                flags,
                depth + 1,
                visited,
            )?;
        }
        Ok(())
    }

    /// Look up a field by fully qualified name.
    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.get(name)
    }

    /// Whether a field with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in document order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.values()
    }

    /// Field names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Number of terminal fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Write a value into a field.
///
/// Text values go to text fields (with a fresh appearance stream per
/// widget); booleans go to checkboxes. Any other pairing is left alone and
/// reported as `false`.
pub fn fill_field(
    editor: &mut DocumentEditor,
    field: &FieldNode,
    value: &FormFieldValue,
    default_appearance: &str,
) -> Result<bool> {
    match (field.kind(), value) {
        (Some(FieldKind::Text), FormFieldValue::Text(text)) => {
            fill_text(editor, field, text, default_appearance)?;
            Ok(true)
        },
        (Some(FieldKind::Checkbox), FormFieldValue::Boolean(checked)) => {
            fill_checkbox(editor, field, *checked)?;
            Ok(true)
        },
        _ => Ok(false),
    }
}

fn fill_text(
    editor: &mut DocumentEditor,
    field: &FieldNode,
    text: &str,
    default_appearance: &str,
) -> Result<()> {
    let mut field_obj = editor.get(field.reference.id)?;
    let field_dict = field_obj.expect_dict_mut()?;
    field_dict.insert("V".to_string(), Object::text(text));
    let da = field_dict
        .get("DA")
        .and_then(|d| d.as_text())
        .unwrap_or_else(|| default_appearance.to_string());
    let font_size = font_size_from_da(&da).unwrap_or(10.0);
    editor.set(field.reference.id, field_obj);

    for widget_ref in &field.widgets {
        let mut widget = editor.get(widget_ref.id)?;
        let Some(rect) = widget.as_dict().and_then(|w| w.get("Rect")).and_then(read_rect) else {
            log::warn!("widget {} of field '{}' has no usable /Rect", widget_ref, field.name);
            continue;
        };
        let appearance = AppearanceGenerator::for_rect(rect).text(text, font_size);
        let ap_ref = editor.add(appearance);
        widget
            .expect_dict_mut()?
            .insert("AP".to_string(), Object::dict([("N", ap_ref.into())]));
        editor.set(widget_ref.id, widget);
    }
    Ok(())
}

fn fill_checkbox(editor: &mut DocumentEditor, field: &FieldNode, checked: bool) -> Result<()> {
    let mut on_state = None;
    for widget_ref in &field.widgets {
        let mut widget = editor.get(widget_ref.id)?;
        let state = on_state_name(&widget);
        let appearance_state = match (&state, checked) {
            (Some(on), true) => on.clone(),
            _ => "Off".to_string(),
        };
        if on_state.is_none() {
            on_state = state;
        }
        widget
            .expect_dict_mut()?
            .insert("AS".to_string(), Object::name(appearance_state));
        editor.set(widget_ref.id, widget);
    }

    let value = if checked {
        on_state.unwrap_or_else(|| "Yes".to_string())
    } else {
        "Off".to_string()
    };
    let mut field_obj = editor.get(field.reference.id)?;
    field_obj
        .expect_dict_mut()?
        .insert("V".to_string(), Object::name(value));
    editor.set(field.reference.id, field_obj);
    Ok(())
}

/// The non-Off state name in a widget's `/AP /N` dictionary.
fn on_state_name(widget: &Object) -> Option<String> {
    widget
        .as_dict()?
        .get("AP")?
        .as_dict()?
        .get("N")?
        .as_dict()?
        .keys()
        .find(|k| k.as_str() != "Off")
        .cloned()
}

/// Set the read-only flag on a field.
pub fn set_read_only(editor: &mut DocumentEditor, field: &FieldNode) -> Result<()> {
    let mut field_obj = editor.get(field.reference.id)?;
    let flags = field.flags | FieldFlags::READ_ONLY;
    field_obj
        .expect_dict_mut()?
        .insert("Ff".to_string(), Object::Integer(flags.bits() as i64));
    editor.set(field.reference.id, field_obj);
    Ok(())
}

/// Read a `[llx lly urx ury]` rectangle, normalising corner order.
pub fn read_rect(obj: &Object) -> Option<[f64; 4]> {
    let values: Vec<f64> = obj.as_array()?.iter().filter_map(|v| v.as_number()).collect();
    match values[..] {
        [x1, y1, x2, y2] => Some([x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]),
        _ => None,
    }
}

/// List every terminal field with its current state.
pub fn extract_fields(editor: &DocumentEditor) -> Result<Vec<FormFieldInfo>> {
    let Some(form) = FormFields::load(editor)? else {
        return Ok(Vec::new());
    };
    let pages = editor.page_refs()?;

    let mut infos = Vec::with_capacity(form.len());
    for field in form.iter() {
        let dict = editor.get(field.reference.id)?.expect_dict()?.clone();
        let value = dict.get("V").and_then(|v| match v {
            Object::String(_) => v.as_text(),
            Object::Name(n) => Some(n.clone()),
            _ => None,
        });
        let signed = field.is_signature() && dict.contains_key("V");

        let first_widget = match field.widgets.first() {
            Some(w) => Some(editor.get(w.id)?),
            None => None,
        };
        let widget_dict = first_widget.as_ref().and_then(|w| w.as_dict());
        let rect = widget_dict.and_then(|w| w.get("Rect")).and_then(read_rect);
        let page_index = widget_dict
            .and_then(|w| w.get("P"))
            .and_then(|p| p.as_reference())
            .and_then(|p| pages.iter().position(|page| *page == p));

        infos.push(FormFieldInfo {
            name: field.name.clone(),
            field_type: field.field_type.clone().unwrap_or_default(),
            kind: field.kind(),
            value,
            read_only: field.is_read_only(),
            signed,
            page_index,
            rect,
        });
    }
    Ok(infos)
}
