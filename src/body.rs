//! Request body encoding: JSON payloads and multipart form data.

use crate::{Result, TypedError};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use serde_json::{json, Value};

/// A file attached to a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Sets the MIME type of this part.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn echo(&self) -> Value {
        json!({ "fileName": self.file_name, "size": self.data.len() })
    }
}

/// A value of a form field in a [`FormSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Attached as a string field.
    Text(String),
    /// Attached as a single file.
    File(FilePart),
    /// Attached as repeated file entries under the same name.
    Files(Vec<FilePart>),
    /// JSON text of a nested value, or the serializer's error message.
    Json(std::result::Result<String, String>),
}

impl FormValue {
    /// Serializes `value` into a JSON string field.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        FormValue::Json(serde_json::to_string(value).map_err(|e| e.to_string()))
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<FilePart> for FormValue {
    fn from(file: FilePart) -> Self {
        FormValue::File(file)
    }
}

impl From<Vec<FilePart>> for FormValue {
    fn from(files: Vec<FilePart>) -> Self {
        FormValue::Files(files)
    }
}

macro_rules! form_value_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FormValue {
                fn from(value: $t) -> Self {
                    FormValue::Text(value.to_string())
                }
            }
        )*
    };
}

form_value_from_display!(bool, i32, i64, u32, u64, usize, f32, f64);

/// A field-by-field description of a multipart body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSpec {
    fields: Vec<(String, Option<FormValue>)>,
}

impl FormSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.fields.push((name.into(), Some(value.into())));
        self
    }

    /// Adds a field that may be absent; `None` fields are skipped when encoding.
    pub fn optional_field(mut self, name: impl Into<String>, value: Option<FormValue>) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Expands the spec into a fresh [`FormData`].
    pub fn encode(&self) -> Result<FormData> {
        let mut form = FormData::new();
        for (name, value) in &self.fields {
            match value {
                None => {}
                Some(FormValue::Text(text)) => form.append_text(name, text),
                Some(FormValue::File(file)) => form.append_file(name, file.clone()),
                Some(FormValue::Files(files)) if !files.is_empty() => {
                    for file in files {
                        form.append_file(name, file.clone());
                    }
                }
                Some(FormValue::Files(_)) => form.append_text(name, "[]"),
                Some(FormValue::Json(Ok(json))) => form.append_text(name, json),
                Some(FormValue::Json(Err(e))) => {
                    return Err(TypedError::invalid_options(format!(
                        "Invalid form data field '{name}': {e}"
                    )))
                }
            }
        }
        Ok(form)
    }

    fn echo(&self) -> Value {
        let fields = self
            .fields
            .iter()
            .filter_map(|(name, value)| {
                let value = match value.as_ref()? {
                    FormValue::Text(text) => Value::String(text.clone()),
                    FormValue::File(file) => file.echo(),
                    FormValue::Files(files) => files.iter().map(FilePart::echo).collect(),
                    FormValue::Json(Ok(json)) => Value::String(json.clone()),
                    FormValue::Json(Err(_)) => Value::Null,
                };
                Some((name.clone(), value))
            })
            .collect();
        Value::Object(fields)
    }
}

/// One entry of a [`FormData`] container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEntry {
    Text(String),
    File(FilePart),
}

/// A ready-to-send multipart container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormEntry)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), FormEntry::Text(value.into())));
    }

    pub fn append_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.entries.push((name.into(), FormEntry::File(file)));
    }

    pub fn entries(&self) -> &[(String, FormEntry)] {
        &self.entries
    }

    /// Converts into a `reqwest` multipart form.
    pub fn into_multipart(self) -> std::result::Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for (name, entry) in self.entries {
            form = match entry {
                FormEntry::Text(text) => form.text(name, text),
                FormEntry::File(file) => {
                    let mut part = reqwest::multipart::Part::stream(file.data)
                        .file_name(file.file_name);
                    if let Some(content_type) = file.content_type {
                        part = part.mime_str(&content_type)?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }

    fn echo(&self) -> Value {
        let mut fields = serde_json::Map::new();
        for (name, entry) in &self.entries {
            let value = match entry {
                FormEntry::Text(text) => Value::String(text.clone()),
                FormEntry::File(file) => file.echo(),
            };
            match fields.get_mut(name) {
                Some(Value::Array(values)) => values.push(value),
                Some(first) => *first = Value::Array(vec![first.take(), value]),
                None => {
                    fields.insert(name.clone(), value);
                }
            }
        }
        Value::Object(fields)
    }
}

/// Form data passed to a call: either a spec to expand or a pre-built container.
#[derive(Debug, Clone, PartialEq)]
pub enum FormDataInput {
    Spec(FormSpec),
    Prebuilt(FormData),
}

impl FormDataInput {
    /// A JSON description of the form data, echoed on errors.
    pub fn echo(&self) -> Value {
        match self {
            FormDataInput::Spec(spec) => spec.echo(),
            FormDataInput::Prebuilt(form) => form.echo(),
        }
    }
}

impl From<FormSpec> for FormDataInput {
    fn from(spec: FormSpec) -> Self {
        FormDataInput::Spec(spec)
    }
}

impl From<FormData> for FormDataInput {
    fn from(form: FormData) -> Self {
        FormDataInput::Prebuilt(form)
    }
}

/// The encoded body handed to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(String),
    Multipart(FormData),
}

/// Methods that never carry a body.
pub fn is_bodyless(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE
}

/// Checks that at most one body source is used, and only with a method that takes one.
pub fn check_body_source(method: &Method, has_payload: bool, has_form: bool) -> Result<()> {
    if has_payload && has_form {
        return Err(TypedError::invalid_options(
            "Cannot use both payload and multiPart",
        ));
    }
    if (has_payload || has_form) && is_bodyless(method) {
        return Err(TypedError::invalid_options(format!(
            "Cannot use payload or multiPart with {method} requests"
        )));
    }
    Ok(())
}

/// Encodes the body and adjusts the content type in `headers`.
///
/// Multipart bodies drop any explicit content type so the transport can set the
/// boundary; JSON bodies get `application/json` unless a content type is present.
pub fn encode(
    payload: Option<&std::result::Result<Value, String>>,
    form: Option<&FormDataInput>,
    headers: &mut HeaderMap,
) -> Result<RequestBody> {
    if let Some(form) = form {
        let form = match form {
            FormDataInput::Prebuilt(form) => form.clone(),
            FormDataInput::Spec(spec) => spec.encode()?,
        };
        headers.remove(CONTENT_TYPE);
        return Ok(RequestBody::Multipart(form));
    }

    match payload {
        None => Ok(RequestBody::Empty),
        Some(Err(e)) => Err(TypedError::invalid_options(format!("Invalid payload: {e}"))),
        Some(Ok(value)) => {
            let json = serde_json::to_string(value)
                .map_err(|e| TypedError::invalid_options(format!("Invalid payload: {e}")))?;
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Ok(RequestBody::Json(json))
        }
    }
}
