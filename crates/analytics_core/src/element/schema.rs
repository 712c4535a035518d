//! Schema DSL: a compiled extractor, parsed once at construction time, that
//! projects a [`StreamElement`] down to one field/array/position/key
//! component. Parsing happens at startup (a malformed schema string is a
//! configuration error, not a per-element one); applying a parsed schema to
//! an element either yields the documented component or a structured
//! [`AnalyticsError`] — it never panics and never returns `null`.

use super::{NonAtomicPhase, StreamElement, Value};
use crate::error::{AnalyticsError, ConfigError};
use crate::geometry::Vec3;
use once_cell::sync::Lazy;

/// A parsed schema, one of the forms documented in the design's Schema DSL
/// table.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Key,
    StreamName,
    Static(String),
    FieldValue { name: String, in_payload: bool },
    ArrayValue { name: String, index: usize, in_payload: bool },
    ArraySize { name: String, in_payload: bool },
    PositionValue { index: usize },
    Phase,
    /// The deliberate "inapplicable" schema: processors that key state
    /// manually use this as their inner-key schema and apply always fails.
    No,
}

/// What `Schema::apply` yields; callers narrow with the typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaValue {
    Str(String),
    Scalar(Value),
    Long(i64),
    Vector(Vec3),
    Phase(NonAtomicPhase),
}

impl SchemaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SchemaValue::Str(s) => Some(s.as_str()),
            SchemaValue::Scalar(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SchemaValue::Scalar(v) => v.as_f64(),
            SchemaValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SchemaValue::Scalar(v) => v.as_i64(),
            SchemaValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SchemaValue::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            SchemaValue::Vector(v) => Some(*v),
            SchemaValue::Scalar(Value::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    /// String-rendering used by FilterModule's EQ/NEQ/IN predicates, which
    /// compare against string-literal configured values.
    pub fn render(&self) -> String {
        match self {
            SchemaValue::Str(s) => s.clone(),
            SchemaValue::Scalar(Value::Str(s)) => s.clone(),
            SchemaValue::Scalar(Value::Bool(b)) => b.to_string(),
            SchemaValue::Scalar(Value::Long(v)) => v.to_string(),
            SchemaValue::Scalar(Value::Double(v)) => v.to_string(),
            SchemaValue::Scalar(Value::Vector(v)) => format!("{},{},{}", v.x, v.y, v.z),
            SchemaValue::Scalar(Value::Array(_)) => String::new(),
            SchemaValue::Long(v) => v.to_string(),
            SchemaValue::Vector(v) => format!("{},{},{}", v.x, v.y, v.z),
            SchemaValue::Phase(NonAtomicPhase::Start) => "START".to_string(),
            SchemaValue::Phase(NonAtomicPhase::Active) => "ACTIVE".to_string(),
            SchemaValue::Phase(NonAtomicPhase::End) => "END".to_string(),
        }
    }
}

/// Process-wide constant: the inapplicable schema used wherever a
/// processor needs manual inner-keying instead of a schema-derived one.
pub static NO: Lazy<Schema> = Lazy::new(|| Schema::No);

/// Process-wide constant: the STATIC schema mapping every element of a
/// stream to the single inner-key `"all"`.
pub static STATIC_ALL: Lazy<Schema> = Lazy::new(|| Schema::Static("all".to_string()));

impl Schema {
    /// Parses the textual form documented in the Schema DSL table. Called
    /// once per configured schema at worker startup; a malformed string is
    /// a fatal configuration error.
    pub fn parse(spec: &str) -> std::result::Result<Schema, ConfigError> {
        let spec = spec.trim();
        if spec == "key" {
            return Ok(Schema::Key);
        }
        if spec == "streamName" {
            return Ok(Schema::StreamName);
        }
        if spec == "phase" {
            return Ok(Schema::Phase);
        }
        if spec == "no" {
            return Ok(Schema::No);
        }
        if let Some(inner) = strip_call(spec, "static") {
            return Ok(Schema::Static(inner.to_string()));
        }
        if let Some(inner) = strip_call(spec, "positionValue") {
            let index: usize = inner.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "schema".to_string(),
                value: spec.to_string(),
                reason: "positionValue index must be a non-negative integer".to_string(),
            })?;
            return Ok(Schema::PositionValue { index });
        }
        if let Some(inner) = strip_call(spec, "fieldValue") {
            let (name, in_payload) = parse_name_in_payload(inner, spec)?;
            return Ok(Schema::FieldValue { name, in_payload });
        }
        if let Some(inner) = strip_call(spec, "arraySize") {
            let (name, in_payload) = parse_name_in_payload(inner, spec)?;
            return Ok(Schema::ArraySize { name, in_payload });
        }
        if let Some(inner) = strip_call(spec, "arrayValue") {
            let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(ConfigError::InvalidValue {
                    key: "schema".to_string(),
                    value: spec.to_string(),
                    reason: "arrayValue expects {name, i, inPayload}".to_string(),
                });
            }
            let index: usize = parts[1].parse().map_err(|_| ConfigError::InvalidValue {
                key: "schema".to_string(),
                value: spec.to_string(),
                reason: "arrayValue index must be a non-negative integer".to_string(),
            })?;
            let in_payload = parse_bool(parts[2], spec)?;
            return Ok(Schema::ArrayValue { name: parts[0].to_string(), index, in_payload });
        }
        Err(ConfigError::InvalidValue {
            key: "schema".to_string(),
            value: spec.to_string(),
            reason: "unrecognized schema form".to_string(),
        })
    }

    /// Applies the schema to an element, yielding the documented component
    /// or a structured, recoverable error.
    pub fn apply(&self, element: &StreamElement) -> std::result::Result<SchemaValue, AnalyticsError> {
        match self {
            Schema::Key => Ok(SchemaValue::Str(element.key.clone())),
            Schema::StreamName => Ok(SchemaValue::Str(element.stream_name.clone())),
            Schema::Static(v) => Ok(SchemaValue::Str(v.clone())),
            Schema::Phase => element
                .phase
                .map(SchemaValue::Phase)
                .ok_or(AnalyticsError::NotNonAtomic),
            Schema::PositionValue { index } => element
                .positions
                .get(*index)
                .map(|v| SchemaValue::Vector(*v))
                .ok_or(AnalyticsError::PositionIndexOutOfBounds {
                    index: *index,
                    len: element.positions.len(),
                }),
            Schema::FieldValue { name, in_payload } => {
                field_value(element, name, *in_payload).map(SchemaValue::Scalar)
            }
            Schema::ArraySize { name, in_payload } => {
                array_len(element, name, *in_payload).map(|len| SchemaValue::Long(len as i64))
            }
            Schema::ArrayValue { name, index, in_payload } => {
                array_value(element, name, *index, *in_payload).map(SchemaValue::Scalar)
            }
            Schema::No => Err(AnalyticsError::SchemaNotApplicable {
                schema: "no".to_string(),
                stream: element.stream_name.clone(),
            }),
        }
    }
}

fn strip_call<'a>(spec: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{name}{{");
    if let Some(rest) = spec.strip_prefix(&prefix) {
        rest.strip_suffix('}')
    } else {
        None
    }
}

fn parse_name_in_payload(inner: &str, original: &str) -> std::result::Result<(String, bool), ConfigError> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(ConfigError::InvalidValue {
            key: "schema".to_string(),
            value: original.to_string(),
            reason: "expected {name, inPayload}".to_string(),
        });
    }
    let in_payload = parse_bool(parts[1], original)?;
    Ok((parts[0].to_string(), in_payload))
}

fn parse_bool(s: &str, original: &str) -> std::result::Result<bool, ConfigError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: "schema".to_string(),
            value: original.to_string(),
            reason: format!("expected true/false, got `{s}`"),
        }),
    }
}

fn field_value(element: &StreamElement, name: &str, in_payload: bool) -> std::result::Result<Value, AnalyticsError> {
    if in_payload {
        return element.payload.get(name).cloned().ok_or_else(|| AnalyticsError::FieldMissing {
            name: name.to_string(),
            stream: element.stream_name.clone(),
        });
    }
    match name {
        "key" => Ok(Value::Str(element.key.clone())),
        "streamName" => Ok(Value::Str(element.stream_name.clone())),
        "generationTimestamp" => Ok(Value::Long(element.generation_timestamp)),
        "atomic" => Ok(Value::Bool(element.atomic)),
        "eventId" => element
            .event_id
            .clone()
            .map(Value::Str)
            .ok_or_else(|| AnalyticsError::FieldMissing { name: name.to_string(), stream: element.stream_name.clone() }),
        "counter" => element
            .counter
            .map(Value::Long)
            .ok_or_else(|| AnalyticsError::FieldMissing { name: name.to_string(), stream: element.stream_name.clone() }),
        _ => Err(AnalyticsError::FieldMissing { name: name.to_string(), stream: element.stream_name.clone() }),
    }
}

fn header_array<'a>(element: &'a StreamElement, name: &str) -> Option<Vec<Value>> {
    match name {
        "objectIds" => Some(element.object_ids.iter().cloned().map(Value::Str).collect()),
        "groupIds" => Some(element.group_ids.iter().cloned().map(Value::Str).collect()),
        _ => {
            let _ = element;
            None
        }
    }
}

fn array_len(element: &StreamElement, name: &str, in_payload: bool) -> std::result::Result<usize, AnalyticsError> {
    if in_payload {
        let v = element.payload.get(name).ok_or_else(|| AnalyticsError::FieldMissing {
            name: name.to_string(),
            stream: element.stream_name.clone(),
        })?;
        return v.as_array().map(<[Value]>::len).ok_or_else(|| AnalyticsError::FieldTypeMismatch {
            name: name.to_string(),
            stream: element.stream_name.clone(),
        });
    }
    header_array(element, name).map(|v| v.len()).ok_or_else(|| AnalyticsError::FieldMissing {
        name: name.to_string(),
        stream: element.stream_name.clone(),
    })
}

fn array_value(
    element: &StreamElement,
    name: &str,
    index: usize,
    in_payload: bool,
) -> std::result::Result<Value, AnalyticsError> {
    let arr = if in_payload {
        let v = element.payload.get(name).ok_or_else(|| AnalyticsError::FieldMissing {
            name: name.to_string(),
            stream: element.stream_name.clone(),
        })?;
        v.as_array()
            .map(<[Value]>::to_vec)
            .ok_or_else(|| AnalyticsError::FieldTypeMismatch { name: name.to_string(), stream: element.stream_name.clone() })?
    } else {
        header_array(element, name).ok_or_else(|| AnalyticsError::FieldMissing {
            name: name.to_string(),
            stream: element.stream_name.clone(),
        })?
    };
    let len = arr.len();
    arr.into_iter().nth(index).ok_or(AnalyticsError::ArrayIndexOutOfBounds { name: name.to_string(), index, len })
}
