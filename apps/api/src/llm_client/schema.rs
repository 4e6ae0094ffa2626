//! Response schemas sent as `generationConfig.responseSchema`.
//!
//! The same value is used after the call to check that the decoded reply has the
//! requested top-level shape before it is handed to serde.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResponseSchema>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_ordering: Vec<String>,
}

impl ResponseSchema {
    pub fn primitive(kind: SchemaType, description: &str) -> Self {
        Self {
            kind,
            description: Some(description.to_string()),
            properties: None,
            items: None,
            required: vec![],
            property_ordering: vec![],
        }
    }

    /// Object whose listed fields are all required, in the given order.
    pub fn object(fields: &[(&str, SchemaType, &str)]) -> Self {
        let names: Vec<String> = fields.iter().map(|(name, _, _)| name.to_string()).collect();
        let properties = fields
            .iter()
            .map(|(name, kind, desc)| (name.to_string(), Self::primitive(*kind, desc)))
            .collect();
        Self {
            kind: SchemaType::Object,
            description: None,
            properties: Some(properties),
            items: None,
            required: names.clone(),
            property_ordering: names,
        }
    }

    pub fn array_of(item: ResponseSchema, description: &str) -> Self {
        Self {
            kind: SchemaType::Array,
            description: Some(description.to_string()),
            properties: None,
            items: Some(Box::new(item)),
            required: vec![],
            property_ordering: vec![],
        }
    }

    /// Checks container shape and the primitive type of every property that is present.
    ///
    /// Missing properties are left to typed deserialization, where domain defaults apply.
    pub fn check_shape(&self, value: &Value) -> Result<(), String> {
        self.check_at(value, "$")
    }

    fn check_at(&self, value: &Value, at: &str) -> Result<(), String> {
        let ok = match self.kind {
            SchemaType::Object => value.is_object(),
            SchemaType::Array => value.is_array(),
            SchemaType::String => value.is_string(),
            SchemaType::Integer => value.is_i64() || value.is_u64(),
        };
        if !ok {
            return Err(format!(
                "expected {:?} at {at}, found {}",
                self.kind,
                json_kind(value)
            ));
        }

        match (self.kind, value) {
            (SchemaType::Object, Value::Object(map)) => {
                if let Some(properties) = &self.properties {
                    for (name, schema) in properties {
                        match map.get(name) {
                            Some(Value::Null) | None => {}
                            Some(field) => schema.check_at(field, &format!("{at}.{name}"))?,
                        }
                    }
                }
            }
            (SchemaType::Array, Value::Array(items)) => {
                if let Some(item_schema) = &self.items {
                    for (i, item) in items.iter().enumerate() {
                        item_schema.check_at(item, &format!("{at}[{i}]"))?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
