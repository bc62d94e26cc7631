// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::{
    BlockModel, DevConfError, ErrorKind, FieldKind, FieldModel, ScalarType,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ScalarValue {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        if let Self::Str(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Self::Int(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub(crate) fn matches_type(&self, scalar_type: ScalarType) -> bool {
        matches!(
            (self, scalar_type),
            (Self::Str(_), ScalarType::String)
                | (Self::Int(_), ScalarType::Int)
                | (Self::Bool(_), ScalarType::Flag)
        )
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Bool(b) => Value::Bool(*b),
        }
    }

    fn from_json(
        value: &Value,
        scalar_type: ScalarType,
        field_name: &str,
    ) -> Result<Self, DevConfError> {
        match (scalar_type, value) {
            (ScalarType::String, Value::String(s)) => Ok(Self::Str(s.clone())),
            // Numbers given to a string field are kept as text
            (ScalarType::String, Value::Number(n)) => {
                Ok(Self::Str(n.to_string()))
            }
            (ScalarType::Int, Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => Err(DevConfError::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "Field {field_name} expects a 64 bits signed \
                        integer, but got {n}"
                    ),
                )),
            },
            (ScalarType::Int, Value::String(s)) => {
                s.parse::<i64>().map(Self::Int).map_err(|e| {
                    DevConfError::new(
                        ErrorKind::InvalidArgument,
                        format!(
                            "Field {field_name} expects an integer, \
                            but got {s:?}: {e}"
                        ),
                    )
                })
            }
            (ScalarType::Flag, Value::Bool(b)) => Ok(Self::Bool(*b)),
            (_, v) => Err(DevConfError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Field {field_name} expects a {scalar_type} value, \
                    but got {v}"
                ),
            )),
        }
    }
}

/// One node of an options tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OptionsValue {
    Scalar(ScalarValue),
    /// Ordered list, insertion order is kept.
    List(Vec<ScalarValue>),
    /// Unique values, order is not significant.
    Set(BTreeSet<ScalarValue>),
    Block(OptionsBlock),
    /// Repeated sub-blocks told apart by their identity field, kept in
    /// first-seen order.
    Blocks(Vec<OptionsBlock>),
}

impl From<ScalarValue> for OptionsValue {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

impl From<&str> for OptionsValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.into())
    }
}

impl From<i64> for OptionsValue {
    fn from(i: i64) -> Self {
        Self::Scalar(i.into())
    }
}

impl From<i32> for OptionsValue {
    fn from(i: i32) -> Self {
        Self::Scalar(i.into())
    }
}

impl From<bool> for OptionsValue {
    fn from(b: bool) -> Self {
        Self::Scalar(b.into())
    }
}

impl From<OptionsBlock> for OptionsValue {
    fn from(b: OptionsBlock) -> Self {
        Self::Block(b)
    }
}

impl OptionsValue {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Block(_) => "block",
            Self::Blocks(_) => "blocks",
        }
    }
}

/// Mapping of field name to value. A missing key means the field is unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct OptionsBlock {
    values: BTreeMap<String, OptionsValue>,
}

impl OptionsBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&OptionsValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut OptionsValue> {
        self.values.get_mut(name)
    }

    pub fn set<T>(&mut self, name: &str, value: T) -> &mut Self
    where
        T: Into<OptionsValue>,
    {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionsValue> {
        self.values.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionsValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_scalar(&self, name: &str) -> Option<&ScalarValue> {
        if let Some(OptionsValue::Scalar(v)) = self.values.get(name) {
            Some(v)
        } else {
            None
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_scalar(name).and_then(|v| v.as_str())
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get_scalar(name).and_then(|v| v.as_int())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_scalar(name).and_then(|v| v.as_bool())
    }

    pub fn get_block(&self, name: &str) -> Option<&OptionsBlock> {
        if let Some(OptionsValue::Block(b)) = self.values.get(name) {
            Some(b)
        } else {
            None
        }
    }

    pub fn get_blocks(&self, name: &str) -> &[OptionsBlock] {
        if let Some(OptionsValue::Blocks(b)) = self.values.get(name) {
            b.as_slice()
        } else {
            &[]
        }
    }

    /// Serialize in field declaration order of the model. Keys unknown to
    /// the model are dropped.
    pub fn to_json(&self, model: &BlockModel) -> Value {
        let mut ret = Map::new();
        for field in model.fields.as_slice() {
            if let Some(value) = self.values.get(&field.name) {
                ret.insert(field.name.clone(), value_to_json(value, field));
            }
        }
        Value::Object(ret)
    }

    /// Build a tree from JSON (or YAML loaded as JSON value) input.
    /// Missing fields keep what [BlockModel::new_block()] gives them.
    pub fn from_json(
        value: &Value,
        model: &BlockModel,
    ) -> Result<Self, DevConfError> {
        let obj = match value {
            Value::Object(o) => o,
            Value::Null => return Ok(model.new_block()),
            v => {
                return Err(DevConfError::new(
                    ErrorKind::InvalidArgument,
                    format!("Expecting a mapping, but got {v}"),
                ));
            }
        };
        let mut ret = model.new_block();
        for (key, sub_value) in obj.iter() {
            let field = match model.field(key) {
                Some(f) => f,
                None => {
                    return Err(DevConfError::new(
                        ErrorKind::InvalidArgument,
                        format!(
                            "Unknown field {key}, supported fields are: {}",
                            model.field_names().join(", ")
                        ),
                    ));
                }
            };
            if sub_value.is_null() {
                continue;
            }
            ret.values
                .insert(key.clone(), value_from_json(sub_value, field)?);
        }
        Ok(ret)
    }
}

fn value_to_json(value: &OptionsValue, field: &FieldModel) -> Value {
    match value {
        OptionsValue::Scalar(v) => v.to_json(),
        OptionsValue::List(items) => {
            Value::Array(items.iter().map(|v| v.to_json()).collect())
        }
        OptionsValue::Set(items) => {
            Value::Array(items.iter().map(|v| v.to_json()).collect())
        }
        OptionsValue::Block(b) => match &field.kind {
            FieldKind::Block(m) => b.to_json(m),
            _ => Value::Null,
        },
        OptionsValue::Blocks(blocks) => match &field.kind {
            FieldKind::Blocks { fields, .. } => {
                Value::Array(blocks.iter().map(|b| b.to_json(fields)).collect())
            }
            _ => Value::Null,
        },
    }
}

fn value_from_json(
    value: &Value,
    field: &FieldModel,
) -> Result<OptionsValue, DevConfError> {
    match &field.kind {
        FieldKind::Scalar(t) => Ok(OptionsValue::Scalar(
            ScalarValue::from_json(value, *t, &field.name)?,
        )),
        FieldKind::List(t) => {
            let mut items = Vec::new();
            for item in json_as_array(value, &field.name)? {
                items.push(ScalarValue::from_json(item, *t, &field.name)?);
            }
            Ok(OptionsValue::List(items))
        }
        FieldKind::Set(t) => {
            let mut items = BTreeSet::new();
            for item in json_as_array(value, &field.name)? {
                items.insert(ScalarValue::from_json(item, *t, &field.name)?);
            }
            Ok(OptionsValue::Set(items))
        }
        FieldKind::Block(m) => {
            Ok(OptionsValue::Block(OptionsBlock::from_json(value, m)?))
        }
        FieldKind::Blocks { fields, .. } => {
            let mut blocks = Vec::new();
            for item in json_as_array(value, &field.name)? {
                blocks.push(OptionsBlock::from_json(item, fields)?);
            }
            Ok(OptionsValue::Blocks(blocks))
        }
    }
}

fn json_as_array<'a>(
    value: &'a Value,
    field_name: &str,
) -> Result<&'a [Value], DevConfError> {
    if let Value::Array(a) = value {
        Ok(a.as_slice())
    } else {
        Err(DevConfError::new(
            ErrorKind::InvalidArgument,
            format!("Field {field_name} expects a list, but got {value}"),
        ))
    }
}
