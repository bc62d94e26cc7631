// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeSet, HashSet};

use serde::Deserialize;

use crate::{
    DevConfError, ErrorKind, OptionsBlock, OptionsValue, ScalarValue,
    Statement,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ScalarType {
    String,
    Int,
    /// Valueless statement, present means `true`.
    Flag,
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::String => "string",
                Self::Int => "int",
                Self::Flag => "flag",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldKind {
    Scalar(ScalarType),
    List(ScalarType),
    Set(ScalarType),
    Block(BlockModel),
    Blocks {
        /// Name of the sub-block field whose value tells siblings apart.
        identity: String,
        fields: BlockModel,
    },
}

/// Field is only valid when the discriminant holds one of the `values`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct VariantGuard {
    pub discriminant: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FieldModelRaw")]
#[non_exhaustive]
pub struct FieldModel {
    pub name: String,
    /// Path tokens of this field relative to its parent block.
    pub keyword: Vec<String>,
    pub kind: FieldKind,
    /// Value meaning "unset" for fields whose valid range would otherwise
    /// include the natural empty value.
    pub default: Option<ScalarValue>,
    /// Emit the bare path for a present block without any child statement.
    pub marker: bool,
    pub variant: Option<VariantGuard>,
    pub exclusive_group: Option<String>,
    pub requires: Vec<String>,
    pub required: bool,
}

impl FieldModel {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            keyword: vec![name.to_string()],
            kind,
            default: None,
            marker: true,
            variant: None,
            exclusive_group: None,
            requires: Vec::new(),
            required: false,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::String))
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Int))
    }

    pub fn flag(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Flag))
    }

    pub fn list(name: &str, item: ScalarType) -> Self {
        Self::new(name, FieldKind::List(item))
    }

    pub fn set(name: &str, item: ScalarType) -> Self {
        Self::new(name, FieldKind::Set(item))
    }

    pub fn block(name: &str, fields: BlockModel) -> Self {
        Self::new(name, FieldKind::Block(fields))
    }

    pub fn blocks(name: &str, identity: &str, fields: BlockModel) -> Self {
        Self::new(
            name,
            FieldKind::Blocks {
                identity: identity.to_string(),
                fields,
            },
        )
    }

    /// Override the statement keyword, several tokens separated by space.
    pub fn keyword(mut self, keyword: &str) -> Self {
        self.keyword = keyword.split_whitespace().map(String::from).collect();
        self
    }

    pub fn default_value<T>(mut self, value: T) -> Self
    where
        T: Into<ScalarValue>,
    {
        self.default = Some(value.into());
        self
    }

    pub fn marker(mut self, value: bool) -> Self {
        self.marker = value;
        self
    }

    pub fn variant(mut self, discriminant: &str, values: &[&str]) -> Self {
        self.variant = Some(VariantGuard {
            discriminant: discriminant.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn exclusive_group(mut self, group: &str) -> Self {
        self.exclusive_group = Some(group.to_string());
        self
    }

    pub fn requires(mut self, other_field: &str) -> Self {
        self.requires.push(other_field.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether this value means "unset" for this field.
    pub fn is_default(&self, value: &OptionsValue) -> bool {
        match value {
            OptionsValue::Scalar(v) => {
                if let Some(d) = self.default.as_ref() {
                    v == d
                } else {
                    v == &ScalarValue::Bool(false)
                        && self.kind == FieldKind::Scalar(ScalarType::Flag)
                }
            }
            OptionsValue::List(v) => v.is_empty(),
            OptionsValue::Set(v) => v.is_empty(),
            OptionsValue::Blocks(v) => v.is_empty(),
            // A present block is never default, even when empty, as it
            // still emits its own path.
            OptionsValue::Block(_) => false,
        }
    }

    fn initial_value(&self) -> Option<OptionsValue> {
        match &self.kind {
            FieldKind::Scalar(ScalarType::Flag) => Some(
                self.default
                    .clone()
                    .unwrap_or(ScalarValue::Bool(false))
                    .into(),
            ),
            FieldKind::Scalar(_) => self.default.clone().map(Into::into),
            FieldKind::List(_) => Some(OptionsValue::List(Vec::new())),
            FieldKind::Set(_) => Some(OptionsValue::Set(BTreeSet::new())),
            FieldKind::Blocks { .. } => Some(OptionsValue::Blocks(Vec::new())),
            FieldKind::Block(_) => None,
        }
    }

    fn validate(&self) -> Result<(), DevConfError> {
        if self.keyword.is_empty() {
            return Err(model_error(format!(
                "Field {} has empty keyword",
                self.name
            )));
        }
        if let Some(default) = self.default.as_ref() {
            match &self.kind {
                FieldKind::Scalar(ScalarType::Flag)
                    if default != &ScalarValue::Bool(false) =>
                {
                    return Err(model_error(format!(
                        "Flag field {} can only default to false",
                        self.name
                    )));
                }
                FieldKind::Scalar(t) => {
                    if !default.matches_type(*t) {
                        return Err(model_error(format!(
                            "Default value {default} of field {} \
                            is not of type {t}",
                            self.name
                        )));
                    }
                }
                _ => {
                    return Err(model_error(format!(
                        "Field {} only scalar field can have default value",
                        self.name
                    )));
                }
            }
        }
        match &self.kind {
            FieldKind::List(ScalarType::Flag)
            | FieldKind::Set(ScalarType::Flag) => Err(model_error(format!(
                "Field {} cannot hold a collection of flags",
                self.name
            ))),
            FieldKind::Block(m) => m.validate(),
            FieldKind::Blocks { identity, fields } => {
                match fields.field(identity).map(|f| &f.kind) {
                    Some(FieldKind::Scalar(ScalarType::String))
                    | Some(FieldKind::Scalar(ScalarType::Int)) => (),
                    _ => {
                        return Err(model_error(format!(
                            "Identity {identity} of field {} is not a \
                            string or integer field of its block",
                            self.name
                        )));
                    }
                }
                fields.validate()
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum RawFieldType {
    String,
    Int,
    Flag,
    List,
    Set,
    Block,
    Blocks,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FieldModelRaw {
    name: String,
    #[serde(rename = "type")]
    field_type: RawFieldType,
    item: Option<ScalarType>,
    keyword: Option<String>,
    default: Option<serde_json::Value>,
    marker: Option<bool>,
    identity: Option<String>,
    #[serde(default)]
    fields: BlockModel,
    variant: Option<VariantGuard>,
    exclusive_group: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    required: bool,
}

impl TryFrom<FieldModelRaw> for FieldModel {
    type Error = DevConfError;

    fn try_from(raw: FieldModelRaw) -> Result<Self, Self::Error> {
        let item = raw.item.unwrap_or(ScalarType::String);
        let kind = match raw.field_type {
            RawFieldType::String => FieldKind::Scalar(ScalarType::String),
            RawFieldType::Int => FieldKind::Scalar(ScalarType::Int),
            RawFieldType::Flag => FieldKind::Scalar(ScalarType::Flag),
            RawFieldType::List => FieldKind::List(item),
            RawFieldType::Set => FieldKind::Set(item),
            RawFieldType::Block => FieldKind::Block(raw.fields),
            RawFieldType::Blocks => FieldKind::Blocks {
                identity: raw.identity.unwrap_or_else(|| "name".to_string()),
                fields: raw.fields,
            },
        };
        let default = match (&kind, raw.default) {
            (_, None) => None,
            (FieldKind::Scalar(ScalarType::Int), Some(v)) => {
                match v.as_i64() {
                    Some(i) => Some(ScalarValue::Int(i)),
                    None => {
                        return Err(model_error(format!(
                            "Default value {v} of field {} is not an integer",
                            raw.name
                        )));
                    }
                }
            }
            (FieldKind::Scalar(ScalarType::Flag), Some(v)) => {
                match v.as_bool() {
                    Some(b) => Some(ScalarValue::Bool(b)),
                    None => {
                        return Err(model_error(format!(
                            "Default value {v} of field {} is not a boolean",
                            raw.name
                        )));
                    }
                }
            }
            (_, Some(serde_json::Value::String(s))) => {
                Some(ScalarValue::Str(s))
            }
            (_, Some(v)) => Some(ScalarValue::Str(v.to_string())),
        };
        let mut ret = FieldModel::new(&raw.name, kind);
        if let Some(keyword) = raw.keyword.as_deref() {
            ret = ret.keyword(keyword);
        }
        ret.default = default;
        ret.marker = raw.marker.unwrap_or(true);
        ret.variant = raw.variant;
        ret.exclusive_group = raw.exclusive_group;
        ret.requires = raw.requires;
        ret.required = raw.required;
        Ok(ret)
    }
}

/// Fields of one block in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct BlockModel {
    pub fields: Vec<FieldModel>,
}

impl BlockModel {
    pub fn new(fields: Vec<FieldModel>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// A block with every field at its unset value: sentinel for scalars
    /// carrying one, `false` for flags, empty for lists, sets and repeated
    /// blocks, absent for everything else.
    pub fn new_block(&self) -> OptionsBlock {
        let mut ret = OptionsBlock::new();
        for field in self.fields.as_slice() {
            if let Some(v) = field.initial_value() {
                ret.set(&field.name, v);
            }
        }
        ret
    }

    /// Whether every field of the block is unset.
    pub fn is_default(&self, block: &OptionsBlock) -> bool {
        block.iter().all(|(name, value)| match self.field(name) {
            Some(field) => field.is_default(value),
            None => true,
        })
    }

    pub fn validate(&self) -> Result<(), DevConfError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut keywords: HashSet<&[String]> = HashSet::new();
        for field in self.fields.as_slice() {
            if !names.insert(field.name.as_str()) {
                return Err(model_error(format!(
                    "Duplicate field name {}",
                    field.name
                )));
            }
            if !keywords.insert(field.keyword.as_slice()) {
                return Err(model_error(format!(
                    "Duplicate keyword '{}' on field {}",
                    field.keyword.join(" "),
                    field.name
                )));
            }
            field.validate()?;
        }
        for field in self.fields.as_slice() {
            for dep in field.requires.as_slice() {
                if self.field(dep).is_none() {
                    return Err(model_error(format!(
                        "Field {} requires unknown field {dep}",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One manageable feature: where its statements live on the device and
/// the model of its options tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FeatureModelRaw")]
#[non_exhaustive]
pub struct FeatureModel {
    pub name: String,
    pub base_path: Vec<String>,
    /// Tree field appended to `base_path` to address one object.
    pub identity: Option<String>,
    /// Paths relative to the object path removed before a replace. An empty
    /// path stands for the object path itself.
    pub delete_paths: Vec<Vec<String>>,
    pub fields: BlockModel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FeatureModelRaw {
    name: String,
    base_path: String,
    identity: Option<String>,
    #[serde(default)]
    delete_paths: Vec<String>,
    fields: BlockModel,
}

impl TryFrom<FeatureModelRaw> for FeatureModel {
    type Error = DevConfError;

    fn try_from(raw: FeatureModelRaw) -> Result<Self, Self::Error> {
        let base_path = Statement::parse(&raw.base_path)?.into_tokens();
        let mut delete_paths = Vec::new();
        for path in raw.delete_paths.as_slice() {
            delete_paths.push(Statement::parse(path)?.into_tokens());
        }
        let ret = FeatureModel::new(
            &raw.name,
            base_path,
            raw.identity.as_deref(),
            delete_paths,
            raw.fields,
        );
        ret.validate()?;
        Ok(ret)
    }
}

impl FeatureModel {
    pub fn new(
        name: &str,
        base_path: Vec<String>,
        identity: Option<&str>,
        delete_paths: Vec<Vec<String>>,
        fields: BlockModel,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_path,
            identity: identity.map(String::from),
            delete_paths: if delete_paths.is_empty() {
                vec![Vec::new()]
            } else {
                delete_paths
            },
            fields,
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, DevConfError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), DevConfError> {
        if self.base_path.is_empty() {
            return Err(model_error(format!(
                "Feature {} has empty base path",
                self.name
            )));
        }
        if let Some(identity) = self.identity.as_deref() {
            match self.fields.field(identity).map(|f| &f.kind) {
                Some(FieldKind::Scalar(ScalarType::String)) => (),
                _ => {
                    return Err(model_error(format!(
                        "Identity {identity} of feature {} is not a string \
                        field",
                        self.name
                    )));
                }
            }
        }
        self.fields.validate()
    }

    /// The tree of an object which does not exist on device.
    pub fn new_tree(&self, identity: &str) -> OptionsBlock {
        let mut ret = self.fields.new_block();
        if let Some(id_field) = self.identity.as_deref() {
            ret.set(id_field, identity);
        }
        ret
    }

    pub fn identity_of<'a>(&self, tree: &'a OptionsBlock) -> &'a str {
        self.identity
            .as_deref()
            .and_then(|i| tree.get_str(i))
            .unwrap_or_default()
    }

    /// Decompiling a missing object gives a tree with empty identity.
    pub fn is_absent(&self, tree: &OptionsBlock) -> bool {
        if self.identity.is_some() {
            self.identity_of(tree).is_empty()
        } else {
            self.fields.is_default(tree)
        }
    }

    /// Path of one object, `base_path` followed by the identity if any.
    pub fn object_path(&self, identity: &str) -> Statement {
        let mut tokens = self.base_path.clone();
        if self.identity.is_some() {
            tokens.push(identity.to_string());
        }
        Statement::new(tokens)
    }

    pub(crate) fn delete_statements(&self, identity: &str) -> Vec<Statement> {
        let object_path = self.object_path(identity);
        self.delete_paths
            .iter()
            .map(|p| object_path.join(&Statement::new(p.clone())))
            .collect()
    }
}

fn model_error(msg: String) -> DevConfError {
    let e = DevConfError::new(ErrorKind::InvalidArgument, msg);
    log::error!("{}", e);
    e
}
