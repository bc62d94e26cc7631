// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use crate::{
    BlockModel, CodecContext, DevConfError, ErrorKind, FeatureModel,
    FieldKind, FieldModel, OptionsBlock, OptionsValue, ScalarType,
    ScalarValue, Statement, StatementBatch,
};

/// Compile an options tree into ordered statements relative to the block
/// owning `model`.
///
/// Every constraint of the model is checked before anything is returned:
/// on error no statement is produced at all.
pub fn compile(
    tree: &OptionsBlock,
    model: &BlockModel,
    context: &CodecContext,
) -> Result<Vec<Statement>, DevConfError> {
    let mut ret = Vec::new();
    compile_block(tree, model, context, &Statement::default(), None, &mut ret)?;
    Ok(ret)
}

/// Compile the tree of one feature object into `set` statements with
/// absolute paths. An object without any option still gets its bare path
/// so that it exists on device.
pub fn compile_batch(
    feature: &FeatureModel,
    tree: &OptionsBlock,
    context: &CodecContext,
) -> Result<StatementBatch, DevConfError> {
    let object_path = feature.object_path(feature.identity_of(tree));
    let statements = compile_object(feature, tree, context)?;

    let mut ret = StatementBatch::new();
    if statements.is_empty() {
        ret.push_set(object_path);
    } else {
        for statement in statements {
            ret.push_set(object_path.join(&statement));
        }
    }
    Ok(ret)
}

/// Statements of one feature object relative to its object path. The
/// identity field is part of the path, hence not compiled.
pub(crate) fn compile_object(
    feature: &FeatureModel,
    tree: &OptionsBlock,
    context: &CodecContext,
) -> Result<Vec<Statement>, DevConfError> {
    let identity = feature.identity_of(tree);
    if feature.identity.is_some() && identity.is_empty() {
        let e = DevConfError::new(
            ErrorKind::InvalidArgument,
            format!(
                "Identity field {} of {} is not set",
                feature.identity.as_deref().unwrap_or_default(),
                feature.name
            ),
        );
        log::error!("{}", e);
        return Err(e);
    }
    let mut ret = Vec::new();
    compile_block(
        tree,
        &feature.fields,
        context,
        &Statement::default(),
        feature.identity.as_deref(),
        &mut ret,
    )?;
    Ok(ret)
}

fn compile_block(
    block: &OptionsBlock,
    model: &BlockModel,
    context: &CodecContext,
    prefix: &Statement,
    identity: Option<&str>,
    output: &mut Vec<Statement>,
) -> Result<(), DevConfError> {
    check_block(block, model, context, prefix, identity)?;

    for field in model.fields.as_slice() {
        if Some(field.name.as_str()) == identity {
            continue;
        }
        let value = match block.get(&field.name) {
            Some(v) if !field.is_default(v) => v,
            _ => continue,
        };
        let path = prefix.join(&Statement::new(field.keyword.clone()));
        match (&field.kind, value) {
            (FieldKind::Scalar(t), OptionsValue::Scalar(v)) => {
                check_scalar_type(field, *t, v, prefix)?;
                output.push(scalar_statement(&path, v));
            }
            (FieldKind::List(t), OptionsValue::List(items)) => {
                for item in items {
                    check_scalar_type(field, *t, item, prefix)?;
                    output.push(scalar_statement(&path, item));
                }
            }
            (FieldKind::Set(t), OptionsValue::Set(items)) => {
                let mut rendered: Vec<String> = Vec::new();
                for item in items {
                    check_scalar_type(field, *t, item, prefix)?;
                    rendered.push(item.to_string());
                }
                rendered.sort_unstable();
                rendered.dedup();
                for item in rendered {
                    let mut statement = path.clone();
                    statement.push(&item);
                    output.push(statement);
                }
            }
            (FieldKind::Block(sub_model), OptionsValue::Block(sub_block)) => {
                let old_len = output.len();
                compile_block(
                    sub_block, sub_model, context, &path, None, output,
                )?;
                if output.len() == old_len && field.marker {
                    output.push(path);
                }
            }
            (
                FieldKind::Blocks {
                    identity: id_field,
                    fields,
                },
                OptionsValue::Blocks(sub_blocks),
            ) => {
                let mut seen: HashSet<String> = HashSet::new();
                for sub_block in sub_blocks {
                    let id = match sub_block.get_scalar(id_field) {
                        Some(v) if !v.to_string().is_empty() => v.to_string(),
                        _ => {
                            return Err(validation_error(
                                ErrorKind::InvalidArgument,
                                format!(
                                    "Block {} has an entry without its \
                                    identity field {id_field}",
                                    field.name
                                ),
                                prefix,
                            ));
                        }
                    };
                    if !seen.insert(id.clone()) {
                        return Err(validation_error(
                            ErrorKind::DuplicateIdentity,
                            format!(
                                "multiple blocks with the same name {id} \
                                in {}",
                                field.name
                            ),
                            prefix,
                        ));
                    }
                    let mut sub_path = path.clone();
                    sub_path.push(&id);
                    let old_len = output.len();
                    compile_block(
                        sub_block,
                        fields,
                        context,
                        &sub_path,
                        Some(id_field.as_str()),
                        output,
                    )?;
                    if output.len() == old_len {
                        output.push(sub_path);
                    }
                }
            }
            (_, v) => {
                return Err(validation_error(
                    ErrorKind::InvalidArgument,
                    format!(
                        "Field {} does not accept a {} value",
                        field.name,
                        v.kind_name()
                    ),
                    prefix,
                ));
            }
        }
    }
    Ok(())
}

fn scalar_statement(path: &Statement, value: &ScalarValue) -> Statement {
    let mut ret = path.clone();
    if !matches!(value, ScalarValue::Bool(_)) {
        ret.push(&value.to_string());
    }
    ret
}

// Constraints between sibling fields, checked before descending.
fn check_block(
    block: &OptionsBlock,
    model: &BlockModel,
    context: &CodecContext,
    prefix: &Statement,
    identity: Option<&str>,
) -> Result<(), DevConfError> {
    for (name, _) in block.iter() {
        if model.field(name).is_none() {
            return Err(validation_error(
                ErrorKind::InvalidArgument,
                format!(
                    "Unknown field {name}, supported fields are: {}",
                    model.field_names().join(", ")
                ),
                prefix,
            ));
        }
    }

    let mut groups: HashMap<&str, &str> = HashMap::new();
    for field in model.fields.as_slice() {
        if !is_field_set(block, field) {
            if field.required && Some(field.name.as_str()) != identity {
                return Err(validation_error(
                    ErrorKind::InvalidArgument,
                    format!("Required field {} is not set", field.name),
                    prefix,
                ));
            }
            continue;
        }
        if let Some(guard) = field.variant.as_ref() {
            let cur = discriminant_value(
                block,
                model,
                context,
                &guard.discriminant,
            );
            if !cur
                .as_deref()
                .map(|c| guard.values.iter().any(|v| v == c))
                .unwrap_or_default()
            {
                return Err(validation_error(
                    ErrorKind::IncompatibleVariant,
                    format!(
                        "Field {} is only compatible with {} {}, but \
                        current {} is {}",
                        field.name,
                        guard.discriminant,
                        guard.values.join(" or "),
                        guard.discriminant,
                        cur.as_deref().unwrap_or("unset"),
                    ),
                    prefix,
                ));
            }
        }
        if let Some(group) = field.exclusive_group.as_deref() {
            if let Some(other) = groups.insert(group, field.name.as_str()) {
                return Err(validation_error(
                    ErrorKind::ExclusivityViolation,
                    format!(
                        "Fields {other} and {} cannot be configured at the \
                        same time",
                        field.name
                    ),
                    prefix,
                ));
            }
        }
        for dep in field.requires.as_slice() {
            let dep_set = model
                .field(dep)
                .map(|f| is_field_set(block, f))
                .unwrap_or_default();
            if !dep_set {
                return Err(validation_error(
                    ErrorKind::DependencyError,
                    format!(
                        "Field {} requires field {dep} to be set",
                        field.name
                    ),
                    prefix,
                ));
            }
        }
    }
    Ok(())
}

fn check_scalar_type(
    field: &FieldModel,
    scalar_type: ScalarType,
    value: &ScalarValue,
    prefix: &Statement,
) -> Result<(), DevConfError> {
    if value.matches_type(scalar_type) {
        Ok(())
    } else {
        Err(validation_error(
            ErrorKind::InvalidArgument,
            format!(
                "Field {} expects {scalar_type} value, but got {value:?}",
                field.name
            ),
            prefix,
        ))
    }
}

pub(crate) fn is_field_set(block: &OptionsBlock, field: &FieldModel) -> bool {
    block
        .get(&field.name)
        .map(|v| !field.is_default(v))
        .unwrap_or_default()
}

// A sibling scalar field takes precedence over the context.
pub(crate) fn discriminant_value(
    block: &OptionsBlock,
    model: &BlockModel,
    context: &CodecContext,
    name: &str,
) -> Option<String> {
    if let Some(field) = model.field(name) {
        if is_field_set(block, field) {
            if let Some(v) = block.get_scalar(name) {
                return Some(v.to_string());
            }
        }
    }
    context.discriminant(name).map(String::from)
}

fn validation_error(
    kind: ErrorKind,
    msg: String,
    prefix: &Statement,
) -> DevConfError {
    let e = if prefix.is_empty() {
        DevConfError::new(kind, msg)
    } else {
        DevConfError::new_statement_error(kind, msg, &prefix.to_string())
    };
    log::error!("{}", e);
    e
}
