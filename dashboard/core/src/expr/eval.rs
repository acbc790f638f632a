use super::{
    parser::{Method, Node, Program, Var},
    Env, EvalError,
};
use glance_k8s_api::Annotations;
use std::borrow::Cow;

enum Value<'a> {
    Bool(bool),
    Str(Cow<'a, str>),
    List(Vec<Cow<'a, str>>),
    Map(&'a Annotations),
}

pub(super) fn evaluate(program: &Program, env: &Env<'_>) -> Result<bool, EvalError> {
    as_bool(eval(&program.root, env)?)
}

fn eval<'a>(node: &'a Node, env: &Env<'a>) -> Result<Value<'a>, EvalError> {
    let value = match node {
        Node::Bool(b) => Value::Bool(*b),
        Node::Str(s) => Value::Str(Cow::Borrowed(s.as_str())),
        Node::List(items) => Value::List(
            items
                .iter()
                .map(|item| as_str(eval(item, env)?))
                .collect::<Result<_, _>>()?,
        ),
        Node::Var(Var::Name) => Value::Str(Cow::Borrowed(env.name)),
        Node::Var(Var::Namespace) => Value::Str(Cow::Borrowed(env.namespace)),
        Node::Var(Var::Annotations) => Value::Map(env.annotations),

        Node::Index { map, key } => {
            let map = as_map(eval(map, env)?)?;
            let key = as_str(eval(key, env)?)?;
            match map.get(key.as_ref()) {
                Some(v) => Value::Str(Cow::Borrowed(v.as_str())),
                None => return Err(EvalError::NoSuchKey(key.into_owned())),
            }
        }

        Node::In { needle, haystack } => {
            let needle = as_str(eval(needle, env)?)?;
            match eval(haystack, env)? {
                Value::Map(map) => Value::Bool(map.contains_key(needle.as_ref())),
                Value::List(items) => Value::Bool(items.iter().any(|i| *i == needle)),
                _ => return Err(EvalError::Mismatch { expected: "map or list" }),
            }
        }

        Node::Eq { lhs, rhs } => Value::Bool(equals(eval(lhs, env)?, eval(rhs, env)?)?),
        Node::Ne { lhs, rhs } => Value::Bool(!equals(eval(lhs, env)?, eval(rhs, env)?)?),

        Node::And(lhs, rhs) => {
            Value::Bool(as_bool(eval(lhs, env)?)? && as_bool(eval(rhs, env)?)?)
        }
        Node::Or(lhs, rhs) => {
            Value::Bool(as_bool(eval(lhs, env)?)? || as_bool(eval(rhs, env)?)?)
        }
        Node::Not(inner) => Value::Bool(!as_bool(eval(inner, env)?)?),

        Node::Method { target, method } => {
            let target = as_str(eval(target, env)?)?;
            let result = match method {
                Method::StartsWith(arg) => target.starts_with(as_str(eval(arg, env)?)?.as_ref()),
                Method::EndsWith(arg) => target.ends_with(as_str(eval(arg, env)?)?.as_ref()),
                Method::Contains(arg) => target.contains(as_str(eval(arg, env)?)?.as_ref()),
                Method::Matches(re) => re.is_match(&target),
            };
            Value::Bool(result)
        }
    };

    Ok(value)
}

fn equals(lhs: Value<'_>, rhs: Value<'_>) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        _ => Err(EvalError::Mismatch {
            expected: "bool or string",
        }),
    }
}

fn as_bool(value: Value<'_>) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        _ => Err(EvalError::Mismatch { expected: "bool" }),
    }
}

fn as_str(value: Value<'_>) -> Result<Cow<'_, str>, EvalError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(EvalError::Mismatch { expected: "string" }),
    }
}

fn as_map(value: Value<'_>) -> Result<&Annotations, EvalError> {
    match value {
        Value::Map(map) => Ok(map),
        _ => Err(EvalError::Mismatch { expected: "map" }),
    }
}
