//! Keyword view of call arguments.

use serde::Serialize;
use serde_json::Value;

use crate::param::Kwargs;

/// Binds the call's arguments to names.
///
/// - struct-like arguments (serializing to an object) keep their field names;
/// - tuple-like arguments are zipped with `names`, extra positions dropped;
/// - a single scalar is bound to the first name;
/// - unit yields an empty map.
pub(crate) fn args_to_kwargs<A: Serialize>(
    args: &A,
    names: &[String],
) -> Result<Kwargs, serde_json::Error> {
    let kwargs = match serde_json::to_value(args)? {
        Value::Object(fields) => fields,
        Value::Array(values) => names.iter().cloned().zip(values).collect(),
        Value::Null => Kwargs::new(),
        scalar => names
            .first()
            .map(|name| (name.clone(), scalar))
            .into_iter()
            .collect(),
    };
    Ok(kwargs)
}
