use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {type_name} variant: {value}")]
pub struct ParseEnumError {
    type_name: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn unknown(type_name: &'static str, value: &str) -> Self {
        Self {
            type_name,
            value: value.to_string(),
        }
    }
}
