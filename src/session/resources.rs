//! Resource limit overrides in `name=quantity[,name=quantity]` form

use std::collections::BTreeMap;
use std::sync::OnceLock;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ResourceSpecError {
    #[error("invalid argument syntax {0}, expected <resource>=<value>")]
    InvalidSyntax(String),

    #[error("invalid quantity {value:?} for resource {resource}")]
    InvalidQuantity { resource: String, value: String },
}

fn quantity_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+|[KMGTPE]i|[numkMGTPE])?$")
            .expect("quantity pattern is valid")
    })
}

/// Parse a resource list such as `cpu=200m,memory=512Mi`
pub fn parse_resource_list(spec: &str) -> Result<BTreeMap<String, Quantity>, ResourceSpecError> {
    let mut resources = BTreeMap::new();
    for entry in spec.split(',') {
        let entry = entry.trim();
        let (name, value) = entry
            .split_once('=')
            .filter(|(name, value)| !name.trim().is_empty() && !value.trim().is_empty())
            .ok_or_else(|| ResourceSpecError::InvalidSyntax(entry.to_string()))?;

        let (name, value) = (name.trim(), value.trim());
        if !quantity_pattern().is_match(value) {
            return Err(ResourceSpecError::InvalidQuantity {
                resource: name.to_string(),
                value: value.to_string(),
            });
        }
        resources.insert(name.to_string(), Quantity(value.to_string()));
    }
    Ok(resources)
}
