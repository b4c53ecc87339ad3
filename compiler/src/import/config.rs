//! Reading back the declarations of a terragrunt configuration file.
use std::collections::BTreeMap;

use hcl::{Block, Body, Expression, ObjectKey};

use crate::codegen::{format_expression, MODULE_SOURCE_MARKER};

/// The parts of a configuration file the importer cares about. Values are
/// re-serialized HCL expressions.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ParsedConfig {
    /// `terraform.source`, if it's a plain string literal.
    pub terraform_source: Option<String>,
    pub locals: BTreeMap<String, String>,
    pub inputs: BTreeMap<String, String>,
    /// `(name, config_path)` of every `dependency` block, in file order.
    pub dependencies: Vec<(String, String)>,
}

pub(crate) fn parse_config(text: &str) -> Result<ParsedConfig, String> {
    let body: Body = hcl::parse(text).map_err(|e| e.to_string())?;
    let mut parsed = ParsedConfig::default();

    for attr in body.attributes() {
        if attr.key() == "inputs" {
            match attr.expr() {
                Expression::Object(object) => {
                    for (key, value) in object.iter() {
                        parsed.inputs.insert(object_key(key)?, format_expr(value)?);
                    }
                }
                other => return Err(format!("inputs must be an object, got {}", format_expr(other)?)),
            }
        }
    }

    for block in body.blocks() {
        match block.identifier() {
            "locals" => {
                for attr in block.body().attributes() {
                    parsed
                        .locals
                        .insert(attr.key().to_owned(), format_expr(attr.expr())?);
                }
            }
            "terraform" if parsed.terraform_source.is_none() => {
                parsed.terraform_source = string_attribute(block, "source");
            }
            "dependency" => {
                let name = block
                    .labels()
                    .first()
                    .map(|l| l.as_str().to_owned())
                    .ok_or_else(|| "dependency block without a name".to_owned())?;
                // terragrunt only uses the first block of a name.
                if parsed.dependencies.iter().any(|(n, _)| n == &name) {
                    continue;
                }
                let config_path = config_path(block)
                    .ok_or_else(|| format!("dependency {:?} has no config_path", name))?;
                parsed.dependencies.push((name, config_path));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn string_attribute(block: &Block, key: &str) -> Option<String> {
    block
        .body()
        .attributes()
        .find(|attr| attr.key() == key)
        .and_then(|attr| match attr.expr() {
            Expression::String(s) => Some(s.clone()),
            _ => None,
        })
}

/// The `config_path` of a dependency block. Anything but a string literal
/// is kept as the raw template or expression text, which rarely matches a
/// scanned directory later on.
fn config_path(block: &Block) -> Option<String> {
    let attr = block
        .body()
        .attributes()
        .find(|attr| attr.key() == "config_path")?;
    Some(match attr.expr() {
        Expression::String(s) => s.clone(),
        Expression::TemplateExpr(template) => template.to_string(),
        other => format_expression(other).unwrap_or_else(|_| format!("{:?}", other)),
    })
}

fn object_key(key: &ObjectKey) -> Result<String, String> {
    match key {
        ObjectKey::Identifier(ident) => Ok(ident.as_str().to_owned()),
        ObjectKey::Expression(Expression::String(s)) => Ok(s.clone()),
        ObjectKey::Expression(expr) => format_expr(expr),
        other => Err(format!("unsupported object key {:?}", other)),
    }
}

fn format_expr(expr: &Expression) -> Result<String, String> {
    format_expression(expr).map_err(|e| e.to_string())
}

/// Extracts the module name from a `terraform.source` string: everything
/// after the module marker, with doubled slashes collapsed.
pub fn module_name_from_source(source: &str) -> Option<String> {
    let start = source.find(MODULE_SOURCE_MARKER)? + MODULE_SOURCE_MARKER.len();
    let name = source[start..].replace("//", "/");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::DEFAULT_MODULE_SOURCE_BASE;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::simple(&format!("{}network/vpc", DEFAULT_MODULE_SOURCE_BASE), Some("network/vpc"))]
    #[case::doubled("git::x.git//tg-modules//compute//ecs", Some("compute/ecs"))]
    #[case::no_marker("git::x.git//modules//vpc", None)]
    #[case::empty_name("git::x.git//tg-modules//", None)]
    fn module_names(#[case] source: &str, #[case] expected: Option<&str>) {
        assert_eq!(expected.map(str::to_owned), module_name_from_source(source));
    }

    #[test]
    fn parse_module_config() {
        let parsed = parse_config(
            r#"
# terragrunt.hcl

terraform {
    source = "git::x.git//tg-modules//network/vpc"
}

include "root" {
    path = find_in_parent_folders()
}

locals {
  name = "vpc"
}

locals {
  count = 2
}

inputs = {
  cidr = "10.0.0.0/16"
  "quoted-key" = true
}

dependency "tier" {
  config_path = "../.."
}

dependency "tier" {
  config_path = "../../shadowed"
}

dependency "templated" {
  config_path = "${get_terragrunt_dir()}/../nowhere"
}
"#,
        )
        .expect("must parse");

        assert_eq!(
            Some("git::x.git//tg-modules//network/vpc"),
            parsed.terraform_source.as_deref()
        );
        assert_eq!("\"vpc\"", parsed.locals["name"]);
        assert_eq!("2", parsed.locals["count"]);
        assert_eq!("\"10.0.0.0/16\"", parsed.inputs["cidr"]);
        assert_eq!("true", parsed.inputs["quoted-key"]);
        assert_eq!(
            vec![
                ("tier".to_string(), "../..".to_string()),
                (
                    "templated".to_string(),
                    "${get_terragrunt_dir()}/../nowhere".to_string()
                ),
            ],
            parsed.dependencies
        );
    }

    #[rstest]
    #[case::no_config_path("dependency \"db\" {\n  mock_outputs = {}\n}\n")]
    #[case::no_name("dependency {\n  config_path = \"../db\"\n}\n")]
    fn incomplete_dependency_blocks(#[case] text: &str) {
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn invalid_hcl() {
        assert!(parse_config("locals {").is_err());
        assert!(parse_config("inputs = 3").is_err());
    }
}
