//! Renders a single node into the text of its terragrunt configuration file.
use std::collections::BTreeMap;
use std::fmt;

use hcl::format::{Format, Formatter};
use hcl::Expression;

/// Where remote modules are fetched from. The module name is appended.
pub const DEFAULT_MODULE_SOURCE_BASE: &str =
    "git::git@sgts.gitlab-dedicated.com:wog/mha/ica-e-services/ica_common_services/app/aws_tg.git//tg-modules//";

/// Separates the repository part of a module source from the module name.
pub const MODULE_SOURCE_MARKER: &str = "tg-modules//";

/// The bootstrap configuration placed at the root of every generated tree.
pub const ROOT_TERRAGRUNT_HCL: &str = include_str!("templates/root.hcl");

/// Serializes a parsed expression back to HCL on a single line, the form
/// values of locals and inputs are kept in.
pub(crate) fn format_expression(expr: &Expression) -> Result<String, hcl::Error> {
    let mut formatter = Formatter::builder().compact(true).build_vec();
    expr.format_string(&mut formatter)
}

/// The contents of one generated configuration file.
///
/// Values of `locals` and `inputs` are HCL expressions and are emitted
/// verbatim, the renderer doesn't quote or escape them.
#[derive(Debug)]
pub struct HclFile<'a> {
    pub file_name: &'a str,
    /// The full `terraform.source` string, if the node is a remote module.
    pub module_source: Option<String>,
    pub locals: &'a BTreeMap<String, String>,
    pub inputs: &'a BTreeMap<String, String>,
    /// Dependency name to the relative path of the target directory.
    pub dependencies: &'a BTreeMap<String, String>,
}

impl fmt::Display for HclFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "# {}\n\n", self.file_name)?;

        if let Some(source) = &self.module_source {
            write!(
                f,
                "\nterraform {{\n    source = \"{}\"\n}}\n\ninclude \"root\" {{\n    path = find_in_parent_folders()\n}}\n",
                source
            )?;
        }

        // locals is always rendered, inputs only when there are any.
        f.write_str("\nlocals {\n")?;
        for (key, value) in self.locals {
            writeln!(f, "  {} = {}", key, value)?;
        }
        f.write_str("\n}\n")?;

        if !self.inputs.is_empty() {
            f.write_str("\ninputs = {\n")?;
            for (key, value) in self.inputs {
                writeln!(f, "  {} = {}", key, value)?;
            }
            f.write_str("\n}\n")?;
        }

        for (name, config_path) in self.dependencies {
            write!(
                f,
                "\ndependency \"{}\" {{\n  config_path = \"{}\"\n}}\n",
                name, config_path
            )?;
        }

        Ok(())
    }
}
