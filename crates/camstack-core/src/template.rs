//! printf-style command-line templates with positional arguments.
//!
//! Supported conversions: `%s` (any value), `%u` (non-negative integers),
//! `%d` / `%i` (integers), `%f` (six decimals), `%%` (a literal percent
//! sign).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One positional argument for a command template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CliArg {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CliArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliArg::Int(v) => write!(f, "{v}"),
            CliArg::Float(v) => write!(f, "{v}"),
            CliArg::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for CliArg {
    fn from(v: &str) -> Self {
        CliArg::Text(v.to_string())
    }
}

impl From<String> for CliArg {
    fn from(v: String) -> Self {
        CliArg::Text(v)
    }
}

impl From<i64> for CliArg {
    fn from(v: i64) -> Self {
        CliArg::Int(v)
    }
}

impl From<u32> for CliArg {
    fn from(v: u32) -> Self {
        CliArg::Int(i64::from(v))
    }
}

impl From<f64> for CliArg {
    fn from(v: f64) -> Self {
        CliArg::Float(v)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("template {template:?} needs more than {given} arguments")]
    MissingArgument { template: String, given: usize },

    #[error("template {template:?} leaves {unused} argument(s) unused")]
    UnusedArguments { template: String, unused: usize },

    #[error("template {template:?}: %{conversion} cannot format {arg}")]
    TypeMismatch {
        template: String,
        conversion: char,
        arg: String,
    },

    #[error("template {template:?}: unsupported conversion {found:?}")]
    UnknownConversion { template: String, found: String },
}

/// Substitute `args` into `template`, in order.
pub fn render(template: &str, args: &[CliArg]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut remaining = args.iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let conversion = match chars.next() {
            Some('%') => {
                out.push('%');
                continue;
            }
            Some(conv) => conv,
            None => {
                return Err(TemplateError::UnknownConversion {
                    template: template.to_string(),
                    found: "%".to_string(),
                });
            }
        };
        let arg = remaining
            .next()
            .ok_or_else(|| TemplateError::MissingArgument {
                template: template.to_string(),
                given: args.len(),
            })?;
        let mismatch = || TemplateError::TypeMismatch {
            template: template.to_string(),
            conversion,
            arg: arg.to_string(),
        };
        match (conversion, arg) {
            ('s', a) => out.push_str(&a.to_string()),
            ('u', CliArg::Int(v)) if *v < 0 => return Err(mismatch()),
            ('u' | 'd' | 'i', CliArg::Int(v)) => out.push_str(&v.to_string()),
            ('u' | 'd' | 'i', _) => return Err(mismatch()),
            ('f', CliArg::Float(v)) => out.push_str(&format!("{v:.6}")),
            ('f', CliArg::Int(v)) => out.push_str(&format!("{:.6}", *v as f64)),
            ('f', _) => return Err(mismatch()),
            (other, _) => {
                return Err(TemplateError::UnknownConversion {
                    template: template.to_string(),
                    found: format!("%{other}"),
                });
            }
        }
    }
    let unused = remaining.count();
    if unused > 0 {
        return Err(TemplateError::UnusedArguments {
            template: template.to_string(),
            unused,
        });
    }
    Ok(out)
}
