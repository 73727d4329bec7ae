//! Console utility atoms

use crate::atom::{Atom, AtomType, FieldSpec, SchemaLayer, TaskContext, ValueType};
use crate::core::error::AtomError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

/// Parameters shared by every print atom
pub fn print_layer() -> SchemaLayer {
    SchemaLayer::new("PrintField")
        .field(FieldSpec::with_default(
            "pre_message",
            ValueType::String,
            json!("Print Field Task Start"),
        ))
        .field(FieldSpec::with_default(
            "post_message",
            ValueType::String,
            json!("Print Field Task End"),
        ))
}

pub fn print_field() -> AtomType {
    AtomType::builder("PrintFieldTask")
        .describe("Print a summary of the contents of a field. Accepts any type.")
        .extends(print_layer())
        .input("to_print", ValueType::Any)
        .build(|params| Ok(Box::new(PrintField::from_params(params)?)))
}

pub fn print_string() -> AtomType {
    AtomType::builder("PrintStringTask")
        .describe("Print a summary of the contents of a string field")
        .extends(print_layer())
        .input("to_print", ValueType::String)
        .build(|params| Ok(Box::new(PrintField::from_params(params)?)))
}

struct PrintField {
    pre_message: String,
    post_message: String,
}

impl PrintField {
    fn from_params(params: &crate::atom::Params) -> anyhow::Result<Self> {
        Ok(Self {
            pre_message: params.str("pre_message")?.to_string(),
            post_message: params.str("post_message")?.to_string(),
        })
    }
}

fn summarize(values: &[Value]) -> String {
    const SHOWN: usize = 10;
    let mut lines: Vec<String> = values
        .iter()
        .take(SHOWN)
        .enumerate()
        .map(|(i, v)| format!("{i:>4}  {v}"))
        .collect();
    if values.len() > SHOWN {
        lines.push(format!("      ... {} more", values.len() - SHOWN));
    }
    lines.push(format!("({} rows)", values.len()));
    lines.join("\n")
}

#[async_trait]
impl Atom for PrintField {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let values = task.input("to_print")?;
        info!("{}", "=".repeat(self.pre_message.len()));
        info!("{}", self.pre_message);
        info!("{}:\n{}", task.task_name, summarize(values));
        info!("{}", self.post_message);
        Ok(())
    }
}
