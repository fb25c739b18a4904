//! Typed payload for algorithm traces.
//!
//! [`Frame`] is the payload most seeded traces use: an array snapshot with
//! element states, named pointers into it, the variables in scope, and the
//! highlighted source line. Anything visualization-specific (a BFS queue, a
//! zigzag grid, a graph) goes in [`Frame::extra`] untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::step::StepSequence;

/// Payload of a step in an array/pointer style trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array: Vec<ArrayElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pointers: Vec<Pointer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<CodeHighlight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Visualization-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Frame {
    pub fn with_array(mut self, array: Vec<ArrayElement>) -> Self {
        self.array = array;
        self
    }

    pub fn with_pointer(mut self, pointer: Pointer) -> Self {
        self.pointers.push(pointer);
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_highlight(mut self, line: u32) -> Self {
        self.highlight = Some(CodeHighlight::line(line));
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| &v.value)
    }
}

/// Visual state of an array cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    #[default]
    Default,
    Active,
    Comparing,
    Sorted,
    Target,
    Swapping,
    Pivot,
    Found,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayElement {
    pub value: Value,
    pub index: usize,
    #[serde(default)]
    pub state: ElementState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ArrayElement {
    pub fn new(value: impl Into<Value>, index: usize) -> Self {
        Self {
            value: value.into(),
            index,
            state: ElementState::Default,
            label: None,
        }
    }

    pub fn with_state(mut self, state: ElementState) -> Self {
        self.state = state;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Build an array snapshot with every cell in the default state.
pub fn array_of<I, V>(values: I) -> Vec<ArrayElement>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| ArrayElement::new(value, index))
        .collect()
}

pub const DEFAULT_POINTER_COLOR: &str = "primary";

/// A named index into the array, e.g. `left`, `right`, `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub name: String,
    pub index: usize,
    #[serde(default = "default_pointer_color")]
    pub color: String,
}

fn default_pointer_color() -> String {
    DEFAULT_POINTER_COLOR.to_string()
}

impl Pointer {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            color: default_pointer_color(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    #[serde(rename = "type", default = "default_variable_type")]
    pub kind: String,
}

fn default_variable_type() -> String {
    "auto".to_string()
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: default_variable_type(),
        }
    }
}

/// Source line (1-based) to highlight, optionally narrowed to a column span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeHighlight {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_col: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_col: Option<u32>,
}

impl CodeHighlight {
    pub fn line(line: u32) -> Self {
        Self {
            line,
            start_col: None,
            end_col: None,
        }
    }
}

/// Descriptive data attached to a loaded trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetadata {
    pub problem_id: String,
    pub title: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    pub total_steps: usize,
}

impl TraceMetadata {
    pub fn new(
        problem_id: impl Into<String>,
        title: impl Into<String>,
        algorithm: impl Into<String>,
        total_steps: usize,
    ) -> Self {
        Self {
            problem_id: problem_id.into(),
            title: title.into(),
            algorithm: algorithm.into(),
            complexity: None,
            total_steps,
        }
    }

    /// Metadata whose step count is taken from `sequence`.
    pub fn for_sequence<P>(
        problem_id: impl Into<String>,
        title: impl Into<String>,
        algorithm: impl Into<String>,
        sequence: &StepSequence<P>,
    ) -> Self {
        Self::new(problem_id, title, algorithm, sequence.length())
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }
}
