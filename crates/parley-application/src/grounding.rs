//! Grounding instruction for dataset-backed turns.

use minijinja::{Environment, context};
use parley_core::{LoadedDataset, ParleyError, Result};

/// Column list placeholder for a dataset without records.
pub const EMPTY_FILE_MARKER: &str = "empty file";

/// Sampling temperature for dataset turns (deterministic).
pub const GROUNDED_TEMPERATURE: f32 = 0.0;

const GROUNDING_TEMPLATE: &str = r#"You are a CSV data analysis expert. Answer questions using ONLY the CSV data provided below.

**RULES (all of them are mandatory):**
1. **COLUMN LOCK:** When the user names a specific column (for example 'First Name' or 'City'), search, filter or compute ONLY on that exact column and ignore every other column. "find people in 'First Name' with 'z'" means looking ONLY at the 'First Name' column. This rule overrides everything else.
2. **NO FABRICATION:** Every answer must come from the CSV data below. Never invent values. If the data cannot answer the question, say so.
3. **BE LITERAL:** Do exactly what the user asks. Do not guess at what they meant.
4. **CASE-INSENSITIVE MATCHING:** Text comparisons ignore case ('z' matches 'Z') unless the user explicitly asks for a case-sensitive search.
5. **USE TABLES:** Present results as markdown tables whenever that is the clearest format.

**Provided CSV Data:**
- **Available Columns:** {{ columns }}
- **Data:**
```csv
{{ data }}
```
"#;

/// Renders the system instruction that pins the model to `dataset`.
///
/// Embeds the column names of the first record (or [`EMPTY_FILE_MARKER`])
/// and the raw text verbatim.
pub fn build_grounding_instruction(dataset: &LoadedDataset) -> Result<String> {
    let columns = dataset.columns();
    let columns = if columns.is_empty() {
        EMPTY_FILE_MARKER.to_string()
    } else {
        columns.join(", ")
    };

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.render_str(
        GROUNDING_TEMPLATE,
        context! {
            columns => columns,
            data => dataset.raw_text.as_str(),
        },
    )
    .map_err(|e| ParleyError::internal(format!("Failed to render grounding instruction: {e}")))
}
