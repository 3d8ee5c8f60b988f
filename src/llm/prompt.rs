//! Prompt construction for generator requests.
//!
//! Both prompts restate the validator's rules so the generator is instructed,
//! not trusted, to produce an admissible query.

/// Prompt template for the initial generation.
const GENERATION_TEMPLATE: &str = r#"You are a SQL expert. Convert the following natural language question into a single SQL query.

DATABASE SCHEMA:
{schema}

QUESTION: "{question}"

RULES:
1. Only generate a single SELECT query (a WITH ... SELECT is allowed)
2. Never use INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, TRUNCATE, EXEC, PRAGMA, ATTACH or DETACH
3. Do not include comments (-- or /* */) or more than one statement
4. Use only the tables and columns listed in the schema
5. Include appropriate JOINs if needed and use meaningful column aliases
6. Handle NULL values appropriately

OUTPUT FORMAT:
Respond with ONLY a YAML block containing the query:

```yaml
sql: |
  SELECT ...
```"#;

/// Prompt template for correcting a failed query.
const DEBUG_TEMPLATE: &str = r#"You are a SQL debugging expert. The following query failed with an error.

ORIGINAL QUESTION: "{question}"

DATABASE SCHEMA:
{schema}

FAILED SQL QUERY:
```sql
{failed_sql}
```

ERROR MESSAGE: "{error}"

Analyze the error and provide a corrected query.

RULES:
1. Only generate a single SELECT query (a WITH ... SELECT is allowed)
2. Never use INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, TRUNCATE, EXEC, PRAGMA, ATTACH or DETACH
3. Do not include comments (-- or /* */) or more than one statement
4. Fix the specific error mentioned above
5. Preserve the intent of the original question

OUTPUT FORMAT:
Respond with ONLY a YAML block containing the corrected query:

```yaml
sql: |
  SELECT ...
```"#;

/// Builds the prompt for turning a question into SQL.
pub fn generation_prompt(question: &str, schema: &str) -> String {
    fill_template(
        GENERATION_TEMPLATE,
        &[("schema", schema.trim()), ("question", question.trim())],
    )
}

/// Builds the prompt for repairing `failed_sql` given the backend error.
pub fn debug_prompt(question: &str, schema: &str, failed_sql: &str, error: &str) -> String {
    fill_template(
        DEBUG_TEMPLATE,
        &[
            ("question", question.trim()),
            ("schema", schema.trim()),
            ("failed_sql", failed_sql.trim()),
            ("error", error.trim()),
        ],
    )
}

/// Substitutes `{name}` placeholders in one pass over the template.
///
/// Inserted values are copied as-is and never scanned for placeholders.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let filled = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match filled {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "Table: customers\n  - id (INTEGER, NOT NULL)\n  - city (TEXT, NULL)";

    #[test]
    fn test_generation_prompt_embeds_context() {
        let prompt = generation_prompt("How many customers per city?", SCHEMA);

        assert!(prompt.contains("Table: customers"));
        assert!(prompt.contains("QUESTION: \"How many customers per city?\""));
        assert!(!prompt.contains("{schema}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_generation_prompt_states_contract() {
        let prompt = generation_prompt("q", SCHEMA);

        assert!(prompt.contains("```yaml\nsql: |"));
        assert!(prompt.contains("Only generate a single SELECT query"));
        assert!(prompt.contains("PRAGMA"));
    }

    #[test]
    fn test_debug_prompt_embeds_failure() {
        let prompt = debug_prompt(
            "List customers",
            SCHEMA,
            "SELECT nme FROM customers",
            "no such column: nme",
        );

        assert!(prompt.contains("```sql\nSELECT nme FROM customers\n```"));
        assert!(prompt.contains("ERROR MESSAGE: \"no such column: nme\""));
        assert!(prompt.contains("ORIGINAL QUESTION: \"List customers\""));
        assert!(prompt.contains("Table: customers"));
        assert!(prompt.contains("Fix the specific error"));
    }

    #[test]
    fn test_debug_prompt_keeps_braces_in_inserted_text() {
        let prompt = debug_prompt(
            "my question",
            "Table: t",
            "SELECT '{error}' FROM t",
            "bad {question}",
        );

        assert!(prompt.contains("```sql\nSELECT '{error}' FROM t\n```"));
        assert!(prompt.contains("ERROR MESSAGE: \"bad {question}\""));
        assert!(prompt.contains("ORIGINAL QUESTION: \"my question\""));
    }

    #[test]
    fn test_generation_prompt_keeps_braces_in_schema() {
        let prompt = generation_prompt("count {schema}", "Table: {question}");
        assert!(prompt.contains("QUESTION: \"count {schema}\""));
        assert!(prompt.contains("DATABASE SCHEMA:\nTable: {question}\n"));
    }

    #[test]
    fn test_fill_template_leaves_unknown_braces() {
        assert_eq!(
            fill_template("{a} {b} {", &[("a", "x")]),
            "x {b} {"
        );
    }
}
