//! Field specifications compiled to GBNF generation grammars.
//!
//! A [`FieldSpec`] is a small composable schema: bounded free text,
//! an enumerated choice, a fixed-length tuple of sub-specs, or a
//! template with a single generated span. [`compile`] turns a spec
//! into grammar text the backend enforces during sampling, so the
//! output is guaranteed to parse into the requested shape.

/// Compiled grammar text, ready to attach to a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar(String);

impl Grammar {
    /// Wrap raw grammar text. Prefer [`compile`] for structured specs.
    pub fn raw(text: impl Into<String>) -> Self {
        Grammar(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A composable output schema for constrained generation.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    /// Free text between `min` and `max` characters, single line.
    Text { min: usize, max: usize },

    /// Exactly one of the given alternatives, verbatim.
    Choice(Vec<String>),

    /// A fixed-length sequence of sub-specs, space-separated.
    Tuple(Vec<FieldSpec>),

    /// Fixed surrounding text with one generated span in the middle.
    Template {
        prefix: String,
        span: Box<FieldSpec>,
        suffix: String,
    },
}

impl FieldSpec {
    /// Bounded single-line text.
    pub fn text(min: usize, max: usize) -> Self {
        FieldSpec::Text { min, max }
    }

    /// One of the given alternatives.
    pub fn choice<S: Into<String>>(alternatives: impl IntoIterator<Item = S>) -> Self {
        FieldSpec::Choice(alternatives.into_iter().map(Into::into).collect())
    }

    /// A template whose only generated part is `span`.
    pub fn template(prefix: impl Into<String>, span: FieldSpec, suffix: impl Into<String>) -> Self {
        FieldSpec::Template {
            prefix: prefix.into(),
            span: Box::new(span),
            suffix: suffix.into(),
        }
    }
}

/// Compile a field spec into GBNF grammar text.
pub fn compile(spec: &FieldSpec) -> Grammar {
    Grammar(format!("root ::= {}\n", expr(spec)))
}

fn expr(spec: &FieldSpec) -> String {
    match spec {
        FieldSpec::Text { min, max } => format!("[^\\r\\n]{{{min},{max}}}"),
        FieldSpec::Choice(alternatives) => {
            let body = alternatives
                .iter()
                .map(|a| literal(a))
                .collect::<Vec<_>>()
                .join(" | ");
            format!("({body})")
        }
        FieldSpec::Tuple(parts) => parts
            .iter()
            .map(expr)
            .collect::<Vec<_>>()
            .join(" \" \" "),
        FieldSpec::Template {
            prefix,
            span,
            suffix,
        } => {
            let mut out = String::new();
            if !prefix.is_empty() {
                out.push_str(&literal(prefix));
                out.push(' ');
            }
            out.push_str(&expr(span));
            if !suffix.is_empty() {
                out.push(' ');
                out.push_str(&literal(suffix));
            }
            out
        }
    }
}

/// A grammar for a JSON plan with a reasoning string and `min..=max`
/// structured actions, each naming one skill and one outcome from the
/// given candidate lists plus a free-text attempt description.
///
/// The enumerated alternatives make the skill and outcome fields
/// closed-vocabulary: the sampler cannot produce a phrase outside the
/// candidate sets.
pub fn action_plan(skills: &[&str], outcomes: &[&str], min: usize, max: usize) -> Grammar {
    debug_assert!(min >= 1 && max >= min);
    let skill_alts = json_string_alternatives(skills);
    let outcome_alts = json_string_alternatives(outcomes);
    let extra_min = min - 1;
    let extra_max = max - 1;

    Grammar(format!(
        concat!(
            "root ::= \"{{\" ws \"\\\"reasoning\\\":\" ws text ws \",\" ws ",
            "\"\\\"actions\\\":\" ws \"[\" ws action (ws \",\" ws action){{{extra_min},{extra_max}}} ws \"]\" ws \"}}\"\n",
            "action ::= \"{{\" ws \"\\\"skill\\\":\" ws skill ws \",\" ws ",
            "\"\\\"outcome\\\":\" ws outcome ws \",\" ws \"\\\"attempt\\\":\" ws text ws \"}}\"\n",
            "skill ::= {skill_alts}\n",
            "outcome ::= {outcome_alts}\n",
            "text ::= \"\\\"\" [^\"\\\\\\r\\n]{{1,240}} \"\\\"\"\n",
            "ws ::= [ \\t\\n]*\n",
        ),
        extra_min = extra_min,
        extra_max = extra_max,
        skill_alts = skill_alts,
        outcome_alts = outcome_alts,
    ))
}

/// Render alternatives as JSON-quoted GBNF literals: `"\"Take it\""`.
fn json_string_alternatives(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| {
            let escaped = escape(v);
            format!("\"\\\"{escaped}\\\"\"")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Render a GBNF string literal.
fn literal(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_bounds() {
        let grammar = compile(&FieldSpec::text(10, 200));
        assert_eq!(grammar.as_str(), "root ::= [^\\r\\n]{10,200}\n");
    }

    #[test]
    fn test_choice_alternatives() {
        let grammar = compile(&FieldSpec::choice(["0", "1", "2"]));
        assert_eq!(grammar.as_str(), "root ::= (\"0\" | \"1\" | \"2\")\n");
    }

    #[test]
    fn test_choice_escapes_quotes() {
        let grammar = compile(&FieldSpec::choice([r#"say "hi""#]));
        assert!(grammar.as_str().contains(r#"say \"hi\""#));
    }

    #[test]
    fn test_template_wraps_span() {
        let grammar = compile(&FieldSpec::template(
            "You notice the well. ",
            FieldSpec::text(5, 100),
            "",
        ));
        assert!(grammar.as_str().starts_with("root ::= \"You notice the well. \" "));
        assert!(grammar.as_str().contains("{5,100}"));
    }

    #[test]
    fn test_tuple_sequences_parts() {
        let grammar = compile(&FieldSpec::Tuple(vec![
            FieldSpec::choice(["yes", "no"]),
            FieldSpec::text(1, 10),
        ]));
        assert!(grammar.as_str().contains("(\"yes\" | \"no\") \" \" [^\\r\\n]{1,10}"));
    }

    #[test]
    fn test_action_plan_closed_vocabulary() {
        let grammar = action_plan(
            &["Perception", "Grip"],
            &["You acquire the rope.", "You make your way to the mill."],
            2,
            5,
        );
        let text = grammar.as_str();
        assert!(text.contains("Perception"));
        assert!(text.contains("You acquire the rope."));
        // 2..=5 actions: one mandatory plus 1..=4 repeats.
        assert!(text.contains("{1,4}"));
        assert!(text.contains("\\\"reasoning\\\""));
        assert!(text.contains("\\\"attempt\\\""));
    }
}
