//! Renders the discovered test-case table as a source-level test module.

use std::fmt::Write;

use crate::engine::ExecuteResult;
use crate::load::Target;
use crate::ssa::{Module, ValueData};
use crate::value::ConcreteValue;

pub(crate) fn render(module: &Module, target: &Target, result: &ExecuteResult) -> String {
    let func = module.func(target.func);
    // Column names follow the target's parameters when the symbol list
    // lines up with them (the synthesized driver guarantees this); a
    // hand-written runner falls back to positional names.
    let names: Vec<String> = if target.symbols.len() == func.params.len() {
        func.params
            .iter()
            .map(|&p| match module.value(p) {
                ValueData::Param { name, .. } => name.clone(),
                _ => unreachable!(),
            })
            .collect()
    } else {
        (0..target.symbols.len()).map(|i| format!("arg{i}")).collect()
    };
    let has_oracle = !target.retvals.is_empty();

    let mut out = String::new();
    let _ = writeln!(out, "// Code generated by congen; do not edit.");
    let _ = writeln!(
        out,
        "// target {}.{}, coverage {:.2}",
        module.name, target.name, result.coverage
    );
    let _ = writeln!(out, "test {} {{", target.name);
    for case in &result.cases {
        let mut fields: Vec<String> = names
            .iter()
            .zip(&case.values)
            .map(|(n, v)| format!("{n}: {}", render_value(v)))
            .collect();
        if has_oracle {
            if let Some(ret) = &case.ret {
                fields.push(format!("want: {}", render_value(ret)));
            }
        }
        if case.panicked {
            fields.push("panics: true".into());
        }
        let _ = writeln!(out, "    case {{ {} }}", fields.join(", "));
    }
    let _ = writeln!(out, "}}");
    out
}

/// Source-literal rendering: strings are quoted, pointers spelled as
/// address-of expressions over their pointee literal.
fn render_value(v: &ConcreteValue) -> String {
    match v {
        ConcreteValue::Str(s) => format!("{s:?}"),
        ConcreteValue::Pointer(None) => "nil".into(),
        ConcreteValue::Pointer(Some(p)) => format!("&{}", render_value(p)),
        ConcreteValue::Struct(vs) | ConcreteValue::Tuple(vs) => {
            let vs: Vec<String> = vs.iter().map(render_value).collect();
            format!("{{{}}}", vs.join(", "))
        }
        other => format!("{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::render_value;
    use crate::value::{ConcreteValue, IntValue};

    #[test]
    fn values_render_as_source_literals() {
        assert_eq!(
            render_value(&ConcreteValue::Int(IntValue::from_i64(true, 32, -3))),
            "-3"
        );
        assert_eq!(
            render_value(&ConcreteValue::Str("a\"b".into())),
            "\"a\\\"b\""
        );
        assert_eq!(render_value(&ConcreteValue::Pointer(None)), "nil");
        assert_eq!(
            render_value(&ConcreteValue::Pointer(Some(Box::new(
                ConcreteValue::Int(IntValue::from_i64(true, 32, 5))
            )))),
            "&5"
        );
    }
}
