use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, ensure};

use winterthorn::error::ThornError;
use winterthorn::fixtures::{Case, CaseClass, load_cases, normalize_output};
use winterthorn::interpreter::Interpreter;
use winterthorn::parser;
use winterthorn::runtime::function::{Function, Parameter};
use winterthorn::runtime::value::Value;

/// Runs one fixture program with a `Print` function capturing its lines.
fn run_program(source: &str) -> (Result<Value, ThornError>, Vec<String>) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = output.clone();
    let mut interpreter = Interpreter::new();
    interpreter.scope_mut().register_function(Function::native(
        "Print",
        vec![Parameter::new("value")],
        false,
        move |args| {
            sink.borrow_mut().push(args[0].to_display());
            Ok(Value::Null)
        },
    ));

    let result = parser::parse(source)
        .map_err(ThornError::from)
        .and_then(|program| interpreter.run(&program));
    let lines = output.borrow().clone();
    (result, lines)
}

fn check_error_expectations(case: &Case, error: &ThornError) -> Result<()> {
    if let Some(expected_code) = case.spec.expected.error_code.as_deref() {
        ensure!(
            error.code() == expected_code,
            "Case {} expected error code {expected_code}, got {} ({error})",
            case.name,
            error.code()
        );
    }
    if let Some(contains_file) = case.spec.expected.error_contains_file.as_deref() {
        let expected_fragment = case.read_text(contains_file)?;
        let expected_fragment = expected_fragment.trim();
        let actual = error.to_string();
        ensure!(
            actual.contains(expected_fragment),
            "Case {} expected error containing '{expected_fragment}', got '{actual}'",
            case.name
        );
    }
    Ok(())
}

#[test]
fn runs_fixture_programs() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        let source = fs::read_to_string(&case.program_path)
            .with_context(|| format!("Reading {}", case.name))?;
        let (result, lines) = run_program(&source);

        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                let value = result
                    .with_context(|| format!("Case {} failed unexpectedly", case.name))?;
                if let Some(output_file) = case.spec.expected.output_file.as_deref() {
                    let expected = case.read_text(output_file)?;
                    assert_eq!(
                        normalize_output(&lines.join("\n")),
                        normalize_output(&expected),
                        "Printed output mismatch for {}",
                        case.name
                    );
                }
                if let Some(expected_result) = case.spec.expected.result.as_deref() {
                    assert_eq!(
                        value.to_display(),
                        expected_result,
                        "Result mismatch for {}",
                        case.name
                    );
                }
            }
            CaseClass::CompileError => {
                let error = match result {
                    Err(error @ ThornError::Compilation(_)) => error,
                    Err(other) => anyhow::bail!(
                        "Case {} expected a compilation error, got {other}",
                        case.name
                    ),
                    Ok(value) => anyhow::bail!(
                        "Case {} expected a compilation error, got result {}",
                        case.name,
                        value.to_display()
                    ),
                };
                check_error_expectations(&case, &error)?;
            }
            CaseClass::RuntimeError => {
                let error = match result {
                    Err(error @ ThornError::Execution(_)) => error,
                    Err(other) => anyhow::bail!(
                        "Case {} expected an execution error, got {other}",
                        case.name
                    ),
                    Ok(value) => anyhow::bail!(
                        "Case {} expected an execution error, got result {}",
                        case.name,
                        value.to_display()
                    ),
                };
                check_error_expectations(&case, &error)?;
            }
        }
    }

    Ok(())
}
