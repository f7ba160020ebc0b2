// Whole-session tests: source text goes through the read, compile and execute loop exactly as it
// would when typed at the prompt.

use rpforth::add_native_word;
use rpforth::lang::code::Op;
use rpforth::runtime::built_ins::register_builtin_words;
use rpforth::runtime::config::Config;
use rpforth::runtime::data_structures::value::Value;
use rpforth::runtime::definitions::decompile;
use rpforth::runtime::error;
use rpforth::runtime::interpreter::rpforth_interpreter::{CapturedOutput, RpforthInterpreter};
use rpforth::runtime::interpreter::{
    CodeManagement, Interpreter, InterpreterStack, WordManagement,
};
use rpforth::runtime::repl::{Repl, ReplEvent, ScriptLines};
use std::path::PathBuf;
use test_case::test_case;

fn quiet_config() -> Config {
    Config {
        no_stack_print: true,
        ..Config::default()
    }
}

fn interpreter_with(config: Config) -> (RpforthInterpreter, CapturedOutput) {
    let output = CapturedOutput::new();
    let mut interpreter =
        RpforthInterpreter::with_config(config).with_output(Box::new(output.clone()));

    register_builtin_words(&mut interpreter);

    (interpreter, output)
}

fn run_in(interpreter: &mut RpforthInterpreter, text: &str) -> Repl {
    let mut repl = Repl::new();

    repl.run(interpreter, &mut ScriptLines::new(text))
        .expect("session ended with a fatal error");

    repl
}

fn run(text: &str) -> (RpforthInterpreter, Repl, CapturedOutput) {
    let (mut interpreter, output) = interpreter_with(quiet_config());
    let repl = run_in(&mut interpreter, text);

    (interpreter, repl, output)
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&value| Value::Int(value)).collect()
}

fn scratch_dir(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("rpforth-{}-{}", name, std::process::id()));

    std::fs::create_dir_all(&path).expect("scratch directory");
    path
}

#[test_case("1 2 swap .", &[2, 1]; "swap")]
#[test_case("1 2 over .", &[1, 2, 1]; "over")]
#[test_case("1 2 3 rot .", &[2, 3, 1]; "rot")]
#[test_case("1 2 3 -rot .", &[3, 1, 2]; "reverse rot")]
#[test_case("1 2 nip .", &[2]; "nip")]
#[test_case("1 2 tuck .", &[2, 1, 2]; "tuck")]
#[test_case("1 2 2dup .", &[1, 2, 1, 2]; "two dup")]
#[test_case("1 2 3 2drop .", &[1]; "two drop")]
#[test_case("5 6 7 2 pick .", &[5, 6, 7, 5]; "pick")]
#[test_case("4 4 depth .", &[4, 4, 2]; "depth")]
#[test_case("1 uspush 2 uspop .", &[2, 1]; "user stack")]
#[test_case("7 3 // .", &[2]; "floored division")]
#[test_case("-7 3 % .", &[2]; "floored remainder")]
#[test_case("2 10 ** .", &[1024]; "power")]
#[test_case("3 neg .", &[-3]; "negate")]
#[test_case("41 ++ .", &[42]; "increment")]
#[test_case("6 3 & 1 << .", &[4]; "bits")]
fn primitives_leave_the_expected_stack(source: &str, expected: &[i64]) {
    let (interpreter, _, _) = run(source);

    assert_eq!(interpreter.stack(), &ints(expected));
}

#[test]
fn true_division_gives_a_float() {
    let (interpreter, _, _) = run("10 2 / .");

    assert_eq!(interpreter.stack(), &vec![Value::Float(5.0)]);
}

#[test]
fn definitions_can_be_called() {
    let (interpreter, repl, _) = run("double: 2 * ; .\n21 double .");

    assert_eq!(interpreter.stack(), &ints(&[42]));
    assert_eq!(repl.events(), &[ReplEvent::Defined, ReplEvent::Executed]);
}

#[test]
fn definitions_may_span_lines() {
    let (interpreter, _, _) = run("sum3:\n+\n+ ;\n.\n1 2 3 sum3 .");

    assert_eq!(interpreter.stack(), &ints(&[6]));
}

#[test]
fn unresolved_branch_discards_the_cycle() {
    let (interpreter, repl, output) = run("t: if 1\n.\n't refdef .");

    assert_eq!(repl.events()[0], ReplEvent::UnresolvedBranch);
    assert!(output.contents().contains("unresolved branch"));
    assert!(interpreter.directory().is_empty());
    assert!(interpreter.store().cells().iter().all(|cell| cell.op.header_name().is_none()));
}

#[test]
fn underflow_leaves_the_stack_alone() {
    let (interpreter, repl, output) = run("1 + .");

    assert!(matches!(repl.events()[0], ReplEvent::Aborted(_)));
    assert_eq!(interpreter.stack(), &ints(&[1]));
    assert!(output.contents().contains("aborted"));
}

#[test]
fn abort_inside_a_definition_names_it() {
    let (interpreter, _, output) = run("bad: drop ; .\nbad .");

    let text = output.contents();

    assert!(text.contains("\"drop\" aborted"));
    assert!(text.contains("In definition: \"bad\" at index: 0"));
    assert!(text.contains("Stack empty, cannot print TOS & NOS"));
    assert!(interpreter.return_stack().is_empty());
}

#[test]
fn redefinition_binds_late_callers_only_until_repdef() {
    let (interpreter, _, output) = run(concat!(
        "w: 1 ; .\n",
        "user: w ; .\n",
        "w: 2 ; .\n",
        "later: w ; .\n",
        "user later .\n",
        "'w repdef .\n",
        "user .\n",
    ));

    assert_eq!(interpreter.stack(), &ints(&[1, 2, 2]));
    assert!(output.contents().contains("  Replacing 1 older definitions"));
    assert!(output.contents().contains("  Replaced in 1 definitions"));
}

#[test]
fn trailing_call_becomes_a_jump() {
    let (interpreter, _, _) = run("a: 1 ; .\nb: 2 a ; .\n");

    let start = interpreter.directory().start_of("b").unwrap();

    assert_eq!(
        interpreter.store().get(start + 2).map(|cell| cell.op.clone()),
        Some(Op::Jump(0))
    );
}

/// Record the return stack depth on the user stack.
fn word_return_depth(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let depth = interpreter.return_stack().len() as i64;

    interpreter.aux_push(Value::Int(depth));
    Ok(())
}

#[test]
fn tail_recursion_does_not_grow_the_return_stack() {
    let (mut interpreter, _) = interpreter_with(quiet_config());

    add_native_word!(
        interpreter,
        "rdepth",
        word_return_depth,
        "Push the return stack depth to the user stack.",
        " -- "
    );

    let repl = run_in(&mut interpreter, "down: rdepth -- =0 ifz down ; then ; .\n200 down .");

    assert_eq!(repl.events().last(), Some(&ReplEvent::Executed));
    assert_eq!(interpreter.stack(), &ints(&[0]));
    assert_eq!(interpreter.aux_stack().len(), 200);
    assert!(interpreter.aux_stack().iter().all(|depth| *depth == Value::Int(1)));
}

#[test]
fn branch_skipped_when_flag_is_clear() {
    let (interpreter, _, _) = run("t: 1 =0 if 'never then ; .\nt .");

    assert_eq!(interpreter.stack(), &ints(&[1]));
}

#[test]
fn ifneq_runs_on_differing_values() {
    let (interpreter, _, _) = run("t: ifneq 'differ then ; .\n1 2 t .\ncleards 3 3 t .");

    assert_eq!(interpreter.stack(), &ints(&[3, 3]));
}

#[test]
fn variables_are_assigned_in_place() {
    let (interpreter, _, _) = run("v: 0 ; .\n5 *v = .\n3 *v += .\nv .");

    assert_eq!(interpreter.stack(), &ints(&[8]));
}

#[test]
fn assignment_to_a_word_is_refused() {
    let (interpreter, _, output) = run("w: dup ; .\n5 *w = .");

    assert!(output.contents().contains("\"w\" is not a variable, no assignment allowed"));
    assert_eq!(interpreter.stack().len(), 2);
}

#[test]
fn redirect_words_return_to_the_caller() {
    let (interpreter, _, _) = run(concat!(
        "y: 'yes ; .\n",
        "n: 'no ; .\n",
        "0 =0 drop *y *n choose 1 .\n",
        "*y *n *y -5 <0> .\n",
        "*n execidx .\n",
    ));

    assert_eq!(
        interpreter.stack(),
        &vec![
            Value::Str("yes".into()),
            Value::Int(1),
            Value::Str("yes".into()),
            Value::Str("no".into()),
        ]
    );
}

#[test]
fn register_loop_runs_the_word_i_times() {
    let (interpreter, _, _) = run("inc: 1 + ; .\n0 4 i= *inc iloop i .");

    assert_eq!(interpreter.stack(), &ints(&[4, 4]));
}

#[test]
fn references_are_listed() {
    let (interpreter, _, _) = run("a: 1 ; .\nb: a 2 ; .\nc: a ; .\n'a refdef .");

    assert_eq!(
        interpreter.stack(),
        &vec![Value::List(vec![Value::Str("b".into()), Value::Str("c".into())])]
    );
}

#[test]
fn last_definition_can_be_deleted() {
    let (interpreter, _, output) = run("a: 1 ; .\nb: 2 ; .\ndellast .\nc: 3 ; .\nc .");

    assert!(output.contents().contains("\"b\" at index 3 deleted"));
    assert_eq!(interpreter.directory().start_of("c"), Some(3));
    assert_eq!(interpreter.stack(), &ints(&[3]));
}

#[test]
fn deleting_a_redefinition_brings_back_the_older_one() {
    let (interpreter, _, output) = run("a: 1 ; .\nb: 2 ; .\na: 3 ; .\ndellast .\na b .");

    assert!(output.contents().contains("\"a\" at index 6 deleted"));
    assert_eq!(interpreter.directory().start_of("a"), Some(0));
    assert_eq!(interpreter.directory().start_of("b"), Some(3));
    assert_eq!(interpreter.stack(), &ints(&[1, 2]));
}

#[test]
fn deleting_from_inside_a_call_drops_the_frames() {
    let (interpreter, repl, _) = run("x: 1 ; .\ncut: dellast ; .\nwrap: cut 2 ; .\nwrap .");

    assert_eq!(repl.events().last(), Some(&ReplEvent::Executed));
    assert!(interpreter.return_stack().is_empty());
    assert_eq!(interpreter.store().len(), 6);
    assert_eq!(interpreter.directory().start_of("wrap"), None);
    assert_eq!(interpreter.directory().start_of("cut"), Some(3));
}

#[test]
fn lists_are_built_from_the_marker() {
    let (interpreter, _, _) = run("0 '[] 1 2 listcre len .");

    assert_eq!(interpreter.stack(), &ints(&[0, 2]));
}

#[test]
fn quit_reports_unsaved_definitions() {
    let (_, repl, output) = run("a: 1 ; .\nquit\n5 .");

    assert_eq!(repl.events().last(), Some(&ReplEvent::Quit));
    assert!(output.contents().contains("rpforth ended; 1 definitions not saved"));
}

fn listings(interpreter: &RpforthInterpreter) -> Vec<(String, String)> {
    interpreter
        .directory()
        .iter()
        .map(|(name, entry)| (name.clone(), decompile(interpreter, entry.start)))
        .collect()
}

#[test]
fn saved_image_restores_definitions() {
    let directory = scratch_dir("image");
    let config = Config {
        image_dir: directory.clone(),
        ..quiet_config()
    };

    let (mut first, first_output) = interpreter_with(config.clone());
    run_in(
        &mut first,
        "sq: dup * ; .\nquad: sq sq ; .\nsign: <0 if 'neg then ; .\n'squares save .",
    );

    assert!(first_output.contents().contains("Saved: 3 definitions to"));
    assert_eq!(first.saved_definitions(), 3);

    let (mut second, second_output) = interpreter_with(config);
    run_in(&mut second, "'squares load .\n7 sq .\n2 quad .\n-2 sign .");

    assert!(second_output.contents().contains("    0 sq"));
    assert_eq!(listings(&second), listings(&first));
    assert_eq!(
        second.stack(),
        &vec![
            Value::Int(49),
            Value::Int(16),
            Value::Int(-2),
            Value::Str("neg".into()),
        ]
    );

    let _ = std::fs::remove_dir_all(directory);
}

#[test]
fn infinite_literals_survive_an_image() {
    let directory = scratch_dir("infinite");
    let config = Config {
        image_dir: directory.clone(),
        ..quiet_config()
    };

    let (mut first, _) = interpreter_with(config.clone());
    run_in(&mut first, "big: 1e400 ; .\n'img save .");

    let (mut second, output) = interpreter_with(config);
    run_in(&mut second, "'img load .\nbig .");

    assert!(!output.contents().contains("aborted"));
    assert_eq!(second.stack(), &vec![Value::Float(f64::INFINITY)]);

    let _ = std::fs::remove_dir_all(directory);
}
