//! Definition management over the program store: rendering definitions back to source, finding
//! who refers to a word, relinking callers after a redefinition and listing raw cells.

use crate::{
    lang::code::Op,
    runtime::{data_structures::value::Value, interpreter::Interpreter},
};
use tracing::debug;

/// Most cells `pexlst` shows at once.
pub const LISTING_LIMIT: usize = 50;

fn target_name(interpreter: &dyn Interpreter, target: usize) -> String {
    interpreter
        .store()
        .header_name(target)
        .map(str::to_string)
        .unwrap_or_else(|| format!("@{}", target))
}

fn primitive_name(interpreter: &dyn Interpreter, handler: usize) -> String {
    interpreter
        .word_handler_info(handler)
        .map(|info| info.name().clone())
        .unwrap_or_else(|| format!("primitive {}", handler))
}

/// Render a literal the way it would have to be typed to compile back to the same value.
fn literal_source(value: &Value) -> String {
    match value {
        Value::Str(text) if text.contains('\n') => format!("\"\"\" {}\"\"\"", text),
        Value::Str(text) if !text.is_empty() && !text.contains(char::is_whitespace) => {
            format!("'{}", text)
        }
        Value::Str(text) if !text.contains('"') => format!("\" {}\"", text),
        Value::Str(text) if !text.contains("<-") => format!("-> {}<-", text),
        other => other.repr(),
    }
}

/// Render the definition whose header is at `start` back to its source tokens.  Rendering stops
/// at the first return or jump that is not followed by a `then`.
pub fn decompile(interpreter: &dyn Interpreter, start: usize) -> String {
    let store = interpreter.store();
    let mut tokens = Vec::new();
    let mut index = start;

    while let Some(cell) = store.get(index) {
        match &cell.op {
            Op::DefHeader(name) => {
                if index != start {
                    break;
                }

                tokens.push(format!("{}:", name));
            }
            Op::Call(target) => tokens.push(target_name(interpreter, *target)),
            Op::Jump(target) => {
                tokens.push(target_name(interpreter, *target));
                tokens.push(";".to_string());
            }
            Op::Return => tokens.push(";".to_string()),
            Op::PushLiteral(value) => tokens.push(literal_source(value)),
            Op::PushIndex(target) => tokens.push(format!("*{}", target_name(interpreter, *target))),
            Op::BranchIfFlag(_) => tokens.push("if".to_string()),
            Op::BranchIfNotFlag(_) => tokens.push("ifz".to_string()),
            Op::BranchIfUnequal(_) => tokens.push("ifneq".to_string()),
            Op::Primitive(handler) => tokens.push(primitive_name(interpreter, *handler)),
            Op::BranchTarget => tokens.push("then".to_string()),
            Op::ReturnToLoop => break,
        }

        let continues = !cell.op.is_exit()
            || matches!(store.get(index + 1).map(|next| &next.op), Some(Op::BranchTarget));

        if !continues {
            break;
        }

        index += 1;
    }

    tokens.join(" ")
}

/// Names of the definitions that call, jump to or take the index of the live definition of
/// `name`.  Only closed definitions are searched.  Each name is reported once, in store order.
pub fn references(interpreter: &dyn Interpreter, name: &str) -> Option<Vec<String>> {
    let start = interpreter.directory().start_of(name)?;
    let store = interpreter.store();
    let end = interpreter.compiler().boundary().min(store.len());
    let mut found: Vec<String> = Vec::new();

    for index in 0..end {
        let refers = store
            .get(index)
            .and_then(|cell| cell.op.word_target())
            .map(|target| target == start)
            .unwrap_or(false);

        if !refers {
            continue;
        }

        if let Some(owner) = store.owner_of(index).and_then(|owner| store.header_name(owner))
            && !found.iter().any(|known| known == owner)
        {
            found.push(owner.to_string());
        }
    }

    Some(found)
}

/// Point every reference to an older definition of `name` at the live one.  A definition's
/// references to its own header are left alone, as are the cells of the live definition.
///
/// Returns the number of cells rewritten, or None if the name is not defined.
pub fn propagate_redefinition(interpreter: &mut dyn Interpreter, name: &str) -> Option<usize> {
    let start = interpreter.directory().start_of(name)?;
    let older: Vec<usize> = interpreter
        .store()
        .headers_named(name)
        .into_iter()
        .filter(|&header| header < start)
        .collect();

    if older.is_empty() {
        return Some(0);
    }

    let rewrites: Vec<usize> = {
        let store = interpreter.store();

        (older[0]..start)
            .filter(|&index| {
                let target = store.get(index).and_then(|cell| cell.op.word_target());

                match target {
                    Some(target) => older.contains(&target) && store.owner_of(index) != Some(target),
                    None => false,
                }
            })
            .collect()
    };

    for &index in &rewrites {
        if let Some(cell) = interpreter.store_mut().get_mut(index) {
            cell.op.retarget(start);
        }
    }

    debug!("{} references to older {} moved to {}", rewrites.len(), name, start);

    Some(rewrites.len())
}

/// Raw cells from `start`, one line each, at most [`LISTING_LIMIT`] of them.
pub fn listing(interpreter: &dyn Interpreter, start: usize) -> Vec<String> {
    let store = interpreter.store();
    let end = store.len().min(start + LISTING_LIMIT);

    (start..end)
        .filter_map(|index| store.get(index).map(|cell| (index, cell)))
        .map(|(index, cell)| {
            let text = match &cell.op {
                Op::DefHeader(name) => format!("{}:", name),
                Op::Call(target) => format!("call {}", target_name(interpreter, *target)),
                Op::Jump(target) => format!("jump {}", target_name(interpreter, *target)),
                Op::Return => ";".to_string(),
                Op::PushLiteral(value) => format!("lit  {}", value.repr()),
                Op::PushIndex(target) => {
                    format!("pointer to {}", target_name(interpreter, *target))
                }
                Op::BranchIfFlag(target) => format!("if - then at: {}", target),
                Op::BranchIfNotFlag(target) => format!("ifz - then at: {}", target),
                Op::BranchIfUnequal(target) => format!("ifneq - then at: {}", target),
                Op::Primitive(handler) => primitive_name(interpreter, *handler),
                Op::BranchTarget => "then".to_string(),
                Op::ReturnToLoop => "return to loop".to_string(),
            };

            format!("{:>5} {}", index, text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{
        rpforth_interpreter::RpforthInterpreter, CodeManagement, WordManagement,
    };

    fn build(ops: Vec<Op>, words: &[(&str, usize)], boundary: usize) -> RpforthInterpreter {
        let mut interpreter = RpforthInterpreter::new();

        for op in ops {
            let _ = interpreter.store_mut().push(None, op);
        }

        for (name, start) in words {
            let _ = interpreter.directory_mut().define(name, *start);
        }

        interpreter.compiler_mut().set_boundary(boundary);
        interpreter
    }

    #[test]
    fn decompile_continues_past_return_before_then() {
        let interpreter = build(
            vec![
                Op::DefHeader("w".into()),
                Op::BranchIfFlag(4),
                Op::PushLiteral(Value::Str("two words".into())),
                Op::Return,
                Op::BranchTarget,
                Op::PushLiteral(Value::Str("one".into())),
                Op::Jump(0),
                Op::PushLiteral(Value::Int(9)),
            ],
            &[("w", 0)],
            7,
        );

        assert_eq!(decompile(&interpreter, 0), "w: if \" two words\" ; then 'one w ;");
    }

    #[test]
    fn references_are_attributed_and_deduplicated() {
        let interpreter = build(
            vec![
                Op::DefHeader("a".into()),
                Op::Return,
                Op::DefHeader("b".into()),
                Op::Call(0),
                Op::PushIndex(0),
                Op::Return,
                Op::DefHeader("c".into()),
                Op::Jump(0),
                Op::Call(0),
            ],
            &[("a", 0), ("b", 2), ("c", 6)],
            8,
        );

        assert_eq!(
            references(&interpreter, "a"),
            Some(vec!["b".to_string(), "c".to_string()])
        );
        assert_eq!(references(&interpreter, "missing"), None);
    }

    #[test]
    fn propagation_skips_self_references() {
        let mut interpreter = build(
            vec![
                Op::DefHeader("w".into()),
                Op::Call(0),
                Op::Return,
                Op::DefHeader("user".into()),
                Op::Call(0),
                Op::Return,
                Op::DefHeader("w".into()),
                Op::Call(0),
                Op::Return,
            ],
            &[("w", 6), ("user", 3)],
            9,
        );

        assert_eq!(propagate_redefinition(&mut interpreter, "w"), Some(1));
        assert_eq!(interpreter.store().get(1).map(|cell| cell.op.clone()), Some(Op::Call(0)));
        assert_eq!(interpreter.store().get(4).map(|cell| cell.op.clone()), Some(Op::Call(6)));
        assert_eq!(interpreter.store().get(7).map(|cell| cell.op.clone()), Some(Op::Call(0)));
    }

    #[test]
    fn listing_shows_cells_with_indices() {
        let interpreter = build(
            vec![Op::DefHeader("x".into()), Op::PushLiteral(Value::Int(1)), Op::Return],
            &[("x", 0)],
            3,
        );

        assert_eq!(
            listing(&interpreter, 1),
            vec!["    1 lit  1".to_string(), "    2 ;".to_string()]
        );
    }
}
