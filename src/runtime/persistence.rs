//! Program images: the closed part of the program store and the directory, written as JSON.
//!
//! Cells are stored as `[tag, operand]` pairs.  Primitives are stored by name rather than by
//! handler index, so an image survives changes to the order words are registered in.

use crate::{
    lang::code::{Cell, Op, ProgramStore},
    runtime::{
        data_structures::{
            directory::{DefinitionEntry, Directory},
            value::Value,
        },
        error::{self, script_error},
        interpreter::Interpreter,
    },
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use tracing::info;

/// Everything needed to rebuild a program: cells up to the boundary, the directory and the
/// boundary itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub cells: Vec<(String, JsonValue)>,
    pub words: IndexMap<String, DefinitionEntry>,
    pub boundary: usize,
}

fn encode_cell(interpreter: &dyn Interpreter, op: &Op) -> error::Result<(String, JsonValue)> {
    let index = |target: &usize| JsonValue::from(*target);

    let encoded = match op {
        Op::DefHeader(name) => ("def", JsonValue::from(name.as_str())),
        Op::Call(target) => ("call", index(target)),
        Op::Jump(target) => ("jump", index(target)),
        Op::Return => ("ret", JsonValue::Null),
        Op::PushLiteral(value) => ("lit", serde_json::to_value(value)?),
        Op::PushIndex(target) => ("index", index(target)),
        Op::BranchIfFlag(target) => ("if", index(target)),
        Op::BranchIfNotFlag(target) => ("ifz", index(target)),
        Op::BranchIfUnequal(target) => ("ifneq", index(target)),
        Op::Primitive(handler) => match interpreter.word_handler_info(*handler) {
            Some(info) => ("prim", JsonValue::from(info.name().as_str())),
            None => return script_error(format!("Primitive handler {} is not registered", handler)),
        },
        Op::BranchTarget => ("then", JsonValue::Null),
        Op::ReturnToLoop => ("loop", JsonValue::Null),
    };

    Ok((encoded.0.to_string(), encoded.1))
}

fn image_error<T>(position: usize, message: String) -> error::Result<T> {
    script_error(format!("Image cell {}: {}", position, message))
}

fn decode_cell(
    interpreter: &dyn Interpreter,
    position: usize,
    len: usize,
    tag: &str,
    operand: &JsonValue,
) -> error::Result<Op> {
    let target = || -> error::Result<usize> {
        match operand.as_u64().map(|value| value as usize) {
            Some(target) if target < len => Ok(target),
            Some(target) => image_error(position, format!("target {} out of range 0:{}", target, len)),
            None => image_error(position, format!("expected an index for \"{}\"", tag)),
        }
    };

    let op = match tag {
        "def" => match operand.as_str() {
            Some(name) => Op::DefHeader(name.to_string()),
            None => return image_error(position, "expected a definition name".to_string()),
        },
        "call" => Op::Call(target()?),
        "jump" => Op::Jump(target()?),
        "ret" => Op::Return,
        "lit" => Op::PushLiteral(serde_json::from_value::<Value>(operand.clone())?),
        "index" => Op::PushIndex(target()?),
        "if" => Op::BranchIfFlag(target()?),
        "ifz" => Op::BranchIfNotFlag(target()?),
        "ifneq" => Op::BranchIfUnequal(target()?),
        "prim" => {
            let Some(name) = operand.as_str() else {
                return image_error(position, "expected a primitive name".to_string());
            };

            match interpreter.dictionary().get(name) {
                Some(info) => Op::Primitive(info.handler_index),
                None => {
                    return image_error(position, format!("unknown primitive \"{}\"", name));
                }
            }
        }
        "then" => Op::BranchTarget,
        "loop" => Op::ReturnToLoop,
        _ => return image_error(position, format!("unknown tag \"{}\"", tag)),
    };

    Ok(op)
}

impl ProgramImage {
    /// Take an image of the closed definitions.  Volatile code past the boundary is left out.
    pub fn capture(interpreter: &dyn Interpreter) -> error::Result<ProgramImage> {
        let store = interpreter.store();
        let boundary = interpreter.compiler().boundary().min(store.len());

        let cells = store.cells()[..boundary]
            .iter()
            .map(|cell| encode_cell(interpreter, &cell.op))
            .collect::<error::Result<Vec<_>>>()?;

        let words = interpreter
            .directory()
            .iter()
            .filter(|(_, entry)| entry.start < boundary)
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        Ok(ProgramImage {
            cells,
            words,
            boundary,
        })
    }

    /// Rebuild the store and directory, checking every tag, target and primitive name against
    /// the running interpreter.
    pub fn restore(&self, interpreter: &dyn Interpreter) -> error::Result<(ProgramStore, Directory)> {
        let len = self.cells.len();

        if self.boundary > len {
            return script_error(format!("Image boundary {} beyond its {} cells", self.boundary, len));
        }

        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(position, (tag, operand))| {
                decode_cell(interpreter, position, len, tag, operand)
                    .map(|op| Cell::new(None, op))
            })
            .collect::<error::Result<Vec<_>>>()?;

        let store = ProgramStore::from_cells(cells);
        let mut directory = Directory::new();

        for (name, entry) in &self.words {
            if store.header_name(entry.start) != Some(name.as_str()) {
                return script_error(format!(
                    "Image entry \"{}\" does not point at its header (index {})",
                    name, entry.start
                ));
            }

            let _ = directory.define(name, entry.start);
            let _ = directory.set_doc(name, &entry.doc);
        }

        Ok((store, directory))
    }

    pub fn to_json(&self) -> error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> error::Result<ProgramImage> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Write the image file for `name`.  Returns how many definitions were saved.
pub fn save_image(interpreter: &mut dyn Interpreter, name: &str) -> error::Result<usize> {
    let image = ProgramImage::capture(interpreter)?;
    let path = interpreter.config().image_path(name);

    fs::write(&path, image.to_json()?)?;
    interpreter.set_saved_definitions(image.words.len());

    info!("saved {} definitions, {} cells to {}", image.words.len(), image.cells.len(), path.display());

    Ok(image.words.len())
}

/// Replace the whole program with the image file for `name`.  Returns the loaded names in
/// directory order.
pub fn load_image(interpreter: &mut dyn Interpreter, name: &str) -> error::Result<Vec<String>> {
    let path = interpreter.config().image_path(name);
    let image = ProgramImage::from_json(&fs::read_to_string(&path)?)?;
    let (store, directory) = image.restore(interpreter)?;

    let names: Vec<String> = directory.iter().map(|(name, _)| name.clone()).collect();

    info!("loaded {} definitions, {} cells from {}", names.len(), store.len(), path.display());

    interpreter.replace_program(store, directory, image.boundary);
    interpreter.set_saved_definitions(names.len());

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        add_native_word,
        runtime::data_structures::value::Complex,
        runtime::interpreter::{
            rpforth_interpreter::RpforthInterpreter, CodeManagement, WordManagement,
        },
    };

    fn word_nothing(_interpreter: &mut dyn Interpreter) -> error::Result<()> {
        Ok(())
    }

    fn sample() -> RpforthInterpreter {
        let mut interpreter = RpforthInterpreter::new();

        add_native_word!(interpreter, "nop", word_nothing, "Does nothing.", " -- ");

        for op in [
            Op::DefHeader("v".into()),
            Op::PushLiteral(Value::List(vec![Value::Int(1), Value::Str("a".into())])),
            Op::Return,
            Op::DefHeader("w".into()),
            Op::Primitive(0),
            Op::BranchIfFlag(7),
            Op::PushIndex(0),
            Op::BranchTarget,
            Op::Jump(0),
            Op::PushLiteral(Value::Int(99)),
            Op::ReturnToLoop,
        ] {
            let _ = interpreter.store_mut().push(None, op);
        }

        let _ = interpreter.directory_mut().define("v", 0);
        let _ = interpreter.directory_mut().define("w", 3);
        let _ = interpreter.directory_mut().set_doc("w", "uses v");
        interpreter.compiler_mut().set_boundary(9);

        interpreter
    }

    #[test]
    fn volatile_cells_are_not_captured() {
        let interpreter = sample();
        let image = ProgramImage::capture(&interpreter).unwrap();

        assert_eq!(image.cells.len(), 9);
        assert_eq!(image.cells[4], ("prim".to_string(), JsonValue::from("nop")));
        assert_eq!(image.boundary, 9);
    }

    #[test]
    fn image_survives_json() {
        let interpreter = sample();
        let image = ProgramImage::capture(&interpreter).unwrap();
        let back = ProgramImage::from_json(&image.to_json().unwrap()).unwrap();
        let (store, directory) = back.restore(&interpreter).unwrap();

        assert_eq!(store.cells(), &interpreter.store().cells()[..9]);
        assert_eq!(directory.get("w").map(|entry| entry.doc.as_str()), Some("uses v"));
        assert_eq!(directory.start_of("v"), Some(0));
    }

    #[test]
    fn non_finite_floats_survive_json() {
        let mut interpreter = RpforthInterpreter::new();

        for op in [
            Op::DefHeader("big".into()),
            Op::PushLiteral(Value::List(vec![
                Value::Float(f64::INFINITY),
                Value::Float(f64::NEG_INFINITY),
                Value::Float(f64::NAN),
                Value::Complex(Complex::new(f64::INFINITY, f64::NAN)),
            ])),
            Op::Return,
        ] {
            let _ = interpreter.store_mut().push(None, op);
        }

        let _ = interpreter.directory_mut().define("big", 0);
        interpreter.compiler_mut().set_boundary(3);

        let text = ProgramImage::capture(&interpreter).unwrap().to_json().unwrap();

        assert!(text.contains("\"-inf\""));

        let (store, _) = ProgramImage::from_json(&text)
            .unwrap()
            .restore(&interpreter)
            .unwrap();

        let Some(Op::PushLiteral(Value::List(items))) = store.get(1).map(|cell| cell.op.clone())
        else {
            panic!("literal cell expected");
        };

        assert!(matches!(items[0], Value::Float(value) if value == f64::INFINITY));
        assert!(matches!(items[1], Value::Float(value) if value == f64::NEG_INFINITY));
        assert!(matches!(items[2], Value::Float(value) if value.is_nan()));
        assert!(matches!(items[3], Value::Complex(value) if value.re.is_infinite() && value.im.is_nan()));
    }

    #[test]
    fn bad_images_are_rejected() {
        let interpreter = sample();
        let mut image = ProgramImage::capture(&interpreter).unwrap();

        image.cells[4].1 = JsonValue::from("missing");
        assert!(image.restore(&interpreter).is_err());

        let mut image = ProgramImage::capture(&interpreter).unwrap();

        image.cells[8].1 = JsonValue::from(40);
        assert!(image.restore(&interpreter).is_err());

        let mut image = ProgramImage::capture(&interpreter).unwrap();

        let _ = image.words.insert("v".to_string(), DefinitionEntry::new(1));
        assert!(image.restore(&interpreter).is_err());
    }
}
