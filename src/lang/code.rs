use crate::{lang::source_buffer::SourceLocation, runtime::data_structures::value::Value};
use std::fmt::{self, Display, Formatter};

/// The operations a cell of the program store can carry.  Targets are absolute indices into the
/// store, never references, so the whole store can be replaced or truncated at any time.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Marks the first cell of a composite word.  Has no run-time effect, the name is kept for
    /// decompiling and for attributing cells to the definition that owns them.
    DefHeader(String),

    /// Push the index of the next cell onto the return stack and continue at the target.
    Call(usize),

    /// Continue at the target without touching the return stack.  A trailing call that was
    /// rewritten at the end of a definition shows up as this.
    Jump(usize),

    /// Pop the return stack and continue there.
    Return,

    /// Push a copy of the value onto the data stack.  The assignment words update this value in
    /// place, which is how variables work.
    PushLiteral(Value),

    /// Push the index onto the data stack as a plain integer, used to hand a word to `execidx`
    /// and friends.
    PushIndex(usize),

    /// `if`: fall through when the condition flag is set, otherwise continue at the target.
    BranchIfFlag(usize),

    /// `ifz`: fall through when the condition flag is clear, otherwise continue at the target.
    BranchIfNotFlag(usize),

    /// `ifneq`: fall through when the top two data stack values differ, otherwise continue at
    /// the target.  The values stay on the stack either way.
    BranchIfUnequal(usize),

    /// Invoke the primitive with the given handler index.
    Primitive(usize),

    /// The no-op cell left where `then` closed a branch.  Branches always target one of these.
    BranchTarget,

    /// Appended after every top-level compilation unit, hands control back to the outer loop.
    ReturnToLoop,
}

impl Op {
    /// The index this cell refers to as a word, for the cells that can refer to one.
    pub fn word_target(&self) -> Option<usize> {
        match self {
            Op::Call(target) | Op::Jump(target) | Op::PushIndex(target) => Some(*target),
            _ => None,
        }
    }

    /// Point a word-referencing cell at a new index.  Other cells are left alone.
    pub fn retarget(&mut self, index: usize) {
        match self {
            Op::Call(target) | Op::Jump(target) | Op::PushIndex(target) => *target = index,
            _ => {}
        }
    }

    /// The target of a conditional branch cell.
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Op::BranchIfFlag(target) | Op::BranchIfNotFlag(target) | Op::BranchIfUnequal(target) => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// Patch the target of a conditional branch cell.  Returns false for any other cell.
    pub fn patch_branch(&mut self, index: usize) -> bool {
        match self {
            Op::BranchIfFlag(target) | Op::BranchIfNotFlag(target) | Op::BranchIfUnequal(target) => {
                *target = index;
                true
            }
            _ => false,
        }
    }

    /// Does control leave the definition unconditionally after this cell?
    pub fn is_exit(&self) -> bool {
        matches!(self, Op::Return | Op::Jump(_))
    }

    /// The definition name if this is a header cell.
    pub fn header_name(&self) -> Option<&str> {
        match self {
            Op::DefHeader(name) => Some(name),
            _ => None,
        }
    }
}

/// Pretty print the operation, mainly for `pexlst` style listings and debugging.
impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Op::DefHeader(name) => write!(f, "DefHeader         {}", name),
            Op::Call(target) => write!(f, "Call              {}", target),
            Op::Jump(target) => write!(f, "Jump              {}", target),
            Op::Return => write!(f, "Return"),
            Op::PushLiteral(value) => write!(f, "PushLiteral       {}", value.repr()),
            Op::PushIndex(target) => write!(f, "PushIndex         {}", target),
            Op::BranchIfFlag(target) => write!(f, "BranchIfFlag      {}", target),
            Op::BranchIfNotFlag(target) => write!(f, "BranchIfNotFlag   {}", target),
            Op::BranchIfUnequal(target) => write!(f, "BranchIfUnequal   {}", target),
            Op::Primitive(handler) => write!(f, "Primitive         {}", handler),
            Op::BranchTarget => write!(f, "BranchTarget"),
            Op::ReturnToLoop => write!(f, "ReturnToLoop"),
        }
    }
}

/// One cell of the program store, the operation and, when compiled from source, where it came
/// from.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// The location in the source the cell was compiled from.  Cells restored from an image have
    /// none.
    pub location: Option<SourceLocation>,

    /// The operation to perform.
    pub op: Op,
}

impl Cell {
    /// Create a new cell.
    pub fn new(location: Option<SourceLocation>, op: Op) -> Cell {
        Cell { location, op }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.op)
    }
}

/// The program store: one append-only arena of cells addressed by index.  Definitions, volatile
/// top-level code and the return-to-loop cells all live here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramStore {
    cells: Vec<Cell>,
}

impl ProgramStore {
    pub fn new() -> ProgramStore {
        ProgramStore { cells: Vec::new() }
    }

    /// Build a store from restored cells.
    pub fn from_cells(cells: Vec<Cell>) -> ProgramStore {
        ProgramStore { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn last(&self) -> Option<&Cell> {
        self.cells.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Cell> {
        self.cells.last_mut()
    }

    /// Append a cell and return its index.
    pub fn push(&mut self, location: Option<SourceLocation>, op: Op) -> usize {
        self.cells.push(Cell::new(location, op));
        self.cells.len() - 1
    }

    /// Drop every cell at or after the given index.
    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    /// Remove the trailing return-to-loop cell, if the store ends with one.
    pub fn pop_return_to_loop(&mut self) -> bool {
        if matches!(self.cells.last(), Some(Cell { op: Op::ReturnToLoop, .. })) {
            let _ = self.cells.pop();
            true
        } else {
            false
        }
    }

    /// Name of the definition whose header sits at the index.
    pub fn header_name(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|cell| cell.op.header_name())
    }

    /// Index of the nearest header at or before the index, the definition that owns the cell.
    pub fn owner_of(&self, index: usize) -> Option<usize> {
        let end = index.min(self.cells.len().saturating_sub(1));

        (0..=end)
            .rev()
            .find(|&candidate| matches!(self.cells[candidate].op, Op::DefHeader(_)))
    }

    /// Indices of every header cell carrying the name, oldest first.
    pub fn headers_named(&self, name: &str) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.op.header_name() == Some(name))
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ops: Vec<Op>) -> ProgramStore {
        ProgramStore::from_cells(ops.into_iter().map(|op| Cell::new(None, op)).collect())
    }

    #[test]
    fn owner_is_nearest_preceding_header() {
        let store = store(vec![
            Op::DefHeader("a".into()),
            Op::Return,
            Op::DefHeader("b".into()),
            Op::Call(0),
            Op::Return,
        ]);

        assert_eq!(store.owner_of(1), Some(0));
        assert_eq!(store.owner_of(4), Some(2));
        assert_eq!(store.headers_named("b"), vec![2]);
    }

    #[test]
    fn only_trailing_return_to_loop_is_popped() {
        let mut store = store(vec![Op::ReturnToLoop, Op::Return]);

        assert!(!store.pop_return_to_loop());
        store.truncate(1);
        assert!(store.pop_return_to_loop());
        assert!(store.is_empty());
    }

    #[test]
    fn retarget_only_touches_word_references() {
        let mut call = Op::Call(3);
        let mut branch = Op::BranchIfFlag(3);

        call.retarget(9);
        branch.retarget(9);

        assert_eq!(call, Op::Call(9));
        assert_eq!(branch, Op::BranchIfFlag(3));
        assert!(branch.patch_branch(7));
        assert_eq!(branch.branch_target(), Some(7));
    }
}
