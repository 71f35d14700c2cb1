mod dataset;
mod value;

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::error::RowError;

pub use self::dataset::{Dataset, Row};
pub use self::value::Value;

/// Name of the automatic row counter.
pub const ITERATION_VAR: &str = "_n_";

#[derive(Debug)]
struct Slot {
    name: String,
    value: Value,
    retained: bool,
}

/// Row environment for one step run.
///
/// Variables live in slots ordered by first appearance, which is also the
/// column order of output rows. Arrays own no storage: an array is a list
/// of member names that `resolve_index` translates an index into.
#[derive(Debug, Default)]
pub struct Environment {
    slots: Vec<Slot>,
    index: FxHashMap<String, usize>,
    arrays: FxHashMap<String, Vec<String>>,
    iteration: u64,
}

/// Names are case-insensitive; keys are stored lowercased.
fn key(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(key(name).as_ref()).copied()
    }

    /// Make a variable known, returning its slot. New variables start missing.
    pub fn declare(&mut self, name: &str) -> usize {
        if let Some(i) = self.slot(name) {
            return i;
        }
        let i = self.slots.len();
        self.slots.push(Slot { name: name.to_string(), value: Value::MISSING, retained: false });
        self.index.insert(key(name).into_owned(), i);
        i
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Current value; unknown variables read as missing.
    pub fn get(&self, name: &str) -> Value {
        match self.slot(name) {
            Some(i) => self.slots[i].value.clone(),
            None if name.eq_ignore_ascii_case(ITERATION_VAR) => {
                Value::from_number(self.iteration as f64)
            }
            None => Value::MISSING,
        }
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        let i = self.declare(name);
        self.slots[i].value = value;
    }

    /// Mark a variable retained, seeding its carried value when an
    /// initializer is given.
    pub fn retain(&mut self, name: &str, initial: Option<Value>) {
        let i = self.declare(name);
        let slot = &mut self.slots[i];
        slot.retained = true;
        if let Some(v) = initial {
            slot.value = v;
        }
    }

    /// Prepare for the next input row: bump `_N_`, reset every
    /// non-retained variable to missing, then bind the row's values.
    pub fn begin_row(&mut self, input: &Row) {
        self.iteration += 1;
        for slot in &mut self.slots {
            if !slot.retained {
                slot.value = slot.value.missing_like();
            }
        }
        for (name, value) in input.iter() {
            self.assign(name, value.clone());
        }
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Bind `name` to an ordered member list. Members become known
    /// variables; re-declaring replaces the previous binding.
    pub fn declare_array(&mut self, name: &str, arity: usize, members: &[String]) {
        debug_assert_eq!(arity, members.len());
        for m in members {
            self.declare(m);
        }
        self.arrays.insert(key(name).into_owned(), members.to_vec());
    }

    /// Translate a 1-based index into the member variable's name.
    pub fn resolve_index(&self, name: &str, index: f64) -> Result<&str, RowError> {
        let members = self
            .arrays
            .get(key(name).as_ref())
            .ok_or_else(|| RowError::UndeclaredArray(name.to_string()))?;
        let i = index.trunc();
        if index.is_nan() || i < 1.0 || i > members.len() as f64 {
            return Err(RowError::IndexOutOfRange {
                array: name.to_string(),
                index,
                arity: members.len(),
            });
        }
        Ok(&members[i as usize - 1])
    }

    /// Variable names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Independent copy of every variable, in slot order.
    pub fn snapshot(&self) -> Row {
        let mut row = Row::new();
        for slot in &self.slots {
            row.set(&slot.name, slot.value.clone());
        }
        row
    }
}
