//! Variable table, array table, and the 26-entry DEF-type table that
//! supplies a bare letter's default type.

use crate::error::{GwError, GwResult};
use crate::value::{Value, ValueType};
use std::collections::HashMap;

/// GW-BASIC variable names are significant to their first two
/// characters (`var_entry_t.name[2]` in the original); longer names
/// collapse onto the same slot, matching the interpreter's behavior.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VarName(pub [u8; 2]);

impl VarName {
    pub fn from_str(s: &str) -> VarName {
        let bytes = s.as_bytes();
        let b0 = bytes.first().copied().unwrap_or(b' ').to_ascii_uppercase();
        let b1 = bytes.get(1).copied().unwrap_or(0).to_ascii_uppercase();
        VarName([b0, b1])
    }
}

/// The 26-entry DEF-type table (`DEFINT`/`DEFSNG`/`DEFDBL`/`DEFSTR`),
/// indexed by a variable's first letter. GW-BASIC's factory default is
/// single precision for every letter.
#[derive(Debug, Clone)]
pub struct DefTypeTable {
    table: [ValueType; 26],
}

impl Default for DefTypeTable {
    fn default() -> Self {
        DefTypeTable { table: [ValueType::Sng; 26] }
    }
}

impl DefTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, letter: u8) -> ValueType {
        let idx = letter_index(letter);
        self.table[idx]
    }

    pub fn set_range(&mut self, from: u8, to: u8, t: ValueType) {
        let lo = letter_index(from);
        let hi = letter_index(to);
        for slot in &mut self.table[lo..=hi] {
            *slot = t;
        }
    }
}

fn letter_index(letter: u8) -> usize {
    (letter.to_ascii_uppercase() - b'A') as usize
}

/// Variable table: keyed by (name, type) so `A%` and `A!` coexist as
/// distinct entries even though they share a letter.
#[derive(Debug, Default)]
pub struct VarTable {
    vars: HashMap<(VarName, ValueType), Value>,
}

impl VarTable {
    pub fn new() -> Self {
        VarTable { vars: HashMap::new() }
    }

    pub fn get(&self, name: VarName, t: ValueType) -> Option<&Value> {
        self.vars.get(&(name, t))
    }

    /// Lookup-or-create: returns the current value, creating a
    /// zero/empty default entry first if none exists.
    pub fn get_or_create(&mut self, name: VarName, t: ValueType) -> &Value {
        self.vars.entry((name, t)).or_insert_with(|| Value::default_for(t))
    }

    pub fn assign(&mut self, name: VarName, t: ValueType, val: Value) -> GwResult<()> {
        let coerced = val.coerce(t)?;
        self.vars.insert((name, t), coerced);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarName, ValueType, &Value)> {
        self.vars.iter().map(|(&(name, t), v)| (name, t, v))
    }
}

/// Up to eight dimensions per array (`DIM A(10,10,...)`, matching
/// `array_entry_t.dims[8]`).
pub const MAX_DIMS: usize = 8;

#[derive(Debug, Clone)]
pub struct Array {
    pub dims: Vec<usize>,
    pub elem_type: ValueType,
    elements: Vec<Value>,
    option_base: usize,
}

impl Array {
    fn new(dims: Vec<usize>, elem_type: ValueType, option_base: usize) -> Self {
        let total: usize = dims.iter().product();
        Array { dims, elem_type, elements: vec![Value::default_for(elem_type); total], option_base }
    }

    fn flat_index(&self, indices: &[usize]) -> GwResult<usize> {
        if indices.len() != self.dims.len() {
            return Err(GwError::SubscriptOutOfRange);
        }
        let mut idx = 0usize;
        for (i, &dim) in self.dims.iter().enumerate() {
            let rel = indices[i];
            if rel >= dim {
                return Err(GwError::SubscriptOutOfRange);
            }
            idx = idx * dim + rel;
        }
        Ok(idx)
    }

    pub fn get(&self, indices: &[usize]) -> GwResult<&Value> {
        let idx = self.flat_index(indices)?;
        Ok(&self.elements[idx])
    }

    pub fn set(&mut self, indices: &[usize], value: Value) -> GwResult<()> {
        let idx = self.flat_index(indices)?;
        self.elements[idx] = value.coerce(self.elem_type)?;
        Ok(())
    }

    pub fn option_base(&self) -> usize {
        self.option_base
    }
}

#[derive(Debug, Default)]
pub struct ArrayTable {
    arrays: HashMap<(VarName, ValueType), Array>,
    pub option_base: usize,
}

impl ArrayTable {
    pub fn new() -> Self {
        ArrayTable { arrays: HashMap::new(), option_base: 0 }
    }

    /// `DIM A(n1,n2,...)`; extents are the upper bound given in the
    /// statement, inclusive, so a stored dimension size is
    /// `extent - option_base + 1`. Duplicate Definition if the array
    /// already exists.
    pub fn dim(&mut self, name: VarName, t: ValueType, extents: &[usize]) -> GwResult<()> {
        let key = (name, t);
        if self.arrays.contains_key(&key) {
            return Err(GwError::DuplicateDefinition);
        }
        if extents.len() > MAX_DIMS {
            return Err(GwError::SubscriptOutOfRange);
        }
        let dims: Vec<usize> = extents.iter().map(|&e| e - self.option_base + 1).collect();
        self.arrays.insert(key, Array::new(dims, t, self.option_base));
        Ok(())
    }

    /// Referring to an undeclared array implicitly DIMs it as one
    /// dimension of extent `10 + option_base`.
    pub fn get_or_implicit_dim(&mut self, name: VarName, t: ValueType) -> &mut Array {
        let base = self.option_base;
        self.arrays.entry((name, t)).or_insert_with(|| Array::new(vec![10 + 1], t, base))
    }

    pub fn get(&self, name: VarName, t: ValueType) -> Option<&Array> {
        self.arrays.get(&(name, t))
    }

    pub fn erase(&mut self, name: VarName, t: ValueType) {
        self.arrays.remove(&(name, t));
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
        self.option_base = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_sng_suffixes_coexist() {
        let mut v = VarTable::new();
        let a = VarName::from_str("A");
        v.assign(a, ValueType::Int, Value::Int(1)).unwrap();
        v.assign(a, ValueType::Sng, Value::Sng(2.5)).unwrap();
        assert_eq!(v.get(a, ValueType::Int), Some(&Value::Int(1)));
        assert_eq!(v.get(a, ValueType::Sng), Some(&Value::Sng(2.5)));
    }

    #[test]
    fn dim_rejects_duplicate_definition() {
        let mut a = ArrayTable::new();
        let name = VarName::from_str("A");
        a.dim(name, ValueType::Int, &[10]).unwrap();
        assert_eq!(a.dim(name, ValueType::Int, &[5]), Err(GwError::DuplicateDefinition));
    }

    #[test]
    fn implicit_array_has_extent_ten_plus_option_base() {
        let mut a = ArrayTable::new();
        let name = VarName::from_str("A");
        let arr = a.get_or_implicit_dim(name, ValueType::Int);
        assert_eq!(arr.dims, vec![11]);
    }

    #[test]
    fn out_of_range_subscript_errors() {
        let mut a = ArrayTable::new();
        let name = VarName::from_str("A");
        a.dim(name, ValueType::Int, &[10]).unwrap();
        let arr = a.get(name, ValueType::Int).unwrap();
        assert_eq!(arr.get(&[11]), Err(GwError::SubscriptOutOfRange));
    }

    #[test]
    fn deftype_table_defaults_to_single() {
        let t = DefTypeTable::new();
        assert_eq!(t.get(b'A'), ValueType::Sng);
    }
}
