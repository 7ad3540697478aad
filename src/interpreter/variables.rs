//! Variables and Scopes
//!
//! Values live in a stack of frames. Frame 0 holds globals; every function
//! call pushes a frame for its locals, and `FOO=bar cmd` pushes a temporary
//! frame while `cmd` runs. Lookup walks from the innermost frame outward,
//! which gives shell-style dynamic scope.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

/// A variable's value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Declared but never assigned, e.g. `local x`.
    #[default]
    Undef,
    Str(String),
    /// Indexed array, sparse: only assigned indices are stored.
    BashArray(BTreeMap<usize, String>),
    /// `declare -A`, keys kept in insertion order.
    AssocArray(IndexMap<String, String>),
}

impl Value {
    /// A dense indexed array starting at 0.
    pub fn array(items: impl IntoIterator<Item = String>) -> Value {
        Value::BashArray(items.into_iter().enumerate().collect())
    }

    /// The scalar view: arrays give their first element.
    pub fn as_scalar(&self) -> Option<String> {
        match self {
            Value::Undef => None,
            Value::Str(s) => Some(s.clone()),
            Value::BashArray(items) => items.get(&0).cloned(),
            Value::AssocArray(map) => map.get("0").cloned(),
        }
    }

    /// The elements `${a[@]}` expands to, in order.
    pub fn elements(&self) -> Vec<String> {
        match self {
            Value::Undef => Vec::new(),
            Value::Str(s) => vec![s.clone()],
            Value::BashArray(items) => items.values().cloned().collect(),
            Value::AssocArray(map) => map.values().cloned().collect(),
        }
    }

    /// The keys `${!a[@]}` expands to.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Undef => Vec::new(),
            Value::Str(_) => vec!["0".to_string()],
            Value::BashArray(items) => items.keys().map(|i| i.to_string()).collect(),
            Value::AssocArray(map) => map.keys().cloned().collect(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::BashArray(_) | Value::AssocArray(_))
    }
}

/// One past the highest assigned index; negative subscripts count back
/// from here.
pub fn array_end(items: &BTreeMap<usize, String>) -> i64 {
    items.keys().next_back().map(|&i| i as i64 + 1).unwrap_or(0)
}

/// Resolve a possibly negative subscript against `items`.
pub fn array_index(items: &BTreeMap<usize, String>, index: i64) -> Option<usize> {
    let idx = if index < 0 { array_end(items) + index } else { index };
    usize::try_from(idx).ok()
}

/// A variable slot with its attributes.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub value: Value,
    pub exported: bool,
    pub readonly: bool,
}

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, Cell>,
    /// Holds `FOO=bar` bindings for one command, not locals.
    temp: bool,
}

/// Variable frames and positional parameters.
#[derive(Debug)]
pub struct Mem {
    frames: Vec<Frame>,
    argv_stack: Vec<Vec<String>>,
    pub dollar0: String,
}

/// Why an assignment was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    Readonly(String),
    /// `a[i]=x` on an associative array with a bad key, or an indexed
    /// array with a negative index past the start.
    BadIndex(String),
}

impl std::fmt::Display for AssignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignError::Readonly(name) => write!(f, "{}: readonly variable", name),
            AssignError::BadIndex(msg) => write!(f, "{}", msg),
        }
    }
}

impl Default for Mem {
    fn default() -> Self {
        Self::new("oshell", Vec::new())
    }
}

impl Mem {
    pub fn new(dollar0: &str, argv: Vec<String>) -> Self {
        Self {
            frames: vec![Frame::default()],
            argv_stack: vec![argv],
            dollar0: dollar0.to_string(),
        }
    }

    /// Import the process environment as exported globals.
    pub fn import_environ(&mut self, environ: impl Iterator<Item = (String, String)>) {
        let globals = &mut self.frames[0].vars;
        for (name, value) in environ {
            globals.insert(
                name,
                Cell {
                    value: Value::Str(value),
                    exported: true,
                    readonly: false,
                },
            );
        }
    }

    // ---- frames ----

    pub fn push_call(&mut self, argv: Vec<String>) {
        self.frames.push(Frame::default());
        self.argv_stack.push(argv);
    }

    pub fn pop_call(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
        if self.argv_stack.len() > 1 {
            self.argv_stack.pop();
        }
    }

    /// Bindings for a single command. They are exported to it.
    pub fn push_temp(&mut self, bindings: Vec<(String, String)>) {
        let mut frame = Frame {
            vars: HashMap::new(),
            temp: true,
        };
        for (name, value) in bindings {
            frame.vars.insert(
                name,
                Cell {
                    value: Value::Str(value),
                    exported: true,
                    readonly: false,
                },
            );
        }
        self.frames.push(frame);
    }

    pub fn pop_temp(&mut self) {
        if self.frames.len() > 1 && self.frames.last().map(|f| f.temp).unwrap_or(false) {
            self.frames.pop();
        }
    }

    pub fn in_function(&self) -> bool {
        self.frames.iter().skip(1).any(|f| !f.temp)
    }

    // ---- lookup ----

    pub fn get_cell(&self, name: &str) -> Option<&Cell> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }

    fn get_cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        self.frames.iter_mut().rev().find_map(|f| f.vars.get_mut(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_cell(name).map(|c| &c.value)
    }

    /// Scalar value, `None` when unset.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_scalar)
    }

    pub fn is_set(&self, name: &str) -> bool {
        matches!(self.get(name), Some(v) if *v != Value::Undef)
    }

    // ---- mutation ----

    fn check_writable(&self, name: &str) -> Result<(), AssignError> {
        match self.get_cell(name) {
            Some(c) if c.readonly => Err(AssignError::Readonly(name.to_string())),
            _ => Ok(()),
        }
    }

    /// Assign with dynamic scope: the innermost existing binding is
    /// updated, otherwise a global is created.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), AssignError> {
        self.check_writable(name)?;
        if let Some(cell) = self.get_cell_mut(name) {
            cell.value = value;
            return Ok(());
        }
        self.frames[0].vars.insert(
            name.to_string(),
            Cell {
                value,
                ..Cell::default()
            },
        );
        Ok(())
    }

    pub fn set_str(&mut self, name: &str, value: impl Into<String>) -> Result<(), AssignError> {
        self.set_value(name, Value::Str(value.into()))
    }

    /// `local name[=value]` in the innermost function frame.
    pub fn set_local(&mut self, name: &str, value: Option<Value>) -> Result<(), AssignError> {
        let idx = self
            .frames
            .iter()
            .rposition(|f| !f.temp)
            .unwrap_or(0);
        let frame = &mut self.frames[idx];
        if let Some(cell) = frame.vars.get_mut(name) {
            if cell.readonly {
                return Err(AssignError::Readonly(name.to_string()));
            }
            if let Some(v) = value {
                cell.value = v;
            }
            return Ok(());
        }
        frame.vars.insert(
            name.to_string(),
            Cell {
                value: value.unwrap_or_default(),
                ..Cell::default()
            },
        );
        Ok(())
    }

    /// `a[i]=v` on an indexed array. Scalars become one-element arrays.
    pub fn set_index(&mut self, name: &str, index: i64, value: String) -> Result<(), AssignError> {
        self.check_writable(name)?;
        let mut items = match self.get(name).cloned() {
            Some(Value::BashArray(items)) => items,
            Some(Value::Str(s)) => BTreeMap::from([(0, s)]),
            Some(Value::AssocArray(mut map)) => {
                map.insert(index.to_string(), value);
                return self.set_value(name, Value::AssocArray(map));
            }
            Some(Value::Undef) | None => BTreeMap::new(),
        };
        let Some(idx) = array_index(&items, index) else {
            return Err(AssignError::BadIndex(format!("{}[{}]: bad array subscript", name, index)));
        };
        items.insert(idx, value);
        self.set_value(name, Value::BashArray(items))
    }

    pub fn set_key(&mut self, name: &str, key: String, value: String) -> Result<(), AssignError> {
        self.check_writable(name)?;
        let mut map = match self.get(name).cloned() {
            Some(Value::AssocArray(map)) => map,
            _ => IndexMap::new(),
        };
        map.insert(key, value);
        self.set_value(name, Value::AssocArray(map))
    }

    /// `a+=(x y)`
    pub fn append_items(&mut self, name: &str, new: Vec<String>) -> Result<(), AssignError> {
        self.check_writable(name)?;
        let mut items = match self.get(name).cloned() {
            Some(Value::BashArray(items)) => items,
            Some(Value::Str(s)) => BTreeMap::from([(0, s)]),
            _ => BTreeMap::new(),
        };
        let start = array_end(&items) as usize;
        items.extend(new.into_iter().enumerate().map(|(i, v)| (start + i, v)));
        self.set_value(name, Value::BashArray(items))
    }

    /// Remove the innermost binding.
    pub fn unset(&mut self, name: &str) -> Result<(), AssignError> {
        self.check_writable(name)?;
        for frame in self.frames.iter_mut().rev() {
            if frame.vars.remove(name).is_some() {
                break;
            }
        }
        Ok(())
    }

    pub fn unset_element(&mut self, name: &str, key: &str) -> Result<(), AssignError> {
        self.check_writable(name)?;
        if let Some(cell) = self.get_cell_mut(name) {
            match &mut cell.value {
                Value::BashArray(items) => {
                    if let Some(idx) = key.parse::<i64>().ok().and_then(|i| array_index(items, i)) {
                        items.remove(&idx);
                    }
                }
                Value::AssocArray(map) => {
                    map.shift_remove(key);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Change attributes of a variable, creating an unassigned global
    /// when missing.
    pub fn set_flags(&mut self, name: &str, exported: Option<bool>, readonly: Option<bool>) {
        if self.get_cell(name).is_none() {
            self.frames[0].vars.insert(name.to_string(), Cell::default());
        }
        if let Some(cell) = self.get_cell_mut(name) {
            if let Some(e) = exported {
                cell.exported = e;
            }
            if let Some(r) = readonly {
                cell.readonly = r || cell.readonly;
            }
        }
    }

    /// Visible variables, innermost binding wins, sorted by name.
    pub fn visible(&self) -> Vec<(String, Cell)> {
        let mut seen: HashMap<&str, &Cell> = HashMap::new();
        for frame in self.frames.iter().rev() {
            for (name, cell) in &frame.vars {
                seen.entry(name.as_str()).or_insert(cell);
            }
        }
        let mut out: Vec<(String, Cell)> = seen.into_iter().map(|(n, c)| (n.to_string(), c.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// `NAME=value` pairs for a child process.
    pub fn exported_environ(&self) -> Vec<(String, String)> {
        self.visible()
            .into_iter()
            .filter(|(_, c)| c.exported)
            .filter_map(|(n, c)| c.value.as_scalar().map(|v| (n, v)))
            .collect()
    }

    /// Names starting with `prefix`, for `${!prefix*}`.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.visible()
            .into_iter()
            .filter(|(n, c)| n.starts_with(prefix) && c.value != Value::Undef)
            .map(|(n, _)| n)
            .collect()
    }

    // ---- positional parameters ----

    pub fn argv(&self) -> &[String] {
        self.argv_stack.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_argv(&mut self, argv: Vec<String>) {
        if let Some(top) = self.argv_stack.last_mut() {
            *top = argv;
        }
    }

    /// Drop the first `n` positionals. False if there aren't enough.
    pub fn shift(&mut self, n: usize) -> bool {
        match self.argv_stack.last_mut() {
            Some(top) if n <= top.len() => {
                top.drain(..n);
                true
            }
            _ => false,
        }
    }

    /// `$1`..`${N}`, 1-based. `$0` is handled by the caller.
    pub fn positional(&self, n: usize) -> Option<String> {
        n.checked_sub(1).and_then(|i| self.argv().get(i).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_scope() {
        let mut mem = Mem::default();
        mem.set_str("x", "global").unwrap();
        mem.push_call(vec![]);
        mem.set_local("x", Some(Value::Str("local".into()))).unwrap();
        assert_eq!(mem.get_str("x").as_deref(), Some("local"));
        mem.set_str("x", "changed").unwrap();
        mem.pop_call();
        assert_eq!(mem.get_str("x").as_deref(), Some("global"));
    }

    #[test]
    fn test_assign_creates_global_from_function() {
        let mut mem = Mem::default();
        mem.push_call(vec![]);
        mem.set_str("y", "1").unwrap();
        mem.pop_call();
        assert_eq!(mem.get_str("y").as_deref(), Some("1"));
    }

    #[test]
    fn test_temp_bindings() {
        let mut mem = Mem::default();
        mem.push_temp(vec![("FOO".into(), "bar".into())]);
        assert!(mem.get_cell("FOO").unwrap().exported);
        assert!(!mem.in_function());
        mem.pop_temp();
        assert!(mem.get("FOO").is_none());
    }

    #[test]
    fn test_readonly() {
        let mut mem = Mem::default();
        mem.set_str("r", "1").unwrap();
        mem.set_flags("r", None, Some(true));
        assert_eq!(mem.set_str("r", "2"), Err(AssignError::Readonly("r".into())));
        assert!(mem.unset("r").is_err());
    }

    #[test]
    fn test_sparse_array() {
        let mut mem = Mem::default();
        mem.set_index("a", 3, "d".into()).unwrap();
        mem.set_index("a", 0, "a".into()).unwrap();
        let v = mem.get("a").unwrap();
        assert_eq!(v.elements(), vec!["a", "d"]);
        assert_eq!(v.keys(), vec!["0", "3"]);
        mem.set_index("a", -1, "z".into()).unwrap();
        assert_eq!(mem.get("a").unwrap().elements(), vec!["a", "z"]);
        mem.unset_element("a", "3").unwrap();
        assert_eq!(mem.get("a").unwrap().keys(), vec!["0"]);
    }

    #[test]
    fn test_huge_index_is_sparse() {
        let mut mem = Mem::default();
        mem.set_index("a", 4_000_000_000, "x".into()).unwrap();
        mem.append_items("a", vec!["y".into()]).unwrap();
        let v = mem.get("a").unwrap();
        assert_eq!(v.keys(), vec!["4000000000", "4000000001"]);
        mem.set_index("a", -1, "z".into()).unwrap();
        assert_eq!(mem.get("a").unwrap().elements(), vec!["x", "z"]);
        assert!(mem.set_index("b", -1, "z".into()).is_err());
    }

    #[test]
    fn test_assoc_order() {
        let mut mem = Mem::default();
        mem.set_key("m", "b".into(), "2".into()).unwrap();
        mem.set_key("m", "a".into(), "1".into()).unwrap();
        assert_eq!(mem.get("m").unwrap().keys(), vec!["b", "a"]);
    }

    #[test]
    fn test_positionals() {
        let mut mem = Mem::new("sh", vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(mem.positional(2).as_deref(), Some("b"));
        assert!(mem.shift(2));
        assert_eq!(mem.argv(), &["c".to_string()]);
        assert!(!mem.shift(5));
        mem.push_call(vec!["x".into()]);
        assert_eq!(mem.positional(1).as_deref(), Some("x"));
        mem.pop_call();
        assert_eq!(mem.positional(1).as_deref(), Some("c"));
    }

    #[test]
    fn test_exported_environ() {
        let mut mem = Mem::default();
        mem.import_environ(vec![("HOME".to_string(), "/home/u".to_string())].into_iter());
        mem.set_str("local_only", "x").unwrap();
        let env = mem.exported_environ();
        assert_eq!(env, vec![("HOME".to_string(), "/home/u".to_string())]);
    }
}
