use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::runtime::class::Class;
use crate::runtime::function::Function;
use crate::runtime::value::Value;
use crate::runtime::variable::Variable;

/// Lexical scope chain, kept as a stack of frames. Plain block frames are
/// transparent to lookup; a function-boundary frame hides everything
/// between itself and the globals, so function bodies see their locals
/// plus the global frame only. Names are unique within one frame;
/// shadowing across frames is legal.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Frame {
    variables: FxHashMap<String, Variable>,
    functions: FxHashMap<String, Rc<Function>>,
    classes: FxHashMap<String, Rc<Class>>,
    function_boundary: bool,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub(crate) fn push_function_frame(&mut self) {
        self.frames.push(Frame {
            function_boundary: true,
            ..Frame::default()
        });
    }

    pub(crate) fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the global frame");
        self.frames.pop();
    }

    /// Declares into the innermost frame, replacing a same-frame name.
    pub fn define_variable(&mut self, variable: Variable) {
        let frame = self.frames.last_mut().expect("scope has no frames");
        frame.variables.insert(variable.name.clone(), variable);
    }

    pub fn register_function(&mut self, function: Function) {
        let frame = self.frames.last_mut().expect("scope has no frames");
        frame
            .functions
            .insert(function.name.clone(), Rc::new(function));
    }

    pub fn register_class(&mut self, class: Class) {
        let frame = self.frames.last_mut().expect("scope has no frames");
        frame.classes.insert(class.name.clone(), Rc::new(class));
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        for index in self.visible_frames() {
            if let Some(variable) = self.frames[index].variables.get(name) {
                return Some(variable);
            }
        }
        None
    }

    /// Writes through to the innermost visible declaration. Returns false
    /// when the name is not declared anywhere in scope.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> bool {
        for index in self.visible_frames() {
            if let Some(variable) = self.frames[index].variables.get_mut(name) {
                variable.value = value;
                return true;
            }
        }
        false
    }

    /// Assignment semantics: mutate an existing declaration, or declare
    /// implicitly in the innermost frame.
    pub(crate) fn assign(&mut self, name: &str, value: Value) {
        if !self.set(name, value.clone()) {
            self.define_variable(Variable::new(name, value));
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<Rc<Function>> {
        for index in self.visible_frames() {
            if let Some(function) = self.frames[index].functions.get(name) {
                return Some(function.clone());
            }
        }
        None
    }

    pub fn lookup_class(&self, name: &str) -> Option<Rc<Class>> {
        for index in self.visible_frames() {
            if let Some(class) = self.frames[index].classes.get(name) {
                return Some(class.clone());
            }
        }
        None
    }

    /// Frame indices visible from the innermost frame, outermost last:
    /// every frame down to the nearest function boundary, then the globals.
    fn visible_frames(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.frames.len());
        for index in (0..self.frames.len()).rev() {
            indices.push(index);
            if self.frames[index].function_boundary {
                break;
            }
        }
        if indices.last() != Some(&0) {
            indices.push(0);
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_frames_innermost_out() {
        let mut scope = Scope::new();
        scope.define_variable(Variable::new("a", Value::Number(1.0)));
        scope.push();
        scope.define_variable(Variable::new("a", Value::Number(2.0)));

        assert_eq!(scope.get("a").unwrap().value, Value::Number(2.0));
        scope.pop();
        assert_eq!(scope.get("a").unwrap().value, Value::Number(1.0));
    }

    #[test]
    fn assignment_mutates_existing_declaration_in_outer_frame() {
        let mut scope = Scope::new();
        scope.define_variable(Variable::new("a", Value::Number(1.0)));
        scope.push();
        scope.assign("a", Value::Number(5.0));
        scope.pop();
        assert_eq!(scope.get("a").unwrap().value, Value::Number(5.0));
    }

    #[test]
    fn assignment_declares_unknown_names_in_the_innermost_frame() {
        let mut scope = Scope::new();
        scope.push();
        scope.assign("fresh", Value::Boolean(true));
        assert_eq!(scope.get("fresh").unwrap().value, Value::Boolean(true));
        scope.pop();
        assert!(scope.get("fresh").is_none());
    }

    #[test]
    fn function_boundary_hides_intermediate_frames_but_not_globals() {
        let mut scope = Scope::new();
        scope.define_variable(Variable::new("global", Value::Number(1.0)));
        scope.push();
        scope.define_variable(Variable::new("outer_local", Value::Number(2.0)));
        scope.push_function_frame();
        scope.define_variable(Variable::new("local", Value::Number(3.0)));

        assert!(scope.get("local").is_some());
        assert!(scope.get("global").is_some());
        assert!(scope.get("outer_local").is_none());
    }
}
