//! Functions and closures.
//!
//! A [`Function`] owns its blocks, its parameters and free values, the side effects calling
//! it may have, and the diagnostics found while building it. Closures additionally remember
//! the [`CaptureSite`] they were created at: the block, lexical scope and bindings of the
//! defining function at that moment. Free values are resolved against that snapshot, so a
//! closure whose body is built long after its definition still sees definition-time values.

use std::{collections::HashMap, fmt};

use crate::{
    diagnostics::Diagnostics,
    ssa::{BlockId, FunctionId, MemberPath, ScopeId, SsaType, SymbolId, ValueId, VariableId},
};

/// Kind of a closure side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SideEffectKind {
    /// The closure assigns a captured variable.
    Value,

    /// The closure assigns a member of a parameter or captured object.
    Pointer,
}

/// A mutation a call of the function has on state visible to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSideEffect {
    /// Verbose name: the variable name, or `o.x` for a member
    pub name: String,
    /// Value or member mutation
    pub kind: SideEffectKind,
    /// For member mutations, where the member is reached from
    pub member: Option<MemberPath>,
    /// Value inside the function at its returns, when all returns agree
    pub modified: Option<ValueId>,
    /// Symbol the mutation is written to inside the function
    pub(crate) symbol: Option<SymbolId>,
}

/// Signature computed when a function is finished.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionType {
    /// Parameter types, without the receiver of methods
    pub params: Vec<SsaType>,
    /// Return type, a tuple for multiple results
    pub returns: SsaType,
    /// Names of the free values, in creation order
    pub free_values: Vec<String>,
    /// Verbose names of the side effects
    pub side_effects: Vec<String>,
    /// Whether the function is a method
    pub is_method: bool,
    /// Whether the last parameter collects extra arguments
    pub variadic: bool,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if self.variadic && i + 1 == self.params.len() {
                write!(f, "...")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// Where a closure was created inside its defining function.
#[derive(Debug, Clone)]
pub struct CaptureSite {
    /// Defining function
    pub function: FunctionId,
    /// Block that was current at creation
    pub block: BlockId,
    /// Lexical scope that was current at creation
    pub scope: ScopeId,
    /// Bindings written in `block` before the closure was created
    pub defs: HashMap<SymbolId, VariableId>,
}

/// A function or closure.
#[derive(Debug)]
pub struct Function {
    pub(crate) id: FunctionId,
    pub(crate) name: String,
    pub(crate) parent: Option<FunctionId>,
    pub(crate) children: Vec<FunctionId>,
    pub(crate) blocks: Vec<BlockId>,
    pub(crate) entry: BlockId,
    pub(crate) exit: Option<BlockId>,
    pub(crate) defer: Option<BlockId>,
    pub(crate) root_scope: ScopeId,
    pub(crate) params: Vec<ValueId>,
    pub(crate) free_values: Vec<(String, ValueId)>,
    pub(crate) parameter_members: Vec<(String, ValueId)>,
    pub(crate) externs: HashMap<String, ValueId>,
    pub(crate) side_effects: Vec<FunctionSideEffect>,
    pub(crate) returns: Vec<ValueId>,
    pub(crate) capture: Option<CaptureSite>,
    pub(crate) value: Option<ValueId>,
    pub(crate) ty: Option<FunctionType>,
    pub(crate) is_method: bool,
    pub(crate) variadic: bool,
    pub(crate) finished: bool,
    pub(crate) diagnostics: Diagnostics,
}

impl Function {
    pub(crate) fn new(
        id: FunctionId,
        name: impl Into<String>,
        parent: Option<FunctionId>,
        entry: BlockId,
        root_scope: ScopeId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            children: Vec::new(),
            blocks: Vec::new(),
            entry,
            exit: None,
            defer: None,
            root_scope,
            params: Vec::new(),
            free_values: Vec::new(),
            parameter_members: Vec::new(),
            externs: HashMap::new(),
            side_effects: Vec::new(),
            returns: Vec::new(),
            capture: None,
            value: None,
            ty: None,
            is_method: false,
            variadic: false,
            finished: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Returns the function id.
    #[must_use]
    pub const fn id(&self) -> FunctionId {
        self.id
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the defining function of a closure.
    #[must_use]
    pub const fn parent(&self) -> Option<FunctionId> {
        self.parent
    }

    /// Returns the closures defined inside this function.
    #[must_use]
    pub fn children(&self) -> &[FunctionId] {
        &self.children
    }

    /// Returns all blocks in creation order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Returns the entry block.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        self.entry
    }

    /// Returns the block that was current when the function was finished.
    #[must_use]
    pub const fn exit(&self) -> Option<BlockId> {
        self.exit
    }

    /// Returns the block holding deferred statements.
    #[must_use]
    pub const fn defer_block(&self) -> Option<BlockId> {
        self.defer
    }

    /// Returns the root lexical scope.
    #[must_use]
    pub const fn root_scope(&self) -> ScopeId {
        self.root_scope
    }

    /// Returns the positional parameters (receiver first for methods).
    #[must_use]
    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    /// Returns the free values as (name, parameter) pairs, in creation order.
    #[must_use]
    pub fn free_values(&self) -> &[(String, ValueId)] {
        &self.free_values
    }

    /// Returns the free value captured under `name`.
    #[must_use]
    pub fn free_value(&self, name: &str) -> Option<ValueId> {
        self.free_values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Returns the parameter members as (verbose name, value) pairs.
    #[must_use]
    pub fn parameter_members(&self) -> &[(String, ValueId)] {
        &self.parameter_members
    }

    pub(crate) fn parameter_member(&self, name: &str) -> Option<ValueId> {
        self.parameter_members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Returns the side effects calling this function has.
    #[must_use]
    pub fn side_effects(&self) -> &[FunctionSideEffect] {
        &self.side_effects
    }

    /// Returns the side effect registered under `name`.
    #[must_use]
    pub fn side_effect(&self, name: &str) -> Option<&FunctionSideEffect> {
        self.side_effects.iter().find(|s| s.name == name)
    }

    /// Returns the `Return` instructions.
    #[must_use]
    pub fn returns(&self) -> &[ValueId] {
        &self.returns
    }

    /// Returns where a closure was created.
    #[must_use]
    pub const fn capture(&self) -> Option<&CaptureSite> {
        self.capture.as_ref()
    }

    /// Returns the `Function` value created for this closure in its parent.
    #[must_use]
    pub const fn value(&self) -> Option<ValueId> {
        self.value
    }

    /// Returns the signature, available once the function is finished.
    #[must_use]
    pub const fn ty(&self) -> Option<&FunctionType> {
        self.ty.as_ref()
    }

    /// Returns `true` for methods (the first parameter is the receiver).
    #[must_use]
    pub const fn is_method(&self) -> bool {
        self.is_method
    }

    /// Returns `true` if the last parameter collects extra arguments.
    #[must_use]
    pub const fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Returns `true` once the function is finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the diagnostics recorded while building.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of arguments a caller has to pass.
    #[must_use]
    pub fn arity(&self) -> usize {
        if self.is_method {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_type_display() {
        let ty = FunctionType {
            params: vec![SsaType::Number, SsaType::String],
            returns: SsaType::Boolean,
            variadic: true,
            ..FunctionType::default()
        };
        assert_eq!(ty.to_string(), "(number, ...string) -> boolean");
    }

    #[test]
    fn test_arity() {
        let mut function = Function::new(
            FunctionId::new(0),
            "m",
            None,
            BlockId::new(0),
            ScopeId::new(0),
        );
        function.params = vec![ValueId::new(0), ValueId::new(1)];
        assert_eq!(function.arity(), 2);
        function.is_method = true;
        assert_eq!(function.arity(), 1);
    }

    #[test]
    fn test_free_value_lookup() {
        let mut function = Function::new(
            FunctionId::new(1),
            "closure",
            Some(FunctionId::new(0)),
            BlockId::new(3),
            ScopeId::new(2),
        );
        function.free_values.push(("ca".into(), ValueId::new(7)));
        assert_eq!(function.free_value("ca"), Some(ValueId::new(7)));
        assert_eq!(function.free_value("cb"), None);
    }
}
