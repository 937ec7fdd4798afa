//! The program arena.
//!
//! [`Program`] owns every instruction, block, function, scope, symbol, variable version and
//! blueprint of one compilation unit. All cross references are typed ids into these arenas,
//! which keeps the cyclic value / user graph free of reference cycles while giving O(1)
//! access in both directions.
//!
//! Building goes through [`crate::builder::FunctionBuilder`], obtained from
//! [`Program::function_builder`]. A finished program is read-only for analyses; the
//! name index is a [`DashMap`] so it can be queried through `&Program` from many threads.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use tracing::error;

use crate::{
    diagnostics::{Diagnostic, SourceRange},
    error::Error,
    ssa::{
        blueprint::lookup_member, BasicBlock, BindingOrigin, BlockId, Blueprint, BlueprintId,
        BlueprintMember, CaptureSite, ConstValue, Function, FunctionId, GlobalId, InstKind,
        Instruction, Scope, ScopeId, SsaType, Symbol, SymbolId, SymbolKind, ValueId, Variable,
        VariableId,
    },
    BuildConfig, ProgramContext, Result,
};

/// A call whose callee was not finished when the call was emitted.
#[derive(Debug, Clone)]
pub(crate) struct PendingBinding {
    pub(crate) call: ValueId,
    pub(crate) callee: FunctionId,
    pub(crate) site: CaptureSite,
}

/// One compilation unit in SSA form.
#[derive(Debug)]
pub struct Program {
    name: String,
    context: Arc<ProgramContext>,
    pub(crate) instructions: Vec<Option<Instruction>>,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) functions: Vec<Function>,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) blueprints: Vec<Blueprint>,
    /// Member symbols keyed by the object they belong to
    pub(crate) member_symbols: HashMap<ValueId, Vec<SymbolId>>,
    pub(crate) pending: Vec<PendingBinding>,
    globals: HashMap<GlobalId, ValueId>,
    name_index: DashMap<String, Vec<ValueId>>,
}

impl Program {
    /// Creates an empty program.
    pub fn new(name: impl Into<String>, context: Arc<ProgramContext>) -> Self {
        Self {
            name: name.into(),
            context,
            instructions: Vec::new(),
            blocks: Vec::new(),
            functions: Vec::new(),
            scopes: Vec::new(),
            symbols: Vec::new(),
            variables: Vec::new(),
            blueprints: Vec::new(),
            member_symbols: HashMap::new(),
            pending: Vec::new(),
            globals: HashMap::new(),
            name_index: DashMap::new(),
        }
    }

    /// Returns the program name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<ProgramContext> {
        &self.context
    }

    /// Returns the build configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        self.context.config()
    }

    /// Creates a new function with a sealed, empty entry block.
    ///
    /// Closures are normally created through
    /// [`crate::builder::FunctionBuilder::new_closure`], which also records the capture site.
    pub fn new_function(&mut self, name: &str, parent: Option<FunctionId>) -> FunctionId {
        let id = FunctionId::new(self.functions.len());
        let root_scope = ScopeId::new(self.scopes.len());
        self.scopes.push(Scope::new(root_scope, None, id));

        let entry = BlockId::new(self.blocks.len());
        self.blocks
            .push(BasicBlock::new(entry, "entry", id, root_scope, true));

        let mut function = Function::new(id, name, parent, entry, root_scope);
        function.blocks.push(entry);
        self.functions.push(function);

        if let Some(parent) = parent.and_then(|p| self.functions.get_mut(p.index())) {
            parent.children.push(id);
        }
        id
    }

    /// Creates a new blueprint.
    pub fn new_blueprint(&mut self, name: &str) -> BlueprintId {
        let id = BlueprintId::new(self.blueprints.len());
        self.blueprints.push(Blueprint::new(id, name));
        id
    }

    /// Returns the blueprint with the given id.
    #[must_use]
    pub fn blueprint(&self, id: BlueprintId) -> Option<&Blueprint> {
        self.blueprints.get(id.index())
    }

    /// Returns the blueprint with the given id for modification.
    pub fn blueprint_mut(&mut self, id: BlueprintId) -> Option<&mut Blueprint> {
        self.blueprints.get_mut(id.index())
    }

    /// Resolves `name` on a blueprint and its parents.
    #[must_use]
    pub fn lookup_blueprint_member(&self, id: BlueprintId, name: &str) -> Option<BlueprintMember> {
        lookup_member(&self.blueprints, id, name)
    }

    /// Returns the live instruction with the given id.
    #[must_use]
    pub fn instruction(&self, id: ValueId) -> Option<&Instruction> {
        self.instructions.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the live instruction with the given id, or an error for unknown or deleted ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownValue`] if `id` does not name a live instruction.
    pub fn get_instruction(&self, id: ValueId) -> Result<&Instruction> {
        self.instruction(id).ok_or(Error::UnknownValue(id))
    }

    /// Resolves a globally unique id allocated for one of this program's instructions.
    #[must_use]
    pub fn instruction_by_global(&self, id: GlobalId) -> Option<&Instruction> {
        self.globals.get(&id).and_then(|v| self.instruction(*v))
    }

    /// Iterates over all live instructions.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().flatten()
    }

    /// Returns the constant carried by a `Const` instruction.
    #[must_use]
    pub fn const_value(&self, id: ValueId) -> Option<&ConstValue> {
        self.instruction(id).and_then(|i| i.kind.as_const())
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the function with the given id.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Iterates over all functions.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Returns the first function with the given name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.id)
    }

    /// Returns the scope with the given id.
    #[must_use]
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    /// Returns the symbol with the given id.
    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Returns the variable version with the given id.
    #[must_use]
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Returns every value that was bound to a variable called `name`, in binding order.
    #[must_use]
    pub fn values_by_name(&self, name: &str) -> Vec<ValueId> {
        self.name_index
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns every diagnostic of every function.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.functions
            .iter()
            .flat_map(|f| f.diagnostics.iter().cloned())
            .collect()
    }

    /// Returns `true` if any function recorded an error-level diagnostic.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.functions.iter().any(|f| f.diagnostics.has_errors())
    }

    pub(crate) fn inst(&self, id: ValueId) -> Option<&Instruction> {
        self.instructions.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn inst_mut(&mut self, id: ValueId) -> Option<&mut Instruction> {
        self.instructions.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn is_live(&self, id: ValueId) -> bool {
        self.inst(id).is_some()
    }

    pub(crate) fn kind(&self, id: ValueId) -> Option<&InstKind> {
        self.inst(id).map(|i| &i.kind)
    }

    pub(crate) fn type_of(&self, id: ValueId) -> SsaType {
        self.inst(id).map(|i| i.ty.clone()).unwrap_or_default()
    }

    pub(crate) fn blk(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn blk_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub(crate) fn func(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub(crate) fn func_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub(crate) fn sym(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub(crate) fn var(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    /// Allocates an instruction and records it as a user of its operands.
    ///
    /// Placement inside the block's lists is up to the caller.
    pub(crate) fn alloc_value(
        &mut self,
        kind: InstKind,
        block: BlockId,
        ty: SsaType,
        range: Option<SourceRange>,
    ) -> ValueId {
        let id = ValueId::new(self.instructions.len());
        let global_id = self.context.allocate_id();
        let function = self.blk(block).function;
        let operands = kind.operands();

        let mut inst = Instruction::new(id, global_id, kind, block, function, ty);
        inst.range = range;
        self.instructions.push(Some(inst));
        self.globals.insert(global_id, id);

        for operand in operands {
            if self.is_live(operand) {
                self.add_user(operand, id);
            } else {
                error!(value = %id, operand = %operand, "BUG: operand is not a live instruction");
            }
        }
        id
    }

    pub(crate) fn forget_global(&mut self, id: GlobalId) {
        self.globals.remove(&id);
    }

    pub(crate) fn new_block(
        &mut self,
        function: FunctionId,
        name: &str,
        scope: ScopeId,
        sealed: bool,
    ) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks
            .push(BasicBlock::new(id, name, function, scope, sealed));
        self.func_mut(function).blocks.push(id);
        id
    }

    pub(crate) fn new_scope(&mut self, function: FunctionId, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        self.scopes.push(Scope::new(id, parent, function));
        id
    }

    pub(crate) fn new_symbol(&mut self, scope: ScopeId, name: &str, kind: SymbolKind) -> SymbolId {
        let id = SymbolId::new(self.symbols.len());
        let function = self.scopes[scope.index()].function;
        self.symbols.push(Symbol {
            id,
            name: name.to_string(),
            scope,
            function,
            kind,
            versions: 0,
        });
        self.scopes[scope.index()]
            .symbols
            .insert(name.to_string(), id);
        if let SymbolKind::Member { object, .. } = kind {
            self.member_symbols.entry(object).or_default().push(id);
        }
        id
    }

    /// Looks `name` up in `scope` and its parents.
    pub(crate) fn resolve_symbol(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.index()];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(*symbol);
            }
            current = scope.parent;
        }
        None
    }

    pub(crate) fn new_variable(
        &mut self,
        symbol: SymbolId,
        value: ValueId,
        block: BlockId,
        local: bool,
        origin: BindingOrigin,
        prev: Option<VariableId>,
    ) -> VariableId {
        let id = VariableId::new(self.variables.len());
        let sym = &mut self.symbols[symbol.index()];
        sym.versions += 1;
        let version = sym.versions;

        self.variables.push(Variable {
            id,
            symbol,
            version,
            value,
            block,
            local,
            origin,
            prev,
        });
        if let Some(inst) = self.inst_mut(value) {
            inst.variables.push(id);
        }
        id
    }

    pub(crate) fn index_name(&self, name: &str, value: ValueId) {
        let mut entry = self.name_index.entry(name.to_string()).or_default();
        if !entry.contains(&value) {
            entry.push(value);
        }
    }

    pub(crate) fn rename_in_index(&self, name: &str, from: ValueId, to: ValueId) {
        if let Some(mut entry) = self.name_index.get_mut(name) {
            let values = entry.value_mut();
            if values.contains(&from) {
                values.retain(|v| *v != from);
                if !values.contains(&to) {
                    values.push(to);
                }
            }
        }
    }

    /// Appends the edge `from -> to` to both blocks.
    pub(crate) fn add_succ(&mut self, from: BlockId, to: BlockId) {
        let from_block = self.blk_mut(from);
        if !from_block.succs.contains(&to) {
            from_block.succs.push(to);
        }
        let to_block = self.blk_mut(to);
        if !to_block.preds.contains(&from) {
            to_block.preds.push(from);
        }
    }
}
