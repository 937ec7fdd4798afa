//! Instructions of the SSA IR.
//!
//! An [`Instruction`] is one slot of the [`crate::ssa::Program`] arena. What it does is
//! described by its [`InstKind`], a closed sum type; every consumer matches on it
//! exhaustively instead of asking "is this a call?" at runtime.
//!
//! Instructions come in two flavours:
//!
//! - **Values** produce a result, carry a [`SsaType`] and are referenced by their users
//!   (`Const`, `BinOp`, `Phi`, `Call`, `Parameter`, ...)
//! - **Terminators** end a basic block and transfer control (`Jump`, `If`, `Loop`, `Switch`,
//!   `Return`, `ErrorHandler`). Setting a block's finish flag is their privilege.
//!
//! The operand lists returned by [`InstKind::operands`] are the def-use edges: every operand
//! has the instruction in its user list and the other way round.

use std::collections::BTreeMap;

use crate::{
    diagnostics::SourceRange,
    ssa::{
        BinaryOp, BlockId, BlueprintId, ConstValue, FunctionId, GlobalId, SsaType, UnaryOp,
        ValueId, VariableId,
    },
};

/// How a `Parameter` instruction receives its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    /// A positional argument.
    Normal {
        /// Position in the argument list
        index: usize,
    },

    /// A variable captured from the defining function. Every call site binds it, the
    /// `default` operand holds the value seen when the closure was created.
    FreeValue,
}

/// Root of a parameter-member chain: the object a `ParameterMember` was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRoot {
    /// The positional parameter with this index.
    Parameter(usize),

    /// The free value with this name.
    FreeValue(String),
}

/// Path from a parameter or free value to one of its (nested) members.
///
/// `o.a.b` where `o` is the first parameter is `{ root: Parameter(0), path: [a, b] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberPath {
    /// The object the chain starts at
    pub root: MemberRoot,
    /// Member keys, outermost first
    pub path: Vec<ConstValue>,
}

impl MemberPath {
    /// Returns the path extended by `key`.
    #[must_use]
    pub fn child(&self, key: ConstValue) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        Self {
            root: self.root.clone(),
            path,
        }
    }
}

/// Why an `Undefined` placeholder exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UndefinedKind {
    /// A read found no binding anywhere.
    Value,

    /// A member read on an object without such a member.
    Member,

    /// Declared by the front end without a value (`var x`).
    Declared,
}

/// One arm of a `Switch` terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchLabel {
    /// Value compared against the switch condition
    pub value: ValueId,
    /// Handler block entered on a match
    pub dest: BlockId,
}

/// The closed set of instruction kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// A constant.
    Const(ConstValue),

    /// Placeholder for a value that could not be resolved.
    Undefined {
        /// Variable or member name the placeholder stands for
        name: String,
        /// Why the placeholder was created
        kind: UndefinedKind,
    },

    /// A positional parameter or a free value.
    Parameter {
        /// Parameter name
        name: String,
        /// How the value is passed in
        kind: ParameterKind,
        /// Definition-time value of a free value
        default: Option<ValueId>,
    },

    /// A member of a parameter or a free value, observed inside the callee.
    ParameterMember {
        /// Verbose name, e.g. `o.x`
        name: String,
        /// Where the member is reached from
        member: MemberPath,
    },

    /// `lhs op rhs`
    BinOp {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },

    /// `op operand`
    UnOp {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: ValueId,
    },

    /// A call. Free values of the callee are bound in `binding`, the values of its side
    /// effects after the call are recorded in `side_effects`.
    Call {
        /// Called value
        method: ValueId,
        /// Positional arguments
        args: Vec<ValueId>,
        /// Free value name to bound value
        binding: BTreeMap<String, ValueId>,
        /// Verbose side effect name to `SideEffect` value
        side_effects: BTreeMap<String, ValueId>,
    },

    /// Merge of one value per predecessor, in predecessor order.
    Phi {
        /// Incoming values
        edges: Vec<ValueId>,
    },

    /// The new version of a name after a call which may have changed it.
    SideEffect {
        /// Verbose name of the changed variable or member
        name: String,
        /// Call producing the change
        call: ValueId,
        /// Value inside the callee at its returns, when it is known
        modified: Option<ValueId>,
    },

    /// Read of `object.key`.
    Field {
        /// Object read from
        object: ValueId,
        /// Member key
        key: ValueId,
    },

    /// Write of `object.key = value`.
    Update {
        /// Object written to
        object: ValueId,
        /// Member key
        key: ValueId,
        /// New member value
        value: ValueId,
    },

    /// Object construction, optionally an instance of a blueprint.
    Make {
        /// Blueprint of the new object
        blueprint: Option<BlueprintId>,
    },

    /// A function used as a value (closure creation, method reference).
    Function(FunctionId),

    /// A binding provided by the host environment.
    Extern {
        /// Host name
        name: String,
    },

    /// Conversion of `value` to the type of the instruction.
    TypeCast {
        /// Converted value
        value: ValueId,
    },

    /// A type used as a value, e.g. the operand of `new` or `make`.
    TypeValue(SsaType),

    /// `assert cond, message`
    Assert {
        /// Asserted condition
        cond: ValueId,
        /// Message value, if the source gives one
        message: Option<ValueId>,
        /// Message text as written in the source
        text: String,
    },

    /// Raises `info` as an error.
    Panic {
        /// Raised value
        info: ValueId,
    },

    /// The error currently being raised, taken over inside a deferred statement.
    Recover,

    /// One step of a range-style iteration. The members `key`, `field` and `ok` of the
    /// result are the current key, the current element and whether a step was made.
    Next {
        /// Iterated value
        iter: ValueId,
        /// `for x in iter` rather than `for k, v = range iter`
        is_in: bool,
    },

    /// The error caught by a `catch` clause.
    ErrorCatch {
        /// The `ErrorHandler` terminator the catch belongs to
        handler: ValueId,
        /// Name the error is bound to
        name: String,
    },

    /// Unconditional jump.
    Jump {
        /// Target block
        to: BlockId,
    },

    /// Two way branch.
    If {
        /// Condition
        cond: ValueId,
        /// Taken when the condition holds
        on_true: BlockId,
        /// Taken otherwise
        on_false: BlockId,
    },

    /// Loop header branch.
    Loop {
        /// Loop condition
        cond: ValueId,
        /// First block of the body
        body: BlockId,
        /// Block after the loop
        exit: BlockId,
    },

    /// Multi way branch.
    Switch {
        /// Value compared against the labels
        cond: ValueId,
        /// Taken when no label matches
        default: BlockId,
        /// Case labels
        labels: Vec<SwitchLabel>,
    },

    /// Function return.
    Return {
        /// Returned values
        results: Vec<ValueId>,
    },

    /// Entry of a `try` statement.
    ErrorHandler {
        /// Protected block
        try_block: BlockId,
        /// One block per `catch` clause
        catches: Vec<BlockId>,
        /// Optional `finally` block
        finally: Option<BlockId>,
        /// Block after the statement
        done: BlockId,
    },
}

impl InstKind {
    /// Returns the values this instruction uses, in operand order.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Self::Const(_)
            | Self::Undefined { .. }
            | Self::ParameterMember { .. }
            | Self::Make { .. }
            | Self::Function(_)
            | Self::Extern { .. }
            | Self::TypeValue(_)
            | Self::Recover
            | Self::ErrorCatch { .. }
            | Self::Jump { .. }
            | Self::ErrorHandler { .. } => Vec::new(),
            Self::Parameter { default, .. } => default.iter().copied().collect(),
            Self::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::UnOp { operand, .. } => vec![*operand],
            Self::Call {
                method,
                args,
                binding,
                ..
            } => std::iter::once(*method)
                .chain(args.iter().copied())
                .chain(binding.values().copied())
                .collect(),
            Self::Phi { edges } => edges.clone(),
            Self::SideEffect { call, .. } => vec![*call],
            Self::Field { object, key } => vec![*object, *key],
            Self::Update { object, key, value } => vec![*object, *key, *value],
            Self::TypeCast { value } => vec![*value],
            Self::Assert { cond, message, .. } => {
                std::iter::once(*cond).chain(message.iter().copied()).collect()
            }
            Self::Panic { info } => vec![*info],
            Self::Next { iter, .. } => vec![*iter],
            Self::If { cond, .. } | Self::Loop { cond, .. } => vec![*cond],
            Self::Switch { cond, labels, .. } => std::iter::once(*cond)
                .chain(labels.iter().map(|l| l.value))
                .collect(),
            Self::Return { results } => results.clone(),
        }
    }

    /// Replaces every operand slot equal to `from` by `to`, returns `true` if any slot
    /// changed.
    pub fn replace_operand(&mut self, from: ValueId, to: ValueId) -> bool {
        let mut changed = false;
        let mut swap = |slot: &mut ValueId| {
            if *slot == from {
                *slot = to;
                changed = true;
            }
        };

        match self {
            Self::Const(_)
            | Self::Undefined { .. }
            | Self::ParameterMember { .. }
            | Self::Make { .. }
            | Self::Function(_)
            | Self::Extern { .. }
            | Self::TypeValue(_)
            | Self::Recover
            | Self::ErrorCatch { .. }
            | Self::Jump { .. }
            | Self::ErrorHandler { .. } => {}
            Self::Parameter { default, .. } => {
                if let Some(slot) = default {
                    swap(slot);
                }
            }
            Self::BinOp { lhs, rhs, .. } => {
                swap(lhs);
                swap(rhs);
            }
            Self::UnOp { operand, .. } => swap(operand),
            Self::Call {
                method,
                args,
                binding,
                ..
            } => {
                swap(method);
                args.iter_mut().for_each(&mut swap);
                binding.values_mut().for_each(&mut swap);
            }
            Self::Phi { edges } => edges.iter_mut().for_each(&mut swap),
            Self::SideEffect { call, .. } => swap(call),
            Self::Field { object, key } => {
                swap(object);
                swap(key);
            }
            Self::Update { object, key, value } => {
                swap(object);
                swap(key);
                swap(value);
            }
            Self::TypeCast { value } => swap(value),
            Self::Assert { cond, message, .. } => {
                swap(cond);
                if let Some(slot) = message {
                    swap(slot);
                }
            }
            Self::Panic { info } => swap(info),
            Self::Next { iter, .. } => swap(iter),
            Self::If { cond, .. } | Self::Loop { cond, .. } => swap(cond),
            Self::Switch { cond, labels, .. } => {
                swap(cond);
                labels.iter_mut().for_each(|l| swap(&mut l.value));
            }
            Self::Return { results } => results.iter_mut().for_each(&mut swap),
        }

        changed
    }

    /// Returns `true` for block terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. }
                | Self::If { .. }
                | Self::Loop { .. }
                | Self::Switch { .. }
                | Self::Return { .. }
                | Self::ErrorHandler { .. }
        )
    }

    /// Returns `true` for instructions producing a value.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        !self.is_terminator()
    }

    /// Returns `true` for phi nodes.
    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    /// Returns the constant carried by a `Const` instruction.
    #[must_use]
    pub const fn as_const(&self) -> Option<&ConstValue> {
        match self {
            Self::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for `Undefined` placeholders.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined { .. })
    }

    /// Blocks a terminator transfers control to, without duplicates, in edge order.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        let mut targets = match self {
            Self::Jump { to } => vec![*to],
            Self::If {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Self::Loop { body, exit, .. } => vec![*body, *exit],
            Self::Switch {
                default, labels, ..
            } => labels
                .iter()
                .map(|l| l.dest)
                .chain(std::iter::once(*default))
                .collect(),
            Self::ErrorHandler {
                try_block, catches, ..
            } => std::iter::once(*try_block)
                .chain(catches.iter().copied())
                .collect(),
            _ => Vec::new(),
        };
        let mut seen = Vec::with_capacity(targets.len());
        targets.retain(|b| {
            if seen.contains(b) {
                false
            } else {
                seen.push(*b);
                true
            }
        });
        targets
    }

    /// Short lowercase name of the instruction kind.
    #[must_use]
    pub const fn opcode(&self) -> &'static str {
        match self {
            Self::Const(_) => "const",
            Self::Undefined { .. } => "undefined",
            Self::Parameter { .. } => "param",
            Self::ParameterMember { .. } => "param_member",
            Self::BinOp { .. } => "binop",
            Self::UnOp { .. } => "unop",
            Self::Call { .. } => "call",
            Self::Phi { .. } => "phi",
            Self::SideEffect { .. } => "side_effect",
            Self::Field { .. } => "field",
            Self::Update { .. } => "update",
            Self::Make { .. } => "make",
            Self::Function(_) => "function",
            Self::Extern { .. } => "extern",
            Self::TypeCast { .. } => "type_cast",
            Self::TypeValue(_) => "type_value",
            Self::Assert { .. } => "assert",
            Self::Panic { .. } => "panic",
            Self::Recover => "recover",
            Self::Next { .. } => "next",
            Self::ErrorCatch { .. } => "error_catch",
            Self::Jump { .. } => "jump",
            Self::If { .. } => "if",
            Self::Loop { .. } => "loop",
            Self::Switch { .. } => "switch",
            Self::Return { .. } => "return",
            Self::ErrorHandler { .. } => "error_handler",
        }
    }
}

/// One slot of the instruction arena.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub(crate) id: ValueId,
    pub(crate) global_id: GlobalId,
    pub(crate) kind: InstKind,
    pub(crate) block: BlockId,
    pub(crate) function: FunctionId,
    pub(crate) ty: SsaType,
    pub(crate) name: Option<String>,
    pub(crate) range: Option<SourceRange>,
    pub(crate) users: Vec<ValueId>,
    /// Object this value is a member of
    pub(crate) object: Option<ValueId>,
    /// Key under which this value is a member of `object`
    pub(crate) key: Option<ValueId>,
    /// Members of this value: (key, member value)
    pub(crate) members: Vec<(ValueId, ValueId)>,
    /// Variable versions currently bound to this value
    pub(crate) variables: Vec<VariableId>,
}

impl Instruction {
    pub(crate) fn new(
        id: ValueId,
        global_id: GlobalId,
        kind: InstKind,
        block: BlockId,
        function: FunctionId,
        ty: SsaType,
    ) -> Self {
        Self {
            id,
            global_id,
            kind,
            block,
            function,
            ty,
            name: None,
            range: None,
            users: Vec::new(),
            object: None,
            key: None,
            members: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Arena id
    #[must_use]
    pub fn id(&self) -> ValueId {
        self.id
    }

    /// Globally unique id
    #[must_use]
    pub fn global_id(&self) -> GlobalId {
        self.global_id
    }

    /// Instruction kind
    #[must_use]
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Owning block. Parameters, free values and externs are owned by the entry block
    /// without being part of its instruction list.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Owning function
    #[must_use]
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Static type
    #[must_use]
    pub fn ty(&self) -> &SsaType {
        &self.ty
    }

    /// Name of the first variable this value was bound to
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Source range the builder was at when the instruction was emitted
    #[must_use]
    pub fn range(&self) -> Option<SourceRange> {
        self.range
    }

    /// Instructions using this value
    #[must_use]
    pub fn users(&self) -> &[ValueId] {
        &self.users
    }

    /// Values used by this instruction
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        self.kind.operands()
    }

    /// Object this value is a member of
    #[must_use]
    pub fn object(&self) -> Option<ValueId> {
        self.object
    }

    /// Member key of this value inside [`Instruction::object`]
    #[must_use]
    pub fn key(&self) -> Option<ValueId> {
        self.key
    }

    /// Members of this value as (key, member) pairs
    #[must_use]
    pub fn members(&self) -> &[(ValueId, ValueId)] {
        &self.members
    }

    /// Variable versions bound to this value
    #[must_use]
    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    /// Returns `true` for values with users.
    #[must_use]
    pub fn has_users(&self) -> bool {
        self.users.iter().any(|u| *u != self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> ValueId {
        ValueId::new(i)
    }

    #[test]
    fn test_operands_call() {
        let mut binding = BTreeMap::new();
        binding.insert("ca".to_string(), v(9));
        let call = InstKind::Call {
            method: v(1),
            args: vec![v(2), v(3)],
            binding,
            side_effects: BTreeMap::new(),
        };
        assert_eq!(call.operands(), vec![v(1), v(2), v(3), v(9)]);
    }

    #[test]
    fn test_replace_operand() {
        let mut phi = InstKind::Phi {
            edges: vec![v(1), v(2), v(1)],
        };
        assert!(phi.replace_operand(v(1), v(7)));
        assert_eq!(phi.operands(), vec![v(7), v(2), v(7)]);
        assert!(!phi.replace_operand(v(1), v(8)));

        let mut update = InstKind::Update {
            object: v(4),
            key: v(5),
            value: v(4),
        };
        assert!(update.replace_operand(v(4), v(6)));
        assert_eq!(update.operands(), vec![v(6), v(5), v(6)]);
    }

    #[test]
    fn test_operands_assert_and_next() {
        let assert = InstKind::Assert {
            cond: v(1),
            message: Some(v(2)),
            text: "x > 0".into(),
        };
        assert_eq!(assert.operands(), vec![v(1), v(2)]);
        assert!(assert.is_value());

        let mut next = InstKind::Next {
            iter: v(3),
            is_in: false,
        };
        assert!(next.replace_operand(v(3), v(4)));
        assert_eq!(next.operands(), vec![v(4)]);
        assert_eq!(next.opcode(), "next");
        assert!(InstKind::Recover.operands().is_empty());
        assert!(InstKind::TypeValue(SsaType::Number).successors().is_empty());
    }

    #[test]
    fn test_terminators() {
        let jump = InstKind::Jump { to: BlockId::new(1) };
        assert!(jump.is_terminator());
        assert!(!jump.is_value());
        assert!(InstKind::Const(ConstValue::Int(1)).is_value());
        assert!(InstKind::Return { results: vec![] }.is_terminator());
    }

    #[test]
    fn test_successors_deduplicated() {
        let switch = InstKind::Switch {
            cond: v(0),
            default: BlockId::new(3),
            labels: vec![
                SwitchLabel {
                    value: v(1),
                    dest: BlockId::new(1),
                },
                SwitchLabel {
                    value: v(2),
                    dest: BlockId::new(1),
                },
                SwitchLabel {
                    value: v(3),
                    dest: BlockId::new(2),
                },
            ],
        };
        assert_eq!(
            switch.successors(),
            vec![BlockId::new(1), BlockId::new(2), BlockId::new(3)]
        );
    }

    #[test]
    fn test_member_path_child() {
        let root = MemberPath {
            root: MemberRoot::Parameter(0),
            path: vec![],
        };
        let child = root.child(ConstValue::from("a")).child(ConstValue::from("b"));
        assert_eq!(child.root, MemberRoot::Parameter(0));
        assert_eq!(child.path.len(), 2);
    }
}
