//! Blueprints: light class / interface descriptors.
//!
//! A blueprint names the methods, declared members and static members of a class-like
//! construct and its parents. Member reads on blueprint instances consult it; a name the
//! blueprint chain does not know is reported as an invalid member.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ssa::{BlueprintId, ConstValue, FunctionId, SsaType};

/// A class / interface descriptor.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub(crate) id: BlueprintId,
    pub(crate) name: String,
    pub(crate) parents: Vec<BlueprintId>,
    pub(crate) methods: HashMap<String, FunctionId>,
    pub(crate) members: HashMap<String, SsaType>,
    pub(crate) static_members: HashMap<String, ConstValue>,
}

/// What a member name resolves to on a blueprint.
#[derive(Debug, Clone, PartialEq)]
pub enum BlueprintMember {
    /// A method implemented by this function.
    Method(FunctionId),

    /// A declared instance member of this type.
    Member(SsaType),

    /// A static member with a constant value.
    Static(ConstValue),
}

impl Blueprint {
    pub(crate) fn new(id: BlueprintId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parents: Vec::new(),
            methods: HashMap::new(),
            members: HashMap::new(),
            static_members: HashMap::new(),
        }
    }

    /// Returns the blueprint id.
    #[must_use]
    pub const fn id(&self) -> BlueprintId {
        self.id
    }

    /// Returns the blueprint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the direct parents.
    #[must_use]
    pub fn parents(&self) -> &[BlueprintId] {
        &self.parents
    }

    /// Adds a parent blueprint.
    pub fn add_parent(&mut self, parent: BlueprintId) {
        if parent != self.id && !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }

    /// Registers a method.
    pub fn add_method(&mut self, name: impl Into<String>, function: FunctionId) {
        self.methods.insert(name.into(), function);
    }

    /// Declares an instance member.
    pub fn add_member(&mut self, name: impl Into<String>, ty: SsaType) {
        self.members.insert(name.into(), ty);
    }

    /// Declares a static member.
    pub fn add_static_member(&mut self, name: impl Into<String>, value: ConstValue) {
        self.static_members.insert(name.into(), value);
    }

    /// Resolves `name` on this blueprint only.
    #[must_use]
    pub fn own_member(&self, name: &str) -> Option<BlueprintMember> {
        if let Some(function) = self.methods.get(name) {
            return Some(BlueprintMember::Method(*function));
        }
        if let Some(ty) = self.members.get(name) {
            return Some(BlueprintMember::Member(ty.clone()));
        }
        self.static_members
            .get(name)
            .map(|value| BlueprintMember::Static(value.clone()))
    }
}

/// Resolves `name` on `start` and, breadth first, on its parents.
pub(crate) fn lookup_member(
    blueprints: &[Blueprint],
    start: BlueprintId,
    name: &str,
) -> Option<BlueprintMember> {
    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let Some(blueprint) = blueprints.get(id.index()) else {
            continue;
        };
        if let Some(member) = blueprint.own_member(name) {
            return Some(member);
        }
        queue.extend(blueprint.parents.iter().copied());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_through_parents() {
        let mut base = Blueprint::new(BlueprintId::new(0), "Base");
        base.add_method("hello", FunctionId::new(4));
        base.add_static_member("VERSION", ConstValue::Int(2));

        let mut derived = Blueprint::new(BlueprintId::new(1), "Derived");
        derived.add_parent(BlueprintId::new(0));
        derived.add_member("count", SsaType::Number);

        let blueprints = vec![base, derived];
        assert_eq!(
            lookup_member(&blueprints, BlueprintId::new(1), "count"),
            Some(BlueprintMember::Member(SsaType::Number))
        );
        assert_eq!(
            lookup_member(&blueprints, BlueprintId::new(1), "hello"),
            Some(BlueprintMember::Method(FunctionId::new(4)))
        );
        assert_eq!(
            lookup_member(&blueprints, BlueprintId::new(1), "VERSION"),
            Some(BlueprintMember::Static(ConstValue::Int(2)))
        );
        assert_eq!(lookup_member(&blueprints, BlueprintId::new(1), "nope"), None);
    }

    #[test]
    fn test_cyclic_parents_terminate() {
        let mut a = Blueprint::new(BlueprintId::new(0), "A");
        let mut b = Blueprint::new(BlueprintId::new(1), "B");
        a.add_parent(BlueprintId::new(1));
        b.add_parent(BlueprintId::new(0));
        a.add_parent(BlueprintId::new(0));
        assert_eq!(a.parents().len(), 1);

        let blueprints = vec![a, b];
        assert_eq!(lookup_member(&blueprints, BlueprintId::new(0), "x"), None);
    }
}
