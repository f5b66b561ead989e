//! Relations are compared by identity, not by name: two relations
//! called "next" are different unless they come from the same
//! constructor call.
//!
//! A variable relation may take a different value at every state of
//! a trace.  It owns a companion *expanded* relation, with one more
//! column for the state, which is what the expander actually bounds.
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

#[derive(Clone)]
pub struct Relation(Arc<RelationData>);

struct RelationData {
    id: u32,
    name: String,
    arity: usize,
    expanded: Option<Relation>,
}

impl Relation {
    #[must_use]
    pub fn unary(name: &str) -> Self {
        Self::nary(name, 1)
    }

    #[must_use]
    pub fn binary(name: &str) -> Self {
        Self::nary(name, 2)
    }

    /// Returns a fresh static relation.
    ///
    /// # Panics
    ///
    /// Panics if `arity` is 0.
    #[must_use]
    pub fn nary(name: &str, arity: usize) -> Self {
        Self::make(name, arity, None)
    }

    /// Returns a fresh variable relation, along with its (equally
    /// fresh) expanded relation of arity `arity + 1`.
    ///
    /// # Panics
    ///
    /// Panics if `arity` is 0.
    #[must_use]
    pub fn variable(name: &str, arity: usize) -> Self {
        let expanded = Self::nary(name, arity + 1);
        Self::make(name, arity, Some(expanded))
    }

    fn make(name: &str, arity: usize, expanded: Option<Relation>) -> Self {
        assert!(arity > 0, "relations must have a positive arity");
        Self(Arc::new(RelationData {
            id: fresh_id(),
            name: name.into(),
            arity,
            expanded,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.0.expanded.is_some()
    }

    /// Returns the expanded, state-indexed, companion of a variable
    /// relation, and `None` for static relations.
    #[must_use]
    pub fn expanded(&self) -> Option<&Relation> {
        self.0.expanded.as_ref()
    }
}

#[cfg(not(tarpaulin_include))]
fn fresh_id() -> u32 {
    use std::sync::atomic;
    static COUNTER: atomic::AtomicU32 = atomic::AtomicU32::new(1);

    COUNTER.fetch_add(1, atomic::Ordering::Relaxed)
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Relation {}

impl Hash for Relation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}/{}", self.0.name, self.0.id, self.0.arity)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[test]
fn test_identity() {
    let x = Relation::unary("x");
    let y = Relation::unary("x");

    assert_eq!(x, x.clone());
    assert_ne!(x, y);
    assert_eq!(x.name(), y.name());
}

#[test]
fn test_variable() {
    let v = Relation::variable("v", 2);
    let expanded = v.expanded().expect("variable");

    assert!(v.is_variable());
    assert_eq!(expanded.arity(), 3);
    assert!(!expanded.is_variable());
    assert_ne!(&v, expanded);
    assert!(Relation::binary("r").expanded().is_none());
}
