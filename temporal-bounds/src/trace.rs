//! Traces are lassos: a finite prefix of states followed by a loop
//! back into the prefix.  Once expanded, a trace is described by a
//! handful of fixed relations over synthetic state atoms; the formula
//! translator refers to the very same relations, so they are
//! process-wide singletons.
//!
//! `TraceParams` is the user-facing knob set for the expansion.  It
//! deserialises from TOML, e.g.
//!
//! ```toml
//! states = 4
//! unrolls = 2
//! force_loop = false
//! encoding = "multi_unroll"
//! ```
use crate::BoundsError;
use crate::Relation;
use serde::Deserialize;
use serde::Serialize;
use std::sync::OnceLock;

/// Prefix for state atoms.
pub const STATE_ATOM: &str = "Time";
/// Prefix for unroll-level atoms (single-unroll encoding).
pub const LEVEL_ATOM: &str = "Level";
/// Separates the state and unroll indices of a multi-unroll atom.
pub const STATE_SEP: &str = "_";

/// The relations that describe the shape of an expanded trace.
pub struct TraceRelations {
    /// The initial state.
    pub first: Relation,
    /// The final state(s) of the prefix.
    pub last: Relation,
    /// The last state of the first unroll (multi-unroll only).
    pub last_: Relation,
    /// Every state in the trace.
    pub state: Relation,
    /// Successor relation between states.
    pub prefix: Relation,
    /// Candidate targets for the loop back edge.
    pub loop_: Relation,
    /// Unroll levels (single-unroll only).
    pub level: Relation,
    pub l_first: Relation,
    pub l_last: Relation,
    pub l_prefix: Relation,
    /// Maps every unrolled copy of a state to its unroll-0
    /// representative (multi-unroll with more than one unroll).
    pub unroll_map: Relation,
}

impl TraceRelations {
    #[must_use]
    pub fn get() -> &'static TraceRelations {
        static RELATIONS: OnceLock<TraceRelations> = OnceLock::new();

        RELATIONS.get_or_init(|| TraceRelations {
            first: Relation::unary("first"),
            last: Relation::unary("last"),
            last_: Relation::unary("last_"),
            state: Relation::unary("State"),
            prefix: Relation::binary("prefix"),
            loop_: Relation::unary("loop"),
            level: Relation::unary("Level"),
            l_first: Relation::unary("l_first"),
            l_last: Relation::unary("l_last"),
            l_prefix: Relation::binary("l_prefix"),
            unroll_map: Relation::binary("unroll_map"),
        })
    }
}

/// The two (mutually exclusive) ways to lay out a trace.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEncoding {
    /// A single chain of `states + 1` states, with a separate chain
    /// of unroll levels.
    SingleUnroll,
    /// `unrolls` copies of a `states`-long chain, where the last
    /// state of each copy may step into any state of the next.
    MultiUnroll,
}

impl Default for TraceEncoding {
    fn default() -> Self {
        TraceEncoding::SingleUnroll
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TraceParams {
    /// Number of distinguished states in the trace.
    pub states: usize,
    /// Number of trace unrolls.
    pub unrolls: usize,
    /// Whether every trace must loop.
    pub force_loop: bool,
    pub encoding: TraceEncoding,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            states: 1,
            unrolls: 1,
            force_loop: false,
            encoding: TraceEncoding::default(),
        }
    }
}

impl TraceParams {
    #[must_use]
    pub fn new(states: usize, unrolls: usize, force_loop: bool, encoding: TraceEncoding) -> Self {
        Self {
            states,
            unrolls,
            force_loop,
            encoding,
        }
    }

    /// Parses and validates parameters from TOML text.  Missing keys
    /// take their default value.
    ///
    /// # Errors
    ///
    /// Returns `Err` for malformed TOML or invalid parameters.
    pub fn from_toml_str(text: &str) -> Result<Self, BoundsError> {
        let params: Self = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// # Errors
    ///
    /// Returns `Err` unless both `states` and `unrolls` are positive.
    pub fn validate(&self) -> Result<(), BoundsError> {
        if self.states < 1 {
            return Err(BoundsError::InvalidTraceParameter {
                name: "states",
                value: self.states,
            });
        }

        if self.unrolls < 1 {
            return Err(BoundsError::InvalidTraceParameter {
                name: "unrolls",
                value: self.unrolls,
            });
        }

        Ok(())
    }
}

#[test]
fn test_trace_relations_are_singletons() {
    let x = TraceRelations::get();
    let y = TraceRelations::get();

    assert_eq!(x.prefix, y.prefix);
    assert_ne!(x.first, x.last);
    assert_eq!(x.unroll_map.arity(), 2);
}

#[test]
fn test_params_from_toml() {
    let params = TraceParams::from_toml_str(
        r#"
        states = 4
        unrolls = 2
        encoding = "multi_unroll"
        "#,
    )
    .expect("ok");

    assert_eq!(
        params,
        TraceParams::new(4, 2, false, TraceEncoding::MultiUnroll)
    );
    assert_eq!(
        TraceParams::from_toml_str("").expect("ok"),
        TraceParams::default()
    );
}

#[test]
fn test_params_validation() {
    assert!(TraceParams::from_toml_str("states = 0").is_err());
    assert!(TraceParams::from_toml_str("unrolls = 0").is_err());
    assert!(TraceParams::from_toml_str("encoding = \"sideways\"").is_err());
    assert!(TraceParams::new(1, 1, true, TraceEncoding::SingleUnroll)
        .validate()
        .is_ok());
}
