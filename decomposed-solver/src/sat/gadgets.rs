//! CNF helpers for enumeration.
use cryptominisat::Lbool;
use cryptominisat::Lit;
use cryptominisat::Solver;

/// Returns the literals that hold in `solver`'s current model, one
/// per variable in `vars`.
pub fn model_literals(solver: &Solver, vars: &[Lit]) -> Vec<Lit> {
    let model = solver.get_model();
    vars.iter()
        .map(|var| match model[var.var() as usize] {
            Lbool::True => *var,
            _ => !*var,
        })
        .collect()
}

/// Forbids every assignment where all of `nogood` holds.
pub fn add_nogood(solver: &mut Solver, nogood: &[Lit]) {
    // At least one of the literals must be violated.
    solver.add_clause(&nogood.iter().map(|x| !*x).collect::<Vec<_>>());
}

#[test]
fn test_blocking_enumerates_every_model() {
    let mut solver = Solver::new();
    let vars = [solver.new_var(), solver.new_var()];
    // x or y.
    solver.add_clause(&vars);

    let mut count = 0;
    while solver.solve() == Lbool::True {
        let model = model_literals(&solver, &vars);
        assert!(model.iter().any(|lit| !lit.isneg()));
        add_nogood(&mut solver, &model);
        count += 1;
        assert!(count <= 3);
    }

    assert_eq!(count, 3);
}
