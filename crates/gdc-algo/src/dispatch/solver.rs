//! LP backend selection and invocation.
//!
//! The dispatch problem is a pure continuous LP. The default backend is
//! Clarabel (an interior-point solver, compiled in through the
//! `solver-clarabel` feature); HiGHS is available behind `solver-highs`.
//! The first compiled backend from the preference list wins. Wall-clock
//! timeout and the IPM termination-tolerance shift apply to the
//! interior-point backend.

use good_lp::{Constraint, Expression, ProblemVariables, Solution, SolverModel, Variable};

use gdc_core::{GridError, GridResult};

#[cfg(not(any(feature = "solver-clarabel", feature = "solver-highs")))]
compile_error!("at least one LP backend feature (solver-clarabel or solver-highs) must be enabled");

/// Known LP backends, in the order they are tried by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Clarabel,
    Highs,
}

impl SolverKind {
    pub fn id(&self) -> &'static str {
        match self {
            SolverKind::Clarabel => "clarabel",
            SolverKind::Highs => "highs",
        }
    }

    fn is_available(&self) -> bool {
        match self {
            SolverKind::Clarabel => cfg!(feature = "solver-clarabel"),
            SolverKind::Highs => cfg!(feature = "solver-highs"),
        }
    }
}

impl std::str::FromStr for SolverKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clarabel" => Ok(SolverKind::Clarabel),
            "highs" => Ok(SolverKind::Highs),
            other => Err(GridError::Config(format!("unknown LP backend: {other}"))),
        }
    }
}

/// Solver selection and termination knobs.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Backends to try, in order; the first one compiled in is used.
    pub preference: Vec<SolverKind>,
    /// Wall-clock limit for the solve.
    pub timeout_minutes: Option<u64>,
    /// Relax the interior-point termination tolerances by this many orders
    /// of magnitude: the 1e-8 feasibility/gap defaults and the 1e-10
    /// infeasibility defaults get divided by `10^orders`.
    pub shift_ipm_termination_by_orders: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            preference: vec![SolverKind::Clarabel, SolverKind::Highs],
            timeout_minutes: None,
            shift_ipm_termination_by_orders: 0,
        }
    }
}

impl SolverConfig {
    /// The first backend from the preference list that is compiled in.
    pub fn select(&self) -> GridResult<SolverKind> {
        self.preference
            .iter()
            .copied()
            .find(SolverKind::is_available)
            .ok_or_else(|| {
                GridError::Config(
                    "no LP backend available; enable the solver-clarabel or solver-highs feature"
                        .into(),
                )
            })
    }
}

/// A solved LP, owning the backend's solution until the extractor copies
/// the values out.
pub enum SolvedLp {
    #[cfg(feature = "solver-clarabel")]
    Clarabel(good_lp::solvers::clarabel::ClarabelSolution),
    #[cfg(feature = "solver-highs")]
    Highs(good_lp::solvers::highs::HighsSolution),
}

impl std::fmt::Debug for SolvedLp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "solver-clarabel")]
            SolvedLp::Clarabel(_) => f.write_str("SolvedLp::Clarabel(..)"),
            #[cfg(feature = "solver-highs")]
            SolvedLp::Highs(_) => f.write_str("SolvedLp::Highs(..)"),
        }
    }
}

impl SolvedLp {
    pub fn value(&self, variable: Variable) -> f64 {
        match self {
            #[cfg(feature = "solver-clarabel")]
            SolvedLp::Clarabel(solution) => solution.value(variable),
            #[cfg(feature = "solver-highs")]
            SolvedLp::Highs(solution) => solution.value(variable),
        }
    }

    pub fn values(&self, variables: &[Variable]) -> Vec<f64> {
        variables.iter().map(|var| self.value(*var)).collect()
    }
}

/// Minimize the objective subject to the constraints. Non-`Optimal`
/// statuses surface as [`GridError::Infeasible`] with the backend's status
/// string; no recovery is attempted.
pub fn solve_lp(
    variables: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    config: &SolverConfig,
) -> GridResult<SolvedLp> {
    match config.select()? {
        SolverKind::Clarabel => solve_clarabel(variables, objective, constraints, config),
        SolverKind::Highs => solve_highs(variables, objective, constraints, config),
    }
}

#[cfg(feature = "solver-clarabel")]
fn solve_clarabel(
    variables: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    config: &SolverConfig,
) -> GridResult<SolvedLp> {
    let mut problem = variables
        .minimise(objective)
        .using(good_lp::solvers::clarabel::clarabel);
    {
        let settings = problem.settings();
        settings.verbose(false);
        if let Some(minutes) = config.timeout_minutes {
            settings.time_limit(minutes as f64 * 60.0);
        }
        if config.shift_ipm_termination_by_orders > 0 {
            let shift = 10f64.powi(config.shift_ipm_termination_by_orders as i32);
            settings.tol_feas(1e-8 / shift);
            settings.tol_gap_abs(1e-8 / shift);
            settings.tol_gap_rel(1e-8 / shift);
            settings.tol_infeas_abs(1e-10 / shift);
            settings.tol_infeas_rel(1e-10 / shift);
        }
    }
    for constraint in constraints {
        problem.add_constraint(constraint);
    }
    let solution = problem
        .solve()
        .map_err(|err| GridError::Infeasible(err.to_string()))?;
    Ok(SolvedLp::Clarabel(solution))
}

#[cfg(not(feature = "solver-clarabel"))]
fn solve_clarabel(
    _variables: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
    _config: &SolverConfig,
) -> GridResult<SolvedLp> {
    Err(GridError::Config(
        "the solver-clarabel feature is not enabled".into(),
    ))
}

#[cfg(feature = "solver-highs")]
fn solve_highs(
    variables: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    _config: &SolverConfig,
) -> GridResult<SolvedLp> {
    let mut problem = variables
        .minimise(objective)
        .using(good_lp::solvers::highs::highs);
    for constraint in constraints {
        problem.add_constraint(constraint);
    }
    let solution = problem
        .solve()
        .map_err(|err| GridError::Infeasible(err.to_string()))?;
    Ok(SolvedLp::Highs(solution))
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(
    _variables: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
    _config: &SolverConfig,
) -> GridResult<SolvedLp> {
    Err(GridError::Config(
        "the solver-highs feature is not enabled".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{constraint, variable, variables};

    #[test]
    fn test_solver_names() {
        assert_eq!("clarabel".parse::<SolverKind>().unwrap(), SolverKind::Clarabel);
        assert_eq!("HiGHS".parse::<SolverKind>().unwrap(), SolverKind::Highs);
        assert!("mosek".parse::<SolverKind>().is_err());
    }

    #[test]
    fn test_select_prefers_first_available() {
        let config = SolverConfig::default();
        let selected = config.select().unwrap();
        assert_eq!(selected, SolverKind::Clarabel);
    }

    #[test]
    fn test_select_skips_unavailable() {
        let config = SolverConfig {
            preference: vec![SolverKind::Highs, SolverKind::Clarabel],
            ..SolverConfig::default()
        };
        // With only the default feature set, HiGHS is not compiled in.
        let selected = config.select().unwrap();
        if cfg!(feature = "solver-highs") {
            assert_eq!(selected, SolverKind::Highs);
        } else {
            assert_eq!(selected, SolverKind::Clarabel);
        }
    }

    #[test]
    fn test_solve_simple_lp() {
        let mut vars = variables!();
        let x = vars.add(variable().min(0.0).max(10.0));
        let y = vars.add(variable().min(0.0).max(10.0));
        // Minimize 2x + y subject to x + y >= 5.
        let objective = 2.0 * x + y;
        let constraints = vec![constraint!(x + y >= 5.0)];
        let solution = solve_lp(vars, objective, constraints, &SolverConfig::default()).unwrap();
        assert!(solution.value(x).abs() < 1e-4);
        assert!((solution.value(y) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_infeasible_reports_status() {
        let mut vars = variables!();
        let x = vars.add(variable().min(0.0).max(1.0));
        let objective = Expression::from(x);
        let constraints = vec![constraint!(x >= 2.0)];
        let err = solve_lp(vars, objective, constraints, &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, GridError::Infeasible(_)));
    }
}
