//! The concolic search loop: interpret, account coverage, encode the trace,
//! schedule branch negations, solve, repeat.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::interp::Interpreter;
use crate::load::Target;
use crate::solver::{Branch, Solution, Z3Solver};
use crate::ssa::Module;
use crate::value::{ConcreteValue, Sizing};
use crate::HashSet;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ExecuteOpts {
    pub max_exec: u32,
    pub min_coverage: f64,
}

/// One accepted run: the inputs that produced new coverage, the value the
/// target returned, and whether the run panicked.
#[derive(Debug, Clone)]
pub(crate) struct TestCase {
    pub values: Vec<ConcreteValue>,
    pub ret: Option<ConcreteValue>,
    pub panicked: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ExecuteResult {
    pub coverage: f64,
    pub cases: Vec<TestCase>,
}

/// Runs the search for one target function.
pub(crate) fn execute(
    module: &Module,
    target: &Target,
    opts: &ExecuteOpts,
    sizing: Sizing,
) -> Result<ExecuteResult> {
    let n_blocks = module.func(target.func).blocks.len();
    let mut covered = HashSet::default();
    let mut cases = Vec::new();
    let mut coverage = 0.0;
    let mut solutions: Vec<Solution> = target
        .symbols
        .iter()
        .map(|&v| Solution::Indefinite {
            ty: module.value_ty(v),
        })
        .collect();

    for iter in 0..opts.max_exec {
        // Fresh input vector each iteration; unconstrained symbols fall
        // back to their zero value.
        let values: Vec<ConcreteValue> = solutions
            .iter()
            .map(|s| s.concretize(module, &sizing))
            .collect();

        let rr = Interpreter::new(module, target.func, values.clone(), sizing)
            .run(target.driver)?;
        if !rr.stdout.is_empty() {
            debug!(stdout = %rr.stdout.trim_end(), "captured target output");
        }

        let mut new_covered = 0usize;
        for &iid in &rr.instrs {
            let block = module.instr(iid).block;
            if module.block(block).func == target.func && covered.insert(block) {
                new_covered += 1;
            }
        }
        if new_covered > 0 {
            cases.push(TestCase {
                values,
                ret: rr.ret.clone(),
                panicked: !rr.is_complete(),
            });
        }

        coverage = covered.len() as f64 / n_blocks as f64;
        info!(iter, coverage, "iteration finished");
        if coverage >= opts.min_coverage {
            break;
        }
        // The final iteration's trace has no use; skip the solver call.
        if iter == opts.max_exec - 1 {
            break;
        }

        // Context lives for this iteration only.
        let mut solver = Z3Solver::new(module, sizing);
        solver.load_symbols(&target.symbols);
        solver.load_trace(&rr)?;

        let queue = scheduled_branches(module, solver.branches(), &covered);
        let mut next = None;
        for k in queue {
            match solver.solve(k) {
                Ok(sols) => {
                    next = Some(sols);
                    break;
                }
                Err(Error::Unsat) => {
                    debug!(branch = k, "unsat");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        match next {
            Some(sols) => solutions = sols,
            // No negation was satisfiable; rerunning with the same inputs
            // cannot make progress.
            None => break,
        }
    }

    Ok(ExecuteResult { coverage, cases })
}

/// Orders branch indices for negation: latest-first to stay close to the
/// previous path, with branches leading to uncovered blocks (and every
/// dereference branch) ahead of the already-covered rest.
fn scheduled_branches(
    module: &Module,
    branches: &[Branch],
    covered: &HashSet<crate::ssa::BlockId>,
) -> Vec<usize> {
    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    for k in (0..branches.len()).rev() {
        match branches[k].other_target(module) {
            // Panic branches are always worth retrying.
            None => primary.push(k),
            Some(block) => {
                if covered.contains(&block) {
                    secondary.push(k);
                } else {
                    primary.push(k);
                }
            }
        }
    }
    primary.extend(secondary);
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{BinOp, BlockId, FuncBuilder, InstrKind, IntWidth, Type};

    /// Two nested ifs so the trace carries two branch records.
    fn module_with_two_branches() -> (Module, Vec<Branch>, BlockId, BlockId) {
        let mut m = Module::new("t");
        let i32t = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let mut b = FuncBuilder::new(&mut m, "f", &[("x", i32t)], &[]);
        let b1 = b.block();
        let b2 = b.block();
        let b3 = b.block();
        let done = b.block();
        let x = b.param(0);
        let c0 = b.const_int(i32t, 0);
        let c5 = b.const_int(i32t, 5);
        let cond1 = b.binop(BinOp::Lt, c0, x);
        b.br_if(cond1, b1, done);
        b.switch_to(b1);
        let cond2 = b.binop(BinOp::Lt, x, c5);
        b.br_if(cond2, b2, b3);
        b.switch_to(b2);
        b.jump(done);
        b.switch_to(b3);
        b.jump(done);
        b.switch_to(done);
        b.ret(vec![]);

        let if1 = m.funcs[0]
            .blocks
            .iter()
            .flat_map(|&blk| m.block(blk).instrs.clone())
            .find(|&i| matches!(m.instr(i).kind, InstrKind::If { .. }))
            .unwrap();
        let if2 = m.funcs[0]
            .blocks
            .iter()
            .flat_map(|&blk| m.block(blk).instrs.clone())
            .filter(|&i| matches!(m.instr(i).kind, InstrKind::If { .. }))
            .nth(1)
            .unwrap();
        let branches = vec![
            Branch::If {
                instr: if1,
                direction: true,
            },
            Branch::If {
                instr: if2,
                direction: true,
            },
        ];
        (m, branches, b3, done)
    }

    #[test]
    fn uncovered_targets_are_scheduled_first() {
        let (m, branches, b3, done) = module_with_two_branches();
        let mut covered = HashSet::default();
        // The other target of branch 0 (done) is covered, of branch 1 (b3)
        // is not: branch 1 must be scheduled ahead despite the reversal.
        covered.insert(done);
        let queue = scheduled_branches(&m, &branches, &covered);
        assert_eq!(queue, vec![1, 0]);
        // With both uncovered we keep plain latest-first order.
        let queue = scheduled_branches(&m, &branches, &HashSet::default());
        assert_eq!(queue, vec![1, 0]);
        // With both covered the order is unchanged but everything is
        // secondary.
        let mut covered = HashSet::default();
        covered.insert(done);
        covered.insert(b3);
        let queue = scheduled_branches(&m, &branches, &covered);
        assert_eq!(queue, vec![1, 0]);
    }
}
