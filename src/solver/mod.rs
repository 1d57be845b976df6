//! Thin typed facade over the Z3 solver plus the trace encoder.
//!
//! One [`Z3Solver`] instance corresponds to one search-loop iteration: it
//! owns the symbol constants, the value-to-term environment built from the
//! linear trace, and the recorded branch decisions. Dropping the instance
//! releases everything; no solver state survives an iteration.

use std::sync::Once;

use z3::ast::{Bool, Datatype, Dynamic, BV};
use z3::{SatResult, Solver, Symbol};

use crate::error::{Error, Result};
use crate::interp::RunResult;
use crate::ssa::{
    BlockId, Builtin, Callee, InstrId, InstrKind, Lit, Module, Type, TypeId, UnOp, ValueData,
    ValueId,
};
use crate::value::{IntValue, Sizing};
use crate::{HashMap, HashSet};

mod branch;
mod datatype;
mod solution;

pub(crate) use branch::Branch;
pub(crate) use datatype::DatatypeDict;
pub(crate) use solution::{Solution, SolutionValue};

static Z3_PARAMS: Once = Once::new();

trait DynamicHelper {
    fn bv(&self) -> BV;
    fn b(&self) -> Bool;
    fn string(&self) -> z3::ast::String;
}

impl DynamicHelper for Dynamic {
    fn bv(&self) -> BV {
        self.as_bv().unwrap()
    }

    fn b(&self) -> Bool {
        self.as_bool().unwrap()
    }

    fn string(&self) -> z3::ast::String {
        self.as_string().unwrap()
    }
}

pub(crate) struct Z3Solver<'m> {
    module: &'m Module,
    sizing: Sizing,
    asts: HashMap<ValueId, Dynamic>,
    datatypes: DatatypeDict,
    branches: Vec<Branch>,
    symbols: Vec<ValueId>,
    /// Pointers that already carry a successful dereference branch.
    known_nonnull: HashSet<ValueId>,
    /// Most recent term stored through each address value.
    stored: HashMap<ValueId, Dynamic>,
}

impl<'m> Z3Solver<'m> {
    pub(crate) fn new(module: &'m Module, sizing: Sizing) -> Self {
        Z3_PARAMS.call_once(|| {
            // Pin the model search for reproducible runs.
            z3::set_global_param("smt.random_seed", "0");
            z3::set_global_param("sat.random_seed", "0");
        });
        z3::Context::thread_local().update_param_value("timeout", "10000");
        Self {
            module,
            sizing,
            asts: HashMap::default(),
            datatypes: DatatypeDict::default(),
            branches: Vec::new(),
            symbols: Vec::new(),
            known_nonnull: HashSet::default(),
            stored: HashMap::default(),
        }
    }

    /// Registers a free constant per symbol. Symbols whose type has no
    /// symbolic encoding are kept in the list but contribute no terms; their
    /// solutions stay indefinite.
    pub(crate) fn load_symbols(&mut self, symbols: &[ValueId]) {
        for (i, &v) in symbols.iter().enumerate() {
            let name = format!("symbol-{i}");
            let ty = self.module.value_ty(v);
            if let Some(ast) = self.symbol_const(&name, ty) {
                self.asts.insert(v, ast);
            }
            self.symbols.push(v);
        }
    }

    fn symbol_const(&mut self, name: &str, ty: TypeId) -> Option<Dynamic> {
        let module = self.module;
        let (rty, t) = module.resolve(ty);
        let sym = Symbol::String(name.to_owned());
        Some(match t {
            Type::Bool => Bool::new_const(sym).into(),
            Type::Int { width, .. } => {
                BV::new_const(sym, width.bits(self.sizing.word_bits)).into()
            }
            Type::Str => z3::ast::String::new_const(sym).into(),
            Type::Pointer(_) | Type::Struct { .. } => {
                let sort = self.datatypes.sort_for(module, &self.sizing, rty)?;
                Datatype::new_const(sym, &sort).into()
            }
            _ => {
                tracing::debug!(name, "symbol type has no symbolic encoding");
                None
            }
        })
    }

    /// Walks the linear trace, building terms for every value the theory can
    /// express and recording branch decisions. Encoding misses are logged
    /// and skipped; only a panic whose cause is not a dereference is an
    /// error.
    pub(crate) fn load_trace(&mut self, rr: &RunResult) -> Result<()> {
        let mut current: Option<BlockId> = None;
        let mut prev: Option<BlockId> = None;
        let mut call_stack: Vec<ValueId> = Vec::new();
        let n = rr.instrs.len();

        for (i, &iid) in rr.instrs.iter().enumerate() {
            let instr = self.module.instr(iid);
            let block = instr.block;
            if current != Some(block) {
                prev = current;
                current = Some(block);
            }
            let kind = instr.kind.clone();
            let faulting = i + 1 == n && !rr.is_complete();
            match kind {
                InstrKind::BinOp { dest, op, x, y } => self.encode_binop(dest, op, x, y),
                InstrKind::UnOp { dest, op, x } => match op {
                    UnOp::Neg | UnOp::Not => self.encode_unop(dest, op, x),
                    // The faulting dereference becomes the terminal branch
                    // below instead of a successful one.
                    UnOp::Deref if !faulting => self.encode_deref(iid, dest, x),
                    UnOp::Deref => {}
                },
                InstrKind::Phi { dest, edges } => {
                    if let Some(prev) = prev {
                        let preds = &self.module.block(block).preds;
                        if let Some(idx) = preds.iter().position(|&p| p == prev) {
                            let edge = edges[idx];
                            if let Some(t) = self.term(edge) {
                                self.asts.insert(dest, t);
                            }
                        }
                    }
                }
                InstrKind::Call { dest, callee, args } => match callee {
                    Callee::Func(f) => {
                        // Only calls whose body shows up next in the trace
                        // bind their formals.
                        let entered = rr.instrs.get(i + 1).is_some_and(|&next| {
                            self.module.block(self.module.instr(next).block).func == f
                        });
                        if entered {
                            let params = self.module.func(f).params.clone();
                            for (&p, &a) in params.iter().zip(&args) {
                                if let Some(t) = self.term(a) {
                                    self.asts.insert(p, t);
                                }
                            }
                            call_stack.push(dest);
                        }
                    }
                    Callee::Builtin(Builtin::Len) => self.encode_len(dest, args[0]),
                    Callee::Builtin(_) => {}
                },
                InstrKind::Return { results } => {
                    if let Some(dest) = call_stack.pop() {
                        if results.len() == 1 {
                            if let Some(t) = self.term(results[0]) {
                                self.asts.insert(dest, t);
                            }
                        }
                    }
                }
                InstrKind::Store { addr, val } => {
                    if let Some(t) = self.term(val) {
                        self.stored.insert(addr, t);
                    }
                }
                InstrKind::If { cond, then_b, .. } => {
                    if self.asts.contains_key(&cond) {
                        if let Some(&next) = rr.instrs.get(i + 1) {
                            let next_block = self.module.instr(next).block;
                            self.branches.push(Branch::If {
                                instr: iid,
                                direction: next_block == then_b,
                            });
                        }
                    } else {
                        tracing::debug!(instr = iid.0, "branch condition has no term; omitted");
                    }
                }
                InstrKind::TypeAssert { dest, x, .. } => {
                    // Symbol constants are already bound to the assert
                    // results; pass other asserts through.
                    if !self.asts.contains_key(&dest) {
                        if let Some(t) = self.term(x) {
                            self.asts.insert(dest, t);
                        }
                    }
                }
                InstrKind::Extract { .. }
                | InstrKind::Alloc { .. }
                | InstrKind::IndexAddr { .. }
                | InstrKind::FieldAddr { .. }
                | InstrKind::Jump { .. } => {}
            }
        }

        if !rr.is_complete() {
            let &last = rr
                .instrs
                .last()
                .ok_or_else(|| Error::Encode("panicked run with an empty trace".into()))?;
            match self.module.instr(last).kind.clone() {
                InstrKind::UnOp {
                    op: UnOp::Deref, x, ..
                } => self.push_failed_deref(last, x),
                InstrKind::FieldAddr { base, .. } => self.push_failed_deref(last, base),
                other => {
                    return Err(Error::Encode(format!(
                        "panic cause is not a dereference: {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn push_failed_deref(&mut self, instr: InstrId, pointer: ValueId) {
        if self.asts.contains_key(&pointer) {
            self.branches.push(Branch::Deref {
                instr,
                success: false,
                pointer,
            });
        } else {
            tracing::debug!(instr = instr.0, "faulting pointer has no term; omitted");
        }
    }

    fn encode_deref(&mut self, iid: InstrId, dest: ValueId, x: ValueId) {
        let module = self.module;
        if let Some(t) = self.stored.get(&x) {
            // A prior store through this address fixed the pointee term.
            let t = t.clone();
            self.asts.insert(dest, t);
        }
        if let Some(p) = self.asts.get(&x).cloned() {
            let ty = module.value_ty(x);
            if let Some(decls) = self.datatypes.pointer(module, &self.sizing, ty) {
                if !self.asts.contains_key(&dest) {
                    self.asts.insert(dest, decls.deref.apply(&[&p]));
                }
                if self.known_nonnull.insert(x) {
                    self.branches.push(Branch::Deref {
                        instr: iid,
                        success: true,
                        pointer: x,
                    });
                }
            }
        }
    }

    fn encode_binop(&mut self, dest: ValueId, op: crate::ssa::BinOp, x: ValueId, y: ValueId) {
        use crate::ssa::BinOp as B;
        let module = self.module;
        let (_, t) = module.resolve(module.value_ty(x));
        let (Some(xt), Some(yt)) = (self.term(x), self.term(y)) else {
            tracing::debug!(value = dest.0, "binop operand has no term");
            return;
        };
        let term: Option<Dynamic> = match t {
            Type::Int { signed, .. } => Self::binop_bv(op, *signed, &xt.bv(), &yt.bv()),
            Type::Bool => match op {
                B::LogicAnd | B::And => Some((xt.b() & yt.b()).into()),
                B::LogicOr | B::Or => Some((xt.b() | yt.b()).into()),
                B::Eq => Some(xt.b().eq(&yt.b()).into()),
                B::Ne => Some(xt.b().eq(&yt.b()).not().into()),
                _ => None,
            },
            Type::Str => match op {
                B::Add => Some(z3::ast::String::concat(&[&xt.string(), &yt.string()]).into()),
                B::Eq => Some(xt.string().eq(&yt.string()).into()),
                B::Ne => Some(xt.string().eq(&yt.string()).not().into()),
                _ => None,
            },
            Type::Pointer(_) | Type::Struct { .. } => match op {
                B::Eq => Some(xt.eq(&yt).into()),
                B::Ne => Some(xt.eq(&yt).not().into()),
                _ => None,
            },
            _ => None,
        };
        match term {
            Some(t) => {
                self.asts.insert(dest, t);
            }
            None => tracing::debug!(value = dest.0, ?op, "binop has no encoding"),
        }
    }

    fn binop_bv(op: crate::ssa::BinOp, signed: bool, a: &BV, b: &BV) -> Option<Dynamic> {
        use crate::ssa::BinOp as B;
        Some(match op {
            B::Add => a.bvadd(b).into(),
            B::Sub => a.bvsub(b).into(),
            B::Mul => a.bvmul(b).into(),
            B::Div => {
                if signed {
                    a.bvsdiv(b).into()
                } else {
                    a.bvudiv(b).into()
                }
            }
            B::Rem => {
                if signed {
                    a.bvsrem(b).into()
                } else {
                    a.bvurem(b).into()
                }
            }
            B::And => a.bvand(b).into(),
            B::Or => a.bvor(b).into(),
            B::Xor => a.bvxor(b).into(),
            B::Shl => a.bvshl(b).into(),
            B::Shr => {
                if signed {
                    a.bvashr(b).into()
                } else {
                    a.bvlshr(b).into()
                }
            }
            B::Eq => a.eq(b).into(),
            B::Ne => a.eq(b).not().into(),
            B::Lt => {
                if signed {
                    a.bvslt(b).into()
                } else {
                    a.bvult(b).into()
                }
            }
            B::Le => {
                if signed {
                    a.bvsle(b).into()
                } else {
                    a.bvule(b).into()
                }
            }
            B::Gt => {
                if signed {
                    a.bvsgt(b).into()
                } else {
                    a.bvugt(b).into()
                }
            }
            B::Ge => {
                if signed {
                    a.bvsge(b).into()
                } else {
                    a.bvuge(b).into()
                }
            }
            B::LogicAnd | B::LogicOr => return None,
        })
    }

    fn encode_unop(&mut self, dest: ValueId, op: UnOp, x: ValueId) {
        let Some(t) = self.term(x) else {
            tracing::debug!(value = dest.0, "unop operand has no term");
            return;
        };
        let term: Dynamic = match op {
            UnOp::Neg => t.bv().bvneg().into(),
            UnOp::Not => t.b().not().into(),
            UnOp::Deref => unreachable!("handled by encode_deref"),
        };
        self.asts.insert(dest, term);
    }

    fn encode_len(&mut self, dest: ValueId, arg: ValueId) {
        let module = self.module;
        if !matches!(module.resolve(module.value_ty(arg)).1, Type::Str) {
            return;
        }
        let Some(t) = self.term(arg) else {
            return;
        };
        let len = t.string().length();
        let bv = BV::from_int(&len, self.sizing.word_bits);
        self.asts.insert(dest, bv.into());
    }

    /// Term for `v`: prior environment entry or lifted constant.
    fn term(&mut self, v: ValueId) -> Option<Dynamic> {
        if let Some(t) = self.asts.get(&v) {
            return Some(t.clone());
        }
        match self.module.value(v) {
            ValueData::Const { ty, lit } => {
                let (ty, lit) = (*ty, lit.clone());
                self.lift_const(ty, lit)
            }
            _ => None,
        }
    }

    fn lift_const(&mut self, ty: TypeId, lit: Lit) -> Option<Dynamic> {
        let module = self.module;
        let (rty, t) = module.resolve(ty);
        Some(match (lit, t) {
            (Lit::Bool(b), _) => Bool::from_bool(b).into(),
            (Lit::Int(raw), Type::Int { width, .. }) => {
                BV::from_u64(raw, width.bits(self.sizing.word_bits)).into()
            }
            (Lit::Str(s), _) => z3::ast::String::from_str(&s).ok()?.into(),
            (Lit::Nil, Type::Pointer(_)) => self
                .datatypes
                .pointer(module, &self.sizing, rty)?
                .nil
                .apply(&[]),
            _ => return None,
        })
    }

    pub(crate) fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Predicate of branch `b`; flipped when `negate` is set. `None` when
    /// the condition never got a term.
    fn branch_pred(&mut self, b: Branch, negate: bool) -> Option<Bool> {
        match b {
            Branch::If { instr, direction } => {
                let cond = match self.module.instr(instr).kind {
                    InstrKind::If { cond, .. } => cond,
                    _ => unreachable!(),
                };
                let cond = self.asts.get(&cond)?.b();
                Some(if direction != negate { cond } else { cond.not() })
            }
            Branch::Deref {
                pointer, success, ..
            } => {
                let p = self.asts.get(&pointer)?.clone();
                let ty = self.module.value_ty(pointer);
                let decls = self.datatypes.pointer(self.module, &self.sizing, ty)?;
                let is_nil = decls.is_nil.apply(&[&p]).b();
                // success means the pointer was non-nil on this path.
                let wants_nil = !success;
                Some(if wants_nil != negate {
                    is_nil
                } else {
                    is_nil.not()
                })
            }
        }
    }

    /// Asserts `pred(B_0) ∧ … ∧ pred(B_{k-1}) ∧ ¬pred(B_k)` and solves.
    pub(crate) fn solve(&mut self, negate: usize) -> Result<Vec<Solution>> {
        let branches = self.branches.clone();
        let solver = Solver::new();
        for &b in branches.iter().take(negate) {
            if let Some(p) = self.branch_pred(b, false) {
                solver.assert(&p);
            }
        }
        let neg = self
            .branch_pred(branches[negate], true)
            .ok_or_else(|| Error::Encode("negated branch has no condition term".into()))?;
        solver.assert(&neg);

        match solver.check() {
            SatResult::Unsat => Err(Error::Unsat),
            SatResult::Unknown => Err(Error::Solver(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_owned()),
            )),
            SatResult::Sat => {
                let model = solver
                    .get_model()
                    .ok_or_else(|| Error::Solver("sat result carries no model".into()))?;
                self.extract(&model)
            }
        }
    }

    fn extract(&mut self, model: &z3::Model) -> Result<Vec<Solution>> {
        let symbols = self.symbols.clone();
        let mut out = Vec::with_capacity(symbols.len());
        for v in symbols {
            let ty = self.module.value_ty(v);
            let sol = match self.asts.get(&v).cloned() {
                None => Solution::Indefinite { ty },
                Some(ast) => {
                    if model.get_const_interp(&ast).is_none() {
                        // The model does not constrain this symbol at all.
                        Solution::Indefinite { ty }
                    } else {
                        self.solution_from_model(model, &ast, ty)?
                    }
                }
            };
            out.push(sol);
        }
        Ok(out)
    }

    fn solution_from_model(
        &mut self,
        model: &z3::Model,
        ast: &Dynamic,
        ty: TypeId,
    ) -> Result<Solution> {
        let module = self.module;
        let (rty, t) = module.resolve(ty);
        let eval_err = || Error::Solver("failed to evaluate a model value".into());
        let value = match t {
            Type::Bool => {
                let b = model
                    .eval(&ast.b(), true)
                    .and_then(|b| b.as_bool())
                    .ok_or_else(eval_err)?;
                SolutionValue::Bool(b)
            }
            Type::Int { signed, width } => {
                let raw = model
                    .eval(&ast.bv(), true)
                    .and_then(|bv| bv.as_u64())
                    .ok_or_else(eval_err)?;
                SolutionValue::Int(IntValue::new(
                    *signed,
                    width.bits(self.sizing.word_bits),
                    raw,
                ))
            }
            Type::Str => {
                let s = model
                    .eval(&ast.string(), true)
                    .and_then(|s| s.as_string())
                    .ok_or_else(eval_err)?;
                SolutionValue::Str(s)
            }
            Type::Pointer(elem) => {
                let elem = *elem;
                let decls = self
                    .datatypes
                    .pointer(module, &self.sizing, rty)
                    .ok_or_else(eval_err)?;
                let is_nil = model
                    .eval(&decls.is_nil.apply(&[ast]).b(), true)
                    .and_then(|b| b.as_bool())
                    .ok_or_else(eval_err)?;
                if is_nil {
                    SolutionValue::Null
                } else {
                    let sub = decls.deref.apply(&[ast]);
                    SolutionValue::Ref(Box::new(self.solution_from_model(model, &sub, elem)?))
                }
            }
            Type::Struct { fields, .. } => {
                let fields = fields.clone();
                let decls = self
                    .datatypes
                    .strukt(module, &self.sizing, rty)
                    .ok_or_else(eval_err)?;
                let mut parts = Vec::with_capacity(fields.len());
                for (f, acc) in fields.iter().zip(&decls.accessors) {
                    let sub = acc.apply(&[ast]);
                    parts.push(self.solution_from_model(model, &sub, f.ty)?);
                }
                SolutionValue::Struct(parts)
            }
            _ => return Ok(Solution::Indefinite { ty }),
        };
        Ok(Solution::Definite { ty, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interpreter;
    use crate::load::driver;
    use crate::ssa::{BinOp, FuncBuilder, IntWidth};
    use crate::value::ConcreteValue;

    /// f(x: i32) { if x < 5 { print } else { print } }
    fn build_module() -> (Module, crate::ssa::FuncId, crate::ssa::FuncId) {
        let mut m = Module::new("t");
        let i32t = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let mut b = FuncBuilder::new(&mut m, "lt5", &[("x", i32t)], &[]);
        let then_b = b.block();
        let else_b = b.block();
        let done = b.block();
        let five = b.const_int(i32t, 5);
        let x = b.param(0);
        let cond = b.binop(BinOp::Lt, x, five);
        b.br_if(cond, then_b, else_b);
        b.switch_to(then_b);
        b.jump(done);
        b.switch_to(else_b);
        b.jump(done);
        b.switch_to(done);
        b.ret(vec![]);
        let f = b.func_id();
        let d = driver::synthesize(&mut m, f).unwrap();
        (m, f, d)
    }

    #[test]
    fn branch_predicate_duality() {
        let (mut m, f, d) = build_module();
        let symbols = crate::load::symbols::discover(&mut m, d).unwrap().symbols;
        let sizing = Sizing::default();
        let rr = Interpreter::new(&m, f, vec![ConcreteValue::Int(IntValue::from_i64(true, 32, 0))], sizing)
            .run(d)
            .unwrap();
        let mut solver = Z3Solver::new(&m, sizing);
        solver.load_symbols(&symbols);
        solver.load_trace(&rr).unwrap();
        assert_eq!(solver.branches().len(), 1);
        let b = solver.branches()[0];
        let pos = solver.branch_pred(b, false).unwrap();
        let neg = solver.branch_pred(b, true).unwrap();
        // pred(negate) must be the exact complement of pred.
        let s = Solver::new();
        s.assert(&(pos.iff(&neg.not())).not());
        assert_eq!(s.check(), SatResult::Unsat);
    }

    #[test]
    fn solving_negated_branch_flips_the_input() {
        let (mut m, f, d) = build_module();
        let symbols = crate::load::symbols::discover(&mut m, d).unwrap().symbols;
        let sizing = Sizing::default();
        let rr = Interpreter::new(&m, f, vec![ConcreteValue::Int(IntValue::from_i64(true, 32, 0))], sizing)
            .run(d)
            .unwrap();
        let mut solver = Z3Solver::new(&m, sizing);
        solver.load_symbols(&symbols);
        solver.load_trace(&rr).unwrap();
        let sols = solver.solve(0).unwrap();
        assert_eq!(sols.len(), 1);
        match &sols[0] {
            Solution::Definite {
                value: SolutionValue::Int(v),
                ..
            } => assert!(v.as_i64() >= 5),
            other => panic!("unexpected solution {other:?}"),
        }
    }
}
