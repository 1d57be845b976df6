//! Concrete SSA interpreter with trace capture.
//!
//! Executes a driver function (and through it the target) while appending
//! every executed instruction to a linear trace. Panics of the interpreted
//! program (nil dereference, field access on nil, division by zero, failed
//! type assertion) are trapped at the interpretation boundary and reported
//! through the exit code; the faulting instruction is always the last trace
//! entry. Host-internal problems (unsupported instructions, malformed SSA)
//! are reported as errors instead and abort the run.
//!
//! All state lives on the [`Interpreter`] context; there is no process-wide
//! output buffer or symbol slot.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::ssa::{
    BinOp, BlockId, Builtin, Callee, FuncId, InstrId, InstrKind, Lit, Module, Type, TypeId, UnOp,
    ValueData, ValueId,
};
use crate::value::{zero, ConcreteValue, IntValue, Sizing};
use crate::HashMap;

const STEP_LIMIT: u64 = 10_000_000;

/// Outcome of one concrete run.
#[derive(Debug, Clone)]
pub(crate) struct RunResult {
    pub instrs: Vec<InstrId>,
    pub exit_code: i32,
    pub ret: Option<ConcreteValue>,
    pub stdout: String,
}

impl RunResult {
    pub(crate) fn is_complete(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanicKind {
    NilDeref,
    DivByZero,
    TypeAssert,
}

/// Interpreter-internal value: either a proper concrete value or one of the
/// addressable intermediates that never escape a frame.
#[derive(Debug, Clone)]
enum IVal {
    V(ConcreteValue),
    /// `&Symbols[i]` — address of the i-th engine-supplied input.
    SymSlot(usize),
    /// `&RetVals[i]` — address of the i-th actual result of the target call.
    RetSlot(usize),
    /// Address of a field chain rooted at the pointer value `root`.
    FieldRef { root: ValueId, path: Vec<u32> },
}

struct Frame {
    func: FuncId,
    block: BlockId,
    prev: Option<BlockId>,
    pc: usize,
    env: HashMap<ValueId, IVal>,
    /// Call instruction result to bind on return.
    ret_to: Option<ValueId>,
}

pub(crate) struct Interpreter<'m> {
    module: &'m Module,
    sizing: Sizing,
    target: FuncId,
    symbols: Vec<ConcreteValue>,
    target_results: Option<Vec<ConcreteValue>>,
    trace: Vec<InstrId>,
    stdout: String,
    steps: u64,
}

enum Step {
    Continue,
    Finished,
    Panicked(PanicKind),
}

impl<'m> Interpreter<'m> {
    pub(crate) fn new(
        module: &'m Module,
        target: FuncId,
        symbols: Vec<ConcreteValue>,
        sizing: Sizing,
    ) -> Self {
        Self {
            module,
            sizing,
            target,
            symbols,
            target_results: None,
            trace: Vec::new(),
            stdout: String::new(),
            steps: 0,
        }
    }

    /// Runs `driver` to completion or panic.
    pub(crate) fn run(mut self, driver: FuncId) -> Result<RunResult> {
        let entry = self.module.func(driver).blocks[0];
        let mut frames = vec![Frame {
            func: driver,
            block: entry,
            prev: None,
            pc: 0,
            env: HashMap::default(),
            ret_to: None,
        }];

        let exit_code = loop {
            match self.step(&mut frames)? {
                Step::Continue => {}
                Step::Finished => break 0,
                Step::Panicked(kind) => {
                    tracing::debug!(?kind, "interpreted program panicked");
                    break 2;
                }
            }
        };

        let ret = match (exit_code, self.target_results.take()) {
            (0, Some(results)) => match results.len() {
                0 => None,
                1 => Some(results.into_iter().next().unwrap()),
                _ => Some(ConcreteValue::Tuple(results)),
            },
            _ => None,
        };

        Ok(RunResult {
            instrs: self.trace,
            exit_code,
            ret,
            stdout: self.stdout,
        })
    }

    fn step(&mut self, frames: &mut Vec<Frame>) -> Result<Step> {
        self.steps += 1;
        if self.steps > STEP_LIMIT {
            return Err(Error::Interp("step limit exceeded".into()));
        }

        let frame = frames.last_mut().expect("frame stack underflow");
        let block = self.module.block(frame.block);
        let Some(&iid) = block.instrs.get(frame.pc) else {
            return Err(Error::Interp(format!(
                "block b{} ran past its terminator",
                frame.block.0
            )));
        };
        self.trace.push(iid);
        frame.pc += 1;

        let kind = self.module.instr(iid).kind.clone();
        match kind {
            InstrKind::BinOp { dest, op, x, y } => {
                let x = self.concrete(frame, x)?;
                let y = self.concrete(frame, y)?;
                match self.binop(op, x, y)? {
                    Some(v) => {
                        frame.env.insert(dest, IVal::V(v));
                    }
                    None => return Ok(Step::Panicked(PanicKind::DivByZero)),
                }
            }
            InstrKind::UnOp { dest, op, x } => match op {
                UnOp::Neg => {
                    let v = self.concrete(frame, x)?;
                    let v = match v {
                        ConcreteValue::Int(i) => ConcreteValue::Int(i.wrapping_neg()),
                        ConcreteValue::Float32(f) => ConcreteValue::Float32(-f),
                        ConcreteValue::Float64(f) => ConcreteValue::Float64(-f),
                        other => return Err(Error::Interp(format!("neg on {other:?}"))),
                    };
                    frame.env.insert(dest, IVal::V(v));
                }
                UnOp::Not => {
                    let v = self.concrete(frame, x)?;
                    frame
                        .env
                        .insert(dest, IVal::V(ConcreteValue::Bool(!v.as_bool())));
                }
                UnOp::Deref => match self.load_through(frame, x)? {
                    Some(v) => {
                        frame.env.insert(dest, IVal::V(v));
                    }
                    None => return Ok(Step::Panicked(PanicKind::NilDeref)),
                },
            },
            InstrKind::Phi { dest, edges } => {
                let prev = frame.prev.ok_or_else(|| {
                    Error::Interp("phi in entry block has no incoming edge".into())
                })?;
                let idx = block
                    .preds
                    .iter()
                    .position(|&p| p == prev)
                    .ok_or_else(|| Error::Interp("phi edge for unknown predecessor".into()))?;
                let v = self.concrete(frame, edges[idx])?;
                frame.env.insert(dest, IVal::V(v));
            }
            InstrKind::Call { dest, callee, args } => match callee {
                Callee::Builtin(b) => {
                    let v = self.call_builtin(frame, b, &args)?;
                    frame.env.insert(dest, IVal::V(v));
                }
                Callee::Func(f) => {
                    let mut env = HashMap::default();
                    let callee_fn = self.module.func(f);
                    if callee_fn.params.len() != args.len() {
                        return Err(Error::Interp(format!(
                            "call to {} with {} args, want {}",
                            callee_fn.name,
                            args.len(),
                            callee_fn.params.len()
                        )));
                    }
                    for (&p, &a) in callee_fn.params.iter().zip(&args) {
                        let v = self.concrete(frame, a)?;
                        env.insert(p, IVal::V(v));
                    }
                    let entry = callee_fn.blocks[0];
                    frames.push(Frame {
                        func: f,
                        block: entry,
                        prev: None,
                        pc: 0,
                        env,
                        ret_to: Some(dest),
                    });
                }
            },
            InstrKind::Extract {
                dest,
                tuple,
                index,
            } => {
                let v = match self.concrete(frame, tuple)? {
                    ConcreteValue::Tuple(mut parts) => {
                        let i = index as usize;
                        if i >= parts.len() {
                            return Err(Error::Interp("tuple extract out of range".into()));
                        }
                        parts.swap_remove(i)
                    }
                    other => return Err(Error::Interp(format!("extract on {other:?}"))),
                };
                frame.env.insert(dest, IVal::V(v));
            }
            InstrKind::Alloc { dest, ty } => {
                let cell = zero(ty, self.module, &self.sizing);
                frame
                    .env
                    .insert(dest, IVal::V(ConcreteValue::Pointer(Some(Box::new(cell)))));
            }
            InstrKind::IndexAddr { dest, base, index } => {
                let idx = self.const_index(index)?;
                match self.module.value(base) {
                    ValueData::Symbols { .. } => {
                        frame.env.insert(dest, IVal::SymSlot(idx));
                    }
                    ValueData::RetVals { .. } => {
                        frame.env.insert(dest, IVal::RetSlot(idx));
                    }
                    _ => {
                        return Err(Error::Interp(
                            "index-addr outside the opaque carriers is not supported".into(),
                        ))
                    }
                }
            }
            InstrKind::FieldAddr { dest, base, field } => {
                let r = match frame.env.get(&base) {
                    Some(IVal::FieldRef { root, path }) => {
                        let mut path = path.clone();
                        path.push(field);
                        IVal::FieldRef { root: *root, path }
                    }
                    _ => match self.concrete(frame, base)? {
                        ConcreteValue::Pointer(None) => {
                            return Ok(Step::Panicked(PanicKind::NilDeref))
                        }
                        ConcreteValue::Pointer(Some(_)) => IVal::FieldRef {
                            root: base,
                            path: vec![field],
                        },
                        other => {
                            return Err(Error::Interp(format!("field-addr on {other:?}")))
                        }
                    },
                };
                frame.env.insert(dest, r);
            }
            InstrKind::Store { addr, val } => {
                let v = self.concrete(frame, val)?;
                if !self.store_through(frame, addr, v)? {
                    return Ok(Step::Panicked(PanicKind::NilDeref));
                }
            }
            InstrKind::TypeAssert { dest, x, ty } => {
                let v = self.concrete(frame, x)?;
                if !v.has_type(ty, self.module, &self.sizing) {
                    return Ok(Step::Panicked(PanicKind::TypeAssert));
                }
                frame.env.insert(dest, IVal::V(v));
            }
            InstrKind::Jump { target } => {
                frame.prev = Some(frame.block);
                frame.block = target;
                frame.pc = 0;
            }
            InstrKind::If {
                cond,
                then_b,
                else_b,
            } => {
                let taken = if self.concrete(frame, cond)?.as_bool() {
                    then_b
                } else {
                    else_b
                };
                frame.prev = Some(frame.block);
                frame.block = taken;
                frame.pc = 0;
            }
            InstrKind::Return { results } => {
                let mut vals = Vec::with_capacity(results.len());
                for &r in &results {
                    vals.push(self.concrete(frame, r)?);
                }
                if frame.func == self.target && self.target_results.is_none() {
                    self.target_results = Some(vals.clone());
                }
                let ret_to = frame.ret_to;
                frames.pop();
                match (frames.last_mut(), ret_to) {
                    (Some(caller), Some(dest)) => {
                        let v = match vals.len() {
                            1 => vals.into_iter().next().unwrap(),
                            _ => ConcreteValue::Tuple(vals),
                        };
                        caller.env.insert(dest, IVal::V(v));
                    }
                    (None, _) => return Ok(Step::Finished),
                    (Some(_), None) => {
                        return Err(Error::Interp("return into frame without call site".into()))
                    }
                }
            }
        }
        Ok(Step::Continue)
    }

    /// Evaluates `v` down to a proper concrete value, reading through the
    /// carrier slots. Field references stay addresses and are an error here.
    fn concrete(&mut self, frame: &Frame, v: ValueId) -> Result<ConcreteValue> {
        match self.module.value(v) {
            ValueData::Const { ty, lit } => self.lit_value(*ty, lit),
            ValueData::Symbols { .. } | ValueData::RetVals { .. } => Err(Error::Interp(
                "opaque carrier used as a first-class value".into(),
            )),
            _ => match frame.env.get(&v) {
                Some(IVal::V(val)) => Ok(val.clone()),
                Some(other) => Err(Error::Interp(format!(
                    "address-only value used as concrete: {other:?}"
                ))),
                None => Err(Error::Interp(format!("read of undefined value v{}", v.0))),
            },
        }
    }

    fn lit_value(&self, ty: TypeId, lit: &Lit) -> Result<ConcreteValue> {
        Ok(match (lit, self.module.resolve(ty).1) {
            (Lit::Bool(b), _) => ConcreteValue::Bool(*b),
            (Lit::Int(raw), Type::Int { signed, width }) => ConcreteValue::Int(IntValue::new(
                *signed,
                width.bits(self.sizing.word_bits),
                *raw,
            )),
            (Lit::Float(f), Type::Float { width: 32 }) => ConcreteValue::Float32(*f as f32),
            (Lit::Float(f), _) => ConcreteValue::Float64(*f),
            (Lit::Str(s), _) => ConcreteValue::Str(s.clone()),
            (Lit::Nil, Type::Pointer(_)) => ConcreteValue::Pointer(None),
            (Lit::Nil, Type::Slice(_)) => ConcreteValue::Slice(None),
            (Lit::Nil, Type::Func) => ConcreteValue::Func(None),
            (Lit::Nil, Type::Chan(_)) => ConcreteValue::Chan,
            (Lit::Nil, Type::Map(..)) => ConcreteValue::Map,
            (lit, ty) => {
                return Err(Error::Interp(format!("constant {lit:?} at type {ty:?}")))
            }
        })
    }

    /// Reads the value behind the address `addr`; `None` signals a nil
    /// dereference panic.
    fn load_through(&mut self, frame: &Frame, addr: ValueId) -> Result<Option<ConcreteValue>> {
        match frame.env.get(&addr) {
            Some(IVal::SymSlot(i)) => {
                let i = *i;
                self.symbols.get(i).cloned().map(Some).ok_or_else(|| {
                    Error::Interp(format!("symbol index {i} out of range"))
                })
            }
            Some(IVal::RetSlot(i)) => {
                let i = *i;
                let results = self.target_results.as_ref().ok_or_else(|| {
                    Error::Interp("oracle value read before the target call".into())
                })?;
                results.get(i).cloned().map(Some).ok_or_else(|| {
                    Error::Interp(format!("oracle index {i} out of range"))
                })
            }
            Some(IVal::FieldRef { root, path }) => {
                let (root, path) = (*root, path.clone());
                match frame.env.get(&root) {
                    Some(IVal::V(ConcreteValue::Pointer(Some(cell)))) => {
                        let mut cur: &ConcreteValue = cell;
                        for &f in &path {
                            cur = match cur {
                                ConcreteValue::Struct(fields) => &fields[f as usize],
                                other => {
                                    return Err(Error::Interp(format!(
                                        "field access through {other:?}"
                                    )))
                                }
                            };
                        }
                        Ok(Some(cur.clone()))
                    }
                    Some(IVal::V(ConcreteValue::Pointer(None))) => Ok(None),
                    other => Err(Error::Interp(format!("field ref root is {other:?}"))),
                }
            }
            _ => match self.concrete(frame, addr)? {
                ConcreteValue::Pointer(Some(cell)) => Ok(Some((*cell).clone())),
                ConcreteValue::Pointer(None) => Ok(None),
                other => Err(Error::Interp(format!("deref of {other:?}"))),
            },
        }
    }

    /// Writes `val` through the address `addr`. `false` signals a nil
    /// dereference panic.
    fn store_through(&mut self, frame: &mut Frame, addr: ValueId, val: ConcreteValue) -> Result<bool> {
        match frame.env.get(&addr).cloned() {
            Some(IVal::FieldRef { root, path }) => match frame.env.get_mut(&root) {
                Some(IVal::V(ConcreteValue::Pointer(Some(cell)))) => {
                    let mut cur: &mut ConcreteValue = cell;
                    for &f in &path {
                        cur = match cur {
                            ConcreteValue::Struct(fields) => &mut fields[f as usize],
                            other => {
                                return Err(Error::Interp(format!(
                                    "field store through {other:?}"
                                )))
                            }
                        };
                    }
                    *cur = val;
                    Ok(true)
                }
                Some(IVal::V(ConcreteValue::Pointer(None))) => Ok(false),
                other => Err(Error::Interp(format!("field ref root is {other:?}"))),
            },
            Some(IVal::V(_)) => match frame.env.get_mut(&addr) {
                Some(IVal::V(ConcreteValue::Pointer(Some(cell)))) => {
                    **cell = val;
                    Ok(true)
                }
                Some(IVal::V(ConcreteValue::Pointer(None))) => Ok(false),
                other => Err(Error::Interp(format!("store through {other:?}"))),
            },
            other => Err(Error::Interp(format!("store to non-address {other:?}"))),
        }
    }

    fn binop(
        &self,
        op: BinOp,
        x: ConcreteValue,
        y: ConcreteValue,
    ) -> Result<Option<ConcreteValue>> {
        use ConcreteValue as V;
        let v = match (op, &x, &y) {
            (BinOp::Add, V::Int(a), V::Int(b)) => V::Int(a.wrapping_add(b)),
            (BinOp::Sub, V::Int(a), V::Int(b)) => V::Int(a.wrapping_sub(b)),
            (BinOp::Mul, V::Int(a), V::Int(b)) => V::Int(a.wrapping_mul(b)),
            (BinOp::Div, V::Int(a), V::Int(b)) => match a.div(b) {
                Some(v) => V::Int(v),
                None => return Ok(None),
            },
            (BinOp::Rem, V::Int(a), V::Int(b)) => match a.rem(b) {
                Some(v) => V::Int(v),
                None => return Ok(None),
            },
            (BinOp::And, V::Int(a), V::Int(b)) => V::Int(a.bit_and(b)),
            (BinOp::Or, V::Int(a), V::Int(b)) => V::Int(a.bit_or(b)),
            (BinOp::Xor, V::Int(a), V::Int(b)) => V::Int(a.bit_xor(b)),
            (BinOp::Shl, V::Int(a), V::Int(b)) => V::Int(a.shl(b.as_u64())),
            (BinOp::Shr, V::Int(a), V::Int(b)) => V::Int(a.shr(b.as_u64())),
            (BinOp::Add, V::Str(a), V::Str(b)) => V::Str(format!("{a}{b}")),
            (BinOp::LogicAnd, V::Bool(a), V::Bool(b)) => V::Bool(*a && *b),
            (BinOp::LogicOr, V::Bool(a), V::Bool(b)) => V::Bool(*a || *b),
            (BinOp::And, V::Bool(a), V::Bool(b)) => V::Bool(*a && *b),
            (BinOp::Or, V::Bool(a), V::Bool(b)) => V::Bool(*a || *b),
            (BinOp::Eq, _, _) => V::Bool(x == y),
            (BinOp::Ne, _, _) => V::Bool(x != y),
            (BinOp::Lt, V::Int(a), V::Int(b)) => V::Bool(a.lt(b)),
            (BinOp::Le, V::Int(a), V::Int(b)) => V::Bool(a.le(b)),
            (BinOp::Gt, V::Int(a), V::Int(b)) => V::Bool(b.lt(a)),
            (BinOp::Ge, V::Int(a), V::Int(b)) => V::Bool(b.le(a)),
            (BinOp::Lt, V::Str(a), V::Str(b)) => V::Bool(a < b),
            (BinOp::Le, V::Str(a), V::Str(b)) => V::Bool(a <= b),
            (BinOp::Gt, V::Str(a), V::Str(b)) => V::Bool(a > b),
            (BinOp::Ge, V::Str(a), V::Str(b)) => V::Bool(a >= b),
            (op, x, y) => {
                return Err(Error::Interp(format!("binop {op:?} on {x:?} and {y:?}")))
            }
        };
        Ok(Some(v))
    }

    fn call_builtin(
        &mut self,
        frame: &Frame,
        builtin: Builtin,
        args: &[ValueId],
    ) -> Result<ConcreteValue> {
        match builtin {
            Builtin::Len => {
                let v = self.concrete(frame, args[0])?;
                let n = match &v {
                    ConcreteValue::Str(s) => s.len() as u64,
                    ConcreteValue::Slice(Some(vs)) => vs.len() as u64,
                    ConcreteValue::Slice(None) => 0,
                    ConcreteValue::Array(vs) => vs.len() as u64,
                    other => return Err(Error::Interp(format!("len of {other:?}"))),
                };
                Ok(ConcreteValue::Int(IntValue::new(
                    true,
                    self.sizing.word_bits,
                    n,
                )))
            }
            Builtin::Print => {
                let mut line = String::new();
                for (i, &a) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    let v = self.concrete(frame, a)?;
                    let _ = write!(line, "{v}");
                }
                self.stdout.push_str(&line);
                self.stdout.push('\n');
                Ok(ConcreteValue::Tuple(Vec::new()))
            }
            Builtin::TestAssert => {
                // Oracle marker: evaluated for effect-freedom, never trapped.
                let _ = self.concrete(frame, args[0])?;
                Ok(ConcreteValue::Tuple(Vec::new()))
            }
        }
    }

    fn const_index(&self, v: ValueId) -> Result<usize> {
        match self.module.value(v) {
            ValueData::Const {
                lit: Lit::Int(n), ..
            } => Ok(*n as usize),
            _ => Err(Error::Interp(
                "carrier index must be a constant integer".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{FuncBuilder, IntWidth};

    fn int_ty(m: &mut Module) -> TypeId {
        m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        })
    }

    /// f(x) { if x < 5 { return x + 1 } else { return x - 1 } }
    fn build_branchy(m: &mut Module) -> FuncId {
        let i32t = int_ty(m);
        let mut b = FuncBuilder::new(m, "branchy", &[("x", i32t)], &[i32t]);
        let then_b = b.block();
        let else_b = b.block();
        let five = b.const_int(i32t, 5);
        let x = b.param(0);
        let cond = b.binop(BinOp::Lt, x, five);
        b.br_if(cond, then_b, else_b);
        b.switch_to(then_b);
        let one = b.const_int(i32t, 1);
        let v = b.binop(BinOp::Add, x, one);
        b.ret(vec![v]);
        b.switch_to(else_b);
        let one = b.const_int(i32t, 1);
        let v = b.binop(BinOp::Sub, x, one);
        b.ret(vec![v]);
        b.func_id()
    }

    fn run_with(
        m: &Module,
        driver: FuncId,
        target: FuncId,
        args: Vec<ConcreteValue>,
    ) -> RunResult {
        Interpreter::new(m, target, args, Sizing::default())
            .run(driver)
            .unwrap()
    }

    fn simple_driver(m: &mut Module, target: FuncId) -> FuncId {
        crate::load::driver::synthesize(m, target).unwrap()
    }

    #[test]
    fn arithmetic_and_branching() {
        let mut m = Module::new("t");
        let f = build_branchy(&mut m);
        let driver = simple_driver(&mut m, f);
        let rr = run_with(
            &m,
            driver,
            f,
            vec![ConcreteValue::Int(IntValue::from_i64(true, 32, 3))],
        );
        assert!(rr.is_complete());
        assert_eq!(
            rr.ret,
            Some(ConcreteValue::Int(IntValue::from_i64(true, 32, 4)))
        );
    }

    #[test]
    fn trace_is_linear_across_calls() {
        let mut m = Module::new("t");
        let f = build_branchy(&mut m);
        let driver = simple_driver(&mut m, f);
        let rr = run_with(
            &m,
            driver,
            f,
            vec![ConcreteValue::Int(IntValue::from_i64(true, 32, 9))],
        );
        assert!(rr.is_complete());
        // Consecutive instructions stay within one function unless the
        // earlier one is a call or a return.
        for pair in rr.instrs.windows(2) {
            let a = m.instr(pair[0]);
            let b = m.instr(pair[1]);
            let a_fn = m.block(a.block).func;
            let b_fn = m.block(b.block).func;
            if a_fn != b_fn {
                assert!(
                    matches!(a.kind, InstrKind::Call { .. } | InstrKind::Return { .. }),
                    "inter-procedural step after {:?}",
                    a.kind
                );
            }
        }
    }

    #[test]
    fn nil_deref_truncates_trace() {
        let mut m = Module::new("t");
        let i32t = int_ty(&mut m);
        let ptr = m.intern_type(Type::Pointer(i32t));
        let mut b = FuncBuilder::new(&mut m, "reads", &[("p", ptr)], &[i32t]);
        let p = b.param(0);
        let v = b.unop(UnOp::Deref, p);
        b.ret(vec![v]);
        let f = b.func_id();
        let driver = simple_driver(&mut m, f);
        let rr = run_with(&m, driver, f, vec![ConcreteValue::Pointer(None)]);
        assert!(!rr.is_complete());
        let last = m.instr(*rr.instrs.last().unwrap());
        assert!(matches!(
            last.kind,
            InstrKind::UnOp {
                op: UnOp::Deref,
                ..
            }
        ));
    }

    #[test]
    fn store_through_pointer_updates_owned_cell() {
        let mut m = Module::new("t");
        let i32t = int_ty(&mut m);
        let mut b = FuncBuilder::new(&mut m, "cell", &[], &[i32t]);
        let p = b.alloc(i32t);
        let seven = b.const_int(i32t, 7);
        b.store(p, seven);
        let v = b.unop(UnOp::Deref, p);
        b.ret(vec![v]);
        let f = b.func_id();
        let driver = simple_driver(&mut m, f);
        let rr = run_with(&m, driver, f, vec![]);
        assert_eq!(
            rr.ret,
            Some(ConcreteValue::Int(IntValue::from_i64(true, 32, 7)))
        );
    }
}
