//! Symbol discovery: canonicalizes the driver's opaque carrier reads.
//!
//! Every use of the input carrier must have the exact shape
//! `TypeAssert(Deref(IndexAddr(Symbols, Const i)))`. The pass collects the
//! `(i, T_i)` pairs in discovery order, rejects conflicting types for one
//! index, dedupes identical reads, renumbers the indices densely from 0 by
//! rewriting the `IndexAddr` constants in place, and returns the ordered
//! type-assertion results as the symbol set. Oracle reads through `RetVals`
//! get the same treatment.

use crate::error::{Error, Result};
use crate::ssa::{FuncId, InstrId, InstrKind, Lit, Module, TypeId, UnOp, ValueData, ValueId};
use crate::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Carrier {
    Symbols,
    RetVals,
}

impl Carrier {
    fn name(&self) -> &'static str {
        match self {
            Self::Symbols => "Symbols",
            Self::RetVals => "RetVals",
        }
    }
}

pub(crate) struct SymbolSet {
    pub symbols: Vec<ValueId>,
    pub retvals: Vec<ValueId>,
}

struct Found {
    carrier: Carrier,
    index: u64,
    ty: TypeId,
    dest: ValueId,
    index_addr: InstrId,
}

pub(crate) fn discover(module: &mut Module, driver: FuncId) -> Result<SymbolSet> {
    let blocks = module.func(driver).blocks.clone();
    let mut found = Vec::new();
    let mut consumed: HashSet<InstrId> = HashSet::default();

    for &blk in &blocks {
        for &iid in &module.block(blk).instrs {
            let InstrKind::TypeAssert { dest, x, ty } = module.instr(iid).kind else {
                continue;
            };
            let Some((carrier, index, index_addr)) = carrier_read(module, x) else {
                continue;
            };
            let index = match module.value(index) {
                ValueData::Const {
                    lit: Lit::Int(n), ..
                } => *n,
                _ => {
                    return Err(Error::SymbolShape(format!(
                        "{} must be indexed with a constant value",
                        carrier.name()
                    )))
                }
            };
            found.push(Found {
                carrier,
                index,
                ty,
                dest,
                index_addr,
            });
            consumed.insert(index_addr);
        }
    }

    // Any other use of a carrier is unsupported.
    for &blk in &blocks {
        for &iid in &module.block(blk).instrs {
            let kind = &module.instr(iid).kind;
            if let InstrKind::IndexAddr { base, .. } = kind {
                if is_carrier(module, *base).is_some() && !consumed.contains(&iid) {
                    return Err(Error::SymbolShape(
                        "carrier element is not consumed by a type assertion".into(),
                    ));
                }
                continue;
            }
            for op in kind.operands() {
                if is_carrier(module, op).is_some() {
                    return Err(Error::SymbolShape(format!(
                        "{:?} uses the carrier outside an indexed type assertion",
                        kind
                    )));
                }
            }
        }
    }

    // Dedup and dense renumbering in discovery order.
    let mut table: HashMap<(Carrier, u64), usize> = HashMap::default();
    let mut symbols = Vec::new();
    let mut retvals = Vec::new();
    for f in &found {
        let list = match f.carrier {
            Carrier::Symbols => &mut symbols,
            Carrier::RetVals => &mut retvals,
        };
        let new_index = match table.get(&(f.carrier, f.index)) {
            Some(&i) => {
                let existing: ValueId = list[i];
                if module.value_ty(existing) != f.ty {
                    return Err(Error::SymbolShape(format!(
                        "{}[{}] is used as multiple types",
                        f.carrier.name(),
                        f.index
                    )));
                }
                i
            }
            None => {
                let i = list.len();
                table.insert((f.carrier, f.index), i);
                list.push(f.dest);
                i
            }
        };
        rewrite_index(module, f.index_addr, new_index as u64);
    }

    Ok(SymbolSet { symbols, retvals })
}

/// Matches `Deref(IndexAddr(<carrier>, index))` rooted at `x`.
fn carrier_read(module: &Module, x: ValueId) -> Option<(Carrier, ValueId, InstrId)> {
    let deref = module.defining_instr(x)?;
    let InstrKind::UnOp {
        op: UnOp::Deref,
        x: addr,
        ..
    } = module.instr(deref).kind
    else {
        return None;
    };
    let index_addr = module.defining_instr(addr)?;
    let InstrKind::IndexAddr { base, index, .. } = module.instr(index_addr).kind else {
        return None;
    };
    let carrier = is_carrier(module, base)?;
    Some((carrier, index, index_addr))
}

fn is_carrier(module: &Module, v: ValueId) -> Option<Carrier> {
    match module.value(v) {
        ValueData::Symbols { .. } => Some(Carrier::Symbols),
        ValueData::RetVals { .. } => Some(Carrier::RetVals),
        _ => None,
    }
}

fn rewrite_index(module: &mut Module, index_addr: InstrId, new_index: u64) {
    let index_ty = match &module.instrs[index_addr.i()].kind {
        InstrKind::IndexAddr { index, .. } => module.value_ty(*index),
        _ => unreachable!("rewrite target is not an index-addr"),
    };
    let new_const = module.add_value(ValueData::Const {
        ty: index_ty,
        lit: Lit::Int(new_index),
    });
    match &mut module.instrs[index_addr.i()].kind {
        InstrKind::IndexAddr { index, .. } => *index = new_const,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::driver;
    use crate::ssa::{
        symbols_carrier, BinOp, FuncBuilder, IntWidth, Type,
    };

    fn int_module() -> (Module, FuncId) {
        let mut m = Module::new("t");
        let i32t = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let mut b = FuncBuilder::new(&mut m, "add", &[("x", i32t), ("y", i32t)], &[i32t]);
        let x = b.param(0);
        let y = b.param(1);
        let v = b.binop(BinOp::Add, x, y);
        b.ret(vec![v]);
        (m, b.func_id())
    }

    #[test]
    fn discovery_order_is_deterministic() {
        let build = || {
            let (mut m, f) = int_module();
            let d = driver::synthesize(&mut m, f).unwrap();
            let set = discover(&mut m, d).unwrap();
            (m, set)
        };
        let (m1, s1) = build();
        let (m2, s2) = build();
        assert_eq!(s1.symbols, s2.symbols);
        assert_eq!(s1.retvals, s2.retvals);
        assert_eq!(s1.symbols.len(), 2);
        assert_eq!(s1.retvals.len(), 1);
        assert_eq!(m1, m2);
    }

    #[test]
    fn duplicate_reads_of_one_index_are_deduplicated() {
        let (mut m, f) = int_module();
        let i32t = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let index_ty = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::Word,
        });
        let symbols = symbols_carrier(&mut m);
        // Hand-written runner reading Symbols[7] twice at the same type.
        let mut b = FuncBuilder::new(&mut m, "runner", &[], &[]);
        let mut fetch = |b: &mut FuncBuilder| {
            let idx = b.const_int(index_ty, 7);
            let addr = b.index_addr(symbols, idx);
            let any = b.unop(UnOp::Deref, addr);
            b.type_assert(any, i32t)
        };
        let a0 = fetch(&mut b);
        let a1 = fetch(&mut b);
        let _ = b.call(f, vec![a0, a1]);
        b.ret(vec![]);
        let d = b.func_id();

        let set = discover(&mut m, d).unwrap();
        assert_eq!(set.symbols.len(), 1);
        // Both index constants were renumbered to 0.
        let driver_blocks = m.func(d).blocks.clone();
        for &blk in &driver_blocks {
            for &iid in &m.block(blk).instrs {
                if let InstrKind::IndexAddr { index, .. } = m.instr(iid).kind {
                    match m.value(index) {
                        ValueData::Const {
                            lit: Lit::Int(n), ..
                        } => assert_eq!(*n, 0),
                        other => panic!("index is {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn conflicting_types_for_one_index_are_rejected() {
        let (mut m, f) = int_module();
        let i32t = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let strt = m.intern_type(Type::Str);
        let index_ty = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::Word,
        });
        let symbols = symbols_carrier(&mut m);
        let mut b = FuncBuilder::new(&mut m, "runner", &[], &[]);
        let mut fetch = |b: &mut FuncBuilder, ty| {
            let idx = b.const_int(index_ty, 0);
            let addr = b.index_addr(symbols, idx);
            let any = b.unop(UnOp::Deref, addr);
            b.type_assert(any, ty)
        };
        let a0 = fetch(&mut b, i32t);
        let _bad = fetch(&mut b, strt);
        let _ = b.call(f, vec![a0, a0]);
        b.ret(vec![]);
        let d = b.func_id();

        assert!(matches!(discover(&mut m, d), Err(Error::SymbolShape(_))));
    }

    #[test]
    fn unwrapped_carrier_reads_are_rejected() {
        let (mut m, f) = int_module();
        let index_ty = m.intern_type(Type::Int {
            signed: true,
            width: IntWidth::Word,
        });
        let symbols = symbols_carrier(&mut m);
        let mut b = FuncBuilder::new(&mut m, "runner", &[], &[]);
        let idx = b.const_int(index_ty, 0);
        // Indexing without the deref + type assertion wrapper.
        let _addr = b.index_addr(symbols, idx);
        let zero = b.const_int(index_ty, 0);
        let _ = b.call(f, vec![zero, zero]);
        b.ret(vec![]);
        let d = b.func_id();

        assert!(matches!(discover(&mut m, d), Err(Error::SymbolShape(_))));
    }
}
