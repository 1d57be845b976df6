//! Driver synthesis.
//!
//! A driver is a small parameterless function that fetches `Symbols[i]`,
//! asserts each to the target's parameter type, calls the target, and — for
//! scalar results — asserts `result == RetVals[j]` through the `TestAssert`
//! builtin so an oracle survives into the emitted tests.

use crate::error::Result;
use crate::ssa::{
    retvals_carrier, symbols_carrier, BinOp, Builtin, FuncBuilder, FuncId, IntWidth, Module, Type,
    TypeId, UnOp, ValueId,
};

pub(crate) fn synthesize(module: &mut Module, target: FuncId) -> Result<FuncId> {
    let target_fn = module.func(target).clone();
    let param_tys: Vec<TypeId> = target_fn
        .params
        .iter()
        .map(|&p| module.value_ty(p))
        .collect();
    let oracle_tys: Vec<(usize, TypeId)> = target_fn
        .results
        .iter()
        .enumerate()
        .filter(|&(_, &ty)| {
            matches!(
                module.resolve(ty).1,
                Type::Bool | Type::Int { .. } | Type::Str
            )
        })
        .map(|(j, &ty)| (j, ty))
        .collect();
    let index_ty = module.intern_type(Type::Int {
        signed: true,
        width: IntWidth::Word,
    });
    let symbols = symbols_carrier(module);
    let retvals = retvals_carrier(module);

    let name = format!("runner${}", target_fn.name);
    let mut b = FuncBuilder::new(module, &name, &[], &[]);

    let mut args = Vec::with_capacity(param_tys.len());
    for (i, &ty) in param_tys.iter().enumerate() {
        let idx = b.const_int(index_ty, i as u64);
        let addr = b.index_addr(symbols, idx);
        let any = b.unop(UnOp::Deref, addr);
        args.push(b.type_assert(any, ty));
    }

    let result = b.call(target, args);

    let mut cond: Option<ValueId> = None;
    for (oracle_i, &(j, ty)) in oracle_tys.iter().enumerate() {
        let actual = if target_fn.results.len() == 1 {
            result
        } else {
            b.extract(result, j as u32)
        };
        let idx = b.const_int(index_ty, oracle_i as u64);
        let addr = b.index_addr(retvals, idx);
        let any = b.unop(UnOp::Deref, addr);
        let expected = b.type_assert(any, ty);
        let eq = b.binop(BinOp::Eq, actual, expected);
        cond = Some(match cond {
            None => eq,
            Some(acc) => b.binop(BinOp::LogicAnd, acc, eq),
        });
    }
    if let Some(cond) = cond {
        b.call_builtin(Builtin::TestAssert, vec![cond]);
    }
    b.ret(Vec::new());

    Ok(b.func_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{InstrKind, ValueData};

    #[test]
    fn driver_fetches_asserts_and_calls() {
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
        let f = b.func_id();

        let d = synthesize(&mut m, f).unwrap();
        let driver = m.func(d);
        assert!(driver.params.is_empty());

        let instrs: Vec<_> = driver
            .blocks
            .iter()
            .flat_map(|&blk| m.block(blk).instrs.clone())
            .map(|i| m.instr(i).kind.clone())
            .collect();
        let asserts = instrs
            .iter()
            .filter(|k| matches!(k, InstrKind::TypeAssert { .. }))
            .count();
        // Two parameter fetches plus one oracle fetch.
        assert_eq!(asserts, 3);
        assert!(instrs.iter().any(|k| matches!(
            k,
            InstrKind::Call {
                callee: crate::ssa::Callee::Func(callee),
                ..
            } if *callee == f
        )));
        assert!(instrs.iter().any(|k| matches!(
            k,
            InstrKind::Call {
                callee: crate::ssa::Callee::Builtin(Builtin::TestAssert),
                ..
            }
        )));
        // The carriers exist exactly once each.
        let carriers = m
            .values
            .iter()
            .filter(|v| matches!(v, ValueData::Symbols { .. } | ValueData::RetVals { .. }))
            .count();
        assert_eq!(carriers, 2);
    }
}
