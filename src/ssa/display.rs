//! Plain-text rendering of functions for the `--ssa` dump.

use std::fmt::Write;

use super::{Builtin, Callee, FuncId, InstrKind, Lit, Module, UnOp, ValueData, ValueId};

impl Module {
    pub(crate) fn display_func(&self, func: FuncId) -> String {
        let f = self.func(func);
        let mut out = String::new();
        let params = f
            .params
            .iter()
            .map(|&p| match self.value(p) {
                ValueData::Param { name, ty, .. } => {
                    format!("{name} {}", self.type_name(*ty))
                }
                _ => unreachable!(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let results = f
            .results
            .iter()
            .map(|&t| self.type_name(t))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "func {}({params}) ({results}):", f.name);
        for &b in &f.blocks {
            let _ = writeln!(out, "b{}:", b.0);
            for &i in &self.block(b).instrs {
                let _ = writeln!(out, "\t{}", self.display_instr(i));
            }
        }
        out
    }

    fn display_instr(&self, id: super::InstrId) -> String {
        let instr = self.instr(id);
        match &instr.kind {
            InstrKind::BinOp { dest, op, x, y } => format!(
                "{} = {:?} {}, {}",
                self.vname(*dest),
                op,
                self.vname(*x),
                self.vname(*y)
            ),
            InstrKind::UnOp { dest, op, x } => {
                let sym = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                    UnOp::Deref => "*",
                };
                format!("{} = {sym}{}", self.vname(*dest), self.vname(*x))
            }
            InstrKind::Phi { dest, edges } => {
                let edges = edges
                    .iter()
                    .map(|&e| self.vname(e))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} = phi [{edges}]", self.vname(*dest))
            }
            InstrKind::Call { dest, callee, args } => {
                let callee = match callee {
                    Callee::Func(f) => self.func(*f).name.clone(),
                    Callee::Builtin(Builtin::Len) => "len".into(),
                    Callee::Builtin(Builtin::Print) => "print".into(),
                    Callee::Builtin(Builtin::TestAssert) => "assert".into(),
                };
                let args = args
                    .iter()
                    .map(|&a| self.vname(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} = call {callee}({args})", self.vname(*dest))
            }
            InstrKind::Extract {
                dest,
                tuple,
                index,
            } => format!("{} = extract {} #{index}", self.vname(*dest), self.vname(*tuple)),
            InstrKind::Alloc { dest, ty } => {
                format!("{} = alloc {}", self.vname(*dest), self.type_name(*ty))
            }
            InstrKind::IndexAddr { dest, base, index } => format!(
                "{} = &{}[{}]",
                self.vname(*dest),
                self.vname(*base),
                self.vname(*index)
            ),
            InstrKind::FieldAddr { dest, base, field } => format!(
                "{} = &{}.#{field}",
                self.vname(*dest),
                self.vname(*base)
            ),
            InstrKind::Store { addr, val } => {
                format!("*{} = {}", self.vname(*addr), self.vname(*val))
            }
            InstrKind::TypeAssert { dest, x, ty } => format!(
                "{} = {}.({})",
                self.vname(*dest),
                self.vname(*x),
                self.type_name(*ty)
            ),
            InstrKind::Jump { target } => format!("jump b{}", target.0),
            InstrKind::If {
                cond,
                then_b,
                else_b,
            } => format!(
                "if {} -> b{}, b{}",
                self.vname(*cond),
                then_b.0,
                else_b.0
            ),
            InstrKind::Return { results } => {
                let results = results
                    .iter()
                    .map(|&r| self.vname(r))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("return {results}")
            }
        }
    }

    fn vname(&self, v: ValueId) -> String {
        match self.value(v) {
            ValueData::Param { name, .. } => name.clone(),
            ValueData::Const { lit, .. } => match lit {
                Lit::Bool(b) => b.to_string(),
                Lit::Int(n) => format!("{n}"),
                Lit::Float(f) => format!("{f}"),
                Lit::Str(s) => format!("{s:?}"),
                Lit::Nil => "nil".into(),
            },
            ValueData::Result { .. } => format!("v{}", v.0),
            ValueData::Symbols { .. } => "Symbols".into(),
            ValueData::RetVals { .. } => "RetVals".into(),
        }
    }
}
