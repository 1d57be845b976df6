//! Function construction API. This is the fixed library interface through
//! which front-ends (and tests) produce SSA; `congen` itself only consumes
//! the finished arena.

use super::{
    BinOp, Block, BlockId, Builtin, Callee, FuncId, Function, Instr, InstrId, InstrKind, IntWidth,
    Lit, Module, Type, TypeId, UnOp, ValueData, ValueId,
};

pub(crate) struct FuncBuilder<'m> {
    module: &'m mut Module,
    func: FuncId,
    cur: BlockId,
}

impl<'m> FuncBuilder<'m> {
    /// Declares a new function with an empty entry block and positions the
    /// builder there.
    pub(crate) fn new(
        module: &'m mut Module,
        name: &str,
        params: &[(&str, TypeId)],
        results: &[TypeId],
    ) -> Self {
        let func = FuncId(module.funcs.len() as u32);
        module.funcs.push(Function {
            name: name.to_owned(),
            params: Vec::new(),
            results: results.to_vec(),
            blocks: Vec::new(),
            annotations: Vec::new(),
        });
        for &(pname, ty) in params {
            let v = module.add_value(ValueData::Param {
                name: pname.to_owned(),
                ty,
            });
            module.funcs[func.i()].params.push(v);
        }
        let mut b = Self {
            module,
            func,
            cur: BlockId(0),
        };
        let entry = b.block();
        b.cur = entry;
        b
    }

    pub(crate) fn func_id(&self) -> FuncId {
        self.func
    }

    pub(crate) fn param(&self, index: usize) -> ValueId {
        self.module.funcs[self.func.i()].params[index]
    }

    pub(crate) fn annotate(&mut self, line: &str) {
        self.module.funcs[self.func.i()]
            .annotations
            .push(line.to_owned());
    }

    pub(crate) fn block(&mut self) -> BlockId {
        let id = BlockId(self.module.blocks.len() as u32);
        self.module.blocks.push(Block {
            func: self.func,
            instrs: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
        });
        self.module.funcs[self.func.i()].blocks.push(id);
        id
    }

    pub(crate) fn switch_to(&mut self, block: BlockId) {
        debug_assert_eq!(self.module.block(block).func, self.func);
        self.cur = block;
    }

    fn push(&mut self, kind: InstrKind) -> InstrId {
        debug_assert!(
            self.module.blocks[self.cur.i()]
                .instrs
                .last()
                .map_or(true, |&i| !self.module.instrs[i.i()].kind.is_terminator()),
            "instruction added after the block terminator"
        );
        let id = InstrId(self.module.instrs.len() as u32);
        self.module.instrs.push(Instr {
            block: self.cur,
            kind,
        });
        self.module.blocks[self.cur.i()].instrs.push(id);
        id
    }

    fn result(&mut self, instr: InstrId, ty: TypeId) -> ValueId {
        let dest = self.module.add_value(ValueData::Result { instr, ty });
        // Patch the placeholder dest that `push` callers leave behind.
        if let Some(slot) = self.module.instrs[instr.i()].kind.dest_mut() {
            *slot = dest;
        }
        dest
    }

    fn link(&mut self, from: BlockId, to: BlockId) {
        self.module.blocks[from.i()].succs.push(to);
        self.module.blocks[to.i()].preds.push(from);
    }

    // Constants

    pub(crate) fn const_bool(&mut self, v: bool) -> ValueId {
        let ty = self.module.intern_type(Type::Bool);
        self.module.add_value(ValueData::Const {
            ty,
            lit: Lit::Bool(v),
        })
    }

    pub(crate) fn const_int(&mut self, ty: TypeId, bits: u64) -> ValueId {
        self.module.add_value(ValueData::Const {
            ty,
            lit: Lit::Int(bits),
        })
    }

    pub(crate) fn const_str(&mut self, v: &str) -> ValueId {
        let ty = self.module.intern_type(Type::Str);
        self.module.add_value(ValueData::Const {
            ty,
            lit: Lit::Str(v.to_owned()),
        })
    }

    pub(crate) fn const_nil(&mut self, ty: TypeId) -> ValueId {
        self.module.add_value(ValueData::Const { ty, lit: Lit::Nil })
    }

    // Instructions

    pub(crate) fn binop(&mut self, op: BinOp, x: ValueId, y: ValueId) -> ValueId {
        let ty = if op.is_comparison() {
            self.module.intern_type(Type::Bool)
        } else {
            self.module.value_ty(x)
        };
        let instr = self.push(InstrKind::BinOp {
            dest: ValueId(u32::MAX),
            op,
            x,
            y,
        });
        self.result(instr, ty)
    }

    pub(crate) fn unop(&mut self, op: UnOp, x: ValueId) -> ValueId {
        let xty = self.module.value_ty(x);
        let ty = match op {
            UnOp::Deref => match self.module.resolve(xty).1 {
                Type::Pointer(elem) => *elem,
                // Derefs of the opaque carriers produce `any` values.
                _ => self.module.intern_type(Type::Interface),
            },
            _ => xty,
        };
        let instr = self.push(InstrKind::UnOp {
            dest: ValueId(u32::MAX),
            op,
            x,
        });
        self.result(instr, ty)
    }

    pub(crate) fn phi(&mut self, ty: TypeId, edges: Vec<ValueId>) -> ValueId {
        let instr = self.push(InstrKind::Phi {
            dest: ValueId(u32::MAX),
            edges,
        });
        self.result(instr, ty)
    }

    pub(crate) fn call(&mut self, callee: FuncId, args: Vec<ValueId>) -> ValueId {
        let results = self.module.func(callee).results.clone();
        let ty = match results.len() {
            0 => self.module.intern_type(Type::Tuple(Vec::new())),
            1 => results[0],
            _ => self.module.intern_type(Type::Tuple(results)),
        };
        let instr = self.push(InstrKind::Call {
            dest: ValueId(u32::MAX),
            callee: Callee::Func(callee),
            args,
        });
        self.result(instr, ty)
    }

    pub(crate) fn call_builtin(&mut self, builtin: Builtin, args: Vec<ValueId>) -> ValueId {
        let ty = match builtin {
            Builtin::Len => self.module.intern_type(Type::Int {
                signed: true,
                width: IntWidth::Word,
            }),
            Builtin::Print | Builtin::TestAssert => self.module.intern_type(Type::Tuple(Vec::new())),
        };
        let instr = self.push(InstrKind::Call {
            dest: ValueId(u32::MAX),
            callee: Callee::Builtin(builtin),
            args,
        });
        self.result(instr, ty)
    }

    pub(crate) fn extract(&mut self, tuple: ValueId, index: u32) -> ValueId {
        let tty = self.module.value_ty(tuple);
        let ty = match self.module.resolve(tty).1 {
            Type::Tuple(parts) => parts[index as usize],
            _ => tty,
        };
        let instr = self.push(InstrKind::Extract {
            dest: ValueId(u32::MAX),
            tuple,
            index,
        });
        self.result(instr, ty)
    }

    pub(crate) fn alloc(&mut self, ty: TypeId) -> ValueId {
        let ptr_ty = self.module.intern_type(Type::Pointer(ty));
        let instr = self.push(InstrKind::Alloc {
            dest: ValueId(u32::MAX),
            ty,
        });
        self.result(instr, ptr_ty)
    }

    pub(crate) fn index_addr(&mut self, base: ValueId, index: ValueId) -> ValueId {
        let bty = self.module.value_ty(base);
        let elem = match self.module.resolve(bty).1 {
            Type::Array(_, elem) | Type::Slice(elem) => *elem,
            _ => self.module.intern_type(Type::Interface),
        };
        let ty = self.module.intern_type(Type::Pointer(elem));
        let instr = self.push(InstrKind::IndexAddr {
            dest: ValueId(u32::MAX),
            base,
            index,
        });
        self.result(instr, ty)
    }

    pub(crate) fn field_addr(&mut self, base: ValueId, field: u32) -> ValueId {
        let bty = self.module.value_ty(base);
        let field_ty = match self.module.resolve(bty).1 {
            Type::Pointer(elem) => match self.module.resolve(*elem).1 {
                Type::Struct { fields, .. } => fields[field as usize].ty,
                _ => panic!("field_addr through non-struct pointer"),
            },
            _ => panic!("field_addr on non-pointer"),
        };
        let ty = self.module.intern_type(Type::Pointer(field_ty));
        let instr = self.push(InstrKind::FieldAddr {
            dest: ValueId(u32::MAX),
            base,
            field,
        });
        self.result(instr, ty)
    }

    pub(crate) fn store(&mut self, addr: ValueId, val: ValueId) {
        self.push(InstrKind::Store { addr, val });
    }

    pub(crate) fn type_assert(&mut self, x: ValueId, ty: TypeId) -> ValueId {
        let instr = self.push(InstrKind::TypeAssert {
            dest: ValueId(u32::MAX),
            x,
            ty,
        });
        self.result(instr, ty)
    }

    pub(crate) fn jump(&mut self, target: BlockId) {
        let cur = self.cur;
        self.push(InstrKind::Jump { target });
        self.link(cur, target);
    }

    /// Conditional branch; `then_b` is successor 0, `else_b` successor 1.
    pub(crate) fn br_if(&mut self, cond: ValueId, then_b: BlockId, else_b: BlockId) {
        let cur = self.cur;
        self.push(InstrKind::If {
            cond,
            then_b,
            else_b,
        });
        self.link(cur, then_b);
        self.link(cur, else_b);
    }

    pub(crate) fn ret(&mut self, results: Vec<ValueId>) {
        self.push(InstrKind::Return { results });
    }
}

impl InstrKind {
    fn dest_mut(&mut self) -> Option<&mut ValueId> {
        match self {
            Self::BinOp { dest, .. }
            | Self::UnOp { dest, .. }
            | Self::Phi { dest, .. }
            | Self::Call { dest, .. }
            | Self::Extract { dest, .. }
            | Self::Alloc { dest, .. }
            | Self::IndexAddr { dest, .. }
            | Self::FieldAddr { dest, .. }
            | Self::TypeAssert { dest, .. } => Some(dest),
            Self::Store { .. } | Self::Jump { .. } | Self::If { .. } | Self::Return { .. } => None,
        }
    }
}

/// Declares the opaque `Symbols` carrier value for a driver function.
pub(crate) fn symbols_carrier(module: &mut Module) -> ValueId {
    let any = module.intern_type(Type::Interface);
    let ty = module.intern_type(Type::Slice(any));
    module.add_value(ValueData::Symbols { ty })
}

/// Declares the opaque `RetVals` carrier value for a driver function.
pub(crate) fn retvals_carrier(module: &mut Module) -> ValueId {
    let any = module.intern_type(Type::Interface);
    let ty = module.intern_type(Type::Slice(any));
    module.add_value(ValueData::RetVals { ty })
}
