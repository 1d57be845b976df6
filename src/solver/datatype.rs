//! Sort construction, including the algebraic datatypes for pointers and
//! structs. Datatypes are cached by nominal type name so that every
//! occurrence of a type shares one set of constructor/recognizer/accessor
//! declarations.

use z3::{DatatypeAccessor, DatatypeBuilder, DatatypeSort, FuncDecl, Sort};

use crate::ssa::{Module, Type, TypeId};
use crate::value::Sizing;
use crate::HashMap;

/// Declarations of a `ptr-T = nil | ref(deref: T)` datatype.
#[derive(Clone)]
pub(crate) struct PointerDecls {
    pub sort: Sort,
    pub nil: FuncDecl,
    pub is_nil: FuncDecl,
    pub deref: FuncDecl,
}

/// Declarations of a single-constructor struct datatype.
#[derive(Clone)]
pub(crate) struct StructDecls {
    pub sort: Sort,
    pub cons: FuncDecl,
    pub accessors: Vec<FuncDecl>,
}

#[derive(Default)]
pub(crate) struct DatatypeDict {
    pointers: HashMap<String, DatatypeSort>,
    structs: HashMap<String, DatatypeSort>,
}

impl DatatypeDict {
    /// SMT sort for `ty`, or `None` when the type has no symbolic encoding.
    pub(crate) fn sort_for(
        &mut self,
        module: &Module,
        sizing: &Sizing,
        ty: TypeId,
    ) -> Option<Sort> {
        let (ty, t) = module.resolve(ty);
        match t {
            Type::Bool => Some(Sort::bool()),
            Type::Int { width, .. } => Some(Sort::bitvector(width.bits(sizing.word_bits))),
            Type::Str => Some(Sort::string()),
            Type::Pointer(_) => self.pointer(module, sizing, ty).map(|d| d.sort),
            Type::Struct { .. } => self.strukt(module, sizing, ty).map(|d| d.sort),
            _ => None,
        }
    }

    pub(crate) fn pointer(
        &mut self,
        module: &Module,
        sizing: &Sizing,
        ty: TypeId,
    ) -> Option<PointerDecls> {
        let (ty, t) = module.resolve(ty);
        let Type::Pointer(elem) = t else {
            return None;
        };
        let name = format!("ptr-{}", module.type_name(*elem));
        if !self.pointers.contains_key(&name) {
            let elem_sort = self.sort_for(module, sizing, *elem)?;
            let dt = DatatypeBuilder::new(name.clone())
                .variant("nil", vec![])
                .variant(
                    "ref",
                    vec![("deref", DatatypeAccessor::Sort(elem_sort))],
                )
                .finish();
            self.pointers.insert(name.clone(), dt);
        }
        let dt = self.pointers.get(&name).unwrap();
        Some(PointerDecls {
            sort: dt.sort.clone(),
            nil: dt.variants[0].constructor.clone(),
            is_nil: dt.variants[0].tester.clone(),
            deref: dt.variants[1].accessors[0].clone(),
        })
    }

    pub(crate) fn strukt(
        &mut self,
        module: &Module,
        sizing: &Sizing,
        ty: TypeId,
    ) -> Option<StructDecls> {
        let (_, t) = module.resolve(ty);
        let Type::Struct { fields, .. } = t else {
            return None;
        };
        let name = module.type_name(ty);
        if !self.structs.contains_key(&name) {
            let fields = fields.clone();
            let mut field_sorts = Vec::with_capacity(fields.len());
            for f in &fields {
                let sort = self.sort_for(module, sizing, f.ty)?;
                field_sorts.push((f.name.clone(), sort));
            }
            let accessors: Vec<(&str, DatatypeAccessor)> = field_sorts
                .iter()
                .map(|(n, s)| (n.as_str(), DatatypeAccessor::Sort(s.clone())))
                .collect();
            let dt = DatatypeBuilder::new(name.clone())
                .variant(&name, accessors)
                .finish();
            self.structs.insert(name.clone(), dt);
        }
        let dt = self.structs.get(&name).unwrap();
        Some(StructDecls {
            sort: dt.sort.clone(),
            cons: dt.variants[0].constructor.clone(),
            accessors: dt.variants[0].accessors.clone(),
        })
    }
}
