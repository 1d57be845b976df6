//! Solver model values lifted back into typed form.

use crate::ssa::{Module, TypeId};
use crate::value::{zero, ConcreteValue, IntValue, Sizing};

/// Assignment for one symbol. `Indefinite` means the model left the symbol
/// unconstrained; the caller may pick any inhabitant (we pick the zero
/// value).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Solution {
    Definite { ty: TypeId, value: SolutionValue },
    Indefinite { ty: TypeId },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SolutionValue {
    Bool(bool),
    Int(IntValue),
    Str(String),
    /// A nil pointer.
    Null,
    /// A non-nil pointer; the boxed solution describes the referent.
    Ref(Box<Solution>),
    Struct(Vec<Solution>),
}

impl Solution {
    pub(crate) fn ty(&self) -> TypeId {
        match self {
            Self::Definite { ty, .. } | Self::Indefinite { ty } => *ty,
        }
    }

    /// Materializes the solution as a concrete value. Non-nil pointer
    /// solutions allocate a fresh pointee.
    pub(crate) fn concretize(&self, module: &Module, sizing: &Sizing) -> ConcreteValue {
        match self {
            Self::Indefinite { ty } => zero(*ty, module, sizing),
            Self::Definite { value, .. } => match value {
                SolutionValue::Bool(b) => ConcreteValue::Bool(*b),
                SolutionValue::Int(v) => ConcreteValue::Int(*v),
                SolutionValue::Str(s) => ConcreteValue::Str(s.clone()),
                SolutionValue::Null => ConcreteValue::Pointer(None),
                SolutionValue::Ref(sub) => {
                    ConcreteValue::Pointer(Some(Box::new(sub.concretize(module, sizing))))
                }
                SolutionValue::Struct(fields) => ConcreteValue::Struct(
                    fields.iter().map(|s| s.concretize(module, sizing)).collect(),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{IntWidth, Type};

    #[test]
    fn indefinite_concretizes_to_zero() {
        let mut module = Module::new("t");
        let sizing = Sizing::default();
        let int = module.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let ptr = module.intern_type(Type::Pointer(int));
        for ty in [int, ptr] {
            assert_eq!(
                Solution::Indefinite { ty }.concretize(&module, &sizing),
                zero(ty, &module, &sizing)
            );
        }
    }

    #[test]
    fn nested_pointer_solution_allocates_fresh_cells() {
        let mut module = Module::new("t");
        let sizing = Sizing::default();
        let int = module.intern_type(Type::Int {
            signed: true,
            width: IntWidth::W32,
        });
        let ptr = module.intern_type(Type::Pointer(int));
        let pptr = module.intern_type(Type::Pointer(ptr));
        let sol = Solution::Definite {
            ty: pptr,
            value: SolutionValue::Ref(Box::new(Solution::Definite {
                ty: ptr,
                value: SolutionValue::Ref(Box::new(Solution::Definite {
                    ty: int,
                    value: SolutionValue::Int(IntValue::from_i64(true, 32, 9)),
                })),
            })),
        };
        assert_eq!(
            sol.concretize(&module, &sizing),
            ConcreteValue::Pointer(Some(Box::new(ConcreteValue::Pointer(Some(Box::new(
                ConcreteValue::Int(IntValue::from_i64(true, 32, 9))
            )))))),
        );
    }
}
