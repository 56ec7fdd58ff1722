//! The type lattice and its join operation.
//!
//! Values start at [`Type::Unbound`] and only ever move up towards
//! [`Type::Anything`]. Between the two sit literal constants, registered
//! nominals ordered by their `generic` chains, parametric applications and
//! function types.
//!
//! # Lattice shape
//!
//! ```text
//!                 anything
//!          /      |       \        \
//!        int    float    vec2..4   (a1, .., an) -> r
//!         |       |
//!       uint   Constant(float, 1.5)
//!         |
//!       bool
//!         |
//!   Constant(bool, True)
//!          \      |      /
//!               unbound
//! ```
//!
//! [`Type::union`] is the join used everywhere values meet. It generalizes its
//! result so that no parametric node ever leaves it; [`Type::unify`] is the raw
//! form which keeps parametric applications and is meant for matching call
//! signatures.

use std::fmt;

use crate::{bytecode::Literal, types::Nominal};

/// Number of strict upward moves a single annotation can make, from
/// `Unbound` through the deepest constant to `Anything`.
pub const LATTICE_HEIGHT: usize = 5;

/// A join semi-lattice with a join (least upper bound) operation.
///
/// The join must be idempotent, commutative and associative, and have the
/// bottom element as its identity.
pub trait JoinSemiLattice: Clone + fmt::Debug + PartialEq {
    /// Computes the least upper bound of two lattice elements.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Returns `true` if this is the top element.
    fn is_top(&self) -> bool;
}

/// A node of the type lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Bottom: nothing is known yet
    Unbound,
    /// Top: the value may be of any type
    Anything,
    /// A registered named type
    Nominal(Nominal),
    /// A parametric nominal applied to one type argument
    Parametric(Nominal, Box<Type>),
    /// A literal together with its static nominal type
    Constant(Nominal, Literal),
    /// A function type
    Func(FuncType),
}

/// Ordered argument types and a return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    /// Argument types, by position
    pub args: Vec<Type>,
    /// Return type
    pub ret: Box<Type>,
}

impl FuncType {
    /// Creates a function type.
    #[must_use]
    pub fn new(args: Vec<Type>, ret: Type) -> Self {
        Self {
            args,
            ret: Box::new(ret),
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl Type {
    /// Shorthand for `Type::Nominal(Nominal::Int)`.
    pub const INT: Type = Type::Nominal(Nominal::Int);
    /// Shorthand for `Type::Nominal(Nominal::Uint)`.
    pub const UINT: Type = Type::Nominal(Nominal::Uint);
    /// Shorthand for `Type::Nominal(Nominal::Bool)`.
    pub const BOOL: Type = Type::Nominal(Nominal::Bool);
    /// Shorthand for `Type::Nominal(Nominal::Float)`.
    pub const FLOAT: Type = Type::Nominal(Nominal::Float);

    /// The constant type of a literal, `None` if the literal has no static type.
    #[must_use]
    pub fn constant(literal: Literal) -> Option<Type> {
        Nominal::of_literal(&literal).map(|nominal| Type::Constant(nominal, literal))
    }

    /// Applies a parametric nominal to an argument.
    ///
    /// Returns `None` if `container` is not parametric.
    #[must_use]
    pub fn parametric(container: Nominal, argument: Type) -> Option<Type> {
        container
            .is_parametric()
            .then(|| Type::Parametric(container, Box::new(argument)))
    }

    /// Distance from `Anything`; `None` for `Unbound`, which is below everything.
    #[must_use]
    pub fn specificity(&self) -> Option<u32> {
        match self {
            Type::Unbound => None,
            Type::Anything => Some(0),
            Type::Nominal(nominal) => Some(nominal.specificity()),
            Type::Parametric(nominal, _) | Type::Constant(nominal, _) => {
                Some(nominal.specificity() + 1)
            }
            Type::Func(_) => Some(1),
        }
    }

    /// The nominal a value of this type is an instance of, if any.
    #[must_use]
    pub fn static_nominal(&self) -> Option<Nominal> {
        match self {
            Type::Nominal(nominal) | Type::Parametric(nominal, _) | Type::Constant(nominal, _) => {
                Some(*nominal)
            }
            _ => None,
        }
    }

    /// Returns `true` for the `int` family and `float`, including their constants.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        match self {
            Type::Nominal(nominal) | Type::Constant(nominal, _) => {
                matches!(nominal.root(), Nominal::Int | Nominal::Float)
            }
            _ => false,
        }
    }

    /// Returns `true` for `Unbound`.
    #[must_use]
    pub fn is_unbound(&self) -> bool {
        matches!(self, Type::Unbound)
    }

    /// Replaces a constant by its static type.
    #[must_use]
    pub fn widen_constant(&self) -> Type {
        match self {
            Type::Constant(nominal, _) => Type::Nominal(*nominal),
            other => other.clone(),
        }
    }

    /// Raw least upper bound.
    ///
    /// May return parametric applications and bare parametric nominals. Use
    /// [`Type::union`] wherever the result is stored on a value.
    #[must_use]
    pub fn unify(&self, other: &Type) -> Type {
        if self == other {
            return self.clone();
        }

        match (self, other) {
            (Type::Unbound, x) | (x, Type::Unbound) => x.clone(),
            (Type::Constant(a, va), Type::Constant(b, vb)) => {
                if a == b && va == vb {
                    self.clone()
                } else {
                    common_ancestor(*a, *b)
                }
            }
            (Type::Constant(nominal, _), x) | (x, Type::Constant(nominal, _)) => {
                Type::Nominal(*nominal).unify(x)
            }
            (Type::Nominal(a), Type::Nominal(b)) => common_ancestor(*a, *b),
            (Type::Parametric(a, pa), Type::Parametric(b, pb)) => match common_ancestor(*a, *b) {
                Type::Nominal(container) if container.is_parametric() => {
                    Type::Parametric(container, Box::new(pa.union(pb)))
                }
                container => container,
            },
            (Type::Parametric(nominal, argument), x) | (x, Type::Parametric(nominal, argument)) => {
                match Type::Nominal(*nominal).unify(x) {
                    Type::Nominal(container) if container.is_parametric() => {
                        Type::Parametric(container, argument.clone())
                    }
                    container => container,
                }
            }
            (Type::Func(a), Type::Func(b)) if a.arity() == b.arity() => Type::Func(FuncType {
                args: a
                    .args
                    .iter()
                    .zip(&b.args)
                    .map(|(x, y)| x.union(y))
                    .collect(),
                ret: Box::new(a.ret.union(&b.ret)),
            }),
            _ => Type::Anything,
        }
    }

    /// Least upper bound, generalized so that the result is never parametric.
    ///
    /// Commutative, associative and idempotent over non-parametric types, with
    /// `Unbound` as identity.
    #[must_use]
    pub fn union(&self, other: &Type) -> Type {
        self.unify(other).generalize()
    }

    /// Strips parametric structure: an application becomes its container and a
    /// parametric nominal climbs its `generic` chain until it is not parametric.
    #[must_use]
    pub fn generalize(self) -> Type {
        let mut current = self;
        loop {
            current = match current {
                Type::Parametric(container, _) => Type::Nominal(container),
                Type::Nominal(nominal) if nominal.is_parametric() => {
                    nominal.generic().map_or(Type::Anything, Type::Nominal)
                }
                other => return other,
            };
        }
    }

    /// Returns `true` if this is a parametric application or a parametric nominal.
    #[must_use]
    pub fn is_parametric(&self) -> bool {
        match self {
            Type::Parametric(..) => true,
            Type::Nominal(nominal) => nominal.is_parametric(),
            _ => false,
        }
    }
}

/// Lowest common ancestor of two nominals along their `generic` chains.
fn common_ancestor(a: Nominal, b: Nominal) -> Type {
    let depth = a.specificity().min(b.specificity());
    let mut a = Some(a);
    let mut b = Some(b);

    while a.map_or(0, Nominal::specificity) > depth {
        a = a.and_then(Nominal::generic);
    }
    while b.map_or(0, Nominal::specificity) > depth {
        b = b.and_then(Nominal::generic);
    }
    while a != b {
        a = a.and_then(Nominal::generic);
        b = b.and_then(Nominal::generic);
    }

    a.map_or(Type::Anything, Type::Nominal)
}

impl JoinSemiLattice for Type {
    fn join(&self, other: &Self) -> Self {
        self.union(other)
    }

    fn is_top(&self) -> bool {
        matches!(self, Type::Anything)
    }
}

impl From<Nominal> for Type {
    fn from(nominal: Nominal) -> Self {
        Type::Nominal(nominal)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unbound => write!(f, "unbound"),
            Type::Anything => write!(f, "anything"),
            Type::Nominal(nominal) => write!(f, "{nominal}"),
            Type::Parametric(nominal, argument) => write!(f, "{nominal}({argument})"),
            Type::Constant(nominal, literal) => write!(f, "Constant({nominal}, {literal})"),
            Type::Func(func) => write!(f, "{func}"),
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn vec2(argument: Type) -> Type {
        Type::Parametric(Nominal::Vec2, Box::new(argument))
    }

    fn sample() -> Vec<Type> {
        let mut types = vec![
            Type::Unbound,
            Type::Anything,
            Type::Constant(Nominal::Bool, Literal::Bool(true)),
            Type::Constant(Nominal::Bool, Literal::Bool(false)),
            Type::Constant(Nominal::Int, Literal::Int(20)),
            Type::Constant(Nominal::Int, Literal::Int(5)),
            Type::Constant(Nominal::Float, Literal::Float(0.5)),
            Type::Func(FuncType::new(vec![Type::INT], Type::BOOL)),
            Type::Func(FuncType::new(vec![Type::UINT], Type::FLOAT)),
            Type::Func(FuncType::new(vec![], Type::INT)),
        ];
        types.extend(
            Nominal::iter()
                .filter(|nominal| !nominal.is_parametric())
                .map(Type::Nominal),
        );
        types
    }

    #[test]
    fn test_union_unbound_is_identity() {
        for t in sample() {
            assert_eq!(t.union(&Type::Unbound), t, "{t}");
            assert_eq!(Type::Unbound.union(&t), t, "{t}");
        }
    }

    #[test]
    fn test_union_commutative_and_idempotent() {
        let types = sample();
        for a in &types {
            assert_eq!(a.union(a), *a, "{a}");
            for b in &types {
                assert_eq!(a.union(b), b.union(a), "{a} | {b}");
            }
        }
    }

    #[test]
    fn test_union_associative() {
        let types = sample();
        for a in &types {
            for b in &types {
                for c in &types {
                    assert_eq!(
                        a.union(b).union(c),
                        a.union(&b.union(c)),
                        "({a} | {b}) | {c}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_union_never_parametric() {
        let mut types = sample();
        types.push(vec2(Type::FLOAT));
        types.push(vec2(Type::INT));
        types.push(Type::Parametric(Nominal::Vec3, Box::new(Type::FLOAT)));
        types.push(Type::Nominal(Nominal::Vec4));
        for a in &types {
            for b in &types {
                assert!(!a.union(b).is_parametric(), "{a} | {b}");
            }
        }
    }

    #[test]
    fn test_constants() {
        let t = Type::Constant(Nominal::Bool, Literal::Bool(true));
        let f = Type::Constant(Nominal::Bool, Literal::Bool(false));
        assert_eq!(t.union(&f), Type::BOOL);
        assert_eq!(t.union(&t), t);
        assert_eq!(
            t.union(&Type::Constant(Nominal::Int, Literal::Int(1))),
            Type::INT
        );
        assert_eq!(t.union(&Type::UINT), Type::UINT);
        assert_eq!(
            Type::Constant(Nominal::Float, Literal::Float(1.0)).union(&Type::INT),
            Type::Anything
        );
    }

    #[test]
    fn test_nominal_common_ancestor() {
        assert_eq!(Type::BOOL.union(&Type::UINT), Type::UINT);
        assert_eq!(Type::BOOL.union(&Type::INT), Type::INT);
        assert_eq!(Type::INT.union(&Type::FLOAT), Type::Anything);
        assert_eq!(Type::BOOL.union(&Type::Anything), Type::Anything);
    }

    #[test]
    fn test_unify_keeps_parametric_applications() {
        assert_eq!(vec2(Type::BOOL).unify(&vec2(Type::UINT)), vec2(Type::UINT));
        assert_eq!(vec2(Type::BOOL).union(&vec2(Type::UINT)), Type::Anything);
        assert_eq!(
            vec2(Type::INT).unify(&Type::Nominal(Nominal::Vec2)),
            vec2(Type::INT)
        );
        assert_eq!(
            vec2(Type::INT).unify(&Type::Parametric(Nominal::Vec3, Box::new(Type::INT))),
            Type::Anything
        );
        assert_eq!(vec2(Type::INT).unify(&Type::FLOAT), Type::Anything);
        assert_eq!(vec2(Type::INT).unify(&Type::Unbound), vec2(Type::INT));
    }

    #[test]
    fn test_func_types() {
        let a = Type::Func(FuncType::new(vec![Type::BOOL, Type::INT], Type::UINT));
        let b = Type::Func(FuncType::new(vec![Type::UINT, Type::INT], Type::BOOL));
        assert_eq!(
            a.union(&b),
            Type::Func(FuncType::new(vec![Type::UINT, Type::INT], Type::UINT))
        );

        let unary = Type::Func(FuncType::new(vec![Type::INT], Type::INT));
        assert_eq!(a.union(&unary), Type::Anything);
        assert_eq!(unary.union(&Type::INT), Type::Anything);
    }

    #[test]
    fn test_queries() {
        assert_eq!(Type::Unbound.specificity(), None);
        assert_eq!(Type::Anything.specificity(), Some(0));
        assert_eq!(Type::BOOL.specificity(), Some(3));
        assert_eq!(
            Type::Constant(Nominal::Bool, Literal::Bool(true)).specificity(),
            Some(4)
        );
        assert!(Type::Constant(Nominal::Float, Literal::Float(2.0)).is_numeric());
        assert!(Type::BOOL.is_numeric());
        assert!(!Type::Anything.is_numeric());
        assert!(!vec2(Type::FLOAT).is_numeric());
        assert_eq!(
            Type::Constant(Nominal::Int, Literal::Int(3)).widen_constant(),
            Type::INT
        );
        assert_eq!(Type::constant(Literal::None), None);
        assert_eq!(Type::parametric(Nominal::Int, Type::INT), None);
    }

    #[test]
    fn test_height_covers_deepest_chain() {
        let deepest = Nominal::iter().map(Nominal::specificity).max().unwrap() as usize;
        // unbound -> constant -> nominal chain -> anything
        assert_eq!(LATTICE_HEIGHT, deepest + 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(vec2(Type::FLOAT).to_string(), "vec2(float)");
        assert_eq!(
            Type::Constant(Nominal::Int, Literal::Int(20)).to_string(),
            "Constant(int, 20)"
        );
        assert_eq!(
            Type::Func(FuncType::new(vec![Type::INT, Type::INT], Type::INT)).to_string(),
            "(int, int) -> int"
        );
    }
}
