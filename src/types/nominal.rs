//! Registered nominal types.
//!
//! Nominals form a forest rooted at `anything`: every nominal names the more
//! general type it belongs to, and its specificity is one more than that
//! parent's (with `anything` itself at zero). The set is fixed, so it is
//! modelled as a `Copy` enum with a static metadata registry instead of a
//! mutable global table.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::bytecode::Literal;

/// A pre-registered named type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Nominal {
    /// Signed integers
    Int,
    /// Unsigned integers, a subtype of `int`
    Uint,
    /// Booleans, a subtype of `uint`
    Bool,
    /// Floating point numbers
    Float,
    /// Two-component vectors, parametric over the component type
    Vec2,
    /// Three-component vectors, parametric over the component type
    Vec3,
    /// Four-component vectors, parametric over the component type
    Vec4,
}

/// Static metadata of a [`Nominal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NominalInfo {
    /// Registered name
    pub name: &'static str,
    /// More general nominal, `None` when the parent is `anything`
    pub generic: Option<Nominal>,
    /// Distance from `anything`
    pub specificity: u32,
    /// Whether the nominal must be applied to a type argument
    pub parametric: bool,
}

const REGISTRY: [NominalInfo; 7] = [
    NominalInfo {
        name: "int",
        generic: None,
        specificity: 1,
        parametric: false,
    },
    NominalInfo {
        name: "uint",
        generic: Some(Nominal::Int),
        specificity: 2,
        parametric: false,
    },
    NominalInfo {
        name: "bool",
        generic: Some(Nominal::Uint),
        specificity: 3,
        parametric: false,
    },
    NominalInfo {
        name: "float",
        generic: None,
        specificity: 1,
        parametric: false,
    },
    NominalInfo {
        name: "vec2",
        generic: None,
        specificity: 1,
        parametric: true,
    },
    NominalInfo {
        name: "vec3",
        generic: None,
        specificity: 1,
        parametric: true,
    },
    NominalInfo {
        name: "vec4",
        generic: None,
        specificity: 1,
        parametric: true,
    },
];

impl Nominal {
    /// Static metadata of this nominal.
    #[must_use]
    pub fn info(self) -> &'static NominalInfo {
        &REGISTRY[self as usize]
    }

    /// Registered name, e.g. `uint`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// The parent nominal, `None` when the parent is `anything`.
    #[must_use]
    pub fn generic(self) -> Option<Nominal> {
        self.info().generic
    }

    /// Distance from `anything` along the `generic` chain.
    #[must_use]
    pub fn specificity(self) -> u32 {
        self.info().specificity
    }

    /// Whether the nominal is a type constructor taking one argument.
    #[must_use]
    pub fn is_parametric(self) -> bool {
        self.info().parametric
    }

    /// Iterates from this nominal up through its ancestors.
    pub fn ancestors(self) -> impl Iterator<Item = Nominal> {
        std::iter::successors(Some(self), |nominal| nominal.generic())
    }

    /// The root of this nominal's family (the ancestor directly below `anything`).
    #[must_use]
    pub fn root(self) -> Nominal {
        self.ancestors().last().unwrap_or(self)
    }

    /// Static type of a literal, `None` for literals without one.
    #[must_use]
    pub fn of_literal(literal: &Literal) -> Option<Nominal> {
        match literal {
            Literal::Bool(_) => Some(Nominal::Bool),
            Literal::Int(_) => Some(Nominal::Int),
            Literal::Float(_) => Some(Nominal::Float),
            Literal::None => None,
        }
    }
}
