use core::ffi::{CStr, c_char};
use core::ops::{BitOr, BitOrAssign};

use abi_stable::StableAbi;

use crate::handles::TypeHandle;

/// Bitmask of cv-qualifiers (plus `restrict`).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QualKind(pub u8);

impl QualKind {
    pub const NONE: Self = Self(0);
    pub const CONST: Self = Self(1);
    pub const VOLATILE: Self = Self(1 << 1);
    pub const RESTRICT: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for QualKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for QualKind {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Value category of an expression of a given type.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StableAbi)]
pub enum ValueKind {
    None,
    LValue,
    RValue,
}

/// Operand counts an overloaded operator can be declared with.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StableAbi)]
pub enum OperatorArity {
    Unary = 1,
    Binary = 2,
    Both = 3,
}

impl OperatorArity {
    /// True when an operator with arity `self` is accepted by a `filter` query.
    pub const fn matches(self, filter: Self) -> bool {
        (self as u8) & (filter as u8) != 0
    }
}

macro_rules! operators {
    ($($variant:ident => $spelling:literal, $unary:literal, $binary:literal;)*) => {
        /// Overloadable C++ operators.
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StableAbi)]
        pub enum Operator {
            None,
            $($variant,)*
        }

        impl Operator {
            pub const ALL: &'static [Operator] = &[$(Operator::$variant,)*];

            /// Source spelling without the `operator` keyword; empty for `None`.
            pub const fn spelling(self) -> &'static str {
                match self {
                    Operator::None => "",
                    $(Operator::$variant => $spelling,)*
                }
            }

            /// Arity class of the operator kind.
            pub const fn arity(self) -> Option<OperatorArity> {
                match self {
                    Operator::None => None,
                    $(Operator::$variant => match ($unary, $binary) {
                        (true, true) => Some(OperatorArity::Both),
                        (true, false) => Some(OperatorArity::Unary),
                        (false, true) => Some(OperatorArity::Binary),
                        (false, false) => None,
                    },)*
                }
            }
        }
    };
}

operators! {
    New => "new", true, true;
    Delete => "delete", true, true;
    ArrayNew => "new[]", true, true;
    ArrayDelete => "delete[]", true, true;
    Plus => "+", true, true;
    Minus => "-", true, true;
    Star => "*", true, true;
    Slash => "/", false, true;
    Percent => "%", false, true;
    Caret => "^", false, true;
    Amp => "&", true, true;
    Pipe => "|", false, true;
    Tilde => "~", true, false;
    Exclaim => "!", true, false;
    Equal => "=", false, true;
    Less => "<", false, true;
    Greater => ">", false, true;
    PlusEqual => "+=", false, true;
    MinusEqual => "-=", false, true;
    StarEqual => "*=", false, true;
    SlashEqual => "/=", false, true;
    PercentEqual => "%=", false, true;
    CaretEqual => "^=", false, true;
    AmpEqual => "&=", false, true;
    PipeEqual => "|=", false, true;
    LessLess => "<<", false, true;
    GreaterGreater => ">>", false, true;
    LessLessEqual => "<<=", false, true;
    GreaterGreaterEqual => ">>=", false, true;
    EqualEqual => "==", false, true;
    ExclaimEqual => "!=", false, true;
    LessEqual => "<=", false, true;
    GreaterEqual => ">=", false, true;
    Spaceship => "<=>", false, true;
    AmpAmp => "&&", false, true;
    PipePipe => "||", false, true;
    PlusPlus => "++", true, false;
    MinusMinus => "--", true, false;
    Comma => ",", false, true;
    ArrowStar => "->*", false, true;
    Arrow => "->", true, false;
    Call => "()", true, true;
    Subscript => "[]", false, true;
    Conditional => "?", false, true;
    Coawait => "co_await", true, false;
}

impl Operator {
    /// Operator whose spelling is exactly `spelling`; `None` when unknown.
    pub fn from_spelling(spelling: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.spelling() == spelling)
            .unwrap_or(Self::None)
    }

    /// Parses a declaration name such as `operator+=` or `operator new[]`.
    pub fn from_function_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("operator")?;
        let compact: String = rest.chars().filter(|ch| !ch.is_whitespace()).collect();
        match Self::from_spelling(&compact) {
            Self::None => None,
            op => Some(op),
        }
    }
}

/// A template argument: a type, optionally with the literal text of a
/// non-type argument.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateArgInfo {
    pub ty: TypeHandle,
    pub integral_value: *const c_char,
}

impl TemplateArgInfo {
    pub const fn from_type(ty: TypeHandle) -> Self {
        Self {
            ty,
            integral_value: core::ptr::null(),
        }
    }

    pub const fn with_value(ty: TypeHandle, value: &'static CStr) -> Self {
        Self {
            ty,
            integral_value: value.as_ptr(),
        }
    }

    /// Literal text of a non-type argument.
    ///
    /// # Safety
    /// `integral_value` must be null or point to a live NUL-terminated string.
    pub unsafe fn value(&self) -> Option<&CStr> {
        if self.integral_value.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(self.integral_value) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_spelling_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_spelling(op.spelling()), *op);
        }
        assert_eq!(Operator::from_spelling("<>"), Operator::None);
        assert_eq!(Operator::None.spelling(), "");
    }

    #[test]
    fn test_operator_from_function_name() {
        assert_eq!(Operator::from_function_name("operator+="), Some(Operator::PlusEqual));
        assert_eq!(
            Operator::from_function_name("operator new []"),
            Some(Operator::ArrayNew)
        );
        assert_eq!(Operator::from_function_name("operator()"), Some(Operator::Call));
        assert_eq!(Operator::from_function_name("plus"), None);
    }

    #[test]
    fn test_operator_arity() {
        assert_eq!(Operator::Plus.arity(), Some(OperatorArity::Both));
        assert_eq!(Operator::Tilde.arity(), Some(OperatorArity::Unary));
        assert_eq!(Operator::Subscript.arity(), Some(OperatorArity::Binary));
        assert!(OperatorArity::Both.matches(OperatorArity::Unary));
        assert!(!OperatorArity::Unary.matches(OperatorArity::Binary));
    }

    #[test]
    fn test_qual_kind_bits() {
        let cv = QualKind::CONST | QualKind::VOLATILE;
        assert!(cv.contains(QualKind::CONST));
        assert!(!cv.contains(QualKind::RESTRICT));
        assert_eq!(cv.without(QualKind::CONST), QualKind::VOLATILE);
        assert!(QualKind::NONE.is_empty());
    }
}
