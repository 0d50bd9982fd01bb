// Type system (§4.7): the `Type` lattice, compile-time `Variant`
// values, constantness, coercion, and the peer-resolution rule used to
// type binary operators.
//
// Integer width. `Dynamic` is the untyped compile-time integer
// (`ct_int`): it carries no fixed size and is only ever the type of an
// expression whose value is not yet pinned to a concrete width. Every
// other width is concrete.
//
// Overflow policy: arithmetic on concrete integer types and narrowing
// `cast_int` both wrap (two's-complement truncation), matching how a
// stack machine with fixed-width registers behaves without needing a
// distinct trapping or saturating code path. This is a design decision
// the distilled requirements left open; see DESIGN.md.

use std::fmt;
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Width {
    Dynamic,
    Bytes(u8),
    Pointer,
}

impl Width {
    // The width used to evaluate arithmetic at compile time. Pointers
    // are evaluated as 8-byte integers; `Dynamic` has no bit width
    // until it is resolved to a concrete type, so arithmetic on a bare
    // `ct_int` is carried at full `i128` precision until it peer-
    // resolves against a concrete operand.
    pub fn bits(&self) -> Option<u32> {
        match self {
            Width::Dynamic => None,
            Width::Bytes(n) => Some(*n as u32 * 8),
            Width::Pointer => Some(64),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IntTag {
    pub width: Width,
    pub signed: bool,
}

impl IntTag {
    pub const CT_INT: IntTag = IntTag { width: Width::Dynamic, signed: true };

    // The ten fixed concrete integer type tags named in §4.4/§4.9, in the
    // order `cast_int` packs them into its 4-bit operand.
    pub fn all_concrete() -> [IntTag; 10] {
        [
            IntTag { width: Width::Bytes(1), signed: true },
            IntTag { width: Width::Bytes(2), signed: true },
            IntTag { width: Width::Bytes(4), signed: true },
            IntTag { width: Width::Bytes(8), signed: true },
            IntTag { width: Width::Bytes(1), signed: false },
            IntTag { width: Width::Bytes(2), signed: false },
            IntTag { width: Width::Bytes(4), signed: false },
            IntTag { width: Width::Bytes(8), signed: false },
            IntTag { width: Width::Pointer, signed: true },
            IntTag { width: Width::Pointer, signed: false },
        ]
    }

    pub fn name(&self) -> &'static str {
        match (self.width, self.signed) {
            (Width::Dynamic, _) => "ct_int",
            (Width::Bytes(1), true) => "i1",
            (Width::Bytes(2), true) => "i2",
            (Width::Bytes(4), true) => "i4",
            (Width::Bytes(8), true) => "i8",
            (Width::Bytes(1), false) => "u1",
            (Width::Bytes(2), false) => "u2",
            (Width::Bytes(4), false) => "u4",
            (Width::Bytes(8), false) => "u8",
            (Width::Pointer, true) => "iptr",
            (Width::Pointer, false) => "uptr",
            _ => "int",
        }
    }

    pub fn from_name(name: &str) -> Option<IntTag> {
        Some(match name {
            "ct_int" => IntTag::CT_INT,
            "i1" => IntTag { width: Width::Bytes(1), signed: true },
            "i2" => IntTag { width: Width::Bytes(2), signed: true },
            "i4" => IntTag { width: Width::Bytes(4), signed: true },
            "i8" => IntTag { width: Width::Bytes(8), signed: true },
            "u1" => IntTag { width: Width::Bytes(1), signed: false },
            "u2" => IntTag { width: Width::Bytes(2), signed: false },
            "u4" => IntTag { width: Width::Bytes(4), signed: false },
            "u8" => IntTag { width: Width::Bytes(8), signed: false },
            "iptr" => IntTag { width: Width::Pointer, signed: true },
            "uptr" => IntTag { width: Width::Pointer, signed: false },
            _ => return None,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.width == Width::Dynamic
    }

    // Truncate `v` to this tag's width, wrapping on overflow. `ct_int`
    // is left untouched (it has no fixed width yet).
    pub fn wrap(&self, v: i128) -> i128 {
        let bits = match self.bits() {
            None => return v,
            Some(b) => b,
        };
        if bits >= 128 {
            return v;
        }
        let mask: i128 = (1i128 << bits) - 1;
        let truncated = v & mask;
        if self.signed {
            let sign_bit = 1i128 << (bits - 1);
            if truncated & sign_bit != 0 {
                truncated - (1i128 << bits)
            } else {
                truncated
            }
        } else {
            truncated
        }
    }

    fn bits(&self) -> Option<u32> {
        self.width.bits()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Integer(IntTag),
    Boolean,
    // The type of a type-valued expression, e.g. the identifier `i4`
    // itself, or the type expression in a constant's annotation.
    TypeOfTypes,
}

impl Type {
    pub fn ct_int() -> Type {
        Type::Integer(IntTag::CT_INT)
    }

    // Structural equality: `ct_int` only equals `ct_int`, never a
    // concretely sized integer, even one it would coerce to.
    pub fn same_as(&self, other: &Type) -> bool {
        self == other
    }

    // Can a value of type `self` be used where `target` is expected?
    // `ct_int` coerces to, and from, any concrete integer type (§4.7:
    // "if either width is dynamic, coercion is allowed in both
    // directions"). Two concrete integer types coerce only if their
    // signedness matches and `self`'s width is no wider than
    // `target`'s (bytes compare by size; `pointer` only compares equal
    // to `pointer`, never to a sized width). Booleans and types coerce
    // only to themselves.
    pub fn coerces_to(&self, target: &Type) -> bool {
        if self.same_as(target) {
            return true;
        }
        match (self, target) {
            (Type::Integer(a), Type::Integer(b)) => {
                if a.is_dynamic() || b.is_dynamic() {
                    return true;
                }
                if a.signed != b.signed {
                    return false;
                }
                match (a.width, b.width) {
                    (Width::Bytes(x), Width::Bytes(y)) => x <= y,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    // The result type of unifying two operand types under the same
    // binary operator (§4.7 "peer resolution"). Identical types unify
    // with themselves; `ct_int` unifies with any concrete integer type
    // to that concrete type; two concrete integers of matching
    // signedness unify to the wider of the two (`pointer` only unifies
    // with `pointer`); mismatched signedness, or mixing a sized width
    // with `pointer`, has no peer.
    pub fn peer(&self, other: &Type) -> Option<Type> {
        if self.same_as(other) {
            return Some(self.clone());
        }
        match (self, other) {
            (Type::Integer(a), Type::Integer(b)) if a.is_dynamic() && !b.is_dynamic() => {
                Some(Type::Integer(*b))
            }
            (Type::Integer(a), Type::Integer(b)) if !a.is_dynamic() && b.is_dynamic() => {
                Some(Type::Integer(*a))
            }
            (Type::Integer(a), Type::Integer(b)) => {
                if a.signed != b.signed {
                    return None;
                }
                match (a.width, b.width) {
                    (Width::Bytes(x), Width::Bytes(y)) => {
                        Some(Type::Integer(if x >= y { *a } else { *b }))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Integer(tag) => write!(f, "{}", tag.name()),
            Type::Boolean => write!(f, "bool"),
            Type::TypeOfTypes => write!(f, "type"),
        }
    }
}

// Where an expression's value falls on the constant-foldability
// lattice: `Constant < Unknown < NotConstant`. `mix` picks the least
// constant (rightmost) of its two arguments, so a single non-constant
// operand poisons the whole expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Constantness {
    Constant,
    Unknown,
    NotConstant,
}

impl Constantness {
    pub fn mix(self, other: Constantness) -> Constantness {
        self.max(other)
    }
}

// A compile-time value, produced by the bytecode evaluator and cached
// on constant declarations (and any sub-expression folded along the
// way). An integer carries its own width/signedness tag rather than
// always being `ct_int`, so `type_of` is a pure function of the value
// alone, per §3: "every non-`none` Variant has a deterministic
// `type_of` mapping back to a Type".
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    // The value produced by the VM's `end` instruction: no expression in
    // this language ever actually folds to it (every constant has a
    // value), but the instruction exists per §4.9 and must produce
    // something.
    None,
    Integer(i128, IntTag),
    Boolean(bool),
    Type(Rc<Type>),
}

impl Variant {
    pub fn ct_int(value: i128) -> Variant {
        Variant::Integer(value, IntTag::CT_INT)
    }

    // `None` has no corresponding `Type`; every other variant does.
    pub fn type_of(&self) -> Option<Type> {
        match self {
            Variant::None => None,
            Variant::Integer(_, tag) => Some(Type::Integer(*tag)),
            Variant::Boolean(_) => Some(Type::Boolean),
            Variant::Type(_) => Some(Type::TypeOfTypes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ct_int_only_equals_ct_int() {
        let ct = Type::ct_int();
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        assert!(ct.same_as(&Type::ct_int()));
        assert!(!ct.same_as(&i4));
    }

    #[test]
    fn ct_int_coerces_both_ways_with_a_concrete_type() {
        let ct = Type::ct_int();
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        assert!(ct.coerces_to(&i4));
        assert!(i4.coerces_to(&ct));
    }

    #[test]
    fn narrower_concrete_integer_coerces_to_wider_same_signedness() {
        let i1 = Type::Integer(IntTag::from_name("i1").unwrap());
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        assert!(i1.coerces_to(&i4));
        assert!(!i4.coerces_to(&i1));
    }

    #[test]
    fn mismatched_signedness_never_coerces() {
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        let u4 = Type::Integer(IntTag::from_name("u4").unwrap());
        assert!(!i4.coerces_to(&u4));
        assert!(!u4.coerces_to(&i4));
    }

    #[test]
    fn mismatched_signedness_has_no_peer() {
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        let u4 = Type::Integer(IntTag::from_name("u4").unwrap());
        assert_eq!(i4.peer(&u4), None);
    }

    #[test]
    fn same_signedness_peers_to_the_wider_width() {
        let i1 = Type::Integer(IntTag::from_name("i1").unwrap());
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        assert_eq!(i1.peer(&i4), Some(i4.clone()));
        assert_eq!(i4.peer(&i1), Some(i4));
    }

    #[test]
    fn ct_int_peers_to_the_concrete_side() {
        let ct = Type::ct_int();
        let i4 = Type::Integer(IntTag::from_name("i4").unwrap());
        assert_eq!(ct.peer(&i4), Some(i4.clone()));
        assert_eq!(i4.peer(&ct), Some(i4));
    }

    #[test]
    fn constantness_mix_takes_the_least_constant() {
        assert_eq!(Constantness::Constant.mix(Constantness::Unknown), Constantness::Unknown);
        assert_eq!(Constantness::Unknown.mix(Constantness::NotConstant), Constantness::NotConstant);
        assert_eq!(Constantness::Constant.mix(Constantness::Constant), Constantness::Constant);
    }

    #[test]
    fn wrap_truncates_to_signed_width() {
        let i1 = IntTag::from_name("i1").unwrap();
        assert_eq!(i1.wrap(127), 127);
        assert_eq!(i1.wrap(128), -128);
        assert_eq!(i1.wrap(256), 0);
    }

    #[test]
    fn wrap_truncates_to_unsigned_width() {
        let u1 = IntTag::from_name("u1").unwrap();
        assert_eq!(u1.wrap(255), 255);
        assert_eq!(u1.wrap(256), 0);
        assert_eq!(u1.wrap(-1), 255);
    }

    #[test]
    fn variant_type_of_recovers_its_own_width() {
        let i1 = IntTag::from_name("i1").unwrap();
        let v = Variant::Integer(5, i1);
        assert_eq!(v.type_of(), Some(Type::Integer(i1)));
        assert_eq!(Variant::Boolean(true).type_of(), Some(Type::Boolean));
        assert_eq!(Variant::None.type_of(), None);
    }
}
