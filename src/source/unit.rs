use std::{fmt, path::PathBuf};

use bitflags::bitflags;

use crate::{
    schema::{CompareOp, ImportDef, QualifiedName, ReadOp},
    Result,
};

/// A type reference exactly as written in source: `int`, `String[]`, `List<Foo>`,
/// `Map<String, android.os.Bundle>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Possibly dotted name, without generic arguments or array suffix
    pub name: String,
    /// Generic arguments
    pub args: Vec<TypeRef>,
    /// Number of `[]` suffixes
    pub dims: usize,
}

impl TypeRef {
    /// A plain, non-generic, non-array type.
    pub fn simple(name: impl Into<String>) -> Self {
        TypeRef {
            name: name.into(),
            args: Vec::new(),
            dims: 0,
        }
    }

    /// `void`
    #[must_use]
    pub fn void() -> Self {
        TypeRef::simple("void")
    }

    /// Whether this is the `void` pseudo type.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.name == "void" && self.dims == 0
    }

    /// Element type of an array reference.
    #[must_use]
    pub fn element(&self) -> Option<TypeRef> {
        (self.dims > 0).then(|| TypeRef {
            name: self.name.clone(),
            args: self.args.clone(),
            dims: self.dims - 1,
        })
    }

    /// Parse a textual type reference.
    ///
    /// Whitespace is ignored, fixed-size array suffixes (`int[3]`) count as arrays and the
    /// `? extends` wildcard prefix is dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on unbalanced brackets or empty names.
    pub fn parse(text: &str) -> Result<TypeRef> {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut pos = 0;
        let parsed = parse_type(&chars, &mut pos)?;
        if pos != chars.len() {
            return Err(malformed_error!("Trailing characters in type '{}'", text));
        }
        Ok(parsed)
    }
}

fn parse_type(chars: &[char], pos: &mut usize) -> Result<TypeRef> {
    if chars[*pos..].starts_with(&['?']) {
        *pos += 1;
        for keyword in ["extends", "super"] {
            let keyword: Vec<char> = keyword.chars().collect();
            if chars[*pos..].starts_with(&keyword) {
                *pos += keyword.len();
            }
        }
    }

    let start = *pos;
    while *pos < chars.len() && (chars[*pos].is_alphanumeric() || matches!(chars[*pos], '_' | '.' | '$'))
    {
        *pos += 1;
    }
    if start == *pos {
        // A bare `?` wildcard
        if start > 0 && chars[start - 1] == '?' {
            return Ok(TypeRef::simple("Object"));
        }
        return Err(malformed_error!("Expected a type name at {}", start));
    }

    let mut parsed = TypeRef::simple(chars[start..*pos].iter().collect::<String>());

    if chars.get(*pos) == Some(&'<') {
        *pos += 1;
        loop {
            parsed.args.push(parse_type(chars, pos)?);
            match chars.get(*pos) {
                Some(',') => *pos += 1,
                Some('>') => {
                    *pos += 1;
                    break;
                }
                _ => return Err(malformed_error!("Unterminated generic arguments at {}", *pos)),
            }
        }
    }

    while chars.get(*pos) == Some(&'[') {
        *pos += 1;
        while chars.get(*pos).is_some_and(char::is_ascii_digit) {
            *pos += 1;
        }
        if chars.get(*pos) != Some(&']') {
            return Err(malformed_error!("Unterminated array suffix at {}", *pos));
        }
        *pos += 1;
        parsed.dims += 1;
    }

    Ok(parsed)
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (index, arg) in self.args.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Declaration modifiers relevant to Parcel layout
    pub struct Modifiers: u32 {
        /// `static`
        const STATIC = 0x0001;
        /// `final`
        const FINAL = 0x0002;
        /// `transient`
        const TRANSIENT = 0x0004;
        /// `const` (AIDL constants)
        const CONST = 0x0008;
        /// `oneway`
        const ONEWAY = 0x0010;
        /// `in`
        const IN = 0x0020;
        /// `out`
        const OUT = 0x0040;
        /// `inout`
        const INOUT = 0x0080;
        /// `public`
        const PUBLIC = 0x0100;
        /// `private`
        const PRIVATE = 0x0200;
        /// `abstract`
        const ABSTRACT = 0x0400;
    }
}

impl Modifiers {
    /// Map a source keyword to its flag.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Modifiers> {
        Some(match keyword {
            "static" => Modifiers::STATIC,
            "final" => Modifiers::FINAL,
            "transient" => Modifiers::TRANSIENT,
            "const" => Modifiers::CONST,
            "oneway" => Modifiers::ONEWAY,
            "in" => Modifiers::IN,
            "out" => Modifiers::OUT,
            "inout" => Modifiers::INOUT,
            "public" => Modifiers::PUBLIC,
            "private" => Modifiers::PRIVATE,
            "abstract" => Modifiers::ABSTRACT,
            _ => return None,
        })
    }

    /// Whether a field with these modifiers is part of an instance's wire form.
    #[must_use]
    pub fn is_instance_field(self) -> bool {
        !self.intersects(Modifiers::STATIC | Modifiers::TRANSIENT | Modifiers::CONST)
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Modifiers
    pub modifiers: Modifiers,
}

/// A method or constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Modifiers, including the AIDL direction keywords
    pub modifiers: Modifiers,
    /// Annotation names without the `@`
    pub annotations: Vec<String>,
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    /// Method name
    pub name: String,
    /// Return type, [`TypeRef::void`] for no return value
    pub ret: TypeRef,
    /// Parameters in order
    pub params: Vec<ParamDecl>,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Explicit transaction code (`= N` in AIDL)
    pub code: Option<u32>,
    /// Annotation names without the `@`
    pub annotations: Vec<String>,
}

/// A constructor declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstructorDecl {
    /// Parameters in order
    pub params: Vec<ParamDecl>,
}

/// Where a marshal step gets its read operation from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalSource {
    /// Resolve a declared type, like a plain field
    Type(TypeRef),
    /// An explicit `Parcel` call recognised by the source reader
    Call(ReadOp),
}

/// One statement of a custom unmarshal routine such as `readFromParcel(Parcel in)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalStep {
    /// `target = in.readX();`
    Read {
        /// Member being assigned
        target: String,
        /// Read performed
        source: MarshalSource,
    },
    /// `if (in.readX() OP value) { then } else { otherwise }`
    Condition {
        /// Read performed to evaluate the condition
        source: MarshalSource,
        /// Comparison operator
        op: CompareOp,
        /// Constant compared against
        value: i64,
        /// Steps when the comparison holds
        then: Vec<MarshalStep>,
        /// Steps when it does not
        otherwise: Vec<MarshalStep>,
    },
    /// An early `return`, nothing after it is read.
    Stop,
}

/// What a unit declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    /// A Binder interface
    Interface,
    /// An AIDL parcelable, `structured` when declared with a body
    Parcelable {
        /// Declared with fields in AIDL
        structured: bool,
    },
    /// A plain class; parcelable if it carries the marshaling contract
    Class,
    /// An AIDL enum marshalled as its backing primitive
    Enum {
        /// Backing type (`byte` unless `@Backing` says otherwise)
        backing: TypeRef,
    },
    /// An AIDL union: an `i32` tag followed by the selected member
    Union,
}

impl UnitKind {
    /// Short lowercase name used in reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            UnitKind::Interface => "interface",
            UnitKind::Parcelable { .. } => "parcelable",
            UnitKind::Class => "class",
            UnitKind::Enum { .. } => "enum",
            UnitKind::Union => "union",
        }
    }
}

/// One parsed class declaration, as produced by a [`crate::source::SourceParser`].
///
/// Nested declarations are separate units whose [`DeclUnit::name`] contains the enclosing
/// names (`Outer.Inner`). Units are read-only once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclUnit {
    /// Package, empty for the default package
    pub package: String,
    /// Simple name, dotted for nested declarations
    pub name: String,
    /// Declaration kind
    pub kind: UnitKind,
    /// Imports of the declaring file
    pub imports: Vec<ImportDef>,
    /// `extends` / `implements` list
    pub supertypes: Vec<TypeRef>,
    /// Annotation names without the `@`
    pub annotations: Vec<String>,
    /// Modifiers of the declaration itself
    pub modifiers: Modifiers,
    /// Fields in declaration order
    pub fields: Vec<FieldDecl>,
    /// Methods in declaration order
    pub methods: Vec<MethodDecl>,
    /// Constructors in declaration order
    pub constructors: Vec<ConstructorDecl>,
    /// Custom unmarshal routine, overrides field order when present
    pub marshal: Option<Vec<MarshalStep>>,
    /// File the unit was read from
    pub path: PathBuf,
    /// Source language tag (`aidl`, `java`)
    pub language: &'static str,
}

impl DeclUnit {
    /// An empty unit of the given kind.
    pub fn new(package: impl Into<String>, name: impl Into<String>, kind: UnitKind) -> Self {
        DeclUnit {
            package: package.into(),
            name: name.into(),
            kind,
            imports: Vec::new(),
            supertypes: Vec::new(),
            annotations: Vec::new(),
            modifiers: Modifiers::empty(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            marshal: None,
            path: PathBuf::new(),
            language: "aidl",
        }
    }

    /// `package.Name`
    #[must_use]
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::join(&self.package, &self.name)
    }

    /// A static field named `CREATOR` is declared.
    #[must_use]
    pub fn has_creator(&self) -> bool {
        self.fields.iter().any(|field| field.name == "CREATOR")
    }

    /// A constructor taking exactly one `Parcel` is declared.
    #[must_use]
    pub fn has_parcel_constructor(&self) -> bool {
        self.constructors.iter().any(|ctor| {
            ctor.params.len() == 1
                && matches!(ctor.params[0].ty.name.as_str(), "Parcel" | "android.os.Parcel")
        })
    }

    /// Implements `Parcelable` directly.
    #[must_use]
    pub fn implements_parcelable(&self) -> bool {
        self.supertypes
            .iter()
            .any(|ty| matches!(ty.name.as_str(), "Parcelable" | "android.os.Parcelable"))
    }

    /// Carries a Parcel marshaling contract of any kind.
    #[must_use]
    pub fn is_parcelable(&self) -> bool {
        match self.kind {
            UnitKind::Parcelable { .. } | UnitKind::Union => true,
            UnitKind::Class => {
                self.implements_parcelable() || self.has_creator() || self.has_parcel_constructor()
            }
            UnitKind::Interface | UnitKind::Enum { .. } => false,
        }
    }

    /// A parcelable or class that does not describe its own wire layout: a forward
    /// declaration like `parcelable Foo;`, or a class without the Parcel contract.
    #[must_use]
    pub fn lacks_layout(&self) -> bool {
        if self.marshal.is_some() {
            return false;
        }
        match self.kind {
            UnitKind::Parcelable { structured } => !structured && self.fields.is_empty(),
            UnitKind::Class => !self.is_parcelable(),
            UnitKind::Interface | UnitKind::Union | UnitKind::Enum { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_refs() {
        let ty = TypeRef::parse("int").unwrap();
        assert_eq!(ty, TypeRef::simple("int"));

        let ty = TypeRef::parse("android.os.Bundle[][]").unwrap();
        assert_eq!(ty.name, "android.os.Bundle");
        assert_eq!(ty.dims, 2);
        assert_eq!(ty.element().unwrap().dims, 1);

        let ty = TypeRef::parse("Map<String, List<Foo>>").unwrap();
        assert_eq!(ty.name, "Map");
        assert_eq!(ty.args.len(), 2);
        assert_eq!(ty.args[1].args[0], TypeRef::simple("Foo"));
        assert_eq!(ty.to_string(), "Map<String, List<Foo>>");

        let ty = TypeRef::parse("List<? extends Parcelable>").unwrap();
        assert_eq!(ty.args[0].name, "Parcelable");

        assert_eq!(TypeRef::parse("byte[16]").unwrap().dims, 1);
    }

    #[test]
    fn test_parse_type_errors() {
        assert!(TypeRef::parse("").is_err());
        assert!(TypeRef::parse("List<int").is_err());
        assert!(TypeRef::parse("int[").is_err());
        assert!(TypeRef::parse("int)").is_err());
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(Modifiers::from_keyword("inout"), Some(Modifiers::INOUT));
        assert_eq!(Modifiers::from_keyword("volatile"), None);
        assert!(Modifiers::FINAL.is_instance_field());
        assert!(!(Modifiers::STATIC | Modifiers::FINAL).is_instance_field());
    }

    #[test]
    fn test_parcelable_contract() {
        let mut unit = DeclUnit::new("a", "Plain", UnitKind::Class);
        assert!(!unit.is_parcelable());

        unit.constructors.push(ConstructorDecl {
            params: vec![ParamDecl {
                name: "in".into(),
                ty: TypeRef::simple("Parcel"),
                modifiers: Modifiers::empty(),
                annotations: Vec::new(),
            }],
        });
        assert!(unit.has_parcel_constructor());
        assert!(unit.is_parcelable());
        assert_eq!(unit.qualified_name().as_str(), "a.Plain");
    }

    #[test]
    fn test_lacks_layout() {
        let mut forward = DeclUnit::new("a", "F", UnitKind::Parcelable { structured: false });
        assert!(forward.lacks_layout());
        forward.marshal = Some(vec![MarshalStep::Stop]);
        assert!(!forward.lacks_layout());

        assert!(!DeclUnit::new("a", "S", UnitKind::Parcelable { structured: true }).lacks_layout());
        assert!(DeclUnit::new("a", "C", UnitKind::Class).lacks_layout());
        assert!(!DeclUnit::new("a", "I", UnitKind::Interface).lacks_layout());
    }
}
