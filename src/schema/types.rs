use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{schema::ReadOp, Error, Result};

/// A dotted, fully qualified class name such as `android.os.IServiceManager`.
///
/// Nested classes keep their enclosing class in the name (`android.os.Outer.Inner`); the file
/// that declares them is derived from the first segment that starts with an upper-case letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Wrap a dotted name.
    pub fn new(name: impl Into<String>) -> Self {
        QualifiedName(name.into())
    }

    /// Build `package.name`, or just `name` for the default package.
    #[must_use]
    pub fn join(package: &str, name: &str) -> Self {
        if package.is_empty() {
            QualifiedName(name.to_string())
        } else {
            QualifiedName(format!("{package}.{name}"))
        }
    }

    /// The dotted string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dotted segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Last segment of the name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Segments before the first upper-case segment, joined with dots.
    #[must_use]
    pub fn package(&self) -> String {
        self.segments()
            .take_while(|segment| !starts_upper(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Relative path of the declaring source file without extension.
    ///
    /// `a.b.Outer.Inner` is declared in `a/b/Outer`.
    #[must_use]
    pub fn declaring_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.segments() {
            path.push(segment);
            if starts_upper(segment) {
                break;
            }
        }
        path
    }

    /// Relative path with one directory per segment, used for persisted schemas.
    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        let mut path: PathBuf = self.segments().collect();
        path.set_extension("json");
        path
    }

    /// `self.name`
    #[must_use]
    pub fn nested(&self, name: &str) -> Self {
        QualifiedName(format!("{}.{name}", self.0))
    }

    /// The enclosing class of a nested name.
    #[must_use]
    pub fn enclosing(&self) -> Option<QualifiedName> {
        let (outer, _) = self.0.rsplit_once('.')?;
        let outer = QualifiedName::new(outer);
        starts_upper(outer.simple_name()).then_some(outer)
    }
}

fn starts_upper(segment: &str) -> bool {
    segment.chars().next().is_some_and(char::is_uppercase)
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        QualifiedName::new(value)
    }
}

impl From<&QualifiedName> for QualifiedName {
    fn from(name: &QualifiedName) -> Self {
        name.clone()
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        QualifiedName(value)
    }
}

/// Where a class was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path relative to the source root it was found in
    pub relative: PathBuf,
    /// Absolute path on disk
    pub absolute: PathBuf,
}

impl SourceLocation {
    /// Build a location from a root and a path relative to it.
    #[must_use]
    pub fn new(root: &Path, relative: PathBuf) -> Self {
        SourceLocation {
            absolute: root.join(&relative),
            relative,
        }
    }

    /// File extension of the source, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.relative.extension().and_then(|ext| ext.to_str())
    }
}

/// An `import` statement.
///
/// Persisted as the imported path, with a trailing `.*` for wildcard imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImportDef {
    /// Imported class, or package for wildcard imports
    pub path: QualifiedName,
    /// `import pkg.*;`
    pub wildcard: bool,
}

impl ImportDef {
    /// Whether this import brings a type named `simple` into scope.
    #[must_use]
    pub fn imports(&self, simple: &str) -> bool {
        !self.wildcard && self.path.simple_name() == simple
    }
}

impl fmt::Display for ImportDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            write!(f, "{}.*", self.path)
        } else {
            write!(f, "{}", self.path)
        }
    }
}

impl FromStr for ImportDef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (path, wildcard) = match s.strip_suffix(".*") {
            Some(package) => (package, true),
            None => (s, false),
        };
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(malformed_error!("Invalid import - {}", s));
        }
        Ok(ImportDef {
            path: QualifiedName::new(path),
            wildcard,
        })
    }
}

impl TryFrom<String> for ImportDef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImportDef> for String {
    fn from(value: ImportDef) -> Self {
        value.to_string()
    }
}

/// Whether a parameter travels with the call, the reply, or both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Marshalled by the caller only
    #[default]
    In,
    /// Marshalled by the callee into the reply only
    Out,
    /// Marshalled both ways
    InOut,
}

impl Direction {
    /// Present in the request Parcel.
    #[must_use]
    pub fn is_incoming(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Present in the reply Parcel.
    #[must_use]
    pub fn is_outgoing(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Comparison used by a [`ConditionDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    #[strum(serialize = "==")]
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    #[serde(rename = "!=")]
    Ne,
    /// `<`
    #[strum(serialize = "<")]
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[strum(serialize = ">")]
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[strum(serialize = ">=")]
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    /// The operator selecting the `else` branch of the same comparison.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    /// Apply the comparison.
    #[must_use]
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// Presence predicate on a field: the field is on the wire only if an earlier field of the same
/// class compares true against a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionDef {
    /// Name of the earlier field
    pub field: String,
    /// Comparison operator
    pub op: CompareOp,
    /// Constant right-hand side
    pub value: i64,
}

impl ConditionDef {
    /// Evaluate against the decoded value of [`ConditionDef::field`].
    ///
    /// A missing or non-integral value never satisfies the predicate.
    #[must_use]
    pub fn evaluate(&self, prior: Option<i64>) -> bool {
        prior.is_some_and(|lhs| self.op.evaluate(lhs, self.value))
    }

    /// The same predicate with the operator negated.
    #[must_use]
    pub fn negated(&self) -> Self {
        ConditionDef {
            field: self.field.clone(),
            op: self.op.negate(),
            value: self.value,
        }
    }
}

/// A parcelable field, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type as written in source, if known
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// How the field is read
    pub call: ReadOp,
    /// Presence predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDef>,
}

impl FieldDef {
    /// Unconditional field.
    pub fn new(name: impl Into<String>, call: ReadOp) -> Self {
        FieldDef {
            name: name.into(),
            ty: None,
            call,
            condition: None,
        }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name
    pub name: String,
    /// Declared type as written in source, if known
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// How the parameter is read
    pub call: ReadOp,
    /// Which Parcel carries it
    pub direction: Direction,
}

/// A method's return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDef {
    /// Declared type as written in source, if known
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// How the value is read from the reply
    pub call: ReadOp,
}

/// One entry of a Binder interface's dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Transaction code
    pub tc: u32,
    /// No reply is sent
    pub oneway: bool,
    /// Return value, `null` for `void`
    pub retval: Option<ReturnDef>,
    /// Parameters in declaration order
    pub arguments: Vec<ParameterDef>,
}

/// Compiled layout of a parcelable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParcelableDef {
    /// Fields in wire order
    pub fields: Vec<FieldDef>,
    /// A `CREATOR` field is declared
    #[serde(default)]
    pub creator: bool,
    /// A `Parcel` constructor is declared
    #[serde(default)]
    pub constructor: bool,
    /// The wire form carries a leading `i32` total size
    #[serde(default)]
    pub structured: bool,
    /// No declaration describes the wire layout; decoding an instance halts
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub opaque: bool,
}

impl ParcelableDef {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Compiled dispatch table of a Binder interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinderDef {
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
}

impl BinderDef {
    /// The method a transaction code dispatches to.
    #[must_use]
    pub fn method(&self, tc: u32) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.tc == tc)
    }

    /// Look up a method by name.
    #[must_use]
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// The two compiled class variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassKind {
    /// A data class
    Parcelable(ParcelableDef),
    /// An interface
    Binder(BinderDef),
}

/// A compiled class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Qualified name, also the interface descriptor for binders
    pub name: QualifiedName,
    /// Source the class was compiled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Imports of the declaring file
    #[serde(default)]
    pub imports: Vec<ImportDef>,
    /// Compiled body
    #[serde(flatten)]
    pub kind: ClassKind,
}

impl ClassDef {
    /// Empty parcelable, used as the in-flight placeholder and for classes without a layout.
    #[must_use]
    pub fn empty(name: QualifiedName) -> Self {
        ClassDef {
            name,
            location: None,
            imports: Vec::new(),
            kind: ClassKind::Parcelable(ParcelableDef::default()),
        }
    }

    /// The parcelable body, if this is a parcelable.
    #[must_use]
    pub fn as_parcelable(&self) -> Option<&ParcelableDef> {
        match &self.kind {
            ClassKind::Parcelable(def) => Some(def),
            ClassKind::Binder(_) => None,
        }
    }

    /// The binder body, if this is an interface.
    #[must_use]
    pub fn as_binder(&self) -> Option<&BinderDef> {
        match &self.kind {
            ClassKind::Binder(def) => Some(def),
            ClassKind::Parcelable(_) => None,
        }
    }

    /// `true` for interfaces.
    #[must_use]
    pub fn is_binder(&self) -> bool {
        matches!(self.kind, ClassKind::Binder(_))
    }

    /// The interface token a caller writes into the request envelope.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        self.name.as_str()
    }
}
