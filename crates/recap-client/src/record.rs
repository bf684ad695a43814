//! Typed records emitted by the search service.
//!
//! Each variant has a fixed set of named fields. Field names match the wire
//! schema (`fieldX`, `fieldY`, `fieldZ`) because they become the keys of the
//! submitted summary.

use std::fmt;
use std::str::FromStr;

use recap_proto as proto;

/// Record type names known to the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// `ItemA`, the only type emitted by the single-record fetch.
    ItemA,
    /// `ItemB`
    ItemB,
    /// `ItemC`
    ItemC,
}

impl RecordKind {
    /// All known kinds, in declaration order.
    pub const ALL: [RecordKind; 3] = [RecordKind::ItemA, RecordKind::ItemB, RecordKind::ItemC];

    /// Name used on the wire and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ItemA => "ItemA",
            Self::ItemB => "ItemB",
            Self::ItemC => "ItemC",
        }
    }
}

impl Default for RecordKind {
    fn default() -> Self {
        Self::ItemA
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no known record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecordKind(pub String);

impl fmt::Display for UnknownRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected one of ItemA, ItemB, ItemC, got '{}' instead",
            self.0
        )
    }
}

impl std::error::Error for UnknownRecordKind {}

impl FromStr for RecordKind {
    type Err = UnknownRecordKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownRecordKind(s.to_string()))
    }
}

/// `ItemA` record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemA {
    /// `fieldX`, free text.
    pub field_x: String,
    /// `fieldY`, ordered numbers.
    pub field_y: Vec<i32>,
    /// `fieldZ`, optional number.
    pub field_z: Option<i32>,
}

/// `ItemB` record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemB {
    /// `fieldX`, a number.
    pub field_x: i32,
    /// `fieldY`, optional ordered strings.
    pub field_y: Option<Vec<String>>,
    /// `fieldZ`, distinct strings in server order.
    pub field_z: Vec<String>,
}

/// `ItemC` record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemC {
    /// `fieldX`, a flag.
    pub field_x: bool,
}

/// One record of any known kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// An `ItemA` record.
    A(ItemA),
    /// An `ItemB` record.
    B(ItemB),
    /// An `ItemC` record.
    C(ItemC),
}

/// A present field value, either a scalar or an ordered sequence of scalars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Single value in its display form.
    Scalar(String),
    /// Values in order, each in its display form.
    Sequence(Vec<String>),
}

impl FieldValue {
    fn scalar(value: impl ToString) -> Self {
        Self::Scalar(value.to_string())
    }

    fn sequence<T: ToString>(values: &[T]) -> Self {
        Self::Sequence(values.iter().map(ToString::to_string).collect())
    }

    /// Canonical string form used in summaries.
    ///
    /// Sequences are joined with `,` without escaping, so `["a,b"]` and
    /// `["a", "b"]` share a canonical form.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Sequence(values) => values.join(","),
        }
    }
}

/// A named field of a record; `None` marks an absent value.
pub type Field = (&'static str, Option<FieldValue>);

impl Record {
    /// Kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::A(_) => RecordKind::ItemA,
            Self::B(_) => RecordKind::ItemB,
            Self::C(_) => RecordKind::ItemC,
        }
    }

    /// Every field the variant defines, in schema order.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::A(item) => vec![
                ("fieldX", Some(FieldValue::scalar(&item.field_x))),
                ("fieldY", Some(FieldValue::sequence(&item.field_y))),
                ("fieldZ", item.field_z.map(FieldValue::scalar)),
            ],
            Self::B(item) => vec![
                ("fieldX", Some(FieldValue::scalar(item.field_x))),
                (
                    "fieldY",
                    item.field_y.as_deref().map(FieldValue::sequence),
                ),
                ("fieldZ", Some(FieldValue::sequence(&item.field_z))),
            ],
            Self::C(item) => vec![("fieldX", Some(FieldValue::scalar(item.field_x)))],
        }
    }
}

impl From<proto::ItemA> for ItemA {
    fn from(item: proto::ItemA) -> Self {
        Self {
            field_x: item.field_x,
            field_y: item.field_y,
            field_z: item.field_z,
        }
    }
}

impl From<proto::ItemB> for ItemB {
    fn from(item: proto::ItemB) -> Self {
        Self {
            field_x: item.field_x,
            field_y: item.field_y.map(|list| list.values),
            field_z: item.field_z,
        }
    }
}

impl From<proto::ItemC> for ItemC {
    fn from(item: proto::ItemC) -> Self {
        Self {
            field_x: item.field_x,
        }
    }
}

impl From<proto::ItemA> for Record {
    fn from(item: proto::ItemA) -> Self {
        Self::A(item.into())
    }
}

impl From<proto::ItemB> for Record {
    fn from(item: proto::ItemB) -> Self {
        Self::B(item.into())
    }
}

impl From<proto::ItemC> for Record {
    fn from(item: proto::ItemC) -> Self {
        Self::C(item.into())
    }
}
