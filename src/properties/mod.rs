//! Physical properties and the dominance order between them.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use itertools::Itertools;

use crate::operators::scalar::ScalarExprRef;

pub mod derive;

/// A physical property of the rows produced by an operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Property {
    /// The output columns.
    Columns(Vec<ScalarExprRef>),
    /// The rows are sorted.
    Sort(SortSpec),
    /// The rows are distinct on the given columns.
    Distinct(Vec<ScalarExprRef>),
    /// At most `limit` rows are produced, starting at `offset`.
    Limit { offset: usize, limit: usize },
}

/// The kind of a [property](Property).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PropertyKind {
    Columns,
    Sort,
    Distinct,
    Limit,
}

impl Property {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Columns(_) => PropertyKind::Columns,
            Property::Sort(_) => PropertyKind::Sort,
            Property::Distinct(_) => PropertyKind::Distinct,
            Property::Limit { .. } => PropertyKind::Limit,
        }
    }

    /// Returns `true` if this property satisfies (`>=`) the `other` property.
    ///
    /// * `Columns(A) >= Columns(B)` iff `A ⊇ B`.
    /// * `Sort(A) >= Sort(B)` iff `B` is a subsequence of `A` with matching directions.
    /// * `Distinct(A) >= Distinct(B)` iff `A ⊆ B`: rows distinct on fewer columns are
    ///   also distinct on any superset of those columns.
    /// * `Limit` properties only satisfy exactly equal `Limit` properties.
    pub fn dominates(&self, other: &Property) -> bool {
        match (self, other) {
            (Property::Columns(lhs), Property::Columns(rhs)) => rhs.iter().all(|c| lhs.contains(c)),
            (Property::Sort(lhs), Property::Sort(rhs)) => lhs.satisfies(rhs),
            (Property::Distinct(lhs), Property::Distinct(rhs)) => lhs.iter().all(|c| rhs.contains(c)),
            (
                Property::Limit { offset, limit },
                Property::Limit {
                    offset: r_offset,
                    limit: r_limit,
                },
            ) => offset == r_offset && limit == r_limit,
            _ => false,
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Property::Columns(columns) => write!(f, "columns: [{}]", columns.iter().join(", ")),
            Property::Sort(sort) => write!(f, "ordering: {}", sort),
            Property::Distinct(columns) => write!(f, "distinct: [{}]", columns.iter().join(", ")),
            Property::Limit { offset, limit } => write!(f, "limit: {} offset: {}", limit, offset),
        }
    }
}

/// Describes how rows are sorted: an ordered list of expressions with sort directions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SortSpec {
    columns: Vec<SortColumn>,
}

impl SortSpec {
    /// Creates a sort specification from the given sort columns.
    ///
    /// # Panics
    ///
    /// This method panics if the sort columns are empty.
    pub fn new(columns: Vec<SortColumn>) -> Self {
        assert!(!columns.is_empty(), "sort columns are not specified");
        SortSpec { columns }
    }

    /// Creates a specification where all the given expressions are sorted in ascending order.
    pub fn ascending(columns: Vec<ScalarExprRef>) -> Self {
        SortSpec::new(columns.into_iter().map(SortColumn::asc).collect())
    }

    /// A reference to the sort columns.
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// Returns `true` if rows sorted by `self` are also sorted by `required`.
    /// The required columns must form a subsequence of this specification with
    /// matching sort directions, so that `Sort(a, b, c, d, e)` satisfies `Sort(a, c, e)`.
    pub fn satisfies(&self, required: &SortSpec) -> bool {
        let mut provided = self.columns.iter();
        for column in required.columns.iter() {
            if !provided.any(|p| p == column) {
                return false;
            }
        }
        true
    }

    /// Returns `true` if this specification is a prefix of the `other` specification.
    pub fn prefix_of(&self, other: &SortSpec) -> bool {
        if self.columns.len() > other.columns.len() {
            return false;
        }
        self.columns.iter().zip(other.columns.iter()).all(|(l, r)| l == r)
    }
}

impl Display for SortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.columns.iter().join(", "))
    }
}

/// A single sort key.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SortColumn {
    pub expr: ScalarExprRef,
    pub ascending: bool,
}

impl SortColumn {
    /// A key sorted in ascending order.
    pub fn asc(expr: ScalarExprRef) -> Self {
        SortColumn { expr, ascending: true }
    }

    /// A key sorted in descending order.
    pub fn desc(expr: ScalarExprRef) -> Self {
        SortColumn { expr, ascending: false }
    }
}

impl Display for SortColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", if self.ascending { "+" } else { "-" }, self.expr)
    }
}

/// An unordered collection of [properties](Property).
///
/// `A >= B` iff for every property `p` in `B` there is a property `q` in `A` with `q >= p`.
/// Hashing is order-independent and equality is multiset equality, so two sets holding
/// the same properties in different order are the same key in a winners table.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    properties: Vec<Property>,
}

impl PropertySet {
    /// Creates an empty property set.
    pub fn new() -> Self {
        PropertySet { properties: Vec::new() }
    }

    /// Creates a property set with a single property.
    pub fn with_property(property: Property) -> Self {
        PropertySet {
            properties: vec![property],
        }
    }

    /// Adds the given property to this set.
    pub fn add(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Returns a copy of this set with the given property added.
    pub fn with(&self, property: Property) -> PropertySet {
        let mut copy = self.clone();
        copy.add(property);
        copy
    }

    /// The properties of this set.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Returns `true` if this set has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Returns the first property of the given kind.
    pub fn get(&self, kind: PropertyKind) -> Option<&Property> {
        self.properties.iter().find(|p| p.kind() == kind)
    }

    /// Returns the required sort specification, if any.
    pub fn sort(&self) -> Option<&SortSpec> {
        match self.get(PropertyKind::Sort) {
            Some(Property::Sort(sort)) => Some(sort),
            _ => None,
        }
    }

    /// Returns `true` if some property in this set satisfies the given property.
    pub fn has_property(&self, property: &Property) -> bool {
        self.properties.iter().any(|p| p.dominates(property))
    }

    /// Returns `true` if this set satisfies (`>=`) the `other` set.
    pub fn dominates(&self, other: &PropertySet) -> bool {
        other.properties.iter().all(|p| self.has_property(p))
    }
}

impl PartialEq for PropertySet {
    fn eq(&self, other: &Self) -> bool {
        if self.properties.len() != other.properties.len() {
            return false;
        }
        // Multiset equality: every property of self is matched against a distinct property of other.
        let mut used = vec![false; other.properties.len()];
        for property in self.properties.iter() {
            let matched = other
                .properties
                .iter()
                .enumerate()
                .find(|(i, p)| !used[*i] && *p == property)
                .map(|(i, _)| i);
            match matched {
                Some(i) => used[i] = true,
                None => return false,
            }
        }
        true
    }
}

impl Eq for PropertySet {}

impl Hash for PropertySet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Combine member hashes with a commutative operation so the hash
        // does not depend on the order properties were added in.
        let mut combined = 0u64;
        for property in self.properties.iter() {
            let mut hasher = DefaultHasher::new();
            property.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        state.write_u64(combined);
        state.write_usize(self.properties.len());
    }
}

impl Display for PropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ {} }}", self.properties.iter().join(", "))
    }
}

impl From<Property> for PropertySet {
    fn from(property: Property) -> Self {
        PropertySet::with_property(property)
    }
}
