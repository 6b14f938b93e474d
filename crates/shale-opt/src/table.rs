//! The specialization table: static metadata keyed by (attribute, shape).
//!
//! Each entry says whether the generic attribute node may narrow to the
//! shape, whether a specialized operation exists for the target generation,
//! how call arguments map onto the operation's constructors, and which
//! variation to pick when several constructors exist.
//!
//! The process-wide builtin table is built once by [`init_builtin_table`]
//! and never mutated afterwards. Synthetic tables for tests and embedders
//! go through the same validating constructor, [`SpecializationTable::from_specs`].

use std::fmt;
use std::sync::OnceLock;

use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::shape::{Shape, TargetGeneration, VersionPredicate, SHAPE_PRIORITY};

/// Names a concrete specialized operation node type.
///
/// Operations belong to the shape they were registered for; the display
/// form is the node type name, e.g. `DictOperationGet3`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationId {
    pub shape: Shape,
    pub name: &'static str,
}

impl OperationId {
    pub const fn new(shape: Shape, name: &'static str) -> Self {
        OperationId { shape, name }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.shape {
            Shape::Dict => "Dict",
            Shape::Str => "Str",
            Shape::Bytes => "Bytes",
        };
        write!(f, "{family}Operation{}", self.name)
    }
}

/// A static requirement a call argument must meet for extraction to succeed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgConstraint {
    Any,
    /// The argument must be proven to be exactly this shape.
    ExactShape(Shape),
}

/// One declared parameter of an attribute's call signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub constraint: ArgConstraint,
}

impl ParamSpec {
    pub const fn any(name: &'static str) -> Self {
        ParamSpec {
            name,
            constraint: ArgConstraint::Any,
        }
    }

    pub const fn exact(name: &'static str, shape: Shape) -> Self {
        ParamSpec {
            name,
            constraint: ArgConstraint::ExactShape(shape),
        }
    }
}

/// The discriminating test that selects a variation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VariationTest {
    /// The default taken when no other test succeeds.
    Base,
    /// Succeeds when the call supplies the declared parameter at this index,
    /// positionally or by keyword.
    Supplied(usize),
}

/// One specialized constructor among several for an (attribute, shape).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variation {
    /// Operation name within the entry's shape family.
    pub op: &'static str,
    /// Indices into the declared parameters, in constructor argument order.
    pub args: Vec<usize>,
    pub test: VariationTest,
}

impl Variation {
    pub fn new(op: &'static str, args: &[usize], test: VariationTest) -> Self {
        Variation {
            op,
            args: args.to_vec(),
            test,
        }
    }

    /// Number of declared parameters this constructor consumes.
    pub fn specificity(&self) -> usize {
        self.args.len()
    }
}

/// How a call maps onto specialized constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constructors {
    /// One constructor taking every declared parameter.
    Single(&'static str),
    /// Behaviour differs between generations; both constructors take every
    /// declared parameter.
    VersionSplit {
        legacy: &'static str,
        modern: &'static str,
    },
    /// Several constructors, ordered most specific first with the base last.
    Variations(Vec<Variation>),
}

/// A replacement built when the call supplies zero arguments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmptyCase {
    /// Evaluate the source for its side effects and yield `None`.
    NoneWithSourceEffects,
}

/// Everything the pass knows about one (attribute, shape) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationSpec {
    pub attribute: &'static str,
    pub shape: Shape,
    /// Gate on the generic node narrowing to this shape at all.
    pub applicable: VersionPredicate,
    /// Gate on the specialized operation existing for the target.
    pub available: VersionPredicate,
    pub params: Vec<ParamSpec>,
    /// Whether keyword arguments may name declared parameters.
    pub keywords: bool,
    pub constructors: Option<Constructors>,
    pub empty_case: Option<EmptyCase>,
    /// Exact shape of the operation's result, when it is always the same.
    pub returns: Option<Shape>,
}

impl OperationSpec {
    /// An entry with no parameters and no specialized operation.
    pub fn new(attribute: &'static str, shape: Shape) -> Self {
        OperationSpec {
            attribute,
            shape,
            applicable: VersionPredicate::Always,
            available: VersionPredicate::Always,
            params: Vec::new(),
            keywords: false,
            constructors: None,
            empty_case: None,
            returns: None,
        }
    }

    pub fn params(mut self, params: &[ParamSpec]) -> Self {
        self.params = params.to_vec();
        self
    }

    pub fn keywords(mut self) -> Self {
        self.keywords = true;
        self
    }

    pub fn applicable(mut self, predicate: VersionPredicate) -> Self {
        self.applicable = predicate;
        self
    }

    pub fn available(mut self, predicate: VersionPredicate) -> Self {
        self.available = predicate;
        self
    }

    pub fn single(mut self, op: &'static str) -> Self {
        self.constructors = Some(Constructors::Single(op));
        self
    }

    pub fn version_split(mut self, legacy: &'static str, modern: &'static str) -> Self {
        self.constructors = Some(Constructors::VersionSplit { legacy, modern });
        self
    }

    /// Variations in declaration order; the table orders them on insertion.
    pub fn variations(mut self, variations: Vec<Variation>) -> Self {
        self.constructors = Some(Constructors::Variations(variations));
        self
    }

    pub fn empty_case(mut self, case: EmptyCase) -> Self {
        self.empty_case = Some(case);
        self
    }

    pub fn returns(mut self, shape: Shape) -> Self {
        self.returns = Some(shape);
        self
    }

    /// The version-presence flag: can calls be intercepted for this target?
    pub fn has_operation(&self, target: TargetGeneration) -> bool {
        self.constructors.is_some() && self.available.admits(target)
    }

    /// The node type for one of this entry's constructor names.
    pub fn operation_id(&self, name: &'static str) -> OperationId {
        OperationId::new(self.shape, name)
    }

    /// Parameter mapping for constructors that take every declared parameter.
    pub fn all_params(&self) -> Vec<usize> {
        (0..self.params.len()).collect()
    }

    /// Distinct constructor names, in declaration order.
    fn constructor_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        match &self.constructors {
            None => {}
            Some(Constructors::Single(op)) => names.push(*op),
            Some(Constructors::VersionSplit { legacy, modern }) => {
                names.push(*legacy);
                if modern != legacy {
                    names.push(*modern);
                }
            }
            Some(Constructors::Variations(variations)) => {
                for variation in variations {
                    if !names.contains(&variation.op) {
                        names.push(variation.op);
                    }
                }
            }
        }
        names
    }

    fn validate(&self) -> Result<(), TableError> {
        let Some(Constructors::Variations(variations)) = &self.constructors else {
            return Ok(());
        };

        let bad_index = |index: usize| TableError::BadParameterIndex {
            attribute: self.attribute,
            shape: self.shape,
            index,
        };
        for variation in variations {
            if let Some(&index) = variation.args.iter().find(|&&i| i >= self.params.len()) {
                return Err(bad_index(index));
            }
            if let VariationTest::Supplied(index) = variation.test {
                if index >= self.params.len() {
                    return Err(bad_index(index));
                }
            }
        }

        let bases: Vec<&Variation> = variations
            .iter()
            .filter(|v| v.test == VariationTest::Base)
            .collect();
        let misplaced = match bases.as_slice() {
            [base] => variations
                .iter()
                .any(|v| v.specificity() < base.specificity()),
            _ => true,
        };
        if misplaced {
            return Err(TableError::MissingBaseVariation {
                attribute: self.attribute,
                shape: self.shape,
            });
        }
        Ok(())
    }

    /// Sort variations most specific first. Equal specificity keeps
    /// declaration order; the base always goes last.
    fn order_variations(&mut self) {
        if let Some(Constructors::Variations(variations)) = &mut self.constructors {
            variations.sort_by_key(|v| {
                (
                    v.test == VariationTest::Base,
                    std::cmp::Reverse(v.specificity()),
                )
            });
        }
    }
}

/// Errors raised while building a specialization table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// The same (attribute, shape) pair was registered twice.
    DuplicateEntry {
        attribute: &'static str,
        shape: Shape,
    },
    /// A variation refers to a parameter that is not declared.
    BadParameterIndex {
        attribute: &'static str,
        shape: Shape,
        index: usize,
    },
    /// A variation set lacks a single, least specific base variation.
    MissingBaseVariation {
        attribute: &'static str,
        shape: Shape,
    },
    /// Two entries build the same operation node type.
    DuplicateOperation { op: OperationId },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::DuplicateEntry { attribute, shape } => {
                write!(f, "'{attribute}' registered twice for shape {shape}")
            }
            TableError::BadParameterIndex {
                attribute,
                shape,
                index,
            } => write!(
                f,
                "'{attribute}' on {shape} maps undeclared parameter #{index}"
            ),
            TableError::MissingBaseVariation { attribute, shape } => write!(
                f,
                "'{attribute}' on {shape} needs exactly one least specific base variation"
            ),
            TableError::DuplicateOperation { op } => {
                write!(f, "operation {op} registered twice")
            }
        }
    }
}

impl std::error::Error for TableError {}

fn shape_slot(shape: Shape) -> usize {
    match shape {
        Shape::Dict => 0,
        Shape::Str => 1,
        Shape::Bytes => 2,
    }
}

/// Read-only mapping from (attribute, shape) to its [`OperationSpec`].
#[derive(Debug, Default)]
pub struct SpecializationTable {
    entries: FxHashMap<&'static str, [Option<OperationSpec>; 3]>,
}

impl SpecializationTable {
    /// Build and validate a table. Each (attribute, shape) may appear once,
    /// and each operation node type belongs to exactly one entry.
    pub fn from_specs(
        specs: impl IntoIterator<Item = OperationSpec>,
    ) -> Result<Self, TableError> {
        let mut entries: FxHashMap<&'static str, [Option<OperationSpec>; 3]> =
            FxHashMap::default();
        let mut operations: FxHashSet<OperationId> = FxHashSet::default();
        for mut spec in specs {
            spec.validate()?;
            spec.order_variations();
            let slot = &mut entries.entry(spec.attribute).or_default()[shape_slot(spec.shape)];
            if slot.is_some() {
                return Err(TableError::DuplicateEntry {
                    attribute: spec.attribute,
                    shape: spec.shape,
                });
            }
            for name in spec.constructor_names() {
                let op = spec.operation_id(name);
                if !operations.insert(op) {
                    return Err(TableError::DuplicateOperation { op });
                }
            }
            *slot = Some(spec);
        }
        Ok(SpecializationTable { entries })
    }

    pub fn lookup(&self, attribute: &str, shape: Shape) -> Option<&OperationSpec> {
        self.entries.get(attribute)?[shape_slot(shape)].as_ref()
    }

    /// Entries for an attribute, in shape priority order.
    pub fn shapes_for<'t>(
        &'t self,
        attribute: &str,
    ) -> impl Iterator<Item = &'t OperationSpec> + 't {
        let slots = self.entries.get(attribute);
        SHAPE_PRIORITY
            .into_iter()
            .filter_map(move |shape| slots?[shape_slot(shape)].as_ref())
    }

    pub fn knows_attribute(&self, attribute: &str) -> bool {
        self.entries.contains_key(attribute)
    }

    /// Number of registered (attribute, shape) pairs.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|slots| slots.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|slots| slots.iter().all(Option::is_none))
    }
}

static BUILTIN_TABLE: OnceLock<SpecializationTable> = OnceLock::new();

/// Build the process-wide builtin table. Must run before the first pass;
/// later calls return the already built table.
pub fn init_builtin_table() -> Result<&'static SpecializationTable, TableError> {
    if let Some(table) = BUILTIN_TABLE.get() {
        return Ok(table);
    }
    let table = SpecializationTable::from_specs(crate::builtins::builtin_specs())?;
    info!("builtin specialization table: {} entries", table.len());
    Ok(BUILTIN_TABLE.get_or_init(|| table))
}

/// The builtin table, if [`init_builtin_table`] has run.
pub fn builtin_table() -> Option<&'static SpecializationTable> {
    BUILTIN_TABLE.get()
}
