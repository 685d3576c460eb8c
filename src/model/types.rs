//! Static entity definitions: columns, field kinds, constraints and list filters.

/// Value kind of a column. Drives coercion, SQL casts, DDL and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Server-assigned BIGSERIAL primary key.
    Id,
    Text { max_length: usize },
    Float,
    Bool,
    /// BIGINT referencing the primary key of the named entity (ON DELETE CASCADE).
    ForeignKey { entity: &'static str },
    Timestamp,
}

impl FieldKind {
    /// PostgreSQL type used in parameter casts (`$n::<cast>`).
    pub fn cast(&self) -> &'static str {
        match self {
            FieldKind::Id | FieldKind::ForeignKey { .. } => "bigint",
            FieldKind::Text { .. } => "varchar",
            FieldKind::Float => "float8",
            FieldKind::Bool => "boolean",
            FieldKind::Timestamp => "timestamptz",
        }
    }

    /// Column type in CREATE TABLE.
    pub fn ddl_type(&self) -> String {
        match self {
            FieldKind::Id => "BIGSERIAL".into(),
            FieldKind::Text { max_length } => format!("VARCHAR({})", max_length),
            FieldKind::Float => "DOUBLE PRECISION".into(),
            FieldKind::Bool => "BOOLEAN".into(),
            FieldKind::ForeignKey { .. } => "BIGINT".into(),
            FieldKind::Timestamp => "TIMESTAMPTZ".into(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, FieldKind::Id | FieldKind::ForeignKey { .. })
    }
}

/// Database-side default applied when a write omits the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnDefault {
    Bool(bool),
    Now,
}

impl ColumnDefault {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnDefault::Bool(true) => "TRUE",
            ColumnDefault::Bool(false) => "FALSE",
            ColumnDefault::Now => "NOW()",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be supplied on create and full update.
    pub required: bool,
    /// Ignored on input; only the server sets it.
    pub read_only: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        ColumnDef {
            name,
            kind,
            required: true,
            read_only: false,
            unique: false,
            default: None,
        }
    }

    pub const fn id() -> Self {
        ColumnDef {
            name: "id",
            kind: FieldKind::Id,
            required: false,
            read_only: true,
            unique: false,
            default: None,
        }
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self.required = false;
        self
    }

    pub const fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }

    pub fn is_pk(&self) -> bool {
        matches!(self.kind, FieldKind::Id)
    }
}

/// How a query parameter filters the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    /// Equality after coercing the parameter to the column kind.
    Exact,
    /// Case-insensitive substring on the column's text.
    IContains,
    /// Timestamp: a `YYYY-MM-DD` day (UTC) or an exact RFC 3339 instant.
    Moment,
    /// Timestamp lower bound, inclusive.
    After,
    /// Timestamp upper bound, exclusive.
    Before,
}

#[derive(Clone, Copy, Debug)]
pub struct FilterDef {
    pub param: &'static str,
    pub column: &'static str,
    pub op: FilterOp,
}

impl FilterDef {
    pub const fn new(param: &'static str, column: &'static str, op: FilterOp) -> Self {
        FilterDef { param, column, op }
    }
}

#[derive(Debug)]
pub struct EntityDef {
    /// Singular name; also used in uniqueness messages.
    pub name: &'static str,
    pub table: &'static str,
    pub path_segment: &'static str,
    pub columns: &'static [ColumnDef],
    pub filters: &'static [FilterDef],
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column. The model validator guarantees exactly one.
    pub fn pk(&self) -> &ColumnDef {
        self.columns
            .iter()
            .find(|c| c.is_pk())
            .unwrap_or(&self.columns[0])
    }

    /// Columns a client may write.
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.read_only)
    }

    /// Foreign-key columns of this entity pointing at `target`.
    pub fn references_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a ColumnDef> + 'a {
        self.columns
            .iter()
            .filter(move |c| matches!(c.kind, FieldKind::ForeignKey { entity } if entity == target))
    }
}
