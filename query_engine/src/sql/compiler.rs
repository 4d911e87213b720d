// query_engine/src/sql/compiler.rs
//! Pure lowering of the query model into one parameterized Postgres
//! statement. No I/O happens here; the backend executes the result.
//!
//! Filter and aggregation semantics mirror the in-memory interpreter:
//! case-insensitive predicate/name matching, evidence-aware `count`
//! cardinality, and constant-false compilation for over-length regex
//! patterns, so the two backends stay interchangeable. Every identifier
//! spliced into the statement text is validated first; values always
//! travel as `$n` parameters.

use std::collections::{HashMap, HashSet};

use models::{GraphError, GraphResult};
use serde_json::Value;

use crate::interpreter::filters::MAX_REGEX_PATTERN_LEN;
use crate::query::resolver::split_field;
use crate::query::{
    AggFunc, Aggregation, Direction, EdgePattern, FindKind, NodePattern, OrderSpec, PropertyFilter,
    Query, SortDirection, VectorSearch,
};

/// A compiled statement: SQL text plus positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// The parameter kinds the compiler emits.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    TextArray(Vec<String>),
    FloatArray(Vec<f64>),
}

#[derive(Default)]
struct ParamList {
    values: Vec<SqlValue>,
}

impl ParamList {
    /// Register a parameter and return its `$n` placeholder.
    fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Entity attribute names a bare reference may address.
const ENTITY_COLUMNS: [&str; 9] = [
    "name",
    "id",
    "entity_type",
    "node_type",
    "type",
    "canonical_id",
    "mentions",
    "aliases",
    "description",
];

/// Relationship attribute names a bare reference may address.
const RELATIONSHIP_COLUMNS: [&str; 7] = [
    "predicate",
    "relation_type",
    "confidence",
    "evidence_count",
    "papers",
    "subject_id",
    "object_id",
];

/// Binding-variable to table-alias mapping for one statement, plus the
/// output column names (aggregation aliases, `similarity`) that order
/// clauses may reference bare. Bare attribute names route through the
/// bare-column map when one is registered, mirroring the resolver's
/// target-then-edge-then-source lookup for references without a dot.
struct FieldScope {
    default_var: String,
    aliases: HashMap<String, String>,
    bare: HashMap<String, String>,
    output_columns: HashSet<String>,
}

impl FieldScope {
    fn new(default_var: &str) -> GraphResult<Self> {
        valid_ident(default_var)?;
        Ok(FieldScope {
            default_var: default_var.to_string(),
            aliases: HashMap::new(),
            bare: HashMap::new(),
            output_columns: HashSet::new(),
        })
    }

    fn alias(&mut self, var: &str, table_alias: &str) -> GraphResult<()> {
        valid_ident(table_alias)?;
        self.aliases.insert(var.to_string(), table_alias.to_string());
        Ok(())
    }

    /// Route bare attribute names to the joined aliases: relationship
    /// columns to the relationship alias, entity columns to the target
    /// entity alias (the resolver consults the target binding first).
    fn route_bare(&mut self, entity_alias: &str, relationship_alias: &str) {
        for column in RELATIONSHIP_COLUMNS {
            self.bare
                .insert(column.to_string(), relationship_alias.to_string());
        }
        for column in ENTITY_COLUMNS {
            self.bare.insert(column.to_string(), entity_alias.to_string());
        }
    }

    /// A scope for a pattern's inline property filters, which always
    /// address that pattern's own entity: same variable aliases, empty
    /// bare-column map, bare references pinned to `alias`.
    fn inline(&self, alias: &str) -> GraphResult<FieldScope> {
        valid_ident(alias)?;
        Ok(FieldScope {
            default_var: alias.to_string(),
            aliases: self.aliases.clone(),
            bare: HashMap::new(),
            output_columns: self.output_columns.clone(),
        })
    }

    fn output(&mut self, name: &str) {
        self.output_columns.insert(name.to_string());
    }
}

pub struct SqlCompiler {
    embedding_dim: usize,
}

impl SqlCompiler {
    pub fn new(embedding_dim: usize) -> Self {
        SqlCompiler { embedding_dim }
    }

    /// Compile one validated query to a single statement.
    pub fn compile(&self, query: &Query) -> GraphResult<SqlStatement> {
        match query.find {
            FindKind::Nodes => self.compile_node_query(query),
            FindKind::Edges => self.compile_edge_query(query),
            FindKind::Paths => self.compile_path_query(query),
        }
    }

    fn compile_node_query(&self, query: &Query) -> GraphResult<SqlStatement> {
        let node_pattern = query.node_pattern.clone().unwrap_or_default();
        if node_pattern.vector_search.is_some() && query.aggregate.is_some() {
            return Err(GraphError::Unsupported(
                "vector_search cannot be combined with aggregate in one statement".to_string(),
            ));
        }
        let var = node_pattern.var_or("node").to_string();
        let mut scope = FieldScope::new(&var)?;
        scope.alias("node", &var)?;
        scope.alias("source", &var)?;
        scope.alias("subject", &var)?;

        let mut params = ParamList::default();
        let mut select_cols: Vec<String> = Vec::new();
        let mut from_clause = format!("FROM entities {var}");
        let mut where_clauses: Vec<String> = Vec::new();
        let mut order_by = query.order_by.clone();

        // Vector similarity predicate on the node pattern.
        if let Some(vector) = &node_pattern.vector_search {
            let dim = self.embedding_dim;
            let literal = vector_literal(vector);
            let p = params.push(SqlValue::Text(literal.clone()));
            select_cols.push(format!(
                "1 - ({var}.embedding::vector({dim}) <=> {p}::vector({dim})) AS similarity"
            ));
            scope.output("similarity");
            if let Some(threshold) = node_pattern.similarity_threshold {
                let pv = params.push(SqlValue::Text(literal));
                let pt = params.push(SqlValue::Float(threshold));
                where_clauses.push(format!(
                    "1 - ({var}.embedding::vector({dim}) <=> {pv}::vector({dim})) > {pt}"
                ));
            }
            if order_by.is_empty() {
                order_by = vec![OrderSpec {
                    field: "similarity".to_string(),
                    direction: SortDirection::Desc,
                }];
            }
        }

        self.node_predicates(&mut scope, &var, &node_pattern, &mut where_clauses, &mut params)?;

        if let Some(edge_pattern) = &query.edge_pattern {
            let edge_alias = edge_pattern.var_or("rel").to_string();
            valid_ident(&edge_alias)?;
            scope.alias("edge", &edge_alias)?;
            scope.alias(&edge_alias, &edge_alias)?;
            scope.alias("target", "target")?;
            scope.alias("object", "target")?;
            match edge_pattern.direction {
                Direction::Outgoing => {
                    from_clause.push_str(&format!(
                        " JOIN relationships {edge_alias} ON {var}.id = {edge_alias}.subject_id"
                    ));
                    from_clause.push_str(&format!(
                        " JOIN entities target ON {edge_alias}.object_id = target.id"
                    ));
                }
                Direction::Incoming => {
                    from_clause.push_str(&format!(
                        " JOIN relationships {edge_alias} ON {var}.id = {edge_alias}.object_id"
                    ));
                    from_clause.push_str(&format!(
                        " JOIN entities target ON {edge_alias}.subject_id = target.id"
                    ));
                }
                Direction::Both => {
                    return Err(GraphError::Unsupported(
                        "direction \"both\" cannot be compiled to a single join".to_string(),
                    ))
                }
            }
            scope.route_bare("target", &edge_alias);
            edge_predicates(&edge_alias, edge_pattern, &mut where_clauses, &mut params)?;
        }

        for filter in &query.filters {
            where_clauses.push(self.translate_filter(&scope, filter, &mut params)?);
        }

        // SELECT list: aggregation replaces the default projection.
        let mut group_by_sql: Vec<String> = Vec::new();
        if let Some(spec) = &query.aggregate {
            let edge_alias = query
                .edge_pattern
                .as_ref()
                .map(|p| p.var_or("rel").to_string())
                .unwrap_or_else(|| "rel".to_string());
            let mut agg_cols = Vec::new();
            for field in &spec.group_by {
                let field_sql = self.translate_field(&scope, field)?;
                agg_cols.push(format!("{field_sql} AS \"{field}\""));
                group_by_sql.push(field_sql);
            }
            for (name, agg) in &spec.aggregations {
                scope.output(name);
                agg_cols.push(self.aggregation_sql(&scope, &edge_alias, name, agg)?);
            }
            select_cols = agg_cols;
        } else if let Some(fields) = &query.return_fields {
            let mut cols = Vec::new();
            for field in fields {
                cols.push(format!(
                    "{} AS \"{}\"",
                    self.translate_field(&scope, field)?,
                    quoted_alias(field)?
                ));
            }
            // Keep a computed similarity column if the pattern asked for one.
            cols.extend(select_cols);
            select_cols = cols;
        } else {
            let mut cols = vec![
                format!("{var}.name AS \"{var}.name\""),
                format!("{var}.id AS \"{var}.id\""),
            ];
            cols.extend(select_cols);
            select_cols = cols;
        }

        let mut sql = format!("SELECT {} {from_clause}", select_cols.join(", "));
        append_where(&mut sql, &where_clauses);
        if !group_by_sql.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", group_by_sql.join(", ")));
        }
        self.append_order_limit(&mut sql, &scope, &order_by, query)?;
        Ok(SqlStatement {
            sql,
            params: params.values,
        })
    }

    fn compile_edge_query(&self, query: &Query) -> GraphResult<SqlStatement> {
        if query.aggregate.is_some() {
            return Err(GraphError::Unsupported(
                "aggregation on edge queries is not compiled to SQL; use a node query".to_string(),
            ));
        }
        let mut scope = FieldScope::new("s")?;
        scope.alias("node", "s")?;
        scope.alias("source", "s")?;
        scope.alias("subject", "s")?;
        scope.alias("edge", "r")?;
        scope.alias("target", "o")?;
        scope.alias("object", "o")?;

        let node_pattern = query.node_pattern.clone().unwrap_or_default();
        if let Some(var) = &node_pattern.var {
            scope.alias(var, "s")?;
        }
        let edge_pattern = query.edge_pattern.clone().unwrap_or_default();
        if let Some(var) = &edge_pattern.var {
            scope.alias(var, "r")?;
        }
        scope.route_bare("o", "r");

        let mut params = ParamList::default();
        let mut where_clauses = Vec::new();
        self.node_predicates(&mut scope, "s", &node_pattern, &mut where_clauses, &mut params)?;
        edge_predicates("r", &edge_pattern, &mut where_clauses, &mut params)?;
        for filter in &query.filters {
            where_clauses.push(self.translate_filter(&scope, filter, &mut params)?);
        }

        let select_cols: Vec<String> = if let Some(fields) = &query.return_fields {
            let mut cols = Vec::new();
            for field in fields {
                cols.push(format!(
                    "{} AS \"{}\"",
                    self.translate_field(&scope, field)?,
                    quoted_alias(field)?
                ));
            }
            cols
        } else {
            vec![
                "s.name AS \"subject.name\"".to_string(),
                "s.id AS \"subject.id\"".to_string(),
                "s.entity_type AS \"subject.type\"".to_string(),
                "r.predicate AS \"predicate\"".to_string(),
                "o.name AS \"object.name\"".to_string(),
                "o.id AS \"object.id\"".to_string(),
                "o.entity_type AS \"object.type\"".to_string(),
                "r.confidence AS \"confidence\"".to_string(),
                "r.evidence_count AS \"evidence_count\"".to_string(),
                "r.papers AS \"papers\"".to_string(),
            ]
        };

        let mut sql = format!(
            "SELECT {} FROM relationships r \
             JOIN entities s ON r.subject_id = s.id \
             JOIN entities o ON r.object_id = o.id",
            select_cols.join(", ")
        );
        append_where(&mut sql, &where_clauses);
        self.append_order_limit(&mut sql, &scope, &query.order_by, query)?;
        Ok(SqlStatement {
            sql,
            params: params.values,
        })
    }

    fn compile_path_query(&self, query: &Query) -> GraphResult<SqlStatement> {
        let pattern = match &query.path_pattern {
            Some(pattern) => pattern,
            None => {
                return Err(GraphError::InvalidQuery(
                    "path query requires path_pattern".to_string(),
                ))
            }
        };
        let hops = &pattern.edges[..pattern.effective_max_hops()];

        let start_var = pattern.start.var_or("start").to_string();
        let mut scope = FieldScope::new(&start_var)?;
        scope.alias("source", &start_var)?;
        scope.alias("subject", &start_var)?;

        let mut params = ParamList::default();
        let mut from_clause = format!("FROM entities {start_var}");
        let mut where_clauses = Vec::new();
        self.node_predicates(&mut scope, &start_var, &pattern.start, &mut where_clauses, &mut params)?;

        let mut select_cols = vec![
            format!("{start_var}.name AS \"{start_var}.name\""),
            format!("{start_var}.id AS \"{start_var}.id\""),
        ];

        // Thread the join chain forward one hop at a time.
        let mut prev = start_var.clone();
        let mut last_edge_alias = None;
        for (i, hop) in hops.iter().enumerate() {
            let edge_default = format!("edge{i}");
            let node_default = format!("node{}", i + 1);
            let edge_alias = hop.edge.var_or(&edge_default).to_string();
            let node_alias = hop.node.var_or(&node_default).to_string();
            scope.alias(&edge_alias, &edge_alias)?;
            scope.alias(&node_alias, &node_alias)?;

            from_clause.push_str(&format!(
                " JOIN relationships {edge_alias} ON {prev}.id = {edge_alias}.subject_id"
            ));
            from_clause.push_str(&format!(
                " JOIN entities {node_alias} ON {edge_alias}.object_id = {node_alias}.id"
            ));

            edge_predicates(&edge_alias, &hop.edge, &mut where_clauses, &mut params)?;
            self.node_predicates(&mut scope, &node_alias, &hop.node, &mut where_clauses, &mut params)?;

            select_cols.push(format!(
                "{edge_alias}.predicate AS \"{edge_alias}.relation_type\""
            ));
            select_cols.push(format!(
                "{edge_alias}.confidence AS \"{edge_alias}.confidence\""
            ));
            select_cols.push(format!("{node_alias}.name AS \"{node_alias}.name\""));
            select_cols.push(format!("{node_alias}.id AS \"{node_alias}.id\""));

            last_edge_alias = Some(edge_alias);
            prev = node_alias;
        }
        if let Some(edge_alias) = &last_edge_alias {
            scope.route_bare(&prev, edge_alias);
        }

        for filter in &query.filters {
            where_clauses.push(self.translate_filter(&scope, filter, &mut params)?);
        }

        if let Some(fields) = &query.return_fields {
            let mut cols = Vec::new();
            for field in fields {
                cols.push(format!(
                    "{} AS \"{}\"",
                    self.translate_field(&scope, field)?,
                    quoted_alias(field)?
                ));
            }
            select_cols = cols;
        }

        let mut sql = format!("SELECT {} {from_clause}", select_cols.join(", "));
        append_where(&mut sql, &where_clauses);
        self.append_order_limit(&mut sql, &scope, &query.order_by, query)?;
        Ok(SqlStatement {
            sql,
            params: params.values,
        })
    }

    /// Top-level semantic lookup with an already-resolved embedding.
    pub fn compile_vector_search(
        &self,
        vector: &[f32],
        search: &VectorSearch,
        return_fields: Option<&[String]>,
    ) -> GraphResult<SqlStatement> {
        let dim = self.embedding_dim;
        let mut params = ParamList::default();
        let literal = vector_literal(vector);

        let default_fields = ["name".to_string(), "entity_type".to_string(), "similarity".to_string()];
        let fields: &[String] = return_fields.unwrap_or(&default_fields);

        let similarity = |params: &mut ParamList| {
            let p = params.push(SqlValue::Text(literal.clone()));
            format!("1 - (embedding::vector({dim}) <=> {p}::vector({dim}))")
        };

        let mut select_cols = Vec::new();
        for field in fields {
            let alias = quoted_alias(field)?;
            let expr = match field.as_str() {
                "similarity" => similarity(&mut params),
                "node_type" | "type" => "entity_type".to_string(),
                other => {
                    valid_ident(other)?;
                    other.to_string()
                }
            };
            select_cols.push(format!("{expr} AS \"{alias}\""));
        }

        let threshold_expr = similarity(&mut params);
        let pt = params.push(SqlValue::Float(search.min_similarity));
        let sql = format!(
            "SELECT {} FROM entities WHERE {threshold_expr} > {pt} \
             ORDER BY {} DESC LIMIT {}",
            select_cols.join(", "),
            similarity(&mut params),
            search.top_k
        );
        Ok(SqlStatement {
            sql,
            params: params.values,
        })
    }

    fn node_predicates(
        &self,
        scope: &mut FieldScope,
        alias: &str,
        pattern: &NodePattern,
        where_clauses: &mut Vec<String>,
        params: &mut ParamList,
    ) -> GraphResult<()> {
        if let Some(var) = &pattern.var {
            scope.alias(var, alias)?;
        }
        if let Some(node_type) = &pattern.node_type {
            let p = params.push(SqlValue::Text(node_type.clone()));
            where_clauses.push(format!("{alias}.entity_type = {p}"));
        }
        if !pattern.node_types.is_empty() {
            let p = params.push(SqlValue::TextArray(pattern.node_types.clone()));
            where_clauses.push(format!("{alias}.entity_type = ANY({p})"));
        }
        if let Some(name) = &pattern.name {
            let p = params.push(SqlValue::Text(name.clone()));
            where_clauses.push(format!("LOWER({alias}.name) = LOWER({p})"));
        }
        if let Some(name_pattern) = &pattern.name_pattern {
            if name_pattern.len() > MAX_REGEX_PATTERN_LEN {
                where_clauses.push("FALSE".to_string());
            } else {
                let p = params.push(SqlValue::Text(name_pattern.clone()));
                where_clauses.push(format!("{alias}.name ~* {p}"));
            }
        }
        if !pattern.property_filters.is_empty() {
            let inline = scope.inline(alias)?;
            for filter in &pattern.property_filters {
                where_clauses.push(self.translate_filter(&inline, filter, params)?);
            }
        }
        Ok(())
    }

    fn translate_filter(
        &self,
        scope: &FieldScope,
        filter: &PropertyFilter,
        params: &mut ParamList,
    ) -> GraphResult<String> {
        use crate::query::FilterOp::*;
        let field_sql = self.translate_field(scope, &filter.field)?;
        let clause = match filter.operator {
            Eq => match &filter.value {
                Value::Null => format!("{field_sql} IS NULL"),
                value => format!("{field_sql} = {}", params.push(scalar_param(value)?)),
            },
            // IS DISTINCT FROM keeps NULL rows, matching the
            // interpreter's pass-on-absent `ne`.
            Ne => match &filter.value {
                Value::Null => format!("{field_sql} IS NOT NULL"),
                value => format!(
                    "{field_sql} IS DISTINCT FROM {}",
                    params.push(scalar_param(value)?)
                ),
            },
            In => match &filter.value {
                Value::Array(items) => {
                    let p = params.push(array_param(items)?);
                    format!("{field_sql} = ANY({p})")
                }
                _ => {
                    return Err(GraphError::InvalidQuery(
                        "\"in\" filter requires an array value".to_string(),
                    ))
                }
            },
            Contains => match &filter.value {
                Value::String(needle) => {
                    let p = params.push(SqlValue::Text(format!("%{needle}%")));
                    format!("{field_sql} ILIKE {p}")
                }
                _ => "FALSE".to_string(),
            },
            Regex => match &filter.value {
                Value::String(pattern) if pattern.len() <= MAX_REGEX_PATTERN_LEN => {
                    let p = params.push(SqlValue::Text(pattern.clone()));
                    format!("{field_sql} ~* {p}")
                }
                // Over-length or non-string patterns never match.
                _ => "FALSE".to_string(),
            },
            Gt | Gte | Lt | Lte => {
                if filter.value.is_null() {
                    "FALSE".to_string()
                } else {
                    let op = match filter.operator {
                        Gt => ">",
                        Gte => ">=",
                        Lt => "<",
                        _ => "<=",
                    };
                    let p = params.push(scalar_param(&filter.value)?);
                    format!("{field_sql} {op} {p}")
                }
            }
        };
        Ok(clause)
    }

    /// Translate a dotted field reference to a SQL expression. Bare
    /// references that name an output column stay bare; other bare
    /// references go through the scope's bare-column map before falling
    /// back to the default alias. Multi-segment attribute paths descend
    /// into the `metadata` JSONB column.
    fn translate_field(&self, scope: &FieldScope, field: &str) -> GraphResult<String> {
        let (head, rest) = split_field(field);
        let (alias, path) = match head {
            None => {
                if scope.output_columns.contains(field) {
                    return Ok(field.to_string());
                }
                let alias = scope
                    .bare
                    .get(field)
                    .map(String::as_str)
                    .unwrap_or(scope.default_var.as_str());
                (alias, rest)
            }
            Some(head) => {
                let alias = scope
                    .aliases
                    .get(head)
                    .map(String::as_str)
                    .unwrap_or(head);
                (alias, rest)
            }
        };
        valid_ident(alias)?;

        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments {
            valid_ident(segment)?;
        }
        if segments.len() == 1 {
            let column = match segments[0] {
                "node_type" | "type" => "entity_type",
                "relation_type" => "predicate",
                other => other,
            };
            Ok(format!("{alias}.{column}"))
        } else {
            // Nested attribute paths address relationship metadata.
            let mut expr = format!("{alias}.metadata");
            for segment in &segments[..segments.len() - 1] {
                expr.push_str(&format!("->'{segment}'"));
            }
            expr.push_str(&format!("->>'{}'", segments[segments.len() - 1]));
            Ok(expr)
        }
    }

    fn aggregation_sql(
        &self,
        scope: &FieldScope,
        edge_alias: &str,
        name: &str,
        agg: &Aggregation,
    ) -> GraphResult<String> {
        valid_ident(name)?;
        valid_ident(edge_alias)?;
        let expr = match agg.func {
            AggFunc::Count => {
                if agg.field.contains("evidence.paper_id")
                    || (agg.field.contains("evidence") && agg.field.contains("paper"))
                {
                    format!("SUM(COALESCE(ARRAY_LENGTH({edge_alias}.papers, 1), 0))")
                } else if agg.field.ends_with(".evidence") {
                    format!("SUM({edge_alias}.evidence_count)")
                } else {
                    "COUNT(*)".to_string()
                }
            }
            AggFunc::Avg => format!(
                "ROUND(AVG({})::numeric, 2)::float8",
                self.translate_field(scope, &agg.field)?
            ),
            AggFunc::Sum => format!(
                "ROUND(SUM({})::numeric, 2)::float8",
                self.translate_field(scope, &agg.field)?
            ),
            AggFunc::Min => format!("MIN({})", self.translate_field(scope, &agg.field)?),
            AggFunc::Max => format!("MAX({})", self.translate_field(scope, &agg.field)?),
        };
        Ok(format!("{expr} AS {name}"))
    }

    fn append_order_limit(
        &self,
        sql: &mut String,
        scope: &FieldScope,
        order_by: &[OrderSpec],
        query: &Query,
    ) -> GraphResult<()> {
        if !order_by.is_empty() {
            let mut parts = Vec::new();
            for spec in order_by {
                let direction = match spec.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                parts.push(format!(
                    "{} {direction}",
                    self.translate_field(scope, &spec.field)?
                ));
            }
            sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Ok(())
    }
}

fn edge_predicates(
    alias: &str,
    pattern: &EdgePattern,
    where_clauses: &mut Vec<String>,
    params: &mut ParamList,
) -> GraphResult<()> {
    valid_ident(alias)?;
    if let Some(relation_type) = &pattern.relation_type {
        let p = params.push(SqlValue::Text(relation_type.to_uppercase()));
        where_clauses.push(format!("UPPER({alias}.predicate) = {p}"));
    }
    if !pattern.relation_types.is_empty() {
        let upper: Vec<String> = pattern
            .relation_types
            .iter()
            .map(|t| t.to_uppercase())
            .collect();
        let p = params.push(SqlValue::TextArray(upper));
        where_clauses.push(format!("UPPER({alias}.predicate) = ANY({p})"));
    }
    if let Some(min_confidence) = pattern.min_confidence {
        let p = params.push(SqlValue::Float(min_confidence));
        where_clauses.push(format!("{alias}.confidence >= {p}"));
    }
    Ok(())
}

fn append_where(sql: &mut String, where_clauses: &[String]) {
    if !where_clauses.is_empty() {
        sql.push_str(&format!(" WHERE {}", where_clauses.join(" AND ")));
    }
}

fn scalar_param(value: &Value) -> GraphResult<SqlValue> {
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Int(i)),
            None => Ok(SqlValue::Float(n.as_f64().unwrap_or(0.0))),
        },
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        other => Err(GraphError::InvalidQuery(format!(
            "filter value {other} cannot be passed as a SQL parameter"
        ))),
    }
}

fn array_param(items: &[Value]) -> GraphResult<SqlValue> {
    if items.iter().all(Value::is_string) {
        Ok(SqlValue::TextArray(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ))
    } else if items.iter().all(Value::is_number) {
        Ok(SqlValue::FloatArray(
            items.iter().filter_map(Value::as_f64).collect(),
        ))
    } else {
        Err(GraphError::InvalidQuery(
            "\"in\" filter arrays must be all-string or all-numeric".to_string(),
        ))
    }
}

fn vector_literal(vector: &[f32]) -> String {
    let body: Vec<String> = vector.iter().map(|x| x.to_string()).collect();
    format!("[{}]", body.join(","))
}

fn valid_ident(s: &str) -> GraphResult<()> {
    let mut chars = s.chars();
    let ok = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(GraphError::InvalidQuery(format!(
            "invalid SQL identifier: {s:?}"
        )))
    }
}

/// Result-column aliases are double-quoted; dots are fine, quotes are not.
fn quoted_alias(field: &str) -> GraphResult<&str> {
    if field.contains('"') {
        return Err(GraphError::InvalidQuery(format!(
            "invalid result column name: {field:?}"
        )));
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(query: Value) -> SqlStatement {
        SqlCompiler::new(768)
            .compile(&Query::from_value(query).unwrap())
            .unwrap()
    }

    #[test]
    fn test_simple_node_query() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"node_type": "drug", "name": "Tamoxifen", "var": "drug"},
            "limit": 10
        }));
        assert_eq!(
            stmt.sql,
            "SELECT drug.name AS \"drug.name\", drug.id AS \"drug.id\" \
             FROM entities drug \
             WHERE drug.entity_type = $1 AND LOWER(drug.name) = LOWER($2) LIMIT 10"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("drug".to_string()),
                SqlValue::Text("Tamoxifen".to_string())
            ]
        );
    }

    #[test]
    fn test_evidence_count_aggregation_with_join_and_order() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"node_type": "drug", "var": "drug"},
            "edge_pattern": {"relation_type": "TREATS", "min_confidence": 0.7, "var": "treatment"},
            "aggregate": {
                "group_by": ["drug.name"],
                "aggregations": {"paper_count": ["count", "treatment.evidence.paper_id"]}
            },
            "order_by": [["paper_count", "desc"]]
        }));
        assert_eq!(
            stmt.sql,
            "SELECT drug.name AS \"drug.name\", \
             SUM(COALESCE(ARRAY_LENGTH(treatment.papers, 1), 0)) AS paper_count \
             FROM entities drug \
             JOIN relationships treatment ON drug.id = treatment.subject_id \
             JOIN entities target ON treatment.object_id = target.id \
             WHERE drug.entity_type = $1 \
             AND UPPER(treatment.predicate) = $2 AND treatment.confidence >= $3 \
             GROUP BY drug.name ORDER BY paper_count DESC"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("drug".to_string()),
                SqlValue::Text("TREATS".to_string()),
                SqlValue::Float(0.7)
            ]
        );
    }

    #[test]
    fn test_path_query_chains_joins() {
        let stmt = compile(json!({
            "find": "paths",
            "path_pattern": {
                "start": {"node_type": "drug", "name": "metformin", "var": "drug"},
                "edges": [
                    [{"relation_type": "ACTIVATES", "var": "act"}, {"node_type": "protein", "var": "protein"}],
                    [{"relation_type": "ENCODED_BY", "var": "enc"}, {"node_type": "gene", "var": "gene"}]
                ],
                "max_hops": 2
            }
        }));
        assert!(stmt.sql.contains(
            "JOIN relationships act ON drug.id = act.subject_id \
             JOIN entities protein ON act.object_id = protein.id \
             JOIN relationships enc ON protein.id = enc.subject_id \
             JOIN entities gene ON enc.object_id = gene.id"
        ));
        assert!(stmt.sql.contains("gene.name AS \"gene.name\""));
        assert!(stmt.sql.contains("act.predicate AS \"act.relation_type\""));
        assert_eq!(stmt.params.len(), 6);
    }

    #[test]
    fn test_max_hops_truncates_join_chain() {
        let stmt = compile(json!({
            "find": "paths",
            "path_pattern": {
                "start": {"var": "a"},
                "edges": [
                    [{"var": "e0"}, {"var": "n1"}],
                    [{"var": "e1"}, {"var": "n2"}]
                ],
                "max_hops": 1
            }
        }));
        assert!(stmt.sql.contains("JOIN relationships e0"));
        assert!(!stmt.sql.contains("JOIN relationships e1"));
    }

    #[test]
    fn test_all_filter_operators_translate() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"var": "n"},
            "filters": [
                {"field": "n.name", "operator": "eq", "value": "x"},
                {"field": "n.name", "operator": "ne", "value": "y"},
                {"field": "n.node_type", "operator": "in", "value": ["drug", "gene"]},
                {"field": "n.name", "operator": "contains", "value": "cancer"},
                {"field": "n.name", "operator": "regex", "value": "^tam"},
                {"field": "n.mentions", "operator": "gt", "value": 5},
                {"field": "n.mentions", "operator": "gte", "value": 5},
                {"field": "n.mentions", "operator": "lt", "value": 10},
                {"field": "n.mentions", "operator": "lte", "value": 10}
            ]
        }));
        for fragment in [
            "n.name = $1",
            "n.name IS DISTINCT FROM $2",
            "n.entity_type = ANY($3)",
            "n.name ILIKE $4",
            "n.name ~* $5",
            "n.mentions > $6",
            "n.mentions >= $7",
            "n.mentions < $8",
            "n.mentions <= $9",
        ] {
            assert!(stmt.sql.contains(fragment), "missing {fragment} in {}", stmt.sql);
        }
        assert_eq!(stmt.params[3], SqlValue::Text("%cancer%".to_string()));
        assert_eq!(stmt.params[5], SqlValue::Int(5));
    }

    #[test]
    fn test_overlength_regex_compiles_to_constant_false() {
        let pattern = "a".repeat(MAX_REGEX_PATTERN_LEN + 1);
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"var": "n"},
            "filters": [{"field": "n.name", "operator": "regex", "value": pattern}]
        }));
        assert!(stmt.sql.contains("WHERE FALSE"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_metadata_paths_compile_to_jsonb_access() {
        let stmt = compile(json!({
            "find": "edges",
            "filters": [{"field": "edge.evidence.paper_id", "value": "PMC1000"}]
        }));
        assert!(stmt.sql.contains("r.metadata->'evidence'->>'paper_id' = $1"));
    }

    #[test]
    fn test_edge_query_mirrors_interpreter_row_keys() {
        let stmt = compile(json!({
            "find": "edges",
            "edge_pattern": {"relation_type": "TREATS"},
            "limit": 3
        }));
        for key in [
            "\"subject.name\"",
            "\"subject.type\"",
            "\"predicate\"",
            "\"object.name\"",
            "\"confidence\"",
            "\"evidence_count\"",
            "\"papers\"",
        ] {
            assert!(stmt.sql.contains(key));
        }
        assert!(stmt.sql.ends_with("LIMIT 3"));
    }

    #[test]
    fn test_incoming_direction_reverses_join() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"var": "disease"},
            "edge_pattern": {"direction": "incoming"}
        }));
        assert!(stmt.sql.contains("ON disease.id = rel.object_id"));
        assert!(stmt.sql.contains("ON rel.subject_id = target.id"));

        let err = SqlCompiler::new(768)
            .compile(
                &Query::from_value(json!({
                    "find": "nodes",
                    "edge_pattern": {"direction": "both"}
                }))
                .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::Unsupported(_)));
    }

    #[test]
    fn test_vector_search_pattern_adds_similarity_and_default_order() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {
                "var": "e",
                "vector_search": [0.1, 0.2],
                "similarity_threshold": 0.5
            },
            "limit": 5
        }));
        assert!(stmt
            .sql
            .contains("1 - (e.embedding::vector(768) <=> $1::vector(768)) AS similarity"));
        assert!(stmt
            .sql
            .contains("1 - (e.embedding::vector(768) <=> $2::vector(768)) > $3"));
        assert!(stmt.sql.contains("ORDER BY similarity DESC"));
        assert_eq!(stmt.params[0], SqlValue::Text("[0.1,0.2]".to_string()));
        assert_eq!(stmt.params[2], SqlValue::Float(0.5));
    }

    #[test]
    fn test_top_level_vector_search_statement() {
        let search: VectorSearch = serde_json::from_value(json!({
            "text": "estrogen receptor antagonists",
            "top_k": 5,
            "min_similarity": 0.4
        }))
        .unwrap();
        let stmt = SqlCompiler::new(768)
            .compile_vector_search(&[1.0, 0.0], &search, None)
            .unwrap();
        assert!(stmt.sql.contains("FROM entities WHERE"));
        assert!(stmt.sql.contains("AS \"similarity\""));
        assert!(stmt.sql.contains("ORDER BY"));
        assert!(stmt.sql.ends_with("LIMIT 5"));
        assert_eq!(stmt.params[2], SqlValue::Float(0.4));
    }

    #[test]
    fn test_hostile_identifier_is_rejected() {
        let err = SqlCompiler::new(768)
            .compile(
                &Query::from_value(json!({
                    "find": "nodes",
                    "node_pattern": {"var": "x; DROP TABLE entities--"}
                }))
                .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidQuery(_)));
    }

    #[test]
    fn test_relation_type_reference_maps_to_predicate_column() {
        let stmt = compile(json!({
            "find": "paths",
            "path_pattern": {
                "start": {"node_type": "drug", "var": "drug"},
                "edges": [[{"var": "act"}, {"node_type": "protein", "var": "protein"}]]
            },
            "filters": [{"field": "act.relation_type", "value": "ACTIVATES"}],
            "order_by": [["act.relation_type", "desc"]]
        }));
        assert!(stmt.sql.contains("act.predicate = $3"), "{}", stmt.sql);
        assert!(stmt.sql.contains("ORDER BY act.predicate DESC"));
        assert!(stmt.sql.contains("act.predicate AS \"act.relation_type\""));
    }

    #[test]
    fn test_bare_edge_fields_resolve_to_relationship_alias() {
        let stmt = compile(json!({
            "find": "edges",
            "filters": [{"field": "predicate", "value": "TREATS"}],
            "order_by": [["confidence", "desc"]]
        }));
        assert!(stmt.sql.contains("r.predicate = $1"), "{}", stmt.sql);
        assert!(stmt.sql.ends_with("ORDER BY r.confidence DESC"));
    }

    #[test]
    fn test_bare_entity_fields_resolve_to_target_alias() {
        let stmt = compile(json!({
            "find": "edges",
            "filters": [{"field": "name", "operator": "contains", "value": "cancer"}]
        }));
        assert!(stmt.sql.contains("o.name ILIKE $1"), "{}", stmt.sql);
    }

    #[test]
    fn test_inline_property_filters_stay_on_their_own_pattern() {
        let stmt = compile(json!({
            "find": "edges",
            "node_pattern": {
                "property_filters": [{"field": "name", "operator": "contains", "value": "tamoxifen"}]
            }
        }));
        assert!(stmt.sql.contains("s.name ILIKE $1"), "{}", stmt.sql);
    }

    #[test]
    fn test_ne_keeps_null_rows() {
        let stmt = compile(json!({
            "find": "edges",
            "filters": [{"field": "edge.evidence.section", "operator": "ne", "value": "abstract"}]
        }));
        assert!(stmt
            .sql
            .contains("r.metadata->'evidence'->>'section' IS DISTINCT FROM $1"));
    }

    #[test]
    fn test_vector_search_with_aggregation_is_unsupported() {
        let err = SqlCompiler::new(768)
            .compile(
                &Query::from_value(json!({
                    "find": "nodes",
                    "node_pattern": {"var": "e", "vector_search": [0.1, 0.2]},
                    "aggregate": {
                        "group_by": ["e.name"],
                        "aggregations": {"total": ["count", "e.id"]}
                    }
                }))
                .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::Unsupported(_)));
    }

    #[test]
    fn test_offset_is_emitted() {
        let stmt = compile(json!({
            "find": "nodes",
            "node_pattern": {"var": "n"},
            "order_by": [["n.name"]],
            "limit": 10,
            "offset": 20
        }));
        assert!(stmt.sql.ends_with("ORDER BY n.name ASC LIMIT 10 OFFSET 20"));
    }
}
