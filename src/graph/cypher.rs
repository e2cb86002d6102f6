//! Read-only Cypher subset for the in-process graph
//!
//! Supported: one or more `MATCH` clauses with comma-separated path patterns,
//! inline property maps, directed or undirected single-hop relationships with
//! type alternatives, `WHERE` conditions joined by `AND`, `RETURN` with
//! `DISTINCT`, aliases, `count`/`collect`, then `ORDER BY`, `SKIP`, `LIMIT`.
//! Anything else is a parse error.

use super::memory::GraphData;
use super::{GraphError, GraphResult, Row};
use indexmap::IndexMap;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Parser)]
#[grammar = "graph/cypher.pest"]
struct CypherParser;

#[derive(Debug, Clone)]
pub(crate) struct Query {
    clauses: Vec<MatchClause>,
    ret: ReturnClause,
    order: Vec<SortItem>,
    skip: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Clone)]
struct MatchClause {
    patterns: Vec<PathPattern>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
struct PathPattern {
    start: NodePattern,
    hops: Vec<(RelPattern, NodePattern)>,
}

#[derive(Debug, Clone, Default)]
struct NodePattern {
    variable: Option<String>,
    label: Option<String>,
    properties: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, Clone)]
struct RelPattern {
    variable: Option<String>,
    types: Vec<String>,
    direction: Direction,
}

#[derive(Debug, Clone)]
struct Condition {
    left: Operand,
    op: Comparison,
    right: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    ToLower,
    ToUpper,
    Trim,
}

#[derive(Debug, Clone)]
enum Operand {
    Literal(Value),
    Property { variable: String, key: String },
    Variable(String),
    Call { function: Function, arg: Box<Operand> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Count,
    Collect,
}

#[derive(Debug, Clone)]
enum Expression {
    Operand(Operand),
    Aggregate {
        function: Aggregate,
        distinct: bool,
        /// `None` for `count(*)`
        arg: Option<Operand>,
    },
}

#[derive(Debug, Clone)]
struct ReturnItem {
    expression: Expression,
    /// Source text of the expression, matched by ORDER BY
    text: String,
    column: String,
}

#[derive(Debug, Clone)]
struct ReturnClause {
    distinct: bool,
    items: Vec<ReturnItem>,
}

#[derive(Debug, Clone)]
struct SortItem {
    operand: Operand,
    text: String,
    descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Node(usize),
    Edge(usize),
}

type Binding = HashMap<String, Element>;

fn syntax(message: impl Into<String>) -> GraphError {
    GraphError::Query(message.into())
}

/// Parse a query in the supported subset
pub(crate) fn parse(input: &str) -> GraphResult<Query> {
    let mut pairs = CypherParser::parse(Rule::query, input)
        .map_err(|e| syntax(format!("unsupported or invalid Cypher: {}", e)))?;
    let root = pairs.next().ok_or_else(|| syntax("empty query"))?;

    let mut clauses = Vec::new();
    let mut ret = None;
    let mut order = Vec::new();
    let mut skip = None;
    let mut limit = None;

    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::match_clause => clauses.push(parse_match(pair)?),
            Rule::return_clause => ret = Some(parse_return(pair)?),
            Rule::order_clause => {
                for item in pair.into_inner().filter(|p| p.as_rule() == Rule::sort_item) {
                    order.push(parse_sort_item(item)?);
                }
            }
            Rule::skip_clause => skip = Some(parse_count(pair)?),
            Rule::limit_clause => limit = Some(parse_count(pair)?),
            _ => {}
        }
    }

    Ok(Query {
        clauses,
        ret: ret.ok_or_else(|| syntax("missing RETURN clause"))?,
        order,
        skip,
        limit,
    })
}

fn parse_count(pair: Pair<Rule>) -> GraphResult<usize> {
    let text = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::integer)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    text.parse::<usize>()
        .map_err(|_| syntax(format!("invalid row count `{}`", text)))
}

fn parse_match(pair: Pair<Rule>) -> GraphResult<MatchClause> {
    let mut patterns = Vec::new();
    let mut conditions = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::pattern => patterns.push(parse_pattern(inner)?),
            Rule::where_clause => {
                for cond in inner.into_inner().filter(|p| p.as_rule() == Rule::condition) {
                    conditions.push(parse_condition(cond)?);
                }
            }
            _ => {}
        }
    }

    Ok(MatchClause { patterns, conditions })
}

fn parse_pattern(pair: Pair<Rule>) -> GraphResult<PathPattern> {
    let mut inner = pair.into_inner();
    let start = match inner.next() {
        Some(p) => parse_node(p)?,
        None => return Err(syntax("empty pattern")),
    };

    let mut hops = Vec::new();
    while let Some(rel) = inner.next() {
        let rel = parse_relationship(rel);
        let node = match inner.next() {
            Some(p) => parse_node(p)?,
            None => return Err(syntax("relationship without target node")),
        };
        hops.push((rel, node));
    }

    Ok(PathPattern { start, hops })
}

fn parse_node(pair: Pair<Rule>) -> GraphResult<NodePattern> {
    let mut node = NodePattern::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::variable => node.variable = Some(name_of(inner)),
            Rule::label => node.label = inner.into_inner().next().map(|n| unquote_name(n.as_str())),
            Rule::properties => {
                for prop in inner.into_inner() {
                    let mut parts = prop.into_inner();
                    let key = parts.next().map(|n| unquote_name(n.as_str())).unwrap_or_default();
                    let value = match parts.next() {
                        Some(lit) => parse_literal(lit)?,
                        None => Value::Null,
                    };
                    node.properties.push((key, value));
                }
            }
            _ => {}
        }
    }
    Ok(node)
}

fn parse_relationship(pair: Pair<Rule>) -> RelPattern {
    let mut left = false;
    let mut right = false;
    let mut variable = None;
    let mut types = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::left_arrow => left = true,
            Rule::right_arrow => right = true,
            Rule::rel_detail => {
                for detail in inner.into_inner() {
                    match detail.as_rule() {
                        Rule::variable => variable = Some(name_of(detail)),
                        Rule::rel_types => {
                            types.extend(detail.into_inner().map(|n| unquote_name(n.as_str())))
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let direction = match (left, right) {
        (false, true) => Direction::Outgoing,
        (true, false) => Direction::Incoming,
        _ => Direction::Either,
    };

    RelPattern {
        variable,
        types,
        direction,
    }
}

fn parse_condition(pair: Pair<Rule>) -> GraphResult<Condition> {
    let mut inner = pair.into_inner();
    let (Some(left), Some(op), Some(right)) = (inner.next(), inner.next(), inner.next()) else {
        return Err(syntax("incomplete condition"));
    };

    let normalized = op.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    let op = match normalized.as_str() {
        "=" => Comparison::Eq,
        "<>" => Comparison::Ne,
        "<" => Comparison::Lt,
        "<=" => Comparison::Le,
        ">" => Comparison::Gt,
        ">=" => Comparison::Ge,
        "CONTAINS" => Comparison::Contains,
        "STARTS WITH" => Comparison::StartsWith,
        "ENDS WITH" => Comparison::EndsWith,
        other => return Err(syntax(format!("unsupported comparison `{}`", other))),
    };

    Ok(Condition {
        left: parse_operand(left)?,
        op,
        right: parse_operand(right)?,
    })
}

fn parse_operand(pair: Pair<Rule>) -> GraphResult<Operand> {
    let inner = match pair.as_rule() {
        Rule::operand => pair
            .into_inner()
            .next()
            .ok_or_else(|| syntax("empty operand"))?,
        _ => pair,
    };

    match inner.as_rule() {
        Rule::literal => Ok(Operand::Literal(parse_literal(inner)?)),
        Rule::property_access => {
            let mut names = inner.into_inner();
            let variable = names.next().map(|n| unquote_name(n.as_str())).unwrap_or_default();
            let key = names.next().map(|n| unquote_name(n.as_str())).unwrap_or_default();
            Ok(Operand::Property { variable, key })
        }
        Rule::variable => Ok(Operand::Variable(name_of(inner))),
        Rule::function_call => {
            let mut parts = inner.into_inner();
            let name = parts.next().map(|n| n.as_str().to_lowercase()).unwrap_or_default();
            let function = match name.as_str() {
                "tolower" => Function::ToLower,
                "toupper" => Function::ToUpper,
                "trim" => Function::Trim,
                other => return Err(syntax(format!("unsupported function `{}`", other))),
            };
            let arg = parts.next().ok_or_else(|| syntax("function without argument"))?;
            Ok(Operand::Call {
                function,
                arg: Box::new(parse_operand(arg)?),
            })
        }
        other => Err(syntax(format!("unexpected operand {:?}", other))),
    }
}

fn parse_literal(pair: Pair<Rule>) -> GraphResult<Value> {
    let inner = match pair.as_rule() {
        Rule::literal => pair
            .into_inner()
            .next()
            .ok_or_else(|| syntax("empty literal"))?,
        _ => pair,
    };

    match inner.as_rule() {
        Rule::string => {
            let raw = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Value::String(unescape(raw)))
        }
        Rule::integer => inner
            .as_str()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| syntax(format!("invalid integer `{}`", inner.as_str()))),
        Rule::float => inner
            .as_str()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| syntax(format!("invalid float `{}`", inner.as_str()))),
        Rule::true_kw => Ok(Value::Bool(true)),
        Rule::false_kw => Ok(Value::Bool(false)),
        Rule::null_kw => Ok(Value::Null),
        other => Err(syntax(format!("unexpected literal {:?}", other))),
    }
}

fn parse_return(pair: Pair<Rule>) -> GraphResult<ReturnClause> {
    let mut distinct = false;
    let mut items = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::distinct_kw => distinct = true,
            Rule::return_item => {
                let mut parts = inner.into_inner();
                let expr_pair = parts.next().ok_or_else(|| syntax("empty RETURN item"))?;
                let text = expr_pair.as_str().trim().to_string();
                let expression = parse_expression(expr_pair)?;
                let alias = parts
                    .find(|p| p.as_rule() == Rule::name)
                    .map(|p| unquote_name(p.as_str()));
                items.push(ReturnItem {
                    expression,
                    column: alias.unwrap_or_else(|| text.clone()),
                    text,
                });
            }
            _ => {}
        }
    }

    Ok(ReturnClause { distinct, items })
}

fn parse_expression(pair: Pair<Rule>) -> GraphResult<Expression> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| syntax("empty expression"))?;

    match inner.as_rule() {
        Rule::aggregate => {
            let mut function = Aggregate::Count;
            let mut distinct = false;
            let mut arg = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::aggregate_fn => {
                        if part.as_str().eq_ignore_ascii_case("collect") {
                            function = Aggregate::Collect;
                        }
                    }
                    Rule::distinct_kw => distinct = true,
                    Rule::operand => arg = Some(parse_operand(part)?),
                    _ => {}
                }
            }
            if function == Aggregate::Collect && arg.is_none() {
                return Err(syntax("collect(*) is not valid"));
            }
            Ok(Expression::Aggregate {
                function,
                distinct,
                arg,
            })
        }
        _ => Ok(Expression::Operand(parse_operand(inner)?)),
    }
}

fn parse_sort_item(pair: Pair<Rule>) -> GraphResult<SortItem> {
    let mut operand = None;
    let mut text = String::new();
    let mut descending = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::operand => {
                text = inner.as_str().trim().to_string();
                operand = Some(parse_operand(inner)?);
            }
            Rule::desc_kw => descending = true,
            _ => {}
        }
    }

    Ok(SortItem {
        operand: operand.ok_or_else(|| syntax("empty ORDER BY item"))?,
        text,
        descending,
    })
}

fn name_of(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|n| unquote_name(n.as_str()))
        .unwrap_or_default()
}

fn unquote_name(raw: &str) -> String {
    raw.trim_matches('`').to_string()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Evaluate a parsed query against the graph
pub(crate) fn execute(query: &Query, graph: &GraphData) -> GraphResult<Vec<Row>> {
    let mut bindings: Vec<Binding> = vec![Binding::new()];

    for clause in &query.clauses {
        for pattern in &clause.patterns {
            let mut next = Vec::new();
            for binding in &bindings {
                next.extend(match_path(pattern, graph, binding)?);
            }
            bindings = next;
        }

        let mut kept = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if passes(&clause.conditions, graph, &binding)? {
                kept.push(binding);
            }
        }
        bindings = kept;
    }

    let mut rows = project(&query.ret, graph, &bindings)?;

    if query.ret.distinct {
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row_key(row.values())));
    }

    if !query.order.is_empty() {
        let columns = sort_columns(query)?;
        rows.sort_by(|a, b| {
            for (column, descending) in &columns {
                let ord = compare_values(&a[column.as_str()], &b[column.as_str()]);
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(usize::MAX);
    Ok(rows.into_iter().skip(skip).take(limit).collect())
}

fn match_path(path: &PathPattern, graph: &GraphData, binding: &Binding) -> GraphResult<Vec<Binding>> {
    // (binding, current node, edges used along this path)
    let mut partials: Vec<(Binding, usize, Vec<usize>)> = Vec::new();

    for node in 0..graph.nodes.len() {
        if !node_matches(&path.start, graph, node) {
            continue;
        }
        let mut b = binding.clone();
        if try_bind(&mut b, path.start.variable.as_deref(), Element::Node(node)) {
            partials.push((b, node, Vec::new()));
        }
    }

    for (rel, target) in &path.hops {
        let mut extended = Vec::new();
        for (b, current, used) in partials {
            let outgoing = rel.direction != Direction::Incoming;
            let incoming = rel.direction != Direction::Outgoing;
            for (edge, other) in graph.neighbours(current, outgoing, incoming) {
                if used.contains(&edge) {
                    continue;
                }
                if !rel.types.is_empty() && !rel.types.iter().any(|t| *t == graph.edges[edge].edge_type) {
                    continue;
                }
                if !node_matches(target, graph, other) {
                    continue;
                }
                let mut nb = b.clone();
                if !try_bind(&mut nb, rel.variable.as_deref(), Element::Edge(edge)) {
                    continue;
                }
                if !try_bind(&mut nb, target.variable.as_deref(), Element::Node(other)) {
                    continue;
                }
                let mut nu = used.clone();
                nu.push(edge);
                extended.push((nb, other, nu));
            }
        }
        partials = extended;
    }

    Ok(partials.into_iter().map(|(b, _, _)| b).collect())
}

fn node_matches(pattern: &NodePattern, graph: &GraphData, node: usize) -> bool {
    let stored = &graph.nodes[node];
    if let Some(label) = &pattern.label {
        if stored.label != *label {
            return false;
        }
    }
    pattern.properties.iter().all(|(key, expected)| {
        stored
            .properties
            .get(key)
            .map(|actual| values_equal(actual, expected))
            .unwrap_or(false)
    })
}

fn try_bind(binding: &mut Binding, variable: Option<&str>, element: Element) -> bool {
    let Some(variable) = variable else {
        return true;
    };
    match binding.get(variable) {
        Some(existing) => *existing == element,
        None => {
            binding.insert(variable.to_string(), element);
            true
        }
    }
}

fn passes(conditions: &[Condition], graph: &GraphData, binding: &Binding) -> GraphResult<bool> {
    for condition in conditions {
        let left = evaluate(&condition.left, graph, binding)?;
        let right = evaluate(&condition.right, graph, binding)?;
        if !compare(&left, condition.op, &right) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate(operand: &Operand, graph: &GraphData, binding: &Binding) -> GraphResult<Value> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Property { variable, key } => match binding.get(variable) {
            Some(Element::Node(node)) => Ok(graph.nodes[*node]
                .properties
                .get(key)
                .cloned()
                .unwrap_or(Value::Null)),
            Some(Element::Edge(_)) => Ok(Value::Null),
            None => Err(syntax(format!("variable `{}` not defined", variable))),
        },
        Operand::Variable(variable) => match binding.get(variable) {
            Some(Element::Node(node)) => {
                let props: Map<String, Value> = graph.nodes[*node]
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Ok(Value::Object(props))
            }
            Some(Element::Edge(_)) => Ok(Value::Object(Map::new())),
            None => Err(syntax(format!("variable `{}` not defined", variable))),
        },
        Operand::Call { function, arg } => {
            let value = evaluate(arg, graph, binding)?;
            Ok(match (function, value) {
                (Function::ToLower, Value::String(s)) => Value::String(s.to_lowercase()),
                (Function::ToUpper, Value::String(s)) => Value::String(s.to_uppercase()),
                (Function::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
                (_, Value::Null) => Value::Null,
                (_, other) => {
                    return Err(syntax(format!("string function applied to {}", other)));
                }
            })
        }
    }
}

fn compare(left: &Value, op: Comparison, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        Comparison::Eq => values_equal(left, right),
        Comparison::Ne => !values_equal(left, right),
        Comparison::Lt => compare_values(left, right) == Ordering::Less,
        Comparison::Le => compare_values(left, right) != Ordering::Greater,
        Comparison::Gt => compare_values(left, right) == Ordering::Greater,
        Comparison::Ge => compare_values(left, right) != Ordering::Less,
        Comparison::Contains | Comparison::StartsWith | Comparison::EndsWith => {
            let (Value::String(l), Value::String(r)) = (left, right) else {
                return false;
            };
            match op {
                Comparison::Contains => l.contains(r.as_str()),
                Comparison::StartsWith => l.starts_with(r.as_str()),
                _ => l.ends_with(r.as_str()),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order used for sorting: numbers, then strings, then booleans, nulls last
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            Value::Bool(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
            Value::Null => 4,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn row_key<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    let values: Vec<&Value> = values.collect();
    serde_json::to_string(&values).unwrap_or_default()
}

fn project(ret: &ReturnClause, graph: &GraphData, bindings: &[Binding]) -> GraphResult<Vec<Row>> {
    let aggregating = ret
        .items
        .iter()
        .any(|item| matches!(item.expression, Expression::Aggregate { .. }));

    if !aggregating {
        let mut rows = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut row = Row::new();
            for item in &ret.items {
                if let Expression::Operand(operand) = &item.expression {
                    row.insert(item.column.clone(), evaluate(operand, graph, binding)?);
                }
            }
            rows.push(row);
        }
        return Ok(rows);
    }

    // group key -> (grouping values, per-aggregate accumulated values)
    let mut groups: IndexMap<String, (Vec<Value>, Vec<Vec<Value>>)> = IndexMap::new();
    let aggregates = ret
        .items
        .iter()
        .filter(|item| matches!(item.expression, Expression::Aggregate { .. }))
        .count();

    for binding in bindings {
        let mut keys = Vec::new();
        let mut inputs = Vec::new();
        for item in &ret.items {
            match &item.expression {
                Expression::Operand(operand) => keys.push(evaluate(operand, graph, binding)?),
                Expression::Aggregate { arg, .. } => inputs.push(match arg {
                    Some(operand) => evaluate(operand, graph, binding)?,
                    // count(*) counts every row
                    None => Value::Bool(true),
                }),
            }
        }
        let entry = groups
            .entry(row_key(keys.iter()))
            .or_insert_with(|| (keys, vec![Vec::new(); aggregates]));
        for (slot, value) in entry.1.iter_mut().zip(inputs) {
            if !value.is_null() {
                slot.push(value);
            }
        }
    }

    let grouped = ret.items.len() > aggregates;
    if groups.is_empty() && !grouped {
        groups.insert(String::new(), (Vec::new(), vec![Vec::new(); aggregates]));
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (_, (keys, collected)) in groups {
        let mut keys = keys.into_iter();
        let mut collected = collected.into_iter();
        let mut row = Row::new();
        for item in &ret.items {
            let value = match &item.expression {
                Expression::Operand(_) => keys.next().unwrap_or(Value::Null),
                Expression::Aggregate {
                    function, distinct, ..
                } => {
                    let mut values = collected.next().unwrap_or_default();
                    if *distinct {
                        let mut seen = HashSet::new();
                        values.retain(|v| seen.insert(row_key(std::iter::once(v))));
                    }
                    match function {
                        Aggregate::Count => Value::from(values.len() as u64),
                        Aggregate::Collect => Value::Array(values),
                    }
                }
            };
            row.insert(item.column.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Resolve ORDER BY items to result columns, by alias or by expression text
fn sort_columns(query: &Query) -> GraphResult<Vec<(String, bool)>> {
    query
        .order
        .iter()
        .map(|sort| {
            let by_alias = match &sort.operand {
                Operand::Variable(name) => query.ret.items.iter().find(|i| i.column == *name),
                _ => None,
            };
            by_alias
                .or_else(|| query.ret.items.iter().find(|i| i.text == sort.text))
                .map(|i| (i.column.clone(), sort.descending))
                .ok_or_else(|| syntax(format!("ORDER BY `{}` must be a returned column", sort.text)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::seed::{MentorKind, PersonRecord};

    fn graph() -> GraphData {
        let mut data = GraphData::default();
        data.load(&[
            PersonRecord::new(1, "Grace Hopper", "Tech Lead", "Engineering")
                .with_project("Inventory Management System"),
            PersonRecord::new(2, "Ada Lovelace", "Developer", "Engineering")
                .with_mentor(MentorKind::Tech, "Grace Hopper")
                .with_mentor(MentorKind::Career, "Grace Hopper")
                .with_project("Inventory Management System")
                .with_project("Market Research Tool"),
            PersonRecord::new(3, "Alan Turing", "Developer", "Engineering")
                .with_mentor(MentorKind::Tech, "Grace Hopper"),
        ]);
        data
    }

    fn run(query: &str) -> Vec<Row> {
        let parsed = parse(query).unwrap_or_else(|e| panic!("{}: {}", query, e));
        execute(&parsed, &graph()).unwrap()
    }

    #[test]
    fn test_parse_rejects_writes_and_unsupported_clauses() {
        assert!(parse("CREATE (n:Person)").is_err());
        assert!(parse("MATCH (n) WITH n RETURN n").is_err());
        assert!(parse("MATCH (n:Person) RETURN n UNION MATCH (m) RETURN m").is_err());
    }

    #[test]
    fn test_single_hop_with_inline_properties() {
        let rows = run(
            "MATCH (m:Person)-[:IS_TECH_MENTOR_OF]->(p:Person {full_name: 'Ada Lovelace'}) \
             RETURN m.full_name AS mentor",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["mentor"], "Grace Hopper");
    }

    #[test]
    fn test_incoming_direction_and_where() {
        let rows = run(
            "MATCH (p:Person)<-[:IS_TECH_MENTEE_OF]-(mentee:Person) \
             WHERE toLower(p.full_name) = 'grace hopper' \
             RETURN mentee.full_name ORDER BY mentee.full_name",
        );
        let names: Vec<&Value> = rows.iter().map(|r| &r["mentee.full_name"]).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[test]
    fn test_undirected_relationship() {
        let rows = run(
            "MATCH (a:Person {full_name: 'Ada Lovelace'})-[:IS_CAREER_MENTOR_OF]-(b) RETURN b.full_name AS name",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Grace Hopper");
    }

    #[test]
    fn test_count_and_collect_group_by_keys() {
        let rows = run(
            "MATCH (p:Person)-[:WORKS_ON]->(j:Project) \
             RETURN j.name AS project, count(p) AS members, collect(p.full_name) AS names \
             ORDER BY members DESC",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["project"], "Inventory Management System");
        assert_eq!(rows[0]["members"], 2);
        assert_eq!(rows[1]["members"], 1);
    }

    #[test]
    fn test_count_without_matches_returns_zero_row() {
        let rows = run("MATCH (p:Person {full_name: 'Nobody'}) RETURN count(*) AS total");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total"], 0);
    }

    #[test]
    fn test_distinct_skip_limit() {
        let rows = run("MATCH (p:Person)-[:IS_TECH_MENTEE_OF]->(m:Person) RETURN DISTINCT m.full_name AS mentor");
        assert_eq!(rows.len(), 1);

        let rows = run("MATCH (p:Person) RETURN p.id AS id ORDER BY id SKIP 1 LIMIT 1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 2);
    }

    #[test]
    fn test_string_predicates() {
        let rows = run("MATCH (j:Project) WHERE j.name STARTS WITH 'Market' RETURN j.name");
        assert_eq!(rows.len(), 1);
        let rows = run("MATCH (j:Project) WHERE j.name CONTAINS 'System' RETURN j.name");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_return_node_as_map() {
        let rows = run("MATCH (p:Person {id: 2}) RETURN p");
        assert_eq!(rows[0]["p"]["full_name"], "Ada Lovelace");
        assert_eq!(rows[0]["p"]["position"], "Developer");
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let parsed = parse("MATCH (p:Person) RETURN q.full_name").unwrap();
        assert!(execute(&parsed, &graph()).is_err());
    }
}
