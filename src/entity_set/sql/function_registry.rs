//! OData canonical function to SQL template registry.
//!
//! Templates reference compiled arguments as `{0}`, `{1}`, ... and must mention them
//! in argument order. `substring` is registered per arity.

use std::collections::HashMap;

use super::dialect::SqlDialect;

#[derive(Clone)]
pub struct FunctionMapping {
    /// OData function name, with `/arity` when overloaded
    pub odata_name: &'static str,
    /// Template shared by every dialect unless overridden
    pub sqlite: &'static str,
    pub postgres: Option<&'static str>,
    pub mysql: Option<&'static str>,
}

impl FunctionMapping {
    pub fn template(&self, dialect: SqlDialect) -> &'static str {
        match dialect {
            SqlDialect::Sqlite => self.sqlite,
            SqlDialect::Postgres => self.postgres.unwrap_or(self.sqlite),
            SqlDialect::MySql => self.mysql.unwrap_or(self.sqlite),
        }
    }

    /// Substitutes compiled arguments into the dialect's template.
    pub fn render(&self, dialect: SqlDialect, args: &[String]) -> String {
        args.iter()
            .enumerate()
            .fold(self.template(dialect).to_string(), |sql, (i, arg)| {
                sql.replace(&format!("{{{}}}", i), arg)
            })
    }

    /// True when the template uses some argument more than once.
    pub fn repeats_arguments(&self, dialect: SqlDialect, arity: usize) -> bool {
        let template = self.template(dialect);
        (0..arity).any(|i| template.matches(&format!("{{{}}}", i)).count() > 1)
    }
}

/// Looks up the mapping for `name` called with `arity` arguments.
pub fn get_function_mapping(name: &str, arity: usize) -> Option<FunctionMapping> {
    FUNCTION_MAPPINGS
        .get(format!("{}/{}", name, arity).as_str())
        .or_else(|| FUNCTION_MAPPINGS.get(name))
        .cloned()
}

fn mapping(
    odata_name: &'static str,
    sqlite: &'static str,
    postgres: Option<&'static str>,
    mysql: Option<&'static str>,
) -> FunctionMapping {
    FunctionMapping {
        odata_name,
        sqlite,
        postgres,
        mysql,
    }
}

lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====

        m.insert("contains", mapping("contains", "(INSTR({0}, {1}) > 0)", Some("(STRPOS({0}, {1}) > 0)"), None));
        m.insert("startswith", mapping("startswith", "(INSTR({0}, {1}) = 1)", Some("(STRPOS({0}, {1}) = 1)"), None));
        m.insert("endswith", mapping(
            "endswith",
            "(SUBSTR({0}, LENGTH({0}) - LENGTH({1}) + 1) = {1})",
            Some("(RIGHT({0}, LENGTH({1})) = {1})"),
            Some("(RIGHT({0}, CHAR_LENGTH({1})) = {1})"),
        ));
        m.insert("indexof", mapping("indexof", "(INSTR({0}, {1}) - 1)", Some("(STRPOS({0}, {1}) - 1)"), None));
        m.insert("length", mapping("length", "LENGTH({0})", None, Some("CHAR_LENGTH({0})")));
        m.insert("substring/2", mapping(
            "substring/2",
            "SUBSTR({0}, MAX({1}, 0) + 1)",
            Some("SUBSTR({0}, GREATEST(CAST({1} AS INTEGER), 0) + 1)"),
            Some("SUBSTR({0}, GREATEST({1}, 0) + 1)"),
        ));
        m.insert("substring/3", mapping(
            "substring/3",
            "SUBSTR({0}, MAX({1}, 0) + 1, MAX({2}, 0))",
            Some("SUBSTR({0}, GREATEST(CAST({1} AS INTEGER), 0) + 1, GREATEST(CAST({2} AS INTEGER), 0))"),
            Some("SUBSTR({0}, GREATEST({1}, 0) + 1, GREATEST({2}, 0))"),
        ));
        m.insert("tolower", mapping("tolower", "LOWER({0})", None, None));
        m.insert("toupper", mapping("toupper", "UPPER({0})", None, None));
        m.insert("trim", mapping("trim", "TRIM({0})", None, None));
        m.insert("concat", mapping("concat", "({0} || {1})", None, Some("CONCAT({0}, {1})")));

        // ===== DATE AND TIME FUNCTIONS =====
        // sqlite stores temporal values as ISO 8601 text; strftime normalizes offsets to UTC.

        m.insert("year", mapping("year", "CAST(STRFTIME('%Y', {0}) AS INTEGER)", Some("CAST(EXTRACT(YEAR FROM {0}) AS INTEGER)"), Some("YEAR({0})")));
        m.insert("month", mapping("month", "CAST(STRFTIME('%m', {0}) AS INTEGER)", Some("CAST(EXTRACT(MONTH FROM {0}) AS INTEGER)"), Some("MONTH({0})")));
        m.insert("day", mapping("day", "CAST(STRFTIME('%d', {0}) AS INTEGER)", Some("CAST(EXTRACT(DAY FROM {0}) AS INTEGER)"), Some("DAY({0})")));
        m.insert("hour", mapping("hour", "CAST(STRFTIME('%H', {0}) AS INTEGER)", Some("CAST(EXTRACT(HOUR FROM {0}) AS INTEGER)"), Some("HOUR({0})")));
        m.insert("minute", mapping("minute", "CAST(STRFTIME('%M', {0}) AS INTEGER)", Some("CAST(EXTRACT(MINUTE FROM {0}) AS INTEGER)"), Some("MINUTE({0})")));
        m.insert("second", mapping("second", "CAST(STRFTIME('%S', {0}) AS INTEGER)", Some("CAST(FLOOR(EXTRACT(SECOND FROM {0})) AS INTEGER)"), Some("SECOND({0})")));
        m.insert("date", mapping("date", "DATE({0})", Some("CAST({0} AS DATE)"), None));
        m.insert("time", mapping("time", "TIME({0})", Some("CAST({0} AS TIME)"), None));
        m.insert("now", mapping("now", "STRFTIME('%Y-%m-%dT%H:%M:%SZ', 'now')", Some("NOW()"), Some("UTC_TIMESTAMP()")));

        // ===== ARITHMETIC FUNCTIONS =====

        m.insert("round", mapping("round", "ROUND({0})", None, None));
        m.insert("floor", mapping(
            "floor",
            "(CAST({0} AS INTEGER) - ({0} < CAST({0} AS INTEGER)))",
            Some("FLOOR({0})"),
            Some("FLOOR({0})"),
        ));
        m.insert("ceiling", mapping(
            "ceiling",
            "(CAST({0} AS INTEGER) + ({0} > CAST({0} AS INTEGER)))",
            Some("CEIL({0})"),
            Some("CEILING({0})"),
        ));

        m
    };
}
