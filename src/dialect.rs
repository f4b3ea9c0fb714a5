//! Per-backend keyword and type-name translation.
//!
//! A [`Dialect`] is a keyword table with identity fallback: portable names
//! like `varchar` or `datetime` render as whatever the backend calls them,
//! and names the backend never mapped render as themselves. One dialect is
//! shared read-only by every connection of a driver.

use std::collections::HashMap;

/// Keyword/type-name translation table for one backend.
///
/// Constructed from a base default set, then overridden by backend-supplied
/// pairs; later [`set_keyword`](Dialect::set_keyword) calls overwrite
/// earlier ones for the same name.
#[derive(Debug, Clone)]
pub struct Dialect {
    keywords: HashMap<String, String>,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect {
    /// Base dialect with the generic defaults.
    #[must_use]
    pub fn new() -> Self {
        let mut dialect = Self {
            keywords: HashMap::new(),
        };
        dialect.set_keywords([
            ("engine", "generic"),
            ("datetime", "timestamp"),
            ("blob", ""),
        ]);
        dialect
    }

    /// Base dialect plus backend overrides.
    #[must_use]
    pub fn with_keywords<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut dialect = Self::new();
        dialect.set_keywords(overrides);
        dialect
    }

    pub fn set_keyword(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.keywords.insert(name.into(), value.into());
    }

    pub fn set_keywords<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.set_keyword(name, value);
        }
    }

    /// Look up a keyword, falling back to `default` when unmapped.
    #[must_use]
    pub fn keyword<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.keywords.get(name).map_or(default, String::as_str)
    }

    /// Translate a type name, identity fallback when unmapped.
    #[must_use]
    pub fn type_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.keyword(name, name)
    }

    /// Render a type with optional parameters in parentheses.
    ///
    /// The name is lower-cased and mapped through the keyword table; a
    /// parenthesized parameter list is appended only when the first
    /// parameter is present and non-negative, and the second is appended
    /// only after the first.
    #[must_use]
    pub fn render_type(&self, name: &str, param: Option<i32>, param2: Option<i32>) -> String {
        let lowered = name.to_lowercase();
        let mut rendered = self.type_name(&lowered).to_owned();
        if let Some(first) = param.filter(|p| *p >= 0) {
            rendered.push('(');
            rendered.push_str(&first.to_string());
            if let Some(second) = param2.filter(|p| *p >= 0) {
                rendered.push(',');
                rendered.push_str(&second.to_string());
            }
            rendered.push(')');
        }
        rendered
    }

    /// Slice form of [`render_type`](Dialect::render_type); entries beyond
    /// the second are ignored.
    #[must_use]
    pub fn render_type_list(&self, name: &str, params: &[i32]) -> String {
        self.render_type(name, params.first().copied(), params.get(1).copied())
    }

    #[must_use]
    pub fn type_bigint(&self) -> String {
        self.render_type("bigint", None, None)
    }

    #[must_use]
    pub fn type_real(&self, size: Option<i32>) -> String {
        self.render_type("real", size, None)
    }

    #[must_use]
    pub fn type_decimal(&self, precision: i32, scale: Option<i32>) -> String {
        self.render_type("decimal", Some(precision), scale)
    }

    #[must_use]
    pub fn type_varchar(&self, length: Option<i32>) -> String {
        self.render_type("varchar", length, None)
    }

    #[must_use]
    pub fn type_nvarchar(&self, length: Option<i32>) -> String {
        self.render_type("nvarchar", length, None)
    }

    #[must_use]
    pub fn type_datetime(&self) -> String {
        self.render_type("datetime", None, None)
    }

    #[must_use]
    pub fn type_blob(&self) -> String {
        self.render_type("blob", None, None)
    }

    /// Column type for an autoincrementing primary key; empty when the
    /// backend never supplied one.
    #[must_use]
    pub fn type_autoincrement_pk(&self) -> String {
        self.keyword("type_autoincrement_pk", "").to_owned()
    }

    /// Query returning the last inserted id; empty when the backend never
    /// supplied one.
    #[must_use]
    pub fn sequence_last(&self) -> String {
        self.keyword("sequence_last", "").to_owned()
    }

    #[must_use]
    pub fn create_table_suffix(&self) -> String {
        self.keyword("create_table_suffix", "").to_owned()
    }

    /// Escape a string for inclusion in a SQL literal by doubling every
    /// embedded quote character.
    #[must_use]
    pub fn escape(&self, s: &str) -> String {
        s.replace('\'', "''")
    }

    /// The full keyword table.
    #[must_use]
    pub fn keywords(&self) -> &HashMap<String, String> {
        &self.keywords
    }
}

#[cfg(test)]
mod tests {
    use super::Dialect;

    #[test]
    fn renders_mapped_and_unmapped_names() {
        let dialect = Dialect::new();
        assert_eq!(dialect.type_datetime(), "timestamp");
        assert_eq!(dialect.render_type("VARCHAR", Some(255), None), "varchar(255)");
        assert_eq!(dialect.render_type("decimal", Some(10), Some(2)), "decimal(10,2)");
        // unmapped keyword renders as its own lower-cased name
        assert_eq!(dialect.render_type("GeomETRY", None, None), "geometry");
    }

    #[test]
    fn second_param_requires_first() {
        let dialect = Dialect::new();
        assert_eq!(dialect.render_type("decimal", None, Some(2)), "decimal");
        assert_eq!(dialect.render_type("decimal", Some(-1), Some(2)), "decimal");
        assert_eq!(dialect.render_type("decimal", Some(10), Some(-1)), "decimal(10)");
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut dialect = Dialect::with_keywords([("datetime", "datetime2")]);
        assert_eq!(dialect.type_datetime(), "datetime2");
        dialect.set_keyword("datetime", "smalldatetime");
        assert_eq!(dialect.type_datetime(), "smalldatetime");
    }

    #[test]
    fn escape_doubles_quotes() {
        let dialect = Dialect::new();
        assert_eq!(dialect.escape("o'brien's"), "o''brien''s");
    }
}
