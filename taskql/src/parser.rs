//! DDL parser using nom
//!
//! Reads back the `CREATE TABLE` and `CREATE INDEX` text SQLite keeps in
//! `sqlite_master`, split into column definitions and table constraints so a
//! table can be rebuilt with some columns dropped, renamed or redefined.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, tuple},
};

use crate::error::ParseError;

/// A parsed `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq)]
pub struct TableDdl {
    pub name: String,
    pub columns: Vec<ColumnDdl>,
    /// Table-level constraints, verbatim
    pub constraints: Vec<String>,
    /// Trailing table options such as `WITHOUT ROWID`
    pub options: Option<String>,
}

/// One column definition: the name plus everything after it
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDdl {
    pub name: String,
    pub definition: String,
}

/// A parsed `CREATE INDEX` statement
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDdl {
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

impl TableDdl {
    pub fn column(&self, name: &str) -> Option<&ColumnDdl> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn to_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.definition.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} {}", c.name, c.definition)
                }
            })
            .collect();
        defs.extend(self.constraints.iter().cloned());
        let mut sql = format!("CREATE TABLE {} ({})", self.name, defs.join(", "));
        if let Some(options) = &self.options {
            sql.push(' ');
            sql.push_str(options);
        }
        sql
    }
}

impl IndexDdl {
    pub fn to_sql(&self) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            self.table,
            self.columns.join(", ")
        )
    }

    /// True if any indexed expression names `column`.
    pub fn covers(&self, column: &str) -> bool {
        self.columns.iter().any(|c| {
            c.split_whitespace()
                .next()
                .map(|first| unquote(first).eq_ignore_ascii_case(column))
                .unwrap_or(false)
        })
    }
}

/// Parse a `CREATE TABLE` statement
pub fn parse_create_table(input: &str) -> Result<TableDdl, ParseError> {
    let input = input.trim();
    let (remaining, ddl) = create_table(input).map_err(|e| {
        let err: ParseError = e.into();
        err.with_position(0)
    })?;
    let remaining = remaining.trim().trim_end_matches(';').trim();
    if !remaining.is_empty() {
        return Err(ParseError::new(format!("Unexpected trailing content: {}", remaining))
            .with_position(input.len() - remaining.len()));
    }
    Ok(ddl)
}

/// Parse a `CREATE INDEX` statement
pub fn parse_create_index(input: &str) -> Result<IndexDdl, ParseError> {
    let input = input.trim();
    let (_, ddl) = create_index(input)?;
    Ok(ddl)
}

// ============================================================================
// CREATE TABLE
// ============================================================================

fn create_table(input: &str) -> IResult<&str, TableDdl> {
    let (input, _) = tag_no_case("CREATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = opt(tuple((
        alt((tag_no_case("TEMPORARY"), tag_no_case("TEMP"))),
        multispace1,
    )))(input)?;
    let (input, _) = tag_no_case("TABLE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, items) = delimited(
        char('('),
        separated_list1(char(','), definition_item),
        char(')'),
    )(input)?;
    let (input, options) = opt(map(is_not(";"), |s: &str| s.trim().to_string()))(input)?;

    let mut columns = Vec::new();
    let mut constraints = Vec::new();
    for item in items {
        let item = item.trim();
        if is_table_constraint(item) {
            constraints.push(item.to_string());
        } else {
            let (rest, col) = identifier(item)?;
            columns.push(ColumnDdl {
                name: col,
                definition: rest.trim().to_string(),
            });
        }
    }

    Ok((input, TableDdl {
        name,
        columns,
        constraints,
        options: options.filter(|o| !o.is_empty()),
    }))
}

fn if_not_exists(input: &str) -> IResult<&str, ()> {
    let (input, _) = tuple((
        tag_no_case("IF"),
        multispace1,
        tag_no_case("NOT"),
        multispace1,
        tag_no_case("EXISTS"),
        multispace1,
    ))(input)?;
    Ok((input, ()))
}

fn is_table_constraint(item: &str) -> bool {
    ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"]
        .iter()
        .any(|kw| starts_with_keyword(item, kw))
}

fn starts_with_keyword(item: &str, keyword: &str) -> bool {
    let head = match item.get(..keyword.len()) {
        Some(head) => head,
        None => return false,
    };
    if !head.eq_ignore_ascii_case(keyword) {
        return false;
    }
    match item[keyword.len()..].chars().next() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_'),
    }
}

/// One comma-separated entry of the definition list, with nested
/// parentheses and quoted text kept intact.
fn definition_item(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((quoted, paren_group, is_not(",()'\"`[")))))(input)
}

fn paren_group(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('('),
        many0(alt((quoted, paren_group, is_not("()'\"`[")))),
        char(')'),
    ))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('\''), many0(alt((is_not("'"), tag("''")))), char('\''))),
        recognize(delimited(char('"'), many0(alt((is_not("\""), tag("\"\"")))), char('"'))),
        recognize(delimited(char('`'), opt(is_not("`")), char('`'))),
        recognize(delimited(char('['), opt(is_not("]")), char(']'))),
    ))(input)
}

// ============================================================================
// CREATE INDEX
// ============================================================================

fn create_index(input: &str) -> IResult<&str, IndexDdl> {
    let (input, _) = tag_no_case("CREATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, unique) = opt(tuple((tag_no_case("UNIQUE"), multispace1)))(input)?;
    let (input, _) = tag_no_case("INDEX")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("ON")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, columns) = delimited(
        char('('),
        separated_list1(char(','), definition_item),
        char(')'),
    )(input)?;

    Ok((input, IndexDdl {
        name,
        table,
        unique: unique.is_some(),
        columns: columns.into_iter().map(|c| c.trim().to_string()).collect(),
    }))
}

// ============================================================================
// Primitives
// ============================================================================

fn identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(quoted, |q: &str| unquote(q).to_string()),
        map(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

/// Strip one layer of identifier quoting.
pub fn unquote(ident: &str) -> &str {
    let bytes = ident.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"')
            || (first == b'`' && last == b'`')
            || (first == b'[' && last == b']')
        {
            return &ident[1..ident.len() - 1];
        }
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generated_table() {
        let ddl = parse_create_table(
            "CREATE TABLE teams (id TEXT PRIMARY KEY CHECK(LENGTH(id) = 36), \
             name TEXT NOT NULL, owner_id TEXT, \
             FOREIGN KEY (owner_id) REFERENCES players(id) ON DELETE CASCADE ON UPDATE CASCADE)",
        )
        .unwrap();

        assert_eq!(ddl.name, "teams");
        assert_eq!(ddl.columns.len(), 3);
        assert_eq!(ddl.columns[0].definition, "TEXT PRIMARY KEY CHECK(LENGTH(id) = 36)");
        assert_eq!(ddl.columns[2].name, "owner_id");
        assert_eq!(ddl.constraints.len(), 1);
        assert!(ddl.constraints[0].starts_with("FOREIGN KEY (owner_id)"));
    }

    #[test]
    fn test_commas_inside_checks_and_strings() {
        let ddl = parse_create_table(
            "CREATE TABLE IF NOT EXISTS players (role TEXT DEFAULT 'GUEST' CHECK(role IN ('ADMIN', 'GUEST')), \
             note TEXT DEFAULT 'a, b')",
        )
        .unwrap();

        assert_eq!(ddl.columns.len(), 2);
        assert_eq!(ddl.columns[0].definition, "TEXT DEFAULT 'GUEST' CHECK(role IN ('ADMIN', 'GUEST'))");
        assert_eq!(ddl.columns[1].definition, "TEXT DEFAULT 'a, b'");
    }

    #[test]
    fn test_quoted_identifiers_and_options() {
        let ddl = parse_create_table("CREATE TABLE \"tags\" (\"id\" TEXT, [unique_name] TEXT, UNIQUE (id)) WITHOUT ROWID").unwrap();
        assert_eq!(ddl.name, "tags");
        assert_eq!(ddl.columns[0].name, "id");
        assert_eq!(ddl.columns[1].name, "unique_name");
        assert_eq!(ddl.constraints, vec!["UNIQUE (id)".to_string()]);
        assert_eq!(ddl.options.as_deref(), Some("WITHOUT ROWID"));
    }

    #[test]
    fn test_to_sql_round_trips_structure() {
        let text = "CREATE TABLE tags (id TEXT PRIMARY KEY, name TEXT UNIQUE)";
        let ddl = parse_create_table(text).unwrap();
        assert_eq!(ddl.to_sql(), text);
    }

    #[test]
    fn test_parse_index() {
        let idx = parse_create_index("CREATE INDEX IF NOT EXISTS idx_name ON players(player_name, points DESC)").unwrap();
        assert_eq!(idx.name, "idx_name");
        assert_eq!(idx.table, "players");
        assert!(!idx.unique);
        assert!(idx.covers("player_name"));
        assert!(idx.covers("points"));
        assert!(!idx.covers("role"));
    }

    #[test]
    fn test_rejects_non_table() {
        assert!(parse_create_table("CREATE VIEW v AS SELECT 1").is_err());
    }
}
