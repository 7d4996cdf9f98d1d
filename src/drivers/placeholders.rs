use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{DbSqlError, Result};
use crate::types::DbParameter;

/// Rewrites `@name` placeholders to PostgreSQL's positional `$n` form.
///
/// Returns the rewritten text and the parameters in positional order. A name
/// used twice maps to the same position. Text inside single-quoted literals
/// and double-quoted identifiers is left alone, as are `--` and `/* */`
/// comments and the `@@` operator. When the text contains no named
/// placeholders the parameters are passed through in their given order, so
/// commands already written with `$n` keep working.
pub(crate) fn to_positional<'a>(
    text: &str,
    parameters: &'a [DbParameter],
) -> Result<(String, Vec<&'a DbParameter>)> {
    let mut sql = String::with_capacity(text.len());
    let mut ordered: Vec<&'a DbParameter> = Vec::new();
    let mut found_named = false;

    let mut chars = text.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((_, c)) = chars.next() {
        if let Some(q) = quote {
            sql.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                sql.push(c);
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                sql.push(c);
                for (_, n) in chars.by_ref() {
                    sql.push(n);
                    if n == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                sql.push(c);
                copy_block_comment(&mut chars, &mut sql);
            }
            '@' if matches!(chars.peek(), Some((_, '@'))) => {
                sql.push_str("@@");
                chars.next();
            }
            '@' if matches!(chars.peek(), Some((_, n)) if n.is_ascii_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some((_, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || *n == '_' {
                        name.push(*n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                found_named = true;

                let position = match ordered.iter().position(|p| p.bare_name() == name) {
                    Some(existing) => existing + 1,
                    None => {
                        let parameter = parameters
                            .iter()
                            .find(|p| p.bare_name() == name)
                            .ok_or_else(|| {
                                DbSqlError::QueryFailed(format!("no parameter named @{}", name))
                            })?;
                        ordered.push(parameter);
                        ordered.len()
                    }
                };
                sql.push('$');
                sql.push_str(&position.to_string());
            }
            _ => sql.push(c),
        }
    }

    if !found_named {
        return Ok((text.to_string(), parameters.iter().collect()));
    }
    Ok((sql, ordered))
}

// Copies a block comment after its opening `/`. Comments nest.
fn copy_block_comment(chars: &mut Peekable<CharIndices<'_>>, sql: &mut String) {
    if let Some((_, opening)) = chars.next() {
        sql.push(opening);
    }
    let mut depth = 1usize;
    while let Some((_, c)) = chars.next() {
        sql.push(c);
        match c {
            '*' if matches!(chars.peek(), Some((_, '/'))) => {
                sql.push('/');
                chars.next();
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                sql.push('*');
                chars.next();
                depth += 1;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SqlType, SqlValue};

    fn param(name: &str, value: i32) -> DbParameter {
        DbParameter::new(name, SqlType::Int32, SqlValue::Int32(value))
    }

    #[test]
    fn test_rewrites_in_text_order() {
        let params = vec![param("id", 1), param("name", 2), param("age", 3)];
        let (sql, ordered) = to_positional(
            "INSERT INTO t (id, name, age) VALUES (@id, @name, @age)",
            &params,
        )
        .unwrap();

        assert_eq!(sql, "INSERT INTO t (id, name, age) VALUES ($1, $2, $3)");
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[2].name, "age");
    }

    #[test]
    fn test_repeated_name_reuses_position() {
        let params = vec![param("@lo", 1), param("hi", 2)];
        let (sql, ordered) =
            to_positional("SELECT * FROM t WHERE a > @lo AND b < @hi OR c = @lo", &params).unwrap();

        assert_eq!(sql, "SELECT * FROM t WHERE a > $1 AND b < $2 OR c = $1");
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn test_quoted_text_is_untouched() {
        let params = vec![param("age", 18)];
        let (sql, _) =
            to_positional("SELECT '@age', \"@col\" FROM t WHERE age > @age", &params).unwrap();
        assert_eq!(sql, "SELECT '@age', \"@col\" FROM t WHERE age > $1");
    }

    #[test]
    fn test_positional_text_passes_through() {
        let params = vec![param("a", 1), param("b", 2)];
        let (sql, ordered) = to_positional("SELECT $1 + $2", &params).unwrap();
        assert_eq!(sql, "SELECT $1 + $2");
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn test_comments_are_untouched() {
        let params = vec![param("id", 1)];
        let (sql, ordered) = to_positional(
            "SELECT * FROM t -- ping me @home\nWHERE id = @id /* was @old /* nested @x */ */",
            &params,
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM t -- ping me @home\nWHERE id = $1 /* was @old /* nested @x */ */"
        );
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_double_at_operator_is_untouched() {
        let params = vec![param("q", 1)];
        let (sql, _) =
            to_positional("SELECT * FROM docs WHERE tsv @@to_tsquery(@q)", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM docs WHERE tsv @@to_tsquery($1)");
    }

    #[test]
    fn test_unknown_name_fails() {
        let err = to_positional("SELECT @missing", &[]).unwrap_err();
        assert!(matches!(err, DbSqlError::QueryFailed(_)));
    }
}
