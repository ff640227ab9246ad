//! Analysis inputs: SQL text or JSON ASTs, read from files or stdin.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Name reported for input read from stdin.
pub const STDIN_NAME: &str = "<stdin>";

/// Input text with the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSource {
    pub name: String,
    pub content: String,
}

impl SqlSource {
    /// Decodes the content as a JSON AST document.
    pub fn json_ast(&self) -> Result<Value> {
        serde_json::from_str(&self.content)
            .with_context(|| format!("Failed to parse JSON AST from {}", self.name))
    }
}

/// Reads every input in order.
///
/// No paths means stdin only; a `-` path reads stdin in that position, at most once.
pub fn read_input(files: &[PathBuf]) -> Result<Vec<SqlSource>> {
    if files.is_empty() {
        return Ok(vec![read_stdin()?]);
    }

    let mut sources = Vec::with_capacity(files.len());
    let mut stdin_taken = false;
    for path in files {
        if path.as_os_str() == "-" {
            if stdin_taken {
                bail!("stdin (-) may be given only once");
            }
            stdin_taken = true;
            sources.push(read_stdin()?);
        } else {
            sources.push(read_file(path)?);
        }
    }
    Ok(sources)
}

fn read_stdin() -> Result<SqlSource> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read from stdin")?;
    Ok(SqlSource {
        name: STDIN_NAME.to_string(),
        content,
    })
}

fn read_file(path: &Path) -> Result<SqlSource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(SqlSource {
        name: path.display().to_string(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sql_file(sql: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{sql}").unwrap();
        file
    }

    #[test]
    fn test_files_keep_order_and_names() {
        let users = sql_file("SELECT * FROM users");
        let orders = sql_file("SELECT * FROM orders");

        let sources =
            read_input(&[users.path().to_path_buf(), orders.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, users.path().display().to_string());
        assert!(sources[1].content.contains("orders"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_input(&[PathBuf::from("/nonexistent/file.sql")]).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/file.sql"));
    }

    #[test]
    fn test_json_ast_decoding() {
        let source = SqlSource {
            name: "query.json".to_string(),
            content: r#"{"type": "select"}"#.to_string(),
        };
        assert_eq!(source.json_ast().unwrap()["type"], "select");

        let broken = SqlSource {
            name: "broken.json".to_string(),
            content: "{ nope".to_string(),
        };
        let err = broken.json_ast().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse JSON AST from broken.json"));
    }
}
