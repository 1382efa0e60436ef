use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::ExtractError;

/// Runs `tool` with `args` and returns its standard output split into lines,
/// trailing whitespace removed. Blocks until the tool exits.
pub fn read_output_lines<I, S>(tool: &str, args: I) -> Result<Vec<String>, ExtractError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ExtractError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    let mut lines = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            lines.push(line?.trim_end().to_string());
        }
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            status,
        });
    }

    debug!("{} produced {} lines", tool, lines.len());
    Ok(lines)
}

/// Runs `tool` for its side effect only.
pub fn run<I, S>(tool: &str, args: I) -> Result<(), ExtractError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let status = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| ExtractError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            status,
        });
    }
    Ok(())
}

/// Wraps `s` in `quote`, escaping embedded quote characters with a backslash.
pub fn quote(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        if c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Inverse of [`quote`]. Strings not enclosed in `quote` are returned as is.
pub fn dequote(s: &str, quote: char) -> String {
    let inner = match s
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
    {
        Some(inner) => inner,
        None => return s.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&quote) {
            continue;
        }
        out.push(c);
    }
    out
}
