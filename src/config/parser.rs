//! Configuration file loader.
//!
//! Block-structured format:
//!
//! ```text
//! # global scope
//! listen 127.0.0.1:8080;
//! tcp_keepidle 2m;
//!
//! server example.com {
//!     tcp_keepcnt 5;
//!     location /api {
//!         tcp_keepalive on;
//!     }
//! }
//! ```

use crate::config::{ScopeSettings, ScopeTree, set_directive};
use crate::util::{KeepaliveError, Result};
use std::fs;
use std::path::Path;

/// Address used when the file has no `listen` directive
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Everything a configuration file declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: String,
    pub scopes: ScopeTree,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            scopes: ScopeTree::new(),
        }
    }
}

/// Load configuration from a file path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Server(usize),
    Location(usize, usize),
}

fn config_error(line: usize, message: impl Into<String>) -> KeepaliveError {
    KeepaliveError::Config {
        line,
        message: message.into(),
    }
}

/// Parse configuration from a string.
pub fn parse_config(s: &str) -> Result<Config> {
    let mut cfg = Config::default();
    let mut listen_seen = false;
    let mut stack: Vec<Level> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut last_line = 0;

    for (lineno, token) in tokenize(s) {
        last_line = lineno;
        match token.as_str() {
            ";" => {
                let [name, value] = words.as_slice() else {
                    return Err(config_error(
                        lineno,
                        format!("expected `<directive> <value>;`, got {} word(s)", words.len()),
                    ));
                };

                if name == "listen" {
                    if !stack.is_empty() {
                        return Err(config_error(lineno, "\"listen\" is only allowed at the top level"));
                    }
                    if listen_seen {
                        return Err(config_error(lineno, "\"listen\" directive is duplicate"));
                    }
                    cfg.listen = value.clone();
                    listen_seen = true;
                } else {
                    let settings = scope_settings(&mut cfg.scopes, stack.last().copied());
                    set_directive(settings, name, value)
                        .map_err(|e| config_error(lineno, e.to_string()))?;
                }
                words.clear();
            }
            "{" => {
                let (kind, arg) = match words.as_slice() {
                    [kind] => (kind.as_str(), ""),
                    [kind, arg] => (kind.as_str(), arg.as_str()),
                    _ => return Err(config_error(lineno, "unexpected \"{\"")),
                };
                let level = match (kind, stack.last().copied()) {
                    ("server", None) => {
                        cfg.scopes.server(arg);
                        Level::Server(cfg.scopes.servers.len() - 1)
                    }
                    ("location", Some(Level::Server(si))) => {
                        if arg.is_empty() {
                            return Err(config_error(lineno, "location requires a path prefix"));
                        }
                        let server = &mut cfg.scopes.servers[si];
                        server.location(arg);
                        Level::Location(si, server.locations.len() - 1)
                    }
                    _ => {
                        return Err(config_error(
                            lineno,
                            format!("\"{kind}\" block is not allowed here"),
                        ));
                    }
                };
                stack.push(level);
                words.clear();
            }
            "}" => {
                if !words.is_empty() {
                    return Err(config_error(lineno, "missing \";\" before \"}\""));
                }
                if stack.pop().is_none() {
                    return Err(config_error(lineno, "unexpected \"}\""));
                }
            }
            _ => words.push(token),
        }
    }

    if !words.is_empty() {
        return Err(config_error(last_line, "unexpected end of file, expecting \";\""));
    }
    if !stack.is_empty() {
        return Err(config_error(last_line, "unexpected end of file, expecting \"}\""));
    }

    Ok(cfg)
}

fn scope_settings(scopes: &mut ScopeTree, level: Option<Level>) -> &mut ScopeSettings {
    match level {
        None => &mut scopes.global,
        Some(Level::Server(si)) => &mut scopes.servers[si].settings,
        Some(Level::Location(si, li)) => &mut scopes.servers[si].locations[li].settings,
    }
}

/// Split into words and the single-character tokens `{`, `}` and `;`,
/// tagged with 1-based line numbers. `#` comments run to end of line.
fn tokenize(s: &str) -> Vec<(usize, String)> {
    let mut tokens = Vec::new();

    for (idx, line) in s.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.split('#').next().unwrap_or_default();
        let mut word = String::new();

        for c in line.chars() {
            match c {
                '{' | '}' | ';' => {
                    if !word.is_empty() {
                        tokens.push((lineno, std::mem::take(&mut word)));
                    }
                    tokens.push((lineno, c.to_string()));
                }
                c if c.is_whitespace() => {
                    if !word.is_empty() {
                        tokens.push((lineno, std::mem::take(&mut word)));
                    }
                }
                c => word.push(c),
            }
        }
        if !word.is_empty() {
            tokens.push((lineno, word));
        }
    }

    tokens
}
