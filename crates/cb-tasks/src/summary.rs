//! Line-oriented Python source scanning.
//!
//! A deliberately small scanner, not a full parser: it tracks imports,
//! definitions, assignments, name references, and branch points, which is
//! what the downstream executors need. String contents and comments are
//! ignored; scope tracking is indentation-based.

use serde::{Deserialize, Serialize};

/// What the `parse` task stores in CAS as the `ast` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSummary {
    Python(PythonSummary),
    Text(TextSummary),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PythonSummary {
    pub imports: Vec<ImportItem>,
    pub functions: Vec<FuncItem>,
    pub classes: Vec<ClassItem>,
    pub assignments: Vec<AssignItem>,
    /// Identifiers read anywhere in the file, sorted and deduplicated.
    pub references: Vec<String>,
    /// Decision points (`if`/`elif`/`for`/`while`/`except`, boolean ops).
    pub branch_points: usize,
    pub line_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    /// The name the import binds (`sys`, or the alias).
    pub name: String,
    /// The module path as written.
    pub module: String,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuncItem {
    pub name: String,
    pub line: u32,
    /// Enclosing scope name, `module` at top level.
    pub scope: String,
    pub params: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassItem {
    pub name: String,
    pub line: u32,
    pub scope: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignItem {
    pub name: String,
    pub line: u32,
    pub scope: String,
    /// Whether the enclosing scope is a function body.
    pub in_function: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub lines: usize,
    pub words: usize,
    pub characters: usize,
    pub non_empty_lines: usize,
}

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "case", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "match", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield", "None", "True", "False",
];

const BRANCH_KEYWORDS: &[&str] = &["if", "elif", "for", "while", "except"];

#[derive(Clone, Copy, PartialEq)]
enum ScopeKind {
    Function,
    Class,
}

struct Scope {
    name: String,
    indent: usize,
    kind: ScopeKind,
}

/// Scan Python source into a summary.
pub fn scan_python(source: &str) -> PythonSummary {
    let mut summary = PythonSummary::default();
    let mut references: Vec<String> = Vec::new();
    let mut scopes: Vec<Scope> = Vec::new();

    let lines: Vec<&str> = source.split('\n').collect();
    summary.line_count = lines.len();

    for (index, raw_line) in lines.iter().enumerate() {
        let line_no = (index + 1) as u32;
        let code = strip_comment(raw_line);
        let trimmed = code.trim_start();
        if trimmed.is_empty() {
            continue;
        }

        let indent = code.len() - trimmed.len();
        scopes.retain(|s| s.indent < indent);
        let scope_name = scopes.last().map(|s| s.name.clone()).unwrap_or_else(|| "module".into());
        let in_function = scopes.iter().any(|s| s.kind == ScopeKind::Function);

        let tokens = tokenize(trimmed);

        for token in &tokens {
            if BRANCH_KEYWORDS.contains(&token.as_str()) || token == "and" || token == "or" {
                summary.branch_points += 1;
            }
        }

        if let Some(rest) = trimmed.strip_prefix("import ") {
            for item in rest.split(',') {
                let (module, name) = parse_import_item(item);
                if !name.is_empty() {
                    summary.imports.push(ImportItem { name, module, line: line_no });
                }
            }
            continue;
        }
        if trimmed.starts_with("from ") {
            if let Some((module_part, names_part)) = trimmed
                .strip_prefix("from ")
                .and_then(|r| r.split_once(" import "))
            {
                let module = module_part.trim().to_string();
                for item in names_part.split(',') {
                    let (suffix, name) = parse_import_item(item);
                    if !name.is_empty() && name != "*" {
                        summary.imports.push(ImportItem {
                            name,
                            module: format!("{module}.{suffix}"),
                            line: line_no,
                        });
                    }
                }
            }
            continue;
        }

        let def_line = trimmed.strip_prefix("def ").or_else(|| {
            trimmed.strip_prefix("async def ")
        });
        if let Some(rest) = def_line {
            if let Some(name) = leading_identifier(rest) {
                let params = parse_params(rest);
                summary.functions.push(FuncItem {
                    name: name.clone(),
                    line: line_no,
                    scope: scope_name.clone(),
                    params: params.clone(),
                });
                scopes.push(Scope {
                    name: name.clone(),
                    indent,
                    kind: ScopeKind::Function,
                });
                for param in params {
                    summary.assignments.push(AssignItem {
                        name: param,
                        line: line_no,
                        scope: name.clone(),
                        in_function: true,
                    });
                }
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("class ") {
            if let Some(name) = leading_identifier(rest) {
                summary.classes.push(ClassItem {
                    name: name.clone(),
                    line: line_no,
                    scope: scope_name.clone(),
                });
                scopes.push(Scope {
                    name,
                    indent,
                    kind: ScopeKind::Class,
                });
                // Base classes are references.
                collect_identifiers(rest, &mut references);
            }
            continue;
        }

        if let Some((target, rhs)) = split_assignment(trimmed) {
            summary.assignments.push(AssignItem {
                name: target,
                line: line_no,
                scope: scope_name.clone(),
                in_function,
            });
            collect_identifiers(rhs, &mut references);
            continue;
        }

        collect_identifiers(trimmed, &mut references);
    }

    references.sort();
    references.dedup();
    summary.references = references;
    summary
}

/// Scan any text into basic shape statistics.
pub fn scan_text(source: &str) -> TextSummary {
    let lines: Vec<&str> = source.split('\n').collect();
    TextSummary {
        lines: lines.len(),
        words: source.split_whitespace().count(),
        characters: source.chars().count(),
        non_empty_lines: lines.iter().filter(|l| !l.trim().is_empty()).count(),
    }
}

/// Unbalanced bracket check, the scanner's stand-in for a syntax error.
/// Returns the mismatched depth if the file cannot be balanced.
pub fn check_balanced(source: &str) -> Result<(), String> {
    let mut depth_paren: i64 = 0;
    let mut depth_bracket: i64 = 0;
    let mut depth_brace: i64 = 0;
    for line in source.split('\n') {
        for c in strip_strings(strip_comment(line)).chars() {
            match c {
                '(' => depth_paren += 1,
                ')' => depth_paren -= 1,
                '[' => depth_bracket += 1,
                ']' => depth_bracket -= 1,
                '{' => depth_brace += 1,
                '}' => depth_brace -= 1,
                _ => {}
            }
        }
    }
    if depth_paren != 0 || depth_bracket != 0 || depth_brace != 0 {
        return Err(format!(
            "unbalanced delimiters: () {depth_paren:+}, [] {depth_bracket:+}, {{}} {depth_brace:+}"
        ));
    }
    Ok(())
}

fn parse_import_item(item: &str) -> (String, String) {
    let item = item.trim();
    let (module, alias) = match item.split_once(" as ") {
        Some((m, a)) => (m.trim(), Some(a.trim())),
        None => (item, None),
    };
    let bound = alias.unwrap_or_else(|| module.split('.').next().unwrap_or(module));
    (module.to_string(), bound.to_string())
}

fn leading_identifier(s: &str) -> Option<String> {
    let mut name = String::new();
    for (i, c) in s.chars().enumerate() {
        if (c.is_ascii_alphabetic() || c == '_') || (i > 0 && c.is_ascii_digit()) {
            name.push(c);
        } else {
            break;
        }
    }
    (!name.is_empty()).then_some(name)
}

fn parse_params(def_rest: &str) -> Vec<String> {
    let Some(open) = def_rest.find('(') else {
        return Vec::new();
    };
    let Some(close) = def_rest.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    def_rest[open + 1..close]
        .split(',')
        .filter_map(|p| {
            let p = p.trim().trim_start_matches('*');
            let name = p.split(['=', ':']).next().unwrap_or("").trim();
            leading_identifier(name).filter(|n| n != "self" && n != "cls")
        })
        .collect()
}

/// A plain `name = expr` assignment target, if this line is one.
fn split_assignment(line: &str) -> Option<(String, &str)> {
    let name = leading_identifier(line)?;
    let rest = line[name.len()..].trim_start();
    // Type-annotated targets: `name: T = expr`.
    let rest = match rest.strip_prefix(':') {
        Some(annotated) => {
            let eq = annotated.find('=')?;
            if annotated.as_bytes().get(eq + 1) == Some(&b'=') {
                return None;
            }
            return Some((name, annotated[eq + 1..].trim_start()));
        }
        None => rest,
    };
    let rest = rest.strip_prefix('=')?;
    if rest.starts_with('=') {
        return None; // comparison, not assignment
    }
    Some((name, rest.trim_start()))
}

fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let stripped = strip_strings(line);
    let mut current = String::new();
    for c in stripped.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn collect_identifiers(fragment: &str, into: &mut Vec<String>) {
    for token in tokenize(fragment) {
        if token.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
            continue;
        }
        if KEYWORDS.contains(&token.as_str()) {
            continue;
        }
        into.push(token);
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut previous = '\0';
    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_double && previous != '\\' => in_single = !in_single,
            '"' if !in_single && previous != '\\' => in_double = !in_double,
            '#' if !in_single && !in_double => return &line[..i],
            _ => {}
        }
        previous = c;
    }
    line
}

fn strip_strings(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_single = false;
    let mut in_double = false;
    let mut previous = '\0';
    for c in line.chars() {
        match c {
            '\'' if !in_double && previous != '\\' => {
                in_single = !in_single;
                out.push(' ');
            }
            '"' if !in_single && previous != '\\' => {
                in_double = !in_double;
                out.push(' ');
            }
            _ if in_single || in_double => out.push(' '),
            _ => out.push(c),
        }
        previous = c;
    }
    out
}
